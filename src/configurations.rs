// SPDX-FileCopyrightText: 2023 Phoenix R&D GmbH <hello@phnx.im>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Layered configuration. Grounded on the teacher's `configurations.rs`:
//! `config::Config::builder()` stacking a base file, an environment-specific
//! file, and an env-var override — generalized to this service's settings
//! and to the single `RUN_ENVIRONMENT` variable named in `spec.md` §6.

use config::{Config, ConfigError, File, Source};
use serde::Deserialize;

/// `spec.md` §6: `RUN_ENVIRONMENT=PRODUCTION` disables interactive API
/// documentation. Any other value (including unset) is `Local`.
pub enum Environment {
    Local,
    Production,
}

impl Environment {
    pub fn from_env() -> Self {
        match std::env::var("RUN_ENVIRONMENT") {
            Ok(v) if v.eq_ignore_ascii_case("production") => Environment::Production,
            _ => Environment::Local,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Local => "local",
            Environment::Production => "production",
        }
    }

    pub fn disables_api_docs(&self) -> bool {
        matches!(self, Environment::Production)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApplicationSettings {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    pub username: String,
    pub password: String,
    pub port: u16,
    pub host: String,
    pub name: String,
    #[serde(default)]
    pub require_ssl: bool,
}

impl DatabaseSettings {
    pub fn connection_string(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}{}",
            self.username,
            self.password,
            self.host,
            self.port,
            self.name,
            if self.require_ssl { "?sslmode=require" } else { "" }
        )
    }

    pub fn connection_string_without_database(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}{}",
            self.username,
            self.password,
            self.host,
            self.port,
            if self.require_ssl { "?sslmode=require" } else { "" }
        )
    }
}

/// Settings for one of the external collaborators named in `spec.md` §1/§6
/// (auth service, push gateway, GIF provider) — a plain base URL is enough
/// since the core treats each as an opaque HTTP dependency.
#[derive(Debug, Clone, Deserialize)]
pub struct ExternalServiceSettings {
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub application: ApplicationSettings,
    pub database: DatabaseSettings,
    pub auth_service: ExternalServiceSettings,
    pub push_gateway: ExternalServiceSettings,
    pub gif_provider: ExternalServiceSettings,
}

pub fn get_configuration() -> Result<Settings, ConfigError> {
    let base_path = std::env::current_dir().expect("Failed to determine the current directory");
    let configuration_directory = base_path.join("configuration");
    let environment = Environment::from_env();

    get_configuration_impl(
        File::from(configuration_directory.join("base")).required(true),
        File::from(configuration_directory.join(environment.as_str())).required(false),
    )
}

pub fn get_configuration_from_str(base: &str, environment: &str) -> Result<Settings, ConfigError> {
    get_configuration_impl(
        File::from_str(base, config::FileFormat::Yaml),
        File::from_str(environment, config::FileFormat::Yaml),
    )
}

fn get_configuration_impl(
    base: impl Source + Send + Sync + 'static,
    environment: impl Source + Send + Sync + 'static,
) -> Result<Settings, ConfigError> {
    let builder = Config::builder()
        .add_source(base)
        .add_source(environment)
        // e.g. `APP_DATABASE__PORT=5433` overrides `Settings.database.port`
        .add_source(config::Environment::with_prefix("APP").separator("__"));
    builder.build()?.try_deserialize()
}
