// SPDX-FileCopyrightText: 2023 Phoenix R&D GmbH <hello@phnx.im>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

use std::net::TcpListener;
use std::sync::Arc;

use actix::Actor;
use tracing::info;

use twochat_server::{
    auth::HttpAuthVerifier,
    configurations::{get_configuration, Environment},
    endpoints::gifs::GifProviderClient,
    push::HttpPushDispatcher,
    run, scheduler,
    session::SessionRegistry,
    storage::postgres::PostgresGateway,
    telemetry::{get_subscriber, init_subscriber},
};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    let subscriber = get_subscriber("twochat-server".into(), "info".into(), std::io::stdout);
    init_subscriber(subscriber);

    let configuration = get_configuration().expect("Could not load configuration.");
    let environment = Environment::from_env();

    let address = format!(
        "{}:{}",
        configuration.application.host, configuration.application.port
    );
    let listener = TcpListener::bind(address).expect("Failed to bind to random port.");

    info!(
        host = configuration.database.host,
        "Connecting to postgres server",
    );
    let mut counter = 0;
    let mut gateway_result = PostgresGateway::connect(&configuration.database.connection_string()).await;
    while let Err(e) = gateway_result {
        info!("Failed to connect to postgres server: {}", e);
        tokio::time::sleep(std::time::Duration::from_secs(1)).await;
        counter += 1;
        if counter > 10 {
            panic!("Database not ready after 10 seconds.");
        }
        gateway_result = PostgresGateway::connect(&configuration.database.connection_string()).await;
    }
    let gateway = Arc::new(gateway_result.expect("Failed to connect to database."));

    let auth = HttpAuthVerifier::new(configuration.auth_service.url.clone());
    let push = Arc::new(HttpPushDispatcher::new(
        configuration.push_gateway.url.clone(),
        gateway.clone(),
    ));
    let gif_provider = GifProviderClient::new(configuration.gif_provider.url.clone());
    let registry = SessionRegistry::new().start();

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let scheduler_handle = scheduler::spawn(gateway.clone(), registry.clone(), shutdown_rx);

    let server = run(
        listener,
        auth,
        gateway,
        registry,
        push,
        gif_provider,
        environment,
    )?;

    let result = server.await;

    let _ = shutdown_tx.send(true);
    let _ = scheduler_handle.await;

    result
}
