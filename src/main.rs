use std::net::SocketAddr;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use kasalink::{api, cloud, config, AppState};

mod cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "kasalink=info,tower_http=info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cfg = config::load()?;
    let args = cli::Cli::parse();

    match args.command {
        Some(cli::Commands::Serve { port }) => {
            let port = port.unwrap_or(cfg.port);
            run_server(cfg, port).await
        }
        Some(cli::Commands::Devices) => list_devices(cfg).await,
        None => {
            let port = cfg.port;
            run_server(cfg, port).await
        }
    }
}

async fn run_server(cfg: config::Config, port: u16) -> anyhow::Result<()> {
    let state = AppState::new(cfg);

    let app = api::router(state).layer(axum::middleware::from_fn(request_id_middleware));

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("kasalink listening on {}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}

/// `kasalink devices` — operator convenience: authenticate and print the
/// account's device inventory without starting the server.
async fn list_devices(cfg: config::Config) -> anyhow::Result<()> {
    let client = cloud::CloudClient::new(&cfg.cloud_url, &cfg.username, &cfg.password);
    let store = cloud::SessionStore::new();

    let devices = store.devices(&client).await?;
    if devices.is_empty() {
        println!("No devices found.");
        return Ok(());
    }

    println!("{:<16} {:<24} {:<8}", "DEVICE ID", "ALIAS", "ONLINE");
    for d in devices.iter() {
        println!(
            "{:<16} {:<24} {:<8}",
            d.device_id,
            d.display_alias(),
            d.status == 1
        );
    }
    Ok(())
}

/// Middleware: injects a unique X-Request-Id into every response so
/// webhook failures can be correlated with gateway logs.
async fn request_id_middleware(
    req: axum::extract::Request,
    next: axum::middleware::Next,
) -> axum::response::Response {
    let req_id = uuid::Uuid::new_v4().to_string();
    let mut resp = next.run(req).await;
    if let Ok(val) = axum::http::HeaderValue::from_str(&req_id) {
        resp.headers_mut().insert("x-request-id", val);
    }
    resp
}
