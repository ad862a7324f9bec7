use clap::Parser;
use dotenvy::dotenv;
use osw_validation_service::config::Settings;
use osw_validation_service::create_app;
use osw_validation_service::infrastructure::{auth, bus, engine, storage};
use osw_validation_service::services::authorizer::AuthorizationGate;
use osw_validation_service::services::pipeline::{MessagePipeline, PipelineConfig};
use osw_validation_service::services::runner::ValidationRunner;
use osw_validation_service::services::workspace::WorkspaceManager;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Port for the health endpoints (overrides PORT)
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Environment & Logging Setup
    dotenv().ok();
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "osw_validation_service=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("🚀 Starting OSW Validation Service...");

    // 2. Configuration. Missing keys are fatal.
    let settings = match Settings::from_env() {
        Ok(settings) => settings,
        Err(e) => {
            error!("❌ Application startup failed: {}", e);
            error!(
                "Provide QUEUECONNECTION, VALIDATION_REQ_TOPIC, VALIDATION_REQ_SUB, VALIDATION_RES_TOPIC and AUTH_PERMISSION_URL (or AUTH_SIMULATE=true)"
            );
            std::process::exit(1);
        }
    };
    info!(
        "⚙️  Topics: {} -> {}, Container={}, Auth={}, Max Concurrent={}",
        settings.request_topic,
        settings.response_topic,
        settings.container_name,
        settings.auth_provider,
        settings.max_concurrent_messages
    );

    // 3. Collaborators
    let message_bus = bus::setup_bus(&settings)?;
    let authorizer = auth::setup_authorizer(&settings)?;
    let blob_storage = storage::setup_storage(&settings.storage).await;
    let validation_engine = engine::setup_engine(&settings);

    // 4. Pipeline
    let pipeline = Arc::new(MessagePipeline::new(
        PipelineConfig::from(&settings),
        message_bus,
        AuthorizationGate::new(authorizer),
        WorkspaceManager::new(
            settings.download_dir.clone(),
            settings.container_name.clone(),
            blob_storage,
        ),
        ValidationRunner::new(validation_engine, Some(settings.max_validation_errors)),
    ));
    let listener = pipeline.spawn();
    info!("👷 Validation listener initialized.");

    // 5. Health endpoints
    let app = create_app().layer(TraceLayer::new_for_http());
    let addr = SocketAddr::from(([0, 0, 0, 0], args.port.unwrap_or(settings.port)));
    let tcp = tokio::net::TcpListener::bind(addr).await?;
    info!("✅ Health endpoints ready at http://{}", addr);

    axum::serve(tcp, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // 6. Drain the listener
    let aborted = listener.stop(settings.shutdown_drain).await;
    if aborted > 0 {
        error!("{} messages were aborted during shutdown", aborted);
    }

    info!("🛑 Service shut down gracefully.");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("⌨️  Ctrl+C received, starting graceful shutdown...");
        },
        _ = terminate => {
            info!("💤 SIGTERM received, starting graceful shutdown...");
        },
    }
}
