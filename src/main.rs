use runbook_hooks::config::Settings;
use runbook_hooks::error::HookError;
use runbook_hooks::logging::setup_logging;
use runbook_hooks::{AppState, build_router};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), HookError> {
    dotenv::dotenv().ok();

    let settings = match Settings::load() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return Err(e);
        }
    };

    let _log_guard = setup_logging(&settings)?;

    let bind_address = settings.bind_address.clone();
    info!("Listening on {}", bind_address);
    info!("Using runbooks in {:?}", settings.config_dir);
    if settings.proxy {
        info!("Trusting client address from '{}'", settings.proxy_header);
    }

    let state = Arc::new(AppState::new(settings));
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .inspect_err(|e| error!("Failed to bind {}: {}", bind_address, e))?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
