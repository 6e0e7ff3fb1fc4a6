use clap::Parser;
use mythos_daemon::args::Args;
use mythos_daemon::services::Services;
use mythos_realtime::AllowAnyAuthenticator;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::info;

#[tokio::main(flavor = "multi_thread")]
async fn main() -> eyre::Result<()> {
    color_eyre::install()?;

    let args = Args::parse();
    mythos_common::logging::init_tracing(args.debug);
    let _metrics_handle = mythos_common::metrics::install_metrics();

    let config = args.resolve_config()?;
    let services = Services::build(config.clone()).await;
    let app_state = services.app_state(Arc::new(AllowAnyAuthenticator));
    let router = mythos_realtime::build_router(app_state);

    let listener = TcpListener::bind(&config.listen_address).await?;
    info!(address = %config.listen_address, "listening");

    let shutdown = async {
        let _ = signal::ctrl_c().await;
        info!("shutdown signal received");
    };

    axum::serve(listener, router.into_make_service_with_connect_info::<std::net::SocketAddr>())
        .with_graceful_shutdown(shutdown)
        .await?;

    services.shutdown().await;
    Ok(())
}
