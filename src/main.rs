use dotenvy::dotenv;
use tracing::info;

use payflow::application::use_cases::outbox::run_outbox_drain_loop;
use payflow::infra::{app::create_app, setup::init_app_state};
use std::net::SocketAddr;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let app_state = init_app_state().await?;

    let bind_addr = app_state.config.bind_addr;

    let app = create_app(app_state.clone());

    // Spawn the outbox drain task (after tracing is initialized)
    let outbox = app_state.outbox.clone();
    tokio::spawn(async move {
        run_outbox_drain_loop(outbox).await;
    });

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;

    info!("Payment engine listening at {}", &listener.local_addr()?);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
