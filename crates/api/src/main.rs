use anyhow::Context;

use clinicrx_infra::Settings;
use clinicrx_observability::LogFormat;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::load().context("failed to load configuration")?;
    clinicrx_observability::init(
        &settings.logging.filter,
        LogFormat::from_json_flag(settings.logging.json),
    );

    let bind = settings.api.bind.clone();
    let app = tokio::task::spawn_blocking(move || clinicrx_api::app::build_app(&settings))
        .await
        .context("startup task failed")?
        .context("failed to open billing store")?;

    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("failed to bind {bind}"))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}
