use pulse_api::{
    AppState, ReportConfig, load_dataset, resolve_jobs_path, resolve_quotes_path, router,
};
use std::{env, net::SocketAddr};
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let quotes_path = resolve_quotes_path();
    let jobs_path = resolve_jobs_path();
    let data = load_dataset(&quotes_path, &jobs_path).await;
    info!(
        "loaded {} quotes and {} jobs",
        data.quotes.len(),
        data.jobs.len()
    );

    let state = AppState::new(quotes_path, jobs_path, ReportConfig::from_env(), data);
    let app = router(state);

    let port = env::var("PORT")
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    info!("listening on http://{addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
