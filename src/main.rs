use clap::Parser;
use phrase_gateway::config::Args;
use phrase_gateway::reset::premium_reset_scheduler;
use phrase_gateway::upstream::AnthropicClient;
use phrase_gateway::{AppState, router};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "phrase_gateway=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // parse cli arguments (env vars fill in anything not passed)
    let args = Args::parse();

    let generator = AnthropicClient::new(
        args.api_url.clone(),
        args.api_key.clone(),
        args.model.clone(),
        args.max_tokens,
        args.upstream_timeout(),
    )?;
    if !generator.has_api_key() {
        warn!("CLAUDE_API_KEY is not set; generation requests will fail until it is");
    }

    let max_sessions = usize::try_from(args.max_sessions).unwrap_or(usize::MAX);
    let state = Arc::new(AppState::new(
        &args.access_password,
        args.limits(),
        max_sessions,
        Arc::new(generator),
    ));

    // spawn the daily premium reset
    tokio::spawn(premium_reset_scheduler(state.ledger.clone()));

    let app = router(state);

    let addr = format!("0.0.0.0:{}", args.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!("Gateway running on http://localhost:{}", args.port);
    info!("Forwarding to {} (model {})", args.api_url, args.model);
    info!(
        "Usage limits: {} free per IP (lifetime), {} premium per session (daily)",
        args.free_limit, args.premium_limit
    );

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
