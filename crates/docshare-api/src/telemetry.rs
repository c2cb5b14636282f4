use tracing_subscriber::{
    fmt::format::Format, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter,
};

const DEFAULT_FILTER: &str = "docshare=debug,audit=info,tower_http=debug";

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_FILTER.into())
}

/// Initialize tracing: compact console output, or one JSON object per line
/// when `json` is set (`LOG_FORMAT=json`).
pub fn init_telemetry(json: bool) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    if json {
        tracing_subscriber::registry()
            .with(env_filter())
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_target(true),
            )
            .try_init()?;
    } else {
        let console_fmt = tracing_subscriber::fmt::layer().event_format(
            Format::default()
                .compact()
                .with_target(false)
                .without_time(),
        );
        tracing_subscriber::registry()
            .with(env_filter())
            .with(console_fmt)
            .try_init()?;
    }

    tracing::debug!(json, "Tracing initialized");
    Ok(())
}
