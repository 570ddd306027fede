use tracing_subscriber::{fmt::format::FmtSpan, prelude::*, EnvFilter};

/// Initialize logging with sensible defaults for the service.
pub fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level))
        // Filter out noisy transport logs
        .add_directive("hyper=off".parse().unwrap())
        .add_directive("h2=off".parse().unwrap())
        .add_directive("rustls=off".parse().unwrap())
        .add_directive("reqwest=off".parse().unwrap())
        .add_directive("async_mcp=off".parse().unwrap());

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_span_events(FmtSpan::NONE)
        .compact()
        .with_ansi(true)
        .with_timer(tracing_subscriber::fmt::time::time());

    tracing_subscriber::registry()
        .with(fmt_layer.with_filter(filter))
        .init();
}
