use std::io;
use tracing_appender::rolling;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

/// Directory the rolling file log is written to.
pub const LOG_DIR: &str = "logs";

pub fn configure_logging() {
    // RUST_LOG wins over the built-in stdout filter
    let stdout_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("info,label_match=info,cooccurrence=info,time_series=info,table_io=warn")
    });

    let stdout_log = fmt::layer()
        .with_writer(io::stdout)
        .with_target(false)
        .with_filter(stdout_filter);

    // File log keeps the per-row detail
    let file_appender = rolling::daily(LOG_DIR, "techmap.log");
    let file_log = fmt::layer()
        .with_writer(file_appender)
        .with_ansi(false)
        .with_filter(EnvFilter::new(
            "info,label_match=debug,cooccurrence=debug,time_series=debug,table_io=debug,taxonomy=debug,embedding=debug",
        ));

    tracing_subscriber::Registry::default()
        .with(stdout_log)
        .with(file_log)
        .init();
}
