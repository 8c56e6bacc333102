use std::io;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum LogFormat {
    /// Human-readable lines.
    Text,
    /// One JSON object per line.
    Json,
}

/// Logging arguments shared by every subcommand.
#[derive(Debug, clap::Args)]
pub struct LogArgs {
    /// Log filter, as a level ("debug") or a tracing EnvFilter directive
    /// ("loopctl=debug,poller=trace").
    #[clap(long = "log-level", global = true, default_value = "info", env = "LOG_LEVEL")]
    pub level: String,
    /// Format of logs, which are written to stderr.
    #[clap(long = "log-format", global = true, value_enum, default_value = "text")]
    pub format: LogFormat,
}

/// Initialize the global tracing subscriber. Logs are written to stderr,
/// leaving stdout to the items being delivered.
pub fn init_logging(args: &LogArgs) {
    let env_filter = tracing_subscriber::EnvFilter::new(&args.level);

    let builder = tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(env_filter)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339());

    match args.format {
        LogFormat::Json => builder
            .json()
            .flatten_event(true)
            .with_current_span(true)
            .with_span_list(false)
            .with_target(false)
            .init(),
        LogFormat::Text => builder.with_target(false).init(),
    }
}
