use std::time::Duration;

/// Options for the `run` subcommand.
#[derive(clap::Args, Clone, Debug)]
pub struct Config {
    /// Only watch WebhookSecrets in this namespace
    #[arg(long, env = "WATCH_NAMESPACE")]
    pub namespace: Option<String>,

    /// Deadline in seconds for each request to a git host
    #[arg(
        long = "http-timeout",
        env = "HTTP_TIMEOUT_SECS",
        default_value_t = 30,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub http_timeout_secs: u64,

    /// Seconds to wait before retrying a failed reconcile
    #[arg(long = "error-requeue", env = "ERROR_REQUEUE_SECS", default_value_t = 15)]
    pub error_requeue_secs: u64,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, env = "LOG_FILTER", default_value = "info,kube=warn")]
    pub log_filter: String,
}

impl Config {
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn error_requeue(&self) -> Duration {
        Duration::from_secs(self.error_requeue_secs)
    }
}
