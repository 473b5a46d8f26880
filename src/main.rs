//! CORS Proxy
//!
//! ```text
//!     Browser ──▶ CORS ──▶ rate limit ──▶ size guard ──▶ target URL ──▶ fetch
//!                                                                        │
//!     Browser ◀── CORS ◀── compose ◀── rewrite (HTML/CSS) ◀── content type ◀┘
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use cors_proxy::config::{load_config, validate_config, ProxyConfig};
use cors_proxy::observability::logging;

#[derive(Parser)]
#[command(name = "cors-proxy")]
#[command(about = "Forwarding proxy that adds CORS headers and rewrites page resources", long_about = None)]
struct Cli {
    /// TOML configuration file; defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override `listener.bind_address`.
    #[arg(short, long)]
    bind: Option<String>,

    /// Override `listener.public_base_url`.
    #[arg(long)]
    public_url: Option<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => match load_config(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Failed to load {}: {}", path.display(), e);
                return ExitCode::FAILURE;
            }
        },
        None => ProxyConfig::default(),
    };

    if let Some(bind) = cli.bind {
        config.listener.bind_address = bind;
    }
    if let Some(public_url) = cli.public_url {
        config.listener.public_base_url = Some(public_url);
    }
    if let Err(errors) = validate_config(&config) {
        for error in errors {
            eprintln!("Invalid configuration: {}", error);
        }
        return ExitCode::FAILURE;
    }

    logging::init_logging(&config.observability);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        bind_address = %config.listener.bind_address,
        rate_limit_max = config.rate_limit.max_requests,
        rate_limit_window_secs = config.rate_limit.window_secs,
        max_body_bytes = config.limits.max_body_bytes,
        request_timeout_ms = config.upstream.request_timeout_ms,
        "cors-proxy starting"
    );

    match cors_proxy::lifecycle::run(config).await {
        Ok(()) => {
            tracing::info!("Shutdown complete");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "cors-proxy failed");
            ExitCode::FAILURE
        }
    }
}
