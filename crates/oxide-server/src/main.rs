//! oxide-server
//!
//! Serves an oxide-router dispatcher over HTTP/1.1.

mod app;
mod transport;

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context as _;
use clap::Parser;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use oxide_router::RouterConfig;
use tokio::net::TcpListener;
use tracing::{Level, debug, info, warn};
use tracing_subscriber::FmtSubscriber;

/// HTTP server for oxide-router applications.
#[derive(Parser)]
#[command(name = "oxide-server")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Address to bind.
    #[arg(short, long, env = "OXIDE_BIND", default_value = "127.0.0.1")]
    bind: IpAddr,

    /// Port to listen on.
    #[arg(short, long, env = "OXIDE_PORT", default_value_t = 3102)]
    port: u16,

    /// Directory served under `/assets`.
    #[arg(short, long, env = "OXIDE_ASSETS")]
    assets: Option<PathBuf>,

    /// Router configuration file (JSON).
    #[arg(short, long, env = "OXIDE_ROUTER_CONFIG")]
    config: Option<PathBuf>,

    /// Do not redirect between `/path` and `/path/`.
    #[arg(long)]
    no_trailing_slash_redirect: bool,

    /// Do not redirect to cleaned, case-corrected paths.
    #[arg(long)]
    no_fixed_path_redirect: bool,

    /// Answer 404 instead of 405 on method mismatches.
    #[arg(long)]
    no_method_not_allowed: bool,

    /// Enable verbose output.
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    /// Reads the config file, if any, then applies the command-line switches.
    fn router_config(&self) -> anyhow::Result<RouterConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let raw = std::fs::read_to_string(path)
                    .with_context(|| format!("reading {}", path.display()))?;
                serde_json::from_str(&raw)
                    .with_context(|| format!("parsing {}", path.display()))?
            }
            None => RouterConfig::default(),
        };
        if self.no_trailing_slash_redirect {
            config.redirect_trailing_slash = false;
        }
        if self.no_fixed_path_redirect {
            config.redirect_fixed_path = false;
        }
        if self.no_method_not_allowed {
            config.handle_method_not_allowed = false;
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let log_level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = cli.router_config()?;
    let dispatcher = Arc::new(app::build(config, cli.assets.as_deref())?);
    for (method, pattern) in dispatcher.routes() {
        debug!(%method, pattern, "route");
    }

    let addr = SocketAddr::new(cli.bind, cli.port);
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!(%addr, routes = dispatcher.routes().len(), "listening");

    loop {
        let (stream, peer) = listener.accept().await?;
        let io = TokioIo::new(stream);
        let dispatcher = Arc::clone(&dispatcher);

        tokio::task::spawn(async move {
            let service = service_fn(move |req| {
                let dispatcher = Arc::clone(&dispatcher);
                transport::handle(req, dispatcher)
            });

            if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                warn!(%peer, error = %err, "error serving connection");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::parse_from(["oxide-server"]);
        assert_eq!(cli.port, 3102);
        assert_eq!(cli.bind.to_string(), "127.0.0.1");
        assert_eq!(cli.router_config().unwrap(), RouterConfig::default());
    }

    #[test]
    fn test_switches_override_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("router.json");
        std::fs::write(&path, r#"{"redirect_fixed_path": false}"#).unwrap();

        let cli = Cli::parse_from([
            "oxide-server",
            "--config",
            path.to_str().unwrap(),
            "--no-method-not-allowed",
        ]);
        let config = cli.router_config().unwrap();
        assert!(config.redirect_trailing_slash);
        assert!(!config.redirect_fixed_path);
        assert!(!config.handle_method_not_allowed);
    }

    #[test]
    fn test_bad_config_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("router.json");
        std::fs::write(&path, "not json").unwrap();

        let cli = Cli::parse_from(["oxide-server", "--config", path.to_str().unwrap()]);
        let err = cli.router_config().unwrap_err();
        assert!(err.to_string().starts_with("parsing"));
    }
}
