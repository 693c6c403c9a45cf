//! jsonpad — JSONP demo daemon.
//!
//! # Usage
//!
//! ```text
//! jsonpad serve --port 8080 --config jsonpad.toml
//! jsonpad render --callback onData '{"id":1}'
//! ```

use std::io::Write;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use jsonpad_api::{JsonpResponder, build_router};
use jsonpad_core::{
    ActionContext, BufferPool, JsonpOptions, JsonpResult, JsonpResultExecutor, SerializerSettings,
};
use tokio::signal;
use tracing::info;

#[derive(Parser)]
#[command(name = "jsonpad", about = "JSONP response server")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the demo JSONP endpoints.
    Serve {
        /// Port to listen on.
        #[arg(long, default_value = "8080")]
        port: u16,

        /// TOML options file; defaults are used when omitted.
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Wrap a JSON document in a callback and print it.
    Render {
        /// Callback function name.
        #[arg(long, default_value = "callback")]
        callback: String,

        /// Pretty-print with two-space indentation.
        #[arg(long)]
        pretty: bool,

        /// JSON document to wrap.
        json: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,jsonpad=debug,jsonpad_core=debug".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Serve { port, config } => serve(port, config.as_deref()).await,
        Command::Render {
            callback,
            pretty,
            json,
        } => render(&callback, pretty, &json),
    }
}

fn load_options(path: Option<&Path>) -> anyhow::Result<JsonpOptions> {
    match path {
        Some(path) => JsonpOptions::from_file(path)
            .with_context(|| format!("loading options from {}", path.display())),
        None => Ok(JsonpOptions::default()),
    }
}

async fn serve(port: u16, config: Option<&Path>) -> anyhow::Result<()> {
    let options = load_options(config)?;
    let pool = Arc::new(BufferPool::new(options.pool.clone()));
    let executor = JsonpResultExecutor::with_pool(Arc::new(options), pool);
    let app = build_router(JsonpResponder::new(executor));

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!(%addr, "jsonpad listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("shutdown complete");
    Ok(())
}

fn render(callback: &str, pretty: bool, json: &str) -> anyhow::Result<()> {
    let value: serde_json::Value = serde_json::from_str(json).context("parsing JSON argument")?;

    let mut result = JsonpResult::with_callback_key(value, callback);
    if pretty {
        result = result.with_serializer_settings(SerializerSettings::indented(2));
    }

    let executor = JsonpResultExecutor::new(Arc::new(JsonpOptions::default()));
    let mut ctx = ActionContext::new(std::io::stdout().lock());
    executor.execute(&mut ctx, &result)?;
    writeln!(ctx.response.body)?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_serve() {
        let cli = Cli::try_parse_from(["jsonpad", "serve", "--port", "9000"]).unwrap();
        match cli.command {
            Command::Serve { port, config } => {
                assert_eq!(port, 9000);
                assert!(config.is_none());
            }
            Command::Render { .. } => panic!("expected serve"),
        }
    }

    #[test]
    fn cli_parses_render() {
        let cli = Cli::try_parse_from(["jsonpad", "render", "--pretty", "[1]"]).unwrap();
        match cli.command {
            Command::Render {
                callback,
                pretty,
                json,
            } => {
                assert_eq!(callback, "callback");
                assert!(pretty);
                assert_eq!(json, "[1]");
            }
            Command::Serve { .. } => panic!("expected render"),
        }
    }

    #[test]
    fn missing_options_file_is_an_error() {
        let err = load_options(Some(Path::new("/nonexistent/jsonpad.toml"))).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/jsonpad.toml"));
    }

    #[test]
    fn no_options_file_gives_defaults() {
        assert_eq!(load_options(None).unwrap(), JsonpOptions::default());
    }
}
