//! APISim CLI - API Mock Simulator
//!
//! Usage:
//!   apisim serve [OPTIONS]    Start the HTTP server
//!
//! Examples:
//!   apisim serve --port 8080
//!   apisim serve --config config.yaml
//!   apisim serve --config config.yaml --json-logs

use apisim::cli::Config;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "apisim")]
#[command(author, version, about = "API Mock Simulator", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the APISim HTTP server
    Serve {
        /// Configuration file path (YAML)
        #[arg(short, long, env = "APISIM_CONFIG")]
        config: Option<String>,

        /// Port to listen on [default: config file, then 8080]
        #[arg(short, long, env = "APISIM_PORT")]
        port: Option<u16>,

        /// Host to bind to [default: config file, then 0.0.0.0]
        #[arg(long, env = "APISIM_HOST")]
        host: Option<String>,

        /// Emit logs as JSON
        #[arg(long, env = "APISIM_JSON_LOGS")]
        json_logs: bool,
    },
}

fn init_tracing(json_logs: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "apisim=info,tower_http=info".into());

    if json_logs {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

/// Flags given on the command line (or via env) win over the config file
fn apply_server_args(config: &mut Config, port: Option<u16>, host: Option<String>) {
    if let Some(port) = port {
        config.server.port = port;
    }
    if let Some(host) = host {
        config.server.host = host;
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            config,
            port,
            host,
            json_logs,
        } => {
            init_tracing(json_logs);

            let mut config = if let Some(path) = config {
                tracing::info!("Loading configuration from {}", path);
                Config::from_file(&path)?
            } else {
                Config::default()
            };

            apply_server_args(&mut config, port, host);

            apisim::cli::run_server(config).await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const FILE_CONFIG: &str = "server:\n  port: 9000\n  host: 127.0.0.1\n";

    fn serve_args(cli: Cli) -> (Option<String>, Option<u16>, Option<String>) {
        match cli.command {
            Commands::Serve {
                config, port, host, ..
            } => (config, port, host),
        }
    }

    #[test]
    fn test_config_file_server_kept_without_flags() {
        let cli = Cli::try_parse_from(["apisim", "serve", "--config", "c.yaml"]).unwrap();
        let (path, port, host) = serve_args(cli);
        assert_eq!(path.as_deref(), Some("c.yaml"));

        let mut config = Config::from_yaml(FILE_CONFIG).unwrap();
        apply_server_args(&mut config, port, host);

        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "127.0.0.1");
    }

    #[test]
    fn test_flags_override_config_file() {
        let cli = Cli::try_parse_from([
            "apisim", "serve", "--config", "c.yaml", "--port", "7070", "--host", "10.0.0.1",
        ])
        .unwrap();
        let (_, port, host) = serve_args(cli);

        let mut config = Config::from_yaml(FILE_CONFIG).unwrap();
        apply_server_args(&mut config, port, host);

        assert_eq!(config.server.port, 7070);
        assert_eq!(config.server.host, "10.0.0.1");
    }

    #[test]
    fn test_builtin_defaults_without_file_or_flags() {
        let cli = Cli::try_parse_from(["apisim", "serve"]).unwrap();
        let (path, port, host) = serve_args(cli);
        assert!(path.is_none());

        let mut config = Config::default();
        apply_server_args(&mut config, port, host);

        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host, "0.0.0.0");
    }
}
