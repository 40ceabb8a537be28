use blossom_api::config::Config;
use blossom_api::error::AppResult;
use blossom_api::routes::{Collaborators, Domain};
use blossom_api::server;
use clap::{Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Blossom Honey API - web store gateway
#[derive(Parser, Debug)]
#[command(name = "blossom-api")]
#[command(version)]
#[command(about = "HTTP gateway for the Blossom Honey web store", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the web server (default)
    Serve {
        /// Host to bind to (overrides SERVER_HOST env var)
        #[arg(long)]
        host: Option<String>,

        /// Port to bind to (overrides PORT env var)
        #[arg(long)]
        port: Option<u16>,
    },

    /// Print the mounted route table
    Routes,
}

#[tokio::main]
async fn main() -> AppResult<()> {
    let cli = Cli::parse();

    init_tracing();

    // Load configuration
    let mut config = Config::from_env()?;

    let command = cli.command.unwrap_or(Commands::Serve {
        host: None,
        port: None,
    });

    match command {
        Commands::Serve { host, port } => {
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            config.validate()?;

            server::run_server(config, Collaborators::new()).await
        }
        Commands::Routes => {
            println!("{:<24} GET  liveness probe", "/");
            for domain in Domain::ALL {
                println!("{:<24} *    {}", domain.prefix(), domain.description());
            }
            Ok(())
        }
    }
}

/// Install the global subscriber; `LOG_FORMAT=json` switches to JSON lines.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(Level::INFO.to_string()));

    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}
