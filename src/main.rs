use anyhow::Result;
use clap::{Parser, Subcommand};

use tempo::config::Config;
use tempo::logging::init_logging;
use tempo::rest::{self, ApiDoc, ApiState};

#[derive(Parser)]
#[command(name = "tempo")]
#[command(about = "Guided workflow execution and time tracking service")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Config file path
    #[arg(short, long)]
    config: Option<String>,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the REST API server (default)
    Serve {
        /// Port to listen on (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Print the OpenAPI specification as JSON
    Openapi,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;
    let _logging = init_logging(&config, cli.debug)?;

    match cli.command {
        Some(Commands::Openapi) => {
            println!("{}", ApiDoc::json()?);
            Ok(())
        }
        Some(Commands::Serve { port }) => serve(config, port).await,
        None => serve(config, None).await,
    }
}

async fn serve(config: Config, port_override: Option<u16>) -> Result<()> {
    let port = port_override.unwrap_or(config.server.port);
    let state = ApiState::new(config)?;
    rest::serve(state, port).await
}
