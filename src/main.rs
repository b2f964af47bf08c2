//! mqttms - command line master for MQTT master/slave devices

use clap::{Parser, Subcommand};
use mqttms::device::MsHost;
use mqttms::observability::init_default_logging;
use mqttms::{MsConfig, MsError, MsResult, MsSession};
use std::path::{Path, PathBuf};
use std::process;
use tracing::{error, info};

/// Synchronous request/reply client for MQTT master/slave devices
#[derive(Parser)]
#[command(name = "mqttms")]
#[command(about = "Send commands to an MQTT slave device and print its response")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE", env = "MQTTMS_CONFIG")]
    config: Option<PathBuf>,

    /// Log payloads in full, however long
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Send a command code and print the response
    Send {
        /// Two-letter command code, e.g. NP
        code: String,
        /// Command data
        #[arg(long, default_value = "")]
        data: String,
    },
    /// Send a raw JSON command object and print the response
    Raw {
        /// e.g. '{"command":"SR","data":""}'
        json: String,
    },
    /// Ask the slave who it is
    WhoAmI,
    /// Validate configuration
    Config {
        /// Show the effective configuration
        #[arg(long)]
        show: bool,
    },
}

const DEFAULT_CONFIG_PATHS: [&str; 2] = ["mqttms.toml", "config/mqttms.toml"];

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_default_logging();

    let mut config = match load_configuration(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e.user_message());
            process::exit(1);
        }
    };
    if cli.verbose {
        config.logging.verbose = true;
    }

    let result = match cli.command {
        Commands::Send { code, data } => run_exchange(config, Exchange::Code { code, data }).await,
        Commands::Raw { json } => run_exchange(config, Exchange::Raw(json)).await,
        Commands::WhoAmI => run_exchange(config, Exchange::WhoAmI).await,
        Commands::Config { show } => handle_config_command(&config, show),
    };

    if let Err(e) = result {
        error!("Command failed: {}", e.user_message());
        process::exit(1);
    }
}

fn load_configuration(config_path: Option<&Path>) -> MsResult<MsConfig> {
    if let Some(path) = config_path {
        info!("Loading configuration from: {}", path.display());
        return Ok(MsConfig::load_from_file(path)?);
    }

    for path_str in DEFAULT_CONFIG_PATHS {
        let path = Path::new(path_str);
        if path.exists() {
            info!("Loading configuration from: {}", path.display());
            return Ok(MsConfig::load_from_file(path)?);
        }
    }

    info!("No configuration file found, using defaults");
    let config = MsConfig::default();
    config.validate()?;
    Ok(config)
}

enum Exchange {
    Code { code: String, data: String },
    Raw(String),
    WhoAmI,
}

async fn run_exchange(config: MsConfig, exchange: Exchange) -> MsResult<()> {
    let mut session = MsSession::new(config)?;

    if let Err(e) = session.start().await {
        session.graceful_exit().await;
        return Err(e);
    }

    let host = MsHost::new(session.engine());
    let result = match exchange {
        Exchange::Code { code, data } => host.command(&code, &data).await,
        Exchange::Raw(json) => session.engine().submit_json(&json).await,
        Exchange::WhoAmI => host.who_am_i().await,
    };

    session.graceful_exit().await;

    let response = result.map_err(MsError::from)?;
    println!("{response}");
    Ok(())
}

fn handle_config_command(config: &MsConfig, show: bool) -> MsResult<()> {
    config.validate()?;
    info!("Configuration is valid");

    if show {
        let mut shown = config.clone();
        if !shown.mqtt.password.is_empty() {
            shown.mqtt.password = "***".to_string();
        }
        match toml::to_string_pretty(&shown) {
            Ok(text) => println!("{text}"),
            Err(e) => error!("Failed to render configuration: {}", e),
        }
    }

    Ok(())
}
