// src/main.rs - blindd: serve the blind controller or send it one instruction
use blind_rs::client::send_instruction;
use blind_rs::config::{self, Config, HardwareBackend};
use blind_rs::hardware;
use blind_rs::motion::{MotionController, MotionError, MotionSettings};
use blind_rs::position_store::FilePositionStore;
use blind_rs::server::{CommandServer, ServerError};
use blind_rs::StdClock;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinError;

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Parser)]
#[command(author, version, about = "Motorized blind controller")]
struct Cli {
    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the control loop and the command server (default)
    Serve {
        /// TOML configuration file; built-in defaults when omitted
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Use the simulated motor and indicator instead of sysfs
        #[arg(long)]
        simulate: bool,
    },
    /// Send one request to a running controller and print the reply
    Send {
        /// `up`, `down`, `stop`, `status` or a target length
        payload: String,
        #[arg(short, long, default_value = "127.0.0.1:5000")]
        addr: String,
    },
}

enum Exit {
    Signal,
    ControlLoop(Result<(), MotionError>),
    Server(Result<Result<(), ServerError>, JoinError>),
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(if cli.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        })
        .init();

    match cli.command.unwrap_or(Commands::Serve {
        config: None,
        simulate: false,
    }) {
        Commands::Serve { config, simulate } => serve(config, simulate).await,
        Commands::Send { payload, addr } => {
            let reply = send_instruction(addr.as_str(), &payload, Duration::from_secs(5)).await?;
            println!("{}", reply);
            Ok(())
        }
    }
}

async fn serve(config_path: Option<PathBuf>, simulate: bool) -> Result<(), BoxError> {
    tracing::info!("Starting blindd {}", env!("CARGO_PKG_VERSION"));

    let mut config = match config_path {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            config::load_config(&path).map_err(|e| {
                tracing::error!("Failed to load config from '{}': {}", path.display(), e);
                Box::new(e) as BoxError
            })?
        }
        None => {
            tracing::info!("No configuration file given, using defaults");
            Config::default()
        }
    };
    if simulate {
        config.hardware.backend = HardwareBackend::Simulated;
    }

    tracing::info!("Blind: height {}, speed {}/s", config.blind.height, config.blind.speed);
    tracing::info!(
        "Motor: raise {}%, lower {}%, ramp {}% for {} ms",
        config.motor.raise_duty,
        config.motor.lower_duty,
        config.motor.ramp_duty,
        config.motor.ramp_settle_ms
    );

    let peripherals = hardware::open(config.hardware.clone(), config.motor.pwm_frequency_hz).await?;
    let store = FilePositionStore::open(&config.controller.state_file).await?;
    let controller = MotionController::new(
        MotionSettings::from_config(&config),
        peripherals,
        Box::new(store),
        Arc::new(StdClock),
    )
    .await?;
    let mut controller_task = controller.start();

    let server = CommandServer::bind(&config.server, controller_task.handle()).await?;
    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let mut server_task = tokio::spawn(server.run(shutdown_rx));

    let exit = tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            if let Err(e) = signal {
                tracing::error!("Failed to listen for Ctrl-C: {}", e);
            }
            tracing::info!("Shutdown requested");
            Exit::Signal
        }
        result = controller_task.wait() => Exit::ControlLoop(result),
        result = &mut server_task => Exit::Server(result),
    };

    let _ = shutdown_tx.send(());
    // the server stops first so no handler outlives the hardware
    let (server_result, loop_result) = match exit {
        Exit::Server(result) => (result, controller_task.shutdown().await),
        Exit::ControlLoop(result) => (server_task.await, result),
        Exit::Signal => (server_task.await, controller_task.shutdown().await),
    };
    match server_result {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::error!("Command server failed: {}", e),
        Err(e) => tracing::error!("Command server task failed: {}", e),
    }
    tracing::info!("blindd stopped");
    loop_result.map_err(|e| Box::new(e) as BoxError)
}
