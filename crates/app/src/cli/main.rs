//! mixcast CLI: serve a sound card mixer control to WebSocket clients

use anyhow::Context;
use clap::{Parser, ValueEnum};
use mixcast_core::domain::{AppConfig, BackendKind, CurveMethod, VolumeCurve};
use mixcast_infra::mixer::open_device;
use mixcast_infra::server::Server;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "mixcast")]
#[command(about = "Share a hardware mixer's volume and mute over WebSocket", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Configuration file (default: ~/.config/mixcast/config.toml if present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Host name or address to listen on
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// Sound card used for change notifications
    #[arg(long)]
    card: Option<String>,

    /// Mixer device used for get/set
    #[arg(long)]
    device: Option<String>,

    /// Simple mixer control name
    #[arg(long)]
    mixer: Option<String>,

    /// Mixer backend
    #[arg(long)]
    backend: Option<BackendKind>,

    /// Volume curve presented to clients
    #[arg(long, value_enum)]
    curve: Option<CurveArg>,

    /// Exponent of the cube curve
    #[arg(long)]
    exponent: Option<f64>,

    /// Print the resolved configuration as TOML and exit
    #[arg(long)]
    print_config: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CurveArg {
    Cube,
    Linear,
}

impl Cli {
    /// Layer command line flags over the loaded configuration
    fn apply(&self, config: &mut AppConfig) -> anyhow::Result<()> {
        if let Some(host) = &self.host {
            config.server.host = host.clone();
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }

        let mixer = &mut config.mixer;
        if let Some(card) = &self.card {
            mixer.card = card.clone();
        }
        if let Some(device) = &self.device {
            mixer.device = device.clone();
        }
        if let Some(control) = &self.mixer {
            mixer.control = control.clone();
        }
        if let Some(backend) = self.backend {
            mixer.backend = backend;
        }

        let configured_exponent = match mixer.curve.method() {
            CurveMethod::Cube { exponent } => exponent,
            CurveMethod::Linear => VolumeCurve::DEFAULT_EXPONENT,
        };
        mixer.curve = match (self.curve, self.exponent) {
            (Some(CurveArg::Linear), Some(_)) => {
                anyhow::bail!("--exponent only applies to the cube curve")
            }
            (Some(CurveArg::Linear), None) => VolumeCurve::linear(),
            (Some(CurveArg::Cube), exponent) => {
                VolumeCurve::cube(exponent.unwrap_or(configured_exponent))?
            }
            // A bare exponent selects the cube curve
            (None, Some(exponent)) => VolumeCurve::cube(exponent)?,
            (None, None) => mixer.curve,
        };

        Ok(())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let mut config = AppConfig::resolve(cli.config.as_deref())
        .await
        .context("Failed to load configuration")?;
    cli.apply(&mut config)?;
    config.validate().context("Invalid configuration")?;

    if cli.print_config {
        print!("{}", config.to_toml()?);
        return Ok(());
    }

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        backend = ?config.mixer.backend,
        control = %config.mixer.control,
        "mixcast starting"
    );

    let device = open_device(&config.mixer).context("Failed to open mixer")?;
    let server = Server::bind(&config.server, device, config.mixer.curve)
        .await
        .context("Failed to start server")?;

    server.run().await.context("Server stopped")?;
    Ok(())
}
