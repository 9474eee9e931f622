//! Bluetooth-serial Bridge Host
//!
//! Serves the bridge protocol over TCP so emulator clients can reach real
//! serial ports (RFCOMM links, USB-serial adapters) or a built-in echo device.

mod backend;
mod error;
mod scanner;
mod server;
mod session;
mod settings;

use std::path::PathBuf;

use anyhow::Context;
use backend::Backend;
use clap::Parser;
use settings::{BackendKind, HostSettings};
use tokio::net::TcpListener;

#[derive(Parser, Debug)]
#[command(name = "btserial-host")]
#[command(about = "Bridge host for the Bluetooth-serial emulator", long_about = None)]
#[command(version)]
struct Cli {
    /// Address to listen on (host:port)
    #[arg(short, long)]
    listen: Option<String>,

    /// Baud rate for serial ports
    #[arg(short, long)]
    baud: Option<u32>,

    /// Serve the built-in echo device instead of serial ports
    #[arg(long)]
    echo: bool,

    /// Settings file (defaults to $XDG_CONFIG_HOME/btserial/host.json)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Write the effective settings to the settings file and exit
    #[arg(long)]
    save: bool,
}

impl Cli {
    /// Load settings and apply command-line overrides
    fn settings(&self) -> anyhow::Result<HostSettings> {
        let mut settings = match &self.config {
            Some(path) => HostSettings::load_from(path)?,
            None => HostSettings::load(),
        };

        if let Some(listen) = &self.listen {
            settings.listen = listen.clone();
        }
        if let Some(baud) = self.baud {
            settings.baud_rate = baud;
        }
        if self.echo {
            settings.backend = BackendKind::Echo;
        }
        Ok(settings)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "btserial_host=info,btserial_emu=info,btserial_protocol=info".into()
            }),
        )
        .init();

    let cli = Cli::parse();
    let settings = cli.settings()?;

    if cli.save {
        let path = cli
            .config
            .clone()
            .or_else(HostSettings::default_path)
            .context("could not determine settings path")?;
        settings.save_to(&path)?;
        tracing::info!("Saved settings to {}", path.display());
        return Ok(());
    }

    tracing::info!("Starting btserial bridge host");

    let listener = TcpListener::bind(&settings.listen)
        .await
        .with_context(|| format!("failed to listen on {}", settings.listen))?;
    let backend = Backend::from_settings(&settings);

    tokio::select! {
        result = server::serve(listener, backend) => result?,
        _ = tokio::signal::ctrl_c() => tracing::info!("Interrupted, shutting down"),
    }

    Ok(())
}
