//! Command line arguments

use std::path::PathBuf;

use clap::Parser;
use tracing::Level;

use crate::config::Config;

/// Object detection HTTP service
#[derive(Parser, Debug)]
#[command(name = "tpu-vision")]
#[command(version)]
#[command(about = "HTTP daemon serving object detections from an OpenVINO model", long_about = None)]
pub struct Cli {
    /// Log only warnings and errors
    #[arg(short, long)]
    pub quiet: bool,

    /// Port number
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Bind address
    #[arg(long)]
    pub host: Option<String>,

    /// Model file
    #[arg(long)]
    pub model: Option<PathBuf>,

    /// Labels file for model
    #[arg(long)]
    pub labels: Option<PathBuf>,

    /// Configuration file
    #[arg(long, default_value = Config::default_path())]
    pub config: String,
}

impl Cli {
    pub fn log_level(&self) -> Level {
        if self.quiet {
            Level::WARN
        } else {
            Level::DEBUG
        }
    }

    /// Overlay command line values on top of the loaded configuration
    pub fn apply(&self, config: &mut Config) {
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(ref host) = self.host {
            config.server.host = host.clone();
        }
        if let Some(ref model) = self.model {
            config.models.model = model.clone();
        }
        if let Some(ref labels) = self.labels {
            config.models.labels = labels.clone();
        }
    }
}
