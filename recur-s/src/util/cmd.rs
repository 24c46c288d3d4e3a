use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;

use crate::util::config::Config;

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_MODEL_PATH: &str = "artifacts/model.json";
pub const DEFAULT_STATIC_DIR: &str = "static";

#[derive(Parser, Debug, Clone, Default)]
#[command(author, version, about = "Thyroid cancer recurrence prediction server")]
pub struct Args {
    /// TOML config file; explicit flags take precedence over its values.
    #[arg(short('f'), long, env = "RECUR_CONFIG")]
    pub config: Option<String>,

    /// Address to bind the HTTP listener on [default: 0.0.0.0]
    #[arg(long, env = "RECUR_HOST")]
    pub host: Option<String>,

    /// Port to bind the HTTP listener on [default: 8000]
    #[arg(short, long, env = "RECUR_PORT")]
    pub port: Option<u16>,

    /// Exported pipeline artifact (.json or .bin) [default: artifacts/model.json]
    #[arg(long, env = "RECUR_MODEL_PATH")]
    pub model_path: Option<String>,

    /// Front-end bundle served at / [default: static]
    #[arg(long, env = "RECUR_STATIC_DIR")]
    pub static_dir: Option<String>,
}

/// Fully resolved server settings.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub host: String,
    pub port: u16,
    pub model_path: PathBuf,
    pub static_dir: PathBuf,
}

impl Settings {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Args {
    pub fn load_config(&self) -> Result<Settings> {
        let file = match &self.config {
            Some(config_path) => Config::from_file(config_path)
                .with_context(|| format!("Failed to load config from {}", config_path))?,
            None => Config::default(),
        };
        Ok(self.merge(file))
    }

    fn merge(&self, file: Config) -> Settings {
        Settings {
            host: self
                .host
                .clone()
                .or(file.server.host)
                .unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port: self.port.or(file.server.port).unwrap_or(DEFAULT_PORT),
            model_path: self
                .model_path
                .clone()
                .or(file.model.path)
                .unwrap_or_else(|| DEFAULT_MODEL_PATH.to_string())
                .into(),
            static_dir: self
                .static_dir
                .clone()
                .or(file.server.static_dir)
                .unwrap_or_else(|| DEFAULT_STATIC_DIR.to_string())
                .into(),
        }
    }
}
