use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub model: ModelConfig,
}

#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
pub struct ServerConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub static_dir: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
pub struct ModelConfig {
    pub path: Option<String>,
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;

        toml::from_str(&config_str).with_context(|| "Failed to parse config file")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_partial_config() -> Result<()> {
        let temp_dir = tempdir()?;
        let config_path = temp_dir.path().join("recur.toml");
        fs::write(&config_path, "[server]\nport = 9000\n")?;

        let config = Config::from_file(&config_path)?;
        assert_eq!(config.server.port, Some(9000));
        assert_eq!(config.server.host, None);
        assert_eq!(config.model, ModelConfig::default());
        Ok(())
    }

    #[test]
    fn test_full_config() -> Result<()> {
        let temp_dir = tempdir()?;
        let config_path = temp_dir.path().join("recur.toml");
        fs::write(
            &config_path,
            r#"
[server]
host = "127.0.0.1"
port = 8080
static_dir = "dist"

[model]
path = "artifacts/model.bin"
"#,
        )?;

        let config = Config::from_file(&config_path)?;
        assert_eq!(config.server.host.as_deref(), Some("127.0.0.1"));
        assert_eq!(config.server.static_dir.as_deref(), Some("dist"));
        assert_eq!(config.model.path.as_deref(), Some("artifacts/model.bin"));
        Ok(())
    }

    #[test]
    fn test_bad_config() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("recur.toml");
        fs::write(&config_path, "[server]\nport = \"eighty\"\n").unwrap();
        assert!(Config::from_file(&config_path).is_err());
        assert!(Config::from_file(temp_dir.path().join("missing.toml")).is_err());
    }
}
