use anyhow::{Context, Result};
use bincode::config as bincode_config;
use std::fs;
use std::path::Path;
use tracing::debug;

use crate::pipeline::Pipeline;

/// On-disk encodings of an exported pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactFormat {
    Json,
    Bincode,
}

impl ArtifactFormat {
    /// `.bin` is bincode, everything else is read as JSON.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("bin") => ArtifactFormat::Bincode,
            _ => ArtifactFormat::Json,
        }
    }
}

pub fn decode(bytes: &[u8], format: ArtifactFormat) -> Result<Pipeline> {
    match format {
        ArtifactFormat::Json => serde_json::from_slice(bytes).context("invalid JSON pipeline artifact"),
        ArtifactFormat::Bincode => {
            let (pipeline, read) =
                bincode::serde::decode_from_slice(bytes, bincode_config::standard())
                    .context("invalid bincode pipeline artifact")?;
            if read != bytes.len() {
                anyhow::bail!(
                    "trailing data in bincode pipeline artifact ({} of {} bytes used)",
                    read,
                    bytes.len()
                );
            }
            Ok(pipeline)
        }
    }
}

pub fn encode(pipeline: &Pipeline, format: ArtifactFormat) -> Result<Vec<u8>> {
    match format {
        ArtifactFormat::Json => Ok(serde_json::to_vec_pretty(pipeline)?),
        ArtifactFormat::Bincode => Ok(bincode::serde::encode_to_vec(
            pipeline,
            bincode_config::standard(),
        )?),
    }
}

/// Reads, decodes and validates a pipeline artifact.
pub fn load_pipeline(path: impl AsRef<Path>) -> Result<Pipeline> {
    let path = path.as_ref();
    let bytes = fs::read(path)
        .with_context(|| format!("failed to read model artifact {}", path.display()))?;
    let format = ArtifactFormat::from_path(path);
    debug!("Decoding {} byte artifact as {:?}", bytes.len(), format);

    let pipeline = decode(&bytes, format)
        .with_context(|| format!("failed to decode model artifact {}", path.display()))?;
    pipeline
        .validate()
        .with_context(|| format!("model artifact {} failed validation", path.display()))?;
    Ok(pipeline)
}
