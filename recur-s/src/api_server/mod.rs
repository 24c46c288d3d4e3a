pub mod handle_api;
pub mod predict;
pub mod schema;

use anyhow::Result;
use common::{load_pipeline, Model};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

pub struct ApiServer {
    /// Loaded once at startup, shared read-only by every request.
    pub model: Arc<dyn Model>,
    pub static_dir: PathBuf,
}

impl ApiServer {
    /// Loads the pipeline artifact; any failure here is fatal for the process.
    pub fn new(model_path: &Path, static_dir: impl Into<PathBuf>) -> Result<Self> {
        let pipeline = load_pipeline(model_path)?;
        info!(
            "Loaded model '{}' v{} from {} ({} input columns, {} features)",
            pipeline.name,
            pipeline.version,
            model_path.display(),
            pipeline.feature_columns.len(),
            pipeline.n_features_out()
        );
        Ok(Self::with_model(Arc::new(pipeline), static_dir))
    }

    pub fn with_model(model: Arc<dyn Model>, static_dir: impl Into<PathBuf>) -> Self {
        ApiServer {
            model,
            static_dir: static_dir.into(),
        }
    }
}
