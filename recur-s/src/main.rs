use anyhow::Result;
use clap::Parser;
use recur_s::api_server::ApiServer;
use recur_s::util::{self, cmd::Args};
use std::sync::Arc;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    //parse args
    let args = Args::parse();
    util::init_logging();

    let settings = args.load_config()?;
    info!("Starting recurrence predictor with {:?}", settings);

    // no listener is bound unless the artifact loads
    let server_state = match ApiServer::new(&settings.model_path, &settings.static_dir) {
        Ok(state) => Arc::new(state),
        Err(e) => {
            error!("Failed to load model: {:#}", e);
            return Err(e);
        }
    };

    server_state
        .run_api_server(&settings.bind_addr(), util::shutdown_signal())
        .await?;
    info!("Server stopped");
    Ok(())
}
