use clap::Parser;
use hohostudio::config::setup_logging;
use hohostudio::gemini::{GeminiClient, GeminiConfig};
use tracing::error;

#[tokio::main(flavor = "multi_thread")]
async fn main() {
    let cli = hohostudio::cli::CliOptions::parse();

    if setup_logging(cli.debug).is_err() {
        return;
    }

    if let Err(err) = hohostudio::catalog::init() {
        error!("Failed to load the catalog: {}", err);
        return;
    }

    let config = match GeminiConfig::try_from(&cli.model) {
        Ok(config) => config,
        Err(err) => {
            error!("{}", err);
            return;
        }
    };
    let client = GeminiClient::new(config);

    if let Err(err) = hohostudio::web::setup_server(
        &cli.listen_address,
        cli.port,
        client,
        cli.max_upload_bytes(),
    )
    .await
    {
        error!("Application error: {}", err);
    }
}
