//! Tributary CLI: run configured streams to completion.

use std::process::ExitCode;

use clap::Parser;
use tracing::info;

use tributary::{CliArgs, Config, StreamPipeline, init_tracing, run_pipelines};

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();

    let args = CliArgs::parse();

    let paths = args.config_paths();
    if paths.is_empty() {
        eprintln!("Error: no config files or directories specified");
        return ExitCode::FAILURE;
    }

    info!("Loading config from {} source(s)", paths.len());

    let config = match Config::from_paths(&paths) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config: {e}");
            return ExitCode::FAILURE;
        }
    };

    info!("Starting tributary with {} stream(s)", config.stream_count());

    for (key, stream) in &config.streams {
        info!(
            "  Stream: {} ({} inputs, join {})",
            key,
            stream.sequence.inputs.len(),
            if stream.sequence.sharded_join.enabled() {
                "on"
            } else {
                "off"
            }
        );
    }

    let result = run_pipelines(&config.metrics, &config.global, "stream", |context| {
        StreamPipeline::from_config(&config, context)
    })
    .await;

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Stream failed: {e}");
            ExitCode::FAILURE
        }
    }
}
