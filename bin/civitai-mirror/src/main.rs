//! civitai-mirror – entry point.
//!
//! Startup order:
//! 1. Parse the command line and logging configuration.
//! 2. Initialise tracing (JSON when `MIRROR_LOG_JSON` is set).
//! 3. Build the API client and the pipeline, with publishing when configured.
//! 4. Run once; any error is reported as a single line and a non-zero exit.

mod cli;
mod config;

use std::process::ExitCode;

use anyhow::Context;
use civitai_fetch::{Api, DownloadOutcome, MirrorOptions, Pipeline, PublishTarget};
use clap::Parser;
use tracing::{debug, info, warn};

use crate::cli::Cli;
use crate::config::Config;

fn main() -> ExitCode {
    let cli = Cli::parse();
    let cfg = Config::from_env();
    init_tracing(&cfg, &cli);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            debug!(error = ?e, "mirror failed");
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(cfg: &Config, cli: &Cli) {
    let level = cli.default_log_level().unwrap_or(cfg.log_level.as_str());

    // RUST_LOG wins; otherwise the CLI switches, then MIRROR_LOG.
    let env_filter = match tracing_subscriber::EnvFilter::try_from_default_env() {
        Ok(f) => f,
        Err(_) => match level.parse::<tracing_subscriber::EnvFilter>() {
            Ok(f) => f,
            Err(e) => {
                eprintln!(
                    "WARN: MIRROR_LOG='{}' is not a valid tracing filter ({}); \
                     falling back to 'info'",
                    level, e
                );
                tracing_subscriber::EnvFilter::new("info")
            }
        },
    };

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    if cfg.log_json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    let mut api = Api::new().set_host(&cli.host);
    if let Some(key) = &cli.api_key {
        api = api.set_token(key);
    }
    if let Some(proxy) = &cli.proxy {
        api = api.set_proxy(proxy);
    }
    if cli.no_proxy {
        api = api.no_proxy();
    }
    if cli.quiet {
        api = api.no_progress();
    }
    let client = api.build().context("failed to build HTTP client")?;

    let options = MirrorOptions {
        output_dir: cli.output.clone(),
        render_page: !cli.no_html,
        stylesheet: cli.stylesheet.clone(),
    };

    let mut pipeline = Pipeline::new(client.clone(), options);
    if let Some((hf_token, repo_id)) = cli.publish_settings() {
        let uploader = client.hf_uploader(hf_token).set_endpoint(&cli.hf_endpoint);
        pipeline = pipeline.with_publisher(
            uploader,
            PublishTarget {
                repo_id: repo_id.to_string(),
                repo_kind: cli.repo_type,
            },
        );
    }

    let report = pipeline.run(&cli.url)?;

    if let DownloadOutcome::Downloaded { bytes } = report.model_file.outcome {
        info!(path = %report.model_file.path.display(), bytes, "model file saved");
    }
    info!(dir = %report.model_dir.display(), "mirror complete");

    if let Some(publish) = &report.publish {
        for failed in &publish.failed {
            warn!(file = %failed.path.display(), error = %failed.error, "not published");
        }
        info!(
            uploaded = publish.uploaded.len(),
            failed = publish.failed.len(),
            "publish summary"
        );
    }

    Ok(())
}
