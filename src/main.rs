//! Showroom - interactive glTF viewer with studio lighting and bloom.
//!
//! Shows one model at a time from a configured catalog, lets the user swap
//! models and tune lights and bloom from a control panel, and releases every
//! GPU resource when a model is replaced or the window closes.

mod app;
mod assets;
mod config;
mod render;
mod scene;
mod ui;
mod viewer;

use clap::Parser;
use config::ViewerConfig;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(name = "showroom", version, about)]
struct Args {
    /// JSON config file; defaults are used when it does not exist.
    #[arg(long, default_value = "showroom.json")]
    config: PathBuf,

    /// Catalog model to show first, overriding the config.
    #[arg(long)]
    model: Option<String>,

    /// Render without a window and print the resource ledger.
    #[arg(long)]
    headless: bool,

    /// Frames to render in headless mode.
    #[arg(long, default_value_t = 3)]
    frames: u64,

    /// Write the effective config to the config path and exit.
    #[arg(long)]
    write_config: bool,
}

fn load_config(args: &Args) -> Result<ViewerConfig, config::ConfigError> {
    let mut config = ViewerConfig::load_or_default(&args.config)?;
    if let Some(model) = &args.model {
        config.default_model = model.clone();
        config.validate()?;
    }
    Ok(config)
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let args = Args::parse();
    let config = match load_config(&args) {
        Ok(config) => config,
        Err(err) => {
            log::error!("{}", err);
            return ExitCode::FAILURE;
        }
    };

    if args.write_config {
        return match config.save(&args.config) {
            Ok(()) => {
                log::info!("Wrote config to {}", args.config.display());
                ExitCode::SUCCESS
            }
            Err(err) => {
                log::error!("{}", err);
                ExitCode::FAILURE
            }
        };
    }

    let result = if args.headless {
        app::run_headless(config, args.frames)
    } else {
        app::run(config)
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("{}", err);
            ExitCode::FAILURE
        }
    }
}
