//! Process glue: arguments, config file, logging, runtime.
use std::path::Path;

use clap::{ArgMatches, CommandFactory, FromArgMatches};
use tracing::info;

use crate::app::{RunSettings, run_probes};
use crate::args::ProbeArgs;
use crate::config::{apply_config, load_config};
use crate::error::AppResult;
use crate::sinks::LineSink;
use crate::system::logger::init_logging;
use crate::system::settings_lines;

/// Parse the command line and run until the process is terminated.
///
/// # Errors
///
/// Returns an error for invalid settings, or when a probe or the report
/// output fails fatally.
pub fn run() -> AppResult<()> {
    let (mut args, matches) = parse_args()?;

    if let Some(config) = load_config(args.config.as_deref())? {
        apply_config(&mut args, &matches, &config)?;
    }

    init_logging(args.verbose, args.no_color);

    let settings = RunSettings::from_args(&args)?;
    for line in settings_lines(&settings) {
        info!("{}", line);
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(run_async(settings))
}

fn parse_args() -> AppResult<(ProbeArgs, ArgMatches)> {
    let matches = ProbeArgs::command().get_matches();
    let args = ProbeArgs::from_arg_matches(&matches)?;
    Ok((args, matches))
}

async fn run_async(settings: RunSettings) -> AppResult<()> {
    match settings.output.as_deref() {
        Some(path) => {
            let sink = LineSink::append(Path::new(path), settings.output_format).await?;
            run_probes(&settings, sink).await
        }
        None => run_probes(&settings, LineSink::stdout(settings.output_format)).await,
    }
}
