mod cli;
mod io;
mod logging;
mod orchestrator;
mod outside;
mod progress;
mod result;
mod sanitize;
mod selector;
mod settings;
mod types;

use std::io::{BufRead, IsTerminal, Write};

use clap::Parser;
use miette::{miette, Context, IntoDiagnostic, Result};
use time::UtcOffset;
use tracing::{debug, info, warn, Level};

use crate::{
    cli::Args,
    logging::init_logging,
    orchestrator::Orchestrator,
    outside::{Ffmpeg, Ytdl},
    selector::{FixedResolver, SelectionResolver, StreamSelector, TerminalResolver},
    settings::Settings,
};

fn main() -> Result<()> {
    let args = Args::parse();

    // Can only be read reliably while the process is single-threaded
    let local_offset = UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC);

    let level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    init_logging(level, local_offset)?;

    let settings = Settings::load(&args)?;
    debug!("Settings: {settings:?}");
    let preference = settings.preference()?;

    // Make sure the needed directories are created
    std::fs::create_dir_all(&settings.temp_dir)
        .into_diagnostic()
        .wrap_err("Could not create temp directory")?;
    std::fs::create_dir_all(&settings.output_dir)
        .into_diagnostic()
        .wrap_err("Could not create output directory")?;

    let (ytdl, ffmpeg) = load_external_components()?;

    let input = if args.urls.is_empty() {
        read_input_line()?
    } else {
        args.urls.join(",")
    };

    let resolver: Box<dyn SelectionResolver> = match args.choice {
        Some(answer) => Box::new(FixedResolver(answer)),
        None => Box::new(TerminalResolver),
    };
    let selector = StreamSelector::new(settings.auto_select, &preference, resolver.as_ref());
    // In-place status lines only make sense on a console
    let show_progress = std::io::stdout().is_terminal();
    let orchestrator = Orchestrator::new(
        &ytdl,
        &ffmpeg,
        selector,
        &settings,
        local_offset,
        show_progress,
    );

    let summary = orchestrator.process_input(&input);

    info!(
        "All tasks completed: {} merged, {} failed",
        summary.completed, summary.failed
    );
    if summary.failed_playlists > 0 {
        warn!("{} playlists could not be listed", summary.failed_playlists);
    }
    Ok(())
}

/// Load the external components
fn load_external_components() -> Result<(Ytdl, Ffmpeg)> {
    // Construct the handles concurrently as executing an external program
    // is not instantaneous. That way we can avoid adding the costs
    let ytdl_thread = std::thread::spawn(Ytdl::new);
    let ffmpeg_thread = std::thread::spawn(Ffmpeg::new);

    let ytdl = ytdl_thread
        .join()
        .map_err(|_| miette!("Could not join thread"))??;

    // Without ffmpeg the streams can still be downloaded, each merge will then fail
    let ffmpeg = ffmpeg_thread
        .join()
        .map_err(|_| miette!("Could not join thread"))?
        .unwrap_or_else(|err| {
            warn!("ffmpeg is not usable, merging will fail: {err}");
            Ffmpeg
        });

    Ok((ytdl, ffmpeg))
}

/// Prompt for a line of comma-separated URLs
fn read_input_line() -> Result<String> {
    let mut stdout = std::io::stdout().lock();
    writeln!(
        stdout,
        "Enter YouTube video or playlist URLs separated by commas:"
    )
    .into_diagnostic()?;
    stdout.flush().into_diagnostic()?;

    let mut line = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .into_diagnostic()
        .wrap_err("Could not read the URLs from stdin")?;
    Ok(line)
}
