use std::path::PathBuf;

use clap::Parser;

use crate::selector::MANUAL_HELP;

macro_rules! arg_env {
    ($v:literal) => {
        concat!("TUBEMUX_", $v)
    };
}

/// Wrapper-tool around `yt-dlp` and `ffmpeg` to download web videos or playlists.
/// Pick the video stream matching a preferred resolution and codec, download it along
/// with the best audio stream and merge both into a single file.
#[derive(Parser, Debug)]
#[command(version)]
pub struct Args {
    /// The video or playlist URLs, separated by commas or spaces.
    ///
    /// When none is given, a comma-separated line of URLs is read from stdin.
    /// URLs containing "playlist" are handled as playlists.
    pub urls: Vec<String>,

    /// Path to a TOML configuration file.
    /// Command-line options take precedence over its values
    #[arg(long, env = arg_env!("CONFIG"))]
    pub config: Option<PathBuf>,

    /// Keep the downloaded video and audio files next to the merged file
    #[arg(long, env = arg_env!("KEEP_TEMP_FILES"))]
    pub keep_temp_files: bool,

    /// Choose the video stream manually
    #[arg(long, long_help = MANUAL_HELP, env = arg_env!("MANUAL"))]
    pub manual: bool,

    /// Answer given to the manual selection instead of asking on the terminal,
    /// e.g. "1" to always take the highest resolution
    #[arg(long, env = arg_env!("CHOICE"))]
    pub choice: Option<String>,

    /// The preferred video resolution, e.g. "1080p"
    #[arg(long, env = arg_env!("RESOLUTION"))]
    pub resolution: Option<String>,

    /// The preferred video codec family, e.g. "av01", "vp09" or "avc1"
    #[arg(long, env = arg_env!("CODEC"))]
    pub codec: Option<String>,

    /// Where the streams are downloaded before being merged
    #[arg(long, env = arg_env!("TEMP_DIR"))]
    pub temp_dir: Option<PathBuf>,

    /// Where the merged files are written
    #[arg(long, env = arg_env!("OUTPUT_DIR"))]
    pub output_dir: Option<PathBuf>,

    /// Log the external commands and their output
    #[arg(short, long, env = arg_env!("VERBOSE"))]
    pub verbose: bool,
}
