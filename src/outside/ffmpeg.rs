use std::{ffi::OsStr, fmt::Debug, path::Path, time::Duration};

use miette::miette;

use super::command::{assert_success_command, stream_command, FFMPEG, FFXXX_DEFAULT_ARGS};
use crate::result::{Error, Result};

pub trait StreamTransformer: Debug {
    /// Mux the video stream of `video` and the audio stream of `audio` into `output`.
    ///
    /// The video is copied as-is while the audio is re-encoded to AAC.
    /// `on_progress` receives how much of the output has been written so far.
    /// An already existing `output` must not be overwritten.
    fn merge(
        &self,
        video: &Path,
        audio: &Path,
        output: &Path,
        on_progress: &mut dyn FnMut(Duration),
    ) -> Result<()>;
}

/// Interface for the [ffmpeg](https://ffmpeg.org) program
#[derive(Debug)]
pub struct Ffmpeg;

impl Ffmpeg {
    /// Verify that the `ffmpeg` binary is reachable
    pub fn new() -> miette::Result<Self> {
        assert_success_command(FFMPEG, |cmd| cmd.arg("-version"))?;

        Ok(Self)
    }
}

impl StreamTransformer for Ffmpeg {
    fn merge(
        &self,
        video: &Path,
        audio: &Path,
        output: &Path,
        on_progress: &mut dyn FnMut(Duration),
    ) -> Result<()> {
        let res = stream_command(
            FFMPEG,
            |cmd| {
                cmd.args(FFXXX_DEFAULT_ARGS)
                    .arg("-n")
                    .args(["-progress", "pipe:1", "-nostats"])
                    .args([OsStr::new("-i"), video.as_os_str()])
                    .args([OsStr::new("-i"), audio.as_os_str()])
                    .args(["-c:v", "copy"])
                    .args(["-c:a", "aac"])
                    .arg("--")
                    .arg(output)
            },
            |line| {
                if let Some(written) = parse_out_time(line) {
                    on_progress(written);
                }
            },
        )
        .map_err(Error::Merge)?;

        res.check_success(FFMPEG).map_err(Error::Merge)?;

        if output.exists() {
            Ok(())
        } else {
            Err(Error::Merge(miette!(
                "{FFMPEG} did not write the file {}",
                output.display()
            )))
        }
    }
}

/// Parse the `out_time_us` key of the `-progress` output
fn parse_out_time(line: &str) -> Option<Duration> {
    let micros: i64 = line.strip_prefix("out_time_us=")?.trim().parse().ok()?;
    // Negative before the first packet is written
    Some(Duration::from_micros(micros.max(0) as u64))
}

/// Percentage of a media of the given length that has been written
pub fn merge_percent(written: Duration, length_secs: u64) -> f64 {
    if length_secs == 0 {
        return 0.;
    }
    (written.as_secs_f64() / length_secs as f64 * 100.).min(100.)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_out_time_lines() {
        assert_eq!(
            parse_out_time("out_time_us=2500000"),
            Some(Duration::from_millis(2500))
        );
        assert_eq!(parse_out_time("out_time_us=-9223372036854775807"), Some(Duration::ZERO));
        assert_eq!(parse_out_time("out_time_us=N/A"), None);
        assert_eq!(parse_out_time("out_time=00:00:02.500000"), None);
        assert_eq!(parse_out_time("progress=continue"), None);
    }

    #[test]
    fn percent_is_relative_to_length() {
        assert_eq!(merge_percent(Duration::from_secs(30), 120), 25.);
        assert_eq!(merge_percent(Duration::from_secs(130), 120), 100.);
        assert_eq!(merge_percent(Duration::from_secs(30), 0), 0.);
    }
}
