use std::{
    ffi::OsStr,
    path::Path,
    process::{Command, Output},
};

use miette::{miette, Context, IntoDiagnostic};
use serde::Deserialize;
use time::{macros::format_description, Date};
use tracing::debug;

use super::command::{
    assert_success_command, run_command, stream_command, Capture, YT_DL, YT_DLP,
};
use crate::{
    result::{Error, Result},
    types::{Bitrate, Playlist, RemoteVideo, Resolution, Stream, StreamKind},
};

/// Marker prefixing the progress lines printed by the download command
const PROGRESS_MARKER: &str = "tubemux-progress";

/// Interface for fetching video metadata and downloading streams
pub trait StreamDownloader {
    /// Get the metadata and available streams of a single video
    fn get_video(&self, url: &str) -> Result<RemoteVideo>;

    /// Get the playlist title and its member videos URLs, in playlist order
    fn get_playlist(&self, url: &str) -> Result<Playlist>;

    /// Download exactly the given stream of the video to `path`.
    ///
    /// `on_progress` is called with the number of downloaded bytes
    /// and the total size if the transport knows it.
    fn download_stream(
        &self,
        url: &str,
        stream: &Stream,
        path: &Path,
        on_progress: &mut dyn FnMut(u64, Option<u64>),
    ) -> Result<()>;
}

/// Interface for the [yt-dlp](https://github.com/yt-dlp/yt-dlp) program
#[derive(Debug)]
pub struct Ytdl {
    program: &'static str,
}

impl Ytdl {
    /// Verify that the `yt-dlp` or `youtube-dl` binaries are reachable
    pub fn new() -> miette::Result<Self> {
        // Check `yt-dlp`
        if assert_success_command(YT_DLP, |cmd| cmd.arg("--version")).is_ok() {
            Ok(Self { program: YT_DLP })
        } else if assert_success_command(YT_DL, |cmd| cmd.arg("--version")).is_ok() {
            // Check `youtube-dl`
            Ok(Self { program: YT_DL })
        } else {
            Err(miette!("Neither yt-dlp nor youtube-dl found"))
        }
    }

    /// Run the command and check if it failed with saying the stream is unavailable.
    ///
    /// Any failure is a [`Error::MetadataFetch`], otherwise return the output handle.
    fn run_check_availability<F>(&self, f: F, capture: Capture) -> Result<Output>
    where
        F: FnOnce(&mut Command) -> &mut Command,
    {
        let res = run_command(self.program, f, capture | Capture::STDERR)
            .map_err(Error::MetadataFetch)?;

        let stderr = String::from_utf8_lossy(&res.stderr);
        let is_unavailable = stderr
            .lines()
            .any(|line| line.starts_with("ERROR:") && line.to_lowercase().contains("unavailable"));

        if is_unavailable {
            Err(Error::MetadataFetch(miette!("Video is unavailable")))
        } else if !res.status.success() {
            let last_error = stderr.lines().rev().find(|line| line.starts_with("ERROR:"));
            Err(Error::MetadataFetch(miette!(
                "{} did run but was not successful: {}",
                self.program,
                last_error.unwrap_or("no error message")
            )))
        } else {
            Ok(res)
        }
    }
}

impl StreamDownloader for Ytdl {
    fn get_video(&self, url: &str) -> Result<RemoteVideo> {
        let res = self.run_check_availability(
            |cmd| {
                cmd.arg("-q")
                    .arg("--no-warnings")
                    .arg("--skip-download")
                    .arg("-j")
                    .arg("--")
                    .arg(url)
            },
            Capture::STDOUT,
        )?;

        parse_video(url, &String::from_utf8_lossy(&res.stdout)).map_err(Error::MetadataFetch)
    }

    fn get_playlist(&self, url: &str) -> Result<Playlist> {
        let res = self.run_check_availability(
            |cmd| {
                cmd.arg("-q")
                    .arg("--no-warnings")
                    .arg("--flat-playlist")
                    .arg("-J")
                    .arg("--")
                    .arg(url)
            },
            Capture::STDOUT,
        )?;

        parse_playlist(&String::from_utf8_lossy(&res.stdout)).map_err(Error::MetadataFetch)
    }

    fn download_stream(
        &self,
        url: &str,
        stream: &Stream,
        path: &Path,
        on_progress: &mut dyn FnMut(u64, Option<u64>),
    ) -> Result<()> {
        // The output argument is a template, '%' must be escaped
        let output = path.to_string_lossy().replace('%', "%%");
        let template = format!(
            "download:{PROGRESS_MARKER} %(progress.downloaded_bytes)s %(progress.total_bytes)s"
        );

        let res = stream_command(
            self.program,
            |cmd| {
                cmd.arg("-q")
                    .arg("--no-warnings")
                    .arg("--newline")
                    .arg("--progress")
                    .args(["--progress-template", &template])
                    .arg("--no-continue") // Or else fails when file already exists, even an empty one
                    .arg("--no-part") // Write directly to the final path
                    .args(["-f", &stream.format_id])
                    .args([OsStr::new("-o"), OsStr::new(&output)])
                    .arg("--")
                    .arg(url)
            },
            |line| {
                if let Some((downloaded, total)) = parse_progress(line) {
                    on_progress(downloaded, total);
                }
            },
        )
        .map_err(Error::Download)?;

        res.check_success(self.program).map_err(Error::Download)?;

        if !path.exists() {
            return Err(Error::Download(miette!(
                "{} did not write the file {}",
                self.program,
                path.display()
            )));
        }

        debug!("Stream {} written to {}", stream.format_id, path.display());
        Ok(())
    }
}

/// Parse a progress line written with the download progress template
fn parse_progress(line: &str) -> Option<(u64, Option<u64>)> {
    let mut parts = line.strip_prefix(PROGRESS_MARKER)?.split_whitespace();
    let downloaded = parts.next()?.parse().ok()?;
    let total = parts.next().and_then(|total| total.parse().ok());
    Some((downloaded, total))
}

#[derive(Debug, Deserialize)]
struct VideoJson {
    title: String,
    uploader: Option<String>,
    channel: Option<String>,
    upload_date: Option<String>,
    duration: Option<f64>,
    #[serde(default)]
    formats: Vec<FormatJson>,
}

#[derive(Debug, Deserialize)]
struct FormatJson {
    format_id: String,
    ext: String,
    vcodec: Option<String>,
    acodec: Option<String>,
    height: Option<u32>,
    fps: Option<f64>,
    abr: Option<f64>,
    filesize: Option<u64>,
    filesize_approx: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct PlaylistJson {
    title: Option<String>,
    #[serde(default)]
    entries: Vec<EntryJson>,
}

#[derive(Debug, Deserialize)]
struct EntryJson {
    id: Option<String>,
    url: Option<String>,
}

fn parse_video(url: &str, json: &str) -> miette::Result<RemoteVideo> {
    let json: VideoJson = serde_json::from_str(json)
        .into_diagnostic()
        .wrap_err("Could not parse json")?;

    let upload_date = json
        .upload_date
        .as_deref()
        .ok_or_else(|| miette!("Key 'upload_date' not found in JSON"))?;
    let publish_date = parse_upload_date(upload_date)?;

    let author = json
        .uploader
        .or(json.channel)
        .ok_or_else(|| miette!("Key 'uploader' not found in JSON"))?;

    let streams = json.formats.into_iter().filter_map(into_stream).collect();

    Ok(RemoteVideo {
        url: url.to_string(),
        title: json.title,
        author,
        publish_date,
        length: json.duration.map_or(0, |d| d.round() as u64),
        streams,
    })
}

fn parse_upload_date(date: &str) -> miette::Result<Date> {
    Date::parse(date, format_description!("[year][month][day]"))
        .into_diagnostic()
        .wrap_err_with(|| format!("Invalid upload date {date:?}"))
}

/// Convert a format into a stream, skipping the formats without any audio or video track
fn into_stream(format: FormatJson) -> Option<Stream> {
    let has_track = |codec: &Option<String>| codec.as_deref().is_some_and(|c| c != "none");

    let kind = match (has_track(&format.vcodec), has_track(&format.acodec)) {
        (true, false) => StreamKind::VideoOnly,
        (false, true) => StreamKind::AudioOnly,
        (true, true) => StreamKind::Muxed,
        (false, false) => return None,
    };

    let codec = match kind {
        StreamKind::AudioOnly => format.acodec,
        _ => format.vcodec,
    };

    Some(Stream {
        format_id: format.format_id,
        kind,
        ext: format.ext,
        resolution: format.height.map(Resolution::from_height),
        abr: format.abr.map(Bitrate::from_kbps),
        codec,
        fps: format.fps,
        filesize: format
            .filesize
            .or(format.filesize_approx.map(|size| size as u64)),
    })
}

fn parse_playlist(json: &str) -> miette::Result<Playlist> {
    let json: PlaylistJson = serde_json::from_str(json)
        .into_diagnostic()
        .wrap_err("Could not parse json")?;

    let video_urls: Vec<String> = json
        .entries
        .into_iter()
        .filter_map(|entry| match (entry.url, entry.id) {
            (Some(url), _) if url.starts_with("http") => Some(url),
            (_, Some(id)) => Some(format!("https://www.youtube.com/watch?v={id}")),
            (url, None) => url,
        })
        .collect();

    if video_urls.is_empty() {
        return Err(miette!("The playlist is empty"));
    }

    Ok(Playlist {
        title: json.title.unwrap_or_default(),
        video_urls,
    })
}
