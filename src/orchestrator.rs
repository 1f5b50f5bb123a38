use std::path::{Path, PathBuf};

use time::{OffsetDateTime, UtcOffset};
use tracing::{debug, error, info, warn};

use crate::{
    io::{format_date, output_filename, temp_basename, TempPair},
    outside::{merge_percent, StreamDownloader, StreamTransformer},
    progress::{end_status_line, print_status_line, ProgressTracker},
    result::Result,
    sanitize::sanitize_filename,
    selector::{Selection, StreamSelector},
    settings::Settings,
    types::Stream,
};

/// What happened to one video
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VideoOutcome {
    Merged(PathBuf),
    Failed,
}

/// Counts of processed units of work
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BatchSummary {
    pub completed: usize,
    pub failed: usize,
    /// Playlists that could not be enumerated
    pub failed_playlists: usize,
}

impl BatchSummary {
    fn record(&mut self, outcome: &VideoOutcome) {
        match outcome {
            VideoOutcome::Merged(_) => self.completed += 1,
            VideoOutcome::Failed => self.failed += 1,
        }
    }

    fn add(&mut self, other: BatchSummary) {
        self.completed += other.completed;
        self.failed += other.failed;
        self.failed_playlists += other.failed_playlists;
    }
}

/// Split a line of comma-separated URLs, skipping the empty entries
pub fn split_urls(line: &str) -> impl Iterator<Item = &str> {
    line.split(',').map(str::trim).filter(|url| !url.is_empty())
}

/// Whether the URL should be handled as a playlist.
///
/// This only looks for "playlist" anywhere in the URL, so a single video URL
/// with e.g. a "playlist" query parameter is handled as a playlist too.
pub fn is_playlist_url(url: &str) -> bool {
    url.contains("playlist")
}

/// Runs the download → merge → cleanup sequence, one video at a time
pub struct Orchestrator<'a> {
    downloader: &'a dyn StreamDownloader,
    transformer: &'a dyn StreamTransformer,
    selector: StreamSelector<'a>,
    settings: &'a Settings,
    local_offset: UtcOffset,
    show_progress: bool,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        downloader: &'a dyn StreamDownloader,
        transformer: &'a dyn StreamTransformer,
        selector: StreamSelector<'a>,
        settings: &'a Settings,
        local_offset: UtcOffset,
        show_progress: bool,
    ) -> Self {
        Self {
            downloader,
            transformer,
            selector,
            settings,
            local_offset,
            show_progress,
        }
    }

    /// Process every URL of the input line, in order
    pub fn process_input(&self, line: &str) -> BatchSummary {
        let mut summary = BatchSummary::default();
        for url in split_urls(line) {
            summary.add(self.process_url(url));
        }
        summary
    }

    /// Route the URL to the playlist or the single video processing
    pub fn process_url(&self, url: &str) -> BatchSummary {
        let mut summary = BatchSummary::default();

        if is_playlist_url(url) {
            match self.process_playlist(url) {
                Ok(playlist_summary) => summary.add(playlist_summary),
                Err(err) => {
                    error!("Playlist error: {err}");
                    summary.failed_playlists += 1;
                }
            }
        } else {
            summary.record(&self.process_video(url));
        }

        summary
    }

    /// Process all the videos of a playlist, sequentially.
    ///
    /// A failing video does not stop the others.
    /// Only the playlist enumeration failure is returned.
    pub fn process_playlist(&self, url: &str) -> Result<BatchSummary> {
        let playlist = self
            .downloader
            .get_playlist(url)
            .map_err(|err| err.wrap_err_with(|| format!("Could not list playlist {url}")))?;

        let count = playlist.video_urls.len();
        info!("Playlist: {}", playlist.title);
        info!("Found {count} videos");

        let mut summary = BatchSummary::default();
        for (i, video_url) in playlist.video_urls.iter().enumerate() {
            info!("Downloading {}/{count}: {video_url}", i + 1);
            summary.record(&self.process_video(video_url));
        }

        info!(
            "Playlist '{}' done: {} merged, {} failed",
            playlist.title, summary.completed, summary.failed
        );
        Ok(summary)
    }

    /// Download and merge a single video.
    ///
    /// This is where a video failure is reported. It is never propagated further.
    pub fn process_video(&self, url: &str) -> VideoOutcome {
        match self.download_video(url) {
            Ok(output) => VideoOutcome::Merged(output),
            Err(err) => {
                error!("Error on {url}: {err}");
                VideoOutcome::Failed
            }
        }
    }

    /// Fetch, select, download, merge, then resolve the temporary files.
    ///
    /// The temporary files are resolved whatever happens once the first download starts.
    pub fn download_video(&self, url: &str) -> Result<PathBuf> {
        let video = self.downloader.get_video(url)?;
        let videos = video.video_streams();
        let audio = video.best_audio();

        info!(
            "Channel: {} | Published: {} | Length: {}",
            video.author,
            format_date(video.publish_date)?,
            video.length_hms()
        );
        info!("Title: {}", video.title);

        let selection = self.selector.select(&videos, audio)?;
        info!(
            "Selected {} | Codec: {} | Audio: {}",
            selection
                .video
                .resolution
                .map_or_else(|| "unknown".to_string(), |r| r.to_string()),
            selection.video.codec.as_deref().unwrap_or("unknown"),
            selection
                .audio
                .abr
                .map_or_else(|| "unknown".to_string(), |abr| abr.to_string()),
        );

        let safe_title = sanitize_filename(&video.title);
        let output = self
            .settings
            .output_dir
            .join(output_filename(&video, &safe_title, selection.video)?);

        let now = OffsetDateTime::now_utc().to_offset(self.local_offset);
        let pair = TempPair::new(&self.settings.temp_dir, &temp_basename(now)?);

        let merged = self
            .download_streams(&video.url, &selection, &pair)
            .and_then(|()| self.merge(&pair, &output, video.length));

        let resolved = pair.resolve(
            &self.settings.output_dir,
            &safe_title,
            self.settings.keep_temp_files,
        );

        match (merged, resolved) {
            (Ok(()), Ok(_)) => Ok(output),
            (Err(err), Ok(_)) => Err(err),
            (Ok(()), Err(err)) => Err(err),
            (Err(err), Err(resolve_err)) => {
                warn!("{resolve_err}");
                Err(err)
            }
        }
    }

    /// Download the video stream then the audio stream into the temporary files
    fn download_streams(&self, url: &str, selection: &Selection, pair: &TempPair) -> Result<()> {
        info!("Downloading video stream to {}", pair.video().display());
        self.download_stream(url, selection.video, pair.video())?;

        info!("Downloading audio stream to {}", pair.audio().display());
        self.download_stream(url, selection.audio, pair.audio())?;

        debug!("Temporary files written");
        Ok(())
    }

    fn download_stream(&self, url: &str, stream: &Stream, path: &Path) -> Result<()> {
        // Fresh progress state for every transfer
        let mut tracker = ProgressTracker::start(stream.filesize.unwrap_or(0));
        let show_progress = self.show_progress;

        let res = self.downloader.download_stream(
            url,
            stream,
            path,
            &mut |downloaded, total| {
                if let Some(total) = total {
                    tracker.set_total_if_unknown(total);
                }
                if show_progress {
                    print_status_line(tracker.snapshot(downloaded));
                }
            },
        );

        if show_progress {
            end_status_line();
        }
        res
    }

    fn merge(&self, pair: &TempPair, output: &Path, length: u64) -> Result<()> {
        info!("Merging video and audio...");
        let show_progress = self.show_progress;

        let res = self.transformer.merge(
            pair.video(),
            pair.audio(),
            output,
            &mut |written| {
                if show_progress {
                    print_status_line(format!("Merging: {:.1}%", merge_percent(written, length)));
                }
            },
        );

        if show_progress {
            end_status_line();
        }
        res?;

        info!("Saved: {}", output.display());
        Ok(())
    }
}
