use std::cmp::Ordering;

use time::Date;

use super::{Extension, Stream, StreamKind};

/// Metadata of a single video, fetched fresh for each run
#[derive(Debug, Clone)]
pub struct RemoteVideo {
    pub url: String,
    pub title: String,
    pub author: String,
    pub publish_date: Date,
    /// Duration in seconds
    pub length: u64,
    pub streams: Vec<Stream>,
}

impl RemoteVideo {
    /// The video-only MP4 streams with a known resolution, highest resolution first.
    ///
    /// Streams of equal resolution come in reverse provider order, so the later
    /// (better) formats listed by the provider are preferred.
    pub fn video_streams(&self) -> Vec<&Stream> {
        let mut streams: Vec<&Stream> = self
            .streams
            .iter()
            .filter(|s| s.kind == StreamKind::VideoOnly && s.has_extension(Extension::Mp4))
            .filter(|s| s.resolution.is_some())
            .collect();
        streams.sort_by_key(|s| s.resolution);
        streams.reverse();
        streams
    }

    /// The audio-only M4A stream with the highest average bitrate.
    ///
    /// On equal bitrates, the first one in provider order wins.
    pub fn best_audio(&self) -> Option<&Stream> {
        self.streams
            .iter()
            .filter(|s| s.kind == StreamKind::AudioOnly && s.has_extension(Extension::M4a))
            .fold(None, |best: Option<&Stream>, s| match best {
                Some(b) if b.abr.partial_cmp(&s.abr) != Some(Ordering::Less) => Some(b),
                _ => Some(s),
            })
    }

    /// The length formatted as "HH:MM:SS"
    pub fn length_hms(&self) -> String {
        let (h, m, s) = (self.length / 3600, self.length / 60 % 60, self.length % 60);
        format!("{h:02}:{m:02}:{s:02}")
    }
}

#[derive(Debug, Clone)]
pub struct Playlist {
    pub title: String,
    pub video_urls: Vec<String>,
}
