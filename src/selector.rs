use std::io::{BufRead, Write};

use indoc::indoc;
use miette::{Context, IntoDiagnostic};

use crate::{
    result::{Error, Result},
    types::{Resolution, Stream},
};

/// The wanted video stream characteristics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Preference {
    pub resolution: Resolution,
    /// Codec family, compared against [`Stream::codec_prefix`]
    pub codec: String,
}

/// Capability to let someone pick a video stream when auto-selection is disabled.
///
/// The resolver only returns the raw answer, the validation of the answer is
/// done by the [`StreamSelector`].
pub trait SelectionResolver {
    fn resolve(&self, streams: &[&Stream]) -> Result<String>;
}

/// Ask the user on the terminal
#[derive(Debug, Default)]
pub struct TerminalResolver;

impl SelectionResolver for TerminalResolver {
    fn resolve(&self, streams: &[&Stream]) -> Result<String> {
        let mut stdout = std::io::stdout().lock();
        writeln!(stdout, "\nNo matching default found. Please choose manually:")?;
        for line in listing(streams) {
            writeln!(stdout, "{line}")?;
        }
        write!(stdout, "Enter the number of your preferred stream: ")?;
        stdout.flush()?;

        let mut answer = String::new();
        std::io::stdin()
            .lock()
            .read_line(&mut answer)
            .into_diagnostic()
            .wrap_err("Could not read the selection")?;
        Ok(answer)
    }
}

/// Always give the same pre-recorded answer
#[derive(Debug, Clone)]
pub struct FixedResolver(pub String);

impl SelectionResolver for FixedResolver {
    fn resolve(&self, _streams: &[&Stream]) -> Result<String> {
        Ok(self.0.clone())
    }
}

/// Format the candidate streams as a numbered list, starting at 1
pub fn listing(streams: &[&Stream]) -> Vec<String> {
    streams
        .iter()
        .enumerate()
        .map(|(i, stream)| {
            let resolution = stream
                .resolution
                .map_or_else(|| "?".to_string(), |r| r.to_string());
            let fps = stream.fps.map_or_else(|| "?".to_string(), |fps| fps.to_string());
            let size = stream
                .size_mb()
                .map_or_else(|| "?".to_string(), |mb| format!("{mb:.2}"));
            format!(
                "{}. {resolution} ({fps}fps) | Codec: {} | Size: {size} MB",
                i + 1,
                stream.codec.as_deref().unwrap_or("Unknown"),
            )
        })
        .collect()
}

/// The video/audio stream pair to download
#[derive(Debug, Clone, Copy)]
pub struct Selection<'a> {
    pub video: &'a Stream,
    pub audio: &'a Stream,
}

/// Picks which streams to download.
///
/// When `auto_select` is set, the [`Preference`] is applied with a tiered fallback:
/// 1. same resolution and same codec family,
/// 2. same resolution, any codec,
/// 3. the highest resolution.
///
/// Otherwise, the [`SelectionResolver`] is asked for a 1-based index.
pub struct StreamSelector<'a> {
    auto_select: bool,
    preference: &'a Preference,
    resolver: &'a dyn SelectionResolver,
}

impl<'a> StreamSelector<'a> {
    pub fn new(
        auto_select: bool,
        preference: &'a Preference,
        resolver: &'a dyn SelectionResolver,
    ) -> Self {
        Self {
            auto_select,
            preference,
            resolver,
        }
    }

    /// Select the video stream among `videos` (sorted by descending resolution)
    /// and pair it with the `audio` stream.
    pub fn select<'s>(
        &self,
        videos: &[&'s Stream],
        audio: Option<&'s Stream>,
    ) -> Result<Selection<'s>> {
        let audio = audio.ok_or(Error::NoStreamsAvailable)?;
        if videos.is_empty() {
            return Err(Error::NoStreamsAvailable);
        }

        let video = if self.auto_select {
            self.auto_pick(videos)
        } else {
            let answer = self.resolver.resolve(videos)?;
            pick_by_index(videos, &answer)?
        };

        Ok(Selection { video, audio })
    }

    fn auto_pick<'s>(&self, videos: &[&'s Stream]) -> &'s Stream {
        let wanted = Some(self.preference.resolution);
        let codec = self.preference.codec.as_str();

        videos
            .iter()
            .find(|s| s.resolution == wanted && s.codec_prefix() == Some(codec))
            .or_else(|| videos.iter().find(|s| s.resolution == wanted))
            .copied()
            .unwrap_or(videos[0])
    }
}

/// Return the stream at the given 1-based index
fn pick_by_index<'s>(videos: &[&'s Stream], answer: &str) -> Result<&'s Stream> {
    let invalid = || Error::InvalidSelection(answer.trim().to_string());

    let idx: usize = answer.trim().parse().map_err(|_| invalid())?;
    idx.checked_sub(1)
        .and_then(|i| videos.get(i))
        .copied()
        .ok_or_else(invalid)
}

/// Help shown for the manual mode in the CLI
pub const MANUAL_HELP: &str = indoc! {"
    Choose the video stream manually instead of applying the preferred resolution and codec.
    The available streams are listed with their index, resolution, frame rate, codec and size,
    and the number of the wanted stream is read from the terminal."
};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Bitrate, RemoteVideo, StreamKind};

    fn video(id: &str, height: u32, codec: &str) -> Stream {
        Stream {
            format_id: id.into(),
            kind: StreamKind::VideoOnly,
            ext: "mp4".into(),
            resolution: Some(Resolution::from_height(height)),
            abr: None,
            codec: Some(codec.into()),
            fps: Some(30.),
            filesize: Some(1024 * 1024),
        }
    }

    fn audio() -> Stream {
        Stream {
            format_id: "140".into(),
            kind: StreamKind::AudioOnly,
            ext: "m4a".into(),
            resolution: None,
            abr: Some(Bitrate::from_kbps(129.5)),
            codec: Some("mp4a.40.2".into()),
            fps: None,
            filesize: None,
        }
    }

    fn catalog() -> Vec<Stream> {
        vec![
            video("401", 2160, "av01.0.12M.08"),
            video("137", 1080, "avc1.640028"),
            video("399", 1080, "av01.0.08M.08"),
            video("136", 720, "avc1.4d401f"),
            video("398", 720, "av01.0.05M.08"),
        ]
    }

    fn preference(resolution: u32, codec: &str) -> Preference {
        Preference {
            resolution: Resolution::from_height(resolution),
            codec: codec.into(),
        }
    }

    fn auto_select(streams: &[Stream], pref: &Preference) -> Result<String> {
        let audio = audio();
        let videos: Vec<&Stream> = streams.iter().collect();
        let resolver = FixedResolver(String::new());
        let selector = StreamSelector::new(true, pref, &resolver);
        let selection = selector.select(&videos, Some(&audio))?;
        Ok(selection.video.format_id.clone())
    }

    fn manual_select(streams: &[Stream], answer: &str) -> Result<String> {
        let audio = audio();
        let videos: Vec<&Stream> = streams.iter().collect();
        let resolver = FixedResolver(answer.into());
        let pref = preference(1080, "av01");
        let selector = StreamSelector::new(false, &pref, &resolver);
        let selection = selector.select(&videos, Some(&audio))?;
        Ok(selection.video.format_id.clone())
    }

    #[test]
    fn auto_matches_resolution_and_codec() {
        let streams = catalog();
        assert_eq!(auto_select(&streams, &preference(1080, "av01")).unwrap(), "399");
        assert_eq!(auto_select(&streams, &preference(1080, "avc1")).unwrap(), "137");
        assert_eq!(auto_select(&streams, &preference(720, "av01")).unwrap(), "398");
    }

    #[test]
    fn auto_falls_back_to_resolution_only() {
        let streams = catalog();
        assert_eq!(auto_select(&streams, &preference(1080, "vp09")).unwrap(), "137");
        assert_eq!(auto_select(&streams, &preference(2160, "avc1")).unwrap(), "401");
    }

    #[test]
    fn auto_falls_back_to_highest_resolution() {
        let streams = catalog();
        assert_eq!(auto_select(&streams, &preference(1440, "av01")).unwrap(), "401");
        assert_eq!(auto_select(&streams[1..], &preference(480, "avc1")).unwrap(), "137");
    }

    #[test]
    fn auto_fallbacks_prefer_the_last_listed_of_equal_resolutions() {
        // Provider order, worst format first
        let video = RemoteVideo {
            url: "https://www.youtube.com/watch?v=abc".into(),
            title: "Title".into(),
            author: "Author".into(),
            publish_date: time::macros::date!(2024 - 03 - 05),
            length: 60,
            streams: vec![
                video("136", 720, "avc1.4d401f"),
                video("398", 720, "av01.0.05M.08"),
                video("137", 1080, "avc1.640028"),
                video("399", 1080, "av01.0.08M.08"),
            ],
        };
        let videos = video.video_streams();

        let pick = |pref: &Preference| {
            let resolver = FixedResolver(String::new());
            let selector = StreamSelector::new(true, pref, &resolver);
            let audio = audio();
            let id = selector.select(&videos, Some(&audio)).unwrap().video.format_id.clone();
            id
        };

        // Resolution only
        assert_eq!(pick(&preference(1080, "vp09")), "399");
        assert_eq!(pick(&preference(720, "vp09")), "398");
        // Highest resolution
        assert_eq!(pick(&preference(1440, "vp09")), "399");
    }

    #[test]
    fn auto_ignores_streams_without_codec_on_first_tier() {
        let mut streams = catalog();
        streams[1].codec = None;
        assert_eq!(auto_select(&streams, &preference(1080, "vp9")).unwrap(), "137");
    }

    #[test]
    fn manual_returns_the_stream_at_index() {
        let streams = catalog();
        for (k, stream) in streams.iter().enumerate() {
            let answer = (k + 1).to_string();
            assert_eq!(manual_select(&streams, &answer).unwrap(), stream.format_id);
        }
        assert_eq!(manual_select(&streams, " 2\n").unwrap(), "137");
    }

    #[test]
    fn manual_rejects_invalid_indexes() {
        let streams = catalog();
        for answer in ["0", "6", "-1", "two", "", "1.5"] {
            let err = manual_select(&streams, answer).unwrap_err();
            assert!(
                matches!(err, Error::InvalidSelection(_)),
                "{answer:?} gave {err:?}"
            );
        }
    }

    #[test]
    fn fails_without_streams() {
        let pref = preference(1080, "av01");
        let resolver = FixedResolver("1".into());
        let selector = StreamSelector::new(true, &pref, &resolver);

        let audio = audio();
        let err = selector.select(&[], Some(&audio)).unwrap_err();
        assert!(matches!(err, Error::NoStreamsAvailable));

        let streams = catalog();
        let videos: Vec<&Stream> = streams.iter().collect();
        let err = selector.select(&videos, None).unwrap_err();
        assert!(matches!(err, Error::NoStreamsAvailable));
    }

    #[test]
    fn listing_shows_index_resolution_fps_codec_and_size() {
        let streams = catalog();
        let videos: Vec<&Stream> = streams.iter().collect();
        let lines = listing(&videos);

        assert_eq!(lines.len(), 5);
        assert_eq!(
            lines[0],
            "1. 2160p (30fps) | Codec: av01.0.12M.08 | Size: 1.00 MB"
        );
    }
}
