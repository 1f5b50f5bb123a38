use super::{Bitrate, Extension, Resolution};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    VideoOnly,
    AudioOnly,
    /// Progressive stream holding both tracks. Never selected.
    Muxed,
}

/// One downloadable track of a remote video.
///
/// Streams are read-only descriptors: they are only filtered, sorted and selected.
#[derive(Debug, Clone, PartialEq)]
pub struct Stream {
    /// Identifier used to ask the transport for this exact stream
    pub format_id: String,
    pub kind: StreamKind,
    /// Container file extension, without the dot
    pub ext: String,
    pub resolution: Option<Resolution>,
    pub abr: Option<Bitrate>,
    /// Full codec identifier, e.g. "av01.0.08M.08"
    pub codec: Option<String>,
    pub fps: Option<f64>,
    /// Size in bytes, when the provider knows it
    pub filesize: Option<u64>,
}

impl Stream {
    /// The codec family, i.e. the codec identifier up to the first `.`
    pub fn codec_prefix(&self) -> Option<&str> {
        self.codec
            .as_deref()
            .map(|codec| codec.split('.').next().unwrap_or(codec))
    }

    pub fn has_extension(&self, extension: Extension) -> bool {
        self.ext == extension.with_no_dot()
    }

    pub fn size_mb(&self) -> Option<f64> {
        self.filesize.map(|size| size as f64 / 1024. / 1024.)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn video(codec: Option<&str>) -> Stream {
        Stream {
            format_id: "399".into(),
            kind: StreamKind::VideoOnly,
            ext: "mp4".into(),
            resolution: Some(Resolution::from_height(1080)),
            abr: None,
            codec: codec.map(String::from),
            fps: Some(30.),
            filesize: Some(3 * 1024 * 1024),
        }
    }

    #[test]
    fn codec_prefix_stops_at_first_dot() {
        assert_eq!(video(Some("av01.0.08M.08")).codec_prefix(), Some("av01"));
        assert_eq!(video(Some("vp9")).codec_prefix(), Some("vp9"));
        assert_eq!(video(None).codec_prefix(), None);
    }

    #[test]
    fn size_and_extension() {
        let stream = video(None);
        assert_eq!(stream.size_mb(), Some(3.));
        assert!(stream.has_extension(Extension::Mp4));
        assert!(!stream.has_extension(Extension::M4a));
    }
}
