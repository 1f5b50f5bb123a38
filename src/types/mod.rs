mod bitrate;
mod extension;
mod resolution;
mod stream;
mod video;

pub use bitrate::Bitrate;
pub use extension::Extension;
pub use resolution::Resolution;
pub use stream::{Stream, StreamKind};
pub use video::{Playlist, RemoteVideo};
