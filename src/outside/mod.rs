mod command;
mod ffmpeg;
mod ytdl;

pub use ffmpeg::{merge_percent, Ffmpeg, StreamTransformer};
pub use ytdl::{StreamDownloader, Ytdl};
