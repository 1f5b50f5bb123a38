use std::path::{Path, PathBuf};

use miette::{Context, IntoDiagnostic};
use time::{macros::format_description, Date, OffsetDateTime};
use tracing::{debug, info};

use crate::{
    result::{Error, Result},
    sanitize::sanitize_filename,
    types::{Extension, RemoteVideo, Stream},
};

/// Base name of the temporary files, e.g. "2024-03-05 - 14;07;59 Temp"
pub fn temp_basename(now: OffsetDateTime) -> Result<String> {
    let stamp = now
        .format(format_description!("[year]-[month]-[day] - [hour];[minute];[second]"))
        .into_diagnostic()?;
    Ok(format!("{stamp} Temp"))
}

pub fn format_date(date: Date) -> Result<String> {
    Ok(date.format(format_description!("[year]-[month]-[day]")).into_diagnostic()?)
}

/// Name of the merged file:
/// "YYYY-MM-DD, <sanitized author>, <sanitized title> (<resolution> <codec>).mp4"
pub fn output_filename(video: &RemoteVideo, safe_title: &str, selected: &Stream) -> Result<String> {
    let resolution = selected
        .resolution
        .map_or_else(|| "unknown".to_string(), |r| r.to_string());
    let codec = selected.codec_prefix().unwrap_or("unknown");

    Ok(format!(
        "{}, {}, {safe_title} ({resolution} {codec}){}",
        format_date(video.publish_date)?,
        sanitize_filename(&video.author),
        Extension::Mp4.with_dot()
    ))
}

/// Move a file, falling back to copying when a rename is not possible
/// (e.g. across file systems)
fn move_file(from: &Path, to: &Path) -> std::io::Result<()> {
    if std::fs::rename(from, to).is_err() {
        debug!("Moving file failed, falling back to copying");
        std::fs::copy(from, to)?;
        std::fs::remove_file(from)?;
    }
    Ok(())
}

/// The temporary video and audio files of one video.
///
/// The pair must be consumed with [`TempPair::resolve`]. If it is dropped before that,
/// the files are removed.
#[derive(Debug)]
pub struct TempPair {
    video: PathBuf,
    audio: PathBuf,
    resolved: bool,
}

impl TempPair {
    pub fn new(temp_dir: &Path, basename: &str) -> Self {
        Self {
            video: temp_dir.join(format!("{basename}{}", Extension::Mp4.with_dot())),
            audio: temp_dir.join(format!("{basename}{}", Extension::M4a.with_dot())),
            resolved: false,
        }
    }

    pub fn video(&self) -> &Path {
        &self.video
    }

    pub fn audio(&self) -> &Path {
        &self.audio
    }

    /// Partial files the downloader may leave next to an interrupted transfer
    fn leftovers(&self) -> Vec<PathBuf> {
        let mut leftovers = Vec::new();
        for path in [&self.video, &self.audio] {
            for suffix in [".part", ".ytdl"] {
                let mut name = path.as_os_str().to_owned();
                name.push(suffix);
                leftovers.push(PathBuf::from(name));
            }
        }
        leftovers
    }

    /// Either keep the temporary files, renamed to `<out_dir>/<safe_title>.<ext>`,
    /// or delete them.
    ///
    /// Files that do not exist are skipped. Both files are always handled,
    /// the first failure is returned. Partial downloads are never kept.
    /// Return the paths of the kept files.
    pub fn resolve(mut self, out_dir: &Path, safe_title: &str, keep: bool) -> Result<Vec<PathBuf>> {
        self.resolved = true;

        let mut kept = Vec::new();
        let mut first_err = None;

        for path in [&self.video, &self.audio] {
            if !path.exists() {
                continue;
            }

            let res = if keep {
                let ext = Extension::from_path(path).map_or("", |ext| ext.with_dot());
                let target = out_dir.join(format!("{safe_title}{ext}"));

                move_file(path, &target)
                    .into_diagnostic()
                    .wrap_err_with(|| {
                        format!("Could not rename {} to {}", path.display(), target.display())
                    })
                    .map(|()| {
                        info!("Renamed temporary file to: {}", target.display());
                        kept.push(target);
                    })
            } else {
                std::fs::remove_file(path)
                    .into_diagnostic()
                    .wrap_err_with(|| format!("Could not delete {}", path.display()))
                    .map(|()| debug!("Deleted temporary file {}", path.display()))
            };

            if let Err(report) = res {
                first_err.get_or_insert(Error::FileOp(report));
            }
        }

        for path in self.leftovers() {
            if !path.exists() {
                continue;
            }
            let res = std::fs::remove_file(&path)
                .into_diagnostic()
                .wrap_err_with(|| format!("Could not delete {}", path.display()));
            match res {
                Ok(()) => debug!("Deleted partial file {}", path.display()),
                Err(report) => {
                    first_err.get_or_insert(Error::FileOp(report));
                }
            }
        }

        match first_err {
            Some(err) => Err(err),
            None => Ok(kept),
        }
    }
}

impl Drop for TempPair {
    fn drop(&mut self) {
        if !self.resolved {
            for path in [&self.video, &self.audio].into_iter().chain(&self.leftovers()) {
                if path.exists() {
                    debug!("Removing unresolved temporary file {}", path.display());
                    let _ = std::fs::remove_file(path);
                }
            }
        }
    }
}
