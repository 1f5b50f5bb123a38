use std::fmt::Display;

use miette::miette;

/// Errors of a single unit of work (one video or one playlist).
///
/// The variants carrying a report keep the full context chain of what went wrong.
#[derive(Debug)]
pub enum Error {
    /// Network or parsing error while retrieving video or playlist info
    MetadataFetch(miette::Report),

    /// Filtering the streams produced an empty set
    NoStreamsAvailable,

    /// The manual selection was not a valid index
    InvalidSelection(String),

    /// Transport error while downloading a stream
    Download(miette::Report),

    /// The muxing subprocess failed or could not be started
    Merge(miette::Report),

    /// Could not rename or delete a temporary file
    FileOp(miette::Report),

    Miette(miette::Report),
}

impl From<miette::Report> for Error {
    fn from(err: miette::Report) -> Self {
        Error::Miette(err)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Miette(miette!(err))
    }
}

impl From<Error> for miette::Report {
    fn from(err: Error) -> Self {
        match err {
            Error::MetadataFetch(err) => err.wrap_err("Could not fetch metadata"),
            Error::NoStreamsAvailable => miette!("No suitable streams found"),
            Error::InvalidSelection(answer) => miette!("Invalid stream selection: {answer:?}"),
            Error::Download(err) => err.wrap_err("Download failed"),
            Error::Merge(err) => err.wrap_err("Merge failed"),
            Error::FileOp(err) => err.wrap_err("Could not handle temporary files"),
            Error::Miette(err) => err,
        }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (prefix, report) = match self {
            Error::MetadataFetch(report) => ("Could not fetch metadata", report),
            Error::NoStreamsAvailable => return write!(f, "No suitable streams found"),
            Error::InvalidSelection(answer) => {
                return write!(f, "Invalid stream selection: {answer:?}")
            }
            Error::Download(report) => ("Download failed", report),
            Error::Merge(report) => ("Merge failed", report),
            Error::FileOp(report) => ("Could not handle temporary files", report),
            Error::Miette(report) => return write_chain(f, report),
        };

        write!(f, "{prefix}: ")?;
        write_chain(f, report)
    }
}

/// Write every message of the report chain on a single line
fn write_chain(f: &mut std::fmt::Formatter<'_>, report: &miette::Report) -> std::fmt::Result {
    for (i, cause) in report.chain().enumerate() {
        if i > 0 {
            write!(f, ": ")?;
        }
        write!(f, "{cause}")?;
    }
    Ok(())
}

impl Error {
    pub fn wrap_err_with<D, F>(self, f: F) -> Error
    where
        D: Display + Send + Sync + 'static,
        F: FnOnce() -> D,
    {
        match self {
            Error::MetadataFetch(report) => Error::MetadataFetch(report.wrap_err(f())),
            Error::Download(report) => Error::Download(report.wrap_err(f())),
            Error::Merge(report) => Error::Merge(report.wrap_err(f())),
            Error::FileOp(report) => Error::FileOp(report.wrap_err(f())),
            Error::Miette(report) => Error::Miette(report.wrap_err(f())),
            err => err,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use miette::{miette, Context, IntoDiagnostic};

    use super::*;

    #[test]
    fn display_flattens_the_report_chain() {
        let io = std::fs::read("/definitely/not/here")
            .into_diagnostic()
            .wrap_err("Could not read file");
        let err = Error::Download(io.unwrap_err());

        let msg = err.to_string();
        assert!(msg.starts_with("Download failed: Could not read file: "));
    }

    #[test]
    fn wrap_err_keeps_the_error_kind() {
        let err = Error::Merge(miette!("exit status 1")).wrap_err_with(|| "ffmpeg");
        assert!(matches!(err, Error::Merge(_)));
        assert_eq!(err.to_string(), "Merge failed: ffmpeg: exit status 1");

        let err = Error::NoStreamsAvailable.wrap_err_with(|| "ignored");
        assert!(matches!(err, Error::NoStreamsAvailable));
    }
}
