use std::path::{Path, PathBuf};

use config::{Config, File, FileFormat};
use miette::{Context, IntoDiagnostic, Result};
use serde::Deserialize;

use crate::{cli::Args, selector::Preference, types::Resolution};

/// User settings, resolved once before any download starts
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Settings {
    /// Keep the downloaded streams after the merge instead of deleting them
    pub keep_temp_files: bool,
    /// Apply the preferred resolution and codec instead of asking
    pub auto_select: bool,
    pub resolution: String,
    pub codec: String,
    pub temp_dir: PathBuf,
    pub output_dir: PathBuf,
}

impl Settings {
    /// Layer the built-in defaults, the optional configuration file and the CLI arguments
    pub fn load(args: &Args) -> Result<Self> {
        let path_value = |p: &Path| p.to_string_lossy().into_owned();

        let mut builder = Config::builder()
            .set_default("keep_temp_files", false)
            .and_then(|b| b.set_default("auto_select", true))
            .and_then(|b| b.set_default("resolution", "1080p"))
            .and_then(|b| b.set_default("codec", "av01"))
            .and_then(|b| b.set_default("temp_dir", path_value(&std::env::temp_dir())))
            .and_then(|b| b.set_default("output_dir", "YouTube"))
            .into_diagnostic()
            .wrap_err("Could not set the default settings")?;

        if let Some(path) = &args.config {
            builder = builder.add_source(File::from(path.as_path()).format(FileFormat::Toml));
        }

        let settings: Settings = builder
            .set_override_option("keep_temp_files", args.keep_temp_files.then_some(true))
            .and_then(|b| b.set_override_option("auto_select", args.manual.then_some(false)))
            .and_then(|b| b.set_override_option("resolution", args.resolution.clone()))
            .and_then(|b| b.set_override_option("codec", args.codec.clone()))
            .and_then(|b| b.set_override_option("temp_dir", args.temp_dir.as_deref().map(path_value)))
            .and_then(|b| {
                b.set_override_option("output_dir", args.output_dir.as_deref().map(path_value))
            })
            .and_then(|b| b.build())
            .and_then(|c| c.try_deserialize())
            .into_diagnostic()
            .wrap_err("Could not load the settings")?;

        // Fail early instead of silently never matching
        settings.preference()?;

        Ok(settings)
    }

    pub fn preference(&self) -> Result<Preference> {
        let resolution: Resolution = self
            .resolution
            .parse()
            .map_err(|err| miette::miette!("Invalid resolution {:?}: {err}", self.resolution))?;

        Ok(Preference {
            resolution,
            codec: self.codec.clone(),
        })
    }
}
