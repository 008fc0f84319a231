use std::path::{Path, PathBuf};

use clap::Parser;
use serde::Deserialize;

use crate::error::ConfigError;

#[derive(Parser, Debug)]
#[command(name = "point-annotate")]
#[command(about = "Click points on an image, label them, export them as CSV")]
#[command(after_help = "\
CONTROLS:
  left click      place the pending point
  Enter / Add     commit it with the ID in the ID field
  Ctrl+Z / Undo   remove the last committed point
  Ctrl+S / Export write the CSV file
  middle drag     pan
  scroll          zoom")]
pub struct Args {
    /// Image to annotate (a file dialog opens when omitted)
    pub image: Option<PathBuf>,

    /// CSV file to export to [default: <image stem>_points.csv]
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// First ID suggested in the ID field
    #[arg(short, long, default_value_t = DEFAULT_START_ID, allow_negative_numbers = true)]
    pub start_id: i64,

    /// JSON file declaring several sessions to run one after another
    #[arg(long, value_name = "FILE", conflicts_with_all = ["image", "output"])]
    pub sessions: Option<PathBuf>,
}

const DEFAULT_START_ID: i64 = 1;

fn default_start_id() -> i64 {
    DEFAULT_START_ID
}

/// One annotation session: an image, where its points go, and the first ID.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SessionSpec {
    pub image: PathBuf,
    #[serde(default)]
    pub output: Option<PathBuf>,
    #[serde(default = "default_start_id")]
    pub start_id: i64,
}

impl SessionSpec {
    pub fn new(image: impl Into<PathBuf>) -> Self {
        Self {
            image: image.into(),
            output: None,
            start_id: DEFAULT_START_ID,
        }
    }

    pub fn output_path(&self) -> PathBuf {
        self.output
            .clone()
            .unwrap_or_else(|| default_output(&self.image))
    }

    fn resolve_against(mut self, base: &Path) -> Self {
        if self.image.is_relative() {
            self.image = base.join(&self.image);
        }
        if let Some(out) = self.output.as_mut() {
            if out.is_relative() {
                *out = base.join(&*out);
            }
        }
        self
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Manifest {
    pub sessions: Vec<SessionSpec>,
}

/// `<stem>_points.csv` next to the image.
pub fn default_output(image: &Path) -> PathBuf {
    image.with_file_name(format!(
        "{}_points.csv",
        image
            .file_stem()
            .unwrap_or_default()
            .to_str()
            .unwrap_or("image")
    ))
}

/// Load a session manifest. Relative paths inside it are taken relative to
/// the manifest's own directory.
pub fn load_manifest(path: &Path) -> Result<Vec<SessionSpec>, ConfigError> {
    let data = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_manifest(&data, path)
}

fn parse_manifest(data: &str, path: &Path) -> Result<Vec<SessionSpec>, ConfigError> {
    let manifest: Manifest = serde_json::from_str(data).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    if manifest.sessions.is_empty() {
        return Err(ConfigError::NoSessions {
            path: path.to_path_buf(),
        });
    }
    let base = path.parent().unwrap_or_else(|| Path::new(""));
    Ok(manifest
        .sessions
        .into_iter()
        .map(|s| s.resolve_against(base))
        .collect())
}

impl Args {
    /// Sessions requested on the command line. Empty when neither an image
    /// nor a session file was given.
    pub fn session_specs(&self) -> Result<Vec<SessionSpec>, ConfigError> {
        if let Some(ref manifest) = self.sessions {
            return load_manifest(manifest);
        }
        Ok(self
            .image
            .as_ref()
            .map(|image| SessionSpec {
                image: image.clone(),
                output: self.output.clone(),
                start_id: self.start_id,
            })
            .into_iter()
            .collect())
    }
}
