use anyhow::{bail, Result};
use clap::Parser;
use log::info;

use point_annotate::app;
use point_annotate::config::{Args, SessionSpec};

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "gif", "tif", "tiff", "webp"];

fn pick_image() -> Option<SessionSpec> {
    rfd::FileDialog::new()
        .set_title("Choose an image to annotate")
        .add_filter("Images", IMAGE_EXTENSIONS)
        .pick_file()
        .map(SessionSpec::new)
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let mut sessions = args.session_specs()?;
    if sessions.is_empty() {
        match pick_image() {
            Some(spec) => sessions.push(spec),
            None => bail!("No image selected"),
        }
    }

    let total = sessions.len();
    for (i, spec) in sessions.iter().enumerate() {
        if !spec.image.exists() {
            bail!("File not found: {}", spec.image.display());
        }
        info!("Session {}/{}: {}", i + 1, total, spec.image.display());
        app::run(spec)?;
    }
    Ok(())
}
