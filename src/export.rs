use std::borrow::Cow;
use std::fs::Permissions;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::session::Point;

pub const HEADER: [&str; 3] = ["id", "x_px", "y_px"];
const ROW_END: &str = "\r\n";

/// Encode points as comma-delimited text: header row, then one row per
/// point in the given order.
pub fn encode(points: &[Point]) -> String {
    let mut out = String::new();
    push_row(&mut out, HEADER.iter().map(|h| Cow::Borrowed(*h)));
    for p in points {
        push_row(
            &mut out,
            [
                quote(&p.id),
                Cow::Owned(coord(p.x)),
                Cow::Owned(coord(p.y)),
            ]
            .into_iter(),
        );
    }
    out
}

fn push_row<'a>(out: &mut String, fields: impl Iterator<Item = Cow<'a, str>>) {
    for (i, field) in fields.enumerate() {
        if i > 0 {
            out.push(',');
        }
        out.push_str(&field);
    }
    out.push_str(ROW_END);
}

/// Quote a field only when it contains a delimiter, quote or line break.
fn quote(field: &str) -> Cow<'_, str> {
    if field.contains([',', '"', '\r', '\n']) {
        Cow::Owned(format!("\"{}\"", field.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(field)
    }
}

/// Shortest round-trip decimal, always with a fractional part (`100.0`).
fn coord(v: f64) -> String {
    format!("{v:?}")
}

/// Replace `path` with `contents` via a temp file in the same directory, so
/// a failed write never leaves a partial file behind. Returns the absolute
/// path written.
///
/// Like a plain overwrite, an existing file keeps its permissions, a new
/// one gets `0o666` minus the umask, and a symlink is written through.
pub fn write_atomic(path: &Path, contents: &str) -> std::io::Result<PathBuf> {
    let absolute = std::path::absolute(path)?;
    let target = std::fs::canonicalize(&absolute).unwrap_or_else(|_| absolute.clone());
    let existing = std::fs::metadata(&target).ok().map(|m| m.permissions());
    let dir = target.parent().unwrap_or_else(|| Path::new("."));

    let mut builder = tempfile::Builder::new();
    builder.prefix(".points").suffix(".csv.tmp");
    if existing.is_none() {
        if let Some(perms) = new_file_permissions() {
            builder.permissions(perms);
        }
    }
    let mut tmp = builder.tempfile_in(dir)?;
    if let Some(perms) = existing {
        tmp.as_file().set_permissions(perms)?;
    }
    tmp.write_all(contents.as_bytes())?;
    tmp.as_file().sync_all()?;
    tmp.persist(&target).map_err(|e| e.error)?;
    Ok(absolute)
}

/// Mode handed to `open`, so the process umask still applies.
#[cfg(unix)]
fn new_file_permissions() -> Option<Permissions> {
    use std::os::unix::fs::PermissionsExt;
    Some(Permissions::from_mode(0o666))
}

#[cfg(not(unix))]
fn new_file_permissions() -> Option<Permissions> {
    None
}
