use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

use crate::time_utils::current_unix_timestamp_ms;

fn staging_path(target: &Path, parent: &Path) -> PathBuf {
    let stem = target
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("record");
    // pid + millis keeps concurrent writers in the same directory from
    // clobbering each other's staging file.
    parent.join(format!(
        ".{stem}.{}.{}.part",
        std::process::id(),
        current_unix_timestamp_ms()
    ))
}

/// Writes text through a staging file + rename so readers never observe
/// partial data.
pub fn write_text_atomic(path: &Path, content: &str) -> Result<()> {
    if path.as_os_str().is_empty() {
        bail!("refusing to write to an empty path");
    }
    if path.is_dir() {
        bail!("'{}' is a directory, expected a file path", path.display());
    }

    let parent = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent)
        .with_context(|| format!("creating {}", parent.display()))?;

    let staged = staging_path(path, parent);
    std::fs::write(&staged, content)
        .with_context(|| format!("staging write at {}", staged.display()))?;
    std::fs::rename(&staged, path)
        .with_context(|| format!("publishing {} as {}", staged.display(), path.display()))?;
    Ok(())
}
