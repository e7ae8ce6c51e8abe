//! Write-temp-then-rename file replacement.

use anyhow::{Context, Result};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Replace `path` with `contents` atomically.
///
/// The data is written and fsynced to a sibling temp file which is then
/// renamed over the target, so readers see either the old or the new file
/// and never a partial write.
pub fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.display()))?;
    }

    let tmp_path = temp_path_for(path);
    let mut file = std::fs::File::create(&tmp_path)
        .with_context(|| format!("failed to create temp file: {}", tmp_path.display()))?;
    file.write_all(contents.as_bytes())
        .context("error writing temp file")?;
    file.sync_all().context("error syncing temp file")?;
    drop(file);

    std::fs::rename(&tmp_path, path).with_context(|| {
        format!(
            "failed to rename {} -> {}",
            tmp_path.display(),
            path.display()
        )
    })?;
    Ok(())
}

/// `dir/.name.tmp` next to the target so the rename stays on one filesystem.
fn temp_path_for(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "artifact".into());
    path.with_file_name(format!(".{name}.tmp"))
}
