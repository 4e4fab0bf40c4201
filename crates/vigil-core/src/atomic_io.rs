use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

/// Replaces `path` with `content` in one rename, so readers see either the
/// previous artifact or the new one, never a partial write.
pub fn write_text_atomic(path: &Path, content: &str) -> Result<()> {
    let staging = staging_path(path)?;
    std::fs::write(&staging, content)
        .with_context(|| format!("failed to stage {}", staging.display()))?;
    if let Err(error) = std::fs::rename(&staging, path) {
        let _ = std::fs::remove_file(&staging);
        return Err(error)
            .with_context(|| format!("failed to publish artifact {}", path.display()));
    }
    Ok(())
}

/// Hidden sibling of `path` in the same directory, so the final rename never
/// crosses filesystems. Creates the directory when needed.
fn staging_path(path: &Path) -> Result<PathBuf> {
    let Some(file_name) = path.file_name() else {
        bail!("artifact path '{}' has no file name", path.display());
    };
    if path.is_dir() {
        bail!("artifact path '{}' is a directory", path.display());
    }
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create artifact directory {}", dir.display()))?;

    let nonce = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|elapsed| elapsed.as_nanos())
        .unwrap_or_default();
    Ok(dir.join(format!(
        ".{}.vigil-{}-{nonce}",
        file_name.to_string_lossy(),
        std::process::id()
    )))
}

/// Appends text by rewriting the whole file atomically.
///
/// The previous content is read back and the concatenation replaces the file
/// in one rename, so an interrupted append leaves the old content intact.
pub fn append_text_atomic(path: &Path, suffix: &str) -> Result<()> {
    let existing = match std::fs::read_to_string(path) {
        Ok(existing) => existing,
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(error) => {
            return Err(error).with_context(|| format!("failed to read {}", path.display()));
        }
    };
    let mut combined = String::with_capacity(existing.len().saturating_add(suffix.len()));
    combined.push_str(&existing);
    combined.push_str(suffix);
    write_text_atomic(path, &combined)
}
