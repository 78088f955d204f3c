//! Shared filesystem helpers.

use std::path::Path;
use tokio::fs;

/// Write `data` to `path` without a half-written file ever being observable
/// at the final path: write to a sibling temp file, then rename into place.
///
/// The temp name is derived from the final name. That is safe here because
/// every unit key owns a unique path and a unit is only ever processed by
/// one worker at a time, so no two writers share a temp file.
pub(crate) async fn write_atomic(path: &Path, data: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    let mut tmp = path.as_os_str().to_os_string();
    tmp.push(".tmp");
    let tmp = std::path::PathBuf::from(tmp);
    fs::write(&tmp, data).await?;
    match fs::rename(&tmp, path).await {
        Ok(()) => Ok(()),
        Err(e) => {
            // Leave no stray temp file behind on failure.
            _ = fs::remove_file(&tmp).await;
            Err(e)
        },
    }
}
