use anyhow::{Context, Result};
use serde::{de::DeserializeOwned, Serialize};
use std::io::Write;
use std::path::Path;
use tracing::{debug, error, trace};

/// Reads a `.json` file from `path`.
///
/// ```rust,no_run
/// let payload: serde_json::Value = sift_util::read_json("./presets/metrics.json")?;
/// # Ok::<(), anyhow::Error>(())
/// ```
pub fn read_json<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T> {
    let path = path.as_ref();
    trace!("reading {}", path.display());
    let file = std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let data: T = serde_json::from_slice(&file).map_err(|e| {
        error!("{} is not valid json for the expected shape: {e}", path.display());
        e
    })?;
    Ok(data)
}

/// Reads a whole text file, e.g. a report payload handed to `Report::parse`.
pub fn read_text(path: impl AsRef<Path>) -> Result<String> {
    let path = path.as_ref();
    trace!("reading {}", path.display());
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    Ok(text)
}

/// Writes `value` as pretty-printed json to `path`.
///
/// Parent directories are created as necessary.
pub fn write_json<T: Serialize + ?Sized>(path: impl AsRef<Path>, value: &T) -> Result<()> {
    let path = path.as_ref();
    if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)?;
    }
    let data = serde_json::to_vec_pretty(value)?;
    std::fs::write(path, data).with_context(|| format!("failed to write {}", path.display()))?;
    debug!("wrote {}", path.display());
    Ok(())
}

/// Writes `value` as pretty-printed json to stdout.
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let mut stdout = std::io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, value)?;
    writeln!(stdout)?;
    Ok(())
}
