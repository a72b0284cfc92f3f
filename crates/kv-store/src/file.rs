//! JSON file store
//!
//! Keeps the whole key space in memory and rewrites the file on every
//! `set`. Writes go through a temp file + rename so a crash mid-write never
//! leaves a truncated store behind, and the file is created with 0600
//! permissions since it holds token material.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::KeyValueStore;
use crate::error::{Error, Result};

/// Persistent store backed by a single JSON object on disk.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    values: BTreeMap<String, String>,
}

impl FileStore {
    /// Open the store at `path`.
    ///
    /// A missing file is created as `{}`. An unreadable or unparsable file is
    /// an error rather than an empty store, so existing credentials are never
    /// overwritten by accident.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let values = if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .map_err(|e| Error::Io(format!("reading store file: {e}")))?;
            let values: BTreeMap<String, String> = serde_json::from_str(&contents)
                .map_err(|e| Error::Parse(format!("parsing store file: {e}")))?;
            info!(path = %path.display(), keys = values.len(), "opened store");
            values
        } else {
            info!(path = %path.display(), "store file not found, creating empty store");
            let values = BTreeMap::new();
            write_atomic(&path, &values)?;
            values
        };

        Ok(Self { path, values })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<String> {
        Ok(self.values.get(key).cloned().unwrap_or_default())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let previous = self.values.insert(key.to_owned(), value.to_owned());
        if let Err(e) = write_atomic(&self.path, &self.values) {
            // Keep memory consistent with what is on disk.
            match previous {
                Some(old) => self.values.insert(key.to_owned(), old),
                None => self.values.remove(key),
            };
            return Err(e);
        }
        Ok(())
    }
}

fn write_atomic(path: &Path, data: &BTreeMap<String, String>) -> Result<()> {
    let json = serde_json::to_string_pretty(data)
        .map_err(|e| Error::Parse(format!("serializing store: {e}")))?;

    let tmp_path = temp_path(path)?;

    std::fs::write(&tmp_path, json.as_bytes())
        .map_err(|e| Error::Io(format!("writing temp store file: {e}")))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        std::fs::set_permissions(&tmp_path, perms)
            .map_err(|e| Error::Io(format!("setting store file permissions: {e}")))?;
    }

    std::fs::rename(&tmp_path, path)
        .map_err(|e| Error::Io(format!("renaming temp store file: {e}")))?;

    debug!(path = %path.display(), "persisted store");
    Ok(())
}

/// Sibling temp file for `path`: `.<file name>.tmp.<pid>`. Stores kept
/// side by side in one directory never share a temp file.
fn temp_path(path: &Path) -> Result<PathBuf> {
    let dir = path
        .parent()
        .ok_or_else(|| Error::Io("store path has no parent directory".into()))?;
    let name = path
        .file_name()
        .ok_or_else(|| Error::Io("store path has no file name".into()))?;

    let mut tmp_name = OsString::from(".");
    tmp_name.push(name);
    tmp_name.push(format!(".tmp.{}", std::process::id()));
    Ok(dir.join(tmp_name))
}
