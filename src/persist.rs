// src/persist.rs
//! Small JSON state files, read and rewritten under an advisory lock.
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;

pub struct LockedFile(File);

impl LockedFile {
    /// Open (creating if needed) and take the exclusive lock. Returns the
    /// current contents alongside the handle.
    pub fn open_exclusive(path: &Path) -> std::io::Result<(Self, String)> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        #[cfg(unix)]
        {
            use fs2::FileExt;
            file.lock_exclusive()?;
        }

        let mut buf = String::new();
        file.read_to_string(&mut buf)?;
        Ok((Self(file), buf))
    }

    pub fn replace(&mut self, data: &str) -> std::io::Result<()> {
        self.0.seek(SeekFrom::Start(0))?;
        self.0.set_len(0)?;
        self.0.write_all(data.as_bytes())?;
        self.0.sync_data()
    }
}

impl Drop for LockedFile {
    fn drop(&mut self) {
        #[cfg(unix)]
        {
            use fs2::FileExt;
            let _ = FileExt::unlock(&self.0);
        }
    }
}

/// `None` when the file is missing, empty or not valid JSON for `T`.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Option<T> {
    let text = fs::read_to_string(path).ok()?;
    if text.trim().is_empty() {
        return None;
    }
    match serde_json::from_str(&text) {
        Ok(v) => Some(v),
        Err(e) => {
            log::warn!("[PERSIST] ignoring unreadable {}: {e}", path.display());
            None
        }
    }
}

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value)?;
    let (mut file, _) = LockedFile::open_exclusive(path)
        .with_context(|| format!("opening {}", path.display()))?;
    file.replace(&text)
        .with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn json_survives_a_rewrite_with_shorter_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("state.json");

        let long: BTreeMap<String, u32> = (0..20).map(|i| (format!("key{i}"), i)).collect();
        write_json(&path, &long).unwrap();
        let short = BTreeMap::from([("a".to_string(), 1u32)]);
        write_json(&path, &short).unwrap();

        assert_eq!(read_json::<BTreeMap<String, u32>>(&path), Some(short));
    }

    #[test]
    fn missing_or_garbage_reads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x.json");
        assert_eq!(read_json::<Vec<u32>>(&path), None);
        fs::write(&path, "{not json").unwrap();
        assert_eq!(read_json::<Vec<u32>>(&path), None);
    }
}
