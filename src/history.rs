//! Durable per-listing notification state, stored as a JSON map of
//! listing name to `{ "last_posted": <epoch secs>, "last_chance_posted": bool }`.
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{error, instrument};

use crate::error::ListingError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct NotificationRecord {
    /// Epoch seconds of the last post; 0 means never.
    #[serde(default, deserialize_with = "epoch_seconds")]
    pub last_posted: i64,
    #[serde(default)]
    pub last_chance_posted: bool,
}

/// Older files wrote fractional timestamps. Negative or non-finite values
/// make the whole file invalid.
fn epoch_seconds<'de, D>(de: D) -> Result<i64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let v = f64::deserialize(de)?;
    if !v.is_finite() || v < 0.0 {
        return Err(serde::de::Error::custom(format!(
            "invalid last_posted timestamp {v}"
        )));
    }
    Ok(v as i64)
}

#[derive(Debug, Clone, Default)]
pub struct NotificationHistory {
    path: PathBuf,
    records: BTreeMap<String, NotificationRecord>,
}

impl NotificationHistory {
    pub fn empty(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            records: BTreeMap::new(),
        }
    }

    /// Load history; a missing file is empty history.
    pub fn try_load(path: impl Into<PathBuf>) -> Result<Self, ListingError> {
        let path = path.into();
        let content = match fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Self::empty(path)),
            Err(e) => {
                return Err(ListingError::PersistenceCorrupt(format!(
                    "{}: {}",
                    path.display(),
                    e
                )))
            }
        };
        let records = serde_json::from_str(&content).map_err(|e| {
            ListingError::PersistenceCorrupt(format!("{}: {}", path.display(), e))
        })?;
        Ok(Self { path, records })
    }

    /// Load history, resetting to empty when the file is unreadable or invalid.
    #[instrument(skip_all)]
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match Self::try_load(path) {
            Ok(h) => h,
            Err(err) => {
                error!(%err, "resetting notification history to empty");
                Self::empty(path)
            }
        }
    }

    /// Rewrite the whole file: temp file then rename.
    pub fn save(&self) -> Result<(), ListingError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string_pretty(&self.records)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, name: &str) -> Option<&NotificationRecord> {
        self.records.get(name)
    }

    pub fn insert(&mut self, name: impl Into<String>, record: NotificationRecord) {
        self.records.insert(name.into(), record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &NotificationRecord)> {
        self.records.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_file_is_empty() {
        let td = tempdir().unwrap();
        let h = NotificationHistory::try_load(td.path().join("posted.json")).unwrap();
        assert!(h.is_empty());
    }

    #[test]
    fn corrupt_file_resets_to_empty() {
        let td = tempdir().unwrap();
        let p = td.path().join("posted.json");
        fs::write(&p, "{ not json").unwrap();
        assert!(matches!(
            NotificationHistory::try_load(&p),
            Err(ListingError::PersistenceCorrupt(_))
        ));
        let h = NotificationHistory::load(&p);
        assert!(h.is_empty());
        assert_eq!(h.path(), p.as_path());
    }

    #[test]
    fn save_then_load() {
        let td = tempdir().unwrap();
        let p = td.path().join("state").join("posted.json");
        let mut h = NotificationHistory::empty(&p);
        h.insert(
            "Tractor X",
            NotificationRecord {
                last_posted: 1_700_000_000,
                last_chance_posted: true,
            },
        );
        h.save().unwrap();
        assert!(!p.with_extension("json.tmp").exists());

        let back = NotificationHistory::load(&p);
        assert_eq!(back.len(), 1);
        assert_eq!(
            back.get("Tractor X"),
            Some(&NotificationRecord {
                last_posted: 1_700_000_000,
                last_chance_posted: true
            })
        );
    }

    #[test]
    fn out_of_range_timestamp_is_corrupt() {
        let td = tempdir().unwrap();
        let p = td.path().join("posted.json");
        fs::write(&p, r#"{"Tractor X": {"last_posted": -1e300}}"#).unwrap();
        assert!(matches!(
            NotificationHistory::try_load(&p),
            Err(ListingError::PersistenceCorrupt(_))
        ));
        assert!(NotificationHistory::load(&p).is_empty());
    }

    #[test]
    fn reads_fractional_timestamps_and_missing_flag() {
        let td = tempdir().unwrap();
        let p = td.path().join("posted.json");
        fs::write(&p, r#"{"Combine": {"last_posted": 1731600000.75}}"#).unwrap();
        let h = NotificationHistory::try_load(&p).unwrap();
        let rec = h.get("Combine").unwrap();
        assert_eq!(rec.last_posted, 1_731_600_000);
        assert!(!rec.last_chance_posted);
    }
}
