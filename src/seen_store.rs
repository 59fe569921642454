use std::collections::BTreeSet;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, instrument, warn};

/// Canonical links of the events already notified
pub type SeenSet = BTreeSet<String>;

/// Keeps the seen set in a JSON array file
#[derive(Debug, Clone)]
pub struct SeenStore {
    path: PathBuf,
}

impl SeenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Missing or unreadable state counts as nothing seen yet
    #[instrument(skip(self), fields(path = %self.path.display()))]
    pub fn load(&self) -> SeenSet {
        if !self.path.exists() {
            debug!("No state file yet");
            return SeenSet::new();
        }

        match self.read() {
            Ok(seen) => {
                debug!("Loaded {} seen events", seen.len());
                seen
            }
            Err(err) => {
                warn!("Ignoring unreadable state file: {}", err);
                SeenSet::new()
            }
        }
    }

    fn read(&self) -> Result<SeenSet, StoreError> {
        let reader = BufReader::new(File::open(&self.path)?);

        Ok(serde_json::from_reader(reader)?)
    }

    /// Writes to a temporary file first and renames it over the state file
    #[instrument(skip(self, seen), fields(path = %self.path.display(), count = seen.len()))]
    pub fn save(&self, seen: &SeenSet) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let temp_path = self.temp_path();
        {
            let file = File::create(&temp_path)?;
            let mut writer = BufWriter::new(file);

            serde_json::to_writer_pretty(&mut writer, seen)?;
            writer.flush()?;
            writer.get_ref().sync_all()?;
        }

        fs::rename(&temp_path, &self.path)?;
        debug!("Saved seen events");

        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let mut temp = self.path.clone().into_os_string();
        temp.push(".tmp");
        PathBuf::from(temp)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("State file I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("State file is not a list of links: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use uuid::Uuid;

    fn temp_store() -> SeenStore {
        let dir = env::temp_dir().join(format!("idawatch-{}", Uuid::new_v4()));

        SeenStore::new(dir.join("seen.json"))
    }

    #[test_log::test]
    fn when_the_file_is_missing_should_load_nothing() {
        assert!(temp_store().load().is_empty());
    }

    #[test_log::test]
    fn when_the_file_is_corrupt_should_load_nothing() {
        let store = temp_store();
        fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        fs::write(store.path(), "{\"not\": \"a list\"").unwrap();

        assert!(store.load().is_empty());
    }

    #[test_log::test]
    fn should_load_what_was_saved() {
        let store = temp_store();
        let seen = SeenSet::from([
            "https://ida.dk/event/a".to_string(),
            "https://ida.dk/event/b".to_string(),
        ]);

        store.save(&seen).unwrap();

        assert_eq!(store.load(), seen);
        assert!(!store.temp_path().exists());
    }

    #[test_log::test]
    fn should_write_a_json_array_of_links() {
        let store = temp_store();

        store
            .save(&SeenSet::from(["https://ida.dk/event/a".to_string()]))
            .unwrap();

        let written: Vec<String> =
            serde_json::from_str(&fs::read_to_string(store.path()).unwrap()).unwrap();

        assert_eq!(written, vec!["https://ida.dk/event/a"]);
    }

    #[test_log::test]
    fn should_replace_a_previous_state() {
        let store = temp_store();

        store.save(&SeenSet::from(["a".to_string()])).unwrap();
        store
            .save(&SeenSet::from(["a".to_string(), "b".to_string()]))
            .unwrap();

        assert_eq!(store.load().len(), 2);
    }

    #[test_log::test]
    fn when_the_location_is_not_writable_should_report_it() {
        let store = temp_store();
        let blocker = store.path().parent().unwrap().to_path_buf();
        fs::create_dir_all(blocker.parent().unwrap()).unwrap();
        fs::write(&blocker, "a file where the directory should be").unwrap();

        assert!(store.save(&SeenSet::new()).is_err());
    }
}
