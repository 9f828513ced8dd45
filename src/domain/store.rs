use crate::domain::CredentialPair;
use arc_swap::ArcSwapOption;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Persists the credential pair across sessions under a single entry.
pub trait CredentialStore: Send + Sync {
    fn load(&self) -> anyhow::Result<Option<CredentialPair>>;
    fn save(&self, pair: &CredentialPair) -> anyhow::Result<()>;
    fn clear(&self) -> anyhow::Result<()>;
}

/// Stores the pair as JSON in a single file, readable by the owner only on Unix.
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CredentialStore for FileCredentialStore {
    fn load(&self) -> anyhow::Result<Option<CredentialPair>> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        Ok(Some(serde_json::from_str(&contents)?))
    }

    fn save(&self, pair: &CredentialPair) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(&self.path, serde_json::to_string_pretty(pair)?)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&self.path, std::fs::Permissions::from_mode(0o600))?;
        }

        Ok(())
    }

    fn clear(&self) -> anyhow::Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[derive(Default)]
pub struct MemoryCredentialStore {
    entry: ArcSwapOption<CredentialPair>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pair(pair: CredentialPair) -> Self {
        Self {
            entry: ArcSwapOption::from_pointee(pair),
        }
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn load(&self) -> anyhow::Result<Option<CredentialPair>> {
        Ok(self.entry.load_full().map(|pair| pair.as_ref().clone()))
    }

    fn save(&self, pair: &CredentialPair) -> anyhow::Result<()> {
        self.entry.store(Some(Arc::new(pair.clone())));
        Ok(())
    }

    fn clear(&self) -> anyhow::Result<()> {
        self.entry.store(None);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_store_round_trip_and_clear() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCredentialStore::new(dir.path().join("nested/session.json"));

        assert_eq!(store.load().unwrap(), None);

        let pair = CredentialPair::new("access", "refresh");
        store.save(&pair).unwrap();
        assert_eq!(store.load().unwrap(), Some(pair));

        store.clear().unwrap();
        assert_eq!(store.load().unwrap(), None);
        // clearing an absent entry is fine
        store.clear().unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn file_store_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let store = FileCredentialStore::new(dir.path().join("session.json"));
        store.save(&CredentialPair::new("a", "r")).unwrap();

        let mode = std::fs::metadata(store.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn file_store_rejects_corrupt_entry() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        std::fs::write(&path, "{not json").unwrap();

        assert!(FileCredentialStore::new(path).load().is_err());
    }

    #[test]
    fn memory_store_replaces_whole_pair() {
        let store = MemoryCredentialStore::with_pair(CredentialPair::new("a1", "r1"));
        store.save(&CredentialPair::new("a2", "r2")).unwrap();
        assert_eq!(store.load().unwrap(), Some(CredentialPair::new("a2", "r2")));
        store.clear().unwrap();
        assert_eq!(store.load().unwrap(), None);
    }
}
