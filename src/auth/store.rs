use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::AuthError;
use super::identity::{Identity, Session};

/// Key holding the raw bearer token.
pub const ACCESS_TOKEN_KEY: &str = "access_token";
/// Key holding the JSON-serialized identity record.
pub const IDENTITY_KEY: &str = "user";

const STORE_FILE_NAME: &str = "session.toml";
const STORE_FILE_VERSION: u32 = 1;

/// Local persistent string key-value storage.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, AuthError>;

    /// Write every entry in one operation.
    async fn set_many(&self, entries: &[(&str, &str)]) -> Result<(), AuthError>;

    /// Remove the keys; missing keys are not an error.
    async fn remove_many(&self, keys: &[&str]) -> Result<(), AuthError>;
}

/// In-process store, mostly for tests and embedding.
#[derive(Debug, Default)]
pub struct MemoryKeyValueStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every stored entry.
    pub fn entries(&self) -> HashMap<String, String> {
        self.lock().clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        // A poisoned map is still a valid map.
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl KeyValueStore for MemoryKeyValueStore {
    async fn get(&self, key: &str) -> Result<Option<String>, AuthError> {
        Ok(self.lock().get(key).cloned())
    }

    async fn set_many(&self, entries: &[(&str, &str)]) -> Result<(), AuthError> {
        let mut map = self.lock();
        for (key, value) in entries {
            map.insert((*key).to_string(), (*value).to_string());
        }
        Ok(())
    }

    async fn remove_many(&self, keys: &[&str]) -> Result<(), AuthError> {
        let mut map = self.lock();
        for key in keys {
            map.remove(*key);
        }
        Ok(())
    }
}

/// File-backed store keeping every entry in one TOML document.
///
/// # Example
/// ```no_run
/// use discord_session::auth::{FileKeyValueStore, KeyValueStore};
///
/// # async fn example() -> Result<(), discord_session::auth::AuthError> {
/// let store = FileKeyValueStore::new_default();
/// store.set_many(&[("access_token", "abc")]).await?;
/// assert_eq!(store.get("access_token").await?.as_deref(), Some("abc"));
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct FileKeyValueStore {
    path: PathBuf,
}

impl FileKeyValueStore {
    /// Store `session.toml` inside `base_dir`.
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            path: base_dir.into().join(STORE_FILE_NAME),
        }
    }

    pub fn new_default() -> Self {
        Self::new(crate::config::default_session_dir())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn with_file<T, F>(&self, op: F) -> Result<T, AuthError>
    where
        T: Send + 'static,
        F: FnOnce(&Path) -> Result<T, AuthError> + Send + 'static,
    {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || op(&path))
            .await
            .map_err(|e| AuthError::Storage(format!("storage task failed: {e}")))?
    }
}

#[async_trait]
impl KeyValueStore for FileKeyValueStore {
    async fn get(&self, key: &str) -> Result<Option<String>, AuthError> {
        let key = key.to_string();
        self.with_file(move |path| Ok(read_store_file(path)?.entries.remove(&key)))
            .await
    }

    async fn set_many(&self, entries: &[(&str, &str)]) -> Result<(), AuthError> {
        let entries: Vec<(String, String)> = entries
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        self.with_file(move |path| {
            let mut file = load_for_update(path)?;
            file.entries.extend(entries);
            file.saved_at = Some(Utc::now());
            write_store_file(path, &file)
        })
        .await
    }

    async fn remove_many(&self, keys: &[&str]) -> Result<(), AuthError> {
        let keys: Vec<String> = keys.iter().map(|k| (*k).to_string()).collect();
        self.with_file(move |path| {
            let mut file = load_for_update(path)?;
            for key in &keys {
                file.entries.remove(key);
            }
            if !file.entries.is_empty() {
                file.saved_at = Some(Utc::now());
                return write_store_file(path, &file);
            }
            match fs::remove_file(path) {
                Ok(()) => Ok(()),
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
                Err(err) => Err(AuthError::Storage(err.to_string())),
            }
        })
        .await
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoreFile {
    version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    saved_at: Option<DateTime<Utc>>,
    #[serde(default)]
    entries: BTreeMap<String, String>,
}

impl Default for StoreFile {
    fn default() -> Self {
        Self {
            version: STORE_FILE_VERSION,
            saved_at: None,
            entries: BTreeMap::new(),
        }
    }
}

fn read_store_file(path: &Path) -> Result<StoreFile, AuthError> {
    let raw = match fs::read_to_string(path) {
        Ok(data) => data,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(StoreFile::default()),
        Err(err) => return Err(AuthError::Storage(err.to_string())),
    };
    let file: StoreFile = toml::from_str(&raw)?;
    if file.version != STORE_FILE_VERSION {
        return Err(AuthError::Serialization(format!(
            "Unsupported session file version {} at {}",
            file.version,
            path.display()
        )));
    }
    Ok(file)
}

/// Read the file before changing it. A document that no longer parses is
/// replaced rather than blocking every later write.
fn load_for_update(path: &Path) -> Result<StoreFile, AuthError> {
    match read_store_file(path) {
        Err(AuthError::Serialization(reason)) => {
            tracing::warn!(path = %path.display(), %reason, "discarding unreadable session file");
            Ok(StoreFile::default())
        }
        other => other,
    }
}

// Written next to the target and renamed over it, so readers never see a
// half-written file. The temp file is created owner-only.
fn write_store_file(path: &Path, file: &StoreFile) -> Result<(), AuthError> {
    let serialized = toml::to_string(file)?;
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;

    let mut temp = tempfile::NamedTempFile::new_in(dir)?;
    temp.write_all(serialized.as_bytes())?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| {
        AuthError::Storage(format!("failed to replace {}: {}", path.display(), e.error))
    })?;
    Ok(())
}

/// What [`SessionStore::read`] found; each field is independently optional.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoredSession {
    pub access_token: Option<String>,
    pub identity: Option<Identity>,
}

impl StoredSession {
    /// A usable session only when both halves are present and non-empty.
    pub fn into_session(self) -> Option<Session> {
        match (self.access_token, self.identity) {
            (Some(access_token), Some(identity)) if !access_token.trim().is_empty() => {
                Some(Session {
                    access_token,
                    identity,
                })
            }
            _ => None,
        }
    }
}

/// Persists the access token and identity under their fixed keys.
#[derive(Clone)]
pub struct SessionStore {
    backend: Arc<dyn KeyValueStore>,
}

impl SessionStore {
    pub fn new(backend: Arc<dyn KeyValueStore>) -> Self {
        Self { backend }
    }

    /// Write the token and serialized identity together.
    pub async fn persist(&self, access_token: &str, identity: &Identity) -> Result<(), AuthError> {
        let serialized = serde_json::to_string(identity)?;
        self.backend
            .set_many(&[
                (ACCESS_TOKEN_KEY, access_token),
                (IDENTITY_KEY, serialized.as_str()),
            ])
            .await
    }

    pub async fn read(&self) -> Result<StoredSession, AuthError> {
        let access_token = self
            .backend
            .get(ACCESS_TOKEN_KEY)
            .await?
            .filter(|token| !token.is_empty());
        let identity = match self.backend.get(IDENTITY_KEY).await? {
            Some(raw) if !raw.is_empty() => match serde_json::from_str::<Identity>(&raw) {
                Ok(identity) => Some(identity),
                Err(err) => {
                    tracing::warn!(error = %err, "stored identity is not valid JSON, ignoring it");
                    None
                }
            },
            _ => None,
        };
        Ok(StoredSession {
            access_token,
            identity,
        })
    }

    /// Remove both keys; succeeds when nothing was stored.
    pub async fn clear(&self) -> Result<(), AuthError> {
        self.backend
            .remove_many(&[ACCESS_TOKEN_KEY, IDENTITY_KEY])
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    #[cfg(unix)]
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    fn temp_store() -> (TempDir, FileKeyValueStore) {
        let dir = TempDir::new().unwrap();
        let store = FileKeyValueStore::new(dir.path());
        (dir, store)
    }

    #[tokio::test]
    async fn file_store_round_trip_works() {
        let (_dir, store) = temp_store();
        store
            .set_many(&[("access_token", "abc"), ("user", "{}")])
            .await
            .unwrap();
        assert_eq!(store.get("access_token").await.unwrap().as_deref(), Some("abc"));
        assert_eq!(store.get("user").await.unwrap().as_deref(), Some("{}"));
        assert_eq!(store.get("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn missing_file_reads_as_empty() {
        let (_dir, store) = temp_store();
        assert!(!store.path().exists());
        assert_eq!(store.get("access_token").await.unwrap(), None);
    }

    #[tokio::test]
    async fn file_is_versioned_toml() {
        let (_dir, store) = temp_store();
        store.set_many(&[("access_token", "abc")]).await.unwrap();
        let raw = fs::read_to_string(store.path()).unwrap();
        let value: toml::Table = toml::from_str(&raw).unwrap();
        assert_eq!(value.get("version").and_then(|v| v.as_integer()), Some(1));
        assert!(value.contains_key("saved_at"));
        assert_eq!(
            value
                .get("entries")
                .and_then(|e| e.get("access_token"))
                .and_then(|v| v.as_str()),
            Some("abc")
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn file_is_private_to_owner() {
        let (_dir, store) = temp_store();
        store.set_many(&[("access_token", "abc")]).await.unwrap();
        let mode = fs::metadata(store.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[tokio::test]
    async fn remove_deletes_file_once_empty() {
        let (_dir, store) = temp_store();
        store
            .set_many(&[("access_token", "abc"), ("user", "{}")])
            .await
            .unwrap();
        store.remove_many(&["access_token"]).await.unwrap();
        assert!(store.path().exists());
        store.remove_many(&["user"]).await.unwrap();
        assert!(!store.path().exists());
        store.remove_many(&["user", "access_token"]).await.unwrap();
    }

    #[tokio::test]
    async fn unsupported_version_is_rejected() {
        let (_dir, store) = temp_store();
        fs::write(store.path(), "version = 9\n[entries]\naccess_token = \"abc\"\n").unwrap();
        let err = store.get("access_token").await.unwrap_err();
        assert!(matches!(err, AuthError::Serialization(ref m) if m.contains("version 9")));
    }

    #[tokio::test]
    async fn clear_removes_unreadable_file() {
        let (_dir, store) = temp_store();
        fs::write(store.path(), "version = 99\n").unwrap();
        let session = SessionStore::new(Arc::new(store.clone()));

        session.clear().await.unwrap();

        assert!(!store.path().exists());
        assert_eq!(session.read().await.unwrap(), StoredSession::default());
    }

    #[tokio::test]
    async fn set_many_replaces_unreadable_file() {
        let (_dir, store) = temp_store();
        fs::write(store.path(), "this is = not [toml").unwrap();

        store.set_many(&[("access_token", "abc")]).await.unwrap();

        assert_eq!(store.get("access_token").await.unwrap().as_deref(), Some("abc"));
    }

    #[tokio::test]
    async fn write_leaves_no_temp_files_behind() {
        let (dir, store) = temp_store();
        store.set_many(&[("access_token", "abc")]).await.unwrap();
        store.set_many(&[("user", "{}")]).await.unwrap();
        let names: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("session.toml")]);
    }

    #[tokio::test]
    async fn session_store_round_trip_is_deep_equal() {
        let store = SessionStore::new(Arc::new(MemoryKeyValueStore::new()));
        let identity = Identity::new("1", "alice").with_avatar("abc123");
        store.persist("T", &identity).await.unwrap();

        let read = store.read().await.unwrap();
        assert_eq!(read.access_token.as_deref(), Some("T"));
        assert_eq!(read.identity, Some(identity));
    }

    #[tokio::test]
    async fn session_store_uses_fixed_keys() {
        let backend = Arc::new(MemoryKeyValueStore::new());
        let store = SessionStore::new(backend.clone());
        store.persist("T", &Identity::new("1", "alice")).await.unwrap();

        let entries = backend.entries();
        assert_eq!(entries.get(ACCESS_TOKEN_KEY).map(String::as_str), Some("T"));
        let identity: serde_json::Value =
            serde_json::from_str(entries.get(IDENTITY_KEY).unwrap()).unwrap();
        assert_eq!(identity, serde_json::json!({ "id": "1", "username": "alice" }));
    }

    #[tokio::test]
    async fn clear_is_idempotent() {
        let store = SessionStore::new(Arc::new(MemoryKeyValueStore::new()));
        store.clear().await.unwrap();
        store.persist("T", &Identity::new("1", "alice")).await.unwrap();
        store.clear().await.unwrap();
        store.clear().await.unwrap();
        assert_eq!(store.read().await.unwrap(), StoredSession::default());
    }

    #[tokio::test]
    async fn corrupt_identity_reads_as_absent() {
        let backend = Arc::new(MemoryKeyValueStore::new());
        backend
            .set_many(&[(ACCESS_TOKEN_KEY, "T"), (IDENTITY_KEY, "{not-json")])
            .await
            .unwrap();
        let read = SessionStore::new(backend).read().await.unwrap();
        assert_eq!(read.access_token.as_deref(), Some("T"));
        assert!(read.identity.is_none());
        assert!(read.into_session().is_none());
    }

    #[test]
    fn into_session_requires_both_halves() {
        let identity = Identity::new("1", "alice");
        assert!(StoredSession {
            access_token: Some("T".into()),
            identity: None,
        }
        .into_session()
        .is_none());
        assert!(StoredSession {
            access_token: None,
            identity: Some(identity.clone()),
        }
        .into_session()
        .is_none());
        assert!(StoredSession {
            access_token: Some("  ".into()),
            identity: Some(identity.clone()),
        }
        .into_session()
        .is_none());
        assert_eq!(
            StoredSession {
                access_token: Some("T".into()),
                identity: Some(identity.clone()),
            }
            .into_session(),
            Some(Session {
                access_token: "T".into(),
                identity,
            })
        );
    }
}
