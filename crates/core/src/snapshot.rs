//! Best-effort JSON snapshot of the role store.
//!
//! Written opportunistically (keep-alive ticks, shutdown), read once at
//! startup. A missing or malformed file yields an empty initial state and is
//! never fatal; state is fundamentally process-local and ephemeral.

use std::{
    collections::HashMap,
    path::Path,
};

use {
    serde::{Deserialize, Serialize},
    tokio::fs,
    tracing::{debug, warn},
};

use crate::{
    error::Result,
    roles::{RoleStore, UserRecord},
    types::UserId,
};

/// Serialized form of the role store.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct StateSnapshot {
    #[serde(default)]
    pub users: HashMap<UserId, UserRecord>,
    #[serde(default)]
    pub admins: Vec<UserId>,
    #[serde(default)]
    pub owners: Vec<UserId>,
    #[serde(default)]
    pub blocked: Vec<UserId>,
}

impl StateSnapshot {
    #[must_use]
    pub fn capture(store: &RoleStore) -> Self {
        let mut admins: Vec<UserId> = store.admins.iter().copied().collect();
        let mut owners: Vec<UserId> = store.owners.iter().copied().collect();
        let mut blocked: Vec<UserId> = store.blocked.iter().copied().collect();
        // Stable output keeps snapshot diffs readable.
        admins.sort_unstable();
        owners.sort_unstable();
        blocked.sort_unstable();
        Self {
            users: store.users.clone(),
            admins,
            owners,
            blocked,
        }
    }

    #[must_use]
    pub fn restore(self) -> RoleStore {
        let mut store = RoleStore::new();
        store.users = self.users;
        store.admins = self.admins.into_iter().collect();
        store.owners = self.owners.into_iter().collect();
        store.blocked = self.blocked.into_iter().collect();
        store
    }
}

/// Load the role store from `path`. Missing or malformed files yield an
/// empty store.
pub async fn load(path: &Path) -> RoleStore {
    let data = match fs::read_to_string(path).await {
        Ok(data) => data,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "no snapshot file, starting empty");
            return RoleStore::new();
        },
        Err(e) => {
            warn!(path = %path.display(), error = %e, "failed to read snapshot, starting empty");
            return RoleStore::new();
        },
    };

    match serde_json::from_str::<StateSnapshot>(&data) {
        Ok(snapshot) => snapshot.restore(),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "malformed snapshot, starting empty");
            RoleStore::new()
        },
    }
}

/// Write `snapshot` to `path` atomically: temp file, then rename.
pub async fn save(path: &Path, snapshot: &StateSnapshot) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).await?;
    }

    let json = serde_json::to_string_pretty(snapshot)?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, json.as_bytes()).await?;
    fs::rename(&tmp, path).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn populated_store() -> RoleStore {
        let mut store = RoleStore::new();
        store.users.insert(UserId(1), UserRecord::new("Alice"));
        store.admins.insert(UserId(1));
        store.admins.insert(UserId(2));
        store.owners.insert(UserId(2));
        store.blocked.insert(UserId(3));
        store
    }

    #[tokio::test]
    async fn roundtrip_preserves_memberships() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");

        save(&path, &StateSnapshot::capture(&populated_store()))
            .await
            .unwrap();
        let restored = load(&path).await;

        assert!(restored.is_authorized(UserId(1)));
        assert!(restored.is_owner(UserId(2)));
        assert!(restored.is_blocked(UserId(3)));
        assert_eq!(restored.record(UserId(1)).map(|r| r.name.as_str()), Some("Alice"));
    }

    #[tokio::test]
    async fn missing_file_yields_empty_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = load(&dir.path().join("nope.json")).await;
        assert_eq!(store.counts(), (0, 0, 0));
    }

    #[tokio::test]
    async fn malformed_file_yields_empty_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, b"{ not json").await.unwrap();

        let store = load(&path).await;
        assert_eq!(store.counts(), (0, 0, 0));
    }

    #[tokio::test]
    async fn partial_snapshot_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, br#"{"admins": [5]}"#).await.unwrap();

        let store = load(&path).await;
        assert!(store.is_authorized(UserId(5)));
        assert!(!store.is_owner(UserId(5)));
    }

    #[tokio::test]
    async fn save_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/deeper/state.json");
        save(&path, &StateSnapshot::default()).await.unwrap();
        assert!(path.exists());
    }
}
