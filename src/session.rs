use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Mutex;

use anyhow::Context;
use chrono::{DateTime, Utc};
use tracing::{debug, warn};

pub const ROLE_KEY: &str = "userType";
pub const ID_KEY: &str = "userId";
pub const LOGGED_IN_AT_KEY: &str = "loggedInAt";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Student,
    Staff,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Staff => "staff",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "student" => Ok(Role::Student),
            "staff" => Ok(Role::Staff),
            other => anyhow::bail!("unknown role {other:?}, expected student or staff"),
        }
    }
}

/// Key/value storage scoped to one user session.
pub trait SessionStore {
    fn read(&self, key: &str) -> anyhow::Result<Option<String>>;
    fn write(&self, key: &str, value: &str) -> anyhow::Result<()>;
    fn clear(&self) -> anyhow::Result<()>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub role: Role,
    pub id: String,
    pub logged_in_at: Option<DateTime<Utc>>,
}

impl Session {
    pub fn new(role: Role, id: impl Into<String>) -> Self {
        Self {
            role,
            id: id.into(),
            logged_in_at: Some(Utc::now()),
        }
    }

    /// Returns `None` when either key is missing or the role is not recognised.
    pub fn load(store: &impl SessionStore) -> anyhow::Result<Option<Self>> {
        let role = store.read(ROLE_KEY)?.filter(|value| !value.is_empty());
        let id = store.read(ID_KEY)?.filter(|value| !value.is_empty());

        let (Some(role), Some(id)) = (role, id) else {
            debug!("session incomplete");
            return Ok(None);
        };

        let role = match role.parse::<Role>() {
            Ok(role) => role,
            Err(err) => {
                warn!(error = %err, "ignoring session with unrecognised role");
                return Ok(None);
            }
        };

        let logged_in_at = store
            .read(LOGGED_IN_AT_KEY)?
            .and_then(|value| DateTime::parse_from_rfc3339(&value).ok())
            .map(|value| value.with_timezone(&Utc));

        Ok(Some(Self {
            role,
            id,
            logged_in_at,
        }))
    }

    pub fn save(&self, store: &impl SessionStore) -> anyhow::Result<()> {
        store.write(ROLE_KEY, self.role.as_str())?;
        store.write(ID_KEY, &self.id)?;
        if let Some(at) = self.logged_in_at {
            store.write(LOGGED_IN_AT_KEY, &at.to_rfc3339())?;
        }
        Ok(())
    }
}

/// Session persisted as a flat JSON object on disk.
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn load_map(&self) -> anyhow::Result<HashMap<String, String>> {
        if !self.path.exists() {
            return Ok(HashMap::new());
        }
        let raw = std::fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read session file {}", self.path.display()))?;
        if raw.trim().is_empty() {
            return Ok(HashMap::new());
        }
        serde_json::from_str(&raw)
            .with_context(|| format!("session file {} is not valid JSON", self.path.display()))
    }

    fn store_map(&self, map: &HashMap<String, String>) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create session directory {}", parent.display())
            })?;
        }
        let raw = serde_json::to_string_pretty(map)?;
        std::fs::write(&self.path, raw)
            .with_context(|| format!("failed to write session file {}", self.path.display()))
    }
}

impl SessionStore for FileSessionStore {
    fn read(&self, key: &str) -> anyhow::Result<Option<String>> {
        Ok(self.load_map()?.remove(key))
    }

    fn write(&self, key: &str, value: &str) -> anyhow::Result<()> {
        let mut map = self.load_map()?;
        map.insert(key.to_string(), value.to_string());
        self.store_map(&map)
    }

    fn clear(&self) -> anyhow::Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err)
                .with_context(|| format!("failed to remove session file {}", self.path.display())),
        }
    }
}

#[derive(Debug, Default)]
pub struct MemorySessionStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemorySessionStore {
    pub fn with_values(values: &[(&str, &str)]) -> Self {
        let map = values
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        Self {
            values: Mutex::new(map),
        }
    }

    fn lock(&self) -> anyhow::Result<std::sync::MutexGuard<'_, HashMap<String, String>>> {
        self.values
            .lock()
            .map_err(|_| anyhow::anyhow!("session store lock poisoned"))
    }
}

impl SessionStore for MemorySessionStore {
    fn read(&self, key: &str) -> anyhow::Result<Option<String>> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn write(&self, key: &str, value: &str) -> anyhow::Result<()> {
        self.lock()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn clear(&self) -> anyhow::Result<()> {
        self.lock()?.clear();
        Ok(())
    }
}

/// Resolve the session file path:
/// 1. Explicit path
/// 2. Platform data directory
/// 3. ~/.skill-match
pub fn resolve_session_path(explicit: Option<PathBuf>) -> anyhow::Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(path);
    }

    if let Some(data_dir) = dirs::data_dir() {
        return Ok(data_dir.join("skill-match").join("session.json"));
    }

    if let Some(home) = std::env::var_os("HOME") {
        return Ok(PathBuf::from(home).join(".skill-match").join("session.json"));
    }

    anyhow::bail!("could not determine a session file location; pass --session-file")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_keys_mean_no_session() {
        let cases = [
            MemorySessionStore::default(),
            MemorySessionStore::with_values(&[(ROLE_KEY, "staff")]),
            MemorySessionStore::with_values(&[(ID_KEY, "T-100")]),
            MemorySessionStore::with_values(&[(ROLE_KEY, ""), (ID_KEY, "T-100")]),
        ];
        for store in cases {
            assert_eq!(Session::load(&store).unwrap(), None);
        }
    }

    #[test]
    fn unknown_role_is_not_a_session() {
        let store = MemorySessionStore::with_values(&[(ROLE_KEY, "admin"), (ID_KEY, "A-1")]);
        assert_eq!(Session::load(&store).unwrap(), None);
    }

    #[test]
    fn file_store_round_trips_and_clears() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSessionStore::new(dir.path().join("nested").join("session.json"));

        let session = Session::new(Role::Student, "21CS001");
        session.save(&store).unwrap();

        let loaded = Session::load(&store).unwrap().unwrap();
        assert_eq!(loaded.role, Role::Student);
        assert_eq!(loaded.id, "21CS001");
        assert!(loaded.logged_in_at.is_some());

        store.clear().unwrap();
        store.clear().unwrap();
        assert_eq!(Session::load(&store).unwrap(), None);
    }

    #[test]
    fn explicit_session_path_wins() {
        let path = resolve_session_path(Some(PathBuf::from("/tmp/custom.json"))).unwrap();
        assert_eq!(path, PathBuf::from("/tmp/custom.json"));
    }
}
