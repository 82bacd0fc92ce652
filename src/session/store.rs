//! Durable key-value persistence for the session machine.

use crate::error::{PomoError, Result};
use crate::session::machine::{CyclePlan, SessionKind, SessionSnapshot, SessionState};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Fixed keys under which a session snapshot is stored.
pub mod keys {
    /// RFC 3339 save time.
    pub const TIMESTAMP: &str = "timestamp";
    /// Session state name.
    pub const STATE: &str = "session_state";
    /// Seconds left in the current session.
    pub const REMAINING_SECONDS: &str = "remaining_seconds";
    /// Full length of the current session in seconds.
    pub const DURATION_SECONDS: &str = "duration_seconds";
    /// Current session kind.
    pub const SESSION_KIND: &str = "session_kind";
    /// Last completed session kind.
    pub const PREVIOUS_SESSION_KIND: &str = "previous_session_kind";
    /// Planned focus length in minutes.
    pub const FOCUS_MINUTES: &str = "focus_minutes";
    /// Planned relax length in minutes.
    pub const RELAX_MINUTES: &str = "relax_minutes";
    /// Full focus cycles not yet started.
    pub const REMAINING_CYCLE_COUNT: &str = "remaining_cycle_count";
    /// Pending short final focus length in seconds.
    pub const LAST_CYCLE_TIME: &str = "last_cycle_time";
    /// Associated work item id.
    pub const LINKED_WORK_ITEM_ID: &str = "linked_work_item_id";

    /// Every key, for clearing.
    pub const ALL: [&str; 11] = [
        TIMESTAMP,
        STATE,
        REMAINING_SECONDS,
        DURATION_SECONDS,
        SESSION_KIND,
        PREVIOUS_SESSION_KIND,
        FOCUS_MINUTES,
        RELAX_MINUTES,
        REMAINING_CYCLE_COUNT,
        LAST_CYCLE_TIME,
        LINKED_WORK_ITEM_ID,
    ];
}

/// String/int durable storage.
pub trait KeyValueStore: Send {
    /// Read a string value.
    fn get_string(&self, key: &str) -> Option<String>;
    /// Write a string value.
    fn set_string(&mut self, key: &str, value: &str);
    /// Read an integer value.
    fn get_int(&self, key: &str) -> Option<i64>;
    /// Write an integer value.
    fn set_int(&mut self, key: &str, value: i64);
    /// Delete a key.
    fn remove(&mut self, key: &str);
    /// Make pending writes durable.
    fn flush(&mut self) -> Result<()>;
}

/// In-memory store for tests and ephemeral runs.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    values: BTreeMap<String, serde_json::Value>,
}

impl MemoryStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get_string(&self, key: &str) -> Option<String> {
        self.values.get(key)?.as_str().map(str::to_owned)
    }

    fn set_string(&mut self, key: &str, value: &str) {
        self.values.insert(key.to_owned(), value.into());
    }

    fn get_int(&self, key: &str) -> Option<i64> {
        self.values.get(key)?.as_i64()
    }

    fn set_int(&mut self, key: &str, value: i64) {
        self.values.insert(key.to_owned(), value.into());
    }

    fn remove(&mut self, key: &str) {
        self.values.remove(key);
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

/// JSON object on disk, rewritten atomically on flush.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    values: MemoryStore,
}

impl JsonFileStore {
    /// Open `path`, treating a missing or corrupt file as empty.
    ///
    /// # Errors
    ///
    /// Returns an error only if the file exists but cannot be read.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Self {
                    path,
                    values: MemoryStore::new(),
                });
            }
            Err(e) => {
                return Err(PomoError::Persistence(format!(
                    "cannot read {}: {e}",
                    path.display()
                )));
            }
        };

        let values = match serde_json::from_slice(&bytes) {
            Ok(values) => values,
            Err(e) => {
                warn!(path = %path.display(), "ignoring corrupt session store: {e}");
                BTreeMap::new()
            }
        };
        Ok(Self {
            path,
            values: MemoryStore { values },
        })
    }

    /// Backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl KeyValueStore for JsonFileStore {
    fn get_string(&self, key: &str) -> Option<String> {
        self.values.get_string(key)
    }

    fn set_string(&mut self, key: &str, value: &str) {
        self.values.set_string(key, value);
    }

    fn get_int(&self, key: &str) -> Option<i64> {
        self.values.get_int(key)
    }

    fn set_int(&mut self, key: &str, value: i64) {
        self.values.set_int(key, value);
    }

    fn remove(&mut self, key: &str) {
        self.values.remove(key);
    }

    fn flush(&mut self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                PomoError::Persistence(format!("cannot create state dir: {e}"))
            })?;
        }
        let json = serde_json::to_string_pretty(&self.values.values)
            .map_err(|e| PomoError::Persistence(format!("cannot serialize state: {e}")))?;

        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json)
            .map_err(|e| PomoError::Persistence(format!("cannot write state: {e}")))?;
        std::fs::rename(&tmp, &self.path)
            .map_err(|e| PomoError::Persistence(format!("cannot replace state: {e}")))?;
        Ok(())
    }
}

fn parse_state(s: &str) -> Option<SessionState> {
    match s {
        "stopped" => Some(SessionState::Stopped),
        "initializing" => Some(SessionState::Initializing),
        "running" => Some(SessionState::Running),
        "paused" => Some(SessionState::Paused),
        "completed" => Some(SessionState::Completed),
        _ => None,
    }
}

fn parse_kind(s: &str) -> Option<SessionKind> {
    match s {
        "focus" => Some(SessionKind::Focus),
        "relax" => Some(SessionKind::Relax),
        _ => None,
    }
}

/// Saves and loads [`SessionSnapshot`]s through a [`KeyValueStore`].
pub struct SessionStore {
    backend: Box<dyn KeyValueStore>,
}

impl SessionStore {
    /// Wrap a backend.
    pub fn new(backend: Box<dyn KeyValueStore>) -> Self {
        Self { backend }
    }

    /// File-backed store at `path`.
    ///
    /// # Errors
    ///
    /// See [`JsonFileStore::open`].
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        Ok(Self::new(Box::new(JsonFileStore::open(path)?)))
    }

    /// In-memory store.
    pub fn in_memory() -> Self {
        Self::new(Box::new(MemoryStore::new()))
    }

    /// Persist `snapshot`, replacing whatever was stored.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot flush.
    pub fn save(&mut self, snapshot: &SessionSnapshot) -> Result<()> {
        let b = self.backend.as_mut();
        b.set_string(keys::TIMESTAMP, &snapshot.saved_at.to_rfc3339());
        b.set_string(keys::STATE, &snapshot.state.to_string());
        b.set_int(keys::REMAINING_SECONDS, i64::from(snapshot.remaining_secs));
        b.set_int(keys::DURATION_SECONDS, i64::from(snapshot.duration_secs));
        b.set_string(keys::SESSION_KIND, &snapshot.kind.to_string());
        match snapshot.previous_kind {
            Some(kind) => b.set_string(keys::PREVIOUS_SESSION_KIND, &kind.to_string()),
            None => b.remove(keys::PREVIOUS_SESSION_KIND),
        }
        match &snapshot.plan {
            Some(plan) => {
                b.set_int(keys::FOCUS_MINUTES, i64::from(plan.focus_secs / 60));
                b.set_int(keys::RELAX_MINUTES, i64::from(plan.relax_secs / 60));
                b.set_int(keys::REMAINING_CYCLE_COUNT, i64::from(plan.remaining_cycles));
                b.set_int(keys::LAST_CYCLE_TIME, i64::from(plan.last_cycle_secs));
            }
            None => {
                for key in [
                    keys::FOCUS_MINUTES,
                    keys::RELAX_MINUTES,
                    keys::REMAINING_CYCLE_COUNT,
                    keys::LAST_CYCLE_TIME,
                ] {
                    b.remove(key);
                }
            }
        }
        match &snapshot.linked_item {
            Some(id) => b.set_string(keys::LINKED_WORK_ITEM_ID, id),
            None => b.remove(keys::LINKED_WORK_ITEM_ID),
        }
        b.flush()?;
        debug!(state = %snapshot.state, remaining = snapshot.remaining_secs, "session state saved");
        Ok(())
    }

    /// Load the stored snapshot.
    ///
    /// Missing or malformed entries mean "no prior state" and yield `None`.
    pub fn load(&self) -> Option<SessionSnapshot> {
        match self.read() {
            Ok(snapshot) => snapshot,
            Err(reason) => {
                warn!("discarding stored session state: {reason}");
                None
            }
        }
    }

    fn read(&self) -> std::result::Result<Option<SessionSnapshot>, String> {
        let b = self.backend.as_ref();
        let Some(timestamp) = b.get_string(keys::TIMESTAMP) else {
            return Ok(None);
        };
        let saved_at = DateTime::parse_from_rfc3339(&timestamp)
            .map_err(|e| format!("malformed timestamp {timestamp:?}: {e}"))?
            .with_timezone(&Utc);

        let state = b
            .get_string(keys::STATE)
            .as_deref()
            .and_then(parse_state)
            .ok_or("missing or unknown session state")?;
        let kind = b
            .get_string(keys::SESSION_KIND)
            .as_deref()
            .and_then(parse_kind)
            .ok_or("missing or unknown session kind")?;
        let previous_kind = match b.get_string(keys::PREVIOUS_SESSION_KIND) {
            Some(s) => Some(parse_kind(&s).ok_or("unknown previous session kind")?),
            None => None,
        };
        let secs = |key: &str| -> std::result::Result<u32, String> {
            b.get_int(key)
                .and_then(|v| u32::try_from(v).ok())
                .ok_or_else(|| format!("missing or negative {key}"))
        };
        let remaining_secs = secs(keys::REMAINING_SECONDS)?;
        let duration_secs = secs(keys::DURATION_SECONDS)?;

        let plan = if b.get_int(keys::REMAINING_CYCLE_COUNT).is_some() {
            Some(CyclePlan {
                focus_secs: secs(keys::FOCUS_MINUTES)?.saturating_mul(60),
                relax_secs: secs(keys::RELAX_MINUTES)?.saturating_mul(60),
                remaining_cycles: secs(keys::REMAINING_CYCLE_COUNT)?,
                last_cycle_secs: secs(keys::LAST_CYCLE_TIME)?,
            })
        } else {
            None
        };

        Ok(Some(SessionSnapshot {
            state,
            kind,
            previous_kind,
            remaining_secs,
            duration_secs,
            plan,
            linked_item: b.get_string(keys::LINKED_WORK_ITEM_ID),
            saved_at,
        }))
    }

    /// Forget any stored snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot flush.
    pub fn clear(&mut self) -> Result<()> {
        for key in keys::ALL {
            self.backend.remove(key);
        }
        self.backend.flush()
    }
}
