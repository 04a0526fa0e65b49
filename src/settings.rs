use crate::feeds::FeedSnapshot;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Values kept across sessions under the module key.
///
/// Field names match what the browser extension stored, so a settings map
/// exported from it loads as-is.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedSettings {
    pub show_new_cards_popup: bool,
    #[serde(rename = "lastFetchedData")]
    pub last_fetched_snapshot: Option<FeedSnapshot>,
    pub last_fetched_date: Option<DateTime<Utc>>,
}

const SHOW_POPUP_KEY: &str = "showNewCardsPopup";
const SNAPSHOT_KEY: &str = "lastFetchedData";
const DATE_KEY: &str = "lastFetchedDate";

/// Fill in every default field missing from `stored`.
///
/// Returns the decoded settings, plus the upgraded value to write back when
/// anything had to be filled or replaced. Fields are decoded one at a time:
/// a field that is present (even as `null`) and decodes is kept, one that
/// fails to decode alone falls back to its default.
pub fn backfill(stored: Option<Value>) -> (PersistedSettings, Option<Value>) {
    let mut map = match stored {
        Some(Value::Object(map)) => map,
        Some(other) => {
            tracing::warn!(stored = %other, "stored settings are not an object, resetting");
            Map::new()
        }
        None => Map::new(),
    };

    let defaults = PersistedSettings::default();
    let mut changed = false;
    let settings = PersistedSettings {
        show_new_cards_popup: field(
            &mut map,
            SHOW_POPUP_KEY,
            defaults.show_new_cards_popup,
            &mut changed,
        ),
        last_fetched_snapshot: field(
            &mut map,
            SNAPSHOT_KEY,
            defaults.last_fetched_snapshot,
            &mut changed,
        ),
        last_fetched_date: field(&mut map, DATE_KEY, defaults.last_fetched_date, &mut changed),
    };

    (settings, changed.then_some(Value::Object(map)))
}

fn field<T>(map: &mut Map<String, Value>, key: &str, default: T, changed: &mut bool) -> T
where
    T: Serialize + DeserializeOwned,
{
    if let Some(value) = map.get(key) {
        match T::deserialize(value) {
            Ok(decoded) => return decoded,
            Err(e) => {
                tracing::warn!(key, error = %e, "stored setting could not be decoded, using default");
            }
        }
    }

    map.insert(
        key.to_string(),
        serde_json::to_value(&default).unwrap_or(Value::Null),
    );
    *changed = true;
    default
}

/// The host-side settings map: one JSON value per module key.
pub trait SettingsStore: Send {
    fn get(&self, module_key: &str) -> Option<Value>;
    fn set(&mut self, module_key: &str, value: Value);
    /// Make every `set` so far durable.
    fn persist(&mut self) -> Result<()>;
}

/// Settings file holding a single JSON object keyed by module.
pub struct JsonFileStore {
    path: PathBuf,
    entries: Map<String, Value>,
    dirty: bool,
}

impl JsonFileStore {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let entries = if path.exists() {
            let text = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read settings file {}", path.display()))?;
            if text.trim().is_empty() {
                Map::new()
            } else {
                serde_json::from_str(&text)
                    .with_context(|| format!("failed to parse settings file {}", path.display()))?
            }
        } else {
            Map::new()
        };

        Ok(Self {
            path,
            entries,
            dirty: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SettingsStore for JsonFileStore {
    fn get(&self, module_key: &str) -> Option<Value> {
        self.entries.get(module_key).cloned()
    }

    fn set(&mut self, module_key: &str, value: Value) {
        self.entries.insert(module_key.to_string(), value);
        self.dirty = true;
    }

    fn persist(&mut self) -> Result<()> {
        if !self.dirty {
            return Ok(());
        }
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("failed to create {}", parent.display()))?;
            }
        }

        let json = serde_json::to_string_pretty(&self.entries)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json)
            .with_context(|| format!("failed to write {}", tmp.display()))?;
        std::fs::rename(&tmp, &self.path)
            .with_context(|| format!("failed to replace {}", self.path.display()))?;

        self.dirty = false;
        tracing::debug!(path = %self.path.display(), "settings persisted");
        Ok(())
    }
}

#[derive(Debug, Default)]
struct MemoryInner {
    entries: Map<String, Value>,
    persist_count: usize,
}

/// In-process store. Clones share the same map.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<MemoryInner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entry(module_key: &str, value: Value) -> Self {
        let store = Self::new();
        store
            .inner
            .lock()
            .entries
            .insert(module_key.to_string(), value);
        store
    }

    pub fn persist_count(&self) -> usize {
        self.inner.lock().persist_count
    }
}

impl SettingsStore for MemoryStore {
    fn get(&self, module_key: &str) -> Option<Value> {
        self.inner.lock().entries.get(module_key).cloned()
    }

    fn set(&mut self, module_key: &str, value: Value) {
        self.inner
            .lock()
            .entries
            .insert(module_key.to_string(), value);
    }

    fn persist(&mut self) -> Result<()> {
        self.inner.lock().persist_count += 1;
        Ok(())
    }
}

/// A store bound to one module key, with the backfill already applied.
pub struct SettingsHandle {
    store: Box<dyn SettingsStore>,
    module_key: String,
}

impl SettingsHandle {
    pub fn open(store: Box<dyn SettingsStore>, module_key: impl Into<String>) -> Result<Self> {
        let mut handle = Self {
            store,
            module_key: module_key.into(),
        };

        let (_, upgraded) = backfill(handle.store.get(&handle.module_key));
        if let Some(value) = upgraded {
            tracing::info!(module = %handle.module_key, "backfilled default settings");
            handle.store.set(&handle.module_key, value);
            handle.store.persist()?;
        }
        Ok(handle)
    }

    pub fn load(&self) -> PersistedSettings {
        backfill(self.store.get(&self.module_key)).0
    }

    /// Apply `f` to the current settings, then store and persist them.
    ///
    /// The store is updated even if the durable write fails; the error is
    /// returned so the caller can report it.
    pub fn update<F>(&mut self, f: F) -> Result<PersistedSettings>
    where
        F: FnOnce(&mut PersistedSettings),
    {
        let mut settings = self.load();
        f(&mut settings);
        let value = serde_json::to_value(&settings)?;
        self.store.set(&self.module_key, value);
        self.store.persist()?;
        Ok(settings)
    }
}
