//! Key-value settings the cache reads its schedule from
//!
//! The settings store is owned by the surrounding application; the cache only
//! reads the schedule keys and records when each source last changed.

use crate::error::{CacheError, Result};
use crate::types::{LocalImageMode, SchedulePolicy, Source};
use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::path::PathBuf;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

pub type SettingsMap = Map<String, Value>;

pub const SCHEDULE_KEY: &str = "background_schedule";
pub const LOCAL_MODE_KEY: &str = "local_image_mode";

/// Settings key holding the last write time of `source`
pub fn last_changed_key(source: Source) -> String {
    format!("last_changed.{}", source)
}

#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// Fetch the given keys; missing keys are absent from the result
    async fn get(&self, keys: &[&str]) -> Result<SettingsMap>;

    /// Merge `values` into the store
    async fn set(&self, values: SettingsMap) -> Result<()>;
}

/// Schedule configuration as read from a [`SettingsStore`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScheduleSettings {
    pub schedule: SchedulePolicy,
    pub local_mode: LocalImageMode,
}

impl ScheduleSettings {
    pub async fn load(store: &dyn SettingsStore) -> Result<Self> {
        let values = store.get(&[SCHEDULE_KEY, LOCAL_MODE_KEY]).await?;

        let schedule = match values.get(SCHEDULE_KEY) {
            Some(value) if !value.is_null() => serde_json::from_value(value.clone())
                .map_err(|e| CacheError::Settings(format!("{}: {}", SCHEDULE_KEY, e)))?,
            _ => SchedulePolicy::default(),
        };
        let local_mode = match values.get(LOCAL_MODE_KEY) {
            Some(value) if !value.is_null() => serde_json::from_value(value.clone())
                .map_err(|e| CacheError::Settings(format!("{}: {}", LOCAL_MODE_KEY, e)))?,
            _ => LocalImageMode::default(),
        };

        Ok(Self {
            schedule,
            local_mode,
        })
    }

    pub async fn save(&self, store: &dyn SettingsStore) -> Result<()> {
        let mut values = SettingsMap::new();
        values.insert(SCHEDULE_KEY.to_string(), serde_json::to_value(self.schedule)?);
        values.insert(LOCAL_MODE_KEY.to_string(), serde_json::to_value(self.local_mode)?);
        store.set(values).await
    }
}

/// Settings held in memory for the lifetime of the process
#[derive(Debug, Default)]
pub struct MemorySettings {
    values: RwLock<SettingsMap>,
}

impl MemorySettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_schedule(schedule: SchedulePolicy, local_mode: LocalImageMode) -> Self {
        let mut values = SettingsMap::new();
        values.insert(SCHEDULE_KEY.to_string(), json!(schedule));
        values.insert(LOCAL_MODE_KEY.to_string(), json!(local_mode));
        Self {
            values: RwLock::new(values),
        }
    }
}

#[async_trait]
impl SettingsStore for MemorySettings {
    async fn get(&self, keys: &[&str]) -> Result<SettingsMap> {
        let values = self.values.read().await;
        Ok(pick(&values, keys))
    }

    async fn set(&self, values: SettingsMap) -> Result<()> {
        self.values.write().await.extend(values);
        Ok(())
    }
}

/// Settings persisted as a JSON object in a single file
#[derive(Debug)]
pub struct JsonFileSettings {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileSettings {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    async fn read_all(&self) -> Result<SettingsMap> {
        match tokio::fs::read(&self.path).await {
            Ok(data) if data.is_empty() => Ok(SettingsMap::new()),
            Ok(data) => Ok(serde_json::from_slice(&data)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(SettingsMap::new()),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl SettingsStore for JsonFileSettings {
    async fn get(&self, keys: &[&str]) -> Result<SettingsMap> {
        let values = self.read_all().await?;
        Ok(pick(&values, keys))
    }

    async fn set(&self, values: SettingsMap) -> Result<()> {
        let _guard = self.write_lock.lock().await;

        let mut current = self.read_all().await?;
        current.extend(values);

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        // Write then rename so readers never see a partial file
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, serde_json::to_vec_pretty(&current)?).await?;
        tokio::fs::rename(&tmp, &self.path).await?;

        debug!(path = ?self.path, keys = current.len(), "Saved settings");
        Ok(())
    }
}

fn pick(values: &SettingsMap, keys: &[&str]) -> SettingsMap {
    keys.iter()
        .filter_map(|key| values.get(*key).map(|v| (key.to_string(), v.clone())))
        .collect()
}
