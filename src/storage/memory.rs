use std::collections::HashMap;
use std::sync::Mutex;

use crate::diary::errors::DiaryError;
use crate::diary::types::{Settings, UserRecord};
use crate::storage::UserStore;

/// In-process user store, used by tests and tooling that do not need disk.
#[derive(Debug, Default)]
pub struct MemoryStore {
    users: Mutex<HashMap<String, UserRecord>>,
    settings: Mutex<Settings>,
    writes: Mutex<u64>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_settings(settings: Settings) -> Self {
        Self {
            settings: Mutex::new(settings),
            ..Self::default()
        }
    }

    pub fn insert(&self, user: UserRecord) {
        if let Ok(mut users) = self.users.lock() {
            users.insert(user.tg_id.clone(), user);
        }
    }

    pub fn set_settings(&self, settings: Settings) {
        if let Ok(mut guard) = self.settings.lock() {
            *guard = settings;
        }
    }

    /// Number of committed user writes.
    pub fn write_count(&self) -> u64 {
        self.writes.lock().map(|w| *w).unwrap_or(0)
    }
}

fn poisoned<T>(_: T) -> DiaryError {
    DiaryError::Internal("memory store lock poisoned".to_string())
}

impl UserStore for MemoryStore {
    fn load_user(&self, tg_id: &str) -> Result<Option<UserRecord>, DiaryError> {
        Ok(self.users.lock().map_err(poisoned)?.get(tg_id).cloned())
    }

    fn load_settings(&self) -> Result<Settings, DiaryError> {
        Ok(self.settings.lock().map_err(poisoned)?.clone())
    }

    fn update_user<T, F>(&self, tg_id: &str, f: F) -> Result<T, DiaryError>
    where
        F: FnOnce(&mut UserRecord) -> Result<T, DiaryError>,
    {
        let mut users = self.users.lock().map_err(poisoned)?;
        let stored = users
            .get_mut(tg_id)
            .ok_or_else(|| DiaryError::NotFound(format!("user: {}", tg_id)))?;
        let mut working = stored.clone();
        let value = f(&mut working)?;
        if working != *stored {
            *stored = working;
            *self.writes.lock().map_err(poisoned)? += 1;
        }
        Ok(value)
    }
}
