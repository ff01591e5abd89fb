//! Storage of settings, clients, readings and layouts.
//!
//! Everything is kept as JSON strings under fixed keys of a [`KeyValueStore`]. The
//! application works against a [`MemoryStore`] that is seeded from and written back to
//! `eframe`'s storage.

use crate::types::{AiConfig, Client, LastState, SavedReading, SpreadTemplate};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;

/// Key of the session settings.
pub const SETTINGS_KEY: &str = "tarot_canvas.settings";
/// Key of the client roster.
pub const CLIENTS_KEY: &str = "tarot_canvas.clients";
/// Key of the custom layouts.
pub const LAYOUTS_KEY: &str = "tarot_canvas.layouts";
/// Key of the layout builder presets.
pub const PRESETS_KEY: &str = "tarot_canvas.presets";
/// Key of the anonymous last reading.
pub const LAST_STATE_KEY: &str = "tarot_canvas.last_state";

const ALL_KEYS: [&str; 5] = [SETTINGS_KEY, CLIENTS_KEY, LAYOUTS_KEY, PRESETS_KEY, LAST_STATE_KEY];

/// Storage failures.
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// A value could not be encoded
    #[error("failed to encode {key}: {source}")]
    Serialize {
        /// Storage key
        key: &'static str,
        /// Encoder error
        source: serde_json::Error,
    },
    /// A stored blob could not be decoded
    #[error("failed to decode {key}: {source}")]
    Deserialize {
        /// Storage key
        key: &'static str,
        /// Decoder error
        source: serde_json::Error,
    },
    /// The record to change does not exist
    #[error("{0} not found")]
    NotFound(String),
    /// The underlying store failed
    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Whether a stored layout is a full layout or a builder preset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutKind {
    /// Selectable spread layout
    Layout,
    /// Builder starting point
    Preset,
}

/// Custom layouts and presets as stored.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoredLayouts {
    /// Custom layouts
    pub layouts: Vec<SpreadTemplate>,
    /// Builder presets
    pub presets: Vec<SpreadTemplate>,
}

/// CRUD over the stored resources. Every call either succeeds or reports why not.
pub trait Persistence {
    /// Stored settings, if any.
    fn load_settings(&self) -> Result<Option<AiConfig>, PersistenceError>;
    /// Replaces the settings.
    fn save_settings(&mut self, config: &AiConfig) -> Result<(), PersistenceError>;

    /// Every client with their readings.
    fn list_clients(&self) -> Result<Vec<Client>, PersistenceError>;
    /// Adds a client.
    fn save_client(&mut self, client: &Client) -> Result<(), PersistenceError>;
    /// Replaces a client's record.
    fn update_client(&mut self, client: &Client) -> Result<(), PersistenceError>;
    /// Removes a client and their readings.
    fn delete_client(&mut self, id: &str) -> Result<(), PersistenceError>;

    /// Adds a reading to a client, newest first.
    fn save_reading(&mut self, client_id: &str, reading: &SavedReading) -> Result<(), PersistenceError>;
    /// Replaces a reading wherever it is stored.
    fn update_reading(&mut self, reading: &SavedReading) -> Result<(), PersistenceError>;
    /// Removes a reading.
    fn delete_reading(&mut self, id: &str) -> Result<(), PersistenceError>;

    /// Custom layouts and presets.
    fn list_layouts(&self) -> Result<StoredLayouts, PersistenceError>;
    /// Adds or replaces a layout or preset.
    fn save_layout(&mut self, layout: &SpreadTemplate, kind: LayoutKind) -> Result<(), PersistenceError>;
    /// Removes a layout or preset by id.
    fn delete_layout(&mut self, id: &str) -> Result<(), PersistenceError>;

    /// The anonymous last reading, if any.
    fn load_last_state(&self) -> Result<Option<LastState>, PersistenceError>;
    /// Replaces the anonymous last reading.
    fn save_last_state(&mut self, state: &LastState) -> Result<(), PersistenceError>;
}

/// A string key/value store.
pub trait KeyValueStore {
    /// Value under `key`.
    fn get_string(&self, key: &str) -> Option<String>;
    /// Stores `value` under `key`.
    fn set_string(&mut self, key: &str, value: String) -> Result<(), PersistenceError>;
}

/// In-memory store, mirrored to `eframe`'s storage by the application.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemoryStore {
    entries: BTreeMap<String, String>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Copies every known key from `eframe` storage.
    pub fn from_storage(storage: &dyn eframe::Storage) -> Self {
        let entries = ALL_KEYS
            .iter()
            .filter_map(|key| Some((key.to_string(), storage.get_string(key)?)))
            .collect();
        Self { entries }
    }

    /// Writes every entry to `eframe` storage.
    pub fn write_to(&self, storage: &mut dyn eframe::Storage) {
        for (key, value) in &self.entries {
            storage.set_string(key, value.clone());
        }
    }
}

impl KeyValueStore for MemoryStore {
    fn get_string(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set_string(&mut self, key: &str, value: String) -> Result<(), PersistenceError> {
        self.entries.insert(key.to_string(), value);
        Ok(())
    }
}

/// [`Persistence`] over a key/value store, one JSON blob per resource.
#[derive(Debug, Clone, Default)]
pub struct KvPersistence<S> {
    store: S,
}

impl<S: KeyValueStore> KvPersistence<S> {
    /// Wraps a store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// The underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    fn read<T: DeserializeOwned>(&self, key: &'static str) -> Result<Option<T>, PersistenceError> {
        match self.store.get_string(key) {
            None => Ok(None),
            Some(json) => serde_json::from_str(&json)
                .map(Some)
                .map_err(|source| PersistenceError::Deserialize { key, source }),
        }
    }

    fn write<T: Serialize + ?Sized>(&mut self, key: &'static str, value: &T) -> Result<(), PersistenceError> {
        let json = serde_json::to_string(value).map_err(|source| PersistenceError::Serialize { key, source })?;
        self.store.set_string(key, json)
    }

    fn with_clients<R>(
        &mut self,
        change: impl FnOnce(&mut Vec<Client>) -> Result<R, PersistenceError>,
    ) -> Result<R, PersistenceError> {
        let mut clients = self.list_clients()?;
        let result = change(&mut clients)?;
        self.write(CLIENTS_KEY, &clients)?;
        Ok(result)
    }

    fn with_layouts(
        &mut self,
        key: &'static str,
        change: impl FnOnce(&mut Vec<SpreadTemplate>) -> bool,
    ) -> Result<bool, PersistenceError> {
        let mut layouts: Vec<SpreadTemplate> = self.read(key)?.unwrap_or_default();
        let changed = change(&mut layouts);
        if changed {
            self.write(key, &layouts)?;
        }
        Ok(changed)
    }
}

impl<S: KeyValueStore> Persistence for KvPersistence<S> {
    fn load_settings(&self) -> Result<Option<AiConfig>, PersistenceError> {
        self.read(SETTINGS_KEY)
    }

    fn save_settings(&mut self, config: &AiConfig) -> Result<(), PersistenceError> {
        self.write(SETTINGS_KEY, config)
    }

    fn list_clients(&self) -> Result<Vec<Client>, PersistenceError> {
        Ok(self.read(CLIENTS_KEY)?.unwrap_or_default())
    }

    fn save_client(&mut self, client: &Client) -> Result<(), PersistenceError> {
        self.with_clients(|clients| {
            clients.retain(|c| c.id != client.id);
            clients.push(client.clone());
            Ok(())
        })
    }

    fn update_client(&mut self, client: &Client) -> Result<(), PersistenceError> {
        self.with_clients(|clients| {
            let slot = clients
                .iter_mut()
                .find(|c| c.id == client.id)
                .ok_or_else(|| PersistenceError::NotFound(format!("client {}", client.id)))?;
            *slot = client.clone();
            Ok(())
        })
    }

    fn delete_client(&mut self, id: &str) -> Result<(), PersistenceError> {
        self.with_clients(|clients| {
            let before = clients.len();
            clients.retain(|c| c.id != id);
            if clients.len() == before {
                return Err(PersistenceError::NotFound(format!("client {id}")));
            }
            Ok(())
        })
    }

    fn save_reading(&mut self, client_id: &str, reading: &SavedReading) -> Result<(), PersistenceError> {
        self.with_clients(|clients| {
            let client = clients
                .iter_mut()
                .find(|c| c.id == client_id)
                .ok_or_else(|| PersistenceError::NotFound(format!("client {client_id}")))?;
            client.readings_history.retain(|r| r.id != reading.id);
            client.readings_history.insert(0, reading.clone());
            Ok(())
        })
    }

    fn update_reading(&mut self, reading: &SavedReading) -> Result<(), PersistenceError> {
        self.with_clients(|clients| {
            let slot = clients
                .iter_mut()
                .flat_map(|c| c.readings_history.iter_mut())
                .find(|r| r.id == reading.id)
                .ok_or_else(|| PersistenceError::NotFound(format!("reading {}", reading.id)))?;
            *slot = reading.clone();
            Ok(())
        })
    }

    fn delete_reading(&mut self, id: &str) -> Result<(), PersistenceError> {
        self.with_clients(|clients| {
            let mut found = false;
            for client in clients.iter_mut() {
                let before = client.readings_history.len();
                client.readings_history.retain(|r| r.id != id);
                found |= client.readings_history.len() != before;
            }
            if found {
                Ok(())
            } else {
                Err(PersistenceError::NotFound(format!("reading {id}")))
            }
        })
    }

    fn list_layouts(&self) -> Result<StoredLayouts, PersistenceError> {
        Ok(StoredLayouts {
            layouts: self.read(LAYOUTS_KEY)?.unwrap_or_default(),
            presets: self.read(PRESETS_KEY)?.unwrap_or_default(),
        })
    }

    fn save_layout(&mut self, layout: &SpreadTemplate, kind: LayoutKind) -> Result<(), PersistenceError> {
        let key = match kind {
            LayoutKind::Layout => LAYOUTS_KEY,
            LayoutKind::Preset => PRESETS_KEY,
        };
        self.with_layouts(key, |layouts| {
            layouts.retain(|l| l.id != layout.id);
            layouts.push(layout.clone());
            true
        })?;
        Ok(())
    }

    fn delete_layout(&mut self, id: &str) -> Result<(), PersistenceError> {
        let mut found = false;
        for key in [LAYOUTS_KEY, PRESETS_KEY] {
            found |= self.with_layouts(key, |layouts| {
                let before = layouts.len();
                layouts.retain(|l| l.id != id);
                layouts.len() != before
            })?;
        }
        if found {
            Ok(())
        } else {
            Err(PersistenceError::NotFound(format!("layout {id}")))
        }
    }

    fn load_last_state(&self) -> Result<Option<LastState>, PersistenceError> {
        self.read(LAST_STATE_KEY)
    }

    fn save_last_state(&mut self, state: &LastState) -> Result<(), PersistenceError> {
        self.write(LAST_STATE_KEY, state)
    }
}
