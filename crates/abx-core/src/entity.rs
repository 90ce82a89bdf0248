//! Entities (catalog factories / lister collections) and the per-entity
//! item-id envelope that hands work from enumeration to the export driver.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The two parallel product-grouping taxonomies the back office exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Catalog,
    Lister,
}

impl EntityKind {
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            EntityKind::Catalog => "catalog",
            EntityKind::Lister => "lister",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// One product grouping: server-side numeric id plus display name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    pub id: String,
    pub name: String,
    /// Item count recorded by the last enumeration run, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_count: Option<usize>,
}

/// The JSON envelope written per entity after enumeration and consumed by
/// the export driver. Field names are the on-disk contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemIdList {
    pub entity_id: String,
    pub entity_name: String,
    pub item_count: usize,
    pub item_ids: Vec<String>,
}

#[derive(Debug, Error)]
pub enum EnvelopeError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("{path} has no entity_id")]
    MissingEntityId { path: PathBuf },

    #[error("{path} contains an empty item_ids list")]
    EmptyItemIds { path: PathBuf },
}

impl ItemIdList {
    #[must_use]
    pub fn new(entity_id: String, entity_name: String, item_ids: Vec<String>) -> Self {
        Self {
            entity_id,
            entity_name,
            item_count: item_ids.len(),
            item_ids,
        }
    }

    /// Loads and validates an envelope file.
    ///
    /// Blank item ids are dropped; an envelope that ends up empty is an
    /// error, since there is nothing to export from it.
    ///
    /// # Errors
    ///
    /// [`EnvelopeError`] on unreadable files, malformed JSON, missing
    /// `entity_id`, or an empty id list.
    pub fn load(path: &Path) -> Result<Self, EnvelopeError> {
        let raw = std::fs::read_to_string(path).map_err(|source| EnvelopeError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut envelope: Self =
            serde_json::from_str(&raw).map_err(|source| EnvelopeError::Json {
                path: path.to_path_buf(),
                source,
            })?;
        if envelope.entity_id.trim().is_empty() {
            return Err(EnvelopeError::MissingEntityId {
                path: path.to_path_buf(),
            });
        }
        envelope.item_ids = envelope
            .item_ids
            .into_iter()
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .collect();
        if envelope.item_ids.is_empty() {
            return Err(EnvelopeError::EmptyItemIds {
                path: path.to_path_buf(),
            });
        }
        envelope.item_count = envelope.item_ids.len();
        Ok(envelope)
    }

    /// Serializes the envelope to pretty JSON and writes it.
    ///
    /// # Errors
    ///
    /// [`EnvelopeError::Io`] when the parent directory cannot be created or
    /// the file cannot be written.
    pub fn save(&self, path: &Path) -> Result<(), EnvelopeError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| EnvelopeError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        }
        let body = serde_json::to_string_pretty(self).map_err(|source| EnvelopeError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        std::fs::write(path, body).map_err(|source| EnvelopeError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Loads a discovered entity list (`factories.json` / `collections.json`),
/// dropping records with a blank id or name.
///
/// # Errors
///
/// [`EnvelopeError`] on unreadable or malformed files.
pub fn load_entities(path: &Path) -> Result<Vec<Entity>, EnvelopeError> {
    let raw = std::fs::read_to_string(path).map_err(|source| EnvelopeError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let parsed: Vec<Entity> = serde_json::from_str(&raw).map_err(|source| EnvelopeError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(parsed
        .into_iter()
        .filter(|e| !e.id.trim().is_empty() && !e.name.trim().is_empty())
        .collect())
}

/// Writes a discovered entity list as pretty JSON.
///
/// # Errors
///
/// [`EnvelopeError::Io`] on filesystem failure.
pub fn save_entities(path: &Path, entities: &[Entity]) -> Result<(), EnvelopeError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| EnvelopeError::Io {
            path: path.to_path_buf(),
            source,
        })?;
    }
    let body = serde_json::to_string_pretty(entities).map_err(|source| EnvelopeError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    std::fs::write(path, body).map_err(|source| EnvelopeError::Io {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
#[path = "entity_test.rs"]
mod tests;
