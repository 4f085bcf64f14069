//! The persona library: saved personas with usage stats and ratings.
//!
//! The whole library is one JSON document kept under
//! [`LIBRARY_KEY`] in a [`KeyValueStore`]. Every mutation writes the document
//! back. Entries hold independent copies of personas; nothing here touches a
//! live [`crate::SegState`].

pub mod storage;

pub use storage::{KeyValueStore, MemoryKv, SqliteKv};

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::{Result, SegError};
use crate::persona::Persona;
use crate::types::Timestamp;

/// Storage key of the library document.
pub const LIBRARY_KEY: &str = "sentience_persona_library";

/// Current document version.
pub const LIBRARY_VERSION: &str = "1.0.0";

/// Rating assumed for unrated entries when scoring for cleanup.
const UNRATED_SCORE: f64 = 3.0;

/// One saved persona.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LibraryEntry {
    /// `persona_…` id.
    pub id: String,
    /// The stored persona.
    pub persona: Persona,
    /// Display name (defaults to the persona's name).
    pub name: String,
    /// Optional free-text description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Caller tags plus the archetype.
    #[serde(default)]
    pub tags: Vec<String>,
    /// When saved.
    pub created_at: Timestamp,
    /// When last loaded.
    pub last_used: Timestamp,
    /// Times loaded.
    #[serde(default)]
    pub use_count: u32,
    /// 1 to 5 stars.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<u8>,
    /// Whether this is the default persona.
    #[serde(default)]
    pub is_default: bool,
}

impl LibraryEntry {
    fn matches(&self, query: &str) -> bool {
        let contains = |s: &str| s.to_lowercase().contains(query);
        contains(&self.name)
            || self.description.as_deref().is_some_and(contains)
            || contains(&self.persona.archetype)
            || self.tags.iter().any(|t| contains(t))
            || contains(&self.persona.profession)
    }

    /// Cleanup score: `rating·0.4 + useCount·0.3 + lastUsed·0.3`, unrated
    /// entries counting as 3 stars. `lastUsed` is in milliseconds, so recency
    /// dominates.
    #[must_use]
    pub fn retention_score(&self) -> f64 {
        let rating = self.rating.map_or(UNRATED_SCORE, f64::from);
        rating * 0.4 + f64::from(self.use_count) * 0.3 + self.last_used.0 as f64 * 0.3
    }
}

/// The stored document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LibraryDocument {
    /// Saved personas in insertion order.
    #[serde(default)]
    pub entries: Vec<LibraryEntry>,
    /// Id of the default persona.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_persona_id: Option<String>,
    /// Document version.
    pub version: String,
}

impl Default for LibraryDocument {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            default_persona_id: None,
            version: LIBRARY_VERSION.to_string(),
        }
    }
}

impl LibraryDocument {
    /// Carry entries and the default id over from a document of another
    /// version. Entries that no longer parse are dropped.
    fn migrate(old: &Value) -> Self {
        let entries = old
            .get("entries")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| serde_json::from_value::<LibraryEntry>(item.clone()).ok())
                    .collect()
            })
            .unwrap_or_default();
        let default_persona_id = old
            .get("defaultPersonaId")
            .and_then(Value::as_str)
            .map(str::to_string);
        Self {
            entries,
            default_persona_id,
            version: LIBRARY_VERSION.to_string(),
        }
    }
}

/// Library statistics.
#[derive(Debug, Clone, PartialEq)]
pub struct LibraryStats {
    /// Number of entries.
    pub total: usize,
    /// Entries per archetype.
    pub archetype_counts: BTreeMap<String, usize>,
    /// Mean rating over rated entries, 0 when none are rated.
    pub average_rating: f64,
    /// Entry with the highest use count.
    pub most_used: Option<LibraryEntry>,
    /// Up to five newest entries, newest first.
    pub recently_added: Vec<LibraryEntry>,
}

/// Saved personas over a key/value backend.
#[derive(Debug)]
pub struct PersonaLibrary<S: KeyValueStore> {
    store: S,
    doc: LibraryDocument,
    last_stamp: Timestamp,
}

impl<S: KeyValueStore> PersonaLibrary<S> {
    /// Load the library from `store`.
    ///
    /// A missing or unreadable document yields an empty library. A document
    /// of another version is migrated and written back.
    ///
    /// # Errors
    ///
    /// Backend failures.
    pub fn open(mut store: S) -> Result<Self> {
        let doc = match store.get(LIBRARY_KEY)? {
            None => LibraryDocument::default(),
            Some(raw) => match serde_json::from_str::<Value>(&raw) {
                Err(e) => {
                    warn!(error = %e, "Persona library unreadable, starting empty");
                    LibraryDocument::default()
                }
                Ok(value) if value.get("version").and_then(Value::as_str) != Some(LIBRARY_VERSION) => {
                    let found = value.get("version").and_then(Value::as_str).unwrap_or("none");
                    warn!(found, "Migrating persona library");
                    let doc = LibraryDocument::migrate(&value);
                    store.set(LIBRARY_KEY, &encode(&doc)?)?;
                    doc
                }
                Ok(value) => serde_json::from_value(value).unwrap_or_else(|e| {
                    warn!(error = %e, "Persona library malformed, starting empty");
                    LibraryDocument::default()
                }),
            },
        };
        debug!(entries = doc.entries.len(), "Persona library loaded");
        Ok(Self {
            store,
            doc,
            last_stamp: Timestamp(0),
        })
    }

    /// The backing store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.doc.entries.len()
    }

    /// Whether the library is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.doc.entries.is_empty()
    }

    /// Save a copy of `persona` and return the new entry's id.
    ///
    /// # Errors
    ///
    /// Backend failures.
    pub fn save_persona(
        &mut self,
        persona: &Persona,
        name: Option<&str>,
        description: Option<&str>,
        tags: &[String],
    ) -> Result<String> {
        let now = self.stamp();
        let id = format!("persona_{}", &uuid::Uuid::new_v4().simple().to_string()[..12]);
        let mut all_tags = tags.to_vec();
        all_tags.push(persona.archetype.clone());
        self.doc.entries.push(LibraryEntry {
            id: id.clone(),
            persona: persona.clone(),
            name: name
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .unwrap_or(&persona.name)
                .to_string(),
            description: description.map(str::to_string),
            tags: all_tags,
            created_at: now,
            last_used: now,
            use_count: 0,
            rating: None,
            is_default: false,
        });
        self.persist()?;
        info!(id = %id, name = %persona.name, archetype = %persona.archetype, "Saved persona to library");
        Ok(id)
    }

    /// Load an entry, bumping its use count and last-used time.
    ///
    /// # Errors
    ///
    /// Backend failures.
    pub fn load_persona(&mut self, id: &str) -> Result<Option<LibraryEntry>> {
        let now = self.stamp();
        let Some(entry) = self.doc.entries.iter_mut().find(|e| e.id == id) else {
            return Ok(None);
        };
        entry.last_used = now;
        entry.use_count += 1;
        let entry = entry.clone();
        self.persist()?;
        Ok(Some(entry))
    }

    /// Look up an entry without touching its stats.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&LibraryEntry> {
        self.doc.entries.iter().find(|e| e.id == id)
    }

    /// All entries, most recently used first.
    #[must_use]
    pub fn all_personas(&self) -> Vec<&LibraryEntry> {
        let mut entries: Vec<&LibraryEntry> = self.doc.entries.iter().collect();
        entries.sort_by(|a, b| b.last_used.cmp(&a.last_used));
        entries
    }

    /// Entries whose name, description, archetype, tags or profession
    /// contain `query` (case-insensitive).
    #[must_use]
    pub fn search_personas(&self, query: &str) -> Vec<&LibraryEntry> {
        let query = query.trim().to_lowercase();
        self.doc.entries.iter().filter(|e| e.matches(&query)).collect()
    }

    /// Entries of one archetype.
    #[must_use]
    pub fn personas_by_archetype(&self, archetype: &str) -> Vec<&LibraryEntry> {
        self.doc
            .entries
            .iter()
            .filter(|e| e.persona.archetype == archetype)
            .collect()
    }

    /// Delete an entry. Clears the default if it pointed here.
    ///
    /// # Errors
    ///
    /// Backend failures.
    pub fn delete_persona(&mut self, id: &str) -> Result<bool> {
        let Some(index) = self.doc.entries.iter().position(|e| e.id == id) else {
            return Ok(false);
        };
        if self.doc.default_persona_id.as_deref() == Some(id) {
            self.doc.default_persona_id = None;
        }
        self.doc.entries.remove(index);
        self.persist()?;
        debug!(id, "Deleted persona from library");
        Ok(true)
    }

    /// Rate an entry 1 to 5. Out-of-range ratings and unknown ids are
    /// ignored and return `false`.
    ///
    /// # Errors
    ///
    /// Backend failures.
    pub fn rate_persona(&mut self, id: &str, rating: u8) -> Result<bool> {
        if !(1..=5).contains(&rating) {
            return Ok(false);
        }
        let Some(entry) = self.doc.entries.iter_mut().find(|e| e.id == id) else {
            return Ok(false);
        };
        entry.rating = Some(rating);
        self.persist()?;
        Ok(true)
    }

    /// Make an entry the default.
    ///
    /// # Errors
    ///
    /// Backend failures.
    pub fn set_default(&mut self, id: &str) -> Result<bool> {
        if self.get(id).is_none() {
            return Ok(false);
        }
        for entry in &mut self.doc.entries {
            entry.is_default = entry.id == id;
        }
        self.doc.default_persona_id = Some(id.to_string());
        self.persist()?;
        Ok(true)
    }

    /// Load the default entry, if any.
    ///
    /// # Errors
    ///
    /// Backend failures.
    pub fn default_persona(&mut self) -> Result<Option<LibraryEntry>> {
        match self.doc.default_persona_id.clone() {
            Some(id) => self.load_persona(&id),
            None => Ok(None),
        }
    }

    /// The library document as pretty JSON.
    ///
    /// # Errors
    ///
    /// [`SegError::Serialization`] on encoding failure.
    pub fn export_library(&self) -> Result<String> {
        serde_json::to_string_pretty(&self.doc).map_err(|e| SegError::Serialization(e.to_string()))
    }

    /// Import a library document and return how many entries were added.
    ///
    /// With `merge`, entries whose ids already exist are skipped. Without it
    /// the library is replaced.
    ///
    /// # Errors
    ///
    /// [`SegError::InvalidState`] if `json` is not a library document;
    /// backend failures.
    pub fn import_library(&mut self, json: &str, merge: bool) -> Result<usize> {
        let imported: LibraryDocument =
            serde_json::from_str(json).map_err(|e| SegError::InvalidState(e.to_string()))?;
        let added = if merge {
            let before = self.doc.entries.len();
            for entry in imported.entries {
                if self.get(&entry.id).is_none() {
                    self.doc.entries.push(entry);
                }
            }
            self.doc.entries.len() - before
        } else {
            let count = imported.entries.len();
            self.doc = LibraryDocument {
                version: LIBRARY_VERSION.to_string(),
                ..imported
            };
            count
        };
        self.persist()?;
        info!(added, merge, total = self.doc.entries.len(), "Imported persona library");
        Ok(added)
    }

    /// Summary statistics.
    #[must_use]
    pub fn stats(&self) -> LibraryStats {
        let entries = &self.doc.entries;
        let mut archetype_counts = BTreeMap::new();
        for entry in entries {
            *archetype_counts.entry(entry.persona.archetype.clone()).or_insert(0) += 1;
        }

        let ratings: Vec<f64> = entries.iter().filter_map(|e| e.rating).map(f64::from).collect();
        let average_rating = if ratings.is_empty() {
            0.0
        } else {
            ratings.iter().sum::<f64>() / ratings.len() as f64
        };

        let most_used = entries
            .iter()
            .fold(None::<&LibraryEntry>, |best, e| match best {
                Some(b) if b.use_count >= e.use_count => Some(b),
                _ => Some(e),
            })
            .cloned();

        let mut recent: Vec<&LibraryEntry> = entries.iter().collect();
        recent.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let recently_added = recent.into_iter().take(5).cloned().collect();

        LibraryStats {
            total: entries.len(),
            archetype_counts,
            average_rating,
            most_used,
            recently_added,
        }
    }

    /// Trim the library to `max_entries` and return how many were removed.
    ///
    /// Nothing happens while the library is within bounds. Otherwise entries
    /// rated below `min_rating` go first, then the lowest
    /// [`LibraryEntry::retention_score`].
    ///
    /// # Errors
    ///
    /// Backend failures.
    pub fn cleanup(&mut self, max_entries: usize, min_rating: u8) -> Result<usize> {
        let before = self.doc.entries.len();
        if before <= max_entries {
            return Ok(0);
        }
        let below = |e: &LibraryEntry| e.rating.is_some_and(|r| r < min_rating);
        self.doc.entries.sort_by(|a, b| {
            below(a)
                .cmp(&below(b))
                .then_with(|| b.retention_score().total_cmp(&a.retention_score()))
        });
        self.doc.entries.truncate(max_entries);
        if let Some(id) = self.doc.default_persona_id.clone() {
            if self.get(&id).is_none() {
                self.doc.default_persona_id = None;
            }
        }
        self.persist()?;
        let removed = before - self.doc.entries.len();
        info!(removed, remaining = self.doc.entries.len(), "Cleaned up persona library");
        Ok(removed)
    }

    /// Wall-clock time, strictly later than any previous stamp.
    fn stamp(&mut self) -> Timestamp {
        let now = Timestamp::wall_clock().max(self.last_stamp.plus_millis(1));
        self.last_stamp = now;
        now
    }

    fn persist(&mut self) -> Result<()> {
        let json = encode(&self.doc)?;
        self.store.set(LIBRARY_KEY, &json)
    }
}

fn encode(doc: &LibraryDocument) -> Result<String> {
    serde_json::to_string(doc).map_err(|e| SegError::Serialization(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persona::generator::PersonaGenerator;
    use crate::persona::archetype::find;
    use crate::random::SeededRandom;

    fn persona(archetype: &str, seed: u64) -> Persona {
        let mut rng = SeededRandom::seeded(seed);
        PersonaGenerator::fallback(find(archetype).expect("archetype"), &mut rng)
    }

    fn library() -> PersonaLibrary<MemoryKv> {
        PersonaLibrary::open(MemoryKv::new()).expect("open")
    }

    #[test]
    fn save_tags_with_archetype_and_persists() {
        let mut lib = library();
        let p = persona("mystic", 1);
        let id = lib
            .save_persona(&p, Some("Star reader"), Some("quiet"), &["night".to_string()])
            .expect("save");
        assert!(id.starts_with("persona_"));
        let entry = lib.get(&id).expect("entry");
        assert_eq!(entry.name, "Star reader");
        assert_eq!(entry.tags, vec!["night", "mystic"]);
        assert!(lib.store().get(LIBRARY_KEY).expect("get").is_some());
    }

    #[test]
    fn load_bumps_usage_and_ordering() {
        let mut lib = library();
        let a = lib.save_persona(&persona("scholar", 1), None, None, &[]).expect("save");
        let b = lib.save_persona(&persona("artisan", 2), None, None, &[]).expect("save");
        assert_eq!(lib.all_personas()[0].id, b);
        let loaded = lib.load_persona(&a).expect("load").expect("entry");
        assert_eq!(loaded.use_count, 1);
        assert_eq!(lib.all_personas()[0].id, a);
        assert!(lib.load_persona("persona_missing").expect("load").is_none());
    }

    #[test]
    fn search_and_archetype_filter() {
        let mut lib = library();
        lib.save_persona(&persona("guardian", 1), None, Some("Keeps the coast"), &[]).expect("save");
        lib.save_persona(&persona("wanderer", 2), None, None, &["road".into()]).expect("save");
        assert_eq!(lib.search_personas("COAST").len(), 1);
        assert_eq!(lib.search_personas("road").len(), 1);
        assert_eq!(lib.search_personas("guardian").len(), 1);
        assert_eq!(lib.personas_by_archetype("wanderer").len(), 1);
        assert!(lib.personas_by_archetype("mystic").is_empty());
    }

    #[test]
    fn rating_bounds() {
        let mut lib = library();
        let id = lib.save_persona(&persona("artisan", 1), None, None, &[]).expect("save");
        assert!(!lib.rate_persona(&id, 0).expect("rate"));
        assert!(!lib.rate_persona(&id, 6).expect("rate"));
        assert!(!lib.rate_persona("nope", 3).expect("rate"));
        assert!(lib.rate_persona(&id, 4).expect("rate"));
        assert_eq!(lib.get(&id).and_then(|e| e.rating), Some(4));
    }

    #[test]
    fn default_is_cleared_on_delete() {
        let mut lib = library();
        let a = lib.save_persona(&persona("scholar", 1), None, None, &[]).expect("save");
        let b = lib.save_persona(&persona("scholar", 2), None, None, &[]).expect("save");
        assert!(lib.set_default(&a).expect("default"));
        assert!(lib.set_default(&b).expect("default"));
        assert!(!lib.get(&a).expect("a").is_default);
        assert_eq!(lib.default_persona().expect("default").map(|e| e.id), Some(b.clone()));
        assert!(lib.delete_persona(&b).expect("delete"));
        assert!(lib.default_persona().expect("default").is_none());
        assert!(!lib.delete_persona(&b).expect("delete"));
    }

    #[test]
    fn export_import_merge_and_replace() {
        let mut source = library();
        let id = source.save_persona(&persona("mystic", 1), None, None, &[]).expect("save");
        let json = source.export_library().expect("export");

        let mut target = library();
        target.save_persona(&persona("artisan", 2), None, None, &[]).expect("save");
        assert_eq!(target.import_library(&json, true).expect("merge"), 1);
        assert_eq!(target.import_library(&json, true).expect("merge again"), 0);
        assert_eq!(target.len(), 2);

        assert_eq!(target.import_library(&json, false).expect("replace"), 1);
        assert_eq!(target.len(), 1);
        assert!(target.get(&id).is_some());

        assert!(matches!(target.import_library("[]", false), Err(SegError::InvalidState(_))));
    }

    #[test]
    fn stats_summarise() {
        let mut lib = library();
        let a = lib.save_persona(&persona("mystic", 1), None, None, &[]).expect("save");
        let b = lib.save_persona(&persona("mystic", 2), None, None, &[]).expect("save");
        lib.save_persona(&persona("scholar", 3), None, None, &[]).expect("save");
        lib.rate_persona(&a, 5).expect("rate");
        lib.rate_persona(&b, 2).expect("rate");
        lib.load_persona(&b).expect("load");
        let stats = lib.stats();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.archetype_counts.get("mystic"), Some(&2));
        assert!((stats.average_rating - 3.5).abs() < 1e-9);
        assert_eq!(stats.most_used.map(|e| e.id), Some(b));
        assert_eq!(stats.recently_added.len(), 3);
    }

    #[test]
    fn cleanup_keeps_best_entries() {
        let mut lib = library();
        let mut ids = Vec::new();
        for seed in 0..5 {
            ids.push(lib.save_persona(&persona("artisan", seed), None, None, &[]).expect("save"));
        }
        assert_eq!(lib.cleanup(10, 2).expect("cleanup"), 0);
        lib.rate_persona(&ids[4], 1).expect("rate");
        assert_eq!(lib.cleanup(3, 2).expect("cleanup"), 2);
        assert_eq!(lib.len(), 3);
        // the newest entry was rated below the minimum and goes first
        assert!(lib.get(&ids[4]).is_none());
        assert!(lib.get(&ids[3]).is_some());
        assert!(lib.get(&ids[2]).is_some());
    }

    #[test]
    fn old_versions_are_migrated() {
        let p = persona("wanderer", 1);
        let entry = serde_json::json!({
            "id": "persona_old", "persona": p, "name": "Old", "tags": ["wanderer"],
            "createdAt": 1, "lastUsed": 2, "useCount": 3
        });
        let old = serde_json::json!({ "entries": [entry, {"broken": true}], "defaultPersonaId": "persona_old", "version": "0.9" });
        let mut kv = MemoryKv::new();
        kv.set(LIBRARY_KEY, &old.to_string()).expect("seed");

        let lib = PersonaLibrary::open(kv).expect("open");
        assert_eq!(lib.len(), 1);
        let stored = lib.store().get(LIBRARY_KEY).expect("get").expect("written back");
        assert!(stored.contains("\"version\":\"1.0.0\""));
    }

    #[test]
    fn unversioned_document_is_migrated_with_its_default() {
        let p = persona("mystic", 2);
        let entry = serde_json::json!({
            "id": "persona_keep", "persona": p, "name": "Keep", "tags": [],
            "createdAt": 5, "lastUsed": 5, "useCount": 0
        });
        let old = serde_json::json!({ "entries": [entry], "defaultPersonaId": "persona_keep" });
        let mut kv = MemoryKv::new();
        kv.set(LIBRARY_KEY, &old.to_string()).expect("seed");

        let mut lib = PersonaLibrary::open(kv).expect("open");
        assert_eq!(lib.get("persona_keep").map(|e| e.name.as_str()), Some("Keep"));
        let default = lib.default_persona().expect("default").expect("carried over");
        assert_eq!(default.id, "persona_keep");

        let reopened = PersonaLibrary::open(lib.store().clone()).expect("reopen");
        assert_eq!(reopened.len(), 1);
    }

    #[test]
    fn sqlite_backed_library_survives_reopen() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("library.db");
        let id = {
            let mut lib = PersonaLibrary::open(SqliteKv::open(&path).expect("open")).expect("library");
            lib.save_persona(&persona("guardian", 4), None, None, &[]).expect("save")
        };
        let lib = PersonaLibrary::open(SqliteKv::open(&path).expect("reopen")).expect("library");
        assert_eq!(lib.get(&id).map(|e| e.persona.archetype.as_str()), Some("guardian"));
    }
}
