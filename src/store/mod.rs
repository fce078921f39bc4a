//! In-memory entity store for the update collection.
//!
//! Every mutation builds a new collection and swaps it in, so a caller holding
//! an `Arc` from before the change keeps seeing the old state and can detect
//! changes with `Arc::ptr_eq`.

use std::collections::HashSet;
use std::sync::Arc;

use crate::models::{ExtractedEntities, Update, UpdatePatch};

/// The update collection plus the currently selected update.
#[derive(Debug, Clone, Default)]
pub struct EntityStore {
    updates: Arc<Vec<Update>>,
    active_update_id: Option<String>,
}

impl EntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn updates(&self) -> &Arc<Vec<Update>> {
        &self.updates
    }

    pub fn len(&self) -> usize {
        self.updates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.updates.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Update> {
        self.updates.iter().find(|u| u.id == id)
    }

    pub fn active_update_id(&self) -> Option<&str> {
        self.active_update_id.as_deref()
    }

    pub fn active_update(&self) -> Option<&Update> {
        self.active_update_id().and_then(|id| self.get(id))
    }

    /// Replace the whole collection. Duplicate ids keep their first occurrence.
    pub fn replace_all(&mut self, updates: Vec<Update>) -> bool {
        let mut seen = HashSet::new();
        let deduped: Vec<Update> = updates
            .into_iter()
            .filter(|u| {
                let fresh = seen.insert(u.id.clone());
                if !fresh {
                    tracing::warn!("Dropping duplicate update id {} from snapshot", u.id);
                }
                fresh
            })
            .collect();

        if *self.updates == deduped {
            return false;
        }
        self.updates = Arc::new(deduped);
        true
    }

    /// Apply a whole-field patch to one update. The name is trimmed like
    /// `rename`. Blank names and lists with repeated child ids are rejected.
    pub fn patch(&mut self, id: &str, patch: &UpdatePatch) -> bool {
        let mut patch = patch.clone();
        if let Some(name) = patch.name.as_mut() {
            let trimmed = name.trim();
            if trimmed.is_empty() {
                return false;
            }
            *name = trimmed.to_string();
        }

        let unique = patch
            .units
            .as_deref()
            .map_or(true, |units| unique_ids(units.iter().map(|u| u.id.as_str())))
            && [&patch.content_items, &patch.buffs, &patch.nerfs, &patch.qol]
                .into_iter()
                .flatten()
                .all(|items| unique_ids(items.iter().map(|i| i.id.as_str())));
        if !unique {
            tracing::warn!(update_id = id, "Rejected patch with repeated child ids");
            return false;
        }

        self.modify(|updates| match updates.iter_mut().find(|u| u.id == id) {
            Some(update) => update.apply(&patch),
            None => false,
        })
    }

    /// Select an update. Unknown ids leave no update active.
    pub fn select(&mut self, id: &str) -> bool {
        let next = self.get(id).map(|u| u.id.clone());
        if next == self.active_update_id {
            return false;
        }
        self.active_update_id = next;
        true
    }

    /// Append an update. Rejected if the id is already taken.
    pub fn add(&mut self, update: Update) -> bool {
        if self.get(&update.id).is_some() {
            return false;
        }
        self.modify(|updates| {
            updates.push(update);
            true
        })
    }

    /// Rename an update. The name is trimmed; blank names are rejected.
    pub fn rename(&mut self, id: &str, name: &str) -> bool {
        let name = name.trim();
        if name.is_empty() {
            return false;
        }
        self.modify(|updates| match updates.iter_mut().find(|u| u.id == id) {
            Some(update) if update.name != name => {
                update.name = name.to_string();
                true
            }
            _ => false,
        })
    }

    /// Remove an update. The last remaining update cannot be removed; removing
    /// the active update makes the first remaining one active.
    pub fn remove(&mut self, id: &str) -> bool {
        if self.updates.len() <= 1 {
            return false;
        }
        let removed = self.modify(|updates| {
            let before = updates.len();
            updates.retain(|u| u.id != id);
            updates.len() != before
        });

        if removed && self.active_update_id.as_deref() == Some(id) {
            self.active_update_id = self.updates.first().map(|u| u.id.clone());
        }
        removed
    }

    /// Append an extracted batch to one update, all four lists at once.
    pub fn append_extracted(&mut self, id: &str, batch: &ExtractedEntities) -> bool {
        if batch.is_empty() {
            return false;
        }
        self.modify(|updates| match updates.iter_mut().find(|u| u.id == id) {
            Some(update) => {
                update.units.extend(batch.units.iter().cloned());
                update.codes.extend(batch.codes.iter().cloned());
                update.content_items.extend(batch.content_items.iter().cloned());
                update.qol.extend(batch.qol.iter().cloned());
                true
            }
            None => false,
        })
    }

    /// A fresh update id derived from the clock, bumped until unused.
    pub fn next_update_id(&self, now_millis: i64) -> String {
        let mut candidate = now_millis;
        while self.get(&candidate.to_string()).is_some() {
            candidate += 1;
        }
        candidate.to_string()
    }

    /// Default name for the next update added.
    pub fn next_update_name(&self) -> String {
        format!("Update {}", self.updates.len() + 1)
    }

    fn modify(&mut self, f: impl FnOnce(&mut Vec<Update>) -> bool) -> bool {
        let mut next = Vec::clone(&self.updates);
        if !f(&mut next) {
            return false;
        }
        self.updates = Arc::new(next);
        true
    }
}

fn unique_ids<'a>(ids: impl Iterator<Item = &'a str>) -> bool {
    let mut seen = HashSet::new();
    ids.into_iter().all(|id| seen.insert(id))
}
