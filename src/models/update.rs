//! Update model matching the frontend GameUpdate interface.

use serde::{Deserialize, Serialize};

/// Evolution state of a unit.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum UnitStatus {
    Evo,
    #[default]
    Unevo,
}

impl UnitStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnitStatus::Evo => "Evo",
            UnitStatus::Unevo => "Unevo",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "Evo" => Some(UnitStatus::Evo),
            "Unevo" => Some(UnitStatus::Unevo),
            _ => None,
        }
    }
}

/// A playable character introduced by an update.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Unit {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub image_url: String,
    #[serde(default)]
    pub status: UnitStatus,
}

/// A titled entry: new content, a buff, a nerf or an optimization.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ContentItem {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
}

/// A redeemable code. Addressed by its index in the parent list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CodeEntry {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub reward: String,
}

/// A named game update (version/patch) and everything it ships.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Update {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub units: Vec<Unit>,
    #[serde(default)]
    pub content_items: Vec<ContentItem>,
    /// Legacy list, kept so older snapshots round-trip.
    #[serde(default)]
    pub buffs: Vec<ContentItem>,
    /// Legacy list, kept so older snapshots round-trip.
    #[serde(default)]
    pub nerfs: Vec<ContentItem>,
    #[serde(default)]
    pub qol: Vec<ContentItem>,
    #[serde(default)]
    pub codes: Vec<CodeEntry>,
}

impl Update {
    /// Create an update with every child list empty.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            units: Vec::new(),
            content_items: Vec::new(),
            buffs: Vec::new(),
            nerfs: Vec::new(),
            qol: Vec::new(),
            codes: Vec::new(),
        }
    }

    /// The update every empty store starts with.
    pub fn initial() -> Self {
        Self::new(DEFAULT_UPDATE_ID, DEFAULT_UPDATE_NAME)
    }

    /// Apply a whole-field patch. Returns true if any field changed.
    pub fn apply(&mut self, patch: &UpdatePatch) -> bool {
        let before = self.clone();

        if let Some(name) = &patch.name {
            self.name = name.clone();
        }
        if let Some(units) = &patch.units {
            self.units = units.clone();
        }
        if let Some(items) = &patch.content_items {
            self.content_items = items.clone();
        }
        if let Some(items) = &patch.buffs {
            self.buffs = items.clone();
        }
        if let Some(items) = &patch.nerfs {
            self.nerfs = items.clone();
        }
        if let Some(items) = &patch.qol {
            self.qol = items.clone();
        }
        if let Some(codes) = &patch.codes {
            self.codes = codes.clone();
        }

        *self != before
    }
}

/// Id of the synthesized first update.
pub const DEFAULT_UPDATE_ID: &str = "1";

/// Name of the synthesized first update.
pub const DEFAULT_UPDATE_NAME: &str = "Update v1.0";

/// Partial update: every present field replaces the stored field whole.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub units: Option<Vec<Unit>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_items: Option<Vec<ContentItem>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buffs: Option<Vec<ContentItem>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nerfs: Option<Vec<ContentItem>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qol: Option<Vec<ContentItem>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub codes: Option<Vec<CodeEntry>>,
}

/// Request body for renaming an update.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenameUpdateRequest {
    pub name: String,
}
