use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use crate::abilities::{AbilityClass, AttributeSetClass};

/// Soft reference to an asset by path. Resolution happens against an
/// [`AssetCatalog`] at grant time, never at config load time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetPath(String);

impl AssetPath {
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AssetPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AssetPath {
    fn from(path: &str) -> Self {
        Self(path.to_string())
    }
}

impl From<String> for AssetPath {
    fn from(path: String) -> Self {
        Self(path)
    }
}

/// One row of attribute initialization data.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AttributeRow {
    pub base_value: f64,
    #[serde(default)]
    pub min_value: Option<f64>,
    #[serde(default)]
    pub max_value: Option<f64>,
}

impl AttributeRow {
    pub fn clamped_base(&self) -> f64 {
        let mut value = self.base_value;
        if let Some(min) = self.min_value {
            value = value.max(min);
        }
        if let Some(max) = self.max_value {
            value = value.min(max);
        }
        value
    }
}

/// Named table of per-attribute initialization rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataTable {
    pub name: String,
    #[serde(default)]
    pub rows: HashMap<String, AttributeRow>,
}

impl DataTable {
    pub fn from_json_str(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }
}

#[derive(Default)]
struct CatalogState {
    ability_classes: HashMap<AssetPath, Arc<AbilityClass>>,
    attribute_set_classes: HashMap<AssetPath, Arc<AttributeSetClass>>,
    data_tables: HashMap<AssetPath, Arc<DataTable>>,
}

/// Resolves soft asset references to loaded definition objects.
#[derive(Clone, Default)]
pub struct AssetCatalog {
    inner: Arc<Mutex<CatalogState>>,
}

impl AssetCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_ability_class(&self, path: impl Into<AssetPath>, class: AbilityClass) {
        if let Ok(mut state) = self.inner.lock() {
            state.ability_classes.insert(path.into(), Arc::new(class));
        }
    }

    pub fn resolve_ability_class(&self, path: &AssetPath) -> Option<Arc<AbilityClass>> {
        let state = self.inner.lock().ok()?;
        state.ability_classes.get(path).cloned()
    }

    pub fn register_attribute_set_class(
        &self,
        path: impl Into<AssetPath>,
        class: AttributeSetClass,
    ) {
        if let Ok(mut state) = self.inner.lock() {
            state.attribute_set_classes.insert(path.into(), Arc::new(class));
        }
    }

    pub fn resolve_attribute_set_class(&self, path: &AssetPath) -> Option<Arc<AttributeSetClass>> {
        let state = self.inner.lock().ok()?;
        state.attribute_set_classes.get(path).cloned()
    }

    pub fn register_data_table(&self, path: impl Into<AssetPath>, table: DataTable) {
        if let Ok(mut state) = self.inner.lock() {
            state.data_tables.insert(path.into(), Arc::new(table));
        }
    }

    pub fn resolve_data_table(&self, path: &AssetPath) -> Option<Arc<DataTable>> {
        let state = self.inner.lock().ok()?;
        state.data_tables.get(path).cloned()
    }
}

/// Load state a bundled asset is declared for.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum BundleLoadState {
    Client,
    Server,
}

impl BundleLoadState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Client => "client",
            Self::Server => "server",
        }
    }
}

impl fmt::Display for BundleLoadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Asset-bundle declarations collected for content cooking. Set-backed, so
/// registering the same reference twice is idempotent.
#[derive(Debug, Clone, Default)]
pub struct AssetBundleData {
    entries: BTreeSet<(BundleLoadState, AssetPath)>,
}

impl AssetBundleData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false when the asset was already declared for this state.
    pub fn add_bundle_asset(&mut self, state: BundleLoadState, path: &AssetPath) -> bool {
        self.entries.insert((state, path.clone()))
    }

    pub fn contains(&self, state: BundleLoadState, path: &AssetPath) -> bool {
        self.entries.contains(&(state, path.clone()))
    }

    pub fn assets_for_state(&self, state: BundleLoadState) -> Vec<AssetPath> {
        self.entries
            .iter()
            .filter(|(s, _)| *s == state)
            .map(|(_, path)| path.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
