use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::AbilitiesEntry;
use crate::validation::validate_entries;

pub const FEATURE_DEFINITION_FILE_NAME: &str = "feature.json";

/// Declarative description of one game feature: a name plus the ability
/// entries its actions grant while active.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GameFeatureDefinition {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub abilities: Vec<AbilitiesEntry>,
}

#[derive(Debug, Clone)]
pub struct DiscoveredFeature {
    pub root_dir: PathBuf,
    pub definition: GameFeatureDefinition,
}

pub fn read_definition(path: &Path) -> Result<GameFeatureDefinition> {
    let text = std::fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    serde_json::from_str::<GameFeatureDefinition>(&text)
        .with_context(|| format!("parse {}", path.display()))
}

/// Walk a features directory for `feature.json` definitions. Unreadable or
/// invalid definitions are skipped with a warning; entry diagnostics are
/// logged but never exclude a feature. Results are sorted by feature name.
pub fn discover_features(dir: impl AsRef<Path>) -> Result<Vec<DiscoveredFeature>> {
    let dir = dir.as_ref();
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut out = Vec::new();
    for entry in walkdir::WalkDir::new(dir)
        .follow_links(false)
        .max_depth(4)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }
        if entry.file_name().to_string_lossy() != FEATURE_DEFINITION_FILE_NAME {
            continue;
        }

        let path = entry.path();
        let definition = match read_definition(path) {
            Ok(v) => v,
            Err(e) => {
                warn!(
                    target: "emberfall_gamefeatures::discover",
                    definition = %path.display(),
                    "skip unreadable feature definition: {e:#}"
                );
                continue;
            },
        };

        if definition.name.trim().is_empty() {
            warn!(
                target: "emberfall_gamefeatures::discover",
                definition = %path.display(),
                "skip feature definition with empty name"
            );
            continue;
        }

        for diagnostic in validate_entries(&definition.abilities) {
            warn!(
                target: "emberfall_gamefeatures::discover",
                feature = %definition.name,
                "{diagnostic}"
            );
        }

        let Some(root_dir) = path.parent().map(Path::to_path_buf) else {
            continue;
        };
        out.push(DiscoveredFeature {
            root_dir,
            definition,
        });
    }

    out.sort_by(|a, b| {
        a.definition
            .name
            .cmp(&b.definition.name)
            .then_with(|| a.root_dir.cmp(&b.root_dir))
    });
    Ok(out)
}
