use emberfall_gameframework::{AssetBundleData, AssetPath, BundleLoadState};

use crate::config::AbilitiesEntry;

const BUNDLE_STATES: [BundleLoadState; 2] = [BundleLoadState::Client, BundleLoadState::Server];

fn add_for_all_states(bundle: &mut AssetBundleData, path: &AssetPath) {
    for state in BUNDLE_STATES {
        bundle.add_bundle_asset(state, path);
    }
}

/// Declare every distinct soft reference the entries carry — ability type,
/// input action, attribute-set type, initialization table — exactly once
/// per load state. Unset references are not declared.
pub fn add_entries_bundle_data(entries: &[AbilitiesEntry], bundle: &mut AssetBundleData) {
    for entry in entries {
        for mapping in &entry.abilities {
            if let Some(path) = &mapping.ability_type {
                add_for_all_states(bundle, path);
            }
            if let Some(path) = &mapping.input_action {
                add_for_all_states(bundle, path);
            }
        }
        for mapping in &entry.attributes {
            if let Some(path) = &mapping.attribute_set_type {
                add_for_all_states(bundle, path);
            }
            if let Some(path) = &mapping.init_table {
                add_for_all_states(bundle, path);
            }
        }
    }
}
