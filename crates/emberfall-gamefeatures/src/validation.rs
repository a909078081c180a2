use crate::config::AbilitiesEntry;

/// Advisory pre-activation pass over configured entries. Returns
/// human-readable diagnostics; an empty list means the config is clean.
/// Diagnostics never block activation.
pub fn validate_entries(entries: &[AbilitiesEntry]) -> Vec<String> {
    let mut diagnostics = Vec::new();
    for (entry_index, entry) in entries.iter().enumerate() {
        if entry.actor_class.is_none() {
            diagnostics.push(format!(
                "null actor class at index {entry_index} in the abilities list"
            ));
        }

        if entry.abilities.is_empty() && entry.attributes.is_empty() {
            diagnostics.push(format!(
                "entry at index {entry_index} grants no abilities and no attribute sets"
            ));
        }

        for (ability_index, mapping) in entry.abilities.iter().enumerate() {
            if mapping.ability_type.is_none() {
                diagnostics.push(format!(
                    "null ability type at index {ability_index} in entry {entry_index}"
                ));
            }
        }

        for (attribute_index, mapping) in entry.attributes.iter().enumerate() {
            if mapping.attribute_set_type.is_none() {
                diagnostics.push(format!(
                    "null attribute set type at index {attribute_index} in entry {entry_index}"
                ));
            }
        }
    }
    diagnostics
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AbilityMapping, AttributeSetMapping};

    #[test]
    fn clean_entries_produce_no_diagnostics() {
        let entries = vec![
            AbilitiesEntry::for_actor_class("Pawn")
                .with_ability(AbilityMapping::new("/Game/Abilities/GA_Jump")),
        ];
        assert!(validate_entries(&entries).is_empty());
    }

    #[test]
    fn missing_actor_class_is_reported() {
        let entries = vec![
            AbilitiesEntry::default().with_ability(AbilityMapping::new("/Game/Abilities/GA_Jump")),
        ];
        let diagnostics = validate_entries(&entries);
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].contains("null actor class at index 0"));
    }

    #[test]
    fn empty_entry_is_reported() {
        let entries = vec![AbilitiesEntry::for_actor_class("Pawn")];
        let diagnostics = validate_entries(&entries);
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].contains("no abilities and no attribute sets"));
    }

    #[test]
    fn null_mapping_types_are_reported_with_indices() {
        let entries = vec![
            AbilitiesEntry::for_actor_class("Pawn")
                .with_ability(AbilityMapping::new("/Game/Abilities/GA_Jump"))
                .with_ability(AbilityMapping::default())
                .with_attribute_set(AttributeSetMapping::default()),
            AbilitiesEntry::for_actor_class("Controller")
                .with_ability(AbilityMapping::default()),
        ];
        let diagnostics = validate_entries(&entries);
        assert_eq!(diagnostics.len(), 3);
        assert!(diagnostics[0].contains("null ability type at index 1 in entry 0"));
        assert!(diagnostics[1].contains("null attribute set type at index 0 in entry 0"));
        assert!(diagnostics[2].contains("null ability type at index 0 in entry 1"));
    }
}
