//! Persona archetypes used to steer generation and fallbacks.

/// A family of personas sharing themes, trades and places.
#[derive(Debug, Clone, Copy)]
pub struct Archetype {
    /// Archetype key (`scholar`, `artisan`, ...).
    pub category: &'static str,
    /// Recurring themes.
    pub themes: &'static [&'static str],
    /// Plausible professions.
    pub professions: &'static [&'static str],
    /// Plausible locations.
    pub locations: &'static [&'static str],
    /// Inclusive-exclusive age range.
    pub age_range: (u32, u32),
    /// Common personality traits.
    pub traits: &'static [&'static str],
}

/// The five built-in archetypes.
pub static ARCHETYPES: [Archetype; 5] = [
    Archetype {
        category: "scholar",
        themes: &["knowledge", "discovery", "curiosity", "solitude", "wisdom"],
        professions: &["librarian", "researcher", "archivist", "professor", "translator", "historian"],
        locations: &["university town", "mountain observatory", "ancient library", "coastal research station"],
        age_range: (45, 85),
        traits: &["methodical", "reflective", "analytical", "patient", "detail-oriented"],
    },
    Archetype {
        category: "artisan",
        themes: &["creation", "beauty", "craftsmanship", "tradition", "expression"],
        professions: &["potter", "weaver", "woodworker", "glassblower", "sculptor", "chef"],
        locations: &["artist quarter", "workshop district", "mountain village", "seaside studio"],
        age_range: (35, 70),
        traits: &["creative", "tactile", "patient", "intuitive", "dedicated"],
    },
    Archetype {
        category: "wanderer",
        themes: &["journey", "freedom", "discovery", "solitude", "change"],
        professions: &["photographer", "travel writer", "botanist", "anthropologist", "merchant sailor"],
        locations: &["remote cabin", "traveling caravan", "port town", "borderland settlement"],
        age_range: (25, 65),
        traits: &["adaptable", "curious", "independent", "observant", "resilient"],
    },
    Archetype {
        category: "guardian",
        themes: &["protection", "duty", "service", "community", "sacrifice"],
        professions: &["park ranger", "lighthouse keeper", "elder", "healer", "teacher"],
        locations: &["mountain outpost", "coastal lighthouse", "village center", "forest sanctuary"],
        age_range: (40, 80),
        traits: &["responsible", "protective", "wise", "steady", "compassionate"],
    },
    Archetype {
        category: "mystic",
        themes: &["mystery", "intuition", "connection", "spirituality", "depth"],
        professions: &["astronomer", "philosopher", "counselor", "meditation teacher", "herbalist"],
        locations: &["mountain monastery", "desert retreat", "forest grove", "stargazing site"],
        age_range: (30, 75),
        traits: &["intuitive", "contemplative", "empathetic", "mysterious", "wise"],
    },
];

/// Look up an archetype by category (case-insensitive).
#[must_use]
pub fn find(category: &str) -> Option<&'static Archetype> {
    ARCHETYPES
        .iter()
        .find(|a| a.category.eq_ignore_ascii_case(category.trim()))
}

/// Category names, for listings and help text.
#[must_use]
pub fn categories() -> Vec<&'static str> {
    ARCHETYPES.iter().map(|a| a.category).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn find_is_case_insensitive() {
        assert_eq!(find("Mystic").map(|a| a.category), Some("mystic"));
        assert!(find("pirate").is_none());
    }

    #[test]
    fn age_ranges_are_ordered() {
        for a in &ARCHETYPES {
            assert!(a.age_range.0 < a.age_range.1, "{}", a.category);
            assert!(!a.professions.is_empty());
            assert!(!a.locations.is_empty());
        }
    }
}
