//! Lineage name generation.
//!
//! Gives every lineage a short pronounceable name for labels and reports,
//! picked from fixed syllable tables by the bytes of the key's hash.

use crate::attributes::rolling_hash;

/// Deterministic name for a lineage key, e.g. `"Vorathis"`.
pub fn species_name(key: &str) -> String {
    let [b0, b1, b2, b3] = rolling_hash(key).to_le_bytes();
    let prefix = PREFIXES[usize::from(b0) % PREFIXES.len()];
    let middle = MIDDLES[usize::from(b1 ^ b3) % MIDDLES.len()];
    let suffix = SUFFIXES[usize::from(b2) % SUFFIXES.len()];
    format!("{prefix}{middle}{suffix}")
}

/// Name for one member of a lineage: the lineage name plus a roman-style
/// ordinal derived from the instance key.
pub fn instance_name(origin_key: &str, instance_key: &str) -> String {
    let ordinal = (rolling_hash(instance_key) % 12) as usize;
    format!("{} {}", species_name(origin_key), ORDINALS[ordinal])
}

static PREFIXES: &[&str] = &[
    "Vor", "Kel", "Zan", "Myr", "Thal", "Or", "Quel", "Ash", "Bren", "Cyr", "Dra", "Eld", "Fen",
    "Gal", "Hes", "Ix", "Jor", "Lum", "Nyx", "Pra", "Sol", "Tyr", "Ul", "Ves",
];

static MIDDLES: &[&str] = &[
    "a", "e", "i", "o", "u", "ae", "io", "ar", "en", "il", "or", "yn",
];

static SUFFIXES: &[&str] = &[
    "this", "dor", "mar", "nix", "rion", "sa", "tor", "vex", "wyn", "xis", "ra", "lune", "phis",
    "dra", "kai", "mos",
];

static ORDINALS: &[&str] = &[
    "I", "II", "III", "IV", "V", "VI", "VII", "VIII", "IX", "X", "XI", "XII",
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_key_same_name() {
        assert_eq!(species_name("0xtoken"), species_name("0xtoken"));
        assert_eq!(instance_name("0xtoken", "0x1"), instance_name("0xtoken", "0x1"));
    }

    #[test]
    fn empty_key_has_a_name() {
        // Hash 0 picks the first entry of every table.
        assert_eq!(species_name(""), "Vorathis");
    }

    #[test]
    fn names_are_capitalized_and_non_empty() {
        for i in 0..100 {
            let name = species_name(&format!("lineage-{i}"));
            assert!(name.len() >= 4);
            assert!(name.chars().next().is_some_and(|c| c.is_ascii_uppercase()));
        }
    }

    #[test]
    fn instance_names_share_lineage_prefix() {
        let a = instance_name("0xtoken", "child-a");
        let b = instance_name("0xtoken", "child-b");
        let lineage = species_name("0xtoken");
        assert!(a.starts_with(&lineage));
        assert!(b.starts_with(&lineage));
    }
}
