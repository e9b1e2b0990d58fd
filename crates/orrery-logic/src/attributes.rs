//! Deterministic procedural attributes for orrery bodies.
//!
//! Every body's look is derived from a string key by a 32-bit polynomial
//! rolling hash (seed 0, multiplier 31). The same key always yields the
//! same record, across calls and process restarts. Nothing here reads a
//! clock, a counter or an RNG.
//!
//! A lineage shares one base record (keyed by `origin_key`); each body then
//! gets a small per-instance jitter keyed by its own id via [`AttributeGenerator::vary`].
//!
//! ```
//! use orrery_logic::attributes::AttributeGenerator;
//!
//! let mut gen = AttributeGenerator::default();
//! let a = gen.generate("0xtoken");
//! let b = gen.generate("0xtoken");
//! assert_eq!(a, b);
//! ```

use lru::LruCache;
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;

/// Default bound for each memoization cache.
pub const DEFAULT_CACHE_CAPACITY: usize = 4096;

/// Lowest value a varied color, metabolic or emissive channel may reach.
pub const VARY_FLOOR: f32 = 0.05;

pub const SIZE_BIAS_MIN: f32 = 0.8;
pub const SIZE_BIAS_MAX: f32 = 1.5;

/// Linear RGB, each channel in `0.0..=1.0`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rgb {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

/// Coarse body silhouette family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShapeClass {
    A,
    B,
    C,
}

impl ShapeClass {
    fn from_byte(b: u8) -> Self {
        match b % 3 {
            0 => ShapeClass::A,
            1 => ShapeClass::B,
            _ => ShapeClass::C,
        }
    }
}

/// Hash-derived look of a body.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProceduralCharacteristics {
    pub base_color: Rgb,
    pub shape_class: ShapeClass,
    /// Renderer size multiplier in `[0.8, 1.5]`.
    pub size_bias: f32,
    /// Animation pulse rate, `0.5..=2.0` before variation.
    pub metabolic_rate: f32,
    /// Glow strength, `0.2..=1.0` before variation.
    pub emissive_intensity: f32,
}

/// 32-bit polynomial rolling hash: `h = h * 31 + c`, wrapping, seed 0.
pub fn rolling_hash(key: &str) -> u32 {
    key.chars()
        .fold(0u32, |h, c| h.wrapping_mul(31).wrapping_add(c as u32))
}

fn unit(b: u8) -> f32 {
    f32::from(b) / 255.0
}

/// Map a byte to `[-1, 1]`.
fn signed_unit(b: u8) -> f32 {
    unit(b) * 2.0 - 1.0
}

/// Build the base record for a hash value.
pub fn characteristics_from_hash(hash: u32) -> ProceduralCharacteristics {
    let [b0, b1, b2, b3] = hash.to_le_bytes();
    ProceduralCharacteristics {
        base_color: Rgb {
            r: unit(b0),
            g: unit(b1),
            b: unit(b2),
        },
        shape_class: ShapeClass::from_byte(b3),
        size_bias: SIZE_BIAS_MIN + unit(b1) * (SIZE_BIAS_MAX - SIZE_BIAS_MIN),
        metabolic_rate: 0.5 + unit(b2) * 1.5,
        emissive_intensity: 0.2 + unit(b3) * 0.8,
    }
}

/// Apply hash-derived per-instance jitter to a base record.
///
/// Offsets are signed, scaled by `amount`, and floored at [`VARY_FLOOR`]
/// so no channel reaches zero. The shape class is shared by the lineage
/// and never varied.
pub fn vary(
    base: &ProceduralCharacteristics,
    instance_key: &str,
    amount: f32,
) -> ProceduralCharacteristics {
    let [o0, o1, o2, o3] = rolling_hash(instance_key)
        .to_le_bytes()
        .map(|b| signed_unit(b) * amount);

    let channel = |v: f32, o: f32| (v + o).clamp(VARY_FLOOR, 1.0);
    ProceduralCharacteristics {
        base_color: Rgb {
            r: channel(base.base_color.r, o0),
            g: channel(base.base_color.g, o1),
            b: channel(base.base_color.b, o2),
        },
        shape_class: base.shape_class,
        size_bias: (base.size_bias * (1.0 + o3)).clamp(SIZE_BIAS_MIN, SIZE_BIAS_MAX),
        metabolic_rate: (base.metabolic_rate * (1.0 + o0)).max(VARY_FLOOR),
        emissive_intensity: (base.emissive_intensity * (1.0 + o2)).max(VARY_FLOOR),
    }
}

/// Memoizing generator. One instance per application session.
///
/// Both caches are LRU-bounded; a cache hit returns exactly what a fresh
/// computation would.
pub struct AttributeGenerator {
    lineages: LruCache<String, ProceduralCharacteristics>,
    /// (origin_key, instance_key, amount bits) → varied record.
    instances: LruCache<(String, String, u32), ProceduralCharacteristics>,
}

impl Default for AttributeGenerator {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CACHE_CAPACITY)
    }
}

impl AttributeGenerator {
    /// Create a generator whose caches each hold at most `capacity` entries.
    pub fn with_capacity(capacity: usize) -> Self {
        let cap = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            lineages: LruCache::new(cap),
            instances: LruCache::new(cap),
        }
    }

    /// Base record for a lineage key. Empty keys are valid.
    pub fn generate(&mut self, origin_key: &str) -> ProceduralCharacteristics {
        if let Some(c) = self.lineages.get(origin_key) {
            return *c;
        }
        let c = characteristics_from_hash(rolling_hash(origin_key));
        self.lineages.put(origin_key.to_string(), c);
        c
    }

    /// See [`vary`].
    pub fn vary(
        &self,
        base: &ProceduralCharacteristics,
        instance_key: &str,
        amount: f32,
    ) -> ProceduralCharacteristics {
        vary(base, instance_key, amount)
    }

    /// `vary(generate(origin_key), id, amount)`, memoized per body.
    pub fn characteristics_for(
        &mut self,
        origin_key: &str,
        id: &str,
        amount: f32,
    ) -> ProceduralCharacteristics {
        let key = (origin_key.to_string(), id.to_string(), amount.to_bits());
        if let Some(c) = self.instances.get(&key) {
            return *c;
        }
        let base = self.generate(origin_key);
        let c = vary(&base, id, amount);
        self.instances.put(key, c);
        c
    }

    /// Number of cached lineage records.
    pub fn lineage_cache_len(&self) -> usize {
        self.lineages.len()
    }

    /// Number of cached per-body records.
    pub fn instance_cache_len(&self) -> usize {
        self.instances.len()
    }

    pub fn clear(&mut self) {
        self.lineages.clear();
        self.instances.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_bit_identical(a: &ProceduralCharacteristics, b: &ProceduralCharacteristics) {
        assert_eq!(a.base_color.r.to_bits(), b.base_color.r.to_bits());
        assert_eq!(a.base_color.g.to_bits(), b.base_color.g.to_bits());
        assert_eq!(a.base_color.b.to_bits(), b.base_color.b.to_bits());
        assert_eq!(a.shape_class, b.shape_class);
        assert_eq!(a.size_bias.to_bits(), b.size_bias.to_bits());
        assert_eq!(a.metabolic_rate.to_bits(), b.metabolic_rate.to_bits());
        assert_eq!(a.emissive_intensity.to_bits(), b.emissive_intensity.to_bits());
    }

    #[test]
    fn rolling_hash_known_values() {
        assert_eq!(rolling_hash(""), 0);
        assert_eq!(rolling_hash("a"), 97);
        // 'a' * 31 + 'b' = 97 * 31 + 98
        assert_eq!(rolling_hash("ab"), 3105);
    }

    #[test]
    fn rolling_hash_wraps() {
        let long = "z".repeat(64);
        // Must not panic on overflow and must be stable.
        assert_eq!(rolling_hash(&long), rolling_hash(&long));
    }

    #[test]
    fn generate_is_deterministic_across_instances() {
        let mut g1 = AttributeGenerator::default();
        let mut g2 = AttributeGenerator::with_capacity(1);
        for key in ["0xabc", "", "lineage-7", "ünïcödé"] {
            let a = g1.generate(key);
            let b = g2.generate(key);
            let c = g1.generate(key);
            assert_bit_identical(&a, &b);
            assert_bit_identical(&a, &c);
        }
    }

    #[test]
    fn distinct_keys_give_distinct_records() {
        let mut gen = AttributeGenerator::default();
        let keys = ["0x01", "0x02", "0x03", "dao-alpha", "dao-beta"];
        for (i, a) in keys.iter().enumerate() {
            for b in &keys[i + 1..] {
                assert_ne!(gen.generate(a), gen.generate(b), "{a} vs {b}");
            }
        }
    }

    #[test]
    fn empty_key_yields_fixed_default() {
        let c = AttributeGenerator::default().generate("");
        assert_eq!(c.base_color, Rgb { r: 0.0, g: 0.0, b: 0.0 });
        assert_eq!(c.shape_class, ShapeClass::A);
        assert_eq!(c.size_bias, SIZE_BIAS_MIN);
        assert_eq!(c.metabolic_rate, 0.5);
        assert_eq!(c.emissive_intensity, 0.2);
    }

    #[test]
    fn generated_ranges_hold() {
        let mut gen = AttributeGenerator::default();
        for i in 0..500 {
            let c = gen.generate(&format!("node-{i}"));
            for ch in [c.base_color.r, c.base_color.g, c.base_color.b] {
                assert!((0.0..=1.0).contains(&ch));
            }
            assert!((SIZE_BIAS_MIN..=SIZE_BIAS_MAX).contains(&c.size_bias));
            assert!((0.5..=2.0).contains(&c.metabolic_rate));
            assert!((0.2..=1.0).contains(&c.emissive_intensity));
        }
    }

    #[test]
    fn vary_stays_positive_and_in_range() {
        let base = AttributeGenerator::default().generate("");
        for i in 0..200 {
            let v = vary(&base, &format!("instance-{i}"), 0.2);
            for ch in [v.base_color.r, v.base_color.g, v.base_color.b] {
                assert!(ch >= VARY_FLOOR && ch <= 1.0);
            }
            assert!(v.metabolic_rate >= VARY_FLOOR);
            assert!(v.emissive_intensity >= VARY_FLOOR);
            assert!((SIZE_BIAS_MIN..=SIZE_BIAS_MAX).contains(&v.size_bias));
        }
    }

    #[test]
    fn vary_keeps_shape_and_stays_close() {
        let mut gen = AttributeGenerator::default();
        let base = gen.generate("0xlineage");
        let v = gen.vary(&base, "0xchild", 0.2);
        assert_eq!(v.shape_class, base.shape_class);
        assert!((v.base_color.r - base.base_color.r).abs() <= 0.2 + 1e-6 || v.base_color.r == VARY_FLOOR);
    }

    #[test]
    fn vary_with_zero_amount_only_floors() {
        let mut gen = AttributeGenerator::default();
        let base = gen.generate("0xlineage");
        let v = vary(&base, "anything", 0.0);
        assert_eq!(v.size_bias, base.size_bias);
        assert_eq!(v.metabolic_rate, base.metabolic_rate);
        assert_eq!(v.base_color.r, base.base_color.r.max(VARY_FLOOR));
    }

    #[test]
    fn siblings_related_but_distinct() {
        let mut gen = AttributeGenerator::default();
        let a = gen.characteristics_for("0xlineage", "0xchild-a", 0.2);
        let b = gen.characteristics_for("0xlineage", "0xchild-b", 0.2);
        assert_eq!(a.shape_class, b.shape_class);
        assert_ne!(a, b);
    }

    #[test]
    fn characteristics_for_memoizes() {
        let mut gen = AttributeGenerator::default();
        let a = gen.characteristics_for("o", "x", 0.2);
        assert_eq!(gen.instance_cache_len(), 1);
        assert_eq!(gen.lineage_cache_len(), 1);
        let b = gen.characteristics_for("o", "x", 0.2);
        assert_bit_identical(&a, &b);
        assert_eq!(gen.instance_cache_len(), 1);
    }

    #[test]
    fn lru_bound_is_respected() {
        let mut gen = AttributeGenerator::with_capacity(8);
        for i in 0..100 {
            gen.generate(&format!("k{i}"));
        }
        assert_eq!(gen.lineage_cache_len(), 8);
        // Evicted keys recompute to the same value.
        let fresh = characteristics_from_hash(rolling_hash("k0"));
        assert_eq!(gen.generate("k0"), fresh);
    }

    #[test]
    fn zero_capacity_is_clamped() {
        let mut gen = AttributeGenerator::with_capacity(0);
        gen.generate("a");
        assert_eq!(gen.lineage_cache_len(), 1);
    }
}
