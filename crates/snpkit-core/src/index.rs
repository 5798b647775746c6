//! Sample and variant identity, and the append-only index tables that assign
//! ordinals at first sighting.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;

pub type SampleId = String;

/// Uniqueness key of a variant site.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VariantKey {
    pub chrom: String,
    /// 1-based position
    pub pos: u64,
    pub ref_allele: String,
    pub alt_allele: String,
}

impl VariantKey {
    pub fn new(
        chrom: impl Into<String>,
        pos: u64,
        ref_allele: impl Into<String>,
        alt_allele: impl Into<String>,
    ) -> Self {
        Self {
            chrom: chrom.into(),
            pos,
            ref_allele: ref_allele.into(),
            alt_allele: alt_allele.into(),
        }
    }
}

impl fmt::Display for VariantKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}:{}",
            self.chrom, self.pos, self.ref_allele, self.alt_allele
        )
    }
}

/// A variant site plus its optional marker id (rsID, BED name, ...).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variant {
    pub key: VariantKey,
    pub id: Option<String>,
}

impl Variant {
    pub fn new(key: VariantKey, id: Option<String>) -> Self {
        Self { key, id }
    }

    /// Marker label for tables: the id when present, `chrom:pos` otherwise.
    pub fn label(&self) -> String {
        match &self.id {
            Some(id) => id.clone(),
            None => format!("{}:{}", self.key.chrom, self.key.pos),
        }
    }
}

/// Insertion-ordered table mapping keys to ordinals.
#[derive(Clone, Debug)]
pub struct OrdinalIndex<K> {
    items: Vec<K>,
    lookup: HashMap<K, usize>,
}

impl<K: Clone + Eq + Hash> Default for OrdinalIndex<K> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            lookup: HashMap::new(),
        }
    }
}

impl<K: Clone + Eq + Hash> OrdinalIndex<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ordinal of `key`, assigning the next one if it has not been seen.
    /// Second element is true when the key is new.
    pub fn get_or_insert(&mut self, key: &K) -> (usize, bool) {
        if let Some(&idx) = self.lookup.get(key) {
            return (idx, false);
        }
        let idx = self.items.len();
        self.items.push(key.clone());
        self.lookup.insert(key.clone(), idx);
        (idx, true)
    }

    pub fn get(&self, key: &K) -> Option<usize> {
        self.lookup.get(key).copied()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[K] {
        &self.items
    }

    pub fn into_items(self) -> Vec<K> {
        self.items
    }
}

pub type SampleIndex = OrdinalIndex<SampleId>;
pub type VariantIndex = OrdinalIndex<VariantKey>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordinals_follow_first_sighting() {
        let mut idx = SampleIndex::new();
        assert_eq!(idx.get_or_insert(&"S2".to_string()), (0, true));
        assert_eq!(idx.get_or_insert(&"S1".to_string()), (1, true));
        assert_eq!(idx.get_or_insert(&"S2".to_string()), (0, false));
        assert_eq!(idx.items(), &["S2".to_string(), "S1".to_string()]);
    }

    #[test]
    fn variant_key_includes_alleles() {
        let mut idx = VariantIndex::new();
        let a = VariantKey::new("1", 100, "A", "G");
        let b = VariantKey::new("1", 100, "A", "T");
        assert_eq!(idx.get_or_insert(&a).0, 0);
        assert_eq!(idx.get_or_insert(&b).0, 1);
        assert_eq!(idx.get(&a), Some(0));
        assert_eq!(a.to_string(), "1:100:A:G");
    }
}
