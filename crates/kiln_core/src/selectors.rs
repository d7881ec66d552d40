//! Selector Sets
//!
//! A [`SelectorSet`] is the set of `NAME = value` pairs that specialise a
//! shader variant. Accelerators, sequencer configs and the pool-wide global
//! selectors all carry one, and a pipeline is built against the layered
//! union of them.
//!
//! Names and values are interned [`Symbol`]s kept sorted by symbol id, so two
//! sets with the same contents always hash and compare equal regardless of
//! insertion order.
//!
//! ```rust,ignore
//! use kiln_core::SelectorSet;
//!
//! let mut selectors = SelectorSet::new();
//! selectors.set("MAT_ALPHA_TEST", "1");
//! selectors.set_value("MAX_LIGHTS", 8);
//!
//! let hash = selectors.compute_hash();
//! ```

use std::fmt::{self, Write as _};
use std::hash::{BuildHasher, Hash, Hasher};

use crate::interner::{self, Symbol};

/// A sorted collection of interned selector definitions.
#[derive(Debug, Clone, Default)]
pub struct SelectorSet {
    selectors: Vec<(Symbol, Symbol)>,
}

impl SelectorSet {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            selectors: Vec::new(),
        }
    }

    #[inline]
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            selectors: Vec::with_capacity(capacity),
        }
    }

    /// Sets a selector, replacing any previous value for `name`.
    pub fn set(&mut self, name: &str, value: &str) {
        self.set_symbol(interner::intern(name), interner::intern(value));
    }

    /// Sets a selector from any displayable value (integers, bools, ...).
    pub fn set_value(&mut self, name: &str, value: impl fmt::Display) {
        self.set(name, &value.to_string());
    }

    #[inline]
    pub fn set_symbol(&mut self, name: Symbol, value: Symbol) {
        match self.selectors.binary_search_by_key(&name, |&(k, _)| k) {
            Ok(idx) => self.selectors[idx].1 = value,
            Err(idx) => self.selectors.insert(idx, (name, value)),
        }
    }

    /// Removes a selector. Returns `true` if it was present.
    pub fn remove(&mut self, name: &str) -> bool {
        interner::get(name).is_some_and(|sym| self.remove_symbol(sym))
    }

    #[inline]
    pub fn remove_symbol(&mut self, name: Symbol) -> bool {
        if let Ok(idx) = self.selectors.binary_search_by_key(&name, |&(k, _)| k) {
            self.selectors.remove(idx);
            true
        } else {
            false
        }
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        interner::get(name).is_some_and(|sym| {
            self.selectors
                .binary_search_by_key(&sym, |&(k, _)| k)
                .is_ok()
        })
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&'static str> {
        let sym = interner::get(name)?;
        self.selectors
            .binary_search_by_key(&sym, |&(k, _)| k)
            .ok()
            .map(|idx| interner::resolve(self.selectors[idx].1))
    }

    #[inline]
    pub fn clear(&mut self) {
        self.selectors.clear();
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.selectors.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.selectors.is_empty()
    }

    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &(Symbol, Symbol)> {
        self.selectors.iter()
    }

    /// Iterates `(name, value)` pairs as strings.
    pub fn iter_strings(&self) -> impl Iterator<Item = (&'static str, &'static str)> + '_ {
        self.selectors
            .iter()
            .map(|&(k, v)| (interner::resolve(k), interner::resolve(v)))
    }

    /// Merges `other` into `self`; values from `other` win on conflict.
    pub fn merge(&mut self, other: &SelectorSet) {
        for &(name, value) in &other.selectors {
            self.set_symbol(name, value);
        }
    }

    #[must_use]
    pub fn merged_with(&self, other: &SelectorSet) -> SelectorSet {
        let mut result = self.clone();
        result.merge(other);
        result
    }

    /// Content hash over names and values.
    #[must_use]
    pub fn compute_hash(&self) -> u64 {
        rustc_hash::FxBuildHasher.hash_one(self)
    }

    /// Hash over the selector names only.
    #[must_use]
    pub fn names_hash(&self) -> u64 {
        let mut hasher = rustc_hash::FxHasher::default();
        for (name, _) in &self.selectors {
            name.hash(&mut hasher);
        }
        hasher.finish()
    }

    /// Renders the set as `name:value` text, breaking the line every
    /// `per_line` entries. Used by pool records.
    #[must_use]
    pub fn to_display_string(&self, per_line: usize) -> String {
        let per_line = per_line.max(1);
        let mut out = String::new();
        for (counter, (name, value)) in self.iter_strings().enumerate() {
            if counter != 0 {
                if counter % per_line == 0 {
                    out.push('\n');
                } else {
                    out.push_str(", ");
                }
            }
            let _ = write!(out, "{name}:{value}");
        }
        out
    }

    #[inline]
    #[must_use]
    pub fn as_slice(&self) -> &[(Symbol, Symbol)] {
        &self.selectors
    }
}

impl Hash for SelectorSet {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.selectors.hash(state);
    }
}

impl PartialEq for SelectorSet {
    fn eq(&self, other: &Self) -> bool {
        self.selectors == other.selectors
    }
}

impl Eq for SelectorSet {}

impl From<&[(&str, &str)]> for SelectorSet {
    fn from(selectors: &[(&str, &str)]) -> Self {
        let mut result = Self::with_capacity(selectors.len());
        for (name, value) in selectors {
            result.set(name, value);
        }
        result
    }
}

impl<const N: usize> From<[(&str, &str); N]> for SelectorSet {
    fn from(selectors: [(&str, &str); N]) -> Self {
        Self::from(&selectors[..])
    }
}
