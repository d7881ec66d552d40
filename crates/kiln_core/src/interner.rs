//! Global string interner for selector names and values.
//!
//! Selector sets are compared and hashed on every accelerator lookup, so
//! names and values are stored as integer [`Symbol`]s rather than strings.

use std::sync::LazyLock;

use lasso::{Spur, ThreadedRodeo};

static INTERNER: LazyLock<ThreadedRodeo> = LazyLock::new(ThreadedRodeo::new);

/// Compact identifier for an interned string.
pub type Symbol = Spur;

/// Interns a string, returning the existing symbol if it was seen before.
#[inline]
pub fn intern(s: &str) -> Symbol {
    INTERNER.get_or_intern(s)
}

/// Looks up the symbol of an already-interned string without allocating.
#[inline]
#[must_use]
pub fn get(s: &str) -> Option<Symbol> {
    INTERNER.get(s)
}

/// Resolves a symbol back to its string.
#[inline]
#[must_use]
pub fn resolve(sym: Symbol) -> &'static str {
    INTERNER.resolve(&sym)
}

/// Pre-interns the selector names the pool itself generates, so the first
/// accelerator created does not pay for them on the construction path.
pub fn preload_geometry_selectors() {
    let common = [
        "GEO_HAS_VERTEX_ID",
        "GEO_HAS_POSITION",
        "GEO_HAS_NORMAL",
        "GEO_HAS_TANGENT",
        "GEO_HAS_TEXCOORD",
        "GEO_HAS_COLOR",
        "GEO_HAS_JOINTS",
        "GEO_HAS_WEIGHTS",
        "1",
    ];

    for name in common {
        intern(name);
    }
}
