use serde::Serialize;

/// Monotonic version published by each visibility barrier.
///
/// A completed artifact records the marker of the barrier that published it;
/// a reader holding marker `M` only sees artifacts recorded at a marker `<= M`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize)]
#[serde(transparent)]
pub struct VisibilityMarker(u64);

impl VisibilityMarker {
    /// Published state before the first barrier. Nothing is visible yet.
    pub const INITIAL: Self = Self(0);

    /// Sentinel for "never visible". No barrier ever publishes it.
    pub const NEVER: Self = Self(u64::MAX);

    #[inline]
    #[must_use]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    #[inline]
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }

    #[inline]
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }

    #[inline]
    #[must_use]
    pub const fn is_never(self) -> bool {
        self.0 == u64::MAX
    }

    /// `true` when something recorded at `self` may be read by a holder of `reader`.
    #[inline]
    #[must_use]
    pub fn visible_to(self, reader: VisibilityMarker) -> bool {
        !self.is_never() && self <= reader
    }
}

impl From<VisibilityMarker> for u64 {
    fn from(marker: VisibilityMarker) -> Self {
        marker.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_visible_to() {
        let recorded = VisibilityMarker::from_raw(3);
        assert!(!recorded.visible_to(VisibilityMarker::from_raw(2)));
        assert!(recorded.visible_to(VisibilityMarker::from_raw(3)));
        assert!(recorded.visible_to(VisibilityMarker::from_raw(10)));
    }

    #[test]
    fn test_never_is_never_visible() {
        assert!(!VisibilityMarker::NEVER.visible_to(VisibilityMarker::NEVER));
        assert!(VisibilityMarker::INITIAL < VisibilityMarker::INITIAL.next());
    }
}
