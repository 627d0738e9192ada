//! Loader lifecycle phases.

use strum::{AsRefStr, Display, EnumIter};

/// Where a [`crate::loader::MetaDataLoader`] is in its lifecycle.
///
/// Phases only move forward: `Uninitialized` → `Initializing` → `Initialized` →
/// (`Registering` → `Registered`) → `Destroyed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display, AsRefStr, EnumIter)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum LoaderPhase {
    /// Created, nothing loaded
    Uninitialized,
    /// Reading sources
    Initializing,
    /// Sources loaded, queries allowed
    Initialized,
    /// Being added to a loader registry
    Registering,
    /// Visible through a loader registry
    Registered,
    /// Children released, no further use
    Destroyed,
}

impl LoaderPhase {
    /// Returns `true` if the loader answers queries in this phase.
    #[must_use]
    pub fn is_queryable(self) -> bool {
        matches!(self, LoaderPhase::Initialized | LoaderPhase::Registered)
    }

    /// Returns `true` if metadata may be added in this phase.
    #[must_use]
    pub fn accepts_metadata(self) -> bool {
        matches!(
            self,
            LoaderPhase::Initializing | LoaderPhase::Initialized | LoaderPhase::Registered
        )
    }
}

#[cfg(test)]
mod tests {
    use strum::IntoEnumIterator;

    use super::*;

    #[test]
    fn test_phase_order_and_display() {
        let phases: Vec<_> = LoaderPhase::iter().collect();
        let mut sorted = phases.clone();
        sorted.sort();
        assert_eq!(phases, sorted);
        assert_eq!(LoaderPhase::Uninitialized.to_string(), "UNINITIALIZED");
        assert!(LoaderPhase::Registered.is_queryable());
        assert!(!LoaderPhase::Initializing.is_queryable());
        assert!(LoaderPhase::Initializing.accepts_metadata());
        assert!(!LoaderPhase::Destroyed.accepts_metadata());
    }
}
