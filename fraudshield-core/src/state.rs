//! Explicit session state for the fairness views.
//!
//! Owns the original dataset and its derived mitigated copy behind read/write
//! accessors, so callers pass state around instead of reaching into ambient
//! storage. The mitigated copy is built lazily and never replaces the
//! original as the source of truth.

use crate::fairness::{self, FairnessRecord};
use rand::Rng;

/// Session-held fairness datasets: the original plus an optional mitigated
/// variant for before/after comparison.
#[derive(Debug, Clone)]
pub struct FairnessSession {
    original: Vec<FairnessRecord>,
    mitigated: Option<Vec<FairnessRecord>>,
    use_mitigated: bool,
}

impl FairnessSession {
    pub fn new(original: Vec<FairnessRecord>) -> Self {
        Self {
            original,
            mitigated: None,
            use_mitigated: false,
        }
    }

    pub fn original(&self) -> &[FairnessRecord] {
        &self.original
    }

    /// The mitigated variant, building it on first use.
    pub fn mitigated<R: Rng>(&mut self, rng: &mut R) -> &[FairnessRecord] {
        if self.mitigated.is_none() {
            self.mitigated = Some(fairness::mitigate(&self.original, rng));
        }
        self.mitigated.as_deref().unwrap_or(&[])
    }

    pub fn set_use_mitigated(&mut self, use_mitigated: bool) {
        self.use_mitigated = use_mitigated;
    }

    pub fn use_mitigated(&self) -> bool {
        self.use_mitigated
    }

    /// The dataset the views should render, honoring the before/after toggle.
    pub fn active<R: Rng>(&mut self, rng: &mut R) -> &[FairnessRecord] {
        if self.use_mitigated {
            self.mitigated(rng)
        } else {
            &self.original
        }
    }

    /// Drop the derived copy (e.g. after replacing the original dataset).
    pub fn reset_mitigated(&mut self) {
        self.mitigated = None;
    }
}
