use std::fmt;
use std::fmt::{Display, Formatter};

use crate::types::Step;

/// Highest `step` known to be durably committed to the warehouse.
///
/// Watermarks only move forward: combining two values always keeps the larger,
/// so replaying or reordering advances never lowers the stored value.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Watermark(Step);

impl Watermark {
    /// Value reported when nothing has ever been committed.
    pub const EPOCH: Watermark = Watermark(0);

    pub fn new(step: Step) -> Self {
        Watermark(step)
    }

    pub fn step(self) -> Step {
        self.0
    }

    /// Returns true when a transaction at `step` has not been committed yet.
    pub fn admits(self, step: Step) -> bool {
        step > self.0
    }

    /// Returns the watermark covering both `self` and `step`.
    pub fn include(self, step: Step) -> Self {
        Watermark(self.0.max(step))
    }
}

impl Display for Watermark {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}", self.0)
    }
}
