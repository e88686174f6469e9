//! Policies deciding whether a random optional value collapses.

use rand::{Rng, RngCore};
use serde_json::Value;

/// Decides the final form of a randomly generated value.
///
/// Required values must come back unchanged. Optional ones may collapse to
/// `null` (`Some(Value::Null)`) or to absent (`None`).
pub trait OptionalPolicy: Send + Sync {
    /// Final form of `value`.
    fn finish(&self, rng: &mut dyn RngCore, value: Value, required: bool) -> Option<Value>;
}

/// Never collapses.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysPresent;

impl OptionalPolicy for AlwaysPresent {
    fn finish(&self, _rng: &mut dyn RngCore, value: Value, _required: bool) -> Option<Value> {
        Some(value)
    }
}

/// Collapses optional values to `null` or absent with fixed probabilities.
#[derive(Debug, Clone, Copy)]
pub struct NullOrAbsent {
    /// Chance that an optional value becomes `null`.
    pub null_probability: f64,
    /// Chance that an optional value is left out.
    pub absent_probability: f64,
}

impl Default for NullOrAbsent {
    fn default() -> Self {
        Self {
            null_probability: 0.1,
            absent_probability: 0.1,
        }
    }
}

impl OptionalPolicy for NullOrAbsent {
    fn finish(&self, rng: &mut dyn RngCore, value: Value, required: bool) -> Option<Value> {
        if required {
            return Some(value);
        }
        let roll: f64 = rng.random();
        if roll < self.null_probability {
            Some(Value::Null)
        } else if roll < self.null_probability + self.absent_probability {
            None
        } else {
            Some(value)
        }
    }
}
