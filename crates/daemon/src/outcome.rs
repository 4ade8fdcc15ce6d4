//! Tagged outcomes for per-entry remote probes.
//!
//! Membership checks and subtree probes both issue one remote call per entry
//! and must tolerate individual failures. Each call is reduced to a
//! [`ProbeOutcome`]; failures become [`ProbeOutcome::Inconclusive`] and never
//! count as a positive result.

/// Result of one remote probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// The probe confirmed the property (member of the group, folder has content).
    Positive,
    /// The probe refuted the property.
    Negative,
    /// The probe failed; nothing is known.
    Inconclusive,
}

impl ProbeOutcome {
    /// Build an outcome from a definite answer.
    pub fn from_bool(value: bool) -> Self {
        if value {
            ProbeOutcome::Positive
        } else {
            ProbeOutcome::Negative
        }
    }

    /// Whether this single outcome grants the property.
    pub fn is_positive(&self) -> bool {
        matches!(self, ProbeOutcome::Positive)
    }

    /// Aggregate several outcomes: granted iff at least one is positive.
    ///
    /// Inconclusive outcomes neither grant nor refute, so a set made only of
    /// failures is denied.
    pub fn any_positive<I>(outcomes: I) -> bool
    where
        I: IntoIterator<Item = ProbeOutcome>,
    {
        outcomes.into_iter().any(|outcome| outcome.is_positive())
    }
}
