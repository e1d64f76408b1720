//! Acceptance rule for species classifier output.
//!
//! Classifiers are external; they hand back candidates ranked by confidence
//! as a percentage. Only a confident top match is allowed into the ledger.

use serde::{Deserialize, Serialize};

pub const MIN_CONFIDENCE: f64 = 50.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub name: String,
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Identification<'a> {
    Confirmed(&'a Candidate),
    /// Top candidate is below [`MIN_CONFIDENCE`]; shown but never logged.
    BestGuess(&'a Candidate),
    Nothing,
}

/// Pick the highest-confidence candidate and decide whether it may be logged.
pub fn identify(candidates: &[Candidate]) -> Identification<'_> {
    match candidates
        .iter()
        .max_by(|a, b| a.confidence.total_cmp(&b.confidence))
    {
        Some(top) if top.confidence >= MIN_CONFIDENCE => Identification::Confirmed(top),
        Some(top) => Identification::BestGuess(top),
        None => Identification::Nothing,
    }
}
