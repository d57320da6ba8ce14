//! Eligibility evaluation and unlock computation.

pub mod evaluator;
pub use evaluator::{Diagnostic, Evaluation, Evaluator};

pub mod unlock;
pub use unlock::{TreeSource, UnlockReport, candidates, unlocked_by};
