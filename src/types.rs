use serde::Serialize;

/// Index of a trial within a run. Also selects the trial's RNG stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct TrialId(pub u64);
