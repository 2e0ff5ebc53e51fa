//! Minimum-period bookkeeping.
//!
//! A line's minperiod is the number of bars that must exist before it can
//! hold a defined value. It is fixed once, when the producing node is wired:
//! the largest minperiod among the node's inputs, extended by whatever extra
//! history the node itself looks back over. A period-N window extends by
//! N - 1, a k-bar lag by k.

/// Minperiod of a node with the given input minperiods that looks back
/// `extend` additional bars. Nodes without inputs start at 1. `None` when
/// the lookback does not fit in a `usize`.
pub fn combine(inputs: &[usize], extend: usize) -> Option<usize> {
    inputs.iter().copied().max().unwrap_or(1).max(1).checked_add(extend)
}

/// Zero-based index of the first bar a line with this minperiod defines.
pub fn first_index(minperiod: usize) -> usize {
    minperiod.saturating_sub(1)
}

/// Evaluation phase of a node.
///
/// `Unseeded` until the bar count reaches the node's minperiod; that bar runs
/// the seeding step and moves the node to `Seeded`; every later bar is a
/// regular update and leaves the node `Steady`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Unseeded,
    Seeded,
    Steady,
}

/// What a node must do for the bar at zero-based `index`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Not enough history; output stays at the sentinel.
    Withhold,
    /// First defined bar: establish seeds.
    Seed,
    /// Regular update.
    Update,
}

impl Step {
    pub fn for_index(index: usize, minperiod: usize) -> Step {
        let first = first_index(minperiod);
        if index < first {
            Step::Withhold
        } else if index == first {
            Step::Seed
        } else {
            Step::Update
        }
    }

    /// Phase a node is in after performing this step.
    pub fn phase_after(self) -> Phase {
        match self {
            Step::Withhold => Phase::Unseeded,
            Step::Seed => Phase::Seeded,
            Step::Update => Phase::Steady,
        }
    }
}
