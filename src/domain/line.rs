//! Named output channels.
//!
//! Every line is backed by one [`Series`] and written by exactly one node
//! (or by the host, for feed lines). Any number of downstream nodes may read
//! it through its [`LineId`].

use crate::domain::series::Series;
use std::fmt;

/// Handle to a line inside one graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LineId(pub(crate) usize);

impl LineId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for LineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Handle to a node inside one graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Who writes a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Writer {
    /// Supplied by the host per bar.
    Feed,
    /// Output `slot` of a node.
    Node { node: NodeId, slot: usize },
}

#[derive(Debug, Clone)]
pub struct Line {
    pub(crate) name: String,
    pub(crate) writer: Writer,
    pub(crate) minperiod: usize,
    /// Holds state private to its node rather than a published value.
    pub(crate) hidden: bool,
    /// Samples are written after the fact (lead shifts), so consumers would
    /// observe different values in incremental and batch evaluation.
    pub(crate) retroactive: bool,
    pub(crate) series: Series,
}

impl Line {
    pub(crate) fn new(name: impl Into<String>, writer: Writer, minperiod: usize) -> Self {
        Self {
            name: name.into(),
            writer,
            minperiod,
            hidden: false,
            retroactive: false,
            series: Series::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn writer(&self) -> Writer {
        self.writer
    }

    pub fn minperiod(&self) -> usize {
        self.minperiod
    }

    pub fn is_hidden(&self) -> bool {
        self.hidden
    }

    pub fn is_retroactive(&self) -> bool {
        self.retroactive
    }

    pub fn series(&self) -> &Series {
        &self.series
    }

    /// Current value (`ago` = 0) or a past one (`ago` < 0).
    pub fn get(&self, ago: isize) -> f64 {
        self.series.get(ago)
    }
}
