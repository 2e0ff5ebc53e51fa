//! Composite indicators.
//!
//! Every indicator is a graph of primitive operators wired at construction
//! time. The catalog ([`catalog`]) maps names to definitions; each
//! definition declares its input shape, output lines and parameters, and
//! a build function that wires the graph.

pub mod catalog;
pub mod movav;
pub mod params;

mod basic;
mod momentum;
mod moving_average;
mod oscillators;
mod price;
mod trend;
mod volatility;

pub use catalog::{Entry, IndicatorDef, InputKind};
pub use movav::{MOVAV_VARIANTS, MovAvKind, Variant};
pub use params::{ParamDefault, ParamSpec, ParamValue, Params};

use crate::domain::error::LineflowError;
use crate::domain::graph::{BarLines, GraphBuilder};
use crate::domain::line::LineId;
use tracing::debug;

/// What an indicator reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    /// One data line.
    Line(LineId),
    /// A full set of bar lines.
    Bars(BarLines),
    /// Two data lines.
    Pair(LineId, LineId),
}

impl Source {
    fn found(&self) -> usize {
        match self {
            Source::Line(_) => 1,
            Source::Bars(_) => 4,
            Source::Pair(..) => 2,
        }
    }

    /// The single data line; bar data contributes its close.
    pub fn single(&self, indicator: &str) -> Result<LineId, LineflowError> {
        match self {
            Source::Line(id) => Ok(*id),
            Source::Bars(bars) => Ok(bars.close),
            Source::Pair(..) => Err(LineflowError::MissingInput {
                indicator: indicator.to_string(),
                expected: "1".into(),
                found: 2,
            }),
        }
    }

    pub fn bars(&self, indicator: &str) -> Result<BarLines, LineflowError> {
        match self {
            Source::Bars(bars) => Ok(*bars),
            other => Err(LineflowError::MissingInput {
                indicator: indicator.to_string(),
                expected: "bar data (open, high, low, close)".into(),
                found: other.found(),
            }),
        }
    }

    pub fn pair(&self, indicator: &str) -> Result<(LineId, LineId), LineflowError> {
        match self {
            Source::Pair(a, b) => Ok((*a, *b)),
            other => Err(LineflowError::MissingInput {
                indicator: indicator.to_string(),
                expected: "2".into(),
                found: match other {
                    Source::Line(_) => 1,
                    _ => 0,
                },
            }),
        }
    }
}

/// Handle to a constructed indicator: its output lines by name.
#[derive(Debug, Clone, PartialEq)]
pub struct Indicator {
    name: String,
    lines: Vec<(String, LineId)>,
}

impl Indicator {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn lines(&self) -> &[(String, LineId)] {
        &self.lines
    }

    /// The first (primary) line.
    pub fn first(&self) -> LineId {
        self.lines[0].1
    }

    pub fn line(&self, name: &str) -> Result<LineId, LineflowError> {
        self.lines
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, id)| *id)
            .ok_or_else(|| LineflowError::UnknownLine {
                indicator: self.name.clone(),
                line: name.to_string(),
            })
    }
}

impl GraphBuilder {
    /// Construct a catalog indicator over `source`. Parameters not named in
    /// `overrides` take their defaults.
    pub fn indicator(
        &mut self,
        name: &str,
        source: &Source,
        overrides: &[(String, ParamValue)],
    ) -> Result<Indicator, LineflowError> {
        let entry = catalog::lookup(name)?;
        let params = Params::resolve(&entry.name(), &entry.params(), overrides)?;
        let nodes_before = self.node_count();
        let ids = entry.build(self, source, &params)?;
        let names = entry.lines();
        debug_assert_eq!(ids.len(), names.len(), "{} line count", entry.name());
        debug!(
            indicator = %entry.name(),
            nodes = self.node_count() - nodes_before,
            "indicator wired"
        );
        Ok(Indicator {
            name: entry.name(),
            lines: names.into_iter().map(String::from).zip(ids).collect(),
        })
    }
}
