//! Computation nodes and the two evaluation strategies they implement.
//!
//! An [`Operator`] reads its input lines and writes its own output lines.
//! `next` computes exactly the current bar from the current and past input
//! samples; `once` fills a whole `[start, end)` range by direct array
//! indexing. Both must produce identical values. Operators keep no mutable
//! state of their own: anything carried between bars lives in (possibly
//! hidden) output lines, so the seed used by the batch pass is by
//! construction the one the incremental pass would have used.

use crate::domain::line::{Line, LineId};
use crate::domain::minperiod::{self, Phase};
use crate::domain::series::{NAN, Series};
use std::fmt;

/// How many inputs an operator accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Exactly(usize),
    AtLeast(usize),
}

impl Arity {
    pub fn accepts(self, n: usize) -> bool {
        match self {
            Arity::Exactly(k) => n == k,
            Arity::AtLeast(k) => n >= k,
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arity::Exactly(k) => write!(f, "{k}"),
            Arity::AtLeast(k) => write!(f, "at least {k}"),
        }
    }
}

pub trait Operator: fmt::Debug + Send + Sync {
    fn name(&self) -> &'static str;

    fn arity(&self) -> Arity;

    /// Names of the output lines. Trailing `hidden_lines()` of them hold
    /// private state.
    fn lines(&self) -> &'static [&'static str] {
        &["value"]
    }

    fn hidden_lines(&self) -> usize {
        0
    }

    /// Extra bars of history looked back over beyond the inputs' own minperiod.
    fn extend(&self) -> usize {
        0
    }

    /// `None` when the lookback overflows.
    fn minperiod(&self, inputs: &[usize]) -> Option<usize> {
        minperiod::combine(inputs, self.extend())
    }

    /// Outputs are written into past bars.
    fn retroactive(&self) -> bool {
        false
    }

    /// First bar with enough history: establish seeds.
    fn nextstart(&self, ctx: &mut BarCtx<'_>) {
        self.next(ctx);
    }

    fn next(&self, ctx: &mut BarCtx<'_>);

    /// Batch counterpart of `nextstart`, covering the single seed bar.
    fn oncestart(&self, ctx: &mut SpanCtx<'_>, start: usize, end: usize) {
        self.once(ctx, start, end);
    }

    fn once(&self, ctx: &mut SpanCtx<'_>, start: usize, end: usize);
}

/// Read access to a node's input lines.
#[derive(Clone, Copy)]
pub struct Inputs<'a> {
    lines: &'a [Line],
    ids: &'a [LineId],
}

impl<'a> Inputs<'a> {
    pub(crate) fn new(lines: &'a [Line], ids: &'a [LineId]) -> Self {
        Self { lines, ids }
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn series(&self, i: usize) -> &'a Series {
        &self.lines[self.ids[i].0].series
    }

    pub fn minperiod(&self, i: usize) -> usize {
        self.lines[self.ids[i].0].minperiod
    }
}

/// Context for evaluating a single bar.
pub struct BarCtx<'a> {
    index: usize,
    inputs: Inputs<'a>,
    outputs: &'a mut [Series],
}

impl<'a> BarCtx<'a> {
    pub(crate) fn new(index: usize, inputs: Inputs<'a>, outputs: &'a mut [Series]) -> Self {
        Self {
            index,
            inputs,
            outputs,
        }
    }

    /// Zero-based index of the bar being evaluated.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn inputs(&self) -> Inputs<'a> {
        self.inputs
    }

    /// Input `i` at `ago` bars relative to the current one (`ago` <= 0).
    pub fn input(&self, i: usize, ago: isize) -> f64 {
        match self.index.checked_add_signed(ago) {
            Some(idx) => self.inputs.series(i).at(idx),
            None => NAN,
        }
    }

    /// Own output `slot` at `ago` bars relative to the current one.
    pub fn output(&self, slot: usize, ago: isize) -> f64 {
        match self.index.checked_add_signed(ago) {
            Some(idx) => self.outputs[slot].at(idx),
            None => NAN,
        }
    }

    /// All output series, indexed by absolute bar.
    pub fn outputs_mut(&mut self) -> &mut [Series] {
        &mut *self.outputs
    }

    /// Write the current bar of output `slot`.
    pub fn set(&mut self, slot: usize, value: f64) {
        self.set_at(slot, 0, value);
    }

    /// Write output `slot` at `ago` bars relative to the current one.
    pub fn set_at(&mut self, slot: usize, ago: isize, value: f64) {
        if let Some(idx) = self.index.checked_add_signed(ago) {
            if let Some(cell) = self.outputs[slot].as_mut_slice().get_mut(idx) {
                *cell = value;
            }
        }
    }
}

/// Context for evaluating a contiguous range of bars.
pub struct SpanCtx<'a> {
    inputs: Inputs<'a>,
    outputs: &'a mut [Series],
}

impl<'a> SpanCtx<'a> {
    pub(crate) fn new(inputs: Inputs<'a>, outputs: &'a mut [Series]) -> Self {
        Self { inputs, outputs }
    }

    pub fn inputs(&self) -> Inputs<'a> {
        self.inputs
    }

    /// Whole sample array of input `i`.
    pub fn input(&self, i: usize) -> &'a [f64] {
        self.inputs.series(i).as_slice()
    }

    pub fn output(&mut self, slot: usize) -> &mut [f64] {
        self.outputs[slot].as_mut_slice()
    }

    pub fn outputs(&mut self) -> &mut [Series] {
        &mut *self.outputs
    }
}

/// A wired operator instance.
#[derive(Debug)]
pub struct Node {
    pub(crate) op: Box<dyn Operator>,
    pub(crate) inputs: Vec<LineId>,
    pub(crate) outputs: Vec<LineId>,
    pub(crate) minperiod: usize,
    pub(crate) phase: Phase,
}

impl Node {
    pub fn name(&self) -> &'static str {
        self.op.name()
    }

    pub fn inputs(&self) -> &[LineId] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[LineId] {
        &self.outputs
    }

    pub fn minperiod(&self) -> usize {
        self.minperiod
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }
}
