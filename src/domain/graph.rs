//! Graph assembly and the evaluation driver.
//!
//! [`GraphBuilder`] wires nodes: each node names its input lines when it is
//! added, so the whole graph is known before the first bar. Minperiods are
//! fixed at that moment. [`GraphBuilder::build`] orders the nodes
//! topologically and hands back a [`Graph`], which evaluates bar by bar
//! ([`Graph::push`]) or over a preloaded range ([`Graph::run_once`]).

use crate::domain::error::LineflowError;
use crate::domain::line::{Line, LineId, NodeId, Writer};
use crate::domain::minperiod::{self, Phase, Step};
use crate::domain::node::{BarCtx, Inputs, Node, Operator, SpanCtx};
use crate::domain::ohlcv::{Field, OhlcvBar};
use crate::domain::series::{NAN, Series};
use crate::domain::toposort::toposort;
use chrono::NaiveDate;
use std::collections::BTreeMap;
use tracing::{debug, info};

/// The feed lines of a graph, one per [`Field`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BarLines {
    pub open: LineId,
    pub high: LineId,
    pub low: LineId,
    pub close: LineId,
    pub volume: LineId,
    pub datetime: LineId,
}

impl BarLines {
    pub fn field(&self, field: Field) -> LineId {
        match field {
            Field::Open => self.open,
            Field::High => self.high,
            Field::Low => self.low,
            Field::Close => self.close,
            Field::Volume => self.volume,
            Field::Datetime => self.datetime,
        }
    }
}

#[derive(Debug)]
pub struct GraphBuilder {
    lines: Vec<Line>,
    nodes: Vec<Node>,
    feed: BarLines,
}

impl Default for GraphBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphBuilder {
    pub fn new() -> Self {
        let lines: Vec<Line> = Field::ALL
            .iter()
            .map(|f| Line::new(f.name(), Writer::Feed, 1))
            .collect();
        let feed = BarLines {
            open: LineId(Field::Open.index()),
            high: LineId(Field::High.index()),
            low: LineId(Field::Low.index()),
            close: LineId(Field::Close.index()),
            volume: LineId(Field::Volume.index()),
            datetime: LineId(Field::Datetime.index()),
        };
        Self {
            lines,
            nodes: Vec::new(),
            feed,
        }
    }

    pub fn feed(&self) -> BarLines {
        self.feed
    }

    pub fn line(&self, id: LineId) -> Result<&Line, LineflowError> {
        self.lines
            .get(id.0)
            .ok_or(LineflowError::InvalidLine { id: id.0 })
    }

    pub fn minperiod(&self, id: LineId) -> Result<usize, LineflowError> {
        Ok(self.line(id)?.minperiod)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    /// Give a line a public name.
    pub fn rename(&mut self, id: LineId, name: impl Into<String>) -> Result<(), LineflowError> {
        let line = self
            .lines
            .get_mut(id.0)
            .ok_or(LineflowError::InvalidLine { id: id.0 })?;
        line.name = name.into();
        Ok(())
    }

    /// Wire `op` onto `inputs` and return its visible output lines followed
    /// by its hidden ones.
    pub fn add_node<O>(&mut self, op: O, inputs: &[LineId]) -> Result<Vec<LineId>, LineflowError>
    where
        O: Operator + 'static,
    {
        self.add_boxed(Box::new(op), inputs)
    }

    /// Wire `op` and return its first output line.
    pub fn add<O>(&mut self, op: O, inputs: &[LineId]) -> Result<LineId, LineflowError>
    where
        O: Operator + 'static,
    {
        let outputs = self.add_node(op, inputs)?;
        outputs
            .first()
            .copied()
            .ok_or_else(|| LineflowError::UnknownLine {
                indicator: "node".into(),
                line: "0".into(),
            })
    }

    pub fn add_boxed(
        &mut self,
        op: Box<dyn Operator>,
        inputs: &[LineId],
    ) -> Result<Vec<LineId>, LineflowError> {
        if !op.arity().accepts(inputs.len()) {
            return Err(LineflowError::MissingInput {
                indicator: op.name().to_string(),
                expected: op.arity().to_string(),
                found: inputs.len(),
            });
        }

        let mut input_periods = Vec::with_capacity(inputs.len());
        for &id in inputs {
            let line = self.line(id)?;
            if line.retroactive {
                return Err(LineflowError::RetroactiveInput {
                    line: line.name.clone(),
                });
            }
            input_periods.push(line.minperiod);
        }

        let minperiod = op.minperiod(&input_periods).ok_or_else(|| {
            LineflowError::param(op.name(), "period", "lookback too long")
        })?;
        let node_id = NodeId(self.nodes.len());
        let names = op.lines();
        let hidden_from = names.len().saturating_sub(op.hidden_lines());
        let mut outputs = Vec::with_capacity(names.len());
        for (slot, name) in names.iter().enumerate() {
            let id = LineId(self.lines.len());
            let mut line = Line::new(
                *name,
                Writer::Node {
                    node: node_id,
                    slot,
                },
                minperiod,
            );
            line.hidden = slot >= hidden_from;
            line.retroactive = op.retroactive();
            self.lines.push(line);
            outputs.push(id);
        }

        self.nodes.push(Node {
            op,
            inputs: inputs.to_vec(),
            outputs: outputs.clone(),
            minperiod,
            phase: Phase::Unseeded,
        });
        Ok(outputs)
    }

    fn producer(&self, id: LineId) -> Option<NodeId> {
        match self.lines.get(id.0)?.writer {
            Writer::Node { node, .. } => Some(node),
            Writer::Feed => None,
        }
    }

    /// Order the nodes so producers run before consumers.
    pub fn build(self) -> Result<Graph, LineflowError> {
        let deps: BTreeMap<NodeId, Vec<NodeId>> = self
            .nodes
            .iter()
            .enumerate()
            .map(|(i, node)| {
                let producers = node
                    .inputs
                    .iter()
                    .filter_map(|&id| self.producer(id))
                    .collect();
                (NodeId(i), producers)
            })
            .collect();

        let order = toposort(&deps).map_err(|cycle| LineflowError::Cycle {
            path: cycle
                .iter()
                .map(|n| format!("{}{}", self.nodes[n.0].name(), n.0))
                .collect(),
        })?;

        let max_minperiod = self.lines.iter().map(|l| l.minperiod).max().unwrap_or(1);
        debug!(
            nodes = self.nodes.len(),
            lines = self.lines.len(),
            max_minperiod,
            "graph built"
        );

        Ok(Graph {
            lines: self.lines,
            nodes: self.nodes,
            order,
            feed: self.feed,
            dates: Vec::new(),
            scratch: Vec::new(),
        })
    }
}

/// A wired, ordered graph ready for evaluation.
#[derive(Debug)]
pub struct Graph {
    lines: Vec<Line>,
    nodes: Vec<Node>,
    order: Vec<NodeId>,
    feed: BarLines,
    dates: Vec<NaiveDate>,
    scratch: Vec<Series>,
}

impl Graph {
    /// Number of bars fed so far.
    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn feed(&self) -> BarLines {
        self.feed
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn line(&self, id: LineId) -> Option<&Line> {
        self.lines.get(id.0)
    }

    pub fn lines(&self) -> &[Line] {
        &self.lines
    }

    pub fn series(&self, id: LineId) -> Option<&Series> {
        self.line(id).map(|l| &l.series)
    }

    /// Value of a line relative to the cursor: 0 is the current bar,
    /// negative offsets look back. NaN when unavailable.
    pub fn value(&self, id: LineId, ago: isize) -> f64 {
        self.line(id).map_or(NAN, |l| l.series.get(ago))
    }

    pub fn minperiod(&self, id: LineId) -> Option<usize> {
        self.line(id).map(|l| l.minperiod)
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Evaluation order.
    pub fn order(&self) -> &[NodeId] {
        &self.order
    }

    pub fn phase(&self, node: NodeId) -> Option<Phase> {
        self.nodes.get(node.0).map(|n| n.phase)
    }

    /// Move every cursor to `index`, e.g. to replay decisions over a range
    /// that was evaluated in batch.
    pub fn seek(&mut self, index: usize) {
        for line in &mut self.lines {
            line.series.seek(index);
        }
    }

    pub fn seek_end(&mut self) {
        for line in &mut self.lines {
            line.series.seek_end();
        }
    }

    /// Drop all samples and return every node to `Unseeded`.
    pub fn reset(&mut self) {
        for line in &mut self.lines {
            line.series.clear();
        }
        for node in &mut self.nodes {
            node.phase = Phase::Unseeded;
        }
        self.dates.clear();
    }

    fn append_feed(&mut self, bar: &OhlcvBar) {
        for field in Field::ALL {
            self.lines[self.feed.field(field).0]
                .series
                .append(bar.field(field));
        }
        self.dates.push(bar.date);
    }

    /// Feed one new bar and evaluate every node for it in dependency order.
    pub fn push(&mut self, bar: &OhlcvBar) {
        self.seek_end();
        self.append_feed(bar);
        let index = self.dates.len() - 1;
        let Graph {
            lines,
            nodes,
            order,
            scratch,
            ..
        } = &mut *self;
        for &id in order.iter() {
            eval_bar(lines, &mut nodes[id.0], scratch, index);
        }
    }

    /// Replace the most recent bar (a still-open bar that changed) and
    /// recompute its outputs. Earlier bars are left untouched.
    pub fn update_last(&mut self, bar: &OhlcvBar) -> Result<(), LineflowError> {
        let Some(index) = self.dates.len().checked_sub(1) else {
            return Err(LineflowError::Data {
                reason: "update_last called before any bar was pushed".into(),
            });
        };
        self.seek_end();
        for field in Field::ALL {
            self.lines[self.feed.field(field).0]
                .series
                .set(0, bar.field(field));
        }
        self.dates[index] = bar.date;
        let Graph {
            lines,
            nodes,
            order,
            scratch,
            ..
        } = &mut *self;
        for &id in order.iter() {
            eval_bar(lines, &mut nodes[id.0], scratch, index);
        }
        Ok(())
    }

    /// Append `bars` and evaluate them with one batch pass per node.
    pub fn run_once(&mut self, bars: &[OhlcvBar]) {
        if bars.is_empty() {
            return;
        }
        self.seek_end();
        let from = self.dates.len();
        for bar in bars {
            self.append_feed(bar);
        }
        let to = self.dates.len();
        let Graph {
            lines,
            nodes,
            order,
            scratch,
            ..
        } = &mut *self;
        for &id in order.iter() {
            eval_span(lines, &mut nodes[id.0], scratch, from, to);
        }
        info!(bars = bars.len(), nodes = self.nodes.len(), "batch pass complete");
    }

    /// Feed `bars` one at a time.
    pub fn run_next(&mut self, bars: &[OhlcvBar]) {
        for bar in bars {
            self.push(bar);
        }
        info!(bars = bars.len(), nodes = self.nodes.len(), "incremental pass complete");
    }

    pub fn run(&mut self, mode: EvalMode, bars: &[OhlcvBar]) {
        match mode {
            EvalMode::Once => self.run_once(bars),
            EvalMode::Next => self.run_next(bars),
        }
    }
}

/// How a preloaded range of bars is evaluated. Both give identical values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EvalMode {
    /// One batch pass per node.
    #[default]
    Once,
    /// Bar by bar, as a live feed would.
    Next,
}

impl std::str::FromStr for EvalMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "once" => Ok(EvalMode::Once),
            "next" => Ok(EvalMode::Next),
            other => Err(format!("unknown mode '{other}', expected once or next")),
        }
    }
}

fn take_outputs(lines: &mut [Line], node: &Node, scratch: &mut Vec<Series>, len: usize) {
    scratch.clear();
    for id in &node.outputs {
        let mut series = std::mem::take(&mut lines[id.0].series);
        series.extend_to(len);
        scratch.push(series);
    }
}

fn restore_outputs(lines: &mut [Line], node: &Node, scratch: &mut Vec<Series>) {
    for (id, series) in node.outputs.iter().zip(scratch.drain(..)) {
        lines[id.0].series = series;
    }
}

fn eval_bar(lines: &mut [Line], node: &mut Node, scratch: &mut Vec<Series>, index: usize) {
    take_outputs(lines, node, scratch, index + 1);
    for series in scratch.iter_mut() {
        series.as_mut_slice()[index] = NAN;
    }
    let step = Step::for_index(index, node.minperiod);
    {
        let inputs = Inputs::new(lines, &node.inputs);
        let mut ctx = BarCtx::new(index, inputs, scratch);
        match step {
            Step::Withhold => {}
            Step::Seed => node.op.nextstart(&mut ctx),
            Step::Update => node.op.next(&mut ctx),
        }
    }
    node.phase = step.phase_after();
    restore_outputs(lines, node, scratch);
}

fn eval_span(
    lines: &mut [Line],
    node: &mut Node,
    scratch: &mut Vec<Series>,
    from: usize,
    to: usize,
) {
    take_outputs(lines, node, scratch, to);
    let first = minperiod::first_index(node.minperiod);
    if to > first {
        let inputs = Inputs::new(lines, &node.inputs);
        let mut ctx = SpanCtx::new(inputs, scratch);
        if from <= first {
            node.op.oncestart(&mut ctx, first, first + 1);
            if first + 1 < to {
                node.op.once(&mut ctx, first + 1, to);
            }
        } else {
            node.op.once(&mut ctx, from, to);
        }
        node.phase = Step::for_index(to - 1, node.minperiod).phase_after();
    }
    restore_outputs(lines, node, scratch);
}
