#![allow(dead_code)]

use chrono::NaiveDate;
use lineflow::domain::error::LineflowError;
use lineflow::domain::graph::{EvalMode, GraphBuilder};
use lineflow::domain::indicator::{InputKind, ParamValue, Source, catalog};
use lineflow::domain::line::LineId;
pub use lineflow::domain::ohlcv::OhlcvBar;
use lineflow::ports::data_port::DataPort;
use std::collections::HashMap;

pub struct MockDataPort {
    pub data: HashMap<String, Vec<OhlcvBar>>,
    pub errors: HashMap<String, String>,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
        }
    }

    pub fn with_bars(mut self, symbol: &str, bars: Vec<OhlcvBar>) -> Self {
        self.data.insert(symbol.to_string(), bars);
        self
    }

    pub fn with_error(mut self, symbol: &str, reason: &str) -> Self {
        self.errors.insert(symbol.to_string(), reason.to_string());
        self
    }
}

impl DataPort for MockDataPort {
    fn fetch_ohlcv(
        &self,
        symbol: &str,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> Result<Vec<OhlcvBar>, LineflowError> {
        if let Some(reason) = self.errors.get(symbol) {
            return Err(LineflowError::Data {
                reason: reason.clone(),
            });
        }
        let bars: Vec<OhlcvBar> = self
            .data
            .get(symbol)
            .map(|bars| {
                bars.iter()
                    .filter(|b| start_date.is_none_or(|s| b.date >= s))
                    .filter(|b| end_date.is_none_or(|e| b.date <= e))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        if bars.is_empty() {
            return Err(LineflowError::NoData {
                symbol: symbol.to_string(),
            });
        }
        Ok(bars)
    }

    fn list_symbols(&self) -> Result<Vec<String>, LineflowError> {
        let mut symbols: Vec<String> = self.data.keys().cloned().collect();
        symbols.sort();
        Ok(symbols)
    }
}

pub fn day(i: usize) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + chrono::Days::new(i as u64)
}

pub fn make_bar(i: usize, open: f64, high: f64, low: f64, close: f64) -> OhlcvBar {
    OhlcvBar {
        date: day(i),
        open,
        high,
        low,
        close,
        volume: 1000.0 + i as f64,
    }
}

/// Bars whose close follows `closes`, with a fixed spread around it.
pub fn bars_from_closes(closes: &[f64]) -> Vec<OhlcvBar> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &c)| make_bar(i, c - 0.25, c + 1.0, c - 1.0, c))
        .collect()
}

/// A drifting sine wave with bars wide enough to keep every range non-zero.
pub fn wave_bars(n: usize) -> Vec<OhlcvBar> {
    (0..n)
        .map(|i| {
            let c = 50.0 + (i as f64 * 0.3).sin() * 5.0 + i as f64 * 0.02;
            make_bar(i, c - 0.3, c + 1.2, c - 0.9, c)
        })
        .collect()
}

/// Bars from a random walk of `steps` (relative moves) starting at 100.
pub fn walk_bars(steps: &[(f64, f64, f64)]) -> Vec<OhlcvBar> {
    let mut close: f64 = 100.0;
    steps
        .iter()
        .enumerate()
        .map(|(i, &(step, up, down))| {
            let open = close;
            close = (close * (1.0 + step)).max(1.0);
            let high = open.max(close) + up;
            let low = (open.min(close) - down).max(0.5);
            make_bar(i, open, high, low, close)
        })
        .collect()
}

pub fn bits(values: &[f64]) -> Vec<u64> {
    values
        .iter()
        .map(|v| if v.is_nan() { f64::NAN.to_bits() } else { v.to_bits() })
        .collect()
}

/// Wire a graph, evaluate `bars` in `mode`, and return every line in `ids`.
pub fn evaluate(
    bars: &[OhlcvBar],
    mode: EvalMode,
    wire: &dyn Fn(&mut GraphBuilder) -> Result<Vec<LineId>, LineflowError>,
) -> Result<Vec<Vec<f64>>, LineflowError> {
    let mut g = GraphBuilder::new();
    let ids = wire(&mut g)?;
    let mut graph = g.build()?;
    graph.run(mode, bars);
    Ok(ids
        .iter()
        .map(|&id| graph.series(id).map(|s| s.as_slice().to_vec()).unwrap_or_default())
        .collect())
}

/// Evaluate the same wiring bar by bar and in batch; both must agree bit for bit.
pub fn assert_modes_agree(
    label: &str,
    bars: &[OhlcvBar],
    wire: &dyn Fn(&mut GraphBuilder) -> Result<Vec<LineId>, LineflowError>,
) {
    let inc = evaluate(bars, EvalMode::Next, wire).unwrap();
    let batch = evaluate(bars, EvalMode::Once, wire).unwrap();
    assert_eq!(inc.len(), batch.len(), "{label}");
    for (i, (a, b)) in inc.iter().zip(&batch).enumerate() {
        assert_eq!(bits(a), bits(b), "{label} line {i}");
    }
}

/// Wire a catalog entry with its defaults over the full feed.
pub fn wire_entry(
    name: &str,
    overrides: &[(String, ParamValue)],
) -> impl Fn(&mut GraphBuilder) -> Result<Vec<LineId>, LineflowError> {
    let name = name.to_string();
    let overrides = overrides.to_vec();
    move |g: &mut GraphBuilder| {
        let entry = catalog::lookup(&name)?;
        let feed = g.feed();
        let source = match entry.inputs() {
            InputKind::Pair => Source::Pair(feed.close, feed.open),
            InputKind::Single | InputKind::Bar => Source::Bars(feed),
        };
        let ind = g.indicator(&name, &source, &overrides)?;
        Ok(ind.lines().iter().map(|(_, id)| *id).collect())
    }
}

pub fn int(name: &str, v: i64) -> (String, ParamValue) {
    (name.to_string(), ParamValue::Int(v))
}
