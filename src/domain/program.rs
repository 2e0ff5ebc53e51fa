//! Named indicator definitions wired into one graph.
//!
//! A program is a set of `name = expression` definitions. Definitions may
//! reference each other by name; they are wired in dependency order, and a
//! definition that (indirectly) references itself is a cycle.
//!
//! Name matching is ASCII case-insensitive, as INI keys are.

use crate::domain::error::{LineflowError, ParseError};
use crate::domain::expr::{CallArg, Expr, ParamLit};
use crate::domain::expr_parser;
use crate::domain::graph::{BarLines, Graph, GraphBuilder};
use crate::domain::indicator::{Indicator, MovAvKind, ParamValue, Source, catalog};
use crate::domain::line::LineId;
use crate::domain::ohlcv::Field;
use crate::domain::ops::Arg;
use crate::domain::toposort::toposort;
use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::str::FromStr;
use tracing::debug;

/// Config section holding the definitions.
pub const SECTION: &str = "indicators";

#[derive(Debug, Clone, PartialEq)]
pub struct Definition {
    pub name: String,
    pub text: String,
    pub expr: Expr,
}

impl Definition {
    pub fn parse(name: impl Into<String>, text: impl Into<String>) -> Result<Self, ParseError> {
        let text = text.into();
        let expr = expr_parser::parse(&text)?;
        Ok(Self {
            name: name.into(),
            text,
            expr,
        })
    }

    fn key(&self) -> String {
        self.name.to_ascii_lowercase()
    }
}

/// One output column: `name` for plain lines, `name.line` per indicator line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Output {
    pub name: String,
    pub line: LineId,
}

#[derive(Debug, Clone)]
enum Value {
    Scalar(f64),
    Line(LineId),
    Indicator(Indicator),
}

impl Value {
    fn arg(&self) -> Arg {
        match self {
            Value::Scalar(v) => Arg::Const(*v),
            Value::Line(id) => Arg::Line(*id),
            Value::Indicator(ind) => Arg::Line(ind.first()),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Program {
    defs: Vec<Definition>,
}

impl Program {
    pub fn new(defs: Vec<Definition>) -> Result<Self, LineflowError> {
        let mut seen = BTreeMap::new();
        for def in &defs {
            if Field::from_str(&def.name).is_ok() {
                return Err(LineflowError::ConfigInvalid {
                    section: SECTION.into(),
                    key: def.name.clone(),
                    reason: "name shadows a feed field".into(),
                });
            }
            if seen.insert(def.key(), ()).is_some() {
                return Err(LineflowError::ConfigInvalid {
                    section: SECTION.into(),
                    key: def.name.clone(),
                    reason: "defined more than once".into(),
                });
            }
        }
        Ok(Self { defs })
    }

    /// Parse `(name, expression)` pairs.
    pub fn parse<I, K, V>(pairs: I) -> Result<Self, LineflowError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let defs = pairs
            .into_iter()
            .map(|(name, text)| Definition::parse(name, text))
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(defs)
    }

    pub fn definitions(&self) -> &[Definition] {
        &self.defs
    }

    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }

    /// Definitions in wiring order: every definition after those it reads.
    pub fn order(&self) -> Result<Vec<&Definition>, LineflowError> {
        let by_key: BTreeMap<String, &Definition> = self.defs.iter().map(|d| (d.key(), d)).collect();
        let deps: BTreeMap<String, Vec<String>> = self
            .defs
            .iter()
            .map(|d| {
                let key = d.key();
                // `atr = ATR` reads the catalog entry, not itself
                let refs = d
                    .expr
                    .references()
                    .into_iter()
                    .map(str::to_ascii_lowercase)
                    .filter(|r| *r != key || catalog::lookup(r).is_err())
                    .collect();
                (key, refs)
            })
            .collect();
        let order = toposort(&deps).map_err(|path| LineflowError::Cycle {
            path: path
                .iter()
                .map(|k| by_key.get(k).map_or_else(|| k.clone(), |d| d.name.clone()))
                .collect(),
        })?;
        Ok(order.iter().filter_map(|k| by_key.get(k).copied()).collect())
    }

    /// Wire every definition into `g` and return the output columns in
    /// wiring order.
    pub fn wire(&self, g: &mut GraphBuilder) -> Result<Vec<Output>, LineflowError> {
        let order = self.order()?;
        let mut env = Env {
            feed: g.feed(),
            values: BTreeMap::new(),
        };
        let mut outputs = Vec::new();
        for def in order {
            let value = env.eval(g, &def.expr)?;
            match &value {
                Value::Indicator(ind) => {
                    for (line, id) in ind.lines() {
                        outputs.push(Output {
                            name: format!("{}.{}", def.name, line),
                            line: *id,
                        });
                    }
                }
                other => {
                    let line = g.arg(other.arg())?;
                    outputs.push(Output {
                        name: def.name.clone(),
                        line,
                    });
                }
            }
            debug!(definition = %def.name, expr = %def.expr, "definition wired");
            env.values.insert(def.key(), value);
        }
        Ok(outputs)
    }
}

/// Evaluated output lines laid out by bar: one row per date, one column
/// per output. Sentinel samples stay NaN.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultTable {
    pub columns: Vec<String>,
    pub dates: Vec<NaiveDate>,
    pub rows: Vec<Vec<f64>>,
}

impl ResultTable {
    pub fn collect(graph: &Graph, outputs: &[Output]) -> Self {
        let columns = outputs.iter().map(|o| o.name.clone()).collect();
        let series: Vec<_> = outputs.iter().map(|o| graph.series(o.line)).collect();
        let rows = (0..graph.len())
            .map(|i| {
                series
                    .iter()
                    .map(|s| s.map_or(f64::NAN, |s| s.at(i)))
                    .collect()
            })
            .collect();
        Self {
            columns,
            dates: graph.dates().to_vec(),
            rows,
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column(&self, name: &str) -> Option<Vec<f64>> {
        let idx = self.columns.iter().position(|c| c == name)?;
        Some(self.rows.iter().map(|r| r[idx]).collect())
    }
}

struct Env {
    feed: BarLines,
    values: BTreeMap<String, Value>,
}

impl Env {
    fn eval(&self, g: &mut GraphBuilder, expr: &Expr) -> Result<Value, LineflowError> {
        match expr {
            Expr::Number(v) => Ok(Value::Scalar(*v)),
            Expr::Ident(name) => self.resolve(g, name),
            Expr::Call { name, args } => self.call(g, name, args),
            Expr::Select { base, line } => match self.eval(g, base)? {
                Value::Indicator(ind) => Ok(Value::Line(ind.line(line)?)),
                _ => Err(LineflowError::UnknownLine {
                    indicator: base.to_string(),
                    line: line.clone(),
                }),
            },
            Expr::Shift { base, offset } => match self.eval(g, base)? {
                Value::Scalar(v) => Ok(Value::Scalar(v)),
                other => {
                    let line = g.arg(other.arg())?;
                    Ok(Value::Line(g.shift(line, *offset)?))
                }
            },
            Expr::Neg(inner) => match self.eval(g, inner)? {
                Value::Scalar(v) => Ok(Value::Scalar(-v)),
                other => {
                    let line = g.arg(other.arg())?;
                    Ok(Value::Line(g.neg(line)?))
                }
            },
            Expr::Binary { op, lhs, rhs } => {
                let a = self.eval(g, lhs)?;
                let b = self.eval(g, rhs)?;
                if let (Value::Scalar(x), Value::Scalar(y)) = (&a, &b) {
                    return Ok(Value::Scalar(op.op().apply(*x, *y)));
                }
                Ok(Value::Line(g.binary(op.op(), a.arg(), b.arg())?))
            }
        }
    }

    /// Feed fields first, then earlier definitions, then catalog
    /// indicators over the full bar feed.
    fn resolve(&self, g: &mut GraphBuilder, name: &str) -> Result<Value, LineflowError> {
        if let Ok(field) = Field::from_str(name) {
            return Ok(Value::Line(self.feed.field(field)));
        }
        if let Some(value) = self.values.get(&name.to_ascii_lowercase()) {
            return Ok(value.clone());
        }
        if catalog::lookup(name).is_ok() {
            return Ok(Value::Indicator(g.indicator(name, &Source::Bars(self.feed), &[])?));
        }
        Err(LineflowError::UnknownReference { name: name.into() })
    }

    fn call(&self, g: &mut GraphBuilder, name: &str, args: &[CallArg]) -> Result<Value, LineflowError> {
        let mut inputs = Vec::new();
        let mut overrides = Vec::new();
        for arg in args {
            match arg {
                CallArg::Input(e) => {
                    let value = self.eval(g, e)?;
                    inputs.push(g.arg(value.arg())?);
                }
                CallArg::Param { name: param, value } => {
                    overrides.push((param.clone(), param_value(name, param, value)?));
                }
            }
        }
        let source = match inputs.as_slice() {
            [] => Source::Bars(self.feed),
            [one] => Source::Line(*one),
            [a, b] => Source::Pair(*a, *b),
            more => {
                return Err(LineflowError::MissingInput {
                    indicator: name.into(),
                    expected: "at most 2".into(),
                    found: more.len(),
                });
            }
        };
        Ok(Value::Indicator(g.indicator(name, &source, &overrides)?))
    }
}

fn param_value(indicator: &str, param: &str, lit: &ParamLit) -> Result<ParamValue, LineflowError> {
    Ok(match lit {
        ParamLit::Int(v) => ParamValue::Int(*v),
        ParamLit::Float(v) => ParamValue::Float(*v),
        ParamLit::Bool(v) => ParamValue::Bool(*v),
        ParamLit::List(vs) => ParamValue::List(vs.clone()),
        ParamLit::Word(w) => match MovAvKind::from_name(w) {
            Some(kind) => ParamValue::MovAv(kind),
            None => {
                return Err(LineflowError::param(
                    indicator,
                    param,
                    format!("unknown moving average '{w}'"),
                ));
            }
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ohlcv::OhlcvBar;
    use approx::assert_relative_eq;
    use chrono::NaiveDate;

    fn bars(closes: &[f64]) -> Vec<OhlcvBar> {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        closes
            .iter()
            .enumerate()
            .map(|(i, &c)| OhlcvBar {
                date: start + chrono::Days::new(i as u64),
                open: c - 0.5,
                high: c + 1.0,
                low: c - 1.0,
                close: c,
                volume: 1000.0,
            })
            .collect()
    }

    fn run(pairs: &[(&str, &str)], closes: &[f64]) -> BTreeMap<String, Vec<f64>> {
        let program = Program::parse(pairs.iter().copied()).unwrap();
        let mut g = GraphBuilder::new();
        let outputs = program.wire(&mut g).unwrap();
        let mut graph = g.build().unwrap();
        graph.run_once(&bars(closes));
        outputs
            .into_iter()
            .map(|o| (o.name, graph.series(o.line).unwrap().as_slice().to_vec()))
            .collect()
    }

    #[test]
    fn definitions_reference_each_other() {
        let out = run(
            &[
                ("spread", "fast - slow"),
                ("fast", "SMA(close, period=2)"),
                ("slow", "SMA(close, period=3)"),
            ],
            &[1.0, 2.0, 3.0, 4.0],
        );
        assert_relative_eq!(out["fast.sma"][3], 3.5);
        assert_relative_eq!(out["slow.sma"][3], 3.0);
        assert_relative_eq!(out["spread"][3], 0.5);
        assert!(out["spread"][1].is_nan());
    }

    #[test]
    fn wiring_order_follows_dependencies() {
        let program = Program::parse([("b", "a * 2"), ("a", "close + 1"), ("c", "b[-1]")]).unwrap();
        let names: Vec<&str> = program.order().unwrap().iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[test]
    fn cycle_is_reported_with_path() {
        let program = Program::parse([("a", "b + 1"), ("b", "c"), ("c", "a * 2")]).unwrap();
        let err = program.order().unwrap_err();
        match err {
            LineflowError::Cycle { path } => {
                assert_eq!(path.first(), path.last());
                assert_eq!(path.len(), 4);
            }
            other => panic!("expected cycle, got {other}"),
        }
    }

    #[test]
    fn self_reference_is_a_cycle() {
        let program = Program::parse([("x", "x[-1] + 1")]).unwrap();
        assert!(matches!(program.order(), Err(LineflowError::Cycle { .. })));
    }

    #[test]
    fn definition_named_after_bare_indicator() {
        let out = run(&[("atr", "ATR"), ("wide", "atr * 2")], &[10.0; 20]);
        // high - low is 2 on every bar
        assert_relative_eq!(out["atr.atr"][19], 2.0);
        assert_relative_eq!(out["wide"][19], 4.0);

        let program = Program::parse([("SMA", "SMA + 1")]).unwrap();
        let names: Vec<&str> = program.order().unwrap().iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["SMA"]);
    }

    #[test]
    fn chained_lookbacks_that_overflow_are_rejected() {
        let p = "9000000000000000000";
        let text = format!("SMA(SMA(SMA(close, period={p}), period={p}), period={p})");
        let program = Program::parse([("x", text.as_str())]).unwrap();
        let err = program.wire(&mut GraphBuilder::new()).unwrap_err();
        assert!(matches!(err, LineflowError::Param { .. }));
    }

    #[test]
    fn unknown_reference() {
        let program = Program::parse([("x", "nothing + 1")]).unwrap();
        let err = program.wire(&mut GraphBuilder::new()).unwrap_err();
        assert!(matches!(err, LineflowError::UnknownReference { ref name } if name == "nothing"));
    }

    #[test]
    fn line_selection_and_bare_indicator() {
        let closes: Vec<f64> = (0..40).map(|i| 10.0 + (i as f64 * 0.4).sin()).collect();
        let out = run(
            &[("sig", "MACD(close, m1_period=3, m2_period=6, signal_period=2).signal"), ("tr", "TR")],
            &closes,
        );
        assert!(out.contains_key("sig"));
        // high - low is 2 and closes move less than 1
        assert_relative_eq!(out["tr.tr"][5], 2.0);
    }

    #[test]
    fn shifts_and_scalars() {
        let out = run(
            &[("prev", "close[-1]"), ("k", "2 * 3"), ("rising", "close > close[-1] AND 1")],
            &[1.0, 2.0, 1.5],
        );
        assert!(out["prev"][0].is_nan());
        assert_eq!(out["prev"][2], 2.0);
        assert_eq!(out["k"], vec![6.0, 6.0, 6.0]);
        assert_eq!(out["rising"][1], 1.0);
        assert_eq!(out["rising"][2], 0.0);
    }

    #[test]
    fn movav_parameter_by_name() {
        let out = run(&[("t", "TMA(close, period=3, movav=EMA)")], &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        assert!(!out["t.tma"][5].is_nan());

        let program = Program::parse([("t", "TMA(close, movav=Bogus)")]).unwrap();
        let err = program.wire(&mut GraphBuilder::new()).unwrap_err();
        assert!(matches!(err, LineflowError::Param { ref param, .. } if param == "movav"));
    }

    #[test]
    fn pair_inputs_and_too_many_inputs() {
        let out = run(&[("x", "CrossOver(close, open)")], &[1.0, 2.0, 3.0]);
        assert!(out.contains_key("x.crossover"));

        let program = Program::parse([("x", "SMA(open, high, low)")]).unwrap();
        let err = program.wire(&mut GraphBuilder::new()).unwrap_err();
        assert!(matches!(err, LineflowError::MissingInput { found: 3, .. }));
    }

    #[test]
    fn names_are_case_insensitive_and_unique() {
        let out = run(&[("Fast", "close * 2"), ("y", "FAST + 1")], &[1.0]);
        assert_eq!(out["y"], vec![3.0]);

        let err = Program::parse([("a", "close"), ("A", "open")]).unwrap_err();
        assert!(matches!(err, LineflowError::ConfigInvalid { .. }));
        let err = Program::parse([("close", "open")]).unwrap_err();
        assert!(matches!(err, LineflowError::ConfigInvalid { .. }));
    }

    #[test]
    fn result_table_lays_out_rows_by_date() {
        let program = Program::parse([("avg", "SMA(close, period=2)"), ("d", "close - open")]).unwrap();
        let mut g = GraphBuilder::new();
        let outputs = program.wire(&mut g).unwrap();
        let mut graph = g.build().unwrap();
        let data = bars(&[1.0, 2.0, 3.0]);
        graph.run_once(&data);

        let table = ResultTable::collect(&graph, &outputs);
        assert_eq!(table.columns, vec!["avg.sma", "d"]);
        assert_eq!(table.len(), 3);
        assert_eq!(table.dates[2], data[2].date);
        assert!(table.rows[0][0].is_nan());
        assert_relative_eq!(table.rows[2][0], 2.5);
        assert_eq!(table.column("d").unwrap(), vec![0.5, 0.5, 0.5]);
        assert!(table.column("missing").is_none());
    }

    #[test]
    fn parse_error_surfaces() {
        let err = Program::parse([("x", "SMA(close,")]).unwrap_err();
        assert!(matches!(err, LineflowError::Parse(_)));
    }
}
