//! The indicator engine: series, lines, nodes, the evaluation graph, the
//! indicator catalog and the expression language on top of it.

pub mod config_validation;
pub mod error;
pub mod expr;
pub mod expr_parser;
pub mod graph;
pub mod indicator;
pub mod line;
pub mod minperiod;
pub mod node;
pub mod ohlcv;
pub mod ops;
pub mod program;
pub mod series;
pub mod toposort;
