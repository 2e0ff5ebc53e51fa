//! lineflow: incremental technical indicator engine.
//!
//! Indicators are wired into a dependency graph of lines over a bar feed and
//! evaluated either bar by bar or in one batch pass, with identical results.
//! Hexagonal layout: the engine in [`domain`], port traits in [`ports`],
//! concrete implementations in [`adapters`], the command line in [`cli`].

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod ports;
