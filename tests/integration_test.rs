//! End-to-end tests over the public engine API.
//!
//! Tests cover:
//! - First-output bar index for period-based indicators
//! - Incremental/batch equivalence across the whole catalog (randomized)
//! - Recursive seeding for exponential averages
//! - Crossover and safe-division boundaries
//! - Named-definition programs wired into one graph

mod common;

use approx::assert_relative_eq;
use common::*;
use lineflow::domain::error::LineflowError;
use lineflow::domain::graph::{EvalMode, GraphBuilder};
use lineflow::domain::indicator::{ParamValue, Source, catalog};
use lineflow::domain::program::{Program, ResultTable};
use proptest::prelude::*;

mod minperiod {
    use super::*;

    #[test]
    fn sma_first_value_at_period_minus_one() {
        for period in [1usize, 2, 5, 13] {
            let bars = wave_bars(30);
            let out = evaluate(&bars, EvalMode::Once, &wire_entry("SMA", &[int("period", period as i64)])).unwrap();
            let first = out[0].iter().position(|v| !v.is_nan()).unwrap();
            assert_eq!(first, period - 1, "period {period}");
        }
    }

    #[test]
    fn graph_reports_line_minperiod() {
        let mut g = GraphBuilder::new();
        let close = g.feed().close;
        let sma = g.indicator("SMA", &Source::Line(close), &[int("period", 3)]).unwrap();
        let nested = g
            .indicator("SMA", &Source::Line(sma.first()), &[int("period", 4)])
            .unwrap();
        let graph = g.build().unwrap();
        assert_eq!(graph.minperiod(sma.first()), Some(3));
        assert_eq!(graph.minperiod(nested.first()), Some(6));
    }

    #[test]
    fn sma_concrete_scenario() {
        let bars = bars_from_closes(&[10.0, 11.0, 12.0, 11.0, 13.0]);
        for mode in [EvalMode::Once, EvalMode::Next] {
            let out = evaluate(&bars, mode, &wire_entry("SMA", &[int("period", 3)])).unwrap();
            assert!(out[0][0].is_nan());
            assert!(out[0][1].is_nan());
            assert_relative_eq!(out[0][2], 11.0);
            assert_relative_eq!(out[0][3], 34.0 / 3.0);
            assert_relative_eq!(out[0][4], 12.0);
        }
    }
}

mod seeding {
    use super::*;

    #[test]
    fn ema_seeds_with_simple_mean() {
        let closes = [2.0, 4.0, 6.0, 8.0, 10.0, 12.0];
        let bars = bars_from_closes(&closes);
        for mode in [EvalMode::Once, EvalMode::Next] {
            let out = evaluate(&bars, mode, &wire_entry("EMA", &[int("period", 3)])).unwrap();
            assert!(out[0][1].is_nan());
            assert_relative_eq!(out[0][2], 4.0);
            // alpha = 2 / (3 + 1)
            assert_relative_eq!(out[0][3], 4.0 + 0.5 * (8.0 - 4.0));
        }
    }

    #[test]
    fn smoothed_averages_agree_between_modes() {
        let bars = wave_bars(120);
        for name in ["EMA", "SMMA", "MACD", "DEMA", "TEMA", "KAMA"] {
            assert_modes_agree(name, &bars, &wire_entry(name, &[]));
        }
    }
}

mod crossover {
    use super::*;

    #[test]
    fn fast_over_slow_on_rising_series_fires_once() {
        let closes: Vec<f64> = (1..=10).map(f64::from).collect();
        let bars = bars_from_closes(&closes);
        let program = Program::parse([
            ("fast", "SMA(close, period=2)"),
            ("slow", "SMA(close, period=4)"),
            ("cross", "CrossOver(fast, slow)"),
        ])
        .unwrap();
        for mode in [EvalMode::Once, EvalMode::Next] {
            let mut g = GraphBuilder::new();
            let outputs = program.wire(&mut g).unwrap();
            let mut graph = g.build().unwrap();
            graph.run(mode, &bars);
            let table = ResultTable::collect(&graph, &outputs);
            let cross = table.column("cross.crossover").unwrap();
            let fired: Vec<usize> = cross
                .iter()
                .enumerate()
                .filter(|(_, v)| **v != 0.0 && !v.is_nan())
                .map(|(i, _)| i)
                .collect();
            assert_eq!(fired, vec![3], "{mode:?}");
            assert_eq!(cross[3], 1.0);
        }
    }

    #[test]
    fn down_cross_after_equal_bars() {
        // close - open: +1, 0, 0, -1 carries the last non-zero side through the ties
        let bars = vec![
            make_bar(0, 1.0, 3.0, 0.0, 2.0),
            make_bar(1, 2.0, 3.0, 0.0, 2.0),
            make_bar(2, 2.0, 3.0, 0.0, 2.0),
            make_bar(3, 2.0, 3.0, 0.0, 1.0),
        ];
        let out = evaluate(&bars, EvalMode::Next, &wire_entry("CrossDown", &[])).unwrap();
        assert_eq!(out[0][3], 1.0);
        assert_eq!(out[0][1], 0.0);
        assert_eq!(out[0][2], 0.0);
    }
}

mod safe_division {
    use super::*;

    fn rsi(closes: &[f64]) -> Vec<f64> {
        let bars = bars_from_closes(closes);
        let overrides = [int("period", 3), ("safediv".to_string(), ParamValue::Bool(true))];
        evaluate(&bars, EvalMode::Once, &wire_entry("RSI", &overrides))
            .unwrap()
            .remove(0)
    }

    #[test]
    fn rising_series_yields_safehigh() {
        let out = rsi(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        assert_eq!(out[5], 100.0);
    }

    #[test]
    fn flat_series_yields_safelow() {
        let out = rsi(&[5.0; 6]);
        assert_eq!(out[5], 50.0);
    }

    #[test]
    fn raw_rsi_on_rising_series_saturates() {
        let bars = bars_from_closes(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        let out = evaluate(&bars, EvalMode::Once, &wire_entry("RSI", &[int("period", 3)])).unwrap();
        // 100 - 100 / (1 + up / 0) saturates at 100 through infinity
        assert_eq!(out[0][5], 100.0);
    }
}

mod programs {
    use super::*;

    #[test]
    fn program_pipeline_through_mock_data() {
        use lineflow::adapters::file_config_adapter::FileConfigAdapter;
        use lineflow::cli::{load_program, run_pipeline};

        let cfg = FileConfigAdapter::from_string(
            "[data]\nsymbol = SPY\nstart_date = 2024-01-11\n\n[indicators]\nrange = high - low\nbands = BollingerBands(close, period=5)\n",
        )
        .unwrap();
        let data = MockDataPort::new().with_bars("SPY", wave_bars(40));
        let program = load_program(&cfg, &[]).unwrap();
        let table = run_pipeline(&cfg, &program, &data, EvalMode::Next).unwrap();

        assert_eq!(table.len(), 30);
        assert_eq!(table.dates[0], day(10));
        assert!(table.columns.iter().any(|c| c.starts_with("bands.")));
        let range = table.column("range").unwrap();
        assert!(range.iter().all(|&r| (r - 2.1).abs() < 1e-9));
    }

    #[test]
    fn program_errors_surface_before_data() {
        use lineflow::adapters::file_config_adapter::FileConfigAdapter;
        use lineflow::cli::{load_program, run_pipeline};

        let cfg = FileConfigAdapter::from_string("[data]\nsymbol = SPY\n[indicators]\nx = Bogus(close)\n").unwrap();
        let data = MockDataPort::new().with_error("SPY", "should not be read");
        let program = load_program(&cfg, &[]).unwrap();
        let err = run_pipeline(&cfg, &program, &data, EvalMode::Once).unwrap_err();
        assert!(matches!(err, LineflowError::UnknownIndicator { .. }));
    }

    #[test]
    fn update_last_recomputes_open_bar() {
        let bars = wave_bars(20);
        let mut g = GraphBuilder::new();
        let feed = g.feed();
        let ind = g.indicator("SMA", &Source::Bars(feed), &[int("period", 4)]).unwrap();
        let mut graph = g.build().unwrap();
        for bar in &bars[..19] {
            graph.push(bar);
        }
        let mut provisional = bars[19].clone();
        provisional.close += 10.0;
        graph.push(&provisional);
        graph.update_last(&bars[19]).unwrap();

        let reference = evaluate(&bars, EvalMode::Once, &wire_entry("SMA", &[int("period", 4)])).unwrap();
        assert_eq!(
            bits(graph.series(ind.first()).unwrap().as_slice()),
            bits(&reference[0])
        );
    }
}

mod catalog_equivalence {
    use super::*;

    #[test]
    fn every_entry_agrees_between_modes_on_a_wave() {
        let bars = wave_bars(300);
        for entry in catalog::entries() {
            let name = entry.name();
            assert_modes_agree(&name, &bars, &wire_entry(&name, &[]));
        }
    }

    fn step() -> impl Strategy<Value = (f64, f64, f64)> {
        (-0.05f64..0.05, 0.0f64..2.0, 0.0f64..2.0)
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(12))]

        #[test]
        fn random_walks_agree_between_modes(steps in prop::collection::vec(step(), 1..90)) {
            let bars = walk_bars(&steps);
            for entry in catalog::entries() {
                let name = entry.name();
                let inc = evaluate(&bars, EvalMode::Next, &wire_entry(&name, &[])).unwrap();
                let batch = evaluate(&bars, EvalMode::Once, &wire_entry(&name, &[])).unwrap();
                for (a, b) in inc.iter().zip(&batch) {
                    prop_assert_eq!(bits(a), bits(b), "{}", name);
                }
            }
        }

        #[test]
        fn short_periods_agree_between_modes(
            steps in prop::collection::vec(step(), 1..40),
            period in 1i64..8,
        ) {
            let bars = walk_bars(&steps);
            for name in ["SMA", "EMA", "WMA", "HMA", "StdDev", "ATR", "RSI", "Highest", "PercentRank"] {
                let overrides = [int("period", period)];
                let inc = evaluate(&bars, EvalMode::Next, &wire_entry(name, &overrides)).unwrap();
                let batch = evaluate(&bars, EvalMode::Once, &wire_entry(name, &overrides)).unwrap();
                for (a, b) in inc.iter().zip(&batch) {
                    prop_assert_eq!(bits(a), bits(b), "{} period {}", name, period);
                }
            }
        }
    }
}
