//! Moving averages.
//!
//! The builder functions here are what [`MovAvKind::build`] dispatches to,
//! so every indicator that smooths through the `movav` parameter ends up in
//! this file.

use crate::domain::error::LineflowError;
use crate::domain::graph::GraphBuilder;
use crate::domain::indicator::catalog::{IndicatorDef, InputKind};
use crate::domain::indicator::movav::MovAvKind;
use crate::domain::indicator::params::{ParamSpec, Params};
use crate::domain::indicator::Source;
use crate::domain::line::LineId;
use crate::domain::ops::smoothing::{ExponentialSmoothing, ExponentialSmoothingDynamic};
use crate::domain::ops::stateful::ErrorCorrecting;
use crate::domain::ops::window::WeightedAverage;

type Wired = Result<LineId, LineflowError>;

pub const KAMA_FAST: usize = 2;
pub const KAMA_SLOW: usize = 30;
pub const EC_GAINLIMIT: i64 = 50;
pub const DMA_HULL_PERIOD: usize = 7;

pub fn ema(g: &mut GraphBuilder, data: LineId, period: usize) -> Wired {
    g.add(ExponentialSmoothing::ema(period), &[data])
}

pub fn smma(g: &mut GraphBuilder, data: LineId, period: usize) -> Wired {
    g.add(ExponentialSmoothing::smma(period), &[data])
}

/// Linear weights `1..=period`, newest sample heaviest.
pub fn wma(g: &mut GraphBuilder, data: LineId, period: usize) -> Wired {
    let p = period as f64;
    let op = WeightedAverage {
        coef: 2.0 / (p * (p + 1.0)),
        weights: (1..=period).map(|w| w as f64).collect(),
    };
    g.add(op, &[data])
}

/// `2 * ma - ma(ma)`
pub fn dema(g: &mut GraphBuilder, data: LineId, period: usize, movav: MovAvKind) -> Wired {
    let e1 = movav.build(g, data, period)?;
    let e2 = movav.build(g, e1, period)?;
    let twice = g.mul(e1, 2.0)?;
    g.sub(twice, e2)
}

/// `3 * ma - 3 * ma(ma) + ma(ma(ma))`
pub fn tema(g: &mut GraphBuilder, data: LineId, period: usize, movav: MovAvKind) -> Wired {
    let e1 = movav.build(g, data, period)?;
    let e2 = movav.build(g, e1, period)?;
    let e3 = movav.build(g, e2, period)?;
    let diff = g.sub(e1, e2)?;
    let tripled = g.mul(diff, 3.0)?;
    g.sum(tripled, e3)
}

/// Hull: `ma(2 * ma(x, p/2) - ma(x, p), sqrt(p))`.
pub fn hma(g: &mut GraphBuilder, data: LineId, period: usize, movav: MovAvKind) -> Wired {
    let half = (period / 2).max(1);
    let sqrt = ((period as f64).sqrt() as usize).max(1);
    let fast = movav.build(g, data, half)?;
    let slow = movav.build(g, data, period)?;
    let twice = g.mul(fast, 2.0)?;
    let raw = g.sub(twice, slow)?;
    movav.build(g, raw, sqrt)
}

/// Kaufman's adaptive average: exponential smoothing whose factor follows
/// the efficiency ratio of the last `period` bars.
pub fn kama(g: &mut GraphBuilder, data: LineId, period: usize, fast: usize, slow: usize) -> Wired {
    let fastc = 2.0 / (fast as f64 + 1.0);
    let slowc = 2.0 / (slow as f64 + 1.0);

    let back = g.lag(data, period)?;
    let direction = g.sub(data, back)?;
    let prev = g.lag(data, 1)?;
    let step = g.sub(data, prev)?;
    let step = g.abs(step)?;
    let volatility = g.sum_n(step, period)?;

    let ratio = g.div(direction, volatility)?;
    let er = g.abs(ratio)?;
    let scaled = g.mul(er, fastc - slowc)?;
    let shifted = g.sum(scaled, slowc)?;
    let sc = g.pow(shifted, 2.0)?;
    g.add(ExponentialSmoothingDynamic { period }, &[data, sc])
}

/// `ma(2 * x - x[-lag], p)` with `lag = (p - 1) / 2`.
pub fn zlema(g: &mut GraphBuilder, data: LineId, period: usize, movav: MovAvKind) -> Wired {
    let lag = (period - 1) / 2;
    let back = g.lag(data, lag)?;
    let twice = g.mul(data, 2.0)?;
    let adjusted = g.sub(twice, back)?;
    movav.build(g, adjusted, period)
}

/// Average of an average; the two periods split `period` so the total
/// window is `period`.
pub fn tma(g: &mut GraphBuilder, data: LineId, period: usize, movav: MovAvKind) -> Wired {
    let (p1, p2) = if period % 2 == 1 {
        let p = (period + 1) / 2;
        (p, p)
    } else {
        (period / 2 + 1, period / 2)
    };
    let inner = movav.build(g, data, p2)?;
    movav.build(g, inner, p1)
}

/// Ehlers' error-correcting filter applied over `movav` of the data.
pub fn zero_lag_indicator(
    g: &mut GraphBuilder,
    data: LineId,
    period: usize,
    gainlimit: i64,
    movav: MovAvKind,
) -> Wired {
    let avg = movav.build(g, data, period)?;
    g.add(ErrorCorrecting::new(period, gainlimit), &[data, avg])
}

#[derive(Debug, Clone, Copy)]
pub struct DmaSettings {
    pub period: usize,
    pub gainlimit: i64,
    pub hull_period: usize,
    pub movav: MovAvKind,
    pub hull: MovAvKind,
}

/// Dickson: mean of the error-correcting filter and a short hull average.
pub fn dma(g: &mut GraphBuilder, data: LineId, s: DmaSettings) -> Wired {
    let ec = zero_lag_indicator(g, data, s.period, s.gainlimit, s.movav)?;
    let hull = s.hull.build(g, data, s.hull_period)?;
    let both = g.sum(ec, hull)?;
    g.div(both, 2.0)
}

fn gainlimit(p: &Params) -> Result<i64, LineflowError> {
    let v = p.count("gainlimit")?;
    i64::try_from(v).map_err(|_| LineflowError::param(p.indicator(), "gainlimit", "out of range"))
}

fn build_sma(g: &mut GraphBuilder, s: &Source, p: &Params) -> Result<Vec<LineId>, LineflowError> {
    let data = s.single(p.indicator())?;
    Ok(vec![g.average(data, p.period("period")?)?])
}

fn build_ema(g: &mut GraphBuilder, s: &Source, p: &Params) -> Result<Vec<LineId>, LineflowError> {
    let data = s.single(p.indicator())?;
    Ok(vec![ema(g, data, p.period("period")?)?])
}

fn build_smma(g: &mut GraphBuilder, s: &Source, p: &Params) -> Result<Vec<LineId>, LineflowError> {
    let data = s.single(p.indicator())?;
    Ok(vec![smma(g, data, p.period("period")?)?])
}

fn build_wma(g: &mut GraphBuilder, s: &Source, p: &Params) -> Result<Vec<LineId>, LineflowError> {
    let data = s.single(p.indicator())?;
    Ok(vec![wma(g, data, p.period("period")?)?])
}

fn build_dema(g: &mut GraphBuilder, s: &Source, p: &Params) -> Result<Vec<LineId>, LineflowError> {
    let data = s.single(p.indicator())?;
    Ok(vec![dema(g, data, p.period("period")?, p.movav("movav")?)?])
}

fn build_tema(g: &mut GraphBuilder, s: &Source, p: &Params) -> Result<Vec<LineId>, LineflowError> {
    let data = s.single(p.indicator())?;
    Ok(vec![tema(g, data, p.period("period")?, p.movav("movav")?)?])
}

fn build_hma(g: &mut GraphBuilder, s: &Source, p: &Params) -> Result<Vec<LineId>, LineflowError> {
    let data = s.single(p.indicator())?;
    Ok(vec![hma(g, data, p.period("period")?, p.movav("movav")?)?])
}

fn build_kama(g: &mut GraphBuilder, s: &Source, p: &Params) -> Result<Vec<LineId>, LineflowError> {
    let data = s.single(p.indicator())?;
    let line = kama(g, data, p.period("period")?, p.period("fast")?, p.period("slow")?)?;
    Ok(vec![line])
}

fn build_zlema(g: &mut GraphBuilder, s: &Source, p: &Params) -> Result<Vec<LineId>, LineflowError> {
    let data = s.single(p.indicator())?;
    Ok(vec![zlema(g, data, p.period("period")?, p.movav("movav")?)?])
}

fn build_tma(g: &mut GraphBuilder, s: &Source, p: &Params) -> Result<Vec<LineId>, LineflowError> {
    let data = s.single(p.indicator())?;
    Ok(vec![tma(g, data, p.period("period")?, p.movav("movav")?)?])
}

fn build_dma(g: &mut GraphBuilder, s: &Source, p: &Params) -> Result<Vec<LineId>, LineflowError> {
    let data = s.single(p.indicator())?;
    let settings = DmaSettings {
        period: p.period("period")?,
        gainlimit: gainlimit(p)?,
        hull_period: p.period("hull_period")?,
        movav: p.movav("movav")?,
        hull: p.movav("hull")?,
    };
    Ok(vec![dma(g, data, settings)?])
}

fn build_zero_lag(g: &mut GraphBuilder, s: &Source, p: &Params) -> Result<Vec<LineId>, LineflowError> {
    let data = s.single(p.indicator())?;
    let line = zero_lag_indicator(g, data, p.period("period")?, gainlimit(p)?, p.movav("movav")?)?;
    Ok(vec![line])
}

pub static DEFS: &[IndicatorDef] = &[
    IndicatorDef {
        name: "SMA",
        aliases: &["SimpleMovingAverage", "MovingAverageSimple"],
        inputs: InputKind::Single,
        lines: &["sma"],
        params: &[ParamSpec::int("period", 50)],
        build: build_sma,
    },
    IndicatorDef {
        name: "EMA",
        aliases: &["ExponentialMovingAverage", "MovingAverageExponential"],
        inputs: InputKind::Single,
        lines: &["ema"],
        params: &[ParamSpec::int("period", 20)],
        build: build_ema,
    },
    IndicatorDef {
        name: "SMMA",
        aliases: &[
            "SmoothedMovingAverage",
            "WilderMA",
            "MovingAverageSmoothed",
            "MovingAverageWilder",
            "ModifiedMovingAverage",
        ],
        inputs: InputKind::Single,
        lines: &["smma"],
        params: &[ParamSpec::int("period", 28)],
        build: build_smma,
    },
    IndicatorDef {
        name: "WMA",
        aliases: &["WeightedMovingAverage", "MovingAverageWeighted"],
        inputs: InputKind::Single,
        lines: &["wma"],
        params: &[ParamSpec::int("period", 20)],
        build: build_wma,
    },
    IndicatorDef {
        name: "DEMA",
        aliases: &[
            "DoubleExponentialMovingAverage",
            "DoubleEMA",
            "MovingAverageDoubleExponential",
        ],
        inputs: InputKind::Single,
        lines: &["double_ema"],
        params: &[
            ParamSpec::int("period", 20),
            ParamSpec::movav("movav", MovAvKind::Exponential),
        ],
        build: build_dema,
    },
    IndicatorDef {
        name: "TEMA",
        aliases: &[
            "TripleExponentialMovingAverage",
            "TripleEMA",
            "MovingAverageTripleExponential",
        ],
        inputs: InputKind::Single,
        lines: &["triple_ema"],
        params: &[
            ParamSpec::int("period", 20),
            ParamSpec::movav("movav", MovAvKind::Exponential),
        ],
        build: build_tema,
    },
    IndicatorDef {
        name: "HMA",
        aliases: &["HullMovingAverage", "HullMA"],
        inputs: InputKind::Single,
        lines: &["hma"],
        params: &[
            ParamSpec::int("period", 16),
            ParamSpec::movav("movav", MovAvKind::Weighted),
        ],
        build: build_hma,
    },
    IndicatorDef {
        name: "KAMA",
        aliases: &["AdaptiveMovingAverage", "MovingAverageAdaptive"],
        inputs: InputKind::Single,
        lines: &["kama"],
        params: &[
            ParamSpec::int("period", 10),
            ParamSpec::int("fast", KAMA_FAST as i64),
            ParamSpec::int("slow", KAMA_SLOW as i64),
        ],
        build: build_kama,
    },
    IndicatorDef {
        name: "ZLEMA",
        aliases: &["ZeroLagExponentialMovingAverage", "ZeroLagEma"],
        inputs: InputKind::Single,
        lines: &["zero_lag_ema"],
        params: &[
            ParamSpec::int("period", 20),
            ParamSpec::movav("movav", MovAvKind::Exponential),
        ],
        build: build_zlema,
    },
    IndicatorDef {
        name: "TMA",
        aliases: &["TriangularMovingAverage", "MovingAverageTriangular"],
        inputs: InputKind::Single,
        lines: &["tma"],
        params: &[
            ParamSpec::int("period", 14),
            ParamSpec::movav("movav", MovAvKind::Simple),
        ],
        build: build_tma,
    },
    IndicatorDef {
        name: "DMA",
        aliases: &["DicksonMovingAverage", "DicksonMA"],
        inputs: InputKind::Single,
        lines: &["dma"],
        params: &[
            ParamSpec::int("period", 20),
            ParamSpec::int("gainlimit", EC_GAINLIMIT),
            ParamSpec::int("hull_period", DMA_HULL_PERIOD as i64),
            ParamSpec::movav("movav", MovAvKind::Exponential),
            ParamSpec::movav("hull", MovAvKind::Hull),
        ],
        build: build_dma,
    },
    IndicatorDef {
        name: "ZeroLagIndicator",
        aliases: &["ZLIndicator", "ZLInd", "EC", "ErrorCorrecting"],
        inputs: InputKind::Single,
        lines: &["ec"],
        params: &[
            ParamSpec::int("period", 20),
            ParamSpec::int("gainlimit", EC_GAINLIMIT),
            ParamSpec::movav("movav", MovAvKind::Exponential),
        ],
        build: build_zero_lag,
    },
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::indicator::ParamValue;
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
                open: c,
                high: c + 1.0,
                low: c - 1.0,
                close: c,
                volume: 1000.0,
            })
            .collect()
    }

    fn period(p: i64) -> Vec<(String, ParamValue)> {
        vec![("period".to_string(), ParamValue::Int(p))]
    }

    fn run(name: &str, overrides: &[(String, ParamValue)], closes: &[f64], batch: bool) -> Vec<f64> {
        let mut g = GraphBuilder::new();
        let close = g.feed().close;
        let ind = g.indicator(name, &Source::Line(close), overrides).unwrap();
        let mut graph = g.build().unwrap();
        if batch {
            graph.run_once(&bars(closes));
        } else {
            graph.run_next(&bars(closes));
        }
        graph.series(ind.first()).unwrap().as_slice().to_vec()
    }

    fn trend(n: usize) -> Vec<f64> {
        (0..n)
            .map(|i| 50.0 + (i as f64 * 0.3).sin() * 5.0 + i as f64 * 0.1)
            .collect()
    }

    #[test]
    fn sma_five_bar_scenario() {
        let out = run("SMA", &period(3), &[10.0, 11.0, 12.0, 11.0, 13.0], false);
        assert!(out[0].is_nan());
        assert!(out[1].is_nan());
        assert_relative_eq!(out[2], 11.0);
        assert_relative_eq!(out[3], 34.0 / 3.0);
        assert_relative_eq!(out[4], 12.0);
    }

    #[test]
    fn wma_weights_newest_heaviest() {
        let out = run("WMA", &period(3), &[1.0, 2.0, 3.0], true);
        // (1*1 + 2*2 + 3*3) / 6
        assert_relative_eq!(out[2], 14.0 / 6.0);
    }

    #[test]
    fn ema_seed_matches_between_modes() {
        let data = trend(40);
        let inc = run("EMA", &period(10), &data, false);
        let batch = run("EMA", &period(10), &data, true);
        let seed: f64 = data[..10].iter().sum::<f64>() / 10.0;
        assert_relative_eq!(inc[9], seed, epsilon = 1e-12);
        assert_eq!(format!("{inc:?}"), format!("{batch:?}"));
    }

    #[test]
    fn first_defined_bars() {
        let data = trend(60);
        let first = |name: &str, p: i64| {
            run(name, &period(p), &data, false)
                .iter()
                .position(|v| !v.is_nan())
                .unwrap()
        };
        assert_eq!(first("SMMA", 14), 13);
        // two chained EMAs
        assert_eq!(first("DEMA", 5), 8);
        assert_eq!(first("TEMA", 5), 12);
        // WMA(8) then WMA(2) of the difference
        assert_eq!(first("HMA", 8), 8);
        assert_eq!(first("KAMA", 10), 10);
        assert_eq!(first("TMA", 5), 4);
        assert_eq!(first("ZLEMA", 5), 6);
    }

    #[test]
    fn composites_agree_between_modes() {
        let data = trend(80);
        for name in ["DEMA", "TEMA", "HMA", "KAMA", "ZLEMA", "TMA", "DMA", "EC"] {
            let inc = run(name, &[], &data, false);
            let batch = run(name, &[], &data, true);
            assert_eq!(format!("{inc:?}"), format!("{batch:?}"), "{name}");
        }
    }

    #[test]
    fn kama_tracks_a_straight_line() {
        let data: Vec<f64> = (0..40).map(|i| i as f64).collect();
        let out = run("KAMA", &period(5), &data, false);
        // efficiency ratio is 1 on a straight line, so the average keeps
        // closing in on the price
        let gap_early = data[10] - out[10];
        let gap_late = data[39] - out[39];
        assert!(gap_late > 0.0 && gap_late <= gap_early + 1e-9);
    }

    #[test]
    fn movav_override_changes_smoothing() {
        let data = trend(50);
        let with_ema = run("DEMA", &[], &data, false);
        let with_sma = run(
            "DEMA",
            &[("movav".to_string(), ParamValue::MovAv(MovAvKind::Simple))],
            &data,
            false,
        );
        assert_ne!(format!("{with_ema:?}"), format!("{with_sma:?}"));
    }

    #[test]
    fn negative_gainlimit_is_rejected() {
        let mut g = GraphBuilder::new();
        let close = g.feed().close;
        let err = g
            .indicator(
                "EC",
                &Source::Line(close),
                &[("gainlimit".to_string(), ParamValue::Int(-1))],
            )
            .unwrap_err();
        assert!(matches!(err, LineflowError::Param { .. }));
    }
}
