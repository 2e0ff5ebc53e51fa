//! Dispersion, true range and bands.

use crate::domain::error::LineflowError;
use crate::domain::graph::{BarLines, GraphBuilder};
use crate::domain::indicator::catalog::{IndicatorDef, InputKind};
use crate::domain::indicator::movav::MovAvKind;
use crate::domain::indicator::params::{ParamSpec, Params};
use crate::domain::indicator::Source;
use crate::domain::line::LineId;

type Wired = Result<LineId, LineflowError>;
type Built = Result<Vec<LineId>, LineflowError>;

/// `sqrt(ma(x^2) - mean^2)`. With `safepow` the difference is taken as an
/// absolute value so rounding can never push it below zero.
pub(crate) fn stddev(
    g: &mut GraphBuilder,
    data: LineId,
    mean: LineId,
    period: usize,
    movav: MovAvKind,
    safepow: bool,
) -> Wired {
    let squared = g.pow(data, 2.0)?;
    let meansq = movav.build(g, squared, period)?;
    let sqmean = g.pow(mean, 2.0)?;
    let mut diff = g.sub(meansq, sqmean)?;
    if safepow {
        diff = g.abs(diff)?;
    }
    g.pow(diff, 0.5)
}

pub(crate) fn mean_dev(
    g: &mut GraphBuilder,
    data: LineId,
    mean: LineId,
    period: usize,
    movav: MovAvKind,
) -> Wired {
    let dev = g.sub(data, mean)?;
    let absdev = g.abs(dev)?;
    movav.build(g, absdev, period)
}

pub(crate) fn true_high(g: &mut GraphBuilder, bars: &BarLines) -> Wired {
    let prev = g.lag(bars.close, 1)?;
    g.max_of(&[bars.high.into(), prev.into()])
}

pub(crate) fn true_low(g: &mut GraphBuilder, bars: &BarLines) -> Wired {
    let prev = g.lag(bars.close, 1)?;
    g.min_of(&[bars.low.into(), prev.into()])
}

pub(crate) fn true_range(g: &mut GraphBuilder, bars: &BarLines) -> Wired {
    let th = true_high(g, bars)?;
    let tl = true_low(g, bars)?;
    g.sub(th, tl)
}

pub(crate) fn atr(g: &mut GraphBuilder, bars: &BarLines, period: usize, movav: MovAvKind) -> Wired {
    let tr = true_range(g, bars)?;
    movav.build(g, tr, period)
}

pub(crate) struct Bands {
    pub middle: LineId,
    pub top: LineId,
    pub bottom: LineId,
}

pub(crate) fn bollinger(g: &mut GraphBuilder, data: LineId, p: &Params) -> Result<Bands, LineflowError> {
    let period = p.period("period")?;
    let movav = p.movav("movav")?;
    let middle = movav.build(g, data, period)?;
    let sd = stddev(g, data, middle, period, movav, true)?;
    let width = g.mul(sd, p.float("stddev")?)?;
    let top = g.sum(middle, width)?;
    let bottom = g.sub(middle, width)?;
    Ok(Bands { middle, top, bottom })
}

/// Data and the mean to measure against: a pair supplies its own mean.
fn data_and_mean(g: &mut GraphBuilder, s: &Source, p: &Params) -> Result<(LineId, LineId), LineflowError> {
    match s {
        Source::Pair(data, mean) => Ok((*data, *mean)),
        other => {
            let data = other.single(p.indicator())?;
            let mean = p.movav("movav")?.build(g, data, p.period("period")?)?;
            Ok((data, mean))
        }
    }
}

fn build_stddev(g: &mut GraphBuilder, s: &Source, p: &Params) -> Built {
    let (data, mean) = data_and_mean(g, s, p)?;
    let line = stddev(
        g,
        data,
        mean,
        p.period("period")?,
        p.movav("movav")?,
        p.flag("safepow")?,
    )?;
    Ok(vec![line])
}

fn build_mean_dev(g: &mut GraphBuilder, s: &Source, p: &Params) -> Built {
    let (data, mean) = data_and_mean(g, s, p)?;
    Ok(vec![mean_dev(g, data, mean, p.period("period")?, p.movav("movav")?)?])
}

fn build_true_high(g: &mut GraphBuilder, s: &Source, p: &Params) -> Built {
    let bars = s.bars(p.indicator())?;
    Ok(vec![true_high(g, &bars)?])
}

fn build_true_low(g: &mut GraphBuilder, s: &Source, p: &Params) -> Built {
    let bars = s.bars(p.indicator())?;
    Ok(vec![true_low(g, &bars)?])
}

fn build_true_range(g: &mut GraphBuilder, s: &Source, p: &Params) -> Built {
    let bars = s.bars(p.indicator())?;
    Ok(vec![true_range(g, &bars)?])
}

fn build_atr(g: &mut GraphBuilder, s: &Source, p: &Params) -> Built {
    let bars = s.bars(p.indicator())?;
    Ok(vec![atr(g, &bars, p.period("period")?, p.movav("movav")?)?])
}

fn build_bollinger(g: &mut GraphBuilder, s: &Source, p: &Params) -> Built {
    let data = s.single(p.indicator())?;
    let b = bollinger(g, data, p)?;
    Ok(vec![b.middle, b.top, b.bottom])
}

/// `(x - bottom) / (top - bottom)`
fn build_bb_perc(g: &mut GraphBuilder, s: &Source, p: &Params) -> Built {
    let data = s.single(p.indicator())?;
    let b = bollinger(g, data, p)?;
    let above = g.sub(data, b.bottom)?;
    let width = g.sub(b.top, b.bottom)?;
    Ok(vec![g.div(above, width)?])
}

/// `(top - bottom) / middle`
fn build_bb_width(g: &mut GraphBuilder, s: &Source, p: &Params) -> Built {
    let data = s.single(p.indicator())?;
    let b = bollinger(g, data, p)?;
    let width = g.sub(b.top, b.bottom)?;
    Ok(vec![g.div(width, b.middle)?])
}

const BANDS: &[ParamSpec] = &[
    ParamSpec::int("period", 20),
    ParamSpec::float("stddev", 2.0),
    ParamSpec::movav("movav", MovAvKind::Simple),
];

pub static DEFS: &[IndicatorDef] = &[
    IndicatorDef {
        name: "StandardDeviation",
        aliases: &["StdDev"],
        inputs: InputKind::Single,
        lines: &["stddev"],
        params: &[
            ParamSpec::int("period", 20),
            ParamSpec::movav("movav", MovAvKind::Simple),
            ParamSpec::flag("safepow", true),
        ],
        build: build_stddev,
    },
    IndicatorDef {
        name: "MeanDeviation",
        aliases: &["MeanDev"],
        inputs: InputKind::Single,
        lines: &["meandev"],
        params: &[
            ParamSpec::int("period", 20),
            ParamSpec::movav("movav", MovAvKind::Simple),
        ],
        build: build_mean_dev,
    },
    IndicatorDef {
        name: "TrueHigh",
        aliases: &[],
        inputs: InputKind::Bar,
        lines: &["truehigh"],
        params: &[],
        build: build_true_high,
    },
    IndicatorDef {
        name: "TrueLow",
        aliases: &[],
        inputs: InputKind::Bar,
        lines: &["truelow"],
        params: &[],
        build: build_true_low,
    },
    IndicatorDef {
        name: "TrueRange",
        aliases: &["TR"],
        inputs: InputKind::Bar,
        lines: &["tr"],
        params: &[],
        build: build_true_range,
    },
    IndicatorDef {
        name: "AverageTrueRange",
        aliases: &["ATR"],
        inputs: InputKind::Bar,
        lines: &["atr"],
        params: &[
            ParamSpec::int("period", 14),
            ParamSpec::movav("movav", MovAvKind::Smoothed),
        ],
        build: build_atr,
    },
    IndicatorDef {
        name: "BollingerBands",
        aliases: &["BBands"],
        inputs: InputKind::Single,
        lines: &["middle", "top", "bottom"],
        params: BANDS,
        build: build_bollinger,
    },
    IndicatorDef {
        name: "BBPerc",
        aliases: &[],
        inputs: InputKind::Single,
        lines: &["perc_bb"],
        params: BANDS,
        build: build_bb_perc,
    },
    IndicatorDef {
        name: "BBWidth",
        aliases: &[],
        inputs: InputKind::Single,
        lines: &["bbw"],
        params: BANDS,
        build: build_bb_width,
    },
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::indicator::ParamValue;
    use crate::domain::ohlcv::OhlcvBar;
    use approx::assert_relative_eq;
    use chrono::NaiveDate;

    fn bar(i: usize, h: f64, l: f64, c: f64) -> OhlcvBar {
        OhlcvBar {
            date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + chrono::Days::new(i as u64),
            open: c,
            high: h,
            low: l,
            close: c,
            volume: 0.0,
        }
    }

    fn period(p: i64) -> Vec<(String, ParamValue)> {
        vec![("period".to_string(), ParamValue::Int(p))]
    }

    #[test]
    fn true_range_uses_previous_close() {
        let mut g = GraphBuilder::new();
        let src = Source::Bars(g.feed());
        let tr = g.indicator("TR", &src, &[]).unwrap();
        let mut graph = g.build().unwrap();
        // gap up: previous close 10, today 12..15
        graph.run_next(&[bar(0, 11.0, 9.0, 10.0), bar(1, 15.0, 12.0, 14.0)]);
        assert!(graph.value(tr.first(), -1).is_nan());
        assert_eq!(graph.value(tr.first(), 0), 5.0);
    }

    #[test]
    fn stddev_of_known_window() {
        let mut g = GraphBuilder::new();
        let close = g.feed().close;
        let sd = g.indicator("StdDev", &Source::Line(close), &period(4)).unwrap();
        let mut graph = g.build().unwrap();
        let bars: Vec<_> = [2.0, 4.0, 4.0, 6.0]
            .iter()
            .enumerate()
            .map(|(i, &c)| bar(i, c, c, c))
            .collect();
        graph.run_once(&bars);
        // mean 4, population variance (4 + 0 + 0 + 4) / 4 = 2
        assert_relative_eq!(graph.value(sd.first(), 0), 2f64.sqrt(), epsilon = 1e-12);
    }

    #[test]
    fn flat_series_has_zero_width_bands() {
        let mut g = GraphBuilder::new();
        let close = g.feed().close;
        let bb = g.indicator("BBands", &Source::Line(close), &period(5)).unwrap();
        let perc = g.indicator("BBPerc", &Source::Line(close), &period(5)).unwrap();
        let mut graph = g.build().unwrap();
        let bars: Vec<_> = (0..6).map(|i| bar(i, 7.0, 7.0, 7.0)).collect();
        graph.run_next(&bars);
        assert_eq!(graph.value(bb.line("top").unwrap(), 0), 7.0);
        assert_eq!(graph.value(bb.line("bottom").unwrap(), 0), 7.0);
        // 0 / 0 propagates as NaN
        assert!(graph.value(perc.first(), 0).is_nan());
    }

    #[test]
    fn atr_needs_bar_data() {
        let mut g = GraphBuilder::new();
        let close = g.feed().close;
        let err = g.indicator("ATR", &Source::Line(close), &[]).unwrap_err();
        assert!(matches!(err, LineflowError::MissingInput { .. }));
    }

    #[test]
    fn atr_first_bar_and_modes_agree() {
        let bars: Vec<_> = (0..30)
            .map(|i| {
                let c = 20.0 + (i as f64 * 0.7).cos() * 3.0;
                bar(i, c + 1.0 + (i % 3) as f64, c - 1.0, c)
            })
            .collect();
        let run = |batch: bool| {
            let mut g = GraphBuilder::new();
            let src = Source::Bars(g.feed());
            let a = g.indicator("ATR", &src, &period(5)).unwrap();
            let mut graph = g.build().unwrap();
            if batch {
                graph.run_once(&bars);
            } else {
                graph.run_next(&bars);
            }
            graph.series(a.first()).unwrap().as_slice().to_vec()
        };
        let inc = run(false);
        // true range starts on bar 1, SMMA(5) adds four
        assert!(inc[4].is_nan());
        assert!(!inc[5].is_nan());
        assert_eq!(format!("{inc:?}"), format!("{:?}", run(true)));
    }
}
