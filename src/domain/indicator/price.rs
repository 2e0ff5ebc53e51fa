//! Price transforms: Heikin Ashi candles, pivot levels, envelopes and the
//! two-line oscillator.

use crate::domain::error::LineflowError;
use crate::domain::graph::{BarLines, GraphBuilder};
use crate::domain::indicator::Source;
use crate::domain::indicator::catalog::{IndicatorDef, InputKind};
use crate::domain::indicator::movav::MovAvKind;
use crate::domain::indicator::params::{ParamSpec, Params};
use crate::domain::line::LineId;
use crate::domain::ops::stateful::HeikinAshi;

type Wired = Result<LineId, LineflowError>;
type Built = Result<Vec<LineId>, LineflowError>;

/// Bands `perc` percent above and below `line`.
pub(crate) fn envelope_bands(
    g: &mut GraphBuilder,
    line: LineId,
    perc: f64,
) -> Result<(LineId, LineId), LineflowError> {
    let frac = perc / 100.0;
    let top = g.mul(line, 1.0 + frac)?;
    let bottom = g.mul(line, 1.0 - frac)?;
    Ok((top, bottom))
}

fn heikin_ashi(g: &mut GraphBuilder, bars: &BarLines) -> Result<Vec<LineId>, LineflowError> {
    g.add_node(HeikinAshi, &[bars.open, bars.high, bars.low, bars.close])
}

fn build_heikin_ashi(g: &mut GraphBuilder, s: &Source, p: &Params) -> Built {
    let bars = s.bars(p.indicator())?;
    let mut lines = heikin_ashi(g, &bars)?;
    lines.truncate(4);
    Ok(lines)
}

/// Body of the candle (close minus open) and its average.
fn build_ha_delta(g: &mut GraphBuilder, s: &Source, p: &Params) -> Built {
    let bars = s.bars(p.indicator())?;
    let (open, close) = if p.flag("autoheikin")? {
        let ha = heikin_ashi(g, &bars)?;
        (ha[0], ha[3])
    } else {
        (bars.open, bars.close)
    };
    let delta = g.sub(close, open)?;
    let smoothed = p.movav("movav")?.build(g, delta, p.period("period")?)?;
    Ok(vec![delta, smoothed])
}

/// Pivot of the bar: `(h + l + c) / 3`, optionally folding in the open or
/// weighting the close twice.
fn pivot(g: &mut GraphBuilder, bars: &BarLines, p: &Params) -> Wired {
    let hl = g.sum(bars.high, bars.low)?;
    let mut total = g.sum(hl, bars.close)?;
    let mut count = 3.0;
    if p.flag("close")? {
        total = g.sum(total, bars.close)?;
        count += 1.0;
    } else if p.flag("open")? {
        total = g.sum(total, bars.open)?;
        count += 1.0;
    }
    g.div(total, count)
}

fn build_pivot_point(g: &mut GraphBuilder, s: &Source, p: &Params) -> Built {
    let bars = s.bars(p.indicator())?;
    let pp = pivot(g, &bars, p)?;
    let range = g.sub(bars.high, bars.low)?;
    let twice = g.mul(pp, 2.0)?;
    let s1 = g.sub(twice, bars.high)?;
    let r1 = g.sub(twice, bars.low)?;
    let s2 = g.sub(pp, range)?;
    let r2 = g.sum(pp, range)?;
    Ok(vec![pp, s1, s2, r1, r2])
}

fn build_fib_pivot_point(g: &mut GraphBuilder, s: &Source, p: &Params) -> Built {
    let bars = s.bars(p.indicator())?;
    let pp = pivot(g, &bars, p)?;
    let range = g.sub(bars.high, bars.low)?;
    let mut supports = Vec::with_capacity(3);
    let mut resistances = Vec::with_capacity(3);
    for level in ["level1", "level2", "level3"] {
        let step = g.mul(range, p.float(level)?)?;
        supports.push(g.sub(pp, step)?);
        resistances.push(g.sum(pp, step)?);
    }
    let mut lines = vec![pp];
    lines.extend(supports);
    lines.extend(resistances);
    Ok(lines)
}

/// DeMark: `x` weights the side the bar closed on, `p = x / 4`.
fn build_demark_pivot_point(g: &mut GraphBuilder, s: &Source, p: &Params) -> Built {
    let bars = s.bars(p.indicator())?;
    let hl = g.sum(bars.high, bars.low)?;
    let hlc = g.sum(hl, bars.close)?;
    let down = g.sum(hlc, bars.low)?;
    let flat = g.sum(hlc, bars.close)?;
    let up = g.sum(hlc, bars.high)?;
    let x = g.cmp_ex(bars.close, bars.open, [down.into(), flat.into(), up.into()])?;

    let pp = g.div(x, 4.0)?;
    let half = g.div(x, 2.0)?;
    let s1 = g.sub(half, bars.high)?;
    let r1 = g.sub(half, bars.low)?;
    Ok(vec![pp, s1, r1])
}

fn build_envelope(g: &mut GraphBuilder, s: &Source, p: &Params) -> Built {
    let data = s.single(p.indicator())?;
    let (top, bottom) = envelope_bands(g, data, p.float("perc")?)?;
    Ok(vec![data, top, bottom])
}

/// First line minus the second.
fn build_oscillator(g: &mut GraphBuilder, s: &Source, p: &Params) -> Built {
    let (data, reference) = s.pair(p.indicator())?;
    Ok(vec![g.sub(data, reference)?])
}

const PIVOT_PARAMS: &[ParamSpec] = &[ParamSpec::flag("open", false), ParamSpec::flag("close", false)];

pub static DEFS: &[IndicatorDef] = &[
    IndicatorDef {
        name: "HeikinAshi",
        aliases: &[],
        inputs: InputKind::Bar,
        lines: &["ha_open", "ha_high", "ha_low", "ha_close"],
        params: &[],
        build: build_heikin_ashi,
    },
    IndicatorDef {
        name: "HADelta",
        aliases: &["haD"],
        inputs: InputKind::Bar,
        lines: &["haDelta", "smoothed"],
        params: &[
            ParamSpec::int("period", 3),
            ParamSpec::movav("movav", MovAvKind::Simple),
            ParamSpec::flag("autoheikin", true),
        ],
        build: build_ha_delta,
    },
    IndicatorDef {
        name: "PivotPoint",
        aliases: &[],
        inputs: InputKind::Bar,
        lines: &["p", "s1", "s2", "r1", "r2"],
        params: PIVOT_PARAMS,
        build: build_pivot_point,
    },
    IndicatorDef {
        name: "FibonacciPivotPoint",
        aliases: &[],
        inputs: InputKind::Bar,
        lines: &["p", "s1", "s2", "s3", "r1", "r2", "r3"],
        params: &[
            ParamSpec::flag("open", false),
            ParamSpec::flag("close", false),
            ParamSpec::float("level1", 0.382),
            ParamSpec::float("level2", 0.618),
            ParamSpec::float("level3", 1.0),
        ],
        build: build_fib_pivot_point,
    },
    IndicatorDef {
        name: "DemarkPivotPoint",
        aliases: &[],
        inputs: InputKind::Bar,
        lines: &["p", "s1", "r1"],
        params: &[],
        build: build_demark_pivot_point,
    },
    IndicatorDef {
        name: "Envelope",
        aliases: &[],
        inputs: InputKind::Single,
        lines: &["src", "top", "bottom"],
        params: &[ParamSpec::float("perc", 2.5)],
        build: build_envelope,
    },
    IndicatorDef {
        name: "Oscillator",
        aliases: &[],
        inputs: InputKind::Pair,
        lines: &["osc"],
        params: &[],
        build: build_oscillator,
    },
];
