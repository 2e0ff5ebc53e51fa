//! Price change over a lookback and the RSI family.

use crate::domain::error::LineflowError;
use crate::domain::graph::GraphBuilder;
use crate::domain::indicator::catalog::{IndicatorDef, InputKind};
use crate::domain::indicator::movav::MovAvKind;
use crate::domain::indicator::params::{ParamSpec, Params};
use crate::domain::indicator::Source;
use crate::domain::line::LineId;
use crate::domain::ops::numeric::DivPolicy;

type Wired = Result<LineId, LineflowError>;
type Built = Result<Vec<LineId>, LineflowError>;

/// `x - x[-period]`
pub(crate) fn change(g: &mut GraphBuilder, data: LineId, period: usize) -> Wired {
    let back = g.lag(data, period)?;
    g.sub(data, back)
}

pub(crate) fn up_day(g: &mut GraphBuilder, data: LineId, period: usize) -> Wired {
    let diff = change(g, data, period)?;
    g.max_of(&[diff.into(), 0.0.into()])
}

pub(crate) fn down_day(g: &mut GraphBuilder, data: LineId, period: usize) -> Wired {
    let back = g.lag(data, period)?;
    let diff = g.sub(back, data)?;
    g.max_of(&[diff.into(), 0.0.into()])
}

/// Relative strength that maps back to the RSI value `rsi`.
fn rs_for(rsi: f64) -> f64 {
    if rsi == 100.0 {
        f64::INFINITY
    } else {
        -100.0 / (rsi - 100.0) - 1.0
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct RsiSettings {
    pub period: usize,
    pub movav: MovAvKind,
    pub lookback: usize,
    /// Substitute `safehigh` / `safelow` when the average loss is zero.
    pub safe: Option<(f64, f64)>,
}

impl RsiSettings {
    fn from_params(p: &Params) -> Result<Self, LineflowError> {
        let safe = if p.flag("safediv")? {
            Some((p.float("safehigh")?, p.float("safelow")?))
        } else {
            None
        };
        Ok(Self {
            period: p.period("period")?,
            movav: p.movav("movav")?,
            lookback: p.period("lookback")?,
            safe,
        })
    }
}

/// `100 - 100 / (1 + maup / madown)`
///
/// With safe division a zero average loss yields `safehigh` while the
/// average gain is positive and `safelow` when both are zero.
pub(crate) fn rsi(g: &mut GraphBuilder, data: LineId, s: RsiSettings) -> Wired {
    let up = up_day(g, data, s.lookback)?;
    let down = down_day(g, data, s.lookback)?;
    let maup = s.movav.build(g, up, s.period)?;
    let madown = s.movav.build(g, down, s.period)?;
    let policy = match s.safe {
        None => DivPolicy::Raw,
        Some((high, low)) => DivPolicy::ZeroByZero {
            single: rs_for(high),
            dual: rs_for(low),
        },
    };
    let rs = g.div_with(policy, maup, madown)?;
    let den = g.sum(rs, 1.0)?;
    let frac = g.div(100.0, den)?;
    g.sub(100.0, frac)
}

fn build_momentum(g: &mut GraphBuilder, s: &Source, p: &Params) -> Built {
    let data = s.single(p.indicator())?;
    Ok(vec![change(g, data, p.period("period")?)?])
}

/// `100 * x / x[-period]`
fn build_momentum_osc(g: &mut GraphBuilder, s: &Source, p: &Params) -> Built {
    let data = s.single(p.indicator())?;
    let back = g.lag(data, p.period("period")?)?;
    let ratio = g.div(data, back)?;
    Ok(vec![g.mul(ratio, 100.0)?])
}

pub(crate) fn roc(g: &mut GraphBuilder, data: LineId, period: usize) -> Wired {
    let back = g.lag(data, period)?;
    let diff = g.sub(data, back)?;
    g.div(diff, back)
}

fn build_roc(g: &mut GraphBuilder, s: &Source, p: &Params) -> Built {
    let data = s.single(p.indicator())?;
    Ok(vec![roc(g, data, p.period("period")?)?])
}

fn build_roc100(g: &mut GraphBuilder, s: &Source, p: &Params) -> Built {
    let data = s.single(p.indicator())?;
    let r = roc(g, data, p.period("period")?)?;
    Ok(vec![g.mul(r, 100.0)?])
}

/// `x / x[-period] - 1`
fn build_pct_change(g: &mut GraphBuilder, s: &Source, p: &Params) -> Built {
    let data = s.single(p.indicator())?;
    let back = g.lag(data, p.period("period")?)?;
    let ratio = g.div(data, back)?;
    Ok(vec![g.sub(ratio, 1.0)?])
}

fn build_up_day(g: &mut GraphBuilder, s: &Source, p: &Params) -> Built {
    let data = s.single(p.indicator())?;
    Ok(vec![up_day(g, data, p.period("period")?)?])
}

fn build_down_day(g: &mut GraphBuilder, s: &Source, p: &Params) -> Built {
    let data = s.single(p.indicator())?;
    Ok(vec![down_day(g, data, p.period("period")?)?])
}

fn build_up_day_bool(g: &mut GraphBuilder, s: &Source, p: &Params) -> Built {
    let data = s.single(p.indicator())?;
    let back = g.lag(data, p.period("period")?)?;
    Ok(vec![g.gt(data, back)?])
}

fn build_down_day_bool(g: &mut GraphBuilder, s: &Source, p: &Params) -> Built {
    let data = s.single(p.indicator())?;
    let back = g.lag(data, p.period("period")?)?;
    Ok(vec![g.gt(back, data)?])
}

fn build_up_move(g: &mut GraphBuilder, s: &Source, p: &Params) -> Built {
    let data = s.single(p.indicator())?;
    Ok(vec![change(g, data, 1)?])
}

fn build_down_move(g: &mut GraphBuilder, s: &Source, p: &Params) -> Built {
    let data = s.single(p.indicator())?;
    let back = g.lag(data, 1)?;
    Ok(vec![g.sub(back, data)?])
}

fn build_rsi(g: &mut GraphBuilder, s: &Source, p: &Params) -> Built {
    let data = s.single(p.indicator())?;
    Ok(vec![rsi(g, data, RsiSettings::from_params(p)?)?])
}

const LOOKBACK_1: &[ParamSpec] = &[ParamSpec::int("period", 1)];

const fn rsi_params(period: i64, safediv: bool, lookback: i64) -> [ParamSpec; 8] {
    [
        ParamSpec::int("period", period),
        ParamSpec::movav("movav", MovAvKind::Smoothed),
        ParamSpec::float("upperband", 70.0),
        ParamSpec::float("lowerband", 30.0),
        ParamSpec::flag("safediv", safediv),
        ParamSpec::float("safehigh", 100.0),
        ParamSpec::float("safelow", 50.0),
        ParamSpec::int("lookback", lookback),
    ]
}

const RSI_PARAMS: [ParamSpec; 8] = rsi_params(14, false, 1);
const RSI_SAFE_PARAMS: [ParamSpec; 8] = rsi_params(14, true, 1);
const RMI_PARAMS: [ParamSpec; 8] = rsi_params(20, false, 5);

pub static DEFS: &[IndicatorDef] = &[
    IndicatorDef {
        name: "Momentum",
        aliases: &[],
        inputs: InputKind::Single,
        lines: &["momentum"],
        params: &[ParamSpec::int("period", 12)],
        build: build_momentum,
    },
    IndicatorDef {
        name: "MomentumOscillator",
        aliases: &["MomentumOsc"],
        inputs: InputKind::Single,
        lines: &["momosc"],
        params: &[ParamSpec::int("period", 12), ParamSpec::float("band", 100.0)],
        build: build_momentum_osc,
    },
    IndicatorDef {
        name: "RateOfChange",
        aliases: &["ROC"],
        inputs: InputKind::Single,
        lines: &["roc"],
        params: &[ParamSpec::int("period", 12)],
        build: build_roc,
    },
    IndicatorDef {
        name: "RateOfChange100",
        aliases: &["ROC100"],
        inputs: InputKind::Single,
        lines: &["roc100"],
        params: &[ParamSpec::int("period", 12)],
        build: build_roc100,
    },
    IndicatorDef {
        name: "PercentChange",
        aliases: &["PctChange"],
        inputs: InputKind::Single,
        lines: &["pctchange"],
        params: &[ParamSpec::int("period", 30)],
        build: build_pct_change,
    },
    IndicatorDef {
        name: "UpDay",
        aliases: &[],
        inputs: InputKind::Single,
        lines: &["upday"],
        params: LOOKBACK_1,
        build: build_up_day,
    },
    IndicatorDef {
        name: "DownDay",
        aliases: &[],
        inputs: InputKind::Single,
        lines: &["downday"],
        params: LOOKBACK_1,
        build: build_down_day,
    },
    IndicatorDef {
        name: "UpDayBool",
        aliases: &[],
        inputs: InputKind::Single,
        lines: &["upday"],
        params: LOOKBACK_1,
        build: build_up_day_bool,
    },
    IndicatorDef {
        name: "DownDayBool",
        aliases: &[],
        inputs: InputKind::Single,
        lines: &["downday"],
        params: LOOKBACK_1,
        build: build_down_day_bool,
    },
    IndicatorDef {
        name: "UpMove",
        aliases: &[],
        inputs: InputKind::Single,
        lines: &["upmove"],
        params: &[],
        build: build_up_move,
    },
    IndicatorDef {
        name: "DownMove",
        aliases: &[],
        inputs: InputKind::Single,
        lines: &["downmove"],
        params: &[],
        build: build_down_move,
    },
    IndicatorDef {
        name: "RSI",
        aliases: &["RelativeStrengthIndex"],
        inputs: InputKind::Single,
        lines: &["rsi"],
        params: &RSI_PARAMS,
        build: build_rsi,
    },
    IndicatorDef {
        name: "RSI_Safe",
        aliases: &[],
        inputs: InputKind::Single,
        lines: &["rsi"],
        params: &RSI_SAFE_PARAMS,
        build: build_rsi,
    },
    IndicatorDef {
        name: "RMI",
        aliases: &["RelativeMomentumIndex"],
        inputs: InputKind::Single,
        lines: &["rmi"],
        params: &RMI_PARAMS,
        build: build_rsi,
    },
];
