//! Window reductions, running sums and the crossover family.

use crate::domain::error::LineflowError;
use crate::domain::graph::GraphBuilder;
use crate::domain::indicator::catalog::{IndicatorDef, InputKind};
use crate::domain::indicator::params::{ParamSpec, Params};
use crate::domain::indicator::Source;
use crate::domain::line::LineId;
use crate::domain::ops::arith::BinOp;
use crate::domain::ops::smoothing::{Accum, ExponentialSmoothing, ExponentialSmoothingDynamic};
use crate::domain::ops::stateful::NonZeroDifference;
use crate::domain::ops::window::{WeightedAverage, WindowKind};

type Built = Result<Vec<LineId>, LineflowError>;

fn reduce(kind: WindowKind, g: &mut GraphBuilder, s: &Source, p: &Params) -> Built {
    let data = s.single(p.indicator())?;
    Ok(vec![g.window(kind, data, p.period("period")?)?])
}

fn build_highest(g: &mut GraphBuilder, s: &Source, p: &Params) -> Built {
    reduce(WindowKind::Highest, g, s, p)
}

fn build_lowest(g: &mut GraphBuilder, s: &Source, p: &Params) -> Built {
    reduce(WindowKind::Lowest, g, s, p)
}

fn build_sum_n(g: &mut GraphBuilder, s: &Source, p: &Params) -> Built {
    reduce(WindowKind::Sum, g, s, p)
}

fn build_any_n(g: &mut GraphBuilder, s: &Source, p: &Params) -> Built {
    reduce(WindowKind::Any, g, s, p)
}

fn build_all_n(g: &mut GraphBuilder, s: &Source, p: &Params) -> Built {
    reduce(WindowKind::All, g, s, p)
}

fn build_average(g: &mut GraphBuilder, s: &Source, p: &Params) -> Built {
    reduce(WindowKind::Average, g, s, p)
}

fn build_first_highest(g: &mut GraphBuilder, s: &Source, p: &Params) -> Built {
    reduce(WindowKind::FindFirstIndexHighest, g, s, p)
}

fn build_first_lowest(g: &mut GraphBuilder, s: &Source, p: &Params) -> Built {
    reduce(WindowKind::FindFirstIndexLowest, g, s, p)
}

fn build_last_highest(g: &mut GraphBuilder, s: &Source, p: &Params) -> Built {
    reduce(WindowKind::FindLastIndexHighest, g, s, p)
}

fn build_last_lowest(g: &mut GraphBuilder, s: &Source, p: &Params) -> Built {
    reduce(WindowKind::FindLastIndexLowest, g, s, p)
}

/// Share of the last `period` samples strictly below the current one.
fn build_percent_rank(g: &mut GraphBuilder, s: &Source, p: &Params) -> Built {
    reduce(WindowKind::PercentRank, g, s, p)
}

/// An empty weight list means equal weights of 1.
fn build_weighted_average(g: &mut GraphBuilder, s: &Source, p: &Params) -> Built {
    let data = s.single(p.indicator())?;
    let period = p.period("period")?;
    let weights = p.list("weights")?;
    let weights = if weights.is_empty() {
        vec![1.0; period]
    } else if weights.len() != period {
        return Err(LineflowError::param(
            p.indicator(),
            "weights",
            format!("{} weights given for period {period}", weights.len()),
        ));
    } else {
        weights.to_vec()
    };
    let op = WeightedAverage {
        coef: p.float("coef")?,
        weights,
    };
    Ok(vec![g.add(op, &[data])?])
}

/// `alpha` NaN (the default) means `2 / (1 + period)`.
fn build_exp_smoothing(g: &mut GraphBuilder, s: &Source, p: &Params) -> Built {
    let data = s.single(p.indicator())?;
    let period = p.period("period")?;
    let alpha = p.float("alpha")?;
    let op = if alpha.is_nan() {
        ExponentialSmoothing::ema(period)
    } else {
        ExponentialSmoothing { period, alpha }
    };
    Ok(vec![g.add(op, &[data])?])
}

fn build_exp_smoothing_dynamic(g: &mut GraphBuilder, s: &Source, p: &Params) -> Built {
    let (data, alpha) = s.pair(p.indicator())?;
    let op = ExponentialSmoothingDynamic {
        period: p.period("period")?,
    };
    Ok(vec![g.add(op, &[data, alpha])?])
}

fn build_accum(g: &mut GraphBuilder, s: &Source, p: &Params) -> Built {
    let data = s.single(p.indicator())?;
    Ok(vec![g.add(Accum { seed: p.float("seed")? }, &[data])?])
}

fn build_nzd(g: &mut GraphBuilder, s: &Source, p: &Params) -> Built {
    let (a, b) = s.pair(p.indicator())?;
    g.add_node(NonZeroDifference, &[a, b])
}

/// Last non-zero `a - b` before the current bar, 0 while no side has been
/// established yet.
fn previous_side(g: &mut GraphBuilder, a: LineId, b: LineId) -> Result<LineId, LineflowError> {
    let nzd = g.add(NonZeroDifference, &[a, b])?;
    g.lag_or(nzd, 1, 0.0)
}

pub(crate) fn cross_up(g: &mut GraphBuilder, a: LineId, b: LineId) -> Result<LineId, LineflowError> {
    let side = previous_side(g, a, b)?;
    let was_below = g.binary(BinOp::Le, side, 0.0)?;
    let above = g.gt(a, b)?;
    g.and(was_below, above)
}

pub(crate) fn cross_down(g: &mut GraphBuilder, a: LineId, b: LineId) -> Result<LineId, LineflowError> {
    let side = previous_side(g, a, b)?;
    let was_above = g.binary(BinOp::Ge, side, 0.0)?;
    let below = g.lt(a, b)?;
    g.and(was_above, below)
}

fn build_cross_up(g: &mut GraphBuilder, s: &Source, p: &Params) -> Built {
    let (a, b) = s.pair(p.indicator())?;
    Ok(vec![cross_up(g, a, b)?])
}

fn build_cross_down(g: &mut GraphBuilder, s: &Source, p: &Params) -> Built {
    let (a, b) = s.pair(p.indicator())?;
    Ok(vec![cross_down(g, a, b)?])
}

/// `+1` on an upward cross, `-1` on a downward one, 0 otherwise.
fn build_cross_over(g: &mut GraphBuilder, s: &Source, p: &Params) -> Built {
    let (a, b) = s.pair(p.indicator())?;
    let up = cross_up(g, a, b)?;
    let down = cross_down(g, a, b)?;
    Ok(vec![g.sub(up, down)?])
}

const PERIOD_1: &[ParamSpec] = &[ParamSpec::int("period", 1)];

pub static DEFS: &[IndicatorDef] = &[
    IndicatorDef {
        name: "Highest",
        aliases: &["MaxN"],
        inputs: InputKind::Single,
        lines: &["highest"],
        params: PERIOD_1,
        build: build_highest,
    },
    IndicatorDef {
        name: "Lowest",
        aliases: &["MinN"],
        inputs: InputKind::Single,
        lines: &["lowest"],
        params: PERIOD_1,
        build: build_lowest,
    },
    IndicatorDef {
        name: "SumN",
        aliases: &[],
        inputs: InputKind::Single,
        lines: &["sumn"],
        params: PERIOD_1,
        build: build_sum_n,
    },
    IndicatorDef {
        name: "AnyN",
        aliases: &[],
        inputs: InputKind::Single,
        lines: &["anyn"],
        params: PERIOD_1,
        build: build_any_n,
    },
    IndicatorDef {
        name: "AllN",
        aliases: &[],
        inputs: InputKind::Single,
        lines: &["alln"],
        params: PERIOD_1,
        build: build_all_n,
    },
    IndicatorDef {
        name: "Average",
        aliases: &["ArithmeticMean", "Mean"],
        inputs: InputKind::Single,
        lines: &["av"],
        params: PERIOD_1,
        build: build_average,
    },
    IndicatorDef {
        name: "FindFirstIndexHighest",
        aliases: &[],
        inputs: InputKind::Single,
        lines: &["index"],
        params: PERIOD_1,
        build: build_first_highest,
    },
    IndicatorDef {
        name: "FindFirstIndexLowest",
        aliases: &[],
        inputs: InputKind::Single,
        lines: &["index"],
        params: PERIOD_1,
        build: build_first_lowest,
    },
    IndicatorDef {
        name: "FindLastIndexHighest",
        aliases: &[],
        inputs: InputKind::Single,
        lines: &["index"],
        params: PERIOD_1,
        build: build_last_highest,
    },
    IndicatorDef {
        name: "FindLastIndexLowest",
        aliases: &[],
        inputs: InputKind::Single,
        lines: &["index"],
        params: PERIOD_1,
        build: build_last_lowest,
    },
    IndicatorDef {
        name: "PercentRank",
        aliases: &["PctRank"],
        inputs: InputKind::Single,
        lines: &["pctrank"],
        params: &[ParamSpec::int("period", 50)],
        build: build_percent_rank,
    },
    IndicatorDef {
        name: "WeightedAverage",
        aliases: &["AverageWeighted"],
        inputs: InputKind::Single,
        lines: &["av"],
        params: &[
            ParamSpec::int("period", 1),
            ParamSpec::float("coef", 1.0),
            ParamSpec::list("weights", &[]),
        ],
        build: build_weighted_average,
    },
    IndicatorDef {
        name: "ExponentialSmoothing",
        aliases: &["ExpSmoothing"],
        inputs: InputKind::Single,
        lines: &["av"],
        params: &[ParamSpec::int("period", 1), ParamSpec::float("alpha", f64::NAN)],
        build: build_exp_smoothing,
    },
    IndicatorDef {
        name: "ExponentialSmoothingDynamic",
        aliases: &["ExpSmoothingDynamic"],
        inputs: InputKind::Pair,
        lines: &["av"],
        params: PERIOD_1,
        build: build_exp_smoothing_dynamic,
    },
    IndicatorDef {
        name: "Accum",
        aliases: &["CumSum", "CumulativeSum"],
        inputs: InputKind::Single,
        lines: &["accum"],
        params: &[ParamSpec::float("seed", 0.0)],
        build: build_accum,
    },
    IndicatorDef {
        name: "NonZeroDifference",
        aliases: &["NZD"],
        inputs: InputKind::Pair,
        lines: &["nzd"],
        params: &[],
        build: build_nzd,
    },
    IndicatorDef {
        name: "CrossUp",
        aliases: &[],
        inputs: InputKind::Pair,
        lines: &["cross"],
        params: &[],
        build: build_cross_up,
    },
    IndicatorDef {
        name: "CrossDown",
        aliases: &[],
        inputs: InputKind::Pair,
        lines: &["cross"],
        params: &[],
        build: build_cross_down,
    },
    IndicatorDef {
        name: "CrossOver",
        aliases: &[],
        inputs: InputKind::Pair,
        lines: &["crossover"],
        params: &[],
        build: build_cross_over,
    },
];
