//! Directional movement, Aroon, Vortex, parabolic SAR and Ichimoku.

use crate::domain::error::LineflowError;
use crate::domain::graph::{BarLines, GraphBuilder};
use crate::domain::indicator::catalog::{IndicatorDef, InputKind};
use crate::domain::indicator::movav::MovAvKind;
use crate::domain::indicator::params::{ParamSpec, Params};
use crate::domain::indicator::{Source, volatility};
use crate::domain::line::LineId;
use crate::domain::ops::stateful::ParabolicSar;
use crate::domain::ops::window::WindowKind;

type Wired = Result<LineId, LineflowError>;
type Built = Result<Vec<LineId>, LineflowError>;

/// Every line the directional movement family can expose.
struct Directional {
    plus_di: LineId,
    minus_di: LineId,
    adx: LineId,
    adxr: LineId,
}

/// Directional lines that only need the DI pair.
fn di_pair(g: &mut GraphBuilder, bars: &BarLines, p: &Params) -> Result<(LineId, LineId), LineflowError> {
    let period = p.period("period")?;
    let movav = p.movav("movav")?;

    let prev_high = g.lag(bars.high, 1)?;
    let prev_low = g.lag(bars.low, 1)?;
    let upmove = g.sub(bars.high, prev_high)?;
    let downmove = g.sub(prev_low, bars.low)?;

    let plus_dm = directional_move(g, upmove, downmove)?;
    let minus_dm = directional_move(g, downmove, upmove)?;

    let atr = volatility::atr(g, bars, period, movav)?;
    let plus_ma = movav.build(g, plus_dm, period)?;
    let minus_ma = movav.build(g, minus_dm, period)?;
    let plus_ratio = g.div(plus_ma, atr)?;
    let minus_ratio = g.div(minus_ma, atr)?;
    Ok((g.mul(plus_ratio, 100.0)?, g.mul(minus_ratio, 100.0)?))
}

/// `ours` where it beats both `theirs` and zero, else 0.
fn directional_move(g: &mut GraphBuilder, ours: LineId, theirs: LineId) -> Wired {
    let beats = g.gt(ours, theirs)?;
    let positive = g.gt(ours, 0.0)?;
    let both = g.and(beats, positive)?;
    g.select(both, ours, 0.0)
}

fn directional(g: &mut GraphBuilder, s: &Source, p: &Params) -> Result<Directional, LineflowError> {
    let bars = s.bars(p.indicator())?;
    let period = p.period("period")?;
    let movav = p.movav("movav")?;
    let (plus_di, minus_di) = di_pair(g, &bars, p)?;

    let spread = g.sub(plus_di, minus_di)?;
    let spread = g.abs(spread)?;
    let total = g.sum(plus_di, minus_di)?;
    let dx = g.div(spread, total)?;
    let dx_ma = movav.build(g, dx, period)?;
    let adx = g.mul(dx_ma, 100.0)?;

    let adx_back = g.lag(adx, period)?;
    let adx_sum = g.sum(adx, adx_back)?;
    let adxr = g.div(adx_sum, 2.0)?;
    Ok(Directional {
        plus_di,
        minus_di,
        adx,
        adxr,
    })
}

fn build_di(g: &mut GraphBuilder, s: &Source, p: &Params) -> Built {
    let bars = s.bars(p.indicator())?;
    let (plus, minus) = di_pair(g, &bars, p)?;
    Ok(vec![plus, minus])
}

fn build_plus_di(g: &mut GraphBuilder, s: &Source, p: &Params) -> Built {
    let bars = s.bars(p.indicator())?;
    Ok(vec![di_pair(g, &bars, p)?.0])
}

fn build_minus_di(g: &mut GraphBuilder, s: &Source, p: &Params) -> Built {
    let bars = s.bars(p.indicator())?;
    Ok(vec![di_pair(g, &bars, p)?.1])
}

fn build_adx(g: &mut GraphBuilder, s: &Source, p: &Params) -> Built {
    Ok(vec![directional(g, s, p)?.adx])
}

fn build_adxr(g: &mut GraphBuilder, s: &Source, p: &Params) -> Built {
    let d = directional(g, s, p)?;
    Ok(vec![d.adx, d.adxr])
}

fn build_dmi(g: &mut GraphBuilder, s: &Source, p: &Params) -> Built {
    let d = directional(g, s, p)?;
    Ok(vec![d.adx, d.plus_di, d.minus_di])
}

fn build_dm(g: &mut GraphBuilder, s: &Source, p: &Params) -> Built {
    let d = directional(g, s, p)?;
    Ok(vec![d.adx, d.adxr, d.plus_di, d.minus_di])
}

/// `100 * (period - bars since extreme) / period`, looking back
/// `period + 1` bars so the current bar is included.
fn aroon_side(g: &mut GraphBuilder, data: LineId, kind: WindowKind, period: usize) -> Wired {
    let since = g.window(kind, data, period + 1)?;
    let remaining = g.sub(period as f64, since)?;
    let ratio = g.div(remaining, period as f64)?;
    g.mul(ratio, 100.0)
}

fn aroon_up(g: &mut GraphBuilder, s: &Source, p: &Params) -> Wired {
    let bars = s.bars(p.indicator())?;
    aroon_side(g, bars.high, WindowKind::FindFirstIndexHighest, p.period("period")?)
}

fn aroon_down(g: &mut GraphBuilder, s: &Source, p: &Params) -> Wired {
    let bars = s.bars(p.indicator())?;
    aroon_side(g, bars.low, WindowKind::FindFirstIndexLowest, p.period("period")?)
}

fn build_aroon_up(g: &mut GraphBuilder, s: &Source, p: &Params) -> Built {
    Ok(vec![aroon_up(g, s, p)?])
}

fn build_aroon_down(g: &mut GraphBuilder, s: &Source, p: &Params) -> Built {
    Ok(vec![aroon_down(g, s, p)?])
}

fn build_aroon_up_down(g: &mut GraphBuilder, s: &Source, p: &Params) -> Built {
    Ok(vec![aroon_up(g, s, p)?, aroon_down(g, s, p)?])
}

fn build_aroon_osc(g: &mut GraphBuilder, s: &Source, p: &Params) -> Built {
    let up = aroon_up(g, s, p)?;
    let down = aroon_down(g, s, p)?;
    Ok(vec![g.sub(up, down)?])
}

fn build_aroon_up_down_osc(g: &mut GraphBuilder, s: &Source, p: &Params) -> Built {
    let up = aroon_up(g, s, p)?;
    let down = aroon_down(g, s, p)?;
    let osc = g.sub(up, down)?;
    Ok(vec![up, down, osc])
}

fn build_vortex(g: &mut GraphBuilder, s: &Source, p: &Params) -> Built {
    let bars = s.bars(p.indicator())?;
    let period = p.period("period")?;

    let prev_low = g.lag(bars.low, 1)?;
    let prev_high = g.lag(bars.high, 1)?;
    let vm_plus = g.sub(bars.high, prev_low)?;
    let vm_plus = g.abs(vm_plus)?;
    let vm_minus = g.sub(bars.low, prev_high)?;
    let vm_minus = g.abs(vm_minus)?;

    let tr = volatility::true_range(g, &bars)?;
    let sum_tr = g.sum_n(tr, period)?;
    let sum_plus = g.sum_n(vm_plus, period)?;
    let sum_minus = g.sum_n(vm_minus, period)?;
    Ok(vec![g.div(sum_plus, sum_tr)?, g.div(sum_minus, sum_tr)?])
}

fn build_psar(g: &mut GraphBuilder, s: &Source, p: &Params) -> Built {
    let bars = s.bars(p.indicator())?;
    let op = ParabolicSar {
        af: p.float("af")?,
        afmax: p.float("afmax")?,
    };
    Ok(vec![g.add(op, &[bars.high, bars.low, bars.close])?])
}

/// Midpoint of the `period`-bar range.
fn midrange(g: &mut GraphBuilder, bars: &BarLines, period: usize) -> Wired {
    let hh = g.highest(bars.high, period)?;
    let ll = g.lowest(bars.low, period)?;
    let total = g.sum(hh, ll)?;
    g.div(total, 2.0)
}

fn build_ichimoku(g: &mut GraphBuilder, s: &Source, p: &Params) -> Built {
    let bars = s.bars(p.indicator())?;
    let lead = p.count("senkou_lead")?;

    let tenkan = midrange(g, &bars, p.period("tenkan")?)?;
    let kijun = midrange(g, &bars, p.period("kijun")?)?;
    let base = g.sum(tenkan, kijun)?;
    let span_a = g.div(base, 2.0)?;
    let span_a = g.lag(span_a, lead)?;
    let span_b = midrange(g, &bars, p.period("senkou")?)?;
    let span_b = g.lag(span_b, lead)?;
    // plotted behind price: reads a future close
    let chikou = g.lead(bars.close, p.count("chikou")?)?;
    Ok(vec![tenkan, kijun, span_a, span_b, chikou])
}

const DM_PARAMS: &[ParamSpec] = &[
    ParamSpec::int("period", 14),
    ParamSpec::movav("movav", MovAvKind::Smoothed),
];

const AROON_PARAMS: &[ParamSpec] = &[
    ParamSpec::int("period", 14),
    ParamSpec::float("upperband", 70.0),
    ParamSpec::float("lowerband", 30.0),
];

pub static DEFS: &[IndicatorDef] = &[
    IndicatorDef {
        name: "DirectionalIndicator",
        aliases: &["DI"],
        inputs: InputKind::Bar,
        lines: &["plusDI", "minusDI"],
        params: DM_PARAMS,
        build: build_di,
    },
    IndicatorDef {
        name: "PlusDirectionalIndicator",
        aliases: &["PlusDI", "+DI"],
        inputs: InputKind::Bar,
        lines: &["plusDI"],
        params: DM_PARAMS,
        build: build_plus_di,
    },
    IndicatorDef {
        name: "MinusDirectionalIndicator",
        aliases: &["MinusDI", "-DI"],
        inputs: InputKind::Bar,
        lines: &["minusDI"],
        params: DM_PARAMS,
        build: build_minus_di,
    },
    IndicatorDef {
        name: "AverageDirectionalMovementIndex",
        aliases: &["ADX"],
        inputs: InputKind::Bar,
        lines: &["adx"],
        params: DM_PARAMS,
        build: build_adx,
    },
    IndicatorDef {
        name: "AverageDirectionalMovementIndexRating",
        aliases: &["ADXR"],
        inputs: InputKind::Bar,
        lines: &["adx", "adxr"],
        params: DM_PARAMS,
        build: build_adxr,
    },
    IndicatorDef {
        name: "DirectionalMovementIndex",
        aliases: &["DMI"],
        inputs: InputKind::Bar,
        lines: &["adx", "plusDI", "minusDI"],
        params: DM_PARAMS,
        build: build_dmi,
    },
    IndicatorDef {
        name: "DirectionalMovement",
        aliases: &["DM"],
        inputs: InputKind::Bar,
        lines: &["adx", "adxr", "plusDI", "minusDI"],
        params: DM_PARAMS,
        build: build_dm,
    },
    IndicatorDef {
        name: "AroonUp",
        aliases: &[],
        inputs: InputKind::Bar,
        lines: &["aroonup"],
        params: AROON_PARAMS,
        build: build_aroon_up,
    },
    IndicatorDef {
        name: "AroonDown",
        aliases: &[],
        inputs: InputKind::Bar,
        lines: &["aroondown"],
        params: AROON_PARAMS,
        build: build_aroon_down,
    },
    IndicatorDef {
        name: "AroonUpDown",
        aliases: &[],
        inputs: InputKind::Bar,
        lines: &["aroonup", "aroondown"],
        params: AROON_PARAMS,
        build: build_aroon_up_down,
    },
    IndicatorDef {
        name: "AroonOscillator",
        aliases: &["AroonOsc"],
        inputs: InputKind::Bar,
        lines: &["aroonosc"],
        params: AROON_PARAMS,
        build: build_aroon_osc,
    },
    IndicatorDef {
        name: "AroonUpDownOscillator",
        aliases: &["AroonUpDownOsc"],
        inputs: InputKind::Bar,
        lines: &["aroonup", "aroondown", "aroonosc"],
        params: AROON_PARAMS,
        build: build_aroon_up_down_osc,
    },
    IndicatorDef {
        name: "Vortex",
        aliases: &[],
        inputs: InputKind::Bar,
        lines: &["vi_plus", "vi_minus"],
        params: &[ParamSpec::int("period", 14)],
        build: build_vortex,
    },
    IndicatorDef {
        name: "ParabolicSAR",
        aliases: &["PSAR"],
        inputs: InputKind::Bar,
        lines: &["psar"],
        params: &[ParamSpec::float("af", 0.02), ParamSpec::float("afmax", 0.2)],
        build: build_psar,
    },
    IndicatorDef {
        name: "Ichimoku",
        aliases: &[],
        inputs: InputKind::Bar,
        lines: &[
            "tenkan_sen",
            "kijun_sen",
            "senkou_span_a",
            "senkou_span_b",
            "chikou_span",
        ],
        params: &[
            ParamSpec::int("tenkan", 9),
            ParamSpec::int("kijun", 26),
            ParamSpec::int("senkou", 52),
            ParamSpec::int("senkou_lead", 26),
            ParamSpec::int("chikou", 26),
        ],
        build: build_ichimoku,
    },
];
