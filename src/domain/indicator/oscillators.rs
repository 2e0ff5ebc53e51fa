//! Oscillators: spreads of averages, range positions and the Laguerre pair.

use crate::domain::error::LineflowError;
use crate::domain::graph::{BarLines, GraphBuilder};
use crate::domain::indicator::catalog::{IndicatorDef, InputKind};
use crate::domain::indicator::movav::MovAvKind;
use crate::domain::indicator::params::{ParamSpec, Params};
use crate::domain::indicator::{Source, momentum, volatility};
use crate::domain::line::LineId;
use crate::domain::ops::numeric::DivPolicy;
use crate::domain::ops::smoothing::Accum;
use crate::domain::ops::stateful::{LaguerreFilter, LaguerreRsi};
use crate::domain::ops::window::WindowKind;

type Wired = Result<LineId, LineflowError>;
type Built = Result<Vec<LineId>, LineflowError>;

/// `ma(x, p1) - ma(x, p2)`, returned with both averages.
fn spread(
    g: &mut GraphBuilder,
    data: LineId,
    p1: usize,
    p2: usize,
    movav: MovAvKind,
) -> Result<(LineId, LineId, LineId), LineflowError> {
    let ma1 = movav.build(g, data, p1)?;
    let ma2 = movav.build(g, data, p2)?;
    Ok((g.sub(ma1, ma2)?, ma1, ma2))
}

fn macd_lines(g: &mut GraphBuilder, s: &Source, p: &Params) -> Result<(LineId, LineId), LineflowError> {
    let data = s.single(p.indicator())?;
    let movav = p.movav("movav")?;
    let (macd, _, _) = spread(g, data, p.period("m1_period")?, p.period("m2_period")?, movav)?;
    let signal = movav.build(g, macd, p.period("signal_period")?)?;
    Ok((macd, signal))
}

fn build_macd(g: &mut GraphBuilder, s: &Source, p: &Params) -> Built {
    let (macd, signal) = macd_lines(g, s, p)?;
    Ok(vec![macd, signal])
}

fn build_macd_histo(g: &mut GraphBuilder, s: &Source, p: &Params) -> Built {
    let (macd, signal) = macd_lines(g, s, p)?;
    let histo = g.sub(macd, signal)?;
    Ok(vec![macd, signal, histo])
}

/// Raw %K and its fast average %D.
fn stochastic_k_d(g: &mut GraphBuilder, bars: &BarLines, p: &Params) -> Result<(LineId, LineId), LineflowError> {
    let period = p.period("period")?;
    let hh = g.highest(bars.high, period)?;
    let ll = g.lowest(bars.low, period)?;
    let num = g.sub(bars.close, ll)?;
    let den = g.sub(hh, ll)?;
    let policy = if p.flag("safediv")? {
        DivPolicy::ByZero {
            zero: p.float("safezero")?,
        }
    } else {
        DivPolicy::Raw
    };
    let ratio = g.div_with(policy, num, den)?;
    let k = g.mul(ratio, 100.0)?;
    let d = p.movav("movav")?.build(g, k, p.period("period_dfast")?)?;
    Ok((k, d))
}

fn build_stochastic_fast(g: &mut GraphBuilder, s: &Source, p: &Params) -> Built {
    let bars = s.bars(p.indicator())?;
    let (k, d) = stochastic_k_d(g, &bars, p)?;
    Ok(vec![k, d])
}

fn build_stochastic(g: &mut GraphBuilder, s: &Source, p: &Params) -> Built {
    let bars = s.bars(p.indicator())?;
    let (_, d) = stochastic_k_d(g, &bars, p)?;
    let slow = p.movav("movav")?.build(g, d, p.period("period_dslow")?)?;
    Ok(vec![d, slow])
}

fn build_stochastic_full(g: &mut GraphBuilder, s: &Source, p: &Params) -> Built {
    let bars = s.bars(p.indicator())?;
    let (k, d) = stochastic_k_d(g, &bars, p)?;
    let slow = p.movav("movav")?.build(g, d, p.period("period_dslow")?)?;
    Ok(vec![k, d, slow])
}

fn build_price_osc(g: &mut GraphBuilder, s: &Source, p: &Params) -> Built {
    let data = s.single(p.indicator())?;
    let (po, _, _) = spread(g, data, p.period("period1")?, p.period("period2")?, p.movav("movav")?)?;
    Ok(vec![po])
}

/// `100 * po / den` plus signal and histogram. The long form divides by
/// the slow average, the short form by the fast one.
fn ppo(g: &mut GraphBuilder, s: &Source, p: &Params, long: bool) -> Built {
    let data = s.single(p.indicator())?;
    let movav = p.movav("movav")?;
    let (po, ma1, ma2) = spread(g, data, p.period("period1")?, p.period("period2")?, movav)?;
    let ratio = g.div(po, if long { ma2 } else { ma1 })?;
    let line = g.mul(ratio, 100.0)?;
    let signal = movav.build(g, line, p.period("period_signal")?)?;
    let histo = g.sub(line, signal)?;
    Ok(vec![line, signal, histo])
}

fn build_ppo(g: &mut GraphBuilder, s: &Source, p: &Params) -> Built {
    ppo(g, s, p, true)
}

fn build_ppo_short(g: &mut GraphBuilder, s: &Source, p: &Params) -> Built {
    ppo(g, s, p, false)
}

/// `x - ma[-(period / 2 - 1)]`, rounding the half up for odd periods.
fn build_dpo(g: &mut GraphBuilder, s: &Source, p: &Params) -> Built {
    let data = s.single(p.indicator())?;
    let period = p.period("period")?;
    let ma = p.movav("movav")?.build(g, data, period)?;
    let back = g.lag(ma, period.div_ceil(2) - 1)?;
    Ok(vec![g.sub(data, back)?])
}

fn build_tsi(g: &mut GraphBuilder, s: &Source, p: &Params) -> Built {
    let data = s.single(p.indicator())?;
    let movav = p.movav("movav")?;
    let (p1, p2) = (p.period("period1")?, p.period("period2")?);
    let pc = momentum::change(g, data, p.period("pchange")?)?;
    let sm1 = movav.build(g, pc, p1)?;
    let sm12 = movav.build(g, sm1, p2)?;
    let abs_pc = g.abs(pc)?;
    let sm2 = movav.build(g, abs_pc, p1)?;
    let sm22 = movav.build(g, sm2, p2)?;
    let ratio = g.div(sm12, sm22)?;
    Ok(vec![g.mul(ratio, 100.0)?])
}

/// Weighted blend of buying pressure over three windows, scaled to 0..100.
fn build_ultimate(g: &mut GraphBuilder, s: &Source, p: &Params) -> Built {
    let bars = s.bars(p.indicator())?;
    let tl = volatility::true_low(g, &bars)?;
    let bp = g.sub(bars.close, tl)?;
    let tr = volatility::true_range(g, &bars)?;

    let factor = 100.0 / 7.0;
    let mut uo: Option<LineId> = None;
    for (name, weight) in [("p1", 4.0), ("p2", 2.0), ("p3", 1.0)] {
        let period = p.period(name)?;
        let bp_sum = g.sum_n(bp, period)?;
        let tr_sum = g.sum_n(tr, period)?;
        let av = g.div(bp_sum, tr_sum)?;
        let term = g.mul(av, weight * factor)?;
        uo = Some(match uo {
            None => term,
            Some(acc) => g.sum(acc, term)?,
        });
    }
    uo.map(|line| vec![line]).ok_or_else(|| LineflowError::param(p.indicator(), "p1", "no periods"))
}

fn awesome(g: &mut GraphBuilder, bars: &BarLines, fast: usize, slow: usize, movav: MovAvKind) -> Wired {
    let hl = g.sum(bars.high, bars.low)?;
    let median = g.div(hl, 2.0)?;
    let ma1 = movav.build(g, median, fast)?;
    let ma2 = movav.build(g, median, slow)?;
    g.sub(ma1, ma2)
}

fn build_awesome(g: &mut GraphBuilder, s: &Source, p: &Params) -> Built {
    let bars = s.bars(p.indicator())?;
    let ao = awesome(g, &bars, p.period("fast")?, p.period("slow")?, p.movav("movav")?)?;
    Ok(vec![ao])
}

/// Awesome oscillator (default settings) minus its own average.
fn build_accdec(g: &mut GraphBuilder, s: &Source, p: &Params) -> Built {
    let bars = s.bars(p.indicator())?;
    let movav = p.movav("movav")?;
    let ao = awesome(g, &bars, 5, 34, MovAvKind::Simple)?;
    let smoothed = movav.build(g, ao, p.period("period")?)?;
    Ok(vec![g.sub(ao, smoothed)?])
}

/// `-100 * (HH - close) / (HH - LL)`
fn build_williams_r(g: &mut GraphBuilder, s: &Source, p: &Params) -> Built {
    let bars = s.bars(p.indicator())?;
    let period = p.period("period")?;
    let hh = g.highest(bars.high, period)?;
    let ll = g.lowest(bars.low, period)?;
    let num = g.sub(hh, bars.close)?;
    let den = g.sub(hh, ll)?;
    let ratio = g.div(num, den)?;
    Ok(vec![g.mul(ratio, -100.0)?])
}

fn build_williams_ad(g: &mut GraphBuilder, s: &Source, p: &Params) -> Built {
    let bars = s.bars(p.indicator())?;
    let upday = momentum::up_day(g, bars.close, 1)?;
    let downday = momentum::down_day(g, bars.close, 1)?;
    let tl = volatility::true_low(g, &bars)?;
    let th = volatility::true_high(g, &bars)?;
    let up_range = g.sub(bars.close, tl)?;
    let down_range = g.sub(bars.close, th)?;
    let adup = g.select(upday, up_range, 0.0)?;
    let addown = g.select(downday, down_range, 0.0)?;
    let ad = g.sum(adup, addown)?;
    Ok(vec![g.add(Accum::default(), &[ad])?])
}

/// `(tp - ma(tp)) / (factor * meandev(tp))` on the typical price.
fn build_cci(g: &mut GraphBuilder, s: &Source, p: &Params) -> Built {
    let bars = s.bars(p.indicator())?;
    let period = p.period("period")?;
    let movav = p.movav("movav")?;
    let hl = g.sum(bars.high, bars.low)?;
    let hlc = g.sum(hl, bars.close)?;
    let tp = g.div(hlc, 3.0)?;
    let mean = movav.build(g, tp, period)?;
    let dev = g.sub(tp, mean)?;
    let md = volatility::mean_dev(g, tp, mean, period, movav)?;
    let scaled = g.mul(md, p.float("factor")?)?;
    Ok(vec![g.div(dev, scaled)?])
}

/// Weighted sum of four smoothed rates of change.
fn build_kst(g: &mut GraphBuilder, s: &Source, p: &Params) -> Built {
    let data = s.single(p.indicator())?;
    let factors = p.list("rfactors")?;
    if factors.len() != 4 {
        return Err(LineflowError::param(
            p.indicator(),
            "rfactors",
            format!("expected 4 factors, got {}", factors.len()),
        ));
    }
    let rmovav = p.movav("rmovav")?;
    let mut kst: Option<LineId> = None;
    for (k, &factor) in factors.iter().enumerate() {
        let roc_period = p.period(&format!("rp{}", k + 1))?;
        let ma_period = p.period(&format!("rma{}", k + 1))?;
        let roc = momentum::roc(g, data, roc_period)?;
        let roc100 = g.mul(roc, 100.0)?;
        let smoothed = rmovav.build(g, roc100, ma_period)?;
        let term = g.mul(smoothed, factor)?;
        kst = Some(match kst {
            None => term,
            Some(acc) => g.sum(acc, term)?,
        });
    }
    let kst = kst.ok_or_else(|| LineflowError::param(p.indicator(), "rfactors", "empty"))?;
    let signal = p.movav("smovav")?.build(g, kst, p.period("rsignal")?)?;
    Ok(vec![kst, signal])
}

/// `100 * (ema3 / ema3[-roc_period] - 1)` over a triple smoothing.
fn trix(g: &mut GraphBuilder, data: LineId, p: &Params) -> Wired {
    let period = p.period("period")?;
    let movav = p.movav("movav")?;
    let e1 = movav.build(g, data, period)?;
    let e2 = movav.build(g, e1, period)?;
    let e3 = movav.build(g, e2, period)?;
    let back = g.lag(e3, p.period("roc_period")?)?;
    let ratio = g.div(e3, back)?;
    let change = g.sub(ratio, 1.0)?;
    g.mul(change, 100.0)
}

fn build_trix(g: &mut GraphBuilder, s: &Source, p: &Params) -> Built {
    let data = s.single(p.indicator())?;
    Ok(vec![trix(g, data, p)?])
}

fn build_trix_signal(g: &mut GraphBuilder, s: &Source, p: &Params) -> Built {
    let data = s.single(p.indicator())?;
    let line = trix(g, data, p)?;
    let signal = p.movav("movav")?.build(g, line, p.period("signal_period")?)?;
    Ok(vec![line, signal])
}

/// `(close - ma) / ATR`
fn build_pgo(g: &mut GraphBuilder, s: &Source, p: &Params) -> Built {
    let bars = s.bars(p.indicator())?;
    let period = p.period("period")?;
    let ma = p.movav("movav")?.build(g, bars.close, period)?;
    let atr = volatility::atr(g, &bars, period, MovAvKind::Smoothed)?;
    let dev = g.sub(bars.close, ma)?;
    Ok(vec![g.div(dev, atr)?])
}

/// Percent rank of the smoothed close-to-midrange ratio.
fn build_dv2(g: &mut GraphBuilder, s: &Source, p: &Params) -> Built {
    let bars = s.bars(p.indicator())?;
    let hl = g.sum(bars.high, bars.low)?;
    let mid = g.div(hl, 2.0)?;
    let chl = g.div(bars.close, mid)?;
    let dvu = p.movav("movav")?.build(g, chl, p.period("ma_period")?)?;
    let rank = g.window(WindowKind::PercentRank, dvu, p.period("period")?)?;
    Ok(vec![g.mul(rank, 100.0)?])
}

fn build_laguerre_rsi(g: &mut GraphBuilder, s: &Source, p: &Params) -> Built {
    let data = s.single(p.indicator())?;
    let op = LaguerreRsi {
        gamma: p.float("gamma")?,
        period: p.period("period")?,
    };
    Ok(vec![g.add(op, &[data])?])
}

fn build_laguerre_filter(g: &mut GraphBuilder, s: &Source, p: &Params) -> Built {
    let data = s.single(p.indicator())?;
    let op = LaguerreFilter {
        gamma: p.float("gamma")?,
    };
    Ok(vec![g.add(op, &[data])?])
}

const MACD_PARAMS: &[ParamSpec] = &[
    ParamSpec::int("m1_period", 12),
    ParamSpec::int("m2_period", 26),
    ParamSpec::int("signal_period", 9),
    ParamSpec::movav("movav", MovAvKind::Exponential),
];

const STOCH_BASE: [ParamSpec; 7] = [
    ParamSpec::int("period", 14),
    ParamSpec::int("period_dfast", 3),
    ParamSpec::movav("movav", MovAvKind::Simple),
    ParamSpec::float("upperband", 80.0),
    ParamSpec::float("lowerband", 20.0),
    ParamSpec::flag("safediv", false),
    ParamSpec::float("safezero", 0.0),
];

const STOCH_SLOW: [ParamSpec; 8] = [
    STOCH_BASE[0],
    STOCH_BASE[1],
    STOCH_BASE[2],
    STOCH_BASE[3],
    STOCH_BASE[4],
    STOCH_BASE[5],
    STOCH_BASE[6],
    ParamSpec::int("period_dslow", 3),
];

const PPO_PARAMS: &[ParamSpec] = &[
    ParamSpec::int("period1", 12),
    ParamSpec::int("period2", 26),
    ParamSpec::movav("movav", MovAvKind::Exponential),
    ParamSpec::int("period_signal", 9),
];

const TRIX_PARAMS: [ParamSpec; 3] = [
    ParamSpec::int("period", 15),
    ParamSpec::int("roc_period", 1),
    ParamSpec::movav("movav", MovAvKind::Exponential),
];

const TRIX_SIGNAL_PARAMS: [ParamSpec; 4] = [
    TRIX_PARAMS[0],
    TRIX_PARAMS[1],
    TRIX_PARAMS[2],
    ParamSpec::int("signal_period", 9),
];

pub static DEFS: &[IndicatorDef] = &[
    IndicatorDef {
        name: "MACD",
        aliases: &[],
        inputs: InputKind::Single,
        lines: &["macd", "signal"],
        params: MACD_PARAMS,
        build: build_macd,
    },
    IndicatorDef {
        name: "MACDHisto",
        aliases: &["MACDHistogram"],
        inputs: InputKind::Single,
        lines: &["macd", "signal", "histogram"],
        params: MACD_PARAMS,
        build: build_macd_histo,
    },
    IndicatorDef {
        name: "StochasticFast",
        aliases: &[],
        inputs: InputKind::Bar,
        lines: &["percK", "percD"],
        params: &STOCH_BASE,
        build: build_stochastic_fast,
    },
    IndicatorDef {
        name: "Stochastic",
        aliases: &["StochasticSlow"],
        inputs: InputKind::Bar,
        lines: &["percK", "percD"],
        params: &STOCH_SLOW,
        build: build_stochastic,
    },
    IndicatorDef {
        name: "StochasticFull",
        aliases: &[],
        inputs: InputKind::Bar,
        lines: &["percK", "percD", "percDSlow"],
        params: &STOCH_SLOW,
        build: build_stochastic_full,
    },
    IndicatorDef {
        name: "PriceOscillator",
        aliases: &["PriceOsc", "AbsolutePriceOscillator", "APO", "AbsPriceOsc"],
        inputs: InputKind::Single,
        lines: &["po"],
        params: &[
            ParamSpec::int("period1", 12),
            ParamSpec::int("period2", 26),
            ParamSpec::movav("movav", MovAvKind::Exponential),
        ],
        build: build_price_osc,
    },
    IndicatorDef {
        name: "PercentagePriceOscillator",
        aliases: &["PPO", "PercPriceOsc"],
        inputs: InputKind::Single,
        lines: &["ppo", "signal", "histo"],
        params: PPO_PARAMS,
        build: build_ppo,
    },
    IndicatorDef {
        name: "PercentagePriceOscillatorShort",
        aliases: &["PPOShort", "PercPriceOscShort"],
        inputs: InputKind::Single,
        lines: &["ppo", "signal", "histo"],
        params: PPO_PARAMS,
        build: build_ppo_short,
    },
    IndicatorDef {
        name: "DetrendedPriceOscillator",
        aliases: &["DPO"],
        inputs: InputKind::Single,
        lines: &["dpo"],
        params: &[
            ParamSpec::int("period", 20),
            ParamSpec::movav("movav", MovAvKind::Simple),
        ],
        build: build_dpo,
    },
    IndicatorDef {
        name: "TrueStrengthIndex",
        aliases: &["TSI"],
        inputs: InputKind::Single,
        lines: &["tsi"],
        params: &[
            ParamSpec::int("period1", 25),
            ParamSpec::int("period2", 13),
            ParamSpec::int("pchange", 1),
            ParamSpec::movav("movav", MovAvKind::Exponential),
        ],
        build: build_tsi,
    },
    IndicatorDef {
        name: "UltimateOscillator",
        aliases: &[],
        inputs: InputKind::Bar,
        lines: &["uo"],
        params: &[
            ParamSpec::int("p1", 7),
            ParamSpec::int("p2", 14),
            ParamSpec::int("p3", 28),
            ParamSpec::float("upperband", 70.0),
            ParamSpec::float("lowerband", 30.0),
        ],
        build: build_ultimate,
    },
    IndicatorDef {
        name: "AwesomeOscillator",
        aliases: &["AwesomeOsc", "AO"],
        inputs: InputKind::Bar,
        lines: &["ao"],
        params: &[
            ParamSpec::int("fast", 5),
            ParamSpec::int("slow", 34),
            ParamSpec::movav("movav", MovAvKind::Simple),
        ],
        build: build_awesome,
    },
    IndicatorDef {
        name: "AccelerationDecelerationOscillator",
        aliases: &["AccDeOsc"],
        inputs: InputKind::Bar,
        lines: &["accdec"],
        params: &[
            ParamSpec::int("period", 5),
            ParamSpec::movav("movav", MovAvKind::Simple),
        ],
        build: build_accdec,
    },
    IndicatorDef {
        name: "WilliamsR",
        aliases: &[],
        inputs: InputKind::Bar,
        lines: &["percR"],
        params: &[
            ParamSpec::int("period", 14),
            ParamSpec::float("upperband", -20.0),
            ParamSpec::float("lowerband", -80.0),
        ],
        build: build_williams_r,
    },
    IndicatorDef {
        name: "WilliamsAD",
        aliases: &[],
        inputs: InputKind::Bar,
        lines: &["ad"],
        params: &[],
        build: build_williams_ad,
    },
    IndicatorDef {
        name: "CommodityChannelIndex",
        aliases: &["CCI"],
        inputs: InputKind::Bar,
        lines: &["cci"],
        params: &[
            ParamSpec::int("period", 20),
            ParamSpec::float("factor", 0.015),
            ParamSpec::movav("movav", MovAvKind::Simple),
            ParamSpec::float("upperband", 100.0),
            ParamSpec::float("lowerband", -100.0),
        ],
        build: build_cci,
    },
    IndicatorDef {
        name: "KnowSureThing",
        aliases: &["KST"],
        inputs: InputKind::Single,
        lines: &["kst", "signal"],
        params: &[
            ParamSpec::int("rp1", 10),
            ParamSpec::int("rp2", 15),
            ParamSpec::int("rp3", 20),
            ParamSpec::int("rp4", 30),
            ParamSpec::int("rma1", 10),
            ParamSpec::int("rma2", 10),
            ParamSpec::int("rma3", 10),
            ParamSpec::int("rma4", 15),
            ParamSpec::int("rsignal", 9),
            ParamSpec::list("rfactors", &[1.0, 2.0, 3.0, 4.0]),
            ParamSpec::movav("rmovav", MovAvKind::Simple),
            ParamSpec::movav("smovav", MovAvKind::Simple),
        ],
        build: build_kst,
    },
    IndicatorDef {
        name: "TRIX",
        aliases: &[],
        inputs: InputKind::Single,
        lines: &["trix"],
        params: &TRIX_PARAMS,
        build: build_trix,
    },
    IndicatorDef {
        name: "TrixSignal",
        aliases: &[],
        inputs: InputKind::Single,
        lines: &["trix", "signal"],
        params: &TRIX_SIGNAL_PARAMS,
        build: build_trix_signal,
    },
    IndicatorDef {
        name: "PrettyGoodOscillator",
        aliases: &["PGO", "PrettyGoodOsc"],
        inputs: InputKind::Bar,
        lines: &["pgo"],
        params: &[
            ParamSpec::int("period", 14),
            ParamSpec::movav("movav", MovAvKind::Simple),
        ],
        build: build_pgo,
    },
    IndicatorDef {
        name: "DV2",
        aliases: &[],
        inputs: InputKind::Bar,
        lines: &["dv2"],
        params: &[
            ParamSpec::int("period", 252),
            ParamSpec::int("ma_period", 2),
            ParamSpec::movav("movav", MovAvKind::Simple),
        ],
        build: build_dv2,
    },
    IndicatorDef {
        name: "LaguerreRSI",
        aliases: &["LRSI"],
        inputs: InputKind::Single,
        lines: &["lrsi"],
        params: &[ParamSpec::float("gamma", 0.5), ParamSpec::int("period", 6)],
        build: build_laguerre_rsi,
    },
    IndicatorDef {
        name: "LaguerreFilter",
        aliases: &["LAGF"],
        inputs: InputKind::Single,
        lines: &["filter"],
        params: &[ParamSpec::float("gamma", 0.5)],
        build: build_laguerre_filter,
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
            open: (h + l) / 2.0,
            high: h,
            low: l,
            close: c,
            volume: 500.0,
        }
    }

    fn wave(n: usize) -> Vec<OhlcvBar> {
        (0..n)
            .map(|i| {
                let c = 40.0 + (i as f64 * 0.25).sin() * 4.0 + (i as f64 * 0.05);
                bar(i, c + 0.8, c - 0.6, c)
            })
            .collect()
    }

    fn lines(
        name: &str,
        bars_source: bool,
        overrides: &[(String, ParamValue)],
        data: &[OhlcvBar],
        batch: bool,
    ) -> Vec<Vec<f64>> {
        let mut g = GraphBuilder::new();
        let src = if bars_source {
            Source::Bars(g.feed())
        } else {
            Source::Line(g.feed().close)
        };
        let ind = g.indicator(name, &src, overrides).unwrap();
        let mut graph = g.build().unwrap();
        if batch {
            graph.run_once(data);
        } else {
            graph.run_next(data);
        }
        ind.lines()
            .iter()
            .map(|(_, id)| graph.series(*id).unwrap().as_slice().to_vec())
            .collect()
    }

    fn int(name: &str, v: i64) -> (String, ParamValue) {
        (name.to_string(), ParamValue::Int(v))
    }

    #[test]
    fn macd_histogram_is_difference() {
        let data = wave(60);
        let out = lines("MACDHisto", false, &[], &data, false);
        // signal EMA(9) over macd, which starts at bar 25
        assert!(out[1][32].is_nan());
        assert!(!out[1][33].is_nan());
        for i in 33..60 {
            assert_relative_eq!(out[2][i], out[0][i] - out[1][i]);
        }
    }

    #[test]
    fn macd_seed_matches_between_modes() {
        let data = wave(80);
        let inc = lines("MACD", false, &[], &data, false);
        let batch = lines("MACD", false, &[], &data, true);
        assert_eq!(format!("{inc:?}"), format!("{batch:?}"));
    }

    #[test]
    fn stochastic_at_range_extremes() {
        // close at the top of a rising range
        let data: Vec<_> = (0..6).map(|i| bar(i, 10.0 + i as f64, 9.0 + i as f64, 10.0 + i as f64)).collect();
        let out = lines("StochasticFast", true, &[int("period", 3), int("period_dfast", 2)], &data, false);
        assert_relative_eq!(out[0][5], 100.0);
        assert_relative_eq!(out[1][5], 100.0);
    }

    #[test]
    fn stochastic_safediv_on_flat_range() {
        let data: Vec<_> = (0..6).map(|i| bar(i, 5.0, 5.0, 5.0)).collect();
        let raw = lines("StochasticFast", true, &[int("period", 3)], &data, false);
        assert!(raw[0][5].is_nan());
        let safe = lines(
            "StochasticFast",
            true,
            &[
                int("period", 3),
                ("safediv".into(), ParamValue::Bool(true)),
                ("safezero".into(), ParamValue::Float(50.0)),
            ],
            &data,
            false,
        );
        assert_eq!(safe[0][5], 5000.0);
    }

    #[test]
    fn slow_stochastic_shifts_lines() {
        let data = wave(40);
        let full = lines("StochasticFull", true, &[], &data, false);
        let slow = lines("Stochastic", true, &[], &data, false);
        assert_eq!(format!("{:?}", slow[0]), format!("{:?}", full[1]));
        assert_eq!(format!("{:?}", slow[1]), format!("{:?}", full[2]));
    }

    #[test]
    fn dpo_lags_average_by_half_period() {
        let data = wave(50);
        let dpo = lines("DPO", false, &[], &data, false);
        let sma = lines("SMA", false, &[int("period", 20)], &data, false);
        // lag 9 for period 20
        assert!(dpo[0][27].is_nan());
        assert_relative_eq!(dpo[0][28], data[28].close - sma[0][19]);
    }

    #[test]
    fn williams_r_bounds() {
        let data = wave(40);
        let out = lines("WilliamsR", true, &[], &data, false);
        for v in out[0].iter().filter(|v| !v.is_nan()) {
            assert!((-100.0..=0.0).contains(v));
        }
    }

    #[test]
    fn kst_rejects_wrong_factor_count() {
        let mut g = GraphBuilder::new();
        let close = g.feed().close;
        let err = g
            .indicator(
                "KST",
                &Source::Line(close),
                &[("rfactors".into(), ParamValue::List(vec![1.0, 2.0]))],
            )
            .unwrap_err();
        assert!(matches!(err, LineflowError::Param { ref param, .. } if param == "rfactors"));
    }

    #[test]
    fn ultimate_oscillator_on_closes_at_high() {
        // close always at the high and no gaps: buying pressure equals range
        let data: Vec<_> = (0..40).map(|i| bar(i, 11.0, 9.0, 11.0)).collect();
        let out = lines("UltimateOscillator", true, &[], &data, false);
        assert!(out[0][27].is_nan());
        assert_relative_eq!(out[0][28], 100.0, epsilon = 1e-9);
    }

    #[test]
    fn oscillators_agree_between_modes() {
        let data = wave(300);
        let cases: &[(&str, bool)] = &[
            ("PPO", false),
            ("PPOShort", false),
            ("TSI", false),
            ("AO", true),
            ("AccDeOsc", true),
            ("WilliamsAD", true),
            ("CCI", true),
            ("KST", false),
            ("TrixSignal", false),
            ("PGO", true),
            ("DV2", true),
            ("LRSI", false),
            ("LAGF", false),
        ];
        for &(name, bars_source) in cases {
            let inc = lines(name, bars_source, &[], &data, false);
            let batch = lines(name, bars_source, &[], &data, true);
            assert_eq!(format!("{inc:?}"), format!("{batch:?}"), "{name}");
        }
    }
}
