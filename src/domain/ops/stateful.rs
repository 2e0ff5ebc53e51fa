//! Operators with bar-to-bar state beyond a single recursive value.
//!
//! State is kept in trailing hidden output lines and read back from the
//! previous bar, which makes every instance independent and lets the open
//! bar be recomputed.

use crate::domain::node::{Arity, BarCtx, Operator, SpanCtx};
use crate::domain::series::Series;

/// Run `step` over `[start, end)` as the incremental pass would, against
/// whole arrays.
fn replay(
    ctx: &mut SpanCtx<'_>,
    start: usize,
    end: usize,
    mut step: impl FnMut(usize, &[&[f64]], &mut [Series]),
) {
    let inputs = ctx.inputs();
    let srcs: Vec<&[f64]> = (0..inputs.len()).map(|i| inputs.series(i).as_slice()).collect();
    let outs = ctx.outputs();
    for i in start..end {
        step(i, &srcs, outs);
    }
}

fn prev(outs: &[Series], slot: usize, i: usize) -> f64 {
    i.checked_sub(1).map_or(f64::NAN, |p| outs[slot].at(p))
}

/// Difference of two inputs, carrying the last non-zero difference forward
/// over bars where they are equal.
#[derive(Debug, Clone, Copy)]
pub struct NonZeroDifference;

impl NonZeroDifference {
    fn carry(d: f64, prev: f64) -> f64 {
        if d != 0.0 { d } else { prev }
    }
}

impl Operator for NonZeroDifference {
    fn name(&self) -> &'static str {
        "NonZeroDifference"
    }
    fn arity(&self) -> Arity {
        Arity::Exactly(2)
    }
    fn lines(&self) -> &'static [&'static str] {
        &["nzd"]
    }
    fn nextstart(&self, ctx: &mut BarCtx<'_>) {
        let d = ctx.input(0, 0) - ctx.input(1, 0);
        ctx.set(0, d);
    }
    fn next(&self, ctx: &mut BarCtx<'_>) {
        let d = ctx.input(0, 0) - ctx.input(1, 0);
        let v = Self::carry(d, ctx.output(0, -1));
        ctx.set(0, v);
    }
    fn oncestart(&self, ctx: &mut SpanCtx<'_>, start: usize, end: usize) {
        let (a, b) = (ctx.input(0), ctx.input(1));
        let dst = ctx.output(0);
        for i in start..end {
            dst[i] = a[i] - b[i];
        }
    }
    fn once(&self, ctx: &mut SpanCtx<'_>, start: usize, end: usize) {
        let (a, b) = (ctx.input(0), ctx.input(1));
        let dst = ctx.output(0);
        let mut prev = dst[start - 1];
        for i in start..end {
            prev = Self::carry(a[i] - b[i], prev);
            dst[i] = prev;
        }
    }
}

/// Ehlers' error-correcting filter. Inputs: price, its EMA.
///
/// Each bar tries gains `-gainlimit/10 ..= gainlimit/10` in steps of 0.1 and
/// keeps the corrected EMA closest to the price. The seed bar has no
/// previous value to correct and takes the EMA as is.
#[derive(Debug, Clone, Copy)]
pub struct ErrorCorrecting {
    pub alpha: f64,
    pub gainlimit: i64,
}

impl ErrorCorrecting {
    pub fn new(period: usize, gainlimit: i64) -> Self {
        Self {
            alpha: 2.0 / (1.0 + period as f64),
            gainlimit,
        }
    }

    fn correct(&self, price: f64, ema: f64, ec1: f64) -> f64 {
        let alpha1 = 1.0 - self.alpha;
        let mut least = f64::MAX;
        let mut best = ema;
        for value1 in -self.gainlimit..=self.gainlimit {
            let gain = value1 as f64 / 10.0;
            let ec = self.alpha * (ema + gain * (price - ec1)) + alpha1 * ec1;
            let error = (price - ec).abs();
            if error < least {
                least = error;
                best = ec;
            }
        }
        best
    }
}

impl Operator for ErrorCorrecting {
    fn name(&self) -> &'static str {
        "ZeroLagIndicator"
    }
    fn arity(&self) -> Arity {
        Arity::Exactly(2)
    }
    fn lines(&self) -> &'static [&'static str] {
        &["ec"]
    }
    fn next(&self, ctx: &mut BarCtx<'_>) {
        let v = self.correct(ctx.input(0, 0), ctx.input(1, 0), ctx.output(0, -1));
        ctx.set(0, v);
    }
    fn once(&self, ctx: &mut SpanCtx<'_>, start: usize, end: usize) {
        let (price, ema) = (ctx.input(0), ctx.input(1));
        let dst = ctx.output(0);
        for i in start..end {
            let ec1 = i.checked_sub(1).map_or(f64::NAN, |p| dst[p]);
            dst[i] = self.correct(price[i], ema[i], ec1);
        }
    }
}

/// Four-stage Laguerre filter state update.
fn laguerre_step(gamma: f64, x: f64, prev: [f64; 4]) -> [f64; 4] {
    let [l0_1, l1_1, l2_1, l3_1] = prev;
    let l0 = (1.0 - gamma) * x + gamma * l0_1;
    let l1 = -gamma * l0 + l0_1 + gamma * l1_1;
    let l2 = -gamma * l1 + l1_1 + gamma * l2_1;
    let l3 = -gamma * l2 + l2_1 + gamma * l3_1;
    [l0, l1, l2, l3]
}

/// Previous filter state, zero before the first evaluated bar.
fn laguerre_prev(outs: &[Series], first_state_slot: usize, i: usize, seeding: bool) -> [f64; 4] {
    if seeding {
        return [0.0; 4];
    }
    std::array::from_fn(|k| prev(outs, first_state_slot + k, i))
}

fn write_state(outs: &mut [Series], first_state_slot: usize, i: usize, state: [f64; 4]) {
    for (k, v) in state.into_iter().enumerate() {
        outs[first_state_slot + k].as_mut_slice()[i] = v;
    }
}

/// Laguerre RSI (Ehlers). Output in [0, 1]; 1.0 when the filter is flat.
#[derive(Debug, Clone, Copy)]
pub struct LaguerreRsi {
    pub gamma: f64,
    pub period: usize,
}

impl LaguerreRsi {
    fn rsi(state: [f64; 4]) -> f64 {
        let [l0, l1, l2, l3] = state;
        let (mut cu, mut cd) = (0.0, 0.0);
        for (a, b) in [(l0, l1), (l1, l2), (l2, l3)] {
            if a >= b {
                cu += a - b;
            } else {
                cd += b - a;
            }
        }
        let den = cu + cd;
        if den == 0.0 { 1.0 } else { cu / den }
    }

    fn eval(&self, i: usize, x: f64, outs: &mut [Series], seeding: bool) {
        let state = laguerre_step(self.gamma, x, laguerre_prev(outs, 1, i, seeding));
        outs[0].as_mut_slice()[i] = Self::rsi(state);
        write_state(outs, 1, i, state);
    }
}

impl Operator for LaguerreRsi {
    fn name(&self) -> &'static str {
        "LaguerreRSI"
    }
    fn arity(&self) -> Arity {
        Arity::Exactly(1)
    }
    fn lines(&self) -> &'static [&'static str] {
        &["lrsi", "l0", "l1", "l2", "l3"]
    }
    fn hidden_lines(&self) -> usize {
        4
    }
    fn extend(&self) -> usize {
        self.period.saturating_sub(1)
    }
    fn nextstart(&self, ctx: &mut BarCtx<'_>) {
        let (i, x) = (ctx.index(), ctx.input(0, 0));
        with_outputs(ctx, |outs| self.eval(i, x, outs, true));
    }
    fn next(&self, ctx: &mut BarCtx<'_>) {
        let (i, x) = (ctx.index(), ctx.input(0, 0));
        with_outputs(ctx, |outs| self.eval(i, x, outs, false));
    }
    fn oncestart(&self, ctx: &mut SpanCtx<'_>, start: usize, end: usize) {
        replay(ctx, start, end, |i, src, outs| self.eval(i, src[0][i], outs, true));
    }
    fn once(&self, ctx: &mut SpanCtx<'_>, start: usize, end: usize) {
        replay(ctx, start, end, |i, src, outs| self.eval(i, src[0][i], outs, false));
    }
}

/// Laguerre filter (Ehlers): `(l0 + 2*l1 + 2*l2 + l3) / 6`.
#[derive(Debug, Clone, Copy)]
pub struct LaguerreFilter {
    pub gamma: f64,
}

impl LaguerreFilter {
    fn eval(&self, i: usize, x: f64, outs: &mut [Series], seeding: bool) {
        let state = laguerre_step(self.gamma, x, laguerre_prev(outs, 1, i, seeding));
        let [l0, l1, l2, l3] = state;
        outs[0].as_mut_slice()[i] = (l0 + 2.0 * l1 + 2.0 * l2 + l3) / 6.0;
        write_state(outs, 1, i, state);
    }
}

impl Operator for LaguerreFilter {
    fn name(&self) -> &'static str {
        "LaguerreFilter"
    }
    fn arity(&self) -> Arity {
        Arity::Exactly(1)
    }
    fn lines(&self) -> &'static [&'static str] {
        &["filter", "l0", "l1", "l2", "l3"]
    }
    fn hidden_lines(&self) -> usize {
        4
    }
    fn nextstart(&self, ctx: &mut BarCtx<'_>) {
        let (i, x) = (ctx.index(), ctx.input(0, 0));
        with_outputs(ctx, |outs| self.eval(i, x, outs, true));
    }
    fn next(&self, ctx: &mut BarCtx<'_>) {
        let (i, x) = (ctx.index(), ctx.input(0, 0));
        with_outputs(ctx, |outs| self.eval(i, x, outs, false));
    }
    fn oncestart(&self, ctx: &mut SpanCtx<'_>, start: usize, end: usize) {
        replay(ctx, start, end, |i, src, outs| self.eval(i, src[0][i], outs, true));
    }
    fn once(&self, ctx: &mut SpanCtx<'_>, start: usize, end: usize) {
        replay(ctx, start, end, |i, src, outs| self.eval(i, src[0][i], outs, false));
    }
}

fn with_outputs(ctx: &mut BarCtx<'_>, f: impl FnOnce(&mut [Series])) {
    f(ctx.outputs_mut());
}

/// Heikin Ashi candles. Inputs: open, high, low, close.
/// Outputs: ha_open, ha_high, ha_low, ha_close.
#[derive(Debug, Clone, Copy)]
pub struct HeikinAshi;

impl HeikinAshi {
    fn eval(i: usize, src: [f64; 4], outs: &mut [Series], seeding: bool) {
        let [o, h, l, c] = src;
        let ha_close = (o + h + l + c) / 4.0;
        let ha_open = if seeding {
            (o + c) / 2.0
        } else {
            (prev(outs, 0, i) + prev(outs, 3, i)) / 2.0
        };
        let ha_high = h.max(ha_open).max(ha_close);
        let ha_low = l.min(ha_open).min(ha_close);
        for (slot, v) in [ha_open, ha_high, ha_low, ha_close].into_iter().enumerate() {
            outs[slot].as_mut_slice()[i] = v;
        }
    }

    fn bar(ctx: &BarCtx<'_>) -> [f64; 4] {
        std::array::from_fn(|k| ctx.input(k, 0))
    }
}

impl Operator for HeikinAshi {
    fn name(&self) -> &'static str {
        "HeikinAshi"
    }
    fn arity(&self) -> Arity {
        Arity::Exactly(4)
    }
    fn lines(&self) -> &'static [&'static str] {
        &["ha_open", "ha_high", "ha_low", "ha_close"]
    }
    fn nextstart(&self, ctx: &mut BarCtx<'_>) {
        let (i, src) = (ctx.index(), Self::bar(ctx));
        with_outputs(ctx, |outs| Self::eval(i, src, outs, true));
    }
    fn next(&self, ctx: &mut BarCtx<'_>) {
        let (i, src) = (ctx.index(), Self::bar(ctx));
        with_outputs(ctx, |outs| Self::eval(i, src, outs, false));
    }
    fn oncestart(&self, ctx: &mut SpanCtx<'_>, start: usize, end: usize) {
        replay(ctx, start, end, |i, src, outs| {
            Self::eval(i, std::array::from_fn(|k| src[k][i]), outs, true)
        });
    }
    fn once(&self, ctx: &mut SpanCtx<'_>, start: usize, end: usize) {
        replay(ctx, start, end, |i, src, outs| {
            Self::eval(i, std::array::from_fn(|k| src[k][i]), outs, false)
        });
    }
}

/// Wilder's parabolic stop-and-reverse. Inputs: high, low, close.
///
/// Output `psar` is the stop for the current bar. Hidden lines hold the
/// stop projected for the next bar, the trend (1 long, 0 short), the
/// extreme price and the acceleration factor.
#[derive(Debug, Clone, Copy)]
pub struct ParabolicSar {
    pub af: f64,
    pub afmax: f64,
}

#[derive(Debug, Clone, Copy)]
struct SarState {
    sar: f64,
    long: bool,
    ep: f64,
    af: f64,
}

const SAR_NEXT: usize = 1;
const SAR_TREND: usize = 2;
const SAR_EP: usize = 3;
const SAR_AF: usize = 4;

impl ParabolicSar {
    /// Start from a fake previous state that reverses on the first bar.
    fn seed_state(&self, hl: [f64; 4], close: f64, close1: f64) -> SarState {
        let [hi, lo, hi1, lo1] = hl;
        let up = close >= close1;
        SarState {
            sar: (hi + lo) / 2.0,
            long: !up,
            ep: if up { lo1 } else { hi1 },
            af: self.af,
        }
    }

    fn stored_state(outs: &[Series], i: usize) -> SarState {
        SarState {
            sar: prev(outs, SAR_NEXT, i),
            long: prev(outs, SAR_TREND, i) != 0.0,
            ep: prev(outs, SAR_EP, i),
            af: prev(outs, SAR_AF, i),
        }
    }

    /// `hl` is high, low, previous high, previous low.
    fn advance(&self, state: SarState, hl: [f64; 4]) -> (f64, SarState) {
        let [hi, lo, hi1, lo1] = hl;
        let mut long = state.long;
        let mut sar = state.sar;
        let (mut ep, mut af);
        if (long && sar >= lo) || (!long && sar <= hi) {
            long = !long;
            sar = state.ep;
            ep = if long { hi } else { lo };
            af = self.af;
        } else {
            ep = state.ep;
            af = state.af;
        }
        let today = sar;

        if long {
            if hi > ep {
                ep = hi;
                af = (af + self.af).min(self.afmax);
            }
        } else if lo < ep {
            ep = lo;
            af = (af + self.af).min(self.afmax);
        }

        sar += af * (ep - sar);
        if long {
            if sar > lo || sar > lo1 {
                sar = lo.min(lo1);
            }
        } else if sar < hi || sar < hi1 {
            sar = hi.max(hi1);
        }
        (today, SarState { sar, long, ep, af })
    }

    fn eval(&self, i: usize, src: &[&[f64]], outs: &mut [Series], seeding: bool) {
        let at = |k: usize, j: usize| src[k].get(j).copied().unwrap_or(f64::NAN);
        let p = i.saturating_sub(1);
        let hl = [at(0, i), at(1, i), at(0, p), at(1, p)];
        let state = if seeding {
            self.seed_state(hl, at(2, i), at(2, p))
        } else {
            Self::stored_state(outs, i)
        };
        let (today, next) = self.advance(state, hl);
        let row = [
            today,
            next.sar,
            if next.long { 1.0 } else { 0.0 },
            next.ep,
            next.af,
        ];
        for (slot, v) in row.into_iter().enumerate() {
            outs[slot].as_mut_slice()[i] = v;
        }
    }
}

impl Operator for ParabolicSar {
    fn name(&self) -> &'static str {
        "ParabolicSAR"
    }
    fn arity(&self) -> Arity {
        Arity::Exactly(3)
    }
    fn lines(&self) -> &'static [&'static str] {
        &["psar", "next_sar", "trend", "ep", "af"]
    }
    fn hidden_lines(&self) -> usize {
        4
    }
    fn extend(&self) -> usize {
        1
    }
    fn nextstart(&self, ctx: &mut BarCtx<'_>) {
        let i = ctx.index();
        let inputs = ctx.inputs();
        let srcs: Vec<&[f64]> = (0..3).map(|k| inputs.series(k).as_slice()).collect();
        with_outputs(ctx, |outs| self.eval(i, &srcs, outs, true));
    }
    fn next(&self, ctx: &mut BarCtx<'_>) {
        let i = ctx.index();
        let inputs = ctx.inputs();
        let srcs: Vec<&[f64]> = (0..3).map(|k| inputs.series(k).as_slice()).collect();
        with_outputs(ctx, |outs| self.eval(i, &srcs, outs, false));
    }
    fn oncestart(&self, ctx: &mut SpanCtx<'_>, start: usize, end: usize) {
        replay(ctx, start, end, |i, src, outs| self.eval(i, src, outs, true));
    }
    fn once(&self, ctx: &mut SpanCtx<'_>, start: usize, end: usize) {
        replay(ctx, start, end, |i, src, outs| self.eval(i, src, outs, false));
    }
}
