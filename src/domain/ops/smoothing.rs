//! Recursive smoothing.
//!
//! Each operator here carries its previous output into the next bar. The
//! seed bar (first bar past minperiod) is computed by one shared function in
//! both modes, and the recursion reads the previous value back from the
//! output line, so incremental and batch passes start from the same seed.

use crate::domain::minperiod;
use crate::domain::node::{Arity, BarCtx, Operator, SpanCtx};
use crate::domain::ops::numeric::mean;

/// `y[i] = y[i-1] * (1 - alpha) + x[i] * alpha`, seeded with the arithmetic
/// mean of the first `period` samples.
#[derive(Debug, Clone, Copy)]
pub struct ExponentialSmoothing {
    pub period: usize,
    pub alpha: f64,
}

impl ExponentialSmoothing {
    /// `alpha = 2 / (period + 1)`
    pub fn ema(period: usize) -> Self {
        Self {
            period,
            alpha: 2.0 / (1.0 + period as f64),
        }
    }

    /// Wilder smoothing, `alpha = 1 / period`.
    pub fn smma(period: usize) -> Self {
        Self {
            period,
            alpha: 1.0 / period as f64,
        }
    }

    fn step(&self, prev: f64, x: f64) -> f64 {
        prev * (1.0 - self.alpha) + x * self.alpha
    }
}

impl Operator for ExponentialSmoothing {
    fn name(&self) -> &'static str {
        "ExponentialSmoothing"
    }
    fn arity(&self) -> Arity {
        Arity::Exactly(1)
    }
    fn extend(&self) -> usize {
        self.period.saturating_sub(1)
    }
    fn nextstart(&self, ctx: &mut BarCtx<'_>) {
        let i = ctx.index();
        let seed = mean(ctx.inputs().series(0).get_range(i + 1 - self.period, i + 1));
        ctx.set(0, seed);
    }
    fn next(&self, ctx: &mut BarCtx<'_>) {
        let v = self.step(ctx.output(0, -1), ctx.input(0, 0));
        ctx.set(0, v);
    }
    fn oncestart(&self, ctx: &mut SpanCtx<'_>, start: usize, end: usize) {
        let src = ctx.input(0);
        let dst = ctx.output(0);
        for i in start..end {
            dst[i] = mean(&src[i + 1 - self.period..=i]);
        }
    }
    fn once(&self, ctx: &mut SpanCtx<'_>, start: usize, end: usize) {
        let src = ctx.input(0);
        let dst = ctx.output(0);
        let mut prev = dst[start - 1];
        for i in start..end {
            prev = self.step(prev, src[i]);
            dst[i] = prev;
        }
    }
}

/// Exponential smoothing whose factor is itself a line. Inputs: data, alpha.
///
/// Seeded like [`ExponentialSmoothing`]; the seed bar also waits for the
/// alpha line to be defined.
#[derive(Debug, Clone, Copy)]
pub struct ExponentialSmoothingDynamic {
    pub period: usize,
}

impl ExponentialSmoothingDynamic {
    fn step(prev: f64, x: f64, alpha: f64) -> f64 {
        prev * (1.0 - alpha) + x * alpha
    }
}

impl Operator for ExponentialSmoothingDynamic {
    fn name(&self) -> &'static str {
        "ExponentialSmoothingDynamic"
    }
    fn arity(&self) -> Arity {
        Arity::Exactly(2)
    }
    fn minperiod(&self, inputs: &[usize]) -> Option<usize> {
        let data = minperiod::combine(&inputs[..1], self.period.saturating_sub(1))?;
        let alpha = minperiod::combine(&inputs[1..], 0)?;
        Some(data.max(alpha))
    }
    fn nextstart(&self, ctx: &mut BarCtx<'_>) {
        let i = ctx.index();
        let seed = mean(ctx.inputs().series(0).get_range(i + 1 - self.period, i + 1));
        ctx.set(0, seed);
    }
    fn next(&self, ctx: &mut BarCtx<'_>) {
        let v = Self::step(ctx.output(0, -1), ctx.input(0, 0), ctx.input(1, 0));
        ctx.set(0, v);
    }
    fn oncestart(&self, ctx: &mut SpanCtx<'_>, start: usize, end: usize) {
        let src = ctx.input(0);
        let dst = ctx.output(0);
        for i in start..end {
            dst[i] = mean(&src[i + 1 - self.period..=i]);
        }
    }
    fn once(&self, ctx: &mut SpanCtx<'_>, start: usize, end: usize) {
        let src = ctx.input(0);
        let alpha = ctx.input(1);
        let dst = ctx.output(0);
        let mut prev = dst[start - 1];
        for i in start..end {
            prev = Self::step(prev, src[i], alpha[i]);
            dst[i] = prev;
        }
    }
}

/// Running total starting from `seed`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Accum {
    pub seed: f64,
}

impl Operator for Accum {
    fn name(&self) -> &'static str {
        "Accum"
    }
    fn arity(&self) -> Arity {
        Arity::Exactly(1)
    }
    fn nextstart(&self, ctx: &mut BarCtx<'_>) {
        let v = self.seed + ctx.input(0, 0);
        ctx.set(0, v);
    }
    fn next(&self, ctx: &mut BarCtx<'_>) {
        let v = ctx.output(0, -1) + ctx.input(0, 0);
        ctx.set(0, v);
    }
    fn oncestart(&self, ctx: &mut SpanCtx<'_>, start: usize, end: usize) {
        let src = ctx.input(0);
        let dst = ctx.output(0);
        let mut prev = self.seed;
        for i in start..end {
            prev += src[i];
            dst[i] = prev;
        }
    }
    fn once(&self, ctx: &mut SpanCtx<'_>, start: usize, end: usize) {
        let src = ctx.input(0);
        let dst = ctx.output(0);
        let mut prev = dst[start - 1];
        for i in start..end {
            prev += src[i];
            dst[i] = prev;
        }
    }
}
