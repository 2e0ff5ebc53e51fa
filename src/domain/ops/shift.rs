//! Time shifts.

use crate::domain::minperiod;
use crate::domain::node::{Arity, BarCtx, Operator, SpanCtx};

/// Value of the input `k` bars ago.
#[derive(Debug, Clone, Copy)]
pub struct Lag(pub usize);

impl Operator for Lag {
    fn name(&self) -> &'static str {
        "Lag"
    }
    fn arity(&self) -> Arity {
        Arity::Exactly(1)
    }
    fn extend(&self) -> usize {
        self.0
    }
    fn next(&self, ctx: &mut BarCtx<'_>) {
        let v = ctx.input(0, -(self.0 as isize));
        ctx.set(0, v);
    }
    fn once(&self, ctx: &mut SpanCtx<'_>, start: usize, end: usize) {
        let src = ctx.input(0);
        let dst = ctx.output(0);
        for i in start..end {
            dst[i] = src[i - self.0];
        }
    }
}

/// Like [`Lag`], but bars whose lagged sample predates the input's first
/// defined bar read `fill` instead. Adds no minperiod.
#[derive(Debug, Clone, Copy)]
pub struct LagOr {
    pub k: usize,
    pub fill: f64,
}

impl LagOr {
    fn available(&self, index: usize, input_minperiod: usize) -> bool {
        index >= self.k + minperiod::first_index(input_minperiod)
    }
}

impl Operator for LagOr {
    fn name(&self) -> &'static str {
        "LagOr"
    }
    fn arity(&self) -> Arity {
        Arity::Exactly(1)
    }
    fn next(&self, ctx: &mut BarCtx<'_>) {
        let v = if self.available(ctx.index(), ctx.inputs().minperiod(0)) {
            ctx.input(0, -(self.k as isize))
        } else {
            self.fill
        };
        ctx.set(0, v);
    }
    fn once(&self, ctx: &mut SpanCtx<'_>, start: usize, end: usize) {
        let mp = ctx.inputs().minperiod(0);
        let src = ctx.input(0);
        let dst = ctx.output(0);
        for i in start..end {
            dst[i] = if self.available(i, mp) {
                src[i - self.k]
            } else {
                self.fill
            };
        }
    }
}

/// Value of the input `k` bars ahead, written back onto the bar it belongs
/// to once that future bar arrives. The most recent `k` bars of the output
/// stay undefined.
#[derive(Debug, Clone, Copy)]
pub struct Lead(pub usize);

impl Operator for Lead {
    fn name(&self) -> &'static str {
        "Lead"
    }
    fn arity(&self) -> Arity {
        Arity::Exactly(1)
    }
    fn extend(&self) -> usize {
        self.0
    }
    fn retroactive(&self) -> bool {
        true
    }
    fn next(&self, ctx: &mut BarCtx<'_>) {
        let v = ctx.input(0, 0);
        ctx.set_at(0, -(self.0 as isize), v);
    }
    fn once(&self, ctx: &mut SpanCtx<'_>, start: usize, end: usize) {
        let src = ctx.input(0);
        let dst = ctx.output(0);
        for i in start..end {
            dst[i - self.0] = src[i];
        }
    }
}
