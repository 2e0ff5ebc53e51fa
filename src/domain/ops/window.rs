//! Operators over the trailing `period` samples of one input.
//!
//! Every bar is recomputed from its own window in both evaluation modes, so
//! there is no running state that could drift between them.

use crate::domain::node::{Arity, BarCtx, Operator, SpanCtx};
use crate::domain::ops::numeric::{flag, fsum, truthy};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowKind {
    Average,
    Sum,
    Highest,
    Lowest,
    Any,
    All,
    /// Bars back to the most recent occurrence of the window maximum.
    FindFirstIndexHighest,
    FindFirstIndexLowest,
    /// Bars back to the oldest occurrence of the window maximum.
    FindLastIndexHighest,
    FindLastIndexLowest,
    /// Share of window samples strictly below the current one.
    PercentRank,
}

impl WindowKind {
    pub fn name(self) -> &'static str {
        match self {
            WindowKind::Average => "Average",
            WindowKind::Sum => "SumN",
            WindowKind::Highest => "Highest",
            WindowKind::Lowest => "Lowest",
            WindowKind::Any => "AnyN",
            WindowKind::All => "AllN",
            WindowKind::FindFirstIndexHighest => "FindFirstIndexHighest",
            WindowKind::FindFirstIndexLowest => "FindFirstIndexLowest",
            WindowKind::FindLastIndexHighest => "FindLastIndexHighest",
            WindowKind::FindLastIndexLowest => "FindLastIndexLowest",
            WindowKind::PercentRank => "PercentRank",
        }
    }

    /// Reduce one window, oldest sample first.
    pub fn reduce(self, w: &[f64]) -> f64 {
        let n = w.len();
        if n == 0 {
            return f64::NAN;
        }
        match self {
            WindowKind::Average => fsum(w) / n as f64,
            WindowKind::Sum => fsum(w),
            WindowKind::Highest => extreme(w, true),
            WindowKind::Lowest => extreme(w, false),
            WindowKind::Any => flag(w.iter().any(|&x| truthy(x))),
            WindowKind::All => flag(w.iter().all(|&x| truthy(x))),
            WindowKind::FindFirstIndexHighest => first_index(w, true),
            WindowKind::FindFirstIndexLowest => first_index(w, false),
            WindowKind::FindLastIndexHighest => last_index(w, true),
            WindowKind::FindLastIndexLowest => last_index(w, false),
            WindowKind::PercentRank => {
                let last = w[n - 1];
                let below = w.iter().filter(|&&x| x < last).count();
                below as f64 / n as f64
            }
        }
    }
}

fn extreme(w: &[f64], highest: bool) -> f64 {
    let mut best = w[0];
    for &x in &w[1..] {
        if x.is_nan() {
            return f64::NAN;
        }
        if (highest && x > best) || (!highest && x < best) {
            best = x;
        }
    }
    best
}

fn first_index(w: &[f64], highest: bool) -> f64 {
    let m = extreme(w, highest);
    w.iter()
        .rev()
        .position(|&x| x == m)
        .map_or(f64::NAN, |i| i as f64)
}

fn last_index(w: &[f64], highest: bool) -> f64 {
    let m = extreme(w, highest);
    w.iter()
        .position(|&x| x == m)
        .map_or(f64::NAN, |i| (w.len() - i - 1) as f64)
}

/// A window reduction over `period` bars.
#[derive(Debug, Clone, Copy)]
pub struct Window {
    pub kind: WindowKind,
    pub period: usize,
}

impl Window {
    pub fn new(kind: WindowKind, period: usize) -> Self {
        Self { kind, period }
    }
}

impl Operator for Window {
    fn name(&self) -> &'static str {
        self.kind.name()
    }
    fn arity(&self) -> Arity {
        Arity::Exactly(1)
    }
    fn extend(&self) -> usize {
        self.period.saturating_sub(1)
    }
    fn next(&self, ctx: &mut BarCtx<'_>) {
        let i = ctx.index();
        let src = ctx.inputs().series(0).get_range(i + 1 - self.period, i + 1);
        let v = self.kind.reduce(src);
        ctx.set(0, v);
    }
    fn once(&self, ctx: &mut SpanCtx<'_>, start: usize, end: usize) {
        let src = ctx.input(0);
        let dst = ctx.output(0);
        for i in start..end {
            dst[i] = self.kind.reduce(&src[i + 1 - self.period..=i]);
        }
    }
}

/// `coef * sum(window[j] * weights[j])`, oldest sample paired with the first
/// weight. The period is the number of weights.
#[derive(Debug, Clone)]
pub struct WeightedAverage {
    pub coef: f64,
    pub weights: Vec<f64>,
}

impl WeightedAverage {
    fn reduce(&self, w: &[f64]) -> f64 {
        let products: Vec<f64> = w.iter().zip(&self.weights).map(|(x, k)| x * k).collect();
        self.coef * fsum(&products)
    }
}

impl Operator for WeightedAverage {
    fn name(&self) -> &'static str {
        "WeightedAverage"
    }
    fn arity(&self) -> Arity {
        Arity::Exactly(1)
    }
    fn extend(&self) -> usize {
        self.weights.len().saturating_sub(1)
    }
    fn next(&self, ctx: &mut BarCtx<'_>) {
        let i = ctx.index();
        let p = self.weights.len();
        let src = ctx.inputs().series(0).get_range(i + 1 - p, i + 1);
        let v = self.reduce(src);
        ctx.set(0, v);
    }
    fn once(&self, ctx: &mut SpanCtx<'_>, start: usize, end: usize) {
        let p = self.weights.len();
        let src = ctx.input(0);
        let dst = ctx.output(0);
        for i in start..end {
            dst[i] = self.reduce(&src[i + 1 - p..=i]);
        }
    }
}
