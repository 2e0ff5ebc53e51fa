//! Zero-lookback element-wise operators.
//!
//! Each output sample depends only on the input samples of the same bar, so
//! `next` and `once` share one scalar kernel per operator.

use crate::domain::node::{Arity, BarCtx, Operator, SpanCtx};
use crate::domain::ops::numeric::{DivPolicy, flag, truthy};

fn apply_span(ctx: &mut SpanCtx<'_>, start: usize, end: usize, f: impl Fn(&[f64]) -> f64) {
    let inputs = ctx.inputs();
    let n = inputs.len();
    let srcs: Vec<&[f64]> = (0..n).map(|i| inputs.series(i).as_slice()).collect();
    let dst = ctx.output(0);
    let mut row = vec![0.0; n];
    for i in start..end {
        for (slot, src) in row.iter_mut().zip(&srcs) {
            *slot = src.get(i).copied().unwrap_or(f64::NAN);
        }
        dst[i] = f(&row);
    }
}

fn apply_bar(ctx: &mut BarCtx<'_>, f: impl Fn(&[f64]) -> f64) {
    let n = ctx.inputs().len();
    let row: Vec<f64> = (0..n).map(|i| ctx.input(i, 0)).collect();
    ctx.set(0, f(&row));
}

/// Fixed value on every bar.
#[derive(Debug, Clone, Copy)]
pub struct Constant(pub f64);

impl Operator for Constant {
    fn name(&self) -> &'static str {
        "Constant"
    }
    fn arity(&self) -> Arity {
        Arity::Exactly(0)
    }
    fn next(&self, ctx: &mut BarCtx<'_>) {
        ctx.set(0, self.0);
    }
    fn once(&self, ctx: &mut SpanCtx<'_>, start: usize, end: usize) {
        ctx.output(0)[start..end].fill(self.0);
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div(DivPolicy),
    Pow,
    Max,
    Min,
    Gt,
    Lt,
    Ge,
    Le,
    Eq,
    Ne,
    And,
    Or,
}

impl BinOp {
    pub fn apply(self, a: f64, b: f64) -> f64 {
        let logical = matches!(
            self,
            BinOp::Gt | BinOp::Lt | BinOp::Ge | BinOp::Le | BinOp::Eq | BinOp::Ne | BinOp::And | BinOp::Or
        );
        if logical && (a.is_nan() || b.is_nan()) {
            return f64::NAN;
        }
        match self {
            BinOp::Add => a + b,
            BinOp::Sub => a - b,
            BinOp::Mul => a * b,
            BinOp::Div(policy) => policy.divide(a, b),
            BinOp::Pow => a.powf(b),
            BinOp::Max => a.max(b),
            BinOp::Min => a.min(b),
            BinOp::Gt => flag(a > b),
            BinOp::Lt => flag(a < b),
            BinOp::Ge => flag(a >= b),
            BinOp::Le => flag(a <= b),
            BinOp::Eq => flag(a == b),
            BinOp::Ne => flag(a != b),
            BinOp::And => flag(truthy(a) && truthy(b)),
            BinOp::Or => flag(truthy(a) || truthy(b)),
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div(_) => "/",
            BinOp::Pow => "**",
            BinOp::Max => "max",
            BinOp::Min => "min",
            BinOp::Gt => ">",
            BinOp::Lt => "<",
            BinOp::Ge => ">=",
            BinOp::Le => "<=",
            BinOp::Eq => "==",
            BinOp::Ne => "!=",
            BinOp::And => "AND",
            BinOp::Or => "OR",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Binary(pub BinOp);

impl Operator for Binary {
    fn name(&self) -> &'static str {
        match self.0 {
            BinOp::Add => "Add",
            BinOp::Sub => "Sub",
            BinOp::Mul => "Mul",
            BinOp::Div(_) => "Div",
            BinOp::Pow => "Pow",
            BinOp::Max => "Max",
            BinOp::Min => "Min",
            BinOp::Gt | BinOp::Lt | BinOp::Ge | BinOp::Le | BinOp::Eq | BinOp::Ne => "Compare",
            BinOp::And => "And",
            BinOp::Or => "Or",
        }
    }
    fn arity(&self) -> Arity {
        Arity::Exactly(2)
    }
    fn next(&self, ctx: &mut BarCtx<'_>) {
        let v = self.0.apply(ctx.input(0, 0), ctx.input(1, 0));
        ctx.set(0, v);
    }
    fn once(&self, ctx: &mut SpanCtx<'_>, start: usize, end: usize) {
        let a = ctx.input(0);
        let b = ctx.input(1);
        let dst = ctx.output(0);
        for i in start..end {
            dst[i] = self.0.apply(a[i], b[i]);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnOp {
    Neg,
    Abs,
    Sqrt,
    Not,
}

impl UnOp {
    pub fn apply(self, x: f64) -> f64 {
        match self {
            UnOp::Neg => -x,
            UnOp::Abs => x.abs(),
            UnOp::Sqrt => x.sqrt(),
            UnOp::Not if x.is_nan() => f64::NAN,
            UnOp::Not => flag(!truthy(x)),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Unary(pub UnOp);

impl Operator for Unary {
    fn name(&self) -> &'static str {
        match self.0 {
            UnOp::Neg => "Neg",
            UnOp::Abs => "Abs",
            UnOp::Sqrt => "Sqrt",
            UnOp::Not => "Not",
        }
    }
    fn arity(&self) -> Arity {
        Arity::Exactly(1)
    }
    fn next(&self, ctx: &mut BarCtx<'_>) {
        let v = self.0.apply(ctx.input(0, 0));
        ctx.set(0, v);
    }
    fn once(&self, ctx: &mut SpanCtx<'_>, start: usize, end: usize) {
        let src = ctx.input(0);
        let dst = ctx.output(0);
        for i in start..end {
            dst[i] = self.0.apply(src[i]);
        }
    }
}

/// Largest (or smallest) of any number of inputs on the same bar.
#[derive(Debug, Clone, Copy)]
pub struct Extremum {
    pub highest: bool,
}

impl Extremum {
    fn reduce(&self, row: &[f64]) -> f64 {
        let init = if self.highest { f64::NEG_INFINITY } else { f64::INFINITY };
        row.iter().fold(init, |acc, &x| {
            if x.is_nan() || acc.is_nan() {
                f64::NAN
            } else if self.highest {
                acc.max(x)
            } else {
                acc.min(x)
            }
        })
    }
}

impl Operator for Extremum {
    fn name(&self) -> &'static str {
        if self.highest { "Max" } else { "Min" }
    }
    fn arity(&self) -> Arity {
        Arity::AtLeast(1)
    }
    fn next(&self, ctx: &mut BarCtx<'_>) {
        apply_bar(ctx, |row| self.reduce(row));
    }
    fn once(&self, ctx: &mut SpanCtx<'_>, start: usize, end: usize) {
        apply_span(ctx, start, end, |row| self.reduce(row));
    }
}

/// `cond ? a : b`, inputs in that order.
#[derive(Debug, Clone, Copy)]
pub struct Select;

impl Select {
    fn pick(cond: f64, a: f64, b: f64) -> f64 {
        if cond.is_nan() {
            f64::NAN
        } else if truthy(cond) {
            a
        } else {
            b
        }
    }
}

impl Operator for Select {
    fn name(&self) -> &'static str {
        "If"
    }
    fn arity(&self) -> Arity {
        Arity::Exactly(3)
    }
    fn next(&self, ctx: &mut BarCtx<'_>) {
        let v = Self::pick(ctx.input(0, 0), ctx.input(1, 0), ctx.input(2, 0));
        ctx.set(0, v);
    }
    fn once(&self, ctx: &mut SpanCtx<'_>, start: usize, end: usize) {
        let (c, a, b) = (ctx.input(0), ctx.input(1), ctx.input(2));
        let dst = ctx.output(0);
        for i in start..end {
            dst[i] = Self::pick(c[i], a[i], b[i]);
        }
    }
}

/// Three-way comparison of `a` and `b` picking one of three value inputs.
/// Inputs: a, b, if-less, if-equal, if-greater.
#[derive(Debug, Clone, Copy)]
pub struct CmpEx;

impl CmpEx {
    fn pick(row: &[f64]) -> f64 {
        let (a, b) = (row[0], row[1]);
        if a.is_nan() || b.is_nan() {
            f64::NAN
        } else if a < b {
            row[2]
        } else if a == b {
            row[3]
        } else {
            row[4]
        }
    }
}

impl Operator for CmpEx {
    fn name(&self) -> &'static str {
        "CmpEx"
    }
    fn arity(&self) -> Arity {
        Arity::Exactly(5)
    }
    fn next(&self, ctx: &mut BarCtx<'_>) {
        apply_bar(ctx, Self::pick);
    }
    fn once(&self, ctx: &mut SpanCtx<'_>, start: usize, end: usize) {
        apply_span(ctx, start, end, Self::pick);
    }
}
