//! Primitive operators and the builder helpers that wire them.
//!
//! Catalog indicators are compositions of these. Scalars mixed into an
//! expression become [`arith::Constant`] lines so every operator reads lines
//! only.

pub mod arith;
pub mod numeric;
pub mod shift;
pub mod smoothing;
pub mod stateful;
pub mod window;

use crate::domain::error::LineflowError;
use crate::domain::graph::GraphBuilder;
use crate::domain::line::LineId;
use arith::{BinOp, Binary, CmpEx, Constant, Extremum, Select, UnOp, Unary};
use numeric::DivPolicy;
use shift::{Lag, LagOr, Lead};
use window::{Window, WindowKind};

/// An operand: an existing line or a scalar.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Arg {
    Line(LineId),
    Const(f64),
}

impl From<LineId> for Arg {
    fn from(id: LineId) -> Self {
        Arg::Line(id)
    }
}

impl From<f64> for Arg {
    fn from(v: f64) -> Self {
        Arg::Const(v)
    }
}

type Wired = Result<LineId, LineflowError>;

impl GraphBuilder {
    pub fn constant(&mut self, v: f64) -> Wired {
        self.add(Constant(v), &[])
    }

    /// Line for an operand, materializing scalars.
    pub fn arg(&mut self, a: impl Into<Arg>) -> Wired {
        match a.into() {
            Arg::Line(id) => Ok(id),
            Arg::Const(v) => self.constant(v),
        }
    }

    pub fn binary(&mut self, op: BinOp, a: impl Into<Arg>, b: impl Into<Arg>) -> Wired {
        let (a, b) = (a.into(), b.into());
        if let (Arg::Const(x), Arg::Const(y)) = (a, b) {
            return self.constant(op.apply(x, y));
        }
        let a = self.arg(a)?;
        let b = self.arg(b)?;
        self.add(Binary(op), &[a, b])
    }

    pub fn unary(&mut self, op: UnOp, a: LineId) -> Wired {
        self.add(Unary(op), &[a])
    }

    pub fn sum(&mut self, a: impl Into<Arg>, b: impl Into<Arg>) -> Wired {
        self.binary(BinOp::Add, a, b)
    }

    pub fn sub(&mut self, a: impl Into<Arg>, b: impl Into<Arg>) -> Wired {
        self.binary(BinOp::Sub, a, b)
    }

    pub fn mul(&mut self, a: impl Into<Arg>, b: impl Into<Arg>) -> Wired {
        self.binary(BinOp::Mul, a, b)
    }

    /// Raw IEEE division.
    pub fn div(&mut self, a: impl Into<Arg>, b: impl Into<Arg>) -> Wired {
        self.binary(BinOp::Div(DivPolicy::Raw), a, b)
    }

    pub fn div_with(&mut self, policy: DivPolicy, a: impl Into<Arg>, b: impl Into<Arg>) -> Wired {
        self.binary(BinOp::Div(policy), a, b)
    }

    pub fn pow(&mut self, a: impl Into<Arg>, b: impl Into<Arg>) -> Wired {
        self.binary(BinOp::Pow, a, b)
    }

    pub fn abs(&mut self, a: LineId) -> Wired {
        self.unary(UnOp::Abs, a)
    }

    pub fn neg(&mut self, a: LineId) -> Wired {
        self.unary(UnOp::Neg, a)
    }

    pub fn sqrt(&mut self, a: LineId) -> Wired {
        self.unary(UnOp::Sqrt, a)
    }

    pub fn gt(&mut self, a: impl Into<Arg>, b: impl Into<Arg>) -> Wired {
        self.binary(BinOp::Gt, a, b)
    }

    pub fn lt(&mut self, a: impl Into<Arg>, b: impl Into<Arg>) -> Wired {
        self.binary(BinOp::Lt, a, b)
    }

    pub fn and(&mut self, a: LineId, b: LineId) -> Wired {
        self.binary(BinOp::And, a, b)
    }

    pub fn or(&mut self, a: LineId, b: LineId) -> Wired {
        self.binary(BinOp::Or, a, b)
    }

    /// Largest of the operands on each bar.
    pub fn max_of(&mut self, args: &[Arg]) -> Wired {
        let ids = args
            .iter()
            .map(|&a| self.arg(a))
            .collect::<Result<Vec<_>, _>>()?;
        self.add(Extremum { highest: true }, &ids)
    }

    pub fn min_of(&mut self, args: &[Arg]) -> Wired {
        let ids = args
            .iter()
            .map(|&a| self.arg(a))
            .collect::<Result<Vec<_>, _>>()?;
        self.add(Extremum { highest: false }, &ids)
    }

    /// `cond ? a : b` per bar.
    pub fn select(&mut self, cond: LineId, a: impl Into<Arg>, b: impl Into<Arg>) -> Wired {
        let a = self.arg(a)?;
        let b = self.arg(b)?;
        self.add(Select, &[cond, a, b])
    }

    /// Three-way comparison of `a` and `b` picking `lt`, `eq` or `gt`.
    pub fn cmp_ex(&mut self, a: LineId, b: LineId, picks: [Arg; 3]) -> Wired {
        let [lt, eq, gt] = picks;
        let lt = self.arg(lt)?;
        let eq = self.arg(eq)?;
        let gt = self.arg(gt)?;
        self.add(CmpEx, &[a, b, lt, eq, gt])
    }

    /// `a` delayed by `k` bars; `k = 0` is `a` itself.
    pub fn lag(&mut self, a: LineId, k: usize) -> Wired {
        if k == 0 {
            return Ok(a);
        }
        self.add(Lag(k), &[a])
    }

    pub fn lag_or(&mut self, a: LineId, k: usize, fill: f64) -> Wired {
        self.add(LagOr { k, fill }, &[a])
    }

    /// `a` advanced by `k` bars. The result is retroactive and cannot feed
    /// further nodes.
    pub fn lead(&mut self, a: LineId, k: usize) -> Wired {
        if k == 0 {
            return Ok(a);
        }
        self.add(Lead(k), &[a])
    }

    /// Shift by a signed offset: negative lags, positive leads.
    pub fn shift(&mut self, a: LineId, offset: i64) -> Wired {
        let k = offset.unsigned_abs() as usize;
        if offset < 0 {
            self.lag(a, k)
        } else {
            self.lead(a, k)
        }
    }

    pub fn window(&mut self, kind: WindowKind, a: LineId, period: usize) -> Wired {
        self.add(Window::new(kind, period), &[a])
    }

    pub fn average(&mut self, a: LineId, period: usize) -> Wired {
        self.window(WindowKind::Average, a, period)
    }

    pub fn sum_n(&mut self, a: LineId, period: usize) -> Wired {
        self.window(WindowKind::Sum, a, period)
    }

    pub fn highest(&mut self, a: LineId, period: usize) -> Wired {
        self.window(WindowKind::Highest, a, period)
    }

    pub fn lowest(&mut self, a: LineId, period: usize) -> Wired {
        self.window(WindowKind::Lowest, a, period)
    }
}
