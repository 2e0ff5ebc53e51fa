//! Indicator expression AST.
//!
//! Expressions are the textual form of a wired line: arithmetic over feed
//! fields, catalog indicators and other named definitions.
//!
//! - `Expr`: numbers, identifiers, calls, line selection, shifts, operators
//! - `CallArg`: positional data inputs and named parameter overrides
//! - `ParamLit`: literal parameter values as written

use crate::domain::ops::arith::BinOp;
use crate::domain::ops::numeric::DivPolicy;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Gt,
    Lt,
    Ge,
    Le,
    Eq,
    Ne,
    And,
    Or,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        self.op().symbol()
    }

    /// The operator this maps onto in the graph. Division is raw.
    pub fn op(self) -> BinOp {
        match self {
            BinaryOp::Add => BinOp::Add,
            BinaryOp::Sub => BinOp::Sub,
            BinaryOp::Mul => BinOp::Mul,
            BinaryOp::Div => BinOp::Div(DivPolicy::Raw),
            BinaryOp::Gt => BinOp::Gt,
            BinaryOp::Lt => BinOp::Lt,
            BinaryOp::Ge => BinOp::Ge,
            BinaryOp::Le => BinOp::Le,
            BinaryOp::Eq => BinOp::Eq,
            BinaryOp::Ne => BinOp::Ne,
            BinaryOp::And => BinOp::And,
            BinaryOp::Or => BinOp::Or,
        }
    }
}

/// A parameter value exactly as written in a call.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamLit {
    Int(i64),
    Float(f64),
    Bool(bool),
    /// A bare word, such as a moving-average name.
    Word(String),
    List(Vec<f64>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum CallArg {
    Input(Expr),
    Param { name: String, value: ParamLit },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    /// Feed field, named definition or parameterless catalog indicator.
    Ident(String),
    Call {
        name: String,
        args: Vec<CallArg>,
    },
    /// `base.line`
    Select {
        base: Box<Expr>,
        line: String,
    },
    /// `base[offset]`: negative lags, positive leads.
    Shift {
        base: Box<Expr>,
        offset: i64,
    },
    Neg(Box<Expr>),
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
}

impl Expr {
    /// Every identifier the expression reads, call names excluded.
    pub fn references(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_refs(&mut out);
        out
    }

    fn collect_refs<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Expr::Number(_) => {}
            Expr::Ident(name) => out.push(name),
            Expr::Call { args, .. } => {
                for arg in args {
                    if let CallArg::Input(e) = arg {
                        e.collect_refs(out);
                    }
                }
            }
            Expr::Select { base, .. } | Expr::Shift { base, .. } | Expr::Neg(base) => base.collect_refs(out),
            Expr::Binary { lhs, rhs, .. } => {
                lhs.collect_refs(out);
                rhs.collect_refs(out);
            }
        }
    }
}

impl fmt::Display for ParamLit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamLit::Int(v) => write!(f, "{v}"),
            ParamLit::Float(v) => write!(f, "{v:?}"),
            ParamLit::Bool(v) => write!(f, "{v}"),
            ParamLit::Word(w) => f.write_str(w),
            ParamLit::List(vs) => {
                let parts: Vec<String> = vs.iter().map(|v| format!("{v:?}")).collect();
                write!(f, "[{}]", parts.join(", "))
            }
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Number(v) => write!(f, "{v}"),
            Expr::Ident(name) => f.write_str(name),
            Expr::Call { name, args } => {
                write!(f, "{name}(")?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    match arg {
                        CallArg::Input(e) => write!(f, "{e}")?,
                        CallArg::Param { name, value } => write!(f, "{name}={value}")?,
                    }
                }
                f.write_str(")")
            }
            Expr::Select { base, line } => write!(f, "{base}.{line}"),
            Expr::Shift { base, offset } => write!(f, "{base}[{offset}]"),
            Expr::Neg(e) => write!(f, "-{e}"),
            Expr::Binary { op, lhs, rhs } => write!(f, "({lhs} {} {rhs})", op.symbol()),
        }
    }
}
