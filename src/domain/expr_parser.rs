//! Indicator expression parser.
//!
//! Recursive descent over the expression grammar. Converts text to an
//! [`Expr`] with error messages carrying the byte offset and the
//! expected/found tokens.

use crate::domain::error::ParseError;
use crate::domain::expr::{BinaryOp, CallArg, Expr, ParamLit};

const KEYWORDS: [&str; 2] = ["AND", "OR"];

struct Parser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn remaining(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.remaining().chars().next()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        Some(ch)
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.peek() {
            if ch.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        ParseError {
            message: message.into(),
            position: self.pos,
        }
    }

    fn expect_char(&mut self, expected: char) -> Result<(), ParseError> {
        self.skip_whitespace();
        match self.peek() {
            Some(ch) if ch == expected => {
                self.advance();
                Ok(())
            }
            Some(_) => Err(self.error(format!("expected '{}', found '{}'", expected, self.peek_word()))),
            None => Err(self.error(format!("expected '{}', found end of input", expected))),
        }
    }

    fn peek_keyword(&self, keyword: &str) -> bool {
        let remaining = self.remaining();
        remaining.starts_with(keyword)
            && !remaining[keyword.len()..]
                .chars()
                .next()
                .is_some_and(|c| c.is_alphanumeric() || c == '_')
    }

    fn consume_keyword(&mut self, keyword: &str) -> bool {
        self.skip_whitespace();
        if self.peek_keyword(keyword) {
            self.pos += keyword.len();
            true
        } else {
            false
        }
    }

    /// Consume `symbol` unless it is the prefix of a longer operator.
    fn consume_symbol(&mut self, symbol: &str) -> bool {
        self.skip_whitespace();
        let remaining = self.remaining();
        if !remaining.starts_with(symbol) {
            return false;
        }
        if symbol.len() == 1 && remaining[1..].starts_with('=') && matches!(symbol, "<" | ">" | "=" | "!") {
            return false;
        }
        self.pos += symbol.len();
        true
    }

    fn peek_word(&self) -> String {
        let mut word = String::new();
        for ch in self.remaining().chars() {
            if ch.is_alphanumeric() || ch == '_' {
                word.push(ch);
            } else {
                break;
            }
        }
        if word.is_empty() {
            self.peek()
                .map(|c| c.to_string())
                .unwrap_or_else(|| "end of input".to_string())
        } else {
            word
        }
    }

    fn parse_ident(&mut self) -> Result<String, ParseError> {
        self.skip_whitespace();
        match self.peek() {
            Some(ch) if ch.is_alphabetic() || ch == '_' => {
                let word = self.peek_word();
                self.pos += word.len();
                Ok(word)
            }
            _ => Err(self.error(format!("expected identifier, found '{}'", self.peek_word()))),
        }
    }

    /// Unsigned or signed decimal. Integers stay integers so periods are
    /// never read from a float.
    fn parse_literal(&mut self) -> Result<ParamLit, ParseError> {
        self.skip_whitespace();
        let start = self.pos;
        let mut has_dot = false;
        let mut digits = 0;

        if self.peek() == Some('-') {
            self.advance();
        }

        while let Some(ch) = self.peek() {
            if ch.is_ascii_digit() {
                digits += 1;
                self.advance();
            } else if ch == '.' && !has_dot {
                has_dot = true;
                self.advance();
            } else {
                break;
            }
        }

        if digits == 0 {
            self.pos = start;
            return Err(self.error(format!("expected number, found '{}'", self.peek_word())));
        }

        let num_str = &self.input[start..self.pos];
        let invalid = || ParseError {
            message: format!("invalid number: {}", num_str),
            position: start,
        };
        if has_dot {
            num_str.parse::<f64>().map(ParamLit::Float).map_err(|_| invalid())
        } else {
            num_str.parse::<i64>().map(ParamLit::Int).map_err(|_| invalid())
        }
    }

    fn parse_number(&mut self) -> Result<f64, ParseError> {
        match self.parse_literal()? {
            ParamLit::Int(v) => Ok(v as f64),
            ParamLit::Float(v) => Ok(v),
            _ => Err(self.error("expected number")),
        }
    }

    fn parse_offset(&mut self) -> Result<i64, ParseError> {
        self.skip_whitespace();
        let start = self.pos;
        match self.parse_literal()? {
            ParamLit::Int(v) => Ok(v),
            _ => Err(ParseError {
                message: "expected integer offset".to_string(),
                position: start,
            }),
        }
    }

    fn parse_or(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_and()?;
        while self.consume_keyword("OR") {
            let rhs = self.parse_and()?;
            lhs = binary(BinaryOp::Or, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_comparison()?;
        while self.consume_keyword("AND") {
            let rhs = self.parse_comparison()?;
            lhs = binary(BinaryOp::And, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_comparison(&mut self) -> Result<Expr, ParseError> {
        let lhs = self.parse_additive()?;
        let ops = [
            (">=", BinaryOp::Ge),
            ("<=", BinaryOp::Le),
            ("==", BinaryOp::Eq),
            ("!=", BinaryOp::Ne),
            (">", BinaryOp::Gt),
            ("<", BinaryOp::Lt),
        ];
        for (symbol, op) in ops {
            if self.consume_symbol(symbol) {
                let rhs = self.parse_additive()?;
                return Ok(binary(op, lhs, rhs));
            }
        }
        Ok(lhs)
    }

    fn parse_additive(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_term()?;
        loop {
            let op = if self.consume_symbol("+") {
                BinaryOp::Add
            } else if self.consume_symbol("-") {
                BinaryOp::Sub
            } else {
                return Ok(lhs);
            };
            let rhs = self.parse_term()?;
            lhs = binary(op, lhs, rhs);
        }
    }

    fn parse_term(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = if self.consume_symbol("*") {
                BinaryOp::Mul
            } else if self.consume_symbol("/") {
                BinaryOp::Div
            } else {
                return Ok(lhs);
            };
            let rhs = self.parse_unary()?;
            lhs = binary(op, lhs, rhs);
        }
    }

    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        if self.consume_symbol("-") {
            return Ok(match self.parse_unary()? {
                Expr::Number(v) => Expr::Number(-v),
                other => Expr::Neg(Box::new(other)),
            });
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.parse_primary()?;
        loop {
            self.skip_whitespace();
            match self.peek() {
                Some('.') => {
                    self.advance();
                    let line = self.parse_ident()?;
                    expr = Expr::Select {
                        base: Box::new(expr),
                        line,
                    };
                }
                Some('[') => {
                    self.advance();
                    let offset = self.parse_offset()?;
                    self.expect_char(']')?;
                    expr = Expr::Shift {
                        base: Box::new(expr),
                        offset,
                    };
                }
                _ => return Ok(expr),
            }
        }
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        self.skip_whitespace();
        match self.peek() {
            Some(ch) if ch.is_ascii_digit() || ch == '.' => Ok(Expr::Number(self.parse_number()?)),
            Some('(') => {
                self.advance();
                let inner = self.parse_or()?;
                self.expect_char(')')?;
                Ok(inner)
            }
            Some(ch) if ch.is_alphabetic() || ch == '_' => {
                if KEYWORDS.iter().any(|k| self.peek_keyword(k)) {
                    return Err(self.error(format!("expected expression, found '{}'", self.peek_word())));
                }
                let name = self.parse_ident()?;
                self.skip_whitespace();
                if self.peek() == Some('(') {
                    self.advance();
                    let args = self.parse_args()?;
                    Ok(Expr::Call { name, args })
                } else {
                    Ok(Expr::Ident(name))
                }
            }
            _ => Err(self.error(format!("expected expression, found '{}'", self.peek_word()))),
        }
    }

    /// Arguments after the opening parenthesis, through the closing one.
    fn parse_args(&mut self) -> Result<Vec<CallArg>, ParseError> {
        let mut args = Vec::new();
        self.skip_whitespace();
        if self.peek() == Some(')') {
            self.advance();
            return Ok(args);
        }
        loop {
            args.push(self.parse_arg()?);
            self.skip_whitespace();
            match self.peek() {
                Some(')') => {
                    self.advance();
                    return Ok(args);
                }
                Some(',') => {
                    self.advance();
                }
                Some(_) => {
                    return Err(self.error(format!("expected ',' or ')', found '{}'", self.peek_word())));
                }
                None => return Err(self.error("expected ')', found end of input")),
            }
        }
    }

    fn parse_arg(&mut self) -> Result<CallArg, ParseError> {
        self.skip_whitespace();
        let start = self.pos;
        if self.peek().is_some_and(|c| c.is_alphabetic() || c == '_') {
            let name = self.parse_ident()?;
            self.skip_whitespace();
            if self.remaining().starts_with('=') && !self.remaining().starts_with("==") {
                self.advance();
                let value = self.parse_param()?;
                return Ok(CallArg::Param { name, value });
            }
            self.pos = start;
        }
        Ok(CallArg::Input(self.parse_or()?))
    }

    fn parse_param(&mut self) -> Result<ParamLit, ParseError> {
        self.skip_whitespace();
        match self.peek() {
            Some('[') => {
                self.advance();
                let mut values = vec![self.parse_number()?];
                loop {
                    self.skip_whitespace();
                    match self.peek() {
                        Some(']') => {
                            self.advance();
                            return Ok(ParamLit::List(values));
                        }
                        Some(',') => {
                            self.advance();
                            values.push(self.parse_number()?);
                        }
                        _ => {
                            return Err(self.error(format!("expected ',' or ']', found '{}'", self.peek_word())));
                        }
                    }
                }
            }
            Some(ch) if ch.is_alphabetic() || ch == '_' => {
                let word = self.parse_ident()?;
                Ok(match word.as_str() {
                    "true" => ParamLit::Bool(true),
                    "false" => ParamLit::Bool(false),
                    _ => ParamLit::Word(word),
                })
            }
            _ => self.parse_literal(),
        }
    }

    fn parse(&mut self) -> Result<Expr, ParseError> {
        let expr = self.parse_or()?;
        self.skip_whitespace();
        if self.pos < self.input.len() {
            return Err(self.error(format!("unexpected input after expression: '{}'", self.remaining())));
        }
        Ok(expr)
    }
}

fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Expr {
    Expr::Binary {
        op,
        lhs: Box::new(lhs),
        rhs: Box::new(rhs),
    }
}

pub fn parse(input: &str) -> Result<Expr, ParseError> {
    let mut parser = Parser::new(input);
    parser.parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ident(s: &str) -> Expr {
        Expr::Ident(s.to_string())
    }

    #[test]
    fn parse_field() {
        assert_eq!(parse("close").unwrap(), ident("close"));
        assert_eq!(parse("  high  ").unwrap(), ident("high"));
    }

    #[test]
    fn parse_numbers() {
        assert_eq!(parse("42").unwrap(), Expr::Number(42.0));
        assert_eq!(parse("2.5").unwrap(), Expr::Number(2.5));
        assert_eq!(parse("-100.5").unwrap(), Expr::Number(-100.5));
    }

    #[test]
    fn parse_call_with_input_and_params() {
        let expr = parse("SMA(close, period=10)").unwrap();
        assert_eq!(
            expr,
            Expr::Call {
                name: "SMA".into(),
                args: vec![
                    CallArg::Input(ident("close")),
                    CallArg::Param {
                        name: "period".into(),
                        value: ParamLit::Int(10),
                    },
                ],
            }
        );
    }

    #[test]
    fn parse_param_kinds() {
        let expr = parse("KST(close, rfactors=[1, 2.5, 3], rmovav=EMA, safediv=true, perc=-2.5)").unwrap();
        let Expr::Call { args, .. } = expr else {
            panic!("expected call");
        };
        let values: Vec<&ParamLit> = args
            .iter()
            .filter_map(|a| match a {
                CallArg::Param { value, .. } => Some(value),
                CallArg::Input(_) => None,
            })
            .collect();
        assert_eq!(
            values,
            vec![
                &ParamLit::List(vec![1.0, 2.5, 3.0]),
                &ParamLit::Word("EMA".into()),
                &ParamLit::Bool(true),
                &ParamLit::Float(-2.5),
            ]
        );
    }

    #[test]
    fn parse_empty_call() {
        assert_eq!(
            parse("ATR()").unwrap(),
            Expr::Call {
                name: "ATR".into(),
                args: vec![],
            }
        );
    }

    #[test]
    fn precedence() {
        let expr = parse("a + b * c > 2 AND d OR e").unwrap();
        assert_eq!(expr.to_string(), "((((a + (b * c)) > 2) AND d) OR e)");
        let expr = parse("(a + b) * -c").unwrap();
        assert_eq!(expr.to_string(), "((a + b) * -c)");
    }

    #[test]
    fn comparison_operators() {
        for (text, op) in [
            ("a >= b", BinaryOp::Ge),
            ("a <= b", BinaryOp::Le),
            ("a == b", BinaryOp::Eq),
            ("a != b", BinaryOp::Ne),
            ("a > b", BinaryOp::Gt),
            ("a < b", BinaryOp::Lt),
        ] {
            let Expr::Binary { op: got, .. } = parse(text).unwrap() else {
                panic!("expected binary for {text}");
            };
            assert_eq!(got, op, "{text}");
        }
    }

    #[test]
    fn postfix_line_and_shift() {
        let expr = parse("MACD(close).signal[-1]").unwrap();
        let Expr::Shift { base, offset } = expr else {
            panic!("expected shift");
        };
        assert_eq!(offset, -1);
        assert!(matches!(*base, Expr::Select { ref line, .. } if line == "signal"));
        assert!(matches!(parse("close[2]").unwrap(), Expr::Shift { offset: 2, .. }));
    }

    #[test]
    fn equality_argument_is_not_a_param() {
        let expr = parse("Accum(x == 1)").unwrap();
        let Expr::Call { args, .. } = expr else {
            panic!("expected call");
        };
        assert!(matches!(args[0], CallArg::Input(Expr::Binary { op: BinaryOp::Eq, .. })));
    }

    #[test]
    fn error_unexpected_token() {
        let err = parse("SMA(close, )").unwrap_err();
        assert!(err.message.contains("expected expression"));
        assert_eq!(err.position, 11);
    }

    #[test]
    fn error_missing_paren() {
        let err = parse("SMA(close, period=10").unwrap_err();
        assert!(err.message.contains("expected ')'"));
    }

    #[test]
    fn error_missing_comma() {
        let err = parse("CrossOver(fast slow)").unwrap_err();
        assert!(err.message.contains("expected ',' or ')'"));
        assert_eq!(err.position, 15);
    }

    #[test]
    fn error_trailing_input() {
        let err = parse("close open").unwrap_err();
        assert!(err.message.contains("unexpected input"));
    }

    #[test]
    fn error_fractional_shift() {
        let err = parse("close[-1.5]").unwrap_err();
        assert!(err.message.contains("integer offset"));
    }

    #[test]
    fn error_keyword_as_operand() {
        let err = parse("a AND OR b").unwrap_err();
        assert!(err.message.contains("expected expression, found 'OR'"));
    }

    #[test]
    fn error_empty_input() {
        let err = parse("").unwrap_err();
        assert!(err.message.contains("expected expression"));
        assert_eq!(err.position, 0);
    }

    #[test]
    fn error_display_with_context() {
        let input = "SMA(close,, 3)";
        let err = parse(input).unwrap_err();
        let ctx = err.display_with_context(input);
        assert!(ctx.contains("^"));
        assert!(ctx.contains("position"));
    }
}
