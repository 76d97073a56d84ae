//! Evaluator for the constant expressions found in `EQU` lines.
//!
//! Supports C operator precedence, the usual assembler number notations
//! (`0x1F`, `$1F`, `1Fh`, `0b101`, `101b`, `%101`, `'A'`), labels that are
//! already known, and `$` for the address of the current line.

use thiserror::Error;

/// Why an expression could not be evaluated.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExpressionError {
    /// Input ended where an operand was expected.
    #[error("unexpected end of expression")]
    UnexpectedEnd,
    /// A character that is not part of any token.
    #[error("unexpected '{0}'")]
    UnexpectedChar(char),
    /// A token in a position where it is not allowed.
    #[error("unexpected '{0}'")]
    UnexpectedToken(String),
    /// A malformed number literal.
    #[error("invalid number '{0}'")]
    InvalidNumber(String),
    /// A label that is not (yet) defined.
    #[error("unknown label '{0}'")]
    UnknownLabel(String),
    /// `$` used where no address is known.
    #[error("current address not known")]
    NoCurrentAddress,
    /// Division or modulo by zero.
    #[error("division by zero")]
    DivisionByZero,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Number(i64),
    Ident(String),
    Dollar,
    Op(&'static str),
    Open,
    Close,
}

const OPERATORS: [&str; 21] = [
    "<<", ">>", "<=", ">=", "==", "!=", "&&", "||", "+", "-", "*", "/", "%", "&", "|", "^", "~",
    "!", "<", ">", "=",
];

/// Binary operators from lowest to highest precedence.
const LEVELS: [&[&str]; 9] = [
    &["||"],
    &["&&"],
    &["|"],
    &["^"],
    &["&"],
    &["==", "!=", "="],
    &["<", "<=", ">", ">="],
    &["<<", ">>"],
    &["+", "-"],
];

const PRODUCT: &[&str] = &["*", "/", "%"];

/// Evaluates `text`.
///
/// `current_address` is substituted for a lone `$`. Labels are resolved
/// with `lookup`.
///
/// # Errors
///
/// Returns an [`ExpressionError`] for syntax errors, unknown labels and
/// division by zero.
pub fn evaluate(
    text: &str,
    current_address: Option<i64>,
    lookup: impl Fn(&str) -> Option<i64>,
) -> Result<i64, ExpressionError> {
    let tokens = tokenize(text)?;
    let mut parser = Parser {
        tokens: &tokens,
        pos: 0,
        current_address,
        lookup: &lookup,
    };
    let value = parser.binary(0)?;
    match parser.tokens.get(parser.pos) {
        None => Ok(value),
        Some(token) => Err(ExpressionError::UnexpectedToken(describe(token))),
    }
}

fn describe(token: &Token) -> String {
    match token {
        Token::Number(n) => n.to_string(),
        Token::Ident(name) => name.clone(),
        Token::Dollar => "$".to_string(),
        Token::Op(op) => (*op).to_string(),
        Token::Open => "(".to_string(),
        Token::Close => ")".to_string(),
    }
}

const fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || c == '.' || c == '@'
}

const fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '.' || c == '@' || c == '$'
}

fn tokenize(text: &str) -> Result<Vec<Token>, ExpressionError> {
    let chars: Vec<char> = text.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
        } else if c == '(' {
            tokens.push(Token::Open);
            i += 1;
        } else if c == ')' {
            tokens.push(Token::Close);
            i += 1;
        } else if c == '\'' || c == '"' {
            let value = chars.get(i + 1).ok_or(ExpressionError::UnexpectedEnd)?;
            if chars.get(i + 2) != Some(&c) {
                return Err(ExpressionError::UnexpectedChar(c));
            }
            tokens.push(Token::Number(i64::from(u32::from(*value))));
            i += 3;
        } else if c == '$' || c == '%' || c.is_ascii_digit() {
            let start = i;
            i += 1;
            while i < chars.len() && chars[i].is_ascii_alphanumeric() {
                i += 1;
            }
            let literal: String = chars[start..i].iter().collect();
            match literal.as_str() {
                "$" => tokens.push(Token::Dollar),
                "%" => tokens.push(Token::Op("%")),
                _ => match parse_number(&literal) {
                    Some(n) => tokens.push(Token::Number(n)),
                    // `%` followed by an operand that is not binary.
                    None if c == '%' => {
                        tokens.push(Token::Op("%"));
                        i = start + 1;
                    }
                    None => return Err(ExpressionError::InvalidNumber(literal)),
                },
            }
        } else if is_ident_start(c) {
            let start = i;
            while i < chars.len() && is_ident_char(chars[i]) {
                i += 1;
            }
            tokens.push(Token::Ident(chars[start..i].iter().collect()));
        } else {
            let rest: String = chars[i..chars.len().min(i + 2)].iter().collect();
            let op = OPERATORS
                .iter()
                .find(|op| rest.starts_with(**op))
                .copied()
                .ok_or(ExpressionError::UnexpectedChar(c))?;
            tokens.push(Token::Op(op));
            i += op.len();
        }
    }
    Ok(tokens)
}

/// Parses a number literal in any of the supported notations.
#[must_use]
pub fn parse_number(literal: &str) -> Option<i64> {
    let lower = literal.to_ascii_lowercase();
    let (digits, radix) = if let Some(hex) = lower.strip_prefix("0x") {
        (hex, 16)
    } else if let Some(hex) = lower.strip_prefix('$') {
        (hex, 16)
    } else if let Some(bin) = lower.strip_prefix('%') {
        (bin, 2)
    } else if let Some(hex) = lower.strip_suffix('h') {
        (hex, 16)
    } else if let Some(bin) = lower.strip_prefix("0b").filter(|b| !b.is_empty()) {
        (bin, 2)
    } else if let Some(bin) = lower
        .strip_suffix('b')
        .filter(|b| b.chars().all(|c| c == '0' || c == '1'))
    {
        (bin, 2)
    } else {
        (lower.as_str(), 10)
    };
    if digits.is_empty() {
        return None;
    }
    i64::from_str_radix(digits, radix).ok()
}

struct Parser<'a, F> {
    tokens: &'a [Token],
    pos: usize,
    current_address: Option<i64>,
    lookup: &'a F,
}

impl<F: Fn(&str) -> Option<i64>> Parser<'_, F> {
    fn peek_op(&self, ops: &[&str]) -> Option<&'static str> {
        match self.tokens.get(self.pos) {
            Some(Token::Op(op)) if ops.contains(op) => Some(*op),
            _ => None,
        }
    }

    fn binary(&mut self, level: usize) -> Result<i64, ExpressionError> {
        let Some(ops) = LEVELS.get(level) else {
            return self.product();
        };
        let mut left = self.binary(level + 1)?;
        while let Some(op) = self.peek_op(ops) {
            self.pos += 1;
            let right = self.binary(level + 1)?;
            left = apply(op, left, right)?;
        }
        Ok(left)
    }

    fn product(&mut self) -> Result<i64, ExpressionError> {
        let mut left = self.unary()?;
        while let Some(op) = self.peek_op(PRODUCT) {
            self.pos += 1;
            let right = self.unary()?;
            left = apply(op, left, right)?;
        }
        Ok(left)
    }

    fn unary(&mut self) -> Result<i64, ExpressionError> {
        if let Some(op) = self.peek_op(&["-", "+", "~", "!"]) {
            self.pos += 1;
            let value = self.unary()?;
            return Ok(match op {
                "-" => value.wrapping_neg(),
                "~" => !value,
                "!" => i64::from(value == 0),
                _ => value,
            });
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<i64, ExpressionError> {
        let token = self
            .tokens
            .get(self.pos)
            .ok_or(ExpressionError::UnexpectedEnd)?;
        self.pos += 1;
        match token {
            Token::Number(n) => Ok(*n),
            Token::Dollar => self.current_address.ok_or(ExpressionError::NoCurrentAddress),
            Token::Ident(name) => {
                (self.lookup)(name).ok_or_else(|| ExpressionError::UnknownLabel(name.clone()))
            }
            Token::Open => {
                let value = self.binary(0)?;
                match self.tokens.get(self.pos) {
                    Some(Token::Close) => {
                        self.pos += 1;
                        Ok(value)
                    }
                    Some(other) => Err(ExpressionError::UnexpectedToken(describe(other))),
                    None => Err(ExpressionError::UnexpectedEnd),
                }
            }
            other => Err(ExpressionError::UnexpectedToken(describe(other))),
        }
    }
}

fn apply(op: &str, left: i64, right: i64) -> Result<i64, ExpressionError> {
    Ok(match op {
        "+" => left.wrapping_add(right),
        "-" => left.wrapping_sub(right),
        "*" => left.wrapping_mul(right),
        "/" | "%" if right == 0 => return Err(ExpressionError::DivisionByZero),
        "/" => left.wrapping_div(right),
        "%" => left.wrapping_rem(right),
        "&" => left & right,
        "|" => left | right,
        "^" => left ^ right,
        "<<" => left.wrapping_shl(u32::try_from(right).unwrap_or(u32::MAX)),
        ">>" => left.wrapping_shr(u32::try_from(right).unwrap_or(u32::MAX)),
        "==" | "=" => i64::from(left == right),
        "!=" => i64::from(left != right),
        "<" => i64::from(left < right),
        "<=" => i64::from(left <= right),
        ">" => i64::from(left > right),
        ">=" => i64::from(left >= right),
        "&&" => i64::from(left != 0 && right != 0),
        "||" => i64::from(left != 0 || right != 0),
        _ => return Err(ExpressionError::UnexpectedToken(op.to_string())),
    })
}

#[cfg(test)]
mod tests {
    use super::{evaluate, parse_number, ExpressionError};
    use rstest::rstest;

    fn eval(text: &str) -> Result<i64, ExpressionError> {
        evaluate(text, Some(0x8000), |name| match name {
            "label1" => Some(0x6000),
            "BLACK" => Some(0),
            _ => None,
        })
    }

    #[rstest]
    #[case("100", 100)]
    #[case("0x1F", 0x1F)]
    #[case("$1F", 0x1F)]
    #[case("0FFh", 0xFF)]
    #[case("%101", 5)]
    #[case("0b101", 5)]
    #[case("101b", 5)]
    #[case("0b + 1", 1)]
    #[case("'A'", 65)]
    #[case("3 << 3", 24)]
    #[case("1 + 2 * 3", 7)]
    #[case("(1 + 2) * 3", 9)]
    #[case("10 % 4", 2)]
    #[case("-1", -1)]
    #[case("~0 & 0xFF", 0xFF)]
    #[case("1 == 1 && 2 > 1", 1)]
    #[case("label1 + 4", 0x6004)]
    #[case("$ + 2", 0x8002)]
    #[case("BLACK", 0)]
    fn evaluates(#[case] text: &str, #[case] expected: i64) {
        assert_eq!(eval(text), Ok(expected));
    }

    #[test]
    fn reports_errors() {
        assert_eq!(
            eval("unknown + 1"),
            Err(ExpressionError::UnknownLabel("unknown".to_string()))
        );
        assert_eq!(eval("5 / 0"), Err(ExpressionError::DivisionByZero));
        assert_eq!(eval("(1 + 2"), Err(ExpressionError::UnexpectedEnd));
        assert_eq!(eval("1 +"), Err(ExpressionError::UnexpectedEnd));
        assert_eq!(eval("1 2"), Err(ExpressionError::UnexpectedToken("2".to_string())));
        assert_eq!(
            evaluate("$", None, |_| None),
            Err(ExpressionError::NoCurrentAddress)
        );
    }

    #[test]
    fn number_notations() {
        assert_eq!(parse_number("1Bh"), Some(0x1B));
        assert_eq!(parse_number("12"), Some(12));
        assert_eq!(parse_number("0x"), None);
        assert_eq!(parse_number("0b"), Some(0));
        assert_eq!(parse_number("0B"), Some(0));
        assert_eq!(parse_number("0b"), parse_number("00b"));
        assert_eq!(parse_number("zz"), None);
    }
}
