use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;

/// A number as written in a catalogue.
///
/// Either a plain JSON integer or a string holding terms joined by `+` or `-`.
/// A term is a hex literal (`0x9932`, `$9932`), a decimal literal, or a symbol
/// name, optionally preceded by `-`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum Number {
    Int(i64),
    Text(String),
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::Text(t) => f.write_str(t),
        }
    }
}

impl From<i64> for Number {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<&str> for Number {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

/// A byte as written in a catalogue.
///
/// Besides numbers, `<name` and `>name` select the low and high byte of a
/// symbol, the way a 6502 assembler does.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum ByteItem {
    Int(i64),
    Text(String),
}

impl fmt::Display for ByteItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::Text(t) => f.write_str(t),
        }
    }
}

/// Why a number could not be evaluated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum EvalError {
    Malformed,
    UnknownSymbol(String),
}

pub(crate) type Symbols = BTreeMap<String, i64>;

impl Number {
    pub(crate) fn eval(&self, symbols: &Symbols) -> Result<i64, EvalError> {
        match self {
            Self::Int(v) => Ok(*v),
            Self::Text(text) => eval_sum(text, symbols),
        }
    }
}

impl ByteItem {
    /// Evaluates the item without range-checking the result.
    pub(crate) fn eval(&self, symbols: &Symbols) -> Result<i64, EvalError> {
        match self {
            Self::Int(v) => Ok(*v),
            Self::Text(text) => {
                let text = text.trim();
                if let Some(rest) = text.strip_prefix('<') {
                    Ok(eval_sum(rest, symbols)? & 0xFF)
                } else if let Some(rest) = text.strip_prefix('>') {
                    Ok((eval_sum(rest, symbols)? >> 8) & 0xFF)
                } else {
                    eval_sum(text, symbols)
                }
            }
        }
    }
}

/// Parses a literal with no symbols, e.g. a command-line address.
pub fn parse_literal(text: &str) -> Option<i64> {
    eval_sum(text, &Symbols::new()).ok()
}

fn eval_sum(text: &str, symbols: &Symbols) -> Result<i64, EvalError> {
    let mut total = 0i64;
    let mut negate = false;
    let mut rest = text.trim();

    loop {
        while let Some(tail) = rest.strip_prefix('-') {
            negate = !negate;
            rest = tail.trim_start();
        }

        let end = rest.find(['+', '-']).unwrap_or(rest.len());
        let value = eval_term(rest[..end].trim(), symbols)?;
        let value = if negate { value.checked_neg() } else { Some(value) };

        total = value
            .and_then(|v| total.checked_add(v))
            .ok_or(EvalError::Malformed)?;

        let Some(op) = rest[end..].chars().next() else {
            return Ok(total);
        };

        negate = op == '-';
        rest = rest[end + 1..].trim_start();
    }
}

fn eval_term(term: &str, symbols: &Symbols) -> Result<i64, EvalError> {
    let hex = term
        .strip_prefix("0x")
        .or_else(|| term.strip_prefix("0X"))
        .or_else(|| term.strip_prefix('$'));

    if let Some(digits) = hex {
        return i64::from_str_radix(digits, 16).map_err(|_| EvalError::Malformed);
    }

    if term.starts_with(|c: char| c.is_ascii_digit()) {
        return term.parse().map_err(|_| EvalError::Malformed);
    }

    let is_symbol = term.starts_with(|c: char| c.is_ascii_alphabetic() || c == '_')
        && term.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');

    if !is_symbol {
        return Err(EvalError::Malformed);
    }

    symbols
        .get(term)
        .copied()
        .ok_or_else(|| EvalError::UnknownSymbol(term.to_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn symbols() -> Symbols {
        Symbols::from([("patch1".to_owned(), 0xCD1E), ("llx30".to_owned(), 0xCCE0)])
    }

    #[test]
    fn literals() {
        assert_eq!(parse_literal("0x9932"), Some(0x9932));
        assert_eq!(parse_literal("$6A00"), Some(0x6A00));
        assert_eq!(parse_literal("28"), Some(28));
        assert_eq!(parse_literal("-4"), Some(-4));
        assert_eq!(parse_literal("0x6A00 + 0x62D6"), Some(0xCCD6));
        assert_eq!(parse_literal("0x9F2A+0x900"), Some(0xA82A));
        assert_eq!(parse_literal("0x6A00 - 2"), Some(0x69FE));
        assert_eq!(parse_literal("0x10 - -2 + 1"), Some(0x13));
    }

    #[test]
    fn malformed() {
        assert_eq!(parse_literal(""), None);
        assert_eq!(parse_literal("0xZZ"), None);
        assert_eq!(parse_literal("12abc"), None);
        assert_eq!(parse_literal("a-b"), None);
        assert_eq!(parse_literal("1 +"), None);
    }

    #[test]
    fn symbols_resolve() {
        let number = Number::from("llx30 + 3");
        assert_eq!(number.eval(&symbols()), Ok(0xCCE3));

        let missing = Number::from("patch9");
        assert_eq!(
            missing.eval(&symbols()),
            Err(EvalError::UnknownSymbol("patch9".into()))
        );
    }

    #[test]
    fn low_and_high_bytes() {
        let symbols = symbols();

        assert_eq!(ByteItem::Text("<patch1".into()).eval(&symbols), Ok(0x1E));
        assert_eq!(ByteItem::Text(">patch1".into()).eval(&symbols), Ok(0xCD));
        assert_eq!(ByteItem::Text("0xEA".into()).eval(&symbols), Ok(0xEA));
        assert_eq!(ByteItem::Int(300).eval(&symbols), Ok(300));
    }
}
