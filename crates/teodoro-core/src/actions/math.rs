//! Spoken arithmetic.

use crate::extract::{parse_number, tokenize};
use crate::lexicon::{MathOperation, NumberTable};
use crate::outcome::Reply;

pub const MATH_FAILURE_SPEECH: &str = "Lo siento, no puedo realizar esa operación";
pub const MATH_FAILURE_DISPLAY: &str = "Operación no recogida";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MathOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
    Sqrt,
    Cbrt,
}

impl MathOp {
    /// Accepts the operation name or its symbolic form.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "+" | "add" => Some(MathOp::Add),
            "-" | "sub" => Some(MathOp::Sub),
            "*" | "mul" => Some(MathOp::Mul),
            "/" | "div" => Some(MathOp::Div),
            "**" | "^" | "pow" => Some(MathOp::Pow),
            "sqrt" => Some(MathOp::Sqrt),
            "cbrt" => Some(MathOp::Cbrt),
            _ => None,
        }
    }

    pub fn is_unary(self) -> bool {
        matches!(self, MathOp::Sqrt | MathOp::Cbrt)
    }

    /// `None` for results that are not real numbers.
    pub fn apply(self, a: f64, b: f64) -> Option<f64> {
        let r = match self {
            MathOp::Add => a + b,
            MathOp::Sub => a - b,
            MathOp::Mul => a * b,
            MathOp::Div if b == 0.0 => return None,
            MathOp::Div => a / b,
            MathOp::Pow => a.powf(b),
            MathOp::Sqrt if a < 0.0 => return None,
            MathOp::Sqrt => a.sqrt(),
            MathOp::Cbrt => a.cbrt(),
        };
        r.is_finite().then_some(r)
    }
}

/// Operation and operands read out of a transcript.
#[derive(Debug, Clone, PartialEq)]
pub struct MathRequest {
    pub op: MathOp,
    pub left: i64,
    pub right: i64,
}

/// The operation whose keyword appears earliest in the transcript wins, so "diez entre dos por
/// favor" is a division.
pub fn parse_request(
    transcript: &str,
    operations: &[MathOperation],
    numbers: Option<&NumberTable>,
) -> Option<MathRequest> {
    let tokens = tokenize(transcript);
    let (anchor, operation) = operations
        .iter()
        .filter_map(|o| keyword_position(&tokens, &o.keyword).map(|idx| (idx, o)))
        .min_by_key(|(idx, _)| *idx)?;
    let number = |idx: usize| -> Option<i64> {
        tokens.get(idx).and_then(|w| parse_number(w, numbers).ok())
    };

    let (left, right) = match operation.op {
        op if op.is_unary() => {
            let offset = if tokens.get(anchor).map(String::as_str) == Some("raíz") {
                3
            } else {
                1
            };
            (number(anchor + offset)?, 0)
        }
        MathOp::Pow => {
            let left = number(anchor.checked_sub(1)?)?;
            let right = match tokens.get(anchor + 2).map(String::as_str) {
                Some("cuadrado") => 2,
                Some("cubo") => 3,
                _ => number(anchor + 2)?,
            };
            (left, right)
        }
        _ => {
            let keyword_len = operation.keyword.split_whitespace().count();
            (number(anchor.checked_sub(1)?)?, number(anchor + keyword_len)?)
        }
    };

    Some(MathRequest {
        op: operation.op,
        left,
        right,
    })
}

/// Token index where the (possibly multi-word) keyword starts.
fn keyword_position(tokens: &[String], keyword: &str) -> Option<usize> {
    let words = tokenize(keyword);
    if words.is_empty() {
        return None;
    }
    tokens.windows(words.len()).position(|w| w == words.as_slice())
}

pub fn format_result(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        let s = format!("{:.4}", value);
        s.trim_end_matches('0').trim_end_matches('.').to_string()
    }
}

pub fn evaluate(
    transcript: &str,
    operations: &[MathOperation],
    numbers: Option<&NumberTable>,
) -> Reply {
    let result = parse_request(transcript, operations, numbers)
        .and_then(|req| req.op.apply(req.left as f64, req.right as f64));
    match result {
        Some(value) => {
            let text = format_result(value);
            Reply::new(text.clone(), text)
        }
        None => {
            tracing::debug!(target: "teodoro::math", transcript = transcript, "Operation not understood");
            Reply::new(MATH_FAILURE_SPEECH, MATH_FAILURE_DISPLAY)
        }
    }
}
