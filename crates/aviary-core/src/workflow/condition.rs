//! Safe condition evaluation for `conditional_logic` steps.
//!
//! The grammar is deliberately tiny — comparisons over context variables,
//! no code execution:
//!
//! ```text
//! condition  := operand | operand op operand
//! op         := == | != | < | <= | > | >= | contains
//! operand    := $variable | 'quoted string' | "quoted string"
//!             | number | true | false | bare_word
//! ```
//!
//! A single operand is tested for truthiness (absent variables, empty
//! strings, `false`, `0`, and empty collections are false). An absent
//! `$variable` in a comparison behaves as null. Anything unparseable fails
//! the step rather than defaulting to "continue".

use crate::error::StepError;
use crate::workflow::template::ExecutionContext;

/// Evaluate a condition string against the context.
pub fn evaluate(condition: &str, context: &ExecutionContext) -> Result<bool, StepError> {
    let tokens = tokenize(condition)
        .map_err(|reason| StepError::InvalidCondition {
            condition: condition.to_string(),
            reason,
        })?;

    match tokens.as_slice() {
        [] => Err(StepError::InvalidCondition {
            condition: condition.to_string(),
            reason: "empty condition".to_string(),
        }),
        [operand] => Ok(is_truthy(&resolve(operand, context))),
        [lhs, op, rhs] => {
            let lhs = resolve(lhs, context);
            let rhs = resolve(rhs, context);
            compare(&lhs, op, &rhs).map_err(|reason| StepError::InvalidCondition {
                condition: condition.to_string(),
                reason,
            })
        }
        _ => Err(StepError::InvalidCondition {
            condition: condition.to_string(),
            reason: "expected 'operand' or 'operand op operand'".to_string(),
        }),
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    /// `$name` context reference.
    Variable(String),
    /// Quoted string literal.
    Literal(String),
    /// Unquoted word: number, bool, operator, or bare string.
    Word(String),
}

fn op_text(token: &Token) -> String {
    match token {
        Token::Variable(name) => format!("${}", name),
        Token::Literal(s) | Token::Word(s) => s.clone(),
    }
}

fn tokenize(input: &str) -> Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();

    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
        } else if c == '\'' || c == '"' {
            let quote = c;
            chars.next();
            let mut literal = String::new();
            let mut closed = false;
            for ch in chars.by_ref() {
                if ch == quote {
                    closed = true;
                    break;
                }
                literal.push(ch);
            }
            if !closed {
                return Err("unterminated string literal".to_string());
            }
            tokens.push(Token::Literal(literal));
        } else {
            let mut word = String::new();
            while let Some(&ch) = chars.peek() {
                if ch.is_whitespace() {
                    break;
                }
                word.push(ch);
                chars.next();
            }
            if let Some(name) = word.strip_prefix('$') {
                if name.is_empty() {
                    return Err("empty variable reference".to_string());
                }
                tokens.push(Token::Variable(name.to_string()));
            } else {
                tokens.push(Token::Word(word));
            }
        }
    }

    Ok(tokens)
}

fn resolve(token: &Token, context: &ExecutionContext) -> serde_json::Value {
    match token {
        Token::Variable(name) => context
            .get(name)
            .cloned()
            .unwrap_or(serde_json::Value::Null),
        Token::Literal(s) => serde_json::Value::String(s.clone()),
        Token::Word(w) => {
            if w == "true" {
                serde_json::Value::Bool(true)
            } else if w == "false" {
                serde_json::Value::Bool(false)
            } else if let Ok(n) = w.parse::<f64>() {
                serde_json::Number::from_f64(n)
                    .map(serde_json::Value::Number)
                    .unwrap_or(serde_json::Value::Null)
            } else {
                serde_json::Value::String(w.clone())
            }
        }
    }
}

fn is_truthy(value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::Null => false,
        serde_json::Value::Bool(b) => *b,
        serde_json::Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        serde_json::Value::String(s) => !s.is_empty() && s != "false",
        serde_json::Value::Array(a) => !a.is_empty(),
        serde_json::Value::Object(o) => !o.is_empty(),
    }
}

fn as_number(value: &serde_json::Value) -> Option<f64> {
    match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.parse::<f64>().ok(),
        _ => None,
    }
}

fn compare(lhs: &serde_json::Value, op: &Token, rhs: &serde_json::Value) -> Result<bool, String> {
    let op = match op {
        Token::Word(w) => w.as_str(),
        other => return Err(format!("unknown operator '{}'", op_text(other))),
    };

    match op {
        "==" => Ok(values_equal(lhs, rhs)),
        "!=" => Ok(!values_equal(lhs, rhs)),
        "<" | "<=" | ">" | ">=" => {
            let (a, b) = match (as_number(lhs), as_number(rhs)) {
                (Some(a), Some(b)) => (a, b),
                _ => return Err(format!("operator '{}' requires numeric operands", op)),
            };
            Ok(match op {
                "<" => a < b,
                "<=" => a <= b,
                ">" => a > b,
                _ => a >= b,
            })
        }
        "contains" => {
            let haystack = crate::workflow::template::value_to_string(lhs);
            let needle = crate::workflow::template::value_to_string(rhs);
            Ok(haystack.contains(&needle))
        }
        other => Err(format!("unknown operator '{}'", other)),
    }
}

fn values_equal(lhs: &serde_json::Value, rhs: &serde_json::Value) -> bool {
    // Numeric comparison first so 5 == 5.0 and "5" == 5 behave as expected.
    if let (Some(a), Some(b)) = (as_number(lhs), as_number(rhs)) {
        return a == b;
    }
    match (lhs, rhs) {
        (serde_json::Value::String(a), serde_json::Value::String(b)) => a == b,
        _ => lhs == rhs,
    }
}
