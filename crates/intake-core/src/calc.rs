//! Calculation engine for derived fields
//!
//! Calculated fields carry a small arithmetic expression over other
//! field keys, e.g. `total_income - total_deductions` or
//! `min(line_22, line_23) + 100`. The engine tokenizes and parses the
//! expression itself (no embedded interpreter) and evaluates it over a
//! numeric view of the current answers.
//!
//! A broken calculation must never block the user from filling out the
//! rest of the form, so every failure mode — unknown token, syntax
//! error, non-finite result — yields 0.

use std::collections::{BTreeMap, HashMap};

use serde_json::Value;

use crate::field::FieldDefinition;
use crate::value;

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Num(f64),
    Ident(String),
    Plus,
    Minus,
    Comma,
    LParen,
    RParen,
}

fn tokenize(expr: &str) -> Option<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = expr.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            ' ' | '\t' | '\n' | '\r' => {
                chars.next();
            }
            '+' => {
                chars.next();
                tokens.push(Token::Plus);
            }
            '-' => {
                chars.next();
                tokens.push(Token::Minus);
            }
            ',' => {
                chars.next();
                tokens.push(Token::Comma);
            }
            '(' => {
                chars.next();
                tokens.push(Token::LParen);
            }
            ')' => {
                chars.next();
                tokens.push(Token::RParen);
            }
            '0'..='9' | '.' => {
                let mut lit = String::new();
                while let Some(&d) = chars.peek() {
                    if d.is_ascii_digit() || d == '.' {
                        lit.push(d);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Num(lit.parse().ok()?));
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let mut ident = String::new();
                while let Some(&d) = chars.peek() {
                    if d.is_ascii_alphanumeric() || d == '_' {
                        ident.push(d);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Ident(ident));
            }
            _ => return None,
        }
    }

    Some(tokens)
}

/// Recursive-descent parser/evaluator over a numeric context.
///
/// Grammar:
/// ```text
/// expr := term (('+' | '-') term)*
/// term := NUMBER | IDENT | IDENT '(' expr (',' expr)* ')'
///       | '(' expr ')' | '-' term
/// ```
struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    ctx: &'a HashMap<String, f64>,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<&Token> {
        let t = self.tokens.get(self.pos);
        self.pos += 1;
        t
    }

    fn expr(&mut self) -> Option<f64> {
        let mut acc = self.term()?;
        while let Some(op) = self.peek() {
            match op {
                Token::Plus => {
                    self.next();
                    acc += self.term()?;
                }
                Token::Minus => {
                    self.next();
                    acc -= self.term()?;
                }
                _ => break,
            }
        }
        Some(acc)
    }

    fn term(&mut self) -> Option<f64> {
        match self.next()?.clone() {
            Token::Num(n) => Some(n),
            Token::Minus => Some(-self.term()?),
            Token::LParen => {
                let v = self.expr()?;
                match self.next()? {
                    Token::RParen => Some(v),
                    _ => None,
                }
            }
            Token::Ident(name) => {
                if self.peek() == Some(&Token::LParen) {
                    self.next();
                    self.call(&name)
                } else {
                    // Unknown field keys evaluate to 0, same as blank answers.
                    Some(self.ctx.get(&name).copied().unwrap_or(0.0))
                }
            }
            _ => None,
        }
    }

    fn call(&mut self, name: &str) -> Option<f64> {
        let mut args = vec![self.expr()?];
        loop {
            match self.next()? {
                Token::Comma => args.push(self.expr()?),
                Token::RParen => break,
                _ => return None,
            }
        }

        match name {
            "min" => args.iter().copied().reduce(f64::min),
            "max" => args.iter().copied().reduce(f64::max),
            _ => None,
        }
    }
}

/// Evaluate one expression over a numeric context. Any failure — bad
/// syntax, unknown function, non-finite result — yields 0.
pub fn evaluate(expr: &str, ctx: &HashMap<String, f64>) -> f64 {
    let Some(tokens) = tokenize(expr) else {
        return 0.0;
    };
    if tokens.is_empty() {
        return 0.0;
    }

    let mut parser = Parser {
        tokens: &tokens,
        pos: 0,
        ctx,
    };
    match parser.expr() {
        Some(v) if parser.pos == tokens.len() && v.is_finite() => v,
        _ => 0.0,
    }
}

/// Recompute every calculated field over the current answers.
///
/// Calculated fields may reference other calculated fields, so passes
/// repeat — feeding each round's results back into the context — until
/// a fixed point or `fields.len() + 2` passes. Circular references do
/// not error; they stabilize or stop at the pass bound.
pub fn recompute(
    fields: &[FieldDefinition],
    answers: &HashMap<String, Value>,
) -> BTreeMap<String, f64> {
    let mut ctx: HashMap<String, f64> = answers
        .iter()
        .map(|(k, v)| (k.clone(), value::to_number(v)))
        .collect();

    let calculated: Vec<&FieldDefinition> = fields
        .iter()
        .filter(|f| f.is_calculated)
        .filter(|f| f.calculation.as_deref().is_some_and(|c| !c.trim().is_empty()))
        .collect();

    let mut derived = BTreeMap::new();
    let max_passes = fields.len() + 2;

    for _ in 0..max_passes {
        let mut changed = false;

        for f in &calculated {
            let expr = f.calculation.as_deref().unwrap_or_default();
            let v = evaluate(expr, &ctx);
            if derived.get(&f.field_key) != Some(&v) {
                derived.insert(f.field_key.clone(), v);
                ctx.insert(f.field_key.clone(), v);
                changed = true;
            }
        }

        if !changed {
            break;
        }
    }

    derived
}

/// Recompute and write the derived values back into the answer map, so
/// a persisted calculated field can never be stale. Integral results
/// are stored as JSON integers.
pub fn apply_calculations(fields: &[FieldDefinition], answers: &mut HashMap<String, Value>) {
    for (key, v) in recompute(fields, answers) {
        let json = if v.fract() == 0.0 && v.abs() < i64::MAX as f64 {
            Value::from(v as i64)
        } else {
            serde_json::Number::from_f64(v)
                .map(Value::Number)
                .unwrap_or(Value::Null)
        };
        answers.insert(key, json);
    }
}
