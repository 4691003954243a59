use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::{tag, take_while},
    character::complete::{char, multispace0, satisfy},
    combinator::{all_consuming, map, not, opt, recognize, value},
    multi::separated_list1,
    number::complete::double,
    sequence::{delimited, pair, preceded, terminated},
};
use thiserror::Error;

use crate::facts::FactSet;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExprError {
    #[error("syntax error at offset {offset} near `{near}`")]
    Syntax { offset: usize, near: String },
    #[error("unexpected end of expression")]
    UnexpectedEnd,
    #[error("unknown fact `{0}`")]
    UnknownFact(String),
    #[error("cannot order `{left}` against `{right}`")]
    TypeMismatch { left: String, right: String },
    #[error("`{0}` is not a boolean")]
    NotBoolean(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
}

/// Leaf of an expression: a fact reference or a literal.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Fact(String),
    Text(String),
    Number(f64),
    Bool(bool),
    Null,
}

/// Parsed relevance expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Value(Operand),
    Compare {
        left: Operand,
        op: CmpOp,
        right: Operand,
    },
    And(Vec<Expr>),
    Or(Vec<Expr>),
    Not(Box<Expr>),
}

/// Wrap a parser so it skips surrounding whitespace.
fn ws<'a, O, F>(inner: F) -> impl FnMut(&'a str) -> IResult<&'a str, O>
where
    F: Parser<&'a str, O, nom::error::Error<&'a str>>,
{
    delimited(multispace0, inner, multispace0)
}

fn parse_identifier(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        satisfy(|c: char| c.is_ascii_alphabetic() || c == '_'),
        take_while(|c: char| c.is_ascii_alphanumeric() || c == '_'),
    ))
    .parse(input)
}

fn parse_single_quoted(input: &str) -> IResult<&str, &str> {
    delimited(char('\''), take_while(|c: char| c != '\''), char('\'')).parse(input)
}

fn parse_double_quoted(input: &str) -> IResult<&str, &str> {
    delimited(char('"'), take_while(|c: char| c != '"'), char('"')).parse(input)
}

/// Identifiers come before numbers so names like `info` never read as `inf`.
fn parse_operand(input: &str) -> IResult<&str, Operand> {
    ws(alt((
        map(parse_identifier, |name: &str| match name {
            "true" => Operand::Bool(true),
            "false" => Operand::Bool(false),
            "null" => Operand::Null,
            _ => Operand::Fact(name.to_string()),
        }),
        map(double, Operand::Number),
        map(parse_single_quoted, |text: &str| Operand::Text(text.to_string())),
        map(parse_double_quoted, |text: &str| Operand::Text(text.to_string())),
    )))
    .parse(input)
}

fn parse_cmp_op(input: &str) -> IResult<&str, CmpOp> {
    ws(alt((
        value(CmpOp::Eq, tag("==")),
        value(CmpOp::Ne, tag("!=")),
        value(CmpOp::Ge, tag(">=")),
        value(CmpOp::Le, tag("<=")),
        value(CmpOp::Gt, tag(">")),
        value(CmpOp::Lt, tag("<")),
    )))
    .parse(input)
}

fn parse_comparison(input: &str) -> IResult<&str, Expr> {
    let (input, left) = parse_operand(input)?;
    let (input, tail) = opt(pair(parse_cmp_op, parse_operand)).parse(input)?;
    let expr = match tail {
        Some((op, right)) => Expr::Compare { left, op, right },
        None => Expr::Value(left),
    };
    Ok((input, expr))
}

fn parse_unary(input: &str) -> IResult<&str, Expr> {
    alt((
        map(
            preceded(ws(terminated(char('!'), not(char('=')))), parse_unary),
            |inner| Expr::Not(Box::new(inner)),
        ),
        delimited(ws(char('(')), parse_or, ws(char(')'))),
        parse_comparison,
    ))
    .parse(input)
}

fn parse_and(input: &str) -> IResult<&str, Expr> {
    map(separated_list1(ws(tag("&&")), parse_unary), |terms| {
        collapse(terms, Expr::And)
    })
    .parse(input)
}

fn parse_or(input: &str) -> IResult<&str, Expr> {
    map(separated_list1(ws(tag("||")), parse_and), |terms| {
        collapse(terms, Expr::Or)
    })
    .parse(input)
}

fn collapse(mut terms: Vec<Expr>, join: fn(Vec<Expr>) -> Expr) -> Expr {
    if terms.len() == 1 {
        terms.remove(0)
    } else {
        join(terms)
    }
}

/// Turn the unparsed remainder into an offset and the token found there.
fn syntax_error(source: &str, rest: &str) -> ExprError {
    let rest = rest.trim_start();
    match rest.split_whitespace().next() {
        Some(near) => ExprError::Syntax {
            offset: source.len() - rest.len(),
            near: near.to_string(),
        },
        None => ExprError::UnexpectedEnd,
    }
}

/// A resolved operand.
#[derive(Debug, Clone, PartialEq)]
enum Scalar {
    Text(String),
    Number(f64),
    Bool(bool),
}

impl Scalar {
    fn as_number(&self) -> Option<f64> {
        match self {
            Scalar::Number(value) => Some(*value),
            Scalar::Text(text) => text.trim().parse().ok(),
            Scalar::Bool(_) => None,
        }
    }

    fn as_text(&self) -> String {
        match self {
            Scalar::Text(text) => text.clone(),
            Scalar::Number(value) => value.to_string(),
            Scalar::Bool(flag) => flag.to_string(),
        }
    }
}

impl Operand {
    fn resolve(&self, facts: &FactSet) -> Result<Option<Scalar>, ExprError> {
        Ok(match self {
            Operand::Fact(name) => Some(Scalar::Text(
                facts
                    .get(name)
                    .ok_or_else(|| ExprError::UnknownFact(name.clone()))?
                    .to_string(),
            )),
            Operand::Text(text) => Some(Scalar::Text(text.clone())),
            Operand::Number(value) => Some(Scalar::Number(*value)),
            Operand::Bool(flag) => Some(Scalar::Bool(*flag)),
            Operand::Null => None,
        })
    }

    /// Like [`Operand::resolve`] but an absent fact is `null` instead of an error.
    fn resolve_nullable(&self, facts: &FactSet) -> Result<Option<Scalar>, ExprError> {
        match self {
            Operand::Fact(name) if !facts.contains(name) => Ok(None),
            _ => self.resolve(facts),
        }
    }
}

impl Expr {
    pub fn parse(input: &str) -> Result<Self, ExprError> {
        match all_consuming(ws(parse_or)).parse(input) {
            Ok((_, expr)) => Ok(expr),
            Err(nom::Err::Error(err) | nom::Err::Failure(err)) => Err(syntax_error(input, err.input)),
            Err(nom::Err::Incomplete(_)) => Err(ExprError::UnexpectedEnd),
        }
    }

    /// Evaluates the expression against a fact set without modifying it.
    pub fn evaluate(&self, facts: &FactSet) -> Result<bool, ExprError> {
        match self {
            Expr::Value(operand) => match operand.resolve(facts)? {
                Some(Scalar::Bool(flag)) => Ok(flag),
                Some(Scalar::Text(text)) if text == "true" => Ok(true),
                Some(Scalar::Text(text)) if text == "false" => Ok(false),
                Some(other) => Err(ExprError::NotBoolean(other.as_text())),
                None => Err(ExprError::NotBoolean("null".into())),
            },
            Expr::Compare { left, op, right } => compare(facts, left, *op, right),
            Expr::And(terms) => {
                for term in terms {
                    if !term.evaluate(facts)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            Expr::Or(terms) => {
                for term in terms {
                    if term.evaluate(facts)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            Expr::Not(inner) => inner.evaluate(facts).map(|value| !value),
        }
    }
}

fn compare(facts: &FactSet, left: &Operand, op: CmpOp, right: &Operand) -> Result<bool, ExprError> {
    let null_check = matches!(left, Operand::Null) || matches!(right, Operand::Null);
    let (lhs, rhs) = if null_check {
        (left.resolve_nullable(facts)?, right.resolve_nullable(facts)?)
    } else {
        (left.resolve(facts)?, right.resolve(facts)?)
    };

    let (lhs, rhs) = match (lhs, rhs) {
        (Some(lhs), Some(rhs)) => (lhs, rhs),
        (lhs, rhs) => {
            let both_null = lhs.is_none() && rhs.is_none();
            return match op {
                CmpOp::Eq => Ok(both_null),
                CmpOp::Ne => Ok(!both_null),
                _ => Err(ExprError::TypeMismatch {
                    left: lhs.map_or_else(|| "null".into(), |value| value.as_text()),
                    right: rhs.map_or_else(|| "null".into(), |value| value.as_text()),
                }),
            };
        }
    };

    if let (Some(a), Some(b)) = (lhs.as_number(), rhs.as_number()) {
        return Ok(match op {
            CmpOp::Eq => a == b,
            CmpOp::Ne => a != b,
            CmpOp::Gt => a > b,
            CmpOp::Ge => a >= b,
            CmpOp::Lt => a < b,
            CmpOp::Le => a <= b,
        });
    }

    match op {
        CmpOp::Eq => Ok(lhs.as_text() == rhs.as_text()),
        CmpOp::Ne => Ok(lhs.as_text() != rhs.as_text()),
        _ => Err(ExprError::TypeMismatch {
            left: lhs.as_text(),
            right: rhs.as_text(),
        }),
    }
}
