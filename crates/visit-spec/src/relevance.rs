use thiserror::Error;

use crate::expr::{Expr, ExprError};
use crate::facts::FactSet;

#[derive(Debug, Error)]
#[error("relevance expression `{expression}` failed: {source}")]
pub struct RelevanceError {
    pub expression: String,
    #[source]
    pub source: Box<dyn std::error::Error + Send + Sync>,
}

impl RelevanceError {
    pub fn new(
        expression: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self {
            expression: expression.into(),
            source: source.into(),
        }
    }
}

/// Rule engine that decides whether an expression holds for a fact set.
///
/// Implementations only read the facts.
pub trait RelevanceEngine: Send + Sync {
    fn evaluate(&self, facts: &FactSet, expression: &str) -> Result<bool, RelevanceError>;
}

/// Engine backed by the built-in [`Expr`] language.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExprEngine;

impl RelevanceEngine for ExprEngine {
    fn evaluate(&self, facts: &FactSet, expression: &str) -> Result<bool, RelevanceError> {
        Expr::parse(expression)
            .and_then(|expr| expr.evaluate(facts))
            .map_err(|err: ExprError| RelevanceError::new(expression, err))
    }
}

/// What an absent or blank expression resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WhenAbsent {
    Pass,
    Fail,
}

/// Resolve an optional expression, treating engine failures as `false`.
///
/// `context` names the field being checked in the log line.
pub fn check(
    engine: &dyn RelevanceEngine,
    facts: &FactSet,
    expression: Option<&str>,
    when_absent: WhenAbsent,
    context: &str,
) -> bool {
    let Some(expression) = expression.filter(|expression| !expression.trim().is_empty()) else {
        return when_absent == WhenAbsent::Pass;
    };

    match engine.evaluate(facts, expression) {
        Ok(value) => value,
        Err(err) => {
            tracing::warn!(field = context, "{err}; treating as false");
            false
        }
    }
}

/// Whether a field guarded by `expression` should be shown.
pub fn is_relevant(
    engine: &dyn RelevanceEngine,
    facts: &FactSet,
    expression: Option<&str>,
    context: &str,
) -> bool {
    check(engine, facts, expression, WhenAbsent::Pass, context)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Exploding;

    impl RelevanceEngine for Exploding {
        fn evaluate(&self, _: &FactSet, expression: &str) -> Result<bool, RelevanceError> {
            Err(RelevanceError::new(expression, "engine offline"))
        }
    }

    #[test]
    fn absent_or_blank_expression_is_relevant() {
        let facts = [("age", "3")].into_iter().collect::<FactSet>();
        assert!(is_relevant(&Exploding, &facts, None, "bp"));
        assert!(is_relevant(&Exploding, &FactSet::default(), Some("  "), "bp"));
        assert!(!check(&ExprEngine, &facts, None, WhenAbsent::Fail, "bp"));
    }

    #[test]
    fn failures_are_not_relevant() {
        let facts = FactSet::default();
        assert!(!is_relevant(&Exploding, &facts, Some("true"), "bp"));
        assert!(!is_relevant(&ExprEngine, &facts, Some("age > 18"), "bp"));
        assert!(!is_relevant(&ExprEngine, &facts, Some("age >"), "bp"));
    }

    #[test]
    fn expression_engine_reads_facts() {
        let facts = [("age", "21")].into_iter().collect::<FactSet>();
        assert!(is_relevant(&ExprEngine, &facts, Some("age > 18"), "bp"));
        assert_eq!(facts.get("age"), Some("21"));
    }
}
