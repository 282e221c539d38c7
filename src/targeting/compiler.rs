//! Ordered assembly of clauses into the final expression string.

use std::fmt;

use serde::Serialize;

use crate::context::{PublishState, TargetingContext};
use crate::error::TargetingError;
use crate::targeting::clauses::{self, Relationship};

/// Placeholder returned for a live entity with no recorded published
/// targeting. A sentinel value rather than an error: operators should see
/// that something is wrong without the surrounding page falling over.
pub const PUBLISHED_TARGETING_MISSING: &str = "missing published targeting";

/// A compiled targeting expression in the client rule language.
///
/// Top-level clauses are individually parenthesized and joined with `&&`;
/// an unrestricted audience compiles to the literal `true`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct TargetingExpression(String);

impl TargetingExpression {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for TargetingExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for TargetingExpression {
    fn from(expr: String) -> TargetingExpression {
        TargetingExpression(expr)
    }
}

impl From<&str> for TargetingExpression {
    fn from(expr: &str) -> TargetingExpression {
        TargetingExpression(expr.to_string())
    }
}

/// Compile an audience snapshot into its targeting expression.
///
/// Clause order, fixed for output stability:
///
/// 1. channel
/// 2. max version bound
/// 3. pref-conflict checks
/// 4. excluded experiments, then required experiments (insertion order)
/// 5. the sticky-eligible block last: base predicate, min version bound,
///    locale, country, language
///
/// The max bound is not sticky-eligible: sticky enrollment protects users
/// against targeting *narrowing* after they enrolled, but an upper version
/// bound must keep applying to them (the experiment ends at that version).
///
/// With `is_sticky` set and at least one sticky-eligible clause present, the
/// block is replaced by `(already-enrolled) || ((c1) && (c2) …)` so an
/// enrolled user keeps matching even if the live audience narrows later.
pub fn compile(ctx: &TargetingContext) -> Result<TargetingExpression, TargetingError> {
    ctx.validate()?;

    // A live entity returns its frozen string verbatim; recompiling could
    // silently change who matches.
    if let PublishState::Live { published_targeting } = &ctx.publish_state {
        let expr = published_targeting.clone().unwrap_or_else(|| PUBLISHED_TARGETING_MISSING.to_string());
        return Ok(TargetingExpression(expr));
    }

    let mut expressions: Vec<String> = Vec::new();
    let mut sticky: Vec<String> = Vec::new();

    if let Some(clause) = clauses::channel_clause(ctx) {
        expressions.push(clause);
    }
    if let Some(clause) = clauses::max_version_clause(ctx)? {
        expressions.push(clause);
    }
    expressions.extend(clauses::pref_conflict_clauses(ctx));
    expressions.extend(clauses::experiment_branch_clauses(ctx, Relationship::Excluded));
    expressions.extend(clauses::experiment_branch_clauses(ctx, Relationship::Required));

    if let Some(clause) = ctx.targeting_config.base_clause() {
        sticky.push(clause.to_string());
    }
    if let Some(clause) = clauses::min_version_clause(ctx)? {
        sticky.push(clause);
    }
    if let Some(clause) = clauses::locale_clause(ctx) {
        sticky.push(clause);
    }
    if let Some(clause) = clauses::country_clause(ctx) {
        sticky.push(clause);
    }
    if let Some(clause) = clauses::language_clause(ctx) {
        sticky.push(clause);
    }

    if ctx.is_sticky && !sticky.is_empty() {
        expressions.push(sticky_expression(ctx, &sticky));
    } else {
        expressions.append(&mut sticky);
    }

    if expressions.is_empty() {
        return Ok(TargetingExpression("true".to_string()));
    }
    Ok(TargetingExpression(join_clauses(&expressions)))
}

/// `(already-enrolled) || ((c1) && (c2) …)`.
///
/// The enrolled predicate differs by platform and by rollout/experiment kind;
/// each client exposes its own enrollment attribute.
fn sticky_expression(ctx: &TargetingContext, sticky: &[String]) -> String {
    let enrolled = match (ctx.application.is_desktop(), ctx.is_rollout) {
        (true, true) => "experiment.slug in activeRollouts",
        (true, false) => "experiment.slug in activeExperiments",
        (false, true) => "is_already_enrolled",
        (false, false) => "experiment.slug in enrolled_experiments",
    };
    format!("({enrolled}) || ({})", join_clauses(sticky))
}

fn join_clauses(clauses: &[String]) -> String {
    clauses.iter().map(|c| format!("({c})")).collect::<Vec<_>>().join(" && ")
}
