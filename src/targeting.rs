//! Targeting-expression compilation.
//!
//! This module is the public entry point for the expression engine. It is
//! split into focused submodules under `src/targeting/` while keeping public
//! paths stable (`crate::targeting::compile`).
//!
//! ## How the parts work together
//!
//! Compiling an audience snapshot is a short pipeline:
//!
//! ```text
//! TargetingContext ──┬─ clause builders (clauses.rs)
//!                    │    one Option<String> per targeting dimension
//!                    │
//!                    ├─ ordered assembly (compiler.rs)
//!                    │    plain clauses + sticky-eligible clauses
//!                    │
//!                    ├─ sticky rewrite
//!                    │    (already-enrolled) || ((c1) && (c2) …)
//!                    │
//!                    v
//!          "(a) && (b) && …"  — or the literal `true`
//! ```
//!
//! Every multi-valued field is sorted before rendering, so recompiling an
//! unchanged context yields the identical string. A builder that has nothing
//! to say returns `None` and is skipped; empty parentheses never appear.
//!
//! ## Responsibilities by module
//!
//! - `clauses.rs`: one pure builder per targeting dimension (channel, version
//!   bounds, locale/country/language, pref conflicts, experiment
//!   relationships).
//! - `compiler.rs`: clause ordering, the sticky-enrollment rewrite, the
//!   published-targeting short-circuit, and the final join.

#[path = "targeting/clauses.rs"]
mod clauses;
#[path = "targeting/compiler.rs"]
mod compiler;


pub use compiler::{PUBLISHED_TARGETING_MISSING, TargetingExpression, compile};
