//! Clause builders: one per targeting dimension.
//!
//! Each builder takes the relevant slice of the context and returns the clause
//! *without* its outer parentheses (the compiler adds those when joining), or
//! nothing when the dimension is unrestricted.

use crate::context::{Application, Channel, ExperimentBranchRef, TargetingContext};
use crate::error::TargetingError;
use crate::version::Version;

/// Which relationship list to render.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Relationship {
    Required,
    Excluded,
}

fn version_key(application: Application) -> &'static str {
    if application.is_desktop() { "version" } else { "app_version" }
}

/// Channel restriction. Mobile builds bake their channel in at compile time,
/// so only desktop ever emits a clause. A single channel renders an equality
/// check; several render a membership check over the sorted slug set.
pub(crate) fn channel_clause(ctx: &TargetingContext) -> Option<String> {
    if !ctx.application.is_desktop() {
        return None;
    }

    // BTreeSet iteration is already sorted and deduplicated.
    let slugs: Vec<&str> =
        ctx.channels.iter().filter(|c| **c != Channel::NoChannel).map(|c| c.slug()).collect();

    match slugs.as_slice() {
        [] => None,
        [only] => Some(format!(r#"browserSettings.update.channel == "{only}""#)),
        several => {
            let list = several.iter().map(|s| format!(r#""{s}""#)).collect::<Vec<_>>().join(", ");
            Some(format!("browserSettings.update.channel in [{list}]"))
        }
    }
}

/// Whether this application's clients can evaluate version attributes for the
/// configured bounds. Applications with a support floor only get version
/// clauses when the minimum bound is at or above that floor; older clients
/// would misevaluate the whole expression.
fn version_targeting_supported(ctx: &TargetingContext) -> Result<bool, TargetingError> {
    match ctx.application.version_targeting_floor() {
        None => Ok(true),
        Some(floor) => {
            let min = Version::parse(&ctx.firefox_min_version)?;
            Ok(min.is_some_and(|v| v >= floor))
        }
    }
}

pub(crate) fn min_version_clause(ctx: &TargetingContext) -> Result<Option<String>, TargetingError> {
    if !version_targeting_supported(ctx)? {
        return Ok(None);
    }
    let min = Version::parse(&ctx.firefox_min_version)?;
    Ok(min.map(|v| {
        format!("{}|versionCompare('{}') >= 0", version_key(ctx.application), v.min_bound_literal())
    }))
}

pub(crate) fn max_version_clause(ctx: &TargetingContext) -> Result<Option<String>, TargetingError> {
    if !version_targeting_supported(ctx)? {
        return Ok(None);
    }
    let max = Version::parse(&ctx.firefox_max_version)?;
    Ok(max.map(|v| {
        format!("{}|versionCompare('{}') <= 0", version_key(ctx.application), v.max_bound_literal())
    }))
}

/// Sorted, deduplicated, single-quoted membership list: `'de', 'en-US'`.
fn member_list(codes: &[String]) -> String {
    let mut items: Vec<&str> = codes.iter().map(String::as_str).collect();
    items.sort_unstable();
    items.dedup();
    items.iter().map(|c| format!("'{c}'")).collect::<Vec<_>>().join(", ")
}

pub(crate) fn locale_clause(ctx: &TargetingContext) -> Option<String> {
    if ctx.locales.is_empty() {
        return None;
    }
    Some(format!("locale in [{}]", member_list(&ctx.locales)))
}

pub(crate) fn country_clause(ctx: &TargetingContext) -> Option<String> {
    if ctx.countries.is_empty() {
        return None;
    }
    Some(format!("region in [{}]", member_list(&ctx.countries)))
}

pub(crate) fn language_clause(ctx: &TargetingContext) -> Option<String> {
    if ctx.languages.is_empty() {
        return None;
    }
    Some(format!("language in [{}]", member_list(&ctx.languages)))
}

/// One "preference not already user-set" check per legacy pref key the
/// participating features would write, sorted by key. Desktop only: the
/// `preferenceIsUserSet` transform does not exist elsewhere.
pub(crate) fn pref_conflict_clauses(ctx: &TargetingContext) -> Vec<String> {
    if !ctx.application.is_desktop() || !ctx.prevent_pref_conflicts {
        return Vec::new();
    }

    let mut keys: Vec<&str> = ctx.set_pref_keys.iter().map(String::as_str).collect();
    keys.sort_unstable();
    keys.dedup();
    keys.into_iter().map(|key| format!("!('{key}'|preferenceIsUserSet)")).collect()
}

/// Enrollment-relationship checks, one per entry, in caller-supplied order.
///
/// Entries without a branch use plain enrollment membership; entries pinned to
/// a branch use the enrollments map. Excluded entries are wrapped in an
/// `== false` negation, which stays well-formed for both shapes.
pub(crate) fn experiment_branch_clauses(ctx: &TargetingContext, relationship: Relationship) -> Vec<String> {
    let refs: &[ExperimentBranchRef] = match relationship {
        Relationship::Required => &ctx.required_experiments,
        Relationship::Excluded => &ctx.excluded_experiments,
    };
    let map_key = if ctx.application.is_desktop() { "enrollmentsMap" } else { "enrollments_map" };

    refs.iter()
        .map(|entry| {
            let membership = match &entry.branch_slug {
                None => format!("'{}' in enrollments", entry.slug),
                Some(branch) => format!("{map_key}['{}'] == '{}'", entry.slug, branch),
            };
            match relationship {
                Relationship::Required => membership,
                Relationship::Excluded => format!("({membership}) == false"),
            }
        })
        .collect()
}
