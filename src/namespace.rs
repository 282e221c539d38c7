//! Deterministic randomization-namespace keys.
//!
//! The namespace scopes bucket allocation: two experiments with identical
//! discriminating inputs collide into the same key on purpose, which is what
//! prevents them from double-sampling the same population. Isolation is
//! deliberately coarse — per application, channel, targeting template, and
//! rollout/experiment kind — not per individual feature; the literal token
//! `feature` stands in for the feature set.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::context::{Application, Channel};

/// The client-side identifier bucketing hashes over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RandomizationUnit {
    NormandyId,
    NimbusId,
    UserId,
    GroupId,
}

impl RandomizationUnit {
    pub fn as_str(self) -> &'static str {
        match self {
            RandomizationUnit::NormandyId => "normandy_id",
            RandomizationUnit::NimbusId => "nimbus_id",
            RandomizationUnit::UserId => "user_id",
            RandomizationUnit::GroupId => "group_id",
        }
    }
}

impl fmt::Display for RandomizationUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The string key that scopes one isolation-group family.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Namespace(String);

impl Namespace {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Namespace {
    fn from(key: &str) -> Namespace {
        Namespace(key.to_string())
    }
}

/// Which identifier a given application buckets on.
///
/// Desktop buckets at the group level by default, overridable per experiment
/// via `use_group_id`; every other application uses the unit its static
/// configuration declares.
pub fn randomization_unit(application: Application, use_group_id: bool) -> RandomizationUnit {
    if application.is_desktop() {
        if use_group_id { RandomizationUnit::GroupId } else { RandomizationUnit::NormandyId }
    } else {
        RandomizationUnit::NimbusId
    }
}

/// Compute the namespace key for one experiment or rollout.
///
/// Key shape: `{unit}-{app}-feature-{channel}[-{targeting}][-rollout]-group_id`.
/// `NoChannel` and an empty targeting slug contribute nothing. The trailing
/// `group_id` token is fixed: already-deployed recipes carry it, so the key
/// format cannot drop it without re-bucketing every live experiment.
pub fn bucket_namespace(
    application: Application,
    channel: Channel,
    targeting_slug: &str,
    is_rollout: bool,
    use_group_id: bool,
) -> Namespace {
    let unit = randomization_unit(application, use_group_id);

    let mut parts: Vec<&str> = vec![unit.as_str(), application.slug(), "feature"];
    if channel != Channel::NoChannel {
        parts.push(channel.slug());
    }
    if !targeting_slug.is_empty() {
        parts.push(targeting_slug);
    }
    if is_rollout {
        parts.push("rollout");
    }
    parts.push("group_id");

    Namespace(parts.join("-"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_inputs_produce_the_identical_key() {
        let a = bucket_namespace(Application::Desktop, Channel::Release, "mac_only", false, true);
        let b = bucket_namespace(Application::Desktop, Channel::Release, "mac_only", false, true);
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "group_id-firefox-desktop-feature-release-mac_only-group_id");
    }

    #[test]
    fn rollouts_and_experiments_never_share_a_namespace() {
        let experiment = bucket_namespace(Application::Desktop, Channel::Release, "", false, true);
        let rollout = bucket_namespace(Application::Desktop, Channel::Release, "", true, true);
        assert_ne!(experiment, rollout);
        assert_eq!(rollout.as_str(), "group_id-firefox-desktop-feature-release-rollout-group_id");
    }

    #[test]
    fn no_channel_and_empty_targeting_are_omitted() {
        let ns = bucket_namespace(Application::Desktop, Channel::NoChannel, "", false, false);
        assert_eq!(ns.as_str(), "normandy_id-firefox-desktop-feature-group_id");
    }

    #[test]
    fn mobile_applications_bucket_on_the_nimbus_id() {
        assert_eq!(randomization_unit(Application::Fenix, false), RandomizationUnit::NimbusId);
        // The per-experiment override is a desktop concept only.
        assert_eq!(randomization_unit(Application::Fenix, true), RandomizationUnit::NimbusId);

        let ns = bucket_namespace(Application::Fenix, Channel::Nightly, "mobile_new_users", false, false);
        assert_eq!(ns.as_str(), "nimbus_id-fenix-feature-nightly-mobile_new_users-group_id");
    }

    #[test]
    fn desktop_unit_follows_the_group_id_override() {
        assert_eq!(randomization_unit(Application::Desktop, true), RandomizationUnit::GroupId);
        assert_eq!(randomization_unit(Application::Desktop, false), RandomizationUnit::NormandyId);
    }
}
