//! The immutable audience snapshot handed to the targeting compiler.
//!
//! A [`TargetingContext`] is built fresh from the persisted experiment entity
//! on every compilation. It has no identity of its own and is never mutated:
//! the compiler is a pure function over it, so recompiling an unchanged
//! snapshot is byte-for-byte deterministic.

use std::collections::BTreeSet;

use crate::error::TargetingError;
use crate::targeting_config::TargetingConfig;
use crate::version::Version;

/// The client application an experiment ships to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Application {
    Desktop,
    Fenix,
    Ios,
    FocusAndroid,
    KlarAndroid,
    FocusIos,
    KlarIos,
}

impl Application {
    pub fn slug(self) -> &'static str {
        match self {
            Application::Desktop => "firefox-desktop",
            Application::Fenix => "fenix",
            Application::Ios => "ios",
            Application::FocusAndroid => "focus-android",
            Application::KlarAndroid => "klar-android",
            Application::FocusIos => "focus-ios",
            Application::KlarIos => "klar-ios",
        }
    }

    pub fn from_slug(slug: &str) -> Option<Application> {
        match slug {
            "firefox-desktop" => Some(Application::Desktop),
            "fenix" => Some(Application::Fenix),
            "ios" => Some(Application::Ios),
            "focus-android" => Some(Application::FocusAndroid),
            "klar-android" => Some(Application::KlarAndroid),
            "focus-ios" => Some(Application::FocusIos),
            "klar-ios" => Some(Application::KlarIos),
            _ => None,
        }
    }

    pub fn is_desktop(self) -> bool {
        self == Application::Desktop
    }

    /// First client version whose rule evaluator understands the version
    /// attribute. Mobile clients below this floor choke on version targeting,
    /// so both bounds are omitted for them; desktop has always supported it.
    pub(crate) fn version_targeting_floor(self) -> Option<Version> {
        match self {
            Application::Desktop => None,
            Application::Fenix | Application::FocusAndroid | Application::KlarAndroid => {
                Some(Version::open(98))
            }
            Application::Ios | Application::FocusIos | Application::KlarIos => Some(Version::open(97)),
        }
    }
}

/// Release channel restriction. `NoChannel` means "no restriction" and never
/// renders a clause, nor a namespace key part.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Channel {
    NoChannel,
    Nightly,
    Beta,
    Release,
    Esr,
    Testflight,
    Aurora,
}

impl Channel {
    pub fn slug(self) -> &'static str {
        match self {
            Channel::NoChannel => "",
            Channel::Nightly => "nightly",
            Channel::Beta => "beta",
            Channel::Release => "release",
            Channel::Esr => "esr",
            Channel::Testflight => "testflight",
            Channel::Aurora => "aurora",
        }
    }

    pub fn from_slug(slug: &str) -> Option<Channel> {
        match slug {
            "" => Some(Channel::NoChannel),
            "nightly" => Some(Channel::Nightly),
            "beta" => Some(Channel::Beta),
            "release" => Some(Channel::Release),
            "esr" => Some(Channel::Esr),
            "testflight" => Some(Channel::Testflight),
            "aurora" => Some(Channel::Aurora),
            _ => None,
        }
    }
}

/// A required/excluded experiment relationship: the other experiment's slug,
/// optionally narrowed to one of its branches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExperimentBranchRef {
    pub slug: String,
    pub branch_slug: Option<String>,
}

impl ExperimentBranchRef {
    pub fn any_branch(slug: impl Into<String>) -> ExperimentBranchRef {
        ExperimentBranchRef { slug: slug.into(), branch_slug: None }
    }

    pub fn branch(slug: impl Into<String>, branch_slug: impl Into<String>) -> ExperimentBranchRef {
        ExperimentBranchRef { slug: slug.into(), branch_slug: Some(branch_slug.into()) }
    }
}

/// Publish lifecycle of the owning entity, as far as the compiler cares.
///
/// Once live, targeting must not silently drift for already-enrolled users:
/// the recorded published string is returned verbatim instead of recompiling.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PublishState {
    #[default]
    Draft,
    Live {
        /// The targeting string frozen at publish time, if it was recorded.
        published_targeting: Option<String>,
    },
}

/// Read-only audience snapshot for one compilation.
///
/// Version bounds are carried as raw strings (`""` = NO_VERSION) and parsed
/// inside the compiler, so a malformed version that slipped past upstream
/// validation still surfaces as [`TargetingError::MalformedVersion`] rather
/// than a silently wrong expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetingContext {
    /// The owning experiment/rollout slug. Only used for the self-reference
    /// guard; the sticky predicates reference the client-side `experiment.slug`
    /// attribute, not this value.
    pub slug: String,
    pub application: Application,
    pub channels: BTreeSet<Channel>,
    pub firefox_min_version: String,
    pub firefox_max_version: String,
    pub locales: Vec<String>,
    pub countries: Vec<String>,
    pub languages: Vec<String>,
    pub targeting_config: TargetingConfig,
    pub is_sticky: bool,
    pub is_rollout: bool,
    pub required_experiments: Vec<ExperimentBranchRef>,
    pub excluded_experiments: Vec<ExperimentBranchRef>,
    pub prevent_pref_conflicts: bool,
    /// Legacy preference keys the participating features would set, resolved
    /// by the caller. Only consulted when `prevent_pref_conflicts` is on.
    pub set_pref_keys: Vec<String>,
    pub publish_state: PublishState,
}

impl TargetingContext {
    /// A draft context with no audience restrictions.
    pub fn new(slug: impl Into<String>, application: Application) -> TargetingContext {
        TargetingContext {
            slug: slug.into(),
            application,
            channels: BTreeSet::new(),
            firefox_min_version: String::new(),
            firefox_max_version: String::new(),
            locales: Vec::new(),
            countries: Vec::new(),
            languages: Vec::new(),
            targeting_config: TargetingConfig::NoTargeting,
            is_sticky: false,
            is_rollout: false,
            required_experiments: Vec::new(),
            excluded_experiments: Vec::new(),
            prevent_pref_conflicts: false,
            set_pref_keys: Vec::new(),
            publish_state: PublishState::Draft,
        }
    }

    /// Reject a context whose experiment lists itself as required or excluded.
    ///
    /// Upstream validation is expected to have caught this already; the
    /// compiler calls it again so the invariant holds on every input.
    pub fn validate(&self) -> Result<(), TargetingError> {
        let refers_to_self = self
            .required_experiments
            .iter()
            .chain(self.excluded_experiments.iter())
            .any(|r| r.slug == self.slug);

        if refers_to_self {
            return Err(TargetingError::SelfReference { slug: self.slug.clone() });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_rejects_self_reference() {
        let mut ctx = TargetingContext::new("own-slug", Application::Desktop);
        ctx.required_experiments.push(ExperimentBranchRef::any_branch("other"));
        assert_eq!(ctx.validate(), Ok(()));

        ctx.excluded_experiments.push(ExperimentBranchRef::branch("own-slug", "control"));
        assert_eq!(ctx.validate(), Err(TargetingError::SelfReference { slug: "own-slug".into() }));
    }

    #[test]
    fn application_slugs_round_trip() {
        let apps = [
            Application::Desktop,
            Application::Fenix,
            Application::Ios,
            Application::FocusAndroid,
            Application::KlarAndroid,
            Application::FocusIos,
            Application::KlarIos,
        ];
        for app in apps {
            assert_eq!(Application::from_slug(app.slug()), Some(app));
        }
        assert_eq!(Application::from_slug("thunderbird"), None);
    }

    #[test]
    fn only_mobile_applications_have_a_version_floor() {
        assert_eq!(Application::Desktop.version_targeting_floor(), None);
        assert_eq!(Application::Fenix.version_targeting_floor(), Some(Version::open(98)));
        assert_eq!(Application::FocusIos.version_targeting_floor(), Some(Version::open(97)));
    }
}
