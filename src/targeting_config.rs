//! Named "advanced targeting" templates.
//!
//! Each template contributes an opaque base predicate written in the client
//! rule language (the compiler treats it as a black box) plus the minimum
//! client version whose context defines the attributes it reads. The original
//! resolves these through a runtime-registered lookup keyed by slug; here it
//! is a closed enum resolved at compile time.

use crate::version::Version;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TargetingConfig {
    /// No base predicate at all.
    #[default]
    NoTargeting,
    MacOnly,
    WindowsOnly,
    FirstRunOnly,
    NoEnterpriseUsers,
    MobileNewUsers,
    MobileRecentlyUpdatedUsers,
}

impl TargetingConfig {
    pub fn slug(self) -> &'static str {
        match self {
            TargetingConfig::NoTargeting => "",
            TargetingConfig::MacOnly => "mac_only",
            TargetingConfig::WindowsOnly => "windows_only",
            TargetingConfig::FirstRunOnly => "first_run",
            TargetingConfig::NoEnterpriseUsers => "no_enterprise_users",
            TargetingConfig::MobileNewUsers => "mobile_new_users",
            TargetingConfig::MobileRecentlyUpdatedUsers => "mobile_recently_updated_users",
        }
    }

    pub fn from_slug(slug: &str) -> Option<TargetingConfig> {
        match slug {
            "" => Some(TargetingConfig::NoTargeting),
            "mac_only" => Some(TargetingConfig::MacOnly),
            "windows_only" => Some(TargetingConfig::WindowsOnly),
            "first_run" => Some(TargetingConfig::FirstRunOnly),
            "no_enterprise_users" => Some(TargetingConfig::NoEnterpriseUsers),
            "mobile_new_users" => Some(TargetingConfig::MobileNewUsers),
            "mobile_recently_updated_users" => Some(TargetingConfig::MobileRecentlyUpdatedUsers),
            _ => None,
        }
    }

    /// The base predicate this template contributes, already valid in the
    /// client rule language. `None` means the template contributes nothing.
    pub fn base_clause(self) -> Option<&'static str> {
        match self {
            TargetingConfig::NoTargeting => None,
            TargetingConfig::MacOnly => Some("os.isMac"),
            TargetingConfig::WindowsOnly => Some("os.isWindows"),
            TargetingConfig::FirstRunOnly => Some("isFirstStartup"),
            TargetingConfig::NoEnterpriseUsers => Some("!hasActiveEnterprisePolicies"),
            TargetingConfig::MobileNewUsers => Some("days_since_install < 7"),
            TargetingConfig::MobileRecentlyUpdatedUsers => {
                Some("days_since_update < 7 && days_since_install >= 7")
            }
        }
    }

    /// Minimum client version whose context defines every attribute the base
    /// predicate reads. Enforced by upstream validation, carried here as
    /// bookkeeping.
    pub fn version_floor(self) -> Option<Version> {
        match self {
            TargetingConfig::MobileNewUsers | TargetingConfig::MobileRecentlyUpdatedUsers => {
                Some(Version::open(97))
            }
            _ => None,
        }
    }
}
