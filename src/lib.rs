//! Audience targeting and bucket allocation for Nimbus-style feature
//! experiments.
//!
//! Two engines, both pure over values supplied by the caller:
//!
//! ```text
//! TargetingContext ── targeting::compile ──▶ TargetingExpression
//!   (audience snapshot)                       (JEXL boolean rule string)
//!
//! (app, channel, targeting, kind) ── bucket_namespace ──▶ Namespace
//!                                                            │
//!                           BucketStore::allocate ◀──────────┘
//!                                   │
//!                                   ▶ BucketRange (recipe bucketConfig)
//! ```
//!
//! The compiler turns an experiment's audience attributes into the boolean
//! expression its clients evaluate; the allocator assigns a reproducible
//! bucket range inside a shared randomization namespace so population
//! percentages never overlap between experiments that must stay statistically
//! independent.
//!
//! Both outputs are derived artifacts: compiling the same context twice gives
//! the identical string, and allocation replaces the requester's previous
//! range rather than leaking it. Neither engine performs I/O.

extern crate self as nimbus_audience;

#[macro_use]
mod macros;

mod buckets;
mod context;
mod error;
mod namespace;
mod targeting;
mod targeting_config;
mod version;

pub use buckets::{BucketRange, BucketStore, DEFAULT_BUCKET_TOTAL, IsolationGroup, bucket_count};
pub use context::{Application, Channel, ExperimentBranchRef, PublishState, TargetingContext};
pub use error::TargetingError;
pub use namespace::{Namespace, RandomizationUnit, bucket_namespace, randomization_unit};
pub use targeting::{PUBLISHED_TARGETING_MISSING, TargetingExpression, compile};
pub use targeting_config::TargetingConfig;
pub use version::{Version, VersionTail};
