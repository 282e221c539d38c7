use thiserror::Error;

/// Errors surfaced by targeting compilation.
///
/// Both variants are expected to be caught by upstream validation before a
/// context ever reaches the compiler; the compiler re-checking them is a
/// safety net. The "live entity without a recorded published targeting"
/// condition is deliberately *not* an error: see
/// [`PUBLISHED_TARGETING_MISSING`](crate::PUBLISHED_TARGETING_MISSING).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TargetingError {
    /// A version string does not match the dotted-numeric grammar.
    #[error("malformed version string {input:?}")]
    MalformedVersion { input: String },

    /// An experiment lists itself as a required or excluded experiment. The
    /// resulting clause would be client-meaningless, so compilation refuses.
    #[error("experiment {slug:?} references itself in its audience")]
    SelfReference { slug: String },
}
