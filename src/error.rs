use crate::Version;

/// Caller-recoverable failures of the persistent tree's public API.
///
/// Conditions that indicate a bug in this crate rather than caller misuse
/// (an invariant breach, a write to a past version) are never surfaced here:
/// they are `debug_assert!`s at the point they would occur, since they can
/// never be triggered by driving the public API alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TreeError {
    #[error("version {requested} is out of range (current version is {current})")]
    VersionOutOfRange { requested: Version, current: Version },

    #[error("version budget exhausted: at most {max} versions are supported")]
    VersionBudgetExhausted { max: Version },
}
