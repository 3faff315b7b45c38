use thiserror::Error;

/// Structural misuse of a [`DecorationsManager`](crate::DecorationsManager).
///
/// Unknown decorations and absent relationships are not errors; they are
/// silently ignored.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecorationError {
    #[error("target {0} is not registered with the decorations manager")]
    UnknownTarget(String),

    #[error("cannot move {target} below {new_parent}, which is inside its own subtree")]
    ReparentCycle { target: String, new_parent: String },
}
