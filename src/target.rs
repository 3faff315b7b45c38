use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::hash::Hash;

/// Identity of a tree node a decoration can be attached to.
///
/// Anything cheap to copy and hashable works: arena ids, interned paths,
/// plain integers in tests.
pub trait Target: Copy + Eq + Hash + Debug + 'static {}

impl<T: Copy + Eq + Hash + Debug + 'static> Target for T {}

/// Scope of an attachment or negation relative to its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetMatchMode {
    /// Only the target itself.
    #[serde(rename = "self")]
    SelfOnly,
    /// Everything below the target, but not the target.
    Children,
    SelfAndChildren,
}

impl TargetMatchMode {
    pub fn covers_self(self) -> bool {
        matches!(self, Self::SelfOnly | Self::SelfAndChildren)
    }

    pub fn covers_children(self) -> bool {
        matches!(self, Self::Children | Self::SelfAndChildren)
    }
}

/// Which half of a node's rendering a composite aggregates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    /// Classnames shown on the node itself.
    Applicable,
    /// Classnames handed down to the node's children.
    Inheritable,
}

impl Axis {
    /// Whether a relationship recorded with `mode` reaches this axis.
    pub fn matches(self, mode: Option<TargetMatchMode>) -> bool {
        match (self, mode) {
            (_, None) => false,
            (Axis::Applicable, Some(mode)) => mode.covers_self(),
            (Axis::Inheritable, Some(mode)) => mode.covers_children(),
        }
    }
}
