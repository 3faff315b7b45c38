//! Live, inheritable classname decorations for large trees.
//!
//! A [`Decoration`] is a bundle of classnames attached to tree nodes with a
//! [`TargetMatchMode`] scope, and optionally negated on sub-branches. The
//! [`DecorationsManager`] mirrors the tree into pairs of copy-on-write
//! composites and keeps every node's [`ClasslistComposite`] up to date as
//! decorations change, touching only the composites a change can affect.

pub mod classlist;
mod composite;
pub mod config;
pub mod crawler;
pub mod decoration;
pub mod error;
pub mod manager;
pub mod render;
pub mod target;
pub mod tree;

pub use classlist::{ClasslistComposite, Subscription};
pub use decoration::{Decoration, DecorationEvent, DecorationId};
pub use error::DecorationError;
pub use manager::DecorationsManager;
pub use target::{Axis, Target, TargetMatchMode};
