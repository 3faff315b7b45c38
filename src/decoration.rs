use std::collections::HashMap;
use std::fmt;

use crate::target::{Target, TargetMatchMode};

/// Handle of a decoration registered with a [`DecorationsManager`](crate::DecorationsManager).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DecorationId(pub(crate) u32);

impl fmt::Display for DecorationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "decoration#{}", self.0)
    }
}

/// What a single effective mutation of a [`Decoration`] changed.
///
/// Mutators return `None` when the call had no effect, so only real changes
/// ever reach the composite graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecorationEvent<T> {
    TargetAdded {
        target: T,
        mode: TargetMatchMode,
        /// Mode the target carried before, if this call replaced one.
        previous: Option<TargetMatchMode>,
    },
    TargetRemoved {
        target: T,
        mode: TargetMatchMode,
    },
    NegationAdded {
        target: T,
        mode: TargetMatchMode,
        previous: Option<TargetMatchMode>,
    },
    NegationRemoved {
        target: T,
        mode: TargetMatchMode,
    },
    ClassnameAdded(String),
    ClassnameRemoved(String),
    Enabled,
    Disabled,
}

/// A named bundle of classnames plus the rules saying where it applies.
#[derive(Debug, Clone)]
pub struct Decoration<T> {
    name: String,
    classnames: Vec<String>,
    applied_targets: HashMap<T, TargetMatchMode>,
    negated_targets: HashMap<T, TargetMatchMode>,
    enabled: bool,
}

impl<T: Target> Decoration<T> {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            classnames: Vec::new(),
            applied_targets: HashMap::new(),
            negated_targets: HashMap::new(),
            enabled: true,
        }
    }

    /// Builder-style variant of [`Decoration::add_classname`].
    pub fn with_classnames<I, S>(mut self, classnames: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for classname in classnames {
            self.add_classname(classname);
        }
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn classnames(&self) -> &[String] {
        &self.classnames
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn applied_targets(&self) -> &HashMap<T, TargetMatchMode> {
        &self.applied_targets
    }

    pub fn negated_targets(&self) -> &HashMap<T, TargetMatchMode> {
        &self.negated_targets
    }

    pub fn applied_mode(&self, target: &T) -> Option<TargetMatchMode> {
        self.applied_targets.get(target).copied()
    }

    pub fn negated_mode(&self, target: &T) -> Option<TargetMatchMode> {
        self.negated_targets.get(target).copied()
    }

    pub fn add_target(&mut self, target: T, mode: TargetMatchMode) -> Option<DecorationEvent<T>> {
        let previous = self.applied_targets.insert(target, mode);
        if previous == Some(mode) {
            return None;
        }
        Some(DecorationEvent::TargetAdded { target, mode, previous })
    }

    pub fn remove_target(&mut self, target: T) -> Option<DecorationEvent<T>> {
        let mode = self.applied_targets.remove(&target)?;
        Some(DecorationEvent::TargetRemoved { target, mode })
    }

    pub fn add_negated_target(&mut self, target: T, mode: TargetMatchMode) -> Option<DecorationEvent<T>> {
        let previous = self.negated_targets.insert(target, mode);
        if previous == Some(mode) {
            return None;
        }
        Some(DecorationEvent::NegationAdded { target, mode, previous })
    }

    pub fn remove_negated_target(&mut self, target: T) -> Option<DecorationEvent<T>> {
        let mode = self.negated_targets.remove(&target)?;
        Some(DecorationEvent::NegationRemoved { target, mode })
    }

    pub fn add_classname<S: Into<String>>(&mut self, classname: S) -> Option<DecorationEvent<T>> {
        let classname = classname.into();
        if self.classnames.contains(&classname) {
            return None;
        }
        self.classnames.push(classname.clone());
        Some(DecorationEvent::ClassnameAdded(classname))
    }

    pub fn remove_classname(&mut self, classname: &str) -> Option<DecorationEvent<T>> {
        let idx = self.classnames.iter().position(|c| c == classname)?;
        let removed = self.classnames.remove(idx);
        Some(DecorationEvent::ClassnameRemoved(removed))
    }

    pub fn enable(&mut self) -> Option<DecorationEvent<T>> {
        if self.enabled {
            return None;
        }
        self.enabled = true;
        Some(DecorationEvent::Enabled)
    }

    pub fn disable(&mut self) -> Option<DecorationEvent<T>> {
        if !self.enabled {
            return None;
        }
        self.enabled = false;
        Some(DecorationEvent::Disabled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_add_target_is_idempotent() {
        let mut deco = Decoration::new("a");
        assert_eq!(
            deco.add_target(1u32, TargetMatchMode::SelfOnly),
            Some(DecorationEvent::TargetAdded {
                target: 1,
                mode: TargetMatchMode::SelfOnly,
                previous: None,
            })
        );
        assert_eq!(deco.add_target(1, TargetMatchMode::SelfOnly), None);
        assert_eq!(deco.applied_targets().len(), 1);
    }

    #[test]
    fn test_add_target_replaces_mode() {
        let mut deco = Decoration::new("a");
        deco.add_target(1u32, TargetMatchMode::SelfOnly);
        assert_eq!(
            deco.add_target(1, TargetMatchMode::Children),
            Some(DecorationEvent::TargetAdded {
                target: 1,
                mode: TargetMatchMode::Children,
                previous: Some(TargetMatchMode::SelfOnly),
            })
        );
        assert_eq!(deco.applied_mode(&1), Some(TargetMatchMode::Children));
    }

    #[test]
    fn test_remove_absent_is_noop() {
        let mut deco: Decoration<u32> = Decoration::new("a");
        assert_eq!(deco.remove_target(7), None);
        assert_eq!(deco.remove_negated_target(7), None);
        assert_eq!(deco.remove_classname("nope"), None);
    }

    #[test]
    fn test_classnames_stay_unique_and_ordered() {
        let mut deco: Decoration<u32> = Decoration::new("a").with_classnames(["x", "y", "x"]);
        assert_eq!(deco.classnames(), ["x", "y"]);

        assert_eq!(deco.remove_classname("x"), Some(DecorationEvent::ClassnameRemoved("x".into())));
        assert_eq!(deco.add_classname("z"), Some(DecorationEvent::ClassnameAdded("z".into())));
        assert_eq!(deco.classnames(), ["y", "z"]);
    }

    #[test]
    fn test_enable_disable_report_only_transitions() {
        let mut deco: Decoration<u32> = Decoration::new("a");
        assert_eq!(deco.enable(), None);
        assert_eq!(deco.disable(), Some(DecorationEvent::Disabled));
        assert_eq!(deco.disable(), None);
        assert!(!deco.is_enabled());
        assert_eq!(deco.enable(), Some(DecorationEvent::Enabled));
    }
}
