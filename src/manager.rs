use std::collections::HashMap;

use log::{debug, trace};

use crate::classlist::ClasslistComposite;
use crate::composite::{CompositeGraph, CompositeId, Decorations, Relation};
use crate::decoration::{Decoration, DecorationEvent, DecorationId};
use crate::error::DecorationError;
use crate::target::{Axis, Target, TargetMatchMode};

#[derive(Debug, Clone, Copy)]
struct CompositePair {
    applicable: CompositeId,
    inheritable: CompositeId,
}

impl CompositePair {
    fn get(self, axis: Axis) -> CompositeId {
        match axis {
            Axis::Applicable => self.applicable,
            Axis::Inheritable => self.inheritable,
        }
    }
}

/// Owns every registered decoration and the composite pair of every known
/// tree node, and routes decoration changes to the composites they affect.
///
/// The tree itself lives elsewhere; callers mirror its structure through
/// [`create_composite_pair`](Self::create_composite_pair),
/// [`destroy_composite_pair`](Self::destroy_composite_pair) and
/// [`reparent`](Self::reparent).
#[derive(Debug)]
pub struct DecorationsManager<T> {
    decorations: Decorations<T>,
    next_id: u32,
    composites: HashMap<T, CompositePair>,
    graph: CompositeGraph<T>,
}

impl<T: Target> Default for DecorationsManager<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Target> DecorationsManager<T> {
    pub fn new() -> Self {
        Self {
            decorations: HashMap::new(),
            next_id: 0,
            composites: HashMap::new(),
            graph: CompositeGraph::new(),
        }
    }

    /// Registers `target` as a child of `parent` (or as a root when `None`).
    ///
    /// Relationships registered decorations already hold for `target` take
    /// effect immediately. Creating an already known target does nothing.
    pub fn create_composite_pair(&mut self, target: T, parent: Option<T>) -> Result<(), DecorationError> {
        if self.composites.contains_key(&target) {
            trace!("composite pair for {target:?} already exists");
            return Ok(());
        }
        let pair = match parent {
            None => CompositePair {
                applicable: self.graph.insert_root(target, Axis::Applicable),
                inheritable: self.graph.insert_root(target, Axis::Inheritable),
            },
            Some(parent) => {
                let link = self.pair(&parent)?.inheritable;
                CompositePair {
                    applicable: self.graph.insert_child(target, Axis::Applicable, link),
                    inheritable: self.graph.insert_child(target, Axis::Inheritable, link),
                }
            }
        };
        self.composites.insert(target, pair);
        debug!("created composite pair for {target:?} (parent {parent:?})");

        let mut pending: Vec<(DecorationId, bool, bool)> = self
            .decorations
            .iter()
            .map(|(id, deco)| {
                (
                    *id,
                    deco.applied_targets().contains_key(&target),
                    deco.negated_targets().contains_key(&target),
                )
            })
            .filter(|(_, applied, negated)| *applied || *negated)
            .collect();
        pending.sort_unstable_by_key(|(id, _, _)| *id);
        for (id, applied, negated) in pending {
            if negated {
                self.graph.negate(pair.applicable, id, &self.decorations);
                self.graph.negate(pair.inheritable, id, &self.decorations);
            }
            if applied {
                self.graph.add(pair.applicable, id, &self.decorations);
                self.graph.add(pair.inheritable, id, &self.decorations);
            }
        }
        Ok(())
    }

    /// Forgets `target` and everything registered below it.
    pub fn destroy_composite_pair(&mut self, target: T) {
        let Some(pair) = self.composites.get(&target).copied() else {
            return;
        };
        let mut removed = self.graph.purge(pair.applicable);
        removed.extend(self.graph.purge(pair.inheritable));
        for gone in &removed {
            self.composites.remove(gone);
        }
        debug!("destroyed composite pairs of {target:?} ({} composites)", removed.len());
    }

    /// Moves `target` below `new_parent`. Unknown targets are ignored.
    pub fn reparent(&mut self, target: T, new_parent: T) -> Result<(), DecorationError> {
        let Some(pair) = self.composites.get(&target).copied() else {
            return Ok(());
        };
        let link = self.pair(&new_parent)?.inheritable;
        if self.graph.is_within(link, pair.inheritable) {
            return Err(DecorationError::ReparentCycle {
                target: format!("{target:?}"),
                new_parent: format!("{new_parent:?}"),
            });
        }
        if self.graph.parent(pair.inheritable) == Some(link) {
            return Ok(());
        }
        debug!("reparenting {target:?} below {new_parent:?}");
        self.graph.change_parent(pair.applicable, link, &self.decorations);
        self.graph.change_parent(pair.inheritable, link, &self.decorations);
        Ok(())
    }

    pub fn contains_target(&self, target: &T) -> bool {
        self.composites.contains_key(target)
    }

    pub fn classlist(&self, target: &T, axis: Axis) -> Option<&ClasslistComposite> {
        let pair = self.composites.get(target)?;
        Some(self.graph.classlist(pair.get(axis)))
    }

    /// The classnames a row renderer shows for `target`.
    pub fn applicable_classlist(&self, target: &T) -> Option<&ClasslistComposite> {
        self.classlist(target, Axis::Applicable)
    }

    pub fn is_self_owned(&self, target: &T, axis: Axis) -> Option<bool> {
        let pair = self.composites.get(target)?;
        Some(self.graph.is_self_owned(pair.get(axis)))
    }

    /// Whether `decoration` is currently admitted on `target`'s `axis`,
    /// regardless of it being enabled.
    pub fn renders(&self, target: &T, axis: Axis, decoration: DecorationId) -> bool {
        self.composites
            .get(target)
            .is_some_and(|pair| self.graph.renders(pair.get(axis), decoration))
    }

    /// Registers a decoration and applies every relationship it already holds.
    pub fn add_decoration(&mut self, decoration: Decoration<T>) -> DecorationId {
        let id = DecorationId(self.next_id);
        self.next_id += 1;

        let mut negated: Vec<T> = decoration.negated_targets().keys().copied().collect();
        let mut applied: Vec<T> = decoration.applied_targets().keys().copied().collect();
        debug!(
            "registering {id} '{}' with {} targets and {} negations",
            decoration.name(),
            applied.len(),
            negated.len()
        );
        self.decorations.insert(id, decoration);

        // negations first so negated composites never render the decoration in between
        negated.retain(|t| self.composites.contains_key(t));
        applied.retain(|t| self.composites.contains_key(t));
        for target in negated {
            let pair = self.composites[&target];
            self.graph.negate(pair.applicable, id, &self.decorations);
            self.graph.negate(pair.inheritable, id, &self.decorations);
        }
        for target in applied {
            let pair = self.composites[&target];
            self.graph.add(pair.applicable, id, &self.decorations);
            self.graph.add(pair.inheritable, id, &self.decorations);
        }
        id
    }

    /// Detaches a decoration from every target and hands it back with its
    /// relationships cleared.
    pub fn remove_decoration(&mut self, id: DecorationId) -> Option<Decoration<T>> {
        let deco = self.decorations.get(&id)?;
        let applied: Vec<T> = deco.applied_targets().keys().copied().collect();
        let negated: Vec<T> = deco.negated_targets().keys().copied().collect();

        for target in applied {
            self.remove_target(id, target);
        }
        for target in negated {
            self.remove_negated_target(id, target);
        }
        debug_assert!(
            self.graph.rendering(id).is_empty(),
            "{id} is still rendered after losing all targets"
        );
        debug!("removed {id}");
        self.decorations.remove(&id)
    }

    pub fn decoration(&self, id: DecorationId) -> Option<&Decoration<T>> {
        self.decorations.get(&id)
    }

    /// Registered decorations in registration order.
    pub fn decorations(&self) -> Vec<(DecorationId, &Decoration<T>)> {
        let mut all: Vec<_> = self.decorations.iter().map(|(id, d)| (*id, d)).collect();
        all.sort_unstable_by_key(|(id, _)| *id);
        all
    }

    pub fn find_decoration(&self, name: &str) -> Option<DecorationId> {
        self.decorations()
            .into_iter()
            .find(|(_, d)| d.name() == name)
            .map(|(id, _)| id)
    }

    pub fn add_target(&mut self, id: DecorationId, target: T, mode: TargetMatchMode) -> bool {
        self.update(id, |d| d.add_target(target, mode))
    }

    pub fn remove_target(&mut self, id: DecorationId, target: T) -> bool {
        self.update(id, |d| d.remove_target(target))
    }

    pub fn add_negated_target(&mut self, id: DecorationId, target: T, mode: TargetMatchMode) -> bool {
        self.update(id, |d| d.add_negated_target(target, mode))
    }

    pub fn remove_negated_target(&mut self, id: DecorationId, target: T) -> bool {
        self.update(id, |d| d.remove_negated_target(target))
    }

    pub fn enable(&mut self, id: DecorationId) -> bool {
        self.update(id, |d| d.enable())
    }

    pub fn disable(&mut self, id: DecorationId) -> bool {
        self.update(id, |d| d.disable())
    }

    pub fn add_classname(&mut self, id: DecorationId, classname: &str) -> bool {
        self.update(id, |d| d.add_classname(classname))
    }

    pub fn remove_classname(&mut self, id: DecorationId, classname: &str) -> bool {
        self.update(id, |d| d.remove_classname(classname))
    }

    fn pair(&self, target: &T) -> Result<CompositePair, DecorationError> {
        self.composites
            .get(target)
            .copied()
            .ok_or_else(|| DecorationError::UnknownTarget(format!("{target:?}")))
    }

    /// Applies `mutate` to a registered decoration and forwards the resulting
    /// event, if any, to the composites it concerns.
    fn update<F>(&mut self, id: DecorationId, mutate: F) -> bool
    where
        F: FnOnce(&mut Decoration<T>) -> Option<DecorationEvent<T>>,
    {
        let Some(deco) = self.decorations.get_mut(&id) else {
            trace!("ignoring change to unknown {id}");
            return false;
        };
        match mutate(deco) {
            Some(event) => {
                self.dispatch(id, event);
                true
            }
            None => false,
        }
    }

    fn dispatch(&mut self, id: DecorationId, event: DecorationEvent<T>) {
        trace!("{id}: {event:?}");
        let decorations = &self.decorations;
        let graph = &mut self.graph;
        match event {
            DecorationEvent::TargetAdded { target, previous, .. } => {
                let Some(pair) = self.composites.get(&target).copied() else {
                    return;
                };
                if previous.is_some() {
                    graph.retarget(pair.applicable, Relation::Target, id, decorations);
                    graph.retarget(pair.inheritable, Relation::Target, id, decorations);
                } else {
                    graph.add(pair.applicable, id, decorations);
                    graph.add(pair.inheritable, id, decorations);
                }
            }
            DecorationEvent::TargetRemoved { target, .. } => {
                let Some(pair) = self.composites.get(&target).copied() else {
                    return;
                };
                graph.remove(pair.applicable, id, decorations);
                graph.remove(pair.inheritable, id, decorations);
            }
            DecorationEvent::NegationAdded { target, previous, .. } => {
                let Some(pair) = self.composites.get(&target).copied() else {
                    return;
                };
                if previous.is_some() {
                    graph.retarget(pair.applicable, Relation::Negation, id, decorations);
                    graph.retarget(pair.inheritable, Relation::Negation, id, decorations);
                } else {
                    graph.negate(pair.applicable, id, decorations);
                    graph.negate(pair.inheritable, id, decorations);
                }
            }
            DecorationEvent::NegationRemoved { target, .. } => {
                let Some(pair) = self.composites.get(&target).copied() else {
                    return;
                };
                graph.un_negate(pair.applicable, id, decorations);
                graph.un_negate(pair.inheritable, id, decorations);
            }
            DecorationEvent::ClassnameAdded(classname) => graph.classname_added(id, &classname, decorations),
            DecorationEvent::ClassnameRemoved(classname) => graph.classname_removed(id, &classname, decorations),
            DecorationEvent::Enabled => graph.decoration_enabled(id, decorations),
            DecorationEvent::Disabled => graph.decoration_disabled(id, decorations),
        }
    }

    #[cfg(test)]
    pub(crate) fn assert_consistent(&self) {
        self.graph.assert_consistent();
    }
}
