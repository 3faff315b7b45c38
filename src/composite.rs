//! Copy-on-write aggregation of decorations over the tree.
//!
//! Every tree node owns two composites, one per [`Axis`]. Both delegate to
//! the parent node's `Inheritable` composite, so the composites form a tree
//! of their own, stored in an `indextree` arena where arena children are the
//! composites currently linked to (delegating to) their parent.
//!
//! A composite is either `Delegated`, reading the state of its nearest
//! self-owned ancestor through the same classlist buffer, or `SelfOwned`,
//! holding its own rendered set and buffer. A composite with a parent is
//! self-owned exactly while something is targeted or negated directly on it.
//!
//! Any change starts at an origin composite and walks the origin's subtree
//! in pre-order: delegated nodes re-point at their owner's buffer, self-owned
//! nodes re-evaluate the affected decoration against their own rules.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use indextree::{Arena, NodeId};
use log::trace;

use crate::classlist::ClasslistComposite;
use crate::decoration::{Decoration, DecorationId};
use crate::target::{Axis, Target};

pub(crate) type CompositeId = NodeId;

pub(crate) type Decorations<T> = HashMap<DecorationId, Decoration<T>>;

#[derive(Debug, Default)]
struct LocalState {
    /// Admitted decorations in admission order, enabled or not.
    rendered: Vec<DecorationId>,
    targeted: HashSet<DecorationId>,
    negated: HashSet<DecorationId>,
}

impl LocalState {
    fn is_unanchored(&self) -> bool {
        self.targeted.is_empty() && self.negated.is_empty()
    }
}

#[derive(Debug)]
enum Ownership {
    /// Shares the state of `owner`, the nearest self-owned ancestor.
    Delegated { owner: CompositeId },
    SelfOwned(LocalState),
}

#[derive(Debug)]
pub(crate) struct CompositeNode<T> {
    target: T,
    axis: Axis,
    ownership: Ownership,
    classlist: ClasslistComposite,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Relation {
    Target,
    Negation,
}

/// What a propagation walk has to re-evaluate on self-owned descendants.
#[derive(Debug, Clone, Copy)]
enum Change {
    Decoration(DecorationId),
    /// The origin moved; every inherited decoration may differ.
    Everything,
}

#[derive(Debug)]
pub(crate) struct CompositeGraph<T> {
    arena: Arena<CompositeNode<T>>,
    /// decoration -> self-owned composites currently rendering it
    render_index: HashMap<DecorationId, HashSet<CompositeId>>,
}

impl<T: Target> CompositeGraph<T> {
    pub(crate) fn new() -> Self {
        Self {
            arena: Arena::new(),
            render_index: HashMap::new(),
        }
    }

    /// A parentless composite. It stays self-owned for as long as it has no parent.
    pub(crate) fn insert_root(&mut self, target: T, axis: Axis) -> CompositeId {
        self.arena.new_node(CompositeNode {
            target,
            axis,
            ownership: Ownership::SelfOwned(LocalState::default()),
            classlist: ClasslistComposite::new(Rc::new(RefCell::new(Vec::new()))),
        })
    }

    pub(crate) fn insert_child(&mut self, target: T, axis: Axis, parent: CompositeId) -> CompositeId {
        let owner = self.owner_of(parent);
        let classlist = ClasslistComposite::new(self.node(owner).classlist.buffer());
        let id = self.arena.new_node(CompositeNode {
            target,
            axis,
            ownership: Ownership::Delegated { owner },
            classlist,
        });
        parent.append(id, &mut self.arena);
        id
    }

    /// Drops `id` and every composite linked below it. Returns the targets
    /// of all removed composites.
    pub(crate) fn purge(&mut self, id: CompositeId) -> Vec<T> {
        let doomed: Vec<CompositeId> = id.descendants(&self.arena).collect();
        let mut targets = Vec::with_capacity(doomed.len());
        for composite in doomed {
            let node = self.node(composite);
            targets.push(node.target);
            let rendered = match &node.ownership {
                Ownership::SelfOwned(local) => local.rendered.clone(),
                Ownership::Delegated { .. } => Vec::new(),
            };
            for decoration in rendered {
                self.unindex(decoration, composite);
            }
        }
        id.remove_subtree(&mut self.arena);
        targets
    }

    pub(crate) fn classlist(&self, id: CompositeId) -> &ClasslistComposite {
        &self.node(id).classlist
    }

    pub(crate) fn parent(&self, id: CompositeId) -> Option<CompositeId> {
        self.arena[id].parent()
    }

    pub(crate) fn is_self_owned(&self, id: CompositeId) -> bool {
        matches!(self.node(id).ownership, Ownership::SelfOwned(_))
    }

    /// Whether `id` lies in the subtree rooted at `ancestor` (inclusive).
    pub(crate) fn is_within(&self, id: CompositeId, ancestor: CompositeId) -> bool {
        id.ancestors(&self.arena).any(|a| a == ancestor)
    }

    pub(crate) fn renders(&self, id: CompositeId, decoration: DecorationId) -> bool {
        self.rendered(id).contains(&decoration)
    }

    /// Self-owned composites currently rendering `decoration`.
    pub(crate) fn rendering(&self, decoration: DecorationId) -> Vec<CompositeId> {
        let mut owners: Vec<CompositeId> = self
            .render_index
            .get(&decoration)
            .map(|owners| owners.iter().copied().collect())
            .unwrap_or_default();
        owners.sort_unstable();
        owners
    }

    pub(crate) fn add(&mut self, id: CompositeId, decoration: DecorationId, decorations: &Decorations<T>) {
        let node = self.node(id);
        let Some(deco) = decorations.get(&decoration) else {
            return;
        };
        if !node.axis.matches(deco.applied_mode(&node.target)) {
            return;
        }
        if !self.is_self_owned(id) {
            self.self_own(id, Relation::Target, decoration, decorations);
            return;
        }
        if !self.local_mut(id).targeted.insert(decoration) {
            return;
        }
        self.refresh(id, decoration, decorations);
    }

    pub(crate) fn remove(&mut self, id: CompositeId, decoration: DecorationId, decorations: &Decorations<T>) {
        // a delegated composite never held a direct attachment
        if !self.is_self_owned(id) {
            return;
        }
        if !self.local_mut(id).targeted.remove(&decoration) {
            return;
        }
        self.settle(id, decoration, decorations);
    }

    pub(crate) fn negate(&mut self, id: CompositeId, decoration: DecorationId, decorations: &Decorations<T>) {
        let node = self.node(id);
        let Some(deco) = decorations.get(&decoration) else {
            return;
        };
        if !node.axis.matches(deco.negated_mode(&node.target)) {
            return;
        }
        if !self.is_self_owned(id) {
            self.self_own(id, Relation::Negation, decoration, decorations);
            return;
        }
        if !self.local_mut(id).negated.insert(decoration) {
            return;
        }
        self.refresh(id, decoration, decorations);
    }

    /// Lifts a negation. This is not an explicit apply: the decoration comes
    /// back only if it is still targeted here or inherited.
    pub(crate) fn un_negate(&mut self, id: CompositeId, decoration: DecorationId, decorations: &Decorations<T>) {
        if !self.is_self_owned(id) {
            return;
        }
        if !self.local_mut(id).negated.remove(&decoration) {
            return;
        }
        self.settle(id, decoration, decorations);
    }

    /// The target or negation `decoration` holds on this composite's node
    /// changed mode. Only a composite whose axis gained or lost coverage
    /// changes state; one that stays covered is left alone.
    pub(crate) fn retarget(&mut self, id: CompositeId, relation: Relation, decoration: DecorationId, decorations: &Decorations<T>) {
        let Some(deco) = decorations.get(&decoration) else {
            return;
        };
        let node = self.node(id);
        let mode = match relation {
            Relation::Target => deco.applied_mode(&node.target),
            Relation::Negation => deco.negated_mode(&node.target),
        };
        let covered = node.axis.matches(mode);
        let held = match (&node.ownership, relation) {
            (Ownership::SelfOwned(local), Relation::Target) => local.targeted.contains(&decoration),
            (Ownership::SelfOwned(local), Relation::Negation) => local.negated.contains(&decoration),
            (Ownership::Delegated { .. }, _) => false,
        };
        match (covered, held, relation) {
            (true, false, Relation::Target) => self.add(id, decoration, decorations),
            (true, false, Relation::Negation) => self.negate(id, decoration, decorations),
            (false, true, Relation::Target) => self.remove(id, decoration, decorations),
            (false, true, Relation::Negation) => self.un_negate(id, decoration, decorations),
            _ => trace!("composite {id:?} unaffected by the new mode of {decoration}"),
        }
    }

    /// Re-links `id` below `new_parent`. Local targets and negations stay
    /// with the composite; everything inherited is re-derived.
    pub(crate) fn change_parent(&mut self, id: CompositeId, new_parent: CompositeId, decorations: &Decorations<T>) {
        assert!(
            !self.is_within(new_parent, id),
            "[internal] composite {id:?} cannot be linked below its own subtree"
        );
        if self.parent(id) != Some(new_parent) {
            id.detach(&mut self.arena);
            new_parent.append(id, &mut self.arena);
        }

        if !self.is_self_owned(id) {
            self.repoint(id);
            self.notify(id);
        } else if self.local(id).is_unanchored() {
            // former root with nothing of its own
            self.parent_own(id, Change::Everything, decorations);
            return;
        } else if self.resync(id, decorations) {
            self.notify(id);
        }
        self.propagate(id, Change::Everything, decorations);
    }

    // Decoration-wide changes update every affected buffer before anyone is
    // notified, then notify ancestors first.

    pub(crate) fn classname_added(&mut self, decoration: DecorationId, classname: &str, decorations: &Decorations<T>) {
        if !decorations.get(&decoration).is_some_and(|d| d.is_enabled()) {
            return;
        }
        let owners = self.rendering_top_down(decoration);
        for owner in &owners {
            self.node(*owner).classlist.buffer().borrow_mut().push(classname.to_string());
        }
        self.notify_owners(owners);
    }

    pub(crate) fn classname_removed(&mut self, decoration: DecorationId, classname: &str, decorations: &Decorations<T>) {
        if !decorations.get(&decoration).is_some_and(|d| d.is_enabled()) {
            return;
        }
        let changed: Vec<CompositeId> = self
            .rendering_top_down(decoration)
            .into_iter()
            .filter(|owner| remove_first(&mut self.node(*owner).classlist.buffer().borrow_mut(), classname))
            .collect();
        self.notify_owners(changed);
    }

    /// Re-enabled classnames go to the tail of every affected list.
    pub(crate) fn decoration_enabled(&mut self, decoration: DecorationId, decorations: &Decorations<T>) {
        let Some(deco) = decorations.get(&decoration) else {
            return;
        };
        let owners = self.rendering_top_down(decoration);
        for owner in &owners {
            self.node(*owner)
                .classlist
                .buffer()
                .borrow_mut()
                .extend(deco.classnames().iter().cloned());
        }
        self.notify_owners(owners);
    }

    pub(crate) fn decoration_disabled(&mut self, decoration: DecorationId, decorations: &Decorations<T>) {
        let Some(deco) = decorations.get(&decoration) else {
            return;
        };
        let changed: Vec<CompositeId> = self
            .rendering_top_down(decoration)
            .into_iter()
            .filter(|owner| remove_all(&self.node(*owner).classlist, deco.classnames()))
            .collect();
        self.notify_owners(changed);
    }

    fn node(&self, id: CompositeId) -> &CompositeNode<T> {
        self.arena[id].get()
    }

    fn node_mut(&mut self, id: CompositeId) -> &mut CompositeNode<T> {
        self.arena[id].get_mut()
    }

    fn owner_of(&self, id: CompositeId) -> CompositeId {
        match self.node(id).ownership {
            Ownership::Delegated { owner } => owner,
            Ownership::SelfOwned(_) => id,
        }
    }

    fn local(&self, id: CompositeId) -> &LocalState {
        match &self.node(id).ownership {
            Ownership::SelfOwned(local) => local,
            Ownership::Delegated { .. } => panic!("[internal] composite {id:?} is delegated and has no local state"),
        }
    }

    fn local_mut(&mut self, id: CompositeId) -> &mut LocalState {
        match &mut self.node_mut(id).ownership {
            Ownership::SelfOwned(local) => local,
            Ownership::Delegated { .. } => panic!("[internal] composite {id:?} is delegated and has no local state"),
        }
    }

    fn rendered(&self, id: CompositeId) -> &[DecorationId] {
        &self.local(self.owner_of(id)).rendered
    }

    fn parent_of(&self, id: CompositeId) -> CompositeId {
        self.parent(id)
            .unwrap_or_else(|| panic!("[internal] delegated composite {id:?} has no parent"))
    }

    /// Admission rule: not negated here, and either targeted here or rendered
    /// by the parent.
    fn admits(&self, id: CompositeId, decoration: DecorationId, decorations: &Decorations<T>) -> bool {
        let Some(deco) = decorations.get(&decoration) else {
            return false;
        };
        let node = self.node(id);
        if node.axis.matches(deco.negated_mode(&node.target)) {
            return false;
        }
        node.axis.matches(deco.applied_mode(&node.target))
            || self.parent(id).is_some_and(|parent| self.renders(parent, decoration))
    }

    /// Adds `decoration` to the rendered set of self-owned `id`. Returns
    /// whether the classlist changed.
    fn attach(&mut self, id: CompositeId, decoration: DecorationId, decorations: &Decorations<T>) -> bool {
        let Some(deco) = decorations.get(&decoration) else {
            return false;
        };
        let node = self.arena[id].get_mut();
        let Ownership::SelfOwned(local) = &mut node.ownership else {
            panic!("[internal] a delegated composite must not render decorations itself");
        };
        if local.rendered.contains(&decoration) {
            return false;
        }
        local.rendered.push(decoration);
        self.render_index.entry(decoration).or_default().insert(id);

        if !deco.is_enabled() || deco.classnames().is_empty() {
            return false;
        }
        node.classlist
            .buffer()
            .borrow_mut()
            .extend(deco.classnames().iter().cloned());
        true
    }

    fn detach(&mut self, id: CompositeId, decoration: DecorationId, decorations: &Decorations<T>) -> bool {
        let node = self.arena[id].get_mut();
        let Ownership::SelfOwned(local) = &mut node.ownership else {
            panic!("[internal] a delegated composite must not render decorations itself");
        };
        let Some(idx) = local.rendered.iter().position(|d| *d == decoration) else {
            return false;
        };
        local.rendered.remove(idx);
        let classlist = node.classlist.clone();
        self.unindex(decoration, id);

        match decorations.get(&decoration) {
            Some(deco) if deco.is_enabled() => remove_all(&classlist, deco.classnames()),
            _ => false,
        }
    }

    fn unindex(&mut self, decoration: DecorationId, id: CompositeId) {
        let now_empty = self
            .render_index
            .get_mut(&decoration)
            .map(|owners| {
                owners.remove(&id);
                owners.is_empty()
            })
            .unwrap_or(false);
        if now_empty {
            self.render_index.remove(&decoration);
        }
    }

    /// Brings the rendering of one decoration on self-owned `id` in line with
    /// the admission rule.
    fn reconcile(&mut self, id: CompositeId, decoration: DecorationId, decorations: &Decorations<T>) -> bool {
        let wanted = self.admits(id, decoration, decorations);
        let present = self.local(id).rendered.contains(&decoration);
        match (wanted, present) {
            (true, false) => self.attach(id, decoration, decorations),
            (false, true) => self.detach(id, decoration, decorations),
            _ => false,
        }
    }

    /// Re-derives the whole rendered set of self-owned `id`.
    fn resync(&mut self, id: CompositeId, decorations: &Decorations<T>) -> bool {
        let before = self.classlist(id).classlist();

        let current = self.local(id).rendered.clone();
        for decoration in current {
            if !self.admits(id, decoration, decorations) {
                self.detach(id, decoration, decorations);
            }
        }

        let mut candidates: Vec<DecorationId> = match self.parent(id) {
            Some(parent) => self.rendered(parent).to_vec(),
            None => Vec::new(),
        };
        let mut targeted: Vec<DecorationId> = self.local(id).targeted.iter().copied().collect();
        targeted.sort_unstable();
        candidates.extend(targeted);
        for decoration in candidates {
            if self.admits(id, decoration, decorations) {
                self.attach(id, decoration, decorations);
            }
        }

        before != self.classlist(id).classlist()
    }

    /// Local re-evaluation of one decoration on a self-owned origin, then the walk.
    fn refresh(&mut self, id: CompositeId, decoration: DecorationId, decorations: &Decorations<T>) {
        if self.reconcile(id, decoration, decorations) {
            self.notify(id);
        }
        self.propagate(id, Change::Decoration(decoration), decorations);
    }

    /// After a target or negation was dropped from self-owned `id`.
    fn settle(&mut self, id: CompositeId, decoration: DecorationId, decorations: &Decorations<T>) {
        if self.parent(id).is_some() && self.local(id).is_unanchored() {
            self.parent_own(id, Change::Decoration(decoration), decorations);
        } else {
            self.refresh(id, decoration, decorations);
        }
    }

    fn self_own(&mut self, id: CompositeId, relation: Relation, decoration: DecorationId, decorations: &Decorations<T>) {
        assert!(!self.is_self_owned(id), "[internal] composite {id:?} is already self owned");
        let parent = self.parent_of(id);

        let mut local = LocalState::default();
        match relation {
            Relation::Target => local.targeted.insert(decoration),
            Relation::Negation => local.negated.insert(decoration),
        };
        let node = self.node_mut(id);
        node.ownership = Ownership::SelfOwned(local);
        node.classlist.repoint(Rc::new(RefCell::new(Vec::new())));

        let inherited = self.rendered(parent).to_vec();
        for inherited_decoration in inherited {
            if self.admits(id, inherited_decoration, decorations) {
                self.attach(id, inherited_decoration, decorations);
            }
        }
        if relation == Relation::Target && self.admits(id, decoration, decorations) {
            self.attach(id, decoration, decorations);
        }

        trace!(
            "composite {:?} ({:?} of {:?}) self owned for {} via {:?}",
            id,
            self.node(id).axis,
            self.node(id).target,
            decoration,
            relation
        );
        // one notification for the whole transition, however much was seeded
        self.notify(id);
        self.propagate(id, Change::Decoration(decoration), decorations);
    }

    fn parent_own(&mut self, id: CompositeId, change: Change, decorations: &Decorations<T>) {
        assert!(self.is_self_owned(id), "[internal] composite {id:?} is not self owned");
        let parent = self.parent_of(id);
        let before = self.classlist(id).classlist();

        let owner = self.owner_of(parent);
        let buffer = self.node(owner).classlist.buffer();
        let node = self.node_mut(id);
        let previous = std::mem::replace(&mut node.ownership, Ownership::Delegated { owner });
        node.classlist.repoint(buffer);
        if let Ownership::SelfOwned(local) = previous {
            for decoration in local.rendered {
                self.unindex(decoration, id);
            }
        }

        trace!("composite {:?} delegates to {:?} again", id, owner);
        if before != self.classlist(id).classlist() {
            self.notify(id);
        }
        self.propagate(id, change, decorations);
    }

    fn repoint(&mut self, id: CompositeId) {
        let owner = self.owner_of(self.parent_of(id));
        let buffer = self.node(owner).classlist.buffer();
        let node = self.node_mut(id);
        node.ownership = Ownership::Delegated { owner };
        node.classlist.repoint(buffer);
    }

    /// Pre-order walk below `origin`. Self-owned composites are checkpoints,
    /// not stops: delegated composites further down still need re-pointing.
    fn propagate(&mut self, origin: CompositeId, change: Change, decorations: &Decorations<T>) {
        let descendants: Vec<CompositeId> = origin.descendants(&self.arena).skip(1).collect();
        trace!("propagating {:?} from {:?} to {} composites", change, origin, descendants.len());

        for id in descendants {
            if self.is_self_owned(id) {
                let changed = match change {
                    Change::Decoration(decoration) => self.reconcile(id, decoration, decorations),
                    Change::Everything => self.resync(id, decorations),
                };
                if changed {
                    self.notify(id);
                }
            } else {
                self.repoint(id);
                self.notify(id);
            }
        }
    }

    /// Like [`rendering`](Self::rendering), but every composite comes after
    /// its ancestors regardless of arena ids, which reparenting scrambles.
    fn rendering_top_down(&self, decoration: DecorationId) -> Vec<CompositeId> {
        let mut owners = self.rendering(decoration);
        owners.sort_by_cached_key(|owner| owner.ancestors(&self.arena).count());
        owners
    }

    fn notify_owners(&self, owners: Vec<CompositeId>) {
        for owner in owners {
            self.notify_shared(owner);
        }
    }

    fn notify(&self, id: CompositeId) {
        self.node(id).classlist.notify();
    }

    /// Notifies `owner` and every composite reading its buffer.
    fn notify_shared(&self, owner: CompositeId) {
        let mut stack = vec![owner];
        while let Some(id) = stack.pop() {
            self.notify(id);
            let delegated: Vec<CompositeId> = id
                .children(&self.arena)
                .filter(|child| !self.is_self_owned(*child))
                .collect();
            stack.extend(delegated.into_iter().rev());
        }
    }

    /// Panics if a structural invariant does not hold.
    #[cfg(test)]
    pub(crate) fn assert_consistent(&self) {
        for node_ref in self.arena.iter().filter(|n| !n.is_removed()) {
            let Some(id) = self.arena.get_node_id(node_ref) else {
                continue;
            };
            match &node_ref.get().ownership {
                Ownership::Delegated { owner } => {
                    let parent = self.parent_of(id);
                    assert_eq!(*owner, self.owner_of(parent), "stale owner on {id:?}");
                    assert!(
                        self.classlist(id).shares_classlist_with(self.classlist(parent)),
                        "delegated {id:?} does not share its parent's classlist"
                    );
                }
                Ownership::SelfOwned(local) => {
                    if self.parent(id).is_some() {
                        assert!(!local.is_unanchored(), "{id:?} is self owned without a reason");
                    }
                    for decoration in &local.rendered {
                        assert!(
                            self.render_index.get(decoration).is_some_and(|o| o.contains(&id)),
                            "{decoration} rendered by {id:?} but missing from the render index"
                        );
                    }
                }
            }
        }
    }
}

fn remove_first(list: &mut Vec<String>, classname: &str) -> bool {
    match list.iter().position(|c| c == classname) {
        Some(idx) => {
            list.remove(idx);
            true
        }
        None => false,
    }
}

fn remove_all(classlist: &ClasslistComposite, classnames: &[String]) -> bool {
    let buffer = classlist.buffer();
    let mut list = buffer.borrow_mut();
    let mut removed = false;
    for classname in classnames {
        removed |= remove_first(&mut list, classname);
    }
    removed
}
