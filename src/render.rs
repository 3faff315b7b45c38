use indextree::NodeId;
use std::cell::RefCell;
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::rc::Rc;

use crate::classlist::{ClasslistComposite, Subscription};
use crate::manager::DecorationsManager;
use crate::tree::FileTree;

/// One visible line of the tree view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecoratedRow {
    pub node: NodeId,
    pub path: PathBuf,
    pub name: String,
    pub is_dir: bool,
    pub depth: usize,
    pub classnames: Vec<String>,
}

/// Flatten `tree` into display rows down to `max_depth` (root = 0), each
/// carrying the node's Applicable classnames.
pub fn decorated_rows(tree: &FileTree, manager: &DecorationsManager<NodeId>, max_depth: Option<usize>) -> Vec<DecoratedRow> {
    tree.walk()
        .into_iter()
        .filter(|(_, depth)| max_depth.is_none_or(|max| *depth <= max))
        .filter_map(|(id, depth)| {
            let node = tree.node(id)?;
            let classnames = manager
                .applicable_classlist(&id)
                .map(|c| c.classlist())
                .unwrap_or_default();
            Some(DecoratedRow {
                node: id,
                path: node.path.clone(),
                name: node.name.clone(),
                is_dir: node.is_dir,
                depth,
                classnames,
            })
        })
        .collect()
}

impl DecoratedRow {
    /// `"  name/ [a b]"` style line used by the command-line front end.
    pub fn display_line(&self) -> String {
        let mut line = "  ".repeat(self.depth);
        line.push_str(&self.name);
        if self.is_dir {
            line.push('/');
        }
        if !self.classnames.is_empty() {
            line.push_str(" [");
            line.push_str(&self.classnames.join(" "));
            line.push(']');
        }
        line
    }
}

/// Coalesces classlist notifications of visible rows into a set of row
/// indices to repaint. Engine notifications are synchronous and may arrive
/// several times per frame; the view drains this once per frame instead.
pub struct DirtyRows {
    dirty: Rc<RefCell<BTreeSet<usize>>>,
    subscriptions: Vec<(ClasslistComposite, Subscription)>,
}

impl DirtyRows {
    pub fn watch(rows: &[DecoratedRow], manager: &DecorationsManager<NodeId>) -> Self {
        let dirty = Rc::new(RefCell::new(BTreeSet::new()));
        let mut subscriptions = Vec::with_capacity(rows.len());
        for (idx, row) in rows.iter().enumerate() {
            let Some(classlist) = manager.applicable_classlist(&row.node) else {
                continue;
            };
            let sink = Rc::clone(&dirty);
            let token = classlist.subscribe(move |_| {
                sink.borrow_mut().insert(idx);
            });
            subscriptions.push((classlist.clone(), token));
        }
        Self { dirty, subscriptions }
    }

    /// Row indices changed since the last call, ascending.
    pub fn drain(&self) -> Vec<usize> {
        std::mem::take(&mut *self.dirty.borrow_mut()).into_iter().collect()
    }

    pub fn is_clean(&self) -> bool {
        self.dirty.borrow().is_empty()
    }

    /// Stop listening; returns how many subscriptions were removed.
    pub fn detach(self) -> usize {
        self.subscriptions
            .into_iter()
            .map(|(classlist, token)| classlist.unsubscribe(token))
            .filter(|removed| *removed)
            .count()
    }
}
