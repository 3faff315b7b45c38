use indextree::{Arena, NodeId};
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};

use crate::crawler::FileNode;
use crate::error::DecorationError;
use crate::manager::DecorationsManager;

/// Represents a node in the directory tree
#[derive(Debug, Clone)]
pub struct TreeNode {
    pub path: PathBuf,
    pub name: String,
    pub is_dir: bool,
}

/// Hierarchical file tree using an arena allocator. Node ids are stable for
/// the lifetime of a node, which makes them usable as decoration targets.
pub struct FileTree {
    arena: Arena<TreeNode>,
    root: NodeId,
    path_to_node: HashMap<PathBuf, NodeId>,
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("/")
        .to_string()
}

impl FileTree {
    /// Create a new tree with a root node
    pub fn new<P: AsRef<Path>>(root_path: P) -> Self {
        let mut arena = Arena::new();
        let root_path_buf = root_path.as_ref().to_path_buf();

        let root = arena.new_node(TreeNode {
            path: root_path_buf.clone(),
            name: file_name(&root_path_buf),
            is_dir: true,
        });
        let mut path_to_node = HashMap::new();
        path_to_node.insert(root_path_buf, root);

        Self {
            arena,
            root,
            path_to_node,
        }
    }

    /// Build a tree from crawler output. Entries whose parent is unknown are skipped.
    pub fn from_scan<P: AsRef<Path>>(root_path: P, nodes: &[FileNode]) -> Self {
        let mut tree = Self::new(root_path);
        let mut sorted: Vec<&FileNode> = nodes.iter().collect();
        sorted.sort_by_key(|n| n.path.components().count());
        for node in sorted {
            tree.add_node(node.path.clone(), node.is_dir);
        }
        tree
    }

    /// Add a node below its parent directory. Returns the existing id if the
    /// path is already known, `None` if the parent is not.
    pub fn add_node(&mut self, path: PathBuf, is_dir: bool) -> Option<NodeId> {
        if let Some(&existing) = self.path_to_node.get(&path) {
            return Some(existing);
        }
        let parent_id = *self.path_to_node.get(path.parent()?)?;

        let node_id = self.arena.new_node(TreeNode {
            name: file_name(&path),
            path: path.clone(),
            is_dir,
        });
        parent_id.append(node_id, &mut self.arena);
        self.path_to_node.insert(path, node_id);
        Some(node_id)
    }

    /// Move `node` (and its subtree) below `new_parent`, rewriting paths.
    /// Refuses moves that would put a node below itself or onto a path that
    /// is already taken.
    pub fn move_node(&mut self, node: NodeId, new_parent: NodeId) -> bool {
        if node == self.root || new_parent.ancestors(&self.arena).any(|a| a == node) {
            return false;
        }
        let (Some(parent_path), Some(name)) = (
            self.node(new_parent).map(|n| n.path.clone()),
            self.node(node).map(|n| n.name.clone()),
        ) else {
            return false;
        };
        if self
            .path_to_node
            .get(&parent_path.join(&name))
            .is_some_and(|&other| other != node)
        {
            return false;
        }
        node.detach(&mut self.arena);
        new_parent.append(node, &mut self.arena);

        let subtree: Vec<NodeId> = node.descendants(&self.arena).collect();
        for id in subtree {
            let new_path = match self.arena[id].parent() {
                Some(parent) if id != node => self.arena[parent].get().path.join(&self.arena[id].get().name),
                _ => parent_path.join(&self.arena[id].get().name),
            };
            let old_path = std::mem::replace(&mut self.arena[id].get_mut().path, new_path.clone());
            self.path_to_node.remove(&old_path);
            self.path_to_node.insert(new_path, id);
        }
        true
    }

    /// Remove `node` and everything below it.
    pub fn remove_node(&mut self, node: NodeId) -> bool {
        if node == self.root || node.is_removed(&self.arena) {
            return false;
        }
        for id in node.descendants(&self.arena) {
            self.path_to_node.remove(&self.arena[id].get().path);
        }
        node.remove_subtree(&mut self.arena);
        true
    }

    pub fn get_root(&self) -> NodeId {
        self.root
    }

    pub fn get_node(&self, path: &Path) -> Option<NodeId> {
        self.path_to_node.get(path).copied()
    }

    pub fn node(&self, id: NodeId) -> Option<&TreeNode> {
        self.arena.get(id).filter(|n| !n.is_removed()).map(|n| n.get())
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.arena.get(id)?.parent()
    }

    /// Resolve a path relative to the root; `""` and `"."` name the root.
    pub fn resolve(&self, relative: &Path) -> Option<NodeId> {
        let mut path = self.arena[self.root].get().path.clone();
        for component in relative.components() {
            match component {
                Component::CurDir => {}
                Component::Normal(part) => path.push(part),
                _ => return None,
            }
        }
        self.get_node(&path)
    }

    /// Pre-order listing of every node with its depth (root = 0).
    pub fn walk(&self) -> Vec<(NodeId, usize)> {
        let mut out = Vec::with_capacity(self.path_to_node.len());
        let mut stack = vec![(self.root, 0usize)];
        while let Some((id, depth)) = stack.pop() {
            out.push((id, depth));
            let children: Vec<NodeId> = id.children(&self.arena).collect();
            stack.extend(children.into_iter().rev().map(|c| (c, depth + 1)));
        }
        out
    }

    pub fn len(&self) -> usize {
        self.path_to_node.len()
    }

    pub fn is_empty(&self) -> bool {
        self.path_to_node.is_empty()
    }

    /// Mirror the whole tree into `manager`, parents before children.
    pub fn register_with(&self, manager: &mut DecorationsManager<NodeId>) -> Result<(), DecorationError> {
        for (id, _) in self.walk() {
            manager.create_composite_pair(id, self.parent(id))?;
        }
        Ok(())
    }
}
