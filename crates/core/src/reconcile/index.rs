#![forbid(unsafe_code)]

use crate::ids::ROOT_ID;
use crate::model::BookmarkNode;
use std::collections::{BTreeSet, HashMap};

/// Flat view of one authoritative snapshot: id → node, id → authoritative parent, pre-order.
#[derive(Debug)]
pub struct SnapshotIndex<'a> {
    nodes: HashMap<&'a str, &'a BookmarkNode>,
    parents: HashMap<&'a str, &'a str>,
    preorder: Vec<&'a str>,
    top_level: Vec<&'a str>,
}

impl<'a> SnapshotIndex<'a> {
    pub fn build(top_level: &'a [BookmarkNode]) -> Self {
        let mut index = Self {
            nodes: HashMap::new(),
            parents: HashMap::new(),
            preorder: Vec::new(),
            top_level: Vec::new(),
        };

        let mut stack: Vec<(&'a BookmarkNode, &'a str)> = top_level
            .iter()
            .rev()
            .map(|node| (node, ROOT_ID))
            .collect();
        while let Some((node, parent)) = stack.pop() {
            let id = node.id.as_str();
            // Duplicate ids break the tree contract; keep the first occurrence only.
            if id == ROOT_ID || index.nodes.contains_key(id) {
                continue;
            }
            index.nodes.insert(id, node);
            index.parents.insert(id, parent);
            index.preorder.push(id);
            if parent == ROOT_ID {
                index.top_level.push(id);
            }
            for child in node.children.iter().rev() {
                stack.push((child, id));
            }
        }
        index
    }

    pub fn len(&self) -> usize {
        self.preorder.len()
    }

    pub fn is_empty(&self) -> bool {
        self.preorder.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<&'a BookmarkNode> {
        self.nodes.get(id).copied()
    }

    pub fn parent_of(&self, id: &str) -> Option<&'a str> {
        self.parents.get(id).copied()
    }

    pub fn is_top_level(&self, id: &str) -> bool {
        self.parent_of(id) == Some(ROOT_ID)
    }

    pub fn is_folder(&self, id: &str) -> bool {
        self.get(id).is_some_and(BookmarkNode::is_folder)
    }

    pub fn preorder(&self) -> &[&'a str] {
        &self.preorder
    }

    pub fn top_level(&self) -> &[&'a str] {
        &self.top_level
    }

    /// `id` and every authoritative descendant. Empty when `id` is unknown.
    pub fn subtree_ids(&self, id: &str) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        let Some(root) = self.get(id) else {
            return out;
        };
        let mut stack = vec![root];
        while let Some(node) = stack.pop() {
            if out.insert(node.id.clone()) {
                stack.extend(node.children.iter());
            }
        }
        out
    }

    /// Bookmark ids under folder `id`, in authoritative order. Direct children only unless
    /// `recursive`.
    pub fn leaf_ids(&self, id: &str, recursive: bool) -> Vec<String> {
        let mut out = Vec::new();
        if let Some(folder) = self.get(id) {
            collect_leaves(folder, recursive, &mut out);
        }
        out
    }
}

fn collect_leaves(folder: &BookmarkNode, recursive: bool, out: &mut Vec<String>) {
    for child in &folder.children {
        if !child.is_folder() {
            out.push(child.id.clone());
        } else if recursive {
            collect_leaves(child, recursive, out);
        }
    }
}
