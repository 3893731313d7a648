#![forbid(unsafe_code)]

//! Merge of the authoritative tree with the cosmetic overlay.
//!
//! Everything here is a pure function of its inputs: no cache survives between calls and no
//! overlay reference, however stale, is an error.

mod index;

pub use index::SnapshotIndex;

use crate::ids::ROOT_ID;
use crate::model::{BookmarkNode, OverlayState, RenderedNode};
use std::collections::{HashMap, HashSet};

/// Renders the merged tree for `top_level` (the root's direct children) and `overlay`.
pub fn reconcile(
    top_level: &[BookmarkNode],
    overlay: &OverlayState,
    show_hidden: bool,
) -> Vec<RenderedNode> {
    EffectiveTree::build(top_level, overlay).render(show_hidden)
}

/// Children of `parent_id` in rendered order, hidden ones included.
pub fn effective_children(
    top_level: &[BookmarkNode],
    overlay: &OverlayState,
    parent_id: &str,
) -> Vec<String> {
    EffectiveTree::build(top_level, overlay)
        .children_of(parent_id)
        .iter()
        .map(|id| id.to_string())
        .collect()
}

/// Effective parent/children assignment for one (snapshot, overlay) pair.
#[derive(Debug)]
pub struct EffectiveTree<'a> {
    index: SnapshotIndex<'a>,
    overlay: &'a OverlayState,
    parents: HashMap<&'a str, &'a str>,
    children: HashMap<&'a str, Vec<&'a str>>,
}

impl<'a> EffectiveTree<'a> {
    pub fn build(top_level: &'a [BookmarkNode], overlay: &'a OverlayState) -> Self {
        let index = SnapshotIndex::build(top_level);
        let parents = assign_parents(&index, overlay);

        let mut children: HashMap<&'a str, Vec<&'a str>> = HashMap::new();
        for &id in index.preorder() {
            if let Some(&parent) = parents.get(id) {
                children.entry(parent).or_default().push(id);
            }
        }

        for (parent, list) in children.iter_mut() {
            if *parent == ROOT_ID {
                continue;
            }
            let Some(stored) = overlay.order.get(*parent) else {
                continue;
            };
            let mut rank: HashMap<&str, usize> = HashMap::with_capacity(stored.len());
            for (position, id) in stored.iter().enumerate() {
                rank.entry(id.as_str()).or_insert(position);
            }
            // Stable: unlisted children keep their authoritative order after the listed ones.
            list.sort_by_key(|id| rank.get(id).copied().unwrap_or(usize::MAX));
        }

        Self {
            index,
            overlay,
            parents,
            children,
        }
    }

    pub fn index(&self) -> &SnapshotIndex<'a> {
        &self.index
    }

    pub fn parent_of(&self, id: &str) -> Option<&'a str> {
        self.parents.get(id).copied()
    }

    /// Rendered child order of `parent_id`, hidden ids included. For the root this is the
    /// top-level containers followed by anything virtually re-parented to the root.
    pub fn children_of(&self, parent_id: &str) -> Vec<&'a str> {
        if parent_id == ROOT_ID {
            return self.root_ids();
        }
        self.children.get(parent_id).cloned().unwrap_or_default()
    }

    pub fn render(&self, show_hidden: bool) -> Vec<RenderedNode> {
        self.root_ids()
            .into_iter()
            .filter(|id| show_hidden || !self.overlay.hidden.contains(*id))
            .filter_map(|id| self.materialize(id, show_hidden))
            .collect()
    }

    fn root_ids(&self) -> Vec<&'a str> {
        let mut ids = self.index.top_level().to_vec();
        if let Some(extra) = self.children.get(ROOT_ID) {
            ids.extend(extra.iter().filter(|id| !self.index.is_top_level(id)));
        }
        ids
    }

    fn materialize(&self, id: &str, show_hidden: bool) -> Option<RenderedNode> {
        let node = self.index.get(id)?;
        let title = self
            .overlay
            .titles
            .get(id)
            .cloned()
            .unwrap_or_else(|| node.title.clone());
        let children = if node.is_folder() {
            let rendered: Vec<RenderedNode> = self
                .children
                .get(id)
                .into_iter()
                .flatten()
                .filter(|child| show_hidden || !self.overlay.hidden.contains(**child))
                .filter_map(|child| self.materialize(child, show_hidden))
                .collect();
            Some(rendered)
        } else {
            None
        };
        Some(RenderedNode {
            id: node.id.clone(),
            title,
            url: node.url.clone(),
            children,
            is_hidden: self.overlay.hidden.contains(id),
            date_added_ms: node.date_added_ms,
        })
    }
}

fn assign_parents<'a>(
    index: &SnapshotIndex<'a>,
    overlay: &'a OverlayState,
) -> HashMap<&'a str, &'a str> {
    let mut parents: HashMap<&'a str, &'a str> = HashMap::with_capacity(index.len());
    for &id in index.preorder() {
        let Some(authoritative) = index.parent_of(id) else {
            continue;
        };
        if authoritative == ROOT_ID {
            parents.insert(id, ROOT_ID);
            continue;
        }
        let chosen = match overlay.virtual_parent.get(id).map(String::as_str) {
            Some(ROOT_ID) => ROOT_ID,
            Some(target) if target != id && index.is_folder(target) => target,
            _ => authoritative,
        };
        parents.insert(id, chosen);
    }

    // A virtual parent may sit inside the node's own subtree (directly or through other
    // overrides). Such nodes fall back to their authoritative parent until every chain
    // reaches the root.
    loop {
        let mut reverted = false;
        for &id in index.preorder() {
            let Some(authoritative) = index.parent_of(id) else {
                continue;
            };
            if parents.get(id) == Some(&authoritative) {
                continue;
            }
            if !reaches_root(&parents, id) {
                parents.insert(id, authoritative);
                reverted = true;
            }
        }
        if !reverted {
            break;
        }
    }
    parents
}

fn reaches_root<'a>(parents: &HashMap<&'a str, &'a str>, id: &'a str) -> bool {
    let mut seen: HashSet<&'a str> = HashSet::new();
    seen.insert(id);
    let mut current = id;
    loop {
        let Some(&parent) = parents.get(current) else {
            return false;
        };
        if parent == ROOT_ID {
            return true;
        }
        if !seen.insert(parent) {
            return false;
        }
        current = parent;
    }
}
