#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// A node of the host-owned tree. `url` is present for bookmarks and absent for folders.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookmarkNode {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub children: Vec<BookmarkNode>,
    #[serde(default, rename = "dateAdded")]
    pub date_added_ms: i64,
}

impl BookmarkNode {
    pub fn folder(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            url: None,
            parent_id: None,
            children: Vec::new(),
            date_added_ms: 0,
        }
    }

    pub fn bookmark(id: impl Into<String>, title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            url: Some(url.into()),
            parent_id: None,
            children: Vec::new(),
            date_added_ms: 0,
        }
    }

    /// Appends `children`, stamping their `parent_id` with this node's id.
    pub fn with_children(mut self, children: Vec<BookmarkNode>) -> Self {
        for mut child in children {
            child.parent_id = Some(self.id.clone());
            self.children.push(child);
        }
        self
    }

    pub fn is_folder(&self) -> bool {
        self.url.is_none()
    }
}

/// Cosmetic overrides layered over the authoritative tree. Persisted as one record.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OverlayState {
    pub order: BTreeMap<String, Vec<String>>,
    pub hidden: BTreeSet<String>,
    pub titles: BTreeMap<String, String>,
    pub virtual_parent: BTreeMap<String, String>,
}

impl OverlayState {
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
            && self.hidden.is_empty()
            && self.titles.is_empty()
            && self.virtual_parent.is_empty()
    }

    /// Drops `id` from every stored order list. Returns whether anything changed.
    pub fn remove_from_orders(&mut self, id: &str) -> bool {
        let mut changed = false;
        for list in self.order.values_mut() {
            let before = list.len();
            list.retain(|entry| entry != id);
            changed |= list.len() != before;
        }
        changed
    }

    /// Removes every reference to any id in `ids`, as keys and as values.
    pub fn purge(&mut self, ids: &BTreeSet<String>) {
        self.order.retain(|parent, _| !ids.contains(parent));
        for list in self.order.values_mut() {
            list.retain(|entry| !ids.contains(entry));
        }
        self.hidden.retain(|id| !ids.contains(id));
        self.titles.retain(|id, _| !ids.contains(id));
        self.virtual_parent
            .retain(|child, parent| !ids.contains(child) && !ids.contains(parent));
    }
}

/// A node of the merged tree. Rebuilt on every reconciliation pass.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderedNode {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<RenderedNode>>,
    pub is_hidden: bool,
    #[serde(rename = "dateAdded")]
    pub date_added_ms: i64,
}

impl RenderedNode {
    pub fn is_folder(&self) -> bool {
        self.children.is_some()
    }

    pub fn child_ids(&self) -> Vec<&str> {
        self.children
            .iter()
            .flatten()
            .map(|child| child.id.as_str())
            .collect()
    }

    pub fn find(&self, id: &str) -> Option<&RenderedNode> {
        if self.id == id {
            return Some(self);
        }
        self.children
            .iter()
            .flatten()
            .find_map(|child| child.find(id))
    }
}

pub fn find_rendered<'a>(roots: &'a [RenderedNode], id: &str) -> Option<&'a RenderedNode> {
    roots.iter().find_map(|root| root.find(id))
}

/// Folders currently shown expanded. Presentation state, persisted apart from the overlay.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExpandedState(pub BTreeSet<String>);

impl ExpandedState {
    pub fn is_expanded(&self, id: &str) -> bool {
        self.0.contains(id)
    }

    /// Returns whether the set changed.
    pub fn toggle(&mut self, id: &str, expanded: bool) -> bool {
        if expanded {
            self.0.insert(id.to_string())
        } else {
            self.0.remove(id)
        }
    }
}

/// Explicit presentation state handed to the reconciler boundary.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ViewState {
    pub show_hidden: bool,
    pub expanded: ExpandedState,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpenFlag {
    NewForegroundTab,
    ReloadCurrentTab,
    NewBackgroundTab,
    #[default]
    Unset,
}

impl OpenFlag {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NewForegroundTab => "new_foreground_tab",
            Self::ReloadCurrentTab => "reload_current_tab",
            Self::NewBackgroundTab => "new_background_tab",
            Self::Unset => "unset",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "new_foreground_tab" | "foreground" => Some(Self::NewForegroundTab),
            "reload_current_tab" | "reload" => Some(Self::ReloadCurrentTab),
            "new_background_tab" | "background" => Some(Self::NewBackgroundTab),
            "unset" | "default" => Some(Self::Unset),
            _ => None,
        }
    }

    pub fn actionable(self) -> Option<ActionableOpenFlag> {
        match self {
            Self::NewForegroundTab => Some(ActionableOpenFlag::NewForegroundTab),
            Self::ReloadCurrentTab => Some(ActionableOpenFlag::ReloadCurrentTab),
            Self::NewBackgroundTab => Some(ActionableOpenFlag::NewBackgroundTab),
            Self::Unset => None,
        }
    }
}

/// An [`OpenFlag`] with `Unset` already resolved away.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ActionableOpenFlag {
    NewForegroundTab,
    ReloadCurrentTab,
    NewBackgroundTab,
}

pub type OpenFlagMap = BTreeMap<String, OpenFlag>;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CreateNode {
    pub parent_id: String,
    pub title: String,
    pub url: Option<String>,
    pub index: Option<usize>,
}

pub type TabId = u64;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tab {
    pub id: TabId,
    pub url: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub active: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WindowRef {
    Current,
    Id(u64),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TreeEvent {
    Created { id: String, node: BookmarkNode },
    Removed { id: String },
    Moved { id: String },
    Changed { id: String },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StorageChange {
    pub key: String,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
}

/// Everything the sync coordinator listens to, on one channel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChangeEvent {
    Tree(TreeEvent),
    Storage(StorageChange),
}
