#![forbid(unsafe_code)]

use sm_core::ports::{PersistenceStore, TreeStore};
use sm_core::{BookmarkNode, ChangeEvent, CreateNode, ShelfError, TreeEvent};
use sm_storage::SqliteStore;
use std::path::PathBuf;
use std::sync::mpsc;

fn temp_dir(test_name: &str) -> PathBuf {
    let base = std::env::temp_dir();
    let pid = std::process::id();
    let nonce = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis();
    let dir = base.join(format!("sm_storage_{test_name}_{pid}_{nonce}"));
    std::fs::create_dir_all(&dir).expect("create temp dir");
    dir
}

fn folder(store: &mut SqliteStore, parent: &str, title: &str) -> String {
    store
        .create(CreateNode {
            parent_id: parent.to_string(),
            title: title.to_string(),
            url: None,
            index: None,
        })
        .expect("create folder")
        .id
}

fn bookmark(store: &mut SqliteStore, parent: &str, title: &str) -> String {
    store
        .create(CreateNode {
            parent_id: parent.to_string(),
            title: title.to_string(),
            url: Some(format!("https://example.com/{title}")),
            index: None,
        })
        .expect("create bookmark")
        .id
}

fn child_titles(store: &SqliteStore, parent: &str) -> Vec<String> {
    store
        .get_children(parent)
        .expect("children")
        .into_iter()
        .map(|node| node.title)
        .collect()
}

#[test]
fn fresh_store_seeds_top_level_containers() {
    let storage_dir = temp_dir("fresh_store_seeds_top_level_containers");
    let store = SqliteStore::open(&storage_dir).expect("open store");

    let tree = store.get_tree().expect("tree");
    let ids: Vec<&str> = tree.iter().map(|node| node.id.as_str()).collect();
    assert_eq!(ids, vec!["1", "2", "3"]);
    assert!(tree.iter().all(BookmarkNode::is_folder));
    assert!(tree.iter().all(|node| node.parent_id.as_deref() == Some("0")));
}

#[test]
fn reopen_keeps_nodes_and_id_sequence() {
    let storage_dir = temp_dir("reopen_keeps_nodes_and_id_sequence");
    let first_id = {
        let mut store = SqliteStore::open(&storage_dir).expect("open store");
        bookmark(&mut store, "1", "a")
    };
    let mut store = SqliteStore::open(&storage_dir).expect("reopen store");
    let second_id = bookmark(&mut store, "1", "b");

    assert_eq!(first_id, "4");
    assert_eq!(second_id, "5");
    assert_eq!(child_titles(&store, "1"), vec!["a", "b"]);
}

#[test]
fn get_tree_nests_full_subtrees() {
    let storage_dir = temp_dir("get_tree_nests_full_subtrees");
    let mut store = SqliteStore::open(&storage_dir).expect("open store");
    let a = folder(&mut store, "1", "A");
    bookmark(&mut store, &a, "X");
    bookmark(&mut store, &a, "Y");
    bookmark(&mut store, "1", "B");

    let tree = store.get_tree().expect("tree");
    let bar = &tree[0];
    let titles: Vec<&str> = bar.children.iter().map(|n| n.title.as_str()).collect();
    assert_eq!(titles, vec!["A", "B"]);
    let nested: Vec<&str> = bar.children[0]
        .children
        .iter()
        .map(|n| n.title.as_str())
        .collect();
    assert_eq!(nested, vec!["X", "Y"]);

    let shallow = store.get_children("1").expect("children");
    assert!(shallow[0].children.is_empty());
}

#[test]
fn create_at_index_shifts_siblings() {
    let storage_dir = temp_dir("create_at_index_shifts_siblings");
    let mut store = SqliteStore::open(&storage_dir).expect("open store");
    bookmark(&mut store, "1", "a");
    bookmark(&mut store, "1", "c");
    store
        .create(CreateNode {
            parent_id: "1".to_string(),
            title: "b".to_string(),
            url: None,
            index: Some(1),
        })
        .expect("create at index");
    store
        .create(CreateNode {
            parent_id: "1".to_string(),
            title: "z".to_string(),
            url: None,
            index: Some(99),
        })
        .expect("create clamped");

    assert_eq!(child_titles(&store, "1"), vec!["a", "b", "c", "z"]);
}

#[test]
fn create_under_bookmark_is_rejected() {
    let storage_dir = temp_dir("create_under_bookmark_is_rejected");
    let mut store = SqliteStore::open(&storage_dir).expect("open store");
    let leaf = bookmark(&mut store, "1", "leaf");

    let err = store
        .create(CreateNode {
            parent_id: leaf,
            title: "child".to_string(),
            url: None,
            index: None,
        })
        .expect_err("bookmark cannot hold children");
    assert!(matches!(err, ShelfError::InvalidOperation(_)));

    let err = store
        .create(CreateNode {
            parent_id: "404".to_string(),
            title: "child".to_string(),
            url: None,
            index: None,
        })
        .expect_err("unknown parent");
    assert!(err.is_not_found());
}

#[test]
fn move_within_parent_uses_pre_removal_index() {
    let storage_dir = temp_dir("move_within_parent_uses_pre_removal_index");
    let mut store = SqliteStore::open(&storage_dir).expect("open store");
    let a = bookmark(&mut store, "1", "a");
    bookmark(&mut store, "1", "b");
    bookmark(&mut store, "1", "c");

    store.move_node(&a, "1", Some(2)).expect("move down");
    assert_eq!(child_titles(&store, "1"), vec!["b", "a", "c"]);

    store.move_node(&a, "1", None).expect("append");
    assert_eq!(child_titles(&store, "1"), vec!["b", "c", "a"]);

    store.move_node(&a, "1", Some(0)).expect("move up");
    assert_eq!(child_titles(&store, "1"), vec!["a", "b", "c"]);
}

#[test]
fn move_across_parents_closes_gaps() {
    let storage_dir = temp_dir("move_across_parents_closes_gaps");
    let mut store = SqliteStore::open(&storage_dir).expect("open store");
    bookmark(&mut store, "1", "a");
    let b = bookmark(&mut store, "1", "b");
    bookmark(&mut store, "1", "c");
    bookmark(&mut store, "2", "x");

    store.move_node(&b, "2", Some(0)).expect("move");
    assert_eq!(child_titles(&store, "1"), vec!["a", "c"]);
    assert_eq!(child_titles(&store, "2"), vec!["b", "x"]);

    let c = bookmark(&mut store, "1", "d");
    store.move_node(&c, "2", None).expect("append elsewhere");
    assert_eq!(child_titles(&store, "1"), vec!["a", "c"]);
    assert_eq!(child_titles(&store, "2"), vec!["b", "x", "d"]);
}

#[test]
fn move_rejects_top_level_cycles_and_leaf_targets() {
    let storage_dir = temp_dir("move_rejects_top_level_cycles_and_leaf_targets");
    let mut store = SqliteStore::open(&storage_dir).expect("open store");
    let outer = folder(&mut store, "1", "outer");
    let inner = folder(&mut store, &outer, "inner");
    let leaf = bookmark(&mut store, "1", "leaf");

    let err = store.move_node("1", "2", None).expect_err("top-level");
    assert!(matches!(err, ShelfError::InvalidOperation(_)));

    let err = store.move_node(&outer, &inner, None).expect_err("cycle");
    assert!(matches!(err, ShelfError::InvalidOperation(_)));

    let err = store.move_node(&outer, &outer, None).expect_err("self");
    assert!(matches!(err, ShelfError::InvalidOperation(_)));

    let err = store.move_node(&inner, &leaf, None).expect_err("leaf target");
    assert!(matches!(err, ShelfError::InvalidOperation(_)));

    let err = store.move_node(&leaf, "0", None).expect_err("root target");
    assert!(matches!(err, ShelfError::InvalidOperation(_)));
    assert!(err.message().contains("under the root"));
    assert!(!err.message().contains("top-level"));

    let err = store.move_node("404", "2", None).expect_err("unknown");
    assert!(err.is_not_found());

    assert_eq!(child_titles(&store, "1"), vec!["outer", "leaf"]);
    assert_eq!(child_titles(&store, &outer), vec!["inner"]);
}

#[test]
fn remove_requires_empty_folder_and_remove_subtree_does_not() {
    let storage_dir = temp_dir("remove_requires_empty_folder_and_remove_subtree_does_not");
    let mut store = SqliteStore::open(&storage_dir).expect("open store");
    let keep = bookmark(&mut store, "1", "keep");
    let a = folder(&mut store, "1", "A");
    let b = folder(&mut store, &a, "B");
    bookmark(&mut store, &b, "deep");
    bookmark(&mut store, "1", "tail");

    let err = TreeStore::remove(&mut store, &a).expect_err("not empty");
    assert!(matches!(err, ShelfError::InvalidOperation(_)));

    store.remove_subtree(&a).expect("remove subtree");
    assert_eq!(child_titles(&store, "1"), vec!["keep", "tail"]);
    assert!(store.get_children(&b).expect_err("gone").is_not_found());

    TreeStore::remove(&mut store, &keep).expect("remove bookmark");
    assert_eq!(child_titles(&store, "1"), vec!["tail"]);

    let err = store.remove_subtree("2").expect_err("top-level");
    assert!(matches!(err, ShelfError::InvalidOperation(_)));
}

#[test]
fn tree_mutations_notify_tree_subscribers_only() {
    let storage_dir = temp_dir("tree_mutations_notify_tree_subscribers_only");
    let mut store = SqliteStore::open(&storage_dir).expect("open store");
    let (tree_tx, tree_rx) = mpsc::channel();
    let (kv_tx, kv_rx) = mpsc::channel();
    TreeStore::subscribe(&mut store, tree_tx);
    PersistenceStore::subscribe(&mut store, kv_tx);

    let id = bookmark(&mut store, "1", "a");
    store.move_node(&id, "2", None).expect("move");
    store.update_node(&id, "renamed", None).expect("update");
    TreeStore::remove(&mut store, &id).expect("remove");

    let events: Vec<ChangeEvent> = tree_rx.try_iter().collect();
    assert_eq!(events.len(), 4);
    assert!(matches!(
        &events[0],
        ChangeEvent::Tree(TreeEvent::Created { id: created, node }) if *created == id && node.title == "a"
    ));
    assert_eq!(
        events[1],
        ChangeEvent::Tree(TreeEvent::Moved { id: id.clone() })
    );
    assert_eq!(
        events[2],
        ChangeEvent::Tree(TreeEvent::Changed { id: id.clone() })
    );
    assert_eq!(events[3], ChangeEvent::Tree(TreeEvent::Removed { id }));
    assert!(kv_rx.try_recv().is_err());
}

#[test]
fn dropped_subscribers_are_pruned() {
    let storage_dir = temp_dir("dropped_subscribers_are_pruned");
    let mut store = SqliteStore::open(&storage_dir).expect("open store");
    let (tx, rx) = mpsc::channel();
    TreeStore::subscribe(&mut store, tx);
    drop(rx);

    bookmark(&mut store, "1", "a");
    bookmark(&mut store, "1", "b");
    assert_eq!(child_titles(&store, "1"), vec!["a", "b"]);
}
