#![forbid(unsafe_code)]

use sm_core::ports::{PersistenceStore, TabController, TreeStore};
use sm_core::{CreateNode, OpenFlag, ShelfError, Tab, TabId, WindowRef, find_rendered};
use sm_engine::{OpenOutcome, RefreshMode, Shelf, SyncCoordinator, SyncState, TreeUpdate};
use sm_storage::{OVERLAY_KEY, OverlayStore, SqliteStore};
use std::path::{Path, PathBuf};

fn temp_dir(test_name: &str) -> PathBuf {
    let base = std::env::temp_dir();
    let pid = std::process::id();
    let nonce = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis();
    let dir = base.join(format!("sm_engine_{test_name}_{pid}_{nonce}"));
    std::fs::create_dir_all(&dir).expect("create temp dir");
    dir
}

#[derive(Default)]
struct RecordingTabs {
    tabs: Vec<Tab>,
    updates: Vec<(TabId, String)>,
}

impl TabController for RecordingTabs {
    fn create_tab(&mut self, url: &str, active: bool) -> Result<Tab, ShelfError> {
        let tab = Tab {
            id: self.tabs.len() as TabId + 1,
            url: url.to_string(),
            title: String::new(),
            active,
        };
        self.tabs.push(tab.clone());
        Ok(tab)
    }

    fn query_active_tab(&self, _window: WindowRef) -> Result<Option<Tab>, ShelfError> {
        Ok(self.tabs.iter().rev().find(|tab| tab.active).cloned())
    }

    fn update_tab(&mut self, tab_id: TabId, url: &str) -> Result<(), ShelfError> {
        self.updates.push((tab_id, url.to_string()));
        Ok(())
    }

    fn query_all_tabs(&self, _window: WindowRef) -> Result<Vec<Tab>, ShelfError> {
        Ok(self.tabs.clone())
    }
}

type TestShelf = Shelf<SqliteStore, SqliteStore, RecordingTabs>;

/// Seeds Bookmarks Bar with [A: [X, Y], B] and returns (a, x, y, b).
fn seed(storage_dir: &Path) -> (String, String, String, String) {
    let mut tree = SqliteStore::open(storage_dir).expect("open store");
    let mut create = |parent: &str, title: &str, url: Option<&str>| {
        tree.create(CreateNode {
            parent_id: parent.to_string(),
            title: title.to_string(),
            url: url.map(str::to_string),
            index: None,
        })
        .expect("create")
        .id
    };
    let a = create("1", "A", None);
    let x = create(&a, "X", Some("https://x.example"));
    let y = create(&a, "Y", Some("https://y.example"));
    let b = create("1", "B", Some("https://b.example"));
    (a, x, y, b)
}

fn shelf(storage_dir: &Path) -> TestShelf {
    Shelf::new(
        SqliteStore::open(storage_dir).expect("open tree store"),
        SqliteStore::open(storage_dir).expect("open kv store"),
        RecordingTabs::default(),
    )
}

fn bar_children(shelf: &TestShelf) -> Vec<String> {
    let rendered = shelf.rendered().expect("rendered");
    find_rendered(&rendered.roots, "1")
        .expect("bar")
        .child_ids()
        .into_iter()
        .map(str::to_string)
        .collect()
}

#[test]
fn mount_publishes_loading_then_ready() {
    let storage_dir = temp_dir("mount_publishes_loading_then_ready");
    seed(&storage_dir);
    let mut shelf = shelf(&storage_dir);
    let updates = shelf.subscribe();

    let tree = shelf.mount().expect("mount");
    assert_eq!(tree.generation, 1);

    assert_eq!(updates.try_recv().expect("loading"), TreeUpdate::Loading);
    match updates.try_recv().expect("ready") {
        TreeUpdate::Ready(published) => assert_eq!(published, tree),
        other => panic!("unexpected update: {other:?}"),
    }
    assert!(updates.try_recv().is_err());
}

#[test]
fn scenario_order_renders_b_before_a() {
    let storage_dir = temp_dir("scenario_order_renders_b_before_a");
    let (a, x, y, b) = seed(&storage_dir);
    {
        let mut overlay = OverlayStore::new(SqliteStore::open(&storage_dir).expect("open"));
        let mut state = overlay.load().expect("load");
        state.order.insert("1".to_string(), vec![b.clone(), a.clone()]);
        overlay.save(&state).expect("save");
    }

    let mut shelf = shelf(&storage_dir);
    let tree = shelf.mount().expect("mount");
    let bar = find_rendered(&tree.roots, "1").expect("bar");
    assert_eq!(bar.child_ids(), vec![b.as_str(), a.as_str()]);
    let folder = find_rendered(&tree.roots, &a).expect("A");
    assert_eq!(folder.child_ids(), vec![x.as_str(), y.as_str()]);
}

#[test]
fn mutations_publish_silent_passes() {
    let storage_dir = temp_dir("mutations_publish_silent_passes");
    let (a, _x, _y, b) = seed(&storage_dir);
    let mut shelf = shelf(&storage_dir);
    shelf.mount().expect("mount");
    let updates = shelf.subscribe();

    shelf.move_node(&b, "1", Some(0)).expect("move");

    // Authoritative move and overlay save each trigger one pass.
    let published: Vec<TreeUpdate> = updates.try_iter().collect();
    assert_eq!(published.len(), 2);
    assert!(
        published
            .iter()
            .all(|update| matches!(update, TreeUpdate::Ready(_)))
    );
    assert_eq!(bar_children(&shelf), vec![b, a]);
    assert_eq!(shelf.rendered().expect("rendered").generation, 3);
}

#[test]
fn hide_respects_the_show_hidden_view_flag() {
    let storage_dir = temp_dir("hide_respects_the_show_hidden_view_flag");
    let (a, x, y, _b) = seed(&storage_dir);
    let mut shelf = shelf(&storage_dir);
    shelf.mount().expect("mount");

    shelf.hide(&x).expect("hide");
    let rendered = shelf.rendered().expect("rendered");
    let folder = find_rendered(&rendered.roots, &a).expect("A");
    assert_eq!(folder.child_ids(), vec![y.as_str()]);

    let rendered = shelf.set_show_hidden(true).expect("show hidden");
    let folder = find_rendered(&rendered.roots, &a).expect("A");
    assert_eq!(folder.child_ids(), vec![x.as_str(), y.as_str()]);
    assert!(find_rendered(&rendered.roots, &x).expect("X").is_hidden);
}

#[test]
fn not_found_is_swallowed_after_a_forced_refresh() {
    let storage_dir = temp_dir("not_found_is_swallowed_after_a_forced_refresh");
    seed(&storage_dir);
    let mut shelf = shelf(&storage_dir);
    shelf.mount().expect("mount");
    let updates = shelf.subscribe();

    shelf.hide("404").expect("not found is a no-op");
    assert_eq!(shelf.create_folder("404", None, "x").expect("no-op"), None);

    let published: Vec<TreeUpdate> = updates.try_iter().collect();
    assert_eq!(published.len(), 4);
    assert_eq!(published[0], TreeUpdate::Loading);
    assert_eq!(published[2], TreeUpdate::Loading);
}

#[test]
fn other_failures_are_returned_after_a_forced_refresh() {
    let storage_dir = temp_dir("other_failures_are_returned_after_a_forced_refresh");
    seed(&storage_dir);
    let mut shelf = shelf(&storage_dir);
    shelf.mount().expect("mount");
    let updates = shelf.subscribe();

    let err = shelf.move_node("1", "2", None).expect_err("top-level");
    assert!(matches!(err, ShelfError::InvalidOperation(_)));
    assert_eq!(updates.try_recv().expect("loading"), TreeUpdate::Loading);
    assert!(matches!(updates.try_recv().expect("ready"), TreeUpdate::Ready(_)));
}

#[test]
fn drop_uses_the_persisted_expanded_state() {
    let storage_dir = temp_dir("drop_uses_the_persisted_expanded_state");
    let (a, x, y, b) = seed(&storage_dir);
    {
        let mut shelf = shelf(&storage_dir);
        assert!(shelf.toggle_node(&a, true).expect("expand"));
        assert!(!shelf.toggle_node(&a, true).expect("already expanded"));
    }

    let mut shelf = shelf(&storage_dir);
    assert!(shelf.view().expanded.is_expanded(&a));
    shelf.mount().expect("mount");

    // A is expanded, so dropping B on it places B beside A rather than inside.
    shelf.drop_on(&b, &a).expect("drop");
    assert_eq!(bar_children(&shelf), vec![b.clone(), a.clone()]);
    let rendered = shelf.rendered().expect("rendered");
    let folder = find_rendered(&rendered.roots, &a).expect("A");
    assert_eq!(folder.child_ids(), vec![x.as_str(), y.as_str()]);

    shelf.toggle_node(&a, false).expect("collapse");
    shelf.drop_on(&b, &a).expect("drop inside");
    let rendered = shelf.rendered().expect("rendered");
    let folder = find_rendered(&rendered.roots, &a).expect("A");
    assert_eq!(folder.child_ids(), vec![x.as_str(), y.as_str(), b.as_str()]);
}

#[test]
fn delete_drops_expanded_entries() {
    let storage_dir = temp_dir("delete_drops_expanded_entries");
    let (a, _x, _y, b) = seed(&storage_dir);
    let mut shelf = shelf(&storage_dir);
    shelf.mount().expect("mount");
    shelf.toggle_node(&a, true).expect("expand");

    shelf.delete(&a).expect("delete");
    assert!(!shelf.view().expanded.is_expanded(&a));
    assert_eq!(bar_children(&shelf), vec![b]);
}

#[test]
fn open_resolves_local_then_default_flags() {
    let storage_dir = temp_dir("open_resolves_local_then_default_flags");
    let (_a, x, y, b) = seed(&storage_dir);
    let mut shelf = shelf(&storage_dir);
    shelf.mount().expect("mount");

    let outcome = shelf.open(&b, false).expect("open default");
    assert!(matches!(outcome, OpenOutcome::Created(ref tab) if !tab.active));

    shelf
        .set_default_flag(OpenFlag::NewForegroundTab)
        .expect("default");
    let outcome = shelf.open(&x, false).expect("open foreground");
    assert!(matches!(outcome, OpenOutcome::Created(ref tab) if tab.active));

    shelf.set_flag(&y, OpenFlag::ReloadCurrentTab).expect("flag");
    let outcome = shelf.open(&y, false).expect("open reload");
    assert!(matches!(outcome, OpenOutcome::Reloaded(_)));

    let outcome = shelf.open(&y, true).expect("forced background");
    assert!(matches!(outcome, OpenOutcome::Created(ref tab) if !tab.active));

    let err = shelf.open("1", false).expect_err("folder");
    assert!(matches!(err, ShelfError::InvalidOperation(_)));
}

#[test]
fn search_walks_the_rendered_tree() {
    let storage_dir = temp_dir("search_walks_the_rendered_tree");
    let (a, x, _y, _b) = seed(&storage_dir);
    let mut shelf = shelf(&storage_dir);
    assert!(shelf.search("x").is_empty());
    shelf.mount().expect("mount");

    shelf.rename(&a, "Reading").expect("rename");
    let hits = shelf.search("X.EXAMPLE");
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].id, x);
    assert_eq!(
        hits[0].path,
        vec!["Bookmarks Bar".to_string(), "Reading".to_string()]
    );
}

#[test]
fn save_session_shows_up_after_pump() {
    let storage_dir = temp_dir("save_session_shows_up_after_pump");
    seed(&storage_dir);
    let mut tabs = RecordingTabs::default();
    tabs.create_tab("https://one.example", true).expect("tab");
    tabs.create_tab("https://two.example", false).expect("tab");
    let mut shelf = Shelf::new(
        SqliteStore::open(&storage_dir).expect("open tree store"),
        SqliteStore::open(&storage_dir).expect("open kv store"),
        tabs,
    );
    shelf.mount().expect("mount");

    let saved = shelf
        .save_session("2")
        .expect("save")
        .expect("parent exists");
    let rendered = shelf.rendered().expect("rendered");
    let folder = find_rendered(&rendered.roots, &saved.folder.id).expect("session folder");
    assert_eq!(folder.child_ids().len(), 2);
    assert_eq!(shelf.tabs().tabs.len(), 2);
}

#[test]
fn external_writes_reach_the_coordinator_through_pump() {
    let storage_dir = temp_dir("external_writes_reach_the_coordinator_through_pump");
    let (a, _x, _y, _b) = seed(&storage_dir);
    let mut tree = SqliteStore::open(&storage_dir).expect("open tree store");
    let mut kv = SqliteStore::open(&storage_dir).expect("open kv store");
    let mut coordinator = SyncCoordinator::new();
    TreeStore::subscribe(&mut tree, coordinator.sink());
    PersistenceStore::subscribe(&mut kv, coordinator.sink());
    let overlay = OverlayStore::new(SqliteStore::open(&storage_dir).expect("open reader"));

    coordinator.mount(&tree, &overlay, false).expect("mount");

    tree.update_node(&a, "Renamed", None).expect("authoritative rename");
    kv.set("expanded", r#"["1"]"#).expect("unrelated key");
    kv.set(OVERLAY_KEY, r#"{"titles":{"1":"Bar"}}"#)
        .expect("overlay write");

    let passes = coordinator.pump(&tree, &overlay, false).expect("pump");
    assert_eq!(passes, 2);
    assert_eq!(coordinator.state(), SyncState::Idle);
    let rendered = coordinator.current().expect("rendered");
    assert_eq!(rendered.generation, 3);
    assert_eq!(rendered.roots[0].title, "Bar");
    assert_eq!(
        find_rendered(&rendered.roots, &a).expect("A").title,
        "Renamed"
    );
}

#[test]
fn unreadable_overlay_renders_as_empty() {
    let storage_dir = temp_dir("unreadable_overlay_renders_as_empty");
    let (a, _x, _y, b) = seed(&storage_dir);
    let mut shelf = shelf(&storage_dir);
    {
        let mut kv = SqliteStore::open(&storage_dir).expect("open kv store");
        kv.set(OVERLAY_KEY, "not json").expect("corrupt overlay");
    }

    let tree = shelf.refresh(RefreshMode::Silent).expect("refresh");
    let bar = find_rendered(&tree.roots, "1").expect("bar");
    assert_eq!(bar.child_ids(), vec![a.as_str(), b.as_str()]);
}

/// Tree store whose snapshots start failing once `snapshots_left` runs out.
struct FlakySnapshots {
    inner: SqliteStore,
    snapshots_left: std::rc::Rc<std::cell::Cell<usize>>,
}

impl TreeStore for FlakySnapshots {
    fn get_tree(&self) -> Result<Vec<sm_core::BookmarkNode>, ShelfError> {
        let left = self.snapshots_left.get();
        if left == 0 {
            return Err(ShelfError::StoreUnavailable("snapshot offline".to_string()));
        }
        self.snapshots_left.set(left - 1);
        self.inner.get_tree()
    }

    fn get_children(&self, parent_id: &str) -> Result<Vec<sm_core::BookmarkNode>, ShelfError> {
        self.inner.get_children(parent_id)
    }

    fn create(&mut self, request: CreateNode) -> Result<sm_core::BookmarkNode, ShelfError> {
        self.inner.create(request)
    }

    fn move_node(
        &mut self,
        id: &str,
        parent_id: &str,
        index: Option<usize>,
    ) -> Result<(), ShelfError> {
        self.inner.move_node(id, parent_id, index)
    }

    fn remove(&mut self, id: &str) -> Result<(), ShelfError> {
        TreeStore::remove(&mut self.inner, id)
    }

    fn remove_subtree(&mut self, id: &str) -> Result<(), ShelfError> {
        self.inner.remove_subtree(id)
    }

    fn subscribe(&mut self, sink: std::sync::mpsc::Sender<sm_core::ChangeEvent>) {
        TreeStore::subscribe(&mut self.inner, sink);
    }
}

#[test]
fn committed_mutation_succeeds_when_the_following_pass_fails() {
    let storage_dir = temp_dir("committed_mutation_succeeds_when_the_following_pass_fails");
    let (_a, x, _y, _b) = seed(&storage_dir);
    let snapshots_left = std::rc::Rc::new(std::cell::Cell::new(usize::MAX));
    let mut shelf = Shelf::new(
        FlakySnapshots {
            inner: SqliteStore::open(&storage_dir).expect("open tree store"),
            snapshots_left: snapshots_left.clone(),
        },
        SqliteStore::open(&storage_dir).expect("open kv store"),
        RecordingTabs::default(),
    );
    let mounted = shelf.mount().expect("mount");

    // One snapshot for the existence check, none for the pass after it.
    snapshots_left.set(1);
    shelf.hide(&x).expect("hide is committed");

    let overlay = OverlayStore::new(SqliteStore::open(&storage_dir).expect("open reader"));
    assert!(overlay.load().expect("overlay").hidden.contains(&x));
    let rendered = shelf.rendered().expect("rendered");
    assert_eq!(rendered.generation, mounted.generation);
}
