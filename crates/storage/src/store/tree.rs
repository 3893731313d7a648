#![forbid(unsafe_code)]

use super::{SqliteStore, StoreError, from_sqlite_usize, now_ms, schema, to_sqlite_i64};
use rusqlite::{OptionalExtension, Transaction, params};
use sm_core::ports::TreeStore;
use sm_core::{BookmarkNode, ChangeEvent, CreateNode, ROOT_ID, ShelfError, TreeEvent};
use std::collections::HashMap;
use std::sync::mpsc::Sender;

#[derive(Clone, Debug)]
struct NodeRow {
    id: String,
    parent_id: Option<String>,
    position: usize,
    title: String,
    url: Option<String>,
    date_added_ms: i64,
}

impl NodeRow {
    fn is_folder(&self) -> bool {
        self.url.is_none()
    }

    fn into_node(self) -> BookmarkNode {
        BookmarkNode {
            id: self.id,
            title: self.title,
            url: self.url,
            parent_id: self.parent_id,
            children: Vec::new(),
            date_added_ms: self.date_added_ms,
        }
    }
}

const NODE_COLUMNS: &str = "id, parent_id, position, title, url, date_added_ms";

fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<NodeRow> {
    Ok(NodeRow {
        id: row.get(0)?,
        parent_id: row.get(1)?,
        position: from_sqlite_usize(row.get(2)?),
        title: row.get(3)?,
        url: row.get(4)?,
        date_added_ms: row.get(5)?,
    })
}

impl SqliteStore {
    /// Authoritative rename (or URL change) of an existing node. Emits `Changed`.
    pub fn update_node(
        &mut self,
        id: &str,
        title: &str,
        url: Option<&str>,
    ) -> Result<(), StoreError> {
        let tx = self.conn.transaction()?;
        let row = load_node_tx(&tx, id)?;
        if row.id == ROOT_ID {
            return Err(StoreError::InvalidInput("the root cannot be edited"));
        }
        if row.is_folder() && url.is_some() {
            return Err(StoreError::InvalidInput("folders have no url"));
        }
        let url = if row.is_folder() { None } else { url.or(row.url.as_deref()) };
        tx.execute(
            "UPDATE nodes SET title=?2, url=?3 WHERE id=?1",
            params![id, title, url],
        )?;
        tx.commit()?;

        self.notify(ChangeEvent::Tree(TreeEvent::Changed { id: id.to_string() }));
        Ok(())
    }

    fn tree_snapshot(&self) -> Result<Vec<BookmarkNode>, StoreError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {NODE_COLUMNS} FROM nodes WHERE parent_id IS NOT NULL \
             ORDER BY parent_id ASC, position ASC"
        ))?;
        let rows = stmt.query_map([], map_row)?;

        let mut by_parent: HashMap<String, Vec<NodeRow>> = HashMap::new();
        for row in rows {
            let row = row?;
            if let Some(parent_id) = row.parent_id.clone() {
                by_parent.entry(parent_id).or_default().push(row);
            }
        }

        let top_level = by_parent.remove(ROOT_ID).unwrap_or_default();
        Ok(top_level
            .into_iter()
            .map(|row| assemble(row, &mut by_parent))
            .collect())
    }

    fn children_snapshot(&self, parent_id: &str) -> Result<Vec<BookmarkNode>, StoreError> {
        let parent = load_node(&self.conn, parent_id)?;
        if !parent.is_folder() {
            return Ok(Vec::new());
        }
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {NODE_COLUMNS} FROM nodes WHERE parent_id=?1 ORDER BY position ASC"
        ))?;
        let rows = stmt.query_map(params![parent_id], map_row)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?.into_node());
        }
        Ok(out)
    }

    fn create_node(&mut self, request: CreateNode) -> Result<BookmarkNode, StoreError> {
        let CreateNode {
            parent_id,
            title,
            url,
            index,
        } = request;
        if parent_id == ROOT_ID {
            return Err(StoreError::InvalidInput(
                "nodes cannot be created directly under the root",
            ));
        }

        let tx = self.conn.transaction()?;
        let parent = load_node_tx(&tx, &parent_id)?;
        if !parent.is_folder() {
            return Err(StoreError::NotAFolder(parent_id));
        }

        let id = next_node_id_tx(&tx)?;
        let count = child_count_tx(&tx, &parent_id)?;
        let position = index.unwrap_or(count).min(count);
        shift_positions_tx(&tx, &parent_id, position, 1)?;

        let date_added_ms = now_ms();
        tx.execute(
            "INSERT INTO nodes(id, parent_id, position, title, url, date_added_ms) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                id,
                parent_id,
                to_sqlite_i64(position)?,
                title,
                url,
                date_added_ms
            ],
        )?;
        tx.commit()?;

        let node = BookmarkNode {
            id: id.clone(),
            title,
            url,
            parent_id: Some(parent_id),
            children: Vec::new(),
            date_added_ms,
        };
        tracing::debug!(id = %node.id, "created node");
        self.notify(ChangeEvent::Tree(TreeEvent::Created {
            id,
            node: node.clone(),
        }));
        Ok(node)
    }

    fn relocate(
        &mut self,
        id: &str,
        parent_id: &str,
        index: Option<usize>,
    ) -> Result<(), StoreError> {
        let tx = self.conn.transaction()?;
        let row = load_node_tx(&tx, id)?;
        ensure_movable(&row)?;
        if parent_id == ROOT_ID {
            return Err(StoreError::InvalidInput(
                "nodes cannot be moved directly under the root",
            ));
        }
        let target = load_node_tx(&tx, parent_id)?;
        if !target.is_folder() {
            return Err(StoreError::NotAFolder(parent_id.to_string()));
        }
        if is_self_or_ancestor_tx(&tx, id, parent_id)? {
            return Err(StoreError::Cycle {
                id: id.to_string(),
                parent_id: parent_id.to_string(),
            });
        }

        let old_parent = row.parent_id.clone().unwrap_or_default();
        let same_parent = old_parent == parent_id;

        // Index is relative to the target list before `id` leaves it.
        let requested = match index {
            Some(index) if same_parent && row.position < index => Some(index - 1),
            other => other,
        };

        detach_tx(&tx, &old_parent, row.position)?;
        let mut count = child_count_tx(&tx, parent_id)?;
        if same_parent {
            count = count.saturating_sub(1);
        }
        let position = requested.unwrap_or(count).min(count);
        shift_positions_tx(&tx, parent_id, position, 1)?;
        tx.execute(
            "UPDATE nodes SET parent_id=?2, position=?3 WHERE id=?1",
            params![id, parent_id, to_sqlite_i64(position)?],
        )?;
        tx.commit()?;

        tracing::debug!(id, parent_id, position, "moved node");
        self.notify(ChangeEvent::Tree(TreeEvent::Moved { id: id.to_string() }));
        Ok(())
    }

    fn delete_node(&mut self, id: &str, recursive: bool) -> Result<(), StoreError> {
        let tx = self.conn.transaction()?;
        let row = load_node_tx(&tx, id)?;
        ensure_movable(&row)?;
        if !recursive && child_count_tx(&tx, id)? > 0 {
            return Err(StoreError::FolderNotEmpty(id.to_string()));
        }

        let removed = tx.execute(
            "WITH RECURSIVE subtree(id) AS ( \
               SELECT ?1 \
               UNION ALL \
               SELECT nodes.id FROM nodes JOIN subtree ON nodes.parent_id = subtree.id \
             ) \
             DELETE FROM nodes WHERE id IN (SELECT id FROM subtree)",
            params![id],
        )?;
        detach_tx(&tx, row.parent_id.as_deref().unwrap_or(ROOT_ID), row.position)?;
        tx.commit()?;

        tracing::debug!(id, removed, "removed node");
        self.notify(ChangeEvent::Tree(TreeEvent::Removed { id: id.to_string() }));
        Ok(())
    }
}

impl TreeStore for SqliteStore {
    fn get_tree(&self) -> Result<Vec<BookmarkNode>, ShelfError> {
        Ok(self.tree_snapshot()?)
    }

    fn get_children(&self, parent_id: &str) -> Result<Vec<BookmarkNode>, ShelfError> {
        Ok(self.children_snapshot(parent_id)?)
    }

    fn create(&mut self, request: CreateNode) -> Result<BookmarkNode, ShelfError> {
        Ok(self.create_node(request)?)
    }

    fn move_node(
        &mut self,
        id: &str,
        parent_id: &str,
        index: Option<usize>,
    ) -> Result<(), ShelfError> {
        Ok(self.relocate(id, parent_id, index)?)
    }

    fn remove(&mut self, id: &str) -> Result<(), ShelfError> {
        Ok(self.delete_node(id, false)?)
    }

    fn remove_subtree(&mut self, id: &str) -> Result<(), ShelfError> {
        Ok(self.delete_node(id, true)?)
    }

    fn subscribe(&mut self, sink: Sender<ChangeEvent>) {
        self.tree_sinks.push(sink);
    }
}

fn assemble(row: NodeRow, by_parent: &mut HashMap<String, Vec<NodeRow>>) -> BookmarkNode {
    let children = by_parent.remove(&row.id).unwrap_or_default();
    let mut node = row.into_node();
    node.children = children
        .into_iter()
        .map(|child| assemble(child, by_parent))
        .collect();
    node
}

fn ensure_movable(row: &NodeRow) -> Result<(), StoreError> {
    match row.parent_id.as_deref() {
        None | Some(ROOT_ID) => Err(StoreError::TopLevelImmovable(row.id.clone())),
        Some(_) => Ok(()),
    }
}

fn load_node(conn: &rusqlite::Connection, id: &str) -> Result<NodeRow, StoreError> {
    conn.query_row(
        &format!("SELECT {NODE_COLUMNS} FROM nodes WHERE id=?1"),
        params![id],
        map_row,
    )
    .optional()?
    .ok_or_else(|| StoreError::UnknownId(id.to_string()))
}

fn load_node_tx(tx: &Transaction<'_>, id: &str) -> Result<NodeRow, StoreError> {
    load_node(tx, id)
}

fn child_count_tx(tx: &Transaction<'_>, parent_id: &str) -> Result<usize, StoreError> {
    let count: i64 = tx.query_row(
        "SELECT COUNT(*) FROM nodes WHERE parent_id=?1",
        params![parent_id],
        |row| row.get(0),
    )?;
    Ok(from_sqlite_usize(count))
}

/// Shifts every sibling at or after `from` by `delta`.
fn shift_positions_tx(
    tx: &Transaction<'_>,
    parent_id: &str,
    from: usize,
    delta: i64,
) -> Result<(), StoreError> {
    tx.execute(
        "UPDATE nodes SET position = position + ?3 WHERE parent_id=?1 AND position >= ?2",
        params![parent_id, to_sqlite_i64(from)?, delta],
    )?;
    Ok(())
}

/// Closes the gap left at `position` under `parent_id`.
fn detach_tx(tx: &Transaction<'_>, parent_id: &str, position: usize) -> Result<(), StoreError> {
    shift_positions_tx(tx, parent_id, position + 1, -1)
}

/// Whether `id` is `candidate` itself or one of its ancestors.
fn is_self_or_ancestor_tx(
    tx: &Transaction<'_>,
    id: &str,
    candidate: &str,
) -> Result<bool, StoreError> {
    let mut current = Some(candidate.to_string());
    let mut guard = 0usize;
    while let Some(node_id) = current {
        if node_id == id {
            return Ok(true);
        }
        guard += 1;
        if guard > 100_000 {
            return Err(StoreError::InvalidInput("parent chain does not terminate"));
        }
        current = tx
            .query_row(
                "SELECT parent_id FROM nodes WHERE id=?1",
                params![node_id],
                |row| row.get::<_, Option<String>>(0),
            )
            .optional()?
            .flatten();
    }
    Ok(false)
}

fn next_node_id_tx(tx: &Transaction<'_>) -> Result<String, StoreError> {
    tx.execute(
        "UPDATE counters SET value = value + 1 WHERE name=?1",
        params![schema::NODE_ID_COUNTER],
    )?;
    let next: i64 = tx.query_row(
        "SELECT value FROM counters WHERE name=?1",
        params![schema::NODE_ID_COUNTER],
        |row| row.get(0),
    )?;
    Ok(next.to_string())
}
