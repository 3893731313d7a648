#![forbid(unsafe_code)]

mod config;
mod render;
mod tabs;

use config::{CliConfig, Command, DEFAULT_LOG_FILTER, env_var, parse_args, usage};
use serde_json::{Value, json};
use sm_core::ShelfError;
use sm_engine::{OpenOutcome, Shelf};
use sm_storage::SqliteStore;
use tabs::ConsoleTabs;
use tracing_subscriber::EnvFilter;

type CliShelf = Shelf<SqliteStore, SqliteStore, ConsoleTabs>;

fn init_logging() {
    let filter = env_var("SHELFMARK_LOG")
        .and_then(|raw| EnvFilter::try_new(raw).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_LOG_FILTER));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn open_shelf(cfg: &CliConfig) -> Result<CliShelf, ShelfError> {
    let tree = SqliteStore::open(&cfg.storage_dir)?;
    let kv = SqliteStore::open(&cfg.storage_dir)?;
    let tabs = match &cfg.command {
        Command::SaveSession { urls, .. } => ConsoleTabs::with_urls(urls),
        _ => ConsoleTabs::default(),
    };
    tracing::debug!(storage_dir = %cfg.storage_dir.display(), "opening shelf");
    Ok(Shelf::new(tree, kv, tabs).with_show_hidden(cfg.show_hidden))
}

fn emit(json_mode: bool, value: Value, text: String) {
    if json_mode {
        match serde_json::to_string_pretty(&value) {
            Ok(encoded) => println!("{encoded}"),
            Err(err) => eprintln!("encode output: {err}"),
        }
    } else if !text.is_empty() {
        println!("{text}");
    }
}

fn skipped(what: &str) -> (Value, String) {
    (
        json!({ "ok": false, "skipped": what }),
        format!("nothing done: {what} not found"),
    )
}

fn run(cfg: CliConfig) -> Result<(), ShelfError> {
    let mut shelf = open_shelf(&cfg)?;
    let rendered = shelf.mount()?;

    let (value, text) = match cfg.command {
        Command::Tree => {
            let value = serde_json::to_value(rendered.as_ref()).unwrap_or(Value::Null);
            (value, render::tree_text(&rendered.roots, &shelf.view().expanded))
        }
        Command::Search { query } => {
            let hits = shelf.search(&query);
            let value = serde_json::to_value(&hits).unwrap_or(Value::Null);
            (value, render::hits_text(&hits))
        }
        Command::Add {
            parent,
            title,
            url,
            index,
        } => match shelf.create_bookmark(&parent, index, &title, &url)? {
            Some(node) => (
                json!({ "ok": true, "id": node.id }),
                format!("created bookmark {}", node.id),
            ),
            None => skipped("parent"),
        },
        Command::Mkdir {
            parent,
            title,
            index,
        } => match shelf.create_folder(&parent, index, &title)? {
            Some(node) => (
                json!({ "ok": true, "id": node.id }),
                format!("created folder {}", node.id),
            ),
            None => skipped("parent"),
        },
        Command::Move { id, parent, index } => {
            shelf.move_node(&id, &parent, index)?;
            done("moved", &id)
        }
        Command::Drop { id, target } => {
            shelf.drop_on(&id, &target)?;
            done("dropped", &id)
        }
        Command::Rename { id, title } => {
            shelf.rename(&id, &title)?;
            done("renamed", &id)
        }
        Command::Hide { id } => {
            shelf.hide(&id)?;
            done("hidden", &id)
        }
        Command::Restore { id } => {
            shelf.restore(&id)?;
            done("restored", &id)
        }
        Command::Delete { id } => {
            shelf.delete(&id)?;
            done("deleted", &id)
        }
        Command::Expand { id } => {
            shelf.toggle_node(&id, true)?;
            done("expanded", &id)
        }
        Command::Collapse { id } => {
            shelf.toggle_node(&id, false)?;
            done("collapsed", &id)
        }
        Command::Flag { id, flag } => {
            shelf.set_flag(&id, flag)?;
            (
                json!({ "ok": true, "id": id, "flag": flag.as_str() }),
                format!("{id}: {}", flag.as_str()),
            )
        }
        Command::FlagDefault { flag } => {
            shelf.set_default_flag(flag)?;
            (
                json!({ "ok": true, "default": flag.as_str() }),
                format!("default: {}", flag.as_str()),
            )
        }
        Command::FlagFolder {
            id,
            flag,
            recursive,
        } => match shelf.bulk_set_flag(&id, flag, recursive)? {
            Some(updated) => (
                json!({ "ok": true, "updated": updated, "flag": flag.as_str() }),
                format!("{updated} bookmark(s) set to {}", flag.as_str()),
            ),
            None => skipped("folder"),
        },
        Command::Open { id, background } => {
            let outcome = shelf.open(&id, background)?;
            let value = match &outcome {
                OpenOutcome::Created(tab) => {
                    json!({ "ok": true, "created": tab.id, "active": tab.active })
                }
                OpenOutcome::Reloaded(tab_id) => json!({ "ok": true, "reloaded": tab_id }),
            };
            (value, shelf.tabs().actions().join("\n"))
        }
        Command::SaveSession { parent, .. } => match shelf.save_session(&parent)? {
            Some(saved) => (
                json!({
                    "ok": true,
                    "folder": saved.folder.id,
                    "title": saved.folder.title,
                    "bookmarks": saved.bookmarks.len(),
                }),
                format!(
                    "saved {} tab(s) into {} ({})",
                    saved.bookmarks.len(),
                    saved.folder.title,
                    saved.folder.id
                ),
            ),
            None => skipped("parent"),
        },
        Command::Reset => {
            shelf.reset_overlay()?;
            (json!({ "ok": true }), "overlay cleared".to_string())
        }
    };

    emit(cfg.json, value, text);
    Ok(())
}

fn done(verb: &str, id: &str) -> (Value, String) {
    (json!({ "ok": true, "id": id }), format!("{verb} {id}"))
}

fn main() {
    let args = std::env::args().skip(1).collect::<Vec<_>>();
    if args.iter().any(|a| a == "-h" || a == "--help") {
        print!("{}", usage());
        std::process::exit(0);
    }

    let cfg = parse_args(&args).unwrap_or_else(|e| {
        eprintln!("{e}");
        std::process::exit(2);
    });
    init_logging();

    if let Err(err) = run(cfg) {
        eprintln!("{}: {}", err.code(), err.message());
        std::process::exit(1);
    }
}
