#![forbid(unsafe_code)]

use sm_core::{NodeId, OpenFlag};
use std::path::PathBuf;

pub(crate) const DEFAULT_LOG_FILTER: &str = "warn";

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Command {
    Tree,
    Search {
        query: String,
    },
    Add {
        parent: String,
        title: String,
        url: String,
        index: Option<usize>,
    },
    Mkdir {
        parent: String,
        title: String,
        index: Option<usize>,
    },
    Move {
        id: String,
        parent: String,
        index: Option<usize>,
    },
    Drop {
        id: String,
        target: String,
    },
    Rename {
        id: String,
        title: String,
    },
    Hide {
        id: String,
    },
    Restore {
        id: String,
    },
    Delete {
        id: String,
    },
    Expand {
        id: String,
    },
    Collapse {
        id: String,
    },
    Flag {
        id: String,
        flag: OpenFlag,
    },
    FlagDefault {
        flag: OpenFlag,
    },
    FlagFolder {
        id: String,
        flag: OpenFlag,
        recursive: bool,
    },
    Open {
        id: String,
        background: bool,
    },
    SaveSession {
        parent: String,
        urls: Vec<String>,
    },
    Reset,
}

#[derive(Debug)]
pub(crate) struct CliConfig {
    pub(crate) storage_dir: PathBuf,
    pub(crate) show_hidden: bool,
    pub(crate) json: bool,
    pub(crate) command: Command,
}

pub(crate) fn usage() -> &'static str {
    "shelfmark: bookmark tree with a cosmetic overlay\n\n\
USAGE:\n\
  shelfmark [--storage-dir DIR] [--show-hidden] [--json] <COMMAND> [ARGS]\n\n\
COMMANDS:\n\
  tree                              print the rendered tree\n\
  search QUERY                      match titles and urls\n\
  add PARENT TITLE URL [--index N]  create a bookmark\n\
  mkdir PARENT TITLE [--index N]    create a folder\n\
  move ID PARENT [--index N]        move a node (index counts the current children)\n\
  drop ID TARGET                    drag ID onto TARGET\n\
  rename ID TITLE                   override the shown title (blank clears)\n\
  hide ID | restore ID              soft-delete / undo soft-delete\n\
  delete ID                         remove a node and its subtree\n\
  expand ID | collapse ID           persist folder expansion\n\
  flag ID FLAG                      per-bookmark open behaviour\n\
  flag-default FLAG                 global open behaviour\n\
  flag-folder ID FLAG [--recursive] flag every bookmark in a folder\n\
  open ID [--background]            open a bookmark\n\
  save-session PARENT URL...        bookmark the given tabs into a new folder\n\
  reset                             clear the overlay\n\n\
FLAGS: foreground | background | reload | unset\n\n\
ENV:\n\
  SHELFMARK_STORAGE_DIR, SHELFMARK_SHOW_HIDDEN, SHELFMARK_LOG (default: warn)\n"
}

pub(crate) fn env_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_flag(name: &str) -> bool {
    matches!(
        env_var(name).as_deref(),
        Some("1") | Some("true") | Some("TRUE") | Some("yes") | Some("YES")
    )
}

fn default_storage_dir() -> PathBuf {
    if let Some(base) = env_var("XDG_DATA_HOME") {
        return PathBuf::from(base).join("shelfmark");
    }
    if let Some(home) = env_var("HOME") {
        return PathBuf::from(home).join(".local").join("share").join("shelfmark");
    }
    PathBuf::from(".shelfmark")
}

pub(crate) fn parse_args(args: &[String]) -> Result<CliConfig, String> {
    let mut storage_dir: Option<PathBuf> = env_var("SHELFMARK_STORAGE_DIR").map(PathBuf::from);
    let mut show_hidden = env_flag("SHELFMARK_SHOW_HIDDEN");
    let mut json = false;
    let mut index: Option<usize> = None;
    let mut recursive = false;
    let mut background = false;
    let mut positional: Vec<String> = Vec::new();

    let mut i = 0usize;
    while i < args.len() {
        let a = args[i].as_str();
        match a {
            "--storage-dir" => {
                i += 1;
                let v = args.get(i).ok_or("--storage-dir requires DIR")?;
                storage_dir = Some(PathBuf::from(v));
            }
            "--show-hidden" => show_hidden = true,
            "--json" => json = true,
            "--index" => {
                i += 1;
                let v = args.get(i).ok_or("--index requires N")?;
                index = Some(
                    v.parse::<usize>()
                        .map_err(|_| "--index must be a non-negative integer")?,
                );
            }
            "--recursive" => recursive = true,
            "--background" => background = true,
            other if other.starts_with("--") => {
                return Err(format!("unknown flag: {other}\n\n{}", usage()));
            }
            other => positional.push(other.to_string()),
        }
        i += 1;
    }

    let command = parse_command(&positional, index, recursive, background)?;
    Ok(CliConfig {
        storage_dir: storage_dir.unwrap_or_else(default_storage_dir),
        show_hidden,
        json,
        command,
    })
}

fn parse_command(
    positional: &[String],
    index: Option<usize>,
    recursive: bool,
    background: bool,
) -> Result<Command, String> {
    let Some((name, rest)) = positional.split_first() else {
        return Err(format!("missing command\n\n{}", usage()));
    };
    let arg = |n: usize, what: &str| -> Result<String, String> {
        rest.get(n)
            .cloned()
            .ok_or_else(|| format!("{name} requires {what}"))
    };
    let id = |n: usize, what: &str| -> Result<String, String> {
        let raw = arg(n, what)?;
        NodeId::try_new(raw)
            .map(NodeId::into_string)
            .map_err(|err| format!("{what}: {}", err.message()))
    };
    let flag = |n: usize| -> Result<OpenFlag, String> {
        let raw = arg(n, "FLAG")?;
        OpenFlag::parse(&raw).ok_or_else(|| format!("unknown open flag: {raw}"))
    };

    let command = match name.as_str() {
        "tree" => Command::Tree,
        "search" => Command::Search {
            query: rest.join(" "),
        },
        "add" => Command::Add {
            parent: id(0, "PARENT")?,
            title: arg(1, "TITLE")?,
            url: arg(2, "URL")?,
            index,
        },
        "mkdir" => Command::Mkdir {
            parent: id(0, "PARENT")?,
            title: arg(1, "TITLE")?,
            index,
        },
        "move" => Command::Move {
            id: id(0, "ID")?,
            parent: id(1, "PARENT")?,
            index,
        },
        "drop" => Command::Drop {
            id: id(0, "ID")?,
            target: id(1, "TARGET")?,
        },
        "rename" => Command::Rename {
            id: id(0, "ID")?,
            title: rest.get(1..).map(|parts| parts.join(" ")).unwrap_or_default(),
        },
        "hide" => Command::Hide { id: id(0, "ID")? },
        "restore" => Command::Restore { id: id(0, "ID")? },
        "delete" => Command::Delete { id: id(0, "ID")? },
        "expand" => Command::Expand { id: id(0, "ID")? },
        "collapse" => Command::Collapse { id: id(0, "ID")? },
        "flag" => Command::Flag {
            id: id(0, "ID")?,
            flag: flag(1)?,
        },
        "flag-default" => Command::FlagDefault { flag: flag(0)? },
        "flag-folder" => Command::FlagFolder {
            id: id(0, "ID")?,
            flag: flag(1)?,
            recursive,
        },
        "open" => Command::Open {
            id: id(0, "ID")?,
            background,
        },
        "save-session" => Command::SaveSession {
            parent: id(0, "PARENT")?,
            urls: rest.get(1..).map(<[String]>::to_vec).unwrap_or_default(),
        },
        "reset" => Command::Reset,
        other => return Err(format!("unknown command: {other}\n\n{}", usage())),
    };
    Ok(command)
}
