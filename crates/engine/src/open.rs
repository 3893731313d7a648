#![forbid(unsafe_code)]

use sm_core::open_policy::resolve_for;
use sm_core::ports::TabController;
use sm_core::{ActionableOpenFlag, OpenFlag, OpenFlagMap, ShelfError, Tab, TabId, WindowRef};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OpenOutcome {
    Created(Tab),
    Reloaded(TabId),
}

pub fn execute<C: TabController>(
    tabs: &mut C,
    flag: ActionableOpenFlag,
    url: &str,
) -> Result<OpenOutcome, ShelfError> {
    match flag {
        ActionableOpenFlag::NewForegroundTab => Ok(OpenOutcome::Created(tabs.create_tab(url, true)?)),
        ActionableOpenFlag::NewBackgroundTab => {
            Ok(OpenOutcome::Created(tabs.create_tab(url, false)?))
        }
        ActionableOpenFlag::ReloadCurrentTab => match tabs.query_active_tab(WindowRef::Current)? {
            Some(active) => {
                tabs.update_tab(active.id, url)?;
                Ok(OpenOutcome::Reloaded(active.id))
            }
            None => {
                tracing::debug!("no active tab; opening a new one");
                Ok(OpenOutcome::Created(tabs.create_tab(url, true)?))
            }
        },
    }
}

/// Opens `url` for bookmark `id` with its resolved flag. `force_background` (a middle click)
/// skips resolution.
pub fn open_bookmark<C: TabController>(
    tabs: &mut C,
    flags: &OpenFlagMap,
    default_flag: OpenFlag,
    id: &str,
    url: &str,
    force_background: bool,
) -> Result<OpenOutcome, ShelfError> {
    let flag = if force_background {
        ActionableOpenFlag::NewBackgroundTab
    } else {
        resolve_for(flags, default_flag, id)
    };
    tracing::debug!(id, ?flag, "opening bookmark");
    execute(tabs, flag, url)
}
