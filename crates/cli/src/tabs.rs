#![forbid(unsafe_code)]

use sm_core::ports::TabController;
use sm_core::{ShelfError, Tab, TabId, WindowRef};

/// Tab controller for a terminal: "opening" records what a browser would be asked to do.
///
/// Tabs handed in up front (from `save-session` arguments) form the current window; the first
/// one is active.
#[derive(Debug, Default)]
pub(crate) struct ConsoleTabs {
    tabs: Vec<Tab>,
    actions: Vec<String>,
}

impl ConsoleTabs {
    pub(crate) fn with_urls(urls: &[String]) -> Self {
        let tabs = urls
            .iter()
            .enumerate()
            .map(|(position, url)| Tab {
                id: position as TabId + 1,
                url: url.clone(),
                title: String::new(),
                active: position == 0,
            })
            .collect();
        Self {
            tabs,
            actions: Vec::new(),
        }
    }

    pub(crate) fn actions(&self) -> &[String] {
        &self.actions
    }

    fn next_id(&self) -> TabId {
        self.tabs.iter().map(|tab| tab.id).max().unwrap_or(0) + 1
    }
}

impl TabController for ConsoleTabs {
    fn create_tab(&mut self, url: &str, active: bool) -> Result<Tab, ShelfError> {
        if active {
            for tab in &mut self.tabs {
                tab.active = false;
            }
        }
        let tab = Tab {
            id: self.next_id(),
            url: url.to_string(),
            title: String::new(),
            active,
        };
        let kind = if active { "foreground" } else { "background" };
        self.actions.push(format!("open {kind} tab {}: {url}", tab.id));
        self.tabs.push(tab.clone());
        Ok(tab)
    }

    fn query_active_tab(&self, _window: WindowRef) -> Result<Option<Tab>, ShelfError> {
        Ok(self.tabs.iter().find(|tab| tab.active).cloned())
    }

    fn update_tab(&mut self, tab_id: TabId, url: &str) -> Result<(), ShelfError> {
        let Some(tab) = self.tabs.iter_mut().find(|tab| tab.id == tab_id) else {
            return Err(ShelfError::NotFound(format!("unknown tab: {tab_id}")));
        };
        tab.url = url.to_string();
        self.actions.push(format!("reload tab {tab_id}: {url}"));
        Ok(())
    }

    fn query_all_tabs(&self, _window: WindowRef) -> Result<Vec<Tab>, ShelfError> {
        Ok(self.tabs.clone())
    }
}
