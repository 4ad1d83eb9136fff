//! Two-tab shell: which view is active, persisted across runs.

use std::fmt;
use std::str::FromStr;

use crate::storage::{SharedStorage, TAB_KEY};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Tab {
    #[default]
    Chat,
    Upload,
}

impl Tab {
    pub const ALL: [Tab; 2] = [Tab::Chat, Tab::Upload];

    pub fn as_str(&self) -> &'static str {
        match self {
            Tab::Chat => "chat",
            Tab::Upload => "upload",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Tab::Chat => "Chat",
            Tab::Upload => "Upload",
        }
    }

    pub fn other(&self) -> Tab {
        match self {
            Tab::Chat => Tab::Upload,
            Tab::Upload => Tab::Chat,
        }
    }
}

impl fmt::Display for Tab {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tab {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "chat" => Ok(Tab::Chat),
            "upload" => Ok(Tab::Upload),
            other => Err(format!("unknown tab: {}", other)),
        }
    }
}

/// Active-tab holder.
pub struct Shell {
    store: SharedStorage,
    active: Tab,
}

impl Shell {
    /// Restore the active tab from `store`; `Chat` when unset or invalid.
    pub fn load(store: SharedStorage) -> Self {
        let active = match store.get_item(TAB_KEY) {
            Ok(Some(raw)) => raw.parse().unwrap_or_else(|e| {
                tracing::warn!(error = %e, "ignoring stored tab");
                Tab::default()
            }),
            Ok(None) => Tab::default(),
            Err(e) => {
                tracing::warn!(error = %e, "failed to read stored tab");
                Tab::default()
            }
        };
        Self { store, active }
    }

    pub fn active(&self) -> Tab {
        self.active
    }

    /// Switch to `tab` and persist it.
    pub fn select(&mut self, tab: Tab) {
        self.active = tab;
        if let Err(e) = self.store.set_item(TAB_KEY, tab.as_str()) {
            tracing::warn!(error = %e, "failed to save active tab");
        }
    }

    pub fn toggle(&mut self) {
        self.select(self.active.other());
    }
}
