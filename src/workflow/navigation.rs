//! Page navigation
//!
//! The current page is a plain value owned by the front end; moving between
//! pages is a pure function of the current page and an action.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Page {
    #[default]
    MainMenu,
    Analyze,
    Collections,
    About,
}

/// User navigation request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NavAction {
    OpenAnalyze,
    OpenCollections,
    OpenAbout,
    BackHome,
}

impl Page {
    /// Page reached from `self` by `action`.
    ///
    /// The menu links are only offered on the main menu; every other page
    /// only offers the way back, so other combinations leave the page as is.
    pub fn transition(self, action: NavAction) -> Page {
        match (self, action) {
            (Page::MainMenu, NavAction::OpenAnalyze) => Page::Analyze,
            (Page::MainMenu, NavAction::OpenCollections) => Page::Collections,
            (Page::MainMenu, NavAction::OpenAbout) => Page::About,
            (_, NavAction::BackHome) => Page::MainMenu,
            (page, _) => page,
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Page::MainMenu => "Monkeypox Skin Lesion Classifier",
            Page::Analyze => "Image Analysis",
            Page::Collections => "Collections",
            Page::About => "About",
        }
    }

    /// Actions offered on this page
    pub fn actions(self) -> &'static [NavAction] {
        match self {
            Page::MainMenu => &[
                NavAction::OpenAnalyze,
                NavAction::OpenCollections,
                NavAction::OpenAbout,
            ],
            _ => &[NavAction::BackHome],
        }
    }
}

impl fmt::Display for Page {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.title())
    }
}
