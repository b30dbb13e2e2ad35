//! Host-provided collaborators and their null defaults.
//!
//! The recorder is wired into a UI it does not own. Search state and user
//! identity are read through these traits; until the host provides them the
//! null implementations stand in and report themselves unavailable, so the
//! recorder degrades instead of failing.

use std::sync::RwLock;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FacetKind {
    #[default]
    Include,
    Exclude,
}

/// A facet value the user has applied to narrow the result set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedFacet {
    pub name: String,
    pub value: String,
    #[serde(default)]
    pub kind: FacetKind,
}

/// The search as the UI currently holds it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct SearchObject {
    /// Raw query in the `field,precision,term[,OP];...` mini-language.
    pub query: String,
    pub scope: Option<String>,
    pub tab: Option<String>,
    pub sort_by: Option<String>,
    /// Applied facets in the order the user applied them.
    pub facets: Vec<AppliedFacet>,
}

/// Summary of the result set for the current search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ResultObject {
    pub total: u64,
    pub first: u64,
    pub last: u64,
}

pub trait SearchStateSource: Send + Sync {
    /// False for placeholder implementations.
    fn is_available(&self) -> bool {
        true
    }

    fn is_search_in_progress(&self) -> bool;

    fn search_object(&self) -> Option<SearchObject>;

    fn result_object(&self) -> Option<ResultObject>;
}

pub trait IdentitySource: Send + Sync {
    /// False for placeholder implementations.
    fn is_available(&self) -> bool {
        true
    }

    fn user_language(&self) -> Option<String>;

    fn is_logged_in(&self) -> bool;
}

/// Stand-in until the host provides its search state.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSearchState;

impl SearchStateSource for NullSearchState {
    fn is_available(&self) -> bool {
        false
    }

    fn is_search_in_progress(&self) -> bool {
        false
    }

    fn search_object(&self) -> Option<SearchObject> {
        None
    }

    fn result_object(&self) -> Option<ResultObject> {
        None
    }
}

/// Stand-in until the host provides its identity service.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullIdentity;

impl IdentitySource for NullIdentity {
    fn is_available(&self) -> bool {
        false
    }

    fn user_language(&self) -> Option<String> {
        None
    }

    fn is_logged_in(&self) -> bool {
        false
    }
}

/// Search state held as plain values, updated by the host as the UI changes.
#[derive(Debug, Default)]
pub struct SearchSnapshot {
    inner: RwLock<SnapshotState>,
}

#[derive(Debug, Default, Clone)]
struct SnapshotState {
    in_progress: bool,
    search: Option<SearchObject>,
    result: Option<ResultObject>,
}

impl SearchSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(
        &self,
        in_progress: bool,
        search: Option<SearchObject>,
        result: Option<ResultObject>,
    ) {
        if let Ok(mut state) = self.inner.write() {
            *state = SnapshotState {
                in_progress,
                search,
                result,
            };
        }
    }

    pub fn set_in_progress(&self, in_progress: bool) {
        if let Ok(mut state) = self.inner.write() {
            state.in_progress = in_progress;
        }
    }

    fn read(&self) -> SnapshotState {
        match self.inner.read() {
            Ok(state) => state.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl SearchStateSource for SearchSnapshot {
    fn is_search_in_progress(&self) -> bool {
        self.read().in_progress
    }

    fn search_object(&self) -> Option<SearchObject> {
        self.read().search
    }

    fn result_object(&self) -> Option<ResultObject> {
        self.read().result
    }
}

/// Fixed identity values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaticIdentity {
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub logged_in: bool,
}

impl IdentitySource for StaticIdentity {
    fn user_language(&self) -> Option<String> {
        self.language.clone()
    }

    fn is_logged_in(&self) -> bool {
        self.logged_in
    }
}
