//! Search-event payloads and action labels.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::query::decode_query;
use crate::sources::{ResultObject, SearchObject};

/// Action labels understood by the collector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Search,
    Refinement,
    ChangePage,
    ExpandFrbrGroup,
    NoResults,
    ViewRecord,
    LeaveRecord,
    SendTo,
    PinRecord,
    UnpinRecord,
    GotoHome,
    Browse,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Search => "search",
            Action::Refinement => "refinement",
            Action::ChangePage => "change_page",
            Action::ExpandFrbrGroup => "expand_frbr_group",
            Action::NoResults => "no_results",
            Action::ViewRecord => "view_record",
            Action::LeaveRecord => "leave_record",
            Action::SendTo => "send_to",
            Action::PinRecord => "pin_record",
            Action::UnpinRecord => "unpin_record",
            Action::GotoHome => "goto_home",
            Action::Browse => "browse",
        }
    }

    /// Whether an accepted event of this kind closes the search-bar input cycle.
    pub fn resets_search_input(&self) -> bool {
        matches!(
            self,
            Action::Search
                | Action::Refinement
                | Action::ChangePage
                | Action::ExpandFrbrGroup
                | Action::NoResults
        )
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Search-bar input activity since the last reported search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct InputState {
    pub keypresses: u32,
    pub paste: bool,
}

impl InputState {
    pub fn reset(&mut self) {
        *self = InputState::default();
    }
}

/// Labels a completed search. Order matters: group expansion beats
/// pagination, pagination beats refinement.
pub fn classify_search_action(
    search: &SearchObject,
    page_no: Option<u32>,
    group_facet: &str,
) -> Action {
    if search
        .facets
        .first()
        .is_some_and(|facet| facet.name == group_facet)
    {
        Action::ExpandFrbrGroup
    } else if page_no.is_some_and(|page| page > 1) {
        Action::ChangePage
    } else if !search.facets.is_empty() {
        Action::Refinement
    } else {
        Action::Search
    }
}

/// Builds the `data` object for search and no-result events.
pub fn build_search_data(
    search: &SearchObject,
    result: &ResultObject,
    input: InputState,
    facet_prefix: &str,
) -> Value {
    let decoded = decode_query(&search.query, facet_prefix);
    json!({
        "scope": search.scope,
        "tab": search.tab,
        "sort": search.sort_by,
        "query": decoded.query,
        "query_facets": decoded.query_facets,
        "facets": search.facets,
        "first": result.first,
        "last": result.last,
        "total": result.total,
        "keypresses": input.keypresses,
        "paste": input.paste,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::{AppliedFacet, FacetKind};

    fn facet(name: &str) -> AppliedFacet {
        AppliedFacet {
            name: name.into(),
            value: "v".into(),
            kind: FacetKind::Include,
        }
    }

    fn search_with(facets: Vec<AppliedFacet>) -> SearchObject {
        SearchObject {
            query: "any,contains,fisk".into(),
            facets,
            ..SearchObject::default()
        }
    }

    #[test]
    fn plain_search() {
        let search = search_with(vec![]);
        assert_eq!(classify_search_action(&search, None, "frbrgroupid"), Action::Search);
        assert_eq!(
            classify_search_action(&search, Some(1), "frbrgroupid"),
            Action::Search
        );
    }

    #[test]
    fn pagination_beats_refinement() {
        let search = search_with(vec![facet("rtype")]);
        assert_eq!(
            classify_search_action(&search, Some(2), "frbrgroupid"),
            Action::ChangePage
        );
        assert_eq!(
            classify_search_action(&search, None, "frbrgroupid"),
            Action::Refinement
        );
    }

    #[test]
    fn group_expansion_beats_pagination() {
        let search = search_with(vec![facet("frbrgroupid"), facet("rtype")]);
        assert_eq!(
            classify_search_action(&search, Some(3), "frbrgroupid"),
            Action::ExpandFrbrGroup
        );
    }

    #[test]
    fn group_facet_only_counts_in_first_position() {
        let search = search_with(vec![facet("rtype"), facet("frbrgroupid")]);
        assert_eq!(
            classify_search_action(&search, None, "frbrgroupid"),
            Action::Refinement
        );
    }

    #[test]
    fn search_data_shape() {
        let search = SearchObject {
            query: "title,contains,fisk,OR;facet_rtype,exact,books;creator,contains,tor".into(),
            scope: Some("default_scope".into()),
            tab: Some("library_catalogue".into()),
            sort_by: Some("rank".into()),
            facets: vec![facet("rtype")],
        };
        let result = ResultObject {
            total: 42,
            first: 1,
            last: 10,
        };
        let input = InputState {
            keypresses: 7,
            paste: true,
        };

        let data = build_search_data(&search, &result, input, "facet_");
        assert_eq!(data["scope"], "default_scope");
        assert_eq!(data["sort"], "rank");
        assert_eq!(data["query"].as_array().unwrap().len(), 2);
        assert_eq!(data["query"][1]["op"], "OR");
        assert_eq!(data["query_facets"][0]["term"], "books");
        assert_eq!(data["facets"][0]["name"], "rtype");
        assert_eq!(data["total"], 42);
        assert_eq!(data["keypresses"], 7);
        assert_eq!(data["paste"], true);
    }

    #[test]
    fn input_state_resets() {
        let mut input = InputState {
            keypresses: 3,
            paste: true,
        };
        input.reset();
        assert_eq!(input, InputState::default());
    }

    #[test]
    fn action_labels() {
        assert_eq!(Action::ExpandFrbrGroup.as_str(), "expand_frbr_group");
        assert_eq!(
            serde_json::to_value(Action::ChangePage).unwrap(),
            "change_page"
        );
        assert!(Action::Refinement.resets_search_input());
        assert!(Action::NoResults.resets_search_input());
        assert!(!Action::ViewRecord.resets_search_input());
    }
}
