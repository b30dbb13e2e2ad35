//! Flattens bibliographic records into the shape the collector stores.
//!
//! Records arrive as loosely typed JSON (PNX-style: every leaf is usually a
//! list, sometimes a bare string, often missing). Nothing here fails; absent
//! data becomes `None` or an empty collection.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;

const RECORD_ID: &str = "/pnx/control/recordid";
const SOURCE_ADDS_ID: &str = "/pnx/control/addsrcrecordid";
const SOURCE_SYSTEM: &str = "/pnx/control/sourcesystem";
const DEWEY: &str = "/pnx/facets/lfc10";
const HUMORD: &str = "/pnx/facets/lfc14";
const REALFAG: &str = "/pnx/facets/lfc20";
const RESOURCE_TYPE: &str = "/pnx/facets/rsrctype";
const DISPLAY_TYPE: &str = "/pnx/display/type";
const TITLE: &str = "/pnx/display/title";
const CONTEXT: &str = "/context";

/// Marker used by the search backend for records held in the local catalogue.
const LOCAL_CONTEXT: &str = "L";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct NormalizedRecord {
    pub id: Option<String>,
    pub is_local: bool,
    pub source_adds_id: Option<String>,
    pub source_system: Option<String>,
    pub dewey_terms: BTreeSet<String>,
    pub humord_terms: BTreeSet<String>,
    pub realfag_terms: BTreeSet<String>,
    pub resource_types: Vec<String>,
    pub display_type: Option<String>,
    pub title: Option<String>,
}

/// Collects the string values at `pointer`, accepting either a list or a scalar.
fn strings_at<'a>(record: &'a Value, pointer: &str) -> Vec<&'a str> {
    match record.pointer(pointer) {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect(),
        Some(Value::String(s)) if !s.trim().is_empty() => vec![s.trim()],
        _ => Vec::new(),
    }
}

fn first_at(record: &Value, pointer: &str) -> Option<String> {
    strings_at(record, pointer)
        .first()
        .map(|s| s.to_string())
}

fn set_at(record: &Value, pointer: &str) -> BTreeSet<String> {
    strings_at(record, pointer)
        .into_iter()
        .map(str::to_string)
        .collect()
}

/// Ordered and de-duplicated; the first occurrence wins.
fn unique_list_at(record: &Value, pointer: &str) -> Vec<String> {
    let mut seen = BTreeSet::new();
    strings_at(record, pointer)
        .into_iter()
        .filter(|s| seen.insert(*s))
        .map(str::to_string)
        .collect()
}

pub fn normalize_record(record: &Value) -> NormalizedRecord {
    NormalizedRecord {
        id: first_at(record, RECORD_ID),
        is_local: record.pointer(CONTEXT).and_then(Value::as_str) == Some(LOCAL_CONTEXT),
        source_adds_id: first_at(record, SOURCE_ADDS_ID),
        source_system: first_at(record, SOURCE_SYSTEM),
        dewey_terms: set_at(record, DEWEY),
        humord_terms: set_at(record, HUMORD),
        realfag_terms: set_at(record, REALFAG),
        resource_types: unique_list_at(record, RESOURCE_TYPE),
        display_type: first_at(record, DISPLAY_TYPE),
        title: first_at(record, TITLE),
    }
}
