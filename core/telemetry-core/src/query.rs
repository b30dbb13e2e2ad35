//! Decoder for the compact search-expression strings the search UI emits.
//!
//! # Format
//!
//! ```text
//! title,contains,fisk,OR;creator,contains,tor,NOT;any,exact,laks,AND
//! └─┬─┘ └──┬───┘ └┬─┘ └┤
//! field precision term operator (optional, trailing)
//! ```
//!
//! Clauses are separated by `;`, tokens by `,`. Commas inside a term are not
//! escaped, so everything between the precision and the optional trailing
//! operator is the term.
//!
//! A trailing operator joins its clause to the *next* one. The decoder shifts
//! operators one position to the right so that each emitted clause carries the
//! operator that connects it to its predecessor; the first clause has none.
//!
//! Decoding never fails: missing tokens become empty strings.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum BoolOp {
    And,
    Or,
    Not,
}

impl BoolOp {
    pub fn parse(token: &str) -> Option<Self> {
        match token {
            "AND" => Some(BoolOp::And),
            "OR" => Some(BoolOp::Or),
            "NOT" => Some(BoolOp::Not),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BoolOp::And => "AND",
            BoolOp::Or => "OR",
            BoolOp::Not => "NOT",
        }
    }
}

/// One decoded clause of the boolean chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryClause {
    pub field: String,
    pub precision: String,
    pub term: String,
    pub op: Option<BoolOp>,
}

/// A facet clause; combined outside the boolean chain, so it has no operator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FacetClause {
    pub field: String,
    pub precision: String,
    pub term: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DecodedQuery {
    pub query: Vec<QueryClause>,
    pub query_facets: Vec<FacetClause>,
}

/// Splits one segment into a clause with the operator still attached where it was written.
fn parse_segment(segment: &str) -> QueryClause {
    let tokens: Vec<&str> = segment.split(',').collect();
    let token = |i: usize| tokens.get(i).copied().unwrap_or_default().to_string();

    // The operator has to trail a term position; "AND" as a second token is a precision.
    let op = if tokens.len() > 2 {
        tokens.last().and_then(|last| BoolOp::parse(last))
    } else {
        None
    };

    let term_end = if op.is_some() {
        tokens.len() - 1
    } else {
        tokens.len()
    };
    let term = if term_end > 2 {
        tokens[2..term_end].join(",")
    } else {
        String::new()
    };

    QueryClause {
        field: token(0),
        precision: token(1),
        term,
        op,
    }
}

/// Decodes a raw query string into boolean clauses and facet clauses.
pub fn decode_query(raw: &str, facet_prefix: &str) -> DecodedQuery {
    let mut decoded = DecodedQuery::default();

    for segment in raw.split(';').filter(|s| !s.trim().is_empty()) {
        let clause = parse_segment(segment);
        if !facet_prefix.is_empty() && clause.field.starts_with(facet_prefix) {
            decoded.query_facets.push(FacetClause {
                field: clause.field,
                precision: clause.precision,
                term: clause.term,
            });
        } else {
            decoded.query.push(clause);
        }
    }

    shift_operators(&mut decoded.query);
    decoded
}

/// Moves each trailing operator onto the clause that follows it.
fn shift_operators(clauses: &mut [QueryClause]) {
    if clauses.is_empty() {
        return;
    }
    for i in (1..clauses.len()).rev() {
        clauses[i].op = clauses[i - 1].op;
    }
    clauses[0].op = None;
}
