//! SPARQL query classification.
//!
//! Nodes need the query form next to the query text. The query is first run
//! against an empty in-memory oxigraph store, so malformed queries and updates
//! never leave the client.

use std::fmt;

use oxigraph::sparql::QueryResults;
use oxigraph::store::Store;
use serde::{Deserialize, Serialize};

use crate::error::{RdfError, RdfResult};

/// SPARQL query form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum QueryType {
    Select,
    Construct,
    Describe,
    Ask,
}

impl QueryType {
    pub fn as_str(self) -> &'static str {
        match self {
            QueryType::Select => "SELECT",
            QueryType::Construct => "CONSTRUCT",
            QueryType::Describe => "DESCRIBE",
            QueryType::Ask => "ASK",
        }
    }
}

impl fmt::Display for QueryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validate `query` and return its form.
pub fn query_type(query: &str) -> RdfResult<QueryType> {
    let store = Store::new().map_err(|e| RdfError::Query {
        message: format!("failed to create oxigraph store: {e}"),
    })?;
    let results = store.query(query).map_err(|e| RdfError::Query {
        message: e.to_string(),
    })?;
    Ok(match results {
        QueryResults::Solutions(_) => QueryType::Select,
        QueryResults::Boolean(_) => QueryType::Ask,
        // Both forms produce triples; only the keyword tells them apart.
        QueryResults::Graph(_) => match leading_keyword(query) {
            Some(QueryType::Describe) => QueryType::Describe,
            _ => QueryType::Construct,
        },
    })
}

/// First query-form keyword after the prologue (comments, PREFIX, BASE).
fn leading_keyword(query: &str) -> Option<QueryType> {
    let mut tokens = query
        .lines()
        .map(|line| match line.find('#') {
            Some(i) if !line[..i].contains('<') => &line[..i],
            _ => line,
        })
        .flat_map(str::split_whitespace);

    while let Some(token) = tokens.next() {
        let upper = token.to_ascii_uppercase();
        match upper.as_str() {
            "PREFIX" => {
                // `PREFIX ex: <iri>` or `PREFIX ex:<iri>`
                let name = tokens.next()?;
                if !name.contains('<') {
                    tokens.next()?;
                }
            }
            "BASE" => {
                tokens.next()?;
            }
            _ => {
                return [
                    QueryType::Select,
                    QueryType::Construct,
                    QueryType::Describe,
                    QueryType::Ask,
                ]
                .into_iter()
                .find(|form| upper.starts_with(form.as_str()));
            }
        }
    }
    None
}
