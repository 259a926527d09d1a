//! Knowledge collection datasets: content input, formatting, linking and
//! assembly into the final public/private quad sets.

pub mod assemble;
pub mod link;

pub use assemble::{AssemblyOptions, KnowledgeCollection, assemble, assemble_with};
pub use link::{LinkOutcome, insert_triple_sorted, link, link_with, private_subject_hash};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{DatasetError, DatasetResult};
use crate::rdf::{InputFormat, normalize_dataset_with_limit};

/// Public and private quads of one knowledge collection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dataset {
    pub public: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private: Option<Vec<String>>,
}

impl Dataset {
    pub fn public_only(public: Vec<String>) -> Self {
        Self {
            public,
            private: None,
        }
    }

    pub fn has_private(&self) -> bool {
        self.private.as_ref().is_some_and(|p| !p.is_empty())
    }

    pub fn is_empty(&self) -> bool {
        self.public.is_empty() && !self.has_private()
    }
}

/// One side (public or private) of the content.
#[derive(Debug, Clone, PartialEq)]
pub enum ContentPart {
    /// Pre-formatted N-Quads, one statement per line.
    Text(String),
    /// A JSON-LD or N-Quads document to be normalized.
    Document(Value),
}

/// Content handed to the assembler.
#[derive(Debug, Clone, PartialEq)]
pub enum Content {
    /// Pre-formatted N-Quads text, all public.
    Text(String),
    /// Separate public and private parts.
    Parts {
        public: Option<ContentPart>,
        private: Option<ContentPart>,
    },
    /// A document with no `public`/`private` split, treated as public.
    Document(Value),
}

impl Content {
    /// Interpret a JSON value the way callers of the HTTP API pass content.
    ///
    /// A string is pre-formatted N-Quads. An object with a `public` or
    /// `private` key is split into parts. Anything else is one public document.
    pub fn from_json(value: Value) -> Self {
        match value {
            Value::String(text) => Content::Text(text),
            Value::Object(mut map) if map.contains_key("public") || map.contains_key("private") => {
                let public = map.remove("public").and_then(ContentPart::from_json);
                let private = map.remove("private").and_then(ContentPart::from_json);
                Content::Parts { public, private }
            }
            other => Content::Document(other),
        }
    }
}

impl ContentPart {
    /// `None` for JSON null and for empty objects, which mean "no content".
    fn from_json(value: Value) -> Option<Self> {
        match value {
            Value::Null => None,
            Value::Object(map) if map.is_empty() => None,
            Value::String(text) => Some(ContentPart::Text(text)),
            other => Some(ContentPart::Document(other)),
        }
    }
}

/// Split pre-formatted content into trimmed, non-empty statements.
pub fn process_content(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

fn format_part(part: &ContentPart, format: InputFormat, work_limit: usize) -> DatasetResult<Vec<String>> {
    match part {
        ContentPart::Text(text) => Ok(process_content(text)),
        ContentPart::Document(document) => Ok(normalize_dataset_with_limit(document, format, work_limit)?),
    }
}

/// Turn content into a [`Dataset`]: text parts are split into statements,
/// documents are normalized within `work_limit` canonicalization steps. The
/// result is neither resolved nor grouped.
pub fn format_dataset(content: &Content, format: InputFormat, work_limit: usize) -> DatasetResult<Dataset> {
    let dataset = match content {
        Content::Text(text) => Dataset::public_only(process_content(text)),
        Content::Document(document) => {
            Dataset::public_only(normalize_dataset_with_limit(document, format, work_limit)?)
        }
        Content::Parts { public, private } => {
            let public = match public {
                Some(part) => format_part(part, format, work_limit)?,
                None => Vec::new(),
            };
            let private = private
                .as_ref()
                .map(|part| format_part(part, format, work_limit))
                .transpose()?
                .filter(|quads| !quads.is_empty());
            Dataset { public, private }
        }
    };
    if dataset.is_empty() {
        return Err(DatasetError::Empty);
    }
    Ok(dataset)
}

/// Reject content shapes that can never yield quads.
pub fn validate_content(value: &Value) -> DatasetResult<()> {
    match value {
        Value::String(_) | Value::Object(_) | Value::Array(_) => Ok(()),
        other => Err(DatasetError::InvalidContent {
            message: format!("expected a string, object or array, found {other}"),
        }),
    }
}
