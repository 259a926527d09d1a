//! Normalization of JSON-LD and N-Quads input into canonical N-Quads.
//!
//! JSON-LD is expanded to quads through oxigraph's parser. Whatever the input,
//! the quads then go through [`canonicalize`](super::canon::canonicalize), so the
//! output is sorted, de-duplicated, and independent of blank node labels.

use std::fmt;
use std::str::FromStr;

use oxigraph::io::{RdfFormat, RdfParser, RdfSerializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{RdfError, RdfResult};

use super::canon::{DEFAULT_WORK_LIMIT, canonicalize_with_limit};
use super::nquads::{parse_lines, parse_nquads};
use super::term::Quad;

const JSON_LD_MEDIA_TYPE: &str = "application/ld+json";

/// Serialization accepted by [`normalize_dataset`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum InputFormat {
    #[default]
    JsonLd,
    NQuads,
}

impl InputFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            InputFormat::JsonLd => "JSON-LD",
            InputFormat::NQuads => "N-Quads",
        }
    }
}

impl FromStr for InputFormat {
    type Err = RdfError;

    fn from_str(s: &str) -> RdfResult<Self> {
        match s.to_ascii_lowercase().as_str() {
            "json-ld" | "jsonld" => Ok(InputFormat::JsonLd),
            "n-quads" | "nquads" => Ok(InputFormat::NQuads),
            _ => Err(RdfError::UnsupportedFormat {
                format: s.to_string(),
            }),
        }
    }
}

impl TryFrom<String> for InputFormat {
    type Error = RdfError;

    fn try_from(value: String) -> RdfResult<Self> {
        value.parse()
    }
}

impl From<InputFormat> for String {
    fn from(format: InputFormat) -> Self {
        format.as_str().to_string()
    }
}

impl fmt::Display for InputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalize a JSON value holding a dataset in `format`.
///
/// For JSON-LD the value is the document itself (a JSON string is treated as
/// the document's text). For N-Quads the value is a string or an array of
/// statement strings.
pub fn normalize_dataset(dataset: &Value, format: InputFormat) -> RdfResult<Vec<String>> {
    normalize_dataset_with_limit(dataset, format, DEFAULT_WORK_LIMIT)
}

/// [`normalize_dataset`] with an explicit canonicalization work limit.
pub fn normalize_dataset_with_limit(
    dataset: &Value,
    format: InputFormat,
    work_limit: usize,
) -> RdfResult<Vec<String>> {
    let quads = match (format, dataset) {
        (InputFormat::JsonLd, Value::String(text)) => json_ld_to_quads(text.as_bytes())?,
        (InputFormat::JsonLd, document) => {
            let bytes = serde_json::to_vec(document).map_err(|e| RdfError::JsonLd {
                message: e.to_string(),
            })?;
            json_ld_to_quads(&bytes)?
        }
        (InputFormat::NQuads, Value::String(text)) => parse_nquads(text)?,
        (InputFormat::NQuads, Value::Array(items)) => {
            let lines = items
                .iter()
                .map(|item| {
                    item.as_str().ok_or_else(|| RdfError::InvalidDataset {
                        message: format!("expected an N-Quads string, found {item}"),
                    })
                })
                .collect::<RdfResult<Vec<_>>>()?;
            parse_lines(&lines)?
        }
        (InputFormat::NQuads, other) => {
            return Err(RdfError::InvalidDataset {
                message: format!("N-Quads input must be a string or an array of strings, found {other}"),
            });
        }
    };
    finish(quads, work_limit)
}

/// Normalize N-Quads text.
pub fn normalize_nquads(text: &str) -> RdfResult<Vec<String>> {
    finish(parse_nquads(text)?, DEFAULT_WORK_LIMIT)
}

/// Normalize a JSON-LD document given as text.
pub fn normalize_json_ld(document: &str) -> RdfResult<Vec<String>> {
    finish(json_ld_to_quads(document.as_bytes())?, DEFAULT_WORK_LIMIT)
}

fn finish(quads: Vec<Quad>, work_limit: usize) -> RdfResult<Vec<String>> {
    let named_graph = quads.iter().any(|q| !q.in_default_graph());
    let lines = canonicalize_with_limit(&quads, work_limit)?;
    if lines.is_empty() {
        return Err(RdfError::InvalidDataset {
            message: "no quads were extracted".into(),
        });
    }
    if named_graph {
        // Report the canonical form, which is what the caller can act on.
        let offending = parse_lines(&lines)?
            .iter()
            .filter(|q| !q.in_default_graph())
            .map(Quad::to_string)
            .collect();
        return Err(RdfError::UnsupportedJsonLd { quads: offending });
    }
    Ok(lines)
}

fn json_ld_format() -> RdfResult<RdfFormat> {
    RdfFormat::from_media_type(JSON_LD_MEDIA_TYPE).ok_or_else(|| RdfError::UnsupportedFormat {
        format: JSON_LD_MEDIA_TYPE.into(),
    })
}

/// Expand a JSON-LD document to quads.
///
/// Remote contexts are never fetched.
pub fn json_ld_to_quads(document: &[u8]) -> RdfResult<Vec<Quad>> {
    RdfParser::from_format(json_ld_format()?)
        .for_slice(document)
        .map(|quad| {
            let quad = quad.map_err(|e| RdfError::JsonLd {
                message: e.to_string(),
            })?;
            Quad::try_from(quad)
        })
        .collect()
}

/// Serialize N-Quads statements as a JSON-LD document.
pub fn to_json_ld<S: AsRef<str>>(lines: &[S]) -> RdfResult<Value> {
    let text = lines
        .iter()
        .map(|l| l.as_ref())
        .collect::<Vec<_>>()
        .join("\n");
    let serialize_err = |message: String| RdfError::Serialize { message };

    let mut serializer = RdfSerializer::from_format(json_ld_format()?).for_writer(Vec::new());
    for quad in RdfParser::from_format(RdfFormat::NQuads).for_slice(text.as_bytes()) {
        let quad = quad.map_err(|e| serialize_err(e.to_string()))?;
        serializer
            .serialize_quad(&quad)
            .map_err(|e| serialize_err(e.to_string()))?;
    }
    let bytes = serializer
        .finish()
        .map_err(|e| serialize_err(e.to_string()))?;
    serde_json::from_slice(&bytes).map_err(|e| serialize_err(e.to_string()))
}
