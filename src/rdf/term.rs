//! RDF term and quad model with canonical one-line rendering.
//!
//! Terms are plain owned values. Quoted triples (RDF-star) nest through
//! [`Term::Triple`], so a subject or object can itself be a statement.

use std::fmt::{self, Write as _};

use oxigraph::model as ox;

use crate::constants::{RDF_LANG_STRING, XSD_STRING};
use crate::error::{RdfError, RdfResult};

/// An RDF term.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Term {
    /// An IRI, stored without angle brackets.
    Iri(String),
    /// A blank node, stored without the `_:` prefix.
    BlankNode(String),
    /// A literal value.
    Literal(Literal),
    /// A quoted triple.
    Triple(Box<Triple>),
}

/// An RDF literal. `xsd:string` is never stored as an explicit datatype.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Literal {
    pub value: String,
    pub language: Option<String>,
    pub datatype: Option<String>,
}

/// A triple, used for quoted-triple terms.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Triple {
    pub subject: Term,
    pub predicate: Term,
    pub object: Term,
}

/// A quad. `graph == None` is the default graph.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Quad {
    pub subject: Term,
    pub predicate: Term,
    pub object: Term,
    pub graph: Option<Term>,
}

impl Literal {
    /// A plain `xsd:string` literal.
    pub fn simple(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            language: None,
            datatype: None,
        }
    }

    /// A language-tagged string.
    pub fn language_tagged(value: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            language: Some(language.into()),
            datatype: None,
        }
    }

    /// A typed literal. `xsd:string` collapses to a simple literal.
    pub fn typed(value: impl Into<String>, datatype: impl Into<String>) -> Self {
        let datatype = datatype.into();
        Self {
            value: value.into(),
            language: None,
            datatype: (datatype != XSD_STRING && datatype != RDF_LANG_STRING).then_some(datatype),
        }
    }
}

impl Term {
    pub fn iri(iri: impl Into<String>) -> Self {
        Term::Iri(iri.into())
    }

    pub fn blank(label: impl Into<String>) -> Self {
        Term::BlankNode(label.into())
    }

    pub fn is_blank_node(&self) -> bool {
        matches!(self, Term::BlankNode(_))
    }

    /// Whether this term, or any term nested inside it, is a blank node.
    pub fn contains_blank_node(&self) -> bool {
        match self {
            Term::BlankNode(_) => true,
            Term::Triple(t) => t.terms().iter().any(|term| term.contains_blank_node()),
            _ => false,
        }
    }

    /// Rebuild the term, replacing every blank node (at any nesting depth)
    /// with the result of `f(label)`.
    pub fn map_blank_nodes<F>(&self, f: &mut F) -> Term
    where
        F: FnMut(&str) -> Term,
    {
        match self {
            Term::BlankNode(label) => f(label),
            Term::Triple(t) => Term::Triple(Box::new(t.map_blank_nodes(f))),
            other => other.clone(),
        }
    }

    /// Collect blank node labels in order of appearance, descending into
    /// quoted triples.
    pub(crate) fn blank_labels<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Term::BlankNode(label) => out.push(label),
            Term::Triple(t) => {
                for term in t.terms() {
                    term.blank_labels(out);
                }
            }
            _ => {}
        }
    }
}

impl Triple {
    pub fn new(subject: Term, predicate: Term, object: Term) -> Self {
        Self {
            subject,
            predicate,
            object,
        }
    }

    fn terms(&self) -> [&Term; 3] {
        [&self.subject, &self.predicate, &self.object]
    }

    pub fn map_blank_nodes<F>(&self, f: &mut F) -> Triple
    where
        F: FnMut(&str) -> Term,
    {
        Triple {
            subject: self.subject.map_blank_nodes(f),
            predicate: self.predicate.map_blank_nodes(f),
            object: self.object.map_blank_nodes(f),
        }
    }
}

impl Quad {
    pub fn new(subject: Term, predicate: Term, object: Term, graph: Option<Term>) -> Self {
        Self {
            subject,
            predicate,
            object,
            graph,
        }
    }

    pub fn in_default_graph(&self) -> bool {
        self.graph.is_none()
    }

    pub fn map_blank_nodes<F>(&self, f: &mut F) -> Quad
    where
        F: FnMut(&str) -> Term,
    {
        Quad {
            subject: self.subject.map_blank_nodes(f),
            predicate: self.predicate.map_blank_nodes(f),
            object: self.object.map_blank_nodes(f),
            graph: self.graph.as_ref().map(|g| g.map_blank_nodes(f)),
        }
    }

    /// Blank node labels in subject, object and graph position, in that order.
    pub(crate) fn blank_labels(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.subject.blank_labels(&mut out);
        self.predicate.blank_labels(&mut out);
        self.object.blank_labels(&mut out);
        if let Some(graph) = &self.graph {
            graph.blank_labels(&mut out);
        }
        out
    }
}

// ---------------------------------------------------------------------------
// Conversions from oxigraph's model
// ---------------------------------------------------------------------------

impl From<ox::NamedNode> for Term {
    fn from(node: ox::NamedNode) -> Self {
        Term::Iri(node.into_string())
    }
}

impl From<ox::BlankNode> for Term {
    fn from(node: ox::BlankNode) -> Self {
        Term::BlankNode(node.into_string())
    }
}

impl From<ox::NamedOrBlankNode> for Term {
    fn from(node: ox::NamedOrBlankNode) -> Self {
        match node {
            ox::NamedOrBlankNode::NamedNode(node) => node.into(),
            ox::NamedOrBlankNode::BlankNode(node) => node.into(),
        }
    }
}

impl From<ox::Literal> for Literal {
    fn from(literal: ox::Literal) -> Self {
        match literal.language() {
            Some(language) => Literal::language_tagged(literal.value(), language),
            None => Literal::typed(literal.value(), literal.datatype().as_str()),
        }
    }
}

impl TryFrom<ox::Term> for Term {
    type Error = RdfError;

    // The catch-all arm only matches when oxigraph is built with RDF 1.2
    // triple terms.
    #[allow(unreachable_patterns)]
    fn try_from(term: ox::Term) -> RdfResult<Self> {
        match term {
            ox::Term::NamedNode(node) => Ok(node.into()),
            ox::Term::BlankNode(node) => Ok(node.into()),
            ox::Term::Literal(literal) => Ok(Term::Literal(literal.into())),
            other => Err(RdfError::JsonLd {
                message: format!("unsupported triple term {other}"),
            }),
        }
    }
}

impl TryFrom<ox::Quad> for Quad {
    type Error = RdfError;

    fn try_from(quad: ox::Quad) -> RdfResult<Self> {
        let graph = match quad.graph_name {
            ox::GraphName::NamedNode(node) => Some(node.into()),
            ox::GraphName::BlankNode(node) => Some(node.into()),
            ox::GraphName::DefaultGraph => None,
        };
        Ok(Quad::new(
            quad.subject.into(),
            quad.predicate.into(),
            Term::try_from(quad.object)?,
            graph,
        ))
    }
}

/// Append `value` to `out` using canonical N-Quads string escapes.
pub(crate) fn escape_literal(value: &str, out: &mut String) {
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{8}' => out.push_str("\\b"),
            '\u{c}' => out.push_str("\\f"),
            c if (c as u32) < 0x20 || c == '\u{7f}' => {
                let _ = write!(out, "\\u{:04X}", c as u32);
            }
            c => out.push(c),
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut escaped = String::with_capacity(self.value.len() + 2);
        escape_literal(&self.value, &mut escaped);
        write!(f, "\"{escaped}\"")?;
        if let Some(language) = &self.language {
            write!(f, "@{language}")
        } else if let Some(datatype) = &self.datatype {
            write!(f, "^^<{datatype}>")
        } else {
            Ok(())
        }
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Iri(iri) => write!(f, "<{iri}>"),
            Term::BlankNode(label) => write!(f, "_:{label}"),
            Term::Literal(literal) => literal.fmt(f),
            Term::Triple(triple) => triple.fmt(f),
        }
    }
}

impl fmt::Display for Triple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<<{} {} {}>>", self.subject, self.predicate, self.object)
    }
}

impl fmt::Display for Quad {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.subject, self.predicate, self.object)?;
        if let Some(graph) = &self.graph {
            write!(f, " {graph}")?;
        }
        f.write_str(" .")
    }
}
