//! Line-oriented N-Quads reader with RDF-star support.
//!
//! Every statement is parsed on its own, so a malformed line is reported with
//! its own line number and never affects the statements around it. Quoted
//! triples are accepted both as `<< s p o >>` and as RDF 1.2 triple terms
//! `<<( s p o )>>`, in subject and object position, at any depth.

use crate::error::{RdfError, RdfResult};

use super::term::{Literal, Quad, Term, Triple};

/// Parse a single N-Quads statement.
pub fn parse_quad(line: &str) -> RdfResult<Quad> {
    parse_quad_at(line, 1)
}

/// Parse a single statement, reporting errors against `line_number`.
pub fn parse_quad_at(line: &str, line_number: usize) -> RdfResult<Quad> {
    let mut parser = LineParser::new(line, line_number);
    parser.statement()
}

/// Parse an N-Quads document, skipping blank and comment lines.
pub fn parse_nquads(text: &str) -> RdfResult<Vec<Quad>> {
    let mut quads = Vec::new();
    for (index, line) in text.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        quads.push(parse_quad_at(trimmed, index + 1)?);
    }
    Ok(quads)
}

/// Parse a list of N-Quads strings (one or more statements per element).
pub fn parse_lines<S: AsRef<str>>(lines: &[S]) -> RdfResult<Vec<Quad>> {
    let joined = lines
        .iter()
        .map(|l| l.as_ref())
        .collect::<Vec<_>>()
        .join("\n");
    parse_nquads(&joined)
}

/// Render quads back to one line each.
pub fn to_lines(quads: &[Quad]) -> Vec<String> {
    quads.iter().map(Quad::to_string).collect()
}

struct LineParser<'a> {
    input: &'a str,
    pos: usize,
    line: usize,
}

impl<'a> LineParser<'a> {
    fn new(input: &'a str, line: usize) -> Self {
        Self {
            input,
            pos: 0,
            line,
        }
    }

    fn error(&self, message: impl Into<String>) -> RdfError {
        RdfError::Syntax {
            line: self.line,
            column: self.pos + 1,
            message: message.into(),
        }
    }

    fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn eat(&mut self, token: &str) -> bool {
        if self.rest().starts_with(token) {
            self.pos += token.len();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: &str) -> RdfResult<()> {
        if self.eat(token) {
            Ok(())
        } else {
            Err(self.error(format!("expected `{token}`")))
        }
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.bump();
        }
    }

    fn statement(&mut self) -> RdfResult<Quad> {
        self.skip_ws();
        let subject = self.subject()?;
        self.skip_ws();
        let predicate = self.iri()?;
        self.skip_ws();
        let object = self.object()?;
        self.skip_ws();

        let graph = match self.peek() {
            Some('<') => Some(self.iri()?),
            Some('_') => Some(self.blank_node()?),
            _ => None,
        };
        self.skip_ws();
        self.expect(".")?;
        self.skip_ws();
        match self.peek() {
            None | Some('#') => Ok(Quad::new(subject, predicate, object, graph)),
            Some(_) => Err(self.error("unexpected content after end of statement")),
        }
    }

    fn subject(&mut self) -> RdfResult<Term> {
        match self.peek() {
            Some('<') if self.rest().starts_with("<<") => self.quoted_triple(),
            Some('<') => self.iri(),
            Some('_') => self.blank_node(),
            Some(_) => Err(self.error("subject must be an IRI, blank node or quoted triple")),
            None => Err(self.error("unexpected end of line, expected subject")),
        }
    }

    fn object(&mut self) -> RdfResult<Term> {
        match self.peek() {
            Some('"') => self.literal(),
            Some(_) => self.subject(),
            None => Err(self.error("unexpected end of line, expected object")),
        }
    }

    fn quoted_triple(&mut self) -> RdfResult<Term> {
        self.expect("<<")?;
        self.skip_ws();
        let parenthesized = self.eat("(");
        self.skip_ws();
        let subject = self.subject()?;
        self.skip_ws();
        let predicate = self.iri()?;
        self.skip_ws();
        let object = self.object()?;
        self.skip_ws();
        if parenthesized {
            self.expect(")")?;
            self.skip_ws();
        }
        self.expect(">>")?;
        Ok(Term::Triple(Box::new(Triple::new(subject, predicate, object))))
    }

    fn iri(&mut self) -> RdfResult<Term> {
        if self.rest().starts_with("<<") {
            return Err(self.error("quoted triple is not allowed here"));
        }
        self.expect("<")?;
        let mut iri = String::new();
        loop {
            match self.bump() {
                Some('>') => break,
                Some('\\') => iri.push(self.unicode_escape()?),
                Some(c) if c == '<' || c == '"' || c == ' ' => {
                    return Err(self.error(format!("invalid character {c:?} in IRI")));
                }
                Some(c) => iri.push(c),
                None => return Err(self.error("unterminated IRI")),
            }
        }
        Ok(Term::Iri(iri))
    }

    fn blank_node(&mut self) -> RdfResult<Term> {
        self.expect("_:")?;
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c.is_whitespace() || matches!(c, '<' | '>' | '(' | ')' | '"' | '#') {
                break;
            }
            self.bump();
        }
        // Labels may contain dots but never end with one.
        let mut end = self.pos;
        while end > start && self.input.as_bytes()[end - 1] == b'.' {
            end -= 1;
        }
        self.pos = end;
        if end == start {
            return Err(self.error("empty blank node label"));
        }
        Ok(Term::BlankNode(self.input[start..end].to_string()))
    }

    fn literal(&mut self) -> RdfResult<Term> {
        self.expect("\"")?;
        let mut value = String::new();
        loop {
            match self.bump() {
                Some('"') => break,
                Some('\\') => {
                    let escaped = match self.peek() {
                        Some('t') => '\t',
                        Some('b') => '\u{8}',
                        Some('n') => '\n',
                        Some('r') => '\r',
                        Some('f') => '\u{c}',
                        Some('"') => '"',
                        Some('\'') => '\'',
                        Some('\\') => '\\',
                        Some('u') | Some('U') => {
                            value.push(self.unicode_escape()?);
                            continue;
                        }
                        _ => return Err(self.error("invalid escape sequence in literal")),
                    };
                    self.bump();
                    value.push(escaped);
                }
                Some(c) => value.push(c),
                None => return Err(self.error("unterminated literal")),
            }
        }

        if self.eat("@") {
            let start = self.pos;
            while matches!(self.peek(), Some(c) if c.is_ascii_alphanumeric() || c == '-') {
                self.bump();
            }
            let tag = &self.input[start..self.pos];
            if tag.is_empty() || !tag.starts_with(|c: char| c.is_ascii_alphabetic()) {
                return Err(self.error("invalid language tag"));
            }
            return Ok(Term::Literal(Literal::language_tagged(value, tag)));
        }
        if self.eat("^^") {
            return match self.iri()? {
                Term::Iri(datatype) => Ok(Term::Literal(Literal::typed(value, datatype))),
                _ => Err(self.error("datatype must be an IRI")),
            };
        }
        Ok(Term::Literal(Literal::simple(value)))
    }

    /// Decode `\uXXXX` / `\UXXXXXXXX` after the backslash has been consumed.
    fn unicode_escape(&mut self) -> RdfResult<char> {
        let width = match self.bump() {
            Some('u') => 4,
            Some('U') => 8,
            _ => return Err(self.error("invalid escape sequence")),
        };
        let rest = self.rest();
        let digits = rest
            .get(..width)
            .filter(|d| d.chars().all(|c| c.is_ascii_hexdigit()))
            .ok_or_else(|| self.error("invalid unicode escape"))?;
        let code = u32::from_str_radix(digits, 16).map_err(|_| self.error("invalid unicode escape"))?;
        let c = char::from_u32(code).ok_or_else(|| self.error("escape is not a valid code point"))?;
        self.pos += width;
        Ok(c)
    }
}
