//! Textual path expressions.
//!
//! A path expression is a dot-joined list of segments:
//!
//! | Syntax | Segment | Applies to |
//! |---|---|---|
//! | `Level` | [`Segment::Field`] | record member |
//! | `['temp']` | [`Segment::Key`] | mapping entry, compared by string form |
//! | `[2]` | [`Segment::Index`] | zero-based sequence element |
//!
//! Bracket segments carry their own delimiters, so the dot in front of them
//! may be omitted: `Readings.[2].['temp']` and `Readings[2]['temp']` parse to
//! the same expression. Quoted keys may contain dots. The empty string is the
//! empty expression and addresses the whole payload.

use std::fmt;
use std::str::FromStr;

use dbmq_types::BridgeError;

/// One navigation step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Field(String),
    Key(String),
    Index(usize),
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Field(name) => f.write_str(name),
            Segment::Key(key) => write!(f, "['{key}']"),
            Segment::Index(index) => write!(f, "[{index}]"),
        }
    }
}

/// Parsed, ordered list of [`Segment`]s.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PathExpression {
    segments: Vec<Segment>,
}

impl PathExpression {
    pub fn new(segments: Vec<Segment>) -> Self {
        Self { segments }
    }

    /// Parse the external representation of a path expression.
    ///
    /// # Errors
    ///
    /// * [`BridgeError::InvalidIndexSyntax`] when an index segment is not a
    ///   non-negative integer literal.
    /// * [`BridgeError::InvalidPathSyntax`] for empty segments, unterminated
    ///   brackets and stray characters between segments.
    pub fn parse(expr: &str) -> Result<Self, BridgeError> {
        let mut segments = Vec::new();
        if expr.is_empty() {
            return Ok(Self { segments });
        }

        let syntax = |reason: &str| BridgeError::InvalidPathSyntax {
            expression: expr.to_string(),
            reason: reason.to_string(),
        };

        let bytes = expr.as_bytes();
        let mut pos = 0;
        loop {
            if pos >= bytes.len() {
                return Err(syntax("expected a segment after '.'"));
            }

            if expr[pos..].starts_with("['") {
                let start = pos + 2;
                let len = expr[start..]
                    .find("']")
                    .ok_or_else(|| syntax("unterminated key segment"))?;
                segments.push(Segment::Key(expr[start..start + len].to_string()));
                pos = start + len + 2;
            } else if bytes[pos] == b'[' {
                let start = pos + 1;
                let len = expr[start..]
                    .find(']')
                    .ok_or_else(|| syntax("unterminated index segment"))?;
                segments.push(Segment::Index(parse_index(&expr[start..start + len])?));
                pos = start + len + 1;
            } else {
                let len = expr[pos..]
                    .find(['.', '['])
                    .unwrap_or(expr.len() - pos);
                let name = &expr[pos..pos + len];
                if name.is_empty() {
                    return Err(syntax("empty segment"));
                }
                if name.contains([']', '\'']) {
                    return Err(syntax("unexpected quote or bracket in field name"));
                }
                segments.push(Segment::Field(name.to_string()));
                pos += len;
            }

            match bytes.get(pos) {
                None => break,
                Some(b'.') => pos += 1,
                Some(b'[') => {}
                Some(_) => return Err(syntax("expected '.' or '[' after a bracket segment")),
            }
        }

        Ok(Self { segments })
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }
}

fn parse_index(raw: &str) -> Result<usize, BridgeError> {
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return Err(BridgeError::InvalidIndexSyntax(raw.to_string()));
    }
    // Too large for `usize` is still a well-formed index; it just lies past the
    // end of every sequence.
    Ok(raw.parse::<usize>().unwrap_or(usize::MAX))
}

impl FromStr for PathExpression {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for PathExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "{segment}")?;
        }
        Ok(())
    }
}
