//! AND/OR accumulation of predicate fragments.
//!
//! Entries are kept in call order. When the WHERE text is rendered, maximal
//! runs of AND-joined entries form segments which are then joined with OR.
//! Every segment is parenthesized as a unit, so the result never depends on
//! the target database's AND/OR precedence:
//!
//! ```text
//! filter(A).or_filter(B).filter(C)  =>  (A) OR (B AND C)
//! ```

use crate::sql::fragment::{FragmentBuilder, Precedence, SqlFragment};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Connective {
    And,
    Or,
}

impl fmt::Display for Connective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Connective::And => "AND",
            Connective::Or => "OR",
        })
    }
}

/// Where the rendered condition ends up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Embedding {
    /// Directly after `WHERE`
    #[default]
    TopLevel,
    /// Inside a larger condition; the whole text is wrapped once more
    Nested,
}

/// Accumulated predicates of a query. Appending returns a new state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PredicateState {
    entries: Vec<(Connective, SqlFragment)>,
}

impl PredicateState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `fragment` joined by `connective`. The first entry's connective is ignored.
    pub fn combine(&self, connective: Connective, fragment: SqlFragment) -> Self {
        let mut entries = self.entries.clone();
        entries.push((connective, fragment));
        Self { entries }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn entries(&self) -> &[(Connective, SqlFragment)] {
        &self.entries
    }

    /// Render the condition, or `None` if there are no predicates.
    pub fn render(&self, embedding: Embedding) -> Option<SqlFragment> {
        if self.entries.is_empty() {
            return None;
        }

        let mut out = FragmentBuilder::new();
        if embedding == Embedding::Nested {
            out.push_str("(");
        }
        for (i, segment) in self.segments().iter().enumerate() {
            if i > 0 {
                out.push_str(" OR ");
            }
            out.push_str("(");
            for (j, fragment) in segment.iter().enumerate() {
                if j > 0 {
                    out.push_str(" AND ");
                }
                let wrap = segment.len() > 1 && fragment.precedence() <= Precedence::Or;
                out.push_fragment(fragment, wrap);
            }
            out.push_str(")");
        }
        if embedding == Embedding::Nested {
            out.push_str(")");
        }
        Some(out.finish(Precedence::Atom))
    }

    /// Maximal AND runs, in order.
    fn segments(&self) -> Vec<Vec<&SqlFragment>> {
        let mut segments: Vec<Vec<&SqlFragment>> = Vec::new();
        for (i, (connective, fragment)) in self.entries.iter().enumerate() {
            match segments.last_mut() {
                Some(current) if i > 0 && *connective == Connective::And => current.push(fragment),
                _ => segments.push(vec![fragment]),
            }
        }
        segments
    }
}
