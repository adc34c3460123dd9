//! Parameterized SQL fragments.

use sea_query::Value;
use std::fmt;

/// Binding strength of a fragment's root operator, weakest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Precedence {
    Or,
    And,
    Not,
    Comparison,
    Additive,
    Multiplicative,
    Unary,
    Atom,
}

/// SQL text with `?` placeholders and the values bound to them, left to right.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlFragment {
    text: String,
    values: Vec<Value>,
    precedence: Precedence,
}

impl SqlFragment {
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn into_parts(self) -> (String, Vec<Value>) {
        (self.text, self.values)
    }

    pub(crate) fn precedence(&self) -> Precedence {
        self.precedence
    }
}

impl fmt::Display for SqlFragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Appends text and bound values in lockstep.
#[derive(Debug, Default)]
pub(crate) struct FragmentBuilder {
    text: String,
    values: Vec<Value>,
}

impl FragmentBuilder {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push_str(&mut self, text: &str) {
        self.text.push_str(text);
    }

    /// Append a `?` bound to `value`.
    pub(crate) fn push_value(&mut self, value: Value) {
        self.text.push('?');
        self.values.push(value);
    }

    /// Append another fragment, optionally parenthesized.
    pub(crate) fn push_fragment(&mut self, fragment: &SqlFragment, parenthesize: bool) {
        if parenthesize {
            self.text.push('(');
        }
        self.text.push_str(&fragment.text);
        if parenthesize {
            self.text.push(')');
        }
        self.values.extend(fragment.values.iter().cloned());
    }

    pub(crate) fn finish(self, precedence: Precedence) -> SqlFragment {
        SqlFragment {
            text: self.text,
            values: self.values,
            precedence,
        }
    }
}
