//! SQL dialects.
//!
//! Rendering is identical across dialects except for identifier quoting,
//! string concatenation, a few function names, the `LIKE` escape literal and
//! row limiting. Placeholders are always `?`; executors that need another
//! syntax rewrite them.

use serde::Deserialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    /// ANSI SQL
    #[default]
    Generic,
    #[serde(alias = "mariadb")]
    MySql,
    #[serde(alias = "postgresql")]
    Postgres,
    #[serde(alias = "microsoft", alias = "mssql")]
    SqlServer,
}

/// Words that must be quoted when used as identifiers.
const RESERVED: &[&str] = &[
    "all", "and", "as", "asc", "between", "by", "case", "check", "column", "constraint", "create",
    "cross", "default", "delete", "desc", "distinct", "drop", "else", "end", "exists", "false",
    "fetch", "for", "foreign", "from", "full", "group", "having", "in", "index", "inner", "insert",
    "into", "is", "join", "key", "left", "like", "limit", "not", "null", "offset", "on", "or",
    "order", "outer", "primary", "references", "right", "rows", "select", "set", "table", "then",
    "to", "top", "true", "union", "unique", "update", "user", "using", "values", "when", "where",
    "with",
];

/// How `a || b` is spelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ConcatStyle {
    /// `a || b`
    Pipes,
    /// `a + b`
    Plus,
    /// `CONCAT(a, b)`
    Function,
}

impl Dialect {
    /// Quote `name` if it is not a plain lower-case identifier or is a reserved word.
    ///
    /// Dotted names (`schema.table`) are quoted part by part.
    pub fn quote_identifier(self, name: &str) -> String {
        name.split('.')
            .map(|part| self.quote_part(part))
            .collect::<Vec<_>>()
            .join(".")
    }

    fn quote_part(self, part: &str) -> String {
        if !needs_quoting(part) {
            return part.to_string();
        }
        let (open, close) = match self {
            Dialect::Generic | Dialect::Postgres => ('"', '"'),
            Dialect::MySql => ('`', '`'),
            Dialect::SqlServer => ('[', ']'),
        };
        let mut quoted = String::with_capacity(part.len() + 2);
        quoted.push(open);
        for c in part.chars() {
            if c == close {
                quoted.push(close);
            }
            quoted.push(c);
        }
        quoted.push(close);
        quoted
    }

    /// Function name as emitted in SQL.
    pub fn function_name(self, function: &str) -> String {
        let upper = function.to_ascii_uppercase();
        match (self, upper.as_str()) {
            (Dialect::SqlServer, "LENGTH") => "LEN".to_string(),
            _ => upper,
        }
    }

    /// Trailing clause of a `LIKE` comparison.
    pub fn like_escape(self) -> &'static str {
        match self {
            Dialect::MySql => " ESCAPE '\\\\'",
            _ => " ESCAPE '\\'",
        }
    }

    pub(crate) fn concat_style(self) -> ConcatStyle {
        match self {
            Dialect::Generic | Dialect::Postgres => ConcatStyle::Pipes,
            Dialect::SqlServer => ConcatStyle::Plus,
            Dialect::MySql => ConcatStyle::Function,
        }
    }

    /// `TOP n ` prefix for the select list, if this dialect limits that way.
    pub(crate) fn top_clause(self, limit: Option<u64>, offset: Option<u64>) -> Option<String> {
        match (self, limit, offset) {
            (Dialect::SqlServer, Some(n), None) => Some(format!("TOP {n} ")),
            _ => None,
        }
    }

    /// Trailing row-limiting clause.
    ///
    /// SQL Server's `OFFSET ... FETCH` requires an `ORDER BY`; `ordered` says
    /// whether the statement already has one.
    pub(crate) fn limit_clause(
        self,
        limit: Option<u64>,
        offset: Option<u64>,
        ordered: bool,
    ) -> Option<String> {
        match self {
            Dialect::SqlServer => {
                let offset = offset?;
                let mut clause = String::new();
                if !ordered {
                    clause.push_str(" ORDER BY (SELECT NULL)");
                }
                clause.push_str(&format!(" OFFSET {offset} ROWS"));
                if let Some(n) = limit {
                    clause.push_str(&format!(" FETCH NEXT {n} ROWS ONLY"));
                }
                Some(clause)
            }
            _ => match (limit, offset) {
                (Some(n), Some(m)) => Some(format!(" LIMIT {n} OFFSET {m}")),
                (Some(n), None) => Some(format!(" LIMIT {n}")),
                // MySQL has no OFFSET without LIMIT
                (None, Some(m)) if self == Dialect::MySql => {
                    Some(format!(" LIMIT {} OFFSET {m}", u64::MAX))
                }
                (None, Some(m)) => Some(format!(" OFFSET {m}")),
                (None, None) => None,
            },
        }
    }
}

fn needs_quoting(part: &str) -> bool {
    let mut chars = part.chars();
    let plain = match chars.next() {
        Some(first) => {
            (first.is_ascii_lowercase() || first == '_')
                && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
        }
        None => false,
    };
    !plain || RESERVED.contains(&part)
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Dialect::Generic => "generic",
            Dialect::MySql => "mysql",
            Dialect::Postgres => "postgres",
            Dialect::SqlServer => "sqlserver",
        })
    }
}
