//! Opening the PostgreSQL connection behind [`MayPostgresExecutor`](crate::MayPostgresExecutor).
//!
//! URLs are checked for shape before anything is dialed, and only the host
//! part ever reaches the log.

use crate::sql::Dialect;
use may_postgres::{Client, Error as PostgresError};
use std::fmt;

#[derive(Debug)]
pub enum ConnectionError {
    /// The URL is neither `postgres://user@host/db` nor `key=value` pairs
    MalformedUrl(String),
    /// The server could not be reached or refused the login
    Postgres(PostgresError),
    /// The configured dialect cannot be spoken over a PostgreSQL connection
    UnsupportedDialect(Dialect),
}

impl fmt::Display for ConnectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionError::MalformedUrl(reason) => write!(f, "Malformed database URL: {reason}"),
            ConnectionError::Postgres(e) => write!(f, "Could not connect: {e}"),
            ConnectionError::UnsupportedDialect(dialect) => {
                write!(f, "Dialect {dialect} cannot be used with a PostgreSQL connection")
            }
        }
    }
}

impl std::error::Error for ConnectionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConnectionError::Postgres(e) => Some(e),
            _ => None,
        }
    }
}

impl From<PostgresError> for ConnectionError {
    fn from(err: PostgresError) -> Self {
        ConnectionError::Postgres(err)
    }
}

/// Open a connection. Blocks the calling coroutine until the server answers.
///
/// # Errors
///
/// `MalformedUrl` without touching the network, `Postgres` if connecting fails.
pub fn connect(url: &str) -> Result<Client, ConnectionError> {
    check_url(url)?;
    let client = may_postgres::connect(url)?;
    log::debug!("Connected to {}", redact(url));
    Ok(client)
}

fn check_url(url: &str) -> Result<(), ConnectionError> {
    let malformed = |reason: &str| Err(ConnectionError::MalformedUrl(reason.to_string()));
    match url.split_once("://") {
        Some(("postgres" | "postgresql", rest)) if rest.contains('@') => Ok(()),
        Some(("postgres" | "postgresql", _)) => malformed("missing user before '@'"),
        Some((scheme, _)) => malformed(&format!("unsupported scheme {scheme}")),
        None if url.contains('=') => Ok(()),
        None => malformed("expected a postgres:// URL or key=value pairs"),
    }
}

/// Everything after the credentials of a URL; key-value strings are not echoed.
fn redact(url: &str) -> &str {
    match url.rfind('@') {
        Some(at) if url.contains("://") => &url[at + 1..],
        _ => "server from key-value settings",
    }
}
