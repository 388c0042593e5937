//! Error types for fetching, storing and ingesting rates

use std::fmt;
use thiserror::Error;

/// Message used when the provider gives no reason for a failure.
pub const UNKNOWN_ERROR: &str = "unknown error";

/// Errors raised while fetching a quote from the provider.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Invalid currency pair '{0}', expected BASE/QUOTE")]
    InvalidPair(String),

    #[error("Request to quote provider timed out")]
    Timeout,

    #[error("Request error: {0}")]
    Request(String),

    #[error("HTTP error: {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Quote provider error: {0}")]
    Provider(String),

    #[error("Malformed provider response: {0}")]
    Malformed(String),

    #[error("Provider returned pair {returned}, requested {requested}")]
    PairMismatch { requested: String, returned: String },
}

impl FetchError {
    /// The message reported by the provider itself, if any.
    pub fn upstream_message(&self) -> Option<&str> {
        match self {
            FetchError::Status { message, .. } | FetchError::Provider(message)
                if message != UNKNOWN_ERROR =>
            {
                Some(message.as_str())
            }
            _ => None,
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout
        } else {
            FetchError::Request(err.to_string())
        }
    }
}

/// Errors opening the database connection. Fatal for the process.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("Invalid database settings: {0}")]
    InvalidSettings(String),

    #[error("Database connection failed: {0}")]
    Rejected(#[from] diesel::ConnectionError),

    #[error("Database session setup failed: {0}")]
    Session(#[source] diesel::result::Error),

    #[error("Database connection unavailable: {0}")]
    Unavailable(String),
}

/// Errors bootstrapping the destination database and table.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("Invalid SQL identifier '{0}'")]
    InvalidIdentifier(String),

    #[error("Failed to inspect schema: {0}")]
    Inspect(#[source] diesel::result::Error),

    #[error("Failed to create database '{name}': {source}")]
    CreateDatabase {
        name: String,
        #[source]
        source: diesel::result::Error,
    },

    #[error("Failed to create table '{name}': {source}")]
    CreateTable {
        name: String,
        #[source]
        source: diesel::result::Error,
    },

    #[error("Table '{name}' cannot store rate records: {reason}")]
    IncompatibleTable { name: String, reason: String },

    #[error("Database connection unavailable: {0}")]
    Unavailable(String),
}

/// Errors persisting a rate record.
#[derive(Debug, Error)]
pub enum WriteError {
    #[error("Insert failed: {0}")]
    Database(#[from] diesel::result::Error),

    #[error("Database connection unavailable: {0}")]
    Unavailable(String),

    #[error("Record rejected by store: {0}")]
    Rejected(String),
}

/// Errors reading rate records back from a store.
#[derive(Debug, Error)]
pub enum ReadError {
    #[error("Query failed: {0}")]
    Database(#[from] diesel::result::Error),

    #[error("Database connection unavailable: {0}")]
    Unavailable(String),
}

/// The step at which an ingestion cycle stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Fetch,
    Write,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Fetch => f.write_str("fetch"),
            Stage::Write => f.write_str("write"),
        }
    }
}

/// A failed ingestion cycle, tagged with the stage that failed.
///
/// `Fetch` means nothing was written. `Write` means a quote was fetched but
/// no row was persisted.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("Ingestion failed at fetch stage: {0}")]
    Fetch(#[source] FetchError),

    #[error("Ingestion failed at write stage: {0}")]
    Write(#[source] WriteError),
}

impl IngestError {
    pub fn stage(&self) -> Stage {
        match self {
            IngestError::Fetch(_) => Stage::Fetch,
            IngestError::Write(_) => Stage::Write,
        }
    }
}
