#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! `SQLite` record store for the data hub.
//!
//! One database file holds every entity: sources, datasets, records,
//! ingestion logs, analyses, query audit rows, and users. Relationships are
//! plain foreign-key ids resolved through the query functions in
//! [`queries`]; nothing here lazily loads an object graph. Record payloads
//! are stored as JSON text and surfaced as [`serde_json::Value`].

pub mod db;
pub mod queries;

/// Errors that can occur during record store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A database statement failed.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// A stored JSON column could not be parsed or serialized.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Filesystem error while creating the database directory.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The referenced source id does not resolve.
    #[error("Source {id} not found")]
    SourceNotFound {
        /// The id that failed to resolve.
        id: i64,
    },

    /// The referenced dataset id does not resolve.
    #[error("Dataset {id} not found")]
    DatasetNotFound {
        /// The id that failed to resolve.
        id: i64,
    },

    /// The referenced record id does not resolve.
    #[error("Record {id} not found")]
    RecordNotFound {
        /// The id that failed to resolve.
        id: i64,
    },

    /// The referenced analysis id does not resolve.
    #[error("Analysis {id} not found")]
    AnalysisNotFound {
        /// The id that failed to resolve.
        id: i64,
    },

    /// The referenced ingestion log id does not resolve.
    #[error("Ingestion log {id} not found")]
    LogNotFound {
        /// The id that failed to resolve.
        id: i64,
    },
}
