//! Error types for storage operations.

/// Errors raised while talking to the database.
///
/// `Display` is the bare engine text: the gateway hands it to clients
/// verbatim inside the response envelope.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No pooled connection could be acquired.
    #[error("{0}")]
    Pool(#[from] r2d2::Error),

    /// The engine rejected or failed a statement.
    #[error("{0}")]
    Database(#[from] rusqlite::Error),

    /// A statement passed the `SELECT` prefix check but would write.
    #[error("statement is not read-only")]
    NotReadOnly,

    /// The query text holds more than one statement.
    #[error("only one statement may be run per query")]
    MultipleStatements,
}
