use mongodb::error::Error as MongoError;
use thiserror::Error;
use uuid::Uuid;

/// Result alias for the MongoDB backend.
pub type MongoResult<T> = std::result::Result<T, MongoDaoError>;

/// Failures raised by the MongoDB backend before they are folded into `StorageError`.
#[derive(Debug, Error)]
pub enum MongoDaoError {
    /// `MONGO_URI` could not be parsed.
    #[error("failed to parse MongoDB connection URI `{uri}`")]
    InvalidUri {
        /// Offending URI.
        uri: String,
        /// Driver parse error.
        #[source]
        source: MongoError,
    },
    /// The driver refused the parsed options.
    #[error("failed to build MongoDB client from options")]
    ClientConstruction {
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// Every ping of the connect loop failed.
    #[error("MongoDB ping failed during initial connection after {attempts} attempt(s)")]
    InitialPing {
        /// Pings tried before giving up.
        attempts: u32,
        /// Error of the last ping.
        #[source]
        source: MongoError,
    },
    /// A periodic ping failed.
    #[error("MongoDB ping health check failed")]
    HealthPing {
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// Index creation failed at startup.
    #[error("failed to ensure index `{index}` on collection `{collection}`")]
    EnsureIndex {
        /// Collection being indexed.
        collection: &'static str,
        /// Index name.
        index: &'static str,
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// The unique email index rejected an insert.
    #[error("email `{email}` is already registered")]
    DuplicateEmail {
        /// Conflicting email.
        email: String,
    },
    /// An insert or replace failed.
    #[error("failed to write {entity} `{id}`")]
    Save {
        /// Entity kind.
        entity: &'static str,
        /// Document id.
        id: Uuid,
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// A lookup failed or returned an undecodable document.
    #[error("failed to load {entity} `{key}`")]
    Load {
        /// Entity kind.
        entity: &'static str,
        /// Lookup key.
        key: String,
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// A collection scan failed.
    #[error("failed to list {entity}")]
    List {
        /// Entity kind.
        entity: &'static str,
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// A delete failed.
    #[error("failed to delete {entity} matching `{key}`")]
    Delete {
        /// Entity kind.
        entity: &'static str,
        /// Filter description.
        key: String,
        /// Driver error.
        #[source]
        source: MongoError,
    },
}
