mod config;
mod connection;
mod error;
mod models;
/// MongoDB implementation of the store trait.
pub mod store;

pub use config::MongoConfig;
pub use error::MongoDaoError;
pub use store::MongoGameOnStore;

use crate::dao::storage::StorageError;

impl From<MongoDaoError> for StorageError {
    fn from(err: MongoDaoError) -> Self {
        match err {
            MongoDaoError::DuplicateEmail { email } => StorageError::duplicate("user email", email),
            other => StorageError::unavailable(other.to_string(), other),
        }
    }
}
