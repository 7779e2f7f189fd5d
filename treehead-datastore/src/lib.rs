mod error;
mod log_datastore;

pub mod model;
pub mod models;

pub use error::Error;
pub use log_datastore::LogDatastore;
pub use model::Model;
pub use rocksdb::WriteBatch;

pub type Result<T> = std::result::Result<T, Error>;
