use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// The ledger exists but one of its rows could not be parsed
    #[error("Malformed sightings store {path}: {source}")]
    MalformedStore {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Users file not found: {0}")]
    MissingUsers(PathBuf),

    #[error("Not logged in")]
    Unauthorized,

    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}
