use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// No leadership record exists for the policy yet.
    #[error("document not found")]
    NotFound,

    /// A concurrent writer changed the document since it was read.
    #[error("version conflict")]
    VersionConflict,

    /// The leadership collection has never been created.
    #[error("index not found")]
    IndexNotFound,

    #[error("invalid query template: {0}")]
    Template(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("store error: {0}")]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
