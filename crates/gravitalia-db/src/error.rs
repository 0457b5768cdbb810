use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("graph driver error: {0}")]
    Driver(#[from] neo4rs::Error),

    #[error("column `{column}` of `{query}` could not be decoded: {source}")]
    MalformedRow {
        query: &'static str,
        column: &'static str,
        #[source]
        source: neo4rs::DeError,
    },

    #[error("graph state lock poisoned")]
    Poisoned,
}

pub type Result<T> = std::result::Result<T, DbError>;
