use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ExtractError {
    #[error("Aggregate root id column `{0}` is missing from the result metadata")]
    RootIdColumnMissing(String),

    #[error("List index value `{0}` is not a positive integer")]
    InvalidListIndex(String),

    #[error("Row source failure: {0}")]
    RowSource(String),
}
