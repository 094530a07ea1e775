use thiserror::Error;

#[derive(Error, Debug)]
pub enum FillError {
    #[error("Failed to parse PDF template: {0}")]
    ParseError(String),

    #[error("Failed to serialize filled PDF: {0}")]
    SaveError(String),
}
