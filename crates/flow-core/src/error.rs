#[derive(Debug, thiserror::Error)]
pub enum FlowError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("invalid patient id: {0}")]
    Uuid(#[from] flow_uuid::UuidError),
    #[error("unknown stage: {0}")]
    UnknownStage(String),
    #[error("failed to create storage directory: {0}")]
    StorageDirCreation(std::io::Error),
    #[error("failed to read flow slot: {0}")]
    StorageRead(std::io::Error),
    #[error("failed to write flow slot: {0}")]
    StorageWrite(std::io::Error),
    #[error("failed to serialize flow collection: {0}")]
    Serialization(serde_json::Error),
    #[error("failed to allocate a unique patient id after {0} attempts")]
    IdAllocation(usize),
}

pub type FlowResult<T> = std::result::Result<T, FlowError>;

impl FlowError {
    /// Wraps a validation failure on a named caller-supplied field.
    pub(crate) fn invalid_field(field: &str, err: flow_types::TextError) -> Self {
        FlowError::InvalidInput(format!("{field}: {err}"))
    }
}
