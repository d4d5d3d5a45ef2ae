use thiserror::Error;

/// Failures of a plan generation or meal swap request.
///
/// Each variant leaves the stored data untouched: the insert, reconcile and
/// cleanup steps only commit once the whole response has been mapped.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("failed to decode generation response: {0}")]
    Decode(#[from] serde_json::Error),

    /// `success: false` from the server; the message is shown as-is.
    #[error("{0}")]
    Server(String),

    #[error("server reported success but returned no payload")]
    InvalidResponse,

    /// A `dayOfWeek` offset that lands outside the representable date range.
    #[error("day offset {0} is out of range")]
    DayOutOfRange(i64),

    #[error("generation request failed: {0}")]
    Transport(String),

    #[error("no user profile found; create one before generating a plan")]
    MissingProfile,

    #[error("a plan generation is already in progress")]
    InProgress,

    #[error("meal {0} not found")]
    MealNotFound(i64),

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

/// Failures talking to the remote recipe catalog.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("catalog request failed: {0}")]
    Transport(String),

    #[error("failed to decode catalog response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}
