use thiserror::Error;

/// Coarse category of a [`ClassifierError`], used to decide retry policy and
/// to tag the warn log emitted when the routing layer falls back to frontier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassifierKind {
    /// The call was aborted after exceeding its timeout.
    Timeout,
    /// The upstream reported that the model is still loading.
    ModelLoading,
    /// The call completed but no decision digit could be extracted.
    NoDecision,
    /// Any other transport failure, non-OK status, or parse failure.
    ClassifierError,
}

/// Every way a classification attempt can fail. None of these ever reach the
/// client — the routing handler catches all of them and falls back to
/// `frontier` instead of surfacing an error.
#[derive(Debug, Error)]
pub enum ClassifierError {
    /// Both the initial attempt and its one retry timed out.
    #[error("classifier call timed out")]
    Timeout,
    /// The model-loading retry budget was exhausted.
    #[error("classifier model still loading after retries")]
    ModelLoading,
    /// A response was received but no `[0-2]` digit could be found in it.
    #[error("classifier returned no decision")]
    NoDecision,
    /// Transport failure, non-OK status, or a response body that didn't parse.
    #[error("classifier request failed: {0}")]
    Transport(String),
}

impl ClassifierError {
    /// The coarse kind, for logging and retry-policy dispatch.
    pub fn kind(&self) -> ClassifierKind {
        match self {
            Self::Timeout => ClassifierKind::Timeout,
            Self::ModelLoading => ClassifierKind::ModelLoading,
            Self::NoDecision => ClassifierKind::NoDecision,
            Self::Transport(_) => ClassifierKind::ClassifierError,
        }
    }
}
