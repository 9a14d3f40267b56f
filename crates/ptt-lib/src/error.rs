use thiserror::Error;

pub type Result<T> = std::result::Result<T, PipelineError>;

/// Failures raised by the filter bank, detectors and session processing.
///
/// None of these are retried: a channel that hits one of them is aborted
/// rather than producing a partial result.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PipelineError {
    /// A filter or detector configuration violates a stage invariant.
    #[error("invalid parameter for {stage}: {reason}")]
    InvalidParameter { stage: &'static str, reason: String },

    /// A search window is empty after clipping to the signal bounds.
    #[error("empty search window [{start}, {end}) in a signal of {len} samples")]
    EmptyWindow {
        start: isize,
        end: isize,
        len: usize,
    },

    /// Fewer events than an interval metric needs.
    #[error("need at least {required} events, found {found}")]
    InsufficientEvents { required: usize, found: usize },

    /// Two event sequences that must pair one-to-one differ in length.
    #[error("event sequences differ in length: {reference} reference vs {events} events")]
    AlignmentMismatch { reference: usize, events: usize },

    /// A channel required by the session is not present in the table.
    #[error("channel '{role}' mapped to column '{column}' not found")]
    MissingChannel { role: &'static str, column: String },

    /// The requested session id selects no rows.
    #[error("no rows for session {0}")]
    EmptySession(i64),
}

impl PipelineError {
    pub(crate) fn invalid(stage: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            stage,
            reason: reason.into(),
        }
    }
}
