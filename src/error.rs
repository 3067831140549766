use crate::state::SegmentId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("unknown segment: {0}")]
    UnknownSegment(SegmentId),
    #[error("state lock poisoned")]
    StateLock,
}
