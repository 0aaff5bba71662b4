//! Submission module
//!
//! Payload assembly, staged progress, and the HTTP pipeline for reports and
//! events.

mod payload;
mod pipeline;
mod progress;

pub use payload::{PhotoPart, SubmissionPayload};
pub use pipeline::{SubmissionPipeline, SubmissionReceipt, SubmitError};
pub use progress::{
    SubmissionPhase, SubmissionProgress, DONE, PREPARING_TARGET, UPLOADING_TARGET,
};
