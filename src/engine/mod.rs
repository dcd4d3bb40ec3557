//! Generic engine for driving eventually consistent control planes.
//!
//! The pieces compose in one direction: a pipeline of named steps, where a
//! step issues a mutation under conflict retry, polls a resource until it
//! settles, or replaces a named resource before recreating it. Nothing here
//! knows what is being provisioned; that lives in the pipelines.
mod pipeline;
mod poll;
mod replace;
mod retry;

pub use pipeline::{Pipeline, PipelineContext, StepKind};
pub use poll::{wait_until_settled, PollPolicy, Settled, StatusClassifier};
pub use replace::{replace, replace_with_mutate};
pub use retry::{run_with_retry, RetryPolicy};

use crate::plane::PlaneError;
use thiserror::Error;

/// Fatal failure of a pipeline run.
///
/// Anything of this type aborts the remaining steps. Nothing already
/// provisioned is compensated; the operator reruns the whole pipeline once
/// the cause is addressed.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Plane(#[from] PlaneError),

    /// The control plane reported the resource settled in a failure status
    /// (or one this tool was never taught to wait through).
    #[error("{kind} {id} settled in failure status {status}")]
    FailureStatus {
        kind: String,
        id: String,
        status: String,
    },

    /// Only reachable under a bounded retry policy.
    #[error("conflict did not clear after {attempts} attempts: {message}")]
    RetriesExhausted { attempts: u32, message: String },

    /// Only reachable under a bounded poll policy.
    #[error("resource did not settle within {polls} polls")]
    PollBudgetExhausted { polls: u32 },

    #[error("step {step} recorded an output twice")]
    DuplicateOutput { step: String },

    #[error("step {step} has not recorded an output")]
    MissingOutput { step: String },

    #[error("output of step {step} has no string at {pointer}")]
    MissingField { step: String, pointer: String },
}
