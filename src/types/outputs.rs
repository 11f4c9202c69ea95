use super::super::error::Error;

/// Result of one attempt to start a workflow execution.
#[derive(Debug)]
pub enum DispatchOutcome {
    /// A new execution was started.
    Started { execution_arn: String },
    /// An execution with the same name already exists; a redelivery.
    AlreadyExists,
    /// The start call failed and the record must be retried.
    Failed(Error),
}

impl DispatchOutcome {
    pub fn is_success(&self) -> bool {
        !matches!(self, Self::Failed(_))
    }
}
