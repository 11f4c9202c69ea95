use super::error::Error;

use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_sfn::Client as SfnClient;

#[derive(Debug, Clone)]
pub struct Client {
    sfn: SfnClient,
}

impl Client {
    pub fn new(config: &SdkConfig) -> Self {
        Self {
            sfn: SfnClient::new(config),
        }
    }
}

#[async_trait]
pub trait WorkflowClient: Clone + Send + Sync {
    /// Start an execution of the target workflow and return its execution ARN.
    ///
    /// Must return [`Error::ExecutionAlreadyExists`] when an execution with the same name
    /// was already started for the target.
    async fn start_execution(
        &self,
        target_id: &str,
        execution_name: &str,
        input: String,
    ) -> Result<String, Error>;
}

#[async_trait]
impl WorkflowClient for Client {
    async fn start_execution(
        &self,
        target_id: &str,
        execution_name: &str,
        input: String,
    ) -> Result<String, Error> {
        self.sfn
            .start_execution()
            .state_machine_arn(target_id)
            .name(execution_name)
            .input(input)
            .send()
            .await
            .map(|output| output.execution_arn().to_string())
            .map_err(|err| {
                let err = err.into_service_error();
                if err.is_execution_already_exists() {
                    Error::ExecutionAlreadyExists(execution_name.to_string())
                } else {
                    Error::SdkError(Box::new(err))
                }
            })
    }
}
