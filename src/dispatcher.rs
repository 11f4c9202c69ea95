use super::{
    client::WorkflowClient,
    error::Error,
    metrics::{MetricsSink, Unit, EXECUTION_EXISTS, EXECUTION_STARTED},
    types::DispatchOutcome,
};

use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use tracing::{error, info};

/// Step Functions rejects execution names longer than this.
pub const MAX_EXECUTION_NAME_LEN: usize = 80;

/// Length of each digest in an execution name.
const DIGEST_LEN: usize = 16;

/// Derive the execution name for a record and a target.
///
/// The same pair always yields the same name, which lets the workflow service reject
/// a second start for a redelivered record. Including the target keeps two handlers
/// firing on one record from colliding with each other.
///
/// The name is `{id}-{digest(id)}-{digest(target)}`. The readable id prefix is
/// sanitized and truncated, so the raw id digest is what keeps distinct ids apart.
pub fn execution_name(record_id: &str, target_id: &str) -> String {
    let max_prefix_len = MAX_EXECUTION_NAME_LEN - 2 * (DIGEST_LEN + 1);

    let prefix = record_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .take(max_prefix_len)
        .collect::<String>();

    format!("{prefix}-{}-{}", digest(record_id), digest(target_id))
}

fn digest(value: &str) -> String {
    let mut hex = hex::encode(Sha256::digest(value.as_bytes()));
    hex.truncate(DIGEST_LEN);
    hex
}

/// Starts workflow executions and classifies the result.
#[derive(Debug, Clone)]
pub struct Dispatcher<Client>
where
    Client: WorkflowClient,
{
    client: Client,
}

impl<Client> Dispatcher<Client>
where
    Client: WorkflowClient,
{
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Start `target_id` under `execution_name`.
    ///
    /// An execution that already exists counts as success. Any other error is returned as
    /// [`DispatchOutcome::Failed`] and is not retried here.
    pub async fn dispatch(
        &self,
        target_id: &str,
        execution_name: &str,
        input: &Map<String, Value>,
        metrics: &dyn MetricsSink,
    ) -> DispatchOutcome {
        let input = match serde_json::to_string(input) {
            Ok(input) => input,
            Err(err) => return DispatchOutcome::Failed(Error::from(err)),
        };

        info!("Starting execution {execution_name} for state machine {target_id}");

        match self
            .client
            .start_execution(target_id, execution_name, input)
            .await
        {
            Ok(execution_arn) => {
                info!("Started execution: {execution_arn}");
                metrics.put_metric(EXECUTION_STARTED, 1.0, Unit::Count);
                DispatchOutcome::Started { execution_arn }
            }
            Err(Error::ExecutionAlreadyExists(_)) => {
                info!("Execution {execution_name} already exists");
                metrics.put_metric(EXECUTION_EXISTS, 1.0, Unit::Count);
                DispatchOutcome::AlreadyExists
            }
            Err(err) => {
                error!("Unable to start execution {execution_name} for state machine {target_id}: {err}");
                DispatchOutcome::Failed(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::MetricsLogger;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct TestClient {
        inputs: Arc<Mutex<Vec<(String, String)>>>,
        fail: bool,
    }

    #[async_trait]
    impl WorkflowClient for TestClient {
        async fn start_execution(
            &self,
            _target_id: &str,
            execution_name: &str,
            input: String,
        ) -> Result<String, Error> {
            if self.fail {
                return Err(Error::SdkError("throttled".into()));
            }

            let mut inputs = self.inputs.lock().unwrap();
            if inputs.iter().any(|(name, _)| name == execution_name) {
                return Err(Error::ExecutionAlreadyExists(execution_name.to_string()));
            }
            inputs.push((execution_name.to_string(), input));
            Ok(format!("arn:execution:{execution_name}"))
        }
    }

    #[test]
    fn execution_names_are_deterministic_per_record_and_target() {
        let name = execution_name("r1", "arn:sm:a");
        assert_eq!(name, execution_name("r1", "arn:sm:a"));
        assert!(name.starts_with("r1-"));
        assert_ne!(name, execution_name("r1", "arn:sm:b"));
        assert_ne!(name, execution_name("r2", "arn:sm:a"));
    }

    #[test]
    fn execution_names_respect_the_service_limits() {
        let long_id = "x".repeat(200);
        assert_eq!(execution_name(&long_id, "arn:sm").len(), MAX_EXECUTION_NAME_LEN);

        let name = execution_name("a b/c:d", "arn:sm");
        assert!(name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
        assert!(name.starts_with("a_b_c_d-"));
    }

    #[test]
    fn ids_differing_only_in_dropped_characters_get_distinct_names() {
        assert_ne!(
            execution_name("order:1", "arn:sm"),
            execution_name("order/1", "arn:sm")
        );

        let (a, b) = (format!("{}A", "x".repeat(70)), format!("{}B", "x".repeat(70)));
        let (name_a, name_b) = (execution_name(&a, "arn:sm"), execution_name(&b, "arn:sm"));
        assert_ne!(name_a, name_b);
        assert!(name_a.len() <= MAX_EXECUTION_NAME_LEN);
        assert!(name_b.len() <= MAX_EXECUTION_NAME_LEN);
    }

    #[tokio::test]
    async fn second_dispatch_with_the_same_name_already_exists() {
        let metrics = MetricsLogger::new("test").writer(std::io::sink());
        let client = TestClient::default();
        let dispatcher = Dispatcher::new(client.clone());
        let mut input = Map::new();
        input.insert("finalStatus".into(), json!("DONE"));

        let first = dispatcher.dispatch("arn:sm", "r1-x", &input, &metrics).await;
        assert!(matches!(first, DispatchOutcome::Started { .. }));

        let second = dispatcher.dispatch("arn:sm", "r1-x", &input, &metrics).await;
        assert!(matches!(second, DispatchOutcome::AlreadyExists));
        assert!(second.is_success());

        assert_eq!(metrics.sum(EXECUTION_STARTED), 1.0);
        assert_eq!(metrics.sum(EXECUTION_EXISTS), 1.0);

        let inputs = client.inputs.lock().unwrap();
        assert_eq!(inputs.len(), 1);
        assert_eq!(inputs[0].1, r#"{"finalStatus":"DONE"}"#);
    }

    #[tokio::test]
    async fn other_errors_fail_the_dispatch() {
        let metrics = MetricsLogger::new("test").writer(std::io::sink());
        let dispatcher = Dispatcher::new(TestClient {
            fail: true,
            ..TestClient::default()
        });

        let outcome = dispatcher.dispatch("arn:sm", "r1-x", &Map::new(), &metrics).await;
        assert!(matches!(outcome, DispatchOutcome::Failed(Error::SdkError(_))));
        assert!(!outcome.is_success());
        assert_eq!(metrics.sum(EXECUTION_STARTED), 0.0);
    }
}
