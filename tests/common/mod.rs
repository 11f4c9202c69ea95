#![allow(dead_code)]

use async_trait::async_trait;
use dynamo_workflow_trigger::{
    metrics::MetricsLogger,
    types::{Change, ChangeRecord, EventName},
    Error, TriggerConfig, WorkflowClient,
};
use serde_json::{json, Value};
use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, Mutex},
};

pub const STATE_MACHINE: &str = "arn:aws:states:us-east-1:123456789012:stateMachine:OrderDone";
pub const AUDIT_MACHINE: &str = "arn:aws:states:us-east-1:123456789012:stateMachine:Audit";

/// One started execution as seen by the fake workflow service.
#[derive(Debug, Clone, PartialEq)]
pub struct Execution {
    pub target_id: String,
    pub name: String,
    pub input: Value,
}

/// Fake workflow service enforcing unique execution names per target.
#[derive(Debug, Clone, Default)]
pub struct TestClient {
    executions: Arc<Mutex<Vec<Execution>>>,
    failing_names: Arc<Mutex<HashSet<String>>>,
}

impl TestClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every start whose execution name begins with `prefix` fail.
    pub fn fail_on(&self, prefix: &str) {
        self.failing_names.lock().unwrap().insert(prefix.to_string());
    }

    pub fn executions(&self) -> Vec<Execution> {
        self.executions.lock().unwrap().clone()
    }

    pub fn executions_by_target(&self) -> HashMap<String, usize> {
        self.executions()
            .into_iter()
            .fold(HashMap::new(), |mut acc, execution| {
                *acc.entry(execution.target_id).or_default() += 1;
                acc
            })
    }
}

#[async_trait]
impl WorkflowClient for TestClient {
    async fn start_execution(
        &self,
        target_id: &str,
        execution_name: &str,
        input: String,
    ) -> Result<String, Error> {
        let failing = self
            .failing_names
            .lock()
            .unwrap()
            .iter()
            .any(|prefix| execution_name.starts_with(prefix.as_str()));
        if failing {
            return Err(Error::SdkError("service unavailable".into()));
        }

        let mut executions = self.executions.lock().unwrap();
        if executions
            .iter()
            .any(|e| e.target_id == target_id && e.name == execution_name)
        {
            return Err(Error::ExecutionAlreadyExists(execution_name.to_string()));
        }

        executions.push(Execution {
            target_id: target_id.to_string(),
            name: execution_name.to_string(),
            input: serde_json::from_str(&input).unwrap(),
        });

        Ok(format!("{target_id}:{execution_name}"))
    }
}

pub fn metrics() -> MetricsLogger {
    MetricsLogger::new("test").writer(std::io::sink())
}

/// Handler starting [`STATE_MACHINE`] when an order becomes DONE.
pub fn done_config() -> TriggerConfig {
    TriggerConfig::from_json(
        &json!({
            "eventHandlers": [{
                "eventNames": ["MODIFY"],
                "conditions": [{ "jsonPath": "$.newImage.status.S", "value": "DONE" }],
                "stateMachineConfig": {
                    "stateMachineArn": STATE_MACHINE,
                    "input": { "finalStatus": "$.newImage.status.S" }
                }
            }]
        })
        .to_string(),
    )
    .unwrap()
}

pub fn status_record(id: &str, event_name: EventName, new: Option<&str>, old: Option<&str>) -> ChangeRecord {
    let image = |status: &str| {
        json!({ "status": { "S": status } })
            .as_object()
            .cloned()
            .unwrap()
    };

    ChangeRecord::new(id, event_name).set_change(Change {
        keys: None,
        new_image: new.map(image),
        old_image: old.map(image),
    })
}

pub fn done_record(id: &str) -> ChangeRecord {
    status_record(id, EventName::Modify, Some("DONE"), Some("PENDING"))
}
