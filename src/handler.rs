use super::{
    metrics::{MetricsSink, Unit, JSON_PATH_ERROR},
    query::Query,
    types::{ChangeRecord, EventName},
};

use serde_json::Value;
use tracing::{debug, error};

/// A JSON path and the value its first match must equal.
#[derive(Debug, Clone)]
pub struct Condition {
    query: Query,
    value: Value,
}

impl Condition {
    pub fn new(query: Query, value: Value) -> Self {
        Self { query, value }
    }

    pub fn query(&self) -> &Query {
        &self.query
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Compare the first node selected by the query with the expected value.
    ///
    /// Type and value must both be equal: `"42"` does not match `42`.
    fn is_met(&self, document: &Value, metrics: &dyn MetricsSink) -> bool {
        match self.query.first(document) {
            Ok(Some(found)) => {
                debug!(
                    "JsonPath {} looking for {} found {}",
                    self.query, self.value, found
                );
                *found == self.value
            }
            Ok(None) => {
                debug!(
                    "Unable to find any match for the condition {} value {}",
                    self.query, self.value
                );
                false
            }
            Err(err) => {
                error!("Unable to run the json query: {err}");
                metrics.put_metric(JSON_PATH_ERROR, 1.0, Unit::Count);
                false
            }
        }
    }
}

/// A rule routing matching change records to one workflow.
#[derive(Debug, Clone)]
pub struct EventHandler {
    target_id: String,
    event_source_arn: Option<String>,
    event_names: Vec<EventName>,
    conditions: Vec<Condition>,
    input_mapping: Vec<(String, Query)>,
}

impl EventHandler {
    /// Create a handler firing for every record and starting `target_id` with an empty input.
    pub fn new(target_id: impl Into<String>) -> Self {
        Self {
            target_id: target_id.into(),
            event_source_arn: None,
            event_names: vec![],
            conditions: vec![],
            input_mapping: vec![],
        }
    }

    /// Restrict the handler to records from one stream.
    pub fn set_event_source_arn(self, event_source_arn: impl Into<String>) -> Self {
        Self {
            event_source_arn: Some(event_source_arn.into()),
            ..self
        }
    }

    /// Restrict the handler to the given event names. Empty means all of them.
    pub fn set_event_names(self, event_names: Vec<EventName>) -> Self {
        Self {
            event_names,
            ..self
        }
    }

    /// Conditions that must all hold for the handler to fire.
    pub fn set_conditions(self, conditions: Vec<Condition>) -> Self {
        Self { conditions, ..self }
    }

    /// Workflow input fields and the queries filling them.
    pub fn set_input_mapping(self, input_mapping: Vec<(String, Query)>) -> Self {
        Self {
            input_mapping,
            ..self
        }
    }

    pub fn target_id(&self) -> &str {
        self.target_id.as_str()
    }

    pub fn event_source_arn(&self) -> Option<&str> {
        self.event_source_arn.as_deref()
    }

    pub fn event_names(&self) -> &[EventName] {
        self.event_names.as_slice()
    }

    pub fn conditions(&self) -> &[Condition] {
        self.conditions.as_slice()
    }

    pub fn input_mapping(&self) -> &[(String, Query)] {
        self.input_mapping.as_slice()
    }

    /// Return true if the record must start this handler's workflow.
    pub fn matches(&self, record: &ChangeRecord, metrics: &dyn MetricsSink) -> bool {
        if !self.event_names.is_empty() && !self.event_names.contains(&record.event_name()) {
            debug!(
                "Event name {} does not match {:?}",
                record.event_name(),
                self.event_names
            );
            return false;
        }

        if let (Some(expected), Some(actual)) = (self.event_source_arn(), record.event_source_arn())
        {
            if expected != actual {
                debug!("Event source {actual} does not match {expected}");
                return false;
            }
        }

        let change = match record.change() {
            Some(change) => change,
            None => {
                error!("Record {} has no change to evaluate", record.id());
                return false;
            }
        };

        if self.conditions.is_empty() {
            return true;
        }

        let document = match change.document() {
            Ok(document) => document,
            Err(err) => {
                error!("Unable to render record {} for json queries: {err}", record.id());
                metrics.put_metric(JSON_PATH_ERROR, 1.0, Unit::Count);
                return false;
            }
        };

        self.conditions
            .iter()
            .all(|condition| condition.is_met(&document, metrics))
    }
}
