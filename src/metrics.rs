//! Per-batch metrics.
//!
//! The [`BatchProcessor`](crate::processor::BatchProcessor) reports every measurement to a
//! [`MetricsSink`] it receives with the batch, and flushes the sink once the batch is done.
//! [`MetricsLogger`] aggregates the measurements in memory and writes them as CloudWatch
//! [embedded metric format](https://docs.aws.amazon.com/AmazonCloudWatch/latest/monitoring/CloudWatch_Embedded_Metric_Format_Specification.html)
//! documents, one JSON object per line.

use super::error::Error;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Map, Value};
use std::{
    collections::BTreeMap,
    io::{self, Write},
    mem,
    sync::{Mutex, MutexGuard, PoisonError},
};

pub const OPERATION: &str = "HandleRecord";
pub const BATCH_TIME: &str = "BatchTime";
pub const TIME: &str = "Time";
pub const SUCCESS_LATENCY: &str = "SuccessLatency";
pub const EXCEPTION: &str = "Exception";
pub const EXECUTION_EXISTS: &str = "ExecutionAlreadyExists";
pub const EXECUTION_STARTED: &str = "ExecutionStarted";
pub const JSON_PATH_ERROR: &str = "JsonPathError";
pub const RECORD_COUNT: &str = "RecordCount";
pub const FAILURE_COUNT: &str = "FailureCount";

/// CloudWatch limits a single metric to 100 values per document.
const MAX_VALUES_PER_DOCUMENT: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unit {
    Milliseconds,
    Count,
}

impl Unit {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Milliseconds => "Milliseconds",
            Self::Count => "Count",
        }
    }
}

/// Destination of the measurements taken while processing one batch.
///
/// Implementations must accept concurrent calls: records of one batch may be processed
/// concurrently and all of them report to the same sink.
#[async_trait]
pub trait MetricsSink: Send + Sync {
    fn put_metric(&self, name: &str, value: f64, unit: Unit);

    fn set_property(&self, key: &str, value: Value);

    /// Write out everything collected so far and start over.
    async fn flush(&self) -> Result<(), Error>;
}

#[derive(Debug)]
struct Metric {
    unit: Unit,
    values: Vec<f64>,
}

#[derive(Debug, Default)]
struct Entries {
    metrics: BTreeMap<String, Metric>,
    properties: Map<String, Value>,
}

/// [`MetricsSink`] writing CloudWatch embedded metric format documents.
pub struct MetricsLogger {
    namespace: String,
    dimensions: Vec<(String, String)>,
    entries: Mutex<Entries>,
    writer: Mutex<Box<dyn Write + Send>>,
}

impl MetricsLogger {
    /// Create a logger writing to stdout with the `Operation` dimension set.
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            dimensions: vec![("Operation".to_string(), OPERATION.to_string())],
            entries: Mutex::new(Entries::default()),
            writer: Mutex::new(Box::new(io::stdout())),
        }
    }

    /// Replace the destination of the documents.
    pub fn writer(self, writer: impl Write + Send + 'static) -> Self {
        Self {
            writer: Mutex::new(Box::new(writer)),
            ..self
        }
    }

    /// Add a dimension to every metric.
    pub fn dimension(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.dimensions.push((name.into(), value.into()));
        self
    }

    pub fn namespace(&self) -> &str {
        self.namespace.as_str()
    }

    /// Values recorded for a metric since the last flush.
    pub fn values(&self, name: &str) -> Vec<f64> {
        self.entries()
            .metrics
            .get(name)
            .map(|metric| metric.values.clone())
            .unwrap_or_default()
    }

    /// Sum of the values recorded for a metric since the last flush.
    pub fn sum(&self, name: &str) -> f64 {
        self.values(name).iter().sum()
    }

    pub fn property(&self, key: &str) -> Option<Value> {
        self.entries().properties.get(key).cloned()
    }

    fn entries(&self) -> MutexGuard<'_, Entries> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn documents(&self, entries: Entries) -> Vec<Value> {
        let Entries {
            metrics,
            properties,
        } = entries;

        let chunks = metrics
            .values()
            .map(|metric| metric.values.len())
            .max()
            .unwrap_or(0)
            .div_ceil(MAX_VALUES_PER_DOCUMENT);
        let timestamp = Utc::now().timestamp_millis();
        let dimension_names = self
            .dimensions
            .iter()
            .map(|(name, _)| name.as_str())
            .collect::<Vec<&str>>();

        (0..chunks)
            .map(|chunk| {
                let start = chunk * MAX_VALUES_PER_DOCUMENT;
                let mut document = properties.clone();
                let mut definitions: Vec<Value> = vec![];

                for (name, _) in self.dimensions.iter() {
                    document.remove(name);
                }
                for (name, value) in self.dimensions.iter() {
                    document.insert(name.clone(), json!(value));
                }

                for (name, metric) in metrics.iter() {
                    let values = metric
                        .values
                        .iter()
                        .skip(start)
                        .take(MAX_VALUES_PER_DOCUMENT)
                        .copied()
                        .collect::<Vec<f64>>();

                    let value = match values.as_slice() {
                        [] => continue,
                        [single] => json!(single),
                        _ => json!(values),
                    };

                    definitions.push(json!({ "Name": name, "Unit": metric.unit.as_str() }));
                    document.insert(name.clone(), value);
                }

                document.insert(
                    "_aws".to_string(),
                    json!({
                        "Timestamp": timestamp,
                        "CloudWatchMetrics": [{
                            "Namespace": self.namespace,
                            "Dimensions": [dimension_names],
                            "Metrics": definitions,
                        }],
                    }),
                );

                Value::Object(document)
            })
            .collect()
    }
}

#[async_trait]
impl MetricsSink for MetricsLogger {
    fn put_metric(&self, name: &str, value: f64, unit: Unit) {
        self.entries()
            .metrics
            .entry(name.to_string())
            .or_insert_with(|| Metric {
                unit,
                values: vec![],
            })
            .values
            .push(value);
    }

    fn set_property(&self, key: &str, value: Value) {
        self.entries().properties.insert(key.to_string(), value);
    }

    async fn flush(&self) -> Result<(), Error> {
        let entries = mem::take(&mut *self.entries());
        let documents = self.documents(entries);

        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        for document in documents {
            serde_json::to_writer(&mut *writer, &document)?;
            writer.write_all(b"\n")?;
        }
        writer.flush()?;

        Ok(())
    }
}

impl std::fmt::Debug for MetricsLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsLogger")
            .field("namespace", &self.namespace)
            .field("dimensions", &self.dimensions)
            .finish_non_exhaustive()
    }
}
