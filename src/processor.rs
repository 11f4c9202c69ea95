//! # BatchProcessor
//!
//! [`BatchProcessor`] routes every record of a batch to the handlers it matches and starts
//! their workflows. It never fails as a whole: the records that could not be dispatched
//! are returned in a [`BatchResponse`] so that only those are delivered again.
//!
//! ```rust,no_run
//! # use aws_config::BehaviorVersion;
//! use dynamo_workflow_trigger::{self as trigger, metrics::MetricsLogger, types::DynamodbEvent};
//!
//! # async fn wrapper(event: DynamodbEvent) -> Result<(), trigger::Error> {
//! # let config = aws_config::load_defaults(BehaviorVersion::latest()).await;
//! let processor = trigger::processor::builder()
//!     .config(trigger::TriggerConfig::from_env()?)
//!     .client(trigger::Client::new(&config))
//!     .build();
//!
//! let metrics = MetricsLogger::new("workflow-trigger");
//! let response = processor.handle_event(event, &metrics).await;
//! println!("{}", serde_json::to_string(&response)?);
//! # Ok(())
//! # }
//! ```

use super::{
    client::WorkflowClient,
    config::TriggerConfig,
    dispatcher::{execution_name, Dispatcher},
    handler::EventHandler,
    metrics::{
        MetricsSink, Unit, BATCH_TIME, EXCEPTION, EXECUTION_EXISTS, EXECUTION_STARTED,
        FAILURE_COUNT, JSON_PATH_ERROR, RECORD_COUNT, SUCCESS_LATENCY, TIME,
    },
    projector::project,
    types::{BatchItemFailure, BatchResponse, ChangeRecord, DynamodbEvent, RawRecord},
};

use chrono::Utc;
use futures::stream::{self, StreamExt};
use serde_json::json;
use std::{sync::Arc, time::Instant};
use tracing::{debug, error, info};

/// Create [`BatchProcessorBuilder`].
pub fn builder<C: WorkflowClient>() -> BatchProcessorBuilder<C> {
    BatchProcessorBuilder::new()
}

#[derive(Debug, Clone)]
pub struct BatchProcessor<Client>
where
    Client: WorkflowClient,
{
    handlers: Arc<[EventHandler]>,
    dispatcher: Dispatcher<Client>,
    concurrency: usize,
}

impl<Client> BatchProcessor<Client>
where
    Client: WorkflowClient,
{
    pub fn handlers(&self) -> &[EventHandler] {
        &self.handlers
    }

    /// Process a batch and return the records that must be delivered again.
    ///
    /// Records without any matching handler succeed without doing anything. The metrics
    /// sink is flushed before returning.
    pub async fn handle_batch(
        &self,
        records: Vec<ChangeRecord>,
        metrics: &dyn MetricsSink,
    ) -> BatchResponse {
        let started_at = Utc::now();
        let timer = Instant::now();
        info!("Received {} DynamoDB records", records.len());

        metrics.put_metric(JSON_PATH_ERROR, 0.0, Unit::Count);
        metrics.put_metric(EXECUTION_EXISTS, 0.0, Unit::Count);
        metrics.put_metric(EXECUTION_STARTED, 0.0, Unit::Count);

        let pending = records
            .iter()
            .map(|record| self.handle_record(record, metrics))
            .collect::<Vec<_>>();
        let outcomes = stream::iter(pending)
            .buffered(self.concurrency)
            .collect::<Vec<bool>>()
            .await;

        let batch_item_failures = records
            .iter()
            .zip(outcomes)
            .filter(|(_, success)| !success)
            .map(|(record, _)| BatchItemFailure {
                item_identifier: record.item_identifier().to_string(),
            })
            .collect::<Vec<BatchItemFailure>>();

        metrics.put_metric(RECORD_COUNT, records.len() as f64, Unit::Count);
        metrics.put_metric(FAILURE_COUNT, batch_item_failures.len() as f64, Unit::Count);
        metrics.put_metric(BATCH_TIME, elapsed_millis(timer), Unit::Milliseconds);
        metrics.set_property("StartTime", json!(started_at.to_rfc3339()));
        metrics.set_property("EndTime", json!(Utc::now().to_rfc3339()));

        if let Err(err) = metrics.flush().await {
            error!("Unexpected error during flushing metrics: {err}");
        }

        if !batch_item_failures.is_empty() {
            info!(
                "{} of {} records failed and will be retried",
                batch_item_failures.len(),
                records.len()
            );
        }

        BatchResponse {
            batch_item_failures,
        }
    }

    /// Process a Lambda DynamoDB event.
    pub async fn handle_event(
        &self,
        event: DynamodbEvent,
        metrics: &dyn MetricsSink,
    ) -> BatchResponse {
        self.handle_raw_batch(event.records, metrics).await
    }

    /// Convert and process records straight from a stream source.
    ///
    /// Records that cannot be converted are reported as failures when they carry an
    /// identifier, and dropped with an error log otherwise.
    pub async fn handle_raw_batch<R>(&self, records: Vec<R>, metrics: &dyn MetricsSink) -> BatchResponse
    where
        R: RawRecord,
    {
        let mut rejected: Vec<BatchItemFailure> = vec![];
        let mut accepted: Vec<ChangeRecord> = vec![];

        for record in records {
            let item_identifier = record.item_identifier();

            match TryInto::<ChangeRecord>::try_into(record) {
                Ok(record) => accepted.push(record),
                Err(err) => match item_identifier {
                    Some(item_identifier) => {
                        error!("Rejecting record {item_identifier}: {err}");
                        rejected.push(BatchItemFailure { item_identifier });
                    }
                    None => error!("Dropping record without identifier: {err}"),
                },
            }
        }

        let mut response = self.handle_batch(accepted, metrics).await;
        response.batch_item_failures.append(&mut rejected);
        response
    }

    /// Run every matching handler for the record. Return false if any dispatch failed.
    async fn handle_record(&self, record: &ChangeRecord, metrics: &dyn MetricsSink) -> bool {
        let timer = Instant::now();
        let mut success = true;
        debug!("Processing DynamoDB record: {}", record.id());

        for handler in self.handlers.iter() {
            if !handler.matches(record, metrics) {
                debug!(
                    "Record {} does not match handler for {}",
                    record.id(),
                    handler.target_id()
                );
                continue;
            }

            let input = project(record, handler.input_mapping(), metrics);
            let name = execution_name(record.id(), handler.target_id());
            let outcome = self
                .dispatcher
                .dispatch(handler.target_id(), &name, &input, metrics)
                .await;

            success &= outcome.is_success();
        }

        let elapsed = elapsed_millis(timer);
        metrics.put_metric(TIME, elapsed, Unit::Milliseconds);
        if success {
            metrics.put_metric(SUCCESS_LATENCY, elapsed, Unit::Milliseconds);
        }
        metrics.put_metric(EXCEPTION, if success { 0.0 } else { 1.0 }, Unit::Count);

        success
    }
}

fn elapsed_millis(timer: Instant) -> f64 {
    timer.elapsed().as_secs_f64() * 1000.0
}

/// A builder for [`BatchProcessor`].
#[derive(Debug)]
pub struct BatchProcessorBuilder<Client>
where
    Client: WorkflowClient,
{
    config: Option<TriggerConfig>,
    client: Option<Client>,
    concurrency: usize,
}

impl<Client> BatchProcessorBuilder<Client>
where
    Client: WorkflowClient,
{
    /// Create a new `BatchProcessorBuilder`.
    pub fn new() -> Self {
        Self {
            config: None,
            client: None,
            concurrency: 1,
        }
    }

    /// Set the validated handler configuration.
    ///
    /// **Setting any config is required** before the build method is called.
    pub fn config(self, config: TriggerConfig) -> Self {
        Self {
            config: Some(config),
            ..self
        }
    }

    /// Set client to start workflow executions.
    ///
    /// **Setting any client is required** before the build method is called.
    pub fn client(self, client: Client) -> Self {
        Self {
            client: Some(client),
            ..self
        }
    }

    /// Set how many records of one batch may be processed at the same time.
    ///
    /// Failures are still reported in delivery order. This method will panic when given
    /// zero. If you omit calling this method, records are processed one by one.
    pub fn concurrency(self, concurrency: usize) -> Self {
        if concurrency == 0 {
            panic!("concurrency must be positive.");
        }

        Self {
            concurrency,
            ..self
        }
    }

    /// Consumes the builder and constructs a [`BatchProcessor`].
    ///
    /// This method will panic if no config is set or no client is set.
    pub fn build(self) -> BatchProcessor<Client> {
        let config = self.config.expect("`config` is required");
        let client = self.client.expect("`client` is required");

        BatchProcessor {
            handlers: config.into_handlers().into(),
            dispatcher: Dispatcher::new(client),
            concurrency: self.concurrency,
        }
    }
}

impl<Client> Default for BatchProcessorBuilder<Client>
where
    Client: WorkflowClient,
{
    fn default() -> Self {
        Self::new()
    }
}
