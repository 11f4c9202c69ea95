//! # TriggerStream
//!
//! [`TriggerStream`](crate::stream::TriggerStream) feeds batches of DynamoDB Streams records
//! from any [tokio stream](https://docs.rs/tokio-stream/0.1.14/tokio_stream/index.html) into
//! a [`BatchProcessor`](crate::processor::BatchProcessor) in the background, and emits one
//! [`BatchResponse`](crate::types::BatchResponse) per batch.
//!
//! A stream of `Vec<Record>`, like the one a DynamoDB Streams poller emits, can be used
//! as the source.
//!
//! ```rust,no_run
//! # use aws_config::BehaviorVersion;
//! # use aws_sdk_dynamodbstreams::types::Record;
//! use dynamo_workflow_trigger::{self as trigger, metrics::MetricsLogger};
//! use tokio_stream::StreamExt;
//!
//! # async fn wrapper(source: impl tokio_stream::Stream<Item = Vec<Record>> + Send + Unpin + 'static) {
//! # let config = aws_config::load_defaults(BehaviorVersion::latest()).await;
//! let processor = trigger::processor::builder()
//!     .config(trigger::TriggerConfig::from_env().unwrap())
//!     .client(trigger::Client::new(&config))
//!     .build();
//!
//! let mut responses = trigger::stream::builder()
//!     .processor(processor)
//!     .metrics(|| MetricsLogger::new("workflow-trigger"))
//!     .build(source);
//!
//! while let Some(response) = responses.next().await {
//!     for failure in response.batch_item_failures {
//!         println!("failed: {}", failure.item_identifier);
//!     }
//! }
//! # }
//! ```
//!
//! ## Stop processing
//!
//! Dropping the stream, or calling [`TriggerStream::close`], stops processing before the
//! next batch is taken from the source.

mod trigger;

use super::{client, metrics, processor, types};

pub use trigger::{TriggerStream, TriggerStreamBuilder};

/// Create [`TriggerStreamBuilder`].
pub fn builder<C, M>() -> TriggerStreamBuilder<C, M>
where
    C: client::WorkflowClient + 'static,
    M: metrics::MetricsSink + 'static,
{
    TriggerStreamBuilder::new()
}
