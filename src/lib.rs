//! Start [AWS Step Functions](https://docs.aws.amazon.com/step-functions/latest/dg/welcome.html)
//! workflows in response to changes in a DynamoDB table, read from
//! [Amazon DynamoDB Streams](https://docs.aws.amazon.com/amazondynamodb/latest/developerguide/streamsmain.html).
//!
//! ## Getting Started
//!
//! Each event handler describes a kind of change to react to and the state machine to start
//! when that change happens. Conditions are JSON path queries evaluated over the change of a
//! record, rendered as `{"keys": .., "newImage": .., "oldImage": ..}` in DynamoDB JSON.
//!
//! ```rust,no_run
//! use aws_config::BehaviorVersion;
//! use dynamo_workflow_trigger::{self as trigger, metrics::MetricsLogger, types::DynamodbEvent};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), trigger::Error> {
//!     let config = trigger::TriggerConfig::from_json(r#"{
//!         "eventHandlers": [{
//!             "eventNames": ["MODIFY"],
//!             "conditions": [{ "jsonPath": "$.newImage.status.S", "value": "DONE" }],
//!             "stateMachineConfig": {
//!                 "stateMachineArn": "arn:aws:states:us-east-1:123456789012:stateMachine:OrderDone",
//!                 "input": { "finalStatus": "$.newImage.status.S" }
//!             }
//!         }]
//!     }"#)?;
//!
//!     let sdk_config = aws_config::load_defaults(BehaviorVersion::latest()).await;
//!     let processor = trigger::processor::builder()
//!         .config(config)
//!         .client(trigger::Client::new(&sdk_config))
//!         .build();
//!
//!     let event: DynamodbEvent = serde_json::from_reader(std::io::stdin())?;
//!     let response = processor
//!         .handle_event(event, &MetricsLogger::new("workflow-trigger"))
//!         .await;
//!
//!     println!("{}", serde_json::to_string(&response)?);
//!     Ok(())
//! }
//! ```
//!
//! ## Idempotency
//!
//! The execution name is derived from the record's event id and the target state machine.
//! A redelivered record therefore hits "execution already exists", which counts as success.

/// Client for starting workflow executions.
pub mod client;

/// Handler configuration.
pub mod config;

/// Execution names and the start-execution call.
pub mod dispatcher;

/// Common errors.
pub mod error;

/// Event handlers and record matching.
pub mod handler;

/// Metrics in CloudWatch embedded metric format.
pub mod metrics;

/// Batch processing.
pub mod processor;

/// Workflow input projection.
pub mod projector;

/// JSON path queries over record documents.
pub mod query;

/// Background processing of record streams.
pub mod stream;

/// Data structures used by operations.
pub mod types;

pub use client::{Client, WorkflowClient};
pub use config::TriggerConfig;
pub use error::Error;
pub use processor::BatchProcessor;
