use aws_config::BehaviorVersion;
use dynamo_workflow_trigger::{self as trigger, metrics::MetricsLogger, types::DynamodbEvent};
use std::{env, io, process};
use tracing::error;
use tracing_subscriber::EnvFilter;

// Reads a DynamoDB Streams event in the Lambda format from stdin, starts the configured
// state machines and prints the partial batch response.
//
//   EVENT_HANDLER_CONFIG='{"eventHandlers": [...]}' cargo run < event.json

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    if let Err(err) = run().await {
        error!("Unable to process the event: {err}");
        process::exit(1);
    }
}

async fn run() -> Result<(), trigger::Error> {
    let config = trigger::TriggerConfig::from_env()?;
    let sdk_config = aws_config::load_defaults(BehaviorVersion::latest()).await;

    let processor = trigger::processor::builder()
        .config(config)
        .client(trigger::Client::new(&sdk_config))
        .build();

    let event: DynamodbEvent = serde_json::from_reader(io::stdin())?;
    let namespace = env::var("AWS_LAMBDA_FUNCTION_NAME").unwrap_or_default();
    let metrics = MetricsLogger::new(namespace).writer(io::stderr());

    let response = processor.handle_event(event, &metrics).await;
    println!("{}", serde_json::to_string(&response)?);

    Ok(())
}
