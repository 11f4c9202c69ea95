use super::{
    metrics::{MetricsSink, Unit, JSON_PATH_ERROR},
    query::Query,
    types::ChangeRecord,
};

use serde_json::{Map, Value};
use tracing::{debug, error, warn};

/// Build a workflow input from the record.
///
/// Every mapped field is present in the output. A field whose query selects nothing, or
/// fails, is set to `null`; a failing query is also counted as a [`JSON_PATH_ERROR`].
pub fn project(
    record: &ChangeRecord,
    input_mapping: &[(String, Query)],
    metrics: &dyn MetricsSink,
) -> Map<String, Value> {
    let mut input = Map::new();

    if input_mapping.is_empty() {
        return input;
    }

    let document = match record.change().map(|change| change.document()) {
        Some(Ok(document)) => document,
        Some(Err(err)) => {
            error!("Unable to render record {} for json queries: {err}", record.id());
            metrics.put_metric(JSON_PATH_ERROR, 1.0, Unit::Count);
            Value::Null
        }
        None => Value::Null,
    };

    for (field, query) in input_mapping {
        let value = match query.first(&document) {
            Ok(Some(value)) => value.clone(),
            Ok(None) => {
                warn!("No matches found for JsonPath {query} for key {field}");
                Value::Null
            }
            Err(err) => {
                error!("Error evaluating JsonPath for key {field}: {err}");
                metrics.put_metric(JSON_PATH_ERROR, 1.0, Unit::Count);
                Value::Null
            }
        };

        input.insert(field.clone(), value);
    }

    let rendered = Value::Object(input.clone());
    debug!("Built execution input: {rendered}");
    input
}
