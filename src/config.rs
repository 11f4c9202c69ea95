use super::{
    error::Error,
    handler::{Condition, EventHandler},
    query::Query,
    types::EventName,
};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{collections::BTreeMap, env};
use tracing::{info, warn};

/// Environment variable holding the serialized [`EventStreamHandlerConfig`].
pub const EVENT_HANDLER_CONFIG: &str = "EVENT_HANDLER_CONFIG";

/// Serialized form of the handler configuration.
///
/// ```json
/// {
///   "eventHandlers": [{
///     "eventSourceArn": "arn:aws:dynamodb:...:table/Orders/stream/...",
///     "eventNames": ["MODIFY"],
///     "conditions": [{ "jsonPath": "$.newImage.status.S", "value": "DONE" }],
///     "stateMachineConfig": {
///       "stateMachineArn": "arn:aws:states:...:stateMachine:OrderDone",
///       "input": { "finalStatus": "$.newImage.status.S" }
///     }
///   }]
/// }
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventStreamHandlerConfig {
    pub event_handlers: Vec<EventHandlerConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventHandlerConfig {
    #[serde(default)]
    pub event_source_arn: Option<String>,
    #[serde(default)]
    pub event_names: Vec<EventName>,
    #[serde(default)]
    pub conditions: Vec<ConditionConfig>,
    pub state_machine_config: StateMachineConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConditionConfig {
    pub json_path: String,
    pub value: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateMachineConfig {
    pub state_machine_arn: String,
    #[serde(default)]
    pub input: Option<BTreeMap<String, String>>,
}

/// Validated handler configuration, read once at start-up.
#[derive(Debug, Clone, Default)]
pub struct TriggerConfig {
    handlers: Vec<EventHandler>,
}

impl TriggerConfig {
    pub fn new(handlers: Vec<EventHandler>) -> Self {
        Self { handlers }
    }

    /// Parse and validate the serialized configuration.
    pub fn from_json(json: &str) -> Result<Self, Error> {
        let config: EventStreamHandlerConfig = serde_json::from_str(json)
            .map_err(|err| Error::InvalidConfig(format!("unable to parse configuration: {err}")))?;
        Self::try_from(config)
    }

    /// Parse and validate the configuration found in [`EVENT_HANDLER_CONFIG`].
    pub fn from_env() -> Result<Self, Error> {
        info!("Parsing configuration from environment");
        let json = env::var(EVENT_HANDLER_CONFIG)
            .map_err(|err| Error::InvalidConfig(format!("{EVENT_HANDLER_CONFIG}: {err}")))?;
        Self::from_json(&json)
    }

    pub fn handlers(&self) -> &[EventHandler] {
        self.handlers.as_slice()
    }

    pub fn into_handlers(self) -> Vec<EventHandler> {
        self.handlers
    }
}

impl TryFrom<EventStreamHandlerConfig> for TriggerConfig {
    type Error = Error;

    fn try_from(config: EventStreamHandlerConfig) -> Result<Self, Self::Error> {
        let handlers = config
            .event_handlers
            .into_iter()
            .enumerate()
            .map(|(index, handler)| {
                EventHandler::try_from(handler).map_err(|err| match err {
                    Error::InvalidConfig(reason) => {
                        Error::InvalidConfig(format!("eventHandlers[{index}]: {reason}"))
                    }
                    other => other,
                })
            })
            .collect::<Result<Vec<EventHandler>, Error>>()?;

        Ok(Self { handlers })
    }
}

impl TryFrom<EventHandlerConfig> for EventHandler {
    type Error = Error;

    fn try_from(config: EventHandlerConfig) -> Result<Self, Self::Error> {
        let EventHandlerConfig {
            event_source_arn,
            event_names,
            conditions,
            state_machine_config,
        } = config;

        if state_machine_config.state_machine_arn.trim().is_empty() {
            return Err(Error::InvalidConfig("stateMachineArn is required".into()));
        }

        let conditions = conditions
            .into_iter()
            .map(|condition| {
                if condition.json_path.trim().is_empty() {
                    return Err(Error::InvalidConfig(
                        "condition jsonPath must not be empty".into(),
                    ));
                }
                Ok(Condition::new(checked_query(condition.json_path), condition.value))
            })
            .collect::<Result<Vec<Condition>, Error>>()?;

        let input_mapping = state_machine_config
            .input
            .unwrap_or_default()
            .into_iter()
            .map(|(field, path)| {
                if field.is_empty() || path.trim().is_empty() {
                    return Err(Error::InvalidConfig(format!(
                        "input mapping `{field}` needs a field name and a jsonPath"
                    )));
                }
                Ok((field, checked_query(path)))
            })
            .collect::<Result<Vec<(String, Query)>, Error>>()?;

        let mut handler = EventHandler::new(state_machine_config.state_machine_arn)
            .set_event_names(event_names)
            .set_conditions(conditions)
            .set_input_mapping(input_mapping);

        if let Some(arn) = event_source_arn {
            handler = handler.set_event_source_arn(arn);
        }

        Ok(handler)
    }
}

fn checked_query(path: String) -> Query {
    let query = Query::new(path);
    if !query.is_valid() {
        warn!("JsonPath {query} does not parse, it will never match");
    }
    query
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn it_parses_the_handler_configuration() {
        let config = TriggerConfig::from_json(
            &json!({
                "eventHandlers": [{
                    "eventSourceArn": "arn:stream",
                    "eventNames": ["INSERT", "MODIFY"],
                    "conditions": [{ "jsonPath": "$.newImage.status.S", "value": "DONE" }],
                    "stateMachineConfig": {
                        "stateMachineArn": "arn:sm",
                        "input": { "finalStatus": "$.newImage.status.S" }
                    }
                }, {
                    "stateMachineConfig": { "stateMachineArn": "arn:other" }
                }]
            })
            .to_string(),
        )
        .unwrap();

        let handlers = config.handlers();
        assert_eq!(handlers.len(), 2);
        assert_eq!(handlers[0].target_id(), "arn:sm");
        assert_eq!(handlers[0].event_source_arn(), Some("arn:stream"));
        assert_eq!(handlers[0].event_names(), [EventName::Insert, EventName::Modify]);
        assert_eq!(handlers[0].conditions().len(), 1);
        assert_eq!(handlers[0].input_mapping().len(), 1);
        assert!(handlers[1].event_names().is_empty());
        assert!(handlers[1].conditions().is_empty());
        assert!(handlers[1].input_mapping().is_empty());
    }

    #[test]
    fn it_rejects_invalid_json() {
        assert!(matches!(
            TriggerConfig::from_json("{ eventHandlers"),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn it_rejects_unknown_event_names() {
        let json = json!({
            "eventHandlers": [{
                "eventNames": ["UPSERT"],
                "stateMachineConfig": { "stateMachineArn": "arn:sm" }
            }]
        });
        assert!(TriggerConfig::from_json(&json.to_string()).is_err());
    }

    #[test]
    fn it_rejects_handlers_without_a_state_machine() {
        let json = json!({
            "eventHandlers": [{ "stateMachineConfig": { "stateMachineArn": "  " } }]
        });
        let err = TriggerConfig::from_json(&json.to_string()).unwrap_err();
        assert!(err.to_string().contains("eventHandlers[0]"));
    }

    #[test]
    fn it_rejects_conditions_without_a_path() {
        let json = json!({
            "eventHandlers": [{
                "conditions": [{ "jsonPath": "", "value": "DONE" }],
                "stateMachineConfig": { "stateMachineArn": "arn:sm" }
            }]
        });
        assert!(TriggerConfig::from_json(&json.to_string()).is_err());
    }

    #[test]
    fn it_keeps_unparsable_paths_as_invalid_queries() {
        let json = json!({
            "eventHandlers": [{
                "conditions": [{ "jsonPath": "$.newImage[", "value": "DONE" }],
                "stateMachineConfig": { "stateMachineArn": "arn:sm" }
            }]
        });
        let config = TriggerConfig::from_json(&json.to_string()).unwrap();
        assert!(!config.handlers()[0].conditions()[0].query().is_valid());
    }
}
