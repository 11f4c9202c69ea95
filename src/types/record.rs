use super::super::error::Error;

use aws_sdk_dynamodbstreams::types::{AttributeValue, OperationType, Record};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::{collections::HashMap, fmt, str::FromStr};

/// DynamoDB item rendered as DynamoDB JSON, e.g. `{"status": {"S": "DONE"}}`.
pub type Image = Map<String, Value>;

/// The kind of mutation a [`ChangeRecord`] describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EventName {
    /// A new item was inserted into the table.
    Insert,
    /// An existing item was modified.
    Modify,
    /// An item was removed from the table.
    Remove,
}

impl EventName {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Insert => "INSERT",
            Self::Modify => "MODIFY",
            Self::Remove => "REMOVE",
        }
    }
}

impl fmt::Display for EventName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "INSERT" => Ok(Self::Insert),
            "MODIFY" => Ok(Self::Modify),
            "REMOVE" => Ok(Self::Remove),
            other => Err(Error::InvalidRecord(format!("unknown event name: {other}"))),
        }
    }
}

impl TryFrom<&OperationType> for EventName {
    type Error = Error;

    fn try_from(operation: &OperationType) -> Result<Self, Self::Error> {
        match operation {
            OperationType::Insert => Ok(Self::Insert),
            OperationType::Modify => Ok(Self::Modify),
            OperationType::Remove => Ok(Self::Remove),
            other => Err(Error::InvalidRecord(format!(
                "unknown event name: {}",
                other.as_str()
            ))),
        }
    }
}

/// Item images carried by a [`ChangeRecord`].
///
/// This is the document every JSON path query runs against. It serializes as
/// `{"keys": .., "newImage": .., "oldImage": ..}` with absent images omitted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Change {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keys: Option<Image>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_image: Option<Image>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_image: Option<Image>,
}

impl Change {
    /// Render the change as the JSON document queried by conditions and input mappings.
    pub fn document(&self) -> Result<Value, Error> {
        serde_json::to_value(self).map_err(Error::from)
    }
}

/// One mutation notification from a DynamoDB stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeRecord {
    id: String,
    event_name: EventName,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    event_source_arn: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    sequence_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    change: Option<Change>,
}

impl ChangeRecord {
    pub fn new(id: impl Into<String>, event_name: EventName) -> Self {
        Self {
            id: id.into(),
            event_name,
            event_source_arn: None,
            sequence_number: None,
            change: None,
        }
    }

    pub fn set_event_source_arn(self, event_source_arn: impl Into<String>) -> Self {
        Self {
            event_source_arn: Some(event_source_arn.into()),
            ..self
        }
    }

    pub fn set_sequence_number(self, sequence_number: impl Into<String>) -> Self {
        Self {
            sequence_number: Some(sequence_number.into()),
            ..self
        }
    }

    pub fn set_change(self, change: Change) -> Self {
        Self {
            change: Some(change),
            ..self
        }
    }

    pub fn id(&self) -> &str {
        self.id.as_str()
    }

    pub fn event_name(&self) -> EventName {
        self.event_name
    }

    pub fn event_source_arn(&self) -> Option<&str> {
        self.event_source_arn.as_deref()
    }

    pub fn sequence_number(&self) -> Option<&str> {
        self.sequence_number.as_deref()
    }

    pub fn change(&self) -> Option<&Change> {
        self.change.as_ref()
    }

    /// Identifier reported back in a partial batch failure.
    ///
    /// DynamoDB event source mappings checkpoint by sequence number, so it is
    /// preferred over the event id when the record carries one.
    pub fn item_identifier(&self) -> &str {
        self.sequence_number().unwrap_or_else(|| self.id())
    }

    /// Return an error if the images contradict the event name.
    pub fn validate(&self) -> Result<(), Error> {
        let change = match self.change.as_ref() {
            Some(change) => change,
            None => return Ok(()),
        };

        match self.event_name {
            EventName::Remove if change.new_image.is_some() => Err(Error::InvalidRecord(format!(
                "REMOVE record {} carries a new image",
                self.id
            ))),
            EventName::Insert if change.old_image.is_some() => Err(Error::InvalidRecord(format!(
                "INSERT record {} carries an old image",
                self.id
            ))),
            _ => Ok(()),
        }
    }
}

impl TryFrom<Record> for ChangeRecord {
    type Error = Error;

    fn try_from(record: Record) -> Result<Self, Self::Error> {
        let Record {
            event_id,
            event_name,
            dynamodb,
            ..
        } = record;

        let id = event_id.ok_or_else(|| Error::InvalidRecord("missing eventID".into()))?;
        let event_name = event_name
            .as_ref()
            .ok_or_else(|| Error::InvalidRecord(format!("missing eventName in record {id}")))
            .and_then(EventName::try_from)?;

        let mut change_record = Self::new(id, event_name);

        if let Some(stream_record) = dynamodb {
            if let Some(sequence_number) = stream_record.sequence_number {
                change_record = change_record.set_sequence_number(sequence_number);
            }

            change_record = change_record.set_change(Change {
                keys: stream_record.keys.map(to_image),
                new_image: stream_record.new_image.map(to_image),
                old_image: stream_record.old_image.map(to_image),
            });
        }

        change_record.validate()?;
        Ok(change_record)
    }
}

/// A record as delivered by a stream source, before validation.
pub trait RawRecord: TryInto<ChangeRecord, Error = Error> {
    /// Identifier to report if the record cannot be converted.
    fn item_identifier(&self) -> Option<String>;
}

impl RawRecord for Record {
    fn item_identifier(&self) -> Option<String> {
        self.dynamodb()
            .and_then(|stream_record| stream_record.sequence_number())
            .or_else(|| self.event_id())
            .map(str::to_string)
    }
}

/// Render SDK attribute values as DynamoDB JSON.
pub fn to_image(attributes: HashMap<String, AttributeValue>) -> Image {
    attributes
        .into_iter()
        .map(|(name, value)| (name, to_json(value)))
        .collect()
}

fn to_json(value: AttributeValue) -> Value {
    match value {
        AttributeValue::S(s) => json!({ "S": s }),
        AttributeValue::N(n) => json!({ "N": n }),
        AttributeValue::B(b) => json!({ "B": aws_smithy_types::base64::encode(b.as_ref()) }),
        AttributeValue::Bool(b) => json!({ "BOOL": b }),
        AttributeValue::Null(n) => json!({ "NULL": n }),
        AttributeValue::Ss(ss) => json!({ "SS": ss }),
        AttributeValue::Ns(ns) => json!({ "NS": ns }),
        AttributeValue::Bs(bs) => json!({
            "BS": bs
                .iter()
                .map(|b| aws_smithy_types::base64::encode(b.as_ref()))
                .collect::<Vec<String>>()
        }),
        AttributeValue::L(list) => json!({
            "L": list.into_iter().map(to_json).collect::<Vec<Value>>()
        }),
        AttributeValue::M(map) => json!({ "M": to_image(map) }),
        _ => Value::Null,
    }
}
