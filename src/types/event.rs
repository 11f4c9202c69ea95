use super::{
    super::error::Error,
    record::{Change, ChangeRecord, EventName, Image, RawRecord},
};

use serde::{Deserialize, Serialize};

/// A batch of DynamoDB Streams records as delivered to a Lambda function.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DynamodbEvent {
    #[serde(rename = "Records", default)]
    pub records: Vec<DynamodbEventRecord>,
}

impl DynamodbEvent {
    /// Convert every record, failing on the first malformed one.
    pub fn into_change_records(self) -> Result<Vec<ChangeRecord>, Error> {
        self.records.into_iter().map(ChangeRecord::try_from).collect()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DynamodbEventRecord {
    #[serde(rename = "eventID")]
    pub event_id: Option<String>,
    #[serde(rename = "eventName")]
    pub event_name: Option<String>,
    #[serde(rename = "eventSourceARN")]
    pub event_source_arn: Option<String>,
    pub dynamodb: Option<DynamodbStreamRecord>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DynamodbStreamRecord {
    pub keys: Option<Image>,
    pub new_image: Option<Image>,
    pub old_image: Option<Image>,
    pub sequence_number: Option<String>,
}

impl TryFrom<DynamodbEventRecord> for ChangeRecord {
    type Error = Error;

    fn try_from(record: DynamodbEventRecord) -> Result<Self, Self::Error> {
        let id = record
            .event_id
            .ok_or_else(|| Error::InvalidRecord("missing eventID".into()))?;
        let event_name = record
            .event_name
            .ok_or_else(|| Error::InvalidRecord(format!("missing eventName in record {id}")))?
            .parse::<EventName>()?;

        let mut change_record = ChangeRecord::new(id, event_name);

        if let Some(arn) = record.event_source_arn {
            change_record = change_record.set_event_source_arn(arn);
        }

        if let Some(stream_record) = record.dynamodb {
            if let Some(sequence_number) = stream_record.sequence_number {
                change_record = change_record.set_sequence_number(sequence_number);
            }

            change_record = change_record.set_change(Change {
                keys: stream_record.keys,
                new_image: stream_record.new_image,
                old_image: stream_record.old_image,
            });
        }

        change_record.validate()?;
        Ok(change_record)
    }
}

impl RawRecord for DynamodbEventRecord {
    fn item_identifier(&self) -> Option<String> {
        self.dynamodb
            .as_ref()
            .and_then(|stream_record| stream_record.sequence_number.clone())
            .or_else(|| self.event_id.clone())
    }
}

/// Partial batch response understood by the Lambda event source mapping.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchResponse {
    pub batch_item_failures: Vec<BatchItemFailure>,
}

impl BatchResponse {
    pub fn is_success(&self) -> bool {
        self.batch_item_failures.is_empty()
    }

    /// Identifiers of the failed records, in delivery order.
    pub fn failed_identifiers(&self) -> Vec<&str> {
        self.batch_item_failures
            .iter()
            .map(|failure| failure.item_identifier.as_str())
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchItemFailure {
    pub item_identifier: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn it_parses_lambda_dynamodb_events() {
        let event: DynamodbEvent = serde_json::from_value(json!({
            "Records": [{
                "eventID": "c4ca4238a0b923820dcc509a6f75849b",
                "eventName": "MODIFY",
                "eventSource": "aws:dynamodb",
                "eventSourceARN": "arn:aws:dynamodb:us-east-1:123456789012:table/Orders/stream/2024",
                "dynamodb": {
                    "Keys": { "Id": { "N": "101" } },
                    "NewImage": { "status": { "S": "DONE" } },
                    "OldImage": { "status": { "S": "PENDING" } },
                    "SequenceNumber": "111",
                    "SizeBytes": 26,
                    "StreamViewType": "NEW_AND_OLD_IMAGES"
                }
            }]
        }))
        .unwrap();

        let records = event.into_change_records().unwrap();
        assert_eq!(records.len(), 1);

        let record = &records[0];
        assert_eq!(record.id(), "c4ca4238a0b923820dcc509a6f75849b");
        assert_eq!(record.event_name(), EventName::Modify);
        assert_eq!(record.item_identifier(), "111");
        assert_eq!(
            record.event_source_arn(),
            Some("arn:aws:dynamodb:us-east-1:123456789012:table/Orders/stream/2024")
        );

        let document = record.change().unwrap().document().unwrap();
        assert_eq!(document["newImage"]["status"]["S"], json!("DONE"));
        assert_eq!(document["keys"]["Id"]["N"], json!("101"));
    }

    #[test]
    fn unknown_event_names_only_reject_their_record() {
        let event: DynamodbEvent = serde_json::from_value(json!({
            "Records": [
                { "eventID": "e1", "eventName": "MODIFY" },
                { "eventID": "e2", "eventName": "UPSERT" }
            ]
        }))
        .unwrap();
        assert_eq!(event.records.len(), 2);

        let mut records = event.records.into_iter();
        assert!(ChangeRecord::try_from(records.next().unwrap()).is_ok());

        let rejected = records.next().unwrap();
        assert_eq!(rejected.item_identifier().as_deref(), Some("e2"));
        assert!(matches!(
            ChangeRecord::try_from(rejected),
            Err(Error::InvalidRecord(_))
        ));
    }

    #[test]
    fn batch_response_serializes_as_partial_failure_document() {
        let response = BatchResponse {
            batch_item_failures: vec![BatchItemFailure {
                item_identifier: "222".into(),
            }],
        };

        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            json!({ "batchItemFailures": [{ "itemIdentifier": "222" }] })
        );
        assert!(!response.is_success());
        assert_eq!(response.failed_identifiers(), ["222"]);
    }
}
