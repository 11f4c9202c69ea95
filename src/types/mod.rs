mod event;
mod outputs;
mod record;

pub use event::{BatchItemFailure, BatchResponse, DynamodbEvent, DynamodbEventRecord, DynamodbStreamRecord};
pub use outputs::DispatchOutcome;
pub use record::{to_image, Change, ChangeRecord, EventName, Image, RawRecord};
