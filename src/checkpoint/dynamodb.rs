//! DynamoDB checkpoint table for the batched checkpoint.
//!
//! Items are keyed by `namespace` (partition key) and `shard_id` (sort key)
//! with a `sequence_number` string attribute. Reads are strongly consistent.
//! Provisioned-throughput and request-rate rejections surface as
//! [`CheckpointError::Throttled`] so the batched store retries them.
//! Requires the `checkpoint-dynamodb` feature flag.

use std::collections::HashMap;

use async_trait::async_trait;
use aws_sdk_dynamodb::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_dynamodb::types::AttributeValue;
use aws_sdk_dynamodb::Client;
use tracing::debug;

use super::errors::{CheckpointError, CheckpointResult};
use super::table::{CheckpointItem, CheckpointTable};

const NAMESPACE_ATTR: &str = "namespace";
const SHARD_ID_ATTR: &str = "shard_id";
const SEQUENCE_NUMBER_ATTR: &str = "sequence_number";

/// Error codes DynamoDB returns when a request exceeds the table's capacity
const THROTTLING_CODES: &[&str] = &[
    "ProvisionedThroughputExceededException",
    "ThrottlingException",
    "RequestLimitExceeded",
];

#[derive(Debug, Clone)]
pub struct DynamoDbCheckpointTable {
    client: Client,
    table_name: String,
}

impl DynamoDbCheckpointTable {
    pub fn new(client: Client, table_name: impl Into<String>) -> Self {
        Self {
            client,
            table_name: table_name.into(),
        }
    }

    /// Build a client from the default AWS credential and region chain
    pub async fn from_env(table_name: impl Into<String>) -> Self {
        let config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        Self::new(Client::new(&config), table_name)
    }
}

#[async_trait]
impl CheckpointTable for DynamoDbCheckpointTable {
    async fn get_item(
        &self,
        namespace: &str,
        shard_id: &str,
    ) -> CheckpointResult<Option<CheckpointItem>> {
        let output = self
            .client
            .get_item()
            .table_name(&self.table_name)
            .consistent_read(true)
            .key(NAMESPACE_ATTR, AttributeValue::S(namespace.to_string()))
            .key(SHARD_ID_ATTR, AttributeValue::S(shard_id.to_string()))
            .send()
            .await
            .map_err(|e| from_sdk_error("get_item", e))?;

        Ok(output.item().and_then(item_from_attributes))
    }

    async fn put_item(&self, item: &CheckpointItem) -> CheckpointResult<()> {
        self.client
            .put_item()
            .table_name(&self.table_name)
            .item(NAMESPACE_ATTR, AttributeValue::S(item.namespace.clone()))
            .item(SHARD_ID_ATTR, AttributeValue::S(item.shard_id.clone()))
            .item(
                SEQUENCE_NUMBER_ATTR,
                AttributeValue::S(item.sequence_number.clone()),
            )
            .send()
            .await
            .map_err(|e| from_sdk_error("put_item", e))?;
        Ok(())
    }

    async fn describe(&self) -> CheckpointResult<()> {
        self.client
            .describe_table()
            .table_name(&self.table_name)
            .send()
            .await
            .map_err(|e| from_sdk_error("describe_table", e))?;
        debug!(table = %self.table_name, "DynamoDB checkpoint table verified");
        Ok(())
    }

    fn table_name(&self) -> &str {
        &self.table_name
    }
}

fn from_sdk_error<E, R>(operation: &str, err: SdkError<E, R>) -> CheckpointError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
    R: std::fmt::Debug,
{
    let code = err.code().map(str::to_string);
    classify(operation, code.as_deref(), DisplayErrorContext(&err).to_string())
}

/// Map DynamoDB error codes onto the throttling signal
fn classify(operation: &str, code: Option<&str>, message: String) -> CheckpointError {
    match code {
        Some(code) if THROTTLING_CODES.contains(&code) => {
            CheckpointError::throttled(operation, message)
        }
        _ => CheckpointError::backend(operation, message),
    }
}

fn item_from_attributes(attributes: &HashMap<String, AttributeValue>) -> Option<CheckpointItem> {
    let string_attr = |name: &str| attributes.get(name).and_then(|v| v.as_s().ok()).cloned();
    Some(CheckpointItem::new(
        string_attr(NAMESPACE_ATTR)?,
        string_attr(SHARD_ID_ATTR)?,
        string_attr(SEQUENCE_NUMBER_ATTR).unwrap_or_default(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_throughput_exceeded_is_throttled() {
        let err = classify(
            "put_item",
            Some("ProvisionedThroughputExceededException"),
            "rate exceeded".to_string(),
        );
        assert!(err.is_throttled());
        assert_eq!(err, CheckpointError::throttled("put_item", "rate exceeded"));

        assert!(classify("get_item", Some("ThrottlingException"), String::new()).is_throttled());
    }

    #[test]
    fn test_other_errors_are_backend_failures() {
        let err = classify(
            "describe_table",
            Some("ResourceNotFoundException"),
            "table missing".to_string(),
        );
        assert!(matches!(err, CheckpointError::Backend { .. }));

        let err = classify("get_item", None, "dispatch failure".to_string());
        assert!(!err.is_throttled());
    }

    #[test]
    fn test_item_from_attributes() {
        let attributes = HashMap::from([
            (NAMESPACE_ATTR.to_string(), AttributeValue::S("app-orders".into())),
            (SHARD_ID_ATTR.to_string(), AttributeValue::S("shard-0".into())),
            (SEQUENCE_NUMBER_ATTR.to_string(), AttributeValue::S("42".into())),
        ]);
        assert_eq!(
            item_from_attributes(&attributes),
            Some(CheckpointItem::new("app-orders", "shard-0", "42"))
        );

        let missing_key = HashMap::from([(
            SEQUENCE_NUMBER_ATTR.to_string(),
            AttributeValue::S("42".into()),
        )]);
        assert_eq!(item_from_attributes(&missing_key), None);
    }
}
