//! Decoding and classification of cluster responses

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::core::error::ElasticError;

/// Failed bulk items reported in one error
pub const NUM_OF_ERRORS_TO_EXTRACT_BULK_RESPONSE: usize = 5;

const ERR_RESOURCE_ALREADY_EXISTS: &str = "resource_already_exists_exception";
const ERR_ALIAS_ALREADY_EXISTS: &str = "invalid_alias_name_exception";
const ERR_POLICY_ALREADY_EXISTS: &str = "document already exists";

/// Body of a bulk response
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BulkResponse {
    #[serde(default)]
    pub took: u64,
    #[serde(default)]
    pub errors: bool,
    /// Each item is keyed by its action: `index`, `create`, `update` or `delete`
    #[serde(default)]
    pub items: Vec<HashMap<String, BulkItem>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BulkItem {
    #[serde(rename = "_index", default)]
    pub index: String,
    #[serde(rename = "_id", default)]
    pub id: String,
    #[serde(default)]
    pub status: u16,
    #[serde(default)]
    pub error: Option<ItemError>,
}

/// Error details of a failed item
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct ItemError {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub reason: String,
    #[serde(rename = "caused_by", default, skip_serializing_if = "Option::is_none")]
    pub caused_by: Option<Value>,
}

/// Body of a multi-get response
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct MultiGetResponse {
    #[serde(default)]
    pub docs: Vec<MultiGetDoc>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct MultiGetDoc {
    #[serde(rename = "_id", default)]
    pub id: String,
    #[serde(default)]
    pub found: bool,
    #[serde(rename = "_source", default, skip_serializing_if = "Option::is_none")]
    pub source: Option<Value>,
}

impl MultiGetResponse {
    /// Ids of the documents that exist
    pub fn found_ids(&self) -> impl Iterator<Item = &str> {
        self.docs.iter().filter(|doc| doc.found).map(|doc| doc.id.as_str())
    }
}

fn is_already_exists(error: &str) -> bool {
    error.contains(ERR_RESOURCE_ALREADY_EXISTS)
        || error.contains(ERR_ALIAS_ALREADY_EXISTS)
        || error.contains(ERR_POLICY_ALREADY_EXISTS)
}

/// Classify the answer to a single document or lifecycle request
pub fn check_response(path: &str, status: u16, body: &[u8]) -> Result<(), ElasticError> {
    if (200..300).contains(&status) {
        return Ok(());
    }

    let decoded: HashMap<String, Value> = match serde_json::from_slice(body) {
        Ok(decoded) => decoded,
        Err(err) => {
            let raw = String::from_utf8_lossy(body);
            if raw.contains("403") || raw.contains("429") {
                return Err(ElasticError::BackOff);
            }
            return Err(ElasticError::Decode(format!(
                "status {} from {}: {}",
                status, path, err
            )));
        }
    };

    let error = decoded
        .get("error")
        .map(Value::to_string)
        .unwrap_or_default();
    if is_already_exists(&error) {
        debug!(target: "es_indexer::client", "{} already exists, ignoring", path);
        return Ok(());
    }

    if status == 429 {
        return Err(ElasticError::BackOff);
    }

    let body = if error.is_empty() {
        String::from_utf8_lossy(body).into_owned()
    } else {
        error
    };
    Err(ElasticError::Status {
        path: path.to_string(),
        status,
        body,
    })
}

/// Collect the failed items of a bulk response into one error
pub fn check_bulk_response(body: &[u8]) -> Result<(), ElasticError> {
    let response: BulkResponse = serde_json::from_slice(body)?;
    if !response.errors {
        return Ok(());
    }

    let failed: Vec<String> = response
        .items
        .iter()
        .flat_map(HashMap::values)
        .filter(|item| item.status >= 400)
        .filter(|item| {
            let kind = item.error.as_ref().map(|error| error.kind.as_str()).unwrap_or_default();
            !is_already_exists(kind)
        })
        .take(NUM_OF_ERRORS_TO_EXTRACT_BULK_RESPONSE)
        .map(describe_failed_item)
        .collect();

    if failed.is_empty() {
        return Ok(());
    }

    Err(ElasticError::BulkItems(failed))
}

fn describe_failed_item(item: &BulkItem) -> String {
    let error = item.error.clone().unwrap_or_default();
    serde_json::json!({
        "index": item.index,
        "id": item.id,
        "statusCode": item.status,
        "errorType": error.kind,
        "reason": error.reason,
        "causedBy": error.caused_by,
    })
    .to_string()
}

/// Value of `_scroll_id` in a search response
pub fn scroll_id(body: &[u8]) -> Result<String, ElasticError> {
    let decoded: Value = serde_json::from_slice(body)?;
    Ok(decoded
        .get("_scroll_id")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string())
}

/// Number of hits in one search page
pub fn hits_count(body: &[u8]) -> Result<usize, ElasticError> {
    let decoded: Value = serde_json::from_slice(body)?;
    Ok(decoded
        .pointer("/hits/hits")
        .and_then(Value::as_array)
        .map(Vec::len)
        .unwrap_or_default())
}

/// Ids of the hits in one search page
pub fn hits_ids(body: &[u8]) -> Result<Vec<String>, ElasticError> {
    let decoded: Value = serde_json::from_slice(body)?;
    Ok(decoded
        .pointer("/hits/hits")
        .and_then(Value::as_array)
        .map(|hits| {
            hits.iter()
                .filter_map(|hit| hit.get("_id").and_then(Value::as_str))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hits_ids() {
        let body = br#"{"_scroll_id":"s","hits":{"hits":[{"_id":"a"},{"_id":"b"},{"_source":{}}]}}"#;
        assert_eq!(hits_ids(body).unwrap(), vec!["a", "b"]);
        assert!(hits_ids(br#"{"hits":{}}"#).unwrap().is_empty());
        assert!(hits_ids(b"nope").is_err());
    }

    #[test]
    fn test_check_response_success_statuses() {
        assert!(check_response("/x", 200, b"").is_ok());
        assert!(check_response("/x", 201, b"not json").is_ok());
        assert!(check_response("/blocks/_doc/1", 204, b"").is_ok());
        assert!(check_response("/x", 202, b"accepted").is_ok());
    }

    #[test]
    fn test_check_response_back_off_on_undecodable_throttle() {
        let err = check_response("/x", 429, b"429 Too Many Requests").unwrap_err();
        assert!(err.is_back_off());

        let err = check_response("/x", 403, b"<html>403 Forbidden</html>").unwrap_err();
        assert!(err.is_back_off());
    }

    #[test]
    fn test_check_response_decode_error() {
        let err = check_response("/x", 500, b"<html>boom</html>").unwrap_err();
        assert!(matches!(err, ElasticError::Decode(_)));
    }

    #[test]
    fn test_check_response_already_exists_is_ignored() {
        let body = br#"{"error":{"type":"resource_already_exists_exception","reason":"index [blocks-000001] already exists"},"status":400}"#;
        assert!(check_response("/blocks-000001", 400, body).is_ok());

        let body = br#"{"error":{"type":"invalid_alias_name_exception"},"status":400}"#;
        assert!(check_response("/x/_alias/blocks", 400, body).is_ok());

        let body = br#"{"error":{"type":"version_conflict_engine_exception","reason":"[opendistro]: version conflict, document already exists (current version [1])"},"status":409}"#;
        assert!(check_response("/_opendistro/_ism/policies/opendistro", 409, body).is_ok());
    }

    #[test]
    fn test_check_response_status_error() {
        let body = br#"{"error":{"type":"mapper_parsing_exception","reason":"failed"},"status":400}"#;
        match check_response("/blocks/_doc/1", 400, body).unwrap_err() {
            ElasticError::Status { status, body, .. } => {
                assert_eq!(status, 400);
                assert!(body.contains("mapper_parsing_exception"));
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_bulk_response_without_errors() {
        let body = br#"{"took":3,"errors":false,"items":[{"index":{"_index":"blocks","_id":"a","status":201}}]}"#;
        assert!(check_bulk_response(body).is_ok());
    }

    #[test]
    fn test_bulk_response_with_one_failed_item() {
        let body = br#"{"took":3,"errors":true,"items":[
            {"index":{"_index":"transactions","_id":"h1","status":201}},
            {"update":{"_index":"transactions","_id":"h2","status":409,"error":{"type":"version_conflict_engine_exception","reason":"version conflict","caused_by":{"type":"x","reason":"y"}}}},
            {"delete":{"_index":"transactions","_id":"h3","status":200}}
        ]}"#;

        let err = check_bulk_response(body).unwrap_err();
        match &err {
            ElasticError::BulkItems(items) => assert_eq!(items.len(), 1),
            other => panic!("unexpected error {:?}", other),
        }
        let message = err.to_string();
        assert!(message.contains("h2"));
        assert!(message.contains("version conflict"));
        assert!(message.contains("409"));
        assert!(!message.contains("h1"));
    }

    #[test]
    fn test_bulk_response_limits_reported_items() {
        let items: Vec<String> = (0..8)
            .map(|i| {
                format!(
                    r#"{{"index":{{"_index":"logs","_id":"id{}","status":400,"error":{{"type":"mapper_parsing_exception","reason":"bad"}}}}}}"#,
                    i
                )
            })
            .collect();
        let body = format!(r#"{{"errors":true,"items":[{}]}}"#, items.join(","));

        match check_bulk_response(body.as_bytes()).unwrap_err() {
            ElasticError::BulkItems(items) => {
                assert_eq!(items.len(), NUM_OF_ERRORS_TO_EXTRACT_BULK_RESPONSE)
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_bulk_response_already_exists_items_are_ignored() {
        let body = br#"{"errors":true,"items":[{"create":{"_index":"tokens","_id":"a","status":400,"error":{"type":"resource_already_exists_exception","reason":"exists"}}}]}"#;
        assert!(check_bulk_response(body).is_ok());
    }

    #[test]
    fn test_scroll_helpers() {
        let body = br#"{"_scroll_id":"abc","hits":{"hits":[{"_id":"1"},{"_id":"2"}]}}"#;
        assert_eq!(scroll_id(body).unwrap(), "abc");
        assert_eq!(hits_count(body).unwrap(), 2);
        assert_eq!(hits_count(br#"{"hits":{"hits":[]}}"#).unwrap(), 0);
    }
}
