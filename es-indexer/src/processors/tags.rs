//! Tag occurrence counter
//!
//! Counts how many tokens created in a block carry each tag and turns the
//! counts into increment scripts for the `tags` index.

use std::collections::{BTreeMap, HashSet};

use base64::{engine::general_purpose::STANDARD, Engine as _};

use super::update_meta;
use crate::converters::fields::truncate_id;
use crate::converters::json_escape;
use crate::core::error::IndexerResult;
use crate::data::BufferSlice;

/// Multiset of tags, ordered so that serialization is deterministic
#[derive(Debug, Clone, Default)]
pub struct TagCounter {
    tags: BTreeMap<String, u64>,
}

impl TagCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count each distinct non empty tag of one token once
    pub fn parse_tags(&mut self, tags: &[String]) {
        let mut seen = HashSet::new();
        for tag in tags {
            if tag.is_empty() || !seen.insert(tag.as_str()) {
                continue;
            }
            *self.tags.entry(tag.clone()).or_default() += 1;
        }
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    pub fn get_tags(&self) -> Vec<String> {
        self.tags.keys().cloned().collect()
    }

    pub fn count(&self, tag: &str) -> u64 {
        self.tags.get(tag).copied().unwrap_or_default()
    }

    /// One increment script per tag, keyed by the base64 form of the tag
    pub fn serialize(&self, buffer: &mut BufferSlice, index: &str) -> IndexerResult<()> {
        for (tag, count) in &self.tags {
            let encoded = STANDARD.encode(tag.as_bytes());
            let meta = update_meta(index, truncate_id(&encoded));

            let tag = json_escape(tag);
            let doc = format!(
                "{{\"script\": {{\"source\": \"ctx._source.count += params.count; ctx._source.tag = params.tag\",\"lang\": \"painless\",\"params\": {{\"count\": {}, \"tag\": \"{}\"}}}},\"upsert\": {{\"count\": {}, \"tag\":\"{}\"}}}}",
                count, tag, count, tag
            );
            buffer.put_data(&meta, doc.as_bytes());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::converters::fields::MAX_ID_SIZE;

    fn tags(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    #[test]
    fn test_parse_tags_counts_once_per_token() {
        let mut counter = TagCounter::new();
        counter.parse_tags(&[]);
        for _ in 0..3 {
            counter.parse_tags(&tags(&["Art", "Art", "Sport", "Market", ""]));
        }

        assert_eq!(counter.len(), 3);
        assert_eq!(counter.count("Art"), 3);
        assert_eq!(counter.count("Sport"), 3);
        assert_eq!(counter.count(""), 0);
        assert_eq!(counter.get_tags(), vec!["Art", "Market", "Sport"]);
    }

    #[test]
    fn test_serialize() {
        let mut counter = TagCounter::new();
        counter.parse_tags(&tags(&["Art"]));
        counter.parse_tags(&tags(&["Art"]));

        let mut buffer = BufferSlice::default();
        counter.serialize(&mut buffer, "tags").unwrap();

        let expected = "{ \"update\" : {\"_index\":\"tags\", \"_id\" : \"QXJ0\" } }\n{\"script\": {\"source\": \"ctx._source.count += params.count; ctx._source.tag = params.tag\",\"lang\": \"painless\",\"params\": {\"count\": 2, \"tag\": \"Art\"}},\"upsert\": {\"count\": 2, \"tag\":\"Art\"}}\n";
        assert_eq!(String::from_utf8(buffer.buffers()[0].clone()).unwrap(), expected);
    }

    #[test]
    fn test_long_tag_id_is_truncated() {
        let tag = "x\"y".repeat(200);
        let mut counter = TagCounter::new();
        counter.parse_tags(&[tag.clone()]);

        let mut buffer = BufferSlice::default();
        counter.serialize(&mut buffer, "tags").unwrap();

        let body = String::from_utf8(buffer.buffers()[0].clone()).unwrap();
        let mut lines = body.lines();
        let meta: serde_json::Value = serde_json::from_str(lines.next().unwrap()).unwrap();
        let id = meta["update"]["_id"].as_str().unwrap();
        assert_eq!(id.len(), MAX_ID_SIZE);
        assert_eq!(id, &STANDARD.encode(tag.as_bytes())[..MAX_ID_SIZE]);

        let doc: serde_json::Value = serde_json::from_str(lines.next().unwrap()).unwrap();
        assert_eq!(doc["upsert"]["tag"], tag.as_str());
    }

    #[test]
    fn test_empty_counter_writes_nothing() {
        let mut buffer = BufferSlice::default();
        TagCounter::new().serialize(&mut buffer, "tags").unwrap();
        assert!(buffer.is_empty());
    }
}
