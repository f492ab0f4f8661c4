//! Token documents and the token type backfill of token accounts

use super::accounts::FUNGIBLE_ESDT;
use super::{index_meta, update_meta};
use crate::converters::{format_painless_source, json_escape};
use crate::core::error::IndexerResult;
use crate::data::documents::TokenInfo;
use crate::data::BufferSlice;

const UPSERT_TOKEN_SCRIPT: &str = "
    if (ctx._source.containsKey('timestamp')) {
        if (ctx._source.timestamp <= params.token.timestamp) {
            ctx._source = params.token
        }
    } else {
        ctx._source = params.token
    }
";

const SET_TYPE_SCRIPT: &str = "
    if ('create' == ctx.op) {
        ctx.op = 'noop'
    } else {
        ctx._source.type = params.type
    }
";

#[derive(Debug, Default, Clone)]
pub struct TokensProcessor;

impl TokensProcessor {
    pub fn new() -> Self {
        Self
    }

    /// Issued tokens, keyed by token; the document itself is the upsert
    pub fn serialize_tokens(&self, tokens: &[TokenInfo], buffer: &mut BufferSlice, index: &str) -> IndexerResult<()> {
        for token in tokens {
            let doc = serde_json::to_string(token)?;
            let body = format!(
                "{{\"script\": {{\"source\": \"{}\",\"lang\": \"painless\",\"params\": {{\"token\": {}}}}},\"upsert\": {}}}",
                format_painless_source(UPSERT_TOKEN_SCRIPT),
                doc,
                doc
            );
            buffer.put_data(&update_meta(index, &token.token), body.as_bytes());
        }
        Ok(())
    }

    /// Created NFTs, keyed by their full identifier
    pub fn serialize_nft_create_info(
        &self,
        tokens: &[TokenInfo],
        buffer: &mut BufferSlice,
        index: &str,
    ) -> IndexerResult<()> {
        for token in tokens {
            let doc = serde_json::to_vec(token)?;
            buffer.put_data(&index_meta(index, &token.identifier), &doc);
        }
        Ok(())
    }

    /// Issued tokens whose type must be copied into existing token accounts
    pub fn tokens_needing_type_backfill<'a>(&self, tokens: &'a [TokenInfo]) -> impl Iterator<Item = &'a TokenInfo> {
        tokens
            .iter()
            .filter(|token| !token.kind.is_empty() && token.kind != FUNGIBLE_ESDT)
    }

    /// Documents of `token` that have no type yet
    pub fn type_backfill_query(&self, token: &str) -> Vec<u8> {
        format!(
            "{{\"query\": {{\"bool\": {{\"must\": [{{\"match\": {{\"token\": \"{}\"}}}}],\"must_not\":[{{\"exists\": {{\"field\": \"type\"}}}}]}}}}}}",
            json_escape(token)
        )
        .into_bytes()
    }

    /// Set `type` on existing documents only; missing ones are not created
    pub fn serialize_type_for_provided_ids(
        &self,
        ids: &[String],
        token_type: &str,
        buffer: &mut BufferSlice,
        index: &str,
    ) {
        for id in ids {
            let body = format!(
                "{{\"scripted_upsert\": true, \"script\": {{\"source\": \"{}\",\"lang\": \"painless\",\"params\": {{\"type\": \"{}\"}}}},\"upsert\": {{}}}}",
                format_painless_source(SET_TYPE_SCRIPT),
                json_escape(token_type)
            );
            buffer.put_data(&update_meta(index, id), body.as_bytes());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issued(token: &str, kind: &str) -> TokenInfo {
        TokenInfo {
            token: token.to_string(),
            identifier: token.to_string(),
            name: "Name".to_string(),
            kind: kind.to_string(),
            issuer: "erd1issuer".to_string(),
            timestamp: 10,
            ..Default::default()
        }
    }

    #[test]
    fn test_serialize_tokens() {
        let tokens = vec![issued("NFT-0123", "NonFungibleESDT")];
        let mut buffer = BufferSlice::default();
        TokensProcessor::new()
            .serialize_tokens(&tokens, &mut buffer, "tokens")
            .unwrap();

        let body = String::from_utf8(buffer.buffers()[0].clone()).unwrap();
        let lines: Vec<&str> = body.lines().collect();
        assert_eq!(lines[0], "{ \"update\" : {\"_index\":\"tokens\", \"_id\" : \"NFT-0123\" } }");

        let doc = serde_json::to_string(&tokens[0]).unwrap();
        assert_eq!(
            lines[1],
            format!(
                "{{\"script\": {{\"source\": \"if (ctx._source.containsKey('timestamp')) {{ if (ctx._source.timestamp <= params.token.timestamp) {{ ctx._source = params.token }} }} else {{ ctx._source = params.token }}\",\"lang\": \"painless\",\"params\": {{\"token\": {}}}}},\"upsert\": {}}}",
                doc, doc
            )
        );
    }

    #[test]
    fn test_serialize_nft_create_info() {
        let token = TokenInfo {
            token: "NFT-0123".to_string(),
            identifier: "NFT-0123-0a".to_string(),
            nonce: 10,
            ..Default::default()
        };
        let mut buffer = BufferSlice::default();
        TokensProcessor::new()
            .serialize_nft_create_info(&[token], &mut buffer, "tokens")
            .unwrap();

        let body = String::from_utf8(buffer.buffers()[0].clone()).unwrap();
        assert!(body.starts_with("{ \"index\" : { \"_index\":\"tokens\", \"_id\" : \"NFT-0123-0a\" } }\n{"));
        assert!(body.contains("\"nonce\":10"));
    }

    #[test]
    fn test_type_backfill() {
        let processor = TokensProcessor::new();
        let tokens = vec![
            issued("NFT-0123", "NonFungibleESDT"),
            issued("TKN-abcd", FUNGIBLE_ESDT),
            issued("OLD-0000", ""),
        ];
        let selected: Vec<&str> = processor
            .tokens_needing_type_backfill(&tokens)
            .map(|token| token.token.as_str())
            .collect();
        assert_eq!(selected, vec!["NFT-0123"]);

        assert_eq!(
            String::from_utf8(processor.type_backfill_query("NFT-0123")).unwrap(),
            "{\"query\": {\"bool\": {\"must\": [{\"match\": {\"token\": \"NFT-0123\"}}],\"must_not\":[{\"exists\": {\"field\": \"type\"}}]}}}"
        );

        let mut buffer = BufferSlice::default();
        processor.serialize_type_for_provided_ids(&["a".to_string()], "NonFungibleESDT", &mut buffer, "accountsesdt");
        assert_eq!(
            String::from_utf8(buffer.buffers()[0].clone()).unwrap(),
            "{ \"update\" : {\"_index\":\"accountsesdt\", \"_id\" : \"a\" } }\n{\"scripted_upsert\": true, \"script\": {\"source\": \"if ('create' == ctx.op) { ctx.op = 'noop' } else { ctx._source.type = params.type }\",\"lang\": \"painless\",\"params\": {\"type\": \"NonFungibleESDT\"}},\"upsert\": {}}\n"
        );
    }

    #[test]
    fn test_type_write_back_skips_missing_documents() {
        let mut buffer = BufferSlice::default();
        TokensProcessor::new().serialize_type_for_provided_ids(
            &["gone".to_string()],
            "SemiFungibleESDT",
            &mut buffer,
            "tokens",
        );

        let body = String::from_utf8(buffer.buffers()[0].clone()).unwrap();
        let doc: serde_json::Value = serde_json::from_str(body.lines().nth(1).unwrap()).unwrap();
        assert_eq!(doc["scripted_upsert"], true);
        assert_eq!(doc["upsert"], serde_json::json!({}));
        assert!(doc["script"]["source"].as_str().unwrap().starts_with("if ('create' == ctx.op) { ctx.op = 'noop' }"));
    }
}
