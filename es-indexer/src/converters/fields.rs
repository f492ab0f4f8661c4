//! Field level helpers: identifiers, truncation and script formatting

/// Longest keyword the cluster accepts
pub const MAX_FIELD_LENGTH: usize = 32766;
/// Longest value that still fits [`MAX_FIELD_LENGTH`] after base64 encoding
pub const MAX_KEYWORD_FIELD_LENGTH_BEFORE_BASE64: usize = 24575;
/// Maximum size of a document id
pub const MAX_ID_SIZE: usize = 512;

/// Big-endian bytes of `nonce` without leading zeros
fn nonce_bytes(nonce: u64) -> Vec<u8> {
    let bytes = nonce.to_be_bytes();
    let first = bytes.iter().position(|byte| *byte != 0).unwrap_or(bytes.len());
    bytes[first..].to_vec()
}

/// Hex form of a token nonce used inside document ids; zero is `00`
pub fn encode_nonce_to_hex(nonce: u64) -> String {
    if nonce == 0 {
        return "00".to_string();
    }

    hex::encode(nonce_bytes(nonce))
}

/// `token` for fungible tokens, `token-<hex nonce>` otherwise
pub fn compute_token_identifier(token: &str, nonce: u64) -> String {
    if nonce == 0 {
        return token.to_string();
    }

    format!("{}-{}", token, hex::encode(nonce_bytes(nonce)))
}

/// Collection part of a token identifier (`TKN-abcdef-0a` gives `TKN-abcdef`)
pub fn extract_collection(identifier: &str) -> &str {
    let parts: Vec<&str> = identifier.split('-').collect();
    if parts.len() < 3 {
        return identifier;
    }

    let collection_len = parts[0].len() + 1 + parts[1].len();
    &identifier[..collection_len]
}

fn truncate_to(field: &str, max: usize) -> &str {
    if field.len() <= max {
        return field;
    }

    let mut end = max;
    while !field.is_char_boundary(end) {
        end -= 1;
    }
    &field[..end]
}

pub fn truncate_field_if_exceeds_max_length(field: &str) -> &str {
    truncate_to(field, MAX_FIELD_LENGTH)
}

pub fn truncate_field_if_exceeds_max_length_base64(field: &str) -> &str {
    truncate_to(field, MAX_KEYWORD_FIELD_LENGTH_BEFORE_BASE64)
}

pub fn truncate_slice_elements_if_exceeds_max_length(fields: &[String]) -> Vec<String> {
    fields
        .iter()
        .map(|field| truncate_field_if_exceeds_max_length(field).to_string())
        .collect()
}

pub fn truncate_id(id: &str) -> &str {
    truncate_to(id, MAX_ID_SIZE)
}

/// Collapse a multi line painless script into a single line
pub fn format_painless_source(script: &str) -> String {
    script.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Escape a value so it can be embedded inside a hand written JSON string
pub fn json_escape(value: &str) -> String {
    let quoted = serde_json::Value::String(value.to_string()).to_string();
    quoted[1..quoted.len() - 1].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_nonce_to_hex() {
        assert_eq!(encode_nonce_to_hex(0), "00");
        assert_eq!(encode_nonce_to_hex(5), "05");
        assert_eq!(encode_nonce_to_hex(22), "16");
        assert_eq!(encode_nonce_to_hex(256), "0100");
    }

    #[test]
    fn test_compute_token_identifier() {
        assert_eq!(compute_token_identifier("TKN-abcd", 0), "TKN-abcd");
        assert_eq!(compute_token_identifier("TKN-abcd", 10), "TKN-abcd-0a");
    }

    #[test]
    fn test_extract_collection() {
        assert_eq!(extract_collection("NFT-abcd-0a"), "NFT-abcd");
        assert_eq!(extract_collection("TKN-abcd"), "TKN-abcd");
    }

    #[test]
    fn test_truncate() {
        let long = "a".repeat(MAX_FIELD_LENGTH + 10);
        assert_eq!(truncate_field_if_exceeds_max_length(&long).len(), MAX_FIELD_LENGTH);
        assert_eq!(truncate_field_if_exceeds_max_length("short"), "short");
        assert_eq!(
            truncate_field_if_exceeds_max_length_base64(&long).len(),
            MAX_KEYWORD_FIELD_LENGTH_BEFORE_BASE64
        );
        assert_eq!(truncate_id(&"b".repeat(600)).len(), MAX_ID_SIZE);
    }

    #[test]
    fn test_format_painless_source() {
        let script = "
            if ('create' == ctx.op) {
                ctx.op = 'noop'
            }
        ";
        assert_eq!(
            format_painless_source(script),
            "if ('create' == ctx.op) { ctx.op = 'noop' }"
        );
    }

    #[test]
    fn test_json_escape() {
        assert_eq!(json_escape("a\"b\\c"), "a\\\"b\\\\c");
        assert_eq!(json_escape("plain"), "plain");
    }
}
