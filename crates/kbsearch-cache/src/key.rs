/// Lowercase, collapse runs of whitespace and trim. CJK text is unaffected
/// by case folding and passes through as is.
pub fn normalize(query: &str) -> String {
    query.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

/// `query:<16 hex chars of blake3(normalized)>:top_k:<top_k>`
pub fn cache_key(query: &str, top_k: usize) -> String {
    let hash = blake3::hash(normalize(query).as_bytes()).to_hex();
    format!("query:{}:top_k:{}", &hash.as_str()[..16], top_k)
}

pub fn meta_key(key: &str) -> String {
    format!("{}:meta", key)
}
