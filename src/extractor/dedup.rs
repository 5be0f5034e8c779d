use crate::types::Article;

/// Computes the content-addressed dedup key (§4.4.3): md5 of the
/// concatenated title and content. Exposed here as the single place
/// extractors call into before handing a candidate to the store — the
/// merge rules themselves live next to the schema in `db::merge_article`,
/// since they operate directly on what's already persisted.
pub fn content_hash(title: &str, content: &str) -> String {
    crate::utils::md5_hex(&format!("{title}{content}"))
}

/// True when two candidates would collide under the dedup key, without
/// needing a DB round trip — useful for collapsing duplicates found within
/// a single extraction batch before they ever reach `db::upsert_article`.
pub fn same_article(a: &Article, b: &Article) -> bool {
    a.content_hash == b.content_hash
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_hash_is_stable_for_same_input() {
        assert_eq!(content_hash("T", "C"), content_hash("T", "C"));
    }

    #[test]
    fn content_hash_differs_for_different_input() {
        assert_ne!(content_hash("T", "C"), content_hash("T", "D"));
    }
}
