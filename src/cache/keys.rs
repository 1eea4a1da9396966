use sha2::{Digest, Sha256};

pub const SCRAPE_PREFIX: &str = "scrape:";
pub const CHAT_PREFIX: &str = "chat_history:";
/// Reserved for memoized model responses.
pub const AI_RESPONSE_PREFIX: &str = "ai_response:";

/// Hex SHA-256 of the input.
pub fn content_hash(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}

/// Orchestrator-owned key for a URL.
pub fn scrape_key(url: &str) -> String {
    format!("{}{}", SCRAPE_PREFIX, content_hash(url))
}

/// Gatherer-owned key for a URL within one conversation.
pub fn conversation_scrape_key(conversation_id: &str, url: &str) -> String {
    format!("{}{}:{}", SCRAPE_PREFIX, conversation_id, content_hash(url))
}

pub fn ai_response_key(prompt: &str) -> String {
    format!("{}{}", AI_RESPONSE_PREFIX, content_hash(prompt))
}

/// List key holding a conversation's chat turns.
pub fn chat_history_key(conversation_id: &str) -> String {
    format!("{}{}", CHAT_PREFIX, conversation_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_are_deterministic() {
        assert_eq!(
            scrape_key("https://example.com"),
            scrape_key("https://example.com")
        );
        assert_ne!(
            scrape_key("https://example.com/a"),
            scrape_key("https://example.com/b")
        );
    }

    #[test]
    fn test_namespaces_do_not_collide() {
        let url = "https://example.com";
        let orchestrator = scrape_key(url);
        let gatherer = conversation_scrape_key("conv-1", url);
        let ai = ai_response_key(url);

        assert!(orchestrator.starts_with(SCRAPE_PREFIX));
        assert!(gatherer.starts_with("scrape:conv-1:"));
        assert!(ai.starts_with(AI_RESPONSE_PREFIX));
        assert_ne!(orchestrator, gatherer);
        assert_ne!(orchestrator, ai);
    }

    #[test]
    fn test_hash_is_hex_sha256() {
        let hash = content_hash("https://example.com");
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_chat_history_key() {
        assert_eq!(chat_history_key("abc"), "chat_history:abc");
    }
}
