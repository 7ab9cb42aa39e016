use async_trait::async_trait;

/// Outbound side of the chat transport. Implementations deliver one text
/// message to one recipient; chunking to the transport's size limit is the
/// caller's job.
#[async_trait]
pub trait ChatSink: Send + Sync {
    async fn send_message(&self, recipient: &str, text: &str) -> anyhow::Result<()>;
}

/// Split `text` into pieces of at most `limit` characters, on character
/// boundaries. Returns the text unsplit when it already fits.
pub fn chunk_text(text: &str, limit: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut count = 0;
    for ch in text.chars() {
        if count == limit {
            chunks.push(std::mem::take(&mut current));
            count = 0;
        }
        current.push(ch);
        count += 1;
    }
    if !current.is_empty() || chunks.is_empty() {
        chunks.push(current);
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn short_text_is_left_whole() {
        assert_eq!(chunk_text("hello", 10), vec!["hello".to_string()]);
        assert_eq!(chunk_text("", 10), vec![String::new()]);
    }

    #[test]
    fn long_text_splits_on_character_boundaries() {
        let text = "ab\u{00E9}".repeat(4); // 12 chars, multibyte included
        let chunks = chunk_text(&text, 5);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks.concat(), text);
        assert!(chunks.iter().all(|c| c.chars().count() <= 5));
    }
}
