use anyhow::{Context, Result};
use shared::ChatMessage;

use crate::transcript::EnrichedItem;

pub const SUMMARIZER_PROMPT: &str = "You are an expert summarizer. You write readable, concise, simple content. You are given a transcript of a meeting and you need to summarize it.

Use the following markdown structure for every output:

### Overview
Provide a detailed, engaging summary of the session's content. Focus on major features, user workflows, and any key takeaways. Write in a narrative style, using full sentences. Highlight unique or powerful aspects of the product, platform, or discussion.

### Notes
Break down key content into thematic sections with timestamp ranges. Each section should summarize key points, actions, or demos in bullet format.

Example:
#### Section Name
- Main point or demo shown here
- Another key insight or interaction
- Follow-up tool or explanation provided

#### Next Section
- Feature X automatically does Y
- Mention of integration with Z";

pub fn summary_request(items: &[EnrichedItem]) -> Result<Vec<ChatMessage>> {
    let transcript = serde_json::to_string(items).context("Failed to serialize transcript")?;

    Ok(vec![
        ChatMessage::system(SUMMARIZER_PROMPT),
        ChatMessage::user(format!("summarize the following transcript: {}", transcript)),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transcript::{SpeakerRef, TranscriptItem};
    use shared::ChatRole;

    #[test]
    fn test_summary_request_embeds_enriched_transcript() {
        let items = vec![EnrichedItem {
            item: TranscriptItem {
                kind: "speech".to_string(),
                speaker_id: "u1".to_string(),
                text: "Ship it Friday".to_string(),
                start_ts: 0,
                stop_ts: 900,
            },
            user: SpeakerRef {
                name: "Dana".to_string(),
            },
        }];

        let messages = summary_request(&items).unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, ChatRole::System);
        assert!(messages[0].content.contains("### Overview"));
        assert!(messages[1]
            .content
            .starts_with("summarize the following transcript: [{"));
        assert!(messages[1].content.contains(r#""user":{"name":"Dana"}"#));
    }
}
