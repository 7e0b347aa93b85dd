use serde::{Deserialize, Serialize};

/// One push-protocol event: a partial or final transcription result.
///
/// Serializes to the wire shape subscribers consume, one JSON object
/// per event:
/// `{"resultIndex":0,"results":[{"isFinal":...,"items":[...]}]}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultEvent {
    pub result_index: u32,
    pub results: Vec<ResultPayload>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultPayload {
    pub is_final: bool,
    pub items: Vec<ResultItem>,
}

/// A transcript span with the stability confidence the driver assigns:
/// 1.0 for settled text, 0.5 for the still-moving tail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultItem {
    pub transcript: String,
    pub confidence: f64,
}

impl ResultEvent {
    /// Builds a partial result from an in-progress transcript.
    ///
    /// Everything but the last token is grouped as a stable item; the
    /// last token stands alone as unstable. A single token yields only
    /// the unstable item. Returns None when the text has no tokens.
    pub fn partial(text: &str) -> Option<Self> {
        let words: Vec<&str> = text.split_whitespace().collect();
        let (last, stable) = words.split_last()?;
        let mut items = Vec::with_capacity(2);
        if !stable.is_empty() {
            items.push(ResultItem {
                transcript: stable.join(" "),
                confidence: 1.0,
            });
        }
        items.push(ResultItem {
            transcript: (*last).to_string(),
            confidence: 0.5,
        });
        Some(Self {
            result_index: 0,
            results: vec![ResultPayload {
                is_final: false,
                items,
            }],
        })
    }

    /// Builds a final result carrying the whole utterance at full
    /// confidence. Returns None for empty text.
    pub fn final_result(text: &str) -> Option<Self> {
        if text.is_empty() {
            return None;
        }
        Some(Self {
            result_index: 0,
            results: vec![ResultPayload {
                is_final: true,
                items: vec![ResultItem {
                    transcript: text.to_string(),
                    confidence: 1.0,
                }],
            }],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn items(event: &ResultEvent) -> &[ResultItem] {
        &event.results[0].items
    }

    #[test]
    fn partial_groups_stable_prefix_and_unstable_tail() {
        let event = ResultEvent::partial("a b c").unwrap();
        assert!(!event.results[0].is_final);
        assert_eq!(items(&event).len(), 2);
        assert_eq!(items(&event)[0].transcript, "a b");
        assert_eq!(items(&event)[0].confidence, 1.0);
        assert_eq!(items(&event)[1].transcript, "c");
        assert_eq!(items(&event)[1].confidence, 0.5);
    }

    #[test]
    fn single_token_partial_is_unstable_only() {
        let event = ResultEvent::partial("a").unwrap();
        assert_eq!(items(&event).len(), 1);
        assert_eq!(items(&event)[0].transcript, "a");
        assert_eq!(items(&event)[0].confidence, 0.5);
    }

    #[test]
    fn blank_partial_yields_nothing() {
        assert!(ResultEvent::partial("").is_none());
        assert!(ResultEvent::partial("   ").is_none());
    }

    #[test]
    fn final_result_is_one_full_confidence_item() {
        let event = ResultEvent::final_result("hello world").unwrap();
        assert!(event.results[0].is_final);
        assert_eq!(items(&event).len(), 1);
        assert_eq!(items(&event)[0].transcript, "hello world");
        assert_eq!(items(&event)[0].confidence, 1.0);
    }

    #[test]
    fn wire_format_matches_push_protocol() {
        let event = ResultEvent::final_result("hi").unwrap();
        assert_eq!(
            serde_json::to_string(&event).unwrap(),
            r#"{"resultIndex":0,"results":[{"isFinal":true,"items":[{"transcript":"hi","confidence":1.0}]}]}"#
        );
    }
}
