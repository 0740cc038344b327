//! Sliding history window
//!
//! Bounds the context handed to one model call to the last N
//! request/response pairs without ever splitting a pair, and always keeps
//! the in-flight trailing sequence so the input ends on a request.

use tracing::warn;

use super::types::ModelMessage;

/// Select the last `window_size` request/response pairs of `history`.
///
/// Walks the log forward. A request immediately followed by a response forms
/// a pair. The first request with no response after it starts the trailing
/// sequence, which is kept verbatim from that point on. A response with no
/// preceding request is dropped with a warning.
///
/// Pure and deterministic; `window_size == 0` keeps only the trailing
/// sequence.
pub fn window(history: &[ModelMessage], window_size: usize) -> Vec<ModelMessage> {
    let mut pairs: Vec<(&ModelMessage, &ModelMessage)> = Vec::new();
    let mut tail: &[ModelMessage] = &[];

    let mut i = 0;
    while i < history.len() {
        let message = &history[i];
        if message.is_response() {
            warn!("Dropping orphan response at index {} of {}", i, history.len());
            i += 1;
            continue;
        }

        match history.get(i + 1) {
            Some(next) if next.is_response() => {
                pairs.push((message, next));
                i += 2;
            }
            _ => {
                tail = &history[i..];
                break;
            }
        }
    }

    let skip = pairs.len().saturating_sub(window_size);
    let mut result = Vec::with_capacity((pairs.len() - skip) * 2 + tail.len());
    for (request, response) in &pairs[skip..] {
        result.push((*request).clone());
        result.push((*response).clone());
    }
    result.extend(tail.iter().cloned());

    result
}

/// Count complete request/response pairs in `history`
pub fn count_pairs(history: &[ModelMessage]) -> usize {
    let mut count = 0;
    let mut i = 0;
    while i < history.len() {
        if history[i].is_request() {
            match history.get(i + 1) {
                Some(next) if next.is_response() => {
                    count += 1;
                    i += 2;
                }
                _ => break,
            }
        } else {
            i += 1;
        }
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::types::{ModelRequest, ModelResponse, RequestPart, ResponsePart};
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    fn req(text: &str) -> ModelMessage {
        ModelMessage::from(ModelRequest::user(text))
    }

    fn resp(text: &str) -> ModelMessage {
        let mut response = ModelResponse::from_text(text);
        response.timestamp = Utc.timestamp_opt(0, 0).unwrap();
        ModelMessage::from(response)
    }

    fn conversation(pairs: usize) -> Vec<ModelMessage> {
        (0..pairs)
            .flat_map(|i| [req(&format!("q{}", i)), resp(&format!("a{}", i))])
            .collect()
    }

    /// Every request in the output that is followed by a response must be
    /// its original partner; every response must follow a request.
    fn assert_pairs_intact(output: &[ModelMessage]) {
        for (i, message) in output.iter().enumerate() {
            if message.is_response() {
                assert!(i > 0 && output[i - 1].is_request(), "response at {} has no request", i);
            }
        }
    }

    #[test]
    fn test_short_history_is_unchanged() {
        let history = conversation(3);
        assert_eq!(window(&history, 3), history);
        assert_eq!(window(&history, 20), history);
    }

    #[test]
    fn test_twenty_messages_window_five() {
        let history = conversation(10);
        let output = window(&history, 5);
        assert_eq!(output.len(), 10);
        assert_eq!(output, history[10..].to_vec());
    }

    #[test]
    fn test_trailing_request_is_kept() {
        let mut history = conversation(3);
        history.push(req("in flight"));

        let output = window(&history, 1);
        assert_eq!(output, history[4..].to_vec());
        assert_eq!(output.len(), 3);
        assert_eq!(output.last(), Some(&req("in flight")));
    }

    #[test]
    fn test_window_zero_keeps_only_trailing_request() {
        let mut history = conversation(2);
        assert!(window(&history, 0).is_empty());

        history.push(req("now"));
        assert_eq!(window(&history, 0), vec![req("now")]);
    }

    #[test]
    fn test_orphan_response_is_dropped() {
        let history = vec![resp("orphan"), req("A"), resp("A")];
        let output = window(&history, 10);
        assert_eq!(output, vec![req("A"), resp("A")]);
    }

    #[test]
    fn test_orphan_between_pairs_is_dropped() {
        let history = vec![req("A"), resp("A"), resp("stray"), req("B"), resp("B")];
        let output = window(&history, 10);
        assert_eq!(output, vec![req("A"), resp("A"), req("B"), resp("B")]);
        assert!(!output.contains(&resp("stray")));
    }

    #[test]
    fn test_empty_history() {
        assert!(window(&[], 5).is_empty());
        assert!(window(&[], 0).is_empty());
    }

    #[test]
    fn test_window_is_deterministic_and_leaves_input_alone() {
        let mut history = conversation(6);
        history.insert(3, resp("orphan"));
        history.push(req("tail"));
        let before = history.clone();

        let first = window(&history, 2);
        let second = window(&history, 2);
        assert_eq!(first, second);
        assert_eq!(history, before);
    }

    #[test]
    fn test_pairs_never_split_for_any_size() {
        let mut history = conversation(7);
        history.insert(0, resp("orphan"));
        history.push(req("tail"));

        for size in 0..10 {
            let output = window(&history, size);
            assert_pairs_intact(&output);
            assert_eq!(output.last(), Some(&req("tail")));
            assert_eq!(count_pairs(&output), size.min(7));
        }
    }

    #[test]
    fn test_tool_call_turn_stays_in_tail() {
        // One agent step mid-turn: request, tool-call response, tool-return request.
        let tool_call = ModelMessage::from(ModelResponse::new(vec![ResponsePart::ToolCall {
            tool_call_id: "c1".to_string(),
            tool_name: "set_movie_quality".to_string(),
            arguments: json!({"quality": "4k"}),
        }]));
        let tool_return = ModelMessage::from(ModelRequest::new(vec![RequestPart::ToolReturn {
            tool_call_id: "c1".to_string(),
            tool_name: "set_movie_quality".to_string(),
            content: "Got it!".to_string(),
        }]));

        let mut history = conversation(4);
        history.push(req("movies in 4k please"));
        history.push(tool_call.clone());
        history.push(tool_return.clone());

        let output = window(&history, 1);
        // The tool-call response pairs with the user request; the tool return
        // is the trailing request.
        assert_eq!(output, vec![req("movies in 4k please"), tool_call, tool_return]);
    }

    #[test]
    fn test_count_pairs() {
        assert_eq!(count_pairs(&conversation(4)), 4);
        assert_eq!(count_pairs(&[resp("x"), req("a"), resp("a"), req("b")]), 1);
    }
}
