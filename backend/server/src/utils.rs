use std::sync::LazyLock;

use regex::Regex;
use reqwest::Url;
use serde_json::Value;
use thiserror::Error;

use crate::error::StoreError;

// A language tag starts with a letter and is followed by whitespace,
// otherwise the text after the fence is payload.
static LEADING_FENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^```(?:[A-Za-z][A-Za-z0-9_+-]*(?:[ \t]*\r?\n|[ \t]+)|[ \t]*\r?\n?)").unwrap()
});
static TRAILING_FENCE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\r?\n?```$").unwrap());

#[derive(Error, Debug)]
#[error("AI response is not valid JSON: {source}")]
pub struct CleanError {
    #[from]
    source: serde_json::Error,
}

/// Strips markdown code fences a text-generation service likes to wrap its
/// structured output in, then parses what is left as JSON.
///
/// Only one leading fence (optionally language tagged, e.g. ```` ```json ````)
/// and one trailing fence are removed.
pub fn clean_ai_response(raw: &str) -> Result<Value, CleanError> {
    Ok(serde_json::from_str(strip_fences(raw))?)
}

fn strip_fences(raw: &str) -> &str {
    let mut s = raw.trim();

    if let Some(m) = LEADING_FENCE.find(s) {
        s = &s[m.end()..];
    }
    if let Some(m) = TRAILING_FENCE.find(s) {
        s = &s[..m.start()];
    }

    s.trim()
}

/// Appends path segments to a service base url, percent-encoding each one.
pub fn endpoint(base_url: &str, segments: &[&str]) -> Result<Url, StoreError> {
    let mut url =
        Url::parse(base_url).map_err(|e| StoreError::Endpoint(format!("{base_url}: {e}")))?;

    url.path_segments_mut()
        .map_err(|_| StoreError::Endpoint(format!("{base_url}: cannot be a base")))?
        .pop_if_empty()
        .extend(segments);

    Ok(url)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_fenced_json() {
        let parsed = clean_ai_response("```json\n{\"a\":1}\n```").unwrap();
        assert_eq!(parsed, json!({ "a": 1 }));
    }

    #[test]
    fn test_bare_json() {
        assert_eq!(clean_ai_response("{\"a\":1}").unwrap(), json!({ "a": 1 }));
    }

    #[test]
    fn test_untagged_fence_and_whitespace() {
        let raw = "  \n```\n{\"plan\": [\"squat\", \"row\"]}\n```  \n";
        assert_eq!(
            clean_ai_response(raw).unwrap(),
            json!({ "plan": ["squat", "row"] })
        );
    }

    #[test]
    fn test_crlf_fence() {
        let raw = "```json\r\n[1, 2, 3]\r\n```";
        assert_eq!(clean_ai_response(raw).unwrap(), json!([1, 2, 3]));
    }

    #[test]
    fn test_only_outer_fences_removed() {
        let raw = "```json\n{\"note\": \"use ``` for code\"}\n```";
        assert_eq!(
            clean_ai_response(raw).unwrap(),
            json!({ "note": "use ``` for code" })
        );
    }

    #[test]
    fn test_fence_without_tag_keeps_payload() {
        assert_eq!(clean_ai_response("```true```").unwrap(), json!(true));
        assert_eq!(clean_ai_response("```123\n```").unwrap(), json!(123));
        assert_eq!(clean_ai_response("```[1]```").unwrap(), json!([1]));
        assert_eq!(
            clean_ai_response("```json {\"a\":1}```").unwrap(),
            json!({ "a": 1 })
        );
    }

    #[test]
    fn test_malformed_is_error() {
        let err = clean_ai_response("```json\n{\"a\":\n```").unwrap_err();
        assert!(err.to_string().starts_with("AI response is not valid JSON"));

        assert!(clean_ai_response("").is_err());
        assert!(clean_ai_response("Sure! Here is your plan.").is_err());
    }

    #[test]
    fn test_endpoint_segments() {
        let url = endpoint("http://127.0.0.1:9000/", &["v1", "projects", "p", "accounts:update"])
            .unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:9000/v1/projects/p/accounts:update");

        let url = endpoint("https://example.com", &["documents", "users", "a/b c"]).unwrap();
        assert_eq!(url.path(), "/documents/users/a%2Fb%20c");
    }

    #[test]
    fn test_endpoint_invalid_base() {
        assert!(matches!(
            endpoint("not a url", &["v1"]),
            Err(StoreError::Endpoint(_))
        ));
        assert!(matches!(
            endpoint("mailto:coach@example.com", &["v1"]),
            Err(StoreError::Endpoint(_))
        ));
    }
}
