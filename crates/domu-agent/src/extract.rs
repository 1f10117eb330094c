//! Parse-with-fallback for structured model output.
//!
//! Models asked for JSON frequently wrap it in code fences, prepend prose, or
//! ignore the instruction entirely. Nothing here returns an error: malformed
//! output degrades to [`Intent::Neutral`].

use domu_types::Intent;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct RawIntent {
    #[serde(default, alias = "label", alias = "category")]
    intent: Option<String>,
}

fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop an optional language tag on the opening fence line.
    let body = match rest.find('\n') {
        Some(idx) => &rest[idx + 1..],
        None => rest,
    };
    body.trim_end().trim_end_matches("```").trim()
}

fn parse_object(text: &str) -> Option<RawIntent> {
    if let Ok(parsed) = serde_json::from_str::<RawIntent>(text) {
        return Some(parsed);
    }
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }
    serde_json::from_str::<RawIntent>(&text[start..=end]).ok()
}

/// Extracts an intent from a classification response.
///
/// Accepts the JSON object form or a bare label such as `INTERESTED`.
pub fn intent_from_output(raw: &str) -> Intent {
    let body = strip_code_fence(raw);
    if let Some(parsed) = parse_object(body) {
        return Intent::coerce(parsed.intent.as_deref());
    }
    Intent::from_label(body).unwrap_or_else(|| {
        tracing::warn!(output = %body, "unrecognized intent label; defaulting to NEUTRAL");
        Intent::Neutral
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fenced_json_with_prose_and_alias_is_parsed() {
        let raw = "```json\nAquí está: {\"label\": \"follow_up\"}\n```";
        assert_eq!(intent_from_output(raw), Intent::FollowUp);
    }

    #[test]
    fn unknown_or_malformed_labels_are_neutral() {
        assert_eq!(intent_from_output(r#"{"intent": "CURIOUS"}"#), Intent::Neutral);
        assert_eq!(intent_from_output("{intent: INTERESTED"), Intent::Neutral);
    }

    #[test]
    fn intent_from_bare_label_or_json() {
        assert_eq!(intent_from_output("INTERESTED"), Intent::Interested);
        assert_eq!(intent_from_output("```\n{\"intent\": \"FOLLOW_UP\"}\n```"), Intent::FollowUp);
        assert_eq!(intent_from_output("Creo que está interesado"), Intent::Neutral);
        assert_eq!(intent_from_output(""), Intent::Neutral);
    }
}
