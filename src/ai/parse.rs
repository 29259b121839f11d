// src/ai/parse.rs

//! Turning the model's free-form reply into typed results.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use super::GeneratedQuestion;
use crate::{error::AppError, models::attempt::MarkResult};

static CODE_FENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```(?:json|JSON)?\s*(.*?)\s*```").expect("code fence pattern compiles")
});

/// Finds the JSON object in a reply, tolerating code fences and chatter
/// around it.
pub fn extract_json_object(content: &str) -> Result<serde_json::Map<String, Value>, AppError> {
    let trimmed = content.trim();
    let candidate = CODE_FENCE
        .captures(trimmed)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
        .unwrap_or(trimmed);

    let object_text = match (candidate.find('{'), candidate.rfind('}')) {
        (Some(start), Some(end)) if end > start => &candidate[start..=end],
        _ => {
            return Err(AppError::Upstream(
                "The AI reply did not contain a JSON object".to_string(),
            ));
        }
    };

    match serde_json::from_str::<Value>(object_text) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(AppError::Upstream(
            "The AI reply was not a JSON object".to_string(),
        )),
        Err(e) => Err(AppError::Upstream(format!(
            "The AI reply was not valid JSON: {}",
            e
        ))),
    }
}

fn as_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f.round() as i64)),
        Value::String(s) => {
            let s = s.trim();
            let leading = s.split(['/', ' ']).next().unwrap_or(s);
            leading
                .parse::<i64>()
                .ok()
                .or_else(|| leading.parse::<f64>().ok().map(|f| f.round() as i64))
        }
        _ => None,
    }
}

fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()).filter(|s| !s.is_empty()),
        Value::Array(items) => {
            let lines: Vec<String> = items.iter().filter_map(as_text).collect();
            if lines.is_empty() {
                None
            } else {
                Some(lines.join("\n"))
            }
        }
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

fn first<'a>(map: &'a serde_json::Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|k| map.get(*k))
}

/// Parses a marking reply. Awarded marks are clamped to `0..=max_marks`.
pub fn parse_mark(content: &str, max_marks: i32) -> Result<MarkResult, AppError> {
    let map = extract_json_object(content)?;

    let marks = first(&map, &["marks_awarded", "marks", "score"])
        .and_then(as_integer)
        .ok_or_else(|| AppError::Upstream("The AI reply did not include a mark".to_string()))?;
    let max = i64::from(max_marks.max(0));

    let summary = first(&map, &["summary", "feedback"])
        .and_then(as_text)
        .unwrap_or_default();

    let feedback_points = match first(&map, &["feedback_points", "points"]) {
        Some(Value::Array(items)) => items.iter().filter_map(as_text).collect(),
        Some(other) => as_text(other).into_iter().collect(),
        None => Vec::new(),
    };

    Ok(MarkResult {
        marks_awarded: marks.clamp(0, max) as i32,
        max_marks,
        summary,
        feedback_points,
    })
}

/// Parses a generation reply. The teacher's requested marks are kept.
pub fn parse_generated(
    content: &str,
    fallback_title: &str,
    max_marks: i32,
) -> Result<GeneratedQuestion, AppError> {
    let map = extract_json_object(content)?;

    let question_text = first(&map, &["question_text", "question"])
        .and_then(as_text)
        .ok_or_else(|| AppError::Upstream("The AI reply did not include a question".to_string()))?;

    let mark_scheme = first(&map, &["mark_scheme", "markscheme", "scheme"])
        .and_then(as_text)
        .ok_or_else(|| {
            AppError::Upstream("The AI reply did not include a mark scheme".to_string())
        })?;

    let title = first(&map, &["title"])
        .and_then(as_text)
        .map(|t| t.chars().take(120).collect())
        .unwrap_or_else(|| fallback_title.to_string());

    Ok(GeneratedQuestion {
        title,
        question_text,
        mark_scheme,
        max_marks,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_json_reply() {
        let result = parse_mark(
            r#"{"marks_awarded": 2, "summary": "Good use of F=ma.", "feedback_points": ["Resultant force correct", "Missing units"]}"#,
            3,
        )
        .unwrap();
        assert_eq!(result.marks_awarded, 2);
        assert_eq!(result.max_marks, 3);
        assert_eq!(result.summary, "Good use of F=ma.");
        assert_eq!(result.feedback_points.len(), 2);
    }

    #[test]
    fn tolerates_code_fences_and_string_marks() {
        let reply = "Here you go:\n```json\n{\"marks_awarded\": \"2/3\", \"summary\": \"ok\"}\n```";
        let result = parse_mark(reply, 3).unwrap();
        assert_eq!(result.marks_awarded, 2);
        assert!(result.feedback_points.is_empty());
    }

    #[test]
    fn clamps_out_of_range_marks() {
        assert_eq!(parse_mark(r#"{"marks_awarded": 9}"#, 3).unwrap().marks_awarded, 3);
        assert_eq!(parse_mark(r#"{"marks_awarded": -1}"#, 3).unwrap().marks_awarded, 0);
        assert_eq!(parse_mark(r#"{"score": 1.6}"#, 3).unwrap().marks_awarded, 2);
    }

    #[test]
    fn missing_mark_is_an_upstream_error() {
        assert!(matches!(
            parse_mark(r#"{"summary": "no mark"}"#, 3),
            Err(AppError::Upstream(_))
        ));
        assert!(matches!(parse_mark("I cannot mark this.", 3), Err(AppError::Upstream(_))));
    }

    #[test]
    fn generated_question_accepts_list_mark_scheme() {
        let reply = r#"{"title": "Forces", "question_text": "A 5 kg box...", "mark_scheme": ["Resultant = 16 N", "a = 3.2 m/s^2"], "max_marks": 7}"#;
        let generated = parse_generated(reply, "Physics: Forces", 2).unwrap();
        assert_eq!(generated.title, "Forces");
        assert_eq!(generated.mark_scheme, "Resultant = 16 N\na = 3.2 m/s^2");
        assert_eq!(generated.max_marks, 2);
    }

    #[test]
    fn generated_question_falls_back_to_topic_title() {
        let reply = r#"{"question_text": "Q", "mark_scheme": "M"}"#;
        assert_eq!(parse_generated(reply, "Physics: Waves", 1).unwrap().title, "Physics: Waves");
        assert!(parse_generated(r#"{"mark_scheme": "M"}"#, "t", 1).is_err());
    }
}
