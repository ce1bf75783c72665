//! Coerce a loosely structured model reply into typed nutrition records.
//!
//! Models wrap JSON in markdown fences, prepend prose, or return one object where
//! an array was asked for. Extraction tries, in order: the whole (unfenced) text,
//! the first balanced `[...]` that parses, then the first balanced `{...}`. Surviving records
//! must carry a non-empty `name` and four JSON numbers; anything else is dropped.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::models::NewFoodEntry;

/// A food recognised by the model, not yet confirmed by the user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NutritionCandidate {
    pub name: String,
    pub calories: f64,
    pub carbs: f64,
    pub protein: f64,
    pub fat: f64,
}

impl NutritionCandidate {
    /// The entry to log once the user accepts this candidate. The model's calorie
    /// figure is kept as-is rather than re-derived from macros.
    #[must_use]
    pub fn into_new_entry(self) -> NewFoodEntry {
        NewFoodEntry {
            name: self.name,
            calories: self.calories,
            carbs: self.carbs,
            protein: self.protein,
            fat: self.fat,
        }
    }
}

pub fn parse_candidates(raw: &str) -> Result<Vec<NutritionCandidate>> {
    let cleaned = strip_code_fences(raw);
    let value = extract_json(&cleaned).ok_or(Error::MalformedResponse)?;

    let records = match value {
        Value::Array(items) => items,
        other => vec![other],
    };
    let total = records.len();
    let candidates: Vec<NutritionCandidate> =
        records.iter().filter_map(candidate_from_value).collect();

    if candidates.len() < total {
        tracing::debug!(
            dropped = total - candidates.len(),
            kept = candidates.len(),
            "discarded incomplete nutrition records"
        );
    }
    if candidates.is_empty() {
        return Err(Error::IncompleteData);
    }
    Ok(candidates)
}

/// Remove every ```` ```json ```` and ```` ``` ```` marker and trim.
#[must_use]
pub fn strip_code_fences(raw: &str) -> String {
    raw.replace("```json", "").replace("```", "").trim().to_string()
}

fn extract_json(text: &str) -> Option<Value> {
    if let Ok(value) = serde_json::from_str::<Value>(text) {
        return Some(value);
    }
    tracing::debug!("model reply is not bare JSON, scanning for an array");

    // Prose may hold bracketed asides like "[approx]" ahead of the real array
    for (start, _) in text.match_indices('[') {
        let Some(slice) = extract_balanced(&text[start..], '[', ']') else {
            continue;
        };
        if let Ok(value @ Value::Array(_)) = serde_json::from_str::<Value>(slice) {
            return Some(value);
        }
    }
    tracing::debug!("no parseable array in model reply, scanning for an object");

    extract_balanced(text, '{', '}')
        .and_then(|slice| serde_json::from_str::<Value>(slice).ok())
        .filter(Value::is_object)
        .map(|object| Value::Array(vec![object]))
}

/// The first `open ... close` span whose delimiters balance, ignoring any that
/// appear inside JSON string literals.
#[must_use]
pub fn extract_balanced(text: &str, open: char, close: char) -> Option<&str> {
    let start = text.find(open)?;
    let body = &text[start..];

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escape_next = false;

    for (i, ch) in body.char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }
        match ch {
            '\\' if in_string => escape_next = true,
            '"' => in_string = !in_string,
            c if c == open && !in_string => depth += 1,
            c if c == close && !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(&body[..=i]);
                }
            }
            _ => {}
        }
    }
    None
}

fn candidate_from_value(value: &Value) -> Option<NutritionCandidate> {
    let object = value.as_object()?;
    let name = object.get("name")?.as_str()?.trim();
    if name.is_empty() {
        return None;
    }
    let number = |key: &str| object.get(key).and_then(Value::as_f64);
    Some(NutritionCandidate {
        name: name.to_string(),
        calories: number("calories")?,
        carbs: number("carbs")?,
        protein: number("protein")?,
        fat: number("fat")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn apple() -> NutritionCandidate {
        NutritionCandidate {
            name: "Apple".to_string(),
            calories: 95.0,
            carbs: 25.0,
            protein: 0.0,
            fat: 0.0,
        }
    }

    #[test]
    fn test_fenced_array() {
        let raw = "```json\n[{\"name\":\"Apple\",\"calories\":95,\"carbs\":25,\"protein\":0,\"fat\":0}]\n```";
        assert_eq!(parse_candidates(raw).unwrap(), vec![apple()]);
    }

    #[test]
    fn test_bare_object_is_wrapped() {
        let raw = r#"{"name":"Apple","calories":95,"carbs":25,"protein":0,"fat":0}"#;
        assert_eq!(parse_candidates(raw).unwrap(), vec![apple()]);
    }

    #[test]
    fn test_not_json_at_all() {
        assert!(matches!(
            parse_candidates("not json at all"),
            Err(Error::MalformedResponse)
        ));
        assert!(matches!(parse_candidates(""), Err(Error::MalformedResponse)));
    }

    #[test]
    fn test_missing_numbers_is_incomplete() {
        assert!(matches!(
            parse_candidates(r#"[{"name":"X"}]"#),
            Err(Error::IncompleteData)
        ));
    }

    #[test]
    fn test_array_inside_prose() {
        let raw = "Sure! Here is the breakdown:\n[{\"name\":\"Rice\",\"calories\":200,\"carbs\":44,\"protein\":4,\"fat\":0.5},\n {\"name\":\"Egg\",\"calories\":78,\"carbs\":0.6,\"protein\":6,\"fat\":5}]\nEnjoy your meal.";
        let parsed = parse_candidates(raw).unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].name, "Rice");
        assert!((parsed[1].fat - 5.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_array_after_bracketed_aside() {
        let raw = "Estimates [approx]:\n[{\"name\":\"Rice\",\"calories\":200,\"carbs\":44,\"protein\":4,\"fat\":0.5},{\"name\":\"Egg\",\"calories\":78,\"carbs\":0.6,\"protein\":6,\"fat\":5}]";
        let parsed = parse_candidates(raw).unwrap();
        let names: Vec<&str> = parsed.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["Rice", "Egg"]);
    }

    #[test]
    fn test_unclosed_bracket_before_array() {
        let raw = "Note [see below\n[{\"name\":\"Tea\",\"calories\":2,\"carbs\":0,\"protein\":0,\"fat\":0}]";
        let parsed = parse_candidates(raw).unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].name, "Tea");
    }

    #[test]
    fn test_object_inside_prose() {
        let raw = "I think this is: {\"name\":\"Apple\",\"calories\":95,\"carbs\":25,\"protein\":0,\"fat\":0} (approx.)";
        assert_eq!(parse_candidates(raw).unwrap(), vec![apple()]);
    }

    #[test]
    fn test_brackets_inside_strings_do_not_end_the_span() {
        let raw = r#"Result: [{"name":"Salad [large] \"house\"","calories":150,"carbs":10,"protein":3,"fat":11}] done]"#;
        let parsed = parse_candidates(raw).unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].name, "Salad [large] \"house\"");
    }

    #[test]
    fn test_invalid_records_dropped() {
        let raw = r#"[
            {"name":"Apple","calories":95,"carbs":25,"protein":0,"fat":0},
            {"name":"","calories":1,"carbs":1,"protein":1,"fat":1},
            {"name":"Cola","calories":"140","carbs":39,"protein":0,"fat":0},
            {"calories":1,"carbs":1,"protein":1,"fat":1},
            42
        ]"#;
        assert_eq!(parse_candidates(raw).unwrap(), vec![apple()]);
    }

    #[test]
    fn test_zero_calorie_drink_kept() {
        let raw = r#"[{"name":"Water","calories":0,"carbs":0,"protein":0,"fat":0}]"#;
        let parsed = parse_candidates(raw).unwrap();
        assert_eq!(parsed[0].name, "Water");
        assert!(parsed[0].calories.abs() < f64::EPSILON);
    }

    #[test]
    fn test_scalar_json_is_incomplete() {
        assert!(matches!(parse_candidates("42"), Err(Error::IncompleteData)));
        assert!(matches!(parse_candidates("[]"), Err(Error::IncompleteData)));
    }

    #[test]
    fn test_extract_balanced() {
        assert_eq!(extract_balanced("a [1, [2]] b ]", '[', ']'), Some("[1, [2]]"));
        assert_eq!(extract_balanced("no brackets", '[', ']'), None);
        assert_eq!(extract_balanced("[unclosed", '[', ']'), None);
        assert_eq!(
            extract_balanced(r#"{"a":"}"} tail}"#, '{', '}'),
            Some(r#"{"a":"}"}"#)
        );
    }

    #[test]
    fn test_strip_code_fences() {
        assert_eq!(strip_code_fences("```json\n[1]\n```"), "[1]");
        assert_eq!(strip_code_fences("  ```\n{}\n```  "), "{}");
    }

    #[test]
    fn test_into_new_entry_keeps_model_calories() {
        let entry = NutritionCandidate {
            calories: 100.0,
            ..apple()
        }
        .into_new_entry();
        assert_eq!(entry.name, "Apple");
        assert!((entry.calories - 100.0).abs() < f64::EPSILON);
    }
}
