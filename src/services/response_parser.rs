//! 模型输出解析
//!
//! 把模型返回的文本解析成 JSON 对象，并转换为调用方需要的类型。
//! 只处理位于开头的 ```` ```json ```` 代码块，中间出现的代码块原样保留。

use std::sync::LazyLock;

use regex::Regex;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;

use crate::error::{AppError, AppResult};

static JSON_FENCE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?s)\A```json(.*?)```").ok());

/// 去掉开头的 ```` ```json ... ``` ```` 包裹；不匹配时原样返回
pub fn strip_json_fence(text: &str) -> &str {
    JSON_FENCE
        .as_ref()
        .and_then(|re| re.captures(text))
        .and_then(|caps| caps.get(1))
        .map_or(text, |m| m.as_str())
}

/// 解析为 JSON 对象
///
/// 不是合法 JSON 或顶层不是对象时返回 `MalformedModelOutput`，并携带原文。
pub fn parse_json_object(text: &str) -> AppResult<JsonValue> {
    let body = strip_json_fence(text).trim();
    let value: JsonValue =
        serde_json::from_str(body).map_err(|e| AppError::malformed_output(text, e))?;

    if !value.is_object() {
        return Err(AppError::malformed_output(text, "顶层不是 JSON 对象"));
    }
    Ok(value)
}

/// 检查必需字段后转换为目标类型
///
/// 缺字段返回 `MissingField`；字段类型不符返回 `MalformedModelOutput`。
pub fn extract_fields<T: DeserializeOwned>(value: JsonValue, required: &[&str]) -> AppResult<T> {
    let Some(obj) = value.as_object() else {
        return Err(AppError::malformed_output(value.to_string(), "顶层不是 JSON 对象"));
    };

    if let Some(missing) = required.iter().find(|field| !obj.contains_key(**field)) {
        return Err(AppError::missing_field(*missing));
    }

    let text = value.to_string();
    serde_json::from_value(value).map_err(|e| AppError::malformed_output(text, e))
}

/// 文本 → 目标类型
pub fn parse_model_output<T: DeserializeOwned>(text: &str, required: &[&str]) -> AppResult<T> {
    extract_fields(parse_json_object(text)?, required)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ParseError;
    use crate::models::{GenreSubjects, WritingEvaluation};

    const GENRE_FIELDS: &[&str] = &["genre", "subjects"];
    const EVALUATION_FIELDS: &[&str] = &[
        "overall_score",
        "rubric_scores",
        "feedback_student",
        "feedback_parent",
        "improved_text",
    ];

    #[test]
    fn test_strip_leading_fence() {
        assert_eq!(strip_json_fence("```json\n{\"a\":1}\n```"), "\n{\"a\":1}\n");
        assert_eq!(strip_json_fence("{\"a\":1}"), "{\"a\":1}");
    }

    #[test]
    fn test_fence_not_at_start_is_kept() {
        let text = "Here you go: ```json{\"a\":1}```";
        assert_eq!(strip_json_fence(text), text);
        assert!(matches!(
            parse_json_object(text),
            Err(AppError::Parse(ParseError::MalformedModelOutput { .. }))
        ));
    }

    #[test]
    fn test_parse_genre_subjects_fenced_and_plain() {
        let plain = r#"{"genre":"Personal narrative","subjects":["School life","Playtime"]}"#;
        let fenced = format!("```json\n{}\n```", plain);

        for text in [plain.to_string(), fenced] {
            let parsed: GenreSubjects = parse_model_output(&text, GENRE_FIELDS).unwrap();
            assert_eq!(parsed.genre, "Personal narrative");
            assert_eq!(parsed.subjects, vec!["School life", "Playtime"]);
        }
    }

    #[test]
    fn test_parse_evaluation() {
        let text = r#"{"overall_score":8,"rubric_scores":[{"dimension":"Language Use","criteria":[{"criterion":"Vocabulary","score":8,"reason":"Good words"}]}],"feedback_student":"Well done!","feedback_parent":"Strong progress.","improved_text":"Today I had a Mandarin lesson."}"#;

        let parsed: WritingEvaluation = parse_model_output(text, EVALUATION_FIELDS).unwrap();
        assert_eq!(parsed.overall_score, 8);
        assert_eq!(parsed.rubric_scores[0].criteria[0].criterion, "Vocabulary");
        assert_eq!(parsed.feedback_parent, "Strong progress.");
    }

    #[test]
    fn test_missing_field_is_named() {
        let text = r#"{"overall_score":8,"rubric_scores":[],"feedback_student":"","improved_text":""}"#;
        let err = parse_model_output::<WritingEvaluation>(text, EVALUATION_FIELDS).unwrap_err();

        match err {
            AppError::Parse(ParseError::MissingField { field }) => {
                assert_eq!(field, "feedback_parent")
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_malformed_output_keeps_text() {
        let err = parse_model_output::<GenreSubjects>("not json at all", GENRE_FIELDS).unwrap_err();
        match err {
            AppError::Parse(ParseError::MalformedModelOutput { text, .. }) => {
                assert_eq!(text, "not json at all")
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_wrong_type_is_malformed() {
        let text = r#"{"genre":"Poem","subjects":"nature"}"#;
        assert!(matches!(
            parse_model_output::<GenreSubjects>(text, GENRE_FIELDS),
            Err(AppError::Parse(ParseError::MalformedModelOutput { .. }))
        ));
    }
}
