//! Tool-call extraction from streamed model text.
//!
//! The model is asked to answer with a bare `{"tool": "...", "args": {...}}`
//! line when it wants a tool, but in practice the object is often wrapped in
//! prose or a code fence. Extraction tolerates both: it tries every `{` in
//! order and returns the first complete JSON object carrying a string
//! `"tool"` key. Nested `args` objects are kept intact.

use fleetpilot_core::tool::ToolCall;
use regex_lite::Regex;
use serde_json::Value;
use std::sync::LazyLock;

/// Cheap pre-check: text without a `"tool":` key never holds a call.
static TOOL_KEY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""tool"\s*:"#).expect("constant tool-key pattern"));

/// Find the first embedded tool call in `text`.
///
/// Returns `None` for plain answers, malformed JSON, or objects whose
/// `tool` value is not a non-empty string.
pub fn extract_tool_call(text: &str) -> Option<ToolCall> {
    if !TOOL_KEY.is_match(text) {
        return None;
    }

    text.match_indices('{')
        .find_map(|(start, _)| parse_object_at(&text[start..]))
}

fn parse_object_at(fragment: &str) -> Option<ToolCall> {
    let value = serde_json::Deserializer::from_str(fragment)
        .into_iter::<Value>()
        .next()?
        .ok()?;

    let object = value.as_object()?;
    let name = object.get("tool")?.as_str()?.trim();
    if name.is_empty() {
        return None;
    }

    let args = object
        .get("args")
        .cloned()
        .unwrap_or_else(|| Value::Object(Default::default()));
    Some(ToolCall::new(name, args))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn bare_call() {
        let call = extract_tool_call(r#"{"tool":"navigate_to","args":{"path":"/devices"}}"#).unwrap();
        assert_eq!(call.name, "navigate_to");
        assert_eq!(call.args, json!({"path": "/devices"}));
    }

    #[test]
    fn call_surrounded_by_prose_and_fence() {
        let text = "Sure, let me open that page.\n```json\n{\"tool\": \"navigate_to\", \"args\": {\"path\": \"/alerts\"}}\n```\nOne moment.";
        let call = extract_tool_call(text).unwrap();
        assert_eq!(call.name, "navigate_to");
        assert_eq!(call.args["path"], "/alerts");
    }

    #[test]
    fn nested_args_are_not_truncated() {
        let text = r#"{"tool":"search_devices","args":{"keyword":"lamp","filter":{"status":"online","tags":["a","b"]}}}"#;
        let call = extract_tool_call(text).unwrap();
        assert_eq!(call.args["filter"]["tags"][1], "b");
    }

    #[test]
    fn missing_args_default_to_empty_object() {
        let call = extract_tool_call(r#"{"tool":"fleet_statistics"}"#).unwrap();
        assert_eq!(call.args, json!({}));
    }

    #[test]
    fn key_order_does_not_matter() {
        let call = extract_tool_call(r#"{"args":{"x":1},"tool":"echo"}"#).unwrap();
        assert_eq!(call.name, "echo");
        assert_eq!(call.args["x"], 1);
    }

    #[test]
    fn plain_answer_has_no_call() {
        assert!(extract_tool_call("Done, I navigated you.").is_none());
        assert!(extract_tool_call("The config looks like {\"path\": \"/x\"}").is_none());
    }

    #[test]
    fn tool_key_check_allows_spacing() {
        assert!(TOOL_KEY.is_match(r#"{"tool" :  "x"}"#));
        assert!(!TOOL_KEY.is_match(r#"{"tools": ["x"]}"#));
        let call = extract_tool_call("{\"tool\"\n: \"fleet_statistics\"}").unwrap();
        assert_eq!(call.name, "fleet_statistics");
    }

    #[test]
    fn malformed_json_is_not_a_call() {
        assert!(extract_tool_call(r#"{"tool":"navigate_to","args":{"path":"/devices"}"#).is_none());
        assert!(extract_tool_call(r#"{"tool": navigate_to}"#).is_none());
    }

    #[test]
    fn non_string_tool_is_not_a_call() {
        assert!(extract_tool_call(r#"{"tool": 42, "args": {}}"#).is_none());
        assert!(extract_tool_call(r#"{"tool": "  ", "args": {}}"#).is_none());
    }

    #[test]
    fn first_call_wins() {
        let text = r#"{"tool":"a","args":{}} then {"tool":"b","args":{}}"#;
        assert_eq!(extract_tool_call(text).unwrap().name, "a");
    }
}
