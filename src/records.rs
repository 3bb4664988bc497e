//! Record filter for JSONL session logs.
//!
//! Each log line is one event. Only `user` and `assistant` events carry
//! conversation; everything else (`system`, `progress`,
//! `file-history-snapshot`, `queue-operation`, and unknown tags) is dropped.
//!
//! Message content is either a plain string or a list of typed blocks.
//! Text blocks are kept (minus injected `<system-reminder>` spans), while
//! tool invocations and tool results are reduced to one-line summaries so
//! large payloads never reach the embedder.

use serde::Deserialize;
use serde_json::Value;

use crate::models::{Message, Role};

/// Input keys worth keeping when summarizing a tool invocation.
const TOOL_INPUT_KEYS: &[&str] = &["command", "query", "pattern", "file_path", "prompt", "url"];
const TOOL_INPUT_VALUE_CHARS: usize = 100;
const TOOL_RESULT_CHARS: usize = 150;
const TOOL_RESULT_BLOCK_CHARS: usize = 100;
/// Messages shorter than this (after trimming) carry no useful signal.
const MIN_MESSAGE_CHARS: usize = 5;

const REMINDER_OPEN: &str = "<system-reminder>";
const REMINDER_CLOSE: &str = "</system-reminder>";

/// The `type` tag of a raw log record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    User,
    Assistant,
    System,
    Progress,
    FileHistorySnapshot,
    QueueOperation,
    Other,
}

impl RecordKind {
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "user" => RecordKind::User,
            "assistant" => RecordKind::Assistant,
            "system" => RecordKind::System,
            "progress" => RecordKind::Progress,
            "file-history-snapshot" => RecordKind::FileHistorySnapshot,
            "queue-operation" => RecordKind::QueueOperation,
            _ => RecordKind::Other,
        }
    }

    /// Whether records of this kind can contribute conversation text.
    pub fn is_conversational(&self) -> bool {
        matches!(self, RecordKind::User | RecordKind::Assistant)
    }
}

/// One block of a list-shaped message body.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text {
        #[serde(default)]
        text: String,
    },
    ToolUse {
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        input: Value,
    },
    ToolResult {
        #[serde(default)]
        content: Value,
    },
    #[serde(other)]
    Other,
}

/// Result of filtering one session log.
#[derive(Debug, Default)]
pub struct ParsedSession {
    /// Content-bearing messages, in log order.
    pub messages: Vec<Message>,
    /// Non-empty lines that were not valid JSON objects.
    pub malformed_lines: usize,
    /// Well-formed records dropped by the filter.
    pub dropped_records: usize,
}

/// Parse and filter the full text of a JSONL session log.
///
/// Malformed lines are skipped and counted; they never fail the file.
pub fn parse_session(content: &str) -> ParsedSession {
    let mut parsed = ParsedSession::default();

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let record: Value = match serde_json::from_str(line) {
            Ok(v @ Value::Object(_)) => v,
            _ => {
                parsed.malformed_lines += 1;
                continue;
            }
        };

        match filter_record(&record) {
            Some(message) => parsed.messages.push(message),
            None => parsed.dropped_records += 1,
        }
    }

    parsed
}

/// Classify a single record and extract its message, if it carries one.
pub fn filter_record(record: &Value) -> Option<Message> {
    let kind = RecordKind::from_tag(record.get("type").and_then(Value::as_str).unwrap_or(""));
    if !kind.is_conversational() {
        return None;
    }

    let (role_tag, content) = match record.get("message") {
        Some(message) => (
            message
                .get("role")
                .and_then(Value::as_str)
                .unwrap_or(if kind == RecordKind::User { "user" } else { "assistant" }),
            message.get("content")?,
        ),
        None => (
            if kind == RecordKind::User { "user" } else { "assistant" },
            record.get("content")?,
        ),
    };

    let role = match role_tag {
        "user" => Role::User,
        "assistant" => Role::Assistant,
        _ => return None,
    };

    let text = extract_text(content);
    if text.trim().chars().count() < MIN_MESSAGE_CHARS {
        return None;
    }

    let timestamp = record
        .get("timestamp")
        .and_then(Value::as_str)
        .map(|s| s.to_string());

    Some(Message {
        role,
        text,
        timestamp,
    })
}

/// Flatten a message body into embeddable text.
pub fn extract_text(content: &Value) -> String {
    match content {
        Value::String(s) => strip_system_reminders(s).trim().to_string(),
        Value::Array(items) => {
            let parts: Vec<String> = items
                .iter()
                .filter_map(|item| ContentBlock::deserialize(item).ok())
                .filter_map(render_block)
                .collect();
            parts.join(" ")
        }
        _ => String::new(),
    }
}

fn render_block(block: ContentBlock) -> Option<String> {
    match block {
        ContentBlock::Text { text } => {
            let cleaned = strip_system_reminders(&text);
            let cleaned = cleaned.trim();
            if cleaned.is_empty() {
                None
            } else {
                Some(cleaned.to_string())
            }
        }
        ContentBlock::ToolUse { name, input } => Some(summarize_tool_use(
            name.as_deref().unwrap_or("unknown"),
            &input,
        )),
        ContentBlock::ToolResult { content } => summarize_tool_result(&content),
        ContentBlock::Other => None,
    }
}

/// `[tool: Name(key=value, ...)]` using only the primary input keys.
pub fn summarize_tool_use(name: &str, input: &Value) -> String {
    let mut summary_parts = Vec::new();
    if let Some(obj) = input.as_object() {
        for key in TOOL_INPUT_KEYS {
            if let Some(value) = obj.get(*key) {
                let rendered = match value {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                summary_parts.push(format!(
                    "{}={}",
                    key,
                    truncate_chars(&rendered, TOOL_INPUT_VALUE_CHARS)
                ));
            }
        }
    }
    format!("[tool: {}({})]", name, summary_parts.join(", "))
}

/// `[result: ...]` with at most 150 characters of the result text.
pub fn summarize_tool_result(content: &Value) -> Option<String> {
    let result_text = match content {
        Value::String(s) => truncate_chars(s, TOOL_RESULT_CHARS).to_string(),
        Value::Array(items) => {
            let texts: Vec<&str> = items
                .iter()
                .filter(|item| item.get("type").and_then(Value::as_str) == Some("text"))
                .filter_map(|item| item.get("text").and_then(Value::as_str))
                .map(|t| truncate_chars(t, TOOL_RESULT_BLOCK_CHARS))
                .collect();
            truncate_chars(&texts.join(" "), TOOL_RESULT_CHARS).to_string()
        }
        _ => String::new(),
    };

    if result_text.is_empty() {
        None
    } else {
        Some(format!("[result: {}]", result_text))
    }
}

/// Remove every complete `<system-reminder>...</system-reminder>` span.
pub fn strip_system_reminders(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(start) = rest.find(REMINDER_OPEN) {
        let after_open = &rest[start + REMINDER_OPEN.len()..];
        match after_open.find(REMINDER_CLOSE) {
            Some(end) => {
                out.push_str(&rest[..start]);
                rest = &after_open[end + REMINDER_CLOSE.len()..];
            }
            None => break,
        }
    }

    out.push_str(rest);
    out
}

/// Prefix of `s` holding at most `max` characters.
pub fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_drops_non_conversational_types() {
        for tag in ["system", "progress", "file-history-snapshot", "queue-operation", "summary"] {
            let record = json!({ "type": tag, "content": "long enough content here" });
            assert!(filter_record(&record).is_none(), "{} should be dropped", tag);
        }
    }

    #[test]
    fn test_user_message_nested_format() {
        let record = json!({
            "type": "user",
            "timestamp": "2025-01-01T00:00:00Z",
            "message": { "role": "user", "content": "How do I fix the parser?" }
        });
        let msg = filter_record(&record).unwrap();
        assert_eq!(msg.role, Role::User);
        assert_eq!(msg.text, "How do I fix the parser?");
        assert_eq!(msg.timestamp.as_deref(), Some("2025-01-01T00:00:00Z"));
    }

    #[test]
    fn test_top_level_content_format() {
        let record = json!({ "type": "assistant", "content": "Here is the fix." });
        let msg = filter_record(&record).unwrap();
        assert_eq!(msg.role, Role::Assistant);
        assert_eq!(msg.text, "Here is the fix.");
    }

    #[test]
    fn test_short_messages_dropped() {
        let record = json!({ "type": "user", "message": { "role": "user", "content": "ok" } });
        assert!(filter_record(&record).is_none());
    }

    #[test]
    fn test_tool_use_summarized() {
        let record = json!({
            "type": "assistant",
            "message": {
                "role": "assistant",
                "content": [
                    { "type": "text", "text": "Let me look." },
                    {
                        "type": "tool_use",
                        "name": "Bash",
                        "input": {
                            "command": "cargo test",
                            "description": "run the tests",
                            "blob": "x".repeat(10_000)
                        }
                    }
                ]
            }
        });
        let msg = filter_record(&record).unwrap();
        assert_eq!(msg.text, "Let me look. [tool: Bash(command=cargo test)]");
    }

    #[test]
    fn test_tool_use_input_values_capped() {
        let summary = summarize_tool_use("Read", &json!({ "file_path": "a".repeat(300) }));
        assert_eq!(summary, format!("[tool: Read(file_path={})]", "a".repeat(100)));
    }

    #[test]
    fn test_tool_result_summarized() {
        let long = "r".repeat(400);
        let record = json!({
            "type": "user",
            "message": {
                "role": "user",
                "content": [{ "type": "tool_result", "tool_use_id": "t1", "content": long }]
            }
        });
        let msg = filter_record(&record).unwrap();
        assert_eq!(msg.text, format!("[result: {}]", "r".repeat(150)));
    }

    #[test]
    fn test_tool_result_list_content() {
        let content = json!([
            { "type": "text", "text": "first block" },
            { "type": "image", "source": {} },
            { "type": "text", "text": "second block" }
        ]);
        assert_eq!(
            summarize_tool_result(&content).as_deref(),
            Some("[result: first block second block]")
        );
        assert!(summarize_tool_result(&json!("")).is_none());
    }

    #[test]
    fn test_system_reminder_stripped() {
        let text = "before <system-reminder>secret\nstuff</system-reminder> after";
        assert_eq!(strip_system_reminders(text), "before  after");
        let unclosed = "keep <system-reminder> this";
        assert_eq!(strip_system_reminders(unclosed), unclosed);
    }

    #[test]
    fn test_reminder_only_message_dropped() {
        let record = json!({
            "type": "user",
            "message": {
                "role": "user",
                "content": [{ "type": "text", "text": "<system-reminder>noise</system-reminder>" }]
            }
        });
        assert!(filter_record(&record).is_none());
    }

    #[test]
    fn test_parse_session_skips_malformed_lines() {
        let content = [
            r#"{"type":"user","message":{"role":"user","content":"first question here"}}"#,
            "not json at all",
            "",
            r#"{"type":"progress","data":{}}"#,
            r#"[1, 2, 3]"#,
            r#"{"type":"assistant","message":{"role":"assistant","content":"first answer here"}}"#,
        ]
        .join("\n");
        let parsed = parse_session(&content);
        assert_eq!(parsed.messages.len(), 2);
        assert_eq!(parsed.malformed_lines, 2);
        assert_eq!(parsed.dropped_records, 1);
        assert_eq!(parsed.messages[0].role, Role::User);
        assert_eq!(parsed.messages[1].role, Role::Assistant);
    }

    #[test]
    fn test_truncate_chars_multibyte() {
        assert_eq!(truncate_chars("日本語テキスト", 3), "日本語");
        assert_eq!(truncate_chars("abc", 10), "abc");
    }
}
