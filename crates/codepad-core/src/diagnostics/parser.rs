//! Turns a free-form model reply into a `DiagnosticRecord`.
//!
//! Replies are asked to follow a labelled layout (`EXPLANATION:`, `CAUSE:`,
//! `ERROR_LINE:`, `ERROR_COLUMN:`, `SUGGESTIONS:`, `FIXED_CODE:`). Models drift
//! from it, so every section is optional and the parser never fails: a reply
//! with no recognizable structure becomes a truncated explanation plus one
//! generic suggestion.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::core_types::DiagnosticRecord;

pub const EMPTY_SUGGESTIONS_FALLBACK: &str = "Check the code structure and syntax";
pub const UNSTRUCTURED_FALLBACK: &str = "Review the AI feedback above";
pub const MANUAL_FIX_SENTINEL: &str = "manual fix required";
pub const MAX_UNSTRUCTURED_CHARS: usize = 500;

const EXPLANATION_STOPS: &[&str] = &["CAUSE:", "ERROR_LINE:", "SUGGESTIONS:", "FIXED_CODE:"];
const CAUSE_STOPS: &[&str] = &["ERROR_LINE:", "SUGGESTIONS:", "FIXED_CODE:"];

static EXPLANATION_LABEL: Lazy<Regex> = Lazy::new(|| label("EXPLANATION:"));
static CAUSE_LABEL: Lazy<Regex> = Lazy::new(|| label("CAUSE:"));
static ERROR_LINE: Lazy<Regex> = Lazy::new(|| number_field("ERROR_LINE"));
static ERROR_COLUMN: Lazy<Regex> = Lazy::new(|| number_field("ERROR_COLUMN"));
static SUGGESTIONS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)SUGGESTIONS:\s*(.*?)(?:FIXED_CODE:|$)").expect("suggestions pattern is valid")
});
static NUMBERED: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d+\.").expect("numbered pattern is valid"));
static BULLET_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[\s-]*[-\d.]+\s*").expect("bullet pattern is valid"));
static FIXED_CODE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)FIXED_CODE:\s*```\w*\s*(.*?)```").expect("fixed code pattern is valid")
});

fn label(name: &str) -> Regex {
    Regex::new(&format!("(?i){}", regex::escape(name))).expect("label pattern is valid")
}

fn number_field(name: &str) -> Regex {
    Regex::new(&format!(r"(?i){}:\s*(\d+)", name)).expect("number pattern is valid")
}

pub fn parse_response(text: &str) -> DiagnosticRecord {
    let mut record = DiagnosticRecord {
        success: true,
        raw_response: text.to_string(),
        ..Default::default()
    };

    record.explanation = section(text, &EXPLANATION_LABEL, EXPLANATION_STOPS).unwrap_or_default();
    record.cause = section(text, &CAUSE_LABEL, CAUSE_STOPS).unwrap_or_default();
    record.error_line = positive_number(text, &ERROR_LINE);
    record.error_column = positive_number(text, &ERROR_COLUMN);

    if let Some(block) = SUGGESTIONS.captures(text).and_then(|c| c.get(1)) {
        let suggestions = bullet_items(block.as_str());
        record.suggestions = if suggestions.is_empty() {
            vec![EMPTY_SUGGESTIONS_FALLBACK.to_string()]
        } else {
            suggestions
        };
    }

    if let Some(code) = FIXED_CODE.captures(text).and_then(|c| c.get(1)) {
        let code = code.as_str().trim();
        if !code.is_empty() && !code.to_lowercase().contains(MANUAL_FIX_SENTINEL) {
            record.fixed_code = Some(code.to_string());
        }
    }

    if record.explanation.is_empty() && record.suggestions.is_empty() {
        log::debug!("Model reply had no recognizable sections, using it verbatim");
        record.explanation = text.chars().take(MAX_UNSTRUCTURED_CHARS).collect();
        record.suggestions = vec![UNSTRUCTURED_FALLBACK.to_string()];
    }

    record
}

/// Text after a label: the first non-blank line, then every following line
/// up to a blank line or a line opening with one of `stops`.
fn section(text: &str, label: &Regex, stops: &[&str]) -> Option<String> {
    for found in label.find_iter(text) {
        let body = text[found.end()..].trim_start();
        if body.is_empty() {
            continue;
        }

        let mut lines = body.split('\n');
        let mut kept = Vec::new();
        if let Some(first) = lines.next() {
            kept.push(first);
        }
        for line in lines {
            if line.is_empty() || starts_with_any(line, stops) {
                break;
            }
            kept.push(line);
        }
        return Some(kept.join("\n").trim().to_string());
    }
    None
}

fn starts_with_any(line: &str, labels: &[&str]) -> bool {
    labels.iter().any(|label| {
        line.get(..label.len())
            .map_or(false, |head| head.eq_ignore_ascii_case(label))
    })
}

fn positive_number(text: &str, pattern: &Regex) -> Option<u32> {
    pattern
        .captures(text)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse::<u32>().ok())
        .filter(|n| *n > 0)
}

/// Lines that open with a dash or `N.`, with that prefix removed.
fn bullet_items(block: &str) -> Vec<String> {
    block
        .split('\n')
        .filter(|line| {
            let line = line.trim();
            line.starts_with('-') || NUMBERED.is_match(line)
        })
        .map(|line| BULLET_PREFIX.replace(line, "").trim().to_string())
        .filter(|item| !item.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEMPLATE_REPLY: &str = "EXPLANATION: You called a method on undefined.
The variable was never assigned.
CAUSE: `user` is declared but not initialized.
ERROR_LINE: 12
ERROR_COLUMN: 4
SUGGESTIONS:
- Initialize `user` before use
- Add a guard clause
1. Prefer const for values that never change
FIXED_CODE:
```javascript
const user = { name: 'Ada' };
console.log(user.name);
```";

    #[test]
    fn test_full_template_reply() {
        let record = parse_response(TEMPLATE_REPLY);

        assert!(record.success);
        assert_eq!(
            record.explanation,
            "You called a method on undefined.\nThe variable was never assigned."
        );
        assert_eq!(record.cause, "`user` is declared but not initialized.");
        assert_eq!(record.error_line, Some(12));
        assert_eq!(record.error_column, Some(4));
        assert_eq!(
            record.suggestions,
            vec![
                "Initialize `user` before use",
                "Add a guard clause",
                "Prefer const for values that never change",
            ]
        );
        assert_eq!(
            record.fixed_code.as_deref(),
            Some("const user = { name: 'Ada' };\nconsole.log(user.name);")
        );
        assert_eq!(record.raw_response, TEMPLATE_REPLY);
    }

    #[test]
    fn test_unstructured_reply_is_truncated() {
        let reply = "x".repeat(800);
        let record = parse_response(&reply);

        assert!(record.success);
        assert_eq!(record.explanation.chars().count(), MAX_UNSTRUCTURED_CHARS);
        assert_eq!(record.suggestions, vec![UNSTRUCTURED_FALLBACK]);
        assert!(record.fixed_code.is_none());
        assert!(record.error_line.is_none());
    }

    #[test]
    fn test_short_unstructured_reply_is_kept_whole() {
        let record = parse_response("Looks fine to me.");
        assert_eq!(record.explanation, "Looks fine to me.");
        assert_eq!(record.suggestions.len(), 1);
    }

    #[test]
    fn test_zero_location_is_unset() {
        let record = parse_response("EXPLANATION: unknown spot\nERROR_LINE: 0\nERROR_COLUMN: none");
        assert_eq!(record.explanation, "unknown spot");
        assert!(record.error_line.is_none());
        assert!(record.error_column.is_none());
    }

    #[test]
    fn test_manual_fix_sentinel_is_ignored() {
        let reply = "EXPLANATION: hard one\nFIXED_CODE:\n```python\nManual Fix Required\n```";
        assert!(parse_response(reply).fixed_code.is_none());
    }

    #[test]
    fn test_empty_suggestion_block_gets_fallback() {
        let reply = "EXPLANATION: ok\nSUGGESTIONS:\nnothing bulleted here\nFIXED_CODE:\n```\nx\n```";
        let record = parse_response(reply);
        assert_eq!(record.suggestions, vec![EMPTY_SUGGESTIONS_FALLBACK]);
        assert_eq!(record.fixed_code.as_deref(), Some("x"));
    }

    #[test]
    fn test_labels_are_case_insensitive() {
        let reply = "explanation:   \n  Spread over a line break\ncause: typo\nsuggestions:\n  - Fix the typo\n-   \n";
        let record = parse_response(reply);
        assert_eq!(record.explanation, "Spread over a line break");
        assert_eq!(record.cause, "typo");
        assert_eq!(record.suggestions, vec!["Fix the typo"]);
    }

    #[test]
    fn test_explanation_stops_at_blank_line() {
        let record = parse_response("EXPLANATION: first\nsecond\n\nthird");
        assert_eq!(record.explanation, "first\nsecond");
    }

    #[test]
    fn test_review_reply_without_cause() {
        let reply = "EXPLANATION: Prints a greeting.\nSUGGESTIONS:\n- No issues found!";
        let record = parse_response(reply);
        assert_eq!(record.explanation, "Prints a greeting.");
        assert!(record.cause.is_empty());
        assert_eq!(record.suggestions, vec!["No issues found!"]);
    }
}
