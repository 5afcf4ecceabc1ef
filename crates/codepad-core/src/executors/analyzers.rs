//! Non-executing analyzers for the structural languages.
//!
//! Each analyzer is a pure function from source text to a report; none of
//! them touch an engine. Only structurally invalid input produces a failed
//! outcome.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use super::Executor;
use crate::core_types::{GuestLanguage, RunOutcome};
use crate::errors::ExecutorError;

const JSON_HINT: &str =
    "Check your JSON syntax - ensure all quotes are double quotes and no trailing commas.";

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

static HTML_TAG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)<!--.*?-->|<(/?)([A-Za-z][A-Za-z0-9-]*)(?:\s[^>]*)?>")
        .expect("html tag pattern is valid")
});

static JSON_POSITION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r" at line \d+ column \d+$").expect("json position pattern is valid"));

/// Executor wrapper around one of the analyzer functions.
pub struct StaticAnalyzer {
    language: GuestLanguage,
    analyze: fn(&str) -> RunOutcome,
}

impl StaticAnalyzer {
    pub fn html() -> Self {
        Self {
            language: GuestLanguage::Html,
            analyze: analyze_html,
        }
    }

    pub fn css() -> Self {
        Self {
            language: GuestLanguage::Css,
            analyze: analyze_css,
        }
    }

    pub fn json() -> Self {
        Self {
            language: GuestLanguage::Json,
            analyze: analyze_json,
        }
    }

    pub fn markdown() -> Self {
        Self {
            language: GuestLanguage::Markdown,
            analyze: preview_markdown,
        }
    }
}

#[async_trait]
impl Executor for StaticAnalyzer {
    fn language(&self) -> GuestLanguage {
        self.language.clone()
    }

    async fn run(&self, source: &str) -> Result<RunOutcome, ExecutorError> {
        Ok((self.analyze)(source))
    }
}

fn line_count(source: &str) -> usize {
    source.split('\n').count()
}

fn line_of(source: &str, offset: usize) -> usize {
    source[..offset].matches('\n').count() + 1
}

pub fn analyze_html(source: &str) -> RunOutcome {
    if source.trim().is_empty() {
        return RunOutcome::success("No HTML code provided.");
    }
    let lower = source.to_ascii_lowercase();
    let presence = |found: bool, missing: &str| {
        if found {
            "present".to_string()
        } else {
            missing.to_string()
        }
    };

    let report = format!(
        "HTML processed successfully.\n\n\
         Analysis:\n\
         - Document type: {}\n\
         - HTML tag: {}\n\
         - Body tag: {}\n\
         - Tag balance: {}\n\
         - Lines of code: {}\n\n\
         This HTML would render in a browser.",
        presence(lower.contains("<!doctype"), "missing DOCTYPE"),
        presence(lower.contains("<html"), "missing <html>"),
        presence(lower.contains("<body"), "missing <body>"),
        tag_balance(source),
        line_count(source),
    );
    RunOutcome::success(report)
}

/// Describe the first nesting problem, ignoring void elements and the
/// contents of `<script>` and `<style>`.
fn tag_balance(source: &str) -> String {
    let mut open: Vec<(String, usize)> = Vec::new();
    let mut skip_until = 0;

    for captures in HTML_TAG.captures_iter(source) {
        let Some(whole) = captures.get(0) else { continue };
        if whole.start() < skip_until {
            continue;
        }
        let Some(name) = captures.get(2) else {
            // comment
            continue;
        };
        let name = name.as_str().to_ascii_lowercase();
        let closing = captures.get(1).map_or(false, |m| !m.as_str().is_empty());

        if closing {
            match open.iter().rposition(|(tag, _)| *tag == name) {
                Some(index) if index == open.len() - 1 => {
                    open.pop();
                }
                Some(index) => {
                    let (tag, offset) = &open[index + 1];
                    return format!("unclosed <{}> (line {})", tag, line_of(source, *offset));
                }
                None => {
                    return format!(
                        "unexpected </{}> (line {})",
                        name,
                        line_of(source, whole.start())
                    )
                }
            }
            continue;
        }

        if whole.as_str().ends_with("/>") || VOID_ELEMENTS.contains(&name.as_str()) {
            continue;
        }
        if name == "script" || name == "style" {
            let closer = format!("</{}", name);
            match source[whole.end()..].to_ascii_lowercase().find(&closer) {
                Some(relative) => skip_until = whole.end() + relative,
                None => {
                    return format!("unclosed <{}> (line {})", name, line_of(source, whole.start()))
                }
            }
        }
        open.push((name, whole.start()));
    }

    match open.first() {
        Some((tag, offset)) => format!("unclosed <{}> (line {})", tag, line_of(source, *offset)),
        None => "balanced".to_string(),
    }
}

pub fn analyze_css(source: &str) -> RunOutcome {
    if source.trim().is_empty() {
        return RunOutcome::success("No CSS code provided.");
    }
    if !(source.contains('{') && source.contains('}')) {
        return RunOutcome::failure("Invalid CSS: Missing braces { }");
    }

    let mut depth = 0i64;
    let mut rules = 0usize;
    let mut chars = source.char_indices().peekable();
    while let Some((offset, c)) = chars.next() {
        match c {
            '/' if chars.peek().map(|(_, next)| *next) == Some('*') => {
                chars.next();
                let mut previous = ' ';
                for (_, inner) in chars.by_ref() {
                    if previous == '*' && inner == '/' {
                        break;
                    }
                    previous = inner;
                }
            }
            '"' | '\'' => {
                let mut escaped = false;
                for (_, inner) in chars.by_ref() {
                    if escaped {
                        escaped = false;
                    } else if inner == '\\' {
                        escaped = true;
                    } else if inner == c || inner == '\n' {
                        break;
                    }
                }
            }
            '{' => {
                depth += 1;
                rules += 1;
            }
            '}' => {
                depth -= 1;
                if depth < 0 {
                    return RunOutcome::failure(format!(
                        "Invalid CSS: Unbalanced braces (unexpected '}}' on line {})",
                        line_of(source, offset)
                    ));
                }
            }
            _ => {}
        }
    }
    if depth > 0 {
        return RunOutcome::failure(format!(
            "Invalid CSS: Unbalanced braces ({} unclosed '{{')",
            depth
        ));
    }

    RunOutcome::success(format!(
        "CSS formatted successfully.\n\n\
         Rule blocks: {}\n\
         Lines of CSS: {}\n\n\
         This CSS can be applied to HTML elements to style your webpage.",
        rules,
        line_count(source)
    ))
}

pub fn analyze_json(source: &str) -> RunOutcome {
    let value: Value = match serde_json::from_str(source) {
        Ok(value) => value,
        Err(e) => {
            let message = e.to_string();
            let message = JSON_POSITION.replace(&message, "");
            return RunOutcome::failure(format!("JSON Error: {}\n\n{}", message, JSON_HINT));
        }
    };
    let pretty = match serde_json::to_string_pretty(&value) {
        Ok(pretty) => pretty,
        Err(e) => return RunOutcome::failure(format!("JSON Error: {}", e)),
    };

    let summary = match &value {
        Value::Object(map) => format!("Object contains {} root properties.", map.len()),
        Value::Array(items) => format!("Array contains {} elements.", items.len()),
        Value::String(_) => "Root value is a string.".to_string(),
        Value::Number(_) => "Root value is a number.".to_string(),
        Value::Bool(_) => "Root value is a boolean.".to_string(),
        Value::Null => "Root value is null.".to_string(),
    };
    RunOutcome::success(format!(
        "JSON formatted successfully.\n\nFormatted JSON:\n{}\n\n{}",
        pretty, summary
    ))
}

pub fn preview_markdown(source: &str) -> RunOutcome {
    if source.trim().is_empty() {
        return RunOutcome::success("No Markdown content provided.");
    }
    let mut options = comrak::Options::default();
    options.extension.table = true;
    options.extension.strikethrough = true;
    options.extension.autolink = true;
    let html = comrak::markdown_to_html(source, &options);
    RunOutcome::success(format!("Markdown Preview:\n\n{}", html))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_html_report() {
        let source = "<!DOCTYPE html>\n<html>\n<body>\n  <p>Hi<br></p>\n  <!-- <div> -->\n</body>\n</html>";
        let outcome = analyze_html(source);
        assert!(!outcome.failed);
        assert!(outcome.output.contains("- Document type: present"));
        assert!(outcome.output.contains("- Tag balance: balanced"));
        assert!(outcome.output.contains("- Lines of code: 7"));
    }

    #[test]
    fn test_html_problems_are_reported_not_failed() {
        let outcome = analyze_html("<div>\n  <span>text\n</div>");
        assert!(!outcome.failed);
        assert!(outcome.output.contains("- Tag balance: unclosed <span> (line 2)"));
        assert!(outcome.output.contains("- Document type: missing DOCTYPE"));

        let outcome = analyze_html("<p>ok</p>\n</section>");
        assert!(outcome.output.contains("unexpected </section> (line 2)"));
    }

    #[test]
    fn test_html_script_contents_are_ignored() {
        let outcome = analyze_html("<script>if (a < b && c > d) { x = '<div>'; }</script>");
        assert!(outcome.output.contains("- Tag balance: balanced"));
    }

    #[test]
    fn test_empty_inputs_are_not_failures() {
        assert_eq!(analyze_html("  \n"), RunOutcome::success("No HTML code provided."));
        assert_eq!(analyze_css(""), RunOutcome::success("No CSS code provided."));
        assert_eq!(
            preview_markdown("\n"),
            RunOutcome::success("No Markdown content provided.")
        );
    }

    #[test]
    fn test_css_validation() {
        assert_eq!(
            analyze_css("body color: red;"),
            RunOutcome::failure("Invalid CSS: Missing braces { }")
        );
        assert_eq!(
            analyze_css("a { color: red; }\n}"),
            RunOutcome::failure("Invalid CSS: Unbalanced braces (unexpected '}' on line 2)")
        );
        assert_eq!(
            analyze_css("@media print { a { color: red; }"),
            RunOutcome::failure("Invalid CSS: Unbalanced braces (1 unclosed '{')")
        );

        let outcome = analyze_css("/* { */\na::before { content: \"}\"; }\nb { margin: 0 }");
        assert!(!outcome.failed);
        assert!(outcome.output.contains("Rule blocks: 2"));
        assert!(outcome.output.contains("Lines of CSS: 3"));
    }

    #[test]
    fn test_json_pretty_print_round_trips() {
        let source = r#"{"name":"codepad","tags":["a","b"],"nested":{"z":1,"a":null}}"#;
        let outcome = analyze_json(source);
        assert!(!outcome.failed);
        assert!(outcome.output.contains("Object contains 3 root properties."));

        let pretty = outcome
            .output
            .split("Formatted JSON:\n")
            .nth(1)
            .and_then(|rest| rest.split("\n\nObject contains").next())
            .unwrap();
        assert!(pretty.starts_with("{\n  \"name\": \"codepad\""));
        // Key order is preserved
        assert!(pretty.find("\"z\"").unwrap() < pretty.find("\"a\": null").unwrap());
        let reparsed: Value = serde_json::from_str(pretty).unwrap();
        assert_eq!(reparsed, serde_json::from_str::<Value>(source).unwrap());
    }

    #[test]
    fn test_json_scalar_and_array_summaries() {
        assert!(analyze_json("[1, 2, 3]").output.ends_with("Array contains 3 elements."));
        assert!(analyze_json("\"hi\"").output.ends_with("Root value is a string."));
        assert!(analyze_json("null").output.ends_with("Root value is null."));
    }

    #[test]
    fn test_json_error_has_no_position() {
        let outcome = analyze_json("{\"a\": 1,}");
        assert!(outcome.failed);
        assert!(outcome.output.starts_with("JSON Error: trailing comma"));
        assert!(!outcome.output.contains("line"));
        assert!(outcome.output.ends_with(JSON_HINT));
    }

    #[test]
    fn test_markdown_preview() {
        let outcome = preview_markdown("# Title\n\nSome **bold** and ~~gone~~ text.\n\n| a | b |\n|---|---|\n| 1 | 2 |\n");
        assert!(!outcome.failed);
        assert!(outcome.output.starts_with("Markdown Preview:\n\n<h1>Title</h1>"));
        assert!(outcome.output.contains("<strong>bold</strong>"));
        assert!(outcome.output.contains("<del>gone</del>"));
        assert!(outcome.output.contains("<table>"));
    }

    #[tokio::test]
    async fn test_analyzer_as_executor() {
        let analyzer = StaticAnalyzer::json();
        assert_eq!(analyzer.language(), GuestLanguage::Json);
        let outcome = analyzer.run("{").await.unwrap();
        assert!(outcome.failed);
    }
}
