//! Plain-text rendering of results for the terminal.

use codepad_core::{DiagnosticRecord, GuestLanguage};

pub fn diagnostic(record: &DiagnosticRecord, path: Option<&str>) -> String {
    if !record.success {
        let mut text = format!("Diagnostics unavailable: {}", record.explanation);
        if let Some(error) = &record.error {
            text.push_str(&format!("\n  ({})", error));
        }
        return text;
    }

    let mut sections = vec![format!("What happened:\n{}", indent(&record.explanation))];

    if !record.cause.is_empty() {
        sections.push(format!("Root cause:\n{}", indent(&record.cause)));
    }

    if !record.suggestions.is_empty() {
        let steps = record
            .suggestions
            .iter()
            .enumerate()
            .map(|(i, s)| format!("  {}. {}", i + 1, s))
            .collect::<Vec<_>>()
            .join("\n");
        sections.push(format!("How to fix:\n{}", steps));
    }

    if let Some(location) = location(record, path.unwrap_or("<input>")) {
        sections.push(format!("Location: {}", location));
    }

    if let Some(code) = &record.fixed_code {
        sections.push(format!("Fixed code:\n{}", code));
    }

    sections.join("\n\n")
}

/// `path:line[:column]`, the form editors and terminals turn into links.
pub fn location(record: &DiagnosticRecord, path: &str) -> Option<String> {
    let line = record.error_line?;
    Some(match record.error_column {
        Some(column) => format!("{}:{}:{}", path, line, column),
        None => format!("{}:{}", path, line),
    })
}

pub fn languages() -> String {
    GuestLanguage::SUPPORTED
        .iter()
        .map(|language| {
            let mode = match language {
                GuestLanguage::JavaScript | GuestLanguage::TypeScript | GuestLanguage::Python => {
                    "runs"
                }
                _ => "analyzed",
            };
            format!("{:<12} {:<10} {}", language.display_name(), language.id(), mode)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn indent(text: &str) -> String {
    text.lines()
        .map(|line| format!("  {}", line))
        .collect::<Vec<_>>()
        .join("\n")
}
