//! Prompt templates. Each one pins the reply layout that `parser` reads.

use crate::core_types::GuestLanguage;

fn fenced(source: &str, language: &GuestLanguage) -> String {
    format!("```{}\n{}\n```", language.id(), source)
}

pub fn error_analysis(source: &str, language: &GuestLanguage, error_text: &str) -> String {
    format!(
        "You are an expert programming tutor specializing in {name}. A student has encountered an error while running their code.

Code:
{code}

Error Message:
{error}

Please analyze this error and provide:
1. A clear, beginner-friendly explanation of what went wrong
2. The root cause of the error
3. Step-by-step instructions to fix it
4. Best practices to avoid similar errors
5. If possible, the corrected code

Format your response EXACTLY as follows:
EXPLANATION: [Your clear explanation in 2-3 sentences]
CAUSE: [Root cause in 1-2 sentences]
ERROR_LINE: [Line number where error occurred, or 0 if unknown]
ERROR_COLUMN: [Column number where error occurred, or 0 if unknown]
SUGGESTIONS:
- [Fix step 1]
- [Fix step 2]
- [Fix step 3]
- [Best practice tip]
FIXED_CODE:
```{tag}
[If you can provide a corrected version of the code, put it here. Otherwise write \"Manual fix required\"]
```

Keep it concise and educational. Focus on helping beginners understand and learn.",
        name = language.display_name(),
        code = fenced(source, language),
        error = error_text,
        tag = language.id(),
    )
}

pub fn review(source: &str, language: &GuestLanguage) -> String {
    format!(
        "You are an expert {name} code reviewer. Analyze the following code for potential issues BEFORE execution.

Code:
{code}

Check for:
1. Syntax errors or potential runtime errors
2. Logical issues that might cause unexpected behavior
3. Common mistakes beginners make
4. Security concerns or bad practices

If the code looks good, provide positive feedback and explain what the code does.

Format your response EXACTLY as follows:
EXPLANATION: [Your assessment of the code]
SUGGESTIONS:
- [Suggestion 1 or \"No issues found!\"]
- [Suggestion 2]
- [Suggestion 3]

Keep it educational and encouraging.",
        name = language.display_name(),
        code = fenced(source, language),
    )
}

pub fn optimization(source: &str, language: &GuestLanguage) -> String {
    format!(
        "You are an expert {name} developer. Analyze the following code and provide optimization suggestions.

Code:
{code}

Provide:
1. Performance improvements
2. Code quality enhancements
3. Best practices recommendations
4. Potential bug prevention

Format your response as:
EXPLANATION: [Brief overview of the code quality]
SUGGESTIONS:
- [Suggestion 1]
- [Suggestion 2]
- [Suggestion 3]",
        name = language.display_name(),
        code = fenced(source, language),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_prompt_carries_code_error_and_layout() {
        let prompt = error_analysis("print(x)", &GuestLanguage::Python, "NameError: name 'x' is not defined");
        assert!(prompt.contains("specializing in Python"));
        assert!(prompt.contains("```python\nprint(x)\n```"));
        assert!(prompt.contains("Error Message:\nNameError: name 'x' is not defined"));
        for label in ["EXPLANATION:", "CAUSE:", "ERROR_LINE:", "ERROR_COLUMN:", "SUGGESTIONS:", "FIXED_CODE:"] {
            assert!(prompt.contains(label), "missing {}", label);
        }
        assert!(prompt.contains("Manual fix required"));
    }

    #[test]
    fn test_review_prompt_has_no_error_sections() {
        let prompt = review("<p>hi</p>", &GuestLanguage::Html);
        assert!(prompt.contains("```html\n<p>hi</p>\n```"));
        assert!(!prompt.contains("CAUSE:"));
        assert!(!prompt.contains("FIXED_CODE:"));
    }
}
