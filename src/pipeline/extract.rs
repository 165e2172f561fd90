//! Pulling file bodies and task lists out of model output
//!
//! Models wrap code in markdown fences and prose no matter how firmly they
//! are told not to; these helpers recover the useful part.

use std::path::Path;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::core::{FrameworkError, FrameworkResult};

/// One file to generate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildTask {
    /// Output path relative to the build directory
    #[serde(alias = "file")]
    pub task: String,

    /// What the file must contain
    #[serde(default)]
    pub description: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<u32>,

    /// Free-form category ("backend", "frontend")
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

impl BuildTask {
    pub fn new(task: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            task: task.into(),
            description: description.into(),
            priority: None,
            kind: None,
        }
    }
}

// ============================================================================
// Code extraction
// ============================================================================

struct FencedBlock<'a> {
    lang: String,
    lines: Vec<&'a str>,
}

/// Fence language tags that match a file's extension
fn language_tags(file_name: &str) -> &'static [&'static str] {
    let ext = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();

    match ext.as_str() {
        "py" => &["python", "py"],
        "html" | "htm" => &["html"],
        "js" | "mjs" => &["javascript", "js"],
        "ts" => &["typescript", "ts"],
        "css" => &["css"],
        "json" => &["json"],
        "rs" => &["rust", "rs"],
        "sh" => &["bash", "sh", "shell", "zsh"],
        "md" => &["markdown", "md"],
        "toml" => &["toml"],
        "yml" | "yaml" => &["yaml", "yml"],
        "sql" => &["sql"],
        _ => &[],
    }
}

fn fenced_blocks(text: &str) -> Vec<FencedBlock<'_>> {
    let mut blocks = Vec::new();
    let mut current: Option<FencedBlock<'_>> = None;

    for line in text.lines() {
        let trimmed = line.trim();
        if let Some(tag) = trimmed.strip_prefix("```") {
            match current.take() {
                Some(block) => {
                    if !block.lines.is_empty() {
                        blocks.push(block);
                    }
                }
                None => {
                    current = Some(FencedBlock {
                        lang: tag.trim().to_ascii_lowercase(),
                        lines: Vec::new(),
                    })
                }
            }
            continue;
        }
        if let Some(block) = current.as_mut() {
            block.lines.push(line);
        }
    }

    // unterminated trailing fence
    if let Some(block) = current {
        if !block.lines.is_empty() {
            blocks.push(block);
        }
    }
    blocks
}

/// Extract the body of `file_name` from a completion
///
/// Picks the first fenced block whose language matches the file extension,
/// otherwise the longest fenced block, otherwise the text unchanged.
pub fn extract_code(file_name: &str, text: &str) -> String {
    if !text.contains("```") {
        return text.to_string();
    }

    let blocks = fenced_blocks(text);
    let tags = language_tags(file_name);

    let selected = blocks
        .iter()
        .find(|b| tags.iter().any(|tag| b.lang.split_whitespace().next() == Some(*tag)))
        .or_else(|| {
            blocks
                .iter()
                .max_by_key(|b| b.lines.iter().map(|l| l.len() + 1).sum::<usize>())
        });

    match selected {
        Some(block) => block.lines.join("\n"),
        None => text.to_string(),
    }
}

// ============================================================================
// Task list parsing
// ============================================================================

fn parse_array(json: &str) -> Option<Vec<BuildTask>> {
    serde_json::from_str::<Vec<BuildTask>>(json).ok()
}

/// Parse the JSON task list returned by the ideation agent
///
/// Tries, in order: a ```json fenced array, the outermost bracketed span,
/// and the same span with trailing commas removed. Entries with an empty
/// file name are dropped.
pub fn parse_task_list(text: &str) -> FrameworkResult<Vec<BuildTask>> {
    let fenced = Regex::new(r"(?s)```json\s*(\[.*?\])\s*```")
        .map_err(|e| FrameworkError::other(e.to_string()))?;
    let trailing_comma =
        Regex::new(r",\s*([}\]])").map_err(|e| FrameworkError::other(e.to_string()))?;

    let from_fence = fenced
        .captures(text)
        .and_then(|c| c.get(1))
        .and_then(|m| parse_array(m.as_str()));

    let tasks = match from_fence {
        Some(tasks) => tasks,
        None => {
            let (Some(start), Some(end)) = (text.find('['), text.rfind(']')) else {
                return Err(FrameworkError::other("no JSON array found in task list response"));
            };
            if end < start {
                return Err(FrameworkError::other("no JSON array found in task list response"));
            }
            let span = &text[start..=end];

            match parse_array(span) {
                Some(tasks) => tasks,
                None => {
                    let cleaned = trailing_comma.replace_all(span, "$1");
                    serde_json::from_str::<Vec<BuildTask>>(&cleaned).map_err(|e| {
                        FrameworkError::other(format!("could not parse task list: {}", e))
                    })?
                }
            }
        }
    };

    Ok(tasks
        .into_iter()
        .filter(|t| !t.task.trim().is_empty())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_unchanged() {
        let text = "from flask import Flask\napp = Flask(__name__)\n";
        assert_eq!(extract_code("app.py", text), text);
    }

    #[test]
    fn test_prefers_matching_language() {
        let text = "Here is the app:\n\
                    ```bash\npip install flask flask-cors requests\n```\n\
                    ```python\nprint('hi')\n```\n";
        assert_eq!(extract_code("app.py", text), "print('hi')");
    }

    #[test]
    fn test_falls_back_to_longest_block() {
        let text = "```\nshort\n```\nand\n```text\na much longer block\nwith two lines\n```";
        assert_eq!(
            extract_code("notes.txt", text),
            "a much longer block\nwith two lines"
        );
    }

    #[test]
    fn test_unterminated_fence() {
        let text = "```html\n<!DOCTYPE html>\n<html></html>";
        assert_eq!(
            extract_code("templates/index.html", text),
            "<!DOCTYPE html>\n<html></html>"
        );
    }

    #[test]
    fn test_parse_fenced_task_list() {
        let text = r#"Sure.
```json
[
  {"task": "app.py", "description": "Flask app", "priority": 1, "type": "backend"},
  {"task": "templates/index.html", "description": "Landing page"}
]
```"#;
        let tasks = parse_task_list(text).unwrap();
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].task, "app.py");
        assert_eq!(tasks[0].kind.as_deref(), Some("backend"));
        assert_eq!(tasks[1].priority, None);
    }

    #[test]
    fn test_parse_bare_array_with_file_alias() {
        let text = r#"The files are [{"file": "main.rs", "description": "entry point"}] as requested."#;
        let tasks = parse_task_list(text).unwrap();
        assert_eq!(tasks, vec![BuildTask::new("main.rs", "entry point")]);
    }

    #[test]
    fn test_salvages_trailing_commas() {
        let text = r#"[
            {"task": "app.py", "description": "api",},
            {"task": "static/app.js", "description": "ui", },
        ]"#;
        let tasks = parse_task_list(text).unwrap();
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[1].task, "static/app.js");
    }

    #[test]
    fn test_unparseable() {
        assert!(parse_task_list("I cannot help with that.").is_err());
        assert!(parse_task_list("] backwards [").is_err());
        assert!(parse_task_list("[{\"description\": \"no file\"}]").is_err());
    }

    #[test]
    fn test_empty_names_dropped() {
        let tasks = parse_task_list(r#"[{"task": " "}, {"task": "a.py"}]"#).unwrap();
        assert_eq!(tasks.len(), 1);
    }
}
