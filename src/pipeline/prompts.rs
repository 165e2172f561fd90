//! Prompt text sent by the pipelines

use super::extract::BuildTask;

/// Longest code excerpt embedded in review and test prompts
const MAX_EMBEDDED_CODE: usize = 6000;

fn excerpt(code: &str) -> &str {
    if code.len() <= MAX_EMBEDDED_CODE {
        return code;
    }
    let mut end = MAX_EMBEDDED_CODE;
    while !code.is_char_boundary(end) {
        end -= 1;
    }
    &code[..end]
}

pub fn code_prompt(task: &BuildTask) -> String {
    format!(
        "Write code for: {file}\n\n{description}\n\n\
         Formatting requirements:\n\
         - Output only the contents of {file}, nothing else\n\
         - No explanations and no introductions such as \"Here is\"\n\
         - The code must be complete and ready to save as-is",
        file = task.task,
        description = task.description,
    )
}

pub fn review_prompt(file: &str, code: &str) -> String {
    format!(
        "Please review this code for {} and provide feedback. \
         Start your reply with APPROVED if no changes are needed.\n\n```\n{}\n```",
        file,
        excerpt(code)
    )
}

/// Ask the code writer for a corrected version of `file`
pub fn revise_prompt(file: &str, code: &str, feedback: &str) -> String {
    format!(
        "Revise {file} to address this feedback:\n{feedback}\n\n\
         Current contents:\n```\n{code}\n```\n\n\
         Output only the complete corrected contents of {file}, nothing else.",
        file = file,
        feedback = excerpt(feedback),
        code = excerpt(code),
    )
}

/// A review that asks for no changes
pub fn is_approval(review: &str) -> bool {
    let head = review.trim_start().to_uppercase();
    head.starts_with("APPROVED") || head.starts_with("LGTM")
}

pub fn test_prompt(file: &str, test_file: &str, code: &str, review: Option<&str>) -> String {
    let mut prompt = format!(
        "Write comprehensive tests for {} to be saved as {}. \
         Output only the test file contents.\n\n```\n{}\n```",
        file,
        test_file,
        excerpt(code)
    );
    if let Some(review) = review {
        prompt.push_str("\n\nCode review feedback:\n");
        prompt.push_str(excerpt(review));
    }
    prompt
}

pub fn plan_prompt(description: &str, tasks: &[BuildTask]) -> String {
    let files = tasks
        .iter()
        .map(|t| format!("- {}: {}", t.task, t.description))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "Create a build plan in markdown for this project.\n\n\
         PROJECT DESCRIPTION:\n{}\n\nFILES TO BUILD:\n{}\n\n\
         Cover objectives, build order and how the files integrate.",
        description, files
    )
}

pub fn ideation_prompt(description: &str, min_files: usize, max_files: usize) -> String {
    format!(
        r#"Analyze this product idea and break it down into concrete build tasks.

PRODUCT DESCRIPTION:
{description}

Generate {min_files} to {max_files} files that together form a complete, working MVP.
Each task names the file to create (with a subdirectory such as templates/ or static/
when needed) and describes in detail what the file contains and how it integrates
with the other files.

Return ONLY a JSON array in this exact format:
```json
[
  {{"task": "app.py", "description": "Main application ...", "priority": 1, "type": "backend"}},
  {{"task": "templates/index.html", "description": "Landing page ...", "priority": 2, "type": "frontend"}}
]
```"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_prompt_names_file() {
        let prompt = code_prompt(&BuildTask::new("app.py", "A Flask app"));
        assert!(prompt.starts_with("Write code for: app.py\n\nA Flask app"));
    }

    #[test]
    fn test_excerpt_respects_char_boundaries() {
        let code = "é".repeat(MAX_EMBEDDED_CODE);
        let cut = excerpt(&code);
        assert!(cut.len() <= MAX_EMBEDDED_CODE);
        assert!(cut.chars().all(|c| c == 'é'));
    }

    #[test]
    fn test_revise_prompt_and_approval() {
        let prompt = revise_prompt("app.py", "eval(x)", "found 'eval('");
        assert!(prompt.starts_with("Revise app.py to address this feedback:\nfound 'eval('"));
        assert!(prompt.contains("eval(x)"));

        assert!(is_approval("  APPROVED. Clean code."));
        assert!(is_approval("lgtm"));
        assert!(!is_approval("Needs changes: handle errors"));
    }

    #[test]
    fn test_ideation_prompt_bounds() {
        let prompt = ideation_prompt("A todo app", 2, 6);
        assert!(prompt.contains("Generate 2 to 6 files"));
        assert!(prompt.contains(r#"{"task": "app.py""#));
    }
}
