//! Prompt building utilities shared by every prompt author.
//!
//! Each prompt opens with a `<TASK>name</TASK>` line naming the step that
//! produced it. Providers ignore it; logging and test doubles use it to tell
//! prompts apart.

use crate::types::Role;

/// Opening line identifying the step a prompt belongs to
pub fn task_header(task: &str) -> String {
    format!("<TASK>{}</TASK>", task)
}

/// Read the task name back out of a prompt
pub fn task_name(prompt: &str) -> Option<&str> {
    let start = prompt.find("<TASK>")? + "<TASK>".len();
    let end = prompt[start..].find("</TASK>")? + start;
    Some(prompt[start..end].trim())
}

/// Tone guidance for the audience a narrative is written for
pub fn role_instruction(role: Role) -> &'static str {
    match role {
        Role::Executive => {
            "Write for an executive: lead with the business impact, keep it concise, \
             avoid SQL and statistical jargon, end with clear decisions or actions."
        }
        Role::Analyst => {
            "Write for an analyst: be detailed, cite the figures behind every claim, \
             name the tables and filters used, and state caveats explicitly."
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_header_roundtrip() {
        let prompt = format!("{}\n<ROLE>Planner</ROLE>", task_header("planning"));
        assert_eq!(task_name(&prompt), Some("planning"));
        assert_eq!(task_name("no header here"), None);
    }

    #[test]
    fn test_role_instruction_differs() {
        assert!(role_instruction(Role::Executive).contains("concise"));
        assert!(role_instruction(Role::Analyst).contains("detailed"));
    }
}
