//! Interactive prompts via `dialoguer`.
//!
//! Every prompt refuses to run without a terminal on stdin, so scripted use
//! gets an error instead of a hang.

use std::io::IsTerminal;

use dialoguer::{theme::ColorfulTheme, Confirm, Input};

use crate::errors::{DrivemanError, Result};

/// Whether stdin and stderr are both attached to a terminal.
pub fn is_interactive() -> bool {
    std::io::stdin().is_terminal() && std::io::stderr().is_terminal()
}

fn require_terminal(what: &str) -> Result<()> {
    if is_interactive() {
        Ok(())
    } else {
        Err(DrivemanError::Validation(format!(
            "{what} needs an interactive terminal"
        )))
    }
}

/// Yes/no prompt. `None` when the user dismisses it (Esc / Ctrl-C).
pub fn confirm(prompt: &str, default: bool) -> Result<Option<bool>> {
    require_terminal("Confirmation")?;
    Confirm::with_theme(&ColorfulTheme::default())
        .with_prompt(prompt)
        .default(default)
        .interact_opt()
        .map_err(|e| DrivemanError::Application(format!("Confirm prompt error: {e}")))
}

/// Single-line text prompt. Empty answers are re-asked.
pub fn text_input(prompt: &str) -> Result<String> {
    require_terminal("Input")?;
    Input::<String>::with_theme(&ColorfulTheme::default())
        .with_prompt(prompt)
        .interact_text()
        .map_err(|e| DrivemanError::Application(format!("Text input error: {e}")))
}

/// Resolve a destructive action: `assume_yes` skips the prompt, a dismissed
/// prompt counts as "no".
pub fn confirm_or_assume(prompt: &str, assume_yes: bool) -> Result<bool> {
    if assume_yes {
        return Ok(true);
    }
    Ok(confirm(prompt, false)?.unwrap_or(false))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assume_yes_skips_prompt() {
        assert!(confirm_or_assume("Delete?", true).unwrap());
    }

    #[test]
    fn test_prompts_refuse_without_terminal() {
        // cargo test captures stdout/stderr, so this only runs detached.
        if is_interactive() {
            return;
        }
        assert!(matches!(
            confirm("Delete?", false),
            Err(DrivemanError::Validation(_))
        ));
        assert!(text_input("Code").is_err());
        assert!(confirm_or_assume("Delete?", false).is_err());
    }
}
