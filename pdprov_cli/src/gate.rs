//! Confirmation gates for the command line

use crate::terminal;
use dialoguer::Confirm;
use pdprov_core::{AutoConfirm, ConfirmationGate, PromptGate};
use std::sync::Arc;

/// Asks on the terminal with a yes/no prompt
pub struct DialoguerGate;

impl ConfirmationGate for DialoguerGate {
    fn confirm(&self, prompt: &str) -> bool {
        match Confirm::new().with_prompt(prompt).default(false).interact() {
            Ok(answer) => answer,
            Err(e) => {
                log::warn!("Could not read confirmation, treating it as declined: {e}");
                false
            }
        }
    }
}

/// Pick the gate for this invocation
///
/// `--yes` accepts everything. Without a terminal the answers are read from
/// stdin line by line, and end of input declines.
pub fn select_gate(assume_yes: bool) -> Arc<dyn ConfirmationGate> {
    if assume_yes {
        log::debug!("Confirmations accepted by --yes");
        Arc::new(AutoConfirm::accept())
    } else if terminal::can_prompt() {
        Arc::new(DialoguerGate)
    } else {
        log::debug!("No terminal for prompts, reading answers from stdin");
        Arc::new(PromptGate::stdio())
    }
}
