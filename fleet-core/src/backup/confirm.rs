//! Operator confirmation for destructive steps.

use std::sync::Mutex;

/// Asks the operator before a destructive change.
pub trait Confirm: Send + Sync {
    /// `true` only on an explicit yes.
    fn confirm(&self, prompt: &str) -> bool;
}

/// Fixed answer, remembering every prompt it was asked.
#[derive(Debug, Default)]
pub struct AutoConfirm {
    answer: bool,
    prompts: Mutex<Vec<String>>,
}

impl AutoConfirm {
    pub fn yes() -> Self {
        Self { answer: true, prompts: Mutex::default() }
    }

    pub fn no() -> Self {
        Self { answer: false, prompts: Mutex::default() }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

impl Confirm for AutoConfirm {
    fn confirm(&self, prompt: &str) -> bool {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.to_string());
        }
        self.answer
    }
}
