//! Everything that talks to the operator: confirmations, action selection, spinners and progress output.
//!
//! Progress output goes to stderr so the command result printed on stdout stays machine-readable.
use anyhow::Result;
use typed_builder::TypedBuilder;

use crate::models::Message;

mod input;
mod output;
mod spinner;

pub use output::entity_name;

#[derive(Debug, Default, Clone)]
pub struct Interaction;

impl Interaction {
    pub fn new() -> Self {
        Default::default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, TypedBuilder)]
pub struct ConfirmationPromptOptions {
    #[builder(setter(into))]
    pub message: String,
    #[builder(default, setter(strip_option))]
    pub default: Option<bool>,
    #[builder(default, setter(strip_option, into))]
    pub pre_confirmation_help_text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmationPromptResult {
    Yes,
    No,
    Canceled,
}

pub trait ConfirmationPrompt {
    fn confirm(&self, options: ConfirmationPromptOptions) -> Result<ConfirmationPromptResult>;
}

#[derive(Debug, PartialEq, Eq, TypedBuilder)]
pub struct SelectPromptOptions {
    #[builder(setter(transform = |s: impl Into<String>| s.into()))]
    pub message: String,
    #[builder(setter(transform = |items: impl IntoIterator<Item = impl Into<String>>| {
        items.into_iter().map(|s| s.into()).collect()
    }))]
    pub options: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectPromptResult {
    Selected(String),
    Canceled,
}

pub trait SelectPrompt {
    fn select(&self, options: SelectPromptOptions) -> Result<SelectPromptResult>;
}

pub struct SpinnerHandle {
    stop_spinner: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl SpinnerHandle {
    pub fn new(stop_spinner: Box<dyn FnOnce() + Send + Sync>) -> Self {
        Self {
            stop_spinner: Some(stop_spinner),
        }
    }
}

impl Drop for SpinnerHandle {
    fn drop(&mut self) {
        if let Some(stop_spinner) = self.stop_spinner.take() {
            stop_spinner();
        }
    }
}

pub trait SpinnerInteraction {
    fn start_spinner(&self, message: String) -> Result<SpinnerHandle>;
}

/// Line-oriented progress output.
pub trait Output {
    fn say(&self, message: &str);

    /// Marks the previous step as successful.
    fn ok(&self);

    fn warn(&self, message: &str);

    fn failed(&self, message: &str);

    /// Prints a progress message of a remote operation according to its severity.
    fn message(&self, message: &Message);

    /// Whether an operator is available to answer prompts.
    fn is_interactive(&self) -> bool;
}

/// All interactions the deploy and undeploy commands need.
pub trait Terminal:
    ConfirmationPrompt + SelectPrompt + SpinnerInteraction + Output + Send + Sync
{
}
impl<T: ConfirmationPrompt + SelectPrompt + SpinnerInteraction + Output + Send + Sync> Terminal
    for T
{
}

#[cfg(test)]
pub mod mocks {
    use super::*;
    use mockall::mock;

    mock! {
        pub Interaction {}

        impl ConfirmationPrompt for Interaction {
            fn confirm(&self, options: ConfirmationPromptOptions) -> Result<ConfirmationPromptResult>;
        }

        impl SelectPrompt for Interaction {
            fn select(&self, options: SelectPromptOptions) -> Result<SelectPromptResult>;
        }

        impl SpinnerInteraction for Interaction {
            fn start_spinner(&self, message: String) -> Result<SpinnerHandle>;
        }

        impl Output for Interaction {
            fn say(&self, message: &str);
            fn ok(&self);
            fn warn(&self, message: &str);
            fn failed(&self, message: &str);
            fn message(&self, message: &Message);
            fn is_interactive(&self) -> bool;
        }
    }

    /// A mock that accepts any progress output and spinner, for tests that only care about the remote calls.
    pub fn quiet_interaction() -> MockInteraction {
        let mut interaction = MockInteraction::new();
        interaction.expect_say().return_const(());
        interaction.expect_ok().return_const(());
        interaction.expect_warn().return_const(());
        interaction.expect_failed().return_const(());
        interaction.expect_message().return_const(());
        interaction
            .expect_start_spinner()
            .returning(|_| Ok(SpinnerHandle::new(Box::new(|| {}))));
        interaction
    }
}
