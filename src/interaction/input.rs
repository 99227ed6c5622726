use anyhow::Result;
use inquire::{Confirm, InquireError, Select};

use super::{
    ConfirmationPrompt, ConfirmationPromptOptions, ConfirmationPromptResult, Interaction,
    SelectPrompt, SelectPromptOptions, SelectPromptResult,
};

impl ConfirmationPrompt for Interaction {
    fn confirm(&self, options: ConfirmationPromptOptions) -> Result<ConfirmationPromptResult> {
        let mut prompt = Confirm::new(&options.message);
        if let Some(default) = options.default {
            prompt = prompt.with_default(default);
        }

        if let Some(help_text) = &options.pre_confirmation_help_text {
            eprintln!("{}", help_text);
        }

        match prompt.prompt() {
            Ok(true) => Ok(ConfirmationPromptResult::Yes),
            Ok(false) => Ok(ConfirmationPromptResult::No),
            Err(InquireError::OperationCanceled) => Ok(ConfirmationPromptResult::Canceled),
            Err(InquireError::OperationInterrupted) => Ok(ConfirmationPromptResult::Canceled),
            Err(err) => Err(anyhow::anyhow!("error prompting for confirmation: {}", err)),
        }
    }
}

impl SelectPrompt for Interaction {
    fn select(&self, options: SelectPromptOptions) -> Result<SelectPromptResult> {
        let select = Select::new(&options.message, options.options);

        match select.prompt() {
            Ok(selected) => Ok(SelectPromptResult::Selected(selected)),
            Err(InquireError::OperationCanceled) => Ok(SelectPromptResult::Canceled),
            Err(InquireError::OperationInterrupted) => Ok(SelectPromptResult::Canceled),
            Err(err) => Err(anyhow::anyhow!("error prompting for selection: {}", err)),
        }
    }
}
