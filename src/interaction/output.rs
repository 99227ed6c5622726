use std::fmt::Display;

use console::style;

use super::{Interaction, Output};
use crate::models::{Message, MessageType};

/// Highlight the name of an app, org, space, user or file in progress output.
pub fn entity_name(name: impl Display) -> String {
    style(name).cyan().bold().to_string()
}

impl Output for Interaction {
    fn say(&self, message: &str) {
        eprintln!("{message}");
    }

    fn ok(&self) {
        eprintln!("{}", style("OK").green().bold());
    }

    fn warn(&self, message: &str) {
        eprintln!("{}", style(message).yellow());
    }

    fn failed(&self, message: &str) {
        eprintln!("{}", style("FAILED").red().bold());
        eprintln!("{message}");
    }

    fn message(&self, message: &Message) {
        match message.message_type {
            MessageType::Error => eprintln!("{}", style(&message.text).red()),
            MessageType::Warning => eprintln!("{}", style(&message.text).yellow()),
            MessageType::Info => eprintln!("{}", message.text),
            // Internal messages of the deploy service
            MessageType::Ext | MessageType::TaskStartup | MessageType::Unknown => {}
        }
    }

    fn is_interactive(&self) -> bool {
        console::user_attended_stderr()
    }
}
