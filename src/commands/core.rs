//! Command traits.
//!
//! - [`Command`] is what `main` executes.
//! - [`CommandWithOutput`] is implemented by the lifecycle commands, they return a result instead
//!   of printing it.
//!
//! [`CommandWithOutputExt::with_print_to_stdout`] connects the two by printing the result in the
//! requested [`Format`].
use anyhow::Result;
use async_trait::async_trait;

use crate::formatting::{Format, Formattable};

#[async_trait]
pub trait Command {
    async fn execute(&mut self) -> Result<()>;
}

#[async_trait]
pub trait CommandWithOutput {
    type Output;

    async fn execute(&mut self) -> Result<Self::Output>;
}

pub trait CommandWithOutputExt {
    /// Wrap the command so its result is printed to stdout in `format`.
    fn with_print_to_stdout(self, format: Format) -> Result<Box<dyn Command>>;
}

/// Prints the result of the wrapped command. Progress output of the command goes to stderr,
/// so stdout only ever carries the result.
struct PrintResult<C> {
    command: C,
    format: Format,
}

#[async_trait]
impl<C> Command for PrintResult<C>
where
    C: CommandWithOutput + Send,
    C::Output: Formattable,
{
    async fn execute(&mut self) -> Result<()> {
        let result = self.command.execute().await?;
        println!("{}", result.format(self.format)?);
        Ok(())
    }
}

impl<C> CommandWithOutputExt for C
where
    C: CommandWithOutput + Send + 'static,
    C::Output: Formattable + 'static,
{
    fn with_print_to_stdout(self, format: Format) -> Result<Box<dyn Command>> {
        Ok(Box::new(PrintResult {
            command: self,
            format,
        }))
    }
}
