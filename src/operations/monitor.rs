//! Follows a remote operation until it reaches a final state.
//!
//! The polling logic is an explicit state machine ([`MonitorStateMachine`]) that is fed with
//! [`MonitorEvent`]s and answers with the next [`MonitorStep`]. The [`ExecutionMonitor`] owns the
//! timer, performs the polls and races every wait against the cancellation signal.
use std::time::Duration;

use anyhow::{Context, Result};
use futures::{
    FutureExt,
    future::{self, BoxFuture},
};
use serde::Serialize;
use tracing::{debug, info, trace, warn};

use crate::{
    dependencies::{ClientError, DeployService},
    errors::DeployError,
    interaction::{
        ConfirmationPromptOptions, ConfirmationPromptResult, SelectPromptOptions,
        SelectPromptResult, Terminal, entity_name,
    },
    models::{Action, Message, MessageType, Operation, OperationState},
    operations::{LifecycleSettings, RetryPolicy},
};

/// How a monitored operation ended, when it ended well.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MonitorOutcome {
    Finished,
    /// Aborted on request of the operator during monitoring.
    Aborted,
}

#[derive(Debug)]
pub enum MonitorEvent {
    Polled(Operation),
    PollFailed(ClientError),
    /// The operator chose an action for an operation waiting for one.
    ActionSubmitted(Action),
    Cancelled,
}

#[derive(Debug)]
pub enum MonitorStep {
    PollAfter(Duration),
    AskForAction(Operation),
    Finish(MonitorOutcome),
    Fail(DeployError),
    /// Cancelled by the operator, the operation itself is left untouched.
    Interrupted,
}

#[derive(Debug)]
pub struct Transition {
    /// Messages not reported before, in sequence order.
    pub new_messages: Vec<Message>,
    pub next: MonitorStep,
}

impl Transition {
    fn to(next: MonitorStep) -> Self {
        Self {
            new_messages: vec![],
            next,
        }
    }
}

/// Pure polling state of one monitored operation.
#[derive(Debug)]
pub struct MonitorStateMachine {
    operation_id: String,
    poll_interval: Duration,
    retry: RetryPolicy,
    interactive: bool,

    last_message_id: Option<i64>,
    last_visible_message: Option<Message>,
    last_error_message: Option<Message>,
    consecutive_failures: u32,
    abort_requested: bool,
    unknown_state_reported: bool,
}

impl MonitorStateMachine {
    pub fn new(
        operation_id: impl Into<String>,
        poll_interval: Duration,
        retry: RetryPolicy,
        interactive: bool,
    ) -> Self {
        Self {
            operation_id: operation_id.into(),
            poll_interval,
            retry,
            interactive,
            last_message_id: None,
            last_visible_message: None,
            last_error_message: None,
            consecutive_failures: 0,
            abort_requested: false,
            unknown_state_reported: false,
        }
    }

    /// Treat every message up to `message_id` as already reported.
    pub fn skip_messages_through(mut self, message_id: Option<i64>) -> Self {
        self.last_message_id = message_id;
        self
    }

    pub fn step(&mut self, event: MonitorEvent) -> Transition {
        match event {
            MonitorEvent::Polled(operation) => self.on_polled(operation),
            MonitorEvent::PollFailed(error) => Transition::to(self.on_poll_failed(error)),
            MonitorEvent::ActionSubmitted(action) => {
                self.abort_requested |= action == Action::Abort;
                Transition::to(MonitorStep::PollAfter(self.poll_interval))
            }
            MonitorEvent::Cancelled => Transition::to(MonitorStep::Interrupted),
        }
    }

    fn on_polled(&mut self, mut operation: Operation) -> Transition {
        self.consecutive_failures = 0;

        let new_messages = self.take_new_messages(&mut operation.messages);

        let next = match operation.state {
            OperationState::Running => MonitorStep::PollAfter(self.poll_interval),
            OperationState::Unknown => {
                if !self.unknown_state_reported {
                    self.unknown_state_reported = true;
                    warn!(
                        operation_id = self.operation_id,
                        "operation reported an unknown state, still polling"
                    );
                }
                MonitorStep::PollAfter(self.poll_interval)
            }
            OperationState::Finished => MonitorStep::Finish(MonitorOutcome::Finished),
            OperationState::Aborted if self.abort_requested => {
                MonitorStep::Finish(MonitorOutcome::Aborted)
            }
            OperationState::Error | OperationState::Aborted => {
                MonitorStep::Fail(DeployError::RemoteProcess {
                    operation_id: self.operation_id.clone(),
                    state: operation.state,
                    message: self.failure_reason(),
                })
            }
            OperationState::ActionRequired if self.interactive => {
                MonitorStep::AskForAction(operation)
            }
            OperationState::ActionRequired => {
                MonitorStep::Fail(DeployError::ActionRequiredUnhandled {
                    operation_id: self.operation_id.clone(),
                })
            }
        };

        Transition { new_messages, next }
    }

    fn on_poll_failed(&mut self, error: ClientError) -> MonitorStep {
        let what = format!("Could not get operation {}", self.operation_id);
        if !error.is_transient() {
            return MonitorStep::Fail(DeployError::from_client(&what, error));
        }

        self.consecutive_failures += 1;
        if self.consecutive_failures >= self.retry.max_attempts {
            return MonitorStep::Fail(DeployError::from_client(&what, error));
        }

        let delay = self.retry.backoff(self.consecutive_failures - 1);
        warn!(
            operation_id = self.operation_id,
            failures = self.consecutive_failures,
            ?delay,
            %error,
            "polling failed, retrying"
        );
        MonitorStep::PollAfter(delay)
    }

    fn take_new_messages(&mut self, messages: &mut Vec<Message>) -> Vec<Message> {
        messages.sort_by_key(|message| message.id);
        messages.dedup_by_key(|message| message.id);

        let new_messages: Vec<Message> = messages
            .drain(..)
            .filter(|message| self.last_message_id.is_none_or(|last| message.id > last))
            .collect();

        for message in &new_messages {
            self.last_message_id = Some(message.id);
            if message.message_type.is_visible() {
                self.last_visible_message = Some(message.clone());
            }
            if message.message_type == MessageType::Error {
                self.last_error_message = Some(message.clone());
            }
        }

        new_messages
    }

    fn failure_reason(&self) -> String {
        self.last_error_message
            .as_ref()
            .or(self.last_visible_message.as_ref())
            .map(|message| message.text.clone())
            .unwrap_or_else(|| "no details reported".to_string())
    }
}

/// Drives a [`MonitorStateMachine`] against the deploy service.
pub struct ExecutionMonitor<'a> {
    client: &'a dyn DeployService,
    interaction: &'a dyn Terminal,
    settings: &'a LifecycleSettings,
    /// Command line used in hints, e.g. `cf deploy`.
    command_line: &'a str,
    host_cli: &'a str,
}

impl<'a> ExecutionMonitor<'a> {
    pub fn new(
        client: &'a dyn DeployService,
        interaction: &'a dyn Terminal,
        settings: &'a LifecycleSettings,
        host_cli: &'a str,
        command_line: &'a str,
    ) -> Self {
        Self {
            client,
            interaction,
            settings,
            command_line,
            host_cli,
        }
    }

    /// Monitor `operation_id` until it ends, or until `cancellation` resolves.
    pub async fn monitor(
        &self,
        operation_id: &str,
        cancellation: Option<BoxFuture<'static, ()>>,
    ) -> Result<MonitorOutcome> {
        self.monitor_after(operation_id, None, cancellation).await
    }

    /// Like [`ExecutionMonitor::monitor`], but only messages after `last_message_id` are printed.
    pub async fn monitor_after(
        &self,
        operation_id: &str,
        last_message_id: Option<i64>,
        cancellation: Option<BoxFuture<'static, ()>>,
    ) -> Result<MonitorOutcome> {
        trace!(operation_id, ?last_message_id, "monitoring operation");

        let mut cancellation = cancellation.unwrap_or_else(|| future::pending().boxed());
        let mut machine = MonitorStateMachine::new(
            operation_id,
            self.settings.poll_interval,
            self.settings.retry.clone(),
            self.interaction.is_interactive(),
        )
        .skip_messages_through(last_message_id);

        self.interaction.say(&format!(
            "Monitoring process execution, operation id {}...",
            entity_name(operation_id)
        ));

        let mut delay = Duration::ZERO;
        loop {
            let event = tokio::select! {
                _ = &mut cancellation => MonitorEvent::Cancelled,
                event = self.poll_after(operation_id, delay) => event,
            };

            let transition = machine.step(event);
            for message in &transition.new_messages {
                self.interaction.message(message);
            }

            match transition.next {
                MonitorStep::PollAfter(next_delay) => delay = next_delay,
                MonitorStep::AskForAction(operation) => {
                    let action = self.ask_for_action(&operation).await?;
                    if let Some(action) = action {
                        machine.step(MonitorEvent::ActionSubmitted(action));
                    }
                    delay = self.settings.poll_interval;
                }
                MonitorStep::Finish(outcome) => {
                    self.report_outcome(operation_id, outcome);
                    return Ok(outcome);
                }
                MonitorStep::Fail(error) => {
                    self.report_failure(operation_id, &error);
                    return Err(error.into());
                }
                MonitorStep::Interrupted => {
                    self.on_interrupt(operation_id).await?;
                    return Err(DeployError::Interrupted {
                        operation_id: operation_id.to_string(),
                    }
                    .into());
                }
            }
        }
    }

    async fn poll_after(&self, operation_id: &str, delay: Duration) -> MonitorEvent {
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        match self.client.get_operation(operation_id).await {
            Ok(operation) => {
                debug!(operation_id, state = %operation.state, "operation polled");
                MonitorEvent::Polled(operation)
            }
            Err(error) => MonitorEvent::PollFailed(error),
        }
    }

    /// Let the operator pick one of the actions the operation accepts right now.
    ///
    /// Returns `None` when the operation no longer waits for an action.
    async fn ask_for_action(&self, operation: &Operation) -> Result<Option<Action>> {
        // Re-fetch, the state may have moved on since the last poll
        let current = self
            .settings
            .retry
            .run("getting operation", || self.client.get_operation(&operation.id))
            .await
            .map_err(|e| {
                DeployError::from_client(&format!("Could not get operation {}", operation.id), e)
            })?;
        if current.state != OperationState::ActionRequired {
            debug!(operation_id = operation.id, state = %current.state, "action no longer required");
            return Ok(None);
        }

        let available: Vec<Action> = self
            .settings
            .retry
            .run("getting available actions", || {
                self.client.get_available_actions(&operation.id)
            })
            .await
            .map_err(|e| {
                DeployError::from_client(
                    &format!("Could not get the actions of operation {}", operation.id),
                    e,
                )
            })?
            .iter()
            .filter_map(|name| name.parse().ok())
            .filter(|action| *action != Action::Monitor)
            .collect();

        if available.is_empty() {
            debug!(operation_id = operation.id, "no actions available yet");
            return Ok(None);
        }

        let selected = self
            .interaction
            .select(
                SelectPromptOptions::builder()
                    .message(format!(
                        "Operation {} requires an action. How do you want to continue?",
                        operation.id
                    ))
                    .options(available.iter().map(Action::as_str))
                    .build(),
            )
            .context("selecting an action")?;

        let action = match selected {
            SelectPromptResult::Selected(name) => name
                .parse::<Action>()
                .map_err(DeployError::Validation)?,
            SelectPromptResult::Canceled => {
                return Err(DeployError::Canceled(format!(
                    "No action selected for operation {}",
                    operation.id
                ))
                .into());
            }
        };

        self.interaction.say(&format!(
            "Executing action '{action}' on operation {}...",
            entity_name(&operation.id)
        ));
        self.client.refresh_session().await.map_err(|e| {
            DeployError::from_client("Could not retrieve x-csrf-token for the current session", e)
        })?;
        self.client
            .submit_action(&operation.id, action)
            .await
            .map_err(|e| {
                DeployError::from_client(
                    &format!("Could not execute action '{action}' on operation {}", operation.id),
                    e,
                )
            })?;
        self.interaction.ok();

        info!(operation_id = operation.id, %action, "action submitted");

        Ok(Some(action))
    }

    async fn on_interrupt(&self, operation_id: &str) -> Result<()> {
        self.interaction.warn(&format!(
            "Monitoring interrupted, the operation keeps running. Use \"{} -i {operation_id} -a monitor\" to monitor it again.",
            self.command_line
        ));

        if !self.interaction.is_interactive() {
            return Ok(());
        }

        let confirmation = self
            .interaction
            .confirm(
                ConfirmationPromptOptions::builder()
                    .message(format!("Do you want to abort operation {operation_id}?"))
                    .default(false)
                    .build(),
            )
            .context("asking to abort the interrupted operation")?;
        if confirmation != ConfirmationPromptResult::Yes {
            return Ok(());
        }

        self.interaction.say(&format!(
            "Aborting multi-target app operation with id {}...",
            entity_name(operation_id)
        ));
        self.client.refresh_session().await.map_err(|e| {
            DeployError::from_client("Could not retrieve x-csrf-token for the current session", e)
        })?;
        self.client
            .submit_action(operation_id, Action::Abort)
            .await
            .map_err(|e| {
                DeployError::from_client(&format!("Could not abort operation {operation_id}"), e)
            })?;
        self.interaction.ok();

        Ok(())
    }

    fn report_outcome(&self, operation_id: &str, outcome: MonitorOutcome) {
        match outcome {
            MonitorOutcome::Finished => {
                self.interaction.say("Process finished.");
                self.interaction.say(&format!(
                    "Use \"{} dmol -i {operation_id}\" to download the logs of the process.",
                    self.host_cli
                ));
            }
            MonitorOutcome::Aborted => self.interaction.say("Process was aborted."),
        }
    }

    fn report_failure(&self, operation_id: &str, error: &DeployError) {
        match error {
            DeployError::RemoteProcess {
                state: OperationState::Error,
                ..
            } => {
                self.interaction.say(&format!(
                    "Use \"{} -i {operation_id} -a abort\" to abort the process.",
                    self.command_line
                ));
                self.interaction.say(&format!(
                    "Use \"{} -i {operation_id} -a retry\" to retry the process.",
                    self.command_line
                ));
                self.interaction.say(&format!(
                    "Use \"{} dmol -i {operation_id}\" to download the logs of the process.",
                    self.host_cli
                ));
            }
            DeployError::ActionRequiredUnhandled { .. } => {
                self.interaction.say(&format!(
                    "Use \"{} -i {operation_id} -a resume\" to resume the process.",
                    self.command_line
                ));
                self.interaction.say(&format!(
                    "Use \"{} -i {operation_id} -a abort\" to abort the process.",
                    self.command_line
                ));
            }
            _ => {}
        }
    }
}
