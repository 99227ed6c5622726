//! Reattaching to an existing operation: `-i OPERATION_ID -a ACTION`.
use anyhow::Result;
use futures::future::BoxFuture;
use serde::Serialize;
use tracing::{debug, trace};

use crate::{
    dependencies::{ClientError, DeployService},
    errors::DeployError,
    interaction::{Terminal, entity_name},
    models::{Action, Operation},
    operations::{ExecutionMonitor, LifecycleSettings, MonitorOutcome},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ActionOutcome {
    /// The action was accepted, nothing was monitored.
    Submitted { action: Action },
    /// The operation was followed until it ended.
    Monitored { result: MonitorOutcome },
}

pub struct ActionRunner<'a> {
    client: &'a dyn DeployService,
    interaction: &'a dyn Terminal,
    settings: &'a LifecycleSettings,
    host_cli: &'a str,
    command_line: &'a str,
}

impl<'a> ActionRunner<'a> {
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
            host_cli,
            command_line,
        }
    }

    /// Execute `action` on the operation `operation_id`.
    ///
    /// `abort` returns once the deploy service accepted it, `retry` and `resume` continue with
    /// monitoring and `monitor` only monitors. Running this again for the same operation is safe,
    /// no local state is kept between invocations.
    pub async fn execute(
        &self,
        operation_id: &str,
        action: Action,
        cancellation: Option<BoxFuture<'static, ()>>,
    ) -> Result<ActionOutcome> {
        trace!(operation_id, %action, "executing action");

        let operation = self.find_operation(operation_id).await?;

        // `monitor` replays the whole history, the other actions continue where it stopped
        let mut last_message_id = None;
        if action != Action::Monitor {
            self.submit(&operation, action).await?;

            if action == Action::Abort {
                return Ok(ActionOutcome::Submitted { action });
            }
            last_message_id = operation.messages.iter().map(|message| message.id).max();
        }

        let result = ExecutionMonitor::new(
            self.client,
            self.interaction,
            self.settings,
            self.host_cli,
            self.command_line,
        )
        .monitor_after(&operation.id, last_message_id, cancellation)
        .await?;

        Ok(ActionOutcome::Monitored { result })
    }

    async fn find_operation(&self, operation_id: &str) -> Result<Operation> {
        match self
            .settings
            .retry
            .run("getting operation", || self.client.get_operation(operation_id))
            .await
        {
            Ok(operation) => Ok(operation),
            Err(ClientError::NotFound(_)) => Err(DeployError::Validation(format!(
                "Multi-target app operation with id {operation_id} not found"
            ))
            .into()),
            Err(e) => Err(DeployError::from_client(
                &format!("Could not get operation {operation_id}"),
                e,
            )
            .into()),
        }
    }

    async fn submit(&self, operation: &Operation, action: Action) -> Result<()> {
        let available = self
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
            })?;
        debug!(operation_id = operation.id, ?available, "available actions");

        if !available
            .iter()
            .any(|name| name.eq_ignore_ascii_case(action.as_str()))
        {
            return Err(DeployError::Validation(format!(
                "Action '{action}' is not possible for operation {}",
                operation.id
            ))
            .into());
        }

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

        Ok(())
    }
}
