//! Clears operations that would block a new deploy or undeploy of the same multi-target app.
use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::{
    dependencies::DeployService,
    errors::DeployError,
    interaction::{ConfirmationPromptOptions, ConfirmationPromptResult, Terminal, entity_name},
    models::{Action, Operation},
    operations::{LifecycleSettings, OperationQuery},
};

pub struct ConflictResolver<'a> {
    client: &'a dyn DeployService,
    interaction: &'a dyn Terminal,
    space_guid: &'a str,
    settings: &'a LifecycleSettings,
}

impl<'a> ConflictResolver<'a> {
    pub fn new(
        client: &'a dyn DeployService,
        interaction: &'a dyn Terminal,
        space_guid: &'a str,
        settings: &'a LifecycleSettings,
    ) -> Self {
        Self {
            client,
            interaction,
            space_guid,
            settings,
        }
    }

    /// Make sure no active operation holds the lock on `mta_id`.
    ///
    /// Conflicting operations are aborted after confirmation, or straight away when `force` is set.
    /// Returns an error when a conflict remains.
    pub async fn check_ongoing_operation(&self, mta_id: &str, force: bool) -> Result<()> {
        let conflicting = OperationQuery::new(self.client, self.space_guid, &self.settings.retry)
            .active_operations(Some(mta_id))
            .await?;

        if conflicting.is_empty() {
            debug!(mta_id, "no ongoing operation");
            return Ok(());
        }

        info!(
            mta_id,
            operations = ?conflicting.iter().map(|op| op.id.as_str()).collect::<Vec<_>>(),
            "ongoing operations found"
        );

        if !force && !self.confirm_abort(mta_id, &conflicting)? {
            return Err(DeployError::Conflict(format!(
                "There is an ongoing operation for multi-target app {mta_id}, it was not aborted"
            ))
            .into());
        }

        for operation in &conflicting {
            self.abort(operation).await?;
        }

        Ok(())
    }

    fn confirm_abort(&self, mta_id: &str, conflicting: &[Operation]) -> Result<bool> {
        if !self.interaction.is_interactive() {
            return Err(DeployError::Conflict(format!(
                "There is an ongoing operation for multi-target app {mta_id}. Use the force option to abort it"
            ))
            .into());
        }

        let message = match conflicting {
            [operation] => format!(
                "There is an ongoing operation ({}) for multi-target app {mta_id}. Do you want to abort it?",
                operation.id
            ),
            _ => format!(
                "There are {} ongoing operations for multi-target app {mta_id}. Do you want to abort them?",
                conflicting.len()
            ),
        };

        let result = self
            .interaction
            .confirm(
                ConfirmationPromptOptions::builder()
                    .message(message)
                    .default(false)
                    .build(),
            )
            .context("asking to abort the ongoing operation")?;

        Ok(result == ConfirmationPromptResult::Yes)
    }

    async fn abort(&self, operation: &Operation) -> Result<()> {
        self.interaction.say(&format!(
            "Aborting multi-target app operation with id {}...",
            entity_name(&operation.id)
        ));

        self.client.refresh_session().await.map_err(|e| {
            DeployError::from_client("Could not retrieve x-csrf-token for the current session", e)
        })?;

        self.settings
            .retry
            .run("aborting operation", || {
                self.client.submit_action(&operation.id, Action::Abort)
            })
            .await
            .map_err(|e| {
                DeployError::from_client(
                    &format!("Could not abort operation {}", operation.id),
                    e,
                )
            })?;

        self.wait_until_inactive(&operation.id).await?;

        self.interaction.ok();

        Ok(())
    }

    async fn wait_until_inactive(&self, operation_id: &str) -> Result<()> {
        for poll in 0..self.settings.abort_wait_polls {
            let operation = self
                .settings
                .retry
                .run("polling aborted operation", || {
                    self.client.get_operation(operation_id)
                })
                .await
                .map_err(|e| {
                    DeployError::from_client(
                        &format!("Could not get operation {operation_id}"),
                        e,
                    )
                })?;

            if !operation.state.is_active() {
                debug!(operation_id, state = %operation.state, "operation is no longer active");
                return Ok(());
            }

            debug!(operation_id, poll, state = %operation.state, "waiting for abort");
            tokio::time::sleep(self.settings.poll_interval).await;
        }

        Err(DeployError::Conflict(format!(
            "Operation {operation_id} is still active after the abort request"
        ))
        .into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        dependencies::{ClientError, mocks::MockDeployServiceClient},
        interaction::mocks::{MockInteraction, quiet_interaction},
        models::OperationState,
        operations::fixtures::operation,
    };

    fn client_with_active(operations: Vec<Operation>) -> MockDeployServiceClient {
        let mut client = MockDeployServiceClient::new();
        client
            .expect_list_operations()
            .return_once(move |_, _| Ok(operations));
        client
    }

    fn expect_abort_of(client: &mut MockDeployServiceClient, operation_id: &'static str) {
        client.expect_refresh_session().returning(|| Ok(()));
        client
            .expect_submit_action()
            .withf(move |id, action| id == operation_id && *action == Action::Abort)
            .times(1)
            .returning(|_, _| Ok(()));
        client
            .expect_get_operation()
            .withf(move |id| id == operation_id)
            .returning(|id| Ok(operation(id, "com.example.app", OperationState::Aborted)));
    }

    fn answering(result: ConfirmationPromptResult) -> MockInteraction {
        let mut interaction = quiet_interaction();
        interaction.expect_is_interactive().return_const(true);
        interaction
            .expect_confirm()
            .times(1)
            .return_once(move |_| Ok(result));
        interaction
    }

    #[tokio::test]
    async fn test_no_ongoing_operation() {
        let mut client = client_with_active(vec![]);
        client.expect_submit_action().times(0);

        let mut interaction = quiet_interaction();
        interaction.expect_confirm().times(0);

        let settings = LifecycleSettings::immediate();
        let resolver = ConflictResolver::new(&client, &interaction, "space-guid", &settings);

        resolver
            .check_ongoing_operation("com.example.app", false)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_refused_confirmation_aborts_nothing() {
        let mut client = client_with_active(vec![operation(
            "op-1",
            "com.example.app",
            OperationState::Running,
        )]);
        client.expect_submit_action().times(0);

        let interaction = answering(ConfirmationPromptResult::No);

        let settings = LifecycleSettings::immediate();
        let resolver = ConflictResolver::new(&client, &interaction, "space-guid", &settings);

        let error = resolver
            .check_ongoing_operation("com.example.app", false)
            .await
            .unwrap_err();

        assert!(matches!(
            error.downcast_ref::<DeployError>(),
            Some(DeployError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_canceled_confirmation_aborts_nothing() {
        let mut client = client_with_active(vec![operation(
            "op-1",
            "com.example.app",
            OperationState::ActionRequired,
        )]);
        client.expect_submit_action().times(0);

        let interaction = answering(ConfirmationPromptResult::Canceled);

        let settings = LifecycleSettings::immediate();
        let resolver = ConflictResolver::new(&client, &interaction, "space-guid", &settings);

        assert!(
            resolver
                .check_ongoing_operation("com.example.app", false)
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn test_non_interactive_without_force_aborts_nothing() {
        let mut client = client_with_active(vec![operation(
            "op-1",
            "com.example.app",
            OperationState::Running,
        )]);
        client.expect_submit_action().times(0);

        let mut interaction = quiet_interaction();
        interaction.expect_is_interactive().return_const(false);
        interaction.expect_confirm().times(0);

        let settings = LifecycleSettings::immediate();
        let resolver = ConflictResolver::new(&client, &interaction, "space-guid", &settings);

        let error = resolver
            .check_ongoing_operation("com.example.app", false)
            .await
            .unwrap_err();

        assert!(error.to_string().contains("force"));
    }

    #[tokio::test]
    async fn test_confirmed_abort_waits_for_inactive_state() {
        let mut client = client_with_active(vec![operation(
            "op-1",
            "com.example.app",
            OperationState::Running,
        )]);
        client.expect_refresh_session().returning(|| Ok(()));
        client
            .expect_submit_action()
            .withf(|id, action| id == "op-1" && *action == Action::Abort)
            .times(1)
            .returning(|_, _| Ok(()));
        let mut polls = 0;
        client
            .expect_get_operation()
            .times(2)
            .returning(move |id| {
                polls += 1;
                let state = if polls == 1 {
                    OperationState::Running
                } else {
                    OperationState::Aborted
                };
                Ok(operation(id, "com.example.app", state))
            });

        let interaction = answering(ConfirmationPromptResult::Yes);

        let settings = LifecycleSettings::immediate();
        let resolver = ConflictResolver::new(&client, &interaction, "space-guid", &settings);

        resolver
            .check_ongoing_operation("com.example.app", false)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_force_aborts_without_confirmation() {
        let mut client = client_with_active(vec![operation(
            "op-1",
            "com.example.app",
            OperationState::Error,
        )]);
        expect_abort_of(&mut client, "op-1");

        let mut interaction = quiet_interaction();
        interaction.expect_confirm().times(0);

        let settings = LifecycleSettings::immediate();
        let resolver = ConflictResolver::new(&client, &interaction, "space-guid", &settings);

        resolver
            .check_ongoing_operation("com.example.app", true)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_multiple_operations_are_aborted_sequentially() {
        let mut client = client_with_active(vec![
            operation("op-1", "com.example.app", OperationState::Running),
            operation("op-2", "com.example.app", OperationState::ActionRequired),
        ]);
        client.expect_refresh_session().returning(|| Ok(()));
        let mut sequence = mockall::Sequence::new();
        for operation_id in ["op-1", "op-2"] {
            client
                .expect_submit_action()
                .withf(move |id, action| id == operation_id && *action == Action::Abort)
                .times(1)
                .in_sequence(&mut sequence)
                .returning(|_, _| Ok(()));
            client
                .expect_get_operation()
                .withf(move |id| id == operation_id)
                .times(1)
                .in_sequence(&mut sequence)
                .returning(|id| Ok(operation(id, "com.example.app", OperationState::Aborted)));
        }

        let interaction = answering(ConfirmationPromptResult::Yes);

        let settings = LifecycleSettings::immediate();
        let resolver = ConflictResolver::new(&client, &interaction, "space-guid", &settings);

        resolver
            .check_ongoing_operation("com.example.app", false)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_abort_failure_short_circuits() {
        let mut client = client_with_active(vec![
            operation("op-1", "com.example.app", OperationState::Running),
            operation("op-2", "com.example.app", OperationState::Running),
        ]);
        client.expect_refresh_session().returning(|| Ok(()));
        client
            .expect_submit_action()
            .withf(|id, _| id == "op-1")
            .times(1)
            .returning(|_, _| {
                Err(ClientError::Status {
                    status: 409,
                    body: "operation is locked".to_string(),
                })
            });
        client
            .expect_submit_action()
            .withf(|id, _| id == "op-2")
            .times(0);

        let mut interaction = quiet_interaction();
        interaction.expect_confirm().times(0);

        let settings = LifecycleSettings::immediate();
        let resolver = ConflictResolver::new(&client, &interaction, "space-guid", &settings);

        let error = resolver
            .check_ongoing_operation("com.example.app", true)
            .await
            .unwrap_err();

        assert!(error.to_string().contains("op-1"));
    }

    #[tokio::test]
    async fn test_query_failure_takes_no_action() {
        let mut client = MockDeployServiceClient::new();
        client
            .expect_list_operations()
            .returning(|_, _| Err(ClientError::Transport("connection refused".to_string())));
        client.expect_submit_action().times(0);

        let interaction = quiet_interaction();

        let settings = LifecycleSettings::immediate();
        let resolver = ConflictResolver::new(&client, &interaction, "space-guid", &settings);

        let error = resolver
            .check_ongoing_operation("com.example.app", true)
            .await
            .unwrap_err();

        assert!(matches!(
            error.downcast_ref::<DeployError>(),
            Some(DeployError::Transport(_))
        ));
    }
}
