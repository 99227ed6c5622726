use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::trace;

use crate::{
    args,
    commands::{
        CommandWithOutput,
        lifecycle::{Lifecycle, OperationResult, Request},
    },
    config::UndeployOptions,
    errors::DeployError,
    interaction::{ConfirmationPromptOptions, ConfirmationPromptResult, entity_name},
    models::ProcessType,
    operations::{ProcessBuilder, operation_id_from_location, start_process},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UndeployApp {
    pub mta_id: String,
    pub force: bool,
    pub options: UndeployOptions,
}

pub struct Undeploy {
    process_type: ProcessType,
    request: Request<UndeployApp>,

    lifecycle: Lifecycle,
}

impl Undeploy {
    /// `command` is the name the operator used, `undeploy` or `k8s-undeploy`.
    pub fn from_args(
        args: args::Undeploy,
        process_type: ProcessType,
        command: &str,
    ) -> Result<Self> {
        let options = UndeployOptions::from(&args);
        let app = args.mta_id.map(|mta_id| UndeployApp {
            mta_id,
            force: args.force,
            options,
        });

        Ok(Self {
            process_type,
            request: Request::from_args(args.operation, app)?,
            lifecycle: Lifecycle::from_target_args(&args.target, command)?,
        })
    }

    async fn undeploy(&mut self, app: UndeployApp) -> Result<OperationResult> {
        trace!(?app, process_type = %self.process_type, "undeploying");

        if app.mta_id.trim().is_empty() {
            return Err(DeployError::Validation(
                "The id of the multi-target app to undeploy is empty".to_string(),
            )
            .into());
        }

        let interaction = &self.lifecycle.interaction;
        if !app.force {
            if !interaction.is_interactive() {
                return Err(DeployError::Validation(format!(
                    "Undeploying {} needs a confirmation, use the force option to skip it",
                    app.mta_id
                ))
                .into());
            }

            let confirmation = interaction
                .confirm(
                    ConfirmationPromptOptions::builder()
                        .message(format!(
                            "Really undeploy multi-target app {}?",
                            entity_name(&app.mta_id)
                        ))
                        .default(false)
                        .build(),
                )
                .context("confirming undeploy")?;

            if confirmation != ConfirmationPromptResult::Yes {
                interaction.warn("Undeploy cancelled");
                return Err(DeployError::Canceled("Undeploy cancelled".to_string()).into());
            }
        }

        let target = &self.lifecycle.target;
        interaction.say(&format!(
            "Undeploying multi-target app {} in org {} / space {} as {}...",
            entity_name(&app.mta_id),
            entity_name(&target.org),
            entity_name(&target.space),
            entity_name(&target.username),
        ));

        self.lifecycle
            .conflict_resolver()
            .check_ongoing_operation(&app.mta_id, app.force)
            .await?;

        interaction.say("Starting undeployment process...");

        let request = app
            .options
            .apply(
                ProcessBuilder::new()
                    .process_type(self.process_type.clone())
                    .required_parameter("mtaId", app.mta_id.as_str()),
            )
            .build()?;

        let location = start_process(&*self.lifecycle.client, &request)
            .await
            .context("starting the undeployment process")?;
        let operation_id = operation_id_from_location(&location)?;
        interaction.ok();

        let cancellation = self.lifecycle.cancellation();
        let outcome = self
            .lifecycle
            .monitor()
            .monitor(&operation_id, cancellation)
            .await?;

        Ok(OperationResult::from_monitor(
            &operation_id,
            Some(&app.mta_id),
            outcome,
        ))
    }
}

#[async_trait]
impl CommandWithOutput for Undeploy {
    type Output = OperationResult;

    async fn execute(&mut self) -> Result<Self::Output> {
        match self.request.clone() {
            Request::Start(app) => self.undeploy(app).await,
            Request::Action {
                operation_id,
                action,
            } => self.lifecycle.execute_action(&operation_id, action).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::{
        commands::lifecycle::fixtures::lifecycle,
        dependencies::mocks::MockDeployServiceClient,
        interaction::mocks::{MockInteraction, quiet_interaction},
        models::{Action, OperationState},
        operations::fixtures::{operation, operation_with_messages},
    };

    fn app(force: bool) -> UndeployApp {
        UndeployApp {
            mta_id: "com.example.app".to_string(),
            force,
            options: UndeployOptions {
                delete_services: true,
                ..Default::default()
            },
        }
    }

    fn command(
        request: Request<UndeployApp>,
        client: MockDeployServiceClient,
        interaction: MockInteraction,
    ) -> Undeploy {
        Undeploy {
            process_type: ProcessType::KubernetesUndeploy,
            request,
            lifecycle: lifecycle(client, interaction),
        }
    }

    fn interactive_answering(answer: ConfirmationPromptResult) -> MockInteraction {
        let mut interaction = quiet_interaction();
        interaction.expect_is_interactive().return_const(true);
        interaction
            .expect_confirm()
            .withf(|options| options.message.contains("Really undeploy"))
            .times(1)
            .return_once(move |_| Ok(answer));
        interaction
    }

    fn expect_undeploy_until_finished(client: &mut MockDeployServiceClient) {
        client
            .expect_list_operations()
            .return_once(|_, _| Ok(vec![]));
        client.expect_refresh_session().returning(|| Ok(()));
        client
            .expect_start_operation()
            .withf(|request| {
                request.process_type == ProcessType::KubernetesUndeploy
                    && request.parameters
                        == BTreeMap::from([
                            ("deleteServices".to_string(), "true".to_string()),
                            ("mtaId".to_string(), "com.example.app".to_string()),
                        ])
            })
            .times(1)
            .return_once(|_| Ok("/api/v1/spaces/space-guid/operations/op-7".to_string()));
        client
            .expect_get_operation()
            .withf(|id| id == "op-7")
            .returning(|id| Ok(operation_with_messages(id, OperationState::Finished, vec![])));
    }

    #[tokio::test]
    async fn test_confirmed_undeploy() {
        let mut client = MockDeployServiceClient::new();
        expect_undeploy_until_finished(&mut client);

        let mut undeploy = command(
            Request::Start(app(false)),
            client,
            interactive_answering(ConfirmationPromptResult::Yes),
        );

        let result = undeploy.execute().await.unwrap();

        assert_eq!(
            result,
            OperationResult::Finished {
                operation_id: "op-7".to_string(),
                mta_id: Some("com.example.app".to_string()),
            }
        );
    }

    #[tokio::test]
    async fn test_forced_undeploy_asks_nothing() {
        let mut client = MockDeployServiceClient::new();
        expect_undeploy_until_finished(&mut client);

        let mut interaction = quiet_interaction();
        interaction.expect_is_interactive().return_const(false);
        interaction.expect_confirm().times(0);

        let mut undeploy = command(Request::Start(app(true)), client, interaction);

        undeploy.execute().await.unwrap();
    }

    #[tokio::test]
    async fn test_declined_undeploy_makes_no_request() {
        let client = MockDeployServiceClient::new();

        let mut undeploy = command(
            Request::Start(app(false)),
            client,
            interactive_answering(ConfirmationPromptResult::No),
        );

        let error = undeploy.execute().await.unwrap_err();

        assert!(matches!(
            error.downcast_ref::<DeployError>(),
            Some(DeployError::Canceled(_))
        ));
    }

    #[tokio::test]
    async fn test_non_interactive_undeploy_needs_force() {
        let client = MockDeployServiceClient::new();

        let mut interaction = quiet_interaction();
        interaction.expect_is_interactive().return_const(false);
        interaction.expect_confirm().times(0);

        let mut undeploy = command(Request::Start(app(false)), client, interaction);

        let error = undeploy.execute().await.unwrap_err();

        assert!(matches!(
            error.downcast_ref::<DeployError>(),
            Some(DeployError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_empty_mta_id_makes_no_request() {
        let mut client = MockDeployServiceClient::new();
        client.expect_list_operations().times(0);
        client.expect_start_operation().times(0);

        let mut interaction = quiet_interaction();
        interaction.expect_confirm().times(0);

        let mut undeploy = command(
            Request::Start(UndeployApp {
                mta_id: " ".to_string(),
                ..app(true)
            }),
            client,
            interaction,
        );

        let error = undeploy.execute().await.unwrap_err();

        assert!(matches!(
            error.downcast_ref::<DeployError>(),
            Some(DeployError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_abort_existing_operation() {
        let mut client = MockDeployServiceClient::new();
        client
            .expect_get_operation()
            .withf(|id| id == "op-1")
            .returning(|id| Ok(operation(id, "com.example.app", OperationState::Running)));
        client
            .expect_get_available_actions()
            .return_once(|_| Ok(vec!["abort".to_string()]));
        client.expect_refresh_session().returning(|| Ok(()));
        client
            .expect_submit_action()
            .withf(|id, action| id == "op-1" && *action == Action::Abort)
            .times(1)
            .return_once(|_, _| Ok(()));
        client.expect_list_operations().times(0);
        client.expect_start_operation().times(0);

        let mut interaction = quiet_interaction();
        interaction.expect_is_interactive().return_const(false);
        interaction.expect_confirm().times(0);

        let mut undeploy = command(
            Request::Action {
                operation_id: "op-1".to_string(),
                action: Action::Abort,
            },
            client,
            interaction,
        );

        let result = undeploy.execute().await.unwrap();

        assert_eq!(
            result,
            OperationResult::ActionExecuted {
                operation_id: "op-1".to_string(),
                action: Action::Abort,
            }
        );
    }

    #[tokio::test]
    async fn test_monitor_existing_operation() {
        let mut client = MockDeployServiceClient::new();
        let mut states = vec![
            OperationState::Running,
            OperationState::Running,
            OperationState::Finished,
        ]
        .into_iter();
        client
            .expect_get_operation()
            .withf(|id| id == "op-3")
            .returning(move |id| {
                Ok(operation(
                    id,
                    "com.example.app",
                    states.next().unwrap_or(OperationState::Finished),
                ))
            });
        client.expect_submit_action().times(0);
        client.expect_start_operation().times(0);

        let mut interaction = quiet_interaction();
        interaction.expect_is_interactive().return_const(false);

        let mut undeploy = command(
            Request::Action {
                operation_id: "op-3".to_string(),
                action: Action::Monitor,
            },
            client,
            interaction,
        );

        let result = undeploy.execute().await.unwrap();

        assert_eq!(
            result,
            OperationResult::Finished {
                operation_id: "op-3".to_string(),
                mta_id: None,
            }
        );
    }
}
