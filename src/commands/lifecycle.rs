//! State shared by the deploy and undeploy commands.
use std::fmt::Display;

use anyhow::{Context, Result};
use futures::{FutureExt, future::BoxFuture};
use serde::Serialize;

use crate::{
    args::{self, ActionArgs, TargetArgs},
    config::{ServiceConfig, TargetContext},
    dependencies::{DeployService, DeployServiceClient},
    interaction::{Interaction, Terminal},
    models::Action,
    operations::{
        ActionRunner, ConflictResolver, ExecutionMonitor, LifecycleSettings, MonitorOutcome,
        action::ActionOutcome,
    },
};

/// Outcome of a deploy or undeploy, printed on stdout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum OperationResult {
    Finished {
        operation_id: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        mta_id: Option<String>,
    },
    Aborted {
        operation_id: String,
    },
    ActionExecuted {
        operation_id: String,
        action: Action,
    },
}

impl OperationResult {
    pub fn from_monitor(
        operation_id: &str,
        mta_id: Option<&str>,
        outcome: MonitorOutcome,
    ) -> Self {
        match outcome {
            MonitorOutcome::Finished => Self::Finished {
                operation_id: operation_id.to_string(),
                mta_id: mta_id.map(str::to_string),
            },
            MonitorOutcome::Aborted => Self::Aborted {
                operation_id: operation_id.to_string(),
            },
        }
    }
}

impl Display for OperationResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Finished {
                operation_id,
                mta_id: Some(mta_id),
            } => write!(f, "Operation {operation_id} on multi-target app {mta_id} finished"),
            Self::Finished { operation_id, .. } => write!(f, "Operation {operation_id} finished"),
            Self::Aborted { operation_id } => write!(f, "Operation {operation_id} aborted"),
            Self::ActionExecuted {
                operation_id,
                action,
            } => write!(f, "Action '{action}' executed on operation {operation_id}"),
        }
    }
}

/// Either start a new process or act on an existing operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request<T> {
    Start(T),
    Action { operation_id: String, action: Action },
}

impl<T> Request<T> {
    /// The action form wins over the positional argument when both are given.
    pub fn from_args(operation: ActionArgs, start: Option<T>) -> Result<Self> {
        match (operation.operation_id, operation.action, start) {
            (Some(operation_id), Some(action), _) => Ok(Self::Action {
                operation_id,
                action,
            }),
            (None, None, Some(start)) => Ok(Self::Start(start)),
            _ => Err(crate::errors::DeployError::Validation(
                "Use either a multi-target app or both -i and -a".to_string(),
            )
            .into()),
        }
    }
}

/// Dependencies and settings of one lifecycle command.
pub struct Lifecycle {
    pub target: TargetContext,
    pub settings: LifecycleSettings,
    pub host_cli: &'static str,
    /// Command line used in hints, e.g. `cf deploy`.
    pub command_line: String,

    pub client: Box<dyn DeployService>,
    pub interaction: Box<dyn Terminal>,
    /// Creates the signal that interrupts monitoring, `None` to monitor until the operation ends.
    pub interrupt: Option<fn() -> BoxFuture<'static, ()>>,
}

impl Lifecycle {
    /// Production dependencies for `command`.
    pub fn from_target_args(target: &TargetArgs, command: &str) -> Result<Self> {
        let context = TargetContext::try_from(target)?;
        let service = ServiceConfig::try_from(target)?;
        let client =
            DeployServiceClient::new(&service.url, &context.space_guid, service.auth_token)
                .context("creating the deploy service client")?;
        let host_cli = args::host_cli();

        Ok(Self {
            target: context,
            settings: LifecycleSettings::from_env(),
            host_cli,
            command_line: format!("{host_cli} {command}"),
            client: Box::new(client),
            interaction: Box::new(Interaction::new()),
            interrupt: Some(interrupt_signal),
        })
    }

    pub fn conflict_resolver(&self) -> ConflictResolver<'_> {
        ConflictResolver::new(
            &*self.client,
            &*self.interaction,
            &self.target.space_guid,
            &self.settings,
        )
    }

    pub fn monitor(&self) -> ExecutionMonitor<'_> {
        ExecutionMonitor::new(
            &*self.client,
            &*self.interaction,
            &self.settings,
            self.host_cli,
            &self.command_line,
        )
    }

    /// A fresh interrupt signal for one monitoring run.
    pub fn cancellation(&self) -> Option<BoxFuture<'static, ()>> {
        self.interrupt.map(|signal| signal())
    }

    /// Execute `action` on an existing operation.
    pub async fn execute_action(
        &self,
        operation_id: &str,
        action: Action,
    ) -> Result<OperationResult> {
        let outcome = ActionRunner::new(
            &*self.client,
            &*self.interaction,
            &self.settings,
            self.host_cli,
            &self.command_line,
        )
        .execute(operation_id, action, self.cancellation())
        .await?;

        Ok(match outcome {
            ActionOutcome::Submitted { action } => OperationResult::ActionExecuted {
                operation_id: operation_id.to_string(),
                action,
            },
            ActionOutcome::Monitored { result } => {
                OperationResult::from_monitor(operation_id, None, result)
            }
        })
    }
}

/// Resolves on the first Ctrl-C, never when the signal cannot be listened for.
fn interrupt_signal() -> BoxFuture<'static, ()> {
    async {
        if tokio::signal::ctrl_c().await.is_err() {
            futures::future::pending::<()>().await;
        }
    }
    .boxed()
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::formatting::{Format, Formattable};

    #[test]
    fn test_request_prefers_action_form() {
        let request = Request::from_args(
            ActionArgs {
                operation_id: Some("op-1".to_string()),
                action: Some(Action::Monitor),
            },
            Some("com.example.app"),
        )
        .unwrap();

        assert_eq!(
            request,
            Request::Action {
                operation_id: "op-1".to_string(),
                action: Action::Monitor
            }
        );
    }

    #[test]
    fn test_request_without_anything_to_do() {
        assert!(Request::<String>::from_args(ActionArgs::default(), None).is_err());
    }

    #[test]
    fn test_format_result() {
        let result = OperationResult::ActionExecuted {
            operation_id: "op-1".to_string(),
            action: Action::Abort,
        };

        assert_eq!(
            result.format(Format::Text).unwrap(),
            "Action 'abort' executed on operation op-1"
        );
        assert_eq!(
            result.format(Format::Json).unwrap(),
            r#"{"outcome":"action_executed","operation_id":"op-1","action":"abort"}"#
        );
    }
}
