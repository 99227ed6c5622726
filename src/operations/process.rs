//! Assembly of process start requests.
use std::collections::BTreeMap;

use anyhow::Result;
use tracing::{debug, trace};

use crate::{
    dependencies::{OperationStarter, SessionProvider},
    errors::DeployError,
    models::{ProcessRequest, ProcessType},
};

/// Fluent builder for a [`ProcessRequest`].
///
/// Empty parameter values are not sent, unless the parameter was declared mandatory in which case
/// [`ProcessBuilder::build`] fails.
#[derive(Debug, Default)]
pub struct ProcessBuilder {
    process_type: Option<ProcessType>,
    parameters: BTreeMap<String, String>,
    missing_required: Vec<String>,
}

impl ProcessBuilder {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn process_type(mut self, process_type: ProcessType) -> Self {
        self.process_type = Some(process_type);
        self
    }

    pub fn parameter(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let value = value.into();
        if !value.is_empty() {
            self.parameters.insert(name.into(), value);
        }
        self
    }

    /// Same as [`ProcessBuilder::parameter`], but an empty value fails the build.
    pub fn required_parameter(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        let value = value.into();
        if value.trim().is_empty() {
            self.missing_required.push(name);
            return self;
        }
        self.parameter(name, value)
    }

    /// Sets a boolean flag parameter to `true` when `enabled`, flags that are off are not sent.
    pub fn flag(self, name: impl Into<String>, enabled: bool) -> Self {
        if enabled {
            self.parameter(name, "true")
        } else {
            self
        }
    }

    pub fn build(self) -> Result<ProcessRequest, DeployError> {
        let process_type = self.process_type.ok_or_else(|| {
            DeployError::Validation("The process type of the operation is not set".to_string())
        })?;

        if !self.missing_required.is_empty() {
            return Err(DeployError::Validation(format!(
                "Missing value for required parameter(s): {}",
                self.missing_required.join(", ")
            )));
        }

        Ok(ProcessRequest {
            process_type,
            parameters: self.parameters,
        })
    }
}

/// Start the process described by `request` and return the location of the new operation.
///
/// Starting is not idempotent, a failed request is not repeated.
pub async fn start_process<C>(client: &C, request: &ProcessRequest) -> Result<String>
where
    C: OperationStarter + SessionProvider + Send + Sync + ?Sized,
{
    trace!(?request, "starting process");

    client.refresh_session().await.map_err(|e| {
        DeployError::from_client("Could not retrieve x-csrf-token for the current session", e)
    })?;

    let location = client
        .start_operation(request)
        .await
        .map_err(|e| DeployError::from_client("Could not create operation", e))?;

    debug!(location, "process started");

    Ok(location)
}

/// Extract the operation id from the `Location` of a started process.
pub fn operation_id_from_location(location: &str) -> Result<String, DeployError> {
    let path = location.split(['?', '#']).next().unwrap_or_default();

    path.trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .ok_or_else(|| {
            DeployError::Transport(format!(
                "Could not get the operation id from location '{location}'"
            ))
        })
}
