//! Command to list the multi-target app operations of the current space.
use std::fmt::Display;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Serialize;

use crate::{
    args,
    commands::CommandWithOutput,
    config::{ServiceConfig, TargetContext},
    dependencies::{DeployService, DeployServiceClient},
    models::Operation,
    operations::{OperationQuery, RetryPolicy},
    table::Table,
};

pub struct MtaOps {
    mta_id: Option<String>,
    include_final: bool,
    space_guid: String,
    retry: RetryPolicy,

    client: Box<dyn DeployService>,
}

impl TryFrom<args::MtaOps> for MtaOps {
    type Error = anyhow::Error;

    fn try_from(args: args::MtaOps) -> Result<Self> {
        let context = TargetContext::try_from(&args.target)?;
        let service = ServiceConfig::try_from(&args.target)?;

        Ok(Self {
            mta_id: args.mta,
            include_final: args.all,
            client: Box::new(
                DeployServiceClient::new(&service.url, &context.space_guid, service.auth_token)
                    .context("creating the deploy service client")?,
            ),
            space_guid: context.space_guid,
            retry: RetryPolicy::default(),
        })
    }
}

/// Operations of the space, oldest first.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MtaOpsResult(Vec<Operation>);

impl From<&MtaOpsResult> for Table {
    fn from(value: &MtaOpsResult) -> Self {
        Table::from_iter(
            &value.0,
            &[
                ("ID", |op| op.id.clone()),
                ("TYPE", |op| op.process_type.to_string()),
                ("MTA ID", |op| op.mta_id.clone().unwrap_or_default()),
                ("STATUS", |op| op.state.to_string()),
                ("STARTED AT", |op| op.started_at.clone().unwrap_or_default()),
                ("STARTED BY", |op| op.user.clone().unwrap_or_default()),
            ],
        )
    }
}

impl Display for MtaOpsResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.0.is_empty() {
            return write!(f, "No multi-target app operations found");
        }
        Table::from(self).fmt(f)
    }
}

#[async_trait]
impl CommandWithOutput for MtaOps {
    type Output = MtaOpsResult;

    async fn execute(&mut self) -> Result<Self::Output> {
        let query = OperationQuery::new(&*self.client, &self.space_guid, &self.retry);

        let mut operations = query.active_operations(self.mta_id.as_deref()).await?;
        if self.include_final {
            operations.extend(query.final_operations(self.mta_id.as_deref()).await?);
        }

        // RFC 3339 timestamps sort chronologically as strings
        operations.sort_by(|a, b| a.started_at.cmp(&b.started_at));

        Ok(MtaOpsResult(operations))
    }
}
