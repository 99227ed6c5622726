//! Lookup of the operations of the current space.
use anyhow::Result;
use tracing::{debug, trace};

use crate::{
    dependencies::DeployService,
    errors::DeployError,
    models::{Operation, OperationState},
    operations::RetryPolicy,
};

pub struct OperationQuery<'a> {
    client: &'a dyn DeployService,
    space_guid: &'a str,
    retry: &'a RetryPolicy,
}

impl<'a> OperationQuery<'a> {
    pub fn new(
        client: &'a dyn DeployService,
        space_guid: &'a str,
        retry: &'a RetryPolicy,
    ) -> Self {
        Self {
            client,
            space_guid,
            retry,
        }
    }

    /// Operations still holding the lock of their multi-target app, optionally only those of `mta_id`.
    pub async fn active_operations(&self, mta_id: Option<&str>) -> Result<Vec<Operation>> {
        self.operations(mta_id, &OperationState::ACTIVE).await
    }

    /// Operations that reached a final state, optionally only those of `mta_id`.
    pub async fn final_operations(&self, mta_id: Option<&str>) -> Result<Vec<Operation>> {
        self.operations(mta_id, &OperationState::FINAL).await
    }

    async fn operations(
        &self,
        mta_id: Option<&str>,
        states: &[OperationState],
    ) -> Result<Vec<Operation>> {
        trace!(?mta_id, ?states, "querying operations");

        let operations = self
            .retry
            .run("listing operations", || {
                self.client
                    .list_operations(mta_id.map(str::to_string), states.to_vec())
            })
            .await
            .map_err(|e| DeployError::from_client("Could not get multi-target app operations", e))?;

        // The service filters by itself, but operations of other spaces or apps must never be acted upon
        let operations: Vec<Operation> = operations
            .into_iter()
            .filter(|operation| states.contains(&operation.state))
            .filter(|operation| {
                operation
                    .space_id
                    .as_deref()
                    .is_none_or(|space| space == self.space_guid)
            })
            .filter(|operation| match mta_id {
                Some(mta_id) => operation.mta_id.as_deref() == Some(mta_id),
                None => true,
            })
            .collect();

        debug!(count = operations.len(), "operations found");

        Ok(operations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dependencies::{ClientError, mocks::MockDeployServiceClient};
    use crate::operations::fixtures::operation;

    #[tokio::test]
    async fn test_active_operations_for_mta() {
        let mut client = MockDeployServiceClient::new();
        client
            .expect_list_operations()
            .withf(|mta_id, states| {
                mta_id.as_deref() == Some("com.example.app") && states == &OperationState::ACTIVE
            })
            .return_once(|_, _| {
                let mut other_space = operation("op-2", "com.example.app", OperationState::Running);
                other_space.space_id = Some("other-space".to_string());

                Ok(vec![
                    operation("op-1", "com.example.app", OperationState::Running),
                    other_space,
                    operation("op-3", "com.example.other", OperationState::Error),
                ])
            });

        let retry = RetryPolicy::immediate(3);
        let query = OperationQuery::new(&client, "space-guid", &retry);

        let operations = query
            .active_operations(Some("com.example.app"))
            .await
            .unwrap();

        assert_eq!(operations.len(), 1);
        assert_eq!(operations[0].id, "op-1");
    }

    #[tokio::test]
    async fn test_final_operations_of_all_mtas() {
        let mut client = MockDeployServiceClient::new();
        client
            .expect_list_operations()
            .withf(|mta_id, states| mta_id.is_none() && states == &OperationState::FINAL)
            .return_once(|_, _| {
                Ok(vec![
                    operation("op-1", "com.example.app", OperationState::Finished),
                    operation("op-2", "com.example.other", OperationState::Aborted),
                ])
            });

        let retry = RetryPolicy::immediate(3);
        let query = OperationQuery::new(&client, "space-guid", &retry);

        let operations = query.final_operations(None).await.unwrap();

        assert_eq!(operations.len(), 2);
    }

    #[tokio::test]
    async fn test_query_failure_is_surfaced() {
        let mut client = MockDeployServiceClient::new();
        client
            .expect_list_operations()
            .times(1)
            .return_once(|_, _| Err(ClientError::Auth("token expired".to_string())));

        let retry = RetryPolicy::immediate(3);
        let query = OperationQuery::new(&client, "space-guid", &retry);

        let error = query.active_operations(Some("com.example.app")).await.unwrap_err();

        assert!(matches!(
            error.downcast_ref::<DeployError>(),
            Some(DeployError::Auth(_))
        ));
    }
}
