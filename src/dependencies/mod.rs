//! This module defines traits for external dependencies (the deploy service and the file system) to make them
//! easier to mock and substitute in tests. Every lifecycle component talks to the deploy service
//! through these traits only, the production implementation lives in [`deploy_service`].
use async_trait::async_trait;

use crate::models::{Action, FileMetadata, Operation, OperationState, ProcessRequest};

pub mod deploy_service;
pub mod fs;

pub use deploy_service::{ClientError, DeployServiceClient};
pub use fs::*;

// Dependency to query operations of the current space
#[async_trait]
pub trait OperationLister {
    /// Lists operations, optionally restricted to one multi-target app and a set of states.
    async fn list_operations(
        &self,
        mta_id: Option<String>,
        states: Vec<OperationState>,
    ) -> Result<Vec<Operation>, ClientError>;
}

#[async_trait]
pub trait OperationGetter {
    /// Returns the operation including all of its messages.
    async fn get_operation(&self, operation_id: &str) -> Result<Operation, ClientError>;

    /// Returns the names of the actions the operation currently accepts.
    async fn get_available_actions(&self, operation_id: &str) -> Result<Vec<String>, ClientError>;
}

#[async_trait]
pub trait OperationStarter {
    /// Starts a new process and returns the location of the created operation.
    async fn start_operation(&self, request: &ProcessRequest) -> Result<String, ClientError>;
}

#[async_trait]
pub trait ActionSubmitter {
    async fn submit_action(&self, operation_id: &str, action: Action) -> Result<(), ClientError>;
}

#[async_trait]
pub trait FileLister {
    async fn list_files(&self) -> Result<Vec<FileMetadata>, ClientError>;
}

#[async_trait]
pub trait FilePartUploader {
    async fn upload_part(&self, name: &str, content: Vec<u8>) -> Result<FileMetadata, ClientError>;
}

#[async_trait]
pub trait FileDeleter {
    async fn delete_file(&self, file_id: &str) -> Result<(), ClientError>;
}

// Anti-forgery token provider of the current session
#[async_trait]
pub trait SessionProvider {
    /// Fetches a fresh token for the next state-changing requests.
    async fn refresh_session(&self) -> Result<(), ClientError>;
}

/// Everything the lifecycle components need from the deploy service.
pub trait DeployService:
    OperationLister
    + OperationGetter
    + OperationStarter
    + ActionSubmitter
    + FileLister
    + FilePartUploader
    + FileDeleter
    + SessionProvider
    + Send
    + Sync
{
}
impl<T> DeployService for T where
    T: OperationLister
        + OperationGetter
        + OperationStarter
        + ActionSubmitter
        + FileLister
        + FilePartUploader
        + FileDeleter
        + SessionProvider
        + Send
        + Sync
{
}
