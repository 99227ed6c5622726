use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::{debug, trace};

use crate::{
    args,
    commands::{
        CommandWithOutput,
        lifecycle::{Lifecycle, OperationResult, Request},
    },
    config::DeployOptions,
    dependencies::{FileReader, TokioFs},
    errors::DeployError,
    interaction::entity_name,
    models::{ProcessType, UploadedFile},
    operations::{
        FileUploader, ProcessBuilder, archive::read_mta_id,
        operation_id_from_location, start_process,
    },
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployArchive {
    pub mta: PathBuf,
    pub extension_descriptors: Vec<PathBuf>,
    pub force: bool,
    pub options: DeployOptions,
}

pub struct Deploy {
    process_type: ProcessType,
    request: Request<DeployArchive>,

    lifecycle: Lifecycle,
    fs: Box<dyn FileReader + Send + Sync>,
}

impl Deploy {
    /// `command` is the name the operator used, `deploy` or `k8s-deploy`.
    pub fn from_args(args: args::Deploy, process_type: ProcessType, command: &str) -> Result<Self> {
        let options = DeployOptions::from(&args);
        let archive = args.mta.map(|mta| DeployArchive {
            mta,
            extension_descriptors: args.extension_descriptors,
            force: args.force,
            options,
        });

        Ok(Self {
            process_type,
            request: Request::from_args(args.operation, archive)?,
            lifecycle: Lifecycle::from_target_args(&args.target, command)?,
            fs: Box::new(TokioFs::new()),
        })
    }

    async fn deploy(&mut self, archive: DeployArchive) -> Result<OperationResult> {
        trace!(?archive, process_type = %self.process_type, "deploying");

        let mta = absolute_path(&archive.mta)?;
        let extension_descriptors = archive
            .extension_descriptors
            .iter()
            .map(|path| absolute_path(path))
            .collect::<Result<Vec<_>>>()?;

        // Every file must exist before the first request, a typo must not abort anything
        for path in std::iter::once(&mta).chain(&extension_descriptors) {
            if self.fs.file_size(path).await?.is_none() {
                return Err(DeployError::Validation(format!(
                    "Could not find file {}",
                    path.display()
                ))
                .into());
            }
        }

        let target = &self.lifecycle.target;
        self.lifecycle.interaction.say(&format!(
            "Deploying multi-target app archive {} in org {} / space {} as {}...",
            entity_name(mta.display()),
            entity_name(&target.org),
            entity_name(&target.space),
            entity_name(&target.username),
        ));

        let mta_id = read_mta_id(&*self.fs, &mta).await?;
        debug!(mta_id, "multi-target app id read from the archive");

        self.lifecycle
            .conflict_resolver()
            .check_ongoing_operation(&mta_id, archive.force)
            .await?;

        let uploader = FileUploader::new(
            &*self.lifecycle.client,
            &*self.fs,
            &*self.lifecycle.interaction,
            self.lifecycle.settings.chunk_size,
            &self.lifecycle.settings.retry,
        );
        let archive_parts = uploader.upload_files(&[mta]).await?;
        let extension_parts = if extension_descriptors.is_empty() {
            vec![]
        } else {
            uploader.upload_files(&extension_descriptors).await?
        };

        self.lifecycle
            .interaction
            .say("Starting deployment process...");

        let request = archive
            .options
            .apply(
                ProcessBuilder::new()
                    .process_type(self.process_type.clone())
                    .required_parameter("appArchiveId", join_ids(&archive_parts))
                    .parameter("mtaExtDescriptorId", join_ids(&extension_parts))
                    .required_parameter("targetPlatform", target.target_platform()),
            )
            .build()?;

        let location = start_process(&*self.lifecycle.client, &request)
            .await
            .context("starting the deployment process")?;
        let operation_id = operation_id_from_location(&location)?;
        self.lifecycle.interaction.ok();

        let cancellation = self.lifecycle.cancellation();
        let outcome = self
            .lifecycle
            .monitor()
            .monitor(&operation_id, cancellation)
            .await?;

        // The process no longer needs the files once it ended
        if !archive.options.keep_files {
            let uploaded: Vec<UploadedFile> =
                archive_parts.into_iter().chain(extension_parts).collect();
            uploader.delete_files(&uploaded).await;
        }

        Ok(OperationResult::from_monitor(
            &operation_id,
            Some(&mta_id),
            outcome,
        ))
    }
}

#[async_trait]
impl CommandWithOutput for Deploy {
    type Output = OperationResult;

    async fn execute(&mut self) -> Result<Self::Output> {
        match self.request.clone() {
            Request::Start(archive) => self.deploy(archive).await,
            Request::Action {
                operation_id,
                action,
            } => self.lifecycle.execute_action(&operation_id, action).await,
        }
    }
}

fn absolute_path(path: &Path) -> Result<PathBuf> {
    std::path::absolute(path).with_context(|| format!("resolving path {}", path.display()))
}

fn join_ids(files: &[UploadedFile]) -> String {
    files
        .iter()
        .map(|file| file.id.as_str())
        .collect::<Vec<_>>()
        .join(",")
}
