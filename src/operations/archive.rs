//! Reading the deployment descriptor of a multi-target app archive.
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::{dependencies::FileReader, errors::DeployError};

const DEPLOYMENT_DESCRIPTOR: &str = "META-INF/mtad.yaml";

#[derive(Debug, Deserialize)]
struct DeploymentDescriptor {
    #[serde(rename = "ID")]
    id: Option<String>,
}

/// Returns the id of the multi-target app contained in `archive`.
pub async fn read_mta_id(fs: &(dyn FileReader + Send + Sync), archive: &Path) -> Result<String> {
    let descriptor = fs
        .read_archive_entry(archive, DEPLOYMENT_DESCRIPTOR)
        .await
        .with_context(|| format!("Could not read archive {}", archive.display()))?
        .ok_or_else(|| {
            DeployError::Validation(format!(
                "Could not find {DEPLOYMENT_DESCRIPTOR} in archive {}",
                archive.display()
            ))
        })?;

    let descriptor: DeploymentDescriptor = serde_yaml::from_str(&descriptor).map_err(|e| {
        DeployError::Validation(format!(
            "Could not parse {DEPLOYMENT_DESCRIPTOR} in archive {}: {e}",
            archive.display()
        ))
    })?;

    descriptor
        .id
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| {
            DeployError::Validation(format!(
                "The deployment descriptor of archive {} has no ID",
                archive.display()
            ))
            .into()
        })
}
