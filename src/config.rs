//! Per-invocation configuration resolved from the command line and the environment.
use url::Url;

use crate::{
    args::{self, TargetArgs},
    errors::DeployError,
    models::VersionRule,
    operations::ProcessBuilder,
};

const SYSTEM_DOMAIN_ENV: &str = "MULTIAPPS_SYSTEM_DOMAIN";

/// Organization, space and user the command acts for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetContext {
    pub org: String,
    pub space: String,
    pub space_guid: String,
    pub username: String,
}

impl TargetContext {
    /// Value of the `targetPlatform` process parameter.
    pub fn target_platform(&self) -> String {
        format!("{} {}", self.org, self.space)
    }
}

impl TryFrom<&TargetArgs> for TargetContext {
    type Error = DeployError;

    fn try_from(args: &TargetArgs) -> Result<Self, Self::Error> {
        let mut missing = vec![];
        let mut value = |value: &Option<String>, name: &'static str| match value {
            Some(value) if !value.trim().is_empty() => value.clone(),
            _ => {
                missing.push(name);
                String::new()
            }
        };

        let context = Self {
            org: value(&args.org, "org"),
            space: value(&args.space, "space"),
            space_guid: value(&args.space_guid, "space-guid"),
            username: value(&args.user, "user"),
        };

        if !missing.is_empty() {
            return Err(DeployError::Validation(format!(
                "No target set, missing: {}. Set them with the command options or the MULTIAPPS_ORG, MULTIAPPS_SPACE, MULTIAPPS_SPACE_GUID and MULTIAPPS_USER environment variables",
                missing.join(", ")
            )));
        }

        Ok(context)
    }
}

/// Where the deploy service lives and how to authenticate against it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    pub url: Url,
    pub auth_token: Option<String>,
}

impl TryFrom<&TargetArgs> for ServiceConfig {
    type Error = DeployError;

    fn try_from(args: &TargetArgs) -> Result<Self, Self::Error> {
        let system_domain = std::env::var(SYSTEM_DOMAIN_ENV).ok();
        Ok(Self {
            url: service_url(args.url.as_deref(), system_domain.as_deref())?,
            auth_token: args.auth_token.clone().filter(|token| !token.is_empty()),
        })
    }
}

fn service_url(url: Option<&str>, system_domain: Option<&str>) -> Result<Url, DeployError> {
    let url = match (url, system_domain) {
        (Some(url), _) if !url.trim().is_empty() => url.trim().to_string(),
        (_, Some(domain)) if !domain.trim().is_empty() => {
            format!("https://deploy-service.{}", domain.trim())
        }
        _ => {
            return Err(DeployError::Validation(format!(
                "The deploy service URL is not set. Use the -u option, DEPLOY_SERVICE_URL or {SYSTEM_DOMAIN_ENV}"
            )));
        }
    };

    // A bare host name is accepted, the service is always reached over https then
    let url = if url.contains("://") {
        url
    } else {
        format!("https://{url}")
    };

    Url::parse(&url)
        .map_err(|e| DeployError::Validation(format!("Invalid deploy service URL '{url}': {e}")))
}

/// Deploy flags, sent as process parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeployOptions {
    pub start_timeout: Option<u64>,
    pub version_rule: Option<VersionRule>,
    pub no_start: bool,
    pub use_namespaces: bool,
    pub no_namespaces_for_services: bool,
    pub delete_services: bool,
    pub delete_service_keys: bool,
    pub delete_service_brokers: bool,
    pub keep_files: bool,
    pub no_restart_subscribed_apps: bool,
    pub no_fail_on_missing_permissions: bool,
    pub abort_on_error: bool,
}

impl DeployOptions {
    pub fn apply(&self, builder: ProcessBuilder) -> ProcessBuilder {
        builder
            .parameter(
                "startTimeout",
                self.start_timeout
                    .map(|timeout| timeout.to_string())
                    .unwrap_or_default(),
            )
            .parameter(
                "versionRule",
                self.version_rule
                    .map(|rule| rule.to_string())
                    .unwrap_or_default(),
            )
            .flag("noStart", self.no_start)
            .flag("useNamespaces", self.use_namespaces)
            .flag("noNamespacesForServices", self.no_namespaces_for_services)
            .flag("deleteServices", self.delete_services)
            .flag("deleteServiceKeys", self.delete_service_keys)
            .flag("deleteServiceBrokers", self.delete_service_brokers)
            .flag("keepFiles", self.keep_files)
            .flag("noRestartSubscribedApps", self.no_restart_subscribed_apps)
            .flag("noFailOnMissingPermissions", self.no_fail_on_missing_permissions)
            .flag("abortOnError", self.abort_on_error)
    }
}

impl From<&args::Deploy> for DeployOptions {
    fn from(args: &args::Deploy) -> Self {
        Self {
            start_timeout: args.timeout,
            version_rule: args.version_rule,
            no_start: args.no_start,
            use_namespaces: args.use_namespaces,
            no_namespaces_for_services: args.no_namespaces_for_services,
            delete_services: args.delete_services,
            delete_service_keys: args.delete_service_keys,
            delete_service_brokers: args.delete_service_brokers,
            keep_files: args.keep_files,
            no_restart_subscribed_apps: args.no_restart_subscribed_apps,
            no_fail_on_missing_permissions: args.do_not_fail_on_missing_permissions,
            abort_on_error: args.abort_on_error,
        }
    }
}

/// Undeploy flags, sent as process parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UndeployOptions {
    pub delete_services: bool,
    pub delete_service_keys: bool,
    pub delete_service_brokers: bool,
    pub no_restart_subscribed_apps: bool,
    pub no_fail_on_missing_permissions: bool,
    pub abort_on_error: bool,
}

impl UndeployOptions {
    pub fn apply(&self, builder: ProcessBuilder) -> ProcessBuilder {
        builder
            .flag("deleteServices", self.delete_services)
            .flag("deleteServiceKeys", self.delete_service_keys)
            .flag("deleteServiceBrokers", self.delete_service_brokers)
            .flag("noRestartSubscribedApps", self.no_restart_subscribed_apps)
            .flag("noFailOnMissingPermissions", self.no_fail_on_missing_permissions)
            .flag("abortOnError", self.abort_on_error)
    }
}

impl From<&args::Undeploy> for UndeployOptions {
    fn from(args: &args::Undeploy) -> Self {
        Self {
            delete_services: args.delete_services,
            delete_service_keys: args.delete_service_keys,
            delete_service_brokers: args.delete_service_brokers,
            no_restart_subscribed_apps: args.no_restart_subscribed_apps,
            no_fail_on_missing_permissions: args.do_not_fail_on_missing_permissions,
            abort_on_error: args.abort_on_error,
        }
    }
}
