//! Data model shared by the lifecycle components and the deploy service client.
//!
//! The deploy service owns every [`Operation`]; the client only holds snapshots of it
//! and refers to it by identifier when polling or submitting an [`Action`].
use std::{collections::BTreeMap, fmt::Display, path::PathBuf, str::FromStr};

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Type of the process started on the deploy service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProcessType {
    Deploy,
    BlueGreenDeploy,
    Undeploy,
    KubernetesDeploy,
    KubernetesDeployMta,
    KubernetesUndeploy,
    /// A process type this client does not know about.
    #[serde(untagged)]
    Other(String),
}

impl Display for ProcessType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Deploy => write!(f, "DEPLOY"),
            Self::BlueGreenDeploy => write!(f, "BLUE_GREEN_DEPLOY"),
            Self::Undeploy => write!(f, "UNDEPLOY"),
            Self::KubernetesDeploy => write!(f, "KUBERNETES_DEPLOY"),
            Self::KubernetesDeployMta => write!(f, "KUBERNETES_DEPLOY_MTA"),
            Self::KubernetesUndeploy => write!(f, "KUBERNETES_UNDEPLOY"),
            Self::Other(other) => write!(f, "{other}"),
        }
    }
}

/// State of an operation as reported by the deploy service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperationState {
    Running,
    Finished,
    Error,
    Aborted,
    ActionRequired,
    #[serde(other)]
    Unknown,
}

impl OperationState {
    /// States in which an operation still holds the lock on its multi-target app.
    pub const ACTIVE: [OperationState; 3] = [
        OperationState::Running,
        OperationState::Error,
        OperationState::ActionRequired,
    ];

    /// States after which the deploy service will not touch the operation again.
    pub const FINAL: [OperationState; 2] = [OperationState::Finished, OperationState::Aborted];

    pub fn is_active(self) -> bool {
        Self::ACTIVE.contains(&self)
    }

    pub fn is_final(self) -> bool {
        Self::FINAL.contains(&self)
    }
}

impl Display for OperationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Running => write!(f, "RUNNING"),
            Self::Finished => write!(f, "FINISHED"),
            Self::Error => write!(f, "ERROR"),
            Self::Aborted => write!(f, "ABORTED"),
            Self::ActionRequired => write!(f, "ACTION_REQUIRED"),
            Self::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

/// Severity of a progress message.
///
/// `EXT` and `TASK_STARTUP` messages are internal to the deploy service and are never shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageType {
    Info,
    #[serde(alias = "WARN")]
    Warning,
    Error,
    Ext,
    TaskStartup,
    #[serde(other)]
    Unknown,
}

impl MessageType {
    pub fn is_visible(self) -> bool {
        matches!(self, Self::Info | Self::Warning | Self::Error)
    }
}

/// A progress message of an operation, ordered by `id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: i64,
    #[serde(rename = "type")]
    pub message_type: MessageType,
    pub text: String,
}

/// Snapshot of a remote operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    #[serde(rename = "processId")]
    pub id: String,
    pub process_type: ProcessType,
    #[serde(default)]
    pub started_at: Option<String>,
    #[serde(default)]
    pub ended_at: Option<String>,
    #[serde(default)]
    pub space_id: Option<String>,
    #[serde(default)]
    pub mta_id: Option<String>,
    #[serde(default)]
    pub user: Option<String>,
    pub state: OperationState,
    #[serde(default)]
    pub messages: Vec<Message>,
}

/// An instruction an operator can give to an operation.
///
/// `Monitor` never reaches the deploy service, it only re-attaches the client to the operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Abort,
    Retry,
    Resume,
    Monitor,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Abort => "abort",
            Self::Retry => "retry",
            Self::Resume => "resume",
            Self::Monitor => "monitor",
        }
    }
}

impl Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "abort" => Ok(Self::Abort),
            "retry" => Ok(Self::Retry),
            "resume" => Ok(Self::Resume),
            "monitor" => Ok(Self::Monitor),
            _ => Err(format!("unknown action '{s}'")),
        }
    }
}

/// File metadata as returned by the deploy service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileMetadata {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub digest: Option<String>,
    #[serde(default)]
    pub digest_algorithm: Option<String>,
    #[serde(default)]
    pub space: Option<String>,
}

/// A local file (or one part of it) known to the deploy service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadedFile {
    pub id: String,
    pub path: PathBuf,
    pub size: u64,
    pub digest: String,
}

/// Request to start a process on the deploy service.
///
/// Parameters are kept sorted so the same invocation always produces the same request body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessRequest {
    pub process_type: ProcessType,
    pub parameters: BTreeMap<String, String>,
}

/// Version rule applied by the deploy service when the multi-target app is already deployed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[value(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VersionRule {
    Higher,
    SameHigher,
    All,
}

impl Display for VersionRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Higher => write!(f, "HIGHER"),
            Self::SameHigher => write!(f, "SAME_HIGHER"),
            Self::All => write!(f, "ALL"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_operation_with_messages() {
        let json = r#"{
            "processId": "op-1",
            "processType": "DEPLOY",
            "startedAt": "2024-01-01T10:00:00Z",
            "spaceId": "space-guid",
            "mtaId": "com.example.app",
            "user": "admin",
            "state": "ACTION_REQUIRED",
            "messages": [
                {"id": 1, "type": "INFO", "text": "Uploading"},
                {"id": 2, "type": "TASK_STARTUP", "text": "internal"},
                {"id": 3, "type": "WARN", "text": "careful"}
            ]
        }"#;

        let operation: Operation = serde_json::from_str(json).unwrap();

        assert_eq!(operation.id, "op-1");
        assert_eq!(operation.process_type, ProcessType::Deploy);
        assert_eq!(operation.state, OperationState::ActionRequired);
        assert_eq!(operation.mta_id.as_deref(), Some("com.example.app"));
        assert_eq!(operation.messages.len(), 3);
        assert_eq!(operation.messages[1].message_type, MessageType::TaskStartup);
        assert_eq!(operation.messages[2].message_type, MessageType::Warning);
    }

    #[test]
    fn test_deserialize_unknown_process_type_and_state() {
        let json = r#"{"processId": "op-2", "processType": "CTS_DEPLOY", "state": "SLEEPING"}"#;

        let operation: Operation = serde_json::from_str(json).unwrap();

        assert_eq!(
            operation.process_type,
            ProcessType::Other("CTS_DEPLOY".to_string())
        );
        assert_eq!(operation.state, OperationState::Unknown);
        assert!(operation.messages.is_empty());
    }

    #[test]
    fn test_active_and_final_states() {
        assert!(OperationState::Running.is_active());
        assert!(OperationState::Error.is_active());
        assert!(OperationState::ActionRequired.is_active());
        assert!(!OperationState::Finished.is_active());

        assert!(OperationState::Finished.is_final());
        assert!(OperationState::Aborted.is_final());
        assert!(!OperationState::Error.is_final());
        assert!(!OperationState::Unknown.is_final());
    }

    #[test]
    fn test_serialize_process_request() {
        let request = ProcessRequest {
            process_type: ProcessType::KubernetesUndeploy,
            parameters: BTreeMap::from([
                ("mtaId".to_string(), "com.example.app".to_string()),
                ("abortOnError".to_string(), "true".to_string()),
            ]),
        };

        assert_eq!(
            serde_json::to_string(&request).unwrap(),
            r#"{"processType":"KUBERNETES_UNDEPLOY","parameters":{"abortOnError":"true","mtaId":"com.example.app"}}"#
        );
    }

    #[test]
    fn test_action_from_str() {
        assert_eq!("abort".parse::<Action>(), Ok(Action::Abort));
        assert_eq!("RETRY".parse::<Action>(), Ok(Action::Retry));
        assert_eq!("monitor".parse::<Action>(), Ok(Action::Monitor));
        assert!("restart".parse::<Action>().is_err());
    }
}
