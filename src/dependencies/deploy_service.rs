//! HTTP client for the MTA deploy service REST API.
//!
//! All endpoints live under `<service url>/api/v1/spaces/<space guid>/`. State-changing requests
//! carry an anti-forgery token which is fetched lazily and refreshed once when the service rejects it.
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode, header, multipart};
use serde::{Deserialize, de::DeserializeOwned};
use tokio::sync::Mutex;
use tracing::{debug, trace};
use url::Url;

use super::{
    ActionSubmitter, FileDeleter, FileLister, FilePartUploader, OperationGetter, OperationLister,
    OperationStarter, SessionProvider,
};
use crate::models::{Action, FileMetadata, Operation, OperationState, ProcessRequest};

/// User-Agent string for all HTTP requests
const USER_AGENT: &str = concat!("multiapps/", env!("CARGO_PKG_VERSION"));

const CSRF_TOKEN_HEADER: &str = "X-CSRF-Token";

/// Archives can be large, the default reqwest timeout does not apply to uploads.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(600);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClientError {
    #[error("{0}")]
    Transport(String),
    #[error("{0}")]
    Auth(String),
    #[error("resource not found: {0}")]
    NotFound(String),
    #[error("deploy service responded with {status}: {body}")]
    Status { status: u16, body: String },
    #[error("could not decode the deploy service response: {0}")]
    Decode(String),
}

impl ClientError {
    /// Whether repeating the same request may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::Status { status, .. } => *status >= 500 || *status == 408 || *status == 429,
            Self::Auth(_) | Self::NotFound(_) | Self::Decode(_) => false,
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_decode() {
            Self::Decode(error.to_string())
        } else {
            Self::Transport(error.to_string())
        }
    }
}

pub struct DeployServiceClient {
    http: Client,
    base_url: Url,
    space_guid: String,
    auth_token: Option<String>,
    csrf_token: Mutex<Option<String>>,
}

impl DeployServiceClient {
    pub fn new(
        service_url: &Url,
        space_guid: &str,
        auth_token: Option<String>,
    ) -> Result<Self, ClientError> {
        let http = Client::builder()
            .user_agent(USER_AGENT)
            .cookie_store(true)
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        // Url::join replaces the last path segment unless the base ends with a slash
        let mut base_url = service_url.clone();
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        Ok(Self {
            http,
            base_url,
            space_guid: space_guid.to_string(),
            auth_token,
            csrf_token: Mutex::new(None),
        })
    }

    fn url(&self, path: &str) -> Result<Url, ClientError> {
        self.base_url
            .join(path)
            .map_err(|e| ClientError::Transport(format!("invalid request url '{path}': {e}")))
    }

    fn space_url(&self, path: &str) -> Result<Url, ClientError> {
        self.url(&format!("api/v1/spaces/{}/{}", self.space_guid, path))
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.auth_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, ClientError> {
        debug!(%url, "GET");
        let response = self.authorize(self.http.get(url)).send().await?;
        let response = check_status(response).await?;
        Ok(response.json().await?)
    }

    async fn fetch_csrf_token(&self) -> Result<String, ClientError> {
        let url = self.url("api/v1/csrf-token")?;
        debug!(%url, "fetching x-csrf-token");

        let response = self
            .authorize(self.http.get(url))
            .header(CSRF_TOKEN_HEADER, "Fetch")
            .send()
            .await?;
        let response = check_status(response).await?;

        response
            .headers()
            .get(CSRF_TOKEN_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| {
                ClientError::Auth("the deploy service did not return a x-csrf-token".to_string())
            })
    }

    async fn current_csrf_token(&self) -> Result<String, ClientError> {
        let mut cached = self.csrf_token.lock().await;
        if let Some(token) = cached.as_ref() {
            return Ok(token.clone());
        }

        let token = self.fetch_csrf_token().await?;
        *cached = Some(token.clone());
        Ok(token)
    }

    /// Send a state-changing request.
    ///
    /// `build` is invoked again when the token was stale, request bodies are not reusable.
    async fn send_with_csrf<F>(&self, build: F) -> Result<Response, ClientError>
    where
        F: Fn() -> RequestBuilder + Send + Sync,
    {
        let token = self.current_csrf_token().await?;
        let response = self
            .authorize(build())
            .header(CSRF_TOKEN_HEADER, token)
            .send()
            .await?;

        if !is_csrf_token_required(&response) {
            return check_status(response).await;
        }

        debug!("x-csrf-token was rejected, refreshing it");
        self.refresh_session().await?;
        let token = self.current_csrf_token().await?;
        let response = self
            .authorize(build())
            .header(CSRF_TOKEN_HEADER, token)
            .send()
            .await?;

        if is_csrf_token_required(&response) {
            return Err(ClientError::Auth(
                "the x-csrf-token was rejected after refreshing it".to_string(),
            ));
        }

        check_status(response).await
    }
}

fn is_csrf_token_required(response: &Response) -> bool {
    response.status() == StatusCode::FORBIDDEN
        && response
            .headers()
            .get(CSRF_TOKEN_HEADER)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.eq_ignore_ascii_case("required"))
}

async fn check_status(response: Response) -> Result<Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let url = response.url().to_string();
    let body = response.text().await.unwrap_or_default();
    trace!(%status, %url, %body, "request failed");

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            Err(ClientError::Auth(format!("{status}: {body}")))
        }
        StatusCode::NOT_FOUND => Err(ClientError::NotFound(url)),
        _ => Err(ClientError::Status {
            status: status.as_u16(),
            body,
        }),
    }
}

#[async_trait]
impl OperationLister for DeployServiceClient {
    async fn list_operations(
        &self,
        mta_id: Option<String>,
        states: Vec<OperationState>,
    ) -> Result<Vec<Operation>, ClientError> {
        let mut url = self.space_url("operations")?;
        {
            let mut query = url.query_pairs_mut();
            if let Some(mta_id) = &mta_id {
                query.append_pair("mtaId", mta_id);
            }
            for state in &states {
                query.append_pair("state", &state.to_string());
            }
        }

        self.get_json(url).await
    }
}

#[async_trait]
impl OperationGetter for DeployServiceClient {
    async fn get_operation(&self, operation_id: &str) -> Result<Operation, ClientError> {
        let mut url = self.space_url(&format!("operations/{operation_id}"))?;
        url.query_pairs_mut().append_pair("embed", "messages");

        self.get_json(url).await
    }

    async fn get_available_actions(&self, operation_id: &str) -> Result<Vec<String>, ClientError> {
        let url = self.space_url(&format!("operations/{operation_id}/actions"))?;

        self.get_json(url).await
    }
}

#[async_trait]
impl OperationStarter for DeployServiceClient {
    async fn start_operation(&self, request: &ProcessRequest) -> Result<String, ClientError> {
        let url = self.space_url("operations")?;
        debug!(%url, process_type = %request.process_type, "POST");

        let response = self
            .send_with_csrf(|| self.http.post(url.clone()).json(request))
            .await?;

        response
            .headers()
            .get(header::LOCATION)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| {
                ClientError::Decode("the response has no Location header".to_string())
            })
    }
}

#[async_trait]
impl ActionSubmitter for DeployServiceClient {
    async fn submit_action(&self, operation_id: &str, action: Action) -> Result<(), ClientError> {
        let mut url = self.space_url(&format!("operations/{operation_id}"))?;
        url.query_pairs_mut().append_pair("actionId", action.as_str());
        debug!(%url, "POST");

        self.send_with_csrf(|| self.http.post(url.clone())).await?;
        Ok(())
    }
}

#[async_trait]
impl FileLister for DeployServiceClient {
    async fn list_files(&self) -> Result<Vec<FileMetadata>, ClientError> {
        self.get_json(self.space_url("files")?).await
    }
}

#[async_trait]
impl FilePartUploader for DeployServiceClient {
    async fn upload_part(&self, name: &str, content: Vec<u8>) -> Result<FileMetadata, ClientError> {
        let url = self.space_url("files")?;
        debug!(%url, name, size = content.len(), "uploading file");

        let response = self
            .send_with_csrf(|| {
                let part = multipart::Part::bytes(content.clone()).file_name(name.to_string());
                let form = multipart::Form::new().part("file", part);
                self.http.post(url.clone()).multipart(form)
            })
            .await?;

        let uploaded: UploadResponse = response.json().await?;
        uploaded.into_metadata()
    }
}

/// The files endpoint answers with the created file, some service versions wrap it in a list.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum UploadResponse {
    One(FileMetadata),
    Many(Vec<FileMetadata>),
}

impl UploadResponse {
    fn into_metadata(self) -> Result<FileMetadata, ClientError> {
        match self {
            Self::One(metadata) => Ok(metadata),
            Self::Many(files) => files.into_iter().next().ok_or_else(|| {
                ClientError::Decode("the upload response lists no file".to_string())
            }),
        }
    }
}

#[async_trait]
impl FileDeleter for DeployServiceClient {
    async fn delete_file(&self, file_id: &str) -> Result<(), ClientError> {
        let url = self.space_url(&format!("files/{file_id}"))?;
        debug!(%url, "DELETE");

        self.send_with_csrf(|| self.http.delete(url.clone())).await?;
        Ok(())
    }
}

#[async_trait]
impl SessionProvider for DeployServiceClient {
    async fn refresh_session(&self) -> Result<(), ClientError> {
        let token = self.fetch_csrf_token().await?;
        *self.csrf_token.lock().await = Some(token);
        Ok(())
    }
}
