//! Pipeline registry endpoints

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

use crate::PlatformClient;
use crate::error::Result;

/// Request to create or update a pipeline asset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisterPipeline {
    pub name: String,
    pub description: String,
    /// Platform job type (e.g. `DATASET_VERSION_CREATION`)
    #[serde(rename = "type")]
    pub job_type: String,
    pub default_cpu: u32,
    pub default_gpu: u32,
    pub default_parameters: BTreeMap<String, serde_json::Value>,
    pub docker_image: String,
    pub docker_tag: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub docker_flags: Vec<String>,
}

/// What the registry did with a registration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    Created,
    Updated,
}

impl std::fmt::Display for Registration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Registration::Created => f.write_str("Created"),
            Registration::Updated => f.write_str("Updated"),
        }
    }
}

/// What a default-parameter sync did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    Synced,
    /// No pipeline of that name is registered yet; nothing was changed
    NotRegistered,
}

#[derive(Serialize)]
struct DefaultParametersPatch<'a> {
    default_parameters: &'a BTreeMap<String, serde_json::Value>,
}

impl PlatformClient {
    /// Register a pipeline, updating it when it already exists
    ///
    /// # Arguments
    /// * `req` - The registration request
    ///
    /// # Returns
    /// Whether the asset was created or updated
    pub async fn register_pipeline(&self, req: &RegisterPipeline) -> Result<Registration> {
        match self.create_pipeline(req).await {
            Ok(()) => {
                info!("Registered pipeline '{}'", req.name);
                Ok(Registration::Created)
            }
            Err(e) if e.is_conflict() => {
                debug!("Pipeline '{}' already exists, updating", req.name);
                self.update_pipeline(req).await?;
                info!("Updated pipeline '{}'", req.name);
                Ok(Registration::Updated)
            }
            Err(e) => Err(e),
        }
    }

    /// Replace the default parameters of a registered pipeline
    ///
    /// A pipeline that was never registered is reported, not created.
    pub async fn sync_default_parameters(
        &self,
        name: &str,
        defaults: &BTreeMap<String, serde_json::Value>,
    ) -> Result<SyncOutcome> {
        let url = self.pipeline_url(name);
        let response = self
            .client
            .patch(&url)
            .bearer_auth(&self.token)
            .json(&DefaultParametersPatch {
                default_parameters: defaults,
            })
            .send()
            .await?;

        match self.check(response).await {
            Ok(_) => {
                info!("Synced {} default parameter(s) of '{}'", defaults.len(), name);
                Ok(SyncOutcome::Synced)
            }
            Err(e) if e.is_not_found() => {
                warn!("Pipeline '{}' is not registered yet", name);
                Ok(SyncOutcome::NotRegistered)
            }
            Err(e) => Err(e),
        }
    }

    fn pipeline_url(&self, name: &str) -> String {
        format!("{}/pipelines/{}", self.organization_url(), name)
    }

    async fn create_pipeline(&self, req: &RegisterPipeline) -> Result<()> {
        let url = format!("{}/pipelines", self.organization_url());
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .json(req)
            .send()
            .await?;

        self.check(response).await?;
        Ok(())
    }

    async fn update_pipeline(&self, req: &RegisterPipeline) -> Result<()> {
        let response = self
            .client
            .put(self.pipeline_url(&req.name))
            .bearer_auth(&self.token)
            .json(req)
            .send()
            .await?;

        self.check(response).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ClientError;
    use crate::test_server::TestServer;

    fn request(name: &str) -> RegisterPipeline {
        RegisterPipeline {
            name: name.to_string(),
            description: String::new(),
            job_type: String::new(),
            default_cpu: 1,
            default_gpu: 0,
            default_parameters: BTreeMap::new(),
            docker_image: format!("acme/{}", name),
            docker_tag: "latest".to_string(),
            docker_flags: vec![],
        }
    }

    #[test]
    fn test_register_request_shape() {
        let req = RegisterPipeline {
            name: "simple".to_string(),
            description: "Simple processing".to_string(),
            job_type: "DATASET_VERSION_CREATION".to_string(),
            default_cpu: 4,
            default_gpu: 0,
            default_parameters: BTreeMap::from([(
                "batch_size".to_string(),
                serde_json::json!(8),
            )]),
            docker_image: "acme/simple".to_string(),
            docker_tag: "0.1.1".to_string(),
            docker_flags: vec![],
        };

        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["type"], "DATASET_VERSION_CREATION");
        assert_eq!(json["default_parameters"]["batch_size"], 8);
        assert!(json.get("docker_flags").is_none());
    }

    #[tokio::test]
    async fn test_register_unreachable_host_fails() {
        let client = PlatformClient::new("http://127.0.0.1:1", "acme", "t");
        let err = client.register_pipeline(&request("simple")).await.unwrap_err();
        assert!(matches!(err, ClientError::RequestFailed(_)));
    }

    #[tokio::test]
    async fn test_existing_pipeline_is_updated() {
        let server = TestServer::start(vec![
            ("409 Conflict", r#"{"message": "already exists"}"#),
            ("200 OK", r#"{"id": "0189"}"#),
        ])
        .await;
        let client = PlatformClient::new(&server.url, "acme", "t");

        let registration = client.register_pipeline(&request("simple")).await.unwrap();

        assert_eq!(registration, Registration::Updated);
        let received = server.received();
        assert!(received[0].request_line.starts_with("POST /api/organization/acme/pipelines "));
        assert!(received[1]
            .request_line
            .starts_with("PUT /api/organization/acme/pipelines/simple "));
    }

    #[tokio::test]
    async fn test_registry_error_keeps_platform_message() {
        let server =
            TestServer::start(vec![("403 Forbidden", r#"{"detail": "token expired"}"#)]).await;
        let client = PlatformClient::new(&server.url, "acme", "t");

        let err = client.register_pipeline(&request("simple")).await.unwrap_err();
        assert!(matches!(
            err,
            ClientError::ApiError { status: 403, ref message } if message == "token expired"
        ));
    }

    #[tokio::test]
    async fn test_sync_sends_defaults() {
        let server = TestServer::start(vec![("200 OK", "{}")]).await;
        let client = PlatformClient::new(&server.url, "acme", "t");
        let defaults = BTreeMap::from([("batch_size".to_string(), serde_json::json!(8))]);

        let outcome = client.sync_default_parameters("simple", &defaults).await.unwrap();

        assert_eq!(outcome, SyncOutcome::Synced);
        let received = server.received();
        assert!(received[0]
            .request_line
            .starts_with("PATCH /api/organization/acme/pipelines/simple "));
        let body: serde_json::Value = serde_json::from_str(&received[0].body).unwrap();
        assert_eq!(body["default_parameters"]["batch_size"], 8);
    }

    #[tokio::test]
    async fn test_sync_of_unregistered_pipeline() {
        let server =
            TestServer::start(vec![("404 Not Found", r#"{"detail": "Not found."}"#)]).await;
        let client = PlatformClient::new(&server.url, "acme", "t");

        let outcome = client
            .sync_default_parameters("draft", &BTreeMap::new())
            .await
            .unwrap();
        assert_eq!(outcome, SyncOutcome::NotRegistered);
    }

    #[tokio::test]
    async fn test_sync_server_error_is_returned() {
        let server = TestServer::start(vec![("500 Internal Server Error", "")]).await;
        let client = PlatformClient::new(&server.url, "acme", "t");

        let err = client
            .sync_default_parameters("simple", &BTreeMap::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::ApiError { status: 500, .. }));
    }
}
