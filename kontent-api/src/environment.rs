//! # Environment
//!
//! - [environment](KontentClient::environment) - environment info and validation report
//!

use std::sync::Arc;

use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    Result,
    client::KontentClient,
    http_client::{HttpClient, HttpRequest},
};

/// Environment returned by the environment root endpoint.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct EnvironmentInfo {
    pub id: String,
    pub name: String,
    /// Environment name within the project, e.g. "Production"
    #[serde(default)]
    pub environment: String,
}

impl std::fmt::Display for EnvironmentInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name, self.id)?;
        if !self.environment.is_empty() {
            write!(f, " environment '{}'", self.environment)?;
        }
        Ok(())
    }
}

/// Request builder for environment-level operations.
#[derive(Debug)]
pub struct EnvironmentRequest {
    client: Arc<HttpClient>,
}

impl EnvironmentRequest {
    /// Retrieves name and id of the environment.
    pub async fn get(self) -> Result<EnvironmentInfo> {
        self.client.get_request("").await
    }

    /// Runs the server-side consistency check. The raw report carries
    /// `project`, `type_issues` and `variant_issues`.
    pub async fn validate(self) -> Result<Value> {
        self.client
            .send(HttpRequest::new(Method::POST, "/validate"))
            .await
    }
}

impl KontentClient {
    /// Environment info and validation.
    pub fn environment(&self) -> EnvironmentRequest {
        EnvironmentRequest {
            client: self.client.clone(),
        }
    }
}
