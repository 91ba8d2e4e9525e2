//! Shared helpers for kontent integration tests.
//!
//! Every test runs against its own wiremock server; paths are relative to the
//! environment root `/projects/env`.
#![allow(dead_code)]

use kontent::prelude::*;
use wiremock::MockServer;

pub const ENV_ID: &str = "env";

/// Full mock path for a path under the environment root.
pub fn env_path(path: &str) -> String {
    format!("/projects/{ENV_ID}{path}")
}

pub fn client_for(server: &MockServer) -> KontentClient {
    let config = ClientConfig::default()
        .base_url(server.uri())
        .environment_id(ENV_ID)
        .api_key("test-key")
        .rate_limit_max_retries(2);
    KontentClient::with_config(config).expect("client config")
}
