/*
 * Kontent.ai management api client
 *
 * SPDX-FileCopyrightText: 2025-2026 Steve Schoettler
 * SPDX-License-Identifier: Apache-2.0
 */
//! # Kontent.ai Management API Client
//!
//! An async client for the Kontent.ai Management API (v2), covering the
//! endpoints needed to back up, restore, and clean an environment.
//!
//! ## Features
//!
//! - continuation-token pagination and async Streams
//! - http middleware with retry logic and rate limit handling
//! - structured api errors (error code, request id, validation messages)
//! - binary file upload and asset download
//! - metrics
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use kontent::prelude::*;
//! # async fn example() -> Result<(), KontentError> {
//! let config = ClientConfig::default()
//!     .environment_id("975bf280-fd91-488c-994c-2f04416e5ee3")
//!     .api_key("ew0KICAiYWxnIjo...");
//! let client = KontentClient::with_config(config)?;
//!
//! // List all content types
//! let types = client.entities(Collection::ContentTypes).list().await?.collect_all().await?;
//! for content_type in &types {
//!     println!("{}", content_type["codename"]);
//! }
//!
//! // Create a taxonomy group
//! let created = client
//!     .new_entity(Collection::Taxonomies, serde_json::json!({
//!         "name": "Topics", "codename": "topics", "terms": []
//!     }))
//!     .create()
//!     .await?;
//!
//! // Delete it again
//! let id = created["id"].as_str().unwrap_or_default();
//! client.entity(Collection::Taxonomies, id).delete().await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## API Structure
//!
//! Methods on `KontentClient` return request builders that are executed with a
//! terminal method like `get()`, `list()`, `create()`, `update()`, `delete()`,
//! or `upsert()`.
//!
//! - `entities(collection)`, `entity(collection, id)`, `new_entity(collection, payload)`
//! - `variants(item_id)`, `variant(item_codename, language_codename)`
//! - `update_language(codename)`, `asset_folders()`, `new_file(..)`, `download(url)`
//! - `update_workflow(codename, payload)`, `environment()`
//!
//! Entity payloads are `serde_json::Value`: a backup has to carry every field the
//! server returns, including ones this crate does not model.
//!
#![allow(clippy::missing_errors_doc)] // pedantic
#![allow(clippy::missing_const_for_fn)] //  nursery function
#![allow(clippy::must_use_candidate)] // pedantic
#![warn(clippy::default_trait_access)]
#![warn(clippy::doc_markdown)]
#![warn(clippy::explicit_iter_loop)]
#![warn(clippy::implicit_clone)]
#![warn(clippy::literal_string_with_formatting_args)]
#![warn(clippy::match_same_arms)]
#![warn(clippy::needless_raw_strings)]
#![warn(clippy::option_if_let_else)]
#![warn(clippy::redundant_clone)]
#![warn(clippy::ref_option)]
#![warn(clippy::redundant_closure)]
#![warn(clippy::uninlined_format_args)]
#![warn(clippy::unnecessary_wraps)]
#![warn(clippy::unused_async)]

pub mod assets;
pub mod client;
pub mod entities;
pub mod environment;
pub mod error;
mod http_client;
pub mod languages;
pub mod paged;
pub mod variants;
pub mod workflows;

/// Result type alias using `KontentError` as the default error.
pub type Result<T, E = crate::error::KontentError> = std::result::Result<T, E>;

/// Prelude module - import the common types with `use kontent::prelude::*;`
pub mod prelude {
    pub use super::{DEFAULT_OBJECT_ID, DEFAULT_WORKFLOW_CODENAME, KONTENT_MANAGEMENT_URL};
    pub use crate::error::*;
    pub use crate::{
        assets::FileReference,
        client::{ClientConfig, KontentClient, SecretApiKey},
        entities::Collection,
        environment::EnvironmentInfo,
        http_client::HttpMetricsSnapshot,
        languages::LanguageOperation,
        paged::PagedResult,
    };
}

// ============================================================================
// CONSTANTS
// ============================================================================

/// Management API endpoint
pub const KONTENT_MANAGEMENT_URL: &str = "https://manage.kontent.ai/v2";

/// Id shared by the default language and the default workflow of every environment.
pub const DEFAULT_OBJECT_ID: &str = "00000000-0000-0000-0000-000000000000";

/// Codename of the workflow every environment is created with.
pub const DEFAULT_WORKFLOW_CODENAME: &str = "default";

pub(crate) mod config {
    /// Environment variable for default endpoint URL
    pub const KONTENT_URL_ENV: &str = "KONTENT_URL";

    /// Environment variable holding the environment (project) id
    pub const KONTENT_ENVIRONMENT_ID_ENV: &str = "KONTENT_ENVIRONMENT_ID";

    /// Environment variable holding the management api key
    pub const KONTENT_API_KEY_ENV: &str = "KONTENT_API_KEY";

    /// Request header carrying the continuation token of the next page
    pub const CONTINUATION_HEADER: &str = "x-continuation";

    /// Warn when the rate-limit wait exceeds this duration (seconds).
    pub const RATE_LIMIT_WAIT_WARN_SECS: u64 = 5;

    /// Fail when the rate-limit wait exceeds this duration (seconds).
    pub const RATE_LIMIT_WAIT_MAX_SECS: u64 = 30;

    /// Maximum consecutive 429 retries before failing.
    pub const RATE_LIMIT_MAX_RETRIES_DEFAULT: u32 = 5;

    /// Max retries for HTTP client
    pub const MAX_RETRIES: u32 = 3;
}
