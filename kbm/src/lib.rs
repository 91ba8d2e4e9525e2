/*
 * kbm - backup, restore and clean Kontent.ai environments
 *
 * SPDX-FileCopyrightText: 2025-2026 Steve Schoettler
 * SPDX-License-Identifier: Apache-2.0
 */
//! # kbm
//!
//! Exports an environment's content model and content into a portable zip
//! archive, restores an archive into another environment, and cleans an
//! environment.
//!
//! Restoring is the interesting part. The archive is keyed by the source
//! environment's internal ids, none of which exist in the target. Before
//! anything is created, id references are rewritten to codenames or external
//! ids ([`translate`]), content types and snippets are ordered by their
//! references to each other ([`order`]), and as each entity is created its new
//! id is recorded so later payloads can point at it ([`identity`]). The
//! [`import`] service drives all of this against a [`api::ManagementApi`].
//!
//! ```rust,no_run
//! use kbm::{archive::{ArchiveReader, read_snapshot}, import::{ImportConfig, ImportService}};
//! use kontent::prelude::*;
//! # async fn example() -> anyhow::Result<()> {
//! let client = KontentClient::with_config(ClientConfig::default())?;
//! let reader = ArchiveReader::from_path(std::path::Path::new("backup.zip"))?;
//! let snapshot = read_snapshot(&reader)?;
//! let result = ImportService::new(&client, ImportConfig::default())
//!     .import(snapshot, &reader)
//!     .await?;
//! println!("imported {} entities", result.imported.len());
//! # Ok(())
//! # }
//! ```
#![warn(clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::struct_excessive_bools)]
#![warn(clippy::default_trait_access)]
#![warn(clippy::doc_markdown)]
#![warn(clippy::explicit_iter_loop)]
#![warn(clippy::implicit_clone)]
#![warn(clippy::literal_string_with_formatting_args)]
#![warn(clippy::match_same_arms)]
#![warn(clippy::redundant_clone)]
#![warn(clippy::ref_option)]
#![warn(clippy::redundant_closure)]
#![warn(clippy::uninlined_format_args)]
#![warn(clippy::unnecessary_wraps)]
#![warn(clippy::unused_async)]

pub mod api;
pub mod archive;
pub mod clean;
pub mod error;
pub mod export;
pub mod identity;
pub mod import;
pub mod order;
pub mod progress;
pub mod snapshot;
pub mod translate;

/// Version recorded in archive metadata.
pub const PACKAGE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Assets at or above this size are imported with an empty binary.
pub const MAX_ASSET_SIZE_BYTES: u64 = 100_000_000;
