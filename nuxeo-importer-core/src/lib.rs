#![doc = "nuxeo-importer-core: core logic library for nuxeo-importer."]

//! This crate contains the filename grammar, the tree walker, the bounded
//! import scheduler and the run report. It holds no network code: every remote
//! call goes through the [`contract::Repository`] trait, implemented by the CLI
//! crate against a real server and by mocks/stubs in tests.
//!
//! # Usage
//! Build an [`config::ImportConfig`], wrap a `Repository` implementation in an
//! `Arc` and call [`scheduler::import`].

pub mod config;
pub mod contract;
pub mod metadata;
pub mod pipeline;
pub mod report;
pub mod scheduler;
pub mod walker;
