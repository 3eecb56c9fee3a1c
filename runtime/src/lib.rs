// Copyright 2026 Deepcrawl Contributors
// SPDX-License-Identifier: Apache-2.0

//! Deepcrawl runtime library: anonymous keyword crawler and artifact server.
//!
//! This library crate exposes the core modules for integration testing.

pub mod archive;
pub mod artifact;
pub mod cli;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod logging;
pub mod matcher;
pub mod pipeline;
pub mod proxy;
pub mod renderer;
pub mod rotation;
pub mod server;
pub mod sites;
