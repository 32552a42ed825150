// SPDX-FileCopyrightText: 2026 Compass Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Base adapter trait shared by the provider and storage backends.

use async_trait::async_trait;

use crate::error::CompassError;
use crate::types::{AdapterType, HealthStatus};

/// The base trait for pluggable Compass backends.
///
/// Provides identity, lifecycle and health checks. The gateway's health
/// route and the binary's startup checks talk to backends through it.
#[async_trait]
pub trait PluginAdapter: Send + Sync + 'static {
    /// Returns the human-readable name of this adapter instance.
    fn name(&self) -> &str;

    /// Returns the semantic version of this adapter.
    fn version(&self) -> semver::Version;

    fn adapter_type(&self) -> AdapterType;

    /// Performs a health check and returns the adapter's current status.
    async fn health_check(&self) -> Result<HealthStatus, CompassError>;

    /// Gracefully shuts down the adapter, releasing any held resources.
    async fn shutdown(&self) -> Result<(), CompassError>;
}
