// SPDX-FileCopyrightText: 2026 Compass Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Compass integration tests.
//!
//! Provides scripted fakes for the adapter traits so gateway and badge tests
//! run without network access or a database.
//!
//! # Components
//!
//! - [`MockProvider`] - LLM provider replaying a scripted chunk sequence
//! - [`InMemoryBadgeSource`] - badge data source with failure injection

pub mod badge_source;
pub mod mock_provider;

pub use badge_source::InMemoryBadgeSource;
pub use mock_provider::{MockProvider, MockScript};
