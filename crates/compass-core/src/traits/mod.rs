// SPDX-FileCopyrightText: 2026 Compass Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Trait seams between Compass crates.
//!
//! Backends extend the [`PluginAdapter`] base trait and use `#[async_trait]`
//! so they can be held as trait objects.

pub mod adapter;
pub mod badge_source;
pub mod provider;

pub use adapter::PluginAdapter;
pub use badge_source::BadgeSource;
pub use provider::{ProviderAdapter, ProviderStream};
