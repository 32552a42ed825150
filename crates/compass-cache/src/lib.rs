// SPDX-FileCopyrightText: 2026 Compass Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Local-first caching for Compass views.
//!
//! [`CacheStore`] keeps timestamped JSON envelopes under namespaced
//! [`CacheKey`]s. [`ViewController`] seeds a view from it and reconciles
//! against the authoritative source. [`SessionContext`] keeps the signed-in
//! user in a reserved slot of the same store.

pub mod backend;
pub mod clock;
pub mod envelope;
pub mod key;
pub mod revalidate;
pub mod session;
pub mod store;

pub use backend::{BackendError, KvBackend, MemoryBackend, SqliteBackend};
pub use clock::{Clock, ManualClock, SystemClock};
pub use envelope::CacheEnvelope;
pub use key::{CacheKey, KeyError};
pub use revalidate::{
    Fetcher, ReconcileOutcome, ReconcileTicket, ViewController, ViewIdentity, ViewPhase,
};
pub use session::SessionContext;
pub use store::{CacheRead, CacheStats, CacheStore};
