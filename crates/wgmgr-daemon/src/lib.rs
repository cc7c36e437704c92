// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Keeps the WireGuard daemon's configuration in step with the peer registry.
//!
//! The [`Synchronizer`] renders the full server configuration from a list of
//! peers, writes it atomically and asks a [`DaemonControl`] to reload it
//! within a bounded time.

pub mod control;
pub mod error;
pub mod render;
pub mod sync;
pub mod testing;

pub use control::{CommandControl, DaemonControl, SyncconfControl};
pub use error::{Result, SyncError};
pub use render::{render_server_config, InterfaceSettings};
pub use sync::Synchronizer;
