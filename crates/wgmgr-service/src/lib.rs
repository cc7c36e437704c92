// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Peer lifecycle for wgmgr.
//!
//! [`PeerLifecycleService`] sequences the registry and the daemon
//! synchronizer. A peer moves `absent -> registered -> synced -> absent`;
//! `registered` survives a failed sync and is driven on by
//! [`PeerLifecycleService::repair`] or [`PeerLifecycleService::reconcile`].

pub mod error;
pub mod service;

pub use error::{Authority, LifecycleError, PartialCause, Result, Stage};
pub use service::{PeerConfig, PeerLifecycleService};
