// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sections for wgmgr.

pub mod client;
pub mod daemon;
pub mod interface;
pub mod logging;
pub mod network;
pub mod paths;

pub use client::{ClientConfig, ClientConfigLayer};
pub use daemon::{DaemonConfig, DaemonConfigLayer};
pub use interface::{InterfaceConfig, InterfaceConfigLayer};
pub use logging::{LogFormat, LoggingConfig, LoggingConfigLayer};
pub use network::{NetworkConfig, NetworkConfigLayer};
pub use paths::{PathsConfig, PathsConfigLayer};
