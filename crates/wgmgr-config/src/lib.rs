// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration management for wgmgr.
//!
//! This crate provides:
//! - Layered configuration from multiple sources (defaults, TOML file, environment)
//! - Type-safe configuration with cross-field validation
//! - Consistent environment variable naming (`WGMGR_*`)
//!
//! # Usage
//!
//! ```ignore
//! use wgmgr_config::load_config;
//!
//! let config = load_config()?;
//! println!("peers draw from {}", config.network.cidr);
//! ```

pub mod error;
pub mod layer;
pub mod sections;
pub mod sources;

pub use error::ConfigError;
pub use layer::WgmgrConfigLayer;
pub use sections::*;
pub use sources::{
	ConfigSource, DefaultsSource, EnvSource, Precedence, TomlSource, SYSTEM_CONFIG_PATH,
};

use tracing::{debug, info};

/// Fully resolved configuration.
#[derive(Debug, Clone)]
pub struct WgmgrConfig {
	pub network: NetworkConfig,
	pub interface: InterfaceConfig,
	pub client: ClientConfig,
	pub paths: PathsConfig,
	pub daemon: DaemonConfig,
	pub logging: LoggingConfig,
}

/// Load configuration from all sources with standard precedence.
///
/// Precedence (highest to lowest):
/// 1. Environment variables (`WGMGR_*`)
/// 2. Config file (`/etc/wgmgr/wgmgr.toml`)
/// 3. Built-in defaults
pub fn load_config() -> Result<WgmgrConfig, ConfigError> {
	load_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::system()),
		Box::new(EnvSource),
	])
}

/// Load configuration with a config file the operator named explicitly. The
/// file must exist.
pub fn load_config_with_file(
	config_path: impl Into<std::path::PathBuf>,
) -> Result<WgmgrConfig, ConfigError> {
	load_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::required(config_path)),
		Box::new(EnvSource),
	])
}

/// Load the logging section only. Used before the full config is known so
/// configuration errors themselves get logged.
pub fn load_logging_config(
	config_path: Option<&std::path::Path>,
) -> Result<LoggingConfig, ConfigError> {
	let file = match config_path {
		Some(path) => TomlSource::required(path),
		None => TomlSource::system(),
	};
	let mut merged = WgmgrConfigLayer::default();
	merged.merge(file.load()?);
	merged.merge(EnvSource.load()?);
	Ok(merged.logging.unwrap_or_default().finalize())
}

fn load_from_sources(mut sources: Vec<Box<dyn ConfigSource>>) -> Result<WgmgrConfig, ConfigError> {
	sources.sort_by_key(|s| s.precedence());

	let mut merged = WgmgrConfigLayer::default();
	for source in sources {
		debug!(source = source.name(), "loading configuration source");
		let layer = source.load()?;
		merged.merge(layer);
	}

	finalize(merged)
}

/// Finalize configuration layer into resolved config.
pub fn finalize(layer: WgmgrConfigLayer) -> Result<WgmgrConfig, ConfigError> {
	let network = layer.network.unwrap_or_default().finalize();
	let interface = layer.interface.unwrap_or_default().finalize()?;
	let client = layer.client.unwrap_or_default().finalize();
	let paths = layer.paths.unwrap_or_default().finalize();
	let daemon = layer
		.daemon
		.unwrap_or_default()
		.finalize(&paths.state_dir, &interface.name);
	let logging = layer.logging.unwrap_or_default().finalize();

	let config = WgmgrConfig {
		network,
		interface,
		client,
		paths,
		daemon,
		logging,
	};
	validate_config(&config)?;

	let reload = match config.daemon.reload_command {
		Some(_) => "command",
		None => "syncconf",
	};
	info!(
		network = %config.network.cidr,
		gateway = %config.network.gateway,
		interface = %config.interface.name,
		listen_port = config.interface.listen_port,
		endpoint = %config.interface.endpoint,
		database = %config.paths.database_url,
		reload,
		"configuration loaded"
	);

	Ok(config)
}

fn validate_config(config: &WgmgrConfig) -> Result<(), ConfigError> {
	config.network.address_pool()?;

	if config.daemon.reload_timeout_secs == 0 {
		return Err(ConfigError::Validation(
			"daemon.reload_timeout_secs must be greater than zero".to_string(),
		));
	}

	let name = &config.interface.name;
	if name.is_empty()
		|| name.len() > 15
		|| !name
			.chars()
			.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '=' | '+' | '.' | '-'))
	{
		return Err(ConfigError::Validation(format!(
			"interface.name '{name}' is not a valid interface name"
		)));
	}

	if config.client.allowed_routes.is_empty() {
		return Err(ConfigError::Validation(
			"client.allowed_routes must not be empty".to_string(),
		));
	}

	Ok(())
}
