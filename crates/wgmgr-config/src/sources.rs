// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sources: environment variables and TOML files.

use std::path::PathBuf;
use std::str::FromStr;

use tracing::{debug, trace};

use crate::error::ConfigError;
use crate::layer::WgmgrConfigLayer;
use crate::sections::{
	ClientConfigLayer, DaemonConfigLayer, InterfaceConfigLayer, LoggingConfigLayer,
	NetworkConfigLayer, PathsConfigLayer,
};

pub const SYSTEM_CONFIG_PATH: &str = "/etc/wgmgr/wgmgr.toml";

/// Source precedence levels (higher = overrides lower).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
	Defaults = 10,
	ConfigFile = 20,
	Environment = 50,
}

/// Trait for configuration sources.
pub trait ConfigSource: Send + Sync {
	fn name(&self) -> &'static str;
	fn precedence(&self) -> Precedence;
	fn load(&self) -> Result<WgmgrConfigLayer, ConfigError>;
}

/// Built-in defaults source.
pub struct DefaultsSource;

impl ConfigSource for DefaultsSource {
	fn name(&self) -> &'static str {
		"defaults"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Defaults
	}

	fn load(&self) -> Result<WgmgrConfigLayer, ConfigError> {
		debug!("loading defaults");
		Ok(WgmgrConfigLayer::default())
	}
}

/// TOML file configuration source.
pub struct TomlSource {
	path: PathBuf,
	required: bool,
}

impl TomlSource {
	/// A file that may be absent.
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self {
			path: path.into(),
			required: false,
		}
	}

	/// A file the operator named explicitly; absence is an error.
	pub fn required(path: impl Into<PathBuf>) -> Self {
		Self {
			path: path.into(),
			required: true,
		}
	}

	pub fn system() -> Self {
		Self::new(SYSTEM_CONFIG_PATH)
	}
}

impl ConfigSource for TomlSource {
	fn name(&self) -> &'static str {
		"toml-config"
	}

	fn precedence(&self) -> Precedence {
		Precedence::ConfigFile
	}

	fn load(&self) -> Result<WgmgrConfigLayer, ConfigError> {
		if !self.required && !self.path.exists() {
			debug!(path = %self.path.display(), "config file not found, skipping");
			return Ok(WgmgrConfigLayer::default());
		}

		debug!(path = %self.path.display(), "loading config file");
		let content = std::fs::read_to_string(&self.path).map_err(|e| ConfigError::FileRead {
			path: self.path.clone(),
			source: e,
		})?;

		let layer: WgmgrConfigLayer =
			toml::from_str(&content).map_err(|e| ConfigError::TomlParse {
				path: self.path.clone(),
				source: e,
			})?;

		trace!("parsed config layer from TOML");
		Ok(layer)
	}
}

/// Environment variable source.
///
/// Convention: WGMGR_<SECTION>_<FIELD>, with a few short aliases for the
/// settings operators set most often.
pub struct EnvSource;

impl ConfigSource for EnvSource {
	fn name(&self) -> &'static str {
		"environment"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Environment
	}

	fn load(&self) -> Result<WgmgrConfigLayer, ConfigError> {
		debug!("loading environment variables");
		Ok(WgmgrConfigLayer {
			network: Some(load_network_from_env()?),
			interface: Some(load_interface_from_env()?),
			client: Some(load_client_from_env()?),
			paths: Some(load_paths_from_env()),
			daemon: Some(load_daemon_from_env()?),
			logging: Some(load_logging_from_env()?),
		})
	}
}

fn env_var(name: &str) -> Option<String> {
	std::env::var(name).ok().filter(|s| !s.is_empty())
}

fn env_parse<T>(name: &str) -> Result<Option<T>, ConfigError>
where
	T: FromStr,
	T::Err: std::fmt::Display,
{
	match env_var(name) {
		Some(v) => v.trim().parse().map(Some).map_err(|e| ConfigError::InvalidValue {
			key: name.to_string(),
			message: format!("'{v}': {e}"),
		}),
		None => Ok(None),
	}
}

fn env_list<T>(name: &str) -> Result<Option<Vec<T>>, ConfigError>
where
	T: FromStr,
	T::Err: std::fmt::Display,
{
	match env_var(name) {
		Some(v) => parse_list(&v).map(Some).map_err(|message| ConfigError::InvalidValue {
			key: name.to_string(),
			message,
		}),
		None => Ok(None),
	}
}

/// Parses a comma separated list, ignoring blank entries.
pub(crate) fn parse_list<T>(value: &str) -> Result<Vec<T>, String>
where
	T: FromStr,
	T::Err: std::fmt::Display,
{
	value
		.split(',')
		.map(str::trim)
		.filter(|s| !s.is_empty())
		.map(|s| s.parse().map_err(|e| format!("'{s}': {e}")))
		.collect()
}

fn load_network_from_env() -> Result<NetworkConfigLayer, ConfigError> {
	Ok(NetworkConfigLayer {
		cidr: env_parse("WGMGR_NETWORK_CIDR")?,
		gateway: env_parse("WGMGR_NETWORK_GATEWAY")?,
	})
}

fn load_interface_from_env() -> Result<InterfaceConfigLayer, ConfigError> {
	Ok(InterfaceConfigLayer {
		name: env_var("WGMGR_INTERFACE_NAME"),
		listen_port: env_parse("WGMGR_LISTEN_PORT")?,
		endpoint: env_var("WGMGR_ENDPOINT"),
		egress_interface: env_var("WGMGR_EGRESS_INTERFACE"),
		post_up: None,
		post_down: None,
	})
}

fn load_client_from_env() -> Result<ClientConfigLayer, ConfigError> {
	Ok(ClientConfigLayer {
		dns: env_list("WGMGR_CLIENT_DNS")?,
		allowed_routes: env_list("WGMGR_CLIENT_ALLOWED_ROUTES")?,
		keepalive_secs: env_parse("WGMGR_CLIENT_KEEPALIVE_SECS")?,
	})
}

fn load_paths_from_env() -> PathsConfigLayer {
	PathsConfigLayer {
		state_dir: env_var("WGMGR_STATE_DIR").map(PathBuf::from),
		database_url: env_var("WGMGR_DATABASE_URL"),
		clients_dir: env_var("WGMGR_CLIENTS_DIR").map(PathBuf::from),
	}
}

fn load_daemon_from_env() -> Result<DaemonConfigLayer, ConfigError> {
	let reload_command = env_var("WGMGR_RELOAD_COMMAND")
		.map(|s| s.split_whitespace().map(str::to_string).collect());

	Ok(DaemonConfigLayer {
		config_path: env_var("WGMGR_DAEMON_CONFIG_PATH").map(PathBuf::from),
		reload_command,
		reload_timeout_secs: env_parse("WGMGR_RELOAD_TIMEOUT_SECS")?,
	})
}

fn load_logging_from_env() -> Result<LoggingConfigLayer, ConfigError> {
	Ok(LoggingConfigLayer {
		level: env_var("WGMGR_LOG_LEVEL"),
		format: env_parse("WGMGR_LOG_FORMAT")?,
	})
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::io::Write;
	use std::net::IpAddr;

	#[test]
	fn test_precedence_ordering() {
		assert!(Precedence::Environment > Precedence::ConfigFile);
		assert!(Precedence::ConfigFile > Precedence::Defaults);
	}

	#[test]
	fn test_defaults_source_returns_empty_layer() {
		let layer = DefaultsSource.load().unwrap();
		assert!(layer.network.is_none());
		assert!(layer.interface.is_none());
	}

	#[test]
	fn test_toml_source_missing_file_returns_empty() {
		let layer = TomlSource::new("/nonexistent/wgmgr.toml").load().unwrap();
		assert!(layer.interface.is_none());
	}

	#[test]
	fn test_required_toml_source_missing_file_fails() {
		let err = TomlSource::required("/nonexistent/wgmgr.toml")
			.load()
			.unwrap_err();
		assert!(matches!(err, ConfigError::FileRead { .. }));
	}

	#[test]
	fn test_toml_source_parse_error_names_file() {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		writeln!(file, "[interface]\nlisten_port = \"not a number\"").unwrap();

		let err = TomlSource::new(file.path()).load().unwrap_err();
		match err {
			ConfigError::TomlParse { path, .. } => assert_eq!(path, file.path()),
			other => panic!("unexpected error: {other}"),
		}
	}

	#[test]
	fn test_parse_list() {
		let dns: Vec<IpAddr> = parse_list("1.1.1.1, 8.8.4.4,,").unwrap();
		assert_eq!(dns.len(), 2);
		assert!(parse_list::<IpAddr>("1.1.1.1,nope").is_err());
		assert!(parse_list::<IpAddr>("").unwrap().is_empty());
	}
}
