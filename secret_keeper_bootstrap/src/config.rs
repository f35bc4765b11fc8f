// /////////////////////////////////////////////////////////////////////////////
// secret-keeper
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Application Configuration
//!
//! Bootstrap-phase configuration for the daemon.
//!
//! ## Design Philosophy
//!
//! `AppConfig` holds **validated** configuration after CLI parsing and
//! security validation. It is immutable after construction: no global mutable
//! state, no interior mutability, safe to hand to every task the daemon
//! spawns.
//!
//! ## Usage
//!
//! ```rust
//! use secret_keeper_bootstrap::config::{AppConfig, LogLevel};
//! use std::path::PathBuf;
//!
//! let config = AppConfig::builder()
//!     .app_name("secret-keeperd")
//!     .log_level(LogLevel::Info)
//!     .vault_path(PathBuf::from("/home/user/.secret-keeper/vault.db"))
//!     .build();
//!
//! println!("Running: {}", config.app_name());
//! ```

use std::path::PathBuf;

/// Log level configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    /// Convert to a `tracing` level.
    pub fn to_tracing_level(self) -> tracing::Level {
        match self {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }
}

/// Immutable daemon configuration, assembled from validated CLI arguments.
#[derive(Debug, Clone)]
pub struct AppConfig {
    app_name: String,
    log_level: LogLevel,
    vault_path: Option<PathBuf>,
    socket_path: Option<PathBuf>,
    project_root: Option<PathBuf>,
    global: bool,
    force_local: bool,
}

impl AppConfig {
    pub fn builder() -> AppConfigBuilder {
        AppConfigBuilder::default()
    }

    pub fn app_name(&self) -> &str {
        &self.app_name
    }

    pub fn log_level(&self) -> LogLevel {
        self.log_level
    }

    pub fn vault_path(&self) -> Option<&PathBuf> {
        self.vault_path.as_ref()
    }

    pub fn socket_path(&self) -> Option<&PathBuf> {
        self.socket_path.as_ref()
    }

    pub fn project_root(&self) -> Option<&PathBuf> {
        self.project_root.as_ref()
    }

    pub fn is_global(&self) -> bool {
        self.global
    }

    pub fn is_force_local(&self) -> bool {
        self.force_local
    }
}

/// Builder for [`AppConfig`].
#[derive(Debug, Default)]
pub struct AppConfigBuilder {
    app_name: Option<String>,
    log_level: Option<LogLevel>,
    vault_path: Option<PathBuf>,
    socket_path: Option<PathBuf>,
    project_root: Option<PathBuf>,
    global: bool,
    force_local: bool,
}

impl AppConfigBuilder {
    pub fn app_name(mut self, name: impl Into<String>) -> Self {
        self.app_name = Some(name.into());
        self
    }

    pub fn log_level(mut self, level: LogLevel) -> Self {
        self.log_level = Some(level);
        self
    }

    pub fn vault_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.vault_path = Some(path.into());
        self
    }

    pub fn socket_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.socket_path = Some(path.into());
        self
    }

    pub fn project_root(mut self, path: impl Into<PathBuf>) -> Self {
        self.project_root = Some(path.into());
        self
    }

    pub fn global(mut self, enabled: bool) -> Self {
        self.global = enabled;
        self
    }

    pub fn force_local(mut self, enabled: bool) -> Self {
        self.force_local = enabled;
        self
    }

    /// Build the configuration.
    ///
    /// # Panics
    ///
    /// Panics if `app_name` was never set.
    pub fn build(self) -> AppConfig {
        AppConfig {
            app_name: self.app_name.expect("app_name is required"),
            log_level: self.log_level.unwrap_or_default(),
            vault_path: self.vault_path,
            socket_path: self.socket_path,
            project_root: self.project_root,
            global: self.global,
            force_local: self.force_local,
        }
    }

    /// Try to build the configuration without panicking.
    pub fn try_build(self) -> Result<AppConfig, String> {
        Ok(AppConfig {
            app_name: self.app_name.ok_or("app_name is required")?,
            log_level: self.log_level.unwrap_or_default(),
            vault_path: self.vault_path,
            socket_path: self.socket_path,
            project_root: self.project_root,
            global: self.global,
            force_local: self.force_local,
        })
    }
}
