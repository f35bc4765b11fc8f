// /////////////////////////////////////////////////////////////////////////////
// secret-keeper
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # System Signal Handling
//!
//! Unix signal handling for the daemon's graceful shutdown. The daemon is
//! filesystem-socket-only (never network-facing) and therefore Unix-only;
//! there is no Windows variant.
//!
//! ## Supported Signals
//!
//! - **SIGTERM** (15) - Graceful shutdown request
//! - **SIGINT** (2) - User interrupt (Ctrl+C)
//! - **SIGHUP** (1) - Hangup (terminal closed)
//!
//! ## Design Pattern
//!
//! - **Async signal handling** via tokio
//! - **Trait abstraction** for testing
//! - **Callback-based** shutdown initiation
//!
//! ## Usage
//!
//! ```rust,no_run
//! use secret_keeper_bootstrap::signals::{SystemSignals, UnixSignalHandler};
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicBool, Ordering};
//!
//! #[tokio::main]
//! async fn main() {
//!     let shutdown_flag = Arc::new(AtomicBool::new(false));
//!     let flag_clone = shutdown_flag.clone();
//!
//!     let signal_handler = UnixSignalHandler::new();
//!
//!     tokio::spawn(async move {
//!         let callback = Box::new(move || {
//!             flag_clone.store(true, Ordering::SeqCst);
//!         });
//!         signal_handler.wait_for_signal(callback).await;
//!     });
//!
//!     while !shutdown_flag.load(Ordering::SeqCst) {
//!         tokio::time::sleep(tokio::time::Duration::from_secs(1)).await;
//!     }
//! }
//! ```

use std::future::Future;
use std::pin::Pin;

/// Callback type for shutdown notification
pub type ShutdownCallback = Box<dyn FnOnce() + Send + 'static>;

/// System signal handling trait
///
/// Abstracts signal handling for graceful shutdown, so the daemon's main
/// loop can be driven by a no-op stand-in under test.
pub trait SystemSignals: Send + Sync {
    /// Wait for a shutdown signal and invoke the callback.
    ///
    /// Blocks until one of SIGTERM, SIGINT, or SIGHUP is received, then
    /// invokes `on_shutdown` to initiate graceful teardown.
    fn wait_for_signal(&self, on_shutdown: ShutdownCallback) -> Pin<Box<dyn Future<Output = ()> + Send + '_>>;
}

/// Unix signal handler implementation.
///
/// Handles SIGTERM, SIGINT, and SIGHUP using `tokio::signal::unix`.
pub struct UnixSignalHandler;

impl UnixSignalHandler {
    /// Create a new Unix signal handler
    pub fn new() -> Self {
        Self
    }
}

impl Default for UnixSignalHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemSignals for UnixSignalHandler {
    fn wait_for_signal(&self, on_shutdown: ShutdownCallback) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(async move {
            use tokio::signal::unix::{signal, SignalKind};

            let mut sigterm =
                signal(SignalKind::terminate()).expect("failed to register SIGTERM handler");
            let mut sigint =
                signal(SignalKind::interrupt()).expect("failed to register SIGINT handler");
            let mut sighup =
                signal(SignalKind::hangup()).expect("failed to register SIGHUP handler");

            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("received SIGTERM, initiating graceful shutdown");
                }
                _ = sigint.recv() => {
                    tracing::info!("received SIGINT, initiating graceful shutdown");
                }
                _ = sighup.recv() => {
                    tracing::info!("received SIGHUP, initiating graceful shutdown");
                }
            }

            on_shutdown();
        })
    }
}

/// No-op signal handler for testing.
///
/// Never receives signals, allowing tests to control shutdown explicitly.
pub struct NoOpSignalHandler;

impl NoOpSignalHandler {
    /// Create a new no-op signal handler
    pub fn new() -> Self {
        Self
    }
}

impl Default for NoOpSignalHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemSignals for NoOpSignalHandler {
    fn wait_for_signal(&self, _on_shutdown: ShutdownCallback) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(async move {
            std::future::pending::<()>().await;
        })
    }
}

/// Create the platform signal handler (always Unix for this daemon).
pub fn create_signal_handler() -> Box<dyn SystemSignals> {
    Box::new(UnixSignalHandler::new())
}
