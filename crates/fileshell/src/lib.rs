//! # FileShell Library
//!
//! This crate provides the client side of FileShell: a file manager for
//! remote file-management HTTP services protected by Basic or Digest
//! authentication.
//!
//! ## Overview
//!
//! - **Primitives**: One HTTP request per call, mapped onto success, challenge,
//!   not-found or transport failure
//! - **Authentication**: Credential, challenge and session identity shared by
//!   all operations, with tokens computed per request
//! - **Operations**: List, copy, cut/paste, move, mkdir, upload and download
//!   built as ordered sequences of primitives
//! - **Shell**: Configuration loading and an interactive line shell
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                   File Orchestrator                     │
//! │        (cwd, clipboard, operation ids, events)          │
//! ├─────────────────────────────────────────────────────────┤
//! │                                                         │
//! │  ┌──────────────────────┐   ┌────────────────────────┐  │
//! │  │ Authentication       │   │      Clipboard         │  │
//! │  │ Manager              │   │      (FIFO)            │  │
//! │  └──────────────────────┘   └────────────────────────┘  │
//! │                                                         │
//! │  ┌───────────────────────────────────────────────────┐  │
//! │  │             RemoteFilePrimitive (HTTP)            │  │
//! │  └───────────────────────────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use fileshell::{Config, FileOrchestrator, HttpPrimitive};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load_default()?;
//!     let primitive = Arc::new(HttpPrimitive::from_config(&config)?);
//!     let orchestrator = FileOrchestrator::new(primitive);
//!
//!     orchestrator.login("alice", "secret").await;
//!     for entry in orchestrator.list(None).await? {
//!         println!("{}", entry.name);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! - [`config`]: Configuration loading and defaults
//! - [`primitive`]: Single-request access to the service
//! - [`auth`]: Authentication state and probing
//! - [`clipboard`]: Pending copy/cut transfers
//! - [`orchestrator`]: Operation sequencing and lifecycle events
//! - [`repl`]: Interactive shell line parser
//! - [`workdir`]: Working directory path arithmetic

pub mod auth;
pub mod clipboard;
pub mod config;
pub mod orchestrator;
pub mod primitive;
pub mod repl;
pub mod workdir;

// Re-export protocol for convenience
pub use protocol;

pub use auth::{AuthenticationManager, ProbeOutcome};
pub use clipboard::{Clipboard, ClipboardEntry};
pub use config::{Config, ConfigError};
pub use orchestrator::{
    FileOrchestrator, OperationError, OperationEvent, OperationId, OperationKind,
};
pub use primitive::{HttpPrimitive, PrimitiveError, RemoteFilePrimitive, Verb};
pub use repl::{parse_line, ReplError, ShellCommand};
