//! # DiskNav Daemon Library
//!
//! This crate provides the bot service for DiskNav, which serves a remote
//! cloud folder tree to chat users as a navigable inline-button menu.
//!
//! ## Overview
//!
//! The daemon long-polls the chat platform for interactions and answers them:
//!
//! - **Folder Navigation**: Render a folder's non-empty subfolders as buttons
//!   and deliver the files inside it as documents
//! - **Link Markers**: Announce URLs stored in marker files instead of sending them
//! - **Access Control**: Gate every step on group membership, cached per principal
//! - **Code Lookup**: Resolve a code against a spreadsheet column pair
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      Polling Orchestrator                       │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                                                                  │
//! │  ┌────────────────────────────────────────────────────────────┐ │
//! │  │                       Dispatcher                           │ │
//! │  └────────────────────────────────────────────────────────────┘ │
//! │                                                                  │
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────────────┐  │
//! │  │  Navigator   │  │    Access    │  │     Lookup Index     │  │
//! │  │  + Tokens    │  │    Policy    │  │                      │  │
//! │  └──────────────┘  └──────────────┘  └──────────────────────┘  │
//! │                                                                  │
//! │  ┌───────────────────┐  ┌──────────────┐  ┌─────────────────┐  │
//! │  │  Storage Client   │  │   Telegram   │  │  Google Sheets  │  │
//! │  └───────────────────┘  └──────────────┘  └─────────────────┘  │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use daemon::{Config, Orchestrator};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load_default()?;
//!     config.require_credentials()?;
//!
//!     let orchestrator = Orchestrator::from_config(&config)?;
//!     orchestrator.start().await?;
//!
//!     tokio::signal::ctrl_c().await?;
//!
//!     orchestrator.stop().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! - [`config`]: Configuration loading and defaults
//! - [`cache`]: Single-flight TTL cell
//! - [`outcome`]: Three-valued probe results
//! - [`storage`]: Remote storage API and directory client
//! - [`nav`]: Tokens, link markers and the browse state machine
//! - [`access`]: Membership gate and chat policy
//! - [`lookup`]: Spreadsheet-backed code lookup
//! - [`transport`]: Chat platform client
//! - [`dispatcher`]: Interaction routing
//! - [`orchestrator`]: Polling loop and lifecycle

pub mod access;
pub mod cache;
pub mod config;
pub mod dispatcher;
pub mod lookup;
pub mod nav;
pub mod orchestrator;
pub mod outcome;
pub mod storage;
pub mod transport;

// Re-export protocol for convenience
pub use protocol;

pub use config::Config;

pub use access::{AccessPolicy, MemberStatus, MembershipGate, MembershipOracle, OracleError};
pub use cache::TtlCell;
pub use dispatcher::{DispatchResult, Dispatcher, Handled};
pub use lookup::{GoogleSheets, LookupIndex, SourceError, TabularSource};
pub use nav::{NavSettings, Navigator, StepReport, TokenStore};
pub use orchestrator::{
    BotDispatcher, InteractionHandler, Orchestrator, OrchestratorEvent, OrchestratorState,
};
pub use outcome::ProbeOutcome;
pub use storage::{DirectoryClient, RemoteStorage, StorageError, SubtreeFilter, YandexDisk};
pub use transport::{Notifier, NotifyError, TelegramBot, UpdateSource};
