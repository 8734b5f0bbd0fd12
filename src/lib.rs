//! # dhcpconf
//!
//! Transactional configuration loading for a DHCPv6 server.
//!
//! ## Features
//!
//! - JSON configuration with comments; every diagnostic names a line and column
//! - Documented defaults and global-to-subnet parameter inheritance
//! - One parser per top-level key, dispatched through a static registry
//! - Option data by code or name, as hex or typed comma-separated values
//! - Runtime option definitions that only become visible on commit
//! - All-or-nothing activation with a validate-only mode
//! - Command channel on a unix socket, reopened only when its settings change
//!
//! ## Quick Start
//!
//! ```no_run
//! use dhcpconf::{ConfigEngine, ConfigNode, FsHookLoader, DisabledCommandChannel};
//!
//! fn main() -> dhcpconf::Result<()> {
//!     let document = ConfigNode::load("kea-dhcp6.json")?;
//!     let mut engine = ConfigEngine::new(
//!         Box::new(DisabledCommandChannel),
//!         Box::new(FsHookLoader::new()),
//!     );
//!     let answer = engine.configure(&document, false);
//!     println!("{}", answer);
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! - [`ConfigNode`] - Positioned configuration document
//! - [`defaults`] - Default values and subnet derivation
//! - [`ParserRegistry`] - Top-level key to [`ConfigParser`] map
//! - [`options`] - Option identities, definitions and the value codec
//! - [`SrvConfig`] - Staged and current server configuration
//! - [`ConfigEngine`] - The load transaction and its [`Answer`]
//! - [`CommandChannel`] - Management socket and [`reconcile`]

pub mod channel;
pub mod defaults;
pub mod document;
pub mod engine;
pub mod error;
pub mod hooks;
pub mod options;
pub mod parsers;
pub mod srv_config;

pub use channel::{CommandChannel, DisabledCommandChannel, SocketDescriptor, reconcile};
#[cfg(unix)]
pub use channel::UnixCommandChannel;
pub use defaults::apply_defaults_and_derive;
pub use document::{ConfigNode, Position, Value};
pub use engine::{Answer, ConfigEngine, ConfigHandle};
pub use error::{Error, Result, ValidationError};
pub use hooks::{FsHookLoader, HookLibraryLoader, HooksConfig};
pub use options::{OptionDescriptor, OptionKey, decode_option, resolve_option_code};
pub use parsers::{ConfigParser, ParserRegistry, parse_rsoo};
pub use srv_config::SrvConfig;
