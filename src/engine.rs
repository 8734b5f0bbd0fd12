//! The configuration transaction.
//!
//! [`ConfigEngine::configure`] turns a document into a new current
//! configuration in one all-or-nothing step:
//!
//! 1. start from an empty staged configuration (subnet ids restart at 1) and
//!    drop any runtime option definitions left staged by an earlier load
//! 2. apply defaults and derive subnet parameters
//! 3. run `option-def` first, then every other key in document order
//! 4. read the global scalars from the whole document
//! 5. commit: command channel, DDNS client settings, hook libraries (last,
//!    because loading them cannot be undone)
//!
//! A failure at any step leaves the current configuration untouched. Side
//! effects of a commit step that already ran before a later one failed are
//! not undone.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use arc_swap::ArcSwap;
use serde::Serialize;
use tracing::{debug, error, info};

use crate::channel::{self, CommandChannel};
use crate::defaults::apply_defaults_and_derive;
use crate::document::ConfigNode;
use crate::error::{Error, Result, STATUS_SUCCESS};
use crate::hooks::HookLibraryLoader;
use crate::options::{DefinitionSet, RuntimeOptionDefs};
use crate::parsers::{
    ConfigParser, Dispatch, GlobalParametersParser, OPTION_DEF_KEY, ParserRegistry,
};
use crate::parsers::ddns::D2ClientConfig;
use crate::srv_config::SrvConfig;

/// Reply to a `check_only` load that passed validation.
pub const CHECK_ONLY_MESSAGE: &str =
    "Configuration seems sane. Control-socket, hook-libraries, and D2 configuration were sanity checked, but not applied.";

/// Reply to a load that was applied.
pub const SUCCESS_MESSAGE: &str = "Configuration successful.";

/// Reported when a parser or commit step panics.
const UNDEFINED_ERROR: &str = "undefined configuration processing error";

/// Outcome of a load: `0` success, `1` rejected, `2` valid but not applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Answer {
    #[serde(rename = "result")]
    pub code: i32,
    #[serde(rename = "text")]
    pub message: String,
}

impl Answer {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            code: STATUS_SUCCESS,
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.code == STATUS_SUCCESS
    }
}

impl From<&Error> for Answer {
    fn from(error: &Error) -> Self {
        Self {
            code: error.status_code(),
            message: error.to_string(),
        }
    }
}

impl fmt::Display for Answer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

/// Read access to the current configuration.
///
/// Cloning is cheap; every clone sees each newly committed configuration.
#[derive(Clone)]
pub struct ConfigHandle {
    current: Arc<ArcSwap<SrvConfig>>,
}

impl ConfigHandle {
    /// The configuration in force right now.
    pub fn load(&self) -> Arc<SrvConfig> {
        self.current.load_full()
    }
}

/// Owns the current configuration and everything a load touches.
///
/// `configure` takes `&mut self`, so only one load can be in flight.
pub struct ConfigEngine {
    registry: ParserRegistry,
    current: Arc<ArcSwap<SrvConfig>>,
    runtime_defs: RuntimeOptionDefs,
    channel: Box<dyn CommandChannel>,
    hooks: Box<dyn HookLibraryLoader>,
    d2_client: D2ClientConfig,
}

impl ConfigEngine {
    pub fn new(channel: Box<dyn CommandChannel>, hooks: Box<dyn HookLibraryLoader>) -> Self {
        Self {
            registry: ParserRegistry::dhcp6(),
            current: Arc::new(ArcSwap::from_pointee(SrvConfig::new())),
            runtime_defs: RuntimeOptionDefs::default(),
            channel,
            hooks,
            d2_client: D2ClientConfig::default(),
        }
    }

    /// Replaces the key-to-parser table.
    pub fn with_registry(mut self, registry: ParserRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn handle(&self) -> ConfigHandle {
        ConfigHandle {
            current: Arc::clone(&self.current),
        }
    }

    pub fn current(&self) -> Arc<SrvConfig> {
        self.current.load_full()
    }

    /// Runtime option definitions of the current configuration.
    pub fn runtime_option_defs(&self) -> &DefinitionSet {
        self.runtime_defs.committed()
    }

    /// DDNS client settings adopted by the last commit.
    pub fn d2_client_config(&self) -> &D2ClientConfig {
        &self.d2_client
    }

    pub fn command_channel(&mut self) -> &mut dyn CommandChannel {
        self.channel.as_mut()
    }

    /// Validates `document` and, unless `check_only`, makes it current.
    pub fn configure(&mut self, document: &ConfigNode, check_only: bool) -> Answer {
        debug!("Configuration load started (check only: {}): {}", check_only, document);

        self.runtime_defs.revert();
        self.runtime_defs.stage(DefinitionSet::default());

        let staged = match self.validate(document, check_only) {
            Ok(staged) => staged,
            Err(error) => {
                self.runtime_defs.revert();
                return Answer::from(&error);
            }
        };

        if check_only {
            self.runtime_defs.revert();
            info!("Configuration check passed, nothing applied");
            return Answer::success(CHECK_ONLY_MESSAGE);
        }

        if let Err(error) = self.commit(&staged) {
            error!("Configuration commit failed: {}", error);
            self.runtime_defs.revert();
            return Answer::from(&error);
        }

        self.runtime_defs.commit();
        info!("Configuration successful: {}", staged.summary());
        self.current.store(Arc::new(staged));
        Answer::success(SUCCESS_MESSAGE)
    }

    /// Builds the staged configuration. Nothing outside `self.runtime_defs`
    /// changes here.
    fn validate(&mut self, document: &ConfigNode, check_only: bool) -> Result<SrvConfig> {
        let config = apply_defaults_and_derive(document)?;
        let mut staged = SrvConfig::new();

        if let Some(definitions) = config.get(OPTION_DEF_KEY)
            && let Dispatch::Parse(parser) = self.registry.lookup(OPTION_DEF_KEY)
        {
            run_parser(OPTION_DEF_KEY, parser, definitions, &mut staged)?;
        }

        for (key, node) in config.entries().unwrap_or_default() {
            if key == OPTION_DEF_KEY {
                continue;
            }
            match self.registry.lookup(key) {
                Dispatch::Parse(parser) => run_parser(key, parser, node, &mut staged)?,
                Dispatch::Skip => {}
                Dispatch::Unsupported => {
                    let error = Error::UnsupportedKey {
                        key: key.clone(),
                        position: node.position(),
                    };
                    error!("Configuration rejected: {}", error);
                    return Err(error);
                }
            }
        }

        run_parser("global parameters", &GlobalParametersParser, &config, &mut staged)?;

        if check_only {
            staged.interfaces.re_detect = false;
        }

        self.hooks.validate(&staged.hooks).inspect_err(|error| {
            error!("Configuration rejected: {}", error);
        })?;

        self.runtime_defs.stage(staged.option_defs.clone());
        Ok(staged)
    }

    fn commit(&mut self, staged: &SrvConfig) -> Result<()> {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| -> Result<()> {
            let current = self.current.load();
            channel::reconcile(
                self.channel.as_mut(),
                staged.control_socket.as_ref(),
                current.control_socket.as_ref(),
            )?;

            self.d2_client = staged.d2_client.clone();

            self.hooks.load(&staged.hooks)
        }));
        outcome.unwrap_or_else(|_| Err(Error::Commit(UNDEFINED_ERROR.to_string())))
    }
}

/// Runs one parser, turning a panic into an internal error.
fn run_parser(
    key: &str,
    parser: &dyn ConfigParser,
    node: &ConfigNode,
    staged: &mut SrvConfig,
) -> Result<()> {
    match panic::catch_unwind(AssertUnwindSafe(|| parser.parse(node, staged))) {
        Ok(Ok(())) => Ok(()),
        Ok(Err(error)) => {
            error!("Parser failed for '{}': {}", key, error);
            Err(error.into())
        }
        Err(_) => {
            error!("Parser for '{}' aborted unexpectedly", key);
            Err(Error::Internal(UNDEFINED_ERROR.to_string()))
        }
    }
}
