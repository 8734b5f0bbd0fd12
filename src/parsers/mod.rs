//! Per-key configuration parsers and the dispatcher that selects them.
//!
//! Every recognized top-level key maps to one [`ConfigParser`] in a
//! [`ParserRegistry`]. A parser reads its sub-tree and records the result in
//! the staged [`SrvConfig`]; it never touches the live configuration.

pub mod client_classes;
pub mod control_socket;
pub mod db_access;
pub mod ddns;
pub mod duid;
pub mod expiration;
pub mod globals;
pub mod hooks;
pub mod host_ids;
pub mod interfaces;
pub mod mac_sources;
pub mod option_data;
pub mod option_def;
pub mod rsoo;
pub mod subnets;

use std::collections::HashMap;

use crate::document::ConfigNode;
use crate::error::ValidationError;
use crate::options::Universe;
use crate::srv_config::SrvConfig;

pub use globals::GlobalParametersParser;
pub use option_data::parse_option_list;
pub use rsoo::parse_rsoo;

/// Key carrying runtime option definitions; always parsed before the rest.
pub const OPTION_DEF_KEY: &str = "option-def";

/// Global parameters that are copied into subnets by the derivation pass or
/// read by [`GlobalParametersParser`]; dispatch skips them.
pub const DERIVED_KEYS: &[&str] = &[
    "renew-timer",
    "rebind-timer",
    "preferred-lifetime",
    "valid-lifetime",
    "decline-probation-period",
    "dhcp4o6-port",
];

/// Parses one configuration sub-tree into the staged configuration.
pub trait ConfigParser: Send + Sync {
    fn parse(&self, node: &ConfigNode, staged: &mut SrvConfig) -> Result<(), ValidationError>;
}

/// What the dispatcher does with a top-level key.
pub enum Dispatch<'a> {
    Parse(&'a dyn ConfigParser),
    /// Already folded in elsewhere; nothing to do.
    Skip,
    Unsupported,
}

enum Entry {
    Parser(Box<dyn ConfigParser>),
    Skip,
}

/// Static map from top-level key to parser.
pub struct ParserRegistry {
    universe: Universe,
    entries: HashMap<String, Entry>,
}

impl ParserRegistry {
    /// An empty registry; every key is unsupported until registered.
    pub fn empty(universe: Universe) -> Self {
        Self {
            universe,
            entries: HashMap::new(),
        }
    }

    /// The registry for a DHCPv6 server.
    pub fn dhcp6() -> Self {
        let universe = Universe::V6;
        let mut registry = Self::empty(universe);
        registry.register(OPTION_DEF_KEY, option_def::OptionDefListParser::new(universe));
        registry.register("option-data", option_data::OptionDataListParser::new(universe));
        registry.register("mac-sources", mac_sources::MacSourcesParser);
        registry.register("control-socket", control_socket::ControlSocketParser);
        registry.register(
            "host-reservation-identifiers",
            host_ids::HostReservationIdsParser,
        );
        registry.register("server-id", duid::DuidConfigParser);
        registry.register("interfaces-config", interfaces::IfacesConfigParser);
        registry.register(
            "expired-leases-processing",
            expiration::ExpirationConfigParser,
        );
        registry.register("hooks-libraries", hooks::HooksLibrariesParser);
        registry.register("dhcp-ddns", ddns::D2ClientConfigParser);
        registry.register(
            "client-classes",
            client_classes::ClientClassDefListParser::new(universe),
        );
        registry.register("lease-database", db_access::DbAccessParser::lease());
        registry.register("hosts-database", db_access::DbAccessParser::hosts());
        registry.register("subnet6", subnets::Subnets6ListParser::new(universe));
        registry.register(
            "relay-supplied-options",
            rsoo::RsooListParser::new(universe),
        );
        for key in DERIVED_KEYS {
            registry.skip(key);
        }
        registry
    }

    pub fn universe(&self) -> Universe {
        self.universe
    }

    /// Registers (or replaces) the parser for `key`.
    pub fn register(&mut self, key: &str, parser: impl ConfigParser + 'static) {
        self.entries
            .insert(key.to_string(), Entry::Parser(Box::new(parser)));
    }

    /// Marks `key` as accepted but handled outside dispatch.
    pub fn skip(&mut self, key: &str) {
        self.entries.insert(key.to_string(), Entry::Skip);
    }

    pub fn lookup(&self, key: &str) -> Dispatch<'_> {
        match self.entries.get(key) {
            Some(Entry::Parser(parser)) => Dispatch::Parse(parser.as_ref()),
            Some(Entry::Skip) => Dispatch::Skip,
            None => Dispatch::Unsupported,
        }
    }

    /// Keys with a registered parser.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries
            .iter()
            .filter(|(_, entry)| matches!(entry, Entry::Parser(_)))
            .map(|(key, _)| key.as_str())
    }
}

impl Default for ParserRegistry {
    fn default() -> Self {
        Self::dhcp6()
    }
}

/// Reads a list of strings, rejecting other item types.
pub(crate) fn string_list<'a>(
    node: &'a ConfigNode,
    what: &str,
) -> Result<Vec<(&'a str, &'a ConfigNode)>, ValidationError> {
    node.as_list(what)?
        .iter()
        .map(|item| item.as_str(what).map(|text| (text, item)))
        .collect()
}
