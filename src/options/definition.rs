//! Option definitions: the schema used to encode and decode option payloads.
//!
//! Standard definitions for the `dhcp4` and `dhcp6` spaces are compiled in.
//! Definitions added through the `option-def` configuration key are
//! "runtime" definitions; they are staged per load and only become visible
//! to the rest of the server once the load commits (see
//! [`RuntimeOptionDefs`]).
//!
//! # References
//!
//! - RFC 8415: Dynamic Host Configuration Protocol for IPv6 (DHCPv6)
//! - RFC 2132: DHCP Options and BOOTP Vendor Extensions

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use serde::Serialize;

use super::{DHCP4_OPTION_SPACE, DHCP6_OPTION_SPACE, OptionKey};

/// Protocol family a configuration is loaded for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Universe {
    V4,
    V6,
}

impl Universe {
    /// The option space used when a configuration entry names none.
    pub fn default_space(self) -> &'static str {
        match self {
            Self::V4 => DHCP4_OPTION_SPACE,
            Self::V6 => DHCP6_OPTION_SPACE,
        }
    }

    /// Largest option code the protocol can carry.
    pub fn max_code(self) -> u16 {
        match self {
            Self::V4 => u8::MAX as u16,
            Self::V6 => u16::MAX,
        }
    }

    /// Codes with a protocol meaning that cannot carry configured data.
    pub fn is_reserved_code(self, code: u16) -> bool {
        match self {
            Self::V4 => code == 0 || code == 255,
            Self::V6 => code == 0,
        }
    }
}

/// Type of one field of an option payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum OptionDataType {
    Empty,
    Binary,
    Boolean,
    Int8,
    Int16,
    Int32,
    Uint8,
    Uint16,
    Uint32,
    #[serde(rename = "ipv4-address")]
    Ipv4Address,
    #[serde(rename = "ipv6-address")]
    Ipv6Address,
    String,
    Fqdn,
    Record,
}

impl OptionDataType {
    /// Encoded width in bytes, or `None` for variable-length types.
    pub fn fixed_len(self) -> Option<usize> {
        match self {
            Self::Empty | Self::Record => Some(0),
            Self::Boolean | Self::Int8 | Self::Uint8 => Some(1),
            Self::Int16 | Self::Uint16 => Some(2),
            Self::Int32 | Self::Uint32 | Self::Ipv4Address => Some(4),
            Self::Ipv6Address => Some(16),
            Self::Binary | Self::String | Self::Fqdn => None,
        }
    }

    /// Types that swallow the remainder of the payload.
    ///
    /// An fqdn is self-delimiting, so it does not count.
    pub fn is_greedy(self) -> bool {
        matches!(self, Self::Binary | Self::String)
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Empty => "empty",
            Self::Binary => "binary",
            Self::Boolean => "boolean",
            Self::Int8 => "int8",
            Self::Int16 => "int16",
            Self::Int32 => "int32",
            Self::Uint8 => "uint8",
            Self::Uint16 => "uint16",
            Self::Uint32 => "uint32",
            Self::Ipv4Address => "ipv4-address",
            Self::Ipv6Address => "ipv6-address",
            Self::String => "string",
            Self::Fqdn => "fqdn",
            Self::Record => "record",
        }
    }
}

impl fmt::Display for OptionDataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for OptionDataType {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "empty" => Ok(Self::Empty),
            "binary" => Ok(Self::Binary),
            "boolean" => Ok(Self::Boolean),
            "int8" => Ok(Self::Int8),
            "int16" => Ok(Self::Int16),
            "int32" => Ok(Self::Int32),
            "uint8" => Ok(Self::Uint8),
            "uint16" => Ok(Self::Uint16),
            "uint32" => Ok(Self::Uint32),
            "ipv4-address" => Ok(Self::Ipv4Address),
            "ipv6-address" => Ok(Self::Ipv6Address),
            "string" => Ok(Self::String),
            "fqdn" => Ok(Self::Fqdn),
            "record" => Ok(Self::Record),
            other => Err(format!("unknown option data type '{}'", other)),
        }
    }
}

/// Schema of one option.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OptionDefinition {
    pub name: String,
    pub code: u16,
    pub space: String,
    #[serde(rename = "type")]
    pub data_type: OptionDataType,
    /// Field sequence of a `record` option; empty otherwise.
    #[serde(rename = "record-types")]
    pub record_fields: Vec<OptionDataType>,
    /// The trailing field repeats.
    pub array: bool,
    /// Space of sub-options carried by this option, if any.
    pub encapsulate: String,
}

impl OptionDefinition {
    pub fn new(name: &str, code: u16, space: &str, data_type: OptionDataType) -> Self {
        Self {
            name: name.to_string(),
            code,
            space: space.to_string(),
            data_type,
            record_fields: Vec::new(),
            array: false,
            encapsulate: String::new(),
        }
    }

    pub fn array(mut self) -> Self {
        self.array = true;
        self
    }

    pub fn record(mut self, fields: &[OptionDataType]) -> Self {
        self.data_type = OptionDataType::Record;
        self.record_fields = fields.to_vec();
        self
    }

    /// The ordered field types of the payload.
    ///
    /// A non-record option has a single field of its own type; an `empty`
    /// option has none.
    pub fn field_types(&self) -> Vec<OptionDataType> {
        match self.data_type {
            OptionDataType::Record => self.record_fields.clone(),
            OptionDataType::Empty => Vec::new(),
            other => vec![other],
        }
    }

    /// Checks the internal consistency of a definition.
    pub fn validate(&self) -> Result<(), String> {
        let fields = self.field_types();
        if self.data_type == OptionDataType::Record && fields.is_empty() {
            return Err(format!(
                "option definition '{}' of type 'record' requires record-types",
                self.name
            ));
        }
        for (index, field) in fields.iter().enumerate() {
            if matches!(field, OptionDataType::Record | OptionDataType::Empty) {
                return Err(format!(
                    "record field {} of option definition '{}' cannot be of type '{}'",
                    index, self.name, field
                ));
            }
            if field.is_greedy() && index + 1 != fields.len() {
                return Err(format!(
                    "field of type '{}' must be the last field of option definition '{}'",
                    field, self.name
                ));
            }
        }
        if self.array {
            if let Some(last) = fields.last().filter(|last| last.is_greedy()) {
                return Err(format!(
                    "option definition '{}' cannot be an array of '{}'",
                    self.name, last
                ));
            }
            if fields.is_empty() {
                return Err(format!(
                    "option definition '{}' cannot be an array of 'empty'",
                    self.name
                ));
            }
            if !self.encapsulate.is_empty() {
                return Err(format!(
                    "option definition '{}' cannot be an array and encapsulate a space",
                    self.name
                ));
            }
        }
        Ok(())
    }
}

/// Source of option definitions, keyed by space and code or name.
pub trait OptionDefinitionLookup {
    fn find(&self, space: &str, key: &OptionKey) -> Option<&OptionDefinition>;
}

/// Definitions grouped by option space.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct DefinitionSet {
    spaces: BTreeMap<String, Vec<OptionDefinition>>,
}

impl DefinitionSet {
    /// Adds a definition, rejecting a duplicate code or name in the same space.
    pub fn add(&mut self, definition: OptionDefinition) -> Result<(), String> {
        let space = self.spaces.entry(definition.space.clone()).or_default();
        if space.iter().any(|existing| existing.code == definition.code) {
            return Err(format!(
                "option definition with code '{}' already exists in option space '{}'",
                definition.code, definition.space
            ));
        }
        if space.iter().any(|existing| existing.name == definition.name) {
            return Err(format!(
                "option definition with name '{}' already exists in option space '{}'",
                definition.name, definition.space
            ));
        }
        space.push(definition);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.spaces.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = &OptionDefinition> {
        self.spaces.values().flatten()
    }
}

impl OptionDefinitionLookup for DefinitionSet {
    fn find(&self, space: &str, key: &OptionKey) -> Option<&OptionDefinition> {
        self.spaces.get(space)?.iter().find(|definition| match key {
            OptionKey::Code(code) => definition.code == *code,
            OptionKey::Name(name) => definition.name == *name,
        })
    }
}

/// Standard definitions first, then the given runtime set.
#[derive(Debug, Clone, Copy)]
pub struct DefinitionCatalog<'a> {
    universe: Universe,
    runtime: &'a DefinitionSet,
}

impl<'a> DefinitionCatalog<'a> {
    pub fn new(universe: Universe, runtime: &'a DefinitionSet) -> Self {
        Self { universe, runtime }
    }

    pub fn universe(&self) -> Universe {
        self.universe
    }
}

impl OptionDefinitionLookup for DefinitionCatalog<'_> {
    fn find(&self, space: &str, key: &OptionKey) -> Option<&OptionDefinition> {
        standard_definition(self.universe, space, key).or_else(|| self.runtime.find(space, key))
    }
}

/// Runtime option definitions shared with the rest of the server.
///
/// A load stages its definitions here; they replace the committed set only
/// when the load succeeds, and are dropped otherwise.
#[derive(Debug, Default)]
pub struct RuntimeOptionDefs {
    committed: DefinitionSet,
    pending: Option<DefinitionSet>,
}

impl RuntimeOptionDefs {
    pub fn stage(&mut self, definitions: DefinitionSet) {
        self.pending = Some(definitions);
    }

    /// Drops staged definitions, returning to the committed set.
    pub fn revert(&mut self) {
        self.pending = None;
    }

    pub fn commit(&mut self) {
        if let Some(pending) = self.pending.take() {
            self.committed = pending;
        }
    }

    /// The definitions the running server sees.
    pub fn committed(&self) -> &DefinitionSet {
        &self.committed
    }

    pub fn pending(&self) -> Option<&DefinitionSet> {
        self.pending.as_ref()
    }
}

/// Looks up a compiled-in definition. Only the universe's own space has any.
pub fn standard_definition(
    universe: Universe,
    space: &str,
    key: &OptionKey,
) -> Option<&'static OptionDefinition> {
    if space != universe.default_space() {
        return None;
    }
    let table: &'static [OptionDefinition] = match universe {
        Universe::V4 => &STANDARD_V4,
        Universe::V6 => &STANDARD_V6,
    };
    table.iter().find(|definition| match key {
        OptionKey::Code(code) => definition.code == *code,
        OptionKey::Name(name) => definition.name == *name,
    })
}

static STANDARD_V6: LazyLock<Vec<OptionDefinition>> = LazyLock::new(|| {
    use OptionDataType::*;
    let def = |name: &str, code: u16, data_type: OptionDataType| {
        OptionDefinition::new(name, code, DHCP6_OPTION_SPACE, data_type)
    };
    vec![
        def("clientid", 1, Binary),
        def("serverid", 2, Binary),
        def("ia-na", 3, Record).record(&[Uint32, Uint32, Uint32]),
        def("ia-ta", 4, Uint32),
        def("iaaddr", 5, Record).record(&[Ipv6Address, Uint32, Uint32]),
        def("oro", 6, Uint16).array(),
        def("preference", 7, Uint8),
        def("elapsed-time", 8, Uint16),
        def("relay-msg", 9, Binary),
        def("unicast", 12, Ipv6Address),
        def("status-code", 13, Record).record(&[Uint16, String]),
        def("rapid-commit", 14, Empty),
        def("user-class", 15, Binary),
        def("vendor-class", 16, Record).record(&[Uint32, Binary]),
        def("interface-id", 18, Binary),
        def("reconf-msg", 19, Uint8),
        def("reconf-accept", 20, Empty),
        def("sip-server-dns", 21, Fqdn).array(),
        def("sip-server-addr", 22, Ipv6Address).array(),
        def("dns-servers", 23, Ipv6Address).array(),
        def("domain-search", 24, Fqdn).array(),
        def("ia-pd", 25, Record).record(&[Uint32, Uint32, Uint32]),
        def("iaprefix", 26, Record).record(&[Uint32, Uint32, Uint8, Ipv6Address]),
        def("nis-servers", 27, Ipv6Address).array(),
        def("nisp-servers", 28, Ipv6Address).array(),
        def("nis-domain-name", 29, Fqdn).array(),
        def("nisp-domain-name", 30, Fqdn).array(),
        def("sntp-servers", 31, Ipv6Address).array(),
        def("information-refresh-time", 32, Uint32),
        def("bcmcs-server-dns", 33, Fqdn).array(),
        def("bcmcs-server-addr", 34, Ipv6Address).array(),
        def("geoconf-civic", 36, Record).record(&[Uint8, Uint16, Binary]),
        def("remote-id", 37, Record).record(&[Uint32, Binary]),
        def("subscriber-id", 38, Binary),
        def("client-fqdn", 39, Record).record(&[Uint8, Fqdn]),
        def("pana-agent", 40, Ipv6Address).array(),
        def("new-posix-timezone", 41, String),
        def("new-tzdb-timezone", 42, String),
        def("ero", 43, Uint16).array(),
        def("lq-query", 44, Record).record(&[Uint8, Ipv6Address]),
        def("client-data", 45, Empty),
        def("clt-time", 46, Uint32),
        def("lq-relay-data", 47, Record).record(&[Ipv6Address, Binary]),
        def("lq-client-link", 48, Ipv6Address).array(),
        def("bootfile-url", 59, String),
        def("client-arch-type", 61, Uint16).array(),
        def("nii", 62, Record).record(&[Uint8, Uint8, Uint8]),
        def("aftr-name", 64, Fqdn),
        def("erp-local-domain-name", 65, Fqdn),
        def("rsoo", 66, Empty),
        def("client-linklayer-addr", 79, Binary),
    ]
});

static STANDARD_V4: LazyLock<Vec<OptionDefinition>> = LazyLock::new(|| {
    use OptionDataType::*;
    let def = |name: &str, code: u16, data_type: OptionDataType| {
        OptionDefinition::new(name, code, DHCP4_OPTION_SPACE, data_type)
    };
    vec![
        def("subnet-mask", 1, Ipv4Address),
        def("time-offset", 2, Int32),
        def("routers", 3, Ipv4Address).array(),
        def("time-servers", 4, Ipv4Address).array(),
        def("name-servers", 5, Ipv4Address).array(),
        def("domain-name-servers", 6, Ipv4Address).array(),
        def("log-servers", 7, Ipv4Address).array(),
        def("host-name", 12, String),
        def("boot-size", 13, Uint16),
        def("merit-dump", 14, String),
        def("domain-name", 15, Fqdn),
        def("swap-server", 16, Ipv4Address),
        def("root-path", 17, String),
        def("extensions-path", 18, String),
        def("ip-forwarding", 19, Boolean),
        def("default-ip-ttl", 23, Uint8),
        def("interface-mtu", 26, Uint16),
        def("broadcast-address", 28, Ipv4Address),
        def("static-routes", 33, Ipv4Address).array(),
        def("nis-domain", 40, String),
        def("nis-servers", 41, Ipv4Address).array(),
        def("ntp-servers", 42, Ipv4Address).array(),
        def("vendor-encapsulated-options", 43, Empty),
        def("netbios-name-servers", 44, Ipv4Address).array(),
        def("dhcp-lease-time", 51, Uint32),
        def("dhcp-server-identifier", 54, Ipv4Address),
        def("dhcp-renewal-time", 58, Uint32),
        def("dhcp-rebinding-time", 59, Uint32),
        def("vendor-class-identifier", 60, Binary),
        def("tftp-server-name", 66, String),
        def("boot-file-name", 67, String),
        def("user-class", 77, Binary),
        def("domain-search", 119, Fqdn).array(),
    ]
});
