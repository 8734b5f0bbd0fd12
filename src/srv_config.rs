//! Server configuration assembled by a load.
//!
//! The same type serves as the staged configuration (filled in by the
//! parsers of one load) and the current configuration (what the running
//! server reads). A staged value only ever becomes current whole.

use std::collections::{BTreeSet, HashSet};
use std::fmt::Display;

use serde::{Serialize, Serializer};

use crate::channel::SocketDescriptor;
use crate::hooks::HooksConfig;
use crate::options::{DefinitionSet, OptionSet};
use crate::parsers::client_classes::ClientClassDictionary;
use crate::parsers::db_access::DbAccessConfig;
use crate::parsers::ddns::D2ClientConfig;
use crate::parsers::duid::DuidConfig;
use crate::parsers::expiration::ExpirationConfig;
use crate::parsers::host_ids::HostIdentifierType;
use crate::parsers::interfaces::InterfacesConfig;
use crate::parsers::mac_sources::MacSource;
use crate::parsers::subnets::Subnet6;

/// Option code of `erp-local-domain-name`, accepted from relays unless the
/// configuration says otherwise.
pub const DEFAULT_RSOO_CODE: u16 = 65;

/// Default `decline-probation-period`, in seconds.
pub const DEFAULT_DECLINE_PROBATION_PERIOD: u32 = 86400;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct SrvConfig {
    pub subnets: Vec<Subnet6>,
    pub option_defs: DefinitionSet,
    pub options: OptionSet,
    pub duid: Option<DuidConfig>,
    pub mac_sources: Vec<MacSource>,
    pub client_classes: ClientClassDictionary,
    pub hooks: HooksConfig,
    pub control_socket: Option<SocketDescriptor>,
    pub d2_client: D2ClientConfig,
    pub rsoo: BTreeSet<u16>,
    pub db_access: DbAccessConfig,
    pub decline_probation_period: u32,
    pub dhcp4o6_port: u16,
    pub interfaces: InterfacesConfig,
    pub host_reservation_identifiers: Vec<HostIdentifierType>,
    pub expiration: ExpirationConfig,
    #[serde(skip)]
    next_subnet_id: u32,
}

impl SrvConfig {
    /// An empty configuration; subnet ids start again at 1.
    pub fn new() -> Self {
        Self {
            subnets: Vec::new(),
            option_defs: DefinitionSet::default(),
            options: OptionSet::default(),
            duid: None,
            mac_sources: Vec::new(),
            client_classes: ClientClassDictionary::default(),
            hooks: HooksConfig::default(),
            control_socket: None,
            d2_client: D2ClientConfig::default(),
            rsoo: BTreeSet::from([DEFAULT_RSOO_CODE]),
            db_access: DbAccessConfig::default(),
            decline_probation_period: DEFAULT_DECLINE_PROBATION_PERIOD,
            dhcp4o6_port: 0,
            interfaces: InterfacesConfig::default(),
            host_reservation_identifiers: vec![
                HostIdentifierType::HwAddress,
                HostIdentifierType::Duid,
            ],
            expiration: ExpirationConfig::default(),
            next_subnet_id: 1,
        }
    }

    /// Hands out the next subnet id not in `taken`.
    pub(crate) fn assign_subnet_id(&mut self, taken: &HashSet<u32>) -> u32 {
        while taken.contains(&self.next_subnet_id) {
            self.next_subnet_id += 1;
        }
        let id = self.next_subnet_id;
        self.next_subnet_id += 1;
        id
    }

    pub fn subnet(&self, id: u32) -> Option<&Subnet6> {
        self.subnets.iter().find(|subnet| subnet.id == id)
    }

    /// One line describing the configuration, for the log.
    pub fn summary(&self) -> String {
        let mut parts = vec![match self.subnets.len() {
            0 => "no IPv6 subnets configured".to_string(),
            1 => "added IPv6 subnets: 1".to_string(),
            count => format!("added IPv6 subnets: {}", count),
        }];
        if !self.options.is_empty() {
            parts.push(format!("global options: {}", self.options.len()));
        }
        if !self.option_defs.is_empty() {
            parts.push(format!("option definitions: {}", self.option_defs.len()));
        }
        if !self.client_classes.is_empty() {
            parts.push(format!("client classes: {}", self.client_classes.len()));
        }
        if let Some(socket) = &self.control_socket {
            parts.push(format!("control socket: {}", socket.socket_name));
        }
        parts.push(format!(
            "DDNS: {}",
            if self.d2_client.enable_updates { "enabled" } else { "disabled" }
        ));
        parts.join("; ")
    }
}

impl Default for SrvConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Serializes a field through its `Display` impl.
pub fn serialize_display<T: Display, S: Serializer>(
    value: &T,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_str(value)
}

/// Serializes raw bytes as a lowercase hex string.
pub(crate) fn serialize_hex<S: Serializer>(data: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&hex::encode(data))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_config() {
        let config = SrvConfig::new();
        assert_eq!(config.rsoo, BTreeSet::from([DEFAULT_RSOO_CODE]));
        assert_eq!(config.decline_probation_period, 86400);
        assert_eq!(config.summary(), "no IPv6 subnets configured; DDNS: disabled");
    }

    #[test]
    fn test_subnet_ids_skip_taken() {
        let mut config = SrvConfig::new();
        let taken = HashSet::from([1, 3]);
        assert_eq!(config.assign_subnet_id(&taken), 2);
        assert_eq!(config.assign_subnet_id(&taken), 4);
        assert_eq!(config.assign_subnet_id(&taken), 5);
    }

    #[test]
    fn test_serializes_to_json() {
        let json = serde_json::to_value(SrvConfig::new()).unwrap();
        assert_eq!(json["rsoo"], serde_json::json!([65]));
        assert_eq!(json["d2-client"]["server-port"], serde_json::json!(53001));
        assert!(json.get("next-subnet-id").is_none());
    }

    #[test]
    fn test_byte_fields_serialize_as_hex() {
        #[derive(Serialize)]
        struct Payload {
            #[serde(serialize_with = "serialize_hex")]
            data: Vec<u8>,
        }

        let json = serde_json::to_value(Payload {
            data: vec![0x00, 0x0a, 0xff],
        })
        .unwrap();
        assert_eq!(json["data"], "000aff");
    }
}
