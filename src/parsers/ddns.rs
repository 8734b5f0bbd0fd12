//! `dhcp-ddns`: the client side of the DHCP-DDNS (D2) connection.

use std::net::IpAddr;
use std::str::FromStr;

use serde::Serialize;

use crate::document::ConfigNode;
use crate::error::ValidationError;
use crate::srv_config::SrvConfig;

use super::ConfigParser;

const D2_KEYS: &[&str] = &[
    "enable-updates",
    "server-ip",
    "server-port",
    "sender-ip",
    "sender-port",
    "max-queue-size",
    "ncr-protocol",
    "ncr-format",
    "always-include-fqdn",
    "override-no-update",
    "override-client-update",
    "replace-client-name",
    "generated-prefix",
    "qualifying-suffix",
];

/// When the server replaces the client supplied host name.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReplaceClientNameMode {
    #[default]
    Never,
    Always,
    WhenPresent,
    WhenNotPresent,
}

impl FromStr for ReplaceClientNameMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "never" => Ok(Self::Never),
            "always" => Ok(Self::Always),
            "when-present" => Ok(Self::WhenPresent),
            "when-not-present" => Ok(Self::WhenNotPresent),
            other => Err(format!("invalid replace-client-name value '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct D2ClientConfig {
    pub enable_updates: bool,
    pub server_ip: IpAddr,
    pub server_port: u16,
    pub sender_ip: Option<IpAddr>,
    pub sender_port: u16,
    pub max_queue_size: u32,
    pub always_include_fqdn: bool,
    pub override_no_update: bool,
    pub override_client_update: bool,
    pub replace_client_name: ReplaceClientNameMode,
    pub generated_prefix: String,
    pub qualifying_suffix: String,
}

impl Default for D2ClientConfig {
    fn default() -> Self {
        Self {
            enable_updates: false,
            server_ip: IpAddr::from([127, 0, 0, 1]),
            server_port: 53001,
            sender_ip: None,
            sender_port: 0,
            max_queue_size: 1024,
            always_include_fqdn: false,
            override_no_update: false,
            override_client_update: false,
            replace_client_name: ReplaceClientNameMode::Never,
            generated_prefix: "myhost".to_string(),
            qualifying_suffix: String::new(),
        }
    }
}

pub struct D2ClientConfigParser;

fn parse_ip(node: &ConfigNode, key: &str) -> Result<IpAddr, ValidationError> {
    let text = node.as_str(key)?;
    text.parse().map_err(|_| {
        ValidationError::invalid(
            format!("invalid address '{}' for '{}'", text, key),
            node.position(),
        )
    })
}

impl ConfigParser for D2ClientConfigParser {
    fn parse(&self, node: &ConfigNode, staged: &mut SrvConfig) -> Result<(), ValidationError> {
        node.check_keys("dhcp-ddns", D2_KEYS)?;

        let server_ip = parse_ip(node.require("server-ip")?, "server-ip")?;
        let sender_node = node.require("sender-ip")?;
        let sender_ip = match sender_node.as_str("sender-ip")? {
            "" => None,
            _ => Some(parse_ip(sender_node, "sender-ip")?),
        };

        let protocol = node.require("ncr-protocol")?;
        if protocol.as_str("ncr-protocol")? != "UDP" {
            return Err(ValidationError::invalid(
                "only the UDP name change request protocol is supported",
                protocol.position(),
            ));
        }
        let format = node.require("ncr-format")?;
        if format.as_str("ncr-format")? != "JSON" {
            return Err(ValidationError::invalid(
                "only the JSON name change request format is supported",
                format.position(),
            ));
        }

        let replace_node = node.require("replace-client-name")?;
        let replace_client_name = replace_node
            .as_str("replace-client-name")?
            .parse()
            .map_err(|message| ValidationError::invalid(message, replace_node.position()))?;

        let config = D2ClientConfig {
            enable_updates: node.get_bool("enable-updates")?,
            server_ip,
            server_port: node.get_u16("server-port")?,
            sender_ip,
            sender_port: node.get_u16("sender-port")?,
            max_queue_size: node.get_u32("max-queue-size")?,
            always_include_fqdn: node.get_bool("always-include-fqdn")?,
            override_no_update: node.get_bool("override-no-update")?,
            override_client_update: node.get_bool("override-client-update")?,
            replace_client_name,
            generated_prefix: node.get_string("generated-prefix")?,
            qualifying_suffix: node.get_string("qualifying-suffix")?,
        };

        if config.enable_updates && config.qualifying_suffix.is_empty() {
            return Err(ValidationError::invalid(
                "'qualifying-suffix' is required when updates are enabled",
                node.position(),
            ));
        }
        if config.sender_ip.is_some_and(|sender| sender.is_ipv4() != config.server_ip.is_ipv4()) {
            return Err(ValidationError::invalid(
                "'server-ip' and 'sender-ip' must be of the same address family",
                sender_node.position(),
            ));
        }

        staged.d2_client = config;
        Ok(())
    }
}
