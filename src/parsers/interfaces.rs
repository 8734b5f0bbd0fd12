//! `interfaces-config`: interfaces the server listens on.

use serde::Serialize;

use crate::document::ConfigNode;
use crate::error::ValidationError;
use crate::srv_config::SrvConfig;

use super::{ConfigParser, string_list};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct InterfacesConfig {
    /// Interface names, `*` for all, optionally `name/address` for unicast.
    pub interfaces: Vec<String>,
    pub re_detect: bool,
}

impl Default for InterfacesConfig {
    fn default() -> Self {
        Self {
            interfaces: Vec::new(),
            re_detect: true,
        }
    }
}

pub struct IfacesConfigParser;

impl ConfigParser for IfacesConfigParser {
    fn parse(&self, node: &ConfigNode, staged: &mut SrvConfig) -> Result<(), ValidationError> {
        node.check_keys("interfaces-config", &["interfaces", "re-detect"])?;

        let mut interfaces: Vec<String> = Vec::new();
        if let Some(list) = node.get("interfaces") {
            for (name, item) in string_list(list, "interfaces")? {
                let (iface, unicast) = match name.split_once('/') {
                    Some((iface, address)) => (iface, Some(address)),
                    None => (name, None),
                };
                if iface.is_empty() {
                    return Err(ValidationError::invalid(
                        format!("invalid interface name '{}'", name),
                        item.position(),
                    ));
                }
                if let Some(address) = unicast
                    && address.parse::<std::net::Ipv6Addr>().is_err()
                {
                    return Err(ValidationError::invalid(
                        format!("invalid unicast address '{}' for interface '{}'", address, iface),
                        item.position(),
                    ));
                }
                if interfaces.iter().any(|existing| existing == name) {
                    return Err(ValidationError::invalid(
                        format!("interface '{}' is specified more than once", name),
                        item.position(),
                    ));
                }
                interfaces.push(name.to_string());
            }
        }

        staged.interfaces = InterfacesConfig {
            interfaces,
            re_detect: node.opt_bool("re-detect")?.unwrap_or(true),
        };
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> Result<InterfacesConfig, ValidationError> {
        let mut staged = SrvConfig::new();
        IfacesConfigParser.parse(&ConfigNode::parse(text).unwrap(), &mut staged)?;
        Ok(staged.interfaces)
    }

    #[test]
    fn test_interfaces() {
        let config =
            parse(r#"{"interfaces": ["eth0", "eth1/2001:db8::1"], "re-detect": false}"#).unwrap();
        assert_eq!(config.interfaces, vec!["eth0", "eth1/2001:db8::1"]);
        assert!(!config.re_detect);
        assert!(parse(r#"{"interfaces": ["*"]}"#).unwrap().re_detect);
    }

    #[test]
    fn test_rejected() {
        assert!(parse(r#"{"interfaces": ["eth0", "eth0"]}"#).is_err());
        assert!(parse(r#"{"interfaces": ["/2001:db8::1"]}"#).is_err());
        assert!(parse(r#"{"interfaces": ["eth0/10.0.0.1"]}"#).is_err());
        assert!(parse(r#"{"interfaces": "eth0"}"#).is_err());
    }
}
