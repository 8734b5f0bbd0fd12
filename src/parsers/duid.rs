//! `server-id`: how the server builds its DUID.

use std::str::FromStr;

use serde::Serialize;

use crate::document::ConfigNode;
use crate::error::ValidationError;
use crate::srv_config::{SrvConfig, serialize_hex};

use super::ConfigParser;

const SERVER_ID_KEYS: &[&str] = &[
    "type",
    "identifier",
    "htype",
    "time",
    "enterprise-id",
    "persist",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DuidType {
    /// Link-layer address plus time.
    #[serde(rename = "LLT")]
    Llt,
    /// Enterprise number plus identifier.
    #[serde(rename = "EN")]
    En,
    /// Link-layer address.
    #[serde(rename = "LL")]
    Ll,
}

impl FromStr for DuidType {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "LLT" => Ok(Self::Llt),
            "EN" => Ok(Self::En),
            "LL" => Ok(Self::Ll),
            other => Err(format!("unsupported DUID type '{}', expected LLT, EN or LL", other)),
        }
    }
}

/// Explicit DUID settings; anything left unset is generated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct DuidConfig {
    pub duid_type: DuidType,
    #[serde(serialize_with = "serialize_hex")]
    pub identifier: Vec<u8>,
    pub htype: Option<u16>,
    pub time: Option<u32>,
    pub enterprise_id: Option<u32>,
    pub persist: bool,
}

pub struct DuidConfigParser;

impl ConfigParser for DuidConfigParser {
    fn parse(&self, node: &ConfigNode, staged: &mut SrvConfig) -> Result<(), ValidationError> {
        node.check_keys("server-id", SERVER_ID_KEYS)?;

        let type_node = node.require("type")?;
        let duid_type = type_node
            .as_str("type")?
            .parse()
            .map_err(|message| ValidationError::invalid(message, type_node.position()))?;

        let identifier = match node.get("identifier") {
            Some(identifier) => {
                let text = identifier.as_str("identifier")?;
                hex::decode(text).map_err(|_| {
                    ValidationError::invalid(
                        format!(
                            "invalid server identifier '{}', expected hexadecimal digits",
                            text
                        ),
                        identifier.position(),
                    )
                })?
            }
            None => Vec::new(),
        };

        let htype = node
            .get("htype")
            .map(|htype| htype.as_int_in("htype", 0, u16::MAX as i64).map(|n| n as u16))
            .transpose()?;

        staged.duid = Some(DuidConfig {
            duid_type,
            identifier,
            htype,
            time: node.opt_u32("time")?,
            enterprise_id: node.opt_u32("enterprise-id")?,
            persist: node.opt_bool("persist")?.unwrap_or(true),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_llt() {
        let node = ConfigNode::parse(
            r#"{
                "type": "LLT",
                "identifier": "0a0b0c0d0e0f",
                "htype": 8,
                "time": 1234,
                "persist": false
            }"#,
        )
        .unwrap();
        let mut staged = SrvConfig::new();
        DuidConfigParser.parse(&node, &mut staged).unwrap();
        let duid = staged.duid.unwrap();
        assert_eq!(duid.duid_type, DuidType::Llt);
        assert_eq!(duid.identifier, vec![0x0a, 0x0b, 0x0c, 0x0d, 0x0e, 0x0f]);
        assert_eq!(duid.htype, Some(8));
        assert_eq!(duid.time, Some(1234));
        assert!(!duid.persist);
    }

    #[test]
    fn test_rejected() {
        for text in [
            r#"{"type": "UUID"}"#,
            r#"{"type": "EN", "identifier": "xyz"}"#,
            r#"{"type": "LL", "htype": 70000}"#,
            r#"{"identifier": "00"}"#,
        ] {
            let mut staged = SrvConfig::new();
            let node = ConfigNode::parse(text).unwrap();
            assert!(DuidConfigParser.parse(&node, &mut staged).is_err());
        }
    }
}
