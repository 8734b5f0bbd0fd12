//! `mac-sources`: where the server may learn a client's hardware address.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::document::ConfigNode;
use crate::error::ValidationError;
use crate::srv_config::SrvConfig;

use super::{ConfigParser, string_list};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum MacSource {
    Any,
    Raw,
    Duid,
    Ipv6LinkLocal,
    ClientLinkAddrOption,
    RemoteId,
    SubscriberId,
    DocsisCmts,
    DocsisModem,
}

impl FromStr for MacSource {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "any" => Ok(Self::Any),
            "raw" => Ok(Self::Raw),
            "duid" => Ok(Self::Duid),
            "ipv6-link-local" => Ok(Self::Ipv6LinkLocal),
            "client-link-addr-option" | "rfc6939" => Ok(Self::ClientLinkAddrOption),
            "remote-id" | "rfc4649" => Ok(Self::RemoteId),
            "subscriber-id" | "rfc4580" => Ok(Self::SubscriberId),
            "docsis-cmts" => Ok(Self::DocsisCmts),
            "docsis-modem" => Ok(Self::DocsisModem),
            other => Err(format!("unknown MAC source '{}'", other)),
        }
    }
}

impl fmt::Display for MacSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Any => "any",
            Self::Raw => "raw",
            Self::Duid => "duid",
            Self::Ipv6LinkLocal => "ipv6-link-local",
            Self::ClientLinkAddrOption => "client-link-addr-option",
            Self::RemoteId => "remote-id",
            Self::SubscriberId => "subscriber-id",
            Self::DocsisCmts => "docsis-cmts",
            Self::DocsisModem => "docsis-modem",
        };
        f.write_str(name)
    }
}

pub struct MacSourcesParser;

impl ConfigParser for MacSourcesParser {
    fn parse(&self, node: &ConfigNode, staged: &mut SrvConfig) -> Result<(), ValidationError> {
        let tokens = string_list(node, "mac-sources")?;
        if tokens.is_empty() {
            return Err(ValidationError::invalid(
                "if specified, the MAC address sources list must not be empty",
                node.position(),
            ));
        }

        let mut sources = Vec::with_capacity(tokens.len());
        for (token, item) in tokens {
            let source: MacSource = token
                .parse()
                .map_err(|message| ValidationError::invalid(message, item.position()))?;
            if sources.contains(&source) {
                return Err(ValidationError::invalid(
                    format!("MAC address source '{}' was specified twice", source),
                    item.position(),
                ));
            }
            sources.push(source);
        }
        staged.mac_sources = sources;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> Result<Vec<MacSource>, ValidationError> {
        let mut staged = SrvConfig::new();
        MacSourcesParser.parse(&ConfigNode::parse(text).unwrap(), &mut staged)?;
        Ok(staged.mac_sources)
    }

    #[test]
    fn test_aliases() {
        assert_eq!(
            parse(r#"["rfc6939", "remote-id", "duid"]"#).unwrap(),
            vec![MacSource::ClientLinkAddrOption, MacSource::RemoteId, MacSource::Duid]
        );
    }

    #[test]
    fn test_invalid_lists() {
        assert!(parse("[]").is_err());
        assert!(parse(r#"["bogus"]"#).is_err());
        assert!(parse(r#"["rfc4649", "remote-id"]"#).is_err());
    }
}
