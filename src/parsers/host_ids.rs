//! `host-reservation-identifiers`: identifier types searched when matching
//! host reservations, in order.

use serde::Serialize;

use crate::document::ConfigNode;
use crate::error::ValidationError;
use crate::srv_config::SrvConfig;

use super::{ConfigParser, string_list};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum HostIdentifierType {
    HwAddress,
    Duid,
}

pub struct HostReservationIdsParser;

impl ConfigParser for HostReservationIdsParser {
    fn parse(&self, node: &ConfigNode, staged: &mut SrvConfig) -> Result<(), ValidationError> {
        let mut identifiers = Vec::new();
        for (token, item) in string_list(node, "host-reservation-identifiers")? {
            let identifier = match token {
                "hw-address" => HostIdentifierType::HwAddress,
                "duid" => HostIdentifierType::Duid,
                other => {
                    return Err(ValidationError::invalid(
                        format!("unsupported host reservation identifier '{}'", other),
                        item.position(),
                    ));
                }
            };
            if identifiers.contains(&identifier) {
                return Err(ValidationError::invalid(
                    format!("duplicate host reservation identifier '{}'", token),
                    item.position(),
                ));
            }
            identifiers.push(identifier);
        }
        if identifiers.is_empty() {
            return Err(ValidationError::invalid(
                "'host-reservation-identifiers' list must not be empty",
                node.position(),
            ));
        }
        staged.host_reservation_identifiers = identifiers;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_is_kept() {
        let mut staged = SrvConfig::new();
        HostReservationIdsParser
            .parse(&ConfigNode::parse(r#"["duid", "hw-address"]"#).unwrap(), &mut staged)
            .unwrap();
        assert_eq!(
            staged.host_reservation_identifiers,
            vec![HostIdentifierType::Duid, HostIdentifierType::HwAddress]
        );
    }

    #[test]
    fn test_rejected() {
        for text in ["[]", r#"["circuit-id"]"#, r#"["duid", "duid"]"#] {
            let mut staged = SrvConfig::new();
            assert!(HostReservationIdsParser
                .parse(&ConfigNode::parse(text).unwrap(), &mut staged)
                .is_err());
        }
    }
}
