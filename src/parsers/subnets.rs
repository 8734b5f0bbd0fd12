//! `subnet6`: subnets, their pools, prefix delegation pools and host
//! reservations.

use std::collections::HashSet;
use std::net::Ipv6Addr;
use std::str::FromStr;

use ipnetwork::Ipv6Network;
use serde::Serialize;

use crate::document::{ConfigNode, Position};
use crate::error::ValidationError;
use crate::options::{OptionSet, Universe};
use crate::srv_config::{SrvConfig, serialize_display, serialize_hex};

use super::{ConfigParser, option_data::parse_option_list};

const SUBNET_KEYS: &[&str] = &[
    "id",
    "subnet",
    "pools",
    "pd-pools",
    "option-data",
    "renew-timer",
    "rebind-timer",
    "preferred-lifetime",
    "valid-lifetime",
    "interface",
    "interface-id",
    "rapid-commit",
    "client-class",
    "reservation-mode",
    "reservations",
    "relay",
];

const POOL_KEYS: &[&str] = &["pool", "option-data", "client-class"];

const PD_POOL_KEYS: &[&str] = &["prefix", "prefix-len", "delegated-len", "option-data"];

const RESERVATION_KEYS: &[&str] = &["duid", "hw-address", "ip-addresses", "prefixes", "hostname"];

/// Which addresses host reservations may use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReservationMode {
    #[default]
    All,
    OutOfPool,
    Disabled,
}

impl FromStr for ReservationMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "all" => Ok(Self::All),
            "out-of-pool" => Ok(Self::OutOfPool),
            "disabled" => Ok(Self::Disabled),
            other => Err(format!("invalid reservation-mode '{}'", other)),
        }
    }
}

/// An address pool, stored as an inclusive range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct Pool6 {
    pub first: Ipv6Addr,
    pub last: Ipv6Addr,
    pub client_class: Option<String>,
    pub options: OptionSet,
}

impl Pool6 {
    pub fn contains(&self, address: Ipv6Addr) -> bool {
        (self.first..=self.last).contains(&address)
    }
}

/// A prefix delegation pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct PdPool {
    pub prefix: Ipv6Addr,
    pub prefix_len: u8,
    pub delegated_len: u8,
    pub options: OptionSet,
}

/// How a reserved host is identified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum HostIdentifier {
    Duid(#[serde(serialize_with = "serialize_hex")] Vec<u8>),
    HwAddress(#[serde(serialize_with = "serialize_hex")] Vec<u8>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct Reservation6 {
    pub identifier: HostIdentifier,
    pub ip_addresses: Vec<Ipv6Addr>,
    #[serde(serialize_with = "serialize_networks")]
    pub prefixes: Vec<Ipv6Network>,
    pub hostname: String,
}

fn serialize_networks<S: serde::Serializer>(
    networks: &[Ipv6Network],
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_seq(networks.iter().map(ToString::to_string))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct Subnet6 {
    pub id: u32,
    #[serde(serialize_with = "serialize_display")]
    pub prefix: Ipv6Network,
    pub renew_timer: u32,
    pub rebind_timer: u32,
    pub preferred_lifetime: u32,
    pub valid_lifetime: u32,
    pub interface: String,
    pub interface_id: String,
    pub rapid_commit: bool,
    pub client_class: String,
    pub reservation_mode: ReservationMode,
    pub relay: Option<Ipv6Addr>,
    pub pools: Vec<Pool6>,
    pub pd_pools: Vec<PdPool>,
    pub reservations: Vec<Reservation6>,
    pub options: OptionSet,
}

/// Parses the `subnet6` list.
///
/// Subnets without an explicit `id` get the lowest unused id counting from
/// 1, so an unchanged document always yields the same ids.
pub struct Subnets6ListParser {
    universe: Universe,
}

impl Subnets6ListParser {
    pub fn new(universe: Universe) -> Self {
        Self { universe }
    }

    fn parse_subnet(
        &self,
        entry: &ConfigNode,
        staged: &SrvConfig,
        id: u32,
    ) -> Result<Subnet6, ValidationError> {
        let prefix_node = entry.require("subnet")?;
        let prefix = parse_network(prefix_node.as_str("subnet")?, prefix_node.position())?;

        let interface = entry.get_string("interface")?;
        let interface_id = entry.get_string("interface-id")?;
        if !interface.is_empty() && !interface_id.is_empty() {
            return Err(ValidationError::invalid(
                format!(
                    "parameters 'interface' and 'interface-id' are mutually exclusive in subnet {}",
                    prefix
                ),
                entry.position(),
            ));
        }

        let mode_node = entry.require("reservation-mode")?;
        let reservation_mode = mode_node
            .as_str("reservation-mode")?
            .parse()
            .map_err(|message| ValidationError::invalid(message, mode_node.position()))?;

        let relay = match entry.get("relay") {
            Some(relay) => {
                relay.check_keys("relay", &["ip-address"])?;
                let address = relay.require("ip-address")?;
                Some(parse_address(address.as_str("ip-address")?, address.position())?)
            }
            None => None,
        };

        let options = match entry.get("option-data") {
            Some(list) => parse_option_list(list, self.universe, &staged.option_defs)?,
            None => OptionSet::default(),
        };

        let mut pools: Vec<Pool6> = Vec::new();
        if let Some(list) = entry.get("pools") {
            for pool_node in list.as_list("pools")? {
                let pool = self.parse_pool(pool_node, &prefix, staged)?;
                if pools
                    .iter()
                    .any(|other| other.first <= pool.last && pool.first <= other.last)
                {
                    return Err(ValidationError::invalid(
                        format!(
                            "pool {}-{} overlaps with another pool in subnet {}",
                            pool.first, pool.last, prefix
                        ),
                        pool_node.position(),
                    ));
                }
                pools.push(pool);
            }
        }

        let pd_pools = match entry.get("pd-pools") {
            Some(list) => list
                .as_list("pd-pools")?
                .iter()
                .map(|node| self.parse_pd_pool(node, staged))
                .collect::<Result<Vec<_>, _>>()?,
            None => Vec::new(),
        };

        let mut reservations: Vec<Reservation6> = Vec::new();
        if let Some(list) = entry.get("reservations") {
            for node in list.as_list("reservations")? {
                let reservation = parse_reservation(node, &prefix)?;
                if reservations
                    .iter()
                    .any(|other| other.identifier == reservation.identifier)
                {
                    return Err(ValidationError::invalid(
                        format!("duplicate host reservation in subnet {}", prefix),
                        node.position(),
                    ));
                }
                reservations.push(reservation);
            }
        }

        Ok(Subnet6 {
            id,
            prefix,
            renew_timer: entry.get_u32("renew-timer")?,
            rebind_timer: entry.get_u32("rebind-timer")?,
            preferred_lifetime: entry.get_u32("preferred-lifetime")?,
            valid_lifetime: entry.get_u32("valid-lifetime")?,
            interface,
            interface_id,
            rapid_commit: entry.get_bool("rapid-commit")?,
            client_class: entry.get_string("client-class")?,
            reservation_mode,
            relay,
            pools,
            pd_pools,
            reservations,
            options,
        })
    }

    fn parse_pool(
        &self,
        node: &ConfigNode,
        subnet: &Ipv6Network,
        staged: &SrvConfig,
    ) -> Result<Pool6, ValidationError> {
        node.check_keys("pool", POOL_KEYS)?;
        let pool_node = node.require("pool")?;
        let text = pool_node.as_str("pool")?;
        let position = pool_node.position();

        let (first, last) = match text.split_once('-') {
            Some((first, last)) => (
                parse_address(first.trim(), position)?,
                parse_address(last.trim(), position)?,
            ),
            None => {
                let network = parse_network(text, position)?;
                let first = u128::from(network.network());
                let last = first | !u128::from(network.mask());
                (network.network(), Ipv6Addr::from(last))
            }
        };
        if first > last {
            return Err(ValidationError::invalid(
                format!("invalid pool range {}: first address is greater than last", text),
                position,
            ));
        }
        if !subnet.contains(first) || !subnet.contains(last) {
            return Err(ValidationError::invalid(
                format!("pool {} does not belong to subnet {}", text, subnet),
                position,
            ));
        }

        let options = match node.get("option-data") {
            Some(list) => parse_option_list(list, self.universe, &staged.option_defs)?,
            None => OptionSet::default(),
        };
        Ok(Pool6 {
            first,
            last,
            client_class: node.opt_string("client-class")?,
            options,
        })
    }

    fn parse_pd_pool(
        &self,
        node: &ConfigNode,
        staged: &SrvConfig,
    ) -> Result<PdPool, ValidationError> {
        node.check_keys("pd-pool", PD_POOL_KEYS)?;
        let prefix_node = node.require("prefix")?;
        let prefix = parse_address(prefix_node.as_str("prefix")?, prefix_node.position())?;
        let prefix_len = node.require("prefix-len")?.as_int_in("prefix-len", 1, 128)? as u8;
        let delegated_len =
            node.require("delegated-len")?.as_int_in("delegated-len", 1, 128)? as u8;
        if delegated_len < prefix_len {
            return Err(ValidationError::invalid(
                format!(
                    "delegated length ({}) must not be shorter than prefix length ({}) in pd-pool {}/{}",
                    delegated_len, prefix_len, prefix, prefix_len
                ),
                node.position(),
            ));
        }
        let options = match node.get("option-data") {
            Some(list) => parse_option_list(list, self.universe, &staged.option_defs)?,
            None => OptionSet::default(),
        };
        Ok(PdPool {
            prefix,
            prefix_len,
            delegated_len,
            options,
        })
    }
}

impl ConfigParser for Subnets6ListParser {
    fn parse(&self, node: &ConfigNode, staged: &mut SrvConfig) -> Result<(), ValidationError> {
        let entries = node.as_list("subnet6")?;

        let mut taken = HashSet::new();
        let mut explicit = Vec::with_capacity(entries.len());
        for entry in entries {
            entry.check_keys("subnet6", SUBNET_KEYS)?;
            let id_node = entry.require("id")?;
            let id = id_node.as_int_in("id", 0, u32::MAX as i64)? as u32;
            if id != 0 && !taken.insert(id) {
                return Err(ValidationError::invalid(
                    format!("duplicate subnet identifier {}", id),
                    id_node.position(),
                ));
            }
            explicit.push(id);
        }

        let mut subnets: Vec<Subnet6> = Vec::with_capacity(entries.len());
        for (entry, id) in entries.iter().zip(explicit) {
            let id = match id {
                0 => staged.assign_subnet_id(&taken),
                id => id,
            };
            taken.insert(id);
            let subnet = self.parse_subnet(entry, staged, id)?;
            if subnets.iter().any(|other| other.prefix == subnet.prefix) {
                return Err(ValidationError::invalid(
                    format!("subnet {} is configured more than once", subnet.prefix),
                    entry.position(),
                ));
            }
            subnets.push(subnet);
        }

        staged.subnets = subnets;
        Ok(())
    }
}

fn parse_address(text: &str, position: Position) -> Result<Ipv6Addr, ValidationError> {
    text.parse().map_err(|_| {
        ValidationError::invalid(format!("'{}' is not a valid IPv6 address", text), position)
    })
}

fn parse_network(text: &str, position: Position) -> Result<Ipv6Network, ValidationError> {
    let network: Ipv6Network = text.parse().map_err(|error| {
        ValidationError::invalid(format!("invalid IPv6 prefix '{}': {}", text, error), position)
    })?;
    if !text.contains('/') {
        return Err(ValidationError::invalid(
            format!("invalid IPv6 prefix '{}': missing prefix length", text),
            position,
        ));
    }
    Ok(network)
}

fn parse_identifier(text: &str, position: Position) -> Result<Vec<u8>, ValidationError> {
    let digits: String = text.chars().filter(|c| *c != ':' && *c != '-').collect();
    match hex::decode(&digits) {
        Ok(bytes) if !bytes.is_empty() => Ok(bytes),
        _ => Err(ValidationError::invalid(
            format!("invalid host identifier '{}'", text),
            position,
        )),
    }
}

fn parse_reservation(
    node: &ConfigNode,
    subnet: &Ipv6Network,
) -> Result<Reservation6, ValidationError> {
    node.check_keys("reservation", RESERVATION_KEYS)?;
    let identifier = match (node.get("duid"), node.get("hw-address")) {
        (Some(duid), None) => {
            HostIdentifier::Duid(parse_identifier(duid.as_str("duid")?, duid.position())?)
        }
        (None, Some(hw)) => {
            HostIdentifier::HwAddress(parse_identifier(hw.as_str("hw-address")?, hw.position())?)
        }
        _ => {
            return Err(ValidationError::invalid(
                "exactly one of 'duid' or 'hw-address' must be specified for a reservation",
                node.position(),
            ));
        }
    };

    let mut ip_addresses = Vec::new();
    if let Some(list) = node.get("ip-addresses") {
        for (text, item) in super::string_list(list, "ip-addresses")? {
            let address = parse_address(text, item.position())?;
            if !subnet.contains(address) {
                return Err(ValidationError::invalid(
                    format!("reserved address {} does not belong to subnet {}", address, subnet),
                    item.position(),
                ));
            }
            ip_addresses.push(address);
        }
    }

    let prefixes = match node.get("prefixes") {
        Some(list) => super::string_list(list, "prefixes")?
            .into_iter()
            .map(|(text, item)| parse_network(text, item.position()))
            .collect::<Result<Vec<_>, _>>()?,
        None => Vec::new(),
    };

    Ok(Reservation6 {
        identifier,
        ip_addresses,
        prefixes,
        hostname: node.opt_string("hostname")?.unwrap_or_default(),
    })
}
