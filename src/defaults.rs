//! Default values and global-to-subnet derivation.
//!
//! [`apply_defaults_and_derive`] runs before any parser sees the document.
//! It returns a new tree in which every parameter that has a documented
//! default is present, and in which every `subnet6` entry carries its own
//! copy of the global timers unless it set them itself. Inserted nodes have
//! no source position (`0:0`).
//!
//! Only subnets inherit; pools inside a subnet are left as written.

use crate::document::{ConfigNode, Position, Value};
use crate::error::ValidationError;
use crate::options::DHCP6_OPTION_SPACE;

/// A built-in default value.
#[derive(Clone, Copy)]
enum Builtin {
    Int(i64),
    Bool(bool),
    Str(&'static str),
}

impl Builtin {
    fn to_node(self) -> ConfigNode {
        let value = match self {
            Self::Int(number) => Value::Int(number),
            Self::Bool(flag) => Value::Bool(flag),
            Self::Str(text) => Value::String(text.to_string()),
        };
        ConfigNode::new(value, Position::default())
    }
}

/// A parameter name and the value used when it is missing.
type ParamDefault = (&'static str, Builtin);

const GLOBAL_DEFAULTS: &[ParamDefault] = &[
    ("renew-timer", Builtin::Int(900)),
    ("rebind-timer", Builtin::Int(1800)),
    ("preferred-lifetime", Builtin::Int(3600)),
    ("valid-lifetime", Builtin::Int(7200)),
    ("decline-probation-period", Builtin::Int(86400)),
    ("dhcp4o6-port", Builtin::Int(0)),
];

/// Global parameters copied into subnets that do not set them.
pub const INHERITED_PARAMETERS: &[&str] = &[
    "renew-timer",
    "rebind-timer",
    "preferred-lifetime",
    "valid-lifetime",
];

const OPTION_DEF_DEFAULTS: &[ParamDefault] = &[
    ("record-types", Builtin::Str("")),
    ("space", Builtin::Str(DHCP6_OPTION_SPACE)),
    ("array", Builtin::Bool(false)),
    ("encapsulate", Builtin::Str("")),
];

// csv-format stays unset: no value means "csv when a definition exists".
const OPTION_DATA_DEFAULTS: &[ParamDefault] = &[
    ("space", Builtin::Str(DHCP6_OPTION_SPACE)),
    ("always-send", Builtin::Bool(false)),
];

const SUBNET_DEFAULTS: &[ParamDefault] = &[
    ("id", Builtin::Int(0)),
    ("interface", Builtin::Str("")),
    ("interface-id", Builtin::Str("")),
    ("client-class", Builtin::Str("")),
    ("rapid-commit", Builtin::Bool(false)),
    ("reservation-mode", Builtin::Str("all")),
];

const IFACE_DEFAULTS: &[ParamDefault] = &[("re-detect", Builtin::Bool(true))];

const D2_CLIENT_DEFAULTS: &[ParamDefault] = &[
    ("enable-updates", Builtin::Bool(false)),
    ("server-ip", Builtin::Str("127.0.0.1")),
    ("server-port", Builtin::Int(53001)),
    ("sender-ip", Builtin::Str("")),
    ("sender-port", Builtin::Int(0)),
    ("max-queue-size", Builtin::Int(1024)),
    ("ncr-protocol", Builtin::Str("UDP")),
    ("ncr-format", Builtin::Str("JSON")),
    ("always-include-fqdn", Builtin::Bool(false)),
    ("override-no-update", Builtin::Bool(false)),
    ("override-client-update", Builtin::Bool(false)),
    ("replace-client-name", Builtin::Str("never")),
    ("generated-prefix", Builtin::Str("myhost")),
    ("qualifying-suffix", Builtin::Str("")),
];

const EXPIRATION_DEFAULTS: &[ParamDefault] = &[
    ("reclaim-timer-wait-time", Builtin::Int(10)),
    ("flush-reclaimed-timer-wait-time", Builtin::Int(25)),
    ("hold-reclaimed-time", Builtin::Int(3600)),
    ("max-reclaim-leases", Builtin::Int(100)),
    ("max-reclaim-time", Builtin::Int(250)),
    ("unwarned-reclaim-cycles", Builtin::Int(5)),
];

/// Fills in defaults, then copies inherited globals into each subnet.
///
/// The input is not modified. The root must be a map.
pub fn apply_defaults_and_derive(root: &ConfigNode) -> Result<ConfigNode, ValidationError> {
    root.as_map("Dhcp6")?;
    let mut config = root.clone();
    set_all_defaults(&mut config);
    derive_parameters(&mut config);
    Ok(config)
}

fn set_defaults(map: &mut ConfigNode, defaults: &[ParamDefault]) {
    if map.entries().is_none() {
        return;
    }
    for (key, value) in defaults {
        if !map.contains_key(key) {
            map.set(key, value.to_node());
        }
    }
}

/// Applies `defaults` to every map in the list stored under `key`.
fn set_list_defaults(parent: &mut ConfigNode, key: &str, defaults: &[ParamDefault]) {
    if let Some(items) = parent.get_mut(key).and_then(ConfigNode::items_mut) {
        for item in items {
            set_defaults(item, defaults);
        }
    }
}

fn set_all_defaults(config: &mut ConfigNode) {
    set_defaults(config, GLOBAL_DEFAULTS);
    set_list_defaults(config, "option-def", OPTION_DEF_DEFAULTS);
    set_list_defaults(config, "option-data", OPTION_DATA_DEFAULTS);

    if let Some(subnets) = config.get_mut("subnet6").and_then(ConfigNode::items_mut) {
        for subnet in subnets {
            set_defaults(subnet, SUBNET_DEFAULTS);
            set_list_defaults(subnet, "option-data", OPTION_DATA_DEFAULTS);
            for pools in ["pools", "pd-pools"] {
                if let Some(pools) = subnet.get_mut(pools).and_then(ConfigNode::items_mut) {
                    for pool in pools {
                        set_list_defaults(pool, "option-data", OPTION_DATA_DEFAULTS);
                    }
                }
            }
        }
    }

    if let Some(classes) = config.get_mut("client-classes").and_then(ConfigNode::items_mut) {
        for class in classes {
            set_list_defaults(class, "option-data", OPTION_DATA_DEFAULTS);
        }
    }

    if let Some(ifaces) = config.get_mut("interfaces-config") {
        set_defaults(ifaces, IFACE_DEFAULTS);
    }
    if let Some(d2) = config.get_mut("dhcp-ddns") {
        set_defaults(d2, D2_CLIENT_DEFAULTS);
    }

    if !config.contains_key("expired-leases-processing") {
        config.set(
            "expired-leases-processing",
            ConfigNode::new(Value::Map(Vec::new()), Position::default()),
        );
    }
    if let Some(expiration) = config.get_mut("expired-leases-processing") {
        set_defaults(expiration, EXPIRATION_DEFAULTS);
    }
}

fn derive_parameters(config: &mut ConfigNode) {
    let inherited: Vec<(&str, ConfigNode)> = INHERITED_PARAMETERS
        .iter()
        .filter_map(|key| config.get(key).map(|node| (*key, node.clone())))
        .collect();

    if let Some(subnets) = config.get_mut("subnet6").and_then(ConfigNode::items_mut) {
        for subnet in subnets.iter_mut().filter(|subnet| subnet.entries().is_some()) {
            for (key, node) in &inherited {
                if !subnet.contains_key(key) {
                    subnet.set(key, node.clone());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int(node: &ConfigNode, key: &str) -> i64 {
        node.get(key).unwrap().as_int(key).unwrap()
    }

    #[test]
    fn test_global_defaults() {
        let config = apply_defaults_and_derive(&ConfigNode::from(serde_json::json!({}))).unwrap();
        assert_eq!(int(&config, "renew-timer"), 900);
        assert_eq!(int(&config, "valid-lifetime"), 7200);
        assert_eq!(int(&config, "decline-probation-period"), 86400);
        let expiration = config.get("expired-leases-processing").unwrap();
        assert_eq!(int(expiration, "max-reclaim-time"), 250);
        assert!(config.get("dhcp-ddns").is_none());
    }

    #[test]
    fn test_explicit_values_win() {
        let root = ConfigNode::from(serde_json::json!({
            "renew-timer": 1000,
            "subnet6": [
                { "subnet": "2001:db8:1::/64" },
                { "subnet": "2001:db8:2::/64", "renew-timer": 50 }
            ]
        }));
        let config = apply_defaults_and_derive(&root).unwrap();
        let subnets = config.get("subnet6").unwrap().items().unwrap();
        assert_eq!(int(&subnets[0], "renew-timer"), 1000);
        assert_eq!(int(&subnets[0], "rebind-timer"), 1800);
        assert_eq!(int(&subnets[1], "renew-timer"), 50);
        assert_eq!(int(&subnets[1], "id"), 0);
        assert_eq!(
            subnets[1].get("reservation-mode").unwrap().as_str("reservation-mode").unwrap(),
            "all"
        );
    }

    #[test]
    fn test_pools_do_not_inherit_timers() {
        let root = ConfigNode::from(serde_json::json!({
            "subnet6": [{
                "subnet": "2001:db8:1::/64",
                "pools": [{ "pool": "2001:db8:1::/80", "option-data": [{ "code": 1000 }] }]
            }]
        }));
        let config = apply_defaults_and_derive(&root).unwrap();
        let pool = &config.get("subnet6").unwrap().items().unwrap()[0]
            .get("pools")
            .unwrap()
            .items()
            .unwrap()[0];
        assert!(pool.get("renew-timer").is_none());
        let option = &pool.get("option-data").unwrap().items().unwrap()[0];
        assert!(option.get("always-send").is_some());
        assert!(option.get("csv-format").is_none());
    }

    #[test]
    fn test_input_is_untouched() {
        let root = ConfigNode::from(serde_json::json!({ "option-def": [{ "name": "foo" }] }));
        let before = root.clone();
        let config = apply_defaults_and_derive(&root).unwrap();
        assert_eq!(root, before);
        let definition = &config.get("option-def").unwrap().items().unwrap()[0];
        assert_eq!(definition.get("space").unwrap().as_str("space").unwrap(), "dhcp6");
    }

    #[test]
    fn test_existing_positions_are_kept() {
        let root =
            ConfigNode::parse("{\n  \"subnet6\": [ { \"subnet\": \"2001:db8::/64\" } ]\n}")
                .unwrap();
        let config = apply_defaults_and_derive(&root).unwrap();
        let subnet = &config.get("subnet6").unwrap().items().unwrap()[0];
        assert_eq!(subnet.get("subnet").unwrap().position(), Position::new(2, 28));
        assert_eq!(subnet.get("id").unwrap().position(), Position::default());
    }

    #[test]
    fn test_root_must_be_map() {
        assert!(apply_defaults_and_derive(&ConfigNode::from(serde_json::json!([]))).is_err());
    }
}
