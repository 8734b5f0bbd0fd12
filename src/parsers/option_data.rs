//! `option-data` lists, at global scope and inside subnets, pools and client
//! classes.

use crate::document::{ConfigNode, Value};
use crate::error::ValidationError;
use crate::options::{
    DefinitionCatalog, DefinitionSet, OptionDataSpec, OptionSet, Universe, decode_option,
};
use crate::srv_config::SrvConfig;

use super::ConfigParser;

const OPTION_DATA_KEYS: &[&str] = &["name", "code", "data", "csv-format", "space", "always-send"];

/// Reads one `option-data` entry into a codec specification.
pub fn option_spec(entry: &ConfigNode) -> Result<OptionDataSpec, ValidationError> {
    entry.check_keys("option-data", OPTION_DATA_KEYS)?;

    // A code given as a string is a configuration mistake, not a name.
    let code = entry.get("code").map(|node| node.as_int("code")).transpose()?;

    // csv-format may be null to ask for the definition-driven default.
    let csv_format = match entry.get("csv-format") {
        Some(node) if *node.value() == Value::Null => None,
        Some(node) => Some(node.as_bool("csv-format")?),
        None => None,
    };

    Ok(OptionDataSpec {
        code,
        name: entry.opt_string("name")?,
        data: entry.opt_string("data")?.unwrap_or_default(),
        csv_format,
        persistent: entry.opt_bool("always-send")?.unwrap_or(false),
        space: entry.opt_string("space")?,
        position: entry.position(),
    })
}

/// Decodes an `option-data` list against the standard definitions and the
/// runtime definitions staged by this load.
pub fn parse_option_list(
    node: &ConfigNode,
    universe: Universe,
    runtime: &DefinitionSet,
) -> Result<OptionSet, ValidationError> {
    let catalog = DefinitionCatalog::new(universe, runtime);
    let mut options = OptionSet::default();
    for entry in node.as_list("option-data")? {
        let spec = option_spec(entry)?;
        let (descriptor, _space) = decode_option(&spec, universe, &catalog)?;
        options
            .add(descriptor)
            .map_err(|message| ValidationError::invalid(message, entry.position()))?;
    }
    Ok(options)
}

/// Parses the global `option-data` list.
pub struct OptionDataListParser {
    universe: Universe,
}

impl OptionDataListParser {
    pub fn new(universe: Universe) -> Self {
        Self { universe }
    }
}

impl ConfigParser for OptionDataListParser {
    fn parse(&self, node: &ConfigNode, staged: &mut SrvConfig) -> Result<(), ValidationError> {
        staged.options = parse_option_list(node, self.universe, &staged.option_defs)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Position;
    use crate::options::{DHCP6_OPTION_SPACE, OptionDataType, OptionDefinition};

    fn parse(text: &str) -> Result<SrvConfig, ValidationError> {
        let node = ConfigNode::parse(text).unwrap();
        let mut staged = SrvConfig::new();
        OptionDataListParser::new(Universe::V6).parse(&node, &mut staged)?;
        Ok(staged)
    }

    #[test]
    fn test_standard_option_by_name() {
        let staged =
            parse(r#"[{ "name": "dns-servers", "data": "2001:db8::1, 2001:db8::2" }]"#).unwrap();
        let option = staged.options.get(DHCP6_OPTION_SPACE, 23).unwrap();
        assert_eq!(option.data.len(), 32);
        assert!(!option.persistent);
    }

    #[test]
    fn test_code_without_definition_is_hex() {
        let staged = parse(r#"[{ "code": 1000, "data": "0A0B", "always-send": true }]"#).unwrap();
        let option = staged.options.get(DHCP6_OPTION_SPACE, 1000).unwrap();
        assert_eq!(option.data, vec![0x0a, 0x0b]);
        assert!(option.persistent);
    }

    #[test]
    fn test_csv_format_false_uses_hex() {
        let staged =
            parse(r#"[{ "name": "preference", "data": "ff", "csv-format": false }]"#).unwrap();
        assert_eq!(staged.options.get(DHCP6_OPTION_SPACE, 7).unwrap().data, vec![0xff]);
    }

    #[test]
    fn test_runtime_definition_is_used() {
        let node =
            ConfigNode::parse(r#"[{ "name": "foo", "space": "isc", "data": "12" }]"#).unwrap();
        let mut staged = SrvConfig::new();
        staged
            .option_defs
            .add(OptionDefinition::new("foo", 100, "isc", OptionDataType::Uint16))
            .unwrap();
        OptionDataListParser::new(Universe::V6).parse(&node, &mut staged).unwrap();
        assert_eq!(staged.options.get("isc", 100).unwrap().data, vec![0, 12]);
    }

    #[test]
    fn test_errors() {
        let unknown = parse(r#"[{ "name": "no-such-option", "data": "" }]"#).unwrap_err();
        assert!(matches!(unknown, ValidationError::UnknownOption { .. }));

        let string_code = parse(r#"[{ "code": "23", "data": "" }]"#).unwrap_err();
        assert!(string_code.to_string().contains("expected integer"));

        let bad_key = parse(r#"[{ "code": 23, "colour": "red" }]"#).unwrap_err();
        assert!(bad_key.to_string().contains("unsupported parameter 'colour'"));

        let too_big = parse(r#"[{ "code": 70000, "data": "" }]"#).unwrap_err();
        assert!(matches!(too_big, ValidationError::OutOfRange { .. }));
    }

    #[test]
    fn test_duplicate_option_rejected() {
        let error = parse(
            "[\n { \"code\": 1000, \"data\": \"01\" },\n { \"code\": 1000, \"data\": \"02\" }\n]",
        )
        .unwrap_err();
        assert_eq!(error.position(), Position::new(3, 2));
    }
}
