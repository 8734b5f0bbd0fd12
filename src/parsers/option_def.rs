//! `option-def`: runtime option definitions.

use crate::document::ConfigNode;
use crate::error::ValidationError;
use crate::options::codec::validate_space_name;
use crate::options::definition::standard_definition;
use crate::options::{OptionDataType, OptionDefinition, OptionKey, Universe};
use crate::srv_config::SrvConfig;

use super::ConfigParser;

const OPTION_DEF_KEYS: &[&str] = &[
    "name",
    "code",
    "type",
    "record-types",
    "space",
    "array",
    "encapsulate",
];

/// Parses the `option-def` list into the staged definition set.
pub struct OptionDefListParser {
    universe: Universe,
}

impl OptionDefListParser {
    pub fn new(universe: Universe) -> Self {
        Self { universe }
    }

    fn parse_definition(&self, entry: &ConfigNode) -> Result<OptionDefinition, ValidationError> {
        entry.check_keys("option-def", OPTION_DEF_KEYS)?;

        let name_node = entry.require("name")?;
        let name = name_node.as_str("name")?;
        validate_definition_name(name).map_err(|message| {
            ValidationError::invalid(message, name_node.position())
        })?;

        let max = match self.universe {
            Universe::V4 => 254,
            Universe::V6 => u16::MAX as i64,
        };
        let code = entry.require("code")?.as_int_in("code", 1, max)? as u16;

        let type_node = entry.require("type")?;
        let data_type: OptionDataType = type_node
            .as_str("type")?
            .parse()
            .map_err(|message| ValidationError::invalid(message, type_node.position()))?;

        let space_node = entry.require("space")?;
        let space = space_node.as_str("space")?;
        validate_space_name(space, space_node.position())?;

        let record_node = entry.require("record-types")?;
        let record_types = record_node.as_str("record-types")?;
        let record_fields = record_types
            .split(',')
            .map(str::trim)
            .filter(|field| !field.is_empty())
            .map(str::parse::<OptionDataType>)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|message| ValidationError::invalid(message, record_node.position()))?;
        if data_type != OptionDataType::Record && !record_fields.is_empty() {
            return Err(ValidationError::invalid(
                format!(
                    "record-types can only be specified for option definitions of type 'record', not '{}'",
                    data_type
                ),
                record_node.position(),
            ));
        }

        if space == self.universe.default_space()
            && standard_definition(self.universe, space, &OptionKey::Code(code)).is_some()
        {
            return Err(ValidationError::invalid(
                format!(
                    "unable to override definition of option '{}' in standard option space '{}'",
                    code, space
                ),
                entry.position(),
            ));
        }

        let mut definition = OptionDefinition::new(name, code, space, data_type);
        definition.record_fields = record_fields;
        definition.array = entry.get_bool("array")?;
        definition.encapsulate = entry.get_string("encapsulate")?;
        if !definition.encapsulate.is_empty() {
            validate_space_name(&definition.encapsulate, entry.require("encapsulate")?.position())?;
        }
        definition
            .validate()
            .map_err(|message| ValidationError::invalid(message, entry.position()))?;
        Ok(definition)
    }
}

fn validate_definition_name(name: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err("option definition name must not be empty".to_string());
    }
    if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
        return Err(format!("invalid option definition name '{}'", name));
    }
    if name.chars().all(|c| c.is_ascii_digit()) {
        return Err(format!("option definition name '{}' must not be numeric", name));
    }
    Ok(())
}

impl ConfigParser for OptionDefListParser {
    fn parse(&self, node: &ConfigNode, staged: &mut SrvConfig) -> Result<(), ValidationError> {
        for entry in node.as_list("option-def")? {
            let definition = self.parse_definition(entry)?;
            staged
                .option_defs
                .add(definition)
                .map_err(|message| ValidationError::invalid(message, entry.position()))?;
        }
        Ok(())
    }
}
