//! `client-classes`: named client classes with their own option data.
//!
//! The match expression in `test` is stored verbatim; evaluating it belongs
//! to the packet path.

use serde::Serialize;

use crate::document::ConfigNode;
use crate::error::ValidationError;
use crate::options::{OptionSet, Universe};
use crate::srv_config::SrvConfig;

use super::{ConfigParser, option_data::parse_option_list};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClientClassDef {
    pub name: String,
    pub test: String,
    pub options: OptionSet,
}

/// Client classes in definition order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ClientClassDictionary {
    classes: Vec<ClientClassDef>,
}

impl ClientClassDictionary {
    pub fn find(&self, name: &str) -> Option<&ClientClassDef> {
        self.classes.iter().find(|class| class.name == name)
    }

    pub fn add(&mut self, class: ClientClassDef) -> Result<(), String> {
        if self.find(&class.name).is_some() {
            return Err(format!("client class '{}' is already defined", class.name));
        }
        self.classes.push(class);
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = &ClientClassDef> {
        self.classes.iter()
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

pub struct ClientClassDefListParser {
    universe: Universe,
}

impl ClientClassDefListParser {
    pub fn new(universe: Universe) -> Self {
        Self { universe }
    }
}

impl ConfigParser for ClientClassDefListParser {
    fn parse(&self, node: &ConfigNode, staged: &mut SrvConfig) -> Result<(), ValidationError> {
        let mut dictionary = ClientClassDictionary::default();
        for entry in node.as_list("client-classes")? {
            entry.check_keys("client class", &["name", "test", "option-data"])?;
            let name_node = entry.require("name")?;
            let name = name_node.as_str("name")?;
            if name.is_empty() {
                return Err(ValidationError::invalid(
                    "client class name must not be empty",
                    name_node.position(),
                ));
            }
            let options = match entry.get("option-data") {
                Some(list) => parse_option_list(list, self.universe, &staged.option_defs)?,
                None => OptionSet::default(),
            };
            dictionary
                .add(ClientClassDef {
                    name: name.to_string(),
                    test: entry.opt_string("test")?.unwrap_or_default(),
                    options,
                })
                .map_err(|message| ValidationError::invalid(message, entry.position()))?;
        }
        staged.client_classes = dictionary;
        Ok(())
    }
}
