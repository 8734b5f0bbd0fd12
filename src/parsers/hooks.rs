//! `hooks-libraries`: libraries to load once the configuration commits.

use std::path::PathBuf;

use crate::document::ConfigNode;
use crate::error::ValidationError;
use crate::hooks::{HookLibrary, HooksConfig};
use crate::srv_config::SrvConfig;

use super::ConfigParser;

pub struct HooksLibrariesParser;

impl ConfigParser for HooksLibrariesParser {
    fn parse(&self, node: &ConfigNode, staged: &mut SrvConfig) -> Result<(), ValidationError> {
        let mut hooks = HooksConfig::default();
        for entry in node.as_list("hooks-libraries")? {
            entry.check_keys("hooks library", &["library", "parameters"])?;
            let library = entry.require("library")?;
            let path = library.as_str("library")?.trim();
            if path.is_empty() {
                return Err(ValidationError::invalid(
                    "value of 'library' element must not be blank",
                    library.position(),
                ));
            }
            hooks.add(HookLibrary {
                path: PathBuf::from(path),
                parameters: entry.get("parameters").map(ConfigNode::to_json),
                position: entry.position(),
            });
        }
        staged.hooks = hooks;
        Ok(())
    }
}
