//! `relay-supplied-options`: options a relay may insert on a client's behalf.

use std::collections::BTreeSet;

use crate::document::ConfigNode;
use crate::error::ValidationError;
use crate::options::{DefinitionCatalog, Universe, resolve_option_code};
use crate::srv_config::SrvConfig;

use super::{ConfigParser, string_list};

/// Resolves each token of an RSOO list to an option code.
///
/// Tokens may be codes or option names in the universe's standard space.
/// Repeated codes are fine; the first token that fails to resolve aborts the
/// list.
pub fn parse_rsoo(
    node: &ConfigNode,
    universe: Universe,
    catalog: &DefinitionCatalog<'_>,
) -> Result<BTreeSet<u16>, ValidationError> {
    let mut codes = BTreeSet::new();
    for (token, item) in string_list(node, "relay-supplied-options")? {
        let code = resolve_option_code(
            token.trim(),
            universe.default_space(),
            catalog,
            item.position(),
        )?;
        codes.insert(code);
    }
    Ok(codes)
}

pub struct RsooListParser {
    universe: Universe,
}

impl RsooListParser {
    pub fn new(universe: Universe) -> Self {
        Self { universe }
    }
}

impl ConfigParser for RsooListParser {
    fn parse(&self, node: &ConfigNode, staged: &mut SrvConfig) -> Result<(), ValidationError> {
        let catalog = DefinitionCatalog::new(self.universe, &staged.option_defs);
        let codes = parse_rsoo(node, self.universe, &catalog)?;
        staged.rsoo.extend(codes);
        Ok(())
    }
}
