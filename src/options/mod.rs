//! DHCP option identities, definitions and configured option values.
//!
//! Options are identified either by numeric code or by symbolic name within a
//! named option space (`dhcp6`, `dhcp4`, or a user defined vendor space).
//! [`resolve_option_code`] is the single place that turns such a token into a
//! code; both the relay-supplied-options list and the option data parser go
//! through it.
//!
//! - [`definition`] - option data types, definitions and the standard tables
//! - [`codec`] - turns an option's textual data into its wire payload

pub mod codec;
pub mod definition;

use std::fmt;

use serde::Serialize;

use crate::document::Position;
use crate::error::ValidationError;
use crate::srv_config::serialize_hex;

pub use codec::{OptionDataSpec, decode_option};
pub use definition::{
    DefinitionCatalog, DefinitionSet, OptionDataType, OptionDefinition, OptionDefinitionLookup,
    RuntimeOptionDefs, Universe,
};

/// Name of the standard DHCPv6 option space.
pub const DHCP6_OPTION_SPACE: &str = "dhcp6";

/// Name of the standard DHCPv4 option space.
pub const DHCP4_OPTION_SPACE: &str = "dhcp4";

/// An option identifier before resolution.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum OptionKey {
    Code(u16),
    Name(String),
}

impl OptionKey {
    /// Classifies a textual token.
    ///
    /// Anything that parses as an integer is a code and must fall within
    /// `0..=65535`; everything else is a name.
    pub fn parse(token: &str, position: Position) -> Result<Self, ValidationError> {
        match token.parse::<i64>() {
            Ok(code) if code < 0 => Err(ValidationError::OutOfRange {
                token: token.to_string(),
                reason: "the option code must be a non-negative value".to_string(),
                position,
            }),
            Ok(code) => u16::try_from(code)
                .map(Self::Code)
                .map_err(|_| out_of_range(token, u16::MAX as i64, position)),
            Err(_) if is_numeric(token) => Err(out_of_range(token, u16::MAX as i64, position)),
            Err(_) => Ok(Self::Name(token.to_string())),
        }
    }
}

impl fmt::Display for OptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Code(code) => write!(f, "{}", code),
            Self::Name(name) => write!(f, "{}", name),
        }
    }
}

fn is_numeric(token: &str) -> bool {
    let digits = token.strip_prefix(['-', '+']).unwrap_or(token);
    !digits.is_empty() && digits.bytes().all(|byte| byte.is_ascii_digit())
}

pub(crate) fn out_of_range(token: &str, max: i64, position: Position) -> ValidationError {
    ValidationError::OutOfRange {
        token: token.to_string(),
        reason: format!("the option code must not be greater than '{}'", max),
        position,
    }
}

/// Resolves an already classified key to a code within `space`.
///
/// Codes resolve to themselves; names are looked up among the definitions
/// known for `space`.
pub fn resolve_key(
    key: &OptionKey,
    space: &str,
    definitions: &dyn OptionDefinitionLookup,
    position: Position,
) -> Result<u16, ValidationError> {
    match key {
        OptionKey::Code(code) => Ok(*code),
        OptionKey::Name(name) => definitions
            .find(space, key)
            .map(|definition| definition.code)
            .ok_or_else(|| ValidationError::UnknownOption {
                name: name.clone(),
                space: space.to_string(),
                position,
            }),
    }
}

/// Resolves a numeric string or option name to an option code.
///
/// Numeric parsing is attempted first; only when the token is not a number is
/// it treated as a name. A number outside `0..=65535` fails with
/// [`ValidationError::OutOfRange`], an unknown name with
/// [`ValidationError::UnknownOption`].
pub fn resolve_option_code(
    token: &str,
    space: &str,
    definitions: &dyn OptionDefinitionLookup,
    position: Position,
) -> Result<u16, ValidationError> {
    let key = OptionKey::parse(token, position)?;
    resolve_key(&key, space, definitions, position)
}

/// A fully decoded option ready for the server's option table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OptionDescriptor {
    pub code: u16,
    pub space: String,
    /// Sent to clients even when not requested.
    pub persistent: bool,
    #[serde(serialize_with = "serialize_hex")]
    pub data: Vec<u8>,
}

/// Option values configured for one scope (global, a subnet, a client class).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct OptionSet {
    options: Vec<OptionDescriptor>,
}

impl OptionSet {
    /// Adds an option, rejecting a second value for the same space and code.
    pub fn add(&mut self, descriptor: OptionDescriptor) -> Result<(), String> {
        if self.get(&descriptor.space, descriptor.code).is_some() {
            return Err(format!(
                "option data for option code {} in space '{}' is specified more than once",
                descriptor.code, descriptor.space
            ));
        }
        self.options.push(descriptor);
        Ok(())
    }

    pub fn get(&self, space: &str, code: u16) -> Option<&OptionDescriptor> {
        self.options
            .iter()
            .find(|option| option.code == code && option.space == space)
    }

    pub fn iter(&self) -> impl Iterator<Item = &OptionDescriptor> {
        self.options.iter()
    }

    pub fn len(&self) -> usize {
        self.options.len()
    }

    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> DefinitionCatalog<'static> {
        static EMPTY: std::sync::LazyLock<DefinitionSet> =
            std::sync::LazyLock::new(DefinitionSet::default);
        DefinitionCatalog::new(Universe::V6, &EMPTY)
    }

    #[test]
    fn test_numeric_token_resolves_to_itself() {
        let code = resolve_option_code("67", DHCP6_OPTION_SPACE, &catalog(), Position::default());
        assert_eq!(code, Ok(67));
        let zero = resolve_option_code("0", DHCP6_OPTION_SPACE, &catalog(), Position::default());
        assert_eq!(zero, Ok(0));
    }

    #[test]
    fn test_out_of_range_codes() {
        for token in ["70000", "65536", "-1", "99999999999999999999999"] {
            let result =
                resolve_option_code(token, DHCP6_OPTION_SPACE, &catalog(), Position::new(4, 2));
            assert!(
                matches!(result, Err(ValidationError::OutOfRange { .. })),
                "{token} should be out of range"
            );
        }
        assert_eq!(
            resolve_option_code("65535", DHCP6_OPTION_SPACE, &catalog(), Position::default()),
            Ok(65535)
        );
    }

    #[test]
    fn test_names_resolve_through_definitions() {
        let code =
            resolve_option_code("dns-servers", DHCP6_OPTION_SPACE, &catalog(), Position::default());
        assert_eq!(code, Ok(23));

        let unknown = resolve_option_code(
            "no-such-option",
            DHCP6_OPTION_SPACE,
            &catalog(),
            Position::new(9, 3),
        )
        .unwrap_err();
        assert!(matches!(unknown, ValidationError::UnknownOption { .. }));
        assert!(unknown.to_string().ends_with("(9:3)"));
    }

    #[test]
    fn test_name_lookup_is_space_scoped() {
        let result =
            resolve_option_code("dns-servers", "vendor-1234", &catalog(), Position::default());
        assert!(matches!(result, Err(ValidationError::UnknownOption { .. })));
    }

    #[test]
    fn test_option_set_rejects_duplicates() {
        let mut set = OptionSet::default();
        let descriptor = OptionDescriptor {
            code: 23,
            space: DHCP6_OPTION_SPACE.to_string(),
            persistent: false,
            data: vec![],
        };
        set.add(descriptor.clone()).unwrap();
        assert!(set.add(descriptor).is_err());
        assert_eq!(set.len(), 1);
    }
}
