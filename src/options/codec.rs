//! Option value codec.
//!
//! Turns the textual data of an `option-data` entry into the option's wire
//! payload. Data is either a string of hexadecimal digits (taken as raw
//! bytes) or, with `csv-format` on, a comma-separated list of field values
//! encoded according to the option's definition.

use std::net::{Ipv4Addr, Ipv6Addr};

use crate::document::Position;
use crate::error::ValidationError;

use super::definition::{OptionDataType, OptionDefinition, OptionDefinitionLookup, Universe};
use super::{OptionDescriptor, OptionKey, resolve_key};

/// Longest encoded domain name.
const MAX_FQDN_LEN: usize = 255;

/// Longest single domain name label.
const MAX_LABEL_LEN: usize = 63;

/// One option value as written in the configuration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OptionDataSpec {
    /// Raw code; range checked during decoding.
    pub code: Option<i64>,
    pub name: Option<String>,
    pub data: String,
    /// `None` means "csv when a definition exists, hex otherwise".
    pub csv_format: Option<bool>,
    pub persistent: bool,
    /// `None` selects the universe's standard space.
    pub space: Option<String>,
    pub position: Position,
}

/// Decodes one option specification into a descriptor and its space.
///
/// The option is identified by code, by name, or by both (which must then
/// agree). A definition is required unless the code was given directly, in
/// which case a missing definition makes the option opaque binary data.
pub fn decode_option(
    spec: &OptionDataSpec,
    universe: Universe,
    definitions: &dyn OptionDefinitionLookup,
) -> Result<(OptionDescriptor, String), ValidationError> {
    let position = spec.position;
    let space = spec
        .space
        .clone()
        .unwrap_or_else(|| universe.default_space().to_string());
    validate_space_name(&space, position)?;

    let code = spec
        .code
        .map(|raw| checked_code(raw, universe, position))
        .transpose()?;

    let name = spec.name.as_deref().filter(|name| !name.is_empty());
    if let Some(name) = name
        && name.contains(' ')
    {
        return Err(ValidationError::invalid(
            format!("invalid option name '{}', spaces in option names are not allowed", name),
            position,
        ));
    }

    let by_name = match name {
        Some(name) => {
            match resolve_key(&OptionKey::Name(name.to_string()), &space, definitions, position) {
                Ok(resolved) => Some(resolved),
                Err(_) if code.is_some() => None,
                Err(error) => return Err(error),
            }
        }
        None => None,
    };

    let code = match (code, by_name) {
        (Some(code), Some(named)) if code != named => {
            return Err(ValidationError::invalid(
                format!(
                    "specified option name '{}' does not match the option definition: '{}.{}' has code {}, not {}",
                    name.unwrap_or_default(),
                    space,
                    name.unwrap_or_default(),
                    named,
                    code
                ),
                position,
            ));
        }
        (Some(code), _) => code,
        (None, Some(named)) => named,
        (None, None) => {
            return Err(ValidationError::invalid(
                "option data configuration requires one of 'code' or 'name' parameters",
                position,
            ));
        }
    };

    let definition = definitions.find(&space, &OptionKey::Code(code));
    let csv_format = spec.csv_format.unwrap_or(definition.is_some());

    let data = match (csv_format, definition) {
        (true, Some(definition)) => encode_csv(definition, &spec.data, position)?,
        (true, None) => {
            return Err(ValidationError::bad_data(
                None,
                format!(
                    "the CSV option data format requires an option definition, and none exists for option code {} in space '{}'",
                    code, space
                ),
                position,
            ));
        }
        (false, _) => decode_hex(&spec.data, position)?,
    };

    let descriptor = OptionDescriptor {
        code,
        space: space.clone(),
        persistent: spec.persistent,
        data,
    };
    Ok((descriptor, space))
}

fn checked_code(raw: i64, universe: Universe, position: Position) -> Result<u16, ValidationError> {
    let token = raw.to_string();
    if raw < 0 {
        return Err(ValidationError::OutOfRange {
            token,
            reason: "the option code must be a non-negative value".to_string(),
            position,
        });
    }
    let max = universe.max_code();
    let code = u16::try_from(raw)
        .ok()
        .filter(|code| *code <= max)
        .ok_or_else(|| super::out_of_range(&token, max as i64, position))?;
    if universe.is_reserved_code(code) {
        return Err(ValidationError::invalid(
            format!("option code {} is reserved and cannot carry configured data", code),
            position,
        ));
    }
    Ok(code)
}

/// Option space names are identifiers: letters, digits, `-` and `_`.
pub fn validate_space_name(space: &str, position: Position) -> Result<(), ValidationError> {
    let valid = !space.is_empty()
        && space
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(ValidationError::invalid(
            format!("invalid option space name '{}'", space),
            position,
        ))
    }
}

/// Decodes a string of hexadecimal digit pairs, optionally prefixed by `0x`.
pub fn decode_hex(data: &str, position: Position) -> Result<Vec<u8>, ValidationError> {
    let digits = data
        .strip_prefix("0x")
        .or_else(|| data.strip_prefix("0X"))
        .unwrap_or(data);
    hex::decode(digits).map_err(|error| {
        ValidationError::bad_data(
            None,
            format!(
                "option data '{}' is not a valid string of hexadecimal digits: {}",
                data, error
            ),
            position,
        )
    })
}

fn split_csv(data: &str) -> Vec<&str> {
    if data.trim().is_empty() {
        Vec::new()
    } else {
        data.split(',').map(str::trim).collect()
    }
}

/// Encodes comma-separated field values according to `definition`.
///
/// The number of values must match the definition's field count; an array
/// definition accepts any number of extra values of its trailing field type.
pub fn encode_csv(
    definition: &OptionDefinition,
    data: &str,
    position: Position,
) -> Result<Vec<u8>, ValidationError> {
    let fields = definition.field_types();
    let tokens = split_csv(data);

    if fields.is_empty() {
        if !tokens.is_empty() {
            return Err(ValidationError::bad_data(
                Some(0),
                format!("option '{}' carries no data, but '{}' was given", definition.name, data),
                position,
            ));
        }
        return Ok(Vec::new());
    }

    let arity_ok = if definition.array {
        tokens.len() >= fields.len()
    } else {
        tokens.len() == fields.len()
    };
    if !arity_ok {
        return Err(ValidationError::bad_data(
            Some(tokens.len().min(fields.len())),
            format!(
                "option data '{}' does not match the definition of option '{}': expected {}{} value(s), got {}",
                data,
                definition.name,
                if definition.array { "at least " } else { "" },
                fields.len(),
                tokens.len()
            ),
            position,
        ));
    }

    let mut payload = Vec::new();
    for (index, token) in tokens.iter().enumerate() {
        let field = fields[index.min(fields.len() - 1)];
        encode_field(field, token, &mut payload).map_err(|reason| {
            ValidationError::bad_data(
                Some(index),
                format!(
                    "option data field {} ('{}') of option '{}' is invalid: {}",
                    index, token, definition.name, reason
                ),
                position,
            )
        })?;
    }
    Ok(payload)
}

fn encode_field(field: OptionDataType, token: &str, out: &mut Vec<u8>) -> Result<(), String> {
    let invalid = || format!("'{}' is not a valid {}", token, field);
    match field {
        OptionDataType::Boolean => match token.to_ascii_lowercase().as_str() {
            "true" | "1" => out.push(1),
            "false" | "0" => out.push(0),
            _ => return Err(invalid()),
        },
        OptionDataType::Int8 => {
            out.extend(token.parse::<i8>().map_err(|_| invalid())?.to_be_bytes())
        }
        OptionDataType::Int16 => {
            out.extend(token.parse::<i16>().map_err(|_| invalid())?.to_be_bytes())
        }
        OptionDataType::Int32 => {
            out.extend(token.parse::<i32>().map_err(|_| invalid())?.to_be_bytes())
        }
        OptionDataType::Uint8 => out.push(token.parse::<u8>().map_err(|_| invalid())?),
        OptionDataType::Uint16 => {
            out.extend(token.parse::<u16>().map_err(|_| invalid())?.to_be_bytes())
        }
        OptionDataType::Uint32 => {
            out.extend(token.parse::<u32>().map_err(|_| invalid())?.to_be_bytes())
        }
        OptionDataType::Ipv4Address => {
            out.extend(token.parse::<Ipv4Addr>().map_err(|_| invalid())?.octets())
        }
        OptionDataType::Ipv6Address => {
            out.extend(token.parse::<Ipv6Addr>().map_err(|_| invalid())?.octets())
        }
        OptionDataType::String => {
            if token.is_empty() {
                return Err("string values must not be empty".to_string());
            }
            out.extend_from_slice(token.as_bytes());
        }
        OptionDataType::Binary => {
            let digits = token
                .strip_prefix("0x")
                .or_else(|| token.strip_prefix("0X"))
                .unwrap_or(token);
            out.extend(hex::decode(digits).map_err(|error| format!("{}: {}", invalid(), error))?);
        }
        OptionDataType::Fqdn => out.extend(encode_fqdn(token)?),
        OptionDataType::Empty | OptionDataType::Record => {
            return Err(format!("fields cannot be of type '{}'", field));
        }
    }
    Ok(())
}

/// Encodes a domain name in DNS wire format (length-prefixed labels, root
/// label last).
pub fn encode_fqdn(name: &str) -> Result<Vec<u8>, String> {
    let name = name.strip_suffix('.').unwrap_or(name);
    if name.is_empty() {
        return Err("domain name must not be empty".to_string());
    }
    let mut wire = Vec::with_capacity(name.len() + 2);
    for label in name.split('.') {
        if label.is_empty() {
            return Err(format!("domain name '{}' contains an empty label", name));
        }
        if label.len() > MAX_LABEL_LEN {
            return Err(format!("label '{}' is longer than {} bytes", label, MAX_LABEL_LEN));
        }
        wire.push(label.len() as u8);
        wire.extend_from_slice(label.as_bytes());
    }
    wire.push(0);
    if wire.len() > MAX_FQDN_LEN {
        return Err(format!("domain name '{}' is longer than {} bytes", name, MAX_FQDN_LEN));
    }
    Ok(wire)
}

/// Decodes a payload back into textual field values.
///
/// The inverse of [`encode_csv`]: integers and addresses come back in their
/// canonical text form, binary fields as lowercase hex, domain names with a
/// trailing dot.
pub fn decode_fields(definition: &OptionDefinition, payload: &[u8]) -> Result<Vec<String>, String> {
    let fields = definition.field_types();
    if fields.is_empty() {
        return if payload.is_empty() {
            Ok(Vec::new())
        } else {
            Err(format!("option '{}' must not carry data", definition.name))
        };
    }

    let mut values = Vec::new();
    let mut offset = 0;
    let mut index = 0;
    loop {
        if index >= fields.len() && (!definition.array || offset == payload.len()) {
            break;
        }
        let field = fields[index.min(fields.len() - 1)];
        let (value, used) = decode_field(field, &payload[offset..]).map_err(|reason| {
            format!("field {} of option '{}': {}", index, definition.name, reason)
        })?;
        values.push(value);
        offset += used;
        index += 1;
        if used == 0 && index >= fields.len() {
            break;
        }
    }
    if offset != payload.len() {
        return Err(format!(
            "option '{}' has {} trailing byte(s)",
            definition.name,
            payload.len() - offset
        ));
    }
    Ok(values)
}

fn decode_field(field: OptionDataType, bytes: &[u8]) -> Result<(String, usize), String> {
    if let Some(width) = field.fixed_len().filter(|width| *width > 0)
        && bytes.len() < width
    {
        return Err(format!(
            "truncated {}: need {} byte(s), have {}",
            field,
            width,
            bytes.len()
        ));
    }
    let value = match field {
        OptionDataType::Boolean => match bytes[0] {
            0 => "false".to_string(),
            1 => "true".to_string(),
            other => return Err(format!("invalid boolean value {}", other)),
        },
        OptionDataType::Int8 => (bytes[0] as i8).to_string(),
        OptionDataType::Uint8 => bytes[0].to_string(),
        OptionDataType::Int16 => i16::from_be_bytes([bytes[0], bytes[1]]).to_string(),
        OptionDataType::Uint16 => u16::from_be_bytes([bytes[0], bytes[1]]).to_string(),
        OptionDataType::Int32 => {
            i32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]).to_string()
        }
        OptionDataType::Uint32 => {
            u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]).to_string()
        }
        OptionDataType::Ipv4Address => {
            Ipv4Addr::new(bytes[0], bytes[1], bytes[2], bytes[3]).to_string()
        }
        OptionDataType::Ipv6Address => {
            let mut octets = [0u8; 16];
            octets.copy_from_slice(&bytes[..16]);
            Ipv6Addr::from(octets).to_string()
        }
        OptionDataType::String => {
            let text =
                std::str::from_utf8(bytes).map_err(|_| "string is not valid UTF-8".to_string())?;
            return Ok((text.to_string(), bytes.len()));
        }
        OptionDataType::Binary => return Ok((hex::encode(bytes), bytes.len())),
        OptionDataType::Fqdn => return decode_fqdn(bytes),
        OptionDataType::Empty | OptionDataType::Record => {
            return Err(format!("fields cannot be of type '{}'", field));
        }
    };
    let width = field.fixed_len().unwrap_or_default();
    Ok((value, width))
}

fn decode_fqdn(bytes: &[u8]) -> Result<(String, usize), String> {
    let mut labels = Vec::new();
    let mut offset = 0;
    loop {
        let len = *bytes
            .get(offset)
            .ok_or_else(|| "truncated domain name".to_string())? as usize;
        offset += 1;
        if len == 0 {
            break;
        }
        if len > MAX_LABEL_LEN {
            return Err(format!("label length {} exceeds {}", len, MAX_LABEL_LEN));
        }
        let label = bytes
            .get(offset..offset + len)
            .ok_or_else(|| "truncated domain name label".to_string())?;
        labels.push(String::from_utf8_lossy(label).to_string());
        offset += len;
    }
    if labels.is_empty() {
        return Err("domain name has no labels".to_string());
    }
    Ok((format!("{}.", labels.join(".")), offset))
}
