//! `lease-database` and `hosts-database`: backend connection parameters.

use serde::Serialize;

use crate::document::{ConfigNode, Value};
use crate::error::ValidationError;
use crate::srv_config::SrvConfig;

use super::ConfigParser;

const DATABASE_TYPES: &[&str] = &["memfile", "mysql", "postgresql", "cql"];

/// Canonical `name=value` access strings for the configured backends.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct DbAccessConfig {
    pub lease_db_access: Option<String>,
    pub host_db_access: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DatabaseKind {
    Lease,
    Hosts,
}

pub struct DbAccessParser {
    kind: DatabaseKind,
}

impl DbAccessParser {
    pub fn lease() -> Self {
        Self {
            kind: DatabaseKind::Lease,
        }
    }

    pub fn hosts() -> Self {
        Self {
            kind: DatabaseKind::Hosts,
        }
    }

    fn what(&self) -> &'static str {
        match self.kind {
            DatabaseKind::Lease => "lease-database",
            DatabaseKind::Hosts => "hosts-database",
        }
    }
}

/// Builds the access string: parameters sorted by name, space separated.
fn access_string(node: &ConfigNode, what: &str) -> Result<String, ValidationError> {
    let mut pairs: Vec<(String, String)> = Vec::new();
    let mut has_type = false;

    for (key, value) in node.as_map(what)? {
        let text = match value.value() {
            Value::String(text) => text.clone(),
            Value::Int(number) => number.to_string(),
            Value::Bool(flag) => flag.to_string(),
            _ => {
                return Err(ValidationError::invalid(
                    format!(
                        "invalid ({}) value for database parameter '{}'",
                        value.type_name(),
                        key
                    ),
                    value.position(),
                ));
            }
        };

        match key.as_str() {
            "type" => {
                if !DATABASE_TYPES.contains(&text.as_str()) {
                    return Err(ValidationError::invalid(
                        format!("unknown backend database type '{}'", text),
                        value.position(),
                    ));
                }
                has_type = true;
            }
            "lfc-interval" => {
                value.as_int_in("lfc-interval", 0, u32::MAX as i64)?;
            }
            "persist" | "readonly" => {
                value.as_bool(key)?;
            }
            _ => {}
        }
        pairs.push((key.clone(), text));
    }

    if !has_type {
        return Err(ValidationError::invalid(
            format!("database access parameters in '{}' must include the keyword 'type'", what),
            node.position(),
        ));
    }

    pairs.sort();
    Ok(pairs
        .iter()
        .map(|(key, value)| format!("{}={}", key, value))
        .collect::<Vec<_>>()
        .join(" "))
}

impl ConfigParser for DbAccessParser {
    fn parse(&self, node: &ConfigNode, staged: &mut SrvConfig) -> Result<(), ValidationError> {
        let access = access_string(node, self.what())?;
        match self.kind {
            DatabaseKind::Lease => staged.db_access.lease_db_access = Some(access),
            DatabaseKind::Hosts => staged.db_access.host_db_access = Some(access),
        }
        Ok(())
    }
}
