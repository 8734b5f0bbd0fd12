//! The configuration document: an immutable tree of tagged values.
//!
//! Every [`ConfigNode`] remembers where it came from so diagnostics can point
//! at the offending line and column. Documents are read from JSON text that
//! may contain `#`, `//` and `/* */` comments, or built from a
//! [`serde_json::Value`] when no source text exists.

use std::fmt;
use std::path::Path;

use serde::{Serialize, Serializer};

use crate::error::{Error, Result, ValidationError};

/// Deepest nesting the reader accepts before giving up.
const MAX_DEPTH: usize = 128;

/// A 1-based line/column pair. `0:0` means "no source text".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub struct Position {
    pub line: u32,
    pub column: u32,
}

impl Position {
    pub const fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// The payload of a [`ConfigNode`].
///
/// Maps keep the order keys appeared in the document.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    List(Vec<ConfigNode>),
    Map(Vec<(String, ConfigNode)>),
}

/// A value plus the position it was read from.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigNode {
    value: Value,
    position: Position,
}

impl ConfigNode {
    pub fn new(value: Value, position: Position) -> Self {
        Self { value, position }
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn position(&self) -> Position {
        self.position
    }

    /// Human readable type name used in diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self.value {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Int(_) => "integer",
            Value::Float(_) => "real",
            Value::String(_) => "string",
            Value::List(_) => "list",
            Value::Map(_) => "map",
        }
    }

    /// Looks up `key` when this node is a map.
    pub fn get(&self, key: &str) -> Option<&ConfigNode> {
        match &self.value {
            Value::Map(entries) => entries
                .iter()
                .find(|(name, _)| name == key)
                .map(|(_, node)| node),
            _ => None,
        }
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Map entries in document order, or `None` for non-map nodes.
    pub fn entries(&self) -> Option<&[(String, ConfigNode)]> {
        match &self.value {
            Value::Map(entries) => Some(entries),
            _ => None,
        }
    }

    /// List items, or `None` for non-list nodes.
    pub fn items(&self) -> Option<&[ConfigNode]> {
        match &self.value {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    /// Inserts or replaces a map entry. Replacing keeps the original slot.
    ///
    /// Does nothing on non-map nodes.
    pub(crate) fn set(&mut self, key: &str, node: ConfigNode) {
        if let Value::Map(entries) = &mut self.value {
            match entries.iter_mut().find(|(name, _)| name == key) {
                Some((_, existing)) => *existing = node,
                None => entries.push((key.to_string(), node)),
            }
        }
    }

    pub(crate) fn get_mut(&mut self, key: &str) -> Option<&mut ConfigNode> {
        match &mut self.value {
            Value::Map(entries) => entries
                .iter_mut()
                .find(|(name, _)| name == key)
                .map(|(_, node)| node),
            _ => None,
        }
    }

    pub(crate) fn items_mut(&mut self) -> Option<&mut Vec<ConfigNode>> {
        match &mut self.value {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(
        &self,
        what: &str,
    ) -> std::result::Result<&[(String, ConfigNode)], ValidationError> {
        self.entries().ok_or_else(|| {
            ValidationError::invalid(
                format!("'{}' must be a map, got {}", what, self.type_name()),
                self.position,
            )
        })
    }

    pub fn as_list(&self, what: &str) -> std::result::Result<&[ConfigNode], ValidationError> {
        self.items().ok_or_else(|| {
            ValidationError::invalid(
                format!("'{}' must be a list, got {}", what, self.type_name()),
                self.position,
            )
        })
    }

    pub fn as_str(&self, what: &str) -> std::result::Result<&str, ValidationError> {
        match &self.value {
            Value::String(text) => Ok(text),
            _ => Err(ValidationError::invalid(
                format!(
                    "invalid ({}) value for parameter '{}', expected string",
                    self.type_name(),
                    what
                ),
                self.position,
            )),
        }
    }

    pub fn as_bool(&self, what: &str) -> std::result::Result<bool, ValidationError> {
        match self.value {
            Value::Bool(flag) => Ok(flag),
            _ => Err(ValidationError::invalid(
                format!(
                    "invalid ({}) value for parameter '{}', expected boolean",
                    self.type_name(),
                    what
                ),
                self.position,
            )),
        }
    }

    pub fn as_int(&self, what: &str) -> std::result::Result<i64, ValidationError> {
        match self.value {
            Value::Int(number) => Ok(number),
            _ => Err(ValidationError::invalid(
                format!(
                    "invalid ({}) value for parameter '{}', expected integer",
                    self.type_name(),
                    what
                ),
                self.position,
            )),
        }
    }

    /// Integer value checked against `min..=max`.
    pub fn as_int_in(
        &self,
        what: &str,
        min: i64,
        max: i64,
    ) -> std::result::Result<i64, ValidationError> {
        let number = self.as_int(what)?;
        if number < min || number > max {
            return Err(ValidationError::invalid(
                format!(
                    "the '{}' value ({}) is not within expected range: ({} - {})",
                    what, number, min, max
                ),
                self.position,
            ));
        }
        Ok(number)
    }

    /// Returns the entry for `key`, failing at this node's position when absent.
    pub fn require(&self, key: &str) -> std::result::Result<&ConfigNode, ValidationError> {
        self.get(key).ok_or_else(|| {
            ValidationError::invalid(format!("missing parameter '{}'", key), self.position)
        })
    }

    pub fn get_string(&self, key: &str) -> std::result::Result<String, ValidationError> {
        self.require(key)?.as_str(key).map(str::to_string)
    }

    pub fn get_bool(&self, key: &str) -> std::result::Result<bool, ValidationError> {
        self.require(key)?.as_bool(key)
    }

    pub fn get_u32(&self, key: &str) -> std::result::Result<u32, ValidationError> {
        let number = self.require(key)?.as_int_in(key, 0, u32::MAX as i64)?;
        Ok(number as u32)
    }

    pub fn get_u16(&self, key: &str) -> std::result::Result<u16, ValidationError> {
        let number = self.require(key)?.as_int_in(key, 0, u16::MAX as i64)?;
        Ok(number as u16)
    }

    pub fn opt_string(&self, key: &str) -> std::result::Result<Option<String>, ValidationError> {
        self.get(key)
            .map(|node| node.as_str(key).map(str::to_string))
            .transpose()
    }

    pub fn opt_bool(&self, key: &str) -> std::result::Result<Option<bool>, ValidationError> {
        self.get(key).map(|node| node.as_bool(key)).transpose()
    }

    pub fn opt_u32(&self, key: &str) -> std::result::Result<Option<u32>, ValidationError> {
        self.get(key)
            .map(|node| node.as_int_in(key, 0, u32::MAX as i64).map(|n| n as u32))
            .transpose()
    }

    /// Rejects any map key not listed in `allowed`.
    pub fn check_keys(
        &self,
        what: &str,
        allowed: &[&str],
    ) -> std::result::Result<(), ValidationError> {
        for (key, node) in self.as_map(what)? {
            if !allowed.contains(&key.as_str()) {
                return Err(ValidationError::invalid(
                    format!("unsupported parameter '{}' in {}", key, what),
                    node.position,
                ));
            }
        }
        Ok(())
    }

    /// Converts the tree back into plain JSON, dropping positions.
    pub fn to_json(&self) -> serde_json::Value {
        match &self.value {
            Value::Null => serde_json::Value::Null,
            Value::Bool(flag) => serde_json::Value::Bool(*flag),
            Value::Int(number) => serde_json::Value::from(*number),
            Value::Float(number) => serde_json::Number::from_f64(*number)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::String(text) => serde_json::Value::String(text.clone()),
            Value::List(items) => {
                serde_json::Value::Array(items.iter().map(ConfigNode::to_json).collect())
            }
            Value::Map(entries) => serde_json::Value::Object(
                entries
                    .iter()
                    .map(|(key, node)| (key.clone(), node.to_json()))
                    .collect(),
            ),
        }
    }

    /// Parses JSON text (with comments) into a positioned tree.
    pub fn parse(text: &str) -> Result<Self> {
        let mut reader = Reader::new(text);
        reader.skip_trivia()?;
        if reader.at_end() {
            return Err(reader.error("configuration text is empty"));
        }
        let root = reader.read_value(0)?;
        reader.skip_trivia()?;
        if !reader.at_end() {
            return Err(reader.error("unexpected trailing characters after configuration"));
        }
        Ok(root)
    }

    /// Reads and parses a configuration file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }
}

impl From<serde_json::Value> for ConfigNode {
    fn from(value: serde_json::Value) -> Self {
        let value = match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(flag) => Value::Bool(flag),
            serde_json::Value::Number(number) => match number.as_i64() {
                Some(int) => Value::Int(int),
                None => Value::Float(number.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(text) => Value::String(text),
            serde_json::Value::Array(items) => {
                Value::List(items.into_iter().map(ConfigNode::from).collect())
            }
            serde_json::Value::Object(entries) => Value::Map(
                entries
                    .into_iter()
                    .map(|(key, node)| (key, ConfigNode::from(node)))
                    .collect(),
            ),
        };
        ConfigNode::new(value, Position::default())
    }
}

impl Serialize for ConfigNode {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl fmt::Display for ConfigNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_json())
    }
}

/// Byte-level JSON reader that tracks line and column.
///
/// Structure is handled here; string and number literals are handed to
/// serde_json so escapes and number grammar follow the standard exactly.
struct Reader<'a> {
    text: &'a str,
    bytes: &'a [u8],
    offset: usize,
    line: u32,
    column: u32,
}

impl<'a> Reader<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            text,
            bytes: text.as_bytes(),
            offset: 0,
            line: 1,
            column: 1,
        }
    }

    fn at_end(&self) -> bool {
        self.offset >= self.bytes.len()
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.offset).copied()
    }

    fn position(&self) -> Position {
        Position::new(self.line, self.column)
    }

    fn error(&self, message: impl Into<String>) -> Error {
        self.error_at(message, self.position())
    }

    fn error_at(&self, message: impl Into<String>, position: Position) -> Error {
        Error::Syntax {
            message: message.into(),
            position,
        }
    }

    fn bump(&mut self) {
        if let Some(byte) = self.peek() {
            self.offset += 1;
            if byte == b'\n' {
                self.line += 1;
                self.column = 1;
            } else if byte & 0xC0 != 0x80 {
                self.column += 1;
            }
        }
    }

    fn skip_trivia(&mut self) -> Result<()> {
        loop {
            match self.peek() {
                Some(b' ' | b'\t' | b'\r' | b'\n') => self.bump(),
                Some(b'#') => self.skip_line(),
                Some(b'/') => match self.bytes.get(self.offset + 1) {
                    Some(b'/') => self.skip_line(),
                    Some(b'*') => {
                        let start = self.position();
                        self.bump();
                        self.bump();
                        loop {
                            match self.peek() {
                                None => {
                                    return Err(self.error_at("unterminated comment", start));
                                }
                                Some(b'*') if self.bytes.get(self.offset + 1) == Some(&b'/') => {
                                    self.bump();
                                    self.bump();
                                    break;
                                }
                                Some(_) => self.bump(),
                            }
                        }
                    }
                    _ => return Err(self.error("unexpected character '/'")),
                },
                _ => return Ok(()),
            }
        }
    }

    fn skip_line(&mut self) {
        while let Some(byte) = self.peek() {
            if byte == b'\n' {
                break;
            }
            self.bump();
        }
    }

    fn expect(&mut self, byte: u8) -> Result<()> {
        if self.peek() == Some(byte) {
            self.bump();
            Ok(())
        } else {
            Err(self.error(format!("expected '{}'", byte as char)))
        }
    }

    fn read_value(&mut self, depth: usize) -> Result<ConfigNode> {
        if depth > MAX_DEPTH {
            return Err(self.error("configuration nested too deeply"));
        }
        let position = self.position();
        let value = match self.peek() {
            Some(b'{') => self.read_map(depth)?,
            Some(b'[') => self.read_list(depth)?,
            Some(b'"') => Value::String(self.read_string()?),
            Some(b'-' | b'0'..=b'9') => self.read_number()?,
            Some(b't') => self.read_keyword("true", Value::Bool(true))?,
            Some(b'f') => self.read_keyword("false", Value::Bool(false))?,
            Some(b'n') => self.read_keyword("null", Value::Null)?,
            Some(other) => {
                return Err(self.error(format!("unexpected character '{}'", other as char)));
            }
            None => return Err(self.error("unexpected end of configuration")),
        };
        Ok(ConfigNode::new(value, position))
    }

    fn read_map(&mut self, depth: usize) -> Result<Value> {
        self.expect(b'{')?;
        let mut entries: Vec<(String, ConfigNode)> = Vec::new();
        self.skip_trivia()?;
        if self.peek() == Some(b'}') {
            self.bump();
            return Ok(Value::Map(entries));
        }
        loop {
            self.skip_trivia()?;
            if self.peek() != Some(b'"') {
                return Err(self.error("expected a quoted map key"));
            }
            let key = self.read_string()?;
            self.skip_trivia()?;
            self.expect(b':')?;
            self.skip_trivia()?;
            let node = self.read_value(depth + 1)?;
            match entries.iter_mut().find(|(name, _)| *name == key) {
                Some((_, existing)) => *existing = node,
                None => entries.push((key, node)),
            }
            self.skip_trivia()?;
            match self.peek() {
                Some(b',') => self.bump(),
                Some(b'}') => {
                    self.bump();
                    return Ok(Value::Map(entries));
                }
                _ => return Err(self.error("expected ',' or '}'")),
            }
        }
    }

    fn read_list(&mut self, depth: usize) -> Result<Value> {
        self.expect(b'[')?;
        let mut items = Vec::new();
        self.skip_trivia()?;
        if self.peek() == Some(b']') {
            self.bump();
            return Ok(Value::List(items));
        }
        loop {
            self.skip_trivia()?;
            items.push(self.read_value(depth + 1)?);
            self.skip_trivia()?;
            match self.peek() {
                Some(b',') => self.bump(),
                Some(b']') => {
                    self.bump();
                    return Ok(Value::List(items));
                }
                _ => return Err(self.error("expected ',' or ']'")),
            }
        }
    }

    fn read_string(&mut self) -> Result<String> {
        let start = self.offset;
        let position = self.position();
        self.expect(b'"')?;
        loop {
            match self.peek() {
                None => return Err(self.error_at("unterminated string", position)),
                Some(b'\\') => {
                    self.bump();
                    self.bump();
                }
                Some(b'"') => {
                    self.bump();
                    break;
                }
                Some(_) => self.bump(),
            }
        }
        serde_json::from_str::<String>(&self.text[start..self.offset])
            .map_err(|error| self.error_at(format!("invalid string: {}", error), position))
    }

    fn read_number(&mut self) -> Result<Value> {
        let start = self.offset;
        let position = self.position();
        while let Some(b'0'..=b'9' | b'-' | b'+' | b'.' | b'e' | b'E') = self.peek() {
            self.bump();
        }
        let literal = &self.text[start..self.offset];
        if literal.contains(['.', 'e', 'E']) {
            serde_json::from_str::<f64>(literal)
                .map(Value::Float)
                .map_err(|_| self.error_at(format!("invalid number '{}'", literal), position))
        } else {
            serde_json::from_str::<i64>(literal)
                .map(Value::Int)
                .map_err(|_| self.error_at(format!("invalid integer '{}'", literal), position))
        }
    }

    fn read_keyword(&mut self, keyword: &str, value: Value) -> Result<Value> {
        if self.text[self.offset..].starts_with(keyword) {
            for _ in 0..keyword.len() {
                self.bump();
            }
            Ok(value)
        } else {
            Err(self.error("unexpected token"))
        }
    }
}
