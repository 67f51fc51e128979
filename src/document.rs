//! The property-bag shape shared by vertexes and edges.

use crate::error::DriverError;
use crate::protocol::Record;
use eyre::Result;
use serde_json::{Map, Value};
use std::collections::HashSet;

/// Class, identity, version and properties of a stored record.
///
/// A document is either local (empty `rid`) or backed by a server record.
/// Every property write is remembered in an ordered diff so that an update
/// only sends what changed since the last sync.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Document {
    /// Schema class name
    pub class: String,

    /// Record identifier; empty until persisted
    pub rid: String,

    /// Version counter as last observed from the server
    pub version: i64,

    properties: Record,

    /// Property names touched since the last sync, in touch order
    diff: Vec<String>,
}

impl Document {
    /// Create a local document of the given class.
    pub fn new(class: impl Into<String>) -> Self {
        Self {
            class: class.into(),
            ..Default::default()
        }
    }

    /// Decode a server record, consuming `@class`, `@rid` and `@version`.
    ///
    /// Other `@`-prefixed metadata fields are dropped as well.
    pub fn from_record(mut record: Record) -> Result<Self> {
        let class = take_str(&mut record, "@class")?;
        let rid = take_str(&mut record, "@rid")?;
        let version = record
            .remove("@version")
            .and_then(|v| v.as_i64())
            .ok_or_else(|| eyre::eyre!(DriverError::MissingProperty("@version".to_string())))?;
        record.retain(|key, _| !key.starts_with('@'));

        Ok(Self {
            class,
            rid,
            version,
            properties: record,
            diff: Vec::new(),
        })
    }

    /// True once the document has a server-assigned RID.
    pub fn is_persisted(&self) -> bool {
        !self.rid.is_empty()
    }

    /// True when there are local changes not yet sent.
    pub fn is_dirty(&self) -> bool {
        !self.diff.is_empty()
    }

    pub fn properties(&self) -> &Record {
        &self.properties
    }

    pub fn diff(&self) -> &[String] {
        &self.diff
    }

    pub fn has(&self, name: &str) -> bool {
        self.properties.contains_key(name)
    }

    /// Raw property value.
    pub fn get(&self, name: &str) -> Result<&Value> {
        self.properties
            .get(name)
            .ok_or_else(|| eyre::eyre!(DriverError::MissingProperty(name.to_string())))
    }

    pub fn get_str(&self, name: &str) -> Result<&str> {
        self.get(name)?.as_str().ok_or_else(|| mismatch(name, "string"))
    }

    /// Integer property; a float with no fractional part also qualifies.
    pub fn get_int(&self, name: &str) -> Result<i64> {
        let value = self.get(name)?;
        if let Some(i) = value.as_i64() {
            return Ok(i);
        }
        match value.as_f64() {
            Some(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => Ok(f as i64),
            _ => Err(mismatch(name, "integer")),
        }
    }

    pub fn get_float(&self, name: &str) -> Result<f64> {
        self.get(name)?.as_f64().ok_or_else(|| mismatch(name, "float"))
    }

    pub fn get_bool(&self, name: &str) -> Result<bool> {
        self.get(name)?.as_bool().ok_or_else(|| mismatch(name, "bool"))
    }

    pub fn get_arr(&self, name: &str) -> Result<&Vec<Value>> {
        self.get(name)?.as_array().ok_or_else(|| mismatch(name, "array"))
    }

    pub fn get_obj(&self, name: &str) -> Result<&Map<String, Value>> {
        self.get(name)?.as_object().ok_or_else(|| mismatch(name, "object"))
    }

    /// Like [`Document::get_str`], but panics. Only for already validated schemas.
    pub fn require_str(&self, name: &str) -> &str {
        self.get_str(name).unwrap_or_else(|e| panic!("{}", e))
    }

    /// Like [`Document::get_int`], but panics.
    pub fn require_int(&self, name: &str) -> i64 {
        self.get_int(name).unwrap_or_else(|e| panic!("{}", e))
    }

    /// Like [`Document::get_float`], but panics.
    pub fn require_float(&self, name: &str) -> f64 {
        self.get_float(name).unwrap_or_else(|e| panic!("{}", e))
    }

    /// Like [`Document::get_arr`], but panics.
    pub fn require_arr(&self, name: &str) -> &Vec<Value> {
        self.get_arr(name).unwrap_or_else(|e| panic!("{}", e))
    }

    /// Like [`Document::get_obj`], but panics.
    pub fn require_obj(&self, name: &str) -> &Map<String, Value> {
        self.get_obj(name).unwrap_or_else(|e| panic!("{}", e))
    }

    /// Set one property and record it in the diff.
    pub fn set_prop(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        let name = name.into();
        self.properties.insert(name.clone(), value.into());
        self.diff.push(name);
    }

    /// Set several properties, left to right.
    ///
    /// Fails with an argument error when no pairs are given.
    pub fn set_props<I, K, V>(&mut self, pairs: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let pairs: Vec<(String, Value)> = pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect();
        if pairs.is_empty() {
            return Err(eyre::eyre!(DriverError::Argument("no properties given".to_string())));
        }
        for (name, value) in pairs {
            self.set_prop(name, value);
        }
        Ok(())
    }

    /// Set properties from an alternating `name, value, name, value...` list.
    ///
    /// Nothing is applied unless the whole list is well formed.
    pub fn set_props_list(&mut self, list: &[Value]) -> Result<()> {
        if list.is_empty() || list.len() % 2 != 0 {
            return Err(eyre::eyre!(DriverError::Argument(format!(
                "expected a non-empty even number of arguments, got {}",
                list.len()
            ))));
        }
        let mut pairs = Vec::with_capacity(list.len() / 2);
        for chunk in list.chunks(2) {
            let name = chunk[0].as_str().ok_or_else(|| {
                eyre::eyre!(DriverError::Argument(format!("property name {} is not a string", chunk[0])))
            })?;
            pairs.push((name.to_string(), chunk[1].clone()));
        }
        self.set_props(pairs)
    }

    /// Delete a property; the next update sends it as a removal.
    pub fn remove_prop(&mut self, name: &str) -> Option<Value> {
        let removed = self.properties.remove(name);
        if removed.is_some() {
            self.diff.push(name.to_string());
        }
        removed
    }

    /// Split the diff into assignments and removals.
    ///
    /// Each name appears once, at the position of its first touch, with its
    /// current value.
    pub fn pending_changes(&self) -> (Vec<(String, Value)>, Vec<String>) {
        let mut seen = HashSet::new();
        let mut set = Vec::new();
        let mut remove = Vec::new();
        for name in &self.diff {
            if !seen.insert(name.as_str()) {
                continue;
            }
            match self.properties.get(name) {
                Some(value) => set.push((name.clone(), value.clone())),
                None => remove.push(name.clone()),
            }
        }
        (set, remove)
    }

    /// Record a successful write to the server.
    pub(crate) fn mark_synced(&mut self, version: i64) {
        self.version = version;
        self.diff.clear();
    }

    pub(crate) fn properties_mut(&mut self) -> &mut Record {
        &mut self.properties
    }
}

fn mismatch(name: &str, expected: &'static str) -> eyre::Report {
    eyre::eyre!(DriverError::TypeMismatch {
        property: name.to_string(),
        expected,
    })
}

fn take_str(record: &mut Record, key: &str) -> Result<String> {
    match record.remove(key) {
        Some(Value::String(s)) => Ok(s),
        Some(_) => Err(mismatch(key, "string")),
        None => Err(eyre::eyre!(DriverError::MissingProperty(key.to_string()))),
    }
}
