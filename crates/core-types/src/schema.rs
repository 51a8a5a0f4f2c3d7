use crate::ident::table_name_for_kind;
use crate::value::{Value, ValueType};
use chrono::{Datelike, Utc};
use std::fmt;
use std::sync::{Arc, OnceLock};

/// Signature of an attribute validator: `Ok(())` accepts the value, `Err`
/// carries a human-readable reason.
pub type ValidatorFn = dyn Fn(&Value) -> Result<(), String> + Send + Sync;

/// An optional per-attribute check run after type coercion.
#[derive(Clone)]
pub enum Validator {
    Callable { name: String, func: Arc<ValidatorFn> },
    /// A validator referenced by a name that did not resolve to anything
    /// callable. Kinds carrying one fail schema validation.
    Unresolved(String),
}

impl Validator {
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&Value) -> Result<(), String> + Send + Sync + 'static,
    {
        Validator::Callable {
            name: name.into(),
            func: Arc::new(func),
        }
    }

    /// Looks up one of the built-in validators by name.
    pub fn named(name: &str) -> Self {
        match name {
            "release_year" => Validator::new(name, release_year),
            "non_empty" => Validator::new(name, non_empty),
            other => Validator::Unresolved(other.to_string()),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Validator::Callable { name, .. } => name,
            Validator::Unresolved(name) => name,
        }
    }

    pub fn is_callable(&self) -> bool {
        matches!(self, Validator::Callable { .. })
    }

    /// Runs the validator. An unresolved validator rejects every value.
    pub fn check(&self, value: &Value) -> Result<(), String> {
        match self {
            Validator::Callable { func, .. } => func(value),
            Validator::Unresolved(name) => Err(format!("validator '{name}' is not callable")),
        }
    }
}

impl fmt::Debug for Validator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Validator::Callable { name, .. } => f.debug_tuple("Callable").field(name).finish(),
            Validator::Unresolved(name) => f.debug_tuple("Unresolved").field(name).finish(),
        }
    }
}

pub const EARLIEST_RELEASE_YEAR: i64 = 1870;

/// Accepts integer years from 1870 up to ten years past the current year.
pub fn release_year(value: &Value) -> Result<(), String> {
    let latest = i64::from(Utc::now().year()) + 10;
    match value {
        Value::Int(year) if (EARLIEST_RELEASE_YEAR..=latest).contains(year) => Ok(()),
        Value::Int(year) => Err(format!(
            "year {year} must be between {EARLIEST_RELEASE_YEAR} and {latest}"
        )),
        other => Err(format!("'{other}' is not a year")),
    }
}

/// Accepts text with at least one non-whitespace character.
pub fn non_empty(value: &Value) -> Result<(), String> {
    match value {
        Value::Text(s) if !s.trim().is_empty() => Ok(()),
        _ => Err("value must not be empty".to_string()),
    }
}

/// Declarative description of one record field.
#[derive(Debug, Clone)]
pub struct AttributeSpec {
    pub default: Value,
    pub value_type: ValueType,
    pub sql_type: String,
    pub validator: Option<Validator>,
}

impl AttributeSpec {
    /// An attribute without a default (`Null`) and without a validator.
    pub fn new(value_type: ValueType, sql_type: impl Into<String>) -> Self {
        Self {
            default: Value::Null,
            value_type,
            sql_type: sql_type.into(),
            validator: None,
        }
    }

    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = default.into();
        self
    }

    pub fn with_validator(mut self, validator: Validator) -> Self {
        self.validator = Some(validator);
        self
    }
}

#[derive(Debug, Clone)]
pub struct AttributeDecl {
    pub name: String,
    pub spec: AttributeSpec,
}

/// The set of attribute specifications for one record shape.
///
/// The table name is derived and cached by the first successful schema
/// validation; its presence is the kind's "validated" marker.
#[derive(Debug)]
pub struct ModelKind {
    name: String,
    attributes: Vec<AttributeDecl>,
    table_name: OnceLock<String>,
}

impl ModelKind {
    pub fn builder(name: impl Into<String>) -> ModelKindBuilder {
        ModelKindBuilder {
            name: name.into(),
            attributes: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Attribute declarations in declaration order.
    pub fn attributes(&self) -> &[AttributeDecl] {
        &self.attributes
    }

    pub fn attribute(&self, name: &str) -> Option<&AttributeSpec> {
        self.attributes
            .iter()
            .find(|decl| decl.name == name)
            .map(|decl| &decl.spec)
    }

    pub fn attribute_names(&self) -> impl Iterator<Item = &str> {
        self.attributes.iter().map(|decl| decl.name.as_str())
    }

    pub fn is_validated(&self) -> bool {
        self.table_name.get().is_some()
    }

    /// The cached table name; `None` until the kind has been validated.
    pub fn table_name(&self) -> Option<&str> {
        self.table_name.get().map(String::as_str)
    }

    /// Records a successful validation. Called only by the schema validator.
    pub(crate) fn mark_validated(&self) -> &str {
        self.table_name.get_or_init(|| table_name_for_kind(&self.name))
    }
}

pub struct ModelKindBuilder {
    name: String,
    attributes: Vec<AttributeDecl>,
}

impl ModelKindBuilder {
    pub fn attribute(mut self, name: impl Into<String>, spec: AttributeSpec) -> Self {
        self.attributes.push(AttributeDecl {
            name: name.into(),
            spec,
        });
        self
    }

    pub fn build(self) -> Arc<ModelKind> {
        Arc::new(ModelKind {
            name: self.name,
            attributes: self.attributes,
            table_name: OnceLock::new(),
        })
    }
}
