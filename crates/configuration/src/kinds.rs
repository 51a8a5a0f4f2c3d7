use core_types::{AttributeSpec, ModelKind, SchemaError, Validator, Value, ValueType};
use serde::Deserialize;
use std::sync::Arc;

/// A record shape declared in the configuration file:
///
/// ```toml
/// [[kinds.movie.attributes]]
/// name = "release_year"
/// type = "int"
/// sql_type = "integer"
/// validator = "release_year"
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct KindConfig {
    #[serde(default)]
    pub attributes: Vec<AttributeConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AttributeConfig {
    pub name: String,
    /// Application type name; checked when the kind is built.
    #[serde(rename = "type")]
    pub value_type: String,
    pub sql_type: String,
    #[serde(default)]
    pub default: Option<DefaultValue>,
    /// Name of a built-in validator.
    #[serde(default)]
    pub validator: Option<String>,
}

/// A literal default as it can be written in TOML.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum DefaultValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl DefaultValue {
    /// Converts the literal. Text for a temporal attribute is parsed as that
    /// type, since TOML dates do not survive the config layer; anything else
    /// is taken as written and left to schema validation to judge.
    fn to_value(&self, value_type: ValueType) -> Value {
        let value = match self {
            DefaultValue::Bool(b) => Value::Bool(*b),
            DefaultValue::Int(i) => Value::Int(*i),
            DefaultValue::Float(f) => Value::Float(*f),
            DefaultValue::Text(s) => Value::Text(s.clone()),
        };
        match value_type {
            ValueType::Date | ValueType::Time | ValueType::Timestamp => {
                value.clone().coerce_to(value_type).unwrap_or(value)
            }
            _ => value,
        }
    }
}

impl KindConfig {
    /// Builds the model kind `name` from this declaration.
    ///
    /// Only the application type names are checked here; everything else is
    /// left to the schema validator.
    pub fn to_model_kind(&self, name: &str) -> Result<Arc<ModelKind>, SchemaError> {
        let mut builder = ModelKind::builder(name);
        for attr in &self.attributes {
            let value_type: ValueType =
                attr.value_type
                    .parse()
                    .map_err(|_| SchemaError::UnsupportedApplicationType {
                        kind: name.to_string(),
                        attribute: attr.name.clone(),
                        value_type: attr.value_type.clone(),
                    })?;

            let mut spec = AttributeSpec::new(value_type, attr.sql_type.clone());
            if let Some(default) = &attr.default {
                spec = spec.with_default(default.to_value(value_type));
            }
            if let Some(validator) = &attr.validator {
                spec = spec.with_validator(Validator::named(validator));
            }
            builder = builder.attribute(attr.name.clone(), spec);
        }
        Ok(builder.build())
    }
}
