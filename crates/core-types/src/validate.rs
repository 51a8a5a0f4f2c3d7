use crate::catalog::TypeCatalog;
use crate::error::SchemaError;
use crate::ident::{is_valid_attribute_name, is_valid_identifier, table_name_for_kind};
use crate::schema::ModelKind;
use std::collections::HashSet;
use std::sync::Arc;

/// Checks model kinds against a [`TypeCatalog`].
#[derive(Debug, Clone, Default)]
pub struct SchemaValidator {
    catalog: Arc<TypeCatalog>,
}

impl SchemaValidator {
    pub fn new(catalog: Arc<TypeCatalog>) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &TypeCatalog {
        &self.catalog
    }

    /// Validates every attribute of `kind`.
    ///
    /// On success the kind's table name is derived and cached, and any later
    /// call for the same kind returns immediately. Failures are not cached.
    pub fn validate(&self, kind: &ModelKind) -> Result<(), SchemaError> {
        if kind.is_validated() {
            tracing::trace!(kind = kind.name(), "Kind already validated, skipping.");
            return Ok(());
        }

        if let Err(e) = self.check(kind) {
            tracing::error!(kind = kind.name(), error = %e, "Model kind failed schema validation.");
            return Err(e);
        }

        let table = kind.mark_validated();
        tracing::debug!(kind = kind.name(), table, "Model kind validated.");
        Ok(())
    }

    fn check(&self, kind: &ModelKind) -> Result<(), SchemaError> {
        if !is_valid_identifier(kind.name()) || !is_valid_identifier(&table_name_for_kind(kind.name())) {
            return Err(SchemaError::InvalidKindName(kind.name().to_string()));
        }

        let mut seen = HashSet::new();
        for decl in kind.attributes() {
            let attribute = decl.name.as_str();
            let spec = &decl.spec;
            let err_kind = || kind.name().to_string();

            if !is_valid_attribute_name(attribute) {
                return Err(SchemaError::InvalidAttributeName {
                    kind: err_kind(),
                    attribute: attribute.to_string(),
                });
            }
            if !seen.insert(attribute) {
                return Err(SchemaError::DuplicateAttribute {
                    kind: err_kind(),
                    attribute: attribute.to_string(),
                });
            }
            if !self.catalog.supports_value_type(spec.value_type) {
                return Err(SchemaError::UnsupportedApplicationType {
                    kind: err_kind(),
                    attribute: attribute.to_string(),
                    value_type: spec.value_type.to_string(),
                });
            }
            if !self.catalog.accepts(spec.value_type, &spec.sql_type) {
                return Err(SchemaError::UnsupportedSqlType {
                    kind: err_kind(),
                    attribute: attribute.to_string(),
                    sql_type: spec.sql_type.clone(),
                });
            }
            if let Some(validator) = spec.validator.as_ref().filter(|v| !v.is_callable()) {
                return Err(SchemaError::ValidatorNotCallable {
                    kind: err_kind(),
                    attribute: attribute.to_string(),
                    validator: validator.name().to_string(),
                });
            }
            // Defaults must already have the declared type; no coercion here.
            if !spec.default.is_null() && spec.default.value_type() != spec.value_type {
                return Err(SchemaError::DefaultTypeMismatch {
                    kind: err_kind(),
                    attribute: attribute.to_string(),
                    default: spec.default.to_string(),
                    expected: spec.value_type,
                    found: spec.default.value_type(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{AttributeSpec, Validator};
    use crate::value::{Value, ValueType};
    use std::collections::BTreeMap;

    fn movie_kind() -> Arc<ModelKind> {
        ModelKind::builder("RealClass")
            .attribute("title", AttributeSpec::new(ValueType::Text, "varchar"))
            .attribute(
                "year",
                AttributeSpec::new(ValueType::Int, "integer")
                    .with_validator(Validator::named("release_year")),
            )
            .build()
    }

    #[test]
    fn well_formed_kind_validates_and_caches_table_name() {
        let validator = SchemaValidator::default();
        let kind = movie_kind();

        validator.validate(&kind).unwrap();
        assert!(kind.is_validated());
        assert_eq!(kind.table_name(), Some("realclass_table"));

        // Second call is a no-op.
        validator.validate(&kind).unwrap();
        assert_eq!(kind.table_name(), Some("realclass_table"));
    }

    #[test]
    fn unsupported_sql_type_is_rejected() {
        let kind = ModelKind::builder("Broken")
            .attribute("payload", AttributeSpec::new(ValueType::Text, "jsonb"))
            .build();
        let err = SchemaValidator::default().validate(&kind).unwrap_err();
        assert!(matches!(err, SchemaError::UnsupportedSqlType { ref sql_type, .. } if sql_type == "jsonb"));
        assert!(!kind.is_validated());
        assert_eq!(kind.table_name(), None);
    }

    #[test]
    fn sql_type_of_another_value_type_is_rejected() {
        let kind = ModelKind::builder("Movie")
            .attribute("year", AttributeSpec::new(ValueType::Int, "date"))
            .build();
        let err = SchemaValidator::default().validate(&kind).unwrap_err();
        assert_eq!(
            err,
            SchemaError::UnsupportedSqlType {
                kind: "Movie".to_string(),
                attribute: "year".to_string(),
                sql_type: "date".to_string(),
            }
        );

        let kind = ModelKind::builder("Movie")
            .attribute("title", AttributeSpec::new(ValueType::Text, "boolean"))
            .build();
        assert!(matches!(
            SchemaValidator::default().validate(&kind),
            Err(SchemaError::UnsupportedSqlType { .. })
        ));
        assert!(!kind.is_validated());
    }

    #[test]
    fn value_type_missing_from_catalog_is_rejected() {
        let mut mapping = BTreeMap::new();
        mapping.insert(ValueType::Text, vec!["varchar".to_string()]);
                let validator = SchemaValidator::new(Arc::new(TypeCatalog::from_mapping(mapping)));

        let kind = ModelKind::builder("Clip")
            .attribute("length", AttributeSpec::new(ValueType::Duration, "varchar"))
            .build();
        let err = validator.validate(&kind).unwrap_err();
        assert!(matches!(err, SchemaError::UnsupportedApplicationType { .. }));
    }

    #[test]
    fn unresolved_validator_is_not_callable() {
        let kind = ModelKind::builder("Movie")
            .attribute(
                "year",
                AttributeSpec::new(ValueType::Int, "integer")
                    .with_validator(Validator::named("no_such_check")),
            )
            .build();
        let err = SchemaValidator::default().validate(&kind).unwrap_err();
        assert_eq!(
            err,
            SchemaError::ValidatorNotCallable {
                kind: "Movie".to_string(),
                attribute: "year".to_string(),
                validator: "no_such_check".to_string(),
            }
        );
    }

    #[test]
    fn default_must_have_declared_type_exactly() {
        let kind = ModelKind::builder("Movie")
            .attribute(
                "year",
                AttributeSpec::new(ValueType::Int, "integer").with_default("2016"),
            )
            .build();
        let err = SchemaValidator::default().validate(&kind).unwrap_err();
        assert!(matches!(
            err,
            SchemaError::DefaultTypeMismatch {
                expected: ValueType::Int,
                found: ValueType::Text,
                ..
            }
        ));

        let ok = ModelKind::builder("Movie")
            .attribute(
                "year",
                AttributeSpec::new(ValueType::Int, "integer").with_default(Value::Int(2016)),
            )
            .build();
        SchemaValidator::default().validate(&ok).unwrap();
    }

    #[test]
    fn reserved_and_duplicate_names_are_rejected() {
        let reserved = ModelKind::builder("Movie")
            .attribute("id", AttributeSpec::new(ValueType::Int, "integer"))
            .build();
        assert!(matches!(
            SchemaValidator::default().validate(&reserved).unwrap_err(),
            SchemaError::InvalidAttributeName { .. }
        ));

        let duplicate = ModelKind::builder("Movie")
            .attribute("title", AttributeSpec::new(ValueType::Text, "text"))
            .attribute("title", AttributeSpec::new(ValueType::Text, "varchar"))
            .build();
        assert!(matches!(
            SchemaValidator::default().validate(&duplicate).unwrap_err(),
            SchemaError::DuplicateAttribute { .. }
        ));

        let bad_kind = ModelKind::builder("movie table").build();
        assert!(matches!(
            SchemaValidator::default().validate(&bad_kind).unwrap_err(),
            SchemaError::InvalidKindName(_)
        ));
    }

    #[test]
    fn kind_without_attributes_is_valid() {
        let kind = ModelKind::builder("Marker").build();
        SchemaValidator::default().validate(&kind).unwrap();
        assert_eq!(kind.table_name(), Some("marker_table"));
    }
}
