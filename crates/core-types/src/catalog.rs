use crate::value::ValueType;
use std::collections::BTreeMap;

/// The closed mapping between application value types and the SQL column
/// types each of them may be stored as.
///
/// Lookups fail closed: a value type without an entry, or an SQL type that no
/// entry lists, is unsupported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeCatalog {
    mapping: BTreeMap<ValueType, Vec<String>>,
}

impl TypeCatalog {
    /// Builds a catalog from an explicit mapping, e.g. the `[type_mapping]`
    /// table of the configuration file.
    pub fn from_mapping(mapping: BTreeMap<ValueType, Vec<String>>) -> Self {
        let mapping = mapping
            .into_iter()
            .map(|(value_type, sql_types)| {
                let sql_types = sql_types
                    .into_iter()
                    .map(|t| t.trim().to_string())
                    .filter(|t| !t.is_empty())
                    .collect();
                (value_type, sql_types)
            })
            .collect();
        Self { mapping }
    }

    /// The SQL types acceptable for `value_type`, or `None` if the type is not
    /// in the catalog.
    pub fn sql_types_for(&self, value_type: ValueType) -> Option<&[String]> {
        self.mapping.get(&value_type).map(Vec::as_slice)
    }

    pub fn supports_value_type(&self, value_type: ValueType) -> bool {
        self.mapping.contains_key(&value_type)
    }

    /// Whether `sql_type` is listed by any entry. Comparison ignores case and
    /// surrounding whitespace.
    pub fn supports_sql_type(&self, sql_type: &str) -> bool {
        self.value_type_for_sql(sql_type).is_some()
    }

    /// Whether `sql_type` is one of the storage types listed for `value_type`.
    pub fn accepts(&self, value_type: ValueType, sql_type: &str) -> bool {
        self.sql_types_for(value_type)
            .is_some_and(|types| types.iter().any(|t| same_sql_type(t, sql_type)))
    }

    /// The first application type whose entry lists `sql_type`.
    pub fn value_type_for_sql(&self, sql_type: &str) -> Option<ValueType> {
        self.mapping
            .iter()
            .find(|(_, types)| types.iter().any(|t| same_sql_type(t, sql_type)))
            .map(|(value_type, _)| *value_type)
    }

    pub fn value_types(&self) -> impl Iterator<Item = ValueType> + '_ {
        self.mapping.keys().copied()
    }
}

fn same_sql_type(a: &str, b: &str) -> bool {
    a.trim().eq_ignore_ascii_case(b.trim())
}

impl Default for TypeCatalog {
    /// Every listed name is a valid PostgreSQL column type. `null` has an
    /// entry but no column type, so an always-null attribute cannot be declared.
    fn default() -> Self {
        let entries: [(ValueType, &[&str]); 10] = [
            (ValueType::Null, &[]),
            (ValueType::Bool, &["bool", "boolean"]),
            (ValueType::Float, &["real", "float8", "double precision"]),
            (ValueType::Int, &["smallint", "integer", "bigint"]),
            (ValueType::Text, &["varchar", "text"]),
            (ValueType::Date, &["date"]),
            (ValueType::Time, &["time", "timetz"]),
            (ValueType::Timestamp, &["timestamp", "timestamptz"]),
            (ValueType::Duration, &["interval"]),
            (
                ValueType::Array,
                &[
                    "integer[]",
                    "bigint[]",
                    "text[]",
                    "varchar[]",
                    "double precision[]",
                    "boolean[]",
                ],
            ),
        ];
        let mapping = entries
            .into_iter()
            .map(|(value_type, sql_types)| {
                (value_type, sql_types.iter().map(|t| t.to_string()).collect())
            })
            .collect();
        Self { mapping }
    }
}
