use crate::ident::ID_COLUMN;
use crate::schema::ModelKind;
use crate::value::ValueType;

/// SQL type of the synthetic primary-key column.
pub const ID_SQL_TYPE: &str = "serial PRIMARY KEY";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: String,
    pub value_type: ValueType,
    pub sql_type: String,
}

/// A table name plus its ordered columns; the first column is always the
/// `id` primary key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDefinition {
    name: String,
    columns: Vec<ColumnDef>,
}

impl TableDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: vec![ColumnDef {
                name: ID_COLUMN.to_string(),
                value_type: ValueType::Int,
                sql_type: ID_SQL_TYPE.to_string(),
            }],
        }
    }

    /// The table backing `kind`, one column per declared attribute.
    ///
    /// Returns `None` if the kind has not been validated yet, since its table
    /// name is only derived by validation.
    pub fn for_kind(kind: &ModelKind) -> Option<Self> {
        let table_name = kind.table_name()?;
        let definition = kind
            .attributes()
            .iter()
            .fold(Self::new(table_name), |def, decl| {
                def.column(&decl.name, decl.spec.value_type, &decl.spec.sql_type)
            });
        Some(definition)
    }

    pub fn column(
        mut self,
        name: impl Into<String>,
        value_type: ValueType,
        sql_type: impl Into<String>,
    ) -> Self {
        self.add_column(name, value_type, sql_type);
        self
    }

    pub fn add_column(
        &mut self,
        name: impl Into<String>,
        value_type: ValueType,
        sql_type: impl Into<String>,
    ) {
        self.columns.push(ColumnDef {
            name: name.into(),
            value_type,
            sql_type: sql_type.into(),
        });
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &[ColumnDef] {
        &self.columns
    }

    /// `CREATE TABLE <name> (id serial PRIMARY KEY, <col> <type>, ...);`
    pub fn creation_sql(&self) -> String {
        let columns = self
            .columns
            .iter()
            .map(|col| format!("{} {}", col.name, col.sql_type))
            .collect::<Vec<_>>()
            .join(", ");
        format!("CREATE TABLE {} ({});", self.name, columns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::AttributeSpec;
    use crate::validate::SchemaValidator;

    #[test]
    fn bare_table_has_only_the_primary_key() {
        let def = TableDefinition::new("test");
        assert_eq!(def.columns().len(), 1);
        assert_eq!(def.creation_sql(), "CREATE TABLE test (id serial PRIMARY KEY);");
    }

    #[test]
    fn creation_sql_lists_columns_in_order() {
        let def = TableDefinition::new("movies")
            .column("title", ValueType::Text, "varchar")
            .column("year", ValueType::Int, "integer");
        assert_eq!(
            def.creation_sql(),
            "CREATE TABLE movies (id serial PRIMARY KEY, title varchar, year integer);"
        );
    }

    #[test]
    fn kind_table_requires_validation() {
        let kind = ModelKind::builder("RawMediaFile")
            .attribute("title", AttributeSpec::new(ValueType::Text, "varchar"))
            .attribute("release_year", AttributeSpec::new(ValueType::Int, "integer"))
            .attribute("filename", AttributeSpec::new(ValueType::Text, "varchar"))
            .build();
        assert!(TableDefinition::for_kind(&kind).is_none());

        SchemaValidator::default().validate(&kind).unwrap();
        let def = TableDefinition::for_kind(&kind).unwrap();
        assert_eq!(def.name(), "rawmediafile_table");
        assert_eq!(
            def.creation_sql(),
            "CREATE TABLE rawmediafile_table (id serial PRIMARY KEY, title varchar, \
             release_year integer, filename varchar);"
        );
    }
}
