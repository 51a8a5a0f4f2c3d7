//! Rules for names that end up inside generated SQL text.
//!
//! Values are always bound as parameters, but table and column names are
//! spliced into statements, so anything that is not a plain identifier is
//! refused before a statement is built.

/// PostgreSQL truncates identifiers longer than this many bytes.
pub const MAX_IDENTIFIER_LEN: usize = 63;

/// Name of the synthetic primary-key column every table carries.
pub const ID_COLUMN: &str = "id";

/// Attribute lookups with this name (any case) resolve to the kind's table name.
pub const TABLENAME_KEY: &str = "tablename";

/// Suffix appended to the lower-cased kind name to form its table name.
pub const TABLE_SUFFIX: &str = "_table";

pub fn is_valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    name.len() <= MAX_IDENTIFIER_LEN
        && (first.is_ascii_alphabetic() || first == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Whether `name` may be declared as a model attribute.
pub fn is_valid_attribute_name(name: &str) -> bool {
    is_valid_identifier(name)
        && !name.eq_ignore_ascii_case(ID_COLUMN)
        && !name.eq_ignore_ascii_case(TABLENAME_KEY)
}

pub fn table_name_for_kind(kind_name: &str) -> String {
    format!("{}{}", kind_name.to_lowercase(), TABLE_SUFFIX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifiers() {
        assert!(is_valid_identifier("release_year"));
        assert!(is_valid_identifier("_private"));
        assert!(!is_valid_identifier(""));
        assert!(!is_valid_identifier("2fast"));
        assert!(!is_valid_identifier("title; DROP TABLE x"));
        assert!(!is_valid_identifier(&"a".repeat(MAX_IDENTIFIER_LEN + 1)));
    }

    #[test]
    fn reserved_attribute_names() {
        assert!(!is_valid_attribute_name("id"));
        assert!(!is_valid_attribute_name("ID"));
        assert!(!is_valid_attribute_name("TableName"));
        assert!(is_valid_attribute_name("title"));
    }

    #[test]
    fn table_name_is_lowercased_with_suffix() {
        assert_eq!(table_name_for_kind("RawMediaFile"), "rawmediafile_table");
    }
}
