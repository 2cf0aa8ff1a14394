//! Naming conventions between Rust identifiers and SQL identifiers.

use crate::reflect::{FieldDecl, FieldKind};

/// Converts a `CamelCase` identifier to `snake_case`.
///
/// Acronyms collapse into one word: `HTTPServer` becomes `http_server`.
#[must_use]
pub fn to_snake_case(s: &str) -> String {
    let chars: Vec<char> = s.chars().collect();
    let mut result = String::with_capacity(s.len() + 4);
    for (i, &c) in chars.iter().enumerate() {
        if c.is_uppercase() {
            let prev_lower = i > 0 && (chars[i - 1].is_lowercase() || chars[i - 1].is_ascii_digit());
            let acronym_end = i > 0
                && chars[i - 1].is_uppercase()
                && chars.get(i + 1).is_some_and(|n| n.is_lowercase());
            if (prev_lower || acronym_end) && !result.ends_with('_') {
                result.push('_');
            }
            result.extend(c.to_lowercase());
        } else {
            result.push(c);
        }
    }
    result
}

/// Converts a `snake_case` identifier to `CamelCase`.
#[must_use]
pub fn to_camel_case(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut capitalize_next = true;
    for c in s.chars() {
        if c == '_' {
            capitalize_next = true;
        } else if capitalize_next {
            result.extend(c.to_uppercase());
            capitalize_next = false;
        } else {
            result.push(c);
        }
    }
    result
}

/// Pluggable naming functions.
#[derive(Debug, Clone, Copy)]
pub struct Naming {
    /// Field name to column name.
    pub column: fn(&str) -> String,
    /// Type name to table name.
    pub table: fn(&str) -> String,
    /// Field name that becomes the primary key by convention.
    pub identifier: &'static str,
}

impl Default for Naming {
    fn default() -> Self {
        Self {
            column: to_snake_case,
            table: to_snake_case,
            identifier: "id",
        }
    }
}

impl Naming {
    /// Returns the column name for a field.
    #[must_use]
    pub fn column_name(&self, field: &str) -> String {
        (self.column)(field)
    }

    /// Returns the table name for a type.
    #[must_use]
    pub fn table_name(&self, type_name: &str) -> String {
        (self.table)(type_name)
    }

    /// Returns the alias used for the join behind a reference field.
    #[must_use]
    pub fn join_alias(&self, field: &str) -> String {
        (self.table)(field)
    }

    /// Finds the column-bearing field whose column name is `column`.
    #[must_use]
    pub fn field_for_column(
        &self,
        fields: &'static [FieldDecl],
        column: &str,
    ) -> Option<&'static FieldDecl> {
        fields.iter().find(|decl| {
            matches!(decl.kind, FieldKind::Scalar(_) | FieldKind::Nullable(_))
                && self.column_name(decl.name) == column
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::ScalarKind;

    #[test]
    fn test_snake_case() {
        assert_eq!(to_snake_case("SqlGenModel"), "sql_gen_model");
        assert_eq!(to_snake_case("Id"), "id");
        assert_eq!(to_snake_case("AuthorId"), "author_id");
        assert_eq!(to_snake_case("HTTPServer"), "http_server");
        assert_eq!(to_snake_case("already_snake"), "already_snake");
    }

    #[test]
    fn test_column_field_round_trip() {
        for field in ["Name", "AuthorId", "CreatedAt", "Id", "State"] {
            assert_eq!(to_camel_case(&to_snake_case(field)), field);
        }
        for column in ["name", "author_id", "created_at"] {
            assert_eq!(to_snake_case(&to_camel_case(column)), column);
        }
    }

    #[test]
    fn test_field_for_column() {
        static FIELDS: [FieldDecl; 2] = [
            FieldDecl {
                name: "authorId",
                kind: FieldKind::Scalar(ScalarKind::I64),
                tag: "",
            },
            FieldDecl {
                name: "author",
                kind: FieldKind::Reference,
                tag: "",
            },
        ];
        let naming = Naming::default();
        let found = naming.field_for_column(&FIELDS, "author_id").unwrap();
        assert_eq!(found.name, "authorId");
        assert!(naming.field_for_column(&FIELDS, "author").is_none());
    }
}
