//! Field tag language.
//!
//! A tag is a comma separated list of `key` or `key:value` tokens:
//!
//! ```text
//! pk | fk:<Field> | join:<Field> | size:<N> | default:<literal> | index
//!    | unique | notnull | created | updated | coltype:<type> | -
//! ```

use crate::error::{Error, Result};

/// Parsed form of one field's tag.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldTags {
    pub ignore: bool,
    pub primary_key: bool,
    pub not_null: bool,
    pub index: bool,
    pub unique: bool,
    pub created: bool,
    pub updated: bool,
    pub size: Option<u32>,
    pub default: Option<String>,
    /// Reference field named by `fk:`; emits a constraint.
    pub foreign_key: Option<String>,
    /// Reference field named by `join:`; no constraint.
    pub join: Option<String>,
    pub column_type: Option<String>,
}

impl FieldTags {
    /// Parses the tag of `field`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownTag`] for keys outside the language and
    /// [`Error::TagSyntax`] for a malformed token.
    pub fn parse(field: &str, tag: &str) -> Result<Self> {
        let mut tags = Self::default();
        if tag.trim().is_empty() {
            return Ok(tags);
        }
        for token in tag.split(',').map(str::trim) {
            if token.is_empty() {
                return Err(syntax(field, token, "empty token"));
            }
            let (key, value) = match token.split_once(':') {
                Some((key, value)) => (key.trim(), Some(value.trim())),
                None => (token, None),
            };
            match key {
                "-" => flag(&mut tags.ignore, field, token, value)?,
                "pk" => flag(&mut tags.primary_key, field, token, value)?,
                "notnull" => flag(&mut tags.not_null, field, token, value)?,
                "index" => flag(&mut tags.index, field, token, value)?,
                "unique" => flag(&mut tags.unique, field, token, value)?,
                "created" => flag(&mut tags.created, field, token, value)?,
                "updated" => flag(&mut tags.updated, field, token, value)?,
                "size" => {
                    let raw = required(field, token, value)?;
                    let size = raw
                        .parse::<u32>()
                        .map_err(|_| syntax(field, token, "size must be a non-negative integer"))?;
                    tags.size = Some(size);
                }
                "default" => tags.default = Some(required(field, token, value)?.to_string()),
                "fk" => tags.foreign_key = Some(required(field, token, value)?.to_string()),
                "join" => tags.join = Some(required(field, token, value)?.to_string()),
                "coltype" => tags.column_type = Some(required(field, token, value)?.to_string()),
                _ => {
                    return Err(Error::UnknownTag {
                        field: field.to_string(),
                        key: key.to_string(),
                        value: value.map(ToString::to_string),
                    })
                }
            }
        }
        Ok(tags)
    }

    /// Reference field named by `fk:` or `join:`, with whether it is a
    /// constraint. `fk` wins when both are present.
    #[must_use]
    pub fn reference(&self) -> Option<(&str, bool)> {
        self.foreign_key
            .as_deref()
            .map(|target| (target, true))
            .or_else(|| self.join.as_deref().map(|target| (target, false)))
    }
}

fn flag(slot: &mut bool, field: &str, token: &str, value: Option<&str>) -> Result<()> {
    if value.is_some() {
        return Err(syntax(field, token, "flag does not take a value"));
    }
    *slot = true;
    Ok(())
}

fn required<'a>(field: &str, token: &str, value: Option<&'a str>) -> Result<&'a str> {
    match value {
        Some(value) if !value.is_empty() => Ok(value),
        _ => Err(syntax(field, token, "missing value")),
    }
}

fn syntax(field: &str, token: &str, reason: &'static str) -> Error {
    Error::TagSyntax {
        field: field.to_string(),
        token: token.to_string(),
        reason,
    }
}
