//! Model extraction.
//!
//! The declaration-only part of a model (table name, parsed tags, primary
//! key and reference targets) is memoized per record type. Values are read
//! from the record on every extraction.

use std::any::TypeId;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use tracing::debug;

use super::tag::FieldTags;
use super::{Model, ModelField, Reference};
use crate::error::{Error, Result};
use crate::naming::Naming;
use crate::reflect::{FieldDecl, FieldKind, Record, Reflect};
use crate::value::{ScalarKind, SqlValue};

/// Parsed declaration of one column.
#[derive(Debug)]
struct ColumnPlan {
    decl: &'static FieldDecl,
    column: String,
    kind: ScalarKind,
    nullable: bool,
    primary_key: bool,
    tags: FieldTags,
    reference: Option<ReferencePlan>,
}

/// Resolved reference carried by a column.
#[derive(Debug)]
struct ReferencePlan {
    /// Rust name of the `Option<Box<_>>` field.
    field: &'static str,
    foreign_key: bool,
}

/// Memoized declaration of one record type.
#[derive(Debug)]
struct Schema {
    table: String,
    columns: Vec<ColumnPlan>,
}

/// Builds [`Model`]s from records.
#[derive(Debug, Default)]
pub struct Extractor {
    naming: Naming,
    schemas: RwLock<HashMap<TypeId, Arc<Schema>>>,
}

impl Extractor {
    /// Creates an extractor using `naming`.
    #[must_use]
    pub fn new(naming: Naming) -> Self {
        Self {
            naming,
            schemas: RwLock::default(),
        }
    }

    /// Returns the naming functions in use.
    #[must_use]
    pub const fn naming(&self) -> &Naming {
        &self.naming
    }

    /// Replaces the naming functions and forgets every memoized schema.
    pub fn set_naming(&mut self, naming: Naming) {
        self.naming = naming;
        self.schemas
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Resolves the table name of a record.
    #[must_use]
    pub fn table_name(&self, record: &dyn Reflect) -> String {
        record
            .table_name()
            .map_or_else(|| self.naming.table_name(record.type_name()), str::to_string)
    }

    /// Extracts the model of `record`.
    ///
    /// References are resolved only for a root model, one level deep. A
    /// resolved reference left at `None` is allocated with a default record
    /// so query results have a destination. Fields named in `omitted` are
    /// skipped, and so are references whose field is named there.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when the declaration is invalid.
    pub fn extract<R: Record>(&self, record: &mut R, root: bool, omitted: &[String]) -> Result<Model> {
        let mut model = self.extract_dyn(record, root, omitted)?;
        if root {
            R::indexes(&mut model.indexes);
        }
        Ok(model)
    }

    fn extract_dyn(&self, record: &mut dyn Reflect, root: bool, omitted: &[String]) -> Result<Model> {
        let schema = self.schema(record)?;
        let is_omitted = |name: &str| omitted.iter().any(|o| o == name);

        let mut model = Model {
            table: schema.table.clone(),
            ..Model::default()
        };
        for plan in &schema.columns {
            if is_omitted(plan.decl.name) {
                continue;
            }
            let value = record.get(plan.decl.name).unwrap_or(SqlValue::Null);
            if plan.primary_key {
                model.pk = Some(model.fields.len());
            }
            model.fields.push(ModelField {
                column: plan.column.clone(),
                field: plan.decl.name,
                kind: plan.kind,
                nullable: plan.nullable,
                value,
                primary_key: plan.primary_key,
                not_null: plan.tags.not_null,
                unique: plan.tags.unique,
                indexed: plan.tags.index,
                created: plan.tags.created,
                updated: plan.tags.updated,
                size: plan.tags.size,
                default: plan.tags.default.clone(),
                column_type: plan.tags.column_type.clone(),
            });

            if root {
                if let Some(reference) = plan.reference.as_ref().filter(|r| !is_omitted(r.field)) {
                    model.indexes.add([plan.column.as_str()]);
                    if let Some(target) = record.reference_or_default(reference.field) {
                        let target = self.extract_dyn(target, false, &[])?;
                        if target.pk.is_none() {
                            return Err(Error::MissingPrimaryKey {
                                table: target.table,
                            });
                        }
                        model.references.insert(
                            reference.field.to_string(),
                            Reference {
                                local_column: plan.column.clone(),
                                alias: self.naming.join_alias(reference.field),
                                target,
                                foreign_key: reference.foreign_key,
                            },
                        );
                    }
                }
            }

            if plan.tags.unique {
                model.indexes.add_unique([plan.column.as_str()]);
            } else if plan.tags.index {
                model.indexes.add([plan.column.as_str()]);
            }
        }
        Ok(model)
    }

    fn schema(&self, record: &dyn Reflect) -> Result<Arc<Schema>> {
        let key = record.type_key();
        {
            let schemas = self.schemas.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(schema) = schemas.get(&key) {
                return Ok(Arc::clone(schema));
            }
        }

        let schema = Arc::new(self.build_schema(record)?);
        debug!(
            record = record.type_name(),
            table = %schema.table,
            columns = schema.columns.len(),
            "Parsed record declaration"
        );
        let mut schemas = self.schemas.write().unwrap_or_else(PoisonError::into_inner);
        Ok(Arc::clone(schemas.entry(key).or_insert(schema)))
    }

    fn build_schema(&self, record: &dyn Reflect) -> Result<Schema> {
        let decls = record.fields();
        let mut columns = Vec::with_capacity(decls.len());
        let mut explicit_pk: Option<&'static str> = None;

        for decl in decls {
            let tags = FieldTags::parse(decl.name, decl.tag)?;
            if tags.ignore {
                continue;
            }
            let (kind, nullable) = match decl.kind {
                FieldKind::Scalar(kind) => (kind, false),
                FieldKind::Nullable(kind) => (kind, true),
                FieldKind::Reference | FieldKind::Map | FieldKind::Sequence => continue,
            };
            if tags.primary_key {
                if let Some(first) = explicit_pk {
                    return Err(Error::DuplicatePrimaryKey {
                        type_name: record.type_name().to_string(),
                        first: first.to_string(),
                        second: decl.name.to_string(),
                    });
                }
                explicit_pk = Some(decl.name);
            }
            let reference = resolve_reference(record, decl, kind, &tags)?;
            columns.push(ColumnPlan {
                decl,
                column: self.naming.column_name(decl.name),
                kind,
                nullable,
                primary_key: tags.primary_key,
                tags,
                reference,
            });
        }

        if explicit_pk.is_none() {
            if let Some(plan) = columns.iter_mut().find(|c| {
                c.decl.name == self.naming.identifier
                    && matches!(c.decl.kind, FieldKind::Scalar(kind) if kind.is_integer())
            }) {
                plan.primary_key = true;
            }
        }

        Ok(Schema {
            table: self.table_name(record),
            columns,
        })
    }
}

fn resolve_reference(
    record: &dyn Reflect,
    decl: &'static FieldDecl,
    kind: ScalarKind,
    tags: &FieldTags,
) -> Result<Option<ReferencePlan>> {
    if let Some((target, foreign_key)) = tags.reference() {
        let Some(target_decl) = record.fields().iter().find(|d| d.name == target) else {
            return Err(Error::MissingReferenceField {
                type_name: record.type_name().to_string(),
                field: decl.name.to_string(),
                reference: target.to_string(),
            });
        };
        if target_decl.kind != FieldKind::Reference {
            return Err(Error::ReferenceNotPointer {
                type_name: record.type_name().to_string(),
                field: decl.name.to_string(),
                reference: target.to_string(),
            });
        }
        return Ok(Some(ReferencePlan {
            field: target_decl.name,
            foreign_key,
        }));
    }

    // Implicit join: `<name>_id` next to `<name>: Option<Box<_>>`.
    let implicit = decl
        .name
        .strip_suffix("_id")
        .filter(|prefix| !prefix.is_empty() && kind.is_integer())
        .and_then(|prefix| {
            record
                .fields()
                .iter()
                .find(|d| d.name == prefix && d.kind == FieldKind::Reference)
        })
        .map(|target_decl| ReferencePlan {
            field: target_decl.name,
            foreign_key: false,
        });
    Ok(implicit)
}
