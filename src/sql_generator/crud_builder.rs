//! Single-table CRUD statement generation.
//!
//! Write statements are per-level: one insert/update/delete per table,
//! with back-reference and qualifier columns supplied by the caller when
//! a row belongs to a nested property. Each statement carries its bind
//! list so callers can assemble parameters from a document without
//! re-deriving column metadata.

use std::collections::HashSet;

use crate::entity_catalog::{AggregatePath, ElementSchema, EntitySchema, PropertySchema};

use super::condition_builder::{back_reference_condition, path_root_bind};
use super::dialect::Dialect;
use super::errors::SqlBuildError;
use super::naming;
use super::select_builder::property_at;

/// What a bind marker expects at execution time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindField {
    /// The aggregate root's id (or, for nested statements, the immediate
    /// parent's id).
    Id,
    /// A document property, dotted for embedded members
    /// (`address.city`).
    Property(String),
    /// The back-reference to the parent row.
    Reverse,
    /// The qualifier value: 1-based list index or map key.
    Key,
    /// The element value itself, for scalar collections.
    Value,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnBind {
    pub column: String,
    pub bind_name: String,
    pub field: BindField,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlStatement {
    pub sql: String,
    pub binds: Vec<ColumnBind>,
}

impl SqlStatement {
    pub fn without_binds(sql: String) -> Self {
        Self {
            sql,
            binds: Vec::new(),
        }
    }
}

pub struct CrudBuilder<'a> {
    schema: &'a EntitySchema,
    dialect: &'a dyn Dialect,
}

impl<'a> CrudBuilder<'a> {
    pub fn new(schema: &'a EntitySchema, dialect: &'a dyn Dialect) -> Self {
        Self { schema, dialect }
    }

    pub fn insert(&self) -> SqlStatement {
        let mut binds = BindList::new();
        if let Some(id) = &self.schema.id {
            binds.push(&id.column, BindField::Id);
        }
        collect_writable(self.schema, "", "", &mut binds);
        self.render_insert(&self.schema.table, binds)
    }

    /// Insert for one row of a nested property: element (or child entity)
    /// columns plus the back-reference and, for collections, the
    /// qualifier column.
    pub fn insert_for_path(&self, path: &AggregatePath) -> Result<SqlStatement, SqlBuildError> {
        let property = property_at(self.schema, path)?;
        let mut binds = BindList::new();
        let table = match property {
            PropertySchema::ToOne {
                reverse_column,
                entity,
                ..
            } => {
                if let Some(id) = &entity.id {
                    binds.push(&id.column, BindField::Id);
                }
                collect_writable(entity, "", "", &mut binds);
                binds.push(reverse_column, BindField::Reverse);
                entity.table.as_str()
            }
            PropertySchema::ToManyList {
                reverse_column,
                key_column,
                element,
                ..
            }
            | PropertySchema::ToManyMap {
                reverse_column,
                key_column,
                element,
                ..
            } => {
                match element {
                    ElementSchema::Entity(entity) => {
                        if let Some(id) = &entity.id {
                            binds.push(&id.column, BindField::Id);
                        }
                        collect_writable(entity, "", "", &mut binds);
                    }
                    ElementSchema::Scalar { column, .. } => {
                        binds.push(column, BindField::Value);
                    }
                }
                binds.push(reverse_column, BindField::Reverse);
                binds.push(key_column, BindField::Key);
                element.table()
            }
            _ => {
                return Err(SqlBuildError::UnknownPath {
                    entity: self.schema.name.clone(),
                    path: path.dot_path(),
                })
            }
        };
        Ok(self.render_insert(table, binds))
    }

    pub fn update(&self) -> Result<SqlStatement, SqlBuildError> {
        let id = self.require_id()?;
        let mut binds = BindList::new();
        collect_writable(self.schema, "", "", &mut binds);
        let q = |s: &str| self.dialect.quote(s);
        let assignments: Vec<String> = binds
            .binds
            .iter()
            .map(|bind| format!("{} = :{}", q(&bind.column), bind.bind_name))
            .collect();
        let id_bind = binds.unique_name(&naming::bind_name(&id.column));
        let sql = format!(
            "UPDATE {} SET {} WHERE {} = :{}",
            q(&self.schema.table),
            assignments.join(", "),
            q(&id.column),
            id_bind
        );
        let mut binds = binds.binds;
        binds.push(ColumnBind {
            column: id.column.clone(),
            bind_name: id_bind,
            field: BindField::Id,
        });
        Ok(SqlStatement { sql, binds })
    }

    pub fn delete_by_id(&self) -> Result<SqlStatement, SqlBuildError> {
        let id = self.require_id()?;
        let q = |s: &str| self.dialect.quote(s);
        let bind = naming::bind_name(&id.column);
        Ok(SqlStatement {
            sql: format!(
                "DELETE FROM {} WHERE {} = :{}",
                q(&self.schema.table),
                q(&id.column),
                bind
            ),
            binds: vec![ColumnBind {
                column: id.column.clone(),
                bind_name: bind,
                field: BindField::Id,
            }],
        })
    }

    pub fn delete_all(&self) -> SqlStatement {
        SqlStatement::without_binds(format!(
            "DELETE FROM {}",
            self.dialect.quote(&self.schema.table)
        ))
    }

    /// Delete every row at `path` belonging to one aggregate root.
    pub fn delete_by_path(&self, path: &AggregatePath) -> Result<SqlStatement, SqlBuildError> {
        let bind = path_root_bind(self.schema, path)?;
        let condition = back_reference_condition(self.schema, self.dialect, path, Some(&bind))?;
        let table = table_at(self.schema, path)?;
        let id = self.require_id()?;
        Ok(SqlStatement {
            sql: format!(
                "DELETE FROM {} WHERE {}",
                self.dialect.quote(&table),
                condition
            ),
            binds: vec![ColumnBind {
                column: id.column.clone(),
                bind_name: bind,
                field: BindField::Id,
            }],
        })
    }

    /// Delete every row at `path` across all aggregate roots.
    pub fn delete_all_by_path(&self, path: &AggregatePath) -> Result<SqlStatement, SqlBuildError> {
        let condition = back_reference_condition(self.schema, self.dialect, path, None)?;
        let table = table_at(self.schema, path)?;
        Ok(SqlStatement::without_binds(format!(
            "DELETE FROM {} WHERE {}",
            self.dialect.quote(&table),
            condition
        )))
    }

    pub fn exists_by_id(&self) -> Result<SqlStatement, SqlBuildError> {
        let id = self.require_id()?;
        let q = |s: &str| self.dialect.quote(s);
        let bind = naming::bind_name(&id.column);
        Ok(SqlStatement {
            sql: format!(
                "SELECT COUNT(*) AS cnt FROM {} WHERE {} = :{}",
                q(&self.schema.table),
                q(&id.column),
                bind
            ),
            binds: vec![ColumnBind {
                column: id.column.clone(),
                bind_name: bind,
                field: BindField::Id,
            }],
        })
    }

    pub fn count_all(&self) -> SqlStatement {
        SqlStatement::without_binds(format!(
            "SELECT COUNT(*) AS cnt FROM {}",
            self.dialect.quote(&self.schema.table)
        ))
    }

    fn require_id(&self) -> Result<&crate::entity_catalog::IdSchema, SqlBuildError> {
        self.schema
            .id
            .as_ref()
            .ok_or_else(|| SqlBuildError::MissingIdColumn(self.schema.name.clone()))
    }

    fn render_insert(&self, table: &str, binds: BindList) -> SqlStatement {
        let q = |s: &str| self.dialect.quote(s);
        let columns: Vec<String> = binds.binds.iter().map(|bind| q(&bind.column)).collect();
        let markers: Vec<String> = binds
            .binds
            .iter()
            .map(|bind| format!(":{}", bind.bind_name))
            .collect();
        SqlStatement {
            sql: format!(
                "INSERT INTO {} ({}) VALUES ({})",
                q(table),
                columns.join(", "),
                markers.join(", ")
            ),
            binds: binds.binds,
        }
    }
}

/// Bind accumulator keeping marker names unique after sanitization.
struct BindList {
    binds: Vec<ColumnBind>,
    names: HashSet<String>,
}

impl BindList {
    fn new() -> Self {
        Self {
            binds: Vec::new(),
            names: HashSet::new(),
        }
    }

    fn push(&mut self, column: &str, field: BindField) {
        let name = self.unique_name(&naming::bind_name(column));
        self.names.insert(name.clone());
        self.binds.push(ColumnBind {
            column: column.to_string(),
            bind_name: name,
            field,
        });
    }

    fn unique_name(&self, base: &str) -> String {
        if !self.names.contains(base) {
            return base.to_string();
        }
        let mut counter = 2;
        loop {
            let candidate = format!("{base}_{counter}");
            if !self.names.contains(&candidate) {
                return candidate;
            }
            counter += 1;
        }
    }
}

/// Scalar and embedded-member columns of one table, with dotted property
/// paths for embedded members.
fn collect_writable(entity: &EntitySchema, prefix: &str, property_prefix: &str, out: &mut BindList) {
    for property in &entity.properties {
        match property {
            PropertySchema::Scalar { name, column } => {
                out.push(
                    &format!("{prefix}{column}"),
                    BindField::Property(format!("{property_prefix}{name}")),
                );
            }
            PropertySchema::Embedded {
                name,
                prefix: member_prefix,
                entity: embedded,
                ..
            } => {
                collect_writable(
                    embedded,
                    &format!("{prefix}{member_prefix}"),
                    &format!("{property_prefix}{name}."),
                    out,
                );
            }
            _ => {}
        }
    }
}

fn table_at(schema: &EntitySchema, path: &AggregatePath) -> Result<String, SqlBuildError> {
    match property_at(schema, path)? {
        PropertySchema::ToOne { entity, .. } => Ok(entity.table.clone()),
        PropertySchema::ToManyList { element, .. } | PropertySchema::ToManyMap { element, .. } => {
            Ok(element.table().to_string())
        }
        _ => Err(SqlBuildError::UnknownPath {
            entity: schema.name.clone(),
            path: path.dot_path(),
        }),
    }
}
