//! Condition and ordering fragments.
//!
//! First-level-under-root paths filter directly on their back-reference
//! column; paths nested two or more levels deep narrow through a chain of
//! IN-subselects on the intermediate tables, recursively, until a level
//! whose parent carries a real id column is reached.

use crate::entity_catalog::{AggregatePath, ElementSchema, EntitySchema, PropertySchema};

use super::dialect::Dialect;
use super::errors::SqlBuildError;
use super::naming;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

impl Direction {
    fn keyword(self) -> &'static str {
        match self {
            Direction::Asc => "ASC",
            Direction::Desc => "DESC",
        }
    }
}

/// Requested ordering over root-table properties. Dotted names address
/// embedded members (`address.city`).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sort {
    items: Vec<(String, Direction)>,
}

impl Sort {
    pub fn by(property: impl Into<String>) -> Self {
        Self {
            items: vec![(property.into(), Direction::Asc)],
        }
    }

    pub fn and(mut self, property: impl Into<String>, direction: Direction) -> Self {
        self.items.push((property.into(), direction));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[(String, Direction)] {
        &self.items
    }
}

/// Render ` ORDER BY ...` for a sort request, resolving each property to
/// a root-table column. Unresolvable properties (nested entities,
/// collections, unknown names) fail generation before any SQL is emitted.
pub fn order_by_clause(
    schema: &EntitySchema,
    dialect: &dyn Dialect,
    sort: &Sort,
) -> Result<String, SqlBuildError> {
    let mut rendered = Vec::with_capacity(sort.items.len());
    for (property, direction) in &sort.items {
        let column = resolve_sort_column(schema, property)?;
        rendered.push(format!(
            "{}.{} {}",
            dialect.quote(&schema.table),
            dialect.quote(&column),
            direction.keyword()
        ));
    }
    Ok(format!(" ORDER BY {}", rendered.join(", ")))
}

fn resolve_sort_column(schema: &EntitySchema, property: &str) -> Result<String, SqlBuildError> {
    let unresolvable = || SqlBuildError::SortPropertyUnresolvable {
        entity: schema.name.clone(),
        property: property.to_string(),
    };
    if schema.id_property() == Some(property) {
        return schema
            .id_column()
            .map(str::to_string)
            .ok_or_else(unresolvable);
    }
    let segments: Vec<&str> = property.split('.').collect();
    let mut entity = schema;
    let mut prefix = String::new();
    for (index, segment) in segments.iter().enumerate() {
        let last = index + 1 == segments.len();
        match entity.property(segment) {
            Some(PropertySchema::Scalar { column, .. }) if last => {
                return Ok(format!("{prefix}{column}"));
            }
            Some(PropertySchema::Embedded {
                prefix: member_prefix,
                entity: embedded,
                ..
            }) if !last => {
                prefix.push_str(member_prefix);
                entity = embedded;
            }
            _ => return Err(unresolvable()),
        }
    }
    Err(unresolvable())
}

/// One table hop of an aggregate path: the table at that level, the
/// back-reference pointing at its parent, and the level's own id column
/// (absent for id-less entities and scalar collections).
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct PathStep {
    pub table: String,
    pub reverse_column: String,
    pub id_column: Option<String>,
}

/// Table hops along `path`, root side first. Embedded segments contribute
/// no hop.
pub(crate) fn steps_for_path(
    schema: &EntitySchema,
    path: &AggregatePath,
) -> Result<Vec<PathStep>, SqlBuildError> {
    let unknown = || SqlBuildError::UnknownPath {
        entity: schema.name.clone(),
        path: path.dot_path(),
    };
    let mut steps = Vec::new();
    let mut entity = schema;
    for segment in path.segments() {
        let property = entity.property(segment).ok_or_else(unknown)?;
        match property {
            PropertySchema::Embedded {
                entity: embedded, ..
            } => {
                entity = embedded;
            }
            PropertySchema::ToOne {
                reverse_column,
                entity: child,
                ..
            } => {
                steps.push(PathStep {
                    table: child.table.clone(),
                    reverse_column: reverse_column.clone(),
                    id_column: child.id_column().map(str::to_string),
                });
                entity = child;
            }
            PropertySchema::ToManyList {
                reverse_column,
                element,
                ..
            }
            | PropertySchema::ToManyMap {
                reverse_column,
                element,
                ..
            } => {
                let id_column = match element {
                    ElementSchema::Entity(child) => child.id_column().map(str::to_string),
                    ElementSchema::Scalar { .. } => None,
                };
                steps.push(PathStep {
                    table: element.table().to_string(),
                    reverse_column: reverse_column.clone(),
                    id_column,
                });
                match element {
                    ElementSchema::Entity(child) => entity = child,
                    // A scalar element ends the traversable chain.
                    ElementSchema::Scalar { .. } => {}
                }
            }
            PropertySchema::Scalar { .. } => return Err(unknown()),
        }
    }
    if steps.is_empty() {
        return Err(unknown());
    }
    Ok(steps)
}

/// WHERE fragment constraining the rows at the leaf of `path` to one
/// aggregate root. With `bind` set the first level compares the
/// back-reference against the named marker; without it the chain keeps
/// only rows that belong to some root (used by the delete-everything
/// statements).
pub(crate) fn back_reference_condition(
    schema: &EntitySchema,
    dialect: &dyn Dialect,
    path: &AggregatePath,
    bind: Option<&str>,
) -> Result<String, SqlBuildError> {
    let steps = steps_for_path(schema, path)?;
    condition_for_steps(schema, dialect, path, &steps, bind)
}

fn condition_for_steps(
    schema: &EntitySchema,
    dialect: &dyn Dialect,
    path: &AggregatePath,
    steps: &[PathStep],
    bind: Option<&str>,
) -> Result<String, SqlBuildError> {
    let q = |s: &str| dialect.quote(s);
    let (leaf, parents) = match steps.split_last() {
        Some(split) => split,
        None => {
            return Err(SqlBuildError::UnknownPath {
                entity: schema.name.clone(),
                path: path.dot_path(),
            })
        }
    };
    if parents.is_empty() {
        return Ok(match bind {
            Some(bind) => format!("{} = :{}", q(&leaf.reverse_column), bind),
            None => format!("{} IS NOT NULL", q(&leaf.reverse_column)),
        });
    }
    let parent = &parents[parents.len() - 1];
    let parent_id =
        parent
            .id_column
            .as_ref()
            .ok_or_else(|| SqlBuildError::MissingIntermediateId {
                entity: schema.name.clone(),
                path: path.dot_path(),
            })?;
    let inner = condition_for_steps(schema, dialect, path, parents, bind)?;
    Ok(format!(
        "{} IN (SELECT {} FROM {} WHERE {})",
        q(&leaf.reverse_column),
        q(parent_id),
        q(&parent.table),
        inner
    ))
}

/// Bind-marker name used for the root id in path-scoped statements: the
/// sanitized first-level back-reference column.
pub(crate) fn path_root_bind(
    schema: &EntitySchema,
    path: &AggregatePath,
) -> Result<String, SqlBuildError> {
    let steps = steps_for_path(schema, path)?;
    Ok(naming::bind_name(&steps[0].reverse_column))
}
