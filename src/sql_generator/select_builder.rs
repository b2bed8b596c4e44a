//! Join-select construction.
//!
//! Builds the single-query "join everything" SELECT for an aggregate
//! root: every reachable to-one reference is joined eagerly, embedded
//! members project under the owner's table, and top-level to-many
//! properties join into the same statement. To-many paths whose parent is
//! itself multi-valued are excluded from the projection: a flat join
//! across nested collections would multiply independent fan-outs, and
//! those paths are retrieved separately instead. The cross product that
//! sibling top-level collections do introduce is collapsed by the row
//! readers, not by the SQL.
//!
//! The builder emits the statement text and the [`ReaderSpec`] tree in
//! one pass so both sides always agree on the aliasing scheme.

use crate::aggregate_reader::readers::{
    ContainerKind, ContainerReaderSpec, EntityReaderSpec, ReaderSpec,
};
use crate::entity_catalog::{AggregatePath, ElementSchema, EntitySchema, PropertySchema};

use super::dialect::Dialect;
use super::errors::SqlBuildError;
use super::naming;

/// A fully assembled aggregate select: statement text plus the reader
/// tree that decodes its projection.
#[derive(Debug, Clone)]
pub struct AggregatePlan {
    pub entity: String,
    pub root_table: String,
    pub root_id_column: String,
    pub root_id_alias: String,
    pub root_id_bind: String,
    pub reader_spec: EntityReaderSpec,
    /// Every projection alias, in projection order. Guaranteed disjoint.
    pub aliases: Vec<String>,
    /// Dot-paths registered but excluded from this statement's
    /// projection (nested to-many properties retrieved separately).
    pub excluded_paths: Vec<String>,
    base_sql: String,
    order_suffix: String,
    where_by_id: String,
    where_by_id_in: String,
}

impl AggregatePlan {
    pub fn base_sql(&self) -> &str {
        &self.base_sql
    }

    /// All roots, grouped by root id so unit boundaries are contiguous.
    pub fn sql_all(&self) -> String {
        format!("{}{}", self.base_sql, self.order_suffix)
    }

    pub fn sql_by_id(&self) -> String {
        format!("{}{}", self.base_sql, self.where_by_id)
    }

    pub fn sql_by_id_in(&self) -> String {
        format!("{}{}{}", self.base_sql, self.where_by_id_in, self.order_suffix)
    }
}

/// Per-property select for the fallback loading path: one to-many
/// property of one parent, over its own result set.
#[derive(Debug, Clone)]
pub struct PathSelect {
    pub path: AggregatePath,
    pub sql: String,
    pub spec: ContainerReaderSpec,
    pub reverse_column: String,
    pub parent_bind: String,
}

pub struct SelectBuilder<'a> {
    schema: &'a EntitySchema,
    dialect: &'a dyn Dialect,
    /// The fallback root query sets this to false: it wants the root row
    /// with embedded members and joined to-one references only.
    include_to_many: bool,
}

#[derive(Default)]
struct SelectParts {
    projections: Vec<String>,
    joins: Vec<String>,
    aliases: Vec<String>,
    excluded: Vec<String>,
}

impl<'a> SelectBuilder<'a> {
    pub fn new(schema: &'a EntitySchema, dialect: &'a dyn Dialect, include_to_many: bool) -> Self {
        Self {
            schema,
            dialect,
            include_to_many,
        }
    }

    pub fn build(&self) -> Result<AggregatePlan, SqlBuildError> {
        let id = self
            .schema
            .id
            .as_ref()
            .ok_or_else(|| SqlBuildError::MissingIdColumn(self.schema.name.clone()))?;

        let mut parts = SelectParts::default();
        let root_path = AggregatePath::root();
        let reader_spec =
            self.walk_entity(self.schema, &root_path, &self.schema.table, None, false, &mut parts)?;

        let q = |s: &str| self.dialect.quote(s);
        let mut base_sql = format!(
            "SELECT {} FROM {}",
            parts.projections.join(", "),
            q(&self.schema.table)
        );
        for join in &parts.joins {
            base_sql.push(' ');
            base_sql.push_str(join);
        }

        let root_ref = format!("{}.{}", q(&self.schema.table), q(&id.column));
        let bind = naming::bind_name(&id.column);
        log::debug!(
            "Built aggregate select for `{}`: {} projection(s), {} join(s), {} excluded path(s)",
            self.schema.name,
            parts.projections.len(),
            parts.joins.len(),
            parts.excluded.len()
        );

        Ok(AggregatePlan {
            entity: self.schema.name.clone(),
            root_table: self.schema.table.clone(),
            root_id_column: id.column.clone(),
            root_id_alias: naming::column_alias(&root_path, &id.column),
            root_id_bind: bind.clone(),
            reader_spec,
            aliases: parts.aliases,
            excluded_paths: parts.excluded,
            order_suffix: format!(" ORDER BY {root_ref}"),
            where_by_id: format!(" WHERE {root_ref} = :{bind}"),
            where_by_id_in: format!(" WHERE {root_ref} IN (:{bind}s)"),
            base_sql,
        })
    }

    /// Build the dedicated select for one to-many path, filtered by the
    /// immediate parent's id and ordered by the qualifier column.
    pub fn build_path_select(&self, path: &AggregatePath) -> Result<PathSelect, SqlBuildError> {
        let property = property_at(self.schema, path)?;
        let (kind, reverse_column, key_column, element) = match property {
            PropertySchema::ToManyList {
                reverse_column,
                key_column,
                element,
                ..
            } => (ContainerKind::List, reverse_column, key_column, element),
            PropertySchema::ToManyMap {
                reverse_column,
                key_column,
                element,
                ..
            } => (ContainerKind::Map, reverse_column, key_column, element),
            _ => return Err(SqlBuildError::NotAContainerPath(path.dot_path())),
        };

        let mut parts = SelectParts::default();
        let child_alias = naming::table_alias(&self.schema.table, path);
        let key_alias = naming::key_column_alias(path, key_column);
        self.project(&mut parts, &child_alias, key_column, &key_alias)?;

        let element_spec = match element {
            ElementSchema::Scalar { column, .. } => {
                let alias = naming::column_alias(path, column);
                self.project(&mut parts, &child_alias, column, &alias)?;
                ReaderSpec::Column { alias }
            }
            ElementSchema::Entity(entity) => {
                let sentinel = entity.id.is_none().then_some(reverse_column.as_str());
                let spec =
                    self.walk_entity(entity, path, &child_alias, sentinel, true, &mut parts)?;
                ReaderSpec::Entity(spec)
            }
        };

        let q = |s: &str| self.dialect.quote(s);
        let parent_bind = naming::bind_name(reverse_column);
        let mut sql = format!(
            "SELECT {} FROM {} AS {}",
            parts.projections.join(", "),
            q(element.table()),
            q(&child_alias)
        );
        for join in &parts.joins {
            sql.push(' ');
            sql.push_str(join);
        }
        sql.push_str(&format!(
            " WHERE {}.{} = :{} ORDER BY {}.{}",
            q(&child_alias),
            q(reverse_column),
            parent_bind,
            q(&child_alias),
            q(key_column)
        ));

        Ok(PathSelect {
            path: path.clone(),
            sql,
            spec: ContainerReaderSpec {
                kind,
                key_alias,
                element: Box::new(element_spec),
            },
            reverse_column: reverse_column.clone(),
            parent_bind,
        })
    }

    /// Project an entity's own columns and descend into its properties.
    /// `sentinel_reverse` carries the back-reference column to project as
    /// the presence marker when the entity declares no id of its own.
    fn walk_entity(
        &self,
        entity: &EntitySchema,
        path: &AggregatePath,
        table_alias: &str,
        sentinel_reverse: Option<&str>,
        within_multi: bool,
        parts: &mut SelectParts,
    ) -> Result<EntityReaderSpec, SqlBuildError> {
        let mut spec = EntityReaderSpec {
            indicator_alias: None,
            always_create: false,
            scalar_fields: Vec::new(),
            children: Vec::new(),
        };
        if let Some(id) = &entity.id {
            let alias = naming::column_alias(path, &id.column);
            self.project(parts, table_alias, &id.column, &alias)?;
            spec.scalar_fields.push((id.property.clone(), alias.clone()));
            spec.indicator_alias = Some(alias);
        } else if let Some(reverse) = sentinel_reverse {
            // Synthetic "any reverse column" projection: the readers use
            // it to tell "join matched nothing" from "join matched a row
            // with legitimately-null content".
            let alias = naming::column_alias(path, reverse);
            self.project(parts, table_alias, reverse, &alias)?;
            spec.indicator_alias = Some(alias);
        }
        let anchor = entity
            .id
            .as_ref()
            .map(|id| (table_alias.to_string(), id.column.clone()));
        self.walk_properties(
            entity,
            path,
            path,
            table_alias,
            "",
            anchor.as_ref(),
            within_multi,
            parts,
            &mut spec,
        )?;
        Ok(spec)
    }

    /// `base_path` accumulates embedded segments for child paths;
    /// `owner_path` stays the path of the table-owning entity so member
    /// column aliases land under its prefix. `anchor` is the table alias
    /// and id column children join against.
    #[allow(clippy::too_many_arguments)]
    fn walk_properties(
        &self,
        entity: &EntitySchema,
        base_path: &AggregatePath,
        owner_path: &AggregatePath,
        table_alias: &str,
        prefix: &str,
        anchor: Option<&(String, String)>,
        within_multi: bool,
        parts: &mut SelectParts,
        spec: &mut EntityReaderSpec,
    ) -> Result<(), SqlBuildError> {
        for property in &entity.properties {
            match property {
                PropertySchema::Scalar { name, column } => {
                    let column = format!("{prefix}{column}");
                    let alias = naming::column_alias(owner_path, &column);
                    self.project(parts, table_alias, &column, &alias)?;
                    spec.scalar_fields.push((name.clone(), alias));
                }
                PropertySchema::Embedded {
                    name,
                    prefix: member_prefix,
                    always_create,
                    entity: embedded,
                } => {
                    let child_path = base_path.append(name);
                    let mut child_spec = EntityReaderSpec {
                        indicator_alias: None,
                        always_create: *always_create,
                        scalar_fields: Vec::new(),
                        children: Vec::new(),
                    };
                    let combined = format!("{prefix}{member_prefix}");
                    self.walk_properties(
                        embedded,
                        &child_path,
                        owner_path,
                        table_alias,
                        &combined,
                        anchor,
                        within_multi,
                        parts,
                        &mut child_spec,
                    )?;
                    spec.children
                        .push((name.clone(), ReaderSpec::Entity(child_spec)));
                }
                PropertySchema::ToOne {
                    name,
                    reverse_column,
                    always_create,
                    entity: child,
                } => {
                    let child_path = base_path.append(name);
                    let (anchor_alias, anchor_column) =
                        anchor.ok_or_else(|| SqlBuildError::MissingIntermediateId {
                            entity: self.schema.name.clone(),
                            path: base_path.dot_path(),
                        })?;
                    let child_alias = naming::table_alias(&self.schema.table, &child_path);
                    parts.joins.push(self.render_join(
                        &child.table,
                        &child_alias,
                        reverse_column,
                        anchor_alias,
                        anchor_column,
                    ));
                    let sentinel = child.id.is_none().then_some(reverse_column.as_str());
                    let mut child_spec = self.walk_entity(
                        child,
                        &child_path,
                        &child_alias,
                        sentinel,
                        within_multi,
                        parts,
                    )?;
                    child_spec.always_create = *always_create;
                    spec.children
                        .push((name.clone(), ReaderSpec::Entity(child_spec)));
                }
                PropertySchema::ToManyList {
                    name,
                    reverse_column,
                    key_column,
                    element,
                }
                | PropertySchema::ToManyMap {
                    name,
                    reverse_column,
                    key_column,
                    element,
                } => {
                    let child_path = base_path.append(name);
                    if within_multi || !self.include_to_many {
                        // Registered for separate retrieval but kept out
                        // of this projection: joining a collection under
                        // an already multi-valued parent would multiply
                        // independent fan-outs in the same row set.
                        log::debug!(
                            "Excluding to-many path `{}` from the flat projection of `{}`",
                            child_path.dot_path(),
                            self.schema.name
                        );
                        parts.excluded.push(child_path.dot_path());
                        continue;
                    }
                    let (anchor_alias, anchor_column) =
                        anchor.ok_or_else(|| SqlBuildError::MissingIntermediateId {
                            entity: self.schema.name.clone(),
                            path: base_path.dot_path(),
                        })?;
                    let child_alias = naming::table_alias(&self.schema.table, &child_path);
                    parts.joins.push(self.render_join(
                        element.table(),
                        &child_alias,
                        reverse_column,
                        anchor_alias,
                        anchor_column,
                    ));
                    let key_alias = naming::key_column_alias(&child_path, key_column);
                    self.project(parts, &child_alias, key_column, &key_alias)?;
                    let element_spec = match element {
                        ElementSchema::Scalar { column, .. } => {
                            let alias = naming::column_alias(&child_path, column);
                            self.project(parts, &child_alias, column, &alias)?;
                            ReaderSpec::Column { alias }
                        }
                        ElementSchema::Entity(element_entity) => {
                            let sentinel = element_entity
                                .id
                                .is_none()
                                .then_some(reverse_column.as_str());
                            ReaderSpec::Entity(self.walk_entity(
                                element_entity,
                                &child_path,
                                &child_alias,
                                sentinel,
                                true,
                                parts,
                            )?)
                        }
                    };
                    let kind = if matches!(property, PropertySchema::ToManyList { .. }) {
                        ContainerKind::List
                    } else {
                        ContainerKind::Map
                    };
                    spec.children.push((
                        name.clone(),
                        ReaderSpec::Container(ContainerReaderSpec {
                            kind,
                            key_alias,
                            element: Box::new(element_spec),
                        }),
                    ));
                }
            }
        }
        Ok(())
    }

    fn project(
        &self,
        parts: &mut SelectParts,
        table_alias: &str,
        column: &str,
        alias: &str,
    ) -> Result<(), SqlBuildError> {
        if parts.aliases.iter().any(|existing| existing == alias) {
            return Err(SqlBuildError::DuplicateAlias {
                entity: self.schema.name.clone(),
                alias: alias.to_string(),
            });
        }
        parts.aliases.push(alias.to_string());
        let q = |s: &str| self.dialect.quote(s);
        parts
            .projections
            .push(format!("{}.{} AS {}", q(table_alias), q(column), q(alias)));
        Ok(())
    }

    fn render_join(
        &self,
        table: &str,
        alias: &str,
        left_column: &str,
        right_alias: &str,
        right_column: &str,
    ) -> String {
        let q = |s: &str| self.dialect.quote(s);
        format!(
            "LEFT OUTER JOIN {} AS {} ON {}.{} = {}.{}",
            q(table),
            q(alias),
            q(alias),
            q(left_column),
            q(right_alias),
            q(right_column)
        )
    }
}

/// Navigate an aggregate path to the property it denotes.
pub fn property_at<'s>(
    schema: &'s EntitySchema,
    path: &AggregatePath,
) -> Result<&'s PropertySchema, SqlBuildError> {
    let unknown = || SqlBuildError::UnknownPath {
        entity: schema.name.clone(),
        path: path.dot_path(),
    };
    let segments = path.segments();
    let mut entity = schema;
    let mut result = None;
    for (index, segment) in segments.iter().enumerate() {
        let property = entity.property(segment).ok_or_else(unknown)?;
        if index + 1 == segments.len() {
            result = Some(property);
            break;
        }
        entity = match property {
            PropertySchema::Embedded { entity, .. } => entity,
            PropertySchema::ToOne { entity, .. } => entity,
            PropertySchema::ToManyList {
                element: ElementSchema::Entity(entity),
                ..
            }
            | PropertySchema::ToManyMap {
                element: ElementSchema::Entity(entity),
                ..
            } => entity,
            _ => return Err(unknown()),
        };
    }
    result.ok_or_else(unknown)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity_catalog::IdSchema;
    use crate::sql_generator::dialect::AnsiDialect;
    use std::collections::HashSet;

    fn line_item(table: &str) -> EntitySchema {
        EntitySchema {
            name: "LineItem".into(),
            table: table.into(),
            id: Some(IdSchema {
                property: "id".into(),
                column: "id".into(),
            }),
            properties: vec![PropertySchema::Scalar {
                name: "qty".into(),
                column: "qty".into(),
            }],
        }
    }

    fn order_schema() -> EntitySchema {
        EntitySchema {
            name: "Order".into(),
            table: "orders".into(),
            id: Some(IdSchema {
                property: "id".into(),
                column: "id".into(),
            }),
            properties: vec![
                PropertySchema::Scalar {
                    name: "status".into(),
                    column: "status".into(),
                },
                PropertySchema::ToOne {
                    name: "details".into(),
                    reverse_column: "order_id".into(),
                    always_create: false,
                    entity: EntitySchema {
                        name: "OrderDetails".into(),
                        table: "order_details".into(),
                        id: None,
                        properties: vec![PropertySchema::Scalar {
                            name: "note".into(),
                            column: "note".into(),
                        }],
                    },
                },
                PropertySchema::ToManyList {
                    name: "lineItems".into(),
                    reverse_column: "order_id".into(),
                    key_column: "order_idx".into(),
                    element: ElementSchema::Entity(line_item("line_item")),
                },
                PropertySchema::ToManyList {
                    name: "canceledItems".into(),
                    reverse_column: "order_id".into(),
                    key_column: "order_idx".into(),
                    element: ElementSchema::Entity(line_item("line_item")),
                },
            ],
        }
    }

    fn plan() -> AggregatePlan {
        let schema = order_schema();
        let dialect = AnsiDialect;
        SelectBuilder::new(&schema, &dialect, true).build().unwrap()
    }

    #[test]
    fn aliases_are_disjoint_for_sibling_collections_of_same_type() {
        let plan = plan();
        let unique: HashSet<&String> = plan.aliases.iter().collect();
        assert_eq!(unique.len(), plan.aliases.len());
        assert!(plan.aliases.contains(&"lineItems_qty".to_string()));
        assert!(plan.aliases.contains(&"canceledItems_qty".to_string()));
    }

    #[test]
    fn join_shape_and_sentinel() {
        let plan = plan();
        let sql = plan.sql_all();
        assert!(sql.contains(
            "LEFT OUTER JOIN order_details AS details ON details.order_id = orders.id"
        ));
        assert!(sql.contains("LEFT OUTER JOIN line_item AS lineItems ON lineItems.order_id = orders.id"));
        // Id-less to-one projects its reverse column as presence marker.
        assert!(sql.contains("details.order_id AS details_order_id"));
        assert!(sql.ends_with("ORDER BY orders.id"));
    }

    #[test]
    fn by_id_variants() {
        let plan = plan();
        assert!(plan.sql_by_id().ends_with("WHERE orders.id = :id"));
        assert!(plan.sql_by_id_in().contains("WHERE orders.id IN (:ids)"));
    }

    #[test]
    fn nested_collection_is_excluded_from_projection() {
        let mut schema = order_schema();
        // Give line items a nested scalar list.
        if let PropertySchema::ToManyList { element, .. } = &mut schema.properties[2] {
            if let ElementSchema::Entity(entity) = element {
                entity.properties.push(PropertySchema::ToManyList {
                    name: "notes".into(),
                    reverse_column: "line_item_id".into(),
                    key_column: "note_idx".into(),
                    element: ElementSchema::Scalar {
                        table: "line_item_note".into(),
                        column: "note".into(),
                    },
                });
            }
        }
        let dialect = AnsiDialect;
        let plan = SelectBuilder::new(&schema, &dialect, true).build().unwrap();
        assert_eq!(plan.excluded_paths, vec!["lineItems.notes".to_string()]);
        assert!(!plan.sql_all().contains("line_item_note"));
    }

    #[test]
    fn missing_root_id_fails_fast() {
        let mut schema = order_schema();
        schema.id = None;
        let dialect = AnsiDialect;
        assert_eq!(
            SelectBuilder::new(&schema, &dialect, true)
                .build()
                .unwrap_err(),
            SqlBuildError::MissingIdColumn("Order".into())
        );
    }

    #[test]
    fn duplicate_alias_is_rejected() {
        let mut schema = order_schema();
        // A root column that collides with a joined child's alias.
        schema.properties.push(PropertySchema::Scalar {
            name: "collision".into(),
            column: "lineItems_qty".into(),
        });
        let dialect = AnsiDialect;
        assert_eq!(
            SelectBuilder::new(&schema, &dialect, true)
                .build()
                .unwrap_err(),
            SqlBuildError::DuplicateAlias {
                entity: "Order".into(),
                alias: "lineItems_qty".into(),
            }
        );
    }

    #[test]
    fn path_select_filters_by_parent_and_orders_by_key() {
        let schema = order_schema();
        let dialect = AnsiDialect;
        let builder = SelectBuilder::new(&schema, &dialect, true);
        let path = AggregatePath::root().append("lineItems");
        let select = builder.build_path_select(&path).unwrap();
        assert_eq!(
            select.sql,
            "SELECT lineItems.order_idx AS lineItems_order_idx, \
             lineItems.id AS lineItems_id, lineItems.qty AS lineItems_qty \
             FROM line_item AS lineItems \
             WHERE lineItems.order_id = :order_id ORDER BY lineItems.order_idx"
        );
        assert_eq!(select.spec.key_alias, "lineItems_order_idx");
    }

    #[test]
    fn simple_plan_has_no_containers() {
        let schema = order_schema();
        let dialect = AnsiDialect;
        let plan = SelectBuilder::new(&schema, &dialect, false).build().unwrap();
        assert!(plan.reader_spec.children.iter().all(|(_, child)| matches!(
            child,
            ReaderSpec::Entity(_)
        )));
        assert!(!plan.sql_all().contains("line_item"));
        // To-one references are still joined inline.
        assert!(plan.sql_all().contains("order_details"));
    }
}
