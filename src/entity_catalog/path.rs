//! Aggregate paths and path resolution.
//!
//! An [`AggregatePath`] is an immutable, root-relative sequence of property
//! traversals (`lineItems.product`). The [`PathResolver`] walks an entity
//! schema once, depth-first in declaration order, and produces the flat
//! table of every persistent path reachable from the root together with
//! the schema facts each one carries. SQL generation and eligibility
//! checks run off this table instead of re-deriving facts ad hoc.

use serde::Serialize;

use super::entity::{ElementSchema, EntitySchema, PropertySchema};

/// Root-relative property traversal. The root path has length 0; a path's
/// parent is always exactly one segment shorter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize)]
pub struct AggregatePath {
    segments: Vec<String>,
}

impl AggregatePath {
    pub fn root() -> Self {
        Self::default()
    }

    pub fn append(&self, segment: &str) -> Self {
        let mut segments = self.segments.clone();
        segments.push(segment.to_string());
        Self { segments }
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn parent(&self) -> Option<Self> {
        if self.is_root() {
            return None;
        }
        Some(Self {
            segments: self.segments[..self.segments.len() - 1].to_vec(),
        })
    }

    /// Leaf property name, `None` for the root path.
    pub fn leaf(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// `lineItems.product` rendering used in diagnostics and cache keys.
    pub fn dot_path(&self) -> String {
        self.segments.join(".")
    }
}

impl std::fmt::Display for AggregatePath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_root() {
            write!(f, "(root)")
        } else {
            write!(f, "{}", self.dot_path())
        }
    }
}

/// What kind of step the leaf of a resolved path is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PathKind {
    Scalar,
    Embedded,
    ToOne,
    ToManyList,
    ToManyMap,
}

/// One entry of the resolved path table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedPath {
    pub path: AggregatePath,
    pub kind: PathKind,
    /// Table holding this path's columns. Embedded paths share the
    /// owner's table.
    pub table: String,
    /// Leaf column for scalar paths, with embedded prefixes applied.
    pub column: Option<String>,
    /// Back-reference column for paths that live in their own table.
    pub reverse_column: Option<String>,
    /// Qualifier (list index / map key) column for to-many paths.
    pub key_column: Option<String>,
    /// Declared id column of the entity at this path, if entity-valued.
    pub id_column: Option<String>,
    /// True when the element of a to-many path is a plain column rather
    /// than an entity.
    pub scalar_element: bool,
    /// Some strict ancestor of this path is multi-valued.
    pub within_multi_valued: bool,
}

impl ResolvedPath {
    pub fn is_multi_valued(&self) -> bool {
        matches!(self.kind, PathKind::ToManyList | PathKind::ToManyMap)
    }

    pub fn is_entity_valued(&self) -> bool {
        matches!(self.kind, PathKind::ToOne) || (self.is_multi_valued() && !self.scalar_element)
    }
}

/// Walks an entity schema and enumerates every persistent path.
pub struct PathResolver;

impl PathResolver {
    pub fn resolve(root: &EntitySchema) -> Vec<ResolvedPath> {
        let mut out = Vec::new();
        Self::walk(
            root,
            &AggregatePath::root(),
            &root.table,
            "",
            false,
            &mut out,
        );
        out
    }

    fn walk(
        entity: &EntitySchema,
        base: &AggregatePath,
        table: &str,
        prefix: &str,
        within_multi: bool,
        out: &mut Vec<ResolvedPath>,
    ) {
        for property in &entity.properties {
            let path = base.append(property.name());
            match property {
                PropertySchema::Scalar { column, .. } => {
                    out.push(ResolvedPath {
                        path,
                        kind: PathKind::Scalar,
                        table: table.to_string(),
                        column: Some(format!("{prefix}{column}")),
                        reverse_column: None,
                        key_column: None,
                        id_column: None,
                        scalar_element: false,
                        within_multi_valued: within_multi,
                    });
                }
                PropertySchema::Embedded {
                    prefix: inner_prefix,
                    entity: embedded,
                    ..
                } => {
                    out.push(ResolvedPath {
                        path: path.clone(),
                        kind: PathKind::Embedded,
                        table: table.to_string(),
                        column: None,
                        reverse_column: None,
                        key_column: None,
                        id_column: None,
                        scalar_element: false,
                        within_multi_valued: within_multi,
                    });
                    let combined = format!("{prefix}{inner_prefix}");
                    Self::walk(embedded, &path, table, &combined, within_multi, out);
                }
                PropertySchema::ToOne {
                    reverse_column,
                    entity: child,
                    ..
                } => {
                    out.push(ResolvedPath {
                        path: path.clone(),
                        kind: PathKind::ToOne,
                        table: child.table.clone(),
                        column: None,
                        reverse_column: Some(reverse_column.clone()),
                        key_column: None,
                        id_column: child.id_column().map(str::to_string),
                        scalar_element: false,
                        within_multi_valued: within_multi,
                    });
                    Self::walk(child, &path, &child.table, "", within_multi, out);
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
                    let kind = if matches!(property, PropertySchema::ToManyList { .. }) {
                        PathKind::ToManyList
                    } else {
                        PathKind::ToManyMap
                    };
                    match element {
                        ElementSchema::Scalar {
                            table: element_table,
                            column,
                        } => {
                            out.push(ResolvedPath {
                                path,
                                kind,
                                table: element_table.clone(),
                                column: Some(column.clone()),
                                reverse_column: Some(reverse_column.clone()),
                                key_column: Some(key_column.clone()),
                                id_column: None,
                                scalar_element: true,
                                within_multi_valued: within_multi,
                            });
                        }
                        ElementSchema::Entity(child) => {
                            out.push(ResolvedPath {
                                path: path.clone(),
                                kind,
                                table: child.table.clone(),
                                column: None,
                                reverse_column: Some(reverse_column.clone()),
                                key_column: Some(key_column.clone()),
                                id_column: child.id_column().map(str::to_string),
                                scalar_element: false,
                                within_multi_valued: within_multi,
                            });
                            Self::walk(child, &path, &child.table, "", true, out);
                        }
                    }
                }
            }
        }
    }
}
