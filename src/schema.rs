//! Entity schema declaration and registration validation (C11).
//!
//! Grounded on the teacher's `db/index/manager.rs`: an index name/column
//! list is resolved to an integer slot exactly once, at registration, so
//! every hot-path reference afterwards is by index rather than by name.

use crate::error::{ArenaError, EngineError};
use crate::types::TypeCode;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDef {
    pub name: String,
    pub type_code: TypeCode,
    pub nullable: bool,
    pub is_identifier: bool,
    /// `true` if the engine, not the caller, assigns this field's value
    /// (the identifier counter, for numeric ids left at zero).
    pub generated: bool,
}

impl FieldDef {
    pub fn new(name: impl Into<String>, type_code: TypeCode, nullable: bool) -> Self {
        FieldDef { name: name.into(), type_code, nullable, is_identifier: false, generated: false }
    }

    pub fn identifier(name: impl Into<String>, type_code: TypeCode) -> Self {
        FieldDef { name: name.into(), type_code, nullable: false, is_identifier: true, generated: true }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexKind {
    Hash,
    Range,
    Prefix,
    Suffix,
}

impl IndexKind {
    fn is_composite_eligible(self) -> bool {
        matches!(self, IndexKind::Hash | IndexKind::Range)
    }
}

/// A single-field secondary index declaration.
#[derive(Debug, Clone)]
pub struct IndexDef {
    pub field: String,
    pub kind: IndexKind,
}

/// A multi-field index declaration; hash or range only (4.10).
#[derive(Debug, Clone)]
pub struct CompositeIndexDef {
    pub fields: Vec<String>,
    pub kind: IndexKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    OneToOne,
    OneToMany,
    ManyToOne,
    ManyToMany,
}

/// Metadata-only; the core never validates referential integrity or
/// traverses relationships (4.10).
#[derive(Debug, Clone)]
pub struct RelationshipDef {
    pub foreign_key_column: String,
    pub target_entity: String,
    pub cardinality: Cardinality,
}

#[derive(Debug, Clone)]
pub struct EntityDecl {
    pub name: String,
    pub fields: Vec<FieldDef>,
    pub indices: Vec<IndexDef>,
    pub composite_indices: Vec<CompositeIndexDef>,
    pub relationships: Vec<RelationshipDef>,
}

impl EntityDecl {
    pub fn new(name: impl Into<String>, fields: Vec<FieldDef>) -> Self {
        EntityDecl {
            name: name.into(),
            fields,
            indices: Vec::new(),
            composite_indices: Vec::new(),
            relationships: Vec::new(),
        }
    }

    pub fn with_index(mut self, field: impl Into<String>, kind: IndexKind) -> Self {
        self.indices.push(IndexDef { field: field.into(), kind });
        self
    }

    pub fn with_composite_index(mut self, fields: Vec<String>, kind: IndexKind) -> Self {
        self.composite_indices.push(CompositeIndexDef { fields, kind });
        self
    }

    pub fn with_relationship(mut self, foreign_key_column: impl Into<String>, target_entity: impl Into<String>, cardinality: Cardinality) -> Self {
        self.relationships.push(RelationshipDef {
            foreign_key_column: foreign_key_column.into(),
            target_entity: target_entity.into(),
            cardinality,
        });
        self
    }

    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    pub fn identifier_index(&self) -> Option<usize> {
        self.fields.iter().position(|f| f.is_identifier)
    }
}

/// Validated, registration-ready form of an `EntityDecl`: every field
/// reference has already been resolved to a column slot, per 4.10's
/// "resolved once, at registration" discipline.
#[derive(Debug, Clone)]
pub struct ResolvedSchema {
    pub name: String,
    pub fields: Vec<FieldDef>,
    pub identifier_field: usize,
    pub field_indices: Vec<(usize, IndexKind)>,
    pub composite_indices: Vec<(Vec<usize>, IndexKind)>,
    pub relationships: Vec<RelationshipDef>,
}

/// Validates an `EntityDecl` per 4.10 and resolves every field name to a
/// column index. `entity_exists` lets the caller (the arena) reject a
/// duplicate registration without this module knowing about other
/// entities.
pub fn validate(decl: &EntityDecl, entity_exists: bool) -> Result<ResolvedSchema, EngineError> {
    if entity_exists {
        return Err(ArenaError::EntityExists(decl.name.clone()).into());
    }

    let identifier_count = decl.fields.iter().filter(|f| f.is_identifier).count();
    if identifier_count != 1 {
        return Err(EngineError::SchemaMismatch(format!(
            "entity `{}` must declare exactly one identifier field, found {}",
            decl.name, identifier_count
        )));
    }
    let identifier_field = decl.identifier_index().expect("checked above");

    let mut field_indices = Vec::with_capacity(decl.indices.len());
    for idx in &decl.indices {
        let Some(col) = decl.field_index(&idx.field) else {
            return Err(EngineError::SchemaMismatch(format!(
                "index on undeclared field `{}` in entity `{}`",
                idx.field, decl.name
            )));
        };
        field_indices.push((col, idx.kind));
    }

    let mut composite_indices = Vec::with_capacity(decl.composite_indices.len());
    for composite in &decl.composite_indices {
        if !composite.kind.is_composite_eligible() {
            return Err(EngineError::SchemaMismatch(format!(
                "composite index on entity `{}` requests {:?}, only hash/range are allowed",
                decl.name, composite.kind
            )));
        }
        if composite.fields.len() < 2 {
            return Err(EngineError::SchemaMismatch(format!(
                "composite index on entity `{}` names fewer than two fields",
                decl.name
            )));
        }
        let mut seen = std::collections::HashSet::new();
        let mut cols = Vec::with_capacity(composite.fields.len());
        for name in &composite.fields {
            if !seen.insert(name.as_str()) {
                return Err(EngineError::SchemaMismatch(format!(
                    "composite index on entity `{}` names field `{}` twice",
                    decl.name, name
                )));
            }
            let Some(col) = decl.field_index(name) else {
                return Err(EngineError::SchemaMismatch(format!(
                    "composite index on entity `{}` names undeclared field `{}`",
                    decl.name, name
                )));
            };
            cols.push(col);
        }
        composite_indices.push((cols, composite.kind));
    }

    Ok(ResolvedSchema {
        name: decl.name.clone(),
        fields: decl.fields.clone(),
        identifier_field,
        field_indices,
        composite_indices,
        relationships: decl.relationships.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_decl() -> EntityDecl {
        EntityDecl::new(
            "Person",
            vec![
                FieldDef::identifier("id", TypeCode::I64),
                FieldDef::new("name", TypeCode::String, false),
                FieldDef::new("age", TypeCode::I32, true),
            ],
        )
    }

    #[test]
    fn valid_schema_resolves_identifier_and_indices() {
        let decl = base_decl().with_index("name", IndexKind::Hash);
        let resolved = validate(&decl, false).unwrap();
        assert_eq!(resolved.identifier_field, 0);
        assert_eq!(resolved.field_indices, vec![(1, IndexKind::Hash)]);
    }

    #[test]
    fn missing_identifier_is_rejected() {
        let decl = EntityDecl::new("Bad", vec![FieldDef::new("name", TypeCode::String, false)]);
        assert!(matches!(validate(&decl, false), Err(EngineError::SchemaMismatch(_))));
    }

    #[test]
    fn two_identifiers_is_rejected() {
        let decl = EntityDecl::new(
            "Bad",
            vec![FieldDef::identifier("a", TypeCode::I64), FieldDef::identifier("b", TypeCode::I64)],
        );
        assert!(matches!(validate(&decl, false), Err(EngineError::SchemaMismatch(_))));
    }

    #[test]
    fn index_on_undeclared_field_is_rejected() {
        let decl = base_decl().with_index("ghost", IndexKind::Hash);
        assert!(matches!(validate(&decl, false), Err(EngineError::SchemaMismatch(_))));
    }

    #[test]
    fn composite_with_duplicate_field_is_rejected() {
        let decl = base_decl().with_composite_index(vec!["name".into(), "name".into()], IndexKind::Hash);
        assert!(matches!(validate(&decl, false), Err(EngineError::SchemaMismatch(_))));
    }

    #[test]
    fn composite_with_undeclared_field_is_rejected() {
        let decl = base_decl().with_composite_index(vec!["name".into(), "ghost".into()], IndexKind::Hash);
        assert!(matches!(validate(&decl, false), Err(EngineError::SchemaMismatch(_))));
    }

    #[test]
    fn composite_prefix_kind_is_rejected() {
        let decl = base_decl().with_composite_index(vec!["name".into(), "age".into()], IndexKind::Prefix);
        assert!(matches!(validate(&decl, false), Err(EngineError::SchemaMismatch(_))));
    }

    #[test]
    fn composite_too_few_fields_is_rejected() {
        let decl = base_decl().with_composite_index(vec!["name".into()], IndexKind::Hash);
        assert!(matches!(validate(&decl, false), Err(EngineError::SchemaMismatch(_))));
    }

    #[test]
    fn duplicate_entity_registration_is_rejected() {
        let decl = base_decl();
        assert!(matches!(validate(&decl, true), Err(EngineError::Arena(ArenaError::EntityExists(_)))));
    }
}
