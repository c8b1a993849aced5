//! Type registry.
//!
//! The copy engine never inspects values to learn their shape. Every node
//! type is registered up front with its parent type and declared fields, and
//! the registry answers "which fields, in which order" for a walk.

use std::collections::HashMap;

use qs_common::TypeTag;
use serde::Serialize;

use super::value::{ElemKind, MemberKind};
use super::NodeKind;
use crate::copy::CopyScope;

/// A declared member of a type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldDecl {
    pub name: String,
    pub kind: MemberKind,
}

/// Per-type behavior switches consulted by the reconciler.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TypeFlags {
    /// Exactly one live instance exists; references resolve to it by type.
    pub singleton: bool,
    /// Components of this type are looked up on the reused owner instead of
    /// being re-created.
    pub findable: bool,
    /// Only base-type fields plus `carry_fields` are copied.
    pub shallow_restore: bool,
}

/// Registered shape of a node type.
#[derive(Debug, Clone, Serialize)]
pub struct TypeSchema {
    pub tag: TypeTag,
    pub kind: NodeKind,
    pub parent: Option<TypeTag>,
    pub fields: Vec<FieldDecl>,
    pub flags: TypeFlags,
    /// Derived fields still copied when `shallow_restore` is set.
    pub carry_fields: Vec<String>,
}

impl TypeSchema {
    pub fn new(tag: impl Into<TypeTag>, kind: NodeKind) -> Self {
        TypeSchema {
            tag: tag.into(),
            kind,
            parent: None,
            fields: Vec::new(),
            flags: TypeFlags::default(),
            carry_fields: Vec::new(),
        }
    }

    pub fn parent(mut self, parent: impl Into<TypeTag>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    pub fn field(mut self, name: &str, kind: MemberKind) -> Self {
        self.fields.push(FieldDecl {
            name: name.to_string(),
            kind,
        });
        self
    }

    pub fn simple(self, name: &str) -> Self {
        self.field(name, MemberKind::Simple)
    }

    pub fn reference(self, name: &str) -> Self {
        self.field(name, MemberKind::Reference)
    }

    pub fn list_of_simple(self, name: &str) -> Self {
        self.field(name, MemberKind::Sequence(ElemKind::Simple))
    }

    pub fn list_of_complex(self, name: &str) -> Self {
        self.field(name, MemberKind::Sequence(ElemKind::Complex))
    }

    pub fn singleton(mut self) -> Self {
        self.flags.singleton = true;
        self
    }

    pub fn findable(mut self) -> Self {
        self.flags.findable = true;
        self
    }

    pub fn shallow_restore(mut self, carry: &[&str]) -> Self {
        self.flags.shallow_restore = true;
        self.carry_fields = carry.iter().map(|s| s.to_string()).collect();
        self
    }
}

/// Errors from type registration or lookup.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    #[error("type {0} already registered")]
    Duplicate(TypeTag),

    #[error("type {child} names unregistered parent {parent}")]
    UnknownParent { child: TypeTag, parent: TypeTag },

    #[error("type {child} is {child_kind:?} but parent {parent} is {parent_kind:?}")]
    KindMismatch {
        child: TypeTag,
        child_kind: NodeKind,
        parent: TypeTag,
        parent_kind: NodeKind,
    },

    #[error("field {field} on {tag} shadows a field declared by {ancestor}")]
    Shadowed {
        tag: TypeTag,
        field: String,
        ancestor: TypeTag,
    },

    #[error("unknown type: {0}")]
    Unknown(TypeTag),
}

impl From<SchemaError> for qs_common::Error {
    fn from(err: SchemaError) -> Self {
        match err {
            SchemaError::Unknown(tag) => qs_common::Error::UnknownType(tag.0),
            other => qs_common::Error::Config(other.to_string()),
        }
    }
}

/// Closed registry of every node type the graph may contain.
#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    types: HashMap<TypeTag, TypeSchema>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a type. Parents must be registered first, must share the
    /// child's node kind, and field names must be unique along the lineage.
    pub fn register(&mut self, schema: TypeSchema) -> Result<(), SchemaError> {
        if self.types.contains_key(&schema.tag) {
            return Err(SchemaError::Duplicate(schema.tag));
        }

        if let Some(parent) = &schema.parent {
            let parent_schema = self.types.get(parent).ok_or_else(|| SchemaError::UnknownParent {
                child: schema.tag.clone(),
                parent: parent.clone(),
            })?;
            if parent_schema.kind != schema.kind {
                return Err(SchemaError::KindMismatch {
                    child: schema.tag.clone(),
                    child_kind: schema.kind,
                    parent: parent.clone(),
                    parent_kind: parent_schema.kind,
                });
            }
            for ancestor in self.lineage(parent)? {
                for field in &schema.fields {
                    if ancestor.fields.iter().any(|f| f.name == field.name) {
                        return Err(SchemaError::Shadowed {
                            tag: schema.tag.clone(),
                            field: field.name.clone(),
                            ancestor: ancestor.tag.clone(),
                        });
                    }
                }
            }
        }

        self.types.insert(schema.tag.clone(), schema);
        Ok(())
    }

    pub fn get(&self, tag: &TypeTag) -> Option<&TypeSchema> {
        self.types.get(tag)
    }

    pub fn schema(&self, tag: &TypeTag) -> Result<&TypeSchema, SchemaError> {
        self.types
            .get(tag)
            .ok_or_else(|| SchemaError::Unknown(tag.clone()))
    }

    pub fn contains(&self, tag: &TypeTag) -> bool {
        self.types.contains_key(tag)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// The type and its ancestors, most ancestral first.
    pub fn lineage(&self, tag: &TypeTag) -> Result<Vec<&TypeSchema>, SchemaError> {
        let mut chain = Vec::new();
        let mut current = Some(tag);
        while let Some(t) = current {
            let schema = self.schema(t)?;
            chain.push(schema);
            current = schema.parent.as_ref();
        }
        chain.reverse();
        Ok(chain)
    }

    /// Whether `tag` is `ancestor` or derives from it.
    pub fn is_a(&self, tag: &TypeTag, ancestor: &TypeTag) -> bool {
        self.lineage(tag)
            .map(|chain| chain.iter().any(|s| &s.tag == ancestor))
            .unwrap_or(false)
    }

    /// Fields to walk for a copy, base type first.
    ///
    /// `scope.upto` stops the walk after the named ancestor; `shallow_restore`
    /// types stop after their most ancestral type and then append their
    /// `carry_fields`. Filtering by member kind is left to the copier.
    pub fn fields_for(
        &self,
        tag: &TypeTag,
        scope: &CopyScope,
    ) -> Result<Vec<&FieldDecl>, SchemaError> {
        let chain = self.lineage(tag)?;
        let own = self.schema(tag)?;

        let mut out = Vec::new();
        let mut carry: Vec<&str> = Vec::new();
        let stop_at = match &scope.upto {
            Some(upto) => Some(upto),
            None if own.flags.shallow_restore && scope.honor_shallow => {
                carry = own.carry_fields.iter().map(String::as_str).collect();
                chain.first().map(|s| &s.tag)
            }
            None => None,
        };

        for schema in &chain {
            out.extend(schema.fields.iter());
            if stop_at == Some(&schema.tag) {
                break;
            }
        }

        for schema in chain.iter().skip(1) {
            for field in &schema.fields {
                if carry.contains(&field.name.as_str()) {
                    out.push(field);
                }
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> TypeRegistry {
        let mut types = TypeRegistry::new();
        types
            .register(TypeSchema::new("Component", NodeKind::Component).simple("active"))
            .unwrap();
        types
            .register(
                TypeSchema::new("Light", NodeKind::Component)
                    .parent("Component")
                    .simple("alpha")
                    .simple("radius")
                    .reference("target")
                    .shallow_restore(&["alpha"]),
            )
            .unwrap();
        types
    }

    #[test]
    fn lineage_is_base_first() {
        let types = registry();
        let chain = types.lineage(&"Light".into()).unwrap();
        let tags: Vec<&str> = chain.iter().map(|s| s.tag.as_str()).collect();
        assert_eq!(tags, vec!["Component", "Light"]);
        assert!(types.is_a(&"Light".into(), &"Component".into()));
        assert!(!types.is_a(&"Component".into(), &"Light".into()));
    }

    #[test]
    fn full_scope_walks_every_field() {
        let types = registry();
        let fields = types
            .fields_for(&"Light".into(), &CopyScope::full().ignore_shallow())
            .unwrap();
        let names: Vec<&str> = fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["active", "alpha", "radius", "target"]);
    }

    #[test]
    fn shallow_restore_copies_base_plus_carry() {
        let types = registry();
        let fields = types.fields_for(&"Light".into(), &CopyScope::full()).unwrap();
        let names: Vec<&str> = fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["active", "alpha"]);
    }

    #[test]
    fn upto_stops_at_ancestor() {
        let types = registry();
        let fields = types
            .fields_for(&"Light".into(), &CopyScope::upto("Component"))
            .unwrap();
        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].name, "active");

        let root_scope = types
            .fields_for(&"Light".into(), &CopyScope::simple_and_null())
            .unwrap();
        assert_eq!(root_scope.len(), 4);
    }

    #[test]
    fn rejects_unknown_parent_and_shadowing() {
        let mut types = registry();
        let orphan = TypeSchema::new("Orphan", NodeKind::Component).parent("Missing");
        assert!(matches!(
            types.register(orphan),
            Err(SchemaError::UnknownParent { .. })
        ));

        let shadow = TypeSchema::new("Lamp", NodeKind::Component)
            .parent("Light")
            .simple("alpha");
        assert!(matches!(
            types.register(shadow),
            Err(SchemaError::Shadowed { .. })
        ));
    }

    #[test]
    fn rejects_kind_mismatch() {
        let mut types = registry();
        let bad = TypeSchema::new("Spring", NodeKind::Entity).parent("Component");
        assert!(matches!(
            types.register(bad),
            Err(SchemaError::KindMismatch { .. })
        ));
    }
}
