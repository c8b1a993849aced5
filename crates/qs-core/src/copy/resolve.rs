//! Find-or-clone.
//!
//! Resolution order for a source node: session memo, then a live match in
//! the destination graph, then a fresh clone. A node that cannot be resolved
//! is logged and left as a null reference.

use std::sync::Arc;

use tracing::{info, warn};

use super::engine::Copier;
use super::{CopyError, CopyScope, Direction};
use crate::graph::{Callback, Node, NodeKey, NodeKind, ResourceKind, ResourceRef};
use crate::identity::Verdict;

/// Result of looking for a live counterpart of a source node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FindOutcome {
    Found(NodeKey),
    /// A collaborator refused resolution of this node.
    Vetoed,
    NotFound,
}

impl<'a> Copier<'a> {
    /// Destination node standing for `source`, reusing or cloning as needed.
    /// `Ok(None)` is a resolution failure; errors are contract violations.
    pub fn resolve_node(&mut self, source: NodeKey) -> Result<Option<NodeKey>, CopyError> {
        if let Some(dest) = self.session.lookup(source) {
            return Ok(Some(dest));
        }

        match self.find_node(source) {
            FindOutcome::Found(dest) => {
                self.session.memoize(source, dest);
                self.session.stats.reused += 1;
                return Ok(Some(dest));
            }
            FindOutcome::Vetoed => {
                self.session.stats.failed += 1;
                warn!(node = ?source, "resolution vetoed; leaving reference detached");
                return Ok(None);
            }
            FindOutcome::NotFound => {}
        }

        self.clone_node(source)
    }

    /// Look for a live counterpart of `source`. Capture never finds anything:
    /// every node reachable from the live graph is cloned into the snapshot.
    pub fn find_node(&self, source: NodeKey) -> FindOutcome {
        if self.direction == Direction::Capture {
            return FindOutcome::NotFound;
        }
        let Some(node) = self.src.node(source) else {
            return FindOutcome::NotFound;
        };

        if node.kind == NodeKind::Root {
            return match self.dst.root() {
                Some(root) if self.same_type(root, node) => FindOutcome::Found(root),
                _ => FindOutcome::NotFound,
            };
        }

        let flags = self
            .types
            .get(&node.type_tag)
            .map(|s| s.flags.clone())
            .unwrap_or_default();

        if flags.singleton {
            return self
                .dst
                .first_of_type(&node.type_tag)
                .map_or(FindOutcome::NotFound, FindOutcome::Found);
        }

        if let (Some(id), Some(registry)) = (&node.stable_id, self.identities) {
            if registry.indexes(node.kind, &node.type_tag) {
                match registry.override_for(id) {
                    Some(Verdict::Veto) => return FindOutcome::Vetoed,
                    Some(Verdict::Reuse(key)) if self.same_type(key, node) => {
                        return FindOutcome::Found(key);
                    }
                    _ => {}
                }
                if let Some(key) = registry.lookup(id).filter(|k| self.same_type(*k, node)) {
                    return FindOutcome::Found(key);
                }
            }
        }

        if node.kind == NodeKind::Component && flags.findable {
            if let Some(owner) = node.owner {
                if let FindOutcome::Found(dest_owner) = self.find_node(owner) {
                    let ordinal = self.src.component_ordinal(source).unwrap_or(0);
                    if let Some(found) =
                        self.dst.find_component(dest_owner, &node.type_tag, ordinal)
                    {
                        info!(type_tag = %node.type_tag, "found {} instead of recreating a new one", node.type_tag);
                        return FindOutcome::Found(found);
                    }
                }
            }
        }

        FindOutcome::NotFound
    }

    fn same_type(&self, dest: NodeKey, source: &Node) -> bool {
        self.dst
            .node(dest)
            .is_some_and(|n| n.type_tag == source.type_tag)
    }

    /// Manufacture a destination node for `source` and populate it.
    fn clone_node(&mut self, source: NodeKey) -> Result<Option<NodeKey>, CopyError> {
        let src = self.src;
        let types = self.types;
        let factories = self.factories;
        let Some(node) = src.node(source) else {
            self.session.stats.failed += 1;
            warn!(node = ?source, "source node vanished before it could be cloned");
            return Ok(None);
        };
        let Some(schema) = types.get(&node.type_tag) else {
            self.session.stats.failed += 1;
            warn!(type_tag = %node.type_tag, "cannot clone unregistered type; leaving reference detached");
            return Ok(None);
        };

        let factory = factories.get(&node.type_tag);
        let mut fresh = match factory {
            Some(f) => f.construct(schema, node),
            None => Node::blank(schema),
        };
        fresh.stable_id = node.stable_id.clone();
        fresh.tags = node.tags;

        let dest = self.dst.insert(fresh);
        self.session.memoize(source, dest);
        self.session.stats.cloned += 1;
        if node.kind == NodeKind::Root && self.dst.root().is_none() {
            self.dst.set_root(dest);
        }

        self.copy_into(dest, source, &CopyScope::full())?;
        if let Some(f) = factory {
            f.finish(dest, self.dst);
        }
        Ok(Some(dest))
    }

    /// Immutable textures are shared under their id. Audio handles are
    /// copied: onto `current` when it is an audio handle of the destination,
    /// otherwise into a fresh handle.
    pub(super) fn resolve_resource(
        &mut self,
        source: ResourceRef,
        current: Option<ResourceRef>,
    ) -> Option<ResourceRef> {
        if let Some(dest) = self.session.lookup_resource(source) {
            return Some(dest);
        }
        let src = self.src;

        let dest = match source.kind {
            ResourceKind::Texture => src
                .resources
                .texture(source.id)
                .map(|tex| self.dst.resources.share_texture(source.id, Arc::clone(tex))),
            ResourceKind::Audio => src.resources.audio(source.id).map(|handle| {
                let mut handle = handle.clone();
                let pause = self.direction == Direction::Reconcile
                    && self.pause_audio
                    && handle.is_audible();
                if pause {
                    handle.paused = true;
                }

                let target = current
                    .filter(|c| c.kind == ResourceKind::Audio && self.dst.resources.contains(*c));
                let dest = match target {
                    Some(existing) => {
                        if let Some(slot) = self.dst.resources.audio_mut(existing.id) {
                            *slot = handle;
                        }
                        existing
                    }
                    None => self.dst.resources.add_audio(handle),
                };
                if pause {
                    self.paused_audio.push(dest);
                }
                dest
            }),
        };

        match dest {
            Some(dest) => {
                self.session.memoize_resource(source, dest);
                Some(dest)
            }
            None => {
                self.session.stats.failed += 1;
                warn!(resource = ?source, "resource missing from source table");
                None
            }
        }
    }

    /// Static callbacks are shared as-is; bound ones follow their receiver.
    pub(super) fn resolve_callback(
        &mut self,
        callback: &Callback,
    ) -> Result<Option<Callback>, CopyError> {
        let Some(receiver) = callback.receiver else {
            return Ok(Some(callback.clone()));
        };
        match self.resolve_node(receiver)? {
            Some(dest) => Ok(Some(Callback::bound(callback.func.clone(), dest))),
            None => {
                warn!(func = %callback.func, "callback receiver did not resolve");
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::copy::FactoryTable;
    use crate::graph::{Graph, TypeRegistry, TypeSchema, Value};
    use crate::identity::IdentityRegistry;
    use qs_common::StableId;

    fn types() -> TypeRegistry {
        let mut types = TypeRegistry::new();
        types
            .register(TypeSchema::new("Level", NodeKind::Root).simple("time"))
            .unwrap();
        types
            .register(TypeSchema::new("Spring", NodeKind::Entity).simple("power"))
            .unwrap();
        types
            .register(TypeSchema::new("Tiles", NodeKind::Entity).singleton())
            .unwrap();
        types
    }

    #[test]
    fn root_resolves_to_live_root() {
        let types = types();
        let factories = FactoryTable::new();
        let registry = IdentityRegistry::new();

        let mut snapshot = Graph::new();
        let saved_root = snapshot.insert(Node::new("Level", NodeKind::Root));
        snapshot.set_root(saved_root);

        let mut live = Graph::new();
        let live_root = live.insert(Node::new("Level", NodeKind::Root));
        live.set_root(live_root);

        let copier = Copier::reconcile(&types, &factories, &registry, &snapshot, &mut live);
        assert_eq!(copier.find_node(saved_root), FindOutcome::Found(live_root));
    }

    #[test]
    fn singleton_resolves_by_type() {
        let types = types();
        let factories = FactoryTable::new();
        let registry = IdentityRegistry::new();

        let mut snapshot = Graph::new();
        let saved = snapshot.insert(Node::new("Tiles", NodeKind::Entity));

        let mut live = Graph::new();
        let tiles = live.insert(Node::new("Tiles", NodeKind::Entity));
        live.add_entity(tiles);

        let copier = Copier::reconcile(&types, &factories, &registry, &snapshot, &mut live);
        assert_eq!(copier.find_node(saved), FindOutcome::Found(tiles));
    }

    #[test]
    fn veto_fails_resolution_without_cloning() {
        let types = types();
        let factories = FactoryTable::new();
        let id = StableId::new("a-01", 4);

        let mut snapshot = Graph::new();
        let saved = snapshot.insert(Node::new("Spring", NodeKind::Entity).with_id(id.clone()));

        let mut live = Graph::new();
        let mut registry = IdentityRegistry::new();
        registry.veto(id);

        let mut copier = Copier::reconcile(&types, &factories, &registry, &snapshot, &mut live);
        assert_eq!(copier.resolve_node(saved).unwrap(), None);
        let out = copier.finish();
        assert_eq!(out.stats.failed, 1);
        assert_eq!(out.stats.cloned, 0);
        assert!(live.is_empty());
    }

    #[test]
    fn unregistered_type_is_a_soft_failure() {
        let types = types();
        let factories = FactoryTable::new();
        let mut source = Graph::new();
        let stray = source.insert(Node::new("Mystery", NodeKind::Plain));
        let mut dest = Graph::new();

        let mut copier = Copier::capture(&types, &factories, &source, &mut dest);
        assert_eq!(copier.resolve_node(stray).unwrap(), None);
        assert_eq!(copier.finish().stats.failed, 1);
    }

    #[test]
    fn static_callback_shared_as_is() {
        let types = types();
        let factories = FactoryTable::new();
        let source = Graph::new();
        let mut dest = Graph::new();

        let mut copier = Copier::capture(&types, &factories, &source, &mut dest);
        let cb = Callback::unbound("on_bounce");
        let resolved = copier.resolve_value(&Value::Callback(cb.clone())).unwrap();
        assert_eq!(resolved, Value::Callback(cb));
    }
}
