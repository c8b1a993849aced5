use tracing::{debug, trace};

use super::factory::FactoryTable;
use super::session::{CopySession, CopyStats};
use super::{CopyError, CopyScope, Direction, RootSet};
use crate::graph::{
    AuxData, ElemKind, Frame, Graph, MemberKind, NodeKey, NodeKind, ResourceRef, RoutineStack,
    SeqKind, Sequence, TypeRegistry, Value,
};
use crate::identity::{IdentityRegistry, Verdict};

/// What a finished copy leaves behind for the caller.
#[derive(Debug, Clone, Default)]
pub struct CopyOutput {
    pub stats: CopyStats,
    /// Audio handles paused on the way in, to resume once the install settles.
    pub paused_audio: Vec<ResourceRef>,
    /// Every destination node produced or reused by the session.
    pub destinations: Vec<NodeKey>,
    /// Destination components the session detached from their owners.
    pub released: Vec<NodeKey>,
}

/// One copy session between a source graph and a destination graph.
pub struct Copier<'a> {
    pub(super) types: &'a TypeRegistry,
    pub(super) factories: &'a FactoryTable,
    pub(super) identities: Option<&'a IdentityRegistry>,
    pub(super) src: &'a Graph,
    pub(super) dst: &'a mut Graph,
    pub(super) direction: Direction,
    pub(super) session: CopySession,
    pub(super) pause_audio: bool,
    pub(super) paused_audio: Vec<ResourceRef>,
}

impl<'a> Copier<'a> {
    pub fn new(
        types: &'a TypeRegistry,
        factories: &'a FactoryTable,
        src: &'a Graph,
        dst: &'a mut Graph,
        direction: Direction,
    ) -> Self {
        Copier {
            types,
            factories,
            identities: None,
            src,
            dst,
            direction,
            session: CopySession::new(),
            pause_audio: false,
            paused_audio: Vec::new(),
        }
    }

    /// Copier for taking a snapshot of `live` into an empty `snapshot` graph.
    pub fn capture(
        types: &'a TypeRegistry,
        factories: &'a FactoryTable,
        live: &'a Graph,
        snapshot: &'a mut Graph,
    ) -> Self {
        Copier::new(types, factories, live, snapshot, Direction::Capture)
    }

    /// Copier for reconciling `snapshot` onto `live`.
    pub fn reconcile(
        types: &'a TypeRegistry,
        factories: &'a FactoryTable,
        identities: &'a IdentityRegistry,
        snapshot: &'a Graph,
        live: &'a mut Graph,
    ) -> Self {
        let mut copier = Copier::new(types, factories, snapshot, live, Direction::Reconcile);
        copier.identities = Some(identities);
        copier
    }

    /// Pause audible audio handles as they are reconciled.
    pub fn pause_audio(mut self, enabled: bool) -> Self {
        self.pause_audio = enabled;
        self
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn session(&self) -> &CopySession {
        &self.session
    }

    pub fn finish(self) -> CopyOutput {
        CopyOutput {
            stats: self.session.stats,
            destinations: self.session.destinations().collect(),
            released: self.session.released().to_vec(),
            paused_audio: self.paused_audio,
        }
    }

    /// Copy `source`'s members onto the existing node `dest`.
    ///
    /// The two nodes must have the same type. A source already being copied
    /// in this session is skipped.
    pub fn copy_into(
        &mut self,
        dest: NodeKey,
        source: NodeKey,
        scope: &CopyScope,
    ) -> Result<(), CopyError> {
        let src = self.src;
        let src_node = src
            .node(source)
            .ok_or(CopyError::MissingNode { side: "source" })?;
        let dst_node = self
            .dst
            .node(dest)
            .ok_or(CopyError::MissingNode { side: "destination" })?;

        if src_node.type_tag != dst_node.type_tag {
            return Err(CopyError::TypeMismatch {
                dest_type: dst_node.type_tag.clone(),
                source_type: src_node.type_tag.clone(),
            });
        }
        if src_node.kind == NodeKind::Entity && src_node.stable_id != dst_node.stable_id {
            debug!(
                type_tag = %src_node.type_tag,
                source = ?src_node.stable_id,
                dest = ?dst_node.stable_id,
                "copying between entities with different stable ids"
            );
        }

        if self.session.is_done(source, dest) {
            return Ok(());
        }
        if !self.session.begin(source) {
            self.session.stats.cycles_absorbed += 1;
            trace!(type_tag = %src_node.type_tag, "skipping node already being copied");
            return Ok(());
        }
        self.session.memoize(source, dest);

        let result = self
            .copy_members(dest, source, scope)
            .and_then(|()| {
                if scope.simple_only {
                    Ok(())
                } else {
                    self.copy_structure(dest, source)
                }
            });
        self.session.finish(source);
        if result.is_ok() {
            self.session.stats.copied += 1;
        }
        result
    }

    /// Resolve and copy each top-level node, then thread its side-table data
    /// through by position. Returns one destination per input, `None` where
    /// resolution failed.
    pub fn copy_roots(&mut self, roots: &RootSet) -> Result<Vec<Option<NodeKey>>, CopyError> {
        let mut out = Vec::with_capacity(roots.len());
        for &source in &roots.nodes {
            let dest = self.resolve_node(source)?;
            if let Some(dest) = dest {
                self.copy_into(dest, source, &CopyScope::full())?;
            }
            out.push(dest);
        }

        for (index, data) in &roots.aux {
            let Some(Some(dest)) = out.get(*index).copied() else {
                continue;
            };
            let mut copied = AuxData::new();
            for (name, value) in data {
                copied.insert(name.clone(), self.resolve_value(value)?);
            }
            self.dst.set_aux(dest, copied);
        }
        Ok(out)
    }

    fn copy_members(
        &mut self,
        dest: NodeKey,
        source: NodeKey,
        scope: &CopyScope,
    ) -> Result<(), CopyError> {
        let types = self.types;
        let src = self.src;
        let tag = src
            .node(source)
            .map(|n| &n.type_tag)
            .ok_or(CopyError::MissingNode { side: "source" })?;

        for field in types.fields_for(tag, scope)? {
            let incoming = src.member(source, &field.name);
            if scope.simple_only && !field.kind.is_simple() {
                if scope.copy_nulls && incoming.is_null() {
                    self.dst.set_member(dest, &field.name, Value::Null);
                }
                continue;
            }
            self.copy_member(dest, &field.name, field.kind, incoming)?;
        }
        Ok(())
    }

    fn copy_member(
        &mut self,
        dest: NodeKey,
        name: &str,
        kind: MemberKind,
        incoming: &Value,
    ) -> Result<(), CopyError> {
        let current = self.dst.member(dest, name).clone();
        let value = match kind {
            _ if incoming.is_null() => {
                self.release_owned(&current);
                Value::Null
            }
            MemberKind::Simple => incoming.clone(),
            MemberKind::Sequence(ElemKind::Simple) => copy_simple_sequence(&current, incoming),
            MemberKind::Sequence(ElemKind::Complex)
            | MemberKind::Routine
            | MemberKind::Reference
            | MemberKind::Callback => self.reconcile_value(current, incoming)?,
        };
        self.dst.set_member(dest, name, value);
        Ok(())
    }

    /// Produce the destination-side value for `incoming`, given what the
    /// destination slot holds now.
    pub(super) fn reconcile_value(
        &mut self,
        current: Value,
        incoming: &Value,
    ) -> Result<Value, CopyError> {
        match incoming {
            Value::Null => {
                self.release_owned(&current);
                Ok(Value::Null)
            }
            Value::Scalar(_) => Ok(incoming.clone()),
            Value::Seq(source) => self.reconcile_sequence(current, source).map(Value::Seq),
            Value::Routine(stack) => self.rebuild_routine(stack).map(Value::Routine),
            Value::Node(source) => self.reconcile_node(current.as_node(), *source),
            Value::Resource(source) => {
                let current = match current {
                    Value::Resource(r) => Some(r),
                    _ => None,
                };
                Ok(self
                    .resolve_resource(*source, current)
                    .map_or(Value::Null, Value::Resource))
            }
            Value::Callback(callback) => Ok(self
                .resolve_callback(callback)?
                .map_or(Value::Null, Value::Callback)),
        }
    }

    /// Resolve a value with nothing in the destination slot yet.
    pub(super) fn resolve_value(&mut self, incoming: &Value) -> Result<Value, CopyError> {
        self.reconcile_value(Value::Null, incoming)
    }

    fn reconcile_node(
        &mut self,
        current: Option<NodeKey>,
        source: NodeKey,
    ) -> Result<Value, CopyError> {
        if let Some(mapped) = self.session.lookup(source) {
            return Ok(Value::Node(mapped));
        }

        if let Some(current) = current {
            match self.in_place_target(current, source) {
                Some(NodeKind::Entity) => {
                    self.session.memoize(source, current);
                    self.session.stats.reused += 1;
                    return Ok(Value::Node(current));
                }
                Some(_) => {
                    self.copy_into(current, source, &CopyScope::full())?;
                    self.session.stats.reused += 1;
                    return Ok(Value::Node(current));
                }
                None => {}
            }
        }

        Ok(self
            .resolve_node(source)?
            .map_or(Value::Null, Value::Node))
    }

    /// Whether the node already in the destination slot stands for `source`,
    /// so it can be kept (entities) or copied into (everything else). Returns
    /// the node kind when it can.
    fn in_place_target(&self, current: NodeKey, source: NodeKey) -> Option<NodeKind> {
        let src_node = self.src.node(source)?;
        let dst_node = self.dst.node(current)?;
        if src_node.type_tag != dst_node.type_tag || src_node.kind == NodeKind::Root {
            return None;
        }
        if src_node.kind == NodeKind::Entity {
            let id = src_node.stable_id.as_ref()?;
            if dst_node.stable_id.as_ref() != Some(id) {
                return None;
            }
            return match self.identities.and_then(|r| r.override_for(id)) {
                Some(Verdict::Veto) => None,
                Some(Verdict::Reuse(key)) if key != current => None,
                _ => Some(NodeKind::Entity),
            };
        }
        Some(src_node.kind)
    }

    fn reconcile_sequence(
        &mut self,
        current: Value,
        source: &Sequence,
    ) -> Result<Sequence, CopyError> {
        match current {
            Value::Seq(mut seq) if seq.len() == source.len() && source.kind != SeqKind::Set => {
                for (slot, item) in seq.items.iter_mut().zip(&source.items) {
                    let existing = std::mem::take(slot);
                    *slot = self.reconcile_value(existing, item)?;
                }
                seq.kind = source.kind;
                Ok(seq)
            }
            _ => {
                let mut seq = Sequence::new(source.kind);
                for item in &source.items {
                    let value = self.resolve_value(item)?;
                    if value.is_null() && !item.is_null() {
                        debug!("dropping sequence element that failed to resolve");
                        continue;
                    }
                    seq.push(value);
                }
                Ok(seq)
            }
        }
    }

    fn rebuild_routine(&mut self, stack: &RoutineStack) -> Result<RoutineStack, CopyError> {
        let mut frames = Vec::with_capacity(stack.depth());
        for frame in &stack.frames {
            let mut locals = Vec::with_capacity(frame.locals.len());
            for local in &frame.locals {
                locals.push(self.resolve_value(local)?);
            }
            frames.push(Frame {
                routine: frame.routine.clone(),
                resume_at: frame.resume_at,
                locals,
            });
        }
        Ok(RoutineStack::new(frames))
    }

    /// Sync owner links: a component detached in the source is released in
    /// the destination, an attached one follows its resolved owner, and an
    /// entity's component list is rebuilt from the source's. Components found
    /// live are copied into like any other.
    fn copy_structure(&mut self, dest: NodeKey, source: NodeKey) -> Result<(), CopyError> {
        let src = self.src;
        let Some(node) = src.node(source) else {
            return Ok(());
        };

        match node.kind {
            NodeKind::Component => match node.owner {
                None => {
                    if self.dst.release(dest) {
                        self.session.note_released(dest);
                        debug!(type_tag = %node.type_tag, "released component detached in source");
                    }
                }
                Some(owner) => {
                    if let Some(dest_owner) = self.resolve_node(owner)? {
                        self.dst.attach_component(dest_owner, dest);
                    }
                }
            },
            NodeKind::Entity => {
                let mut resolved = Vec::with_capacity(node.components.len());
                for component in &node.components {
                    if let Some(dc) = self.resolve_node(*component)? {
                        self.copy_into(dc, *component, &CopyScope::full())?;
                        resolved.push(dc);
                    }
                }
                let stale: Vec<NodeKey> = self
                    .dst
                    .node(dest)
                    .map(|n| {
                        n.components
                            .iter()
                            .copied()
                            .filter(|c| !resolved.contains(c))
                            .collect()
                    })
                    .unwrap_or_default();
                for component in stale {
                    if self.dst.release(component) {
                        self.session.note_released(component);
                    }
                }
                for component in &resolved {
                    self.dst.attach_component(dest, *component);
                }
                self.dst.set_component_order(dest, &resolved);
            }
            NodeKind::Root | NodeKind::Plain => {}
        }
        Ok(())
    }

    /// Release the node held by a slot that is about to be cleared, when it
    /// is a component attached to an owner.
    fn release_owned(&mut self, current: &Value) {
        let Some(key) = current.as_node() else {
            return;
        };
        let owned = self
            .dst
            .node(key)
            .is_some_and(|n| n.kind == NodeKind::Component && n.owner.is_some());
        if owned {
            self.dst.release(key);
            self.session.note_released(key);
            debug!(node = ?key, "released component before clearing reference");
        }
    }
}

fn copy_simple_sequence(current: &Value, incoming: &Value) -> Value {
    let Value::Seq(source) = incoming else {
        return incoming.clone();
    };
    let mut seq = match current {
        Value::Seq(existing) => existing.clone(),
        _ => Sequence::new(source.kind),
    };
    seq.kind = source.kind;
    seq.clear();
    for item in &source.items {
        seq.push(item.clone());
    }
    Value::Seq(seq)
}
