use chrono::{DateTime, Utc};
use qs_common::SnapshotId;
use tracing::debug;

use crate::copy::{CopyError, CopyStats, Copier, RootSet};
use crate::graph::{Graph, NodeKey};
use crate::world::{Ambient, World};

/// Deep copy of the live root and its capture set, plus ambient scalars,
/// taken at one instant. Never mutated after creation.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub id: SnapshotId,
    pub area: String,
    pub graph: Graph,
    /// Copy of the live root, inside `graph`.
    pub root: NodeKey,
    /// Copies of the captured entities, inside `graph`, in capture order.
    pub entities: Vec<NodeKey>,
    pub ambient: Ambient,
    pub stats: CopyStats,
    pub captured_at: DateTime<Utc>,
}

impl Snapshot {
    /// Copy `root` and `entities` out of the live world in one session, so
    /// references shared between them stay shared in the copy.
    pub fn take(world: &World, root: NodeKey, entities: Vec<NodeKey>) -> Result<Self, CopyError> {
        let roots = RootSet::gather(&world.graph, entities);
        let mut graph = Graph::new();

        let mut copier = Copier::capture(&world.types, &world.factories, &world.graph, &mut graph);
        let saved_root = copier
            .resolve_node(root)?
            .ok_or(CopyError::MissingNode { side: "root" })?;
        let saved: Vec<NodeKey> = copier.copy_roots(&roots)?.into_iter().flatten().collect();
        let out = copier.finish();

        for key in &saved {
            graph.add_entity(*key);
        }
        debug!(
            nodes = graph.len(),
            entities = saved.len(),
            skipped = roots.len() - saved.len(),
            "snapshot graph built"
        );

        Ok(Snapshot {
            id: SnapshotId::new(),
            area: world.scene.area.clone(),
            graph,
            root: saved_root,
            entities: saved,
            ambient: world.ambient.clone(),
            stats: out.stats,
            captured_at: Utc::now(),
        })
    }

    /// Entities in capture order, with their side-table data.
    pub fn root_set(&self) -> RootSet {
        RootSet::gather(&self.graph, self.entities.clone())
    }
}
