//! Ready-made extension points for common per-type fix-ups.

mod carry;
mod path;

pub use carry::CarryFieldsAction;
pub use path::PendingPathAction;

use qs_common::{StableId, TypeTag};

use crate::graph::{Graph, NodeKey};

/// Attached entities of `tag` that carry a stable id.
fn entities_of<'g>(
    graph: &'g Graph,
    tag: &'g TypeTag,
) -> impl Iterator<Item = (NodeKey, &'g StableId)> + 'g {
    graph.entities().iter().filter_map(move |&key| {
        let node = graph.node(key)?;
        if &node.type_tag != tag {
            return None;
        }
        node.stable_id.as_ref().map(|id| (key, id))
    })
}
