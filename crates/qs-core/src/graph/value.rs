//! Member values.
//!
//! `Value` is the closed set of things a node member can hold. Which copy
//! rule applies is decided by the member's declared [`MemberKind`], not by
//! the runtime value, so a `Null` still dispatches correctly.

use serde::{Deserialize, Serialize};

use super::NodeKey;

/// Plain-data value copied by assignment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Scalar {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Vec2 { x: f32, y: f32 },
}

/// Duplicate-handling semantics of a sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeqKind {
    /// Ordered, duplicates kept.
    List,
    /// Ordered, fixed length once allocated.
    Array,
    /// Unordered, duplicates dropped on insert.
    Set,
}

/// Ordered, homogeneous, variable-length collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sequence {
    pub kind: SeqKind,
    pub items: Vec<Value>,
}

impl Sequence {
    pub fn new(kind: SeqKind) -> Self {
        Sequence {
            kind,
            items: Vec::new(),
        }
    }

    pub fn list(items: Vec<Value>) -> Self {
        Sequence {
            kind: SeqKind::List,
            items,
        }
    }

    pub fn array(items: Vec<Value>) -> Self {
        Sequence {
            kind: SeqKind::Array,
            items,
        }
    }

    pub fn set(items: Vec<Value>) -> Self {
        let mut seq = Sequence::new(SeqKind::Set);
        for item in items {
            seq.push(item);
        }
        seq
    }

    /// Append, honoring set semantics.
    pub fn push(&mut self, value: Value) {
        if self.kind == SeqKind::Set && self.items.contains(&value) {
            return;
        }
        self.items.push(value);
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// One paused activation of a resumable routine.
///
/// Routines are explicit state machines: `routine` names the machine,
/// `resume_at` is the state to continue from, and `locals` hold whatever the
/// machine carries between states (possibly references to nodes).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub routine: String,
    pub resume_at: u32,
    #[serde(default)]
    pub locals: Vec<Value>,
}

impl Frame {
    pub fn new(routine: impl Into<String>, resume_at: u32) -> Self {
        Frame {
            routine: routine.into(),
            resume_at,
            locals: Vec::new(),
        }
    }

    pub fn with_local(mut self, value: Value) -> Self {
        self.locals.push(value);
        self
    }
}

/// Stack of paused frames; the last frame is the one that resumes first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoutineStack {
    pub frames: Vec<Frame>,
}

impl RoutineStack {
    pub fn new(frames: Vec<Frame>) -> Self {
        RoutineStack { frames }
    }

    pub fn top(&self) -> Option<&Frame> {
        self.frames.last()
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }
}

/// Bound function reference. A callback without a receiver is static and
/// immutable, so it is shared as-is between graphs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Callback {
    pub func: String,
    pub receiver: Option<NodeKey>,
}

impl Callback {
    pub fn bound(func: impl Into<String>, receiver: NodeKey) -> Self {
        Callback {
            func: func.into(),
            receiver: Some(receiver),
        }
    }

    pub fn unbound(func: impl Into<String>) -> Self {
        Callback {
            func: func.into(),
            receiver: None,
        }
    }

    pub fn is_static(&self) -> bool {
        self.receiver.is_none()
    }
}

/// Category of a shared non-node resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    /// Immutable asset, shared between graphs.
    Texture,
    /// Playback instance with mutable position; cloned per graph.
    Audio,
}

/// Handle to an entry in a graph's resource table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceRef {
    pub kind: ResourceKind,
    pub id: u64,
}

/// A member value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Value {
    #[default]
    Null,
    Scalar(Scalar),
    Seq(Sequence),
    Routine(RoutineStack),
    Node(NodeKey),
    Resource(ResourceRef),
    Callback(Callback),
}

impl Value {
    pub fn int(v: i64) -> Self {
        Value::Scalar(Scalar::Int(v))
    }

    pub fn float(v: f64) -> Self {
        Value::Scalar(Scalar::Float(v))
    }

    pub fn bool(v: bool) -> Self {
        Value::Scalar(Scalar::Bool(v))
    }

    pub fn text(v: impl Into<String>) -> Self {
        Value::Scalar(Scalar::Text(v.into()))
    }

    pub fn vec2(x: f32, y: f32) -> Self {
        Value::Scalar(Scalar::Vec2 { x, y })
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_node(&self) -> Option<NodeKey> {
        match self {
            Value::Node(key) => Some(*key),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Scalar(Scalar::Int(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Scalar(Scalar::Float(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Scalar(Scalar::Bool(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn as_seq(&self) -> Option<&Sequence> {
        match self {
            Value::Seq(seq) => Some(seq),
            _ => None,
        }
    }

    pub fn as_routine(&self) -> Option<&RoutineStack> {
        match self {
            Value::Routine(stack) => Some(stack),
            _ => None,
        }
    }
}

/// Element classification of a sequence member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElemKind {
    /// Plain data; copied by value.
    Simple,
    /// Nodes, resources, callbacks or nested structures.
    Complex,
}

/// Declared classification of a member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemberKind {
    Simple,
    Sequence(ElemKind),
    Routine,
    Reference,
    Callback,
}

impl MemberKind {
    pub fn is_simple(self) -> bool {
        matches!(self, MemberKind::Simple)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_drops_duplicates_list_keeps_them() {
        let mut set = Sequence::set(vec![Value::int(1), Value::int(1), Value::int(2)]);
        assert_eq!(set.len(), 2);
        set.push(Value::int(2));
        assert_eq!(set.len(), 2);

        let mut list = Sequence::list(vec![Value::int(1)]);
        list.push(Value::int(1));
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn static_callback_detection() {
        assert!(Callback::unbound("on_land").is_static());
    }

    #[test]
    fn routine_top_is_last_frame() {
        let stack = RoutineStack::new(vec![Frame::new("outer", 0), Frame::new("inner", 3)]);
        assert_eq!(stack.top().map(|f| f.routine.as_str()), Some("inner"));
        assert_eq!(stack.depth(), 2);
    }

    #[test]
    fn value_accessors() {
        assert_eq!(Value::int(4).as_int(), Some(4));
        assert_eq!(Value::float(0.5).as_float(), Some(0.5));
        assert_eq!(Value::bool(true).as_bool(), Some(true));
        assert!(Value::default().is_null());
        assert!(Value::text("x").as_node().is_none());
    }
}
