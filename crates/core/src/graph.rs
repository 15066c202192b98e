//! In-memory workflow graph document and the rewire engine.
//!
//! A [`WorkflowGraph`] is an arena of [`Node`]s addressed by opaque
//! [`NodeId`]s handed out by the graph itself. Edges are [`OutputRef`]
//! values stored in input slots. During assembly, injectors add nodes
//! and call the rewire operations to redirect every slot that pointed
//! at a superseded reference; the finished graph serializes to the
//! backend's prompt JSON via [`WorkflowGraph::to_prompt`].
//!
//! Each request owns its own graph. Nothing here is shared or mutated
//! concurrently.

use indexmap::IndexMap;
use serde_json::{json, Map, Value};

use crate::kind::NodeKind;

/// Opaque node identifier, unique within one graph.
///
/// Allocated by [`WorkflowGraph::insert`], never chosen by callers, so
/// injectors running in the same request cannot collide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A pointer to one output of one node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OutputRef {
    pub node: NodeId,
    pub output: u32,
}

impl OutputRef {
    pub fn new(node: NodeId, output: u32) -> Self {
        Self { node, output }
    }
}

impl From<NodeId> for OutputRef {
    /// A node's first output.
    fn from(node: NodeId) -> Self {
        Self { node, output: 0 }
    }
}

/// Value of a named input slot: either a literal or a link to another
/// node's output.
#[derive(Debug, Clone, PartialEq)]
pub enum InputValue {
    Literal(Value),
    Link(OutputRef),
}

impl InputValue {
    pub fn as_link(&self) -> Option<OutputRef> {
        match self {
            InputValue::Link(r) => Some(*r),
            InputValue::Literal(_) => None,
        }
    }

    pub fn as_literal(&self) -> Option<&Value> {
        match self {
            InputValue::Literal(v) => Some(v),
            InputValue::Link(_) => None,
        }
    }
}

impl From<OutputRef> for InputValue {
    fn from(r: OutputRef) -> Self {
        InputValue::Link(r)
    }
}

impl From<NodeId> for InputValue {
    fn from(node: NodeId) -> Self {
        InputValue::Link(node.into())
    }
}

impl From<&str> for InputValue {
    fn from(v: &str) -> Self {
        InputValue::Literal(Value::String(v.to_string()))
    }
}

impl From<String> for InputValue {
    fn from(v: String) -> Self {
        InputValue::Literal(Value::String(v))
    }
}

impl From<f64> for InputValue {
    fn from(v: f64) -> Self {
        InputValue::Literal(json!(v))
    }
}

impl From<i64> for InputValue {
    fn from(v: i64) -> Self {
        InputValue::Literal(json!(v))
    }
}

impl From<u32> for InputValue {
    fn from(v: u32) -> Self {
        InputValue::Literal(json!(v))
    }
}

impl From<bool> for InputValue {
    fn from(v: bool) -> Self {
        InputValue::Literal(Value::Bool(v))
    }
}

/// A single processing node.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub kind: NodeKind,
    /// Human-readable title, used to disambiguate nodes that share a
    /// kind (e.g. positive vs. negative prompt encoders).
    pub title: String,
    pub inputs: IndexMap<String, InputValue>,
}

impl Node {
    pub fn new(
        kind: NodeKind,
        title: impl Into<String>,
        inputs: impl IntoIterator<Item = (&'static str, InputValue)>,
    ) -> Self {
        Self {
            kind,
            title: title.into(),
            inputs: inputs
                .into_iter()
                .map(|(slot, value)| (slot.to_string(), value))
                .collect(),
        }
    }

    /// The link stored in a named slot, if that slot holds one.
    pub fn link(&self, slot: &str) -> Option<OutputRef> {
        self.inputs.get(slot).and_then(InputValue::as_link)
    }

    /// The literal stored in a named slot, if that slot holds one.
    pub fn literal(&self, slot: &str) -> Option<&Value> {
        self.inputs.get(slot).and_then(InputValue::as_literal)
    }

    /// Overwrite a slot with a literal value.
    pub fn set_literal(&mut self, slot: &str, value: impl Into<Value>) {
        self.inputs
            .insert(slot.to_string(), InputValue::Literal(value.into()));
    }
}

/// Errors from graph construction, template parsing, and validation.
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    #[error("Duplicate node id: {0}")]
    DuplicateId(NodeId),

    #[error("Input slot '{slot}' of node {node} references unknown node {target}")]
    DanglingRef {
        node: NodeId,
        slot: String,
        target: NodeId,
    },

    #[error("Node {0} transitively depends on itself")]
    Cycle(NodeId),

    #[error("Template root must be an object mapping node ids to nodes")]
    MalformedTemplate,

    #[error("Template node '{id}' has an unrecognized class: {detail}")]
    UnknownClass { id: String, detail: String },

    #[error("Template node '{id}' slot '{slot}' references unknown node '{target}'")]
    UnknownTemplateRef {
        id: String,
        slot: String,
        target: String,
    },
}

/// An arena of nodes forming one generation workflow.
#[derive(Debug, Clone, Default)]
pub struct WorkflowGraph {
    nodes: IndexMap<NodeId, Node>,
    next_id: u32,
}

impl WorkflowGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Add a node, allocating the next free id for it.
    pub fn insert(
        &mut self,
        kind: NodeKind,
        title: impl Into<String>,
        inputs: impl IntoIterator<Item = (&'static str, InputValue)>,
    ) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        self.nodes.insert(id, Node::new(kind, title, inputs));
        id
    }

    /// Add a node under a caller-chosen id.
    ///
    /// Fails if the id is already taken. Bumps the allocator past `id`
    /// so later [`insert`](Self::insert) calls cannot collide.
    pub fn insert_with_id(&mut self, id: NodeId, node: Node) -> Result<(), GraphError> {
        if self.nodes.contains_key(&id) {
            return Err(GraphError::DuplicateId(id));
        }
        self.next_id = self.next_id.max(id.0 + 1);
        self.nodes.insert(id, node);
        Ok(())
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(&id)
    }

    /// Iterate nodes in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes.iter().map(|(id, node)| (*id, node))
    }

    /// Mutable iteration in insertion order.
    pub fn nodes_mut(&mut self) -> impl Iterator<Item = (NodeId, &mut Node)> {
        self.nodes.iter_mut().map(|(id, node)| (*id, node))
    }

    /// All nodes of a given kind, in insertion order.
    pub fn find_by_kind(&self, kind: NodeKind) -> Vec<NodeId> {
        self.nodes
            .iter()
            .filter(|(_, node)| node.kind == kind)
            .map(|(id, _)| *id)
            .collect()
    }

    /// The first node of a given kind, if any.
    pub fn find_one(&self, kind: NodeKind) -> Option<NodeId> {
        self.nodes
            .iter()
            .find(|(_, node)| node.kind == kind)
            .map(|(id, _)| *id)
    }

    // ---- rewire engine ----

    /// Redirect every input slot in the graph that points at `old` to
    /// point at `new` instead.
    ///
    /// Idempotent: a second call with the same arguments is a no-op
    /// because no remaining slot matches `old`. Literals and
    /// non-matching links are never touched. Callers must chain
    /// insertions in data-flow order (producer before consumer) to
    /// preserve acyclicity.
    pub fn rewire(&mut self, old: OutputRef, new: OutputRef) {
        self.rewire_excluding(old, new, &[]);
    }

    /// Graph-wide rewire that skips the listed nodes (typically the
    /// freshly inserted node, which consumes `old` itself).
    pub fn rewire_excluding(&mut self, old: OutputRef, new: OutputRef, exclude: &[NodeId]) {
        for (id, node) in self.nodes.iter_mut() {
            if exclude.contains(id) {
                continue;
            }
            for value in node.inputs.values_mut() {
                if value.as_link() == Some(old) {
                    *value = InputValue::Link(new);
                }
            }
        }
    }

    /// Redirect matching slots of a single node only.
    ///
    /// Used where a graph-wide sweep would be wrong: splicing in front
    /// of a save node, or redirecting the sampler-facing conditioning
    /// consumers after control injection.
    pub fn rewire_inputs_of(&mut self, node: NodeId, old: OutputRef, new: OutputRef) {
        if let Some(node) = self.nodes.get_mut(&node) {
            for value in node.inputs.values_mut() {
                if value.as_link() == Some(old) {
                    *value = InputValue::Link(new);
                }
            }
        }
    }

    // ---- validation ----

    /// Check submission invariants: every link targets a present node
    /// and the link relation is acyclic.
    pub fn validate(&self) -> Result<(), GraphError> {
        for (id, node) in &self.nodes {
            for (slot, value) in &node.inputs {
                if let Some(r) = value.as_link() {
                    if !self.nodes.contains_key(&r.node) {
                        return Err(GraphError::DanglingRef {
                            node: *id,
                            slot: slot.clone(),
                            target: r.node,
                        });
                    }
                }
            }
        }
        self.check_acyclic()
    }

    /// Depth-first cycle detection over link edges.
    fn check_acyclic(&self) -> Result<(), GraphError> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            Unvisited,
            InProgress,
            Done,
        }

        let mut marks: IndexMap<NodeId, Mark> =
            self.nodes.keys().map(|id| (*id, Mark::Unvisited)).collect();
        let ids: Vec<NodeId> = self.nodes.keys().copied().collect();

        for start in ids {
            if marks[&start] != Mark::Unvisited {
                continue;
            }
            // Iterative DFS: (node, next child index to visit).
            let mut stack: Vec<(NodeId, usize)> = vec![(start, 0)];
            marks.insert(start, Mark::InProgress);

            while let Some((id, child_idx)) = stack.pop() {
                let deps: Vec<NodeId> = self.nodes[&id]
                    .inputs
                    .values()
                    .filter_map(InputValue::as_link)
                    .map(|r| r.node)
                    .filter(|dep| self.nodes.contains_key(dep))
                    .collect();

                if child_idx < deps.len() {
                    stack.push((id, child_idx + 1));
                    let dep = deps[child_idx];
                    match marks[&dep] {
                        Mark::InProgress => return Err(GraphError::Cycle(dep)),
                        Mark::Unvisited => {
                            marks.insert(dep, Mark::InProgress);
                            stack.push((dep, 0));
                        }
                        Mark::Done => {}
                    }
                } else {
                    marks.insert(id, Mark::Done);
                }
            }
        }
        Ok(())
    }

    // ---- serialization ----

    /// Serialize to the backend's prompt JSON:
    /// `{"<id>": {"class_type": ..., "inputs": {...}, "_meta": {"title": ...}}}`.
    pub fn to_prompt(&self) -> Value {
        let mut doc = Map::new();
        for (id, node) in &self.nodes {
            let mut inputs = Map::new();
            for (slot, value) in &node.inputs {
                let raw = match value {
                    InputValue::Literal(v) => v.clone(),
                    InputValue::Link(r) => json!([r.node.to_string(), r.output]),
                };
                inputs.insert(slot.clone(), raw);
            }
            doc.insert(
                id.to_string(),
                json!({
                    "class_type": node.kind,
                    "inputs": Value::Object(inputs),
                    "_meta": { "title": node.title },
                }),
            );
        }
        Value::Object(doc)
    }

    /// Parse a stored template into a fresh graph.
    ///
    /// Template node ids are opaque strings chosen by the template
    /// author; they are remapped to allocated [`NodeId`]s here.
    /// `["<id>", <index>]` arrays become links, everything else is kept
    /// as a literal. Unrecognized `class_type` values and references to
    /// absent nodes are errors.
    pub fn from_template(template: &Value) -> Result<Self, GraphError> {
        let entries = template.as_object().ok_or(GraphError::MalformedTemplate)?;

        let mut graph = Self::new();
        let mut id_map: IndexMap<&str, NodeId> = IndexMap::new();

        // First pass: assign ids so forward references resolve. The
        // allocator advances when the nodes land in the second pass.
        for (idx, key) in entries.keys().enumerate() {
            id_map.insert(key.as_str(), NodeId(idx as u32));
        }

        // Second pass: parse nodes and remap references.
        for (key, raw) in entries {
            let obj = raw.as_object().ok_or(GraphError::MalformedTemplate)?;

            let kind: NodeKind = serde_json::from_value(
                obj.get("class_type").cloned().unwrap_or(Value::Null),
            )
            .map_err(|e| GraphError::UnknownClass {
                id: key.clone(),
                detail: e.to_string(),
            })?;

            let title = obj
                .get("_meta")
                .and_then(|m| m.get("title"))
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();

            let mut inputs = IndexMap::new();
            if let Some(raw_inputs) = obj.get("inputs").and_then(Value::as_object) {
                for (slot, value) in raw_inputs {
                    inputs.insert(slot.clone(), parse_slot(slot, value, key, &id_map)?);
                }
            }

            let id = id_map[key.as_str()];
            graph.insert_with_id(id, Node { kind, title, inputs })?;
        }

        Ok(graph)
    }
}

/// Interpret one raw template slot value.
fn parse_slot(
    slot: &str,
    value: &Value,
    node_key: &str,
    id_map: &IndexMap<&str, NodeId>,
) -> Result<InputValue, GraphError> {
    if let Some(parts) = value.as_array() {
        if parts.len() == 2 {
            if let (Some(target), Some(output)) = (parts[0].as_str(), parts[1].as_u64()) {
                let node = id_map.get(target).copied().ok_or_else(|| {
                    GraphError::UnknownTemplateRef {
                        id: node_key.to_string(),
                        slot: slot.to_string(),
                        target: target.to_string(),
                    }
                })?;
                return Ok(InputValue::Link(OutputRef::new(node, output as u32)));
            }
        }
    }
    Ok(InputValue::Literal(value.clone()))
}
