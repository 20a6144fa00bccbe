use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FlowRole {
    Source,
    Transformer,
    Sink,
    Store,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowKind {
    Assignment,
    Parameter,
    Return,
    PropertyAccess,
    MethodCall,
    EventEmission,
    EventHandling,
    StateMutation,
    ImportExport,
}

impl FlowKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlowKind::Assignment => "assignment",
            FlowKind::Parameter => "parameter",
            FlowKind::Return => "return",
            FlowKind::PropertyAccess => "property_access",
            FlowKind::MethodCall => "method_call",
            FlowKind::EventEmission => "event_emission",
            FlowKind::EventHandling => "event_handling",
            FlowKind::StateMutation => "state_mutation",
            FlowKind::ImportExport => "import_export",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataFlowNode {
    /// Id of the code node this flow node stands for.
    pub id: String,
    pub name: String,
    pub role: FlowRole,
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataFlow {
    pub id: String,
    pub source: String,
    pub target: String,
    pub kind: FlowKind,
    pub is_async: bool,
    pub is_conditional: bool,
    pub confidence: f64,
}

/// An ordered multi-hop chain of flows with explicit entry and exit nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataFlowPath {
    pub id: String,
    pub name: String,
    pub flow_ids: Vec<String>,
    pub node_ids: Vec<String>,
    pub entry_points: Vec<String>,
    pub exit_points: Vec<String>,
    pub confidence: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataFlowGraph {
    pub nodes: Vec<DataFlowNode>,
    pub flows: Vec<DataFlow>,
    pub paths: Vec<DataFlowPath>,
}

impl DataFlowGraph {
    pub fn node(&self, id: &str) -> Option<&DataFlowNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn flows_of_kind(&self, kind: FlowKind) -> impl Iterator<Item = &DataFlow> {
        self.flows.iter().filter(move |f| f.kind == kind)
    }
}
