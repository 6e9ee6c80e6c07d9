//! Graph representation: named tensors plus an ordered list of operations.
//!
//! The runtime consumes a [`Graph`] read-only and executes its operations in
//! declaration order. A graph is expected to be shape-complete; the only
//! checks performed here are structural (see [`Graph::validate`]).

use crate::error::{CoreError, Result};
use crate::types::{volume, ElementKind, TensorData, MAX_RANK};
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// A named, typed and shaped tensor declared by a graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tensor {
    /// Unique name within the graph.
    pub name: String,
    /// Element kind.
    pub kind: ElementKind,
    /// Dimensions, outermost first.
    pub shape: Vec<usize>,
    /// Literal payload for constants, variables and read-back results.
    #[serde(default)]
    pub data: Option<TensorData>,
}

impl Tensor {
    /// Declare a tensor without a payload.
    pub fn new(name: impl Into<String>, kind: ElementKind, shape: Vec<usize>) -> Self {
        Self {
            name: name.into(),
            kind,
            shape,
            data: None,
        }
    }

    /// Attach a literal payload.
    pub fn with_data(mut self, data: TensorData) -> Self {
        self.data = Some(data);
        self
    }

    /// Number of dimensions.
    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    /// Number of elements.
    pub fn volume(&self) -> usize {
        volume(&self.shape)
    }
}

/// A single operation invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    /// Operation kind name, e.g. `"conv"`.
    pub name: String,
    /// Declared element kind of the operation.
    pub dtype: ElementKind,
    /// Input operands keyed by parameter name.
    #[serde(default)]
    pub inputs: BTreeMap<String, Value>,
    /// Output operands keyed by result name.
    #[serde(default)]
    pub outputs: BTreeMap<String, Value>,
    /// Attributes keyed by name.
    #[serde(default)]
    pub attribs: BTreeMap<String, Value>,
}

impl Operation {
    /// Create an operation with no operands.
    pub fn new(name: impl Into<String>, dtype: ElementKind) -> Self {
        Self {
            name: name.into(),
            dtype,
            inputs: BTreeMap::new(),
            outputs: BTreeMap::new(),
            attribs: BTreeMap::new(),
        }
    }

    /// Add an input operand.
    pub fn with_input(mut self, key: &str, value: Value) -> Self {
        self.inputs.insert(key.to_string(), value);
        self
    }

    /// Add an output operand.
    pub fn with_output(mut self, key: &str, value: Value) -> Self {
        self.outputs.insert(key.to_string(), value);
        self
    }

    /// Add an attribute.
    pub fn with_attrib(mut self, key: &str, value: Value) -> Self {
        self.attribs.insert(key.to_string(), value);
        self
    }

    /// Input operand by key.
    pub fn input(&self, key: &str) -> Option<&Value> {
        self.inputs.get(key)
    }

    /// Output operand by key.
    pub fn output(&self, key: &str) -> Option<&Value> {
        self.outputs.get(key)
    }

    /// Attribute by key.
    pub fn attrib(&self, key: &str) -> Option<&Value> {
        self.attribs.get(key)
    }
}

/// A validated graph of tensors and operations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Graph {
    name: String,
    operations: Vec<Operation>,
    tensors: HashMap<String, Tensor>,
}

impl Graph {
    /// Create an empty graph.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            operations: Vec::new(),
            tensors: HashMap::new(),
        }
    }

    /// Graph name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Operations in execution order.
    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    /// Look up a tensor by name.
    pub fn tensor(&self, name: &str) -> Option<&Tensor> {
        self.tensors.get(name)
    }

    /// Mutable tensor lookup, used to receive read-back results.
    pub fn tensor_mut(&mut self, name: &str) -> Option<&mut Tensor> {
        self.tensors.get_mut(name)
    }

    /// All tensors, in unspecified order.
    pub fn tensors(&self) -> impl Iterator<Item = &Tensor> {
        self.tensors.values()
    }

    /// Tensor names sorted lexicographically.
    pub fn tensor_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tensors.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Number of operations.
    pub fn operation_count(&self) -> usize {
        self.operations.len()
    }

    /// Number of tensors.
    pub fn tensor_count(&self) -> usize {
        self.tensors.len()
    }

    /// Declare a tensor.
    pub fn add_tensor(&mut self, tensor: Tensor) -> Result<()> {
        if self.tensors.contains_key(&tensor.name) {
            return Err(CoreError::DuplicateTensor(tensor.name));
        }
        self.tensors.insert(tensor.name.clone(), tensor);
        Ok(())
    }

    /// Append an operation to the execution order.
    pub fn add_operation(&mut self, operation: Operation) {
        self.operations.push(operation);
    }

    /// Validate the graph structure.
    ///
    /// Checks that every identifier used as an operand resolves to a tensor,
    /// that ranks are within [`MAX_RANK`], and that literal payloads match
    /// their declarations. Producer-before-consumer ordering is not checked.
    pub fn validate(&self) -> Result<()> {
        for tensor in self.tensors.values() {
            Self::validate_tensor(tensor)?;
        }

        for (index, op) in self.operations.iter().enumerate() {
            let mut missing = None;
            for value in op.inputs.values().chain(op.outputs.values()) {
                value.for_each_identifier(&mut |name| {
                    if missing.is_none() && !self.tensors.contains_key(name) {
                        missing = Some(name.to_string());
                    }
                });
            }
            if let Some(tensor) = missing {
                return Err(CoreError::UndeclaredTensor {
                    index,
                    op: op.name.clone(),
                    tensor,
                });
            }
        }

        Ok(())
    }

    fn validate_tensor(tensor: &Tensor) -> Result<()> {
        if tensor.rank() > MAX_RANK {
            return Err(CoreError::RankTooLarge {
                tensor: tensor.name.clone(),
                rank: tensor.rank(),
                max: MAX_RANK,
            });
        }

        if let Some(data) = &tensor.data {
            if data.kind() != tensor.kind {
                return Err(CoreError::InvalidPayload {
                    tensor: tensor.name.clone(),
                    reason: format!("payload is {}, tensor is {}", data.kind(), tensor.kind),
                });
            }
            if data.len() != tensor.volume() {
                return Err(CoreError::InvalidPayload {
                    tensor: tensor.name.clone(),
                    reason: format!(
                        "payload has {} elements, shape {:?} needs {}",
                        data.len(),
                        tensor.shape,
                        tensor.volume()
                    ),
                });
            }
        }

        Ok(())
    }

    /// Count operations by kind name.
    pub fn count_ops(&self) -> HashMap<String, usize> {
        let mut counts = HashMap::new();
        for op in &self.operations {
            *counts.entry(op.name.clone()).or_insert(0) += 1;
        }
        counts
    }

    /// Get graph statistics.
    pub fn statistics(&self) -> GraphStatistics {
        GraphStatistics {
            operation_count: self.operations.len(),
            tensor_count: self.tensors.len(),
            op_counts: self.count_ops(),
            literal_count: self.tensors.values().filter(|t| t.data.is_some()).count(),
        }
    }
}

/// Graph statistics.
#[derive(Debug, Clone)]
pub struct GraphStatistics {
    /// Total number of operations.
    pub operation_count: usize,
    /// Total number of tensors.
    pub tensor_count: usize,
    /// Count of each operation kind.
    pub op_counts: HashMap<String, usize>,
    /// Number of tensors carrying a literal payload.
    pub literal_count: usize,
}

/// Graph builder for convenient graph construction.
pub struct GraphBuilder {
    graph: Graph,
    error: Option<CoreError>,
}

impl GraphBuilder {
    /// Create a new graph builder.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            graph: Graph::new(name),
            error: None,
        }
    }

    /// Declare a tensor.
    pub fn tensor(&mut self, name: &str, kind: ElementKind, shape: &[usize]) -> &mut Self {
        self.add_tensor(Tensor::new(name, kind, shape.to_vec()))
    }

    /// Declare a tensor with a literal payload.
    pub fn literal(&mut self, name: &str, shape: &[usize], data: TensorData) -> &mut Self {
        self.add_tensor(Tensor::new(name, data.kind(), shape.to_vec()).with_data(data))
    }

    /// Declare a fully specified tensor.
    pub fn add_tensor(&mut self, tensor: Tensor) -> &mut Self {
        if self.error.is_none() {
            if let Err(err) = self.graph.add_tensor(tensor) {
                self.error = Some(err);
            }
        }
        self
    }

    /// Append an operation.
    pub fn operation(&mut self, operation: Operation) -> &mut Self {
        self.graph.add_operation(operation);
        self
    }

    /// Build and validate the graph.
    pub fn build(self) -> Result<Graph> {
        if let Some(err) = self.error {
            return Err(err);
        }
        self.graph.validate()?;
        Ok(self.graph)
    }
}
