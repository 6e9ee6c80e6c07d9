//! Per-run binding table between graph tensors and engine tensors.

use crate::engine::Engine;
use crate::error::{Result, RuntimeError};
use rnnef_core::{ElementKind, Operation, Tensor, TensorData, Value};
use std::collections::{HashMap, HashSet};
use tracing::{trace, warn};

/// Binds each graph tensor to exactly one engine tensor for the lifetime of
/// a run.
///
/// The context owns its engine. Bindings are only ever added through
/// [`Context::create_tensor`] and are released, together with any leftover
/// literal scratch tensors, when the context is dropped. A context that saw a
/// failed operation must be discarded; it is not resumable.
pub struct Context<E: Engine> {
    engine: E,
    bindings: HashMap<String, E::Tensor>,
    released: HashSet<String>,
    scratch: Vec<E::Tensor>,
    engine_calls: usize,
}

impl<E: Engine> Context<E> {
    /// Create an empty context around an engine.
    pub fn new(engine: E) -> Self {
        Self {
            engine,
            bindings: HashMap::new(),
            released: HashSet::new(),
            scratch: Vec::new(),
            engine_calls: 0,
        }
    }

    /// The backing engine.
    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Allocate and bind an engine tensor for a graph tensor.
    pub fn create_tensor(&mut self, tensor: &Tensor) -> Result<()> {
        if self.bindings.contains_key(&tensor.name) || self.released.contains(&tensor.name) {
            return Err(RuntimeError::DuplicateTensor(tensor.name.clone()));
        }
        if !tensor.kind.is_concrete() {
            return Err(RuntimeError::UnsupportedElementKind {
                subject: tensor.name.clone(),
                kind: tensor.kind,
            });
        }

        let handle = self.invoke("allocate", |e| e.allocate(tensor.kind, &tensor.shape))?;
        self.bindings.insert(tensor.name.clone(), handle);
        Ok(())
    }

    /// Fill the bound engine tensor from the graph tensor's literal payload.
    pub fn write_tensor(&mut self, tensor: &Tensor) -> Result<()> {
        let data = tensor.data.as_ref().ok_or_else(|| {
            RuntimeError::malformed("write_tensor", &tensor.name, "tensor has no literal payload")
        })?;
        let handle = self.map_tensor(&tensor.name)?;
        self.invoke("fill", |e| e.fill(&handle, data))
    }

    /// Read the bound engine tensor back into the graph tensor's payload.
    pub fn read_tensor(&mut self, tensor: &mut Tensor) -> Result<()> {
        let handle = self.map_tensor(&tensor.name)?;
        let data = self.invoke("read", |e| e.read(&handle))?;
        tensor.data = Some(data);
        Ok(())
    }

    /// Engine tensor bound to the named graph tensor.
    pub fn map_tensor(&self, name: &str) -> Result<E::Tensor> {
        self.bindings
            .get(name)
            .cloned()
            .ok_or_else(|| RuntimeError::UnboundTensor(name.to_string()))
    }

    /// Whether the named graph tensor has a binding.
    pub fn is_bound(&self, name: &str) -> bool {
        self.bindings.contains_key(name)
    }

    /// Number of bound graph tensors.
    pub fn bound_count(&self) -> usize {
        self.bindings.len()
    }

    /// Number of engine primitives issued through this context.
    pub fn engine_calls(&self) -> usize {
        self.engine_calls
    }

    /// Call an engine primitive, wrapping its failure with the primitive name.
    pub(crate) fn invoke<T>(
        &mut self,
        primitive: &'static str,
        call: impl FnOnce(&mut E) -> anyhow::Result<T>,
    ) -> Result<T> {
        self.engine_calls += 1;
        trace!(engine = self.engine.name(), primitive, "engine call");
        call(&mut self.engine).map_err(|source| RuntimeError::Engine { primitive, source })
    }

    /// Resolve an operand value to an engine tensor.
    ///
    /// Identifiers map to their binding. Scalar, integer and logical literals
    /// become a fresh rank-0 tensor filled with the literal; these are never
    /// reused and are released by [`Context::release_scratch`].
    pub(crate) fn resolve(&mut self, op: &str, key: &str, value: &Value) -> Result<E::Tensor> {
        let data = match value {
            Value::Identifier(name) => return self.map_tensor(name),
            Value::Scalar(v) => TensorData::Float(vec![*v as f32]),
            Value::Integer(v) => TensorData::Integer(vec![*v]),
            Value::Logical(v) => TensorData::Bool(vec![*v]),
            other => {
                return Err(RuntimeError::malformed(
                    op,
                    key,
                    format!("expected a tensor or literal, found {}", other.kind_name()),
                ))
            }
        };
        self.singleton(data)
    }

    fn singleton(&mut self, data: TensorData) -> Result<E::Tensor> {
        let kind: ElementKind = data.kind();
        let handle = self.invoke("allocate", |e| e.allocate(kind, &[]))?;
        // Track before filling so a failed fill is still released.
        self.scratch.push(handle.clone());
        self.invoke("fill", |e| e.fill(&handle, &data))?;
        Ok(handle)
    }

    /// Resolve a required input operand.
    pub(crate) fn input(&mut self, op: &Operation, key: &str) -> Result<E::Tensor> {
        let value = op
            .input(key)
            .ok_or_else(|| RuntimeError::malformed(&op.name, key, "missing input"))?;
        self.resolve(&op.name, key, value)
    }

    /// Resolve a required output operand.
    pub(crate) fn output(&mut self, op: &Operation, key: &str) -> Result<E::Tensor> {
        let value = op
            .output(key)
            .ok_or_else(|| RuntimeError::malformed(&op.name, key, "missing output"))?;
        self.resolve(&op.name, key, value)
    }

    /// Resolve an input operand holding an array of tensors.
    pub(crate) fn input_list(&mut self, op: &Operation, key: &str) -> Result<Vec<E::Tensor>> {
        let value = op
            .input(key)
            .ok_or_else(|| RuntimeError::malformed(&op.name, key, "missing input"))?;
        self.resolve_list(&op.name, key, value)
    }

    /// Resolve an output operand holding an array of tensors.
    pub(crate) fn output_list(&mut self, op: &Operation, key: &str) -> Result<Vec<E::Tensor>> {
        let value = op
            .output(key)
            .ok_or_else(|| RuntimeError::malformed(&op.name, key, "missing output"))?;
        self.resolve_list(&op.name, key, value)
    }

    fn resolve_list(&mut self, op: &str, key: &str, value: &Value) -> Result<Vec<E::Tensor>> {
        let items = value
            .as_array()
            .ok_or_else(|| RuntimeError::malformed(op, key, "expected an array of tensors"))?;
        items
            .iter()
            .map(|item| self.resolve(op, key, item))
            .collect()
    }

    /// Resolve every input and output operand, depth first, in key order.
    pub(crate) fn resolve_all(&mut self, op: &Operation) -> Result<Vec<E::Tensor>> {
        let mut resolved = Vec::new();
        for (key, value) in op.inputs.iter().chain(op.outputs.iter()) {
            match value {
                Value::Array(items) | Value::Tuple(items) => {
                    for item in items {
                        resolved.push(self.resolve(&op.name, key, item)?);
                    }
                }
                other => resolved.push(self.resolve(&op.name, key, other)?),
            }
        }
        Ok(resolved)
    }

    /// Release all literal scratch tensors created since the last call.
    pub(crate) fn release_scratch(&mut self) -> Result<()> {
        let handles = std::mem::take(&mut self.scratch);
        self.release_handles(handles)
    }

    /// Release every binding and scratch tensor.
    ///
    /// Released names stay reserved: binding one of them again fails with
    /// [`RuntimeError::DuplicateTensor`].
    pub fn clear(&mut self) -> Result<()> {
        let mut handles = Vec::with_capacity(self.bindings.len() + self.scratch.len());
        for (name, handle) in self.bindings.drain() {
            self.released.insert(name);
            handles.push(handle);
        }
        handles.append(&mut self.scratch);
        self.release_handles(handles)
    }

    /// Release every handle, reporting the first failure.
    fn release_handles(&mut self, handles: Vec<E::Tensor>) -> Result<()> {
        let mut first_error = None;
        for handle in handles {
            if let Err(err) = self.invoke("release", |e| e.release(handle)) {
                first_error.get_or_insert(err);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Number of literal scratch tensors currently held.
    pub fn scratch_count(&self) -> usize {
        self.scratch.len()
    }
}

impl<E: Engine> Drop for Context<E> {
    fn drop(&mut self) {
        if let Err(err) = self.clear() {
            warn!(engine = self.engine.name(), error = %err, "failed to release tensors");
        }
    }
}

impl<E: Engine> std::fmt::Debug for Context<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("engine", &self.engine.name())
            .field("bound", &self.bindings.len())
            .field("scratch", &self.scratch.len())
            .field("engine_calls", &self.engine_calls)
            .finish()
    }
}
