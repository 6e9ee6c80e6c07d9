//! Graph run loop.
//!
//! A run walks the graph's operations in declaration order and dispatches
//! each one through the executor table against a [`Context`]. The first
//! failure stops the run; nothing is retried or skipped.

use crate::context::Context;
use crate::engine::Engine;
use crate::error::{Result, RuntimeError};
use crate::ops::find_executor;
use rnnef_core::Graph;
use serde::Serialize;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Configuration for graph runs.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Collect per-operation timings.
    pub enable_profiling: bool,
    /// Bind every graph tensor not already bound and write literal payloads
    /// before the first operation.
    pub materialize_tensors: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            enable_profiling: true,
            materialize_tensors: true,
        }
    }
}

impl RunConfig {
    /// Create a configuration with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable per-operation timings.
    pub fn with_profiling(mut self, enable: bool) -> Self {
        self.enable_profiling = enable;
        self
    }

    /// Enable or disable tensor materialization.
    pub fn with_materialization(mut self, enable: bool) -> Self {
        self.materialize_tensors = enable;
        self
    }
}

/// Timing summary for one operation kind.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OperationStats {
    /// Number of executions.
    pub count: usize,
    /// Sum of execution times.
    pub total: Duration,
    /// Fastest execution.
    pub min: Duration,
    /// Slowest execution.
    pub max: Duration,
}

impl OperationStats {
    fn new(elapsed: Duration) -> Self {
        Self {
            count: 1,
            total: elapsed,
            min: elapsed,
            max: elapsed,
        }
    }

    fn record(&mut self, elapsed: Duration) {
        self.count += 1;
        self.total += elapsed;
        self.min = self.min.min(elapsed);
        self.max = self.max.max(elapsed);
    }

    /// Mean execution time.
    pub fn average(&self) -> Duration {
        match u32::try_from(self.count) {
            Ok(n) if n > 0 => self.total / n,
            _ => Duration::ZERO,
        }
    }
}

/// Summary of a completed run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunStatistics {
    /// Operations executed.
    pub operations_executed: usize,
    /// Engine primitives issued, including materialization.
    pub engine_calls: usize,
    /// Wall time of the whole run.
    pub total_duration: Duration,
    /// Timings keyed by operation name; empty unless profiling is enabled.
    pub per_operation: HashMap<String, OperationStats>,
}

impl RunStatistics {
    /// Operation names ordered by total time, slowest first.
    pub fn slowest_operations(&self) -> Vec<(&str, &OperationStats)> {
        let mut ops: Vec<_> = self
            .per_operation
            .iter()
            .map(|(name, stats)| (name.as_str(), stats))
            .collect();
        ops.sort_by(|a, b| b.1.total.cmp(&a.1.total).then(a.0.cmp(b.0)));
        ops
    }
}

/// Executes graphs against a context.
#[derive(Debug, Clone, Default)]
pub struct Runtime {
    config: RunConfig,
}

impl Runtime {
    /// Create a runtime with the given configuration.
    pub fn new(config: RunConfig) -> Self {
        Self { config }
    }

    /// Current configuration.
    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Run every operation of `graph` in order.
    ///
    /// Tensors the caller bound beforehand (for example pre-seeded
    /// externals) are left as they are. On failure the context must be
    /// discarded.
    pub fn execute<E: Engine>(&self, graph: &Graph, ctx: &mut Context<E>) -> Result<RunStatistics> {
        let start = Instant::now();
        let calls_before = ctx.engine_calls();
        info!(
            graph = graph.name(),
            engine = ctx.engine().name(),
            operations = graph.operation_count(),
            "starting run"
        );

        if self.config.materialize_tensors {
            self.materialize(graph, ctx)?;
        }

        let mut stats = RunStatistics::default();
        for (index, op) in graph.operations().iter().enumerate() {
            let op_start = Instant::now();
            let outcome = match find_executor(&op.name) {
                Some(executor) => executor.execute(ctx, op),
                None => Err(RuntimeError::UnknownOperation(op.name.clone())),
            };

            if let Err(source) = outcome {
                warn!(index, operation = %op.name, error = %source, "operation failed");
                return Err(RuntimeError::Operation {
                    index,
                    operation: op.name.clone(),
                    source: Box::new(source),
                });
            }

            let elapsed = op_start.elapsed();
            debug!(index, operation = %op.name, ?elapsed, "operation executed");
            stats.operations_executed += 1;
            if self.config.enable_profiling {
                stats
                    .per_operation
                    .entry(op.name.clone())
                    .and_modify(|s| s.record(elapsed))
                    .or_insert_with(|| OperationStats::new(elapsed));
            }
        }

        stats.engine_calls = ctx.engine_calls() - calls_before;
        stats.total_duration = start.elapsed();
        info!(
            graph = graph.name(),
            operations = stats.operations_executed,
            engine_calls = stats.engine_calls,
            duration = ?stats.total_duration,
            "run finished"
        );
        Ok(stats)
    }

    fn materialize<E: Engine>(&self, graph: &Graph, ctx: &mut Context<E>) -> Result<()> {
        for name in graph.tensor_names() {
            if ctx.is_bound(name) {
                continue;
            }
            let Some(tensor) = graph.tensor(name) else {
                continue;
            };
            ctx.create_tensor(tensor)?;
            if tensor.data.is_some() {
                ctx.write_tensor(tensor)?;
            }
        }
        debug!(bound = ctx.bound_count(), "tensors materialized");
        Ok(())
    }
}

/// Run a graph on a fresh context with the default configuration.
///
/// Returns the context so results can be read back with
/// [`Context::read_tensor`]. On failure the context, and every engine tensor
/// it bound, is released before the error is returned.
pub fn execute_graph<E: Engine>(graph: &Graph, engine: E) -> Result<Context<E>> {
    let mut ctx = Context::new(engine);
    Runtime::default().execute(graph, &mut ctx)?;
    Ok(ctx)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_config_builders() {
        let config = RunConfig::new()
            .with_profiling(false)
            .with_materialization(false);
        assert!(!config.enable_profiling);
        assert!(!config.materialize_tensors);
        assert!(RunConfig::default().enable_profiling);
    }

    #[test]
    fn test_operation_stats() {
        let mut stats = OperationStats::new(Duration::from_millis(4));
        stats.record(Duration::from_millis(2));
        stats.record(Duration::from_millis(6));
        assert_eq!(stats.count, 3);
        assert_eq!(stats.min, Duration::from_millis(2));
        assert_eq!(stats.max, Duration::from_millis(6));
        assert_eq!(stats.average(), Duration::from_millis(4));
    }

    #[test]
    fn test_slowest_operations_order() {
        let mut stats = RunStatistics::default();
        stats
            .per_operation
            .insert("relu".into(), OperationStats::new(Duration::from_micros(5)));
        stats
            .per_operation
            .insert("conv".into(), OperationStats::new(Duration::from_micros(50)));
        let names: Vec<_> = stats.slowest_operations().into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["conv", "relu"]);
    }
}
