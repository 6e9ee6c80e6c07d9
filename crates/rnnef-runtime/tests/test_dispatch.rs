//! Dispatch tests for the element-wise family and the executor table.
//! Tests: unary, binary, reduce, arg reduce, select, lookup, unimplemented ops

use rnnef_core::{ElementKind, Graph, GraphBuilder, Operation, Tensor, Value};
use rnnef_runtime::{
    find_executor, registered_operations, ArgReduceOp, BinaryOp, Context, EngineCall, ReduceOp,
    RunConfig, Runtime, RuntimeError, TraceEngine, UnaryOp,
};

fn float(name: &str, shape: &[usize]) -> Tensor {
    Tensor::new(name, ElementKind::Float, shape.to_vec())
}

/// Bind every tensor of `graph` and run the single operation at `index`.
fn run_op(graph: &Graph, index: usize) -> (Context<TraceEngine>, rnnef_runtime::Result<()>) {
    let mut ctx = Context::new(TraceEngine::new());
    for name in graph.tensor_names() {
        let tensor = graph.tensor(name).expect("declared");
        ctx.create_tensor(tensor).expect("bind");
    }
    let op = &graph.operations()[index];
    let result = find_executor(&op.name)
        .expect("registered")
        .execute(&mut ctx, op);
    (ctx, result)
}

fn id(ctx: &Context<TraceEngine>, name: &str) -> usize {
    ctx.map_tensor(name).expect("bound").id()
}

fn binary_graph(name: &str, y: Value) -> Graph {
    let mut builder = GraphBuilder::new("binary");
    builder
        .tensor("x", ElementKind::Float, &[2, 3])
        .tensor("y", ElementKind::Float, &[2, 3])
        .tensor("z", ElementKind::Float, &[2, 3])
        .operation(
            Operation::new(name, ElementKind::Float)
                .with_input("x", Value::id("x"))
                .with_input("y", y)
                .with_output("z", Value::id("z")),
        );
    builder.build().expect("valid graph")
}

// ============ Elementwise Tests ============

#[test]
fn test_add_issues_one_binary_call() {
    let graph = binary_graph("add", Value::id("y"));
    let (ctx, result) = run_op(&graph, 0);
    result.unwrap();

    let calls = ctx.engine().compute_calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(
        calls[0],
        &EngineCall::Binary {
            op: BinaryOp::Add,
            kind: ElementKind::Float,
            x: id(&ctx, "x"),
            y: id(&ctx, "y"),
            z: id(&ctx, "z"),
        }
    );
}

#[test]
fn test_literal_operand_uses_fresh_singleton() {
    let graph = binary_graph("mul", Value::Scalar(2.0));
    let (ctx, result) = run_op(&graph, 0);
    result.unwrap();

    let calls = ctx.engine().calls();
    // three bindings, then allocate + fill for the literal, the multiply,
    // and the release of the literal
    let singleton = match &calls[3] {
        EngineCall::Allocate { id, shape, kind } => {
            assert!(shape.is_empty());
            assert_eq!(*kind, ElementKind::Float);
            *id
        }
        other => panic!("expected literal allocation, got {other:?}"),
    };
    assert_eq!(calls[4], EngineCall::Fill { id: singleton });
    assert!(matches!(
        &calls[5],
        EngineCall::Binary { op: BinaryOp::Mul, y, .. } if *y == singleton
    ));
    assert_eq!(calls[6], EngineCall::Release { id: singleton });
    assert_eq!(ctx.scratch_count(), 0);
    assert_eq!(ctx.engine().live_tensors(), 3);
}

#[test]
fn test_unary_and_logical_kinds() {
    let mut builder = GraphBuilder::new("unary");
    builder
        .tensor("x", ElementKind::Float, &[4])
        .tensor("y", ElementKind::Float, &[4])
        .tensor("p", ElementKind::Bool, &[4])
        .tensor("q", ElementKind::Bool, &[4])
        .operation(
            Operation::new("sigmoid", ElementKind::Float)
                .with_input("x", Value::id("x"))
                .with_output("y", Value::id("y")),
        )
        .operation(
            Operation::new("not", ElementKind::Bool)
                .with_input("x", Value::id("p"))
                .with_output("y", Value::id("q")),
        );
    let graph = builder.build().unwrap();

    let ctx = rnnef_runtime::execute_graph(&graph, TraceEngine::new()).unwrap();
    let calls = ctx.engine().compute_calls();
    assert!(matches!(
        calls[0],
        EngineCall::Unary { op: UnaryOp::Sigmoid, kind: ElementKind::Float, .. }
    ));
    assert!(matches!(
        calls[1],
        EngineCall::Unary { op: UnaryOp::Not, kind: ElementKind::Bool, .. }
    ));
}

#[test]
fn test_sum_reduce_normalize_becomes_mean() {
    let mut builder = GraphBuilder::new("reduce");
    builder
        .tensor("x", ElementKind::Float, &[2, 3, 4])
        .tensor("y", ElementKind::Float, &[2, 1, 1])
        .operation(
            Operation::new("sum_reduce", ElementKind::Float)
                .with_input("input", Value::id("x"))
                .with_output("output", Value::id("y"))
                .with_attrib("axes", Value::integers(&[1, -1]))
                .with_attrib("normalize", Value::Logical(true)),
        );
    let graph = builder.build().unwrap();
    let (ctx, result) = run_op(&graph, 0);
    result.unwrap();

    match ctx.engine().compute_calls()[0] {
        EngineCall::Reduce { op, axes, .. } => {
            assert_eq!(*op, ReduceOp::Mean);
            assert_eq!(axes, &vec![1, 2]);
        }
        other => panic!("expected reduce, got {other:?}"),
    }
}

#[test]
fn test_arg_reduce_single_axis_only() {
    let mut builder = GraphBuilder::new("argmax");
    builder
        .tensor("x", ElementKind::Float, &[2, 5])
        .tensor("i", ElementKind::Integer, &[2, 1])
        .operation(
            Operation::new("argmax_reduce", ElementKind::Float)
                .with_input("input", Value::id("x"))
                .with_output("output", Value::id("i"))
                .with_attrib("axes", Value::integers(&[1])),
        )
        .operation(
            Operation::new("argmin_reduce", ElementKind::Float)
                .with_input("input", Value::id("x"))
                .with_output("output", Value::id("i"))
                .with_attrib("axes", Value::integers(&[0, 1])),
        );
    let graph = builder.build().unwrap();

    let (ctx, result) = run_op(&graph, 0);
    result.unwrap();
    assert!(matches!(
        ctx.engine().compute_calls()[0],
        EngineCall::ArgReduce { op: ArgReduceOp::ArgMax, axis: 1, .. }
    ));

    let (ctx, result) = run_op(&graph, 1);
    match result {
        Err(RuntimeError::UnsupportedOperation { op, reason }) => {
            assert_eq!(op, "argmin_reduce");
            assert_eq!(reason, "multiple axes not implemented");
        }
        other => panic!("expected unsupported operation, got {other:?}"),
    }
    assert!(ctx.engine().compute_calls().is_empty());
}

#[test]
fn test_select_operand_order() {
    let mut builder = GraphBuilder::new("select");
    builder
        .tensor("c", ElementKind::Bool, &[3])
        .tensor("a", ElementKind::Float, &[3])
        .tensor("out", ElementKind::Float, &[3])
        .operation(
            Operation::new("select", ElementKind::Float)
                .with_input("condition", Value::id("c"))
                .with_input("true_value", Value::id("a"))
                .with_input("false_value", Value::Scalar(0.0))
                .with_output("output", Value::id("out")),
        );
    let graph = builder.build().unwrap();
    let (ctx, result) = run_op(&graph, 0);
    result.unwrap();

    match ctx.engine().compute_calls()[0] {
        EngineCall::Select { c, x, y, z } => {
            assert_eq!(*c, id(&ctx, "c"));
            assert_eq!(*x, id(&ctx, "a"));
            assert_eq!(*z, id(&ctx, "out"));
            assert!(![*c, *x, *z].contains(y));
        }
        other => panic!("expected select, got {other:?}"),
    }
}

// ============ Registry Tests ============

#[test]
fn test_find_executor_distinguishes_unknown_from_unimplemented() {
    assert!(find_executor("nonexistent_op").is_none());

    let executor = find_executor("multilinear_upsample").expect("registered");
    let mut builder = GraphBuilder::new("upsample");
    builder
        .tensor("x", ElementKind::Float, &[1, 1, 2, 2])
        .tensor("y", ElementKind::Float, &[1, 1, 4, 4])
        .operation(
            Operation::new("multilinear_upsample", ElementKind::Float)
                .with_input("input", Value::id("x"))
                .with_output("output", Value::id("y"))
                .with_attrib("factor", Value::integers(&[2, 2])),
        );
    let graph = builder.build().unwrap();

    let mut ctx = Context::new(TraceEngine::new());
    for name in ["x", "y"] {
        ctx.create_tensor(graph.tensor(name).unwrap()).unwrap();
    }
    let err = executor
        .execute(&mut ctx, &graph.operations()[0])
        .unwrap_err();
    assert!(matches!(
        err,
        RuntimeError::UnsupportedOperation { ref reason, .. } if reason == "operation not implemented"
    ));
    assert!(ctx.engine().compute_calls().is_empty());
}

#[test]
fn test_unimplemented_still_resolves_operands() {
    let mut ctx = Context::new(TraceEngine::new());
    ctx.create_tensor(&float("x", &[4])).unwrap();
    let op = Operation::new("l2_normalization", ElementKind::Float)
        .with_input("input", Value::id("x"))
        .with_output("output", Value::id("missing"));
    let err = find_executor("l2_normalization")
        .unwrap()
        .execute(&mut ctx, &op)
        .unwrap_err();
    assert!(matches!(err, RuntimeError::UnboundTensor(name) if name == "missing"));
}

#[test]
fn test_generic_operation_kind_rejected() {
    let mut ctx = Context::new(TraceEngine::new());
    ctx.create_tensor(&float("x", &[4])).unwrap();
    ctx.create_tensor(&float("y", &[4])).unwrap();
    let op = Operation::new("relu", ElementKind::Generic)
        .with_input("x", Value::id("x"))
        .with_output("y", Value::id("y"));
    let err = find_executor("relu")
        .unwrap()
        .execute(&mut ctx, &op)
        .unwrap_err();
    assert!(matches!(
        err,
        RuntimeError::UnsupportedElementKind { subject, kind: ElementKind::Generic } if subject == "relu"
    ));
    assert!(ctx.engine().compute_calls().is_empty());
    assert_eq!(ctx.scratch_count(), 0);
}

#[test]
fn test_registered_operations_cover_families() {
    let names: Vec<_> = registered_operations().collect();
    for expected in [
        "add", "conv", "deconv", "box", "debox", "reshape", "stack", "unstack", "pad", "slice",
        "matmul", "linear", "softmax", "external", "variable", "constant", "update", "select",
    ] {
        assert!(names.contains(&expected), "{expected} not registered");
    }
}

// ============ Error Propagation Tests ============

#[test]
fn test_unknown_operation_aborts_run() {
    let mut builder = GraphBuilder::new("unknown");
    builder
        .tensor("x", ElementKind::Float, &[1])
        .tensor("y", ElementKind::Float, &[1])
        .operation(
            Operation::new("relu", ElementKind::Float)
                .with_input("x", Value::id("x"))
                .with_output("y", Value::id("y")),
        )
        .operation(
            Operation::new("frobnicate", ElementKind::Float)
                .with_input("x", Value::id("y"))
                .with_output("y", Value::id("x")),
        )
        .operation(
            Operation::new("relu", ElementKind::Float)
                .with_input("x", Value::id("x"))
                .with_output("y", Value::id("y")),
        );
    let graph = builder.build().unwrap();

    let mut ctx = Context::new(TraceEngine::new());
    let err = Runtime::default().execute(&graph, &mut ctx).unwrap_err();
    match &err {
        RuntimeError::Operation {
            index, operation, ..
        } => {
            assert_eq!(*index, 1);
            assert_eq!(operation, "frobnicate");
        }
        other => panic!("expected operation error, got {other:?}"),
    }
    assert!(matches!(err.root(), RuntimeError::UnknownOperation(name) if name == "frobnicate"));
    assert_eq!(ctx.engine().compute_calls().len(), 1);
}

#[test]
fn test_engine_failure_is_wrapped_and_scratch_released() {
    let graph = binary_graph("add", Value::Scalar(1.0));
    let mut ctx = Context::new(TraceEngine::new().fail_on("binary"));
    let config = RunConfig::new().with_profiling(false);
    let err = Runtime::new(config).execute(&graph, &mut ctx).unwrap_err();

    match err.root() {
        RuntimeError::Engine { primitive, source } => {
            assert_eq!(*primitive, "binary");
            assert!(source.to_string().contains("injected"));
        }
        other => panic!("expected engine error, got {other:?}"),
    }
    assert!(std::error::Error::source(&err).is_some());
    assert_eq!(ctx.scratch_count(), 0);
    assert_eq!(ctx.engine().live_tensors(), graph.tensor_count());

    ctx.clear().unwrap();
    assert_eq!(ctx.engine().live_tensors(), 0);
}

// ============ Trace Export Tests ============

#[test]
fn test_trace_and_statistics_serialize_to_json() {
    let graph = binary_graph("mul", Value::id("y"));
    let mut ctx = Context::new(TraceEngine::new());
    let stats = Runtime::default().execute(&graph, &mut ctx).unwrap();

    let calls: Vec<serde_json::Value> = ctx
        .engine()
        .compute_calls()
        .into_iter()
        .map(|call| serde_json::to_value(call).unwrap())
        .collect();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0]["primitive"], "binary");
    assert_eq!(calls[0]["op"], "mul");
    assert_eq!(calls[0]["kind"], "float");

    let report = serde_json::to_value(&stats).unwrap();
    assert_eq!(report["operations_executed"], 1);
    assert_eq!(report["per_operation"]["mul"]["count"], 1);
}
