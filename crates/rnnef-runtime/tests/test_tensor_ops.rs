//! Unit tests for layout, linear algebra and variable executors
//! Tests: Reshape family, Transpose, Concat/Split, Pad, Tile, Slice, Matmul,
//! Linear, Softmax, Constant, Update

use rnnef_core::{ElementKind, Graph, GraphBuilder, Operation, Tensor, TensorData, Value};
use rnnef_runtime::{
    execute_graph, BinaryOp, Context, EngineCall, RunConfig, Runtime, RuntimeError, Scalar,
    TraceEngine,
};

fn single(op: Operation, tensors: &[(&str, ElementKind, &[usize])]) -> Graph {
    let mut builder = GraphBuilder::new(op.name.clone());
    for (name, kind, shape) in tensors {
        builder.tensor(name, *kind, shape);
    }
    builder.operation(op);
    builder.build().expect("valid graph")
}

fn compute_calls(graph: &Graph) -> rnnef_runtime::Result<Vec<EngineCall>> {
    let ctx = execute_graph(graph, TraceEngine::new())?;
    Ok(ctx.engine().compute_calls().into_iter().cloned().collect())
}

fn root(result: rnnef_runtime::Result<Vec<EngineCall>>) -> RuntimeError {
    match result {
        Ok(calls) => panic!("expected failure, got {calls:?}"),
        Err(RuntimeError::Operation { source, .. }) => *source,
        Err(other) => other,
    }
}

const F: ElementKind = ElementKind::Float;

// ============ Reshape Family Tests ============

#[test]
fn test_reshape_family_is_one_copy() {
    let mut sequences = Vec::new();
    for name in ["reshape", "squeeze", "unsqueeze"] {
        let op = Operation::new(name, F)
            .with_input("input", Value::id("x"))
            .with_output("output", Value::id("y"))
            .with_attrib("axes", Value::integers(&[0]));
        let graph = single(op, &[("x", F, &[1, 6]), ("y", F, &[6])]);
        sequences.push(compute_calls(&graph).unwrap());
    }
    assert_eq!(sequences[0], vec![EngineCall::Copy { x: 0, y: 1 }]);
    assert_eq!(sequences[0], sequences[1]);
    assert_eq!(sequences[1], sequences[2]);
}

// ============ Transpose Tests ============

#[test]
fn test_transpose_extends_permutation() {
    let op = Operation::new("transpose", F)
        .with_input("input", Value::id("x"))
        .with_output("output", Value::id("y"))
        .with_attrib("axes", Value::integers(&[1, 0]));
    let graph = single(op, &[("x", F, &[2, 3, 4, 5]), ("y", F, &[3, 2, 4, 5])]);
    let calls = compute_calls(&graph).unwrap();
    assert_eq!(
        calls,
        vec![EngineCall::Transpose {
            x: 0,
            y: 1,
            perm: vec![1, 0, 2, 3]
        }]
    );
}

#[test]
fn test_transpose_rejects_bad_axes() {
    let op = Operation::new("transpose", F)
        .with_input("input", Value::id("x"))
        .with_output("output", Value::id("y"))
        .with_attrib("axes", Value::integers(&[0, 0]));
    let graph = single(op, &[("x", F, &[2, 3]), ("y", F, &[2, 3])]);
    assert!(matches!(
        root(compute_calls(&graph)),
        RuntimeError::MalformedOperand { .. }
    ));
}

// ============ Concat / Split Tests ============

#[test]
fn test_concat_and_stack_share_executor() {
    let tensors: [(&str, ElementKind, &[usize]); 3] =
        [("a", F, &[2, 3]), ("b", F, &[2, 3]), ("out", F, &[4, 3])];
    for (name, singular) in [("concat", false), ("stack", true)] {
        let op = Operation::new(name, F)
            .with_input("values", Value::identifiers(&["a", "b"]))
            .with_output("value", Value::id("out"))
            .with_attrib("axis", Value::Integer(0));
        let calls = compute_calls(&single(op, &tensors)).unwrap();
        assert_eq!(
            calls,
            vec![EngineCall::Concat {
                inputs: vec![0, 1],
                output: 2,
                axis: 0,
                singular,
            }]
        );
    }
}

#[test]
fn test_unstack_is_singular_split() {
    let op = Operation::new("unstack", F)
        .with_input("value", Value::id("x"))
        .with_output("values", Value::identifiers(&["a", "b"]))
        .with_attrib("axis", Value::Integer(-2));
    let graph = single(op, &[("a", F, &[3]), ("b", F, &[3]), ("x", F, &[2, 3])]);
    let calls = compute_calls(&graph).unwrap();
    assert_eq!(
        calls,
        vec![EngineCall::Split {
            input: 2,
            outputs: vec![0, 1],
            axis: 0,
            singular: true,
        }]
    );
}

// ============ Pad / Tile / Slice Tests ============

#[test]
fn test_pad_constant_value_coerced() {
    let op = Operation::new("pad", ElementKind::Integer)
        .with_input("input", Value::id("x"))
        .with_output("output", Value::id("y"))
        .with_attrib("padding", Value::pairs(&[(1, 1)]))
        .with_attrib("value", Value::Scalar(3.0));
    let i = ElementKind::Integer;
    let graph = single(op, &[("x", i, &[2, 2]), ("y", i, &[4, 2])]);
    let calls = compute_calls(&graph).unwrap();
    assert_eq!(
        calls,
        vec![EngineCall::PadConstant {
            x: 0,
            y: 1,
            padding: vec![(1, 1), (0, 0)],
            value: Scalar::Integer(3),
        }]
    );
}

#[test]
fn test_pad_border_modes() {
    let pad = |border: &str| {
        let op = Operation::new("pad", F)
            .with_input("input", Value::id("x"))
            .with_output("output", Value::id("y"))
            .with_attrib("padding", Value::pairs(&[(0, 0), (2, 2)]))
            .with_attrib("border", Value::string(border));
        compute_calls(&single(op, &[("x", F, &[1, 4]), ("y", F, &[1, 8])]))
    };

    assert_eq!(
        pad("replicate").unwrap(),
        vec![EngineCall::PadReplicate {
            x: 0,
            y: 1,
            padding: vec![(0, 0), (2, 2)],
        }]
    );
    assert!(matches!(
        root(pad("reflect")),
        RuntimeError::UnsupportedOperation { reason, .. } if reason.contains("reflect")
    ));
}

#[test]
fn test_tile_single_call() {
    let op = Operation::new("tile", F)
        .with_input("input", Value::id("x"))
        .with_output("output", Value::id("y"))
        .with_attrib("repeats", Value::integers(&[2, 1]));
    let graph = single(op, &[("x", F, &[2, 3]), ("y", F, &[4, 3])]);
    assert_eq!(
        compute_calls(&graph).unwrap(),
        vec![EngineCall::Tile { x: 0, y: 1 }]
    );
}

#[test]
fn test_slice_offsets_and_strides() {
    let op = Operation::new("slice", F)
        .with_input("input", Value::id("x"))
        .with_output("output", Value::id("y"))
        .with_attrib("axes", Value::integers(&[1, 2]))
        .with_attrib("begin", Value::integers(&[1, -4]))
        .with_attrib("end", Value::integers(&[3, 0]))
        .with_attrib("stride", Value::integers(&[1, 2]));
    let graph = single(op, &[("x", F, &[2, 4, 6]), ("y", F, &[2, 2, 2])]);
    assert_eq!(
        compute_calls(&graph).unwrap(),
        vec![EngineCall::Slice {
            x: 0,
            y: 1,
            offsets: vec![0, 1, 2],
            strides: vec![1, 1, 2],
        }]
    );
}

#[test]
fn test_layout_rank_cap() {
    let shape: &[usize] = &[1, 1, 1, 1, 1, 2];
    let op = Operation::new("tile", F)
        .with_input("input", Value::id("x"))
        .with_output("output", Value::id("y"));
    let graph = single(op, &[("x", F, shape), ("y", F, shape)]);
    assert!(matches!(
        root(compute_calls(&graph)),
        RuntimeError::UnsupportedOperation { .. }
    ));
}

// ============ Linear Algebra Tests ============

#[test]
fn test_matmul_reads_each_flag_from_its_own_key() {
    let op = Operation::new("matmul", F)
        .with_input("A", Value::id("a"))
        .with_input("B", Value::id("b"))
        .with_output("C", Value::id("c"))
        .with_attrib("transposeA", Value::Logical(false))
        .with_attrib("transposeB", Value::Logical(true));
    let graph = single(op, &[("a", F, &[2, 3]), ("b", F, &[4, 3]), ("c", F, &[2, 4])]);
    assert_eq!(
        compute_calls(&graph).unwrap(),
        vec![EngineCall::Matmul {
            a: 0,
            b: 1,
            c: 2,
            transpose_a: false,
            transpose_b: true,
        }]
    );
}

#[test]
fn test_linear_with_tensor_bias() {
    let op = Operation::new("linear", F)
        .with_input("input", Value::id("x"))
        .with_input("filter", Value::id("w"))
        .with_input("bias", Value::id("b"))
        .with_output("output", Value::id("y"));
    let graph = single(
        op,
        &[("b", F, &[1, 4]), ("w", F, &[4, 8]), ("x", F, &[2, 8]), ("y", F, &[2, 4])],
    );
    assert_eq!(
        compute_calls(&graph).unwrap(),
        vec![EngineCall::Linear {
            input: 2,
            filter: 1,
            bias: 0,
            output: 3,
        }]
    );
}

#[test]
fn test_softmax_axes() {
    let softmax = |axes: Option<&[i64]>| {
        let mut op = Operation::new("softmax", F)
            .with_input("x", Value::id("x"))
            .with_output("y", Value::id("y"));
        if let Some(axes) = axes {
            op = op.with_attrib("axes", Value::integers(axes));
        }
        compute_calls(&single(op, &[("x", F, &[2, 10]), ("y", F, &[2, 10])]))
    };

    assert_eq!(
        softmax(None).unwrap(),
        vec![EngineCall::Softmax { x: 0, y: 1, axis: 1 }]
    );
    assert_eq!(
        softmax(Some(&[0])).unwrap(),
        vec![EngineCall::Softmax { x: 0, y: 1, axis: 0 }]
    );
    assert!(matches!(
        root(softmax(Some(&[0, 1]))),
        RuntimeError::UnsupportedOperation { reason, .. } if reason == "multiple axes not implemented"
    ));
}

// ============ Variable Tests ============

#[test]
fn test_constant_element_by_element() {
    let op = Operation::new("constant", ElementKind::Integer)
        .with_output("output", Value::id("k"))
        .with_attrib("shape", Value::integers(&[3]))
        .with_attrib("value", Value::integers(&[7, 8, 9]));
    let graph = single(op, &[("k", ElementKind::Integer, &[3])]);
    let ctx = execute_graph(&graph, TraceEngine::new()).unwrap();
    assert_eq!(
        ctx.engine().data(0),
        Some(&TensorData::Integer(vec![7, 8, 9]))
    );
}

#[test]
fn test_constant_length_mismatch() {
    let op = Operation::new("constant", F)
        .with_output("output", Value::id("k"))
        .with_attrib("value", Value::Array(vec![Value::Scalar(1.0), Value::Scalar(2.0)]));
    let graph = single(op, &[("k", F, &[3])]);
    assert!(matches!(
        root(compute_calls(&graph)),
        RuntimeError::MalformedOperand { operand, .. } if operand == "value"
    ));
}

#[test]
fn test_update_copies_into_result() {
    let op = Operation::new("update", F)
        .with_input("variable", Value::id("v"))
        .with_input("value", Value::id("n"))
        .with_output("result", Value::id("r"));
    let mut builder = GraphBuilder::new("update");
    builder
        .literal("n", &[2], TensorData::Float(vec![4.0, 5.0]))
        .tensor("r", F, &[2])
        .tensor("v", F, &[2])
        .operation(op);
    let graph = builder.build().unwrap();

    let ctx = execute_graph(&graph, TraceEngine::new()).unwrap();
    let n = ctx.map_tensor("n").unwrap().id();
    let r = ctx.map_tensor("r").unwrap().id();
    assert_eq!(
        ctx.engine().compute_calls(),
        vec![&EngineCall::Copy { x: n, y: r }]
    );
    assert_eq!(ctx.engine().data(r), ctx.engine().data(n));
}

// ============ Materialization Tests ============

#[test]
fn test_materialization_skips_preseeded_tensors() {
    let mut builder = GraphBuilder::new("seeded");
    builder
        .literal("bias", &[2], TensorData::Float(vec![1.0, -1.0]))
        .tensor("x", F, &[2])
        .tensor("y", F, &[2])
        .operation(
            Operation::new("external", F).with_output("output", Value::id("x")),
        )
        .operation(
            Operation::new("add", F)
                .with_input("x", Value::id("x"))
                .with_input("y", Value::id("bias"))
                .with_output("z", Value::id("y")),
        );
    let graph = builder.build().unwrap();

    let mut ctx = Context::new(TraceEngine::new());
    let x = Tensor::new("x", F, vec![2]).with_data(TensorData::Float(vec![3.0, 4.0]));
    ctx.create_tensor(&x).unwrap();
    ctx.write_tensor(&x).unwrap();

    let stats = Runtime::default().execute(&graph, &mut ctx).unwrap();
    assert_eq!(stats.operations_executed, 2);
    assert_eq!(stats.per_operation["add"].count, 1);
    assert_eq!(ctx.bound_count(), 3);

    let x_id = ctx.map_tensor("x").unwrap().id();
    assert_eq!(
        ctx.engine().data(x_id),
        Some(&TensorData::Float(vec![3.0, 4.0]))
    );
    let bias_id = ctx.map_tensor("bias").unwrap().id();
    assert_eq!(
        ctx.engine().data(bias_id),
        Some(&TensorData::Float(vec![1.0, -1.0]))
    );
    assert!(ctx
        .engine()
        .compute_calls()
        .iter()
        .any(|c| matches!(c, EngineCall::Binary { op: BinaryOp::Add, .. })));
}

#[test]
fn test_external_requires_binding_without_materialization() {
    let op = Operation::new("external", F).with_output("output", Value::id("x"));
    let graph = single(op, &[("x", F, &[1])]);
    let mut ctx = Context::new(TraceEngine::new());
    let err = Runtime::new(RunConfig::new().with_materialization(false))
        .execute(&graph, &mut ctx)
        .unwrap_err();
    assert!(matches!(err.root(), RuntimeError::UnboundTensor(name) if name == "x"));
}
