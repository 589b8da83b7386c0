use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::Arc;

use rowexpr::ast::{for_each_pre, ColumnAccess, ColumnId, ExprKind, NodeId};
use rowexpr::error::{CompileResult, ErrorKind, EvalError};
use rowexpr::eval::{
    compile_expr, BooleanComputer, Computer, EvalContext, FloatComputer, IntegerComputer,
    StringComputer,
};
use rowexpr::registry::{Aggregation, CallableDoc, Function, Registry};
use rowexpr::resolve::resolve_column_indices;
use rowexpr::signature::{Arg, ArgMatcher, BoundArguments, Signature};
use rowexpr::syntax::parse;
use rowexpr::typing::{infer_types, TypingContext};
use rowexpr::types::ValueType;

/// One mutable table cell; evaluation re-reads it on every call.
#[derive(Debug, Clone, PartialEq)]
enum Cell {
    Missing,
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
}

struct TestTable {
    columns: HashMap<String, (ValueType, Rc<RefCell<Cell>>)>,
    flow_vars: HashMap<String, (ValueType, Cell)>,
    agg_results: RefCell<HashMap<NodeId, Computer>>,
    registry: Registry,
}

impl TestTable {
    fn new() -> Self {
        let _ = env_logger::builder().is_test(true).try_init();
        let mut registry = Registry::new();
        registry.register_function(Arc::new(Average::new()));
        registry.register_aggregation(Arc::new(ColumnMax::new()));
        Self {
            columns: HashMap::new(),
            flow_vars: HashMap::new(),
            agg_results: RefCell::new(HashMap::new()),
            registry,
        }
    }

    fn with_column(mut self, name: &str, value_type: ValueType, cell: Cell) -> Self {
        self.columns
            .insert(name.to_string(), (value_type, Rc::new(RefCell::new(cell))));
        self
    }

    fn with_flow_var(mut self, name: &str, value_type: ValueType, cell: Cell) -> Self {
        self.flow_vars.insert(name.to_string(), (value_type, cell));
        self
    }

    /// Overwrite a cell in place, as a host would between rows.
    fn set(&self, name: &str, cell: Cell) {
        *self.columns[name].1.borrow_mut() = cell;
    }

    fn compile(&self, text: &str) -> CompileResult<Computer> {
        let ast = parse(text)?;
        let types = infer_types(&ast, self)?;
        compile_expr(&ast, &types, self)
    }
}

fn cell_computer(value_type: ValueType, cell: Rc<RefCell<Cell>>) -> Computer {
    let missing_cell = Rc::clone(&cell);
    let is_missing = Rc::new(move || Ok(matches!(*missing_cell.borrow(), Cell::Missing)));
    match value_type.base_type() {
        ValueType::Integer => Computer::Integer(IntegerComputer::new(
            Rc::new(move || match &*cell.borrow() {
                Cell::Int(v) => Ok(*v),
                other => Err(EvalError::new(format!("not an integer cell: {:?}", other))),
            }),
            is_missing,
        )),
        ValueType::Float => Computer::Float(FloatComputer::new(
            Rc::new(move || match &*cell.borrow() {
                Cell::Float(v) => Ok(*v),
                other => Err(EvalError::new(format!("not a float cell: {:?}", other))),
            }),
            is_missing,
        )),
        ValueType::String => Computer::String(StringComputer::new(
            Rc::new(move || match &*cell.borrow() {
                Cell::Str(v) => Ok(v.clone()),
                other => Err(EvalError::new(format!("not a string cell: {:?}", other))),
            }),
            is_missing,
        )),
        ValueType::Boolean => Computer::Boolean(BooleanComputer::new(
            Rc::new(move || match &*cell.borrow() {
                Cell::Bool(v) => Ok(*v),
                other => Err(EvalError::new(format!("not a boolean cell: {:?}", other))),
            }),
            is_missing,
        )),
        _ => Computer::Missing,
    }
}

impl TypingContext for TestTable {
    fn column_type(&self, access: &ColumnAccess) -> Option<ValueType> {
        match &access.column {
            ColumnId::Named(name) => self.columns.get(name).map(|(t, _)| *t),
            ColumnId::RowIndex => Some(ValueType::Integer),
            ColumnId::RowId => Some(ValueType::String),
        }
    }

    fn flow_var_type(&self, name: &str) -> Option<ValueType> {
        self.flow_vars.get(name).map(|(t, _)| *t)
    }

    fn registry(&self) -> &Registry {
        &self.registry
    }
}

impl EvalContext for TestTable {
    fn column_computer(&self, access: &ColumnAccess) -> Option<Computer> {
        match &access.column {
            ColumnId::Named(name) => self
                .columns
                .get(name)
                .map(|(t, cell)| cell_computer(*t, Rc::clone(cell))),
            ColumnId::RowIndex => Some(Computer::Integer(IntegerComputer::constant(0))),
            ColumnId::RowId => Some(Computer::String(StringComputer::constant(
                "Row0".to_string(),
            ))),
        }
    }

    fn flow_var_computer(&self, name: &str) -> Option<Computer> {
        let (value_type, cell) = self.flow_vars.get(name)?;
        Some(cell_computer(
            *value_type,
            Rc::new(RefCell::new(cell.clone())),
        ))
    }

    fn aggregation_result(&self, node: NodeId) -> Option<Computer> {
        self.agg_results.borrow().get(&node).cloned()
    }

    fn registry(&self) -> &Registry {
        &self.registry
    }
}

/// Arithmetic mean of one or more numeric values.
struct Average {
    signature: Signature,
    keywords: Vec<String>,
}

impl Average {
    fn new() -> Self {
        Self {
            signature: Signature::new(vec![
                Arg::required("value", "first value", ArgMatcher::numeric()),
                Arg::var("values", "further values", ArgMatcher::numeric()),
            ])
            .unwrap(),
            keywords: vec!["mean".to_string()],
        }
    }
}

impl CallableDoc for Average {
    fn name(&self) -> &str {
        "average"
    }
    fn keywords(&self) -> &[String] {
        &self.keywords
    }
    fn description(&self) -> &str {
        "the arithmetic mean of the arguments"
    }
}

impl Function for Average {
    fn signature(&self) -> &Signature {
        &self.signature
    }

    fn return_type(&self, _args: &BoundArguments<ValueType>) -> Result<ValueType, String> {
        Ok(ValueType::Float)
    }

    fn compile(&self, args: BoundArguments<Computer>) -> Computer {
        let computers: Vec<Computer> = args.iter().cloned().collect();
        Computer::Float(FloatComputer::new(
            Rc::new(move || {
                let mut sum = 0.0;
                for computer in &computers {
                    sum += computer.compute_float()?;
                }
                Ok(sum / computers.len() as f64)
            }),
            Rc::new(|| Ok(false)),
        ))
    }
}

/// Column-wide maximum; the host precomputes the result.
struct ColumnMax {
    signature: Signature,
}

impl ColumnMax {
    fn new() -> Self {
        Self {
            signature: Signature::new(vec![Arg::required(
                "column",
                "name of the column to aggregate",
                ArgMatcher::string(),
            )])
            .unwrap(),
        }
    }
}

impl CallableDoc for ColumnMax {
    fn name(&self) -> &str {
        "MAX"
    }
    fn description(&self) -> &str {
        "the largest value in a column"
    }
}

impl Aggregation for ColumnMax {
    fn signature(&self) -> &Signature {
        &self.signature
    }

    fn return_type(&self, _args: &BoundArguments<ValueType>) -> Result<ValueType, String> {
        Ok(ValueType::Float)
    }
}

#[test]
fn test_arithmetic_pipeline() {
    let table = TestTable::new();
    assert_eq!(table.compile("1 + 2 * 3").unwrap().compute_integer().unwrap(), 7);
    assert_eq!(table.compile("2 ** 3 ** 2").unwrap().compute_integer().unwrap(), 512);
    assert_eq!(table.compile("7 // 2").unwrap().compute_integer().unwrap(), 3);
    assert_eq!(table.compile("-7 // 2").unwrap().compute_integer().unwrap(), -4);
    assert_eq!(table.compile("-7 % 3").unwrap().compute_integer().unwrap(), 2);
    assert_eq!(table.compile("1 / 2").unwrap().compute_float().unwrap(), 0.5);
}

#[test]
fn test_floor_division_by_zero_yields_zero() {
    let table = TestTable::new().with_column("n", ValueType::Integer, Cell::Int(5));
    let computer = table.compile("$n$ // 0").unwrap();
    assert!(!computer.is_missing().unwrap());
    assert_eq!(computer.compute_integer().unwrap(), 0);
}

#[test]
fn test_string_concatenation_renders_missing() {
    let table = TestTable::new().with_column("opt", ValueType::OptInteger, Cell::Missing);
    let computer = table.compile("\"x\" + $opt$").unwrap();
    assert!(!computer.is_missing().unwrap());
    assert_eq!(computer.compute_string().unwrap(), "xMISSING");

    table.set("opt", Cell::Int(7));
    assert_eq!(computer.compute_string().unwrap(), "x7");

    let table = TestTable::new().with_column("name", ValueType::String, Cell::Str("ab".to_string()));
    assert_eq!(
        table.compile("$name$ + \"!\"").unwrap().compute_string().unwrap(),
        "ab!"
    );
}

#[test]
fn test_equality_with_missing_operands() {
    let table = TestTable::new().with_column("opt", ValueType::OptInteger, Cell::Missing);

    let computer = table.compile("5 == MISSING").unwrap();
    assert!(!computer.is_missing().unwrap());
    assert!(!computer.compute_boolean().unwrap());

    assert!(table.compile("MISSING == MISSING").unwrap().compute_boolean().unwrap());

    let computer = table.compile("$opt$ == 5").unwrap();
    assert!(!computer.compute_boolean().unwrap());
    table.set("opt", Cell::Int(5));
    assert!(computer.compute_boolean().unwrap());

    // A runtime-missing cell is equal to the missing constant.
    table.set("opt", Cell::Missing);
    assert!(table.compile("$opt$ == MISSING").unwrap().compute_boolean().unwrap());

    // Numeric promotion across bases.
    assert!(table.compile("5 == 5.0").unwrap().compute_boolean().unwrap());
    assert!(table.compile("5 != 6.0").unwrap().compute_boolean().unwrap());
}

#[test]
fn test_ordering_with_missing_operands() {
    let table = TestTable::new()
        .with_column("a", ValueType::OptFloat, Cell::Missing)
        .with_column("b", ValueType::OptFloat, Cell::Missing);

    let le = table.compile("$a$ <= $b$").unwrap();
    let lt = table.compile("$a$ < $b$").unwrap();

    // Both missing: equal under '<=', not under '<'.
    assert!(le.compute_boolean().unwrap());
    assert!(!lt.compute_boolean().unwrap());

    // One missing: all orderings are false.
    table.set("a", Cell::Float(1.0));
    assert!(!le.compute_boolean().unwrap());
    assert!(!lt.compute_boolean().unwrap());

    // Both present: plain comparison.
    table.set("b", Cell::Float(2.0));
    assert!(le.compute_boolean().unwrap());
    assert!(lt.compute_boolean().unwrap());
}

#[test]
fn test_missing_fallback() {
    let table = TestTable::new().with_column("opt", ValueType::OptInteger, Cell::Missing);
    let computer = table.compile("$opt$ ?? 0").unwrap();
    assert!(!computer.is_missing().unwrap());
    assert_eq!(computer.compute_integer().unwrap(), 0);

    table.set("opt", Cell::Int(42));
    assert_eq!(computer.compute_integer().unwrap(), 42);
}

#[test]
fn test_kleene_logic() {
    let table = TestTable::new().with_column("flag", ValueType::OptBoolean, Cell::Missing);

    // A determined operand can decide the result despite a missing one.
    let computer = table.compile("false and $flag$").unwrap();
    assert!(!computer.is_missing().unwrap());
    assert!(!computer.compute_boolean().unwrap());

    let computer = table.compile("true or $flag$").unwrap();
    assert!(!computer.is_missing().unwrap());
    assert!(computer.compute_boolean().unwrap());

    // An undetermined result stays missing.
    assert!(table.compile("not $flag$").unwrap().is_missing().unwrap());
    assert!(table.compile("true and $flag$").unwrap().is_missing().unwrap());

    // A present value makes the same computers determined again.
    table.set("flag", Cell::Bool(false));
    let computer = table.compile("not $flag$").unwrap();
    assert!(!computer.is_missing().unwrap());
    assert!(computer.compute_boolean().unwrap());
}

#[test]
fn test_function_call() {
    let table = TestTable::new();
    let computer = table.compile("average(1, 2.0, 6)").unwrap();
    assert_eq!(computer.compute_float().unwrap(), 3.0);
}

#[test]
fn test_function_rejects_possibly_missing_argument() {
    let table = TestTable::new().with_column("opt", ValueType::OptInteger, Cell::Int(1));
    let err = table.compile("average($opt$)").unwrap_err();
    assert_eq!(err.kind, ErrorKind::Typing);
    assert!(err.message.contains("'??'"), "{}", err.message);
}

#[test]
fn test_unknown_function_suggests_similar_names() {
    let table = TestTable::new();
    let err = table.compile("avverage(1)").unwrap_err();
    assert_eq!(err.kind, ErrorKind::Typing);
    assert!(err.message.contains("did you mean 'average'"), "{}", err.message);

    // Keywords count as search terms too.
    let err = table.compile("meen(1)").unwrap_err();
    assert!(err.message.contains("'average'"), "{}", err.message);
}

#[test]
fn test_aggregation_needs_precomputed_result() {
    let table = TestTable::new();
    let ast = parse("MAX(\"price\") * 2.0").unwrap();
    let types = infer_types(&ast, &table).unwrap();

    let err = compile_expr(&ast, &types, &table).unwrap_err();
    assert_eq!(err.kind, ErrorKind::AggregationNotImplemented);

    let mut agg_node = None;
    for_each_pre(&ast, &mut |node| {
        if matches!(node.kind(), ExprKind::AggregationCall { .. }) {
            agg_node = Some(node.id());
        }
    });
    table.agg_results.borrow_mut().insert(
        agg_node.unwrap(),
        Computer::Float(FloatComputer::constant(9.5)),
    );

    let computer = compile_expr(&ast, &types, &table).unwrap();
    assert_eq!(computer.compute_float().unwrap(), 19.0);
}

#[test]
fn test_flow_variables() {
    let table = TestTable::new().with_flow_var("threshold", ValueType::Float, Cell::Float(1.5));
    let computer = table.compile("$$threshold$$ * 2").unwrap();
    assert_eq!(computer.compute_float().unwrap(), 3.0);

    let err = table.compile("$$nope$$").unwrap_err();
    assert_eq!(err.kind, ErrorKind::MissingFlowVariable);
}

#[test]
fn test_computers_follow_cell_updates() {
    let table = TestTable::new().with_column("n", ValueType::Integer, Cell::Int(3));
    let computer = table.compile("$n$ * 2 + 1").unwrap();
    assert_eq!(computer.compute_integer().unwrap(), 7);
    table.set("n", Cell::Int(10));
    assert_eq!(computer.compute_integer().unwrap(), 21);
}

#[test]
fn test_unknown_column_reports_location() {
    let table = TestTable::new();
    let err = table.compile("1 + $nope$").unwrap_err();
    assert_eq!(err.kind, ErrorKind::MissingColumn);
    assert!(err.location.is_some());
    assert!(err.long_message().starts_with("Missing column"));
}

#[test]
fn test_column_index_resolution() {
    let schema: Vec<String> = vec!["id".to_string(), "price".to_string()];
    let ast = parse("$price$ * 2").unwrap();
    let indices = resolve_column_indices(&ast, &schema).unwrap();
    assert_eq!(indices.len(), 1);

    let ast = parse("$quantity$ * 2").unwrap();
    let err = resolve_column_indices(&ast, &schema).unwrap_err();
    assert_eq!(err.kind, ErrorKind::MissingColumn);
}

#[test]
fn test_eval_errors_carry_a_location_trace() {
    let table = TestTable::new().with_column("opt", ValueType::OptInteger, Cell::Missing);
    let computer = table.compile("$opt$ + 1").unwrap();
    assert!(computer.is_missing().unwrap());
    // Forcing the value anyway fails and names the offending range.
    let err = computer.compute_integer().unwrap_err();
    assert!(!err.trace.is_empty());
}

#[test]
fn test_syntax_errors_carry_locations() {
    let err = parse("1 + ").unwrap_err();
    assert_eq!(err.kind, ErrorKind::Syntax);
    assert!(err.location.is_some());

    let err = parse("1 ++ 2").unwrap_err();
    assert_eq!(err.kind, ErrorKind::Syntax);
}
