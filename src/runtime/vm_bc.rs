use crate::bytecode::{BlockId, BlockKind, Op, ProgramBc};
use crate::lang::{BinaryOp, SystemCallKind, Value, VariableId};
use crate::runtime::io::{InputEvent, InputSource, NoInput};
use crate::runtime::runtime_error::{
    ControlFlowError, Fault, Location, RuntimeError, stack_underflow,
};
use std::collections::{HashMap, HashSet};
use std::io::{self, Write};
use tracing::{debug, trace, warn};

#[derive(Debug, Clone)]
pub struct VmBcConfig {
    /// Block stack depth. The block stack doubles as the call stack.
    pub max_block_depth: usize,
    pub max_steps: Option<usize>,
    pub max_stack_size: usize,
    pub max_array_length: usize,
}

impl Default for VmBcConfig {
    fn default() -> Self {
        VmBcConfig {
            max_block_depth: 1000,
            max_steps: None,
            max_stack_size: 10_000,
            max_array_length: 1 << 20,
        }
    }
}

/// A live activation of a block.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockFrame {
    pub block: BlockId,
    pub kind: BlockKind,
    pub ip: usize,
    pub locals: HashMap<VariableId, Value>,
}

impl BlockFrame {
    fn new(block: BlockId, kind: BlockKind) -> Self {
        Self {
            block,
            kind,
            ip: 0,
            locals: HashMap::new(),
        }
    }

    fn location(&self) -> Location {
        Location {
            block: self.block,
            kind: self.kind,
            ip: self.ip,
        }
    }
}

/// Where a variable is declared.
#[derive(Debug, Clone, Copy)]
enum Scope {
    Frame(usize),
    TopLevel,
}

/// Block-structured stack machine.
///
/// Writes `DebugWrite` output to `W` and takes `DebugRead` characters from `I`.
pub struct VmBc<W = Vec<u8>, I = NoInput> {
    stack: Vec<Value>,
    blocks: Vec<BlockFrame>,
    globals: HashMap<VariableId, Value>,
    // Safety limits
    config: VmBcConfig,
    steps: usize,
    output: W,
    input: I,
}

impl<W: Write, I: InputSource> VmBc<W, I> {
    pub fn new(output: W, input: I) -> Self {
        Self::with_config(VmBcConfig::default(), output, input)
    }

    pub fn with_config(config: VmBcConfig, output: W, input: I) -> Self {
        Self {
            stack: Vec::new(),
            blocks: Vec::new(),
            globals: HashMap::new(),
            config,
            steps: 0,
            output,
            input,
        }
    }

    pub fn stack(&self) -> &[Value] {
        &self.stack
    }

    /// Active frames, outermost first.
    pub fn frames(&self) -> &[BlockFrame] {
        &self.blocks
    }

    pub fn block_depth(&self) -> usize {
        self.blocks.len()
    }

    pub fn globals(&self) -> &HashMap<VariableId, Value> {
        &self.globals
    }

    pub fn output(&self) -> &W {
        &self.output
    }

    pub fn into_output(self) -> W {
        self.output
    }

    pub fn is_finished(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn reset_execution_state(&mut self) {
        self.steps = 0;
        self.stack.clear();
        self.blocks.clear();
        self.globals.clear();
    }

    /// Execute `prog` from `main` until the block stack empties.
    pub fn run(&mut self, prog: &ProgramBc) -> Result<(), RuntimeError> {
        self.start(prog)?;

        while !self.is_finished() {
            self.step(prog)?;
        }

        self.output
            .flush()
            .map_err(|e| self.fail(Fault::Io(e), None))?;

        debug!(steps = self.steps, "run finished");
        Ok(())
    }

    /// Reset the machine, create the top-level variables and enter `main`.
    pub fn start(&mut self, prog: &ProgramBc) -> Result<(), RuntimeError> {
        self.reset_execution_state();

        for id in &prog.top_level_variables {
            self.globals.insert(*id, Value::Undefined);
        }

        let entry = Op::Call {
            target: "main".to_string(),
        };
        self.exec(prog, &entry).map_err(|fault| self.fail(fault, None))
    }

    /// Execute the instruction under the innermost frame's pointer.
    pub fn step(&mut self, prog: &ProgramBc) -> Result<(), RuntimeError> {
        let location = match self.blocks.last() {
            Some(frame) => frame.location(),
            None => return Ok(()),
        };

        let op = match fetch(prog, location) {
            Ok(op) => op,
            Err(fault) => return Err(self.fail(fault, Some(location))),
        };

        // Advance first: whatever frame is on top after `op` resumes at its
        // own pointer.
        if let Some(frame) = self.blocks.last_mut() {
            frame.ip += 1;
        }

        trace!(block = %location.block, ip = location.ip, ?op, "exec");

        self.check_limits()
            .and_then(|()| self.exec(prog, op))
            .map_err(|fault| self.fail(fault, Some(location)))
    }

    fn fail(&self, fault: Fault, location: Option<Location>) -> RuntimeError {
        let trace: Vec<Location> = self.blocks.iter().rev().map(BlockFrame::location).collect();

        match &location {
            Some(location) => warn!(%fault, %location, "run aborted"),
            None => warn!(%fault, "run aborted"),
        }

        let err = RuntimeError::new(fault).with_trace(trace);
        match location {
            Some(location) => err.at(location),
            None => err,
        }
    }

    // Execution

    fn check_limits(&mut self) -> Result<(), Fault> {
        self.steps += 1;

        if let Some(max) = self.config.max_steps {
            if self.steps > max {
                return Err(Fault::LimitExceeded {
                    what: "execution step",
                    limit: max,
                });
            }
        }

        if self.stack.len() > self.config.max_stack_size {
            return Err(Fault::LimitExceeded {
                what: "operand stack",
                limit: self.config.max_stack_size,
            });
        }

        Ok(())
    }

    fn exec(&mut self, prog: &ProgramBc, op: &Op) -> Result<(), Fault> {
        match op {
            // Literals
            Op::PushString { value } => self.push(Value::String(value.clone())),
            Op::PushInteger { value } => self.push(Value::Integer(*value)),
            Op::PushBoolean { value } => self.push(Value::Boolean(*value)),
            Op::PushUndefined => self.push(Value::Undefined),
            Op::PushVariable { variable } => self.push(Value::VariableRef(*variable)),

            Op::Pop => {
                self.pop()?;
            }

            // Variables
            Op::AssignVariable => {
                let target = self.pop_reference()?;
                let value = self.pop_resolved()?;
                self.set_variable(target, value.clone());
                self.push(value);
            }
            Op::AssignVariableDirect { target } => {
                let value = self.pop_resolved()?;
                self.set_variable(*target, value);
            }

            // Expressions
            Op::BinaryExpression { op } => {
                let rhs = self.pop_resolved()?;
                let lhs = self.pop_resolved()?;
                self.push(binary(*op, &lhs, &rhs)?);
            }
            Op::ArrayGet => {
                let index = self.pop_resolved()?.to_index()?;
                let target = self.pop_reference()?;
                let element = self
                    .array_mut(target)?
                    .get(index)
                    .cloned()
                    .unwrap_or_default();
                self.push(element);
            }
            Op::ArraySet => {
                let value = self.pop_resolved()?;
                let index = self.pop_resolved()?.to_index()?;
                let target = self.pop_reference()?;

                let limit = self.config.max_array_length;
                if index >= limit {
                    return Err(Fault::LimitExceeded {
                        what: "array length",
                        limit,
                    });
                }

                let items = self.array_mut(target)?;
                if index >= items.len() {
                    items.resize(index + 1, Value::Undefined);
                }
                items[index] = value;
                self.push(Value::Undefined);
            }

            // Calls
            Op::Call { target } => self.call(prog, target)?,
            Op::SystemCall { call, length } => self.system_call(*call, *length)?,

            // Control flow
            Op::EnterBlock { block } => self.enter_block(prog, *block)?,
            Op::ExitBlock => {
                self.blocks.pop();
            }
            Op::BranchEnter { block } => {
                if self.pop_bool()? {
                    self.enter_block(prog, *block)?;
                }
            }
            Op::BranchReturn => {
                if !self.pop_bool()? {
                    self.blocks.pop();
                }
            }
            Op::Return => self.exec_return()?,
            Op::Continue => self.exec_continue()?,
            Op::Break => self.exec_break()?,
        }

        Ok(())
    }

    fn call(&mut self, prog: &ProgramBc, name: &str) -> Result<(), Fault> {
        let entry = prog
            .function(name)
            .ok_or_else(|| Fault::FunctionNotFound(name.to_string()))?;
        let block = prog
            .block(entry.entry_block)
            .ok_or(Fault::BlockNotFound(entry.entry_block))?;

        let mut frame = BlockFrame::new(block.id, block.kind);
        for id in &entry.locals {
            frame.locals.insert(*id, Value::Undefined);
        }

        debug!(function = name, depth = self.blocks.len(), "call");
        self.push_frame(frame)
    }

    fn enter_block(&mut self, prog: &ProgramBc, id: BlockId) -> Result<(), Fault> {
        let block = prog.block(id).ok_or(Fault::BlockNotFound(id))?;
        self.push_frame(BlockFrame::new(id, block.kind))
    }

    fn push_frame(&mut self, frame: BlockFrame) -> Result<(), Fault> {
        if self.blocks.len() >= self.config.max_block_depth {
            return Err(Fault::LimitExceeded {
                what: "block depth",
                limit: self.config.max_block_depth,
            });
        }
        self.blocks.push(frame);
        Ok(())
    }

    fn exec_return(&mut self) -> Result<(), Fault> {
        let function = self
            .blocks
            .iter()
            .rposition(|frame| frame.kind == BlockKind::Function)
            .ok_or(ControlFlowError::ReturnOutsideFunction)?;

        // Resolve while the frames the reference may point into still exist.
        let value = self.pop_resolved()?;
        self.blocks.truncate(function);

        debug!(depth = self.blocks.len(), "return");
        self.push(value);
        Ok(())
    }

    fn exec_continue(&mut self) -> Result<(), Fault> {
        let target = self
            .blocks
            .iter()
            .rposition(|frame| frame.kind != BlockKind::If)
            .filter(|&i| self.blocks[i].kind == BlockKind::While)
            .ok_or(ControlFlowError::ContinueOutsideLoop)?;

        self.blocks.truncate(target + 1);

        if let Some(frame) = self.blocks.last_mut() {
            frame.locals.clear();
            frame.ip = 0;
        }
        Ok(())
    }

    fn exec_break(&mut self) -> Result<(), Fault> {
        match self.blocks.last() {
            Some(frame) if frame.kind == BlockKind::While => {
                self.blocks.pop();
                Ok(())
            }
            _ => Err(ControlFlowError::BreakOutsideLoop.into()),
        }
    }

    fn system_call(&mut self, call: SystemCallKind, length: usize) -> Result<(), Fault> {
        let args = self.pop_n(length)?;

        match call {
            SystemCallKind::DebugWrite => {
                let values = args
                    .into_iter()
                    .map(|arg| self.resolve(arg))
                    .collect::<Result<Vec<_>, _>>()?;

                for value in &values {
                    write!(self.output, "{}", value)?;
                }
                self.output.flush()?;
                self.push(Value::Undefined);
            }
            SystemCallKind::DebugRead => match self.input.read_char()? {
                InputEvent::Char(c) => self.push(Value::String(c.to_string())),
                InputEvent::Interrupt => return Err(Fault::Interrupted),
            },
        }

        Ok(())
    }

    // Variables

    /// Innermost scope declaring `id`, searching no further out than the
    /// nearest function frame before the top level.
    fn find_scope(&self, id: VariableId) -> Option<Scope> {
        for (i, frame) in self.blocks.iter().enumerate().rev() {
            if frame.locals.contains_key(&id) {
                return Some(Scope::Frame(i));
            }
            if frame.kind == BlockKind::Function {
                break;
            }
        }

        self.globals.contains_key(&id).then_some(Scope::TopLevel)
    }

    fn lookup(&self, id: VariableId) -> Option<&Value> {
        match self.find_scope(id)? {
            Scope::Frame(i) => self.blocks[i].locals.get(&id),
            Scope::TopLevel => self.globals.get(&id),
        }
    }

    fn slot_mut(&mut self, id: VariableId) -> Option<&mut Value> {
        match self.find_scope(id)? {
            Scope::Frame(i) => self.blocks[i].locals.get_mut(&id),
            Scope::TopLevel => self.globals.get_mut(&id),
        }
    }

    fn get_variable(&self, id: VariableId) -> Result<&Value, Fault> {
        self.lookup(id).ok_or(Fault::UndefinedVariable(id))
    }

    /// Overwrite the declaring scope, or declare in the innermost frame.
    fn set_variable(&mut self, id: VariableId, value: Value) {
        if let Some(slot) = self.slot_mut(id) {
            *slot = value;
            return;
        }

        match self.blocks.last_mut() {
            Some(frame) => {
                frame.locals.insert(id, value);
            }
            None => {
                self.globals.insert(id, value);
            }
        }
    }

    /// The array held by `id`, replacing any non-array value with `[]` first.
    fn array_mut(&mut self, id: VariableId) -> Result<&mut Vec<Value>, Fault> {
        if !matches!(self.lookup(id), Some(Value::Array(_))) {
            self.set_variable(id, Value::Array(Vec::new()));
        }

        match self.slot_mut(id) {
            Some(Value::Array(items)) => Ok(items),
            _ => Err(Fault::UndefinedVariable(id)),
        }
    }

    /// Follow variable references until a concrete value is reached.
    fn resolve(&self, value: Value) -> Result<Value, Fault> {
        let mut current = value;
        let mut visited = HashSet::new();

        while let Value::VariableRef(id) = current {
            if !visited.insert(id) {
                return Err(Fault::CyclicReference(id));
            }
            current = self.get_variable(id)?.clone();
        }

        Ok(current)
    }

    // Stack operations

    fn push(&mut self, value: Value) {
        self.stack.push(value);
    }

    fn pop(&mut self) -> Result<Value, Fault> {
        self.stack.pop().ok_or_else(|| stack_underflow(1, 0))
    }

    /// Pop `n` operands, returned in the order they were pushed.
    fn pop_n(&mut self, n: usize) -> Result<Vec<Value>, Fault> {
        let len = self.stack.len();
        if len < n {
            return Err(stack_underflow(n, len));
        }
        Ok(self.stack.split_off(len - n))
    }

    fn pop_resolved(&mut self) -> Result<Value, Fault> {
        let value = self.pop()?;
        self.resolve(value)
    }

    fn pop_reference(&mut self) -> Result<VariableId, Fault> {
        match self.pop()? {
            Value::VariableRef(id) => Ok(id),
            other => Err(Fault::InvalidAssignmentTarget(other.type_name())),
        }
    }

    fn pop_bool(&mut self) -> Result<bool, Fault> {
        Ok(self.pop_resolved()?.to_bool()?)
    }
}

fn fetch(prog: &ProgramBc, location: Location) -> Result<&Op, Fault> {
    let block = prog
        .block(location.block)
        .ok_or(Fault::BlockNotFound(location.block))?;

    block
        .ops
        .get(location.ip)
        .ok_or(Fault::ControlFlow(ControlFlowError::EndOfBlock))
}

fn binary(op: BinaryOp, lhs: &Value, rhs: &Value) -> Result<Value, Fault> {
    Ok(match op {
        BinaryOp::Plus => Value::Integer(lhs.to_integer()?.wrapping_add(rhs.to_integer()?)),
        BinaryOp::Minus => Value::Integer(lhs.to_integer()?.wrapping_sub(rhs.to_integer()?)),
        BinaryOp::GreaterThan => Value::Boolean(lhs.to_integer()? > rhs.to_integer()?),
        BinaryOp::LesserThan => Value::Boolean(lhs.to_integer()? < rhs.to_integer()?),
        BinaryOp::Equals => Value::Boolean(lhs.equals(rhs)?),
        BinaryOp::NotEquals => Value::Boolean(!lhs.equals(rhs)?),
    })
}

/// Run `prog` against stdout, reading from `input`.
pub fn run_stdio<I: InputSource>(
    prog: &ProgramBc,
    config: VmBcConfig,
    input: I,
) -> Result<(), RuntimeError> {
    let mut vm = VmBc::with_config(config, io::stdout().lock(), input);
    vm.run(prog)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::{Block, FunctionEntry, generate};
    use crate::demos;
    use crate::lang::{Expression, FunctionDecl, Program, ProgramBuilder, Statement, Type};
    use crate::runtime::io::ScriptedInput;
    use std::collections::BTreeMap;

    // ============================================================
    // Test Helpers
    // ============================================================

    type TestVm = VmBc<Vec<u8>, ScriptedInput>;

    /// Build a program from raw blocks; `functions` maps names to entry blocks
    fn program_from_blocks(
        functions: &[(&str, u32, Vec<VariableId>)],
        blocks: Vec<(BlockKind, Vec<Op>)>,
    ) -> ProgramBc {
        ProgramBc {
            top_level_variables: vec![],
            functions: functions
                .iter()
                .map(|(name, entry, locals)| {
                    (
                        name.to_string(),
                        FunctionEntry {
                            entry_block: BlockId(*entry),
                            locals: locals.clone(),
                        },
                    )
                })
                .collect::<BTreeMap<_, _>>(),
            blocks: blocks
                .into_iter()
                .enumerate()
                .map(|(i, (kind, ops))| Block {
                    id: BlockId(i as u32),
                    kind,
                    ops,
                })
                .collect(),
        }
    }

    /// A program whose `main` is the given ops
    fn program_from_ops(ops: Vec<Op>) -> ProgramBc {
        program_from_blocks(&[("main", 0, vec![])], vec![(BlockKind::Function, ops)])
    }

    fn vm(input: &str) -> TestVm {
        VmBc::new(Vec::new(), ScriptedInput::new(input))
    }

    fn output(vm: &TestVm) -> String {
        String::from_utf8_lossy(vm.output()).into_owned()
    }

    /// Generate and run a typed program, returning the VM and result
    fn run_program(program: &Program, input: &str) -> (TestVm, Result<(), RuntimeError>) {
        let bc = generate(program).expect("generation should succeed");
        let mut vm = vm(input);
        let result = vm.run(&bc);
        (vm, result)
    }

    /// Run a typed program that must succeed, returning its output
    fn output_of(program: &Program) -> String {
        let (vm, result) = run_program(program, "");
        result.expect("execution should succeed");
        output(&vm)
    }

    fn run_ops(ops: Vec<Op>) -> Result<Vec<Value>, RuntimeError> {
        let mut vm = vm("");
        vm.run(&program_from_ops(ops))?;
        Ok(vm.stack().to_vec())
    }

    /// Assert execution produces a fault matching `predicate`
    fn assert_fault(prog: &ProgramBc, predicate: impl Fn(&Fault) -> bool) -> RuntimeError {
        let mut vm = vm("");
        match vm.run(prog) {
            Ok(()) => panic!("expected a fault, got stack: {:?}", vm.stack()),
            Err(e) => {
                assert!(predicate(&e.fault), "unexpected fault: {}", e);
                e
            }
        }
    }

    fn demo_output(name: &str, input: &str) -> (String, Result<(), RuntimeError>) {
        let demo = demos::find(name).expect("demo exists");
        let (vm, result) = run_program(&(demo.build)(), input);
        (output(&vm), result)
    }

    // ============================================================
    // Scenarios
    // ============================================================

    #[test]
    fn test_local_assign_and_write() {
        let (out, result) = demo_output("hello", "");
        result.unwrap();
        assert_eq!(out, "5");
    }

    #[test]
    fn test_while_runs_three_times() {
        let (out, result) = demo_output("loop", "");
        result.unwrap();
        assert_eq!(out, "012");
    }

    #[test]
    fn test_loop_restores_block_depth() {
        let demo = demos::find("loop").unwrap();
        let bc = generate(&(demo.build)()).unwrap();
        let mut vm = vm("");
        vm.start(&bc).unwrap();

        let mut pre_loop_depth = None;
        let mut iterations = 0;
        while !vm.is_finished() {
            let before = vm.block_depth();
            let top_kind = vm.frames().last().map(|f| f.kind);
            vm.step(&bc).unwrap();

            let now_kind = vm.frames().last().map(|f| f.kind);
            if top_kind == Some(BlockKind::Function) && now_kind == Some(BlockKind::While) {
                pre_loop_depth = Some(before);
            }
            if top_kind == Some(BlockKind::While)
                && vm.frames().last().map(|f| (f.kind, f.ip)) == Some((BlockKind::While, 0))
            {
                iterations += 1;
            }
            if top_kind == Some(BlockKind::While) && vm.block_depth() < before {
                assert_eq!(Some(vm.block_depth()), pre_loop_depth);
            }
        }

        assert_eq!(pre_loop_depth, Some(1));
        // one restart per completed body
        assert_eq!(iterations, 3);
    }

    #[test]
    fn test_call_with_arguments() {
        let (out, result) = demo_output("add", "");
        result.unwrap();
        assert_eq!(out, "5");
    }

    #[test]
    fn test_array_autovivify() {
        let (out, result) = demo_output("array", "");
        result.unwrap();
        assert_eq!(out, "undefined a [a]");
    }

    #[test]
    fn test_echo_reads_until_q() {
        let (out, result) = demo_output("echo", "hiq");
        result.unwrap();
        assert!(out.ends_with("hi"), "output was {:?}", out);
    }

    #[test]
    fn test_echo_interrupted() {
        let (_, result) = demo_output("echo", "h");
        let err = result.unwrap_err();
        assert!(matches!(err.fault, Fault::Interrupted));
        assert_eq!(err.exit_code(), 130);
    }

    #[test]
    fn test_tictactoe_x_wins() {
        // X: 0 1 2, O: 3 4; O first retries a taken cell and a stray key
        let (out, result) = demo_output("tictactoe", "00z3142");
        result.unwrap();

        assert!(out.contains("It's O's turn\nenter new location: 0\nthat space is already taken\n"));
        assert!(out.contains("z\nNot recognized\n"));
        assert!(out.contains("X | X | X\n"));
        assert!(out.contains("O | O |  \n"));
        assert!(out.ends_with("X Wins\n\n"));
    }

    #[test]
    fn test_tictactoe_column_win_for_o() {
        // X: 0 3 8, O: 1 4 7 (middle column)
        let (out, result) = demo_output("tictactoe", "013487");
        result.unwrap();
        assert!(out.ends_with("O Wins\n\n"));
        assert!(!out.contains("X Wins"));
    }

    #[test]
    fn test_tictactoe_interrupted() {
        let (out, result) = demo_output("tictactoe", "4");
        let err = result.unwrap_err();

        assert!(matches!(err.fault, Fault::Interrupted));
        assert_eq!(err.exit_code(), 130);
        assert!(out.contains("  | X |  \n"));
        assert!(out.ends_with("It's O's turn\nenter new location: "));
    }

    // ============================================================
    // Instruction semantics
    // ============================================================

    #[test]
    fn test_main_result_left_on_stack() {
        let stack = run_ops(vec![Op::PushInteger { value: 42 }, Op::Return]).unwrap();
        assert_eq!(stack, vec![Value::Integer(42)]);
    }

    #[test]
    fn test_return_resolves_reference_into_dying_frame() {
        let a = VariableId(0);
        let b = VariableId(1);
        let prog = program_from_blocks(
            &[("main", 0, vec![]), ("first", 1, vec![a, b])],
            vec![
                (
                    BlockKind::Function,
                    vec![
                        Op::PushInteger { value: 1 },
                        Op::PushInteger { value: 2 },
                        Op::Call {
                            target: "first".to_string(),
                        },
                        Op::Return,
                    ],
                ),
                (
                    BlockKind::Function,
                    vec![
                        Op::AssignVariableDirect { target: b },
                        Op::AssignVariableDirect { target: a },
                        Op::PushVariable { variable: a },
                        Op::Return,
                    ],
                ),
            ],
        );

        let mut vm = vm("");
        vm.run(&prog).unwrap();
        assert_eq!(vm.stack(), &[Value::Integer(1)]);
    }

    #[test]
    fn test_return_leaves_one_value_per_call() {
        let prog = program_from_blocks(
            &[("main", 0, vec![]), ("f", 1, vec![VariableId(0)])],
            vec![
                (
                    BlockKind::Function,
                    vec![
                        Op::PushString {
                            value: "below".to_string(),
                        },
                        Op::PushInteger { value: 7 },
                        Op::Call {
                            target: "f".to_string(),
                        },
                        Op::PushUndefined,
                        Op::Return,
                    ],
                ),
                (
                    BlockKind::Function,
                    vec![
                        Op::AssignVariableDirect {
                            target: VariableId(0),
                        },
                        Op::EnterBlock { block: BlockId(2) },
                        Op::PushUndefined,
                        Op::Return,
                    ],
                ),
                (
                    BlockKind::While,
                    vec![
                        Op::PushBoolean { value: true },
                        Op::BranchEnter { block: BlockId(3) },
                        Op::Continue,
                    ],
                ),
                (
                    BlockKind::If,
                    vec![Op::PushVariable {
                        variable: VariableId(0),
                    }, Op::Return],
                ),
            ],
        );

        let mut vm = vm("");
        vm.start(&prog).unwrap();

        // step through main up to and including the call
        for _ in 0..3 {
            vm.step(&prog).unwrap();
        }
        let depth_at_entry = vm.stack().len() - 1;
        assert_eq!(vm.block_depth(), 2);

        // run until control is back in main
        while vm.block_depth() > 1 {
            vm.step(&prog).unwrap();
        }

        // argument consumed, one resolved value produced
        assert_eq!(vm.stack().len(), depth_at_entry + 1);
        assert_eq!(vm.stack().last(), Some(&Value::Integer(7)));
        assert!(vm.stack().iter().all(|v| !v.is_reference()));
    }

    #[test]
    fn test_assignment_is_an_expression() {
        let mut b = ProgramBuilder::new();
        let x = b.variable("x", Type::Integer);
        let y = b.variable("y", Type::Integer);
        b.add_function(FunctionDecl::new("main").local(&x).local(&y).statements([
            Statement::expr(Expression::assign(&x, Expression::assign(&y, Expression::int(3)))),
            Statement::expr(Expression::write(vec![Expression::var(&x), Expression::var(&y)])),
        ]));

        assert_eq!(output_of(&b.finish()), "33");
    }

    #[test]
    fn test_assign_requires_reference() {
        let prog = program_from_ops(vec![
            Op::PushInteger { value: 1 },
            Op::PushInteger { value: 2 },
            Op::AssignVariable,
            Op::Return,
        ]);
        let err = assert_fault(&prog, |f| matches!(f, Fault::InvalidAssignmentTarget("integer")));
        assert_eq!(err.location.map(|l| l.ip), Some(2));
    }

    #[test]
    fn test_write_pops_k_pushes_undefined() {
        let mut vm = vm("");
        let prog = program_from_ops(vec![
            Op::PushInteger { value: 9 },
            Op::PushString {
                value: "a".to_string(),
            },
            Op::PushInteger { value: 1 },
            Op::PushBoolean { value: true },
            Op::SystemCall {
                call: SystemCallKind::DebugWrite,
                length: 3,
            },
            Op::Return,
        ]);
        vm.run(&prog).unwrap();

        assert_eq!(output(&vm), "a1true");
        assert_eq!(vm.stack(), &[Value::Integer(9), Value::Undefined]);
    }

    #[test]
    fn test_write_underflow() {
        let prog = program_from_ops(vec![
            Op::PushInteger { value: 1 },
            Op::SystemCall {
                call: SystemCallKind::DebugWrite,
                length: 2,
            },
            Op::Return,
        ]);
        assert_fault(&prog, |f| {
            matches!(f, Fault::StackUnderflow { needed: 2, found: 1 })
        });
    }

    #[test]
    fn test_read_pushes_one_char_string() {
        let prog = program_from_ops(vec![
            Op::SystemCall {
                call: SystemCallKind::DebugRead,
                length: 0,
            },
            Op::Return,
        ]);
        let mut vm = vm("xyz");
        vm.run(&prog).unwrap();
        assert_eq!(vm.stack(), &[Value::from("x")]);
    }

    #[test]
    fn test_pop_empty_stack() {
        let prog = program_from_ops(vec![Op::Pop, Op::PushUndefined, Op::Return]);
        assert_fault(&prog, |f| matches!(f, Fault::StackUnderflow { .. }));
    }

    #[test]
    fn test_equality_rules() {
        let eq = |lhs: Op, rhs: Op, op: BinaryOp| {
            run_ops(vec![lhs, rhs, Op::BinaryExpression { op }, Op::Return])
        };
        let s = |v: &str| Op::PushString {
            value: v.to_string(),
        };
        let b = |v: bool| Op::PushBoolean { value: v };

        assert_eq!(eq(s("a"), s("a"), BinaryOp::Equals).unwrap(), vec![Value::Boolean(true)]);
        assert_eq!(eq(s("a"), s("b"), BinaryOp::NotEquals).unwrap(), vec![Value::Boolean(true)]);
        assert_eq!(eq(b(false), b(false), BinaryOp::Equals).unwrap(), vec![Value::Boolean(true)]);
        assert_eq!(eq(b(true), b(false), BinaryOp::Equals).unwrap(), vec![Value::Boolean(false)]);

        let err = eq(s("a"), Op::PushInteger { value: 1 }, BinaryOp::Equals).unwrap_err();
        assert!(matches!(err.fault, Fault::TypeMismatch(_)));
    }

    #[test]
    fn test_arithmetic_and_comparison() {
        let bin = |l: i64, r: i64, op: BinaryOp| {
            run_ops(vec![
                Op::PushInteger { value: l },
                Op::PushInteger { value: r },
                Op::BinaryExpression { op },
                Op::Return,
            ])
            .unwrap()
        };

        assert_eq!(bin(2, 3, BinaryOp::Plus), vec![Value::Integer(5)]);
        assert_eq!(bin(2, 3, BinaryOp::Minus), vec![Value::Integer(-1)]);
        assert_eq!(bin(2, 3, BinaryOp::LesserThan), vec![Value::Boolean(true)]);
        assert_eq!(bin(2, 3, BinaryOp::GreaterThan), vec![Value::Boolean(false)]);
        assert_eq!(bin(i64::MAX, 1, BinaryOp::Plus), vec![Value::Integer(i64::MIN)]);
    }

    #[test]
    fn test_arithmetic_type_mismatch() {
        let result = run_ops(vec![
            Op::PushString {
                value: "1".to_string(),
            },
            Op::PushInteger { value: 1 },
            Op::BinaryExpression { op: BinaryOp::Plus },
            Op::Return,
        ]);
        assert!(matches!(result.unwrap_err().fault, Fault::TypeMismatch(_)));
    }

    #[test]
    fn test_binary_resolves_references() {
        let x = VariableId(0);
        let prog = program_from_blocks(
            &[("main", 0, vec![x])],
            vec![(
                BlockKind::Function,
                vec![
                    Op::PushInteger { value: 40 },
                    Op::PushVariable { variable: x },
                    Op::AssignVariable,
                    Op::PushInteger { value: 2 },
                    Op::BinaryExpression { op: BinaryOp::Plus },
                    Op::Return,
                ],
            )],
        );
        let mut vm = vm("");
        vm.run(&prog).unwrap();
        assert_eq!(vm.stack(), &[Value::Integer(42)]);
    }

    #[test]
    fn test_branch_enter_false_falls_through() {
        let prog = program_from_blocks(
            &[("main", 0, vec![])],
            vec![
                (
                    BlockKind::Function,
                    vec![
                        Op::PushBoolean { value: false },
                        Op::BranchEnter { block: BlockId(1) },
                        Op::PushString {
                            value: "after".to_string(),
                        },
                        Op::Return,
                    ],
                ),
                (
                    BlockKind::If,
                    vec![
                        Op::PushString {
                            value: "inside".to_string(),
                        },
                        Op::Return,
                    ],
                ),
            ],
        );
        let mut vm = vm("");
        vm.run(&prog).unwrap();
        assert_eq!(vm.stack(), &[Value::from("after")]);
    }

    #[test]
    fn test_branch_requires_boolean() {
        let prog = program_from_blocks(
            &[("main", 0, vec![])],
            vec![
                (
                    BlockKind::Function,
                    vec![
                        Op::PushInteger { value: 1 },
                        Op::BranchEnter { block: BlockId(1) },
                        Op::PushUndefined,
                        Op::Return,
                    ],
                ),
                (BlockKind::If, vec![Op::ExitBlock]),
            ],
        );
        let err = assert_fault(&prog, |f| matches!(f, Fault::TypeMismatch(_)));
        let location = err.location.unwrap();
        assert_eq!(location.kind, BlockKind::Function);
        assert_eq!(location.ip, 1);
    }

    #[test]
    fn test_exit_block_resumes_parent() {
        let prog = program_from_blocks(
            &[("main", 0, vec![])],
            vec![
                (
                    BlockKind::Function,
                    vec![
                        Op::PushBoolean { value: true },
                        Op::BranchEnter { block: BlockId(1) },
                        Op::PushString {
                            value: "after".to_string(),
                        },
                        Op::Return,
                    ],
                ),
                (
                    BlockKind::If,
                    vec![
                        Op::PushString {
                            value: "inside".to_string(),
                        },
                        Op::Pop,
                        Op::ExitBlock,
                    ],
                ),
            ],
        );
        let mut vm = vm("");
        vm.run(&prog).unwrap();
        assert_eq!(vm.stack(), &[Value::from("after")]);
    }

    #[test]
    fn test_continue_clears_loop_locals_and_keeps_globals() {
        let g = VariableId(0);
        let t = VariableId(1);
        let mut prog = program_from_blocks(
            &[("main", 0, vec![])],
            vec![
                (
                    BlockKind::Function,
                    vec![Op::EnterBlock { block: BlockId(1) }, Op::PushUndefined, Op::Return],
                ),
                (
                    BlockKind::While,
                    vec![
                        // stop once g has been set
                        Op::PushVariable { variable: g },
                        Op::PushString {
                            value: "done".to_string(),
                        },
                        Op::BinaryExpression {
                            op: BinaryOp::NotEquals,
                        },
                        Op::BranchReturn,
                        Op::PushString {
                            value: "done".to_string(),
                        },
                        Op::PushVariable { variable: g },
                        Op::AssignVariable,
                        Op::Pop,
                        // undeclared anywhere: lands in the while frame
                        Op::PushInteger { value: 5 },
                        Op::PushVariable { variable: t },
                        Op::AssignVariable,
                        Op::Pop,
                        Op::Continue,
                    ],
                ),
            ],
        );
        prog.top_level_variables.push(g);

        let mut vm = vm("");
        vm.start(&prog).unwrap();
        // g starts undefined, which isn't a string: seed it
        vm.globals.insert(g, Value::from("start"));

        loop {
            let at_continue = vm
                .frames()
                .last()
                .and_then(|f| prog.block(f.block).and_then(|b| b.ops.get(f.ip)))
                == Some(&Op::Continue);

            if at_continue {
                let frame = vm.frames().last().unwrap();
                assert_eq!(frame.locals.get(&t), Some(&Value::Integer(5)));

                vm.step(&prog).unwrap();

                let frame = vm.frames().last().unwrap();
                assert_eq!(frame.kind, BlockKind::While);
                assert_eq!(frame.ip, 0);
                assert!(frame.locals.is_empty());
                assert_eq!(vm.globals().get(&g), Some(&Value::from("done")));
                break;
            }
            vm.step(&prog).unwrap();
        }

        while !vm.is_finished() {
            vm.step(&prog).unwrap();
        }
        assert_eq!(vm.globals().get(&g), Some(&Value::from("done")));
    }

    #[test]
    fn test_continue_unwinds_if_frames() {
        let mut b = ProgramBuilder::new();
        let i = b.variable("i", Type::Integer);
        let lt = |v: &crate::lang::Variable, n| {
            Expression::binary(BinaryOp::LesserThan, Expression::var(v), Expression::int(n))
        };
        b.add_function(FunctionDecl::new("main").local(&i).statements([
            Statement::expr(Expression::assign(&i, Expression::int(0))),
            Statement::while_(
                lt(&i, 4),
                vec![
                    Statement::expr(Expression::assign(
                        &i,
                        Expression::binary(BinaryOp::Plus, Expression::var(&i), Expression::int(1)),
                    )),
                    Statement::if_(lt(&i, 3), vec![Statement::Continue]),
                    Statement::expr(Expression::write(vec![Expression::var(&i)])),
                ],
            ),
        ]));

        assert_eq!(output_of(&b.finish()), "34");
    }

    #[test]
    fn test_continue_outside_loop() {
        let prog = program_from_ops(vec![Op::Continue]);
        assert_fault(&prog, |f| {
            matches!(f, Fault::ControlFlow(ControlFlowError::ContinueOutsideLoop))
        });
    }

    #[test]
    fn test_continue_does_not_cross_function() {
        let prog = program_from_blocks(
            &[("main", 0, vec![]), ("f", 2, vec![])],
            vec![
                (
                    BlockKind::Function,
                    vec![Op::EnterBlock { block: BlockId(1) }, Op::PushUndefined, Op::Return],
                ),
                (
                    BlockKind::While,
                    vec![
                        Op::Call {
                            target: "f".to_string(),
                        },
                        Op::Continue,
                    ],
                ),
                (BlockKind::Function, vec![Op::Continue]),
            ],
        );
        assert_fault(&prog, |f| {
            matches!(f, Fault::ControlFlow(ControlFlowError::ContinueOutsideLoop))
        });
    }

    #[test]
    fn test_break_exits_loop() {
        let mut b = ProgramBuilder::new();
        b.add_function(FunctionDecl::new("main").statements([
            Statement::while_(
                Expression::boolean(true),
                vec![
                    Statement::expr(Expression::write(vec![Expression::string("once")])),
                    Statement::Break,
                ],
            ),
            Statement::expr(Expression::write(vec![Expression::string(" after")])),
        ]));

        assert_eq!(output_of(&b.finish()), "once after");
    }

    #[test]
    fn test_break_under_if_frame() {
        let prog = program_from_blocks(
            &[("main", 0, vec![])],
            vec![
                (
                    BlockKind::Function,
                    vec![Op::EnterBlock { block: BlockId(1) }, Op::PushUndefined, Op::Return],
                ),
                (
                    BlockKind::While,
                    vec![
                        Op::PushBoolean { value: true },
                        Op::BranchEnter { block: BlockId(2) },
                        Op::Continue,
                    ],
                ),
                (BlockKind::If, vec![Op::Break]),
            ],
        );
        let err = assert_fault(&prog, |f| {
            matches!(f, Fault::ControlFlow(ControlFlowError::BreakOutsideLoop))
        });
        let location = err.location.unwrap();
        assert_eq!(location.kind, BlockKind::If);
        assert_eq!(location.block, BlockId(2));
        assert_eq!(location.ip, 0);
        assert_eq!(err.trace.len(), 3);
    }

    #[test]
    fn test_return_from_nested_blocks() {
        let mut b = ProgramBuilder::new();
        b.add_function(FunctionDecl::new("pick").statement(Statement::while_(
            Expression::boolean(true),
            vec![Statement::if_(
                Expression::boolean(true),
                vec![Statement::ret(Some(Expression::string("found")))],
            )],
        )));
        b.add_function(FunctionDecl::new("main").statement(Statement::expr(Expression::write(
            vec![Expression::call("pick", vec![])],
        ))));

        assert_eq!(output_of(&b.finish()), "found");
    }

    #[test]
    fn test_return_outside_function() {
        let prog = program_from_blocks(
            &[("main", 0, vec![])],
            vec![(BlockKind::While, vec![Op::PushUndefined, Op::Return])],
        );
        let err = assert_fault(&prog, |f| {
            matches!(f, Fault::ControlFlow(ControlFlowError::ReturnOutsideFunction))
        });

        // the block stack is reported as it was before unwinding
        assert_eq!(err.trace.len(), 1);
        assert_eq!(err.trace[0].kind, BlockKind::While);
        assert_eq!(err.location.map(|l| l.ip), Some(1));
    }

    /// Sink whose every write fails.
    struct BrokenSink;

    impl Write for BrokenSink {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "sink closed"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_write_failure_is_io_fault() {
        let prog = program_from_ops(vec![
            Op::PushString {
                value: "lost".to_string(),
            },
            Op::SystemCall {
                call: SystemCallKind::DebugWrite,
                length: 1,
            },
            Op::Return,
        ]);

        let mut vm = VmBc::new(BrokenSink, NoInput);
        let err = vm.run(&prog).unwrap_err();

        assert!(matches!(&err.fault, Fault::Io(e) if e.kind() == io::ErrorKind::BrokenPipe));
        assert_eq!(err.location.map(|l| l.ip), Some(1));
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn test_end_of_block() {
        let prog = program_from_ops(vec![Op::PushUndefined]);
        let err = assert_fault(&prog, |f| {
            matches!(f, Fault::ControlFlow(ControlFlowError::EndOfBlock))
        });
        assert_eq!(err.location.map(|l| l.ip), Some(1));
    }

    #[test]
    fn test_function_not_found() {
        let prog = program_from_ops(vec![
            Op::Call {
                target: "missing".to_string(),
            },
            Op::Return,
        ]);
        let err = assert_fault(&prog, |f| matches!(f, Fault::FunctionNotFound(name) if name == "missing"));
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn test_missing_main() {
        let prog = program_from_blocks(&[], vec![]);
        let err = assert_fault(&prog, |f| matches!(f, Fault::FunctionNotFound(_)));
        assert!(err.location.is_none());
    }

    #[test]
    fn test_block_not_found() {
        let prog = program_from_ops(vec![Op::EnterBlock { block: BlockId(7) }]);
        assert_fault(&prog, |f| matches!(f, Fault::BlockNotFound(BlockId(7))));
    }

    #[test]
    fn test_undefined_variable() {
        let prog = program_from_ops(vec![
            Op::PushVariable {
                variable: VariableId(3),
            },
            Op::Return,
        ]);
        assert_fault(&prog, |f| matches!(f, Fault::UndefinedVariable(VariableId(3))));
    }

    #[test]
    fn test_callee_cannot_see_caller_locals() {
        let x = VariableId(0);
        let prog = program_from_blocks(
            &[("main", 0, vec![x]), ("peek", 1, vec![])],
            vec![
                (
                    BlockKind::Function,
                    vec![
                        Op::PushInteger { value: 1 },
                        Op::PushVariable { variable: x },
                        Op::AssignVariable,
                        Op::Pop,
                        Op::Call {
                            target: "peek".to_string(),
                        },
                        Op::Return,
                    ],
                ),
                (
                    BlockKind::Function,
                    vec![Op::PushVariable { variable: x }, Op::Return],
                ),
            ],
        );
        assert_fault(&prog, |f| matches!(f, Fault::UndefinedVariable(_)));
    }

    #[test]
    fn test_globals_shared_across_calls() {
        let mut b = ProgramBuilder::new();
        let g = b.global("g", Type::Integer);
        b.add_function(
            FunctionDecl::new("set")
                .statement(Statement::expr(Expression::assign(&g, Expression::int(11)))),
        );
        b.add_function(FunctionDecl::new("main").statements([
            Statement::expr(Expression::call("set", vec![])),
            Statement::expr(Expression::write(vec![Expression::var(&g)])),
        ]));

        assert_eq!(output_of(&b.finish()), "11");
    }

    #[test]
    fn test_recursion_keeps_locals_per_call() {
        // countdown(n): if n > 0 { write n; countdown(n - 1) }
        let mut b = ProgramBuilder::new();
        let n = b.variable("n", Type::Integer);
        b.add_function(FunctionDecl::new("countdown").param(&n).statement(Statement::if_(
            Expression::binary(BinaryOp::GreaterThan, Expression::var(&n), Expression::int(0)),
            vec![
                Statement::expr(Expression::write(vec![Expression::var(&n)])),
                Statement::expr(Expression::call(
                    "countdown",
                    vec![Expression::binary(BinaryOp::Minus, Expression::var(&n), Expression::int(1))],
                )),
                Statement::expr(Expression::write(vec![Expression::var(&n)])),
            ],
        )));
        b.add_function(FunctionDecl::new("main").statement(Statement::expr(Expression::call(
            "countdown",
            vec![Expression::int(3)],
        ))));

        assert_eq!(output_of(&b.finish()), "321123");
    }

    #[test]
    fn test_array_get_unset_index_is_undefined() {
        let arr = VariableId(0);
        let prog = program_from_blocks(
            &[("main", 0, vec![arr])],
            vec![(
                BlockKind::Function,
                vec![
                    Op::PushVariable { variable: arr },
                    Op::PushInteger { value: 4 },
                    Op::ArrayGet,
                    Op::Return,
                ],
            )],
        );
        let mut vm = vm("");
        vm.run(&prog).unwrap();
        assert_eq!(vm.stack(), &[Value::Undefined]);
    }

    #[test]
    fn test_array_set_grows_with_undefined() {
        let arr = VariableId(0);
        let prog = program_from_blocks(
            &[("main", 0, vec![arr])],
            vec![(
                BlockKind::Function,
                vec![
                    Op::PushVariable { variable: arr },
                    Op::PushInteger { value: 2 },
                    Op::PushString {
                        value: "c".to_string(),
                    },
                    Op::ArraySet,
                    Op::Pop,
                    Op::PushVariable { variable: arr },
                    Op::Return,
                ],
            )],
        );
        let mut vm = vm("");
        vm.run(&prog).unwrap();
        assert_eq!(
            vm.stack(),
            &[Value::Array(vec![Value::Undefined, Value::Undefined, Value::from("c")])]
        );
    }

    #[test]
    fn test_array_replaces_non_array_value() {
        let arr = VariableId(0);
        let prog = program_from_blocks(
            &[("main", 0, vec![arr])],
            vec![(
                BlockKind::Function,
                vec![
                    Op::PushInteger { value: 9 },
                    Op::PushVariable { variable: arr },
                    Op::AssignVariable,
                    Op::Pop,
                    Op::PushVariable { variable: arr },
                    Op::PushInteger { value: 0 },
                    Op::ArrayGet,
                    Op::Return,
                ],
            )],
        );
        let mut vm = vm("");
        vm.run(&prog).unwrap();
        assert_eq!(vm.stack(), &[Value::Undefined]);
    }

    #[test]
    fn test_array_negative_index() {
        let prog = program_from_blocks(
            &[("main", 0, vec![VariableId(0)])],
            vec![(
                BlockKind::Function,
                vec![
                    Op::PushVariable {
                        variable: VariableId(0),
                    },
                    Op::PushInteger { value: -1 },
                    Op::ArrayGet,
                    Op::Return,
                ],
            )],
        );
        assert_fault(&prog, |f| matches!(f, Fault::TypeMismatch(_)));
    }

    #[test]
    fn test_array_target_must_be_reference() {
        let prog = program_from_ops(vec![
            Op::PushInteger { value: 1 },
            Op::PushInteger { value: 0 },
            Op::ArrayGet,
            Op::Return,
        ]);
        assert_fault(&prog, |f| matches!(f, Fault::InvalidAssignmentTarget(_)));
    }

    #[test]
    fn test_cyclic_reference() {
        let a = VariableId(0);
        let b = VariableId(1);
        let mut prog = program_from_ops(vec![Op::PushVariable { variable: a }, Op::Return]);
        prog.top_level_variables = vec![a, b];

        let mut vm = vm("");
        vm.start(&prog).unwrap();
        vm.globals.insert(a, Value::VariableRef(b));
        vm.globals.insert(b, Value::VariableRef(a));

        vm.step(&prog).unwrap();
        let err = vm.step(&prog).unwrap_err();
        assert!(matches!(err.fault, Fault::CyclicReference(_)));
    }

    #[test]
    fn test_reference_chain_resolves() {
        let a = VariableId(0);
        let b = VariableId(1);
        let mut prog = program_from_ops(vec![Op::PushVariable { variable: a }, Op::Return]);
        prog.top_level_variables = vec![a, b];

        let mut vm = vm("");
        vm.start(&prog).unwrap();
        vm.globals.insert(a, Value::VariableRef(b));
        vm.globals.insert(b, Value::Integer(8));

        while !vm.is_finished() {
            vm.step(&prog).unwrap();
        }
        assert_eq!(vm.stack(), &[Value::Integer(8)]);
    }

    // ============================================================
    // Limits
    // ============================================================

    #[test]
    fn test_step_limit() {
        let mut b = ProgramBuilder::new();
        b.add_function(
            FunctionDecl::new("main")
                .statement(Statement::while_(Expression::boolean(true), vec![])),
        );
        let bc = generate(&b.finish()).unwrap();

        let config = VmBcConfig {
            max_steps: Some(100),
            ..VmBcConfig::default()
        };
        let mut vm = VmBc::with_config(config, Vec::new(), NoInput);
        let err = vm.run(&bc).unwrap_err();
        assert!(matches!(err.fault, Fault::LimitExceeded { what: "execution step", .. }));
    }

    #[test]
    fn test_block_depth_limit() {
        let mut b = ProgramBuilder::new();
        b.add_function(
            FunctionDecl::new("main")
                .statement(Statement::expr(Expression::call("main", vec![]))),
        );
        let bc = generate(&b.finish()).unwrap();

        let config = VmBcConfig {
            max_block_depth: 16,
            ..VmBcConfig::default()
        };
        let mut vm = VmBc::with_config(config, Vec::new(), NoInput);
        let err = vm.run(&bc).unwrap_err();
        assert!(matches!(err.fault, Fault::LimitExceeded { what: "block depth", limit: 16 }));
        assert_eq!(err.trace.len(), 16);
    }

    #[test]
    fn test_array_length_limit() {
        let config = VmBcConfig {
            max_array_length: 8,
            ..VmBcConfig::default()
        };
        let prog = program_from_blocks(
            &[("main", 0, vec![VariableId(0)])],
            vec![(
                BlockKind::Function,
                vec![
                    Op::PushVariable {
                        variable: VariableId(0),
                    },
                    Op::PushInteger { value: 8 },
                    Op::PushUndefined,
                    Op::ArraySet,
                    Op::Return,
                ],
            )],
        );
        let mut vm = VmBc::with_config(config, Vec::new(), NoInput);
        let err = vm.run(&prog).unwrap_err();
        assert!(matches!(err.fault, Fault::LimitExceeded { what: "array length", .. }));
    }

    #[test]
    fn test_rerun_resets_state() {
        let prog = program_from_ops(vec![Op::PushInteger { value: 1 }, Op::Return]);
        let mut vm = vm("");
        vm.run(&prog).unwrap();
        vm.run(&prog).unwrap();
        assert_eq!(vm.stack(), &[Value::Integer(1)]);
    }
}
