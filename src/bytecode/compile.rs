use std::collections::BTreeMap;

use tracing::debug;

use crate::{
    bytecode::{
        Block, BlockId, BlockKind, FunctionEntry, Op, ProgramBc, compile_error::CompileError,
    },
    lang::{Expression, FunctionDecl, Program, Statement, VariableId},
};

/// What directly encloses the statement being lowered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Nesting {
    Function,
    If,
    While,
}

/// Lowers a resolved [`Program`] into a block-structured [`ProgramBc`].
pub struct Generator {
    /// Block arena, indexed by `BlockId`
    blocks: Vec<Block>,
}

impl Generator {
    pub fn new() -> Self {
        Self { blocks: Vec::new() }
    }

    /// Generate bytecode for every function of `program`.
    ///
    /// Fails on the first construct that can't be lowered; no partial
    /// program is returned.
    pub fn generate(mut self, program: &Program) -> Result<ProgramBc, CompileError> {
        let mut functions = BTreeMap::new();

        for func in &program.functions {
            if functions.contains_key(&func.name) {
                return Err(CompileError::DuplicateFunction {
                    name: func.name.clone(),
                });
            }

            let entry = self.emit_function(func)?;
            functions.insert(func.name.clone(), entry);
        }

        debug!(
            functions = functions.len(),
            blocks = self.blocks.len(),
            "generated bytecode program"
        );

        Ok(ProgramBc {
            top_level_variables: program.variables.iter().map(|v| v.id).collect(),
            functions,
            blocks: self.blocks,
        })
    }

    fn new_block(&mut self, kind: BlockKind) -> BlockId {
        let id = BlockId(self.blocks.len() as u32);
        self.blocks.push(Block::new(id, kind));
        id
    }

    fn emit(&mut self, target: BlockId, op: Op) -> Result<(), CompileError> {
        let block = self
            .blocks
            .get_mut(target.index())
            .ok_or_else(|| CompileError::internal(format!("block {} not found", target)))?;

        block.ops.push(op);
        Ok(())
    }

    fn emit_function(&mut self, func: &FunctionDecl) -> Result<FunctionEntry, CompileError> {
        let block = self.new_block(BlockKind::Function);

        // Arguments arrive left to right, so bind the last parameter first.
        for param in func.parameters.iter().rev() {
            self.emit(block, Op::AssignVariableDirect { target: param.id })?;
        }

        for statement in &func.statements {
            self.emit_statement(block, statement, Nesting::Function)?;
        }

        self.finalize_function(block)?;

        let mut locals: Vec<VariableId> = Vec::new();
        for variable in func.parameters.iter().chain(&func.variables) {
            if !locals.contains(&variable.id) {
                locals.push(variable.id);
            }
        }

        debug!(
            function = %func.name,
            entry = %block,
            locals = locals.len(),
            "generated function"
        );

        Ok(FunctionEntry {
            entry_block: block,
            locals,
        })
    }

    /// Make sure every path out of the function body returns a value.
    fn finalize_function(&mut self, block: BlockId) -> Result<(), CompileError> {
        let ends_with_return = self
            .blocks
            .get(block.index())
            .and_then(|b| b.ops.last())
            .is_some_and(|op| matches!(op, Op::Return));

        if !ends_with_return {
            self.emit(block, Op::PushUndefined)?;
            self.emit(block, Op::Return)?;
        }

        Ok(())
    }

    fn emit_statements(
        &mut self,
        target: BlockId,
        statements: &[Statement],
        nesting: Nesting,
    ) -> Result<(), CompileError> {
        for statement in statements {
            self.emit_statement(target, statement, nesting)?;
        }
        Ok(())
    }

    fn emit_statement(
        &mut self,
        target: BlockId,
        statement: &Statement,
        nesting: Nesting,
    ) -> Result<(), CompileError> {
        match statement {
            Statement::While { condition, body } => {
                let block = self.new_block(BlockKind::While);

                self.emit_expression(block, condition)?;
                self.emit(block, Op::BranchReturn)?;
                self.emit_statements(block, body, Nesting::While)?;
                self.emit(block, Op::Continue)?;

                self.emit(target, Op::EnterBlock { block })?;
            }

            Statement::If { condition, body } => {
                self.emit_expression(target, condition)?;

                let block = self.new_block(BlockKind::If);
                self.emit_statements(block, body, Nesting::If)?;
                self.emit(block, Op::ExitBlock)?;

                self.emit(target, Op::BranchEnter { block })?;
            }

            Statement::Expression { expression } => {
                self.emit_expression(target, expression)?;
                self.emit(target, Op::Pop)?;
            }

            Statement::Return { value } => {
                match value {
                    Some(value) => self.emit_expression(target, value)?,
                    None => self.emit(target, Op::PushUndefined)?,
                }
                self.emit(target, Op::Return)?;
            }

            Statement::Continue => self.emit(target, Op::Continue)?,

            Statement::Break => {
                if nesting != Nesting::While {
                    return Err(CompileError::unsupported_statement(
                        statement,
                        "break may only appear directly in a while body",
                    ));
                }
                self.emit(target, Op::Break)?;
            }
        }

        Ok(())
    }

    fn emit_expression(&mut self, target: BlockId, expr: &Expression) -> Result<(), CompileError> {
        match expr {
            Expression::Integer { value } => self.emit(target, Op::PushInteger { value: *value })?,
            Expression::String { value } => self.emit(
                target,
                Op::PushString {
                    value: value.clone(),
                },
            )?,
            Expression::Boolean { value } => self.emit(target, Op::PushBoolean { value: *value })?,

            // Push the reference, not the value: the consuming instruction
            // decides whether it reads or writes through it.
            Expression::Variable { variable } => self.emit(
                target,
                Op::PushVariable {
                    variable: variable.id,
                },
            )?,

            Expression::Binary { op, lhs, rhs } => {
                self.emit_expression(target, lhs)?;
                self.emit_expression(target, rhs)?;
                self.emit(target, Op::BinaryExpression { op: *op })?;
            }

            Expression::Assign {
                target: assignee,
                value,
            } => {
                let variable = variable_target(assignee, "assignment target")?;
                self.emit_expression(target, value)?;
                self.emit(target, Op::PushVariable { variable })?;
                self.emit(target, Op::AssignVariable)?;
            }

            Expression::Call { function, args } => {
                for arg in args {
                    self.emit_expression(target, arg)?;
                }
                self.emit(
                    target,
                    Op::Call {
                        target: function.clone(),
                    },
                )?;
            }

            Expression::ArrayGet {
                target: array,
                index,
            } => {
                let variable = variable_target(array, "array target")?;
                self.emit(target, Op::PushVariable { variable })?;
                self.emit_expression(target, index)?;
                self.emit(target, Op::ArrayGet)?;
            }

            Expression::ArraySet {
                target: array,
                index,
                value,
            } => {
                let variable = variable_target(array, "array target")?;
                self.emit(target, Op::PushVariable { variable })?;
                self.emit_expression(target, index)?;
                self.emit_expression(target, value)?;
                self.emit(target, Op::ArraySet)?;
            }

            Expression::SystemCall { call, args } => {
                for arg in args {
                    self.emit_expression(target, arg)?;
                }
                self.emit(
                    target,
                    Op::SystemCall {
                        call: *call,
                        length: args.len(),
                    },
                )?;
            }
        }

        Ok(())
    }
}

impl Default for Generator {
    fn default() -> Self {
        Self::new()
    }
}

fn variable_target(expr: &Expression, position: &str) -> Result<VariableId, CompileError> {
    match expr {
        Expression::Variable { variable } => Ok(variable.id),
        other => Err(CompileError::unsupported_expression(other, position)),
    }
}

/// Generate bytecode for `program` with a fresh [`Generator`].
pub fn generate(program: &Program) -> Result<ProgramBc, CompileError> {
    Generator::new().generate(program)
}
