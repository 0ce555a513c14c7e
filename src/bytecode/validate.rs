use crate::bytecode::{Block, BlockId, BlockKind, Op, ProgramBc};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("validation error in block {block}{}: {message}", ip_suffix(.ip))]
pub struct ValidationError {
    pub block: BlockId,
    pub ip: Option<usize>,
    pub message: String,
}

fn ip_suffix(ip: &Option<usize>) -> String {
    match ip {
        Some(ip) => format!(" at ip={}", ip),
        None => String::new(),
    }
}

impl ValidationError {
    fn new(block: BlockId, ip: Option<usize>, message: impl Into<String>) -> Self {
        Self {
            block,
            ip,
            message: message.into(),
        }
    }
}

/// Returns (pops, pushes) for an op, or None if effect is unknown/dynamic.
fn effect(op: &Op) -> Option<(usize, usize)> {
    use Op::*;
    Some(match op {
        PushString { .. } | PushInteger { .. } | PushBoolean { .. } | PushUndefined => (0, 1),
        PushVariable { .. } => (0, 1),

        Pop => (1, 0),

        AssignVariable => (2, 1),
        AssignVariableDirect { .. } => (1, 0),

        BinaryExpression { .. } => (2, 1),
        ArrayGet => (2, 1),
        ArraySet => (3, 1),

        SystemCall { length, .. } => (*length, 1),

        EnterBlock { .. } | ExitBlock => (0, 0),
        BranchEnter { .. } | BranchReturn => (1, 0),

        Return => (1, 1),
        Continue | Break => (0, 0),

        // Pops the callee's parameter count, which the artifact doesn't record
        Call { .. } => return None,
    })
}

/// Check the static structure of a bytecode program.
///
/// Catches everything the VM would otherwise only report as a runtime
/// fault: dangling block or function references, blocks of the wrong kind
/// at a reference site, a `break` that isn't directly in a while block,
/// blocks that can run off their end, and obvious operand underflow.
pub fn validate(prog: &ProgramBc) -> Result<(), ValidationError> {
    for (i, block) in prog.blocks.iter().enumerate() {
        if block.id.index() != i {
            return Err(ValidationError::new(
                block.id,
                None,
                format!("block stored at position {}", i),
            ));
        }
    }

    if prog.function("main").is_none() {
        return Err(ValidationError::new(
            BlockId(0),
            None,
            "program has no 'main' function",
        ));
    }

    for (name, entry) in &prog.functions {
        match prog.block(entry.entry_block) {
            Some(block) if block.kind == BlockKind::Function => {}
            Some(block) => {
                return Err(ValidationError::new(
                    block.id,
                    None,
                    format!("entry block of '{}' is a {} block", name, block.kind),
                ));
            }
            None => {
                return Err(ValidationError::new(
                    entry.entry_block,
                    None,
                    format!("entry block of '{}' does not exist", name),
                ));
            }
        }
    }

    let main_entry = prog.function("main").map(|entry| entry.entry_block);

    for block in &prog.blocks {
        check_references(prog, block)?;
        check_terminated(block)?;
        check_stack_effects(block, Some(block.id) == main_entry)?;
    }

    Ok(())
}

fn check_references(prog: &ProgramBc, block: &Block) -> Result<(), ValidationError> {
    for (ip, op) in block.ops.iter().enumerate() {
        let expected = match op {
            Op::EnterBlock { .. } => Some(BlockKind::While),
            Op::BranchEnter { .. } => Some(BlockKind::If),
            _ => None,
        };

        if let (Some(expected), Some(target)) = (expected, op.block_target()) {
            match prog.block(target) {
                Some(t) if t.kind == expected => {}
                Some(t) => {
                    return Err(ValidationError::new(
                        block.id,
                        Some(ip),
                        format!("{:?} targets {} block {}", op, t.kind, target),
                    ));
                }
                None => {
                    return Err(ValidationError::new(
                        block.id,
                        Some(ip),
                        format!("block {} does not exist", target),
                    ));
                }
            }
        }

        match op {
            Op::Call { target } if prog.function(target).is_none() => {
                return Err(ValidationError::new(
                    block.id,
                    Some(ip),
                    format!("call to unknown function '{}'", target),
                ));
            }
            Op::Break | Op::BranchReturn if block.kind != BlockKind::While => {
                return Err(ValidationError::new(
                    block.id,
                    Some(ip),
                    format!("{:?} in a {} block", op, block.kind),
                ));
            }
            Op::ExitBlock if block.kind != BlockKind::If => {
                return Err(ValidationError::new(
                    block.id,
                    Some(ip),
                    format!("{:?} in a {} block", op, block.kind),
                ));
            }
            _ => {}
        }
    }

    Ok(())
}

fn check_terminated(block: &Block) -> Result<(), ValidationError> {
    let last = match block.ops.last() {
        Some(op) if op.is_terminator() => op,
        _ => {
            return Err(ValidationError::new(
                block.id,
                None,
                "block does not end in return, exitBlock, continue or break",
            ));
        }
    };

    let allowed = match block.kind {
        BlockKind::Function => matches!(last, Op::Return),
        BlockKind::If => matches!(last, Op::ExitBlock | Op::Return | Op::Continue),
        BlockKind::While => matches!(last, Op::Continue | Op::Break | Op::Return),
    };

    if !allowed {
        return Err(ValidationError::new(
            block.id,
            Some(block.ops.len() - 1),
            format!("{} block cannot end in {:?}", block.kind, last),
        ));
    }
    Ok(())
}

/// Linear operand-stack check within one block.
///
/// A function block starts with one operand per leading parameter binding,
/// except `main`, which is entered with no arguments. Nested blocks start
/// balanced. Like any linear scan this doesn't follow control flow, and it
/// stops at the first `call`.
fn check_stack_effects(block: &Block, is_main: bool) -> Result<(), ValidationError> {
    let mut height = match block.kind {
        BlockKind::Function if is_main => 0,
        BlockKind::Function => block
            .ops
            .iter()
            .take_while(|op| matches!(op, Op::AssignVariableDirect { .. }))
            .count(),
        BlockKind::If | BlockKind::While => 0,
    };

    for (ip, op) in block.ops.iter().enumerate() {
        let Some((pops, pushes)) = effect(op) else {
            return Ok(());
        };

        if pops > height {
            return Err(ValidationError::new(
                block.id,
                Some(ip),
                format!("stack underflow, op={:?} needs {} items", op, pops),
            ));
        }
        height = height - pops + pushes;
    }

    Ok(())
}
