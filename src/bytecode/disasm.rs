use crate::bytecode::{Block, Op, ProgramBc};
use std::fmt::Write;

/// Print disassembly of a bytecode program to stdout
pub fn print_bc(bc: &ProgramBc) {
    print!("{}", disassemble(bc));
}

/// Render a bytecode program as text: function table, then every block
pub fn disassemble(bc: &ProgramBc) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "=== BYTECODE PROGRAM ===\n");

    if !bc.top_level_variables.is_empty() {
        let globals: Vec<String> = bc.top_level_variables.iter().map(|v| v.to_string()).collect();
        let _ = writeln!(out, "globals: {}", globals.join(" "));
    }

    // BTreeMap keeps the function table sorted by name
    for (name, entry) in &bc.functions {
        let locals: Vec<String> = entry.locals.iter().map(|v| v.to_string()).collect();
        let _ = writeln!(
            out,
            "fn {:<16} entry {}  locals [{}]",
            name,
            entry.entry_block,
            locals.join(" ")
        );
    }
    let _ = writeln!(out);

    for block in &bc.blocks {
        write_block(&mut out, bc, block);
    }

    out
}

fn write_block(out: &mut String, bc: &ProgramBc, block: &Block) {
    let _ = writeln!(out, "════════════════════════════════════════");
    let _ = writeln!(
        out,
        " block {} ({}) — {} instructions",
        block.id,
        block.kind,
        block.ops.len()
    );
    let _ = writeln!(out, "════════════════════════════════════════");

    for (ip, op) in block.ops.iter().enumerate() {
        let _ = writeln!(out, "{:04}  {}", ip, format_op(bc, op));
    }
    let _ = writeln!(out);
}

fn format_op(bc: &ProgramBc, op: &Op) -> String {
    match op {
        // Literals
        Op::PushString { value } => format!("PUSH_STR    {:?}", value),
        Op::PushInteger { value } => format!("PUSH_INT    {}", value),
        Op::PushBoolean { value } => format!("PUSH_BOOL   {}", value),
        Op::PushUndefined => "PUSH_UNDEF".to_string(),
        Op::PushVariable { variable } => format!("PUSH_VAR    {}    ; ( -- &{} )", variable, variable),

        Op::Pop => "POP".to_string(),

        // Variables
        Op::AssignVariable => "ASSIGN      ; ( value &x -- value )".to_string(),
        Op::AssignVariableDirect { target } => format!("BIND        {}", target),

        // Expressions
        Op::BinaryExpression { op } => format!("BINARY      {}", op.symbol()),
        Op::ArrayGet => "ARRAY_GET   ; ( &arr index -- element )".to_string(),
        Op::ArraySet => "ARRAY_SET   ; ( &arr index value -- undefined )".to_string(),

        // Calls
        Op::Call { target } => match bc.function(target) {
            Some(entry) => format!("CALL        {} (→ {})", target, entry.entry_block),
            None => format!("CALL        {} (→ ???)", target),
        },
        Op::SystemCall { call, length } => format!("SYSCALL     {:?}/{}", call, length),

        // Control flow
        Op::EnterBlock { block } => format!("ENTER       {}", block_ref(bc, *block)),
        Op::ExitBlock => "EXIT".to_string(),
        Op::BranchEnter { block } => format!("BRANCH_ENTER {}", block_ref(bc, *block)),
        Op::BranchReturn => "BRANCH_RET  ; exit block if false".to_string(),
        Op::Return => "RETURN".to_string(),
        Op::Continue => "CONTINUE".to_string(),
        Op::Break => "BREAK".to_string(),
    }
}

fn block_ref(bc: &ProgramBc, id: crate::bytecode::BlockId) -> String {
    match bc.block(id) {
        Some(block) => format!("{} ({})", id, block.kind),
        None => format!("{} (missing)", id),
    }
}
