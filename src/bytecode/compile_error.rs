use crate::lang::{Expression, Statement};

#[derive(Debug, Clone, thiserror::Error)]
pub enum CompileError {
    /// A construct the generator doesn't know how to lower
    #[error("compile error: cannot compile {construct}{}", hint_suffix(.hint))]
    UnsupportedConstruct {
        construct: String,
        hint: Option<String>,
    },
    /// Two functions share a name
    #[error("compile error: function '{name}' is declared more than once")]
    DuplicateFunction { name: String },
    /// Internal generator error (shouldn't happen in normal use)
    #[error("compile error: internal error: {0}")]
    Internal(String),
}

fn hint_suffix(hint: &Option<String>) -> String {
    match hint {
        Some(h) => format!("\n  hint: {}", h),
        None => String::new(),
    }
}

impl CompileError {
    /// Create an error for an expression in a position the generator can't lower
    pub fn unsupported_expression(expr: &Expression, position: &str) -> Self {
        CompileError::UnsupportedConstruct {
            construct: format!("{} as {}", expr.describe(), position),
            hint: Some(format!("{} must be a variable", position)),
        }
    }

    /// Create an error for a statement with a custom hint
    pub fn unsupported_statement(statement: &Statement, hint: impl Into<String>) -> Self {
        CompileError::UnsupportedConstruct {
            construct: statement_name(statement).to_string(),
            hint: Some(hint.into()),
        }
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        CompileError::Internal(msg.into())
    }
}

fn statement_name(statement: &Statement) -> &'static str {
    match statement {
        Statement::Expression { .. } => "expression statement",
        Statement::If { .. } => "if",
        Statement::While { .. } => "while",
        Statement::Return { .. } => "return",
        Statement::Continue => "continue",
        Statement::Break => "break",
    }
}
