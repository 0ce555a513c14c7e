//! Fully resolved program handed to the generator.
//!
//! Every variable reference is already bound to a [`Variable`] carrying a
//! unique id, and every call names a declared function. The generator does
//! no name resolution of its own.

use serde::{Deserialize, Serialize};

/// Identifier of a variable, unique across a whole program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VariableId(pub u32);

impl std::fmt::Display for VariableId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "%{}", self.0)
    }
}

/// Declared type of a variable. Carried through, never checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Type {
    Integer,
    String,
    Boolean,
    Array,
    Undefined,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variable {
    pub id: VariableId,
    pub name: String,
    pub ty: Type,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    Plus,
    Minus,
    GreaterThan,
    LesserThan,
    Equals,
    NotEquals,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Plus => "+",
            BinaryOp::Minus => "-",
            BinaryOp::GreaterThan => ">",
            BinaryOp::LesserThan => "<",
            BinaryOp::Equals => "==",
            BinaryOp::NotEquals => "!=",
        }
    }
}

/// Primitive provided by the VM itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SystemCallKind {
    /// Write the textual form of every argument to the output sink.
    DebugWrite,
    /// Wait for one character from the input source.
    DebugRead,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Expression {
    Integer {
        value: i64,
    },
    String {
        value: String,
    },
    Boolean {
        value: bool,
    },
    Variable {
        variable: Variable,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expression>,
        rhs: Box<Expression>,
    },
    Assign {
        target: Box<Expression>,
        value: Box<Expression>,
    },
    Call {
        function: String,
        args: Vec<Expression>,
    },
    ArrayGet {
        target: Box<Expression>,
        index: Box<Expression>,
    },
    ArraySet {
        target: Box<Expression>,
        index: Box<Expression>,
        value: Box<Expression>,
    },
    SystemCall {
        call: SystemCallKind,
        args: Vec<Expression>,
    },
}

impl Expression {
    pub fn int(value: i64) -> Self {
        Expression::Integer { value }
    }

    pub fn string(value: impl Into<String>) -> Self {
        Expression::String {
            value: value.into(),
        }
    }

    pub fn boolean(value: bool) -> Self {
        Expression::Boolean { value }
    }

    pub fn var(variable: &Variable) -> Self {
        Expression::Variable {
            variable: variable.clone(),
        }
    }

    pub fn binary(op: BinaryOp, lhs: Expression, rhs: Expression) -> Self {
        Expression::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    pub fn assign(target: &Variable, value: Expression) -> Self {
        Expression::Assign {
            target: Box::new(Expression::var(target)),
            value: Box::new(value),
        }
    }

    pub fn call(function: impl Into<String>, args: Vec<Expression>) -> Self {
        Expression::Call {
            function: function.into(),
            args,
        }
    }

    pub fn array_get(target: &Variable, index: Expression) -> Self {
        Expression::ArrayGet {
            target: Box::new(Expression::var(target)),
            index: Box::new(index),
        }
    }

    pub fn array_set(target: &Variable, index: Expression, value: Expression) -> Self {
        Expression::ArraySet {
            target: Box::new(Expression::var(target)),
            index: Box::new(index),
            value: Box::new(value),
        }
    }

    pub fn write(args: Vec<Expression>) -> Self {
        Expression::SystemCall {
            call: SystemCallKind::DebugWrite,
            args,
        }
    }

    pub fn read() -> Self {
        Expression::SystemCall {
            call: SystemCallKind::DebugRead,
            args: Vec::new(),
        }
    }

    /// Short human-readable name of the expression shape.
    pub fn describe(&self) -> &'static str {
        match self {
            Expression::Integer { .. } => "integer literal",
            Expression::String { .. } => "string literal",
            Expression::Boolean { .. } => "bool literal",
            Expression::Variable { .. } => "variable",
            Expression::Binary { .. } => "binary expression",
            Expression::Assign { .. } => "assignment",
            Expression::Call { .. } => "call",
            Expression::ArrayGet { .. } => "array get",
            Expression::ArraySet { .. } => "array set",
            Expression::SystemCall { .. } => "system call",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Statement {
    Expression {
        expression: Expression,
    },
    If {
        condition: Expression,
        body: Vec<Statement>,
    },
    While {
        condition: Expression,
        body: Vec<Statement>,
    },
    Return {
        value: Option<Expression>,
    },
    Continue,
    Break,
}

impl Statement {
    pub fn expr(expression: Expression) -> Self {
        Statement::Expression { expression }
    }

    pub fn if_(condition: Expression, body: Vec<Statement>) -> Self {
        Statement::If { condition, body }
    }

    pub fn while_(condition: Expression, body: Vec<Statement>) -> Self {
        Statement::While { condition, body }
    }

    pub fn ret(value: Option<Expression>) -> Self {
        Statement::Return { value }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDecl {
    pub name: String,
    /// Parameters in declaration order.
    pub parameters: Vec<Variable>,
    /// Locals in declaration order. May repeat parameters.
    #[serde(default)]
    pub variables: Vec<Variable>,
    pub statements: Vec<Statement>,
}

impl FunctionDecl {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parameters: Vec::new(),
            variables: Vec::new(),
            statements: Vec::new(),
        }
    }

    pub fn param(mut self, variable: &Variable) -> Self {
        self.parameters.push(variable.clone());
        self
    }

    pub fn local(mut self, variable: &Variable) -> Self {
        self.variables.push(variable.clone());
        self
    }

    pub fn statement(mut self, statement: Statement) -> Self {
        self.statements.push(statement);
        self
    }

    pub fn statements(mut self, statements: impl IntoIterator<Item = Statement>) -> Self {
        self.statements.extend(statements);
        self
    }
}

/// A resolved program: top-level variables plus functions in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Program {
    #[serde(default)]
    pub variables: Vec<Variable>,
    pub functions: Vec<FunctionDecl>,
}

impl Program {
    pub fn function(&self, name: &str) -> Option<&FunctionDecl> {
        self.functions.iter().find(|f| f.name == name)
    }
}
