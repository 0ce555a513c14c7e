use super::program::{FunctionDecl, Program, Type, Variable, VariableId};

/// Assembles a [`Program`], handing out variable ids from its own counter.
#[derive(Debug, Default)]
pub struct ProgramBuilder {
    next_id: u32,
    program: Program,
}

impl ProgramBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a fresh variable. The caller decides where it is declared.
    pub fn variable(&mut self, name: impl Into<String>, ty: Type) -> Variable {
        let id = VariableId(self.next_id);
        self.next_id += 1;
        Variable {
            id,
            name: name.into(),
            ty,
        }
    }

    /// Allocate a variable and declare it at the top level.
    pub fn global(&mut self, name: impl Into<String>, ty: Type) -> Variable {
        let variable = self.variable(name, ty);
        self.program.variables.push(variable.clone());
        variable
    }

    pub fn add_function(&mut self, function: FunctionDecl) -> &mut Self {
        self.program.functions.push(function);
        self
    }

    pub fn finish(self) -> Program {
        self.program
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_unique() {
        let mut b = ProgramBuilder::new();
        let a = b.variable("a", Type::Integer);
        let g = b.global("g", Type::String);
        let c = b.variable("a", Type::Integer);

        assert_ne!(a.id, g.id);
        assert_ne!(a.id, c.id);
        assert_ne!(g.id, c.id);
    }

    #[test]
    fn test_globals_and_functions_recorded_in_order() {
        let mut b = ProgramBuilder::new();
        let g = b.global("g", Type::Integer);
        b.add_function(FunctionDecl::new("main"))
            .add_function(FunctionDecl::new("helper"));

        let program = b.finish();
        assert_eq!(program.variables, vec![g]);
        let names: Vec<_> = program.functions.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["main", "helper"]);
    }
}
