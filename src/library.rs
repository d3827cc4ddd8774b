use crate::functions::{FunctionTable, builtins};
use crate::operators::{self, OperatorTable};

/// Operator and function tables shared by every evaluation in an engine.
///
/// Built once and then only read; evaluation contexts borrow it.
pub struct Library {
    pub operators: OperatorTable,
    pub functions: FunctionTable,
}

impl Library {
    pub fn new(operators: OperatorTable, functions: FunctionTable) -> Self {
        Library {
            operators,
            functions,
        }
    }
}

impl Default for Library {
    /// The standard operators and built-in functions.
    fn default() -> Self {
        Library::new(operators::standard(), builtins::standard())
    }
}
