//! Function registry with overloads and vectorization.
//!
//! A [`Function`] holds any number of overloads, tried in registration
//! order. It may also declare, per arity, argument positions that are
//! vectorized: when one of those holds a list, the function is applied to
//! each element in turn and the results are collected. Vectorization is
//! checked before overload resolution, so an overload taking a list is only
//! reached at positions that are not vectorized.

pub mod builtins;

use std::collections::HashMap;

use crate::{
    evaluator::{EvalContext, EvalError},
    value::{LiteralType, Value},
};

/// Argument type pattern for overloads and operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArgType {
    Any,
    Null,
    Boolean,
    Number,
    String,
    Date,
    Duration,
    Link,
    Array,
    Object,
    Widget,
}

impl ArgType {
    pub fn of(value: &Value) -> ArgType {
        match value.literal_type() {
            LiteralType::Null => ArgType::Null,
            LiteralType::Boolean => ArgType::Boolean,
            LiteralType::Number => ArgType::Number,
            LiteralType::String => ArgType::String,
            LiteralType::Date => ArgType::Date,
            LiteralType::Duration => ArgType::Duration,
            LiteralType::Link => ArgType::Link,
            LiteralType::Array => ArgType::Array,
            LiteralType::Object => ArgType::Object,
            LiteralType::Widget => ArgType::Widget,
        }
    }

    pub fn matches(self, value: &Value) -> bool {
        self == ArgType::Any || self == ArgType::of(value)
    }
}

pub type FunctionImpl = fn(&EvalContext<'_>, &[Value]) -> Result<Value, EvalError>;

#[derive(Debug, Clone, PartialEq)]
pub enum Signature {
    /// Exactly these argument types
    Fixed(Vec<ArgType>),
    /// Any number of arguments of any type
    Variadic,
}

impl Signature {
    fn accepts(&self, args: &[Value]) -> bool {
        match self {
            Signature::Fixed(types) => {
                types.len() == args.len()
                    && types.iter().zip(args).all(|(ty, arg)| ty.matches(arg))
            }
            Signature::Variadic => true,
        }
    }
}

#[derive(Clone)]
pub struct Function {
    name: String,
    overloads: Vec<(Signature, FunctionImpl)>,
    vectorized: HashMap<usize, Vec<usize>>,
}

impl Function {
    pub fn builder(name: impl Into<String>) -> FunctionBuilder {
        FunctionBuilder {
            function: Function {
                name: name.into(),
                overloads: Vec::new(),
                vectorized: HashMap::new(),
            },
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn invoke(&self, ctx: &EvalContext<'_>, args: &[Value]) -> Result<Value, EvalError> {
        if let Some(positions) = self.vectorized.get(&args.len())
            && let Some(&position) = positions.iter().find(|&&p| args[p].is_array())
            && let Value::Array(items) = &args[position]
        {
            let mut results = Vec::with_capacity(items.len());
            for item in items {
                let mut call = args.to_vec();
                call[position] = item.clone();
                results.push(self.invoke(ctx, &call)?);
            }
            return Ok(Value::Array(results));
        }

        for (signature, implementation) in &self.overloads {
            if signature.accepts(args) {
                return implementation(ctx, args);
            }
        }

        Err(EvalError::NoImplementation {
            name: self.name.clone(),
            types: args.iter().map(|arg| arg.type_name().to_string()).collect(),
        })
    }
}

pub struct FunctionBuilder {
    function: Function,
}

impl FunctionBuilder {
    /// Adds an overload for exactly these argument types.
    pub fn add(mut self, args: &[ArgType], implementation: FunctionImpl) -> Self {
        self.function
            .overloads
            .push((Signature::Fixed(args.to_vec()), implementation));
        self
    }

    /// Adds an overload accepting any arguments.
    pub fn vararg(mut self, implementation: FunctionImpl) -> Self {
        self.function
            .overloads
            .push((Signature::Variadic, implementation));
        self
    }

    /// Vectorizes `positions` for calls with `arity` arguments.
    pub fn vectorize(mut self, arity: usize, positions: &[usize]) -> Self {
        let positions = positions.iter().copied().filter(|&p| p < arity).collect();
        self.function.vectorized.insert(arity, positions);
        self
    }

    pub fn build(self) -> Function {
        self.function
    }
}

#[derive(Clone, Default)]
pub struct FunctionTable {
    functions: HashMap<String, Function>,
}

impl FunctionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, function: Function) -> &mut Self {
        self.functions.insert(function.name.clone(), function);
        self
    }

    /// Makes an existing function available under another name.
    pub fn alias(&mut self, alias: &str, name: &str) -> &mut Self {
        if let Some(function) = self.functions.get(name) {
            let mut copy = function.clone();
            copy.name = alias.to_string();
            self.functions.insert(alias.to_string(), copy);
        }
        self
    }

    /// Looks a function up, falling back to its lower-case name.
    pub fn get(&self, name: &str) -> Option<&Function> {
        self.functions
            .get(name)
            .or_else(|| self.functions.get(&name.to_lowercase()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Sorted names of every registered function.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.functions.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn call(
        &self,
        name: &str,
        args: &[Value],
        ctx: &EvalContext<'_>,
    ) -> Result<Value, EvalError> {
        match self.get(name) {
            Some(function) => function.invoke(ctx, args),
            None => Err(EvalError::UnknownFunction(name.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::NoLinks;
    use crate::library::Library;
    use crate::operators;
    use crate::settings::QuerySettings;

    fn first(_: &EvalContext<'_>, args: &[Value]) -> Result<Value, EvalError> {
        Ok(Value::from(format!("scalar:{}", args[0])))
    }

    fn whole(_: &EvalContext<'_>, _: &[Value]) -> Result<Value, EvalError> {
        Ok(Value::from("list"))
    }

    #[test]
    fn test_vectorization_precedes_overloads() {
        let mut table = FunctionTable::new();
        table.register(
            Function::builder("describe")
                .add(&[ArgType::Array], whole)
                .add(&[ArgType::Any], first)
                .vectorize(1, &[0])
                .build(),
        );
        let library = Library::new(operators::standard(), table);
        let settings = QuerySettings::default();
        let ctx = EvalContext::new(&NoLinks, &library, &settings);

        let result = ctx
            .call("describe", &[Value::Array(vec![Value::Number(1.0), Value::Number(2.0)])])
            .unwrap();
        assert_eq!(
            result,
            Value::Array(vec![Value::from("scalar:1"), Value::from("scalar:2")])
        );
    }

    #[test]
    fn test_no_matching_overload() {
        let library = Library::default();
        let settings = QuerySettings::default();
        let ctx = EvalContext::new(&NoLinks, &library, &settings);

        let err = ctx.call("lower", &[Value::Number(1.0)]).unwrap_err();
        assert!(matches!(err, EvalError::NoImplementation { .. }));
        assert_eq!(
            ctx.call("nope", &[]).unwrap_err(),
            EvalError::UnknownFunction("nope".to_string())
        );
    }
}
