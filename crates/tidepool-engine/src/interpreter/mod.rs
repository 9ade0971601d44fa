//! Tree-walking interpreter.
//!
//! Statements execute directly over the AST. Control flow that leaves a
//! statement early (`return`, `break`, `continue`) is reported through
//! [`Completion`]; exceptions travel as `Err` values.

use std::rc::Rc;

use crate::ast::*;
use crate::runtime::object::{Object, ObjectKind, ObjectRef};
use crate::runtime::scope::Scope;
use crate::runtime::value::{Value, number_to_string};
use crate::runtime::{Callable, Function};
use crate::{Engine, Error, ErrorKind, Result, stack_exhausted};

/// How a statement finished.
#[derive(Debug)]
pub enum Completion {
    /// Fell through to the next statement
    Normal,
    /// Executed `return`
    Return(Value),
    /// Executed `break`
    Break,
    /// Executed `continue`
    Continue,
}

impl Engine {
    pub(crate) fn run_program(&self, program: &Program, scope: &Rc<Scope>) -> Result<Value> {
        for name in &program.var_names {
            scope.declare_var(name);
        }
        self.hoist_functions(&program.body, scope);

        let mut last = Value::Undefined;
        for statement in &program.body {
            match statement {
                Statement::Expression(expr) => last = self.eval(expr, scope)?,
                other => {
                    if let Completion::Return(_) = self.exec_statement(other, scope)? {
                        return Err(Error::SyntaxError(
                            "Illegal return statement".to_string(),
                        ));
                    }
                }
            }
        }
        Ok(last)
    }

    /// Calls `callee` with the given `this` value and arguments.
    pub fn call(&self, callee: &Value, this: Value, args: &[Value]) -> Result<Value> {
        let function = match callee {
            Value::Object(object) => match &object.borrow().kind {
                ObjectKind::Function(function) => function.clone(),
                _ => return Err(not_a_function(callee)),
            },
            _ => return Err(not_a_function(callee)),
        };

        self.stack.enter(|| {
            let depth = self.depth.get();
            if depth >= self.max_call_depth.get() {
                return Err(stack_exhausted());
            }
            self.check_stack()?;
            self.depth.set(depth + 1);
            let result = self.invoke(&function, this, args);
            self.depth.set(depth);
            result
        })
    }

    fn invoke(&self, function: &Function, this: Value, args: &[Value]) -> Result<Value> {
        match &function.callable {
            Callable::Native(native) => native(self, this, args),
            Callable::Script { body, scope } => {
                let this = if body.is_arrow { None } else { Some(this) };
                let local = Scope::function(scope.clone(), this);

                for (i, param) in body.params.iter().enumerate() {
                    let value = args.get(i).cloned().unwrap_or_default();
                    local.declare(param, value, true);
                }
                if !body.is_arrow && !body.params.iter().any(|p| p == "arguments") {
                    let arguments = self.new_array(args.to_vec());
                    local.declare("arguments", Value::Object(arguments), true);
                }
                for name in &body.var_names {
                    local.declare_var(name);
                }
                self.hoist_functions(&body.body, &local);

                match self.exec_statements(&body.body, &local)? {
                    Completion::Return(value) => Ok(value),
                    _ => Ok(Value::Undefined),
                }
            }
        }
    }

    /// Calls `callee` as a constructor.
    pub fn construct(&self, callee: &Value, args: &[Value]) -> Result<Value> {
        let Some(constructor) = callee.as_object().filter(|o| o.is_function()) else {
            return Err(Error::TypeError(format!("{} is not a constructor", callee)));
        };
        if let ObjectKind::Function(Function {
            callable: Callable::Script { body, .. },
            ..
        }) = &constructor.borrow().kind
        {
            if body.is_arrow {
                return Err(Error::TypeError(format!(
                    "{} is not a constructor",
                    body.name.as_deref().unwrap_or("anonymous")
                )));
            }
        }

        let prototype = match constructor.get("prototype") {
            Value::Object(prototype) => prototype,
            _ => self.intrinsics().object_prototype.clone(),
        };
        let this = ObjectRef::new(Object::new(ObjectKind::Ordinary, Some(prototype)));
        let result = self.call(callee, Value::Object(this.clone()), args)?;
        match result {
            Value::Object(_) => Ok(result),
            _ => Ok(Value::Object(this)),
        }
    }

    /// Turns any error into the value a `catch` clause receives.
    pub fn error_to_value(&self, err: Error) -> Value {
        let (kind, message) = match err {
            Error::Thrown(value) => return value,
            Error::SyntaxError(msg) => (ErrorKind::SyntaxError, msg),
            Error::TypeError(msg) => (ErrorKind::TypeError, msg),
            Error::ReferenceError(msg) => (ErrorKind::ReferenceError, msg),
            Error::RangeError(msg) => (ErrorKind::RangeError, msg),
            Error::Host(err) => (ErrorKind::Error, err.to_string()),
        };
        Value::Object(self.new_error(kind, &message))
    }

    /// Reads a property from any value, boxing primitives as needed.
    pub fn get_property(&self, target: &Value, key: &str) -> Result<Value> {
        let intrinsics = self.intrinsics();
        match target {
            Value::Undefined | Value::Null => Err(Error::TypeError(format!(
                "Cannot read properties of {} (reading '{}')",
                target, key
            ))),
            Value::Object(object) => Ok(object.get(key)),
            Value::String(s) => {
                if key == "length" {
                    return Ok(Value::Number(s.chars().count() as f64));
                }
                if let Ok(index) = key.parse::<usize>() {
                    return Ok(s
                        .chars()
                        .nth(index)
                        .map(|c| Value::from(c.to_string()))
                        .unwrap_or_default());
                }
                Ok(intrinsics.string_prototype.get(key))
            }
            Value::Number(_) => Ok(intrinsics.number_prototype.get(key)),
            Value::Boolean(_) => Ok(intrinsics.boolean_prototype.get(key)),
        }
    }

    fn set_property(&self, target: &Value, key: String, value: Value) -> Result<()> {
        match target {
            Value::Undefined | Value::Null => Err(Error::TypeError(format!(
                "Cannot set properties of {} (setting '{}')",
                target, key
            ))),
            Value::Object(object) => {
                object.set(key, value);
                Ok(())
            }
            // Writes to primitives are silently dropped
            _ => Ok(()),
        }
    }

    /// Converts a value to a primitive, consulting `valueOf` and then
    /// `toString` on objects.
    pub fn to_primitive(&self, value: &Value) -> Result<Value> {
        let Value::Object(object) = value else {
            return Ok(value.clone());
        };
        for method in ["valueOf", "toString"] {
            let function = object.get(method);
            if function.is_function() {
                let result = self.call(&function, value.clone(), &[])?;
                if !matches!(result, Value::Object(_)) {
                    return Ok(result);
                }
            }
        }
        Err(Error::TypeError(
            "Cannot convert object to primitive value".to_string(),
        ))
    }

    /// Converts a value to a string (ToString), calling script-defined
    /// `toString` methods on objects.
    pub fn to_js_string(&self, value: &Value) -> Result<Rc<str>> {
        match value {
            Value::String(s) => Ok(s.clone()),
            Value::Object(_) => {
                let primitive = self.to_primitive(value)?;
                self.to_js_string(&primitive)
            }
            other => Ok(Rc::from(other.to_string())),
        }
    }

    /// Converts a value to a number (ToNumber).
    pub fn to_js_number(&self, value: &Value) -> Result<f64> {
        match value {
            Value::Object(_) => Ok(self.to_primitive(value)?.to_number()),
            other => Ok(other.to_number()),
        }
    }

    fn make_closure(&self, body: &Rc<FunctionBody>, scope: &Rc<Scope>) -> ObjectRef {
        let intrinsics = self.intrinsics();
        let name = body.name.as_deref().unwrap_or("");
        let function = Function {
            name: Rc::from(name),
            callable: Callable::Script {
                body: body.clone(),
                scope: scope.clone(),
            },
        };
        let object = ObjectRef::new(Object::new(
            ObjectKind::Function(function),
            Some(intrinsics.function_prototype.clone()),
        ));
        object.define_hidden("name", Value::from(name));
        object.define_hidden("length", Value::Number(body.params.len() as f64));

        if !body.is_arrow {
            let prototype = self.new_object();
            prototype.define_hidden("constructor", Value::Object(object.clone()));
            object.define_hidden("prototype", Value::Object(prototype));
        }
        object
    }

    fn hoist_functions(&self, body: &[Statement], scope: &Rc<Scope>) {
        for statement in body {
            if let Statement::FunctionDeclaration(function) = statement {
                if let Some(name) = &function.name {
                    let closure = self.make_closure(function, scope);
                    scope.declare(name, Value::Object(closure), true);
                }
            }
        }
    }

    // ========================================================================
    // Statements
    // ========================================================================

    fn exec_statements(&self, body: &[Statement], scope: &Rc<Scope>) -> Result<Completion> {
        for statement in body {
            match self.exec_statement(statement, scope)? {
                Completion::Normal => {}
                other => return Ok(other),
            }
        }
        Ok(Completion::Normal)
    }

    fn exec_block(&self, body: &[Statement], scope: &Rc<Scope>) -> Result<Completion> {
        let block = Scope::block(scope.clone());
        self.hoist_functions(body, &block);
        self.exec_statements(body, &block)
    }

    fn exec_statement(&self, statement: &Statement, scope: &Rc<Scope>) -> Result<Completion> {
        self.check_stack()?;
        match statement {
            Statement::VariableDeclaration(decl) => {
                self.exec_declaration(decl, scope)?;
                Ok(Completion::Normal)
            }
            // Hoisted on entry to the enclosing body
            Statement::FunctionDeclaration(_) => Ok(Completion::Normal),
            Statement::Expression(expr) => {
                self.eval(expr, scope)?;
                Ok(Completion::Normal)
            }
            Statement::Block(body) => self.exec_block(body, scope),
            Statement::If {
                test,
                consequent,
                alternate,
            } => {
                if self.eval(test, scope)?.to_boolean() {
                    self.exec_statement(consequent, scope)
                } else if let Some(alternate) = alternate {
                    self.exec_statement(alternate, scope)
                } else {
                    Ok(Completion::Normal)
                }
            }
            Statement::While { test, body } => {
                while self.eval(test, scope)?.to_boolean() {
                    match self.exec_statement(body, scope)? {
                        Completion::Break => break,
                        Completion::Return(value) => return Ok(Completion::Return(value)),
                        Completion::Normal | Completion::Continue => {}
                    }
                }
                Ok(Completion::Normal)
            }
            Statement::DoWhile { body, test } => {
                loop {
                    match self.exec_statement(body, scope)? {
                        Completion::Break => break,
                        Completion::Return(value) => return Ok(Completion::Return(value)),
                        Completion::Normal | Completion::Continue => {}
                    }
                    if !self.eval(test, scope)?.to_boolean() {
                        break;
                    }
                }
                Ok(Completion::Normal)
            }
            Statement::For(stmt) => self.exec_for(stmt, scope),
            Statement::ForIn(stmt) => self.exec_for_in(stmt, scope),
            Statement::Return(argument) => {
                let value = match argument {
                    Some(expr) => self.eval(expr, scope)?,
                    None => Value::Undefined,
                };
                Ok(Completion::Return(value))
            }
            Statement::Break => Ok(Completion::Break),
            Statement::Continue => Ok(Completion::Continue),
            Statement::Throw(argument) => Err(Error::Thrown(self.eval(argument, scope)?)),
            Statement::Try(stmt) => self.exec_try(stmt, scope),
            Statement::Empty => Ok(Completion::Normal),
        }
    }

    fn exec_declaration(&self, decl: &VariableDeclaration, scope: &Rc<Scope>) -> Result<()> {
        for (name, init) in &decl.declarations {
            match decl.kind {
                VariableKind::Var => {
                    if let Some(init) = init {
                        let value = self.eval_named(init, name, scope)?;
                        scope.assign(name, value)?;
                    }
                }
                VariableKind::Let | VariableKind::Const => {
                    let value = match init {
                        Some(init) => self.eval_named(init, name, scope)?,
                        None => Value::Undefined,
                    };
                    scope.declare(name, value, decl.kind == VariableKind::Let);
                }
            }
        }
        Ok(())
    }

    fn exec_for(&self, stmt: &ForStatement, scope: &Rc<Scope>) -> Result<Completion> {
        let mut iteration = Scope::block(scope.clone());

        // `let` bindings get a fresh copy per iteration so closures capture
        // the value of that iteration
        let mut per_iteration = Vec::new();
        match &stmt.init {
            Some(ForInit::Declaration(decl)) => {
                self.exec_declaration(decl, &iteration)?;
                if decl.kind == VariableKind::Let {
                    per_iteration.extend(decl.declarations.iter().map(|(name, _)| name.clone()));
                }
            }
            Some(ForInit::Expression(expr)) => {
                self.eval(expr, &iteration)?;
            }
            None => {}
        }

        loop {
            if let Some(test) = &stmt.test {
                if !self.eval(test, &iteration)?.to_boolean() {
                    break;
                }
            }

            match self.exec_statement(&stmt.body, &iteration)? {
                Completion::Break => break,
                Completion::Return(value) => return Ok(Completion::Return(value)),
                Completion::Normal | Completion::Continue => {}
            }

            if !per_iteration.is_empty() {
                let next = Scope::block(scope.clone());
                for name in &per_iteration {
                    next.declare(name, iteration.lookup(name).unwrap_or_default(), true);
                }
                iteration = next;
            }

            if let Some(update) = &stmt.update {
                self.eval(update, &iteration)?;
            }
        }

        Ok(Completion::Normal)
    }

    fn exec_for_in(&self, stmt: &ForInStatement, scope: &Rc<Scope>) -> Result<Completion> {
        let keys = match self.eval(&stmt.right, scope)? {
            Value::Object(object) => enumerable_keys(&object),
            Value::String(s) => (0..s.chars().count()).map(|i| i.to_string()).collect(),
            _ => Vec::new(),
        };

        for key in keys {
            let body_scope = Scope::block(scope.clone());
            match stmt.kind {
                Some(VariableKind::Let) => body_scope.declare(&stmt.name, Value::from(key), true),
                Some(VariableKind::Const) => {
                    body_scope.declare(&stmt.name, Value::from(key), false)
                }
                Some(VariableKind::Var) | None => scope.assign(&stmt.name, Value::from(key))?,
            }

            match self.exec_statement(&stmt.body, &body_scope)? {
                Completion::Break => break,
                Completion::Return(value) => return Ok(Completion::Return(value)),
                Completion::Normal | Completion::Continue => {}
            }
        }

        Ok(Completion::Normal)
    }

    fn exec_try(&self, stmt: &TryStatement, scope: &Rc<Scope>) -> Result<Completion> {
        let result = match (self.exec_block(&stmt.block, scope), &stmt.handler) {
            (Err(err), Some((param, handler))) => {
                let catch_scope = Scope::block(scope.clone());
                if let Some(param) = param {
                    catch_scope.declare(param, self.error_to_value(err), true);
                }
                self.exec_block(handler, &catch_scope)
            }
            (result, _) => result,
        };

        if let Some(finalizer) = &stmt.finalizer {
            match self.exec_block(finalizer, scope)? {
                Completion::Normal => {}
                // An abrupt finally overrides the try/catch outcome
                other => return Ok(other),
            }
        }

        result
    }

    // ========================================================================
    // Expressions
    // ========================================================================

    /// Evaluates an initializer, naming anonymous functions after their
    /// binding.
    fn eval_named(&self, expr: &Expression, name: &str, scope: &Rc<Scope>) -> Result<Value> {
        let value = self.eval(expr, scope)?;
        if let (Expression::Function(body), Value::Object(object)) = (expr, &value) {
            if body.name.is_none() {
                object.define_hidden("name", Value::from(name));
                if let ObjectKind::Function(function) = &mut object.borrow_mut().kind {
                    function.name = Rc::from(name);
                }
            }
        }
        Ok(value)
    }

    fn eval(&self, expr: &Expression, scope: &Rc<Scope>) -> Result<Value> {
        self.check_stack()?;
        match expr {
            Expression::Literal(literal) => Ok(match literal {
                Literal::Number(n) => Value::Number(*n),
                Literal::String(s) => Value::from(s.as_str()),
                Literal::Boolean(b) => Value::Boolean(*b),
                Literal::Null => Value::Null,
            }),
            Expression::Identifier(name) => scope
                .lookup(name)
                .ok_or_else(|| Error::ReferenceError(format!("{} is not defined", name))),
            Expression::This => Ok(scope.this_value()),
            Expression::Array(elements) => {
                let values = elements
                    .iter()
                    .map(|e| self.eval(e, scope))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Value::Object(self.new_array(values)))
            }
            Expression::Object(properties) => {
                let object = self.new_object();
                for (key, value) in properties {
                    let value = self.eval_named(value, key, scope)?;
                    object.set(key.as_str(), value);
                }
                Ok(Value::Object(object))
            }
            Expression::Function(body) => {
                // Named function expressions can refer to themselves
                if let (Some(name), false) = (&body.name, body.is_arrow) {
                    let own = Scope::block(scope.clone());
                    let closure = self.make_closure(body, &own);
                    own.declare(name, Value::Object(closure.clone()), false);
                    Ok(Value::Object(closure))
                } else {
                    Ok(Value::Object(self.make_closure(body, scope)))
                }
            }
            Expression::Binary {
                operator,
                left,
                right,
            } => {
                let left = self.eval(left, scope)?;
                let right = self.eval(right, scope)?;
                self.binary_op(*operator, &left, &right)
            }
            Expression::Logical {
                operator,
                left,
                right,
            } => {
                let left = self.eval(left, scope)?;
                if short_circuits(*operator, &left) {
                    Ok(left)
                } else {
                    self.eval(right, scope)
                }
            }
            Expression::Unary { operator, argument } => self.eval_unary(*operator, argument, scope),
            Expression::Update {
                delta,
                prefix,
                argument,
            } => {
                let old = self.to_js_number(&self.eval(argument, scope)?)?;
                let new = old + delta;
                self.assign_to(argument, Value::Number(new), scope)?;
                Ok(Value::Number(if *prefix { new } else { old }))
            }
            Expression::Assignment {
                operator,
                left,
                right,
            } => self.eval_assignment(*operator, left, right, scope),
            Expression::Conditional {
                test,
                consequent,
                alternate,
            } => {
                if self.eval(test, scope)?.to_boolean() {
                    self.eval(consequent, scope)
                } else {
                    self.eval(alternate, scope)
                }
            }
            Expression::Call { callee, arguments } => {
                let (function, this) = match callee.as_ref() {
                    Expression::Member { object, property } => {
                        let this = self.eval(object, scope)?;
                        let key = self.property_key(property, scope)?;
                        (self.get_property(&this, &key)?, this)
                    }
                    other => (self.eval(other, scope)?, Value::Undefined),
                };
                let args = self.eval_arguments(arguments, scope)?;
                if !function.is_function() {
                    return Err(Error::TypeError(format!(
                        "{} is not a function",
                        describe(callee)
                    )));
                }
                self.call(&function, this, &args)
            }
            Expression::New { callee, arguments } => {
                let constructor = self.eval(callee, scope)?;
                let args = self.eval_arguments(arguments, scope)?;
                if !constructor.is_function() {
                    return Err(Error::TypeError(format!(
                        "{} is not a constructor",
                        describe(callee)
                    )));
                }
                self.construct(&constructor, &args)
            }
            Expression::Member { object, property } => {
                let object = self.eval(object, scope)?;
                let key = self.property_key(property, scope)?;
                self.get_property(&object, &key)
            }
            Expression::Sequence(expressions) => {
                let mut last = Value::Undefined;
                for expr in expressions {
                    last = self.eval(expr, scope)?;
                }
                Ok(last)
            }
        }
    }

    fn eval_arguments(&self, arguments: &[Expression], scope: &Rc<Scope>) -> Result<Vec<Value>> {
        arguments.iter().map(|arg| self.eval(arg, scope)).collect()
    }

    fn property_key(&self, property: &MemberProperty, scope: &Rc<Scope>) -> Result<String> {
        match property {
            MemberProperty::Identifier(name) => Ok(name.clone()),
            MemberProperty::Computed(expr) => {
                let key = self.eval(expr, scope)?;
                Ok(self.to_js_string(&key)?.to_string())
            }
        }
    }

    fn eval_unary(
        &self,
        operator: UnaryOperator,
        argument: &Expression,
        scope: &Rc<Scope>,
    ) -> Result<Value> {
        match operator {
            UnaryOperator::Typeof => {
                // typeof tolerates undeclared identifiers
                if let Expression::Identifier(name) = argument {
                    let value = scope.lookup(name).unwrap_or_default();
                    return Ok(Value::from(value.type_of()));
                }
                Ok(Value::from(self.eval(argument, scope)?.type_of()))
            }
            UnaryOperator::Delete => {
                if let Expression::Member { object, property } = argument {
                    let object = self.eval(object, scope)?;
                    let key = self.property_key(property, scope)?;
                    return Ok(Value::Boolean(match object {
                        Value::Object(object) => object.delete(&key),
                        Value::Undefined | Value::Null => {
                            return Err(Error::TypeError(format!(
                                "Cannot convert undefined or null to object (deleting '{}')",
                                key
                            )));
                        }
                        _ => true,
                    }));
                }
                self.eval(argument, scope)?;
                Ok(Value::Boolean(true))
            }
            UnaryOperator::Void => {
                self.eval(argument, scope)?;
                Ok(Value::Undefined)
            }
            UnaryOperator::LogicalNot => Ok(Value::Boolean(!self.eval(argument, scope)?.to_boolean())),
            UnaryOperator::Minus => {
                let value = self.eval(argument, scope)?;
                Ok(Value::Number(-self.to_js_number(&value)?))
            }
            UnaryOperator::Plus => {
                let value = self.eval(argument, scope)?;
                Ok(Value::Number(self.to_js_number(&value)?))
            }
        }
    }

    fn eval_assignment(
        &self,
        operator: AssignmentOperator,
        left: &Expression,
        right: &Expression,
        scope: &Rc<Scope>,
    ) -> Result<Value> {
        // Member targets evaluate their object and key once
        let target = match left {
            Expression::Member { object, property } => {
                let object = self.eval(object, scope)?;
                let key = self.property_key(property, scope)?;
                Some((object, key))
            }
            _ => None,
        };

        let current = |this: &Self| -> Result<Value> {
            match (&target, left) {
                (Some((object, key)), _) => this.get_property(object, key),
                (None, Expression::Identifier(name)) => scope
                    .lookup(name)
                    .ok_or_else(|| Error::ReferenceError(format!("{} is not defined", name))),
                _ => Err(Error::SyntaxError("Invalid assignment target".to_string())),
            }
        };

        let value = match operator {
            AssignmentOperator::Assign => match left {
                Expression::Identifier(name) => self.eval_named(right, name, scope)?,
                _ => self.eval(right, scope)?,
            },
            AssignmentOperator::Compound(op) => {
                let old = current(self)?;
                let rhs = self.eval(right, scope)?;
                self.binary_op(op, &old, &rhs)?
            }
            AssignmentOperator::Logical(op) => {
                let old = current(self)?;
                if short_circuits(op, &old) {
                    return Ok(old);
                }
                self.eval(right, scope)?
            }
        };

        match (target, left) {
            (Some((object, key)), _) => self.set_property(&object, key, value.clone())?,
            (None, Expression::Identifier(name)) => scope.assign(name, value.clone())?,
            _ => return Err(Error::SyntaxError("Invalid assignment target".to_string())),
        }
        Ok(value)
    }

    fn assign_to(&self, target: &Expression, value: Value, scope: &Rc<Scope>) -> Result<()> {
        match target {
            Expression::Identifier(name) => scope.assign(name, value),
            Expression::Member { object, property } => {
                let object = self.eval(object, scope)?;
                let key = self.property_key(property, scope)?;
                self.set_property(&object, key, value)
            }
            _ => Err(Error::SyntaxError(
                "Invalid left-hand side expression in update operation".to_string(),
            )),
        }
    }

    pub(crate) fn binary_op(
        &self,
        operator: BinaryOperator,
        left: &Value,
        right: &Value,
    ) -> Result<Value> {
        use BinaryOperator::*;

        let value = match operator {
            Add => {
                let left = self.to_primitive(left)?;
                let right = self.to_primitive(right)?;
                if matches!(left, Value::String(_)) || matches!(right, Value::String(_)) {
                    let mut joined = self.to_js_string(&left)?.to_string();
                    joined.push_str(&self.to_js_string(&right)?);
                    Value::from(joined)
                } else {
                    Value::Number(left.to_number() + right.to_number())
                }
            }
            Subtract => Value::Number(self.to_js_number(left)? - self.to_js_number(right)?),
            Multiply => Value::Number(self.to_js_number(left)? * self.to_js_number(right)?),
            Divide => Value::Number(self.to_js_number(left)? / self.to_js_number(right)?),
            Modulo => Value::Number(self.to_js_number(left)? % self.to_js_number(right)?),
            Equal => Value::Boolean(self.loose_equals(left, right)?),
            NotEqual => Value::Boolean(!self.loose_equals(left, right)?),
            StrictEqual => Value::Boolean(left == right),
            StrictNotEqual => Value::Boolean(left != right),
            LessThan | LessThanEqual | GreaterThan | GreaterThanEqual => {
                Value::Boolean(self.compare(operator, left, right)?)
            }
            In => {
                let Value::Object(object) = right else {
                    return Err(Error::TypeError(format!(
                        "Cannot use 'in' operator to search for '{}' in {}",
                        left, right
                    )));
                };
                Value::Boolean(object.has(&self.to_js_string(left)?))
            }
            InstanceOf => {
                let Some(constructor) = right.as_object().filter(|o| o.is_function()) else {
                    return Err(Error::TypeError(
                        "Right-hand side of 'instanceof' is not callable".to_string(),
                    ));
                };
                let Value::Object(prototype) = constructor.get("prototype") else {
                    return Ok(Value::Boolean(false));
                };
                let mut current = left.as_object().and_then(ObjectRef::prototype);
                let mut found = false;
                while let Some(object) = current {
                    if object.ptr_eq(&prototype) {
                        found = true;
                        break;
                    }
                    current = object.prototype();
                }
                Value::Boolean(found)
            }
        };
        Ok(value)
    }

    fn compare(&self, operator: BinaryOperator, left: &Value, right: &Value) -> Result<bool> {
        let left = self.to_primitive(left)?;
        let right = self.to_primitive(right)?;

        if let (Value::String(a), Value::String(b)) = (&left, &right) {
            return Ok(match operator {
                BinaryOperator::LessThan => a < b,
                BinaryOperator::LessThanEqual => a <= b,
                BinaryOperator::GreaterThan => a > b,
                _ => a >= b,
            });
        }

        let (a, b) = (left.to_number(), right.to_number());
        // Comparisons with NaN are always false
        Ok(match operator {
            BinaryOperator::LessThan => a < b,
            BinaryOperator::LessThanEqual => a <= b,
            BinaryOperator::GreaterThan => a > b,
            _ => a >= b,
        })
    }

    /// Abstract equality (`==`).
    fn loose_equals(&self, a: &Value, b: &Value) -> Result<bool> {
        Ok(match (a, b) {
            // null == undefined is true
            (Value::Null | Value::Undefined, Value::Null | Value::Undefined) => true,
            (Value::Null | Value::Undefined, _) | (_, Value::Null | Value::Undefined) => false,

            (Value::Number(n), Value::String(s)) | (Value::String(s), Value::Number(n)) => {
                *n == crate::runtime::string_to_number(s)
            }

            // Booleans compare as numbers
            (Value::Boolean(flag), other) | (other, Value::Boolean(flag)) => {
                let num = Value::Number(if *flag { 1.0 } else { 0.0 });
                return self.loose_equals(&num, other);
            }

            // Objects compared with primitives are converted first
            (Value::Object(_), Value::Number(_) | Value::String(_)) => {
                let primitive = self.to_primitive(a)?;
                return self.loose_equals(&primitive, b);
            }
            (Value::Number(_) | Value::String(_), Value::Object(_)) => {
                let primitive = self.to_primitive(b)?;
                return self.loose_equals(a, &primitive);
            }

            // Same type comparisons
            _ => a == b,
        })
    }
}

fn short_circuits(operator: LogicalOperator, left: &Value) -> bool {
    match operator {
        LogicalOperator::And => !left.to_boolean(),
        LogicalOperator::Or => left.to_boolean(),
        LogicalOperator::Nullish => !left.is_nullish(),
    }
}

/// Enumerable keys of an object and its prototype chain, without
/// duplicates.
fn enumerable_keys(object: &ObjectRef) -> Vec<String> {
    let mut keys: Vec<String> = Vec::new();
    let mut current = Some(object.clone());
    while let Some(object) = current {
        for key in object.keys() {
            if !keys.contains(&key) {
                keys.push(key);
            }
        }
        current = object.prototype();
    }
    keys
}

fn not_a_function(value: &Value) -> Error {
    Error::TypeError(format!("{} is not a function", value))
}

/// Renders a callee expression for error messages.
fn describe(expr: &Expression) -> String {
    match expr {
        Expression::Identifier(name) => name.clone(),
        Expression::This => "this".to_string(),
        Expression::Member { object, property } => match property {
            MemberProperty::Identifier(name) => format!("{}.{}", describe(object), name),
            MemberProperty::Computed(_) => format!("{}[...]", describe(object)),
        },
        Expression::Literal(Literal::String(s)) => format!("\"{}\"", s),
        Expression::Literal(Literal::Number(n)) => number_to_string(*n),
        _ => "expression".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use crate::{Engine, Error, Value};

    fn eval(src: &str) -> Value {
        Engine::new().evaluate(src, "test.js").expect("should evaluate")
    }

    fn eval_err(src: &str) -> Error {
        Engine::new().evaluate(src, "test.js").unwrap_err()
    }

    #[test]
    fn test_arithmetic_and_concatenation() {
        assert_eq!(eval("1 + 2 * 3"), Value::Number(7.0));
        assert_eq!(eval("'a' + 1 + 2"), Value::from("a12"));
        assert_eq!(eval("1 + 2 + 'a'"), Value::from("3a"));
        assert_eq!(eval("7 % 3"), Value::Number(1.0));
        assert_eq!(eval("'6' * '7'"), Value::Number(42.0));
    }

    #[test]
    fn test_loose_and_strict_equality() {
        assert_eq!(eval("null == undefined"), Value::Boolean(true));
        assert_eq!(eval("null === undefined"), Value::Boolean(false));
        assert_eq!(eval("'1' == 1"), Value::Boolean(true));
        assert_eq!(eval("true == 1"), Value::Boolean(true));
        assert_eq!(eval("0 == null"), Value::Boolean(false));
        assert_eq!(eval("var o = {}; o === o"), Value::Boolean(true));
        assert_eq!(eval("({}) === ({})"), Value::Boolean(false));
    }

    #[test]
    fn test_closures_capture_scope() {
        let src = "function counter() { var n = 0; return function () { return ++n; }; }
                   var c = counter(); c(); c(); c()";
        assert_eq!(eval(src), Value::Number(3.0));
    }

    #[test]
    fn test_function_hoisting() {
        assert_eq!(eval("var r = f(); function f() { return 'hoisted'; } r"), Value::from("hoisted"));
    }

    #[test]
    fn test_let_is_block_scoped() {
        assert_eq!(eval("let x = 1; { let x = 2; } x"), Value::Number(1.0));
        assert_eq!(eval("var x = 1; { var x = 2; } x"), Value::Number(2.0));
    }

    #[test]
    fn test_const_reassignment_is_type_error() {
        assert!(matches!(eval_err("const k = 1; k = 2;"), Error::TypeError(_)));
    }

    #[test]
    fn test_for_let_captures_each_iteration() {
        let src = "var fns = []; for (let i = 0; i < 3; i++) { fns.push(() => i); }
                   fns[0]() + fns[1]() + fns[2]()";
        assert_eq!(eval(src), Value::Number(3.0));
    }

    #[test]
    fn test_loops_break_and_continue() {
        let src = "var total = 0; var i = 0;
                   while (true) { i++; if (i > 10) break; if (i % 2) continue; total += i; }
                   total";
        assert_eq!(eval(src), Value::Number(30.0));
        assert_eq!(eval("var n = 0; do { n++; } while (n < 5); n"), Value::Number(5.0));
    }

    #[test]
    fn test_for_in_walks_keys_in_order() {
        let src = "var o = { b: 1, a: 2 }; var keys = ''; for (var k in o) { keys += k; } keys";
        assert_eq!(eval(src), Value::from("ba"));
    }

    #[test]
    fn test_constructors_and_instanceof() {
        let src = "function Point(x) { this.x = x; }
                   Point.prototype.double = function () { return this.x * 2; };
                   var p = new Point(21);
                   (p instanceof Point) && p.double()";
        assert_eq!(eval(src), Value::Number(42.0));
    }

    #[test]
    fn test_arrow_functions_use_lexical_this() {
        let src = "var obj = { v: 5, run: function () { var f = () => this.v; return f(); } };
                   obj.run()";
        assert_eq!(eval(src), Value::Number(5.0));
    }

    #[test]
    fn test_try_catch_finally() {
        let src = "var log = '';
                   try { log += 'a'; throw new Error('boom'); }
                   catch (e) { log += e.message; }
                   finally { log += '!'; }
                   log";
        assert_eq!(eval(src), Value::from("aboom!"));
    }

    #[test]
    fn test_engine_errors_are_catchable() {
        let src = "var name; try { missing(); } catch (e) { name = e.name; } name";
        assert_eq!(eval(src), Value::from("ReferenceError"));
        let src = "var ok; try { null.x; } catch (e) { ok = e instanceof TypeError; } ok";
        assert_eq!(eval(src), Value::Boolean(true));
    }

    #[test]
    fn test_uncaught_throw_propagates_value() {
        match eval_err("throw 'plain';") {
            Error::Thrown(value) => assert_eq!(value, Value::from("plain")),
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_typeof_undeclared_identifier() {
        assert_eq!(eval("typeof notDeclared"), Value::from("undefined"));
        assert_eq!(eval("typeof function () {}"), Value::from("function"));
        assert_eq!(eval("typeof null"), Value::from("object"));
    }

    #[test]
    fn test_logical_assignment() {
        assert_eq!(eval("var a = null; a ??= 3; a"), Value::Number(3.0));
        assert_eq!(eval("var b = 1; b ||= 2; b"), Value::Number(1.0));
        assert_eq!(eval("var c = 1; c &&= 4; c"), Value::Number(4.0));
    }

    #[test]
    fn test_arguments_object() {
        assert_eq!(eval("function f() { return arguments.length; } f(1, 2, 3)"), Value::Number(3.0));
    }

    #[test]
    fn test_named_function_expression_recursion() {
        let src = "var fact = function f(n) { return n <= 1 ? 1 : n * f(n - 1); }; fact(5)";
        assert_eq!(eval(src), Value::Number(120.0));
    }

    #[test]
    fn test_delete_and_in() {
        assert_eq!(eval("var o = { a: 1 }; delete o.a; 'a' in o"), Value::Boolean(false));
    }

    #[test]
    fn test_call_depth_is_bounded() {
        let engine = Engine::new();
        engine.set_max_call_depth(10);
        let calls = engine
            .evaluate(
                "var n = 0; function f() { n++; return f(); } try { f(); } catch (e) {} n",
                "t.js",
            )
            .unwrap();
        assert_eq!(calls, Value::Number(10.0));
    }

    #[test]
    fn test_runaway_recursion_is_a_range_error() {
        let err = eval_err("function loop() { return loop(); } loop();");
        assert_eq!(err.to_string(), "RangeError: Maximum call stack size exceeded");
    }

    #[test]
    fn test_runaway_recursion_is_catchable() {
        let result = eval(
            "function loop() { return loop(); }
             var caught;
             try { loop(); } catch (e) { caught = e instanceof RangeError; }
             caught",
        );
        assert_eq!(result, Value::Boolean(true));
    }

    #[test]
    fn test_deep_expressions_fail_cleanly() {
        // either fits in the stack budget or reports exhaustion
        let source = format!("1{}", " + 1".repeat(999));
        match Engine::new().evaluate(&source, "t.js") {
            Ok(value) => assert_eq!(value, Value::Number(1000.0)),
            Err(err) => assert_eq!(err.to_string(), "RangeError: Maximum call stack size exceeded"),
        }
    }

    #[test]
    fn test_stack_budget_is_configurable() {
        let engine = Engine::new();
        engine.set_stack_budget(16 * 1024);
        let err = engine
            .evaluate("function f(n) { return n ? f(n - 1) + 1 : 0; } f(200)", "t.js")
            .unwrap_err();
        assert!(matches!(err, Error::RangeError(_)));

        engine.set_stack_budget(crate::DEFAULT_STACK_BUDGET);
        let result = engine.evaluate("f(5)", "t.js").unwrap();
        assert_eq!(result, Value::Number(5.0));
    }

    #[test]
    fn test_calling_non_function_names_callee() {
        let err = eval_err("var o = {}; o.missing();");
        assert_eq!(err.to_string(), "TypeError: o.missing is not a function");
    }
}
