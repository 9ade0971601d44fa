//! Abstract Syntax Tree (AST) definitions.
//!
//! The node shapes follow ESTree naming where they overlap with it, trimmed
//! to the subset the interpreter evaluates.

use std::rc::Rc;

/// A complete program.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    /// The statements in the program
    pub body: Vec<Statement>,
    /// Names declared with `var` anywhere outside nested functions
    pub var_names: Vec<String>,
}

/// A statement.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    /// Variable declaration (var, let, const)
    VariableDeclaration(VariableDeclaration),
    /// Function declaration
    FunctionDeclaration(Rc<FunctionBody>),
    /// Expression statement
    Expression(Expression),
    /// Block statement { ... }
    Block(Vec<Statement>),
    /// If statement
    If {
        /// The condition
        test: Expression,
        /// The then branch
        consequent: Box<Statement>,
        /// The optional else branch
        alternate: Option<Box<Statement>>,
    },
    /// While statement
    While {
        /// The condition
        test: Expression,
        /// The loop body
        body: Box<Statement>,
    },
    /// Do-while statement
    DoWhile {
        /// The loop body
        body: Box<Statement>,
        /// The condition
        test: Expression,
    },
    /// For statement
    For(Box<ForStatement>),
    /// For-in statement
    ForIn(Box<ForInStatement>),
    /// Return statement
    Return(Option<Expression>),
    /// Break statement
    Break,
    /// Continue statement
    Continue,
    /// Throw statement
    Throw(Expression),
    /// Try statement
    Try(Box<TryStatement>),
    /// Empty statement (;)
    Empty,
}

/// Variable declaration kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariableKind {
    /// var declaration
    Var,
    /// let declaration
    Let,
    /// const declaration
    Const,
}

/// A variable declaration statement.
#[derive(Debug, Clone, PartialEq)]
pub struct VariableDeclaration {
    /// The kind of declaration
    pub kind: VariableKind,
    /// The declarators, as (name, initializer) pairs
    pub declarations: Vec<(String, Option<Expression>)>,
}

/// Parameters, body and hoisting information of a function.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionBody {
    /// The function name, if any
    pub name: Option<String>,
    /// The parameter names
    pub params: Vec<String>,
    /// The body statements
    pub body: Vec<Statement>,
    /// Names declared with `var` in the body
    pub var_names: Vec<String>,
    /// Arrow functions take `this` from their defining scope
    pub is_arrow: bool,
}

/// A for statement.
#[derive(Debug, Clone, PartialEq)]
pub struct ForStatement {
    /// The initializer
    pub init: Option<ForInit>,
    /// The condition
    pub test: Option<Expression>,
    /// The update expression
    pub update: Option<Expression>,
    /// The loop body
    pub body: Statement,
}

/// For loop initializer.
#[derive(Debug, Clone, PartialEq)]
pub enum ForInit {
    /// Variable declaration
    Declaration(VariableDeclaration),
    /// Expression
    Expression(Expression),
}

/// A for-in statement.
#[derive(Debug, Clone, PartialEq)]
pub struct ForInStatement {
    /// Declaration kind when the loop declares its variable
    pub kind: Option<VariableKind>,
    /// The loop variable
    pub name: String,
    /// The object whose keys are iterated
    pub right: Expression,
    /// The loop body
    pub body: Statement,
}

/// A try statement.
#[derive(Debug, Clone, PartialEq)]
pub struct TryStatement {
    /// The try block
    pub block: Vec<Statement>,
    /// The catch parameter and body
    pub handler: Option<(Option<String>, Vec<Statement>)>,
    /// The finally block
    pub finalizer: Option<Vec<Statement>>,
}

/// An expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    /// Literal value
    Literal(Literal),
    /// Identifier reference
    Identifier(String),
    /// this keyword
    This,
    /// Array literal
    Array(Vec<Expression>),
    /// Object literal
    Object(Vec<(String, Expression)>),
    /// Function or arrow function expression
    Function(Rc<FunctionBody>),
    /// Binary expression
    Binary {
        /// The operator
        operator: BinaryOperator,
        /// The left operand
        left: Box<Expression>,
        /// The right operand
        right: Box<Expression>,
    },
    /// Short-circuiting logical expression
    Logical {
        /// The operator
        operator: LogicalOperator,
        /// The left operand
        left: Box<Expression>,
        /// The right operand
        right: Box<Expression>,
    },
    /// Unary expression
    Unary {
        /// The operator
        operator: UnaryOperator,
        /// The operand
        argument: Box<Expression>,
    },
    /// Update expression (++/--)
    Update {
        /// +1 or -1
        delta: f64,
        /// Whether the operator precedes the operand
        prefix: bool,
        /// The target
        argument: Box<Expression>,
    },
    /// Assignment expression
    Assignment {
        /// The operator
        operator: AssignmentOperator,
        /// The target
        left: Box<Expression>,
        /// The value
        right: Box<Expression>,
    },
    /// Conditional (ternary) expression
    Conditional {
        /// The condition
        test: Box<Expression>,
        /// Value when true
        consequent: Box<Expression>,
        /// Value when false
        alternate: Box<Expression>,
    },
    /// Call expression
    Call {
        /// The callee
        callee: Box<Expression>,
        /// The arguments
        arguments: Vec<Expression>,
    },
    /// new expression
    New {
        /// The constructor
        callee: Box<Expression>,
        /// The arguments
        arguments: Vec<Expression>,
    },
    /// Member access expression
    Member {
        /// The object
        object: Box<Expression>,
        /// The property
        property: MemberProperty,
    },
    /// Sequence expression (comma operator)
    Sequence(Vec<Expression>),
}

/// A literal value.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    /// Numeric literal
    Number(f64),
    /// String literal
    String(String),
    /// Boolean literal
    Boolean(bool),
    /// null literal
    Null,
}

/// The property of a member expression.
#[derive(Debug, Clone, PartialEq)]
pub enum MemberProperty {
    /// `object.name`
    Identifier(String),
    /// `object[expression]`
    Computed(Box<Expression>),
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    Equal,
    NotEqual,
    StrictEqual,
    StrictNotEqual,
    LessThan,
    LessThanEqual,
    GreaterThan,
    GreaterThanEqual,
    In,
    InstanceOf,
}

/// Logical operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOperator {
    /// &&
    And,
    /// ||
    Or,
    /// ??
    Nullish,
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    /// -
    Minus,
    /// +
    Plus,
    /// !
    LogicalNot,
    /// typeof
    Typeof,
    /// void
    Void,
    /// delete
    Delete,
}

/// Assignment operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignmentOperator {
    /// =
    Assign,
    /// op= for an arithmetic operator
    Compound(BinaryOperator),
    /// op= for a logical operator
    Logical(LogicalOperator),
}

/// Collects the names declared with `var` in `body`, descending into nested
/// statements but not into nested functions.
pub fn collect_var_names(body: &[Statement]) -> Vec<String> {
    fn visit(statement: &Statement, out: &mut Vec<String>) {
        match statement {
            Statement::VariableDeclaration(decl) => push_decl(decl, out),
            Statement::Block(body) => body.iter().for_each(|s| visit(s, out)),
            Statement::If {
                consequent,
                alternate,
                ..
            } => {
                visit(consequent, out);
                if let Some(alternate) = alternate {
                    visit(alternate, out);
                }
            }
            Statement::While { body, .. } | Statement::DoWhile { body, .. } => visit(body, out),
            Statement::For(stmt) => {
                if let Some(ForInit::Declaration(decl)) = &stmt.init {
                    push_decl(decl, out);
                }
                visit(&stmt.body, out);
            }
            Statement::ForIn(stmt) => {
                if stmt.kind == Some(VariableKind::Var) && !out.contains(&stmt.name) {
                    out.push(stmt.name.clone());
                }
                visit(&stmt.body, out);
            }
            Statement::Try(stmt) => {
                stmt.block.iter().for_each(|s| visit(s, out));
                if let Some((_, body)) = &stmt.handler {
                    body.iter().for_each(|s| visit(s, out));
                }
                if let Some(body) = &stmt.finalizer {
                    body.iter().for_each(|s| visit(s, out));
                }
            }
            _ => {}
        }
    }

    fn push_decl(decl: &VariableDeclaration, out: &mut Vec<String>) {
        if decl.kind != VariableKind::Var {
            return;
        }
        for (name, _) in &decl.declarations {
            if !out.contains(name) {
                out.push(name.clone());
            }
        }
    }

    let mut out = Vec::new();
    body.iter().for_each(|s| visit(s, &mut out));
    out
}
