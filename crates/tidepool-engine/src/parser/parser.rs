//! The main parser implementation.

use std::rc::Rc;

use crate::Error;
use crate::ast::*;
use crate::lexer::{Scanner, Span, Token, TokenKind};
use crate::runtime::stack::{DEFAULT_STACK_BUDGET, StackLimit};

/// Longest run of one binary operator precedence level, or of member
/// and call suffixes.
const MAX_OPERATOR_CHAIN: usize = 1000;

/// A recursive descent parser.
pub struct Parser<'a> {
    scanner: Scanner<'a>,
    current: Token,
    stack: StackLimit,
}

impl<'a> Parser<'a> {
    /// Creates a new parser for the given source code.
    pub fn new(source: &'a str) -> Self {
        Self::with_stack_limit(source, StackLimit::here(DEFAULT_STACK_BUDGET))
    }

    /// Creates a parser that reports a syntax error instead of nesting past
    /// `stack`.
    pub fn with_stack_limit(source: &'a str, stack: StackLimit) -> Self {
        let mut scanner = Scanner::new(source);
        let current = scanner.next_token();
        Self {
            scanner,
            current,
            stack,
        }
    }

    /// Parses the source code into a Program AST node.
    pub fn parse_program(&mut self) -> Result<Program, Error> {
        let mut body = Vec::new();

        while !self.is_at_end() {
            body.push(self.parse_statement()?);
        }

        let var_names = collect_var_names(&body);
        Ok(Program { body, var_names })
    }

    /// Parses a single statement.
    pub fn parse_statement(&mut self) -> Result<Statement, Error> {
        self.check_nesting()?;
        match &self.current.kind {
            TokenKind::Var | TokenKind::Let | TokenKind::Const => {
                let decl = self.parse_variable_declaration()?;
                self.consume_semicolon()?;
                Ok(Statement::VariableDeclaration(decl))
            }
            TokenKind::Function => {
                self.advance();
                let function = self.parse_function_rest()?;
                if function.name.is_none() {
                    return Err(self.error("function declaration requires a name"));
                }
                Ok(Statement::FunctionDeclaration(function))
            }
            TokenKind::If => self.parse_if_statement(),
            TokenKind::While => self.parse_while_statement(),
            TokenKind::Do => self.parse_do_while_statement(),
            TokenKind::For => self.parse_for_statement(),
            TokenKind::Return => self.parse_return_statement(),
            TokenKind::Break => {
                self.advance();
                self.consume_semicolon()?;
                Ok(Statement::Break)
            }
            TokenKind::Continue => {
                self.advance();
                self.consume_semicolon()?;
                Ok(Statement::Continue)
            }
            TokenKind::Throw => {
                self.advance();
                if self.current.newline_before {
                    return Err(self.error("illegal newline after throw"));
                }
                let argument = self.parse_expression()?;
                self.consume_semicolon()?;
                Ok(Statement::Throw(argument))
            }
            TokenKind::Try => self.parse_try_statement(),
            TokenKind::LeftBrace => Ok(Statement::Block(self.parse_block()?)),
            TokenKind::Semicolon => {
                self.advance();
                Ok(Statement::Empty)
            }
            _ => {
                let expression = self.parse_expression()?;
                self.consume_semicolon()?;
                Ok(Statement::Expression(expression))
            }
        }
    }

    fn parse_variable_declaration(&mut self) -> Result<VariableDeclaration, Error> {
        let kind = self.parse_variable_kind()?;
        let mut declarations = Vec::new();

        loop {
            let name = self.expect_identifier()?;
            let init = if self.check(&TokenKind::Equal) {
                self.advance();
                Some(self.parse_assignment()?)
            } else {
                None
            };

            if kind == VariableKind::Const && init.is_none() {
                return Err(self.error("missing initializer in const declaration"));
            }

            declarations.push((name, init));

            if !self.check(&TokenKind::Comma) {
                break;
            }
            self.advance();
        }

        Ok(VariableDeclaration { kind, declarations })
    }

    fn parse_variable_kind(&mut self) -> Result<VariableKind, Error> {
        let kind = match &self.current.kind {
            TokenKind::Var => VariableKind::Var,
            TokenKind::Let => VariableKind::Let,
            TokenKind::Const => VariableKind::Const,
            _ => return Err(self.error("expected variable keyword")),
        };
        self.advance();
        Ok(kind)
    }

    /// Parses everything after the `function` keyword.
    fn parse_function_rest(&mut self) -> Result<Rc<FunctionBody>, Error> {
        let name = match &self.current.kind {
            TokenKind::Identifier(name) => {
                let name = name.clone();
                self.advance();
                Some(name)
            }
            _ => None,
        };

        self.expect(&TokenKind::LeftParen)?;
        let params = self.parse_parameters()?;
        self.expect(&TokenKind::RightParen)?;
        let body = self.parse_block()?;

        Ok(Rc::new(FunctionBody {
            var_names: collect_var_names(&body),
            name,
            params,
            body,
            is_arrow: false,
        }))
    }

    fn parse_parameters(&mut self) -> Result<Vec<String>, Error> {
        let mut params = Vec::new();

        if !self.check(&TokenKind::RightParen) {
            loop {
                params.push(self.expect_identifier()?);
                if !self.check(&TokenKind::Comma) {
                    break;
                }
                self.advance();
            }
        }

        Ok(params)
    }

    fn parse_block(&mut self) -> Result<Vec<Statement>, Error> {
        self.expect(&TokenKind::LeftBrace)?;
        let mut body = Vec::new();

        while !self.check(&TokenKind::RightBrace) && !self.is_at_end() {
            body.push(self.parse_statement()?);
        }

        self.expect(&TokenKind::RightBrace)?;
        Ok(body)
    }

    fn parse_if_statement(&mut self) -> Result<Statement, Error> {
        self.advance(); // consume 'if'
        self.expect(&TokenKind::LeftParen)?;
        let test = self.parse_expression()?;
        self.expect(&TokenKind::RightParen)?;
        let consequent = Box::new(self.parse_statement()?);
        let alternate = if self.check(&TokenKind::Else) {
            self.advance();
            Some(Box::new(self.parse_statement()?))
        } else {
            None
        };

        Ok(Statement::If {
            test,
            consequent,
            alternate,
        })
    }

    fn parse_while_statement(&mut self) -> Result<Statement, Error> {
        self.advance(); // consume 'while'
        self.expect(&TokenKind::LeftParen)?;
        let test = self.parse_expression()?;
        self.expect(&TokenKind::RightParen)?;
        let body = Box::new(self.parse_statement()?);

        Ok(Statement::While { test, body })
    }

    fn parse_do_while_statement(&mut self) -> Result<Statement, Error> {
        self.advance(); // consume 'do'
        let body = Box::new(self.parse_statement()?);
        self.expect(&TokenKind::While)?;
        self.expect(&TokenKind::LeftParen)?;
        let test = self.parse_expression()?;
        self.expect(&TokenKind::RightParen)?;
        if self.check(&TokenKind::Semicolon) {
            self.advance();
        }

        Ok(Statement::DoWhile { body, test })
    }

    fn parse_for_statement(&mut self) -> Result<Statement, Error> {
        self.advance(); // consume 'for'
        self.expect(&TokenKind::LeftParen)?;

        let init = if self.check(&TokenKind::Semicolon) {
            None
        } else if matches!(
            self.current.kind,
            TokenKind::Var | TokenKind::Let | TokenKind::Const
        ) {
            // `for (var key in object)` is recognised before the initializer
            if let TokenKind::In = self.scanner.peek_token_after_identifier() {
                let kind = self.parse_variable_kind()?;
                let name = self.expect_identifier()?;
                return self.parse_for_in_rest(Some(kind), name);
            }
            Some(ForInit::Declaration(self.parse_variable_declaration()?))
        } else {
            if let TokenKind::Identifier(name) = &self.current.kind {
                if self.scanner.peek_token().kind == TokenKind::In {
                    let name = name.clone();
                    self.advance();
                    return self.parse_for_in_rest(None, name);
                }
            }
            Some(ForInit::Expression(self.parse_expression()?))
        };

        self.expect(&TokenKind::Semicolon)?;
        let test = if self.check(&TokenKind::Semicolon) {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.expect(&TokenKind::Semicolon)?;
        let update = if self.check(&TokenKind::RightParen) {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.expect(&TokenKind::RightParen)?;
        let body = self.parse_statement()?;

        Ok(Statement::For(Box::new(ForStatement {
            init,
            test,
            update,
            body,
        })))
    }

    fn parse_for_in_rest(
        &mut self,
        kind: Option<VariableKind>,
        name: String,
    ) -> Result<Statement, Error> {
        self.expect(&TokenKind::In)?;
        let right = self.parse_expression()?;
        self.expect(&TokenKind::RightParen)?;
        let body = self.parse_statement()?;

        Ok(Statement::ForIn(Box::new(ForInStatement {
            kind,
            name,
            right,
            body,
        })))
    }

    fn parse_return_statement(&mut self) -> Result<Statement, Error> {
        self.advance(); // consume 'return'

        let argument = if self.check(&TokenKind::Semicolon)
            || self.check(&TokenKind::RightBrace)
            || self.is_at_end()
            || self.current.newline_before
        {
            None
        } else {
            Some(self.parse_expression()?)
        };

        self.consume_semicolon()?;
        Ok(Statement::Return(argument))
    }

    fn parse_try_statement(&mut self) -> Result<Statement, Error> {
        self.advance(); // consume 'try'
        let block = self.parse_block()?;

        let handler = if self.check(&TokenKind::Catch) {
            self.advance();
            let param = if self.check(&TokenKind::LeftParen) {
                self.advance();
                let name = self.expect_identifier()?;
                self.expect(&TokenKind::RightParen)?;
                Some(name)
            } else {
                None
            };
            Some((param, self.parse_block()?))
        } else {
            None
        };

        let finalizer = if self.check(&TokenKind::Finally) {
            self.advance();
            Some(self.parse_block()?)
        } else {
            None
        };

        if handler.is_none() && finalizer.is_none() {
            return Err(self.error("try statement must have catch or finally"));
        }

        Ok(Statement::Try(Box::new(TryStatement {
            block,
            handler,
            finalizer,
        })))
    }

    /// Parses an expression, including comma sequences.
    pub fn parse_expression(&mut self) -> Result<Expression, Error> {
        let first = self.parse_assignment()?;
        if !self.check(&TokenKind::Comma) {
            return Ok(first);
        }

        let mut expressions = vec![first];
        while self.check(&TokenKind::Comma) {
            self.advance();
            expressions.push(self.parse_assignment()?);
        }
        Ok(Expression::Sequence(expressions))
    }

    fn parse_assignment(&mut self) -> Result<Expression, Error> {
        self.check_nesting()?;
        if self.is_arrow_ahead() {
            return self.parse_arrow_function();
        }

        let expr = self.parse_conditional()?;

        let operator = match &self.current.kind {
            TokenKind::Equal => AssignmentOperator::Assign,
            TokenKind::PlusEqual => AssignmentOperator::Compound(BinaryOperator::Add),
            TokenKind::MinusEqual => AssignmentOperator::Compound(BinaryOperator::Subtract),
            TokenKind::StarEqual => AssignmentOperator::Compound(BinaryOperator::Multiply),
            TokenKind::SlashEqual => AssignmentOperator::Compound(BinaryOperator::Divide),
            TokenKind::PercentEqual => AssignmentOperator::Compound(BinaryOperator::Modulo),
            TokenKind::AmpersandAmpersandEqual => AssignmentOperator::Logical(LogicalOperator::And),
            TokenKind::PipePipeEqual => AssignmentOperator::Logical(LogicalOperator::Or),
            TokenKind::QuestionQuestionEqual => {
                AssignmentOperator::Logical(LogicalOperator::Nullish)
            }
            _ => return Ok(expr),
        };

        if !matches!(expr, Expression::Identifier(_) | Expression::Member { .. }) {
            return Err(self.error("invalid assignment target"));
        }

        self.advance();
        let value = self.parse_assignment()?;
        Ok(Expression::Assignment {
            operator,
            left: Box::new(expr),
            right: Box::new(value),
        })
    }

    /// Parse conditional (ternary) expression: test ? consequent : alternate
    fn parse_conditional(&mut self) -> Result<Expression, Error> {
        let test = self.parse_logical_or()?;

        if self.check(&TokenKind::Question) {
            self.advance(); // consume '?'
            let consequent = self.parse_assignment()?;
            self.expect(&TokenKind::Colon)?;
            let alternate = self.parse_assignment()?;

            return Ok(Expression::Conditional {
                test: Box::new(test),
                consequent: Box::new(consequent),
                alternate: Box::new(alternate),
            });
        }

        Ok(test)
    }

    fn parse_logical_or(&mut self) -> Result<Expression, Error> {
        let mut left = self.parse_logical_and()?;
        let mut chained = 0;

        loop {
            let operator = match &self.current.kind {
                TokenKind::PipePipe => LogicalOperator::Or,
                TokenKind::QuestionQuestion => LogicalOperator::Nullish,
                _ => break,
            };
            self.advance();
            self.chain_step(&mut chained)?;
            let right = self.parse_logical_and()?;
            left = Expression::Logical {
                operator,
                left: Box::new(left),
                right: Box::new(right),
            };
        }

        Ok(left)
    }

    fn parse_logical_and(&mut self) -> Result<Expression, Error> {
        let mut left = self.parse_equality()?;
        let mut chained = 0;

        while self.check(&TokenKind::AmpersandAmpersand) {
            self.advance();
            self.chain_step(&mut chained)?;
            let right = self.parse_equality()?;
            left = Expression::Logical {
                operator: LogicalOperator::And,
                left: Box::new(left),
                right: Box::new(right),
            };
        }

        Ok(left)
    }

    fn parse_equality(&mut self) -> Result<Expression, Error> {
        let mut left = self.parse_comparison()?;
        let mut chained = 0;

        loop {
            let operator = match &self.current.kind {
                TokenKind::EqualEqual => BinaryOperator::Equal,
                TokenKind::NotEqual => BinaryOperator::NotEqual,
                TokenKind::StrictEqual => BinaryOperator::StrictEqual,
                TokenKind::StrictNotEqual => BinaryOperator::StrictNotEqual,
                _ => break,
            };
            self.advance();
            self.chain_step(&mut chained)?;
            let right = self.parse_comparison()?;
            left = binary(operator, left, right);
        }

        Ok(left)
    }

    fn parse_comparison(&mut self) -> Result<Expression, Error> {
        let mut left = self.parse_additive()?;
        let mut chained = 0;

        loop {
            let operator = match &self.current.kind {
                TokenKind::LessThan => BinaryOperator::LessThan,
                TokenKind::LessThanEqual => BinaryOperator::LessThanEqual,
                TokenKind::GreaterThan => BinaryOperator::GreaterThan,
                TokenKind::GreaterThanEqual => BinaryOperator::GreaterThanEqual,
                TokenKind::In => BinaryOperator::In,
                TokenKind::Instanceof => BinaryOperator::InstanceOf,
                _ => break,
            };
            self.advance();
            self.chain_step(&mut chained)?;
            let right = self.parse_additive()?;
            left = binary(operator, left, right);
        }

        Ok(left)
    }

    fn parse_additive(&mut self) -> Result<Expression, Error> {
        let mut left = self.parse_multiplicative()?;
        let mut chained = 0;

        loop {
            let operator = match &self.current.kind {
                TokenKind::Plus => BinaryOperator::Add,
                TokenKind::Minus => BinaryOperator::Subtract,
                _ => break,
            };
            self.advance();
            self.chain_step(&mut chained)?;
            let right = self.parse_multiplicative()?;
            left = binary(operator, left, right);
        }

        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> Result<Expression, Error> {
        let mut left = self.parse_unary()?;
        let mut chained = 0;

        loop {
            let operator = match &self.current.kind {
                TokenKind::Star => BinaryOperator::Multiply,
                TokenKind::Slash => BinaryOperator::Divide,
                TokenKind::Percent => BinaryOperator::Modulo,
                _ => break,
            };
            self.advance();
            self.chain_step(&mut chained)?;
            let right = self.parse_unary()?;
            left = binary(operator, left, right);
        }

        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expression, Error> {
        self.check_nesting()?;
        let delta = match &self.current.kind {
            TokenKind::PlusPlus => Some(1.0),
            TokenKind::MinusMinus => Some(-1.0),
            _ => None,
        };
        if let Some(delta) = delta {
            self.advance();
            let argument = self.parse_unary()?;
            return Ok(Expression::Update {
                delta,
                prefix: true,
                argument: Box::new(argument),
            });
        }

        let operator = match &self.current.kind {
            TokenKind::Bang => Some(UnaryOperator::LogicalNot),
            TokenKind::Minus => Some(UnaryOperator::Minus),
            TokenKind::Plus => Some(UnaryOperator::Plus),
            TokenKind::Typeof => Some(UnaryOperator::Typeof),
            TokenKind::Void => Some(UnaryOperator::Void),
            TokenKind::Delete => Some(UnaryOperator::Delete),
            _ => None,
        };

        if let Some(operator) = operator {
            self.advance();
            let argument = self.parse_unary()?;
            return Ok(Expression::Unary {
                operator,
                argument: Box::new(argument),
            });
        }

        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> Result<Expression, Error> {
        let expr = self.parse_call()?;

        let delta = match &self.current.kind {
            TokenKind::PlusPlus if !self.current.newline_before => 1.0,
            TokenKind::MinusMinus if !self.current.newline_before => -1.0,
            _ => return Ok(expr),
        };
        self.advance();
        Ok(Expression::Update {
            delta,
            prefix: false,
            argument: Box::new(expr),
        })
    }

    fn parse_call(&mut self) -> Result<Expression, Error> {
        let mut expr = if self.check(&TokenKind::New) {
            self.parse_new_expression()?
        } else {
            self.parse_primary()?
        };
        let mut chained = 0;

        loop {
            self.chain_step(&mut chained)?;
            if self.check(&TokenKind::LeftParen) {
                self.advance();
                let arguments = self.parse_arguments()?;
                expr = Expression::Call {
                    callee: Box::new(expr),
                    arguments,
                };
            } else if let Some(member) = self.parse_member_suffix(&expr)? {
                expr = member;
            } else {
                break;
            }
        }

        Ok(expr)
    }

    fn parse_member_suffix(&mut self, object: &Expression) -> Result<Option<Expression>, Error> {
        let property = if self.check(&TokenKind::Dot) {
            self.advance();
            MemberProperty::Identifier(self.expect_property_name()?)
        } else if self.check(&TokenKind::LeftBracket) {
            self.advance();
            let property = self.parse_expression()?;
            self.expect(&TokenKind::RightBracket)?;
            MemberProperty::Computed(Box::new(property))
        } else {
            return Ok(None);
        };

        Ok(Some(Expression::Member {
            object: Box::new(object.clone()),
            property,
        }))
    }

    fn parse_new_expression(&mut self) -> Result<Expression, Error> {
        self.advance(); // consume 'new'

        let mut callee = if self.check(&TokenKind::New) {
            self.parse_new_expression()?
        } else {
            self.parse_primary()?
        };
        while let Some(member) = self.parse_member_suffix(&callee)? {
            callee = member;
        }

        // Arguments are optional with 'new'
        let arguments = if self.check(&TokenKind::LeftParen) {
            self.advance();
            self.parse_arguments()?
        } else {
            Vec::new()
        };

        Ok(Expression::New {
            callee: Box::new(callee),
            arguments,
        })
    }

    /// Parses call arguments up to and including the closing parenthesis.
    fn parse_arguments(&mut self) -> Result<Vec<Expression>, Error> {
        let mut args = Vec::new();

        while !self.check(&TokenKind::RightParen) {
            args.push(self.parse_assignment()?);
            if !self.check(&TokenKind::Comma) {
                break;
            }
            self.advance();
        }

        self.expect(&TokenKind::RightParen)?;
        Ok(args)
    }

    fn parse_primary(&mut self) -> Result<Expression, Error> {
        let expr = match &self.current.kind {
            TokenKind::Number(n) => Expression::Literal(Literal::Number(*n)),
            TokenKind::String(s) => Expression::Literal(Literal::String(s.clone())),
            TokenKind::True => Expression::Literal(Literal::Boolean(true)),
            TokenKind::False => Expression::Literal(Literal::Boolean(false)),
            TokenKind::Null => Expression::Literal(Literal::Null),
            TokenKind::Identifier(name) => Expression::Identifier(name.clone()),
            TokenKind::This => Expression::This,
            TokenKind::Function => {
                self.advance();
                return Ok(Expression::Function(self.parse_function_rest()?));
            }
            TokenKind::LeftParen => {
                self.advance();
                let expr = self.parse_expression()?;
                self.expect(&TokenKind::RightParen)?;
                return Ok(expr);
            }
            TokenKind::LeftBracket => return self.parse_array_literal(),
            TokenKind::LeftBrace => return self.parse_object_literal(),
            TokenKind::Invalid(reason) => return Err(self.error(&reason.clone())),
            other => {
                return Err(self.error(&format!("unexpected token {:?}", other)));
            }
        };
        self.advance();
        Ok(expr)
    }

    /// Returns true when the tokens at the cursor start an arrow function.
    fn is_arrow_ahead(&self) -> bool {
        match &self.current.kind {
            TokenKind::Identifier(_) => self.scanner.peek_token().kind == TokenKind::Arrow,
            // parameter lists are plain identifiers, so a nested paren
            // means a parenthesized expression
            TokenKind::LeftParen => {
                let mut scanner = self.scanner.clone();
                loop {
                    match scanner.next_token().kind {
                        TokenKind::RightParen => break,
                        TokenKind::Identifier(_) | TokenKind::Comma => {}
                        _ => return false,
                    }
                }
                scanner.next_token().kind == TokenKind::Arrow
            }
            _ => false,
        }
    }

    fn parse_arrow_function(&mut self) -> Result<Expression, Error> {
        let params = if self.check(&TokenKind::LeftParen) {
            self.advance();
            let params = self.parse_parameters()?;
            self.expect(&TokenKind::RightParen)?;
            params
        } else {
            vec![self.expect_identifier()?]
        };
        self.expect(&TokenKind::Arrow)?;

        let body = if self.check(&TokenKind::LeftBrace) {
            self.parse_block()?
        } else {
            vec![Statement::Return(Some(self.parse_assignment()?))]
        };

        Ok(Expression::Function(Rc::new(FunctionBody {
            name: None,
            params,
            var_names: collect_var_names(&body),
            body,
            is_arrow: true,
        })))
    }

    fn parse_array_literal(&mut self) -> Result<Expression, Error> {
        self.advance(); // consume '['
        let mut elements = Vec::new();

        while !self.check(&TokenKind::RightBracket) && !self.is_at_end() {
            elements.push(self.parse_assignment()?);

            if !self.check(&TokenKind::RightBracket) {
                self.expect(&TokenKind::Comma)?;
            }
        }

        self.expect(&TokenKind::RightBracket)?;
        Ok(Expression::Array(elements))
    }

    fn parse_object_literal(&mut self) -> Result<Expression, Error> {
        self.advance(); // consume '{'
        let mut properties = Vec::new();

        while !self.check(&TokenKind::RightBrace) && !self.is_at_end() {
            let shorthand_ok = matches!(self.current.kind, TokenKind::Identifier(_));
            let key = match &self.current.kind {
                TokenKind::String(s) => {
                    let key = s.clone();
                    self.advance();
                    key
                }
                TokenKind::Number(n) => {
                    let key = crate::runtime::number_to_string(*n);
                    self.advance();
                    key
                }
                _ => self.expect_property_name()?,
            };

            let value = if self.check(&TokenKind::Colon) {
                self.advance();
                self.parse_assignment()?
            } else if self.check(&TokenKind::LeftParen) {
                // Method shorthand: `name(params) { ... }`
                self.advance();
                let params = self.parse_parameters()?;
                self.expect(&TokenKind::RightParen)?;
                let body = self.parse_block()?;
                Expression::Function(Rc::new(FunctionBody {
                    name: Some(key.clone()),
                    params,
                    var_names: collect_var_names(&body),
                    body,
                    is_arrow: false,
                }))
            } else if shorthand_ok {
                Expression::Identifier(key.clone())
            } else {
                return Err(self.error("expected ':' after property name"));
            };

            properties.push((key, value));

            if !self.check(&TokenKind::RightBrace) {
                self.expect(&TokenKind::Comma)?;
            }
        }

        self.expect(&TokenKind::RightBrace)?;
        Ok(Expression::Object(properties))
    }

    // Helper methods

    fn advance(&mut self) {
        self.current = self.scanner.next_token();
    }

    fn check(&self, kind: &TokenKind) -> bool {
        std::mem::discriminant(&self.current.kind) == std::mem::discriminant(kind)
    }

    fn expect(&mut self, kind: &TokenKind) -> Result<(), Error> {
        if self.check(kind) {
            self.advance();
            Ok(())
        } else {
            Err(self.error(&format!(
                "expected {:?}, found {:?}",
                kind, self.current.kind
            )))
        }
    }

    /// Accepts an explicit `;`, or inserts one before `}`, end of input, or a
    /// line break.
    fn consume_semicolon(&mut self) -> Result<(), Error> {
        if self.check(&TokenKind::Semicolon) {
            self.advance();
            return Ok(());
        }
        if self.check(&TokenKind::RightBrace) || self.is_at_end() || self.current.newline_before {
            return Ok(());
        }
        Err(self.error(&format!(
            "expected ';', found {:?}",
            self.current.kind
        )))
    }

    fn expect_identifier(&mut self) -> Result<String, Error> {
        if let TokenKind::Identifier(name) = &self.current.kind {
            let name = name.clone();
            self.advance();
            Ok(name)
        } else {
            Err(self.error(&format!(
                "expected identifier, found {:?}",
                self.current.kind
            )))
        }
    }

    /// Property names may be reserved words.
    fn expect_property_name(&mut self) -> Result<String, Error> {
        if let Some(text) = self.current.kind.keyword_text() {
            self.advance();
            return Ok(text.to_string());
        }
        self.expect_identifier()
    }

    fn is_at_end(&self) -> bool {
        matches!(self.current.kind, TokenKind::Eof)
    }

    /// Left-associative operator chains are built iteratively but nest in
    /// the tree, so their length is capped like recursion depth.
    fn chain_step(&self, chained: &mut usize) -> Result<(), Error> {
        *chained += 1;
        if *chained > MAX_OPERATOR_CHAIN {
            return Err(self.error("too much nesting"));
        }
        Ok(())
    }

    fn check_nesting(&self) -> Result<(), Error> {
        if self.stack.exceeded() {
            return Err(self.error("too much nesting"));
        }
        Ok(())
    }

    fn error(&self, message: &str) -> Error {
        let Span { line, .. } = self.current.span;
        Error::SyntaxError(format!("line {}: {}", line, message))
    }
}

fn binary(operator: BinaryOperator, left: Expression, right: Expression) -> Expression {
    Expression::Binary {
        operator,
        left: Box::new(left),
        right: Box::new(right),
    }
}

impl Scanner<'_> {
    /// Looks past `<keyword> <identifier>` and returns the token after it.
    fn peek_token_after_identifier(&self) -> TokenKind {
        let mut scanner = self.clone();
        match scanner.next_token().kind {
            TokenKind::Identifier(_) => scanner.next_token().kind,
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_ok(src: &str) -> Program {
        let mut parser = Parser::new(src);
        parser.parse_program().unwrap()
    }

    fn parse_err(src: &str) -> Error {
        let mut parser = Parser::new(src);
        parser.parse_program().unwrap_err()
    }

    fn parse_expr(src: &str) -> Expression {
        let mut parser = Parser::new(src);
        parser.parse_expression().expect("should parse")
    }

    #[test]
    fn test_parse_module_wrapper() {
        let program = parse_ok(
            "(function (exports, require, module, __filename, __dirname) {\n\
             module.exports = require('./b').value + 1;\n})",
        );
        assert_eq!(program.body.len(), 1);
        let Statement::Expression(Expression::Function(function)) = &program.body[0] else {
            panic!("expected function expression");
        };
        assert_eq!(
            function.params,
            vec!["exports", "require", "module", "__filename", "__dirname"]
        );
        assert_eq!(function.body.len(), 1);
    }

    #[test]
    fn test_automatic_semicolons() {
        let program = parse_ok("var a = 1\nvar b = 2\na = b");
        assert_eq!(program.body.len(), 3);
        assert_eq!(program.var_names, vec!["a", "b"]);
    }

    #[test]
    fn test_missing_semicolon_on_one_line() {
        let err = parse_err("var a = 1 var b = 2;");
        assert!(matches!(err, Error::SyntaxError(msg) if msg.starts_with("line 1:")));
    }

    #[test]
    fn test_return_on_its_own_line() {
        let program = parse_ok("function f() { return\n42 }");
        let Statement::FunctionDeclaration(function) = &program.body[0] else {
            panic!("expected function declaration");
        };
        assert_eq!(function.body[0], Statement::Return(None));
    }

    #[test]
    fn test_var_hoisting_names() {
        let program = parse_ok(
            "if (x) { var a = 1; } for (var i = 0; i < 2; i++) {} \
             function f() { var inner; } try { var t; } catch (e) { var c; }",
        );
        assert_eq!(program.var_names, vec!["a", "i", "t", "c"]);
    }

    #[test]
    fn test_parse_precedence() {
        let expr = parse_expr("1 + 2 * 3");
        let Expression::Binary { operator, right, .. } = expr else {
            panic!("expected binary");
        };
        assert_eq!(operator, BinaryOperator::Add);
        assert!(matches!(
            *right,
            Expression::Binary {
                operator: BinaryOperator::Multiply,
                ..
            }
        ));
    }

    #[test]
    fn test_parse_arrow_functions() {
        assert!(matches!(parse_expr("x => x + 1"), Expression::Function(f) if f.is_arrow));
        assert!(matches!(parse_expr("(a, b) => { return a; }"), Expression::Function(f) if f.params.len() == 2));
        assert!(matches!(parse_expr("(a + b)"), Expression::Binary { .. }));
    }

    #[test]
    fn test_parse_new_with_member_callee() {
        let expr = parse_expr("new errors.Custom('x').message");
        let Expression::Member { object, .. } = expr else {
            panic!("expected member");
        };
        assert!(matches!(*object, Expression::New { ref arguments, .. } if arguments.len() == 1));
    }

    #[test]
    fn test_parse_object_literal_forms() {
        let expr = parse_expr("{ a: 1, 'b c': 2, 3: 4, d, default: 5, f() { return 1; } }");
        let Expression::Object(props) = expr else {
            panic!("expected object");
        };
        let keys: Vec<_> = props.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["a", "b c", "3", "d", "default", "f"]);
    }

    #[test]
    fn test_parse_for_in() {
        let program = parse_ok("for (var k in obj) { keys.push(k); } for (k in obj) {}");
        assert!(matches!(&program.body[0], Statement::ForIn(s) if s.kind == Some(VariableKind::Var)));
        assert!(matches!(&program.body[1], Statement::ForIn(s) if s.kind.is_none()));
    }

    #[test]
    fn test_invalid_assignment_target() {
        assert!(matches!(parse_err("1 = 2;"), Error::SyntaxError(_)));
    }

    #[test]
    fn test_const_requires_initializer() {
        assert!(matches!(parse_err("const a;"), Error::SyntaxError(_)));
    }

    #[test]
    fn test_deep_nesting_is_a_syntax_error() {
        let source = format!("{}1{}", "(".repeat(100_000), ")".repeat(100_000));
        let err = parse_err(&source);
        assert!(err.to_string().contains("too much nesting"));
    }

    #[test]
    fn test_operator_chain_is_capped() {
        let long = format!("x = 1{};", " + 1".repeat(MAX_OPERATOR_CHAIN + 1));
        assert!(parse_err(&long).to_string().contains("too much nesting"));

        let short = format!("x = 1{};", " + 1".repeat(MAX_OPERATOR_CHAIN));
        parse_ok(&short);
    }

    #[test]
    fn test_moderate_nesting_parses() {
        let source = format!("x = {}1{};", "[".repeat(20), "]".repeat(20));
        parse_ok(&source);
    }

    #[test]
    fn test_keyword_property_names() {
        let expr = parse_expr("process.stdout.write");
        assert!(matches!(expr, Expression::Member { .. }));
        let expr = parse_expr("obj.delete");
        assert!(matches!(
            expr,
            Expression::Member { property: MemberProperty::Identifier(ref p), .. } if p == "delete"
        ));
    }
}
