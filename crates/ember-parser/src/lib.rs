//! Ember parser.
//!
//! Pratt (precedence-climbing) parser over the token stream: a prefix handler
//! per token kind starts an expression, infix handlers extend it while the
//! next token binds tighter than the caller. Statements are recognised by
//! their leading keyword (`break`, `continue`, `return`); everything else is
//! an expression statement. On error the parser records a diagnostic and
//! skips ahead to a synchronising keyword.

use std::rc::Rc;

use ember_ast as ast;
use ember_ast::{Block, FunctionLiteral, FunctionParameter, Ident, MatchWhen};
use ember_diagnostics::Diagnostics;
use ember_lexer::{Lexer, Token, TokenKind};

/// Binding powers, lowest first. `&&`/`||` recurse at one level lower to get
/// right associativity; everything else is left-associative.
mod prec {
    pub const LOWEST: u8 = 1;
    pub const ASSIGN: u8 = 2;
    pub const PIPE: u8 = 3;
    pub const ARROW: u8 = 4;
    pub const TERNARY: u8 = 5;
    pub const BOOLEAN: u8 = 6;
    pub const BITWISE: u8 = 7;
    pub const COMPARISON: u8 = 8;
    pub const RANGE: u8 = 9;
    pub const BITSHIFT: u8 = 10;
    pub const SUM: u8 = 11;
    pub const PRODUCT: u8 = 12;
    pub const EXPONENTIAL: u8 = 13;
    pub const PREFIX: u8 = 14;
    pub const CALL: u8 = 15;
    pub const INDEX: u8 = 16;
    pub const AS: u8 = 17;
}

fn precedence_of(kind: TokenKind) -> u8 {
    use TokenKind::*;
    match kind {
        Assign | PlusAssign | MinusAssign | StarAssign | SlashAssign | Is => prec::ASSIGN,
        Pipe => prec::PIPE,
        Arrow => prec::ARROW,
        Question => prec::TERNARY,
        Or | And => prec::BOOLEAN,
        BitOr | BitAnd | BitNot => prec::BITWISE,
        Equal | NotEqual | Less | LessEqual | Greater | GreaterEqual => prec::COMPARISON,
        Range => prec::RANGE,
        ShiftLeft | ShiftRight => prec::BITSHIFT,
        Plus | Minus => prec::SUM,
        Star | Slash | Percent => prec::PRODUCT,
        Power => prec::EXPONENTIAL,
        Dot | LParen => prec::CALL,
        LBracket => prec::INDEX,
        As => prec::AS,
        _ => prec::LOWEST,
    }
}

fn has_infix(kind: TokenKind) -> bool {
    use TokenKind::*;
    matches!(
        kind,
        Assign
            | PlusAssign
            | MinusAssign
            | StarAssign
            | SlashAssign
            | Dot
            | LParen
            | LBracket
            | Pipe
            | Arrow
            | Question
            | Is
            | As
            | Range
            | Plus
            | Minus
            | Slash
            | Star
            | Percent
            | Power
            | Equal
            | NotEqual
            | Less
            | LessEqual
            | Greater
            | GreaterEqual
            | Or
            | And
            | BitAnd
            | BitOr
            | ShiftLeft
            | ShiftRight
    )
}

pub struct Parser {
    lexer: Lexer,
    token: Token,
    peek: Token,
    diags: Diagnostics,
}

/// Lex and parse a whole source buffer, reporting into `diags`.
pub fn parse_source(source: &[u8], diags: &Diagnostics) -> ast::Program {
    let lexer = Lexer::new(source, diags.clone());
    Parser::new(lexer, diags.clone()).parse()
}

impl Parser {
    pub fn new(lexer: Lexer, diags: Diagnostics) -> Self {
        let mut parser = Self {
            lexer,
            token: Token::eof(),
            peek: Token::eof(),
            diags,
        };
        parser.advance();
        parser.advance();
        parser
    }

    pub fn parse(mut self) -> ast::Program {
        let mut program = ast::Program::default();
        while !self.at(&[TokenKind::Eof]) {
            if let Some(statement) = self.parse_statement() {
                program.statements.push(statement);
            }
            self.advance();
        }
        program
    }

    fn advance(&mut self) {
        let next = self.lexer.next_token();
        self.token = std::mem::replace(&mut self.peek, next);
    }

    fn at(&self, kinds: &[TokenKind]) -> bool {
        kinds.contains(&self.token.kind)
    }

    fn peek_at(&self, kinds: &[TokenKind]) -> bool {
        kinds.contains(&self.peek.kind)
    }

    fn error(&mut self, message: impl Into<String>) {
        self.diags.parse_error(self.token.position, message);
        self.synchronize();
    }

    /// Skip ahead to a statement-ish keyword so one mistake doesn't cascade.
    fn synchronize(&mut self) {
        use TokenKind::*;
        while !self.at(&[Eof]) {
            match self.token.kind {
                Val | If | Repeat | Match | When | Else | Return | Function | Module => return,
                _ => {}
            }
            self.advance();
        }
    }

    // ===================== Statements =====================

    fn parse_statement(&mut self) -> Option<ast::Stmt> {
        match self.token.kind {
            TokenKind::Comment | TokenKind::Newline => None,
            TokenKind::Break => Some(ast::Stmt::Break {
                token: self.token.clone(),
            }),
            TokenKind::Continue => Some(ast::Stmt::Continue {
                token: self.token.clone(),
            }),
            TokenKind::Return => self.parse_return(),
            _ => self.parse_expression_statement(),
        }
    }

    fn parse_return(&mut self) -> Option<ast::Stmt> {
        let token = self.token.clone();
        self.advance();
        let value = self.parse_expression(prec::LOWEST)?;
        Some(ast::Stmt::Return { token, value })
    }

    fn parse_expression_statement(&mut self) -> Option<ast::Stmt> {
        let token = self.token.clone();
        let expression = self.parse_expression(prec::LOWEST)?;
        Some(ast::Stmt::Expression { token, expression })
    }

    /// Statements up to (not including) the closing `end`.
    fn parse_block_body(&mut self) -> Block {
        let token = self.token.clone();
        let mut statements = Vec::new();
        self.advance();
        while !self.at(&[TokenKind::End, TokenKind::Eof]) {
            if let Some(statement) = self.parse_statement() {
                statements.push(statement);
            }
            self.advance();
        }
        Block { token, statements }
    }

    // ===================== Expressions =====================

    fn parse_expression(&mut self, precedence: u8) -> Option<ast::Expr> {
        let mut left = self.parse_prefix()?;
        while precedence < precedence_of(self.peek.kind) {
            if !has_infix(self.peek.kind) {
                return Some(left);
            }
            self.advance();
            left = self.parse_infix(left)?;
        }
        Some(left)
    }

    fn parse_prefix(&mut self) -> Option<ast::Expr> {
        use TokenKind::*;
        match self.token.kind {
            Val => self.parse_val(),
            Var => self.parse_var(),
            Module => self.parse_module(),
            If => self.parse_if(),
            Match => self.parse_match(),
            Repeat => self.parse_repeat(),
            Function => self.parse_function(),
            Use => self.parse_use(),
            LBracket => self.parse_enumerable(),
            Identifier => Some(ast::Expr::Identifier(Ident::new(self.token.clone()))),
            Integer => self.parse_integer(),
            Float => self.parse_float(),
            String => Some(ast::Expr::Str {
                value: self.token.literal.clone(),
                token: self.token.clone(),
            }),
            Boolean => Some(ast::Expr::Boolean {
                value: self.token.literal == "true",
                token: self.token.clone(),
            }),
            Nil => Some(ast::Expr::Nil {
                token: self.token.clone(),
            }),
            Underscore => Some(ast::Expr::PlaceHolder {
                token: self.token.clone(),
            }),
            Colon => self.parse_symbol(),
            Bang | BitNot | Minus => self.parse_prefix_operator(),
            LParen => self.parse_group(),
            _ => {
                let literal = self.token.literal.clone();
                self.error(format!("Unexpected expression '{}'", literal));
                None
            }
        }
    }

    fn parse_infix(&mut self, left: ast::Expr) -> Option<ast::Expr> {
        use TokenKind::*;
        match self.token.kind {
            Assign | PlusAssign | MinusAssign | StarAssign | SlashAssign => {
                self.parse_assign(left)
            }
            Dot => self.parse_module_access(left),
            LParen => self.parse_call(left),
            LBracket => self.parse_subscript(left),
            Pipe => self.parse_pipe(left),
            Arrow => self.parse_arrow_function(left),
            Question => self.parse_ternary(left),
            Is => self.parse_is(left),
            As => self.parse_as(left),
            Or | And => self.parse_infix_right(left),
            _ => self.parse_infix_operator(left),
        }
    }

    fn parse_integer(&mut self) -> Option<ast::Expr> {
        let token = self.token.clone();
        let literal = token.literal.clone();
        let parsed = if let Some(rest) = literal.strip_prefix("0b") {
            i64::from_str_radix(rest, 2)
        } else if let Some(rest) = literal.strip_prefix("0x") {
            i64::from_str_radix(rest, 16)
        } else if let Some(rest) = literal.strip_prefix("0o") {
            i64::from_str_radix(rest, 8)
        } else {
            literal.parse::<i64>()
        };
        match parsed {
            Ok(value) => Some(ast::Expr::Integer { token, value }),
            Err(_) => {
                self.error(format!("Couldn't parse {} as Integer", literal));
                None
            }
        }
    }

    fn parse_float(&mut self) -> Option<ast::Expr> {
        let token = self.token.clone();
        match token.literal.parse::<f64>() {
            Ok(value) => Some(ast::Expr::Float { token, value }),
            Err(_) => {
                let literal = token.literal.clone();
                self.error(format!("Couldn't parse {} as Float", literal));
                None
            }
        }
    }

    fn parse_symbol(&mut self) -> Option<ast::Expr> {
        self.advance();
        if !self.at(&[TokenKind::Identifier]) {
            self.error("Symbol expects an identifier");
            return None;
        }
        Some(ast::Expr::Symbol {
            value: self.token.literal.clone(),
            token: self.token.clone(),
        })
    }

    fn parse_val(&mut self) -> Option<ast::Expr> {
        let token = self.token.clone();
        if !self.peek_at(&[TokenKind::Identifier]) {
            self.error("VAL expects an identifier");
            return None;
        }
        self.advance();
        let name = Ident::new(self.token.clone());
        if !self.peek_at(&[TokenKind::Assign]) {
            self.error("Missing assignment in VAL");
            return None;
        }
        self.advance();
        self.advance();
        let value = self.parse_expression(prec::LOWEST)?;
        Some(ast::Expr::Val {
            token,
            name,
            value: Box::new(value),
        })
    }

    fn parse_var(&mut self) -> Option<ast::Expr> {
        let token = self.token.clone();
        if !self.peek_at(&[TokenKind::Identifier]) {
            self.error("VAR expects an identifier");
            return None;
        }
        self.advance();
        let name = Ident::new(self.token.clone());
        if !self.peek_at(&[TokenKind::Assign]) {
            self.error("Missing assignment in VAR");
            return None;
        }
        self.advance();
        self.advance();
        let value = self.parse_expression(prec::LOWEST)?;
        Some(ast::Expr::Var {
            token,
            name,
            value: Box::new(value),
        })
    }

    fn parse_module(&mut self) -> Option<ast::Expr> {
        let token = self.token.clone();
        if !self.peek_at(&[TokenKind::Identifier]) {
            self.error("Expecting an identifier as MODULE name");
            return None;
        }
        self.advance();
        let name = Ident::new(self.token.clone());
        let body = self.parse_block_body();
        if !self.at(&[TokenKind::End]) {
            self.error("Missing END closing statement in MODULE");
            return None;
        }
        Some(ast::Expr::Module {
            token,
            name,
            body: Rc::new(body),
        })
    }

    fn parse_module_access(&mut self, left: ast::Expr) -> Option<ast::Expr> {
        let token = self.token.clone();
        match left {
            ast::Expr::Identifier(object) => {
                if !self.peek_at(&[TokenKind::Identifier]) {
                    self.error("Expecting an identifier as MODULE member");
                    return None;
                }
                self.advance();
                let member = Ident::new(self.token.clone());
                Some(ast::Expr::ModuleAccess {
                    token,
                    object,
                    member,
                })
            }
            other => {
                let literal = other.token().literal.clone();
                self.error(format!("Cannot use '{}' as MODULE caller", literal));
                None
            }
        }
    }

    fn parse_if(&mut self) -> Option<ast::Expr> {
        let token = self.token.clone();
        self.advance();
        let condition = match self.parse_expression(prec::LOWEST) {
            Some(condition) => condition,
            None => {
                self.error("Missing condition expression in IF");
                return None;
            }
        };
        self.advance();
        if self.at(&[TokenKind::Then, TokenKind::Do]) {
            self.advance();
        }
        let block_token = self.token.clone();
        let mut statements = Vec::new();
        while !self.at(&[TokenKind::End, TokenKind::Else, TokenKind::Eof]) {
            if let Some(statement) = self.parse_statement() {
                statements.push(statement);
            }
            self.advance();
        }
        if statements.is_empty() {
            self.error("Empty body in IF");
            return None;
        }
        let then = Block {
            token: block_token,
            statements,
        };
        let mut alternative = None;
        if self.at(&[TokenKind::Else]) {
            let body = self.parse_block_body();
            if body.statements.is_empty() {
                self.error("Empty ELSE body in IF");
                return None;
            }
            alternative = Some(body);
        }
        if !self.at(&[TokenKind::End]) {
            self.error("Missing END closing statement in IF");
            return None;
        }
        Some(ast::Expr::If {
            token,
            condition: Box::new(condition),
            then,
            alternative,
        })
    }

    fn parse_match(&mut self) -> Option<ast::Expr> {
        let token = self.token.clone();
        self.advance();
        let control = if self.at(&[TokenKind::With, TokenKind::Newline]) {
            None
        } else {
            let control = self.parse_expression(prec::LOWEST)?;
            self.advance();
            Some(Box::new(control))
        };
        if !self.at(&[TokenKind::With, TokenKind::Newline]) {
            self.error("Missing WITH statement in inline MATCH");
        }
        self.advance();
        let mut whens = Vec::new();
        let mut alternative = None;
        while !self.at(&[TokenKind::End, TokenKind::Eof]) {
            match self.token.kind {
                TokenKind::When => {
                    let when_token = self.token.clone();
                    self.advance();
                    let values =
                        self.parse_delimited(TokenKind::Comma, &[TokenKind::Newline, TokenKind::Then]);
                    if values.is_empty() {
                        self.error("Missing expression in MATCH WHEN");
                    } else {
                        let body = self.parse_when_body();
                        whens.push(MatchWhen {
                            token: when_token,
                            values,
                            body,
                        });
                    }
                }
                TokenKind::Else => {
                    if !self.peek_at(&[TokenKind::Then, TokenKind::Newline]) {
                        self.error("ELSE when in MATCH can't have parameters");
                        return None;
                    }
                    self.advance();
                    let body = self.parse_when_body();
                    if body.statements.is_empty() {
                        self.error("Missing ELSE when body in MATCH");
                        return None;
                    }
                    alternative = Some(body);
                }
                _ => {}
            }
            self.advance();
        }
        if !self.at(&[TokenKind::End]) {
            self.error("Missing END closing statement in MATCH");
            return None;
        }
        Some(ast::Expr::Match {
            token,
            control,
            whens,
            alternative,
        })
    }

    fn parse_when_body(&mut self) -> Block {
        let token = self.token.clone();
        let mut statements = Vec::new();
        while !self.peek_at(&[
            TokenKind::When,
            TokenKind::Else,
            TokenKind::End,
            TokenKind::Eof,
        ]) {
            self.advance();
            if let Some(statement) = self.parse_statement() {
                statements.push(statement);
            }
        }
        Block { token, statements }
    }

    fn parse_repeat(&mut self) -> Option<ast::Expr> {
        let token = self.token.clone();
        let mut collected: Vec<Ident> = Vec::new();
        let mut arguments = Vec::new();
        let mut enumerable = None;
        self.advance();
        while !self.at(&[TokenKind::Do, TokenKind::Newline, TokenKind::Eof]) {
            match self.token.kind {
                TokenKind::Comma => {}
                TokenKind::In => {
                    self.advance();
                    arguments = std::mem::take(&mut collected);
                    match self.parse_expression(prec::LOWEST) {
                        Some(expression) => enumerable = Some(Box::new(expression)),
                        None => {
                            self.error("Missing enumerable in REPEAT loop");
                            return None;
                        }
                    }
                    break;
                }
                _ => collected.push(Ident::new(self.token.clone())),
            }
            self.advance();
        }
        if self.peek_at(&[TokenKind::Do]) {
            self.advance();
        }
        let body = self.parse_block_body();
        if body.statements.is_empty() {
            self.error("Empty body in REPEAT loop");
            return None;
        }
        if !self.at(&[TokenKind::End]) {
            self.error("Missing END closing statement in REPEAT loop");
            return None;
        }
        Some(ast::Expr::Repeat {
            token,
            arguments,
            enumerable,
            body,
        })
    }

    fn parse_function(&mut self) -> Option<ast::Expr> {
        let token = self.token.clone();
        let mut parameters = Vec::new();
        let mut return_type = None;
        let mut variadic = false;
        self.advance();
        while !self.at(&[TokenKind::Do, TokenKind::Newline]) {
            match self.token.kind {
                TokenKind::LParen | TokenKind::RParen => {}
                TokenKind::Comma => {
                    if variadic {
                        self.error("Variadic argument in function should be the last parameter");
                        return None;
                    }
                }
                TokenKind::Ellipsis => {
                    if variadic {
                        self.error("Function expects only 1 variadic argument");
                        return None;
                    }
                    if !self.peek_at(&[TokenKind::Identifier]) {
                        self.error("Variadic argument in function expects an identifier");
                        return None;
                    }
                    variadic = true;
                }
                TokenKind::Eof => {
                    self.error("Missing body in function");
                    return None;
                }
                TokenKind::Arrow => {
                    if self.peek_at(&[TokenKind::Identifier]) {
                        self.advance();
                        return_type = Some(Ident::new(self.token.clone()));
                        if !self.peek_at(&[TokenKind::Do, TokenKind::Newline]) {
                            // inline body directly after the return type
                            break;
                        }
                    } else {
                        self.error("Function expecting a return type");
                    }
                }
                TokenKind::Identifier => {
                    let param_token = self.token.clone();
                    let name = Ident::new(self.token.clone());
                    let mut param_type = None;
                    let mut default = None;
                    if self.peek_at(&[TokenKind::Colon]) {
                        self.advance();
                        if self.peek_at(&[TokenKind::Identifier]) {
                            self.advance();
                            param_type = Some(Ident::new(self.token.clone()));
                        } else {
                            self.error(format!(
                                "Function parameter '{}' expects a type",
                                name.value
                            ));
                            return None;
                        }
                    }
                    if self.peek_at(&[TokenKind::Assign]) {
                        self.advance();
                        self.advance();
                        default = self.parse_expression(prec::LOWEST);
                    }
                    parameters.push(FunctionParameter {
                        token: param_token,
                        name,
                        param_type,
                        default,
                    });
                }
                _ => {
                    let literal = self.token.literal.clone();
                    self.error(format!("Unexpected token '{}' as function parameter", literal));
                    return None;
                }
            }
            self.advance();
        }
        let body = self.parse_block_body();
        if body.statements.is_empty() {
            self.error("Empty body in function");
            return None;
        }
        if !self.at(&[TokenKind::End]) {
            self.error("Missing END statement in function");
            return None;
        }
        Some(ast::Expr::Function(Rc::new(FunctionLiteral {
            token,
            parameters,
            body,
            return_type,
            variadic,
        })))
    }

    fn parse_arrow_function(&mut self, left: ast::Expr) -> Option<ast::Expr> {
        let token = self.token.clone();
        let mut parameters = Vec::new();
        match left {
            ast::Expr::Identifier(ident) => parameters.push(FunctionParameter {
                token: token.clone(),
                name: ident,
                param_type: None,
                default: None,
            }),
            ast::Expr::List { elements, .. } => {
                for element in elements {
                    match element {
                        ast::Expr::Identifier(ident) => parameters.push(FunctionParameter {
                            token: token.clone(),
                            name: ident,
                            param_type: None,
                            default: None,
                        }),
                        _ => {
                            self.error("Arrow function expects a list of identifiers as arguments");
                            return None;
                        }
                    }
                }
            }
            _ => {
                self.error("Arrow function expects identifiers as arguments");
                return None;
            }
        }
        self.advance();
        let body_token = self.token.clone();
        let statement = self.parse_expression_statement()?;
        let body = Block {
            token: body_token,
            statements: vec![statement],
        };
        Some(ast::Expr::Function(Rc::new(FunctionLiteral {
            token,
            parameters,
            body,
            return_type: None,
            variadic: false,
        })))
    }

    fn parse_call(&mut self, function: ast::Expr) -> Option<ast::Expr> {
        let token = self.token.clone();
        self.advance();
        let arguments = self.parse_delimited(TokenKind::Comma, &[TokenKind::RParen]);
        Some(ast::Expr::Call {
            token,
            function: Box::new(function),
            arguments,
        })
    }

    fn parse_subscript(&mut self, left: ast::Expr) -> Option<ast::Expr> {
        let token = self.token.clone();
        self.advance();
        if self.at(&[TokenKind::RBracket]) {
            let index = ast::Expr::PlaceHolder {
                token: self.token.clone(),
            };
            return Some(ast::Expr::Subscript {
                token,
                left: Box::new(left),
                index: Box::new(index),
            });
        }
        if self.at(&[TokenKind::Underscore]) {
            let index = ast::Expr::PlaceHolder {
                token: self.token.clone(),
            };
            self.advance();
            return Some(ast::Expr::Subscript {
                token,
                left: Box::new(left),
                index: Box::new(index),
            });
        }
        let index = self.parse_expression(prec::LOWEST)?;
        if !self.peek_at(&[TokenKind::RBracket]) {
            self.error("Missing closing ] in subscript expression");
            return None;
        }
        self.advance();
        Some(ast::Expr::Subscript {
            token,
            left: Box::new(left),
            index: Box::new(index),
        })
    }

    fn parse_pipe(&mut self, left: ast::Expr) -> Option<ast::Expr> {
        let token = self.token.clone();
        self.advance();
        let right = self.parse_expression(prec::PIPE)?;
        Some(ast::Expr::Pipe {
            token,
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    fn parse_ternary(&mut self, left: ast::Expr) -> Option<ast::Expr> {
        let token = self.token.clone();
        self.advance();
        let then_token = self.token.clone();
        let then = match self.parse_expression(prec::LOWEST) {
            Some(then) => then,
            None => {
                self.error("Missing THEN condition in ternary operator");
                return None;
            }
        };
        self.advance();
        if !self.at(&[TokenKind::Colon]) {
            self.error("Ternary operator expects an else (:) expression");
            return None;
        }
        self.advance();
        let alt_token = self.token.clone();
        let alternative = match self.parse_expression(prec::LOWEST) {
            Some(alternative) => alternative,
            None => {
                self.error("Missing ELSE condition in ternary operator");
                return None;
            }
        };
        Some(ast::Expr::If {
            token,
            condition: Box::new(left),
            then: Block {
                token: then_token.clone(),
                statements: vec![ast::Stmt::Expression {
                    token: then_token,
                    expression: then,
                }],
            },
            alternative: Some(Block {
                token: alt_token.clone(),
                statements: vec![ast::Stmt::Expression {
                    token: alt_token,
                    expression: alternative,
                }],
            }),
        })
    }

    fn parse_assign(&mut self, left: ast::Expr) -> Option<ast::Expr> {
        let token = self.token.clone();
        let operator = token.literal.clone();
        match &left {
            ast::Expr::Identifier(_) => {}
            ast::Expr::Subscript { left: base, .. }
                if matches!(**base, ast::Expr::Identifier(_)) => {}
            _ => {
                self.error("Assignment operator expects an identifier");
                return None;
            }
        }
        self.advance();
        let right = self.parse_expression(prec::LOWEST)?;
        let right = match operator.as_str() {
            "+=" | "-=" | "*=" | "/=" => ast::Expr::Infix {
                token: token.clone(),
                operator: operator[..1].to_string(),
                left: Box::new(left.clone()),
                right: Box::new(right),
            },
            _ => right,
        };
        Some(ast::Expr::Assign {
            token,
            operator,
            target: Box::new(left),
            value: Box::new(right),
        })
    }

    fn parse_is(&mut self, left: ast::Expr) -> Option<ast::Expr> {
        let token = self.token.clone();
        self.advance();
        if !self.at(&[TokenKind::Identifier]) {
            self.error("IS operator expects a type");
            return None;
        }
        Some(ast::Expr::Is {
            token,
            left: Box::new(left),
            type_name: Ident::new(self.token.clone()),
        })
    }

    fn parse_as(&mut self, left: ast::Expr) -> Option<ast::Expr> {
        let token = self.token.clone();
        self.advance();
        if !self.at(&[TokenKind::Identifier]) {
            self.error("AS operator expects a type");
            return None;
        }
        Some(ast::Expr::As {
            token,
            left: Box::new(left),
            type_name: Ident::new(self.token.clone()),
        })
    }

    fn parse_use(&mut self) -> Option<ast::Expr> {
        let token = self.token.clone();
        self.advance();
        if !self.at(&[TokenKind::String, TokenKind::Identifier]) {
            self.error("USE expects a string or identifier as filename");
            return None;
        }
        Some(ast::Expr::Use {
            file: self.token.literal.clone(),
            token,
        })
    }

    fn parse_enumerable(&mut self) -> Option<ast::Expr> {
        let token = self.token.clone();
        self.advance();
        let mut list = Vec::new();
        let mut is_dictionary = false;
        while !self.at(&[TokenKind::RBracket]) {
            match self.token.kind {
                TokenKind::Newline | TokenKind::Eof => {
                    self.error("Missing closing ']' in enumerable");
                    return None;
                }
                TokenKind::FatArrow => is_dictionary = true,
                TokenKind::Comma => {}
                _ => {
                    let expression = self.parse_expression(prec::LOWEST)?;
                    list.push(expression);
                }
            }
            self.advance();
        }
        if !is_dictionary {
            return Some(ast::Expr::Array {
                token,
                elements: list,
            });
        }
        if list.len() % 2 == 1 {
            self.error("Dictionary expects elements as Key => Value");
            return None;
        }
        let mut pairs = Vec::new();
        let mut iter = list.into_iter();
        while let (Some(key), Some(value)) = (iter.next(), iter.next()) {
            pairs.push((key, value));
        }
        Some(ast::Expr::Dictionary { token, pairs })
    }

    fn parse_group(&mut self) -> Option<ast::Expr> {
        let token = self.token.clone();
        self.advance();
        let expression = self.parse_expression(prec::LOWEST)?;
        if self.peek_at(&[TokenKind::Comma]) {
            self.advance();
            let mut elements = vec![expression];
            elements.extend(self.parse_delimited(TokenKind::Comma, &[TokenKind::RParen]));
            return Some(ast::Expr::List { token, elements });
        }
        if !self.peek_at(&[TokenKind::RParen]) {
            self.error("Missing closing ')' for grouped expression");
            return None;
        }
        self.advance();
        Some(expression)
    }

    fn parse_prefix_operator(&mut self) -> Option<ast::Expr> {
        let token = self.token.clone();
        let operator = token.literal.clone();
        self.advance();
        let right = self.parse_expression(prec::PREFIX)?;
        Some(ast::Expr::Prefix {
            token,
            operator,
            right: Box::new(right),
        })
    }

    fn parse_infix_operator(&mut self, left: ast::Expr) -> Option<ast::Expr> {
        let token = self.token.clone();
        let operator = token.literal.clone();
        let precedence = precedence_of(token.kind);
        self.advance();
        let right = self.parse_expression(precedence)?;
        Some(ast::Expr::Infix {
            token,
            operator,
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    /// Right-associative variant used by `&&`/`||`: recurse one level lower.
    fn parse_infix_right(&mut self, left: ast::Expr) -> Option<ast::Expr> {
        let token = self.token.clone();
        let operator = token.literal.clone();
        let precedence = precedence_of(token.kind);
        self.advance();
        let right = self.parse_expression(precedence - 1)?;
        Some(ast::Expr::Infix {
            token,
            operator,
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    fn parse_delimited(&mut self, delimiter: TokenKind, ends: &[TokenKind]) -> Vec<ast::Expr> {
        let mut list = Vec::new();
        while !self.at(ends) {
            if self.token.kind == delimiter {
                // separator
            } else if self.at(&[TokenKind::Newline, TokenKind::Eof]) {
                self.error("Missing closing delimiter in expression list");
                return list;
            } else {
                match self.parse_expression(prec::LOWEST) {
                    Some(expression) => list.push(expression),
                    None => {
                        let literal = self.token.literal.clone();
                        self.error(format!("Unexpected '{}' in expression list", literal));
                        return list;
                    }
                }
            }
            self.advance();
        }
        list
    }
}
