//! Ember tree-walking evaluator.
//!
//! `Interpreter::eval` dispatches on AST node kinds against a lexically-scoped
//! environment. The first call evaluates the embedded prelude into the root
//! scope. Failures are reported into the shared diagnostics sink and surface
//! as `Flow::None`, which short-circuits the enclosing block; `return`,
//! `break` and `continue` travel as `Flow` variants until a function or loop
//! boundary consumes them.

pub mod builtins;
pub mod meta;
pub mod prelude;
pub mod scope;
pub mod value;

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::rc::Rc;

use ember_ast as ast;
use ember_diagnostics::{Diagnostics, Position};
use ember_lexer::Token;
use ember_parser::parse_source;

pub use scope::Scope;
pub use value::{Flow, Value};

use value::{DictPairs, FunctionValue};

pub struct Interpreter {
    modules: HashMap<String, Rc<ast::Block>>,
    module_cache: HashMap<String, HashMap<String, Value>>,
    use_cache: HashMap<String, Value>,
    immutable: HashSet<String>,
    prelude_loaded: bool,
    diags: Diagnostics,
}

impl Interpreter {
    pub fn new(diags: Diagnostics) -> Self {
        Self {
            modules: HashMap::new(),
            module_cache: HashMap::new(),
            use_cache: HashMap::new(),
            immutable: HashSet::new(),
            prelude_loaded: false,
            diags,
        }
    }

    /// Evaluate a parsed program. The prelude is evaluated into `scope` first,
    /// once per interpreter.
    pub fn eval(&mut self, program: &ast::Program, scope: &Rc<Scope>) -> Flow {
        if !self.load_prelude(scope) {
            return Flow::None;
        }
        self.eval_program(program, scope)
    }

    /// Lex, parse and evaluate a source buffer in one go.
    pub fn eval_source(&mut self, source: &[u8], scope: &Rc<Scope>) -> Flow {
        let program = parse_source(source, &self.diags);
        if self.diags.has_errors() {
            return Flow::None;
        }
        self.eval(&program, scope)
    }

    fn load_prelude(&mut self, scope: &Rc<Scope>) -> bool {
        if self.prelude_loaded {
            return true;
        }
        self.prelude_loaded = true;
        for source in prelude::MODULES {
            let program = parse_source(source.as_bytes(), &self.diags);
            if self.diags.has_errors() {
                self.error(Position::default(), "Problem parsing Standard Library module");
                return false;
            }
            self.eval_program(&program, scope);
            if self.diags.has_errors() {
                self.error(
                    Position::default(),
                    "Problem evaluating Standard Library module",
                );
                return false;
            }
        }
        true
    }

    fn error(&self, position: Position, message: impl Into<String>) {
        self.diags.runtime_error(position, message);
    }

    // ===================== Statements and blocks =====================

    fn eval_program(&mut self, program: &ast::Program, scope: &Rc<Scope>) -> Flow {
        let mut result = Flow::None;
        for statement in &program.statements {
            result = self.eval_statement(statement, scope);
        }
        result
    }

    fn eval_statement(&mut self, statement: &ast::Stmt, scope: &Rc<Scope>) -> Flow {
        match statement {
            ast::Stmt::Break { .. } => Flow::Break,
            ast::Stmt::Continue { .. } => Flow::Continue,
            ast::Stmt::Return { value, .. } => match self.eval_expression(value, scope) {
                Flow::Value(value) => Flow::Return(value),
                other => other,
            },
            ast::Stmt::Expression { expression, .. } => self.eval_expression(expression, scope),
        }
    }

    fn eval_block(&mut self, block: &ast::Block, scope: &Rc<Scope>) -> Flow {
        let mut result = Flow::None;
        for statement in &block.statements {
            result = self.eval_statement(statement, scope);
            match result {
                Flow::None => return Flow::None,
                Flow::Break | Flow::Continue | Flow::Return(_) => return result,
                Flow::Value(_) => {}
            }
        }
        result
    }

    // ===================== Expressions =====================

    fn eval_expression(&mut self, expression: &ast::Expr, scope: &Rc<Scope>) -> Flow {
        match expression {
            ast::Expr::Boolean { value, .. } => Flow::Value(Value::Boolean(*value)),
            ast::Expr::Str { value, .. } => Flow::Value(Value::Str(value.clone())),
            ast::Expr::Integer { value, .. } => Flow::Value(Value::Integer(*value)),
            ast::Expr::Float { value, .. } => Flow::Value(Value::Float(*value)),
            ast::Expr::Symbol { value, .. } => Flow::Value(Value::Symbol(value.clone())),
            ast::Expr::Nil { .. } => Flow::Value(Value::Nil),
            ast::Expr::PlaceHolder { .. } => Flow::Value(Value::PlaceHolder),
            ast::Expr::Identifier(ident) => self.eval_identifier(ident, scope),
            ast::Expr::List { token, .. } => {
                self.error(token.position, "Expression list is not a value");
                Flow::None
            }
            ast::Expr::Array { elements, .. } => self.eval_array(elements, scope),
            ast::Expr::Dictionary { pairs, .. } => self.eval_dictionary(pairs, scope),
            ast::Expr::Val {
                name, value, ..
            } => self.eval_val(name, value, scope),
            ast::Expr::Var {
                name, value, ..
            } => self.eval_var(name, value, scope),
            ast::Expr::Assign {
                token,
                target,
                value,
                ..
            } => self.eval_assign(token, target, value, scope),
            ast::Expr::If {
                condition,
                then,
                alternative,
                ..
            } => self.eval_if(condition, then, alternative.as_ref(), scope),
            ast::Expr::Match {
                token,
                control,
                whens,
                alternative,
            } => self.eval_match(token, control.as_deref(), whens, alternative.as_ref(), scope),
            ast::Expr::Repeat {
                token,
                arguments,
                enumerable,
                body,
            } => self.eval_repeat(token, arguments, enumerable.as_deref(), body, scope),
            ast::Expr::Function(literal) => Flow::Value(Value::Function(Rc::new(FunctionValue {
                literal: literal.clone(),
                scope: Scope::from(scope),
            }))),
            ast::Expr::Call {
                token,
                function,
                arguments,
            } => self.eval_call(token, function, arguments, scope),
            ast::Expr::Module { token, name, body } => self.eval_module(token, name, body),
            ast::Expr::ModuleAccess {
                token,
                object,
                member,
            } => self.eval_module_access(token, object, member, scope),
            ast::Expr::Subscript {
                token,
                left,
                index,
            } => self.eval_subscript(token, left, index, scope),
            ast::Expr::Pipe { token, left, right } => self.eval_pipe(token, left, right, scope),
            ast::Expr::Is {
                token,
                left,
                type_name,
            } => self.eval_is(token, left, type_name, scope),
            ast::Expr::As {
                token,
                left,
                type_name,
            } => self.eval_as(token, left, type_name, scope),
            ast::Expr::Use { token, file } => self.eval_use(token, file, scope),
            ast::Expr::Prefix {
                token,
                operator,
                right,
            } => self.eval_prefix(token, operator, right, scope),
            ast::Expr::Infix {
                token,
                operator,
                left,
                right,
            } => self.eval_infix(token, operator, left, right, scope),
        }
    }

    fn eval_identifier(&mut self, ident: &ast::Ident, scope: &Rc<Scope>) -> Flow {
        match scope.read(&ident.value) {
            Some(value) => Flow::Value(value),
            None => {
                self.error(
                    ident.token.position,
                    format!("Identifier '{}' not found in current memory", ident.value),
                );
                Flow::None
            }
        }
    }

    fn eval_value(&mut self, expression: &ast::Expr, scope: &Rc<Scope>) -> Option<Value> {
        match self.eval_expression(expression, scope) {
            Flow::Value(value) => Some(value),
            _ => None,
        }
    }

    fn eval_array(&mut self, elements: &[ast::Expr], scope: &Rc<Scope>) -> Flow {
        let mut result = Vec::with_capacity(elements.len());
        for element in elements {
            match self.eval_value(element, scope) {
                Some(value) => result.push(value),
                None => return Flow::None,
            }
        }
        Flow::Value(Value::array(result))
    }

    fn eval_dictionary(&mut self, pairs: &[(ast::Expr, ast::Expr)], scope: &Rc<Scope>) -> Flow {
        let mut result = DictPairs::new();
        for (key_expr, value_expr) in pairs {
            let Some(key) = self.eval_value(key_expr, scope) else {
                return Flow::None;
            };
            let Some(value) = self.eval_value(value_expr, scope) else {
                return Flow::None;
            };
            result.insert(key.check(), (key, value));
        }
        Flow::Value(Value::dictionary(result))
    }

    fn eval_val(&mut self, name: &ast::Ident, value: &ast::Expr, scope: &Rc<Scope>) -> Flow {
        let Some(data) = self.eval_value(value, scope) else {
            return Flow::None;
        };
        if scope.read(&name.value).is_some() {
            self.error(
                name.token.position,
                format!("Identifier '{}' already declared", name.value),
            );
            return Flow::None;
        }
        scope.write(&name.value, data.clone());
        self.immutable.insert(name.value.clone());
        Flow::Value(data)
    }

    fn eval_var(&mut self, name: &ast::Ident, value: &ast::Expr, scope: &Rc<Scope>) -> Flow {
        let Some(data) = self.eval_value(value, scope) else {
            return Flow::None;
        };
        if scope.read(&name.value).is_some() {
            self.error(
                name.token.position,
                format!("Identifier '{}' already declared", name.value),
            );
            return Flow::None;
        }
        scope.write(&name.value, data.clone());
        Flow::Value(data)
    }

    fn eval_assign(
        &mut self,
        token: &Token,
        target: &ast::Expr,
        value: &ast::Expr,
        scope: &Rc<Scope>,
    ) -> Flow {
        let name = match target {
            ast::Expr::Identifier(ident) => ident.value.clone(),
            ast::Expr::Subscript { left, .. } => match &**left {
                ast::Expr::Identifier(ident) => ident.value.clone(),
                _ => {
                    self.error(token.position, "Assignment operator expects an identifier");
                    return Flow::None;
                }
            },
            _ => {
                self.error(token.position, "Assignment operator expects an identifier");
                return Flow::None;
            }
        };
        let Some(original) = scope.read(&name) else {
            self.error(
                token.position,
                format!("Identifier '{}' not found in current memory", name),
            );
            return Flow::None;
        };
        if self.immutable.contains(&name) {
            self.error(token.position, format!("Identifier '{}' is immutable", name));
            return Flow::None;
        }
        let Some(mut data) = self.eval_value(value, scope) else {
            return Flow::None;
        };
        if let ast::Expr::Subscript { index, .. } = target {
            let Some(index) = self.eval_value(index, scope) else {
                return Flow::None;
            };
            data = match assign_subscript(&original, &index, data) {
                Ok(data) => data,
                Err(message) => {
                    self.error(token.position, message);
                    return Flow::None;
                }
            };
        }
        if data.type_name() != original.type_name() {
            self.error(
                token.position,
                format!(
                    "Variable assignment should keep the original data type '{}'",
                    original.type_name()
                ),
            );
            return Flow::None;
        }
        scope.update(&name, data.clone());
        Flow::Value(data)
    }

    fn eval_if(
        &mut self,
        condition: &ast::Expr,
        then: &ast::Block,
        alternative: Option<&ast::Block>,
        scope: &Rc<Scope>,
    ) -> Flow {
        let Some(condition) = self.eval_value(condition, scope) else {
            return Flow::None;
        };
        if condition.is_truthy() {
            self.eval_block(then, &Scope::from(scope))
        } else if let Some(alternative) = alternative {
            self.eval_block(alternative, &Scope::from(scope))
        } else {
            Flow::Value(Value::Nil)
        }
    }

    fn eval_match(
        &mut self,
        token: &Token,
        control: Option<&ast::Expr>,
        whens: &[ast::MatchWhen],
        alternative: Option<&ast::Block>,
        scope: &Rc<Scope>,
    ) -> Flow {
        let control = match control {
            None => Value::Boolean(true),
            Some(expression) => match self.eval_value(expression, scope) {
                Some(value) => value,
                None => {
                    self.error(
                        token.position,
                        "Match control expression couldn't be interpreted",
                    );
                    return Flow::None;
                }
            },
        };
        let selected = match self.find_when(whens, &control, scope) {
            Ok(selected) => selected,
            Err(message) => {
                self.error(token.position, message);
                return Flow::None;
            }
        };
        if let Some(index) = selected {
            return self.eval_block(&whens[index].body, &Scope::from(scope));
        }
        if let Some(alternative) = alternative {
            return self.eval_block(alternative, &Scope::from(scope));
        }
        Flow::Value(Value::Nil)
    }

    /// Pick the first `when` whose value list matches the control value.
    fn find_when(
        &mut self,
        whens: &[ast::MatchWhen],
        control: &Value,
        scope: &Rc<Scope>,
    ) -> Result<Option<usize>, String> {
        for (position, when) in whens.iter().enumerate() {
            let mut matches = 0;
            for (index, element) in when.values.iter().enumerate() {
                let parameter = match self.eval_expression(element, scope) {
                    Flow::Value(value) => value,
                    _ => return Err("Match when value couldn't be interpreted".to_string()),
                };
                if parameter.type_name() == control.type_name() {
                    if parameter.check() == control.check() {
                        return Ok(Some(position));
                    }
                } else if let Value::Array(elements) = control {
                    let elements = elements.borrow();
                    if when.values.len() != elements.len() {
                        continue;
                    }
                    let matched = matches!(parameter, Value::PlaceHolder)
                        || (parameter.type_name() == elements[index].type_name()
                            && parameter.check() == elements[index].check());
                    if matched {
                        matches += 1;
                        if matches == elements.len() {
                            return Ok(Some(position));
                        }
                    }
                } else if let (Value::Symbol(symbol), Value::Str(string)) = (&parameter, control) {
                    if symbol == string {
                        return Ok(Some(position));
                    }
                } else {
                    return Err(format!(
                        "Type '{}' can't be used in a match when with control type '{}'",
                        parameter.type_name(),
                        control.type_name()
                    ));
                }
            }
        }
        Ok(None)
    }

    fn eval_repeat(
        &mut self,
        token: &Token,
        arguments: &[ast::Ident],
        enumerable: Option<&ast::Expr>,
        body: &ast::Block,
        scope: &Rc<Scope>,
    ) -> Flow {
        let Some(enumerable) = enumerable else {
            return self.repeat_infinite(body, scope);
        };
        let Some(value) = self.eval_value(enumerable, scope) else {
            return Flow::None;
        };
        match value {
            Value::Str(string) => {
                self.repeat_array(token, arguments, &string_to_values(&string), body, scope)
            }
            Value::Symbol(symbol) => {
                self.repeat_array(token, arguments, &string_to_values(&symbol), body, scope)
            }
            Value::Array(elements) => {
                let items = elements.borrow().clone();
                self.repeat_array(token, arguments, &items, body, scope)
            }
            Value::Dictionary(pairs) => {
                let entries: Vec<(Value, Value)> = pairs.borrow().values().cloned().collect();
                self.repeat_dictionary(token, arguments, &entries, body, scope)
            }
            other => {
                self.error(
                    token.position,
                    format!("Type {} is not an enumerable", other.type_name()),
                );
                Flow::None
            }
        }
    }

    fn repeat_infinite(&mut self, body: &ast::Block, scope: &Rc<Scope>) -> Flow {
        let mut out = Vec::new();
        loop {
            let child = Scope::from(scope);
            match self.eval_block(body, &child) {
                Flow::None => return Flow::None,
                Flow::Break => break,
                Flow::Continue => continue,
                Flow::Return(value) => return Flow::Return(value),
                Flow::Value(value) => out.push(value),
            }
        }
        Flow::Value(Value::array(out))
    }

    fn repeat_array(
        &mut self,
        token: &Token,
        arguments: &[ast::Ident],
        items: &[Value],
        body: &ast::Block,
        scope: &Rc<Scope>,
    ) -> Flow {
        let mut out = Vec::new();
        for (index, value) in items.iter().enumerate() {
            let child = Scope::from(scope);
            // loop bindings live in the enclosing scope; the body gets its
            // own frame for locals
            match arguments {
                [element] => scope.write(&element.value, value.clone()),
                [position, element] => {
                    scope.write(&position.value, Value::Integer(index as i64));
                    scope.write(&element.value, value.clone());
                }
                _ => {
                    self.error(
                        token.position,
                        "A repeat loop with an array expects at most 2 arguments",
                    );
                    return Flow::None;
                }
            }
            match self.eval_block(body, &child) {
                Flow::None => return Flow::None,
                Flow::Break => break,
                Flow::Continue => continue,
                Flow::Return(value) => return Flow::Return(value),
                Flow::Value(value) => out.push(value),
            }
        }
        Flow::Value(Value::array(out))
    }

    fn repeat_dictionary(
        &mut self,
        token: &Token,
        arguments: &[ast::Ident],
        entries: &[(Value, Value)],
        body: &ast::Block,
        scope: &Rc<Scope>,
    ) -> Flow {
        let mut out = Vec::new();
        for (key, value) in entries {
            let child = Scope::from(scope);
            match arguments {
                [element] => scope.write(&element.value, value.clone()),
                [first, second] => {
                    scope.write(&first.value, key.clone());
                    scope.write(&second.value, value.clone());
                }
                _ => {
                    self.error(
                        token.position,
                        "A repeat loop with a dictionary expects at most 2 arguments",
                    );
                    return Flow::None;
                }
            }
            match self.eval_block(body, &child) {
                Flow::None => return Flow::None,
                Flow::Break => break,
                Flow::Continue => continue,
                Flow::Return(value) => return Flow::Return(value),
                Flow::Value(value) => out.push(value),
            }
        }
        Flow::Value(Value::array(out))
    }

    fn eval_call(
        &mut self,
        token: &Token,
        function: &ast::Expr,
        arguments: &[ast::Expr],
        scope: &Rc<Scope>,
    ) -> Flow {
        if let ast::Expr::Identifier(ident) = function {
            if let Some(builtin) = builtins::lookup(&ident.value) {
                return self.eval_builtin(token, builtin, arguments, scope);
            }
        }
        let Some(callee) = self.eval_value(function, scope) else {
            return Flow::None;
        };
        let Value::Function(function) = callee else {
            self.error(token.position, "Trying to call a non-function");
            return Flow::None;
        };
        let literal = &function.literal;
        let fn_scope = Scope::from(&function.scope);
        if !literal.variadic && arguments.len() > literal.parameters.len() {
            self.error(token.position, "Too many arguments in function call");
            return Flow::None;
        }
        let mut default_count = 0;
        for parameter in &literal.parameters {
            if let Some(default) = &parameter.default {
                // defaults are evaluated in the caller scope
                let Some(value) = self.eval_value(default, scope) else {
                    return Flow::None;
                };
                if let Some(param_type) = &parameter.param_type {
                    if let Err(message) = check_type_match(value.type_name(), &param_type.value) {
                        self.error(token.position, message);
                        return Flow::None;
                    }
                }
                fn_scope.write(&parameter.name.value, value);
                default_count += 1;
            }
        }
        if arguments.len() + default_count < literal.parameters.len() {
            self.error(token.position, "Too few arguments in function call");
            return Flow::None;
        }
        let mut variadic_args = Vec::new();
        let count_params = literal.parameters.len().saturating_sub(1);
        for (index, element) in arguments.iter().enumerate() {
            let Some(value) = self.eval_value(element, scope) else {
                return Flow::None;
            };
            let parameter = if literal.variadic && index >= count_params {
                &literal.parameters[count_params]
            } else {
                &literal.parameters[index]
            };
            if let Some(param_type) = &parameter.param_type {
                if let Err(message) = check_type_match(value.type_name(), &param_type.value) {
                    self.error(token.position, message);
                    return Flow::None;
                }
            }
            if literal.variadic && index >= count_params {
                variadic_args.push(value);
            } else {
                fn_scope.write(&parameter.name.value, value);
            }
        }
        if literal.variadic && !variadic_args.is_empty() {
            let name = &literal.parameters[literal.parameters.len() - 1].name.value;
            fn_scope.write(name, Value::array(variadic_args));
        }
        let result = match self.eval_block(&literal.body, &fn_scope) {
            Flow::Value(value) | Flow::Return(value) => value,
            Flow::None => return Flow::None,
            Flow::Break => {
                self.error(token.position, "Break outside of a repeat loop");
                return Flow::None;
            }
            Flow::Continue => {
                self.error(token.position, "Continue outside of a repeat loop");
                return Flow::None;
            }
        };
        if let Some(return_type) = &literal.return_type {
            if let Err(message) = check_type_match(result.type_name(), &return_type.value) {
                self.error(token.position, message);
                return Flow::None;
            }
        }
        Flow::Value(result)
    }

    fn eval_builtin(
        &mut self,
        token: &Token,
        builtin: builtins::BuiltinFn,
        arguments: &[ast::Expr],
        scope: &Rc<Scope>,
    ) -> Flow {
        let mut args = Vec::with_capacity(arguments.len());
        for element in arguments {
            match self.eval_value(element, scope) {
                Some(value) => args.push(value),
                None => return Flow::None,
            }
        }
        match builtin(&args) {
            Ok(value) => Flow::Value(value),
            Err(message) => {
                self.error(token.position, message);
                Flow::None
            }
        }
    }

    fn eval_subscript(
        &mut self,
        token: &Token,
        left: &ast::Expr,
        index: &ast::Expr,
        scope: &Rc<Scope>,
    ) -> Flow {
        let Some(left) = self.eval_value(left, scope) else {
            return Flow::None;
        };
        let Some(index) = self.eval_value(index, scope) else {
            return Flow::None;
        };
        match (&left, &index) {
            (Value::Str(string), Value::Integer(idx)) => {
                match check_bounds(string.len(), *idx) {
                    Some(idx) => Flow::Value(Value::Str(string[idx..idx + 1].to_string())),
                    None => Flow::Value(Value::Nil),
                }
            }
            (Value::Array(elements), Value::Integer(idx)) => {
                let elements = elements.borrow();
                match check_bounds(elements.len(), *idx) {
                    Some(idx) => Flow::Value(elements[idx].clone()),
                    None => Flow::Value(Value::Nil),
                }
            }
            (Value::Dictionary(pairs), index) => {
                let pairs = pairs.borrow();
                match pairs.get(&index.check()) {
                    Some((_, value)) => Flow::Value(value.clone()),
                    None => Flow::Value(Value::Nil),
                }
            }
            _ => {
                self.error(
                    token.position,
                    format!(
                        "Subscript on '{}' not supported with literal '{}'",
                        left.type_name(),
                        index.type_name()
                    ),
                );
                Flow::None
            }
        }
    }

    fn eval_pipe(
        &mut self,
        token: &Token,
        left: &ast::Expr,
        right: &ast::Expr,
        scope: &Rc<Scope>,
    ) -> Flow {
        match right {
            ast::Expr::Call {
                token: call_token,
                function,
                arguments,
            } => {
                let mut piped = Vec::with_capacity(arguments.len() + 1);
                piped.push(left.clone());
                piped.extend(arguments.iter().cloned());
                self.eval_call(call_token, function, &piped, scope)
            }
            _ => {
                self.error(
                    token.position,
                    "Pipe operator expects a function on the right side",
                );
                Flow::None
            }
        }
    }

    fn eval_module(&mut self, token: &Token, name: &ast::Ident, body: &Rc<ast::Block>) -> Flow {
        if self.modules.contains_key(&name.value) {
            self.error(
                token.position,
                format!("Module '{}' redeclared", name.value),
            );
        } else {
            self.modules.insert(name.value.clone(), body.clone());
        }
        Flow::None
    }

    fn eval_module_access(
        &mut self,
        token: &Token,
        object: &ast::Ident,
        member: &ast::Ident,
        scope: &Rc<Scope>,
    ) -> Flow {
        let Some(body) = self.modules.get(&object.value).cloned() else {
            self.error(
                token.position,
                format!("{}.{} not found", object.value, member.value),
            );
            return Flow::None;
        };
        if let Some(cached) = self.module_cache.get(&object.value) {
            return match cached.get(&member.value) {
                Some(value) => Flow::Value(value.clone()),
                None => {
                    self.error(
                        token.position,
                        format!(
                            "Member '{}' in module '{}' not found",
                            member.value, object.value
                        ),
                    );
                    Flow::None
                }
            };
        }
        // first access: evaluate every member once and cache the map
        let module_scope = Scope::from(scope);
        let mut results = HashMap::new();
        for statement in &body.statements {
            let member_name = match statement {
                ast::Stmt::Expression {
                    expression: ast::Expr::Val { name, .. },
                    ..
                } => name.value.clone(),
                _ => {
                    self.error(
                        token.position,
                        "Only Val statements are accepted as Module members",
                    );
                    return Flow::None;
                }
            };
            let Flow::Value(result) = self.eval_statement(statement, &module_scope) else {
                return Flow::None;
            };
            results.insert(member_name, result);
        }
        self.module_cache.insert(object.value.clone(), results);
        match self.module_cache[&object.value].get(&member.value) {
            Some(value) => Flow::Value(value.clone()),
            None => {
                self.error(
                    token.position,
                    format!(
                        "Member '{}' in module '{}' not found",
                        member.value, object.value
                    ),
                );
                Flow::None
            }
        }
    }

    fn eval_use(&mut self, token: &Token, file: &str, scope: &Rc<Scope>) -> Flow {
        let file_name = if Path::new(file).extension().is_none() {
            format!("{}{}", file, meta::FILE_EXTENSION)
        } else {
            file.to_string()
        };
        if let Some(cached) = self.use_cache.get(&file_name) {
            return Flow::Value(cached.clone());
        }
        let source = match std::fs::read(&file_name) {
            Ok(source) => source,
            Err(_) => {
                self.error(
                    token.position,
                    format!("Couldn't read imported file '{}'", file),
                );
                return Flow::None;
            }
        };
        let program = parse_source(&source, &self.diags);
        if self.diags.has_errors() {
            return Flow::None;
        }
        let result = self.eval_program(&program, scope);
        if let Flow::Value(value) = &result {
            self.use_cache.insert(file_name, value.clone());
        }
        result
    }

    fn eval_is(
        &mut self,
        token: &Token,
        left: &ast::Expr,
        type_name: &ast::Ident,
        scope: &Rc<Scope>,
    ) -> Flow {
        let Some(data) = self.eval_value(left, scope) else {
            return Flow::None;
        };
        if !is_supported_type(&type_name.value) {
            self.error(
                token.position,
                format!("Unknown type '{}' in is operator", type_name.value),
            );
            return Flow::None;
        }
        Flow::Value(Value::Boolean(data.type_name() == type_name.value))
    }

    fn eval_as(
        &mut self,
        token: &Token,
        left: &ast::Expr,
        type_name: &ast::Ident,
        scope: &Rc<Scope>,
    ) -> Flow {
        let builtin = match type_name.value.as_str() {
            "String" | "Int" | "Float" | "Array" => builtins::lookup(&type_name.value),
            _ => None,
        };
        let Some(builtin) = builtin else {
            self.error(
                token.position,
                format!("Unknown type '{}' in as operator", type_name.value),
            );
            return Flow::None;
        };
        let Some(value) = self.eval_value(left, scope) else {
            return Flow::None;
        };
        match builtin(&[value]) {
            Ok(value) => Flow::Value(value),
            Err(message) => {
                self.error(token.position, message);
                Flow::None
            }
        }
    }

    fn eval_prefix(
        &mut self,
        token: &Token,
        operator: &str,
        right: &ast::Expr,
        scope: &Rc<Scope>,
    ) -> Flow {
        let Some(data) = self.eval_value(right, scope) else {
            self.error(
                token.position,
                format!("Trying to run operator '{}' with an unknown value", operator),
            );
            return Flow::None;
        };
        let result = match operator {
            "!" => Ok(Value::Boolean(!data.is_truthy())),
            "-" => match data {
                Value::Integer(value) => Ok(Value::Integer(value.wrapping_neg())),
                Value::Float(value) => Ok(Value::Float(-value)),
                _ => Err("Minus prefix can be applied to Integers and Floats only".to_string()),
            },
            "~" => match data {
                Value::Integer(value) => Ok(Value::Integer(!value)),
                _ => Err("Bitwise not prefix can be applied to Integers only".to_string()),
            },
            _ => Err("Unsupported prefix operator".to_string()),
        };
        match result {
            Ok(value) => Flow::Value(value),
            Err(message) => {
                self.error(token.position, message);
                Flow::None
            }
        }
    }

    fn eval_infix(
        &mut self,
        token: &Token,
        operator: &str,
        left: &ast::Expr,
        right: &ast::Expr,
        scope: &Rc<Scope>,
    ) -> Flow {
        let Some(left) = self.eval_value(left, scope) else {
            return Flow::None;
        };
        // && and || short-circuit on the left operand's truthiness
        if operator == "&&" && !left.is_truthy() {
            return Flow::Value(Value::Boolean(false));
        }
        if operator == "||" && left.is_truthy() {
            return Flow::Value(Value::Boolean(true));
        }
        let Some(right) = self.eval_value(right, scope) else {
            return Flow::None;
        };
        let result = match (&left, &right) {
            (Value::Boolean(_), Value::Boolean(_)) => boolean_infix(operator, &left, &right),
            (Value::Str(l), Value::Str(r)) => string_infix(operator, l, r),
            (Value::Str(l), Value::Symbol(r)) => string_infix(operator, l, r),
            (Value::Symbol(l), Value::Symbol(r)) => string_infix(operator, l, r),
            (Value::Symbol(l), Value::Str(r)) => string_infix(operator, l, r),
            (Value::Integer(l), Value::Integer(r)) => integer_infix(operator, *l, *r),
            (Value::Integer(l), Value::Float(r)) => float_infix(operator, *l as f64, *r),
            (Value::Float(l), Value::Integer(r)) => float_infix(operator, *l, *r as f64),
            (Value::Float(l), Value::Float(r)) => float_infix(operator, *l, *r),
            // a string coerces the other operand to its printed form
            (Value::Boolean(_), Value::Str(r)) => string_infix(operator, &left.check(), r),
            (Value::Str(l), Value::Boolean(_)) => string_infix(operator, l, &right.check()),
            (Value::Integer(_), Value::Str(r)) => string_infix(operator, &left.check(), r),
            (Value::Str(l), Value::Integer(_)) => string_infix(operator, l, &right.check()),
            (Value::Float(_), Value::Str(r)) => string_infix(operator, &left.check(), r),
            (Value::Str(l), Value::Float(_)) => string_infix(operator, l, &right.check()),
            (Value::Array(_), Value::Array(_)) => array_infix(operator, &left, &right),
            (Value::Dictionary(_), Value::Dictionary(_)) => {
                dictionary_infix(operator, &left, &right)
            }
            (Value::Nil, _) | (_, Value::Nil) => nil_infix(operator, &left, &right),
            _ if left.type_name() != right.type_name() => Err(format!(
                "Cannot run expression with types '{}' and '{}'",
                left.type_name(),
                right.type_name()
            )),
            _ => Err(format!(
                "Unknown operator {} for types '{}' and '{}'",
                operator,
                left.type_name(),
                right.type_name()
            )),
        };
        match result {
            Ok(value) => Flow::Value(value),
            Err(message) => {
                self.error(token.position, message);
                Flow::None
            }
        }
    }
}

// ===================== Operator semantics =====================

fn integer_infix(operator: &str, left: i64, right: i64) -> Result<Value, String> {
    match operator {
        "+" => Ok(Value::Integer(left.wrapping_add(right))),
        "-" => Ok(Value::Integer(left.wrapping_sub(right))),
        "*" => Ok(Value::Integer(left.wrapping_mul(right))),
        "/" => {
            if right == 0 {
                return Err("Division by 0".to_string());
            }
            let value = left as f64 / right as f64;
            if value.trunc() == value {
                Ok(Value::Integer(value as i64))
            } else {
                Ok(Value::Float(value))
            }
        }
        "%" => {
            if right == 0 {
                return Err("Division by 0".to_string());
            }
            Ok(Value::Integer(left.wrapping_rem(right)))
        }
        "**" => Ok(Value::Integer((left as f64).powf(right as f64) as i64)),
        "<" => Ok(Value::Boolean(left < right)),
        "<=" => Ok(Value::Boolean(left <= right)),
        ">" => Ok(Value::Boolean(left > right)),
        ">=" => Ok(Value::Boolean(left >= right)),
        "==" => Ok(Value::Boolean(left == right)),
        "!=" => Ok(Value::Boolean(left != right)),
        "<<" | ">>" => {
            if left < 0 || right < 0 {
                return Err("Bitwise shift requires two unsigned Integers".to_string());
            }
            let value = if right >= 64 {
                0
            } else if operator == "<<" {
                ((left as u64) << right) as i64
            } else {
                ((left as u64) >> right) as i64
            };
            Ok(Value::Integer(value))
        }
        "&" => Ok(Value::Integer(left & right)),
        "|" => Ok(Value::Integer(left | right)),
        ".." => Ok(integer_range(left, right)),
        _ => Err(format!("Unsupported Integer operator '{}'", operator)),
    }
}

fn integer_range(left: i64, right: i64) -> Value {
    let mut result = Vec::new();
    if left < right {
        for value in left..=right {
            result.push(Value::Integer(value));
        }
    } else {
        let mut value = left;
        while value >= right {
            result.push(Value::Integer(value));
            value -= 1;
        }
    }
    Value::array(result)
}

fn float_infix(operator: &str, left: f64, right: f64) -> Result<Value, String> {
    match operator {
        "+" => Ok(Value::Float(left + right)),
        "-" => Ok(Value::Float(left - right)),
        "*" => Ok(Value::Float(left * right)),
        "/" => {
            if right == 0.0 {
                return Err("Division by 0".to_string());
            }
            Ok(Value::Float(left / right))
        }
        "%" => Ok(Value::Float(left % right)),
        "**" => Ok(Value::Float(left.powf(right))),
        "<" => Ok(Value::Boolean(left < right)),
        "<=" => Ok(Value::Boolean(left <= right)),
        ">" => Ok(Value::Boolean(left > right)),
        ">=" => Ok(Value::Boolean(left >= right)),
        "==" => Ok(Value::Boolean(left == right)),
        "!=" => Ok(Value::Boolean(left != right)),
        _ => Err(format!("Unsupported Float operator '{}'", operator)),
    }
}

fn string_infix(operator: &str, left: &str, right: &str) -> Result<Value, String> {
    match operator {
        "+" => Ok(Value::Str(format!("{}{}", left, right))),
        // relational operators compare by length, not lexicographically
        "<" => Ok(Value::Boolean(left.len() < right.len())),
        "<=" => Ok(Value::Boolean(left.len() <= right.len())),
        ">" => Ok(Value::Boolean(left.len() > right.len())),
        ">=" => Ok(Value::Boolean(left.len() >= right.len())),
        "==" => Ok(Value::Boolean(left == right)),
        "!=" => Ok(Value::Boolean(left != right)),
        ".." => string_range(left, right),
        _ => Err(format!("Unsupported String operator '{}'", operator)),
    }
}

/// `"a".."f"` walks the case-folded alphabet `0-9a-z` in either direction.
fn string_range(left: &str, right: &str) -> Result<Value, String> {
    if left.len() > 1 || right.len() > 1 {
        return Err("Range operator expects 2 single character strings".to_string());
    }
    const ALPHABET: &str = "0123456789abcdefghijklmnopqrstuvwxyz";
    let low = left.to_lowercase().chars().next().unwrap_or('\0');
    let high = right.to_lowercase().chars().next().unwrap_or('\0');
    let mut result = Vec::new();
    if low < high {
        for c in ALPHABET.chars() {
            if c >= low && c <= high {
                result.push(Value::Str(c.to_string()));
            }
        }
    } else {
        for c in ALPHABET.chars().rev() {
            if c <= low && c >= high {
                result.push(Value::Str(c.to_string()));
            }
        }
    }
    Ok(Value::array(result))
}

fn boolean_infix(operator: &str, left: &Value, right: &Value) -> Result<Value, String> {
    let (Value::Boolean(left), Value::Boolean(right)) = (left, right) else {
        return Err(format!("Unsupported Boolean operator '{}'", operator));
    };
    match operator {
        "&&" => Ok(Value::Boolean(*left && *right)),
        "||" => Ok(Value::Boolean(*left || *right)),
        "==" => Ok(Value::Boolean(left == right)),
        "!=" => Ok(Value::Boolean(left != right)),
        _ => Err(format!("Unsupported Boolean operator '{}'", operator)),
    }
}

fn array_infix(operator: &str, left: &Value, right: &Value) -> Result<Value, String> {
    let (Value::Array(left), Value::Array(right)) = (left, right) else {
        return Err(format!("Unsupported Array operator '{}'", operator));
    };
    let left = left.borrow();
    let right = right.borrow();
    match operator {
        "+" => {
            let mut out = left.clone();
            out.extend(right.iter().cloned());
            Ok(Value::array(out))
        }
        "==" => Ok(Value::Boolean(compare_arrays(&left, &right))),
        "!=" => Ok(Value::Boolean(!compare_arrays(&left, &right))),
        "<" => Ok(Value::Boolean(left.len() < right.len())),
        ">" => Ok(Value::Boolean(left.len() > right.len())),
        _ => Err(format!("Unsupported Array operator '{}'", operator)),
    }
}

fn compare_arrays(left: &[Value], right: &[Value]) -> bool {
    left.len() == right.len()
        && left.iter().zip(right.iter()).all(|(l, r)| {
            l.type_name() == r.type_name() && l.check() == r.check()
        })
}

fn dictionary_infix(operator: &str, left: &Value, right: &Value) -> Result<Value, String> {
    let (Value::Dictionary(left), Value::Dictionary(right)) = (left, right) else {
        return Err(format!("Unsupported Dictionary operator '{}'", operator));
    };
    let left = left.borrow();
    let right = right.borrow();
    match operator {
        "+" => {
            // merge; the right side wins on canonical-key collisions
            let mut out = left.clone();
            for (key, pair) in right.iter() {
                out.insert(key.clone(), pair.clone());
            }
            Ok(Value::dictionary(out))
        }
        "==" => Ok(Value::Boolean(compare_dictionaries(&left, &right))),
        "!=" => Ok(Value::Boolean(!compare_dictionaries(&left, &right))),
        "<" => Ok(Value::Boolean(left.len() < right.len())),
        ">" => Ok(Value::Boolean(left.len() > right.len())),
        _ => Err(format!("Unsupported Dictionary operator '{}'", operator)),
    }
}

fn compare_dictionaries(left: &DictPairs, right: &DictPairs) -> bool {
    left.len() == right.len()
        && left.iter().all(|(key, (_, value))| {
            right
                .get(key)
                .is_some_and(|(_, other)| other.check() == value.check())
        })
}

fn nil_infix(operator: &str, left: &Value, right: &Value) -> Result<Value, String> {
    let both_nil = matches!(left, Value::Nil) && matches!(right, Value::Nil);
    match operator {
        "==" => Ok(Value::Boolean(both_nil)),
        "!=" => Ok(Value::Boolean(!both_nil)),
        _ => Err(format!("Unsupported Nil operator '{}'", operator)),
    }
}

// ===================== Helpers =====================

/// Normalise a possibly-negative index against `len`; `None` when out of
/// bounds either way.
fn check_bounds(len: usize, index: i64) -> Option<usize> {
    let idx = if index < 0 { index + len as i64 } else { index };
    if idx < 0 || idx >= len as i64 {
        None
    } else {
        Some(idx as usize)
    }
}

fn string_to_values(string: &str) -> Vec<Value> {
    string
        .chars()
        .map(|c| Value::Str(c.to_string()))
        .collect()
}

fn is_supported_type(name: &str) -> bool {
    matches!(
        name,
        "Boolean" | "String" | "Integer" | "Float" | "Array" | "Dictionary" | "Symbol" | "Function"
    )
}

fn check_type_match(actual: &str, expected: &str) -> Result<(), String> {
    if !is_supported_type(actual) {
        return Err(format!("Unknown type '{}' in function parameter", actual));
    }
    if actual != expected {
        return Err(format!(
            "Function asks for type '{}' but got '{}'",
            expected, actual
        ));
    }
    Ok(())
}

/// Subscript assignment: splice into a string, index/append into an array,
/// update-or-insert into a dictionary. Containers mutate in place.
fn assign_subscript(original: &Value, index: &Value, value: Value) -> Result<Value, String> {
    match (original, index) {
        (Value::Str(string), Value::Integer(idx)) => {
            let Value::Str(replacement) = &value else {
                return Err("Subscript assignment not recognized".to_string());
            };
            let idx = check_bounds(string.len(), *idx)
                .ok_or_else(|| format!("String index '{}' out of bounds", idx))?;
            Ok(Value::Str(format!(
                "{}{}{}",
                &string[..idx],
                replacement,
                &string[idx + 1..]
            )))
        }
        (Value::Array(elements), Value::Integer(idx)) => {
            let mut elements_mut = elements.borrow_mut();
            let idx = check_bounds(elements_mut.len(), *idx)
                .ok_or_else(|| format!("Array index '{}' out of bounds", idx))?;
            elements_mut[idx] = value;
            drop(elements_mut);
            Ok(original.clone())
        }
        (Value::Array(elements), Value::PlaceHolder) => {
            elements.borrow_mut().push(value);
            Ok(original.clone())
        }
        (Value::Dictionary(pairs), index) => {
            pairs
                .borrow_mut()
                .insert(index.check(), (index.clone(), value));
            Ok(original.clone())
        }
        _ => Err("Subscript assignment not recognized".to_string()),
    }
}
