use crate::ast::{AssignTarget, BinaryOp, Block, Expr, Stmt, UnaryOp};
use crate::error::{ErrorKind, Span, SprigError};
use crate::scope::Scope;
use crate::value::{ListRef, Value};
use std::io::{self, Stdout, Write};
use std::mem;

/// Result of executing a statement: either a plain value or a `return`
/// that is still travelling towards the enclosing call.
#[derive(Debug, Clone, PartialEq)]
pub enum Flow {
    Normal(Value),
    Return(Value),
}

impl Flow {
    pub fn into_value(self) -> Value {
        match self {
            Flow::Normal(value) | Flow::Return(value) => value,
        }
    }

    pub fn is_return(&self) -> bool {
        matches!(self, Flow::Return(_))
    }
}

/// Tree-walking evaluator. `print` output goes to `W`.
pub struct Evaluator<W: Write = Stdout> {
    globals: Scope,
    out: W,
}

impl Evaluator<Stdout> {
    pub fn new() -> Self {
        Self::with_output(io::stdout())
    }
}

impl Default for Evaluator<Stdout> {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: Write> Evaluator<W> {
    pub fn with_output(out: W) -> Self {
        Self {
            globals: Scope::new(),
            out,
        }
    }

    pub fn output(&self) -> &W {
        &self.out
    }

    pub fn into_output(self) -> W {
        self.out
    }

    /// Global scope, persistent across `evaluate_program` calls.
    pub fn globals(&self) -> &Scope {
        &self.globals
    }

    pub fn global(&self, name: &str) -> Option<&Value> {
        self.globals.get(name)
    }

    /// Runs a whole program against the global scope. A top-level `return`
    /// ends the program with its value.
    pub fn evaluate_program(&mut self, program: &Block) -> Result<Value, SprigError> {
        let mut globals = mem::take(&mut self.globals);
        let result = self.execute_block(program, &mut globals);
        self.globals = globals;
        Ok(result?.into_value())
    }

    /// Evaluates one statement in `scope`.
    pub fn evaluate(&mut self, stmt: &Stmt, scope: &mut Scope) -> Result<Value, SprigError> {
        Ok(self.execute(stmt, scope)?.into_value())
    }

    pub fn execute(&mut self, stmt: &Stmt, scope: &mut Scope) -> Result<Flow, SprigError> {
        match stmt {
            Stmt::Expression { expr, .. } => Ok(Flow::Normal(self.evaluate_expression(expr, scope)?)),
            Stmt::Block(block) => self.execute_block(block, scope),
            Stmt::If {
                condition,
                then_branch,
                else_branch,
                ..
            } => {
                let condition_value = self.evaluate_expression(condition, scope)?;
                if condition_value.is_truthy() {
                    self.execute(then_branch, scope)
                } else if let Some(else_stmt) = else_branch {
                    self.execute(else_stmt, scope)
                } else {
                    Ok(Flow::Normal(Value::Nil))
                }
            }
            Stmt::While { condition, body, .. } => {
                while self.evaluate_expression(condition, scope)?.is_truthy() {
                    let flow = self.execute(body, scope)?;
                    if flow.is_return() {
                        return Ok(flow);
                    }
                }
                Ok(Flow::Normal(Value::Nil))
            }
            Stmt::Print { expr, span } => {
                let value = self.evaluate_expression(expr, scope)?;
                writeln!(self.out, ">> {}", value).map_err(|e| {
                    SprigError::runtime_error(
                        ErrorKind::Output,
                        *span,
                        format!("Failed to write output: {}", e),
                    )
                })?;
                Ok(Flow::Normal(value))
            }
            Stmt::Function(decl) => {
                let function = Value::Function(decl.clone());
                scope.assign(&decl.name, function.clone());
                Ok(Flow::Normal(function))
            }
            Stmt::Return { value, .. } => Ok(Flow::Return(self.evaluate_expression(value, scope)?)),
        }
    }

    fn execute_block(&mut self, block: &Block, scope: &mut Scope) -> Result<Flow, SprigError> {
        let mut last = Value::Nil;

        for statement in &block.statements {
            match self.execute(statement, scope)? {
                Flow::Normal(value) => last = value,
                flow @ Flow::Return(_) => return Ok(flow),
            }
        }

        Ok(Flow::Normal(last))
    }

    pub fn evaluate_expression(&mut self, expr: &Expr, scope: &mut Scope) -> Result<Value, SprigError> {
        match expr {
            Expr::Literal { value, span } => match value {
                Value::List(_) | Value::Function(_) => Err(SprigError::runtime_error(
                    ErrorKind::UnknownExpression,
                    *span,
                    format!("Malformed literal of type {}", value.type_name()),
                )),
                _ => Ok(value.clone()),
            },
            Expr::Variable { name, span } => scope.get(name).cloned().ok_or_else(|| {
                SprigError::runtime_error(
                    ErrorKind::UndefinedVariable,
                    *span,
                    format!("Undefined variable: {}", name),
                )
            }),
            Expr::Assign { target, value, .. } => {
                let value = self.evaluate_expression(value, scope)?;
                match target {
                    AssignTarget::Variable { name, .. } => scope.assign(name, value.clone()),
                    AssignTarget::Index { list, index, span } => {
                        let list_value = self.evaluate_expression(list, scope)?;
                        let index_value = self.evaluate_expression(index, scope)?;
                        let items = expect_list(list_value, *span)?;
                        let position = resolve_index(&index_value, items.borrow().len(), *span)?;
                        items.borrow_mut()[position] = value.clone();
                    }
                }
                Ok(value)
            }
            Expr::Binary {
                left,
                operator,
                right,
                span,
            } => {
                // Both sides are always evaluated, 'and'/'or' included.
                let left_value = self.evaluate_expression(left, scope)?;
                let right_value = self.evaluate_expression(right, scope)?;
                evaluate_binary_op(*operator, left_value, right_value, *span)
            }
            Expr::Unary {
                operator,
                operand,
                span,
            } => {
                let operand_value = self.evaluate_expression(operand, scope)?;
                evaluate_unary_op(*operator, operand_value, *span)
            }
            Expr::List { elements, .. } => {
                let mut items = Vec::with_capacity(elements.len());
                for element in elements {
                    items.push(self.evaluate_expression(element, scope)?);
                }
                Ok(Value::list(items))
            }
            Expr::Index { list, index, span } => {
                let list_value = self.evaluate_expression(list, scope)?;
                let index_value = self.evaluate_expression(index, scope)?;
                let items = expect_list(list_value, *span)?;
                let position = resolve_index(&index_value, items.borrow().len(), *span)?;
                let item = items.borrow()[position].clone();
                Ok(item)
            }
            Expr::Call { callee, args, span } => {
                let decl = match self.evaluate_expression(callee, scope)? {
                    Value::Function(decl) => decl,
                    other => {
                        return Err(SprigError::runtime_error(
                            ErrorKind::NotCallable,
                            callee.span(),
                            format!("Attempted to call a non-function value of type {}", other.type_name()),
                        ))
                    }
                };

                let mut arg_values = Vec::with_capacity(args.len());
                for arg in args {
                    arg_values.push(self.evaluate_expression(arg, scope)?);
                }

                if arg_values.len() != decl.params.len() {
                    return Err(SprigError::runtime_error(
                        ErrorKind::ArityMismatch,
                        *span,
                        format!(
                            "Function '{}' expects {} argument(s), got {}",
                            decl.name,
                            decl.params.len(),
                            arg_values.len()
                        ),
                    ));
                }

                // The callee works on a copy of the caller's scope; the copy is
                // dropped on every exit path, so the caller's bindings never change.
                let mut local = scope.bind_parameters(&decl.params, arg_values);
                Ok(self.execute_block(&decl.body, &mut local)?.into_value())
            }
            Expr::MemberCall {
                object,
                member,
                args,
                span,
            } => {
                let object_value = self.evaluate_expression(object, scope)?;
                let mut arg_values = Vec::with_capacity(args.len());
                for arg in args {
                    arg_values.push(self.evaluate_expression(arg, scope)?);
                }
                call_member(object_value, member, arg_values, *span)
            }
        }
    }
}

/// Built-in methods on list receivers.
fn call_member(object: Value, member: &str, args: Vec<Value>, span: Span) -> Result<Value, SprigError> {
    let items = match object {
        Value::List(items) => items,
        other => {
            return Err(SprigError::runtime_error(
                ErrorKind::UnknownMember,
                span,
                format!("Member call '{}' on unsupported type {}", member, other.type_name()),
            ))
        }
    };

    match member {
        "push_back" => {
            let [value] = exactly_one(member, args, span)?;
            items.borrow_mut().push(value);
            Ok(Value::List(items))
        }
        "remove" => {
            let [index] = exactly_one(member, args, span)?;
            let position = resolve_index(&index, items.borrow().len(), span)?;
            let removed = items.borrow_mut().remove(position);
            Ok(removed)
        }
        _ => Err(SprigError::runtime_error(
            ErrorKind::UnknownMember,
            span,
            format!("Unknown member function '{}' on list", member),
        )
        .with_help("Lists support push_back(value) and remove(index).")),
    }
}

fn exactly_one(member: &str, args: Vec<Value>, span: Span) -> Result<[Value; 1], SprigError> {
    let count = args.len();
    <[Value; 1]>::try_from(args).map_err(|_| {
        SprigError::runtime_error(
            ErrorKind::ArityMismatch,
            span,
            format!("{} requires exactly one argument, got {}", member, count),
        )
    })
}

fn expect_list(value: Value, span: Span) -> Result<ListRef, SprigError> {
    match value {
        Value::List(items) => Ok(items),
        other => Err(SprigError::runtime_error(
            ErrorKind::IndexError,
            span,
            format!("Cannot index into a value of type {}", other.type_name()),
        )),
    }
}

/// Truncates `index` to an integer and checks it against `len`. Negative
/// indices count back from the end.
fn resolve_index(index: &Value, len: usize, span: Span) -> Result<usize, SprigError> {
    let raw = index.as_index().ok_or_else(|| {
        SprigError::runtime_error(
            ErrorKind::IndexError,
            span,
            format!("List index must be a number, got {}", index.type_name()),
        )
    })?;

    let position = if raw < 0 {
        i64::try_from(len).ok().and_then(|len| len.checked_add(raw))
    } else {
        Some(raw)
    };

    position
        .and_then(|position| usize::try_from(position).ok())
        .filter(|position| *position < len)
        .ok_or_else(|| {
            SprigError::runtime_error(
                ErrorKind::IndexError,
                span,
                format!("List index {} out of range for list of length {}", raw, len),
            )
        })
}

fn evaluate_binary_op(operator: BinaryOp, left: Value, right: Value, span: Span) -> Result<Value, SprigError> {
    match operator {
        BinaryOp::Add => match (left, right) {
            // Text on either side turns '+' into concatenation of display forms.
            (l @ Value::Str(_), r) | (l, r @ Value::Str(_)) => Ok(Value::Str(format!("{}{}", l, r))),
            (Value::List(l), Value::List(r)) => {
                let mut items = l.borrow().clone();
                items.extend(r.borrow().iter().cloned());
                Ok(Value::list(items))
            }
            (l, r) => arithmetic(operator, l, r, span, i64::checked_add, |a, b| a + b),
        },
        BinaryOp::Subtract => arithmetic(operator, left, right, span, i64::checked_sub, |a, b| a - b),
        BinaryOp::Multiply => arithmetic(operator, left, right, span, i64::checked_mul, |a, b| a * b),
        BinaryOp::Divide => match (left.as_float(), right.as_float()) {
            (Some(_), Some(r)) if r == 0.0 => Err(SprigError::runtime_error(
                ErrorKind::DivisionByZero,
                span,
                "Division by zero",
            )),
            (Some(l), Some(r)) => Ok(Value::Float(round_to_hundredths(l / r))),
            _ => Err(type_mismatch(operator, &left, &right, span)),
        },
        BinaryOp::Equal => Ok(Value::Bool(left == right)),
        BinaryOp::NotEqual => Ok(Value::Bool(left != right)),
        BinaryOp::Less | BinaryOp::LessEqual | BinaryOp::Greater | BinaryOp::GreaterEqual => {
            let ordering = left
                .compare(&right)
                .ok_or_else(|| type_mismatch(operator, &left, &right, span))?;
            let result = match operator {
                BinaryOp::Less => ordering.is_lt(),
                BinaryOp::LessEqual => ordering.is_le(),
                BinaryOp::Greater => ordering.is_gt(),
                _ => ordering.is_ge(),
            };
            Ok(Value::Bool(result))
        }
        // Both operands are already evaluated; the result is one of them.
        BinaryOp::And => Ok(if left.is_truthy() { right } else { left }),
        BinaryOp::Or => Ok(if left.is_truthy() { left } else { right }),
    }
}

/// Integer arithmetic when both sides are integers and the result fits,
/// float arithmetic otherwise.
fn arithmetic(
    operator: BinaryOp,
    left: Value,
    right: Value,
    span: Span,
    int_op: fn(i64, i64) -> Option<i64>,
    float_op: fn(f64, f64) -> f64,
) -> Result<Value, SprigError> {
    if let (Value::Int(l), Value::Int(r)) = (&left, &right) {
        if let Some(result) = int_op(*l, *r) {
            return Ok(Value::Int(result));
        }
    }

    match (left.as_float(), right.as_float()) {
        (Some(l), Some(r)) => Ok(Value::Float(float_op(l, r))),
        _ => Err(type_mismatch(operator, &left, &right, span)),
    }
}

fn type_mismatch(operator: BinaryOp, left: &Value, right: &Value, span: Span) -> SprigError {
    SprigError::runtime_error(
        ErrorKind::TypeMismatch,
        span,
        format!(
            "Unsupported operand types for '{}': {} and {}",
            operator.symbol(),
            left.type_name(),
            right.type_name()
        ),
    )
}

fn evaluate_unary_op(operator: UnaryOp, operand: Value, span: Span) -> Result<Value, SprigError> {
    match operator {
        UnaryOp::Negate => match operand {
            Value::Int(n) => Ok(n
                .checked_neg()
                .map(Value::Int)
                .unwrap_or(Value::Float(-(n as f64)))),
            Value::Float(n) => Ok(Value::Float(-n)),
            _ => Err(SprigError::runtime_error(
                ErrorKind::TypeMismatch,
                span,
                format!("Cannot negate {}", operand.type_name()),
            )),
        },
        UnaryOp::Not => Ok(Value::Bool(!operand.is_truthy())),
    }
}

/// Rounds half-to-even on the exact binary value, two decimal places.
fn round_to_hundredths(n: f64) -> f64 {
    if !n.is_finite() {
        return n;
    }
    format!("{:.2}", n).parse().unwrap_or(n)
}
