//! Tree-walking evaluator for the contract DSL (spec §4.5 `execute`).

use super::ast::{BinOp, Expr, FnDecl, Program, Stmt, UnaryOp};
use super::value::{ContractState, Value};
use rust_decimal::Decimal;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeError(pub String);

impl std::fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
impl std::error::Error for RuntimeError {}

enum Flow {
    Normal,
    Return(Value),
}

pub struct Interpreter<'p> {
    program: &'p Program,
    scopes: Vec<HashMap<String, Value>>,
    pub state: ContractState,
}

impl<'p> Interpreter<'p> {
    pub fn new(program: &'p Program, state: ContractState) -> Self {
        Interpreter { program, scopes: vec![HashMap::new()], state }
    }

    /// Runs the single designated entry point, `execute(inputs, state)`
    /// (spec §4.5). The second parameter is a DSL convention: the
    /// interpreter recognizes receivers literally named `state`/`users` as
    /// the built-in persisted-state and auth-table objects rather than
    /// plain bound values.
    pub fn run_execute(&mut self, inputs: Vec<String>) -> Result<Value, RuntimeError> {
        let entry = self
            .program
            .find_fn("execute")
            .ok_or_else(|| RuntimeError("no 'execute' entry point defined".to_string()))?;
        self.call_fn(entry, vec![Value::Array(inputs.into_iter().map(Value::Str).collect())])
    }

    fn call_fn(&mut self, f: &FnDecl, args: Vec<Value>) -> Result<Value, RuntimeError> {
        let mut scope = HashMap::new();
        // The trailing `state` parameter (by convention) is not bound to a
        // plain value; only leading non-reserved params receive `args`.
        let mut arg_iter = args.into_iter();
        for param in &f.params {
            if param == "state" || param == "users" {
                continue;
            }
            let value = arg_iter.next().unwrap_or(Value::Unit);
            scope.insert(param.clone(), value);
        }
        self.scopes.push(scope);
        let result = self.exec_block(&f.body);
        self.scopes.pop();
        match result? {
            Flow::Return(v) => Ok(v),
            Flow::Normal => Ok(Value::Unit),
        }
    }

    fn exec_block(&mut self, stmts: &[Stmt]) -> Result<Flow, RuntimeError> {
        for stmt in stmts {
            match self.exec_stmt(stmt)? {
                Flow::Normal => {}
                ret @ Flow::Return(_) => return Ok(ret),
            }
        }
        Ok(Flow::Normal)
    }

    fn exec_stmt(&mut self, stmt: &Stmt) -> Result<Flow, RuntimeError> {
        match stmt {
            Stmt::Let(name, expr) => {
                let v = self.eval(expr)?;
                self.scopes.last_mut().unwrap().insert(name.clone(), v);
                Ok(Flow::Normal)
            }
            Stmt::Assign(name, expr) => {
                let v = self.eval(expr)?;
                self.set_var(name, v)?;
                Ok(Flow::Normal)
            }
            Stmt::IndexAssign(target, idx, expr) => {
                let Expr::Ident(name) = target else {
                    return Err(RuntimeError("index assignment target must be a variable".into()));
                };
                let index = self.eval(idx)?;
                let value = self.eval(expr)?;
                let i = as_index(&index)?;
                let current = self.get_var(name)?;
                let mut arr = match current {
                    Value::Array(a) | Value::Tuple(a) => a,
                    _ => return Err(RuntimeError(format!("'{name}' is not indexable"))),
                };
                if i >= arr.len() {
                    arr.resize(i + 1, Value::Unit);
                }
                arr[i] = value;
                self.set_var(name, Value::Array(arr))?;
                Ok(Flow::Normal)
            }
            Stmt::If(cond, then_branch, else_branch) => {
                if self.eval(cond)?.truthy() {
                    self.scopes.push(HashMap::new());
                    let r = self.exec_block(then_branch);
                    self.scopes.pop();
                    r
                } else {
                    self.scopes.push(HashMap::new());
                    let r = self.exec_block(else_branch);
                    self.scopes.pop();
                    r
                }
            }
            Stmt::While(cond, body) => {
                while self.eval(cond)?.truthy() {
                    self.scopes.push(HashMap::new());
                    let flow = self.exec_block(body);
                    self.scopes.pop();
                    if let Flow::Return(v) = flow? {
                        return Ok(Flow::Return(v));
                    }
                }
                Ok(Flow::Normal)
            }
            Stmt::Return(expr) => {
                let v = match expr {
                    Some(e) => self.eval(e)?,
                    None => Value::Unit,
                };
                Ok(Flow::Return(v))
            }
            Stmt::Expr(expr) => {
                self.eval(expr)?;
                Ok(Flow::Normal)
            }
        }
    }

    fn get_var(&self, name: &str) -> Result<Value, RuntimeError> {
        for scope in self.scopes.iter().rev() {
            if let Some(v) = scope.get(name) {
                return Ok(v.clone());
            }
        }
        Err(RuntimeError(format!("undefined variable '{name}'")))
    }

    fn set_var(&mut self, name: &str, value: Value) -> Result<(), RuntimeError> {
        for scope in self.scopes.iter_mut().rev() {
            if scope.contains_key(name) {
                scope.insert(name.to_string(), value);
                return Ok(());
            }
        }
        Err(RuntimeError(format!("assignment to undefined variable '{name}'")))
    }

    fn eval(&mut self, expr: &Expr) -> Result<Value, RuntimeError> {
        match expr {
            Expr::Int(n) => Ok(Value::Int(*n)),
            Expr::Decimal(d) => Ok(Value::Decimal(*d)),
            Expr::Str(s) => Ok(Value::Str(s.clone())),
            Expr::Bool(b) => Ok(Value::Bool(*b)),
            Expr::Array(items) => {
                let values: Result<Vec<_>, _> = items.iter().map(|e| self.eval(e)).collect();
                Ok(Value::Array(values?))
            }
            Expr::Ident(name) => self.get_var(name),
            Expr::Unary(op, inner) => {
                let v = self.eval(inner)?;
                match op {
                    UnaryOp::Neg => v
                        .as_decimal()
                        .map(|d| Value::Decimal(-d))
                        .ok_or_else(|| RuntimeError("'-' requires a number".into())),
                    UnaryOp::Not => v
                        .as_bool()
                        .map(|b| Value::Bool(!b))
                        .ok_or_else(|| RuntimeError("'!' requires a bool".into())),
                }
            }
            Expr::Binary(lhs, op, rhs) => self.eval_binary(lhs, *op, rhs),
            Expr::Index(target, idx) => {
                let t = self.eval(target)?;
                let i = self.eval(idx)?;
                let index = as_index(&i)?;
                match t {
                    Value::Array(a) | Value::Tuple(a) => a
                        .get(index)
                        .cloned()
                        .ok_or_else(|| RuntimeError(format!("index {index} out of bounds"))),
                    _ => Err(RuntimeError("indexing requires an array".into())),
                }
            }
            Expr::Call(name, args) => self.eval_call(name, args),
            Expr::MethodCall(receiver, method, args) => self.eval_method_call(receiver, method, args),
            Expr::Field(_, name) => Err(RuntimeError(format!("unknown field '{name}'"))),
        }
    }

    fn eval_binary(&mut self, lhs: &Expr, op: BinOp, rhs: &Expr) -> Result<Value, RuntimeError> {
        if op == BinOp::And {
            return Ok(Value::Bool(self.eval(lhs)?.truthy() && self.eval(rhs)?.truthy()));
        }
        if op == BinOp::Or {
            return Ok(Value::Bool(self.eval(lhs)?.truthy() || self.eval(rhs)?.truthy()));
        }
        let l = self.eval(lhs)?;
        let r = self.eval(rhs)?;
        match op {
            BinOp::Add => match (&l, &r) {
                (Value::Str(a), _) => Ok(Value::Str(format!("{a}{r}"))),
                (_, Value::Str(b)) => Ok(Value::Str(format!("{l}{b}"))),
                _ => numeric_binop(&l, &r, |a, b| a + b),
            },
            BinOp::Sub => numeric_binop(&l, &r, |a, b| a - b),
            BinOp::Mul => numeric_binop(&l, &r, |a, b| a * b),
            BinOp::Div => {
                let b = r.as_decimal().ok_or_else(|| RuntimeError("'/' requires numbers".into()))?;
                if b.is_zero() {
                    return Err(RuntimeError("division by zero".into()));
                }
                numeric_binop(&l, &r, |a, bb| a / bb)
            }
            BinOp::Eq => Ok(Value::Bool(values_equal(&l, &r))),
            BinOp::NotEq => Ok(Value::Bool(!values_equal(&l, &r))),
            BinOp::Lt => cmp_binop(&l, &r, |o| o == std::cmp::Ordering::Less),
            BinOp::LtEq => cmp_binop(&l, &r, |o| o != std::cmp::Ordering::Greater),
            BinOp::Gt => cmp_binop(&l, &r, |o| o == std::cmp::Ordering::Greater),
            BinOp::GtEq => cmp_binop(&l, &r, |o| o != std::cmp::Ordering::Less),
            BinOp::And | BinOp::Or => unreachable!("handled above"),
        }
    }

    fn eval_call(&mut self, name: &str, args: &[Expr]) -> Result<Value, RuntimeError> {
        let values: Result<Vec<_>, _> = args.iter().map(|a| self.eval(a)).collect();
        let values = values?;
        match name {
            "len" => match values.first() {
                Some(Value::Array(a)) | Some(Value::Tuple(a)) => Ok(Value::Int(a.len() as i64)),
                Some(Value::Str(s)) => Ok(Value::Int(s.chars().count() as i64)),
                _ => Err(RuntimeError("len() requires an array or string".into())),
            },
            "int" => values
                .first()
                .and_then(Value::as_decimal)
                .map(|d| Value::Int(d.trunc().to_string().parse().unwrap_or(0)))
                .ok_or_else(|| RuntimeError("int() requires a number".into())),
            "decimal" => match values.first() {
                Some(Value::Str(s)) => s
                    .parse::<Decimal>()
                    .map(Value::Decimal)
                    .map_err(|e| RuntimeError(format!("decimal() parse failed: {e}"))),
                Some(v) => {
                    v.as_decimal().map(Value::Decimal).ok_or_else(|| RuntimeError("decimal() requires a number or numeric string".into()))
                }
                None => Err(RuntimeError("decimal() requires one argument".into())),
            },
            "str" => Ok(Value::Str(values.first().map(Value::to_string).unwrap_or_default())),
            "tuple" => Ok(Value::Tuple(values)),
            other => {
                if let Some(f) = self.program.find_fn(other) {
                    self.call_fn(&f.clone(), values)
                } else {
                    Err(RuntimeError(format!("call to undefined function '{other}'")))
                }
            }
        }
    }

    fn eval_method_call(
        &mut self,
        receiver: &Expr,
        method: &str,
        args: &[Expr],
    ) -> Result<Value, RuntimeError> {
        let values: Result<Vec<_>, _> = args.iter().map(|a| self.eval(a)).collect();
        let values = values?;
        if let Expr::Ident(name) = receiver {
            if name == "state" {
                return self.eval_state_method(method, &values);
            }
            if name == "users" {
                return self.eval_users_method(method, &values);
            }
        }
        Err(RuntimeError(format!("unknown method receiver for '.{method}(..)'")))
    }

    fn eval_state_method(&mut self, method: &str, args: &[Value]) -> Result<Value, RuntimeError> {
        match method {
            "get" => {
                let key = args.first().and_then(Value::as_str).ok_or_else(|| {
                    RuntimeError("state.get(key) requires a string key".to_string())
                })?;
                Ok(self.state.get(key))
            }
            "set" => {
                let key = args.first().and_then(Value::as_str).ok_or_else(|| {
                    RuntimeError("state.set(key, value) requires a string key".to_string())
                })?.to_string();
                let value = args.get(1).cloned().unwrap_or(Value::Unit);
                self.state.set(&key, value);
                Ok(Value::Unit)
            }
            "balance_of" => {
                let addr = args.first().and_then(Value::as_str).ok_or_else(|| {
                    RuntimeError("state.balance_of(address) requires a string address".to_string())
                })?;
                Ok(Value::Decimal(self.state.balance_of(addr)))
            }
            "credit" => {
                let addr = args.first().and_then(Value::as_str).ok_or_else(|| {
                    RuntimeError("state.credit(address, amount) requires a string address".to_string())
                })?.to_string();
                let amount = args.get(1).and_then(Value::as_decimal).ok_or_else(|| {
                    RuntimeError("state.credit(address, amount) requires a numeric amount".to_string())
                })?;
                self.state.credit(&addr, amount);
                Ok(Value::Unit)
            }
            "debit" => {
                let addr = args.first().and_then(Value::as_str).ok_or_else(|| {
                    RuntimeError("state.debit(address, amount) requires a string address".to_string())
                })?.to_string();
                let amount = args.get(1).and_then(Value::as_decimal).ok_or_else(|| {
                    RuntimeError("state.debit(address, amount) requires a numeric amount".to_string())
                })?;
                Ok(Value::Bool(self.state.debit(&addr, amount)))
            }
            other => Err(RuntimeError(format!("unknown state method '{other}'"))),
        }
    }

    fn eval_users_method(&mut self, method: &str, args: &[Value]) -> Result<Value, RuntimeError> {
        let address = args.first().and_then(Value::as_str).ok_or_else(|| {
            RuntimeError(format!("users.{method}(address, key) requires a string address"))
        })?.to_string();
        let key = args.get(1).and_then(Value::as_str).ok_or_else(|| {
            RuntimeError(format!("users.{method}(address, key) requires a string key"))
        })?.to_string();
        match method {
            "register" => Ok(Value::Bool(self.state.register_user(&address, &key))),
            "authenticate" => Ok(Value::Bool(self.state.authenticate_user(&address, &key))),
            other => Err(RuntimeError(format!("unknown users method '{other}'"))),
        }
    }
}

fn as_index(v: &Value) -> Result<usize, RuntimeError> {
    match v {
        Value::Int(i) if *i >= 0 => Ok(*i as usize),
        _ => Err(RuntimeError("index must be a non-negative integer".into())),
    }
}

fn numeric_binop(
    l: &Value,
    r: &Value,
    f: impl Fn(Decimal, Decimal) -> Decimal,
) -> Result<Value, RuntimeError> {
    let (a, b) = (
        l.as_decimal().ok_or_else(|| RuntimeError(format!("'{l}' is not a number")))?,
        r.as_decimal().ok_or_else(|| RuntimeError(format!("'{r}' is not a number")))?,
    );
    let result = f(a, b);
    if let (Value::Int(_), Value::Int(_)) = (l, r) {
        if let Ok(i) = result.to_string().parse::<i64>() {
            if result.fract().is_zero() {
                return Ok(Value::Int(i));
            }
        }
    }
    Ok(Value::Decimal(result))
}

fn values_equal(l: &Value, r: &Value) -> bool {
    match (l.as_decimal(), r.as_decimal()) {
        (Some(a), Some(b)) => a == b,
        _ => l == r,
    }
}

fn cmp_binop(l: &Value, r: &Value, pred: impl Fn(std::cmp::Ordering) -> bool) -> Result<Value, RuntimeError> {
    let a = l.as_decimal().ok_or_else(|| RuntimeError("comparison requires numbers".into()))?;
    let b = r.as_decimal().ok_or_else(|| RuntimeError("comparison requires numbers".into()))?;
    Ok(Value::Bool(pred(a.cmp(&b))))
}
