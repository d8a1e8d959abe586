//! Tree-walking evaluator.
//!
//! Runs a type-checked program directly off the syntax tree. The
//! `Environment` holds the call-context stack and every variable slot;
//! the `DomainWorld` holds the folder/file/audio object graph. The
//! evaluator is fail-fast: the first runtime fault unwinds all scopes
//! and contexts and ends the run.

use std::cell::RefCell;
use std::collections::HashMap;
use std::io::{self, BufRead, Write};
use std::rc::Rc;

use crate::ast::{BinaryOp, CtorType, Expr, FuncDef, Program, Stmt};
use crate::builtins::Builtin;
use crate::config::Config;
use crate::diagnostics::{Fault, FaultKind, Position};
use crate::world::DomainWorld;

pub mod env;
pub mod value;

use env::Environment;
use value::{Slot, Value};

type RunResult<T> = Result<T, Fault>;

/// Control-flow marker for statement execution.
enum Exec {
    Continue,
    Return(Value),
}

/// Where `print` writes and where `input` reads from.
pub struct Io {
    out: Box<dyn Write>,
    input: Box<dyn FnMut() -> Option<String>>,
}

impl Io {
    pub fn new(out: Box<dyn Write>, input: Box<dyn FnMut() -> Option<String>>) -> Self {
        Self { out, input }
    }

    pub fn stdio() -> Self {
        Self {
            out: Box::new(io::stdout()),
            input: Box::new(|| {
                let mut line = String::new();
                match io::stdin().lock().read_line(&mut line) {
                    Ok(0) | Err(_) => None,
                    Ok(_) => {
                        while line.ends_with('\n') || line.ends_with('\r') {
                            line.pop();
                        }
                        Some(line)
                    }
                }
            }),
        }
    }

    pub(crate) fn write_line(&mut self, line: &str) {
        let _ = writeln!(self.out, "{line}");
    }

    /// An `Io` that records output and replays scripted input lines.
    pub fn capture(input_lines: Vec<String>) -> (Self, OutputCapture) {
        let capture = OutputCapture::default();
        let writer = capture.clone();
        let mut lines = input_lines.into_iter();
        let io = Self {
            out: Box::new(writer),
            input: Box::new(move || lines.next()),
        };
        (io, capture)
    }
}

/// Shared buffer behind a capturing `Io`.
#[derive(Clone, Default)]
pub struct OutputCapture(Rc<RefCell<Vec<u8>>>);

impl OutputCapture {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.0.borrow()).into_owned()
    }
}

impl Write for OutputCapture {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

pub struct Interpreter {
    config: Config,
    env: Environment,
    world: DomainWorld,
    functions: HashMap<String, Rc<FuncDef>>,
    io: Io,
}

impl Interpreter {
    pub fn new(config: Config) -> Self {
        Self::with_io(config, Io::stdio())
    }

    pub fn with_io(config: Config, io: Io) -> Self {
        Self {
            env: Environment::new(&config),
            world: DomainWorld::new(),
            functions: HashMap::new(),
            config,
            io,
        }
    }

    pub fn world_mut(&mut self) -> &mut DomainWorld {
        &mut self.world
    }

    /// Executes the top-level statements in source order. A top-level
    /// `return` ends the program normally.
    pub fn run(&mut self, program: &Program) -> RunResult<()> {
        for statement in &program.statements {
            if let Stmt::FuncDef(def) = statement {
                self.functions.insert(def.name.clone(), Rc::clone(def));
            }
        }
        for statement in &program.statements {
            match self.exec_statement(statement)? {
                Exec::Continue => {}
                Exec::Return(_) => break,
            }
        }
        Ok(())
    }

    // --- Statements ---

    fn exec_statement(&mut self, statement: &Stmt) -> RunResult<Exec> {
        match statement {
            Stmt::FuncDef(_) => Ok(Exec::Continue),
            Stmt::VarDecl { name, init, .. } => {
                let value = self.eval(init)?;
                self.env.declare(name, Value::new_slot(value));
                Ok(Exec::Continue)
            }
            Stmt::Assign { target, value, .. } => {
                let value = self.eval(value)?;
                match target {
                    crate::ast::AssignTarget::Name { name, position } => {
                        let slot = self.env.slot(name).ok_or_else(|| {
                            Fault::new(FaultKind::UndeclaredVariable, *position)
                        })?;
                        *slot.borrow_mut() = value;
                    }
                    // Attribute writes never pass the type checker.
                    crate::ast::AssignTarget::Member { position, .. } => {
                        return Err(Fault::new(FaultKind::InvalidValue, *position));
                    }
                }
                Ok(Exec::Continue)
            }
            Stmt::If {
                condition,
                then_block,
                else_block,
                ..
            } => {
                if self.eval_condition(condition)? {
                    self.exec_block(then_block)
                } else if let Some(else_block) = else_block {
                    self.exec_block(else_block)
                } else {
                    Ok(Exec::Continue)
                }
            }
            Stmt::While {
                condition, body, ..
            } => {
                while self.eval_condition(condition)? {
                    if let Exec::Return(value) = self.exec_block(body)? {
                        return Ok(Exec::Return(value));
                    }
                }
                Ok(Exec::Continue)
            }
            Stmt::Expr { expr, .. } => {
                self.eval(expr)?;
                Ok(Exec::Continue)
            }
            Stmt::Return { value, .. } => {
                let value = match value {
                    Some(value) => self.eval(value)?,
                    None => Value::Null,
                };
                Ok(Exec::Return(value))
            }
        }
    }

    /// Runs a block in a fresh scope frame. The frame is released on
    /// every exit path, faults included.
    fn exec_block(&mut self, statements: &[Stmt]) -> RunResult<Exec> {
        self.env.enter_scope();
        let result = self.exec_statements(statements);
        self.env.exit_scope();
        result
    }

    fn exec_statements(&mut self, statements: &[Stmt]) -> RunResult<Exec> {
        for statement in statements {
            if let Exec::Return(value) = self.exec_statement(statement)? {
                return Ok(Exec::Return(value));
            }
        }
        Ok(Exec::Continue)
    }

    fn eval_condition(&mut self, condition: &Expr) -> RunResult<bool> {
        let value = self.eval(condition)?;
        value
            .as_bool()
            .ok_or_else(|| Fault::new(FaultKind::InvalidCondition, condition.position()))
    }

    // --- Expressions ---

    fn eval(&mut self, expr: &Expr) -> RunResult<Value> {
        match expr {
            Expr::IntLit { value, .. } => Ok(Value::Int(*value)),
            Expr::FloatLit { value, .. } => Ok(Value::Float(*value)),
            Expr::StringLit { value, .. } => Ok(Value::Str(value.clone())),
            Expr::BoolLit { value, .. } => Ok(Value::Bool(*value)),
            Expr::NullLit { .. } => Ok(Value::Null),
            Expr::Ident { name, position } => self
                .env
                .load(name)
                .ok_or_else(|| Fault::new(FaultKind::UndeclaredVariable, *position)),
            Expr::Negate { operand, position } => match self.eval(operand)? {
                Value::Int(value) => Ok(Value::Int(value.wrapping_neg())),
                Value::Float(value) => Ok(Value::Float(-value)),
                _ => Err(Fault::new(FaultKind::InvalidValue, *position)),
            },
            Expr::Binary {
                op,
                left,
                right,
                position,
            } => self.eval_binary(*op, left, right, *position),
            Expr::Call {
                name,
                args,
                position,
            } => self.eval_call(name, args, *position),
            Expr::Member {
                target,
                name,
                args,
                position,
            } => match args {
                None => self.eval_attribute(target, name, *position),
                Some(args) => self.eval_method(target, name, args, *position),
            },
            Expr::Ctor {
                ctor,
                args,
                position,
            } => self.eval_ctor(*ctor, args, *position),
            Expr::ListLit { items, .. } => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    values.push(self.eval(item)?);
                }
                Ok(Value::new_list(values))
            }
        }
    }

    fn eval_binary(
        &mut self,
        op: BinaryOp,
        left: &Expr,
        right: &Expr,
        position: Position,
    ) -> RunResult<Value> {
        // Short-circuit forms never evaluate the right operand eagerly.
        if matches!(op, BinaryOp::And | BinaryOp::Or) {
            let left_value = self
                .eval(left)?
                .as_bool()
                .ok_or_else(|| Fault::new(FaultKind::InvalidCondition, left.position()))?;
            let skip = match op {
                BinaryOp::And => !left_value,
                _ => left_value,
            };
            if skip {
                return Ok(Value::Bool(left_value));
            }
            let right_value = self
                .eval(right)?
                .as_bool()
                .ok_or_else(|| Fault::new(FaultKind::InvalidCondition, right.position()))?;
            return Ok(Value::Bool(right_value));
        }

        let left_value = self.eval(left)?;
        let right_value = self.eval(right)?;

        if matches!(op, BinaryOp::Eq | BinaryOp::NotEq) {
            let equal = self.values_equal(&left_value, &right_value);
            return Ok(Value::Bool(if op == BinaryOp::Eq { equal } else { !equal }));
        }

        match (left_value, right_value) {
            (Value::Int(a), Value::Int(b)) => match op {
                BinaryOp::Add => Ok(Value::Int(a.wrapping_add(b))),
                BinaryOp::Sub => Ok(Value::Int(a.wrapping_sub(b))),
                BinaryOp::Mul => Ok(Value::Int(a.wrapping_mul(b))),
                BinaryOp::Div => {
                    if b == 0 {
                        return Err(Fault::new(FaultKind::DivisionByZero, position));
                    }
                    Ok(Value::Int(a.wrapping_div(b)))
                }
                BinaryOp::Less => Ok(Value::Bool(a < b)),
                BinaryOp::LessEq => Ok(Value::Bool(a <= b)),
                BinaryOp::Greater => Ok(Value::Bool(a > b)),
                BinaryOp::GreaterEq => Ok(Value::Bool(a >= b)),
                _ => Err(Fault::new(FaultKind::InvalidValue, position)),
            },
            (Value::Float(a), Value::Float(b)) => match op {
                BinaryOp::Add => Ok(Value::Float(a + b)),
                BinaryOp::Sub => Ok(Value::Float(a - b)),
                BinaryOp::Mul => Ok(Value::Float(a * b)),
                BinaryOp::Div => Ok(Value::Float(a / b)),
                _ => Err(Fault::new(FaultKind::InvalidValue, position)),
            },
            (Value::Str(a), Value::Str(b)) if op == BinaryOp::Add => Ok(Value::Str(a + &b)),
            _ => Err(Fault::new(FaultKind::InvalidValue, position)),
        }
    }

    fn values_equal(&self, left: &Value, right: &Value) -> bool {
        match (left, right) {
            (Value::Null, Value::Null) => true,
            (Value::Null, _) | (_, Value::Null) => false,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Folder(a), Value::Folder(b)) => a == b,
            (Value::File(a) | Value::Audio(a), Value::File(b) | Value::Audio(b)) => {
                self.world.files_equal(*a, *b)
            }
            _ => false,
        }
    }

    // --- Calls ---

    fn eval_call(&mut self, name: &str, args: &[Expr], position: Position) -> RunResult<Value> {
        if let Some(def) = self.functions.get(name).cloned() {
            return self.call_user_function(&def, args, position);
        }
        if let Some(builtin) = Builtin::from_name(name) {
            let mut values = Vec::with_capacity(args.len());
            for arg in args {
                values.push(self.eval(arg)?);
            }
            return self.call_builtin(builtin, values, position);
        }
        Err(Fault::new(FaultKind::UndeclaredVariable, position))
    }

    /// Calls a user function with reference-passing semantics: an lvalue
    /// argument binds the parameter to the caller's own slot, so
    /// assignments inside the callee are visible to the caller; an
    /// rvalue argument gets a fresh slot local to the call.
    fn call_user_function(
        &mut self,
        def: &FuncDef,
        args: &[Expr],
        position: Position,
    ) -> RunResult<Value> {
        let mut arg_slots: Vec<Slot> = Vec::with_capacity(args.len());
        for arg in args {
            let slot = match arg {
                Expr::Ident { name, position } => self
                    .env
                    .slot(name)
                    .ok_or_else(|| Fault::new(FaultKind::UndeclaredVariable, *position))?,
                other => Value::new_slot(self.eval(other)?),
            };
            arg_slots.push(slot);
        }

        self.env.push_context(&def.name, position)?;
        for (param, slot) in def.params.iter().zip(arg_slots) {
            self.env.declare(&param.name, slot);
        }
        let outcome = self.exec_block(&def.body);
        self.env.pop_context();

        match outcome? {
            Exec::Return(value) => Ok(value),
            Exec::Continue => Ok(Value::Null),
        }
    }

    fn call_builtin(
        &mut self,
        builtin: Builtin,
        mut args: Vec<Value>,
        position: Position,
    ) -> RunResult<Value> {
        let fault = |kind| Fault::new(kind, position);
        let mut arg = || args.remove(0);
        match builtin {
            Builtin::Print => {
                let Value::Str(text) = arg() else {
                    return Err(fault(FaultKind::InvalidValue));
                };
                let _ = writeln!(self.io.out, "{text}");
                Ok(Value::Null)
            }
            Builtin::Input => {
                let line = (self.io.input)().unwrap_or_default();
                Ok(Value::Str(line))
            }
            Builtin::Btos => match arg() {
                Value::Bool(value) => Ok(Value::Str(
                    if value { "true" } else { "false" }.to_string(),
                )),
                _ => Err(fault(FaultKind::InvalidValue)),
            },
            Builtin::Stoi => match arg() {
                Value::Str(text) => parse_int_prefix(&text)
                    .map(Value::Int)
                    .ok_or_else(|| fault(FaultKind::TypeConversion)),
                _ => Err(fault(FaultKind::InvalidValue)),
            },
            Builtin::Itos => match arg() {
                Value::Int(value) => Ok(Value::Str(value.to_string())),
                _ => Err(fault(FaultKind::InvalidValue)),
            },
            Builtin::Stof => match arg() {
                Value::Str(text) => parse_float_prefix(&text)
                    .map(Value::Float)
                    .ok_or_else(|| fault(FaultKind::TypeConversion)),
                _ => Err(fault(FaultKind::InvalidValue)),
            },
            Builtin::Ftos => match arg() {
                Value::Float(value) => Ok(Value::Str(format_float(value))),
                _ => Err(fault(FaultKind::InvalidValue)),
            },
            Builtin::Itof => match arg() {
                Value::Int(value) => Ok(Value::Float(value as f64)),
                _ => Err(fault(FaultKind::InvalidValue)),
            },
            Builtin::Ftoi => match arg() {
                Value::Float(value) => Ok(Value::Int(value.trunc() as i64)),
                _ => Err(fault(FaultKind::InvalidValue)),
            },
            Builtin::Atof => match arg() {
                Value::Audio(id) => {
                    self.world
                        .strip_audio(id)
                        .map_err(|kind| fault(kind))?;
                    Ok(Value::File(id))
                }
                Value::Null => Ok(Value::Null),
                _ => Err(fault(FaultKind::InvalidValue)),
            },
            Builtin::Ftoa => match arg() {
                Value::File(id) => {
                    let is_audio = self.world.probe_audio(id).map_err(|kind| fault(kind))?;
                    if is_audio {
                        Ok(Value::Audio(id))
                    } else {
                        Ok(Value::Null)
                    }
                }
                Value::Null => Ok(Value::Null),
                _ => Err(fault(FaultKind::InvalidValue)),
            },
        }
    }

    fn eval_ctor(&mut self, ctor: CtorType, args: &[Expr], position: Position) -> RunResult<Value> {
        let value = self.eval(&args[0])?;
        let Value::Str(name) = value else {
            return Err(Fault::new(FaultKind::InvalidValue, position));
        };
        let value = match ctor {
            CtorType::Folder => {
                Value::Folder(self.world.open_folder(&name, self.config.max_folder_depth))
            }
            CtorType::File => Value::File(self.world.create_file(&name)),
            CtorType::Audio => Value::Audio(self.world.create_audio(&name)),
        };
        Ok(value)
    }

    // --- Domain members ---

    fn eval_attribute(&mut self, target: &Expr, name: &str, position: Position) -> RunResult<Value> {
        let receiver = self.eval(target)?;
        let fault = |kind| Fault::new(kind, position);
        if receiver.is_null() {
            return Err(fault(FaultKind::InvalidValue));
        }

        match (&receiver, name) {
            (Value::Audio(id), "length") => {
                Ok(Value::Int(self.world.audio_meta(*id).map_err(fault)?.length_ms))
            }
            (Value::Audio(id), "bitrate") => {
                Ok(Value::Int(self.world.audio_meta(*id).map_err(fault)?.bitrate))
            }
            (Value::Audio(id), "title") => Ok(Value::Str(
                self.world.audio_meta(*id).map_err(fault)?.title.clone(),
            )),
            (Value::File(id) | Value::Audio(id), "filename") => {
                Ok(Value::Str(self.world.filename(*id).map_err(fault)?))
            }
            (Value::File(id) | Value::Audio(id), "parent") => {
                match self.world.file_parent(*id).map_err(fault)? {
                    Some(folder) => Ok(Value::Folder(folder)),
                    None => Ok(Value::Null),
                }
            }
            (Value::Folder(id), "is_root") => Ok(Value::Bool(self.world.folder(*id).is_root)),
            (Value::Folder(id), "name") => Ok(Value::Str(self.world.folder_name(*id))),
            (Value::Folder(id), "files") => Ok(Value::new_list(
                self.world
                    .folder_files(*id)
                    .into_iter()
                    .map(Value::File)
                    .collect(),
            )),
            (Value::Folder(id), "subfolders") => Ok(Value::new_list(
                self.world
                    .folder_subfolders(*id)
                    .into_iter()
                    .map(Value::Folder)
                    .collect(),
            )),
            _ => Err(fault(FaultKind::InvalidValue)),
        }
    }

    fn eval_method(
        &mut self,
        target: &Expr,
        name: &str,
        args: &[Expr],
        position: Position,
    ) -> RunResult<Value> {
        let receiver = self.eval(target)?;
        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            values.push(self.eval(arg)?);
        }
        let fault = |kind| Fault::new(kind, position);
        if receiver.is_null() {
            return Err(fault(FaultKind::InvalidValue));
        }

        match &receiver {
            Value::List(list) => self.eval_list_method(list.clone(), name, values, position),
            Value::File(id) | Value::Audio(id) => {
                let id = *id;
                match name {
                    "move" => {
                        let Some(Value::Folder(folder)) = values.first() else {
                            return Err(fault(FaultKind::InvalidValue));
                        };
                        self.world.move_file(id, *folder).map_err(fault)?;
                        Ok(Value::Null)
                    }
                    "delete" => {
                        self.world.delete_file(id).map_err(fault)?;
                        Ok(Value::Null)
                    }
                    "change_filename" => {
                        let Some(Value::Str(new_name)) = values.first() else {
                            return Err(fault(FaultKind::InvalidValue));
                        };
                        self.world.change_filename(id, new_name).map_err(fault)?;
                        Ok(Value::Null)
                    }
                    "cut" => {
                        let (Some(Value::Int(start)), Some(Value::Int(end))) =
                            (values.first(), values.get(1))
                        else {
                            return Err(fault(FaultKind::InvalidValue));
                        };
                        self.world.cut_audio(id, *start, *end).map_err(fault)?;
                        Ok(Value::Null)
                    }
                    "concat" => {
                        let other = values
                            .first()
                            .and_then(Value::file_id)
                            .ok_or_else(|| fault(FaultKind::InvalidValue))?;
                        self.world.concat_audio(id, other).map_err(fault)?;
                        Ok(Value::Null)
                    }
                    "change_title" => {
                        let Some(Value::Str(title)) = values.first() else {
                            return Err(fault(FaultKind::InvalidValue));
                        };
                        self.world.change_title(id, title).map_err(fault)?;
                        Ok(Value::Null)
                    }
                    "change_format" => {
                        let Some(Value::Str(format)) = values.first() else {
                            return Err(fault(FaultKind::InvalidValue));
                        };
                        self.world.change_format(id, format).map_err(fault)?;
                        Ok(Value::Null)
                    }
                    "change_volume" => {
                        let Some(Value::Float(factor)) = values.first() else {
                            return Err(fault(FaultKind::InvalidValue));
                        };
                        self.world.change_volume(id, *factor).map_err(fault)?;
                        Ok(Value::Null)
                    }
                    _ => Err(fault(FaultKind::InvalidValue)),
                }
            }
            Value::Folder(id) => {
                let id = *id;
                match name {
                    "get_file" => {
                        let Some(Value::Str(file_name)) = values.first() else {
                            return Err(fault(FaultKind::InvalidValue));
                        };
                        match self.world.file_by_name(id, file_name) {
                            Some(file) => Ok(Value::File(file)),
                            None => Ok(Value::Null),
                        }
                    }
                    "add_file" => {
                        let file = values
                            .first()
                            .and_then(Value::file_id)
                            .ok_or_else(|| fault(FaultKind::InvalidValue))?;
                        self.world.add_file(id, file).map_err(fault)?;
                        Ok(Value::Null)
                    }
                    "remove_file" => {
                        let Some(Value::Str(file_name)) = values.first() else {
                            return Err(fault(FaultKind::InvalidValue));
                        };
                        self.world.remove_file(id, file_name).map_err(fault)?;
                        Ok(Value::Null)
                    }
                    "get_subfolder" => {
                        let Some(Value::Str(folder_name)) = values.first() else {
                            return Err(fault(FaultKind::InvalidValue));
                        };
                        match self.world.subfolder_by_name(id, folder_name) {
                            Some(folder) => Ok(Value::Folder(folder)),
                            None => Ok(Value::Null),
                        }
                    }
                    "list_audio" => Ok(Value::new_list(
                        self.world
                            .list_audio(id)
                            .into_iter()
                            .map(Value::Audio)
                            .collect(),
                    )),
                    _ => Err(fault(FaultKind::InvalidValue)),
                }
            }
            _ => Err(fault(FaultKind::InvalidValue)),
        }
    }

    fn eval_list_method(
        &mut self,
        list: value::ListRef,
        name: &str,
        values: Vec<Value>,
        position: Position,
    ) -> RunResult<Value> {
        let fault = |kind| Fault::new(kind, position);
        match name {
            "len" => Ok(Value::Int(list.borrow().len() as i64)),
            "get" => {
                let Some(Value::Int(index)) = values.first() else {
                    return Err(fault(FaultKind::InvalidValue));
                };
                let items = list.borrow();
                let index = usize::try_from(*index)
                    .ok()
                    .filter(|&index| index < items.len())
                    .ok_or_else(|| fault(FaultKind::ListIndexOutOfBounds))?;
                Ok(items[index].clone())
            }
            "set" => {
                let mut values = values.into_iter();
                let (Some(Value::Int(index)), Some(new_value)) = (values.next(), values.next())
                else {
                    return Err(fault(FaultKind::InvalidValue));
                };
                let mut items = list.borrow_mut();
                let index = usize::try_from(index)
                    .ok()
                    .filter(|&index| index < items.len())
                    .ok_or_else(|| fault(FaultKind::ListIndexOutOfBounds))?;
                items[index] = new_value;
                Ok(Value::Null)
            }
            _ => Err(fault(FaultKind::InvalidValue)),
        }
    }
}

/// Longest optional-sign decimal integer prefix, e.g. `"-12ab"` → -12.
fn parse_int_prefix(text: &str) -> Option<i64> {
    let bytes = text.as_bytes();
    let mut end = 0;
    if matches!(bytes.first(), Some(b'+') | Some(b'-')) {
        end = 1;
    }
    let digits_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    if end == digits_start {
        return None;
    }
    text[..end].parse().ok()
}

/// Longest optional-sign decimal float prefix, e.g. `"3.5x"` → 3.5.
fn parse_float_prefix(text: &str) -> Option<f64> {
    let bytes = text.as_bytes();
    let mut end = 0;
    if matches!(bytes.first(), Some(b'+') | Some(b'-')) {
        end = 1;
    }
    let int_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    let has_int_digits = end > int_start;
    if end < bytes.len() && bytes[end] == b'.' {
        let dot = end;
        end += 1;
        let frac_start = end;
        while end < bytes.len() && bytes[end].is_ascii_digit() {
            end += 1;
        }
        if end == frac_start && !has_int_digits {
            return None;
        }
        if end == frac_start && has_int_digits {
            end = dot + 1; // "12." is a valid prefix
        }
    } else if !has_int_digits {
        return None;
    }
    text[..end].parse().ok()
}

/// Prints a float with at least one fractional digit, round-trippable
/// through `stof`.
fn format_float(value: f64) -> String {
    if value.is_nan() {
        return "NaN".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    let mut rendered = format!("{value}");
    if !rendered.contains('.') {
        rendered.push_str(".0");
    }
    rendered
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer;
    use crate::parser;
    use crate::typecheck;
    use indoc::indoc;

    fn interpret_with(
        source: &str,
        config: Config,
        input_lines: Vec<String>,
    ) -> (RunResult<()>, String) {
        let (tokens, lex_diagnostics) = lexer::tokenize(source, &config);
        assert!(lex_diagnostics.is_empty(), "lexer: {lex_diagnostics:?}");
        let (program, parse_diagnostics) = parser::parse_tokens(tokens);
        assert!(parse_diagnostics.is_empty(), "parser: {parse_diagnostics:?}");
        let check_diagnostics = typecheck::check_program(&program);
        assert!(check_diagnostics.is_empty(), "checker: {check_diagnostics:?}");

        let (io, capture) = Io::capture(input_lines);
        let mut interpreter = Interpreter::with_io(config, io);
        let result = interpreter.run(&program);
        (result, capture.text())
    }

    fn run_ok(source: &str) -> String {
        let (result, output) = interpret_with(source, Config::default(), Vec::new());
        result.expect("run failed");
        output
    }

    fn run_fault(source: &str) -> Fault {
        let (result, _) = interpret_with(source, Config::default(), Vec::new());
        result.expect_err("expected a fault")
    }

    #[test]
    fn prints_hello_world() {
        assert_eq!(run_ok(r#"print("Hello world");"#), "Hello world\n");
    }

    #[test]
    fn arithmetic_and_while_loop() {
        let output = run_ok(indoc! {"
            int n = 0;
            int total = 0;
            while (n < 5) {
                n = n + 1;
                total = total + n;
            }
            print(itos(total));
        "});
        assert_eq!(output, "15\n");
    }

    #[test]
    fn division_by_zero_faults_at_expression_start() {
        let fault = run_fault("int x = 10 / 0;");
        assert_eq!(fault.kind, FaultKind::DivisionByZero);
        assert_eq!(fault.position, Position::new(1, 9));
    }

    #[test]
    fn integer_overflow_wraps() {
        let output = run_ok(indoc! {"
            int big = 9223372036854775807;
            print(itos(big + 1));
        "});
        assert_eq!(output, "-9223372036854775808\n");
    }

    #[test]
    fn integer_division_truncates_toward_zero() {
        let output = run_ok(indoc! {"
            print(itos(7 / 2));
            print(itos(-7 / 2));
        "});
        assert_eq!(output, "3\n-3\n");
    }

    #[test]
    fn scope_shadowing_restores_outer_binding() {
        let output = run_ok(indoc! {"
            int x = 1;
            if (true) {
                int x = 2;
                print(itos(x));
            }
            print(itos(x));
        "});
        assert_eq!(output, "2\n1\n");
    }

    #[test]
    fn short_circuit_skips_right_operand() {
        let output = run_ok(indoc! {r#"
            func bool noisy() {
                print("evaluated");
                return true;
            }
            bool a = false && noisy();
            bool b = true || noisy();
            print(btos(a));
            print(btos(b));
        "#});
        assert_eq!(output, "false\ntrue\n");
    }

    #[test]
    fn simple_arguments_alias_caller_lvalues() {
        let output = run_ok(indoc! {"
            func void bump(int n) {
                n = n + 1;
                return;
            }
            int x = 41;
            bump(x);
            print(itos(x));
            bump(7);
            print(itos(x));
        "});
        assert_eq!(output, "42\n42\n");
    }

    #[test]
    fn composite_arguments_share_the_handle() {
        let output = run_ok(indoc! {"
            func void fill(List<int> xs) {
                xs.set(0, 99);
                return;
            }
            List<int> values = [1, 2];
            fill(values);
            print(itos(values.get(0)));
        "});
        assert_eq!(output, "99\n");
    }

    #[test]
    fn return_unwinds_nested_blocks() {
        let output = run_ok(indoc! {"
            func int pick(int n) {
                if (n > 0) {
                    return 1;
                }
                return 0;
            }
            print(itos(pick(5)));
        "});
        assert_eq!(output, "1\n");
    }

    #[test]
    fn top_level_return_stops_the_program() {
        let output = run_ok(indoc! {r#"
            print("before");
            return;
            print("after");
        "#});
        assert_eq!(output, "before\n");
    }

    #[test]
    fn recursion_limit_reports_call_stack_fault() {
        let source = indoc! {"
            func int spin(int v) {
                return spin(v + 1);
            }
            int y = spin(1);
        "};
        let mut config = Config::default();
        config.max_rec_depth = 10;
        let (result, _) = interpret_with(source, config, Vec::new());
        let fault = result.expect_err("expected stack fault");
        assert_eq!(fault.kind, FaultKind::CallStackLimitExceeded);
    }

    #[test]
    fn func_depth_limit_fires_exactly_at_limit_plus_one() {
        let source = indoc! {"
            func int down(int v) {
                if (v == 0) {
                    return 0;
                }
                return down(v - 1);
            }
            int r = down(5);
            print(itos(r));
        "};
        let mut deep_enough = Config::default();
        deep_enough.max_func_depth = 6;
        deep_enough.max_rec_depth = 100;
        let (result, output) = interpret_with(source, deep_enough, Vec::new());
        result.expect("depth 6 must be enough for 6 activations");
        assert_eq!(output, "0\n");

        let mut too_shallow = Config::default();
        too_shallow.max_func_depth = 5;
        too_shallow.max_rec_depth = 100;
        let (result, _) = interpret_with(source, too_shallow, Vec::new());
        assert_eq!(
            result.expect_err("expected fault").kind,
            FaultKind::CallStackLimitExceeded
        );
    }

    #[test]
    fn conversions_round_trip() {
        let output = run_ok(indoc! {r#"
            print(itos(stoi("-42")));
            print(itos(stoi("12abc")));
            print(ftos(stof("2.5")));
            print(ftos(itof(3)));
            print(itos(ftoi(7.9)));
            print(itos(ftoi(-7.9)));
            print(btos(true));
        "#});
        assert_eq!(output, "-42\n12\n2.5\n3.0\n7\n-7\ntrue\n");
    }

    #[test]
    fn ftos_keeps_a_fractional_digit() {
        let output = run_ok(r#"print(ftos(4.0));"#);
        assert_eq!(output, "4.0\n");
    }

    #[test]
    fn stoi_faults_on_non_integer() {
        let fault = run_fault(r#"int x = stoi("abc");"#);
        assert_eq!(fault.kind, FaultKind::TypeConversion);
        assert_eq!(fault.position, Position::new(1, 9));
    }

    #[test]
    fn stof_faults_on_empty_string() {
        let fault = run_fault(r#"float f = stof("");"#);
        assert_eq!(fault.kind, FaultKind::TypeConversion);
    }

    #[test]
    fn input_reads_scripted_lines_and_empty_at_eof() {
        let source = indoc! {r#"
            print(input());
            print(input());
            print(input());
        "#};
        let (result, output) = interpret_with(
            source,
            Config::default(),
            vec!["first".to_string(), "second".to_string()],
        );
        result.expect("run failed");
        assert_eq!(output, "first\nsecond\n\n");
    }

    #[test]
    fn list_get_out_of_bounds_faults_at_member_chain_start() {
        let fault = run_fault("List<int> a = [10, 20];print(itos(a.get(2)));");
        assert_eq!(fault.kind, FaultKind::ListIndexOutOfBounds);
        assert_eq!(fault.position, Position::new(1, 35));
    }

    #[test]
    fn list_set_and_negative_index() {
        let output = run_ok(indoc! {"
            List<int> xs = [1, 2, 3];
            xs.set(1, 9);
            print(itos(xs.get(1)));
            print(itos(xs.len()));
        "});
        assert_eq!(output, "9\n3\n");

        let fault = run_fault("List<int> xs = [1];\nxs.get(-1);");
        assert_eq!(fault.kind, FaultKind::ListIndexOutOfBounds);
    }

    #[test]
    fn list_assignment_copies_the_handle() {
        let output = run_ok(indoc! {"
            List<int> a = [1];
            List<int> b = a;
            b.set(0, 5);
            print(itos(a.get(0)));
        "});
        assert_eq!(output, "5\n");
    }

    #[test]
    fn file_lifecycle_move_delete_and_equality() {
        let output = run_ok(indoc! {r#"
            Folder inbox = Folder("/inbox");
            Folder archive = Folder("/archive");
            File note = File("note.txt");
            note.move(inbox);
            print(note.parent.name);
            print(itos(inbox.files.len()));
            note.move(archive);
            print(itos(inbox.files.len()));
            print(itos(archive.files.len()));
            File same = archive.get_file("note.txt");
            print(btos(same == note));
            note.delete();
            print(itos(archive.files.len()));
        "#});
        assert_eq!(output, "inbox\n1\n0\n1\ntrue\n0\n");
    }

    #[test]
    fn deleted_file_operations_fault_with_file_not_found() {
        let fault = run_fault(indoc! {r#"
            File f = File("gone.txt");
            f.delete();
            f.delete();
        "#});
        assert_eq!(fault.kind, FaultKind::FileNotFound);
        assert_eq!(fault.position, Position::new(3, 1));
    }

    #[test]
    fn mutation_through_parameter_is_visible_to_caller() {
        let output = run_ok(indoc! {r#"
            func void archive(File doc, Folder dst) {
                doc.move(dst);
                return;
            }
            Folder dst = Folder("/dst");
            File doc = File("doc.txt");
            archive(doc, dst);
            print(doc.parent.name);
        "#});
        assert_eq!(output, "dst\n");
    }

    #[test]
    fn ftoa_probes_by_extension_and_atof_strips() {
        let output = run_ok(indoc! {r#"
            File song = File("tune.mp3");
            File note = File("note.txt");
            Audio clip = ftoa(song);
            print(btos(clip == null));
            print(btos(ftoa(note) == null));
            print(clip.title);
            clip.change_title("Tune Two");
            print(clip.title);
            File back = atof(clip);
            print(back.filename);
        "#});
        assert_eq!(output, "false\ntrue\ntune\nTune Two\ntune.mp3\n");
    }

    #[test]
    fn audio_cut_out_of_range_is_invalid_value() {
        let fault = run_fault(indoc! {r#"
            Audio clip = Audio("a.mp3");
            clip.cut(0, 10);
        "#});
        assert_eq!(fault.kind, FaultKind::InvalidValue);
    }

    #[test]
    fn audio_concat_adds_length_and_change_format_renames() {
        let output = run_ok(indoc! {r#"
            Audio a = Audio("a.mp3");
            Audio b = Audio("b.mp3");
            a.concat(b);
            print(itos(a.length));
            print(itos(b.length));
            a.change_format("wav");
            print(a.filename);
        "#});
        assert_eq!(output, "0\n0\na.wav\n");
    }

    #[test]
    fn member_access_on_null_handle_faults() {
        let fault = run_fault(indoc! {r#"
            File f = null;
            f.delete();
        "#});
        assert_eq!(fault.kind, FaultKind::InvalidValue);
    }

    #[test]
    fn folder_identity_is_per_normalized_path() {
        let output = run_ok(indoc! {r#"
            Folder a = Folder("/music");
            Folder b = Folder("/music/../music");
            print(btos(a == b));
            print(btos(a.is_root));
        "#});
        assert_eq!(output, "true\ntrue\n");
    }

    #[test]
    fn parse_int_prefix_handles_signs_and_junk() {
        assert_eq!(parse_int_prefix("123"), Some(123));
        assert_eq!(parse_int_prefix("-45xyz"), Some(-45));
        assert_eq!(parse_int_prefix("+7"), Some(7));
        assert_eq!(parse_int_prefix(""), None);
        assert_eq!(parse_int_prefix("-"), None);
        assert_eq!(parse_int_prefix("abc"), None);
        assert_eq!(parse_int_prefix(" 5"), None);
    }

    #[test]
    fn parse_float_prefix_handles_shapes() {
        assert_eq!(parse_float_prefix("2.5"), Some(2.5));
        assert_eq!(parse_float_prefix(".5"), Some(0.5));
        assert_eq!(parse_float_prefix("12."), Some(12.0));
        assert_eq!(parse_float_prefix("-3.25end"), Some(-3.25));
        assert_eq!(parse_float_prefix("7"), Some(7.0));
        assert_eq!(parse_float_prefix("."), None);
        assert_eq!(parse_float_prefix("x1"), None);
    }

    #[test]
    fn format_float_round_trips_through_parse() {
        for value in [0.1, 1.5, -2.25, 123.456, 1e10, -0.0078125] {
            let rendered = format_float(value);
            assert_eq!(rendered.parse::<f64>().expect("parse failed"), value);
            assert!(rendered.contains('.'), "missing fraction in {rendered}");
        }
    }
}
