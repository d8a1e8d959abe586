use std::collections::HashMap;

use crate::ast::{
    AssignTarget, BinaryOp, Expr, FuncDef, FunctionTypeSignature, Program, Stmt, TypeSignature,
};
use crate::builtins::Builtin;
use crate::diagnostics::{Diagnostic, DiagnosticKind, Position};

pub mod symbols;

use symbols::{attribute_type, method_signature, SymbolTable};

type CheckResult<T> = Result<T, Diagnostic>;

/// Static checker over the parse tree.
///
/// A prescan collects every top-level function signature, then top-level
/// statements and function bodies are checked in source order. One
/// diagnostic is recorded per offending statement and checking continues
/// with the next statement. Function bodies are closed: their outermost
/// frame holds only the parameters.
pub struct TypeChecker {
    scopes: SymbolTable,
    functions: HashMap<String, FunctionTypeSignature>,
    current_return: Option<TypeSignature>,
    diagnostics: Vec<Diagnostic>,
}

impl TypeChecker {
    pub fn new() -> Self {
        Self {
            scopes: SymbolTable::new(),
            functions: HashMap::new(),
            current_return: None,
            diagnostics: Vec::new(),
        }
    }

    pub fn check(mut self, program: &Program) -> Vec<Diagnostic> {
        self.collect_functions(program);

        for statement in &program.statements {
            let result = match statement {
                Stmt::FuncDef(def) => self.check_function(def),
                other => self.check_statement(other),
            };
            if let Err(diagnostic) = result {
                self.diagnostics.push(diagnostic);
            }
        }
        self.diagnostics
    }

    fn collect_functions(&mut self, program: &Program) {
        for statement in &program.statements {
            let Stmt::FuncDef(def) = statement else {
                continue;
            };
            let clashes_with_builtin = Builtin::from_name(&def.name).is_some();
            if clashes_with_builtin || self.functions.contains_key(&def.name) {
                self.diagnostics.push(Diagnostic::new(
                    DiagnosticKind::FunctionRedeclaration,
                    def.position,
                ));
                continue;
            }
            let params = def.params.iter().map(|param| param.ty.clone()).collect();
            self.functions.insert(
                def.name.clone(),
                FunctionTypeSignature::new(params, def.return_type.clone()),
            );
        }
    }

    fn check_function(&mut self, def: &FuncDef) -> CheckResult<()> {
        // Bodies see only their parameters: swap in a fresh scope stack.
        let outer_scopes = std::mem::take(&mut self.scopes);
        let outer_return = self.current_return.replace(def.return_type.clone());

        let mut result = Ok(());
        for param in &def.params {
            if !self
                .scopes
                .declare(&param.name, param.ty.clone(), param.position)
            {
                result = Err(Diagnostic::new(
                    DiagnosticKind::UndeclaredVariable,
                    param.position,
                ));
                break;
            }
        }
        if result.is_ok() {
            self.check_block_statements(&def.body);
        }

        self.scopes = outer_scopes;
        self.current_return = outer_return;
        result
    }

    /// Checks a run of statements in the current frame, recording one
    /// diagnostic per bad statement.
    fn check_block_statements(&mut self, statements: &[Stmt]) {
        for statement in statements {
            if let Err(diagnostic) = self.check_statement(statement) {
                self.diagnostics.push(diagnostic);
            }
        }
    }

    fn check_statement(&mut self, statement: &Stmt) -> CheckResult<()> {
        match statement {
            Stmt::VarDecl {
                ty,
                name,
                init,
                position,
            } => {
                let init_type = self.infer(init, Some(ty))?;
                if !ty.accepts(&init_type) {
                    return Err(Diagnostic::new(
                        DiagnosticKind::InvalidType,
                        init.position(),
                    ));
                }
                if !self.scopes.declare(name, ty.clone(), *position) {
                    return Err(Diagnostic::new(
                        DiagnosticKind::UndeclaredVariable,
                        *position,
                    ));
                }
                Ok(())
            }
            Stmt::Assign { target, value, .. } => match target {
                AssignTarget::Name { name, position } => {
                    let Some(declared) = self.scopes.lookup(name).cloned() else {
                        return Err(Diagnostic::new(
                            DiagnosticKind::UndeclaredVariable,
                            *position,
                        ));
                    };
                    let value_type = self.infer(value, Some(&declared))?;
                    if !declared.accepts(&value_type) {
                        return Err(Diagnostic::new(
                            DiagnosticKind::InvalidType,
                            value.position(),
                        ));
                    }
                    Ok(())
                }
                // All attributes are read-only.
                AssignTarget::Member { position, .. } => {
                    Err(Diagnostic::new(DiagnosticKind::InvalidType, *position))
                }
            },
            Stmt::If {
                condition,
                then_block,
                else_block,
                ..
            } => {
                self.check_condition(condition)?;
                self.check_nested_block(then_block);
                if let Some(else_block) = else_block {
                    self.check_nested_block(else_block);
                }
                Ok(())
            }
            Stmt::While {
                condition, body, ..
            } => {
                self.check_condition(condition)?;
                self.check_nested_block(body);
                Ok(())
            }
            Stmt::Expr { expr, .. } => {
                self.infer(expr, None)?;
                Ok(())
            }
            Stmt::Return {
                value, position, ..
            } => self.check_return(value.as_ref(), *position),
            Stmt::FuncDef(def) => {
                // Nested definitions never parse; reaching one here means
                // a top-level definition, handled by `check`.
                self.check_function(def)
            }
        }
    }

    fn check_condition(&mut self, condition: &Expr) -> CheckResult<()> {
        let condition_type = self.infer(condition, Some(&TypeSignature::Bool))?;
        if condition_type != TypeSignature::Bool {
            return Err(Diagnostic::new(
                DiagnosticKind::InvalidCondition,
                condition.position(),
            ));
        }
        Ok(())
    }

    fn check_nested_block(&mut self, statements: &[Stmt]) {
        self.scopes.push_frame();
        self.check_block_statements(statements);
        self.scopes.pop_frame();
    }

    fn check_return(&mut self, value: Option<&Expr>, position: Position) -> CheckResult<()> {
        let Some(expected) = self.current_return.clone() else {
            // Top-level return terminates the program; the operand only
            // needs to be well-typed.
            if let Some(value) = value {
                self.infer(value, None)?;
            }
            return Ok(());
        };

        match value {
            None => {
                if expected != TypeSignature::Void {
                    return Err(Diagnostic::new(DiagnosticKind::InvalidType, position));
                }
                Ok(())
            }
            Some(value) => {
                if expected == TypeSignature::Void {
                    return Err(Diagnostic::new(
                        DiagnosticKind::InvalidType,
                        value.position(),
                    ));
                }
                let value_type = self.infer(value, Some(&expected))?;
                if !expected.accepts(&value_type) {
                    return Err(Diagnostic::new(
                        DiagnosticKind::InvalidType,
                        value.position(),
                    ));
                }
                Ok(())
            }
        }
    }

    /// Infers the type of an expression. `expected` is only a hint used
    /// to give empty list literals an element type; it never relaxes a
    /// mismatch.
    fn infer(&mut self, expr: &Expr, expected: Option<&TypeSignature>) -> CheckResult<TypeSignature> {
        match expr {
            Expr::IntLit { .. } => Ok(TypeSignature::Int),
            Expr::FloatLit { .. } => Ok(TypeSignature::Float),
            Expr::StringLit { .. } => Ok(TypeSignature::Str),
            Expr::BoolLit { .. } => Ok(TypeSignature::Bool),
            Expr::NullLit { .. } => Ok(TypeSignature::Null),
            Expr::Ident { name, position } => self
                .scopes
                .lookup(name)
                .cloned()
                .ok_or_else(|| Diagnostic::new(DiagnosticKind::UndeclaredVariable, *position)),
            Expr::Negate { operand, position } => {
                let operand_type = self.infer(operand, None)?;
                match operand_type {
                    TypeSignature::Int => Ok(TypeSignature::Int),
                    TypeSignature::Float => Ok(TypeSignature::Float),
                    _ => Err(Diagnostic::new(DiagnosticKind::InvalidType, *position)),
                }
            }
            Expr::Binary {
                op,
                left,
                right,
                position,
            } => self.infer_binary(*op, left, right, *position),
            Expr::Call {
                name,
                args,
                position,
            } => {
                let signature = if let Some(signature) = self.functions.get(name) {
                    signature.clone()
                } else if let Some(builtin) = Builtin::from_name(name) {
                    builtin.signature()
                } else {
                    return Err(Diagnostic::new(
                        DiagnosticKind::UndeclaredVariable,
                        *position,
                    ));
                };
                self.check_args(&signature, args, *position)?;
                Ok(signature.return_type)
            }
            Expr::Member {
                target,
                name,
                args,
                position,
            } => {
                let receiver = self.infer(target, None)?;
                if receiver == TypeSignature::Null {
                    return Err(Diagnostic::new(DiagnosticKind::InvalidType, *position));
                }
                match args {
                    None => attribute_type(&receiver, name)
                        .ok_or_else(|| Diagnostic::new(DiagnosticKind::InvalidType, *position)),
                    Some(args) => {
                        let signature = method_signature(&receiver, name).ok_or_else(|| {
                            Diagnostic::new(DiagnosticKind::InvalidType, *position)
                        })?;
                        self.check_args(&signature, args, *position)?;
                        Ok(signature.return_type)
                    }
                }
            }
            Expr::Ctor {
                ctor,
                args,
                position,
            } => {
                let signature =
                    FunctionTypeSignature::new(vec![TypeSignature::Str], ctor.signature());
                self.check_args(&signature, args, *position)?;
                Ok(ctor.signature())
            }
            Expr::ListLit { items, position } => self.infer_list(items, expected, *position),
        }
    }

    fn infer_binary(
        &mut self,
        op: BinaryOp,
        left: &Expr,
        right: &Expr,
        position: Position,
    ) -> CheckResult<TypeSignature> {
        use TypeSignature::*;
        let left_type = self.infer(left, None)?;
        let right_type = self.infer(right, None)?;
        let mismatch = || Diagnostic::new(DiagnosticKind::InvalidType, position);

        match op {
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div => {
                match (&left_type, &right_type) {
                    (Int, Int) => Ok(Int),
                    (Float, Float) => Ok(Float),
                    (Str, Str) if op == BinaryOp::Add => Ok(Str),
                    _ => Err(mismatch()),
                }
            }
            BinaryOp::Less | BinaryOp::LessEq | BinaryOp::Greater | BinaryOp::GreaterEq => {
                match (&left_type, &right_type) {
                    (Int, Int) => Ok(Bool),
                    _ => Err(mismatch()),
                }
            }
            BinaryOp::Eq | BinaryOp::NotEq => {
                let comparable = matches!(
                    (&left_type, &right_type),
                    (Int, Int) | (Str, Str) | (File, File) | (Folder, Folder) | (Audio, Audio)
                );
                let null_check = (left_type.is_composite() && right_type == Null)
                    || (left_type == Null && right_type.is_composite())
                    || (left_type == Null && right_type == Null);
                if comparable || null_check {
                    Ok(Bool)
                } else {
                    Err(mismatch())
                }
            }
            BinaryOp::And | BinaryOp::Or => match (&left_type, &right_type) {
                (Bool, Bool) => Ok(Bool),
                _ => Err(mismatch()),
            },
        }
    }

    fn check_args(
        &mut self,
        signature: &FunctionTypeSignature,
        args: &[Expr],
        position: Position,
    ) -> CheckResult<()> {
        if args.len() != signature.params.len() {
            return Err(Diagnostic::new(
                DiagnosticKind::InvalidArgumentType,
                position,
            ));
        }
        for (arg, param) in args.iter().zip(&signature.params) {
            let arg_type = self.infer(arg, Some(param))?;
            if !param.accepts(&arg_type) {
                return Err(Diagnostic::new(
                    DiagnosticKind::InvalidArgumentType,
                    arg.position(),
                ));
            }
        }
        Ok(())
    }

    fn infer_list(
        &mut self,
        items: &[Expr],
        expected: Option<&TypeSignature>,
        position: Position,
    ) -> CheckResult<TypeSignature> {
        let expected_element = match expected {
            Some(TypeSignature::List(element)) => Some((**element).clone()),
            _ => None,
        };

        if items.is_empty() {
            // An empty literal needs its element type from context.
            return match expected_element {
                Some(element) => Ok(TypeSignature::List(Box::new(element))),
                None => Err(Diagnostic::new(DiagnosticKind::InvalidType, position)),
            };
        }

        let element = match expected_element {
            Some(element) => element,
            None => self.infer(&items[0], None)?,
        };
        for item in items {
            let item_type = self.infer(item, Some(&element))?;
            if !element.accepts(&item_type) {
                return Err(Diagnostic::new(
                    DiagnosticKind::InvalidType,
                    item.position(),
                ));
            }
        }
        Ok(TypeSignature::List(Box::new(element)))
    }
}

impl Default for TypeChecker {
    fn default() -> Self {
        Self::new()
    }
}

/// Convenience entry: checks a program and returns its diagnostics.
pub fn check_program(program: &Program) -> Vec<Diagnostic> {
    TypeChecker::new().check(program)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::lexer;
    use crate::parser;
    use indoc::indoc;

    fn check(source: &str) -> Vec<Diagnostic> {
        let (tokens, lex_diagnostics) = lexer::tokenize(source, &Config::default());
        assert!(lex_diagnostics.is_empty(), "lexer: {lex_diagnostics:?}");
        let (program, parse_diagnostics) = parser::parse_tokens(tokens);
        assert!(parse_diagnostics.is_empty(), "parser: {parse_diagnostics:?}");
        check_program(&program)
    }

    fn assert_clean(source: &str) {
        let diagnostics = check(source);
        assert!(diagnostics.is_empty(), "unexpected {diagnostics:?}");
    }

    #[test]
    fn accepts_well_typed_program() {
        assert_clean(indoc! {r#"
            func int twice(int v) {
                return v * 2;
            }
            int x = twice(21);
            if (x == 42) {
                print(itos(x));
            }
        "#});
    }

    #[test]
    fn rejects_mismatched_declaration() {
        let diagnostics = check(r#"int x = "abc";"#);
        assert_eq!(
            diagnostics,
            vec![Diagnostic::new(
                DiagnosticKind::InvalidType,
                Position::new(1, 9)
            )]
        );
    }

    #[test]
    fn rejects_undeclared_reads_and_writes() {
        let diagnostics = check("x = 1;\nint y = z;");
        assert_eq!(diagnostics.len(), 2);
        assert!(diagnostics
            .iter()
            .all(|d| d.kind == DiagnosticKind::UndeclaredVariable));
    }

    #[test]
    fn rejects_same_frame_redeclaration() {
        let diagnostics = check("int x = 1;\nint x = 2;");
        assert_eq!(diagnostics[0].kind, DiagnosticKind::UndeclaredVariable);
    }

    #[test]
    fn allows_shadowing_in_nested_block() {
        assert_clean(indoc! {"
            int x = 1;
            if (true) {
                int x = 2;
                print(itos(x));
            }
        "});
    }

    #[test]
    fn rejects_non_bool_condition() {
        let diagnostics = check("if (1 + 2) { print(\"no\"); }");
        assert_eq!(
            diagnostics,
            vec![Diagnostic::new(
                DiagnosticKind::InvalidCondition,
                Position::new(1, 5)
            )]
        );
    }

    #[test]
    fn rejects_string_arithmetic_except_concat() {
        assert_clean(r#"string s = "a" + "b";"#);
        let diagnostics = check(r#"string s = "a" - "b";"#);
        assert_eq!(diagnostics[0].kind, DiagnosticKind::InvalidType);
    }

    #[test]
    fn rejects_float_comparison() {
        let diagnostics = check("bool b = 1.0 < 2.0;");
        assert_eq!(diagnostics[0].kind, DiagnosticKind::InvalidType);
    }

    #[test]
    fn allows_float_arithmetic() {
        assert_clean("float f = 1.5 + 2.5 * 2.0;");
    }

    #[test]
    fn rejects_mixed_int_float_arithmetic() {
        let diagnostics = check("float f = 1 + 2.0;");
        assert_eq!(diagnostics[0].kind, DiagnosticKind::InvalidType);
    }

    #[test]
    fn composite_accepts_null() {
        assert_clean(indoc! {r#"
            File f = null;
            f = File("a.txt");
            bool gone = f == null;
        "#});
    }

    #[test]
    fn simple_type_rejects_null() {
        let diagnostics = check("int x = null;");
        assert_eq!(diagnostics[0].kind, DiagnosticKind::InvalidType);
    }

    #[test]
    fn rejects_audio_assigned_to_file_variable() {
        let diagnostics = check(indoc! {r#"
            Audio a = Audio("x.mp3");
            File f = a;
        "#});
        assert_eq!(diagnostics[0].kind, DiagnosticKind::InvalidType);
    }

    #[test]
    fn audio_uses_file_members() {
        assert_clean(indoc! {r#"
            Audio a = Audio("x.mp3");
            string n = a.filename;
            a.delete();
        "#});
    }

    #[test]
    fn rejects_attribute_assignment() {
        let diagnostics = check(indoc! {r#"
            Audio a = Audio("x.mp3");
            a.title = "nope";
        "#});
        assert_eq!(diagnostics[0].kind, DiagnosticKind::InvalidType);
        assert_eq!(diagnostics[0].position, Position::new(2, 1));
    }

    #[test]
    fn rejects_wrong_arity_and_argument_types() {
        let diagnostics = check(indoc! {r#"
            func void shout(string s) {
                print(s);
                return;
            }
            shout();
            shout(1);
        "#});
        assert_eq!(diagnostics.len(), 2);
        assert!(diagnostics
            .iter()
            .all(|d| d.kind == DiagnosticKind::InvalidArgumentType));
    }

    #[test]
    fn rejects_duplicate_function_and_builtin_shadowing() {
        let diagnostics = check(indoc! {"
            func int f() {
                return 1;
            }
            func int f() {
                return 2;
            }
            func void print(string s) {
                return;
            }
        "});
        assert_eq!(diagnostics.len(), 2);
        assert!(diagnostics
            .iter()
            .all(|d| d.kind == DiagnosticKind::FunctionRedeclaration));
    }

    #[test]
    fn functions_are_closed_over_parameters_only() {
        let diagnostics = check(indoc! {"
            int global = 1;
            func int peek() {
                return global;
            }
        "});
        assert_eq!(diagnostics[0].kind, DiagnosticKind::UndeclaredVariable);
    }

    #[test]
    fn void_function_cannot_return_value() {
        let diagnostics = check(indoc! {"
            func void f() {
                return 1;
            }
        "});
        assert_eq!(diagnostics[0].kind, DiagnosticKind::InvalidType);
    }

    #[test]
    fn return_type_must_match() {
        let diagnostics = check(indoc! {r#"
            func int f() {
                return "text";
            }
        "#});
        assert_eq!(diagnostics[0].kind, DiagnosticKind::InvalidType);
    }

    #[test]
    fn empty_list_requires_declared_element_type() {
        assert_clean("List<int> xs = [];");
        let diagnostics = check("[];");
        assert_eq!(diagnostics[0].kind, DiagnosticKind::InvalidType);
    }

    #[test]
    fn list_elements_must_match_declared_type() {
        let diagnostics = check(r#"List<int> xs = [1, "two"];"#);
        assert_eq!(diagnostics[0].kind, DiagnosticKind::InvalidType);
        assert_eq!(diagnostics[0].position, Position::new(1, 20));
    }

    #[test]
    fn list_get_returns_element_type() {
        assert_clean(indoc! {"
            List<int> xs = [1, 2];
            int first = xs.get(0);
            xs.set(1, 5);
        "});
    }

    #[test]
    fn top_level_return_is_allowed() {
        assert_clean("print(\"bye\");\nreturn;");
    }

    #[test]
    fn member_access_on_null_literal_is_invalid() {
        let diagnostics = check("null.delete();");
        assert_eq!(diagnostics[0].kind, DiagnosticKind::InvalidType);
    }

    #[test]
    fn checker_reports_multiple_statement_errors() {
        let diagnostics = check(indoc! {r#"
            int a = "one";
            int b = "two";
        "#});
        assert_eq!(diagnostics.len(), 2);
    }
}
