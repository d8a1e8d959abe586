use crate::ast::{AssignTarget, Expr, FuncDef, Program, Stmt};

/// Renders a parse tree back to canonical Aud source.
///
/// The output re-parses to a structurally equal tree, which is the
/// property the `parse` run mode and the round-trip tests rely on.
/// Formatting is fixed: four-space indents, one statement per line,
/// spaces around binary operators.
pub fn print_program(program: &Program) -> String {
    let mut printer = Printer::new();
    for statement in &program.statements {
        printer.statement(statement);
    }
    printer.out
}

struct Printer {
    out: String,
    indent: usize,
}

impl Printer {
    fn new() -> Self {
        Self {
            out: String::new(),
            indent: 0,
        }
    }

    fn line_start(&mut self) {
        for _ in 0..self.indent {
            self.out.push_str("    ");
        }
    }

    fn statement(&mut self, statement: &Stmt) {
        self.line_start();
        match statement {
            Stmt::VarDecl { ty, name, init, .. } => {
                self.out.push_str(&format!("{ty} {name} = "));
                self.expression(init);
                self.out.push_str(";\n");
            }
            Stmt::Assign { target, value, .. } => {
                match target {
                    AssignTarget::Name { name, .. } => self.out.push_str(name),
                    AssignTarget::Member { target, name, .. } => {
                        self.expression(target);
                        self.out.push('.');
                        self.out.push_str(name);
                    }
                }
                self.out.push_str(" = ");
                self.expression(value);
                self.out.push_str(";\n");
            }
            Stmt::If {
                condition,
                then_block,
                else_block,
                ..
            } => {
                self.out.push_str("if (");
                self.expression(condition);
                self.out.push_str(") ");
                self.block(then_block);
                if let Some(else_block) = else_block {
                    self.out.push_str(" else ");
                    self.block(else_block);
                }
                self.out.push('\n');
            }
            Stmt::While {
                condition, body, ..
            } => {
                self.out.push_str("while (");
                self.expression(condition);
                self.out.push_str(") ");
                self.block(body);
                self.out.push('\n');
            }
            Stmt::Expr { expr, .. } => {
                self.expression(expr);
                self.out.push_str(";\n");
            }
            Stmt::Return { value, .. } => {
                self.out.push_str("return");
                if let Some(value) = value {
                    self.out.push(' ');
                    self.expression(value);
                }
                self.out.push_str(";\n");
            }
            Stmt::FuncDef(def) => self.function(def),
        }
    }

    fn function(&mut self, def: &FuncDef) {
        self.out.push_str(&format!("func {} {}(", def.return_type, def.name));
        for (index, param) in def.params.iter().enumerate() {
            if index > 0 {
                self.out.push_str(", ");
            }
            self.out.push_str(&format!("{} {}", param.ty, param.name));
        }
        self.out.push_str(") ");
        self.block(&def.body);
        self.out.push('\n');
    }

    fn block(&mut self, statements: &[Stmt]) {
        self.out.push_str("{\n");
        self.indent += 1;
        for statement in statements {
            self.statement(statement);
        }
        self.indent -= 1;
        self.line_start();
        self.out.push('}');
    }

    fn expression(&mut self, expr: &Expr) {
        match expr {
            Expr::IntLit { value, .. } => self.out.push_str(&value.to_string()),
            Expr::FloatLit { value, .. } => {
                let rendered = value.to_string();
                self.out.push_str(&rendered);
                if !rendered.contains('.') {
                    self.out.push_str(".0");
                }
            }
            Expr::StringLit { value, .. } => {
                self.out.push('"');
                for c in value.chars() {
                    match c {
                        '"' => self.out.push_str("\\\""),
                        '\\' => self.out.push_str("\\\\"),
                        '\n' => self.out.push_str("\\n"),
                        '\t' => self.out.push_str("\\t"),
                        '\r' => self.out.push_str("\\r"),
                        other => self.out.push(other),
                    }
                }
                self.out.push('"');
            }
            Expr::BoolLit { value, .. } => {
                self.out.push_str(if *value { "true" } else { "false" })
            }
            Expr::NullLit { .. } => self.out.push_str("null"),
            Expr::Ident { name, .. } => self.out.push_str(name),
            Expr::Negate { operand, .. } => {
                self.out.push('-');
                self.grouped(operand);
            }
            Expr::Binary {
                op, left, right, ..
            } => {
                self.grouped(left);
                self.out.push_str(&format!(" {} ", op.symbol()));
                self.grouped(right);
            }
            Expr::Call { name, args, .. } => {
                self.out.push_str(name);
                self.arguments(args);
            }
            Expr::Member {
                target, name, args, ..
            } => {
                self.grouped(target);
                self.out.push('.');
                self.out.push_str(name);
                if let Some(args) = args {
                    self.arguments(args);
                }
            }
            Expr::Ctor { ctor, args, .. } => {
                self.out.push_str(ctor.name());
                self.arguments(args);
            }
            Expr::ListLit { items, .. } => {
                self.out.push('[');
                for (index, item) in items.iter().enumerate() {
                    if index > 0 {
                        self.out.push_str(", ");
                    }
                    self.expression(item);
                }
                self.out.push(']');
            }
        }
    }

    /// Sub-expressions are parenthesized when they are themselves
    /// operators, which keeps the printed form unambiguous without
    /// tracking precedence levels.
    fn grouped(&mut self, expr: &Expr) {
        let needs_parens = matches!(expr, Expr::Binary { .. } | Expr::Negate { .. });
        if needs_parens {
            self.out.push('(');
            self.expression(expr);
            self.out.push(')');
        } else {
            self.expression(expr);
        }
    }

    fn arguments(&mut self, args: &[Expr]) {
        self.out.push('(');
        for (index, arg) in args.iter().enumerate() {
            if index > 0 {
                self.out.push_str(", ");
            }
            self.expression(arg);
        }
        self.out.push(')');
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::lexer;
    use crate::parser;
    use indoc::indoc;

    fn parse(source: &str) -> Program {
        let (tokens, lex_diagnostics) = lexer::tokenize(source, &Config::default());
        assert!(lex_diagnostics.is_empty(), "lexer: {lex_diagnostics:?}");
        let (program, diagnostics) = parser::parse_tokens(tokens);
        assert!(diagnostics.is_empty(), "parser: {diagnostics:?}");
        program
    }

    // Positions differ between the original and reparsed trees, so
    // structural equality is compared through the canonical printout.
    fn same_shape(left: &Program, right: &Program) -> bool {
        print_program(left) == print_program(right)
    }

    #[test]
    fn prints_declarations_and_control_flow() {
        let program = parse(indoc! {"
            int x = 1;
            while (x < 3) { x = x + 1; }
        "});
        let printed = print_program(&program);
        assert_eq!(
            printed,
            indoc! {"
                int x = 1;
                while (x < 3) {
                    x = x + 1;
                }
            "}
        );
    }

    #[test]
    fn round_trips_a_representative_program() {
        let source = indoc! {r#"
            func int twice(int v) {
                return v * 2;
            }
            List<int> xs = [1, 2, 3];
            int total = 0;
            int i = 0;
            while (i < xs.len()) {
                total = total + twice(xs.get(i));
                i = i + 1;
            }
            if (total > 10 && true) {
                print(itos(total));
            } else {
                print("small");
            }
            File f = File("song.mp3");
            Audio a = ftoa(f);
            float rate = 44.1;
            string label = "a\"b\\c";
        "#};
        let program = parse(source);
        let printed = print_program(&program);
        let reparsed = parse(&printed);
        assert!(
            same_shape(&program, &reparsed),
            "printed form did not round-trip:\n{printed}"
        );
    }
}
