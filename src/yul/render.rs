//! Text rendering of routines.

use std::fmt::{self, Display, Formatter, Write};

use num_bigint::BigUint;

use super::{Expr, Routine, Stmt};

const INDENT: &str = "    ";

fn number(f: &mut Formatter<'_>, value: &BigUint) -> fmt::Result {
    if value.bits() <= 10 {
        write!(f, "{}", value)
    } else {
        write!(f, "0x{:x}", value)
    }
}

impl Display for Expr {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Number(value) => number(f, value),
            Expr::Ident(name) => f.write_str(name),
            Expr::Call(name, args) => {
                write!(f, "{}(", name)?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                f.write_char(')')
            }
        }
    }
}

struct Printer<'a, 'b> {
    out: &'a mut Formatter<'b>,
    depth: usize,
}

impl Printer<'_, '_> {
    fn line(&mut self, text: fmt::Arguments<'_>) -> fmt::Result {
        for _ in 0..self.depth {
            self.out.write_str(INDENT)?;
        }
        self.out.write_fmt(text)?;
        self.out.write_char('\n')
    }

    /// Writes `{`, the statements and `}`; `head` precedes the brace.
    fn block(&mut self, head: fmt::Arguments<'_>, body: &[Stmt]) -> fmt::Result {
        if body.is_empty() {
            return self.line(format_args!("{}{{ }}", head));
        }
        self.line(format_args!("{}{{", head))?;
        self.depth += 1;
        for stmt in body {
            self.stmt(stmt)?;
        }
        self.depth -= 1;
        self.line(format_args!("}}"))
    }

    fn inline(&self, body: &[Stmt]) -> Option<String> {
        match body {
            [] => Some("{ }".to_string()),
            [single @ (Stmt::Let(..) | Stmt::Assign(..) | Stmt::Expr(_))] => {
                Some(format!("{{ {} }}", simple(single)?))
            }
            _ => None,
        }
    }

    fn stmt(&mut self, stmt: &Stmt) -> fmt::Result {
        match stmt {
            Stmt::Let(..) | Stmt::Assign(..) | Stmt::Expr(_) => {
                let text = simple(stmt).unwrap_or_default();
                self.line(format_args!("{}", text))
            }
            Stmt::Comment(text) => self.line(format_args!("// {}", text)),
            Stmt::If(cond, body) => match self.inline(body) {
                Some(inline) => self.line(format_args!("if {} {}", cond, inline)),
                None => self.block(format_args!("if {} ", cond), body),
            },
            Stmt::Switch {
                scrutinee,
                cases,
                default,
            } => {
                self.line(format_args!("switch {}", scrutinee))?;
                for (value, body) in cases {
                    let mut label = String::new();
                    write!(label, "{}", Expr::Number(value.clone()))?;
                    self.block(format_args!("case {} ", label), body)?;
                }
                if let Some(body) = default {
                    self.block(format_args!("default "), body)?;
                }
                Ok(())
            }
            Stmt::For {
                init,
                cond,
                post,
                body,
            } => {
                let init = self.inline(init).unwrap_or_else(|| "{ }".into());
                let post = self.inline(post).unwrap_or_else(|| "{ }".into());
                self.block(format_args!("for {} {} {} ", init, cond, post), body)
            }
            Stmt::Block(body) => self.block(format_args!(""), body),
        }
    }
}

fn simple(stmt: &Stmt) -> Option<String> {
    match stmt {
        Stmt::Let(names, None) => Some(format!("let {}", names.join(", "))),
        Stmt::Let(names, Some(value)) => Some(format!("let {} := {}", names.join(", "), value)),
        Stmt::Assign(names, value) => Some(format!("{} := {}", names.join(", "), value)),
        Stmt::Expr(e) => Some(e.to_string()),
        _ => None,
    }
}

impl Display for Stmt {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Printer { out: f, depth: 0 }.stmt(self)
    }
}

impl Display for Routine {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let mut printer = Printer { out: f, depth: 0 };
        if let Some(comment) = &self.comment {
            printer.line(format_args!("// {}", comment))?;
        }
        let mut head = format!("function {}({})", self.name, self.params.join(", "));
        if !self.returns.is_empty() {
            write!(head, " -> {}", self.returns.join(", "))?;
        }
        head.push(' ');
        printer.block(format_args!("{}", head), &self.body)
    }
}

#[cfg(test)]
mod tests {
    use super::super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn renders_routine_text() {
        let routine = Routine::new(
            "round_up_to_mul_of_32",
            &["value"],
            &["result"],
            vec![assign(
                "result",
                call(
                    "and",
                    vec![call("add", vec![id("value"), num(31)]), call("not", vec![num(31)])],
                ),
            )],
        );
        assert_eq!(
            routine.to_string(),
            "function round_up_to_mul_of_32(value) -> result {\n    result := and(add(value, 31), not(31))\n}\n"
        );
    }

    #[test]
    fn renders_control_flow() {
        let routine = Routine::new(
            "f",
            &["x"],
            &[],
            vec![
                revert_if(call("gt", vec![id("x"), num(0xffff_ffff_ffff_ffff)])),
                counted_loop(
                    "i",
                    id("x"),
                    num(0x20),
                    vec![expr(call("mstore", vec![id("i"), num(0)]))],
                ),
            ],
        );
        let text = routine.to_string();
        assert!(text.contains("if gt(x, 0xffffffffffffffff) { revert(0, 0) }"));
        assert!(text.contains("for { let i := 0 } lt(i, x) { i := add(i, 32) } {"));
        assert!(text.contains("        mstore(i, 0)\n"));
    }
}
