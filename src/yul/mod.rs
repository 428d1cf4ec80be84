//! Typed AST of generated routines and its textual rendering.
//!
//! Routines are pure functions over 256-bit words. They call builtins
//! (see [`Builtin`]) and each other by name. The text form produced by
//! `Display` is what a code generator splices into the emitted program.

mod builtin;
mod render;

pub use builtin::Builtin;

use num_bigint::BigUint;

/// Expression: a literal, a variable or a call.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Expr {
    Number(BigUint),
    Ident(String),
    Call(String, Vec<Expr>),
}

/// Statement of a routine body.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Stmt {
    Let(Vec<String>, Option<Expr>),
    Assign(Vec<String>, Expr),
    Expr(Expr),
    If(Expr, Vec<Stmt>),
    Switch {
        scrutinee: Expr,
        cases: Vec<(BigUint, Vec<Stmt>)>,
        default: Option<Vec<Stmt>>,
    },
    For {
        init: Vec<Stmt>,
        cond: Expr,
        post: Vec<Stmt>,
        body: Vec<Stmt>,
    },
    Block(Vec<Stmt>),
    Comment(String),
}

/// A named routine.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Routine {
    pub name: String,
    pub params: Vec<String>,
    pub returns: Vec<String>,
    pub body: Vec<Stmt>,
    /// Rendered above the routine, e.g. the source and target type names.
    pub comment: Option<String>,
}

impl Routine {
    pub fn new(
        name: impl Into<String>,
        params: &[&str],
        returns: &[&str],
        body: Vec<Stmt>,
    ) -> Self {
        Self {
            name: name.into(),
            params: params.iter().map(|p| p.to_string()).collect(),
            returns: returns.iter().map(|r| r.to_string()).collect(),
            body,
            comment: None,
        }
    }

    pub fn with_params(mut self, params: Vec<String>) -> Self {
        self.params = params;
        self
    }

    pub fn with_returns(mut self, returns: Vec<String>) -> Self {
        self.returns = returns;
        self
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    /// Names of all routines (not builtins) this routine calls.
    pub fn callees(&self) -> Vec<&str> {
        let mut out = Vec::new();
        for stmt in &self.body {
            stmt.collect_callees(&mut out);
        }
        out.sort_unstable();
        out.dedup();
        out
    }
}

impl Expr {
    fn collect_callees<'a>(&'a self, out: &mut Vec<&'a str>) {
        if let Expr::Call(name, args) = self {
            if Builtin::from_name(name).is_none() {
                out.push(name);
            }
            for arg in args {
                arg.collect_callees(out);
            }
        }
    }
}

impl Stmt {
    fn collect_callees<'a>(&'a self, out: &mut Vec<&'a str>) {
        let block = |stmts: &'a [Stmt], out: &mut Vec<&'a str>| {
            for s in stmts {
                s.collect_callees(out);
            }
        };
        match self {
            Stmt::Let(_, Some(e)) | Stmt::Assign(_, e) | Stmt::Expr(e) => e.collect_callees(out),
            Stmt::Let(_, None) | Stmt::Comment(_) => {}
            Stmt::If(cond, body) => {
                cond.collect_callees(out);
                block(body, out);
            }
            Stmt::Switch {
                scrutinee,
                cases,
                default,
            } => {
                scrutinee.collect_callees(out);
                for (_, body) in cases {
                    block(body, out);
                }
                if let Some(body) = default {
                    block(body, out);
                }
            }
            Stmt::For {
                init,
                cond,
                post,
                body,
            } => {
                block(init, out);
                cond.collect_callees(out);
                block(post, out);
                block(body, out);
            }
            Stmt::Block(body) => block(body, out),
        }
    }
}

pub fn num(value: u64) -> Expr {
    Expr::Number(BigUint::from(value))
}

pub fn big(value: BigUint) -> Expr {
    Expr::Number(value)
}

pub fn id(name: impl Into<String>) -> Expr {
    Expr::Ident(name.into())
}

pub fn call(name: impl Into<String>, args: Vec<Expr>) -> Expr {
    Expr::Call(name.into(), args)
}

/// `all ones` masked to the low `bits` bits.
pub fn low_mask(bits: u32) -> Expr {
    Expr::Number((BigUint::from(1u8) << bits) - 1u8)
}

pub fn let_(name: &str, value: Expr) -> Stmt {
    Stmt::Let(vec![name.to_string()], Some(value))
}

pub fn assign(name: &str, value: Expr) -> Stmt {
    Stmt::Assign(vec![name.to_string()], value)
}

pub fn expr(e: Expr) -> Stmt {
    Stmt::Expr(e)
}

pub fn if_(cond: Expr, body: Vec<Stmt>) -> Stmt {
    Stmt::If(cond, body)
}

pub fn comment(text: impl Into<String>) -> Stmt {
    Stmt::Comment(text.into())
}

/// `if <cond> { revert(0, 0) }`
pub fn revert_if(cond: Expr) -> Stmt {
    Stmt::If(cond, vec![expr(call("revert", vec![num(0), num(0)]))])
}

/// `for { let i := 0 } lt(i, <bound>) { i := add(i, <step>) } { body }`
pub fn counted_loop(counter: &str, bound: Expr, step: Expr, body: Vec<Stmt>) -> Stmt {
    Stmt::For {
        init: vec![let_(counter, num(0))],
        cond: call("lt", vec![id(counter), bound]),
        post: vec![assign(counter, call("add", vec![id(counter), step]))],
        body,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn callees_skip_builtins() {
        let routine = Routine::new(
            "f",
            &["x"],
            &["y"],
            vec![
                assign("y", call("cleanup_t_uint8", vec![call("add", vec![id("x"), num(1)])])),
                if_(call("g", vec![]), vec![expr(call("revert", vec![num(0), num(0)]))]),
            ],
        );
        assert_eq!(routine.callees(), vec!["cleanup_t_uint8", "g"]);
    }
}
