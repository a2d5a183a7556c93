//! Spreadsheet expression tree and its renderer.
//!
//! Formulas are assembled as [`Expr`] values and rendered once, so lexical
//! rules of the target dialect become structural:
//! - a bound variable is always [`Expr::Var`] and always renders with the
//!   `_xlpm.` parameter prefix,
//! - operator precedence is resolved by the renderer, never by hand-written
//!   parentheses,
//! - table columns are tracked as data, so their existence can be checked
//!   against the data contract.

use std::collections::BTreeSet;
use std::fmt;

use crate::conf::C_PARAM_PREFIX;

////////////////////////////////////////////////////////////////////////////////
// #region Operators

/// Binary infix operators of the formula dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnumBinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
    Concat,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl EnumBinaryOp {
    fn symbol(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Pow => "^",
            Self::Concat => "&",
            Self::Eq => "=",
            Self::Ne => "<>",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
        }
    }

    fn precedence(self) -> u8 {
        match self {
            Self::Eq | Self::Ne | Self::Lt | Self::Le | Self::Gt | Self::Ge => 1,
            Self::Concat => 2,
            Self::Add | Self::Sub => 3,
            Self::Mul | Self::Div => 4,
            Self::Pow => 5,
        }
    }

    /// `a op (b op c) == (a op b) op c`
    fn is_associative(self) -> bool {
        matches!(self, Self::Add | Self::Mul | Self::Concat)
    }
}

const N_PREC_UNARY: u8 = 6;
const N_PREC_ATOM: u8 = 7;

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Expr

/// One node of a spreadsheet formula.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Numeric literal.
    Number(f64),
    /// String literal (quotes are escaped on render).
    Text(String),
    /// `TRUE` / `FALSE`.
    Bool(bool),
    /// Defined name such as `SelectedTeam` or `ScnCapTotal0`.
    Name(String),
    /// Literal A1 reference, optionally sheet-qualified (`$E4`, `DATA_x!$B$2:$B$9`).
    Cell(String),
    /// Structured table column reference `table[column]`.
    Column { table: String, column: String },
    /// Variable bound by an enclosing `LET` or `LAMBDA`.
    Var(String),
    /// Function call.
    Call { func: String, args: Vec<Expr> },
    /// Unary negation.
    Neg(Box<Expr>),
    /// Binary infix operation.
    Binary {
        op: EnumBinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    /// `LET(name1, value1, ..., body)`.
    Let {
        bindings: Vec<(String, Expr)>,
        body: Box<Expr>,
    },
    /// `LAMBDA(param1, ..., body)`.
    Lambda { params: Vec<String>, body: Box<Expr> },
}

impl Expr {
    /// Render with the leading `=` expected by cell, name and rule formulas.
    pub fn to_formula(&self) -> String {
        format!("={}", self.render())
    }

    /// Render without the leading `=`.
    pub fn render(&self) -> String {
        let mut out = String::new();
        self.write_into(&mut out);
        out
    }

    fn precedence(&self) -> u8 {
        match self {
            Self::Binary { op, .. } => op.precedence(),
            Self::Neg(_) => N_PREC_UNARY,
            Self::Number(n) if *n < 0.0 => N_PREC_UNARY,
            _ => N_PREC_ATOM,
        }
    }

    fn write_into(&self, out: &mut String) {
        match self {
            Self::Number(n) => out.push_str(&render_number(*n)),
            Self::Text(s) => {
                out.push('"');
                out.push_str(&s.replace('"', "\"\""));
                out.push('"');
            }
            Self::Bool(b) => out.push_str(if *b { "TRUE" } else { "FALSE" }),
            Self::Name(name) | Self::Cell(name) => out.push_str(name),
            Self::Column { table, column } => {
                out.push_str(table);
                out.push('[');
                out.push_str(&escape_column_name(column));
                out.push(']');
            }
            Self::Var(name) => {
                out.push_str(C_PARAM_PREFIX);
                out.push_str(name);
            }
            Self::Call { func, args } => {
                out.push_str(func);
                out.push('(');
                for (n_idx, arg) in args.iter().enumerate() {
                    if n_idx > 0 {
                        out.push(',');
                    }
                    arg.write_into(out);
                }
                out.push(')');
            }
            Self::Neg(operand) => {
                out.push('-');
                write_child(out, operand, operand.precedence() < N_PREC_UNARY);
            }
            Self::Binary { op, lhs, rhs } => {
                let n_prec = op.precedence();
                write_child(out, lhs, lhs.precedence() < n_prec);
                out.push_str(op.symbol());
                let if_paren_rhs = rhs.precedence() < n_prec
                    || rhs.precedence() == N_PREC_UNARY
                    || (rhs.precedence() == n_prec && !op.is_associative());
                write_child(out, rhs, if_paren_rhs);
            }
            Self::Let { bindings, body } => {
                out.push_str("LET(");
                for (name, value) in bindings {
                    out.push_str(C_PARAM_PREFIX);
                    out.push_str(name);
                    out.push(',');
                    value.write_into(out);
                    out.push(',');
                }
                body.write_into(out);
                out.push(')');
            }
            Self::Lambda { params, body } => {
                out.push_str("LAMBDA(");
                for param in params {
                    out.push_str(C_PARAM_PREFIX);
                    out.push_str(param);
                    out.push(',');
                }
                body.write_into(out);
                out.push(')');
            }
        }
    }

    ////////////////////////////////////////////////////////////////////////////
    // Operators

    fn binary(self, op: EnumBinaryOp, rhs: Expr) -> Expr {
        Expr::Binary {
            op,
            lhs: Box::new(self),
            rhs: Box::new(rhs),
        }
    }

    /// `self & rhs`
    pub fn concat(self, rhs: Expr) -> Expr {
        self.binary(EnumBinaryOp::Concat, rhs)
    }

    /// `self ^ rhs`
    pub fn pow(self, rhs: Expr) -> Expr {
        self.binary(EnumBinaryOp::Pow, rhs)
    }

    /// `self = rhs`
    pub fn equals(self, rhs: Expr) -> Expr {
        self.binary(EnumBinaryOp::Eq, rhs)
    }

    /// `self <> rhs`
    pub fn not_equals(self, rhs: Expr) -> Expr {
        self.binary(EnumBinaryOp::Ne, rhs)
    }

    /// `self < rhs`
    pub fn less_than(self, rhs: Expr) -> Expr {
        self.binary(EnumBinaryOp::Lt, rhs)
    }

    /// `self <= rhs`
    pub fn less_eq(self, rhs: Expr) -> Expr {
        self.binary(EnumBinaryOp::Le, rhs)
    }

    /// `self > rhs`
    pub fn greater_than(self, rhs: Expr) -> Expr {
        self.binary(EnumBinaryOp::Gt, rhs)
    }

    /// `self >= rhs`
    pub fn greater_eq(self, rhs: Expr) -> Expr {
        self.binary(EnumBinaryOp::Ge, rhs)
    }

    ////////////////////////////////////////////////////////////////////////////
    // Introspection

    /// Collect every `(table, column)` pair referenced by this expression.
    pub fn collect_columns(&self, out: &mut BTreeSet<(String, String)>) {
        self.walk(&mut |node| {
            if let Expr::Column { table, column } = node {
                out.insert((table.clone(), column.clone()));
            }
        });
    }

    /// Collect every defined name referenced by this expression.
    pub fn collect_names(&self, out: &mut BTreeSet<String>) {
        self.walk(&mut |node| {
            if let Expr::Name(name) = node {
                out.insert(name.clone());
            }
        });
    }

    /// Check that every [`Expr::Var`] is bound by an enclosing `LET`/`LAMBDA`
    /// and that binding names are plain identifiers.
    pub fn validate_scopes(&self) -> Result<(), String> {
        let mut l_scope: Vec<String> = Vec::new();
        self.validate_scopes_inner(&mut l_scope)
    }

    fn validate_scopes_inner(&self, l_scope: &mut Vec<String>) -> Result<(), String> {
        match self {
            Self::Var(name) => {
                if l_scope.iter().any(|bound| bound == name) {
                    Ok(())
                } else {
                    Err(format!("unbound variable `{name}`"))
                }
            }
            Self::Let { bindings, body } => {
                let n_depth = l_scope.len();
                for (name, value) in bindings {
                    validate_binding_name(name)?;
                    value.validate_scopes_inner(l_scope)?;
                    l_scope.push(name.clone());
                }
                let res = body.validate_scopes_inner(l_scope);
                l_scope.truncate(n_depth);
                res
            }
            Self::Lambda { params, body } => {
                let n_depth = l_scope.len();
                for param in params {
                    validate_binding_name(param)?;
                    l_scope.push(param.clone());
                }
                let res = body.validate_scopes_inner(l_scope);
                l_scope.truncate(n_depth);
                res
            }
            Self::Call { args, .. } => args
                .iter()
                .try_for_each(|arg| arg.validate_scopes_inner(l_scope)),
            Self::Neg(operand) => operand.validate_scopes_inner(l_scope),
            Self::Binary { lhs, rhs, .. } => {
                lhs.validate_scopes_inner(l_scope)?;
                rhs.validate_scopes_inner(l_scope)
            }
            _ => Ok(()),
        }
    }

    fn walk(&self, visit: &mut dyn FnMut(&Expr)) {
        visit(self);
        match self {
            Self::Call { args, .. } => args.iter().for_each(|arg| arg.walk(visit)),
            Self::Neg(operand) => operand.walk(visit),
            Self::Binary { lhs, rhs, .. } => {
                lhs.walk(visit);
                rhs.walk(visit);
            }
            Self::Let { bindings, body } => {
                bindings.iter().for_each(|(_, value)| value.walk(visit));
                body.walk(visit);
            }
            Self::Lambda { body, .. } => body.walk(visit),
            _ => {}
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_formula())
    }
}

impl std::ops::Add for Expr {
    type Output = Expr;
    fn add(self, rhs: Expr) -> Expr {
        self.binary(EnumBinaryOp::Add, rhs)
    }
}

impl std::ops::Sub for Expr {
    type Output = Expr;
    fn sub(self, rhs: Expr) -> Expr {
        self.binary(EnumBinaryOp::Sub, rhs)
    }
}

impl std::ops::Mul for Expr {
    type Output = Expr;
    fn mul(self, rhs: Expr) -> Expr {
        self.binary(EnumBinaryOp::Mul, rhs)
    }
}

impl std::ops::Div for Expr {
    type Output = Expr;
    fn div(self, rhs: Expr) -> Expr {
        self.binary(EnumBinaryOp::Div, rhs)
    }
}

impl std::ops::Neg for Expr {
    type Output = Expr;
    fn neg(self) -> Expr {
        Expr::Neg(Box::new(self))
    }
}

fn write_child(out: &mut String, child: &Expr, if_paren: bool) {
    if if_paren {
        out.push('(');
        child.write_into(out);
        out.push(')');
    } else {
        child.write_into(out);
    }
}

fn render_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

fn escape_column_name(column: &str) -> String {
    let mut out = String::with_capacity(column.len());
    for chr in column.chars() {
        if matches!(chr, '[' | ']' | '#' | '\'') {
            out.push('\'');
        }
        out.push(chr);
    }
    out
}

fn validate_binding_name(name: &str) -> Result<(), String> {
    let mut iter_chars = name.chars();
    let if_valid = iter_chars
        .next()
        .is_some_and(|chr| chr.is_ascii_alphabetic() || chr == '_')
        && iter_chars.all(|chr| chr.is_ascii_alphanumeric() || chr == '_');
    if if_valid {
        Ok(())
    } else {
        Err(format!("invalid binding name `{name}`"))
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Constructors

/// Numeric literal.
pub fn num(n: f64) -> Expr {
    Expr::Number(n)
}

/// Integer literal.
pub fn int(n: i64) -> Expr {
    Expr::Number(n as f64)
}

/// String literal.
pub fn text(s: impl Into<String>) -> Expr {
    Expr::Text(s.into())
}

/// Boolean literal.
pub fn boolean(b: bool) -> Expr {
    Expr::Bool(b)
}

/// Defined-name reference.
pub fn name(s: impl Into<String>) -> Expr {
    Expr::Name(s.into())
}

/// Literal A1 reference.
pub fn cell(s: impl Into<String>) -> Expr {
    Expr::Cell(s.into())
}

/// Structured column reference.
pub fn col(table: &str, column: &str) -> Expr {
    Expr::Column {
        table: table.to_string(),
        column: column.to_string(),
    }
}

/// Bound variable reference.
pub fn var(s: &str) -> Expr {
    Expr::Var(s.to_string())
}

/// Generic function call.
pub fn call(func: &str, args: Vec<Expr>) -> Expr {
    Expr::Call {
        func: func.to_string(),
        args,
    }
}

/// `LET` with ordered bindings.
pub fn let_in(bindings: Vec<(&str, Expr)>, body: Expr) -> Expr {
    Expr::Let {
        bindings: bindings
            .into_iter()
            .map(|(name, value)| (name.to_string(), value))
            .collect(),
        body: Box::new(body),
    }
}

/// `LAMBDA` with ordered parameters.
pub fn lambda(params: &[&str], body: Expr) -> Expr {
    Expr::Lambda {
        params: params.iter().map(|param| param.to_string()).collect(),
        body: Box::new(body),
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_respects_precedence_without_redundant_parens() {
        let e = (int(1) + int(2)) * int(3);
        assert_eq!(e.render(), "(1+2)*3");

        let e = int(1) + int(2) * int(3);
        assert_eq!(e.render(), "1+2*3");

        let e = int(10) - (int(4) - int(3));
        assert_eq!(e.render(), "10-(4-3)");

        let e = int(10) - int(4) - int(3);
        assert_eq!(e.render(), "10-4-3");

        let e = (name("A") + int(1)).greater_eq(name("B"));
        assert_eq!(e.render(), "A+1>=B");

        let e = -(name("A") + int(1));
        assert_eq!(e.render(), "-(A+1)");
    }

    #[test]
    fn test_render_literals() {
        assert_eq!(num(250_000.0).render(), "250000");
        assert_eq!(num(1.25).render(), "1.25");
        assert_eq!(text("say \"hi\"").render(), "\"say \"\"hi\"\"\"");
        assert_eq!(boolean(true).render(), "TRUE");
        assert_eq!(
            col("tbl_salary_book_yearly", "cap_amount").render(),
            "tbl_salary_book_yearly[cap_amount]"
        );
        assert_eq!(int(-3).render(), "-3");
        assert_eq!((int(1) - int(-3)).render(), "1-(-3)");
    }

    #[test]
    fn test_let_and_lambda_bindings_carry_param_prefix() {
        let e = let_in(
            vec![("x", int(1)), ("y", var("x") + int(1))],
            call(
                "MAP",
                vec![
                    var("y"),
                    lambda(&["n"], var("n") * int(2)),
                ],
            ),
        );
        assert_eq!(
            e.to_formula(),
            "=LET(_xlpm.x,1,_xlpm.y,_xlpm.x+1,MAP(_xlpm.y,LAMBDA(_xlpm.n,_xlpm.n*2)))"
        );
        assert!(e.validate_scopes().is_ok());
    }

    #[test]
    fn test_validate_scopes_rejects_unbound_and_bad_names() {
        let e = let_in(vec![("x", int(1))], var("z"));
        assert_eq!(e.validate_scopes(), Err("unbound variable `z`".to_string()));

        let e = lambda(&["1bad"], int(0));
        assert!(e.validate_scopes().is_err());

        // A LET binding is not visible to its own value expression.
        let e = let_in(vec![("x", var("x"))], int(0));
        assert!(e.validate_scopes().is_err());
    }

    #[test]
    fn test_collect_columns_and_names() {
        let e = call(
            "SUMIFS",
            vec![
                col("tbl_a", "x"),
                col("tbl_a", "team_code"),
                name("SelectedTeam"),
            ],
        );
        let mut set_cols = BTreeSet::new();
        e.collect_columns(&mut set_cols);
        assert!(set_cols.contains(&("tbl_a".to_string(), "x".to_string())));
        assert_eq!(set_cols.len(), 2);

        let mut set_names = BTreeSet::new();
        e.collect_names(&mut set_names);
        assert_eq!(set_names.into_iter().collect::<Vec<_>>(), vec!["SelectedTeam"]);
    }
}
