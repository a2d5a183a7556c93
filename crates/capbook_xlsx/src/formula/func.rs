//! Thin constructors for the spreadsheet functions the builders use.
//!
//! Names are emitted bare; the writer adds the future-function prefix when
//! the worksheet enables it.

use super::expr::{Expr, call, text};

pub fn sum(x: Expr) -> Expr {
    call("SUM", vec![x])
}

pub fn max(args: Vec<Expr>) -> Expr {
    call("MAX", args)
}

pub fn min(args: Vec<Expr>) -> Expr {
    call("MIN", args)
}

pub fn abs(x: Expr) -> Expr {
    call("ABS", vec![x])
}

pub fn iff(cond: Expr, if_true: Expr, if_false: Expr) -> Expr {
    call("IF", vec![cond, if_true, if_false])
}

pub fn and(args: Vec<Expr>) -> Expr {
    call("AND", args)
}

pub fn or(args: Vec<Expr>) -> Expr {
    call("OR", args)
}

pub fn iferror(x: Expr, alt: Expr) -> Expr {
    call("IFERROR", vec![x, alt])
}

pub fn isnumber(x: Expr) -> Expr {
    call("ISNUMBER", vec![x])
}

/// `--(x)`: coerce booleans to 0/1.
pub fn to_number(x: Expr) -> Expr {
    -(-x)
}

pub fn text_fmt(value: Expr, fmt: &str) -> Expr {
    call("TEXT", vec![value, text(fmt)])
}

pub fn modulo(x: Expr, divisor: Expr) -> Expr {
    call("MOD", vec![x, divisor])
}

pub fn filter(array: Expr, include: Expr, if_empty: Expr) -> Expr {
    call("FILTER", vec![array, include, if_empty])
}

pub fn unique(array: Expr) -> Expr {
    call("UNIQUE", vec![array])
}

pub fn sortby(array: Expr, by: Expr, order: i64) -> Expr {
    call("SORTBY", vec![array, by, super::expr::int(order)])
}

pub fn take(array: Expr, rows: usize) -> Expr {
    call("TAKE", vec![array, super::expr::int(rows as i64)])
}

pub fn vstack(args: Vec<Expr>) -> Expr {
    call("VSTACK", args)
}

pub fn hstack(args: Vec<Expr>) -> Expr {
    call("HSTACK", args)
}

pub fn map(arrays: Vec<Expr>, lambda: Expr) -> Expr {
    let mut args = arrays;
    args.push(lambda);
    call("MAP", args)
}

pub fn scan(initial: Expr, array: Expr, lambda: Expr) -> Expr {
    call("SCAN", vec![initial, array, lambda])
}

pub fn byrow(array: Expr, lambda: Expr) -> Expr {
    call("BYROW", vec![array, lambda])
}

pub fn anchorarray(anchor: Expr) -> Expr {
    call("ANCHORARRAY", vec![anchor])
}

pub fn xlookup(key: Expr, lookup: Expr, result: Expr, if_missing: Expr) -> Expr {
    call("XLOOKUP", vec![key, lookup, result, if_missing])
}

pub fn sumifs(sum_range: Expr, criteria: Vec<(Expr, Expr)>) -> Expr {
    let mut args = vec![sum_range];
    for (range, criterion) in criteria {
        args.push(range);
        args.push(criterion);
    }
    call("SUMIFS", args)
}

pub fn maxifs(max_range: Expr, criteria: Vec<(Expr, Expr)>) -> Expr {
    let mut args = vec![max_range];
    for (range, criterion) in criteria {
        args.push(range);
        args.push(criterion);
    }
    call("MAXIFS", args)
}

pub fn countifs(criteria: Vec<(Expr, Expr)>) -> Expr {
    let mut args = Vec::with_capacity(criteria.len() * 2);
    for (range, criterion) in criteria {
        args.push(range);
        args.push(criterion);
    }
    call("COUNTIFS", args)
}

pub fn countif(range: Expr, criterion: Expr) -> Expr {
    call("COUNTIF", vec![range, criterion])
}

/// `SWITCH(value, k1, v1, ..., default)`.
pub fn switch(value: Expr, cases: Vec<(Expr, Expr)>, default: Expr) -> Expr {
    let mut args = vec![value];
    for (key, result) in cases {
        args.push(key);
        args.push(result);
    }
    args.push(default);
    call("SWITCH", args)
}

#[cfg(test)]
mod tests {
    use super::super::expr::{cell, int, name};
    use super::*;

    #[test]
    fn test_to_number_renders_double_negation() {
        let e = to_number(name("A").not_equals(text("")));
        assert_eq!(e.render(), "--(A<>\"\")");
    }

    #[test]
    fn test_variadic_criteria_flatten() {
        let e = sumifs(
            cell("$A$1:$A$9"),
            vec![(cell("$B$1:$B$9"), text("POR")), (cell("$C$1:$C$9"), int(2025))],
        );
        assert_eq!(e.render(), "SUMIFS($A$1:$A$9,$B$1:$B$9,\"POR\",$C$1:$C$9,2025)");

        let e = switch(name("M"), vec![(text("a"), int(1))], int(0));
        assert_eq!(e.render(), "SWITCH(M,\"a\",1,0)");
    }
}
