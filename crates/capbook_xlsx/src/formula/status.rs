//! Conditional-format rules for roster badges.
//!
//! Rule formulas are evaluated by the spreadsheet relative to the top-left
//! cell of the range they are applied to, and may not use structured
//! references, so table columns are addressed through absolute ranges taken
//! from the written table layouts. Rules are ordered; the sheet applies them
//! with stop-if-true so the first match wins.

use crate::conf::{C_OPTION_EARLY_TERMINATION, C_OPTION_PLAYER, C_OPTION_TEAM, EnumStyleKey};
use crate::error::CapbookError;
use crate::names::{SELECTED_TEAM, TRADE_IN_NAMES};
use crate::writer::SpecTableLayout;

use super::builders::{ROSTER_STATUS_PRECEDENCE, year_at};
use super::expr::{Expr, boolean, cell, int, name, text};
use super::func as fx;

/// One ordered formatting rule.
#[derive(Debug, Clone, PartialEq)]
pub struct SpecStatusRule {
    pub label: &'static str,
    pub formula: Expr,
    pub style: EnumStyleKey,
}

impl SpecStatusRule {
    fn new(label: &'static str, formula: Expr, style: EnumStyleKey) -> Self {
        Self {
            label,
            formula,
            style,
        }
    }
}

/// Table layouts the salary badges read from.
#[derive(Debug, Clone, Copy)]
pub struct SpecStatusSources<'a> {
    pub yearly: &'a SpecTableLayout,
    pub book: &'a SpecTableLayout,
}

fn range(layout: &SpecTableLayout, column: &str) -> Result<Expr, CapbookError> {
    layout
        .column_range(column)
        .map(cell)
        .ok_or_else(|| CapbookError::InvalidReference {
            name: format!("{}[{column}]", layout.table_name),
            message: "column missing from written table".to_string(),
        })
}

/// Salary-cell badges for year offset `off`.
///
/// `name_cell` and `salary_cell` are the relative references of the first
/// row of the range (`$E4`, `F4`).
pub fn derive_salary_status_rules(
    sources: SpecStatusSources<'_>,
    name_cell: &str,
    salary_cell: &str,
    off: usize,
) -> Result<Vec<SpecStatusRule>, CapbookError> {
    let p = || cell(name_cell);
    let s = || cell(salary_cell);
    let y_name = range(sources.yearly, "player_name")?;
    let y_team = range(sources.yearly, "team_code")?;
    let y_year = range(sources.yearly, "salary_year")?;
    let y_two_way = range(sources.yearly, "is_two_way")?;
    let b_name = range(sources.book, "player_name")?;

    let is_zero = fx::and(vec![fx::isnumber(s()), s().equals(int(0))]);
    let is_paid = || fx::and(vec![fx::isnumber(s()), s().greater_than(int(0))]);
    let is_two_way = fx::countifs(vec![
        (y_name.clone(), p()),
        (y_team, name(SELECTED_TEAM)),
        (y_year, year_at(off)),
        (y_two_way, boolean(true)),
    ])
    .greater_than(int(0));
    let book_has = |criteria: Vec<(Expr, Expr)>| {
        let mut l_criteria = vec![(b_name.clone(), p())];
        l_criteria.extend(criteria);
        fx::countifs(l_criteria).greater_than(int(0))
    };
    let flag = |column: &str| -> Result<Expr, CapbookError> {
        Ok(book_has(vec![(range(sources.book, column)?, boolean(true))]))
    };
    let option_is = |code: &str| -> Result<Expr, CapbookError> {
        Ok(book_has(vec![(
            range(sources.book, &format!("option_y{off}"))?,
            text(code),
        )]))
    };
    let is_restricted = fx::or(vec![
        flag("is_trade_consent_required_now")?,
        flag("is_trade_restricted_now")?,
    ]);

    let mut l_rules = Vec::new();
    if off == 0 {
        l_rules.push(SpecStatusRule::new(
            "two-way restricted",
            fx::and(vec![is_zero.clone(), is_two_way.clone(), is_restricted.clone()]),
            EnumStyleKey::TwoWayPillRestricted,
        ));
    }
    l_rules.push(SpecStatusRule::new(
        "two-way trade-in",
        fx::and(vec![
            is_zero.clone(),
            fx::countif(name(TRADE_IN_NAMES), p()).greater_than(int(0)),
            is_two_way.clone(),
        ]),
        EnumStyleKey::TwoWayPillIn,
    ));
    l_rules.push(SpecStatusRule::new(
        "two-way",
        fx::and(vec![is_zero, is_two_way]),
        EnumStyleKey::TwoWayPill,
    ));
    if off == 0 {
        l_rules.push(SpecStatusRule::new(
            "restricted now",
            fx::and(vec![fx::isnumber(s()), is_restricted]),
            EnumStyleKey::TradeRestricted,
        ));
    } else {
        for (label, code, style) in [
            ("team option", C_OPTION_TEAM, EnumStyleKey::OptionTeam),
            ("player option", C_OPTION_PLAYER, EnumStyleKey::OptionPlayer),
            (
                "early termination option",
                C_OPTION_EARLY_TERMINATION,
                EnumStyleKey::OptionEarlyTermination,
            ),
        ] {
            l_rules.push(SpecStatusRule::new(
                label,
                fx::and(vec![fx::isnumber(s()), option_is(code)?]),
                style,
            ));
        }
    }
    l_rules.push(SpecStatusRule::new(
        "trade bonus",
        fx::and(vec![is_paid(), flag("is_trade_bonus")?]),
        EnumStyleKey::TradeBonus,
    ));
    l_rules.push(SpecStatusRule::new(
        "no-trade clause",
        fx::and(vec![is_paid(), flag("is_no_trade")?]),
        EnumStyleKey::TradeRestricted,
    ));

    let full = range(sources.book, &format!("is_fully_guaranteed_y{off}"))?;
    let partial = range(sources.book, &format!("is_partially_guaranteed_y{off}"))?;
    l_rules.push(SpecStatusRule::new(
        "non-guaranteed",
        fx::and(vec![
            is_paid(),
            book_has(vec![
                (full.clone(), boolean(false)),
                (partial.clone(), boolean(false)),
            ]),
        ]),
        EnumStyleKey::GuaranteeNone,
    ));
    l_rules.push(SpecStatusRule::new(
        "partially guaranteed",
        fx::and(vec![is_paid(), book_has(vec![(partial, boolean(true))])]),
        EnumStyleKey::GuaranteePartial,
    ));
    l_rules.push(SpecStatusRule::new(
        "fully guaranteed",
        fx::and(vec![is_paid(), book_has(vec![(full, boolean(true))])]),
        EnumStyleKey::GuaranteeFull,
    ));
    Ok(l_rules)
}

/// Name-cell badges keyed on the status spill (`$T4`).
pub fn derive_name_status_rules(status_cell: &str) -> Vec<SpecStatusRule> {
    ROSTER_STATUS_PRECEDENCE
        .iter()
        .map(|item| {
            let style = match item.label {
                "OUT" => EnumStyleKey::StatusOut,
                "SIGN" => EnumStyleKey::StatusSign,
                "IN" => EnumStyleKey::StatusIn,
                _ => EnumStyleKey::StatusWaived,
            };
            SpecStatusRule::new(
                item.label,
                cell(status_cell).equals(text(item.label)),
                style,
            )
        })
        .collect()
}

/// Green when non-negative, red when negative; blanks stay unstyled.
pub fn derive_room_rules(value_cell: &str) -> Vec<SpecStatusRule> {
    vec![
        SpecStatusRule::new(
            "room negative",
            fx::and(vec![
                fx::isnumber(cell(value_cell)),
                cell(value_cell).less_than(int(0)),
            ]),
            EnumStyleKey::RoomNegative,
        ),
        SpecStatusRule::new(
            "room positive",
            fx::isnumber(cell(value_cell)),
            EnumStyleKey::RoomPositive,
        ),
    ]
}

/// Verdict coloring for `yes` / `no` labels.
pub fn derive_verdict_rules(value_cell: &str, yes: &str, no: &str) -> Vec<SpecStatusRule> {
    vec![
        SpecStatusRule::new(
            "verdict yes",
            cell(value_cell).equals(text(yes)),
            EnumStyleKey::VerdictYes,
        ),
        SpecStatusRule::new(
            "verdict no",
            cell(value_cell).equals(text(no)),
            EnumStyleKey::VerdictNo,
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conf::{TBL_SALARY_BOOK_WAREHOUSE, TBL_SALARY_BOOK_YEARLY};
    use crate::contract::find_table_contract;

    fn derive_layout(table_name: &str, n_rows: usize) -> SpecTableLayout {
        let contract = find_table_contract(table_name).expect("contract");
        SpecTableLayout {
            table_name: table_name.to_string(),
            sheet_name: contract.sheet_name(),
            columns: contract.column_names(),
            n_rows_real: n_rows,
            n_rows_written: n_rows,
        }
    }

    #[test]
    fn test_base_year_rule_order() {
        let yearly = derive_layout(TBL_SALARY_BOOK_YEARLY, 20);
        let book = derive_layout(TBL_SALARY_BOOK_WAREHOUSE, 8);
        let sources = SpecStatusSources {
            yearly: &yearly,
            book: &book,
        };
        let l_rules = derive_salary_status_rules(sources, "$E4", "F4", 0).expect("rules");
        let l_labels: Vec<&str> = l_rules.iter().map(|rule| rule.label).collect();
        assert_eq!(
            l_labels,
            vec![
                "two-way restricted",
                "two-way trade-in",
                "two-way",
                "restricted now",
                "trade bonus",
                "no-trade clause",
                "non-guaranteed",
                "partially guaranteed",
                "fully guaranteed",
            ]
        );
        for rule in &l_rules {
            let c_formula = rule.formula.to_formula();
            assert!(!c_formula.contains('['), "{c_formula}");
            assert!(!c_formula.contains("_xlpm."), "{c_formula}");
        }
    }

    #[test]
    fn test_future_year_options_precede_no_trade() {
        let yearly = derive_layout(TBL_SALARY_BOOK_YEARLY, 20);
        let book = derive_layout(TBL_SALARY_BOOK_WAREHOUSE, 8);
        let sources = SpecStatusSources {
            yearly: &yearly,
            book: &book,
        };
        let l_rules = derive_salary_status_rules(sources, "$E4", "H4", 2).expect("rules");
        let n_team_option = l_rules
            .iter()
            .position(|rule| rule.label == "team option")
            .expect("team option");
        let n_no_trade = l_rules
            .iter()
            .position(|rule| rule.label == "no-trade clause")
            .expect("no trade");
        assert!(n_team_option < n_no_trade);
        assert!(l_rules.iter().all(|rule| rule.label != "restricted now"));
        assert!(
            l_rules[n_team_option]
                .formula
                .render()
                .contains("\"TEAM\"")
        );
    }

    #[test]
    fn test_two_way_rules_require_zero_salary() {
        let yearly = derive_layout(TBL_SALARY_BOOK_YEARLY, 3);
        let book = derive_layout(TBL_SALARY_BOOK_WAREHOUSE, 3);
        let sources = SpecStatusSources {
            yearly: &yearly,
            book: &book,
        };
        let l_rules = derive_salary_status_rules(sources, "$E4", "F4", 0).expect("rules");
        let c_formula = l_rules[2].formula.render();
        assert!(c_formula.starts_with("AND(AND(ISNUMBER(F4),F4=0),COUNTIFS("));
        assert!(c_formula.contains("DATA_salary_book_yearly!$L$2:$L$4,TRUE"));
    }

    #[test]
    fn test_two_way_rules_are_scoped_to_selected_team() {
        let yearly = derive_layout(TBL_SALARY_BOOK_YEARLY, 3);
        let book = derive_layout(TBL_SALARY_BOOK_WAREHOUSE, 3);
        let sources = SpecStatusSources {
            yearly: &yearly,
            book: &book,
        };
        let l_rules = derive_salary_status_rules(sources, "$E4", "F4", 0).expect("rules");
        for n_idx in 0..3 {
            let c_formula = l_rules[n_idx].formula.render();
            assert!(
                c_formula.contains("DATA_salary_book_yearly!$C$2:$C$4,SelectedTeam"),
                "{c_formula}"
            );
        }
        assert_eq!(
            l_rules[2].formula.render(),
            "AND(AND(ISNUMBER(F4),F4=0),COUNTIFS(\
             DATA_salary_book_yearly!$B$2:$B$4,$E4,\
             DATA_salary_book_yearly!$C$2:$C$4,SelectedTeam,\
             DATA_salary_book_yearly!$D$2:$D$4,MetaBaseYear,\
             DATA_salary_book_yearly!$L$2:$L$4,TRUE)>0)"
        );
    }

    #[test]
    fn test_missing_column_is_reported() {
        let mut yearly = derive_layout(TBL_SALARY_BOOK_YEARLY, 3);
        yearly.columns.retain(|c| c != "is_two_way");
        let book = derive_layout(TBL_SALARY_BOOK_WAREHOUSE, 3);
        let sources = SpecStatusSources {
            yearly: &yearly,
            book: &book,
        };
        let err = derive_salary_status_rules(sources, "$E4", "F4", 0).expect_err("missing");
        assert!(matches!(err, CapbookError::InvalidReference { .. }));
    }

    #[test]
    fn test_name_rules_follow_status_precedence() {
        let l_rules = derive_name_status_rules("$T4");
        assert_eq!(l_rules[0].formula.render(), "$T4=\"OUT\"");
        assert_eq!(l_rules[0].style, EnumStyleKey::StatusOut);
        assert_eq!(l_rules[1].style, EnumStyleKey::StatusWaived);
        assert_eq!(l_rules.len(), ROSTER_STATUS_PRECEDENCE.len());
    }
}
