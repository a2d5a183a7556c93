//! Scenario formula builders.
//!
//! Every builder is a pure function of its arguments and returns an [`Expr`];
//! references are limited to table columns, defined names and the anchors
//! passed in.

use crate::conf::{
    C_EXCEPTION_STATUS_APPROVED, N_FILL_TARGET_HIGH, N_FILL_TARGET_LOW, N_TRADE_PAD_AMOUNT,
    TBL_CAP_HOLDS_WAREHOUSE, TBL_DEAD_MONEY_WAREHOUSE, TBL_EXCEPTIONS_WAREHOUSE, TBL_MINIMUM_SCALE, TBL_SALARY_BOOK_WAREHOUSE,
    TBL_SALARY_BOOK_YEARLY, TBL_SYSTEM_VALUES, TBL_TAX_RATES, TBL_TEAM_SALARY_WAREHOUSE,
};
use crate::names::{
    EnumScnScalar, FILL_DELAY_DAYS, FILL_EVENT_DATE, FILL_TO_12_MIN_TYPE, FILL_TO_14_MIN_TYPE,
    META_AS_OF_DATE, META_BASE_YEAR, MX_DAYS_IN_SEASON, MX_OUT_DAYS, MX_PLAYING_START,
    MX_SIGN_DATE, MX_SIGN_DELAY_DAYS, MX_SIGN_DELAY_LABEL, MX_TPE_ALLOWANCE, MX_TRADE_DATE,
    MX_YEAR, SELECTED_MODE, SELECTED_TEAM, SIGN_NAMES, SIGN_SALARIES, STRETCH_NAMES,
    TRADE_IN_NAMES, TRADE_IN_SALARY, TRADE_MAX_INCOMING, TRADE_OUT_NAMES, TRADE_OUT_SALARY,
    TRADE_PAD, TRADE_POST_APRON_TOTAL, WAIVED_NAMES, mx_team_name,
};
use crate::spec::{EnumFillBasis, EnumSalaryLayer, EnumSignDelay, EnumTradeMode};

use super::expr::{Expr, boolean, cell, col, int, lambda, let_in, name, num, text, var};
use super::func as fx;

////////////////////////////////////////////////////////////////////////////////
// #region Catalogs

/// One roster status label and the named input range that assigns it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpecRosterStatus {
    pub range_name: &'static str,
    pub label: &'static str,
    /// Whether a player with this status still counts toward the roster.
    pub if_counts: bool,
}

/// Status labels in precedence order; the first matching range wins.
pub const ROSTER_STATUS_PRECEDENCE: [SpecRosterStatus; 5] = [
    SpecRosterStatus {
        range_name: TRADE_OUT_NAMES,
        label: "OUT",
        if_counts: false,
    },
    SpecRosterStatus {
        range_name: WAIVED_NAMES,
        label: "WAIVED",
        if_counts: false,
    },
    SpecRosterStatus {
        range_name: STRETCH_NAMES,
        label: "STRETCH",
        if_counts: false,
    },
    SpecRosterStatus {
        range_name: SIGN_NAMES,
        label: "SIGN",
        if_counts: true,
    },
    SpecRosterStatus {
        range_name: TRADE_IN_NAMES,
        label: "IN",
        if_counts: true,
    },
];

/// Room line of the totals block: threshold column against a filled layer total.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpecRoomLine {
    pub label: &'static str,
    pub threshold_column: &'static str,
    pub layer: EnumSalaryLayer,
}

pub const ROOM_LINES: [SpecRoomLine; 4] = [
    SpecRoomLine {
        label: "Cap Room",
        threshold_column: "salary_cap_amount",
        layer: EnumSalaryLayer::Cap,
    },
    SpecRoomLine {
        label: "Tax Room",
        threshold_column: "tax_level_amount",
        layer: EnumSalaryLayer::Tax,
    },
    SpecRoomLine {
        label: "Apron1 Room",
        threshold_column: "tax_apron_amount",
        layer: EnumSalaryLayer::Apron,
    },
    SpecRoomLine {
        label: "Apron2 Room",
        threshold_column: "tax_apron2_amount",
        layer: EnumSalaryLayer::Apron,
    },
];

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Primitives

fn yearly(column: &str) -> Expr {
    col(TBL_SALARY_BOOK_YEARLY, column)
}

fn book(column: &str) -> Expr {
    col(TBL_SALARY_BOOK_WAREHOUSE, column)
}

fn team_wh(column: &str) -> Expr {
    col(TBL_TEAM_SALARY_WAREHOUSE, column)
}

fn sysv(column: &str) -> Expr {
    col(TBL_SYSTEM_VALUES, column)
}

fn tax_rates(column: &str) -> Expr {
    col(TBL_TAX_RATES, column)
}

fn blank() -> Expr {
    text("")
}

/// Reference to a CALC scenario scalar.
pub fn scn(scalar: EnumScnScalar, off: usize) -> Expr {
    name(scalar.name(off))
}

/// `MetaBaseYear + off`.
pub fn year_at(off: usize) -> Expr {
    if off == 0 {
        name(META_BASE_YEAR)
    } else {
        name(META_BASE_YEAR) + int(off as i64)
    }
}

/// Season header such as `25-26` for year offset `off`.
pub fn season_label(off: usize) -> Expr {
    fx::text_fmt(fx::modulo(year_at(off), int(100)), "00")
        .concat(text("-"))
        .concat(fx::text_fmt(fx::modulo(year_at(off + 1), int(100)), "00"))
}

/// League-wide system value for `year`.
pub fn system_value(column: &str, year: Expr) -> Expr {
    fx::sumifs(sysv(column), vec![(sysv("salary_year"), year)])
}

/// Authoritative warehouse value for `(team, year)`.
pub fn warehouse_value(team: Expr, column: &str, year: Expr) -> Expr {
    fx::sumifs(
        team_wh(column),
        vec![(team_wh("team_code"), team), (team_wh("salary_year"), year)],
    )
}

/// Non-numeric warehouse value for `(team, year)`; `FALSE` when the row is missing.
pub fn warehouse_flag(team: Expr, column: &str, year: Expr) -> Expr {
    fx::xlookup(
        int(1),
        team_wh("team_code").equals(team) * team_wh("salary_year").equals(year),
        team_wh(column),
        boolean(false),
    )
}

/// `SWITCH(SelectedMode, "Cap", .., "Tax", .., "Apron", .., <cap>)`.
pub fn mode_switch(mode: Expr, derive: impl Fn(EnumSalaryLayer) -> Expr) -> Expr {
    fx::switch(
        mode,
        EnumSalaryLayer::ALL
            .into_iter()
            .map(|layer| (text(layer.label()), derive(layer)))
            .collect(),
        derive(EnumSalaryLayer::Cap),
    )
}

/// Dispatch over the fill-basis toggle; unknown labels price as rookie.
pub fn basis_switch(toggle: Expr, derive: impl Fn(EnumFillBasis) -> Expr) -> Expr {
    fx::switch(
        toggle,
        EnumFillBasis::ALL
            .into_iter()
            .map(|basis| (text(basis.label()), derive(basis)))
            .collect(),
        derive(EnumFillBasis::Rookie),
    )
}

fn nonblank_unique(names: Expr) -> Expr {
    fx::unique(fx::filter(names.clone(), names.not_equals(blank()), blank()))
}

fn nonblank(names: Expr) -> Expr {
    fx::filter(names.clone(), names.not_equals(blank()), blank())
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Name Aggregates

/// Sum `column` of `tbl_salary_book_yearly` over the unique non-blank names in
/// `names` for `year`, optionally scoped to `team`. Missing names count as zero.
pub fn names_salary_sum(names: Expr, year: Expr, column: &str, team: Option<Expr>) -> Expr {
    let mut mask = yearly("salary_year").equals(year);
    if let Some(team) = team {
        mask = mask * yearly("team_code").equals(team);
    }
    let_in(
        vec![
            ("picked", nonblank_unique(names)),
            ("mask", mask),
            (
                "book_names",
                fx::filter(yearly("player_name"), var("mask"), blank()),
            ),
            (
                "book_amounts",
                fx::filter(yearly(column), var("mask"), int(0)),
            ),
        ],
        fx::sum(fx::iferror(
            fx::xlookup(var("picked"), var("book_names"), var("book_amounts"), int(0)),
            int(0),
        )),
    )
}

/// Number of unique non-blank entries of `names`.
pub fn count_names(names: Expr) -> Expr {
    fx::sum(fx::to_number(nonblank_unique(names).not_equals(blank())))
}

/// Sum of the signing salaries paired with non-blank sign names.
pub fn sign_salary_sum() -> Expr {
    fx::sumifs(name(SIGN_SALARIES), vec![(name(SIGN_NAMES), text("<>"))])
}

/// Dead money accrued in `year` by stretching every player in `StretchNames`.
///
/// The remaining total from the base year onward is spread evenly over
/// `2 * years_remaining + 1` seasons starting at the base year.
pub fn stretch_dead_money(year: Expr, column: &str) -> Expr {
    let mask = yearly("player_name").equals(var("p"))
        * yearly("team_code").equals(name(SELECTED_TEAM))
        * yearly("salary_year").greater_eq(name(META_BASE_YEAR));
    let per_player = let_in(
        vec![
            ("amounts", fx::filter(yearly(column), mask, int(0))),
            ("total", fx::sum(var("amounts"))),
            (
                "yrs",
                fx::sum(fx::to_number(var("amounts").greater_than(int(0)))),
            ),
            ("span", int(2) * var("yrs") + int(1)),
            ("off", year - name(META_BASE_YEAR)),
        ],
        fx::iff(
            fx::and(vec![
                var("p").not_equals(blank()),
                var("yrs").greater_than(int(0)),
                var("off").greater_eq(int(0)),
                var("off").less_than(var("span")),
            ]),
            var("total") / var("span"),
            int(0),
        ),
    );
    let_in(
        vec![("picked", nonblank_unique(name(STRETCH_NAMES)))],
        fx::sum(fx::map(vec![var("picked")], lambda(&["p"], per_player))),
    )
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Scenario Scalars

/// Scenario total for one salary layer at year offset `off`.
pub fn scenario_layer_total(layer: EnumSalaryLayer, off: usize) -> Expr {
    let team = || Some(name(SELECTED_TEAM));
    let mut total = warehouse_value(name(SELECTED_TEAM), layer.col_warehouse_total(), year_at(off))
        - names_salary_sum(name(TRADE_OUT_NAMES), year_at(off), layer.col_outgoing(), team())
        + names_salary_sum(name(TRADE_IN_NAMES), year_at(off), layer.col_incoming(), None);
    if off == 0 {
        total = total + sign_salary_sum();
    }
    total - names_salary_sum(name(STRETCH_NAMES), year_at(off), layer.col_amount(), team())
        + stretch_dead_money(year_at(off), layer.col_amount())
}

/// Terminated-contract dead money already on the selected team's books.
pub fn warehouse_dead_money(layer: EnumSalaryLayer, year: Expr) -> Expr {
    let dm = |column: &str| col(TBL_DEAD_MONEY_WAREHOUSE, column);
    fx::sumifs(
        dm(layer.col_dead_money()),
        vec![
            (dm("team_code"), name(SELECTED_TEAM)),
            (dm("salary_year"), year),
        ],
    )
}

/// Cap holds of the selected team for `year`.
pub fn warehouse_cap_holds(layer: EnumSalaryLayer, year: Expr) -> Expr {
    let ch = |column: &str| col(TBL_CAP_HOLDS_WAREHOUSE, column);
    fx::sumifs(
        ch(layer.col_cap_hold()),
        vec![
            (ch("team_code"), name(SELECTED_TEAM)),
            (ch("salary_year"), year),
        ],
    )
}

/// Dead money of the selected layer: existing warehouse dead money, waived
/// salaries and stretch accruals.
///
/// Informational; the warehouse totals already carry the existing amounts.
pub fn scenario_dead_money(off: usize) -> Expr {
    mode_switch(name(SELECTED_MODE), |layer| {
        warehouse_dead_money(layer, year_at(off))
            + names_salary_sum(
                name(WAIVED_NAMES),
                year_at(off),
                layer.col_amount(),
                Some(name(SELECTED_TEAM)),
            )
            + stretch_dead_money(year_at(off), layer.col_amount())
    })
}

/// Cap holds of the selected layer. Informational, like dead money.
pub fn scenario_cap_holds(off: usize) -> Expr {
    mode_switch(name(SELECTED_MODE), |layer| warehouse_cap_holds(layer, year_at(off)))
}

/// Post-scenario roster count, floored at zero.
pub fn scenario_roster_count(off: usize) -> Expr {
    let base = warehouse_value(name(SELECTED_TEAM), "roster_row_count", year_at(off));
    fx::max(vec![
        int(0),
        base - count_names(name(TRADE_OUT_NAMES))
            - count_names(name(WAIVED_NAMES))
            - count_names(name(STRETCH_NAMES))
            + count_names(name(TRADE_IN_NAMES))
            + count_names(name(SIGN_NAMES)),
    ])
}

/// League minimum for a fill basis in `year`.
pub fn min_salary(basis: EnumFillBasis, year: Expr) -> Expr {
    let ms = |column: &str| col(TBL_MINIMUM_SCALE, column);
    fx::sumifs(
        ms("minimum_salary_amount"),
        vec![
            (ms("salary_year"), year),
            (ms("years_of_service"), int(basis.years_of_service())),
        ],
    )
}

fn min_scalar(basis: EnumFillBasis) -> EnumScnScalar {
    match basis {
        EnumFillBasis::Rookie => EnumScnScalar::RookieMin,
        EnumFillBasis::Vet => EnumScnScalar::VetMin,
    }
}

/// Share of the season still to be paid when a contract starts on `start`.
pub fn fill_proration(start: Expr, year: Expr) -> Expr {
    let_in(
        vec![
            ("d_start", start),
            ("n_days", system_value("days_in_season", year.clone())),
            ("d_end", system_value("season_end_at", year)),
        ],
        fx::iff(
            var("n_days").less_eq(int(0)),
            int(1),
            fx::min(vec![
                int(1),
                fx::max(vec![
                    int(0),
                    (var("d_end") - var("d_start")) / var("n_days"),
                ]),
            ]),
        ),
    )
}

/// `FillEventDate`, defaulting to `MetaAsOfDate` when blank.
pub fn fill_event_date() -> Expr {
    fx::iff(
        name(FILL_EVENT_DATE).equals(blank()),
        name(META_AS_OF_DATE),
        name(FILL_EVENT_DATE),
    )
}

pub fn fill12_count(off: usize) -> Expr {
    fx::max(vec![
        int(0),
        int(N_FILL_TARGET_LOW) - scn(EnumScnScalar::RosterCount, off),
    ])
}

pub fn fill14_count(off: usize) -> Expr {
    fx::max(vec![
        int(0),
        int(N_FILL_TARGET_HIGH) - scn(EnumScnScalar::RosterCount, off),
    ]) - scn(EnumScnScalar::Fill12Count, off)
}

pub fn fill12_amount(off: usize) -> Expr {
    let price = basis_switch(name(FILL_TO_12_MIN_TYPE), |basis| {
        scn(min_scalar(basis), off)
    });
    let amount = scn(EnumScnScalar::Fill12Count, off) * price;
    if off == 0 {
        amount * fill_proration(fill_event_date(), year_at(0))
    } else {
        amount
    }
}

pub fn fill14_amount(off: usize) -> Expr {
    let price = basis_switch(name(FILL_TO_14_MIN_TYPE), |basis| {
        scn(min_scalar(basis), off)
    });
    let amount = scn(EnumScnScalar::Fill14Count, off) * price;
    if off == 0 {
        amount * fill_proration(fill_event_date() + name(FILL_DELAY_DAYS), year_at(0))
    } else {
        amount
    }
}

pub fn fill_amount(off: usize) -> Expr {
    scn(EnumScnScalar::Fill12Amount, off) + scn(EnumScnScalar::Fill14Amount, off)
}

fn layer_total_scalar(layer: EnumSalaryLayer) -> EnumScnScalar {
    match layer {
        EnumSalaryLayer::Cap => EnumScnScalar::CapTotal,
        EnumSalaryLayer::Tax => EnumScnScalar::TaxTotal,
        EnumSalaryLayer::Apron => EnumScnScalar::ApronTotal,
    }
}

/// CALC scalar holding the filled total of `layer`.
pub fn layer_filled_scalar(layer: EnumSalaryLayer) -> EnumScnScalar {
    match layer {
        EnumSalaryLayer::Cap => EnumScnScalar::CapTotalFilled,
        EnumSalaryLayer::Tax => EnumScnScalar::TaxTotalFilled,
        EnumSalaryLayer::Apron => EnumScnScalar::ApronTotalFilled,
    }
}

pub fn filled_total(layer: EnumSalaryLayer, off: usize) -> Expr {
    scn(layer_total_scalar(layer), off) + scn(EnumScnScalar::FillAmount, off)
}

/// Progressive luxury tax on the filled tax total.
pub fn tax_payment(off: usize) -> Expr {
    let y = || year_at(off);
    let by_bracket = |column: &str| {
        fx::sumifs(
            tax_rates(column),
            vec![
                (tax_rates("salary_year"), y()),
                (tax_rates("lower_limit"), var("lim")),
            ],
        )
    };
    let_in(
        vec![
            (
                "over",
                scn(EnumScnScalar::TaxTotalFilled, off) - system_value("tax_level_amount", y()),
            ),
            (
                "rep",
                warehouse_flag(name(SELECTED_TEAM), "is_repeater_taxpayer", y()),
            ),
            (
                "lim",
                fx::maxifs(
                    tax_rates("lower_limit"),
                    vec![
                        (tax_rates("salary_year"), y()),
                        (tax_rates("lower_limit"), text("<=").concat(var("over"))),
                    ],
                ),
            ),
            (
                "pct",
                fx::iff(
                    var("rep"),
                    by_bracket("tax_rate_repeater"),
                    by_bracket("tax_rate_non_repeater"),
                ),
            ),
            (
                "chg",
                fx::iff(
                    var("rep"),
                    by_bracket("base_charge_repeater"),
                    by_bracket("base_charge_non_repeater"),
                ),
            ),
        ],
        fx::iff(
            var("over").less_eq(int(0)),
            int(0),
            var("chg") + (var("over") - var("lim")) * var("pct"),
        ),
    )
}

/// Formula materialized on CALC for one scalar and year offset.
pub fn derive_scenario_scalar(scalar: EnumScnScalar, off: usize) -> Expr {
    match scalar {
        EnumScnScalar::RosterCount => scenario_roster_count(off),
        EnumScnScalar::CapTotal => scenario_layer_total(EnumSalaryLayer::Cap, off),
        EnumScnScalar::TaxTotal => scenario_layer_total(EnumSalaryLayer::Tax, off),
        EnumScnScalar::ApronTotal => scenario_layer_total(EnumSalaryLayer::Apron, off),
        EnumScnScalar::DeadMoney => scenario_dead_money(off),
        EnumScnScalar::CapHolds => scenario_cap_holds(off),
        EnumScnScalar::RookieMin => min_salary(EnumFillBasis::Rookie, year_at(off)),
        EnumScnScalar::VetMin => min_salary(EnumFillBasis::Vet, year_at(off)),
        EnumScnScalar::Fill12Count => fill12_count(off),
        EnumScnScalar::Fill14Count => fill14_count(off),
        EnumScnScalar::Fill12Amount => fill12_amount(off),
        EnumScnScalar::Fill14Amount => fill14_amount(off),
        EnumScnScalar::FillAmount => fill_amount(off),
        EnumScnScalar::CapTotalFilled => filled_total(EnumSalaryLayer::Cap, off),
        EnumScnScalar::TaxTotalFilled => filled_total(EnumSalaryLayer::Tax, off),
        EnumScnScalar::ApronTotalFilled => filled_total(EnumSalaryLayer::Apron, off),
        EnumScnScalar::TaxPayment => tax_payment(off),
    }
}

/// Threshold minus filled total; positive means room.
pub fn room(line: &SpecRoomLine, off: usize) -> Expr {
    system_value(line.threshold_column, year_at(off)) - scn(layer_filled_scalar(line.layer), off)
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Trade Matching

fn allowed_incoming_for(mode: EnumTradeMode) -> Expr {
    match mode {
        EnumTradeMode::Standard => var("x"),
        EnumTradeMode::Expanded => fx::max(vec![
            fx::min(vec![
                int(2) * var("x") + var("pad_amt"),
                var("x") + var("a"),
            ]),
            num(1.25) * var("x") + var("pad_amt"),
        ]),
    }
}

/// Incoming salary ceiling for outgoing salary `out` under `mode`.
///
/// Unknown modes fall back to dollar-for-dollar matching.
pub fn allowed_incoming(out: Expr, mode: Expr, allowance: Expr, pad: Expr) -> Expr {
    let_in(
        vec![("x", out), ("a", allowance), ("pad_amt", pad)],
        fx::switch(
            mode,
            EnumTradeMode::ALL
                .into_iter()
                .map(|mode| (text(mode.label()), allowed_incoming_for(mode)))
                .collect(),
            allowed_incoming_for(EnumTradeMode::Standard),
        ),
    )
}

/// Expanded-mode ceiling with a fixed pad.
pub fn allowed_incoming_expanded(out: Expr, allowance: Expr, pad: Expr) -> Expr {
    let_in(
        vec![("x", out), ("a", allowance), ("pad_amt", pad)],
        allowed_incoming_for(EnumTradeMode::Expanded),
    )
}

pub fn trade_out_salary() -> Expr {
    names_salary_sum(
        name(TRADE_OUT_NAMES),
        year_at(0),
        EnumSalaryLayer::Cap.col_outgoing(),
        Some(name(SELECTED_TEAM)),
    )
}

pub fn trade_in_salary() -> Expr {
    names_salary_sum(
        name(TRADE_IN_NAMES),
        year_at(0),
        EnumSalaryLayer::Cap.col_incoming(),
        None,
    )
}

pub fn trade_post_apron_total() -> Expr {
    scn(EnumScnScalar::ApronTotal, 0)
}

/// Pad applies only while the post-trade apron total stays under the apron.
pub fn trade_pad() -> Expr {
    fx::iff(
        name(TRADE_POST_APRON_TOTAL).greater_than(system_value("tax_apron_amount", year_at(0))),
        int(0),
        num(N_TRADE_PAD_AMOUNT),
    )
}

pub fn trade_max_incoming() -> Expr {
    allowed_incoming_expanded(
        name(TRADE_OUT_SALARY),
        system_value("tpe_dollar_allowance", year_at(0)),
        name(TRADE_PAD),
    )
}

pub fn trade_remaining() -> Expr {
    name(TRADE_MAX_INCOMING) - name(TRADE_IN_SALARY)
}

pub fn trade_legality() -> Expr {
    fx::iff(
        fx::and(vec![
            name(TRADE_OUT_SALARY).equals(int(0)),
            name(TRADE_IN_SALARY).equals(int(0)),
        ]),
        blank(),
        fx::iff(
            name(TRADE_IN_SALARY).less_eq(name(TRADE_MAX_INCOMING)),
            text("PASS"),
            text("FAIL"),
        ),
    )
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Matrix

/// Days for a sign-delay label; unknown labels mean no delay.
pub fn sign_delay_days(label: Expr) -> Expr {
    fx::switch(
        label,
        EnumSignDelay::ALL
            .into_iter()
            .map(|delay| (text(delay.label()), int(delay.days())))
            .collect(),
        int(0),
    )
}

fn mx_team(n_team: usize, stem: &str) -> Expr {
    name(mx_team_name(n_team, stem))
}

pub fn mx_playing_start() -> Expr {
    system_value("playing_start_at", name(MX_YEAR))
}

pub fn mx_days_in_season() -> Expr {
    system_value("days_in_season", name(MX_YEAR))
}

pub fn mx_tpe_allowance() -> Expr {
    system_value("tpe_dollar_allowance", name(MX_YEAR))
}

pub fn mx_sign_delay_days() -> Expr {
    sign_delay_days(name(MX_SIGN_DELAY_LABEL))
}

pub fn mx_sign_date() -> Expr {
    name(MX_TRADE_DATE) + name(MX_SIGN_DELAY_DAYS)
}

/// Season days elapsed before the trade date.
pub fn mx_out_days() -> Expr {
    fx::min(vec![
        name(MX_DAYS_IN_SEASON),
        fx::max(vec![int(0), name(MX_TRADE_DATE) - name(MX_PLAYING_START)]),
    ])
}

/// Season days remaining from the trade date.
pub fn mx_in_days() -> Expr {
    fx::max(vec![int(0), name(MX_DAYS_IN_SEASON) - name(MX_OUT_DAYS)])
}

/// Outgoing amount of one name cell for team `n_team`.
pub fn mx_out_amount(n_team: usize, name_cell: &str, layer: EnumSalaryLayer) -> Expr {
    fx::iff(
        cell(name_cell).equals(blank()),
        blank(),
        names_salary_sum(
            cell(name_cell),
            name(MX_YEAR),
            layer.col_outgoing(),
            Some(mx_team(n_team, "Code")),
        ),
    )
}

/// Incoming amount of one name cell (league-wide lookup).
pub fn mx_in_amount(name_cell: &str, layer: EnumSalaryLayer) -> Expr {
    fx::iff(
        cell(name_cell).equals(blank()),
        blank(),
        names_salary_sum(cell(name_cell), name(MX_YEAR), layer.col_incoming(), None),
    )
}

pub fn mx_out_cap_total(n_team: usize) -> Expr {
    names_salary_sum(
        mx_team(n_team, "OutNames"),
        name(MX_YEAR),
        EnumSalaryLayer::Cap.col_outgoing(),
        Some(mx_team(n_team, "Code")),
    )
}

pub fn mx_in_cap_total(n_team: usize) -> Expr {
    names_salary_sum(
        mx_team(n_team, "InNames"),
        name(MX_YEAR),
        EnumSalaryLayer::Cap.col_incoming(),
        None,
    )
}

pub fn mx_allowed_in_cap(n_team: usize) -> Expr {
    allowed_incoming(
        mx_team(n_team, "OutCapTotal"),
        mx_team(n_team, "Mode"),
        name(MX_TPE_ALLOWANCE),
        num(N_TRADE_PAD_AMOUNT),
    )
}

pub fn mx_works(n_team: usize) -> Expr {
    fx::iff(
        mx_team(n_team, "Code").equals(blank()),
        blank(),
        fx::iff(
            mx_team(n_team, "InCapTotal").less_eq(mx_team(n_team, "AllowedInCap")),
            text("Yes"),
            text("No"),
        ),
    )
}

/// Post-trade roster count of team `n_team`.
pub fn mx_roster_count(n_team: usize) -> Expr {
    fx::max(vec![
        int(0),
        warehouse_value(mx_team(n_team, "Code"), "roster_row_count", name(MX_YEAR))
            - count_names(mx_team(n_team, "OutNames"))
            + count_names(mx_team(n_team, "InNames")),
    ])
}

/// Fill-to-`n_target` amount for team `n_team`, prorated from the sign date.
pub fn mx_fill_amount(n_team: usize, n_target: i64, basis_name: &str) -> Expr {
    let n_fill = if n_target <= N_FILL_TARGET_LOW {
        var("n_low")
    } else {
        fx::max(vec![int(0), int(n_target) - var("n_roster")]) - var("n_low")
    };
    let factor = fx::iff(
        name(MX_DAYS_IN_SEASON).less_eq(int(0)),
        int(1),
        fx::min(vec![
            int(1),
            fx::max(vec![
                int(0),
                (name(MX_DAYS_IN_SEASON)
                    - fx::min(vec![
                        name(MX_DAYS_IN_SEASON),
                        fx::max(vec![int(0), name(MX_SIGN_DATE) - name(MX_PLAYING_START)]),
                    ]))
                    / name(MX_DAYS_IN_SEASON),
            ]),
        ]),
    );
    fx::iff(
        mx_team(n_team, "Code").equals(blank()),
        blank(),
        let_in(
            vec![
                ("n_roster", mx_team(n_team, "RosterCount")),
                (
                    "n_low",
                    fx::max(vec![int(0), int(N_FILL_TARGET_LOW) - var("n_roster")]),
                ),
            ],
            n_fill
                * basis_switch(name(basis_name), |basis| {
                    min_salary(basis, name(MX_YEAR))
                })
                * factor,
        ),
    )
}

/// Overall verdict: every populated lane must work.
pub fn mx_verdict(n_teams: usize) -> Expr {
    let l_any: Vec<Expr> = (1..=n_teams)
        .map(|n| mx_team(n, "Code").not_equals(blank()))
        .collect();
    let l_ok: Vec<Expr> = (1..=n_teams)
        .map(|n| {
            fx::or(vec![
                mx_team(n, "Code").equals(blank()),
                mx_team(n, "Works").equals(text("Yes")),
            ])
        })
        .collect();
    fx::iff(
        fx::or(l_any),
        fx::iff(
            fx::and(l_ok),
            text("Trade Works"),
            text("Trade Does Not Work"),
        ),
        blank(),
    )
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Roster Spill

fn player_on_team(player: Expr, year: Expr) -> Expr {
    fx::countifs(vec![
        (yearly("player_name"), player),
        (yearly("team_code"), name(SELECTED_TEAM)),
        (yearly("salary_year"), year),
    ])
}

fn sign_salary_of(player: Expr) -> Expr {
    fx::sumifs(name(SIGN_SALARIES), vec![(name(SIGN_NAMES), player)])
}

fn is_signed(player: Expr) -> Expr {
    fx::countif(name(SIGN_NAMES), player).greater_than(int(0))
}

/// Sort key of the roster spill: sign salary, else team cap amount, else
/// league incoming cap amount.
fn effective_base_salary(player: Expr) -> Expr {
    let_in(
        vec![("n_team", player_on_team(player.clone(), year_at(0)))],
        fx::iff(
            is_signed(player.clone()),
            sign_salary_of(player.clone()),
            fx::iff(
                var("n_team").greater_than(int(0)),
                fx::sumifs(
                    yearly("cap_amount"),
                    vec![
                        (yearly("player_name"), player.clone()),
                        (yearly("team_code"), name(SELECTED_TEAM)),
                        (yearly("salary_year"), year_at(0)),
                    ],
                ),
                fx::sumifs(
                    yearly("incoming_cap_amount"),
                    vec![
                        (yearly("player_name"), player),
                        (yearly("salary_year"), year_at(0)),
                    ],
                ),
            ),
        ),
    )
}

/// Roster names for `SelectedTeam` in the base year plus trade-ins and
/// signings, de-duplicated, sorted by effective salary, truncated to `n_rows`.
pub fn roster_names_spill(n_rows: usize) -> Expr {
    let team_mask = yearly("team_code").equals(name(SELECTED_TEAM))
        * yearly("salary_year").equals(year_at(0));
    let_in(
        vec![
            (
                "team_names",
                fx::filter(yearly("player_name"), team_mask, blank()),
            ),
            ("in_names", nonblank(name(TRADE_IN_NAMES))),
            ("sign_names", nonblank(name(SIGN_NAMES))),
            (
                "all_names",
                fx::vstack(vec![
                    var("team_names"),
                    var("in_names"),
                    var("sign_names"),
                ]),
            ),
            ("picked", nonblank_unique(var("all_names"))),
            (
                "sal",
                fx::map(
                    vec![var("picked")],
                    lambda(&["p"], effective_base_salary(var("p"))),
                ),
            ),
        ],
        fx::take(fx::sortby(var("picked"), var("sal"), -1), n_rows),
    )
}

/// Salary column for year offset `off` in the selected layer, aligned to the
/// name spill at `name_anchor`.
pub fn roster_salary_spill(name_anchor: &str, off: usize) -> Expr {
    let p = || var("p");
    let by_layer = mode_switch(name(SELECTED_MODE), |layer| {
        fx::iff(
            var("n_team").greater_than(int(0)),
            fx::sumifs(
                yearly(layer.col_amount()),
                vec![
                    (yearly("player_name"), p()),
                    (yearly("team_code"), name(SELECTED_TEAM)),
                    (yearly("salary_year"), year_at(off)),
                ],
            ),
            fx::iff(
                var("n_any").greater_than(int(0)),
                fx::sumifs(
                    yearly(layer.col_incoming()),
                    vec![
                        (yearly("player_name"), p()),
                        (yearly("salary_year"), year_at(off)),
                    ],
                ),
                blank(),
            ),
        )
    });
    let mut per_player = let_in(
        vec![
            ("n_team", player_on_team(p(), year_at(off))),
            (
                "n_any",
                fx::countifs(vec![
                    (yearly("player_name"), p()),
                    (yearly("salary_year"), year_at(off)),
                ]),
            ),
        ],
        by_layer,
    );
    if off == 0 {
        per_player = fx::iff(is_signed(p()), sign_salary_of(p()), per_player);
    }
    fx::map(
        vec![fx::anchorarray(cell(name_anchor))],
        lambda(
            &["p"],
            fx::iff(p().equals(blank()), blank(), per_player),
        ),
    )
}

/// Percent of cap per row, or `MIN` for minimum contracts.
pub fn roster_pct_spill(name_anchor: &str, salary_anchor: &str, off: usize) -> Expr {
    let_in(
        vec![("cap_amt", system_value("salary_cap_amount", year_at(off)))],
        fx::map(
            vec![
                fx::anchorarray(cell(name_anchor)),
                fx::anchorarray(cell(salary_anchor)),
            ],
            lambda(
                &["p", "s"],
                fx::iff(
                    fx::or(vec![
                        var("p").equals(blank()),
                        fx::isnumber(var("s")).equals(boolean(false)),
                    ]),
                    blank(),
                    fx::iff(
                        fx::countifs(vec![
                            (book("player_name"), var("p")),
                            (book("is_min_contract"), boolean(true)),
                        ])
                        .greater_than(int(0)),
                        text("MIN"),
                        fx::iff(
                            var("cap_amt").greater_than(int(0)),
                            var("s") / var("cap_amt"),
                            blank(),
                        ),
                    ),
                ),
            ),
        ),
    )
}

/// Six-year total per row.
pub fn roster_total_spill(name_anchor: &str, salary_anchors: &[String]) -> Expr {
    let l_columns = salary_anchors
        .iter()
        .map(|anchor| fx::anchorarray(cell(anchor.as_str())))
        .collect();
    let_in(
        vec![
            ("picked", fx::anchorarray(cell(name_anchor))),
            (
                "totals",
                fx::byrow(
                    fx::hstack(l_columns),
                    lambda(&["row_vals"], fx::sum(var("row_vals"))),
                ),
            ),
        ],
        fx::iff(var("picked").equals(blank()), blank(), var("totals")),
    )
}

pub fn roster_agent_spill(name_anchor: &str) -> Expr {
    fx::map(
        vec![fx::anchorarray(cell(name_anchor))],
        lambda(
            &["p"],
            fx::iff(
                var("p").equals(blank()),
                blank(),
                fx::xlookup(var("p"), book("player_name"), book("agent_name"), blank()),
            ),
        ),
    )
}

/// Status label per row in [`ROSTER_STATUS_PRECEDENCE`] order.
pub fn roster_status_spill(name_anchor: &str) -> Expr {
    let mut status = blank();
    for item in ROSTER_STATUS_PRECEDENCE.iter().rev() {
        status = fx::iff(
            fx::countif(name(item.range_name), var("p")).greater_than(int(0)),
            text(item.label),
            status,
        );
    }
    fx::map(
        vec![fx::anchorarray(cell(name_anchor))],
        lambda(
            &["p"],
            fx::iff(var("p").equals(blank()), blank(), status),
        ),
    )
}

/// Running count over counting rows; blank for departed and two-way players.
pub fn roster_rank_spill(name_anchor: &str, status_anchor: &str) -> Expr {
    let mut l_exclusions = vec![var("p").equals(blank())];
    l_exclusions.extend(
        ROSTER_STATUS_PRECEDENCE
            .iter()
            .filter(|item| !item.if_counts)
            .map(|item| var("st").equals(text(item.label))),
    );
    l_exclusions.push(
        fx::countifs(vec![
            (yearly("player_name"), var("p")),
            (yearly("team_code"), name(SELECTED_TEAM)),
            (yearly("salary_year"), year_at(0)),
            (yearly("is_two_way"), boolean(true)),
        ])
        .greater_than(int(0)),
    );
    let_in(
        vec![
            (
                "counting",
                fx::map(
                    vec![
                        fx::anchorarray(cell(name_anchor)),
                        fx::anchorarray(cell(status_anchor)),
                    ],
                    lambda(&["p", "st"], fx::iff(fx::or(l_exclusions), int(0), int(1))),
                ),
            ),
            (
                "running",
                fx::scan(
                    int(0),
                    var("counting"),
                    lambda(&["acc", "v"], var("acc") + var("v")),
                ),
            ),
        ],
        fx::iff(var("counting").equals(int(1)), var("running"), blank()),
    )
}

/// Two-way contracts of `SelectedTeam` in the base year.
pub fn two_way_count() -> Expr {
    fx::countifs(vec![
        (yearly("team_code"), name(SELECTED_TEAM)),
        (yearly("salary_year"), year_at(0)),
        (yearly("is_two_way"), boolean(true)),
    ])
}

/// Filled total of the selected layer in the base year.
pub fn kpi_filled_total() -> Expr {
    mode_switch(name(SELECTED_MODE), |layer| scn(layer_filled_scalar(layer), 0))
}

/// Approved, unexpired exceptions with remaining room, largest first.
pub fn exceptions_spill(n_rows: usize) -> Expr {
    let ex = |column: &str| col(TBL_EXCEPTIONS_WAREHOUSE, column);
    let mask = ex("team_code").equals(name(SELECTED_TEAM))
        * ex("salary_year").equals(year_at(0))
        * ex("record_status_lk").equals(text(C_EXCEPTION_STATUS_APPROVED))
        * ex("is_expired").not_equals(boolean(true))
        * ex("remaining_amount").greater_than(int(0));
    let_in(
        vec![
            ("mask", mask),
            (
                "picked",
                fx::filter(
                    fx::hstack(vec![
                        ex("exception_type_name"),
                        ex("remaining_amount"),
                        ex("expiration_date"),
                    ]),
                    var("mask"),
                    blank(),
                ),
            ),
            (
                "amounts",
                fx::filter(ex("remaining_amount"), var("mask"), int(0)),
            ),
        ],
        fx::take(fx::sortby(var("picked"), var("amounts"), -1), n_rows),
    )
}

// #endregion
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use std::collections::{BTreeMap, BTreeSet};

    use super::super::expr::EnumBinaryOp;
    use super::*;
    use crate::conf::{C_PARAM_PREFIX, N_YEAR_OFFSETS};
    use crate::contract::find_table_contract;

    fn derive_all_builders() -> Vec<Expr> {
        let mut l_exprs = Vec::new();
        for off in 0..N_YEAR_OFFSETS {
            for scalar in EnumScnScalar::ALL {
                l_exprs.push(derive_scenario_scalar(scalar, off));
            }
            for line in &ROOM_LINES {
                l_exprs.push(room(line, off));
            }
            l_exprs.push(roster_salary_spill("$E$4", off));
            l_exprs.push(roster_pct_spill("$E$4", "$F$4", off));
        }
        l_exprs.extend([
            trade_out_salary(),
            trade_in_salary(),
            trade_pad(),
            trade_max_incoming(),
            trade_remaining(),
            trade_legality(),
            roster_names_spill(40),
            roster_total_spill("$E$4", &["$F$4".to_string(), "$G$4".to_string()]),
            roster_agent_spill("$E$4"),
            roster_status_spill("$E$4"),
            roster_rank_spill("$E$4", "$T$4"),
            exceptions_spill(10),
            two_way_count(),
            kpi_filled_total(),
            mx_verdict(4),
            mx_fill_amount(1, 12, "MxFill12Basis"),
            mx_fill_amount(1, 14, "MxFill14Basis"),
            mx_allowed_in_cap(2),
            mx_out_amount(3, "$D$7", EnumSalaryLayer::Apron),
            mx_in_amount("$H$7", EnumSalaryLayer::Tax),
            mx_sign_delay_days(),
            mx_out_days(),
            mx_in_days(),
        ]);
        l_exprs
    }

    #[test]
    fn test_every_builder_binds_its_variables() {
        for e in derive_all_builders() {
            assert!(e.validate_scopes().is_ok(), "{}", e.to_formula());
            assert!(!e.to_formula().contains('#'), "{}", e.to_formula());
        }
    }

    #[test]
    fn test_every_referenced_column_exists() {
        let mut set_cols = BTreeSet::new();
        for e in derive_all_builders() {
            e.collect_columns(&mut set_cols);
        }
        for (table, column) in set_cols {
            let contract = find_table_contract(&table).expect("declared table");
            assert!(contract.has_column(&column), "{table}[{column}]");
        }
    }

    #[test]
    fn test_warehouse_lookup_shape() {
        let e = warehouse_value(name(SELECTED_TEAM), "cap_total", year_at(2));
        assert_eq!(
            e.to_formula(),
            "=SUMIFS(tbl_team_salary_warehouse[cap_total],\
             tbl_team_salary_warehouse[team_code],SelectedTeam,\
             tbl_team_salary_warehouse[salary_year],MetaBaseYear+2)"
        );
    }

    #[test]
    fn test_season_label_shape() {
        assert_eq!(
            season_label(1).render(),
            "TEXT(MOD(MetaBaseYear+1,100),\"00\")&\"-\"&TEXT(MOD(MetaBaseYear+2,100),\"00\")"
        );
    }

    #[test]
    fn test_sign_salaries_only_in_base_year() {
        let c_base = scenario_layer_total(EnumSalaryLayer::Cap, 0).render();
        let c_next = scenario_layer_total(EnumSalaryLayer::Cap, 1).render();
        assert!(c_base.contains("SUMIFS(SignSalaries,SignNames,\"<>\")"));
        assert!(!c_next.contains("SignSalaries"));
    }

    #[test]
    fn test_apron_layer_uses_outgoing_apron_column() {
        let c_formula = scenario_layer_total(EnumSalaryLayer::Apron, 0).render();
        assert!(c_formula.contains("tbl_salary_book_yearly[outgoing_apron_amount]"));
        assert!(c_formula.contains("tbl_salary_book_yearly[incoming_apron_amount]"));
        assert!(c_formula.contains("tbl_team_salary_warehouse[apron_total]"));
    }

    #[test]
    fn test_allowed_incoming_dispatches_on_mode() {
        let c_formula = allowed_incoming(name("Out"), name("Mode"), name("Tpe"), num(250_000.0))
            .to_formula();
        assert_eq!(
            c_formula,
            "=LET(_xlpm.x,Out,_xlpm.a,Tpe,_xlpm.pad_amt,250000,\
             SWITCH(Mode,\"Standard\",_xlpm.x,\"Expanded\",\
             MAX(MIN(2*_xlpm.x+_xlpm.pad_amt,_xlpm.x+_xlpm.a),1.25*_xlpm.x+_xlpm.pad_amt),\
             _xlpm.x))"
        );
    }

    #[test]
    fn test_stretch_rule_structure() {
        let c_formula = stretch_dead_money(year_at(3), "cap_amount").render();
        assert!(c_formula.contains("_xlpm.span,2*_xlpm.yrs+1"));
        assert!(c_formula.contains("_xlpm.off,MetaBaseYear+3-MetaBaseYear"));
        assert!(c_formula.contains("_xlpm.off<_xlpm.span"));
        assert!(c_formula.contains("MAP(_xlpm.picked,LAMBDA(_xlpm.p,"));
    }

    #[test]
    fn test_status_precedence_nests_in_order() {
        let c_formula = roster_status_spill("$E$4").render();
        let n_out = c_formula.find("\"OUT\"").expect("OUT");
        let n_waived = c_formula.find("\"WAIVED\"").expect("WAIVED");
        let n_in = c_formula.find("\"IN\"").expect("IN");
        assert!(n_out < n_waived && n_waived < n_in);
        assert!(c_formula.starts_with("MAP(ANCHORARRAY($E$4),"));
    }

    #[test]
    fn test_fill_proration_only_in_base_year() {
        assert!(fill12_amount(0).render().contains("season_end_at"));
        assert!(!fill12_amount(2).render().contains("season_end_at"));
        assert!(fill14_amount(0).render().contains("FillDelayDays"));
    }

    #[test]
    fn test_tax_payment_picks_bracket_by_lower_limit() {
        let c_formula = tax_payment(0).render();
        assert!(c_formula.contains("MAXIFS(tbl_tax_rates[lower_limit]"));
        assert!(c_formula.contains("\"<=\"&_xlpm.over"));
        assert!(c_formula.contains("_xlpm.chg+(_xlpm.over-_xlpm.lim)*_xlpm.pct"));
    }

    ////////////////////////////////////////////////////////////////////////////
    // Scalar evaluation with table lookups stubbed by their rendered text.

    #[derive(Debug, Clone, PartialEq)]
    enum EnumValue {
        Num(f64),
        Text(String),
        Bool(bool),
    }

    impl EnumValue {
        fn num(&self) -> f64 {
            match self {
                Self::Num(n) => *n,
                Self::Bool(b) => f64::from(u8::from(*b)),
                Self::Text(t) => panic!("not a number: {t:?}"),
            }
        }

        fn truthy(&self) -> bool {
            match self {
                Self::Bool(b) => *b,
                Self::Num(n) => *n != 0.0,
                Self::Text(t) => panic!("not a boolean: {t:?}"),
            }
        }
    }

    type DictEnv = BTreeMap<String, EnumValue>;

    fn derive_env(l_pairs: &[(String, EnumValue)]) -> DictEnv {
        l_pairs.iter().cloned().collect()
    }

    fn eval(e: &Expr, env: &DictEnv) -> EnumValue {
        if let Some(value) = env.get(&e.render()) {
            return value.clone();
        }
        match e {
            Expr::Number(n) => EnumValue::Num(*n),
            Expr::Text(s) => EnumValue::Text(s.clone()),
            Expr::Bool(b) => EnumValue::Bool(*b),
            Expr::Neg(operand) => EnumValue::Num(-eval(operand, env).num()),
            Expr::Binary { op, lhs, rhs } => {
                let (a, b) = (eval(lhs, env), eval(rhs, env));
                match op {
                    EnumBinaryOp::Add => EnumValue::Num(a.num() + b.num()),
                    EnumBinaryOp::Sub => EnumValue::Num(a.num() - b.num()),
                    EnumBinaryOp::Mul => EnumValue::Num(a.num() * b.num()),
                    EnumBinaryOp::Div => EnumValue::Num(a.num() / b.num()),
                    EnumBinaryOp::Eq => EnumValue::Bool(a == b),
                    EnumBinaryOp::Ne => EnumValue::Bool(a != b),
                    EnumBinaryOp::Lt => EnumValue::Bool(a.num() < b.num()),
                    EnumBinaryOp::Le => EnumValue::Bool(a.num() <= b.num()),
                    EnumBinaryOp::Gt => EnumValue::Bool(a.num() > b.num()),
                    EnumBinaryOp::Ge => EnumValue::Bool(a.num() >= b.num()),
                    EnumBinaryOp::Pow | EnumBinaryOp::Concat => {
                        panic!("unsupported operator in {}", e.render())
                    }
                }
            }
            Expr::Let { bindings, body } => {
                let mut env_inner = env.clone();
                for (c_name, value) in bindings {
                    let c_key = format!("{C_PARAM_PREFIX}{c_name}");
                    if !env_inner.contains_key(&c_key) {
                        let value = eval(value, &env_inner);
                        env_inner.insert(c_key, value);
                    }
                }
                eval(body, &env_inner)
            }
            Expr::Call { func, args } => match func.as_str() {
                "IF" => {
                    if eval(&args[0], env).truthy() {
                        eval(&args[1], env)
                    } else {
                        eval(&args[2], env)
                    }
                }
                "AND" => EnumValue::Bool(args.iter().all(|arg| eval(arg, env).truthy())),
                "OR" => EnumValue::Bool(args.iter().any(|arg| eval(arg, env).truthy())),
                "MIN" => EnumValue::Num(
                    args.iter()
                        .map(|arg| eval(arg, env).num())
                        .fold(f64::INFINITY, f64::min),
                ),
                "MAX" => EnumValue::Num(
                    args.iter()
                        .map(|arg| eval(arg, env).num())
                        .fold(f64::NEG_INFINITY, f64::max),
                ),
                "SUM" => EnumValue::Num(eval(&args[0], env).num()),
                "MAP" => {
                    let Expr::Lambda { params, body } = &args[1] else {
                        panic!("MAP without LAMBDA: {}", e.render());
                    };
                    let mut env_inner = env.clone();
                    env_inner.insert(format!("{C_PARAM_PREFIX}{}", params[0]), eval(&args[0], env));
                    eval(body, &env_inner)
                }
                _ => panic!("unstubbed call: {}", e.render()),
            },
            _ => panic!("unstubbed reference: {}", e.render()),
        }
    }

    fn assert_close(n_actual: f64, n_expected: f64) {
        assert!(
            (n_actual - n_expected).abs() < 1e-6,
            "{n_actual} != {n_expected}"
        );
    }

    fn sysv_key(column: &str, year: &str) -> String {
        format!("SUMIFS(tbl_system_values[{column}],tbl_system_values[salary_year],{year})")
    }

    fn tax_bracket_key(column: &str) -> String {
        format!(
            "SUMIFS(tbl_tax_rates[{column}],tbl_tax_rates[salary_year],MetaBaseYear,\
             tbl_tax_rates[lower_limit],_xlpm.lim)"
        )
    }

    const C_REPEATER_KEY: &str = "XLOOKUP(1,(tbl_team_salary_warehouse[team_code]=SelectedTeam)*\
         (tbl_team_salary_warehouse[salary_year]=MetaBaseYear),\
         tbl_team_salary_warehouse[is_repeater_taxpayer],FALSE)";

    #[test]
    fn test_tax_payment_full_formula() {
        let c_expected = format!(
            "LET(_xlpm.over,ScnTaxTotalFilled0-{},\
             _xlpm.rep,{C_REPEATER_KEY},\
             _xlpm.lim,MAXIFS(tbl_tax_rates[lower_limit],tbl_tax_rates[salary_year],MetaBaseYear,\
             tbl_tax_rates[lower_limit],\"<=\"&_xlpm.over),\
             _xlpm.pct,IF(_xlpm.rep,{},{}),\
             _xlpm.chg,IF(_xlpm.rep,{},{}),\
             IF(_xlpm.over<=0,0,_xlpm.chg+(_xlpm.over-_xlpm.lim)*_xlpm.pct))",
            sysv_key("tax_level_amount", "MetaBaseYear"),
            tax_bracket_key("tax_rate_repeater"),
            tax_bracket_key("tax_rate_non_repeater"),
            tax_bracket_key("base_charge_repeater"),
            tax_bracket_key("base_charge_non_repeater"),
        );
        assert_eq!(tax_payment(0).render(), c_expected);
    }

    fn derive_tax_env(if_repeater: bool, n_filled: f64) -> DictEnv {
        derive_env(&[
            ("MetaBaseYear".into(), EnumValue::Num(2025.0)),
            ("ScnTaxTotalFilled0".into(), EnumValue::Num(n_filled)),
            (
                sysv_key("tax_level_amount", "MetaBaseYear"),
                EnumValue::Num(187_895_000.0),
            ),
            (C_REPEATER_KEY.into(), EnumValue::Bool(if_repeater)),
            ("_xlpm.lim".into(), EnumValue::Num(10_000_000.0)),
            (tax_bracket_key("tax_rate_non_repeater"), EnumValue::Num(2.5)),
            (tax_bracket_key("tax_rate_repeater"), EnumValue::Num(3.5)),
            (
                tax_bracket_key("base_charge_non_repeater"),
                EnumValue::Num(8_750_000.0),
            ),
            (
                tax_bracket_key("base_charge_repeater"),
                EnumValue::Num(13_750_000.0),
            ),
        ])
    }

    #[test]
    fn test_tax_payment_applies_repeater_rates() {
        let e = tax_payment(0);
        // 12.105M over the line, 2.105M into the 10M bracket.
        let n_plain = eval(&e, &derive_tax_env(false, 200_000_000.0)).num();
        let n_repeat = eval(&e, &derive_tax_env(true, 200_000_000.0)).num();
        assert_close(n_plain, 8_750_000.0 + 2_105_000.0 * 2.5);
        assert_close(n_repeat, 13_750_000.0 + 2_105_000.0 * 3.5);
    }

    #[test]
    fn test_tax_payment_is_zero_at_or_below_the_line() {
        let e = tax_payment(0);
        assert_close(eval(&e, &derive_tax_env(true, 187_895_000.0)).num(), 0.0);
        assert_close(eval(&e, &derive_tax_env(false, 150_000_000.0)).num(), 0.0);
    }

    #[test]
    fn test_room_full_formula() {
        assert_eq!(
            room(&ROOM_LINES[0], 0).render(),
            format!(
                "{}-ScnCapTotalFilled0",
                sysv_key("salary_cap_amount", "MetaBaseYear")
            )
        );
        assert_eq!(
            room(&ROOM_LINES[3], 2).render(),
            format!(
                "{}-ScnApronTotalFilled2",
                sysv_key("tax_apron2_amount", "MetaBaseYear+2")
            )
        );
        let env = derive_env(&[
            (
                sysv_key("salary_cap_amount", "MetaBaseYear"),
                EnumValue::Num(154_647_000.0),
            ),
            ("ScnCapTotalFilled0".into(), EnumValue::Num(160_000_000.0)),
        ]);
        assert_close(
            eval(&room(&ROOM_LINES[0], 0), &env).num(),
            -5_353_000.0,
        );
    }

    #[test]
    fn test_trade_pad_full_formula() {
        assert_eq!(
            trade_pad().render(),
            format!(
                "IF(TradePostApronTotal>{},0,250000)",
                sysv_key("tax_apron_amount", "MetaBaseYear")
            )
        );
    }

    fn derive_trade_env(n_post_apron: f64) -> DictEnv {
        let mut env = derive_env(&[
            ("TradePostApronTotal".into(), EnumValue::Num(n_post_apron)),
            (
                sysv_key("tax_apron_amount", "MetaBaseYear"),
                EnumValue::Num(195_945_000.0),
            ),
            (
                sysv_key("tpe_dollar_allowance", "MetaBaseYear"),
                EnumValue::Num(2_000_000.0),
            ),
            ("TradeOutSalary".into(), EnumValue::Num(20_000_000.0)),
        ]);
        let pad = eval(&trade_pad(), &env);
        env.insert(TRADE_PAD.into(), pad);
        env
    }

    #[test]
    fn test_trade_pad_holds_at_the_apron_and_drops_above_it() {
        let env_at = derive_trade_env(195_945_000.0);
        let env_above = derive_trade_env(195_945_001.0);
        assert_close(env_at[TRADE_PAD].num(), 250_000.0);
        assert_close(env_above[TRADE_PAD].num(), 0.0);
    }

    #[test]
    fn test_trade_max_incoming_full_formula() {
        assert_eq!(
            trade_max_incoming().render(),
            format!(
                "LET(_xlpm.x,TradeOutSalary,_xlpm.a,{},_xlpm.pad_amt,TradePad,\
                 MAX(MIN(2*_xlpm.x+_xlpm.pad_amt,_xlpm.x+_xlpm.a),1.25*_xlpm.x+_xlpm.pad_amt))",
                sysv_key("tpe_dollar_allowance", "MetaBaseYear")
            )
        );
    }

    #[test]
    fn test_trade_max_incoming_follows_the_pad() {
        // 20M out with a 2M allowance: the 1.25x leg decides.
        let e = trade_max_incoming();
        assert_close(eval(&e, &derive_trade_env(195_945_000.0)).num(), 25_250_000.0);
        assert_close(eval(&e, &derive_trade_env(200_000_000.0)).num(), 25_000_000.0);

        let mut env = derive_trade_env(200_000_000.0);
        env.insert(TRADE_MAX_INCOMING.into(), EnumValue::Num(25_000_000.0));
        env.insert(TRADE_IN_SALARY.into(), EnumValue::Num(22_000_000.0));
        assert_eq!(eval(&trade_legality(), &env), EnumValue::Text("PASS".into()));
        env.insert(TRADE_IN_SALARY.into(), EnumValue::Num(25_000_001.0));
        assert_eq!(eval(&trade_legality(), &env), EnumValue::Text("FAIL".into()));
    }

    #[test]
    fn test_fill_amounts_full_formula() {
        let c_prorate = |c_start: &str| {
            format!(
                "LET(_xlpm.d_start,{c_start},_xlpm.n_days,{},_xlpm.d_end,{},\
                 IF(_xlpm.n_days<=0,1,MIN(1,MAX(0,(_xlpm.d_end-_xlpm.d_start)/_xlpm.n_days))))",
                sysv_key("days_in_season", "MetaBaseYear"),
                sysv_key("season_end_at", "MetaBaseYear"),
            )
        };
        let c_event = "IF(FillEventDate=\"\",MetaAsOfDate,FillEventDate)";
        assert_eq!(
            fill12_amount(0).render(),
            format!(
                "ScnFill12Count0*SWITCH(FillTo12MinType,\"ROOKIE\",ScnRookieMin0,\
                 \"VET\",ScnVetMin0,ScnRookieMin0)*{}",
                c_prorate(c_event)
            )
        );
        assert_eq!(
            fill14_amount(0).render(),
            format!(
                "ScnFill14Count0*SWITCH(FillTo14MinType,\"ROOKIE\",ScnRookieMin0,\
                 \"VET\",ScnVetMin0,ScnRookieMin0)*{}",
                c_prorate(&format!("{c_event}+FillDelayDays"))
            )
        );
        assert_eq!(
            fill12_amount(2).render(),
            "ScnFill12Count2*SWITCH(FillTo12MinType,\"ROOKIE\",ScnRookieMin2,\
             \"VET\",ScnVetMin2,ScnRookieMin2)"
        );
        assert_eq!(
            fill14_amount(5).render(),
            "ScnFill14Count5*SWITCH(FillTo14MinType,\"ROOKIE\",ScnRookieMin5,\
             \"VET\",ScnVetMin5,ScnRookieMin5)"
        );
    }

    fn derive_stretch_env() -> DictEnv {
        // One player with 6M in each of three remaining seasons.
        derive_env(&[
            ("MetaBaseYear".into(), EnumValue::Num(2025.0)),
            ("_xlpm.picked".into(), EnumValue::Text("A".into())),
            ("_xlpm.amounts".into(), EnumValue::Num(0.0)),
            ("_xlpm.total".into(), EnumValue::Num(18_000_000.0)),
            ("_xlpm.yrs".into(), EnumValue::Num(3.0)),
        ])
    }

    #[test]
    fn test_stretch_charge_covers_exactly_the_span() {
        let env = derive_stretch_env();
        let n_per_year = 18_000_000.0 / 7.0;
        for off in [0, 3, 6] {
            let e = stretch_dead_money(year_at(off), "cap_amount");
            assert_close(eval(&e, &env).num(), n_per_year);
        }
        let e_past = stretch_dead_money(year_at(7), "cap_amount");
        assert_close(eval(&e_past, &env).num(), 0.0);
    }

    #[test]
    fn test_stretch_ignores_players_without_remaining_salary() {
        let mut env = derive_stretch_env();
        env.insert("_xlpm.yrs".into(), EnumValue::Num(0.0));
        let e = stretch_dead_money(year_at(0), "cap_amount");
        assert_close(eval(&e, &env).num(), 0.0);
    }

    #[test]
    fn test_mx_verdict_full_formula() {
        assert_eq!(
            mx_verdict(2).render(),
            "IF(OR(MxTeam1Code<>\"\",MxTeam2Code<>\"\"),\
             IF(AND(OR(MxTeam1Code=\"\",MxT1Works=\"Yes\"),OR(MxTeam2Code=\"\",MxT2Works=\"Yes\")),\
             \"Trade Works\",\"Trade Does Not Work\"),\"\")"
        );
    }

    #[test]
    fn test_mx_verdict_is_blank_without_teams() {
        let blank_text = || EnumValue::Text(String::new());
        let mut env = DictEnv::new();
        for n_team in 1..=4 {
            env.insert(mx_team_name(n_team, "Code"), blank_text());
            env.insert(mx_team_name(n_team, "Works"), blank_text());
        }
        let e = mx_verdict(4);
        assert_eq!(eval(&e, &env), blank_text());

        env.insert(mx_team_name(2, "Code"), EnumValue::Text("POR".into()));
        env.insert(mx_team_name(2, "Works"), EnumValue::Text("Yes".into()));
        assert_eq!(eval(&e, &env), EnumValue::Text("Trade Works".into()));
        env.insert(mx_team_name(2, "Works"), EnumValue::Text("No".into()));
        assert_eq!(
            eval(&e, &env),
            EnumValue::Text("Trade Does Not Work".into())
        );
    }

    #[test]
    fn test_cap_holds_and_dead_money_read_their_warehouse_tables() {
        let c_holds = |column: &str| {
            format!(
                "SUMIFS(tbl_cap_holds_warehouse[{column}],tbl_cap_holds_warehouse[team_code],\
                 SelectedTeam,tbl_cap_holds_warehouse[salary_year],MetaBaseYear+1)"
            )
        };
        assert_eq!(
            scenario_cap_holds(1).render(),
            format!(
                "SWITCH(SelectedMode,\"Cap\",{},\"Tax\",{},\"Apron\",{},{})",
                c_holds("cap_amount"),
                c_holds("tax_amount"),
                c_holds("apron_amount"),
                c_holds("cap_amount"),
            )
        );
        assert_eq!(
            warehouse_dead_money(EnumSalaryLayer::Tax, year_at(2)).render(),
            "SUMIFS(tbl_dead_money_warehouse[tax_value],tbl_dead_money_warehouse[team_code],\
             SelectedTeam,tbl_dead_money_warehouse[salary_year],MetaBaseYear+2)"
        );
        let c_dead = scenario_dead_money(0).render();
        for c_column in ["cap_value", "tax_value", "apron_value"] {
            assert!(c_dead.contains(&format!("tbl_dead_money_warehouse[{c_column}]")));
        }
    }

    #[test]
    fn test_layer_totals_do_not_recount_holds_or_dead_money() {
        for layer in EnumSalaryLayer::ALL {
            for off in 0..N_YEAR_OFFSETS {
                let c_formula = scenario_layer_total(layer, off).render();
                assert!(!c_formula.contains(TBL_CAP_HOLDS_WAREHOUSE));
                assert!(!c_formula.contains(TBL_DEAD_MONEY_WAREHOUSE));
            }
        }
        assert!(!filled_total(EnumSalaryLayer::Cap, 0).render().contains("CapHolds"));
    }
}
