//! Defined-name registry and the catalog of names formulas refer to.

use std::collections::{BTreeMap, BTreeSet};

use regex::Regex;
use rust_xlsxwriter::Workbook;
use tracing::debug;

use crate::error::CapbookError;
use crate::util::{derive_sheet_range_ref, quote_sheet_name};

////////////////////////////////////////////////////////////////////////////////
// #region Catalog

pub const META_VALIDATION_STATUS: &str = "MetaValidationStatus";
pub const META_REFRESHED_AT: &str = "MetaRefreshedAt";
pub const META_BASE_YEAR: &str = "MetaBaseYear";
pub const META_AS_OF_DATE: &str = "MetaAsOfDate";
pub const META_DATA_CONTRACT_VERSION: &str = "MetaDataContractVersion";

pub const SELECTED_TEAM: &str = "SelectedTeam";
pub const SELECTED_YEAR: &str = "SelectedYear";
pub const SELECTED_MODE: &str = "SelectedMode";

pub const TRADE_OUT_NAMES: &str = "TradeOutNames";
pub const TRADE_IN_NAMES: &str = "TradeInNames";
pub const WAIVED_NAMES: &str = "WaivedNames";
pub const STRETCH_NAMES: &str = "StretchNames";
pub const SIGN_NAMES: &str = "SignNames";
pub const SIGN_SALARIES: &str = "SignSalaries";
pub const FILL_TO_12_MIN_TYPE: &str = "FillTo12MinType";
pub const FILL_TO_14_MIN_TYPE: &str = "FillTo14MinType";
pub const FILL_EVENT_DATE: &str = "FillEventDate";
pub const FILL_DELAY_DAYS: &str = "FillDelayDays";

pub const TRADE_OUT_SALARY: &str = "TradeOutSalary";
pub const TRADE_IN_SALARY: &str = "TradeInSalary";
pub const TRADE_POST_APRON_TOTAL: &str = "TradePostApronTotal";
pub const TRADE_PAD: &str = "TradePad";
pub const TRADE_MAX_INCOMING: &str = "TradeMaxIncoming";
pub const TRADE_REMAINING: &str = "TradeRemaining";
pub const TRADE_LEGALITY: &str = "TradeLegality";

pub const MX_YEAR: &str = "MxYear";
pub const MX_PLAYING_START: &str = "MxPlayingStart";
pub const MX_TRADE_DATE: &str = "MxTradeDate";
pub const MX_SIGN_DELAY_LABEL: &str = "MxSignDelayLabel";
pub const MX_SIGN_DELAY_DAYS: &str = "MxSignDelayDays";
pub const MX_SIGN_DATE: &str = "MxSignDate";
pub const MX_DAYS_IN_SEASON: &str = "MxDaysInSeason";
pub const MX_OUT_DAYS: &str = "MxOutDays";
pub const MX_IN_DAYS: &str = "MxInDays";
pub const MX_TPE_ALLOWANCE: &str = "MxTpeAllowance";
pub const MX_FILL12_BASIS: &str = "MxFill12Basis";
pub const MX_FILL14_BASIS: &str = "MxFill14Basis";
pub const MX_VERDICT: &str = "MxVerdict";

/// Per-year scenario scalar materialized on CALC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EnumScnScalar {
    RosterCount,
    CapTotal,
    TaxTotal,
    ApronTotal,
    DeadMoney,
    CapHolds,
    Fill12Count,
    Fill14Count,
    Fill12Amount,
    Fill14Amount,
    FillAmount,
    CapTotalFilled,
    TaxTotalFilled,
    ApronTotalFilled,
    TaxPayment,
    RookieMin,
    VetMin,
}

impl EnumScnScalar {
    /// CALC column order.
    pub const ALL: [EnumScnScalar; 17] = [
        Self::RosterCount,
        Self::CapTotal,
        Self::TaxTotal,
        Self::ApronTotal,
        Self::DeadMoney,
        Self::CapHolds,
        Self::RookieMin,
        Self::VetMin,
        Self::Fill12Count,
        Self::Fill14Count,
        Self::Fill12Amount,
        Self::Fill14Amount,
        Self::FillAmount,
        Self::CapTotalFilled,
        Self::TaxTotalFilled,
        Self::ApronTotalFilled,
        Self::TaxPayment,
    ];

    /// Name stem without the `Scn` prefix and offset suffix.
    pub fn stem(self) -> &'static str {
        match self {
            Self::RosterCount => "RosterCount",
            Self::CapTotal => "CapTotal",
            Self::TaxTotal => "TaxTotal",
            Self::ApronTotal => "ApronTotal",
            Self::DeadMoney => "DeadMoney",
            Self::CapHolds => "CapHolds",
            Self::Fill12Count => "Fill12Count",
            Self::Fill14Count => "Fill14Count",
            Self::Fill12Amount => "Fill12Amount",
            Self::Fill14Amount => "Fill14Amount",
            Self::FillAmount => "FillAmount",
            Self::CapTotalFilled => "CapTotalFilled",
            Self::TaxTotalFilled => "TaxTotalFilled",
            Self::ApronTotalFilled => "ApronTotalFilled",
            Self::TaxPayment => "TaxPayment",
            Self::RookieMin => "RookieMin",
            Self::VetMin => "VetMin",
        }
    }

    /// Defined name for year offset `off` (`ScnCapTotal3`).
    pub fn name(self, off: usize) -> String {
        format!("Scn{}{off}", self.stem())
    }

    /// Whether the scalar is a count rather than an amount.
    pub fn is_count(self) -> bool {
        matches!(
            self,
            Self::RosterCount | Self::Fill12Count | Self::Fill14Count
        )
    }
}

/// Worksheet-scoped MATRIX per-team name (`MxTeam2Code`, `MxT2OutNames`).
pub fn mx_team_name(n_team: usize, stem: &str) -> String {
    match stem {
        "Code" | "Mode" => format!("MxTeam{n_team}{stem}"),
        _ => format!("MxT{n_team}{stem}"),
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Registry

const C_RE_NAME_SYNTAX: &str = r"^[A-Za-z_\\][A-Za-z0-9_.]*$";
const C_RE_CELL_LIKE: &str = r"^(?i:[A-Z]{1,3}[0-9]+|R[0-9]*C[0-9]*|R|C)$";

/// Scope of a defined name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EnumNameScope {
    Workbook,
    /// Local to the named worksheet.
    Worksheet(String),
}

impl EnumNameScope {
    fn label(&self) -> String {
        match self {
            Self::Workbook => "workbook".to_string(),
            Self::Worksheet(sheet) => format!("worksheet {sheet}"),
        }
    }
}

/// One declared name and the rectangle it points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecDefinedName {
    pub name: String,
    pub scope: EnumNameScope,
    pub sheet_name: String,
    pub first_row: usize,
    pub first_col: usize,
    pub last_row: usize,
    pub last_col: usize,
}

impl SpecDefinedName {
    /// Target formula (`=PLAYGROUND!$B$2`).
    pub fn refers_to(&self) -> String {
        format!(
            "={}",
            derive_sheet_range_ref(
                &self.sheet_name,
                self.first_row,
                self.first_col,
                self.last_row,
                self.last_col
            )
        )
    }

    /// Name as passed to the writer (`MATRIX!MxYear` for local names).
    pub fn qualified_name(&self) -> String {
        match &self.scope {
            EnumNameScope::Workbook => self.name.clone(),
            EnumNameScope::Worksheet(sheet) => format!("{}!{}", quote_sheet_name(sheet), self.name),
        }
    }

    /// Whether the target is a single cell.
    pub fn is_single_cell(&self) -> bool {
        self.first_row == self.last_row && self.first_col == self.last_col
    }
}

/// Registry of every defined name, checked on declaration and on publication.
#[derive(Debug, Clone, Default)]
pub struct NameRegistry {
    l_names: Vec<SpecDefinedName>,
    dict_index: BTreeMap<(EnumNameScope, String), usize>,
}

impl NameRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a workbook-scoped single-cell name.
    pub fn declare_cell(
        &mut self,
        name: &str,
        sheet_name: &str,
        row: usize,
        col: usize,
    ) -> Result<(), CapbookError> {
        self.declare(name, EnumNameScope::Workbook, sheet_name, (row, col), (row, col))
    }

    /// Declare a workbook-scoped range name.
    pub fn declare_range(
        &mut self,
        name: &str,
        sheet_name: &str,
        first: (usize, usize),
        last: (usize, usize),
    ) -> Result<(), CapbookError> {
        self.declare(name, EnumNameScope::Workbook, sheet_name, first, last)
    }

    /// Declare a name local to `sheet_name`, pointing into the same sheet.
    pub fn declare_local(
        &mut self,
        name: &str,
        sheet_name: &str,
        first: (usize, usize),
        last: (usize, usize),
    ) -> Result<(), CapbookError> {
        self.declare(
            name,
            EnumNameScope::Worksheet(sheet_name.to_string()),
            sheet_name,
            first,
            last,
        )
    }

    /// Declare a name with explicit scope.
    pub fn declare(
        &mut self,
        name: &str,
        scope: EnumNameScope,
        sheet_name: &str,
        first: (usize, usize),
        last: (usize, usize),
    ) -> Result<(), CapbookError> {
        validate_name_syntax(name)?;
        if sheet_name.contains('#') || name.contains('#') {
            return Err(CapbookError::InvalidReference {
                name: name.to_string(),
                message: "spill operator `#` is not allowed in defined names".to_string(),
            });
        }
        if first.0 > last.0 || first.1 > last.1 {
            return Err(CapbookError::InvalidReference {
                name: name.to_string(),
                message: format!("inverted rectangle {first:?}..{last:?}"),
            });
        }

        let key = (scope.clone(), name.to_ascii_lowercase());
        if self.dict_index.contains_key(&key) {
            return Err(CapbookError::DuplicateName {
                name: name.to_string(),
                scope: scope.label(),
            });
        }
        self.dict_index.insert(key, self.l_names.len());
        self.l_names.push(SpecDefinedName {
            name: name.to_string(),
            scope,
            sheet_name: sheet_name.to_string(),
            first_row: first.0,
            first_col: first.1,
            last_row: last.0,
            last_col: last.1,
        });
        Ok(())
    }

    /// Workbook-scoped lookup.
    pub fn get(&self, name: &str) -> Option<&SpecDefinedName> {
        self.get_scoped(&EnumNameScope::Workbook, name)
    }

    /// Scoped lookup.
    pub fn get_scoped(&self, scope: &EnumNameScope, name: &str) -> Option<&SpecDefinedName> {
        self.dict_index
            .get(&(scope.clone(), name.to_ascii_lowercase()))
            .map(|n_idx| &self.l_names[*n_idx])
    }

    /// Every declared name in declaration order.
    pub fn names(&self) -> &[SpecDefinedName] {
        &self.l_names
    }

    /// Names resolvable from formulas on `sheet_name` (workbook plus local).
    pub fn visible_from(&self, sheet_name: &str) -> BTreeSet<String> {
        self.l_names
            .iter()
            .filter(|item| match &item.scope {
                EnumNameScope::Workbook => true,
                EnumNameScope::Worksheet(sheet) => sheet == sheet_name,
            })
            .map(|item| item.name.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.l_names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.l_names.is_empty()
    }

    /// Every target sheet and every local scope must exist.
    pub fn validate_targets(&self, set_sheet_names: &BTreeSet<String>) -> Result<(), CapbookError> {
        for item in &self.l_names {
            if !set_sheet_names.contains(&item.sheet_name) {
                return Err(CapbookError::InvalidReference {
                    name: item.name.clone(),
                    message: format!("target sheet `{}` does not exist", item.sheet_name),
                });
            }
            if let EnumNameScope::Worksheet(sheet) = &item.scope
                && !set_sheet_names.contains(sheet)
            {
                return Err(CapbookError::InvalidReference {
                    name: item.name.clone(),
                    message: format!("scope sheet `{sheet}` does not exist"),
                });
            }
        }
        Ok(())
    }

    /// Publish every name to the workbook. Returns the number published.
    pub fn apply(
        &self,
        workbook: &mut Workbook,
        set_sheet_names: &BTreeSet<String>,
    ) -> Result<usize, CapbookError> {
        self.validate_targets(set_sheet_names)?;
        for item in &self.l_names {
            let c_refers_to = item.refers_to();
            debug!(name = %item.qualified_name(), refers_to = %c_refers_to, "define name");
            workbook
                .define_name(item.qualified_name(), &c_refers_to)
                .map_err(|err| {
                    CapbookError::from_xlsx(format!("define name `{}`", item.name), err)
                })?;
        }
        Ok(self.l_names.len())
    }
}

/// Reject names Excel would misread or refuse.
pub fn validate_name_syntax(name: &str) -> Result<(), CapbookError> {
    let derive_regex = |pattern: &str| {
        Regex::new(pattern).map_err(|err| CapbookError::InvalidReference {
            name: name.to_string(),
            message: format!("invalid name pattern {pattern:?}: {err}"),
        })
    };
    let re_syntax = derive_regex(C_RE_NAME_SYNTAX)?;
    let re_cell_like = derive_regex(C_RE_CELL_LIKE)?;
    if !re_syntax.is_match(name) || re_cell_like.is_match(name) || name.len() > 255 {
        return Err(CapbookError::InvalidReference {
            name: name.to_string(),
            message: "not a valid defined-name identifier".to_string(),
        });
    }
    Ok(())
}

// #endregion
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_names_per_offset() {
        assert_eq!(EnumScnScalar::CapTotal.name(3), "ScnCapTotal3");
        assert_eq!(EnumScnScalar::Fill14Count.name(0), "ScnFill14Count0");
        let set_stems: BTreeSet<&str> = EnumScnScalar::ALL.iter().map(|s| s.stem()).collect();
        assert_eq!(set_stems.len(), 17);
    }

    #[test]
    fn test_matrix_team_names() {
        assert_eq!(mx_team_name(2, "Code"), "MxTeam2Code");
        assert_eq!(mx_team_name(4, "Mode"), "MxTeam4Mode");
        assert_eq!(mx_team_name(1, "AllowedInCap"), "MxT1AllowedInCap");
    }

    #[test]
    fn test_declare_and_refers_to() {
        let mut names = NameRegistry::new();
        names
            .declare_cell(SELECTED_TEAM, "PLAYGROUND", 1, 1)
            .expect("declare");
        names
            .declare_range(TRADE_OUT_NAMES, "PLAYGROUND", (4, 1), (9, 1))
            .expect("declare");
        names
            .declare_local(MX_YEAR, "MATRIX", (1, 1), (1, 1))
            .expect("declare");

        assert_eq!(names.get(SELECTED_TEAM).expect("name").refers_to(), "=PLAYGROUND!$B$2");
        assert_eq!(
            names.get(TRADE_OUT_NAMES).expect("name").refers_to(),
            "=PLAYGROUND!$B$5:$B$10"
        );
        assert!(names.get(MX_YEAR).is_none());
        let item = names
            .get_scoped(&EnumNameScope::Worksheet("MATRIX".to_string()), MX_YEAR)
            .expect("local");
        assert_eq!(item.qualified_name(), "MATRIX!MxYear");
        assert!(names.visible_from("MATRIX").contains(MX_YEAR));
        assert!(!names.visible_from("PLAYGROUND").contains(MX_YEAR));
    }

    #[test]
    fn test_duplicates_are_case_insensitive_per_scope() {
        let mut names = NameRegistry::new();
        names.declare_cell("SelectedTeam", "PLAYGROUND", 1, 1).expect("declare");
        let err = names
            .declare_cell("selectedteam", "PLAYGROUND", 2, 1)
            .expect_err("duplicate");
        assert!(matches!(err, CapbookError::DuplicateName { .. }));

        // Same name in a different scope is allowed.
        names
            .declare_local("SelectedTeam", "MATRIX", (0, 0), (0, 0))
            .expect("local scope");
    }

    #[test]
    fn test_syntax_rejections() {
        for c_bad in ["A1", "xfd100", "R1C1", "1abc", "has space", "Scn#", "r", ""] {
            assert!(validate_name_syntax(c_bad).is_err(), "{c_bad}");
        }
        for c_good in ["ScnCapTotal0", "_hidden", "Mx.Team", "ABCD1"] {
            assert!(validate_name_syntax(c_good).is_ok(), "{c_good}");
        }
    }

    #[test]
    fn test_validate_targets_rejects_unknown_sheet() {
        let mut names = NameRegistry::new();
        names.declare_cell(META_BASE_YEAR, "META", 3, 1).expect("declare");
        let set_sheets: BTreeSet<String> = ["PLAYGROUND".to_string()].into_iter().collect();
        let err = names.validate_targets(&set_sheets).expect_err("unknown sheet");
        assert!(matches!(err, CapbookError::InvalidReference { .. }));
    }
}
