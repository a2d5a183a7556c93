//! Capbook constants and default preset factories.

use std::collections::BTreeMap;

use crate::spec::SpecCellFormat;

////////////////////////////////////////////////////////////////////////////////
// #region ExcelLimits

/// Excel worksheet maximum row count.
pub const N_NROWS_EXCEL_MAX: usize = 1_048_576;
/// Excel worksheet maximum column count.
pub const N_NCOLS_EXCEL_MAX: usize = 16_384;
/// Excel sheet name maximum length.
pub const N_LEN_EXCEL_SHEET_NAME_MAX: usize = 31;
/// Characters not allowed in sheet names.
pub const TUP_EXCEL_ILLEGAL: [&str; 7] = ["*", ":", "?", "/", "\\", "[", "]"];
/// Excel limit on the joined text of a literal list validation.
pub const N_LEN_LIST_VALIDATION_MAX: usize = 255;

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Workbook

/// Data contract version stamped into META.
pub const C_DATA_CONTRACT_VERSION: &str = "capbook-data-v5";
/// Default league code.
pub const C_LEAGUE_DEFAULT: &str = "NBA";
/// Prefix rendered before every `LET`/`LAMBDA` bound variable.
pub const C_PARAM_PREFIX: &str = "_xlpm.";
/// Workbook default font family.
pub const C_FONT_NAME_DEFAULT: &str = "Calibri";
/// Workbook default font size.
pub const N_FONT_SIZE_DEFAULT: i64 = 11;

/// Visible single-team scenario sheet.
pub const C_SHEET_PLAYGROUND: &str = "PLAYGROUND";
/// Visible four-team trade sheet.
pub const C_SHEET_MATRIX: &str = "MATRIX";
/// Visible build-provenance sheet.
pub const C_SHEET_META: &str = "META";
/// Hidden scenario scalar grid.
pub const C_SHEET_CALC: &str = "CALC";
/// Prefix of every hidden data sheet.
pub const C_PREFIX_DATA_SHEET: &str = "DATA_";
/// Prefix of every embedded table name.
pub const C_PREFIX_TABLE: &str = "tbl_";

/// Number of contiguous salary years, base year included.
pub const N_YEAR_OFFSETS: usize = 6;

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Tables

pub const TBL_SYSTEM_VALUES: &str = "tbl_system_values";
pub const TBL_TAX_RATES: &str = "tbl_tax_rates";
pub const TBL_ROOKIE_SCALE: &str = "tbl_rookie_scale";
pub const TBL_MINIMUM_SCALE: &str = "tbl_minimum_scale";
pub const TBL_TEAM_SALARY_WAREHOUSE: &str = "tbl_team_salary_warehouse";
pub const TBL_SALARY_BOOK_WAREHOUSE: &str = "tbl_salary_book_warehouse";
pub const TBL_SALARY_BOOK_YEARLY: &str = "tbl_salary_book_yearly";
pub const TBL_CAP_HOLDS_WAREHOUSE: &str = "tbl_cap_holds_warehouse";
pub const TBL_DEAD_MONEY_WAREHOUSE: &str = "tbl_dead_money_warehouse";
pub const TBL_EXCEPTIONS_WAREHOUSE: &str = "tbl_exceptions_warehouse";
pub const TBL_DRAFT_PICKS_WAREHOUSE: &str = "tbl_draft_picks_warehouse";

/// Status code of an approved exception record.
pub const C_EXCEPTION_STATUS_APPROVED: &str = "APPR";

/// Per-year option codes of `tbl_salary_book_warehouse.option_y*`.
pub const C_OPTION_TEAM: &str = "TEAM";
pub const C_OPTION_PLAYER: &str = "PLYR";
pub const C_OPTION_EARLY_TERMINATION: &str = "ETO";

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Layout

/// Rows reserved for the PLAYGROUND roster spill.
pub const N_ROSTER_ROWS_RESERVED: usize = 40;
/// Rows reserved for the PLAYGROUND exceptions spill.
pub const N_EXCEPTION_ROWS_RESERVED: usize = 10;
/// Per-entry character budget of the META error list.
pub const N_ERROR_ENTRY_BUDGET: usize = 200;

pub const N_TRADE_OUT_ROWS: usize = 6;
pub const N_TRADE_IN_ROWS: usize = 6;
pub const N_WAIVE_ROWS: usize = 4;
pub const N_STRETCH_ROWS: usize = 4;
pub const N_SIGN_ROWS: usize = 4;

/// Teams in the MATRIX sheet.
pub const N_MATRIX_TEAMS: usize = 4;
/// Name rows per MATRIX team lane (outgoing and incoming each).
pub const N_MATRIX_NAME_ROWS: usize = 11;

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region LeagueRules

/// Flat cushion added to expanded matching.
pub const N_TRADE_PAD_AMOUNT: f64 = 250_000.0;
/// Fill target of the first tranche.
pub const N_FILL_TARGET_LOW: i64 = 12;
/// Fill target of the second tranche.
pub const N_FILL_TARGET_HIGH: i64 = 14;
/// Years of service priced by the ROOKIE fill basis.
pub const N_YOS_ROOKIE: i64 = 0;
/// Years of service priced by the VET fill basis.
pub const N_YOS_VET: i64 = 2;
/// Tolerance for bucket-sum checks.
pub const N_BUCKET_SUM_TOLERANCE: f64 = 0.5;

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Styles

/// Canonical style preset keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EnumStyleKey {
    Text,
    Integer,
    Money,
    MoneyMillions,
    Percent,
    Date,
    Title,
    Banner,
    Muted,
    SectionLabel,
    HeaderLeft,
    HeaderRight,
    HeaderCenter,
    KpiLabel,
    KpiValue,
    KpiMoney,
    KpiDelta,
    Input,
    InputMoney,
    InputDate,
    InputInteger,
    InputPercent,
    StatusOut,
    StatusIn,
    StatusSign,
    StatusWaived,
    OptionPlayer,
    OptionTeam,
    OptionEarlyTermination,
    GuaranteeFull,
    GuaranteePartial,
    GuaranteeNone,
    TradeRestricted,
    TradeBonus,
    TwoWayPill,
    TwoWayPillIn,
    TwoWayPillRestricted,
    RoomPositive,
    RoomNegative,
    VerdictYes,
    VerdictNo,
}

impl EnumStyleKey {
    /// Every key, in declaration order.
    pub const ALL: [EnumStyleKey; 41] = [
        Self::Text,
        Self::Integer,
        Self::Money,
        Self::MoneyMillions,
        Self::Percent,
        Self::Date,
        Self::Title,
        Self::Banner,
        Self::Muted,
        Self::SectionLabel,
        Self::HeaderLeft,
        Self::HeaderRight,
        Self::HeaderCenter,
        Self::KpiLabel,
        Self::KpiValue,
        Self::KpiMoney,
        Self::KpiDelta,
        Self::Input,
        Self::InputMoney,
        Self::InputDate,
        Self::InputInteger,
        Self::InputPercent,
        Self::StatusOut,
        Self::StatusIn,
        Self::StatusSign,
        Self::StatusWaived,
        Self::OptionPlayer,
        Self::OptionTeam,
        Self::OptionEarlyTermination,
        Self::GuaranteeFull,
        Self::GuaranteePartial,
        Self::GuaranteeNone,
        Self::TradeRestricted,
        Self::TradeBonus,
        Self::TwoWayPill,
        Self::TwoWayPillIn,
        Self::TwoWayPillRestricted,
        Self::RoomPositive,
        Self::RoomNegative,
        Self::VerdictYes,
        Self::VerdictNo,
    ];
}

pub const C_NUM_FORMAT_MONEY: &str = "#,##0";
pub const C_NUM_FORMAT_MONEY_MILLIONS: &str = "[>=1000000]0.0,,\"M\";[<=-1000000]-0.0,,\"M\";#,##0";
pub const C_NUM_FORMAT_PERCENT: &str = "0.0%";
pub const C_NUM_FORMAT_DATE: &str = "yyyy-mm-dd";
pub const C_NUM_FORMAT_DELTA: &str = "[Color10]+#,##0;[Red]-#,##0;0";
pub const C_NUM_FORMAT_TWO_WAY: &str = "\"Two-Way\"";

const C_COLOR_INPUT_FILL: &str = "#FFF2CC";
const C_COLOR_HEADER_FILL: &str = "#1F3864";
const C_COLOR_SECTION_FILL: &str = "#D9E1F2";
const C_COLOR_MUTED: &str = "#808080";
const C_COLOR_GREEN: &str = "#006100";
const C_COLOR_GREEN_FILL: &str = "#C6EFCE";
const C_COLOR_RED: &str = "#9C0006";
const C_COLOR_RED_FILL: &str = "#FFC7CE";
const C_COLOR_AMBER_FILL: &str = "#FFEB9C";
const C_COLOR_ORANGE_FILL: &str = "#FCD5B4";
const C_COLOR_BLUE_FILL: &str = "#DDEBF7";
const C_COLOR_PURPLE: &str = "#7030A0";
const C_COLOR_PURPLE_FILL: &str = "#E4DFEC";
const C_COLOR_GRAY_FILL: &str = "#E7E6E6";

/// Build the default style presets used by [`crate::style::StyleRegistry`].
///
/// Every preset is an overlay of the workbook base font, so the registry
/// stays consistent when the default font changes.
pub fn derive_default_style_presets() -> BTreeMap<EnumStyleKey, SpecCellFormat> {
    let cfg_base_fmt_spec = SpecCellFormat {
        font_name: Some(C_FONT_NAME_DEFAULT.to_string()),
        font_size: Some(N_FONT_SIZE_DEFAULT),
        valign: Some("vcenter".to_string()),
        ..Default::default()
    };
    let cfg_money = cfg_base_fmt_spec.with_(SpecCellFormat {
        num_format: Some(C_NUM_FORMAT_MONEY.to_string()),
        align: Some("right".to_string()),
        ..Default::default()
    });
    let cfg_input = cfg_base_fmt_spec.with_(SpecCellFormat {
        bg_color: Some(C_COLOR_INPUT_FILL.to_string()),
        unlocked: Some(true),
        border: Some(1),
        ..Default::default()
    });
    let cfg_header = cfg_base_fmt_spec.with_(SpecCellFormat {
        bold: Some(true),
        font_color: Some("#FFFFFF".to_string()),
        bg_color: Some(C_COLOR_HEADER_FILL.to_string()),
        ..Default::default()
    });
    let cfg_kpi = cfg_base_fmt_spec.with_(SpecCellFormat {
        bold: Some(true),
        font_size: Some(12),
        ..Default::default()
    });
    let derive_fill = |bg: &str| SpecCellFormat {
        bg_color: Some(bg.to_string()),
        ..Default::default()
    };
    let derive_pill = |bg: &str, font: &str| SpecCellFormat {
        bg_color: Some(bg.to_string()),
        font_color: Some(font.to_string()),
        num_format: Some(C_NUM_FORMAT_TWO_WAY.to_string()),
        align: Some("center".to_string()),
        ..Default::default()
    };

    let mut dict_fmt = BTreeMap::new();
    dict_fmt.insert(EnumStyleKey::Text, cfg_base_fmt_spec.clone());
    dict_fmt.insert(
        EnumStyleKey::Integer,
        cfg_base_fmt_spec.with_(SpecCellFormat {
            num_format: Some("0".to_string()),
            ..Default::default()
        }),
    );
    dict_fmt.insert(EnumStyleKey::Money, cfg_money.clone());
    dict_fmt.insert(
        EnumStyleKey::MoneyMillions,
        cfg_money.with_(SpecCellFormat {
            num_format: Some(C_NUM_FORMAT_MONEY_MILLIONS.to_string()),
            ..Default::default()
        }),
    );
    dict_fmt.insert(
        EnumStyleKey::Percent,
        cfg_base_fmt_spec.with_(SpecCellFormat {
            num_format: Some(C_NUM_FORMAT_PERCENT.to_string()),
            align: Some("right".to_string()),
            ..Default::default()
        }),
    );
    dict_fmt.insert(
        EnumStyleKey::Date,
        cfg_base_fmt_spec.with_(SpecCellFormat {
            num_format: Some(C_NUM_FORMAT_DATE.to_string()),
            ..Default::default()
        }),
    );
    dict_fmt.insert(
        EnumStyleKey::Title,
        cfg_base_fmt_spec.with_(SpecCellFormat {
            bold: Some(true),
            font_size: Some(14),
            ..Default::default()
        }),
    );
    dict_fmt.insert(
        EnumStyleKey::Banner,
        cfg_base_fmt_spec.with_(SpecCellFormat {
            bold: Some(true),
            font_color: Some(C_COLOR_RED.to_string()),
            bg_color: Some(C_COLOR_RED_FILL.to_string()),
            ..Default::default()
        }),
    );
    dict_fmt.insert(
        EnumStyleKey::Muted,
        cfg_base_fmt_spec.with_(SpecCellFormat {
            italic: Some(true),
            font_color: Some(C_COLOR_MUTED.to_string()),
            ..Default::default()
        }),
    );
    dict_fmt.insert(
        EnumStyleKey::SectionLabel,
        cfg_base_fmt_spec.with_(SpecCellFormat {
            bold: Some(true),
            bg_color: Some(C_COLOR_SECTION_FILL.to_string()),
            bottom: Some(1),
            ..Default::default()
        }),
    );
    dict_fmt.insert(
        EnumStyleKey::HeaderLeft,
        cfg_header.with_(SpecCellFormat {
            align: Some("left".to_string()),
            ..Default::default()
        }),
    );
    dict_fmt.insert(
        EnumStyleKey::HeaderRight,
        cfg_header.with_(SpecCellFormat {
            align: Some("right".to_string()),
            ..Default::default()
        }),
    );
    dict_fmt.insert(
        EnumStyleKey::HeaderCenter,
        cfg_header.with_(SpecCellFormat {
            align: Some("center".to_string()),
            ..Default::default()
        }),
    );
    dict_fmt.insert(
        EnumStyleKey::KpiLabel,
        cfg_base_fmt_spec.with_(SpecCellFormat {
            font_color: Some(C_COLOR_MUTED.to_string()),
            align: Some("right".to_string()),
            ..Default::default()
        }),
    );
    dict_fmt.insert(EnumStyleKey::KpiValue, cfg_kpi.clone());
    dict_fmt.insert(
        EnumStyleKey::KpiMoney,
        cfg_kpi.with_(SpecCellFormat {
            num_format: Some(C_NUM_FORMAT_MONEY_MILLIONS.to_string()),
            ..Default::default()
        }),
    );
    dict_fmt.insert(
        EnumStyleKey::KpiDelta,
        cfg_kpi.with_(SpecCellFormat {
            num_format: Some(C_NUM_FORMAT_DELTA.to_string()),
            ..Default::default()
        }),
    );
    dict_fmt.insert(EnumStyleKey::Input, cfg_input.clone());
    dict_fmt.insert(
        EnumStyleKey::InputMoney,
        cfg_input.with_(SpecCellFormat {
            num_format: Some(C_NUM_FORMAT_MONEY.to_string()),
            ..Default::default()
        }),
    );
    dict_fmt.insert(
        EnumStyleKey::InputDate,
        cfg_input.with_(SpecCellFormat {
            num_format: Some(C_NUM_FORMAT_DATE.to_string()),
            ..Default::default()
        }),
    );
    dict_fmt.insert(
        EnumStyleKey::InputInteger,
        cfg_input.with_(SpecCellFormat {
            num_format: Some("0".to_string()),
            ..Default::default()
        }),
    );
    dict_fmt.insert(
        EnumStyleKey::InputPercent,
        cfg_input.with_(SpecCellFormat {
            num_format: Some(C_NUM_FORMAT_PERCENT.to_string()),
            ..Default::default()
        }),
    );

    // Conditional overlays carry only the properties they change.
    let cfg_struck = SpecCellFormat {
        font_color: Some(C_COLOR_MUTED.to_string()),
        strikethrough: Some(true),
        ..Default::default()
    };
    dict_fmt.insert(EnumStyleKey::StatusOut, cfg_struck.clone());
    dict_fmt.insert(EnumStyleKey::StatusWaived, cfg_struck);
    dict_fmt.insert(
        EnumStyleKey::StatusIn,
        SpecCellFormat {
            bold: Some(true),
            font_color: Some(C_COLOR_PURPLE.to_string()),
            ..Default::default()
        },
    );
    dict_fmt.insert(
        EnumStyleKey::StatusSign,
        SpecCellFormat {
            bold: Some(true),
            font_color: Some(C_COLOR_GREEN.to_string()),
            ..Default::default()
        },
    );
    dict_fmt.insert(EnumStyleKey::OptionPlayer, derive_fill(C_COLOR_BLUE_FILL));
    dict_fmt.insert(EnumStyleKey::OptionTeam, derive_fill(C_COLOR_PURPLE_FILL));
    dict_fmt.insert(
        EnumStyleKey::OptionEarlyTermination,
        derive_fill(C_COLOR_ORANGE_FILL),
    );
    dict_fmt.insert(
        EnumStyleKey::GuaranteeFull,
        SpecCellFormat {
            font_color: Some(C_COLOR_GREEN.to_string()),
            ..Default::default()
        },
    );
    dict_fmt.insert(EnumStyleKey::GuaranteePartial, derive_fill(C_COLOR_AMBER_FILL));
    dict_fmt.insert(EnumStyleKey::GuaranteeNone, derive_fill(C_COLOR_RED_FILL));
    dict_fmt.insert(EnumStyleKey::TradeRestricted, derive_fill(C_COLOR_RED_FILL));
    dict_fmt.insert(EnumStyleKey::TradeBonus, derive_fill(C_COLOR_ORANGE_FILL));
    dict_fmt.insert(
        EnumStyleKey::TwoWayPill,
        derive_pill(C_COLOR_GRAY_FILL, "#404040"),
    );
    dict_fmt.insert(
        EnumStyleKey::TwoWayPillIn,
        derive_pill(C_COLOR_PURPLE_FILL, C_COLOR_PURPLE),
    );
    dict_fmt.insert(
        EnumStyleKey::TwoWayPillRestricted,
        derive_pill(C_COLOR_RED_FILL, C_COLOR_RED),
    );
    dict_fmt.insert(
        EnumStyleKey::RoomPositive,
        SpecCellFormat {
            font_color: Some(C_COLOR_GREEN.to_string()),
            bg_color: Some(C_COLOR_GREEN_FILL.to_string()),
            ..Default::default()
        },
    );
    dict_fmt.insert(
        EnumStyleKey::RoomNegative,
        SpecCellFormat {
            font_color: Some(C_COLOR_RED.to_string()),
            bg_color: Some(C_COLOR_RED_FILL.to_string()),
            ..Default::default()
        },
    );
    dict_fmt.insert(
        EnumStyleKey::VerdictYes,
        SpecCellFormat {
            bold: Some(true),
            font_color: Some(C_COLOR_GREEN.to_string()),
            bg_color: Some(C_COLOR_GREEN_FILL.to_string()),
            ..Default::default()
        },
    );
    dict_fmt.insert(
        EnumStyleKey::VerdictNo,
        SpecCellFormat {
            bold: Some(true),
            font_color: Some(C_COLOR_RED.to_string()),
            bg_color: Some(C_COLOR_RED_FILL.to_string()),
            ..Default::default()
        },
    );

    dict_fmt
}

// #endregion
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_style_key_has_a_preset() {
        let dict_fmt = derive_default_style_presets();
        for key in EnumStyleKey::ALL {
            assert!(dict_fmt.contains_key(&key), "missing preset for {key:?}");
        }
        assert_eq!(dict_fmt.len(), EnumStyleKey::ALL.len());
    }

    #[test]
    fn test_input_presets_are_unlocked_and_filled() {
        let dict_fmt = derive_default_style_presets();
        for key in [
            EnumStyleKey::Input,
            EnumStyleKey::InputMoney,
            EnumStyleKey::InputDate,
            EnumStyleKey::InputInteger,
            EnumStyleKey::InputPercent,
        ] {
            let fmt = &dict_fmt[&key];
            assert_eq!(fmt.unlocked, Some(true));
            assert_eq!(fmt.bg_color.as_deref(), Some(C_COLOR_INPUT_FILL));
        }
    }

    #[test]
    fn test_two_way_pills_share_display_text() {
        let dict_fmt = derive_default_style_presets();
        for key in [
            EnumStyleKey::TwoWayPill,
            EnumStyleKey::TwoWayPillIn,
            EnumStyleKey::TwoWayPillRestricted,
        ] {
            assert_eq!(
                dict_fmt[&key].num_format.as_deref(),
                Some(C_NUM_FORMAT_TWO_WAY)
            );
        }
    }
}
