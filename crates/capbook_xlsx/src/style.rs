//! Style registry: the closed set of formats every sheet draws from.

use std::collections::BTreeMap;

use rust_xlsxwriter::{Format, FormatAlign, FormatBorder};

use crate::conf::{EnumStyleKey, derive_default_style_presets};
use crate::spec::SpecCellFormat;

/// Immutable map from style key to a realized writer format.
///
/// Presets are overlaid on the workbook base format once, at construction;
/// sheets only borrow from the registry afterwards.
#[derive(Debug, Clone)]
pub struct StyleRegistry {
    fmt_base: SpecCellFormat,
    dict_spec: BTreeMap<EnumStyleKey, SpecCellFormat>,
    dict_fmt: BTreeMap<EnumStyleKey, Format>,
}

impl StyleRegistry {
    /// Registry over the default presets.
    pub fn new() -> Self {
        Self::from_presets(derive_default_style_presets())
    }

    /// Registry over explicit presets.
    pub fn from_presets(dict_spec: BTreeMap<EnumStyleKey, SpecCellFormat>) -> Self {
        let fmt_base = dict_spec
            .get(&EnumStyleKey::Text)
            .cloned()
            .unwrap_or_default();
        let dict_fmt = dict_spec
            .iter()
            .map(|(key, spec)| (*key, derive_rust_xlsx_format(spec)))
            .collect();
        Self {
            fmt_base,
            dict_spec,
            dict_fmt,
        }
    }

    /// Realized format for `key`; unknown keys fall back to the base text format.
    pub fn get(&self, key: EnumStyleKey) -> Format {
        self.dict_fmt
            .get(&key)
            .cloned()
            .unwrap_or_else(|| derive_rust_xlsx_format(&self.fmt_base))
    }

    /// Preset specification for `key`.
    pub fn spec(&self, key: EnumStyleKey) -> Option<&SpecCellFormat> {
        self.dict_spec.get(&key)
    }

    /// Base font name and size.
    pub fn base_font(&self) -> (Option<&str>, Option<i64>) {
        (self.fmt_base.font_name.as_deref(), self.fmt_base.font_size)
    }

    /// Number of registered styles.
    pub fn len(&self) -> usize {
        self.dict_fmt.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dict_fmt.is_empty()
    }
}

impl Default for StyleRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Realize a format specification as a writer format.
pub fn derive_rust_xlsx_format(spec: &SpecCellFormat) -> Format {
    let mut format = Format::new();

    if let Some(val) = &spec.font_name {
        format = format.set_font_name(val.clone());
    }
    if let Some(val) = spec.font_size {
        format = format.set_font_size(val as f64);
    }
    if spec.bold.unwrap_or(false) {
        format = format.set_bold();
    }
    if spec.italic.unwrap_or(false) {
        format = format.set_italic();
    }
    if spec.strikethrough.unwrap_or(false) {
        format = format.set_font_strikethrough();
    }

    if let Some(val) = &spec.align
        && let Some(align) = derive_format_align(val)
    {
        format = format.set_align(align);
    }
    if let Some(val) = &spec.valign
        && let Some(align) = derive_format_align(val)
    {
        format = format.set_align(align);
    }

    if let Some(val) = &spec.num_format {
        format = format.set_num_format(val.clone());
    }
    if let Some(val) = &spec.bg_color {
        format = format.set_background_color(val.as_str());
    }
    if let Some(val) = &spec.font_color {
        format = format.set_font_color(val.as_str());
    }

    if let Some(val) = spec.border {
        format = format.set_border(derive_format_border(val));
    }
    if let Some(val) = spec.top {
        format = format.set_border_top(derive_format_border(val));
    }
    if let Some(val) = spec.bottom {
        format = format.set_border_bottom(derive_format_border(val));
    }

    if spec.text_wrap.unwrap_or(false) {
        format = format.set_text_wrap();
    }
    if spec.unlocked.unwrap_or(false) {
        format = format.set_unlocked();
    }

    format
}

fn derive_format_border(border: i64) -> FormatBorder {
    match border {
        1 => FormatBorder::Thin,
        2 => FormatBorder::Medium,
        3 => FormatBorder::Dashed,
        4 => FormatBorder::Dotted,
        5 => FormatBorder::Thick,
        6 => FormatBorder::Double,
        7 => FormatBorder::Hair,
        _ => FormatBorder::None,
    }
}

fn derive_format_align(align: &str) -> Option<FormatAlign> {
    let value = align.trim().to_ascii_lowercase();
    match value.as_str() {
        "general" => Some(FormatAlign::General),
        "left" => Some(FormatAlign::Left),
        "center" => Some(FormatAlign::Center),
        "right" => Some(FormatAlign::Right),
        "center_across" => Some(FormatAlign::CenterAcross),
        "top" => Some(FormatAlign::Top),
        "bottom" => Some(FormatAlign::Bottom),
        "vcenter" | "vertical_center" => Some(FormatAlign::VerticalCenter),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conf::{C_FONT_NAME_DEFAULT, N_FONT_SIZE_DEFAULT};

    #[test]
    fn test_registry_covers_every_key() {
        let styles = StyleRegistry::new();
        assert_eq!(styles.len(), EnumStyleKey::ALL.len());
        assert_eq!(
            styles.base_font(),
            (Some(C_FONT_NAME_DEFAULT), Some(N_FONT_SIZE_DEFAULT))
        );
    }

    #[test]
    fn test_status_out_is_struck_through() {
        let styles = StyleRegistry::new();
        let spec = styles.spec(EnumStyleKey::StatusOut).expect("preset");
        assert_eq!(spec.strikethrough, Some(true));
        let spec = styles.spec(EnumStyleKey::StatusSign).expect("preset");
        assert_eq!(spec.bold, Some(true));
    }

    #[test]
    fn test_format_realization_is_deterministic() {
        let spec = SpecCellFormat {
            bold: Some(true),
            num_format: Some("#,##0".to_string()),
            unlocked: Some(true),
            ..Default::default()
        };
        assert_eq!(derive_rust_xlsx_format(&spec), derive_rust_xlsx_format(&spec));
        assert_ne!(
            derive_rust_xlsx_format(&spec),
            derive_rust_xlsx_format(&SpecCellFormat::default())
        );
    }

    #[test]
    fn test_unknown_alignment_is_ignored() {
        assert_eq!(derive_format_align("sideways"), None);
        assert_eq!(derive_format_align(" Right "), Some(FormatAlign::Right));
    }
}
