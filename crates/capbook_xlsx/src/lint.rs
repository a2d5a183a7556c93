//! Read-only formula hygiene check over a generated workbook.
//!
//! Two rules: every `LET`/`LAMBDA` binding carries the `_xlpm.` prefix, and
//! no stored formula or defined name uses the `#` spill postfix.

use std::collections::BTreeMap;
use std::fmt;
use std::fs::File;
use std::io::{self, Read, Seek};
use std::path::Path;

use roxmltree::{Document, Node};
use tracing::{debug, warn};
use zip::ZipArchive;

use crate::conf::C_PARAM_PREFIX;
use crate::error::CapbookError;

const C_PART_WORKBOOK: &str = "xl/workbook.xml";
const C_PART_WORKBOOK_RELS: &str = "xl/_rels/workbook.xml.rels";
const C_NS_RELATIONSHIPS: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const TUP_FUNCTION_PREFIXES: [&str; 2] = ["_xlfn.", "_xlws."];

////////////////////////////////////////////////////////////////////////////////
// #region Report

/// One hygiene violation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecLintViolation {
    /// `SHEET!A1`, `SHEET!cf(A1:B2)`, or `name Foo`.
    pub location: String,
    pub message: String,
}

impl SpecLintViolation {
    pub fn into_error(self) -> CapbookError {
        CapbookError::FormulaHygieneViolation {
            location: self.location,
            message: self.message,
        }
    }
}

impl fmt::Display for SpecLintViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.location, self.message)
    }
}

/// Counters and violations of one lint run.
#[derive(Debug, Default, Clone)]
pub struct ReportLint {
    pub cnt_sheets_read: u64,
    pub cnt_formulas_checked: u64,
    pub cnt_names_checked: u64,
    pub violations: Vec<SpecLintViolation>,
}

impl ReportLint {
    pub fn is_clean(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn format(&self, prefix: &str) -> String {
        format!(
            "{prefix} sheets={} formulas={} names={} violations={}",
            self.cnt_sheets_read,
            self.cnt_formulas_checked,
            self.cnt_names_checked,
            self.violations.len()
        )
    }

    fn check(&mut self, location: impl Into<String>, text: &str, if_name: bool) {
        let l_messages = if if_name {
            self.cnt_names_checked += 1;
            lint_defined_name(text)
        } else {
            self.cnt_formulas_checked += 1;
            lint_formula(text)
        };
        if l_messages.is_empty() {
            return;
        }
        let c_location = location.into();
        for message in l_messages {
            warn!(location = %c_location, %message, "formula hygiene violation");
            self.violations.push(SpecLintViolation {
                location: c_location.clone(),
                message,
            });
        }
    }
}

impl fmt::Display for ReportLint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format("[LINT]"))
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Formula scanning

/// Violations in one formula (leading `=` optional).
pub fn lint_formula(text: &str) -> Vec<String> {
    let l_chars: Vec<char> = text.chars().collect();
    let mut l_messages = Vec::new();
    for (c_func, l_args) in derive_binding_calls(&l_chars) {
        for c_var in derive_bound_names(&c_func, &l_args) {
            if !c_var.starts_with(C_PARAM_PREFIX) {
                l_messages.push(format!(
                    "{c_func} variable `{c_var}` lacks the `{C_PARAM_PREFIX}` prefix"
                ));
            }
        }
    }
    if let Some(n_pos) = find_spill_postfix(&l_chars) {
        l_messages.push(format!("spill operator `#` at offset {n_pos}"));
    }
    l_messages
}

/// Violations in a defined-name target. Any `#` outside literals counts.
pub fn lint_defined_name(target: &str) -> Vec<String> {
    let l_chars: Vec<char> = target.chars().collect();
    let mut l_messages: Vec<String> = lint_formula(target)
        .into_iter()
        .filter(|c| !c.starts_with("spill operator"))
        .collect();
    let mut n_idx = 0;
    while n_idx < l_chars.len() {
        match l_chars[n_idx] {
            '"' | '\'' | '[' => n_idx = skip_literal(&l_chars, n_idx),
            '#' => {
                l_messages.push(format!("spill operator `#` in defined name at offset {n_idx}"));
                break;
            }
            _ => n_idx += 1,
        }
    }
    l_messages
}

/// Index just past the literal opened at `start` (`"..."`, `'...'`, `[...]`).
fn skip_literal(l_chars: &[char], start: usize) -> usize {
    let chr_open = l_chars[start];
    if chr_open == '[' {
        let mut n_depth = 0usize;
        let mut n_idx = start;
        while n_idx < l_chars.len() {
            match l_chars[n_idx] {
                '[' => n_depth += 1,
                ']' => {
                    n_depth -= 1;
                    if n_depth == 0 {
                        return n_idx + 1;
                    }
                }
                _ => {}
            }
            n_idx += 1;
        }
        return l_chars.len();
    }
    let mut n_idx = start + 1;
    while n_idx < l_chars.len() {
        if l_chars[n_idx] == chr_open {
            // Doubled quote escapes itself.
            if l_chars.get(n_idx + 1) == Some(&chr_open) {
                n_idx += 2;
                continue;
            }
            return n_idx + 1;
        }
        n_idx += 1;
    }
    l_chars.len()
}

fn is_ident_char(chr: char) -> bool {
    chr.is_ascii_alphanumeric() || chr == '_' || chr == '.' || chr == '\\'
}

/// Every `LET(`/`LAMBDA(` call with its top-level arguments, nested calls
/// included.
fn derive_binding_calls(l_chars: &[char]) -> Vec<(String, Vec<String>)> {
    let mut l_calls = Vec::new();
    let mut n_idx = 0;
    while n_idx < l_chars.len() {
        let chr = l_chars[n_idx];
        if matches!(chr, '"' | '\'' | '[') {
            n_idx = skip_literal(l_chars, n_idx);
            continue;
        }
        if !is_ident_char(chr) {
            n_idx += 1;
            continue;
        }
        let n_start = n_idx;
        while n_idx < l_chars.len() && is_ident_char(l_chars[n_idx]) {
            n_idx += 1;
        }
        if l_chars.get(n_idx) != Some(&'(') {
            continue;
        }
        let c_ident: String = l_chars[n_start..n_idx].iter().collect();
        let mut c_func = c_ident.to_ascii_uppercase();
        for c_prefix in TUP_FUNCTION_PREFIXES {
            if let Some(c_rest) = c_func.strip_prefix(&c_prefix.to_ascii_uppercase()) {
                c_func = c_rest.to_string();
            }
        }
        if c_func == "LET" || c_func == "LAMBDA" {
            l_calls.push((c_func, derive_call_args(l_chars, n_idx)));
        }
        // Scanning continues inside the argument list for nested calls.
        n_idx += 1;
    }
    l_calls
}

/// Top-level arguments of the call whose `(` sits at `n_open`.
fn derive_call_args(l_chars: &[char], n_open: usize) -> Vec<String> {
    let mut l_args = Vec::new();
    let mut c_current = String::new();
    let mut n_depth = 0usize;
    let mut n_idx = n_open + 1;
    while n_idx < l_chars.len() {
        let chr = l_chars[n_idx];
        match chr {
            '"' | '\'' | '[' => {
                let n_end = skip_literal(l_chars, n_idx);
                c_current.extend(&l_chars[n_idx..n_end]);
                n_idx = n_end;
                continue;
            }
            '(' | '{' => n_depth += 1,
            ')' | '}' if n_depth == 0 => {
                l_args.push(c_current.trim().to_string());
                return l_args;
            }
            ')' | '}' => n_depth -= 1,
            ',' if n_depth == 0 => {
                l_args.push(c_current.trim().to_string());
                c_current.clear();
                n_idx += 1;
                continue;
            }
            _ => {}
        }
        c_current.push(chr);
        n_idx += 1;
    }
    l_args.push(c_current.trim().to_string());
    l_args
}

/// Names bound by a call: `LET(n1,v1,...,body)` or `LAMBDA(p1,...,body)`.
fn derive_bound_names(c_func: &str, l_args: &[String]) -> Vec<String> {
    let n_bindings = l_args.len().saturating_sub(1);
    let l_bound = &l_args[..n_bindings];
    match c_func {
        "LET" => l_bound.iter().step_by(2).cloned().collect(),
        _ => l_bound.to_vec(),
    }
    .into_iter()
    .filter(|c| !c.is_empty())
    .collect()
}

/// Offset of a `#` used as a spill postfix on a reference.
fn find_spill_postfix(l_chars: &[char]) -> Option<usize> {
    let mut n_idx = 0;
    while n_idx < l_chars.len() {
        match l_chars[n_idx] {
            '"' | '\'' | '[' => {
                n_idx = skip_literal(l_chars, n_idx);
                continue;
            }
            '#' if n_idx > 0 => {
                let chr_prev = l_chars[n_idx - 1];
                if chr_prev.is_ascii_alphanumeric() || matches!(chr_prev, '$' | '_' | ')') {
                    return Some(n_idx);
                }
            }
            _ => {}
        }
        n_idx += 1;
    }
    None
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Workbook

fn derive_io_error(path: &Path, message: String) -> CapbookError {
    CapbookError::Io {
        path: path.to_path_buf(),
        source: io::Error::new(io::ErrorKind::InvalidData, message),
    }
}

fn read_part<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    path: &Path,
    part: &str,
) -> Result<String, CapbookError> {
    let mut entry = archive
        .by_name(part)
        .map_err(|err| derive_io_error(path, format!("missing part {part}: {err}")))?;
    let mut c_text = String::new();
    entry
        .read_to_string(&mut c_text)
        .map_err(|source| CapbookError::Io {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(c_text)
}

fn parse_part<'a>(path: &Path, part: &str, text: &'a str) -> Result<Document<'a>, CapbookError> {
    Document::parse(text).map_err(|err| derive_io_error(path, format!("invalid XML in {part}: {err}")))
}

/// Sheet name to worksheet part path, in tab order.
fn derive_sheet_parts(
    doc_workbook: &Document<'_>,
    doc_rels: &Document<'_>,
) -> Vec<(String, String)> {
    let dict_targets: BTreeMap<&str, &str> = doc_rels
        .descendants()
        .filter(|node| node.has_tag_name("Relationship"))
        .filter_map(|node| Some((node.attribute("Id")?, node.attribute("Target")?)))
        .collect();
    doc_workbook
        .descendants()
        .filter(|node| node.has_tag_name("sheet"))
        .filter_map(|node| {
            let c_name = node.attribute("name")?;
            let c_id = node.attribute((C_NS_RELATIONSHIPS, "id"))?;
            let c_target = dict_targets.get(c_id)?;
            let c_part = match c_target.strip_prefix('/') {
                Some(c_abs) => c_abs.to_string(),
                None => format!("xl/{c_target}"),
            };
            Some((c_name.to_string(), c_part))
        })
        .collect()
}

fn derive_ancestor_attribute<'a>(node: Node<'a, '_>, tag: &str, attribute: &str) -> &'a str {
    node.ancestors()
        .find(|n| n.has_tag_name(tag))
        .and_then(|n| n.attribute(attribute))
        .unwrap_or("?")
}

fn lint_worksheet(report: &mut ReportLint, sheet_name: &str, doc: &Document<'_>) {
    for node in doc.descendants().filter(|n| n.is_element()) {
        let Some(c_text) = node.text().filter(|c| !c.trim().is_empty()) else {
            continue;
        };
        match node.tag_name().name() {
            "f" => {
                let c_cell = derive_ancestor_attribute(node, "c", "r");
                report.check(format!("{sheet_name}!{c_cell}"), c_text, false);
            }
            "formula" => {
                let c_sqref = derive_ancestor_attribute(node, "conditionalFormatting", "sqref");
                report.check(format!("{sheet_name}!cf({c_sqref})"), c_text, false);
            }
            "formula1" | "formula2" => {
                let c_sqref = derive_ancestor_attribute(node, "dataValidation", "sqref");
                report.check(format!("{sheet_name}!dv({c_sqref})"), c_text, false);
            }
            _ => {}
        }
    }
}

/// `name X`, or the line and column of a `definedName` without a name.
fn derive_defined_name_location(node: Node<'_, '_>) -> String {
    match node.attribute("name") {
        Some(c_name) => format!("name {c_name}"),
        None => {
            let pos = node.document().text_pos_at(node.range().start);
            format!("unnamed definedName at {}:{}", pos.row, pos.col)
        }
    }
}

/// Lint every defined name and stored formula of the workbook at `path`.
pub fn lint_workbook(path: impl AsRef<Path>) -> Result<ReportLint, CapbookError> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|source| CapbookError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut archive = ZipArchive::new(file)
        .map_err(|err| derive_io_error(path, format!("not a zip archive: {err}")))?;

    let c_workbook = read_part(&mut archive, path, C_PART_WORKBOOK)?;
    let c_rels = read_part(&mut archive, path, C_PART_WORKBOOK_RELS)?;
    let doc_workbook = parse_part(path, C_PART_WORKBOOK, &c_workbook)?;
    let doc_rels = parse_part(path, C_PART_WORKBOOK_RELS, &c_rels)?;

    let mut report = ReportLint::default();
    for node in doc_workbook
        .descendants()
        .filter(|n| n.has_tag_name("definedName"))
    {
        report.check(
            derive_defined_name_location(node),
            node.text().unwrap_or(""),
            true,
        );
    }

    for (c_sheet, c_part) in derive_sheet_parts(&doc_workbook, &doc_rels) {
        let c_xml = read_part(&mut archive, path, &c_part)?;
        let doc = parse_part(path, &c_part, &c_xml)?;
        lint_worksheet(&mut report, &c_sheet, &doc);
        report.cnt_sheets_read += 1;
        debug!(sheet = %c_sheet, part = %c_part, "worksheet linted");
    }
    Ok(report)
}

// #endregion
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;
    use rust_xlsxwriter::{
        ConditionalFormatFormula, DataValidation, Format, Formula, Workbook,
    };
    use std::path::PathBuf;
    use std::time::{SystemTime, UNIX_EPOCH};

    struct TestDir {
        path: PathBuf,
    }

    impl TestDir {
        fn new() -> Self {
            let n = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .expect("clock")
                .as_nanos();
            let path = std::env::temp_dir().join(format!("capbook_lint_test_{n}"));
            std::fs::create_dir_all(&path).expect("create test dir");
            Self { path }
        }

        fn path(&self) -> &Path {
            &self.path
        }
    }

    impl Drop for TestDir {
        fn drop(&mut self) {
            let _ = std::fs::remove_dir_all(&self.path);
        }
    }

    #[test]
    fn test_prefixed_bindings_pass() {
        assert!(lint_formula("=LET(_xlpm.x,1,_xlpm.x+1)").is_empty());
        assert!(
            lint_formula("=_xlfn.LET(_xlpm.n,A1,_xlfn.MAP(_xlpm.n,_xlfn.LAMBDA(_xlpm.v,_xlpm.v*2)))")
                .is_empty()
        );
        assert!(lint_formula("=SUM(A1:A3)").is_empty());
    }

    #[test]
    fn test_bare_bindings_are_named() {
        let l_messages = lint_formula("=LET(total,SUM(A1:A3),_xlpm.y,2,total*_xlpm.y)");
        assert_eq!(l_messages.len(), 1);
        assert!(l_messages[0].contains("`total`"));

        let l_messages = lint_formula("=MAP(A1:A3,_xlfn.LAMBDA(v,w,v+w))");
        assert_eq!(l_messages.len(), 2);
        assert!(l_messages[0].contains("LAMBDA variable `v`"));
    }

    #[test]
    fn test_nested_let_inside_lambda_is_scanned() {
        let l_messages = lint_formula("=LAMBDA(_xlpm.a,LET(b,_xlpm.a*2,b))(1)");
        assert_eq!(l_messages.len(), 1);
        assert!(l_messages[0].contains("`b`"));
    }

    #[test]
    fn test_literals_do_not_count() {
        assert!(lint_formula("=IF(A1=\"LET(x,1,x)\",1,0)").is_empty());
        assert!(lint_formula("=tbl_x[[#This Row],[cap_y0]]").is_empty());
        assert!(lint_formula("=IFERROR(A1,#N/A)").is_empty());
        assert!(lint_formula("='My #Sheet'!A1").is_empty());
    }

    #[test]
    fn test_spill_postfix_is_flagged() {
        assert_eq!(lint_formula("=SUM(D4#)").len(), 1);
        assert!(lint_formula("=SUM(ANCHORARRAY(D4))").is_empty());
        assert_eq!(lint_defined_name("PLAYGROUND!$E$4#").len(), 1);
        assert!(lint_defined_name("PLAYGROUND!$E$4").is_empty());
        assert!(lint_defined_name("'O''Brien'!$A$1").is_empty());
    }

    #[test]
    fn test_unprefixed_meta_variable_fails_workbook_lint() {
        let tmp = TestDir::new();
        let path_out = tmp.path().join("bad.xlsx");
        let mut workbook = Workbook::new();
        let worksheet = workbook.add_worksheet();
        worksheet.set_name("META").expect("name");
        worksheet
            .write_formula(1, 1, Formula::new("=LET(status,\"PASS\",status)"))
            .expect("formula");
        workbook.save(&path_out).expect("save");

        let report = lint_workbook(&path_out).expect("lint");
        assert!(!report.is_clean());
        assert_eq!(report.violations[0].location, "META!B2");
        assert!(report.violations[0].message.contains("`status`"));
        let err = report.violations[0].clone().into_error();
        assert!(matches!(err, CapbookError::FormulaHygieneViolation { .. }));
    }

    #[test]
    fn test_rules_validations_and_names_are_read() {
        let tmp = TestDir::new();
        let path_out = tmp.path().join("ok.xlsx");
        let mut workbook = Workbook::new();
        let worksheet = workbook.add_worksheet();
        worksheet.set_name("PLAYGROUND").expect("name");
        worksheet
            .write_formula(0, 0, Formula::new("=LET(_xlpm.x,1,_xlpm.x)"))
            .expect("formula");
        worksheet
            .add_conditional_format(
                1,
                0,
                3,
                0,
                &ConditionalFormatFormula::new()
                    .set_rule("=LET(flag,A2>0,flag)")
                    .set_format(Format::new().set_bold()),
            )
            .expect("cf");
        worksheet
            .add_data_validation(
                0,
                1,
                0,
                1,
                &DataValidation::new().allow_list_formula(Formula::new("=$A$2:$A$4")),
            )
            .expect("dv");
        workbook
            .define_name("SelectedTeam", "=PLAYGROUND!$B$1")
            .expect("define");
        workbook.save(&path_out).expect("save");

        let report = lint_workbook(&path_out).expect("lint");
        assert_eq!(report.cnt_sheets_read, 1);
        assert_eq!(report.cnt_names_checked, 1);
        assert_eq!(report.cnt_formulas_checked, 3);
        assert_eq!(report.violations.len(), 1);
        assert!(report.violations[0].location.starts_with("PLAYGROUND!cf("));
    }

    #[test]
    fn test_unnamed_defined_name_is_located() {
        let c_xml = "<workbook>\n<definedNames>\n  <definedName name=\"A\">1</definedName>\n  \
                     <definedName>LET(x,1,x)</definedName>\n</definedNames>\n</workbook>";
        let doc = Document::parse(c_xml).expect("xml");
        let l_locations: Vec<String> = doc
            .descendants()
            .filter(|n| n.has_tag_name("definedName"))
            .map(derive_defined_name_location)
            .collect();
        assert_eq!(l_locations, vec!["name A", "unnamed definedName at 4:3"]);

        let mut report = ReportLint::default();
        report.check(l_locations[1].clone(), "LET(x,1,x)", true);
        assert_eq!(report.violations[0].location, "unnamed definedName at 4:3");
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let tmp = TestDir::new();
        let err = lint_workbook(tmp.path().join("absent.xlsx")).expect_err("missing");
        assert!(matches!(err, CapbookError::Io { .. }));
    }
}
