/// Parser for Cobertura XML coverage reports.
///
/// Cobertura XML structure:
///   <coverage line-rate="..." branch-rate="..." complexity="..." timestamp="...">
///     <packages>
///       <package name="..." line-rate="..." complexity="...">
///         <classes>
///           <class name="..." filename="..." complexity="..."
///                  lines-valid="..." lines-covered="...">
///             <methods>
///               <method name="..." line-rate="...">
///                 <lines><line number="..." hits="..." .../></lines>
///               </method>
///             </methods>
///             <lines>
///               <line number="..." hits="..." branch="true|false"
///                     condition-coverage="50% (1/2)" />
///             </lines>
///           </class>
///         </classes>
///       </package>
///     </packages>
///   </coverage>
///
/// Generators disagree on which attributes they emit, so every count is
/// recomputed bottom-up from the `<line>` elements and the rate attributes
/// are only used when no counts are available.
use std::collections::HashMap;
use std::str;
use std::sync::LazyLock;

use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use regex::Regex;

/// Pre-compiled regex for condition-coverage attributes like "75% (3/4)".
static CONDITION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(\d+(?:\.\d+)?)\s*%\s*\(\s*(\d+)\s*/\s*(\d+)\s*\)\s*$").unwrap()
});

use crate::aggregate::{aggregate, aggregate_counts};
use crate::error::{CovtreeError, Result};
use crate::model::*;
use crate::parsers::Parser;

pub struct CoberturaParser;

impl Parser for CoberturaParser {
    fn parse(&self, input: &[u8]) -> Result<CoverageData> {
        parse(input)
    }
}

/// Parse a Cobertura document.
pub fn parse(input: &[u8]) -> Result<CoverageData> {
    let mut reader = Reader::from_reader(input);
    reader.trim_text(true);

    let mut doc = Document::default();
    let mut buf = Vec::new();
    let mut depth: usize = 0;

    loop {
        buf.clear();
        let event = reader.read_event_into(&mut buf);
        let is_start_event = matches!(&event, Ok(Event::Start(_)));
        match event {
            Err(e) => {
                return Err(CovtreeError::MalformedXml(format!(
                    "{} (at byte {})",
                    e,
                    reader.buffer_position()
                )))
            }
            Ok(Event::Eof) => break,
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => {
                if depth == 0 {
                    doc.open_root(e)?;
                } else {
                    doc.open_element(e, !is_start_event);
                }
                if is_start_event {
                    depth += 1;
                }
            }
            Ok(Event::End(ref e)) => {
                if depth == 0 {
                    return Err(CovtreeError::MalformedXml(format!(
                        "unexpected closing tag </{}>",
                        String::from_utf8_lossy(e.name().as_ref())
                    )));
                }
                depth -= 1;
                doc.close_element(e.local_name().as_ref());
            }
            Ok(Event::Text(ref e)) if depth == 0 => {
                let text = String::from_utf8_lossy(e);
                if !text.trim_start_matches('\u{feff}').trim().is_empty() {
                    return Err(CovtreeError::MalformedXml(
                        "text content outside of the document element".to_string(),
                    ));
                }
            }
            _ => {}
        }
    }

    if depth > 0 {
        return Err(CovtreeError::MalformedXml(format!(
            "unexpected end of document with {} unclosed element(s)",
            depth
        )));
    }

    let data = doc.finish()?;
    log::debug!(
        "parsed cobertura document: {} packages, {} classes, {}/{} lines covered",
        data.packages.len(),
        data.class_count(),
        data.summary.metrics.lines_covered,
        data.summary.metrics.lines_valid
    );
    Ok(data)
}

/// Attributes of the `<coverage>` element.
#[derive(Debug, Default)]
struct RootAttrs {
    line_rate: Option<f64>,
    branch_rate: Option<f64>,
    method_rate: Option<f64>,
    class_rate: Option<f64>,
    complexity: Option<f64>,
    timestamp: Option<i64>,
}

impl RootAttrs {
    fn from_attrs(attrs: &HashMap<String, String>) -> Self {
        Self {
            line_rate: parse_rate(attrs.get("line-rate")),
            branch_rate: parse_rate(attrs.get("branch-rate")),
            method_rate: parse_rate(attrs.get("method-rate")),
            class_rate: parse_rate(attrs.get("class-rate")),
            complexity: parse_non_negative(attrs.get("complexity")),
            timestamp: attrs
                .get("timestamp")
                .and_then(|t| t.trim().parse::<f64>().ok())
                .filter(|t| t.is_finite())
                .map(|t| t as i64),
        }
    }
}

struct PackageState {
    info: PackageInfo,
    line_rate: Option<f64>,
    branch_rate: Option<f64>,
    complexity: Option<f64>,
}

impl PackageState {
    fn new(attrs: &HashMap<String, String>) -> Self {
        Self {
            info: PackageInfo::new(attrs.get("name").cloned().unwrap_or_default()),
            line_rate: parse_rate(attrs.get("line-rate")),
            branch_rate: parse_rate(attrs.get("branch-rate")),
            complexity: parse_non_negative(attrs.get("complexity")),
        }
    }

    fn unnamed() -> Self {
        Self::new(&HashMap::new())
    }

    fn finish(self) -> PackageInfo {
        let mut info = self.info;
        info.metrics = aggregate(info.classes.iter().map(|c| &c.metrics));
        if info.metrics.lines_valid == 0 {
            info.metrics.line_coverage = self.line_rate.unwrap_or(0.0);
        }
        if info.metrics.branches_valid == 0 {
            info.metrics.branch_coverage = self.branch_rate.unwrap_or(0.0);
        }
        info.methods = aggregate_counts(info.classes.iter().map(|c| &c.methods));
        info.method_coverage = info.methods.map(|m| m.coverage());
        info.complexity = self.complexity.or_else(|| {
            (!info.classes.is_empty()).then(|| info.classes.iter().map(|c| c.complexity).sum())
        });
        info
    }
}

struct MethodState {
    line_rate: Option<f64>,
    saw_line: bool,
    hit: bool,
}

struct ClassState {
    name: String,
    filename: String,
    complexity: f64,
    line_rate: Option<f64>,
    branch_rate: Option<f64>,
    lines_valid: Option<u64>,
    lines_covered: Option<u64>,
    lines: Vec<LineInfo>,
    line_index: HashMap<u32, usize>,
    methods: Option<Counts>,
    method: Option<MethodState>,
}

impl ClassState {
    fn new(attrs: &HashMap<String, String>) -> Self {
        Self {
            name: attrs.get("name").cloned().unwrap_or_default(),
            filename: attrs.get("filename").cloned().unwrap_or_default(),
            complexity: parse_non_negative(attrs.get("complexity")).unwrap_or(0.0),
            line_rate: parse_rate(attrs.get("line-rate")),
            branch_rate: parse_rate(attrs.get("branch-rate")),
            lines_valid: parse_count(attrs.get("lines-valid")),
            lines_covered: parse_count(attrs.get("lines-covered")),
            lines: Vec::new(),
            line_index: HashMap::new(),
            methods: None,
            method: None,
        }
    }

    fn start_method(&mut self, attrs: &HashMap<String, String>) {
        self.method = Some(MethodState {
            line_rate: parse_rate(attrs.get("line-rate")),
            saw_line: false,
            hit: false,
        });
    }

    fn finish_method(&mut self) {
        if let Some(method) = self.method.take() {
            let covered = method.hit || (!method.saw_line && method.line_rate.unwrap_or(0.0) > 0.0);
            let counts = self.methods.get_or_insert_with(Counts::default);
            counts.valid += 1;
            if covered {
                counts.covered += 1;
            }
        }
    }

    /// Lines may appear both under `<method><lines>` and `<class><lines>`.
    /// Keep one entry per line number with the highest hit count; branch
    /// data comes from the first occurrence so arms are never double-counted.
    fn record_line(&mut self, line: LineInfo) {
        if let Some(method) = self.method.as_mut() {
            method.saw_line = true;
            if line.hits > 0 {
                method.hit = true;
            }
        }
        if let Some(&idx) = self.line_index.get(&line.number) {
            let existing = &mut self.lines[idx];
            existing.hits = existing.hits.max(line.hits);
        } else {
            self.line_index.insert(line.number, self.lines.len());
            self.lines.push(line);
        }
    }

    fn finish(mut self) -> ClassInfo {
        self.finish_method();
        self.lines.sort_by_key(|l| l.number);

        let calc_valid = self.lines.len() as u64;
        let calc_covered = self.lines.iter().filter(|l| l.hits > 0).count() as u64;
        let (branches_valid, branches_covered) = self
            .lines
            .iter()
            .filter(|l| l.branch)
            .filter_map(|l| l.condition)
            .fold((0u64, 0u64), |(valid, covered), c| {
                (valid + u64::from(c.total), covered + u64::from(c.covered))
            });

        // Explicit line counts win over the calculated ones; branch counts
        // are always taken from the lines.
        let mut metrics = CoverageMetrics::from_counts(
            self.lines_valid.unwrap_or(calc_valid),
            self.lines_covered.unwrap_or(calc_covered),
            branches_valid,
            branches_covered,
        );
        if metrics.lines_valid == 0 {
            metrics.line_coverage = self.line_rate.unwrap_or(0.0);
        }
        if metrics.branches_valid == 0 {
            metrics.branch_coverage = self.branch_rate.unwrap_or(0.0);
        }

        ClassInfo {
            name: self.name,
            filename: self.filename,
            complexity: self.complexity,
            metrics,
            lines: self.lines,
            methods: self.methods,
        }
    }
}

/// Accumulates packages and classes while the reader walks the document.
#[derive(Default)]
struct Document {
    root: Option<RootAttrs>,
    packages: Vec<PackageInfo>,
    package: Option<PackageState>,
    orphans: Option<PackageState>,
    class: Option<ClassState>,
}

impl Document {
    fn open_root(&mut self, e: &BytesStart) -> Result<()> {
        if self.root.is_some() {
            return Err(CovtreeError::MalformedXml(
                "more than one document element".to_string(),
            ));
        }
        if e.local_name().as_ref() != b"coverage" {
            return Err(CovtreeError::InvalidSchema(format!(
                "expected a <coverage> document element, found <{}>",
                String::from_utf8_lossy(e.name().as_ref())
            )));
        }
        self.root = Some(RootAttrs::from_attrs(&attr_map(e)));
        Ok(())
    }

    fn open_element(&mut self, e: &BytesStart, self_closing: bool) {
        let local_name = e.local_name();
        match local_name.as_ref() {
            b"package" => {
                self.close_package();
                self.package = Some(PackageState::new(&attr_map(e)));
                if self_closing {
                    self.close_package();
                }
            }
            b"class" => {
                self.close_class();
                self.class = Some(ClassState::new(&attr_map(e)));
                if self_closing {
                    self.close_class();
                }
            }
            b"method" => {
                if let Some(class) = self.class.as_mut() {
                    class.start_method(&attr_map(e));
                    if self_closing {
                        class.finish_method();
                    }
                }
            }
            b"line" => {
                if let Some(class) = self.class.as_mut() {
                    if let Some(line) = parse_line(&attr_map(e)) {
                        class.record_line(line);
                    }
                }
            }
            _ => {}
        }
    }

    fn close_element(&mut self, local_name: &[u8]) {
        match local_name {
            b"package" => self.close_package(),
            b"class" => self.close_class(),
            b"method" => {
                if let Some(class) = self.class.as_mut() {
                    class.finish_method();
                }
            }
            _ => {}
        }
    }

    fn close_class(&mut self) {
        if let Some(class) = self.class.take() {
            let info = class.finish();
            let owner = match self.package.as_mut() {
                Some(pkg) => pkg,
                None => self.orphans.get_or_insert_with(PackageState::unnamed),
            };
            owner.info.insert_class(info);
        }
    }

    fn close_package(&mut self) {
        self.close_class();
        if let Some(pkg) = self.package.take() {
            self.packages.push(pkg.finish());
        }
    }

    fn finish(mut self) -> Result<CoverageData> {
        self.close_package();
        let root = self
            .root
            .take()
            .ok_or_else(|| CovtreeError::InvalidSchema("no <coverage> element found".to_string()))?;

        let mut packages = self.packages;
        if let Some(orphans) = self.orphans.take() {
            packages.push(orphans.finish());
        }

        let summary = summarize(&root, &packages);
        Ok(CoverageData { summary, packages })
    }
}

/// Build the document summary from the aggregated packages. Counts always
/// win over the root element's rate attributes when they are available.
fn summarize(root: &RootAttrs, packages: &[PackageInfo]) -> CoverageSummary {
    let mut metrics = aggregate(packages.iter().map(|p| &p.metrics));
    if metrics.lines_valid == 0 {
        metrics.line_coverage = root.line_rate.unwrap_or(0.0);
    }

    let conditions = (metrics.branches_valid > 0)
        .then(|| Counts::new(metrics.branches_valid, metrics.branches_covered));
    if conditions.is_none() {
        metrics.branch_coverage = root.branch_rate.unwrap_or(0.0);
    }

    let methods = aggregate_counts(packages.iter().map(|p| &p.methods));
    let method_coverage = match methods {
        Some(m) if m.valid > 0 => m.coverage(),
        _ => root.method_rate.unwrap_or(0.0),
    };

    let classes: Vec<&ClassInfo> = packages
        .iter()
        .flat_map(|p| p.classes.iter())
        .filter(|c| c.metrics.lines_valid > 0)
        .collect();
    let class_coverage = if classes.is_empty() {
        root.class_rate.unwrap_or(0.0)
    } else {
        let covered = classes.iter().filter(|c| c.metrics.lines_covered > 0).count();
        percentage(covered as u64, classes.len() as u64)
    };

    let complexity = root
        .complexity
        .unwrap_or_else(|| packages.iter().filter_map(|p| p.complexity).sum());

    CoverageSummary {
        metrics,
        method_coverage,
        class_coverage,
        complexity,
        timestamp: root.timestamp,
        methods,
        conditions,
    }
}

fn parse_line(attrs: &HashMap<String, String>) -> Option<LineInfo> {
    let number = parse_count(attrs.get("number"))
        .filter(|n| *n > 0)
        .and_then(|n| u32::try_from(n).ok())?;
    let hits = parse_count(attrs.get("hits")).unwrap_or(0);
    let branch = attrs
        .get("branch")
        .map(|v| v.trim().eq_ignore_ascii_case("true"))
        .unwrap_or(false);
    let condition = attrs.get("condition-coverage").and_then(|raw| {
        let parsed = parse_condition(raw);
        if parsed.is_none() {
            log::warn!("ignoring malformed condition-coverage '{}' on line {}", raw, number);
        }
        parsed
    });

    Some(LineInfo {
        number,
        hits,
        branch,
        condition,
    })
}

/// Parse a condition-coverage string such as `"50% (1/2)"`.
pub fn parse_condition(raw: &str) -> Option<ConditionInfo> {
    let caps = CONDITION_RE.captures(raw)?;
    let coverage: f64 = caps[1].parse().ok()?;
    let covered: u32 = caps[2].parse().ok()?;
    let total: u32 = caps[3].parse().ok()?;
    if covered > total {
        return None;
    }
    Some(ConditionInfo {
        coverage: round2(clamp_percent(coverage)),
        covered,
        total,
    })
}

/// Parse a rate attribute in [0, 1] into a percentage.
fn parse_rate(value: Option<&String>) -> Option<f64> {
    value
        .and_then(|v| v.trim().parse::<f64>().ok())
        .filter(|v| !v.is_nan())
        .map(rate_to_percent)
}

fn parse_non_negative(value: Option<&String>) -> Option<f64> {
    value
        .and_then(|v| v.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite() && *v >= 0.0)
}

fn parse_count(value: Option<&String>) -> Option<u64> {
    parse_non_negative(value).map(|v| v as u64)
}

/// Extract attributes from an XML element into a HashMap.
fn attr_map(e: &BytesStart) -> HashMap<String, String> {
    e.attributes()
        .filter_map(|a| {
            let attr = a.ok()?;
            let key = str::from_utf8(attr.key.local_name().into_inner())
                .ok()?
                .to_string();
            let value = attr.unescape_value().ok()?.to_string();
            Some((key, value))
        })
        .collect()
}
