//! Turns a class's package name and filename into tree path segments.
//!
//! A path is `assembly / namespace... / folder... / class`:
//!   - the assembly is the first package segment, or the first two when the
//!     package follows a reverse-domain convention (`com.acme.*`);
//!   - folders come from the filename with the file itself dropped and any
//!     folder that repeats the package name removed;
//!   - a class name qualified by its package contributes its remaining
//!     namespace segments, so the leaf label is the bare class name;
//!   - consecutive duplicate segments are collapsed.

/// Leading package segments that are never an assembly on their own.
pub const MULTI_SEGMENT_ROOTS: &[&str] = &["com", "org", "net", "io", "edu", "gov"];

const UNNAMED_CLASS: &str = "(unnamed)";

/// Number of leading package segments that make up the assembly segment.
fn assembly_width(segments: &[&str]) -> usize {
    match segments.first() {
        None => 0,
        Some(first)
            if segments.len() >= 2
                && MULTI_SEGMENT_ROOTS.contains(&first.to_ascii_lowercase().as_str()) =>
        {
            2
        }
        Some(_) => 1,
    }
}

/// Build the ordered path segments for one class.
pub fn class_path(package: &str, filename: &str, class_name: &str) -> Vec<String> {
    let package_segments: Vec<&str> = package
        .split('.')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();
    let width = assembly_width(&package_segments);
    let assembly = package_segments[..width].join(".");

    let mut segments: Vec<String> = Vec::new();
    if !assembly.is_empty() {
        segments.push(assembly.clone());
    }
    segments.extend(
        package_segments[width..]
            .iter()
            .filter(|s| **s != assembly)
            .map(|s| s.to_string()),
    );

    let mut folders: Vec<&str> = filename.split(['/', '\\']).collect();
    folders.pop();
    segments.extend(
        folders
            .into_iter()
            .map(str::trim)
            .filter(|f| is_folder_segment(f))
            .filter(|f| *f != assembly && *f != package && !package_segments.contains(f))
            .map(|f| f.to_string()),
    );

    segments.extend(class_segments(package, class_name));
    segments.dedup();
    segments
}

fn is_folder_segment(folder: &str) -> bool {
    !folder.is_empty() && folder != "." && folder != ".." && !folder.ends_with(':')
}

/// Class names are often fully qualified; the package part is already in
/// the path. Whatever namespace follows the package becomes segments of its
/// own. A name that does not start with the package is kept whole, which
/// leaves file-style names such as `module.py` intact.
fn class_segments(package: &str, class_name: &str) -> Vec<String> {
    let name = class_name.trim();
    let qualified_rest = if package.is_empty() {
        None
    } else {
        name.strip_prefix(package)
            .and_then(|rest| rest.strip_prefix('.'))
            .filter(|rest| !rest.is_empty())
    };
    let segments: Vec<String> = match qualified_rest {
        Some(rest) => rest
            .split('.')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        None if name.is_empty() => Vec::new(),
        None => vec![name.to_string()],
    };
    if segments.is_empty() {
        vec![UNNAMED_CLASS.to_string()]
    } else {
        segments
    }
}
