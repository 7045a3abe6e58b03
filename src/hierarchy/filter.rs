//! Decides which classes take part in the hierarchy.

use crate::model::{ClassInfo, PackageInfo};

/// Exclusion rules applied to every (package, class) pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterRules {
    /// Package names starting with one of these (or equal to one without
    /// its trailing dot) are framework code.
    pub system_prefixes: Vec<String>,
    /// Lower-case filename suffixes of designer and generated sources.
    pub generated_suffixes: Vec<String>,
    /// Lower-case `a/b` folder pairs holding build output.
    pub build_output_dirs: Vec<String>,
}

impl Default for FilterRules {
    fn default() -> Self {
        Self {
            system_prefixes: vec!["System.".to_string(), "Microsoft.".to_string()],
            generated_suffixes: vec![
                ".designer.cs".to_string(),
                ".g.cs".to_string(),
                ".g.i.cs".to_string(),
                "assemblyinfo.cs".to_string(),
            ],
            build_output_dirs: vec!["obj/debug".to_string(), "obj/release".to_string()],
        }
    }
}

impl FilterRules {
    /// True when the class must be left out of the tree.
    #[must_use]
    pub fn excludes(&self, package: &PackageInfo, class: &ClassInfo) -> bool {
        class.metrics.lines_valid == 0
            || is_compiler_generated(&class.name)
            || self.is_system_package(&package.name)
            || self.is_build_output(&class.filename)
            || self.is_generated_file(&class.filename)
    }

    fn is_system_package(&self, name: &str) -> bool {
        self.system_prefixes
            .iter()
            .any(|prefix| name.starts_with(prefix.as_str()) || name == prefix.trim_end_matches('.'))
    }

    fn is_build_output(&self, filename: &str) -> bool {
        let normalized = format!("/{}/", filename.replace('\\', "/").to_lowercase());
        self.build_output_dirs
            .iter()
            .any(|dir| normalized.contains(&format!("/{}/", dir.trim_matches('/'))))
    }

    fn is_generated_file(&self, filename: &str) -> bool {
        let lower = filename.to_lowercase();
        self.generated_suffixes
            .iter()
            .any(|suffix| lower.ends_with(suffix.as_str()))
    }
}

/// Compiler-generated types such as `<Main>d__0` or `Foo/<>c`.
fn is_compiler_generated(name: &str) -> bool {
    name.contains('<') && name.contains('>')
}
