//! Policy deciding which packages, classes and methods untrusted code may use.

use std::collections::HashSet;

use snipbox_engine::Access;

use crate::config::BlockedConfig;
use crate::error::ConfigError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Allow,
    /// Denied; carries the rule that matched.
    Deny(String),
}

impl Verdict {
    #[must_use]
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow)
    }
}

/// Immutable block lists. There is no allow-list mode: anything not
/// explicitly blocked is allowed.
#[derive(Debug, Clone, Default)]
pub struct ExecutionFilter {
    packages: Vec<String>,
    classes: HashSet<String>,
    methods: HashSet<(String, String)>,
}

impl ExecutionFilter {
    /// Build a filter from package prefixes, class names and `Class#method`
    /// entries. Entries are trimmed; empty ones are skipped. A trailing `.*`
    /// on a package prefix is accepted.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MalformedMethod`] for a method entry without
    /// exactly one `#` or with an empty class or method side.
    pub fn from_lists<P, C, M>(packages: P, classes: C, methods: M) -> Result<Self, ConfigError>
    where
        P: IntoIterator,
        P::Item: AsRef<str>,
        C: IntoIterator,
        C::Item: AsRef<str>,
        M: IntoIterator,
        M::Item: AsRef<str>,
    {
        let packages = packages
            .into_iter()
            .map(|p| {
                let p = p.as_ref().trim();
                p.strip_suffix(".*")
                    .unwrap_or(p)
                    .trim_end_matches('.')
                    .to_owned()
            })
            .filter(|p| !p.is_empty())
            .collect();
        let classes = classes
            .into_iter()
            .map(|c| c.as_ref().trim().to_owned())
            .filter(|c| !c.is_empty())
            .collect();
        let methods = methods
            .into_iter()
            .map(|m| m.as_ref().trim().to_owned())
            .filter(|m| !m.is_empty())
            .map(|entry| parse_method(&entry))
            .collect::<Result<_, _>>()?;
        Ok(Self {
            packages,
            classes,
            methods,
        })
    }

    /// # Errors
    ///
    /// See [`ExecutionFilter::from_lists`].
    pub fn from_config(config: &BlockedConfig) -> Result<Self, ConfigError> {
        Self::from_lists(&config.packages, &config.classes, &config.methods)
    }

    /// Decide on one access. Package, class and method rules are independent;
    /// any match denies. Matching is case-sensitive and method rules ignore
    /// signatures, so every overload of a blocked name is denied.
    #[must_use]
    pub fn check(&self, access: &Access<'_>) -> Verdict {
        let package = access.package();
        if let Some(prefix) = self
            .packages
            .iter()
            .find(|prefix| package_matches(package, prefix))
        {
            return Verdict::Deny(format!("package {prefix} is blocked"));
        }
        if let Some(class) = access.class()
            && self.classes.contains(class)
        {
            return Verdict::Deny(format!("class {class} is blocked"));
        }
        if let Access::Method { class, method } = access
            && self
                .methods
                .contains(&((*class).to_owned(), (*method).to_owned()))
        {
            return Verdict::Deny(format!("method {class}#{method} is blocked"));
        }
        Verdict::Allow
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.packages.is_empty() && self.classes.is_empty() && self.methods.is_empty()
    }
}

fn parse_method(entry: &str) -> Result<(String, String), ConfigError> {
    let malformed = || ConfigError::MalformedMethod {
        entry: entry.to_owned(),
    };
    let (class, method) = entry.split_once('#').ok_or_else(malformed)?;
    let (class, method) = (class.trim(), method.trim());
    if class.is_empty() || method.is_empty() || method.contains('#') {
        return Err(malformed());
    }
    Ok((class.to_owned(), method.to_owned()))
}

/// `java.io` matches `java.io` and `java.io.x`, never `java.iox`.
fn package_matches(package: &str, prefix: &str) -> bool {
    package
        .strip_prefix(prefix)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with('.'))
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn filter(packages: &[&str], classes: &[&str], methods: &[&str]) -> ExecutionFilter {
        ExecutionFilter::from_lists(packages, classes, methods).unwrap()
    }

    #[test]
    fn empty_filter_allows_everything() {
        let f = ExecutionFilter::default();
        assert!(f.is_empty());
        assert!(f.check(&Access::Class("java.io.File")).is_allowed());
        assert!(
            f.check(&Access::Method {
                class: "java.lang.System",
                method: "exit"
            })
            .is_allowed()
        );
    }

    #[test]
    fn blocked_package_covers_subpackages() {
        let f = filter(&["java.nio"], &[], &[]);
        assert_eq!(
            f.check(&Access::Class("java.nio.file.Files")),
            Verdict::Deny("package java.nio is blocked".into())
        );
        assert!(!f.check(&Access::Package("java.nio")).is_allowed());
        assert!(f.check(&Access::Class("java.niox.Thing")).is_allowed());
        assert!(f.check(&Access::Package("java")).is_allowed());
    }

    #[test]
    fn package_wildcard_suffix_accepted() {
        let f = filter(&["java.io.*"], &[], &[]);
        assert!(!f.check(&Access::Class("java.io.File")).is_allowed());
    }

    #[test]
    fn blocked_class() {
        let f = filter(&[], &["java.io.File"], &[]);
        assert_eq!(
            f.check(&Access::Class("java.io.File")),
            Verdict::Deny("class java.io.File is blocked".into())
        );
        assert!(
            !f.check(&Access::Method {
                class: "java.io.File",
                method: "exists"
            })
            .is_allowed()
        );
        assert!(f.check(&Access::Class("java.io.PrintStream")).is_allowed());
    }

    #[test]
    fn blocked_method_only_that_name() {
        let f = filter(&[], &[], &["java.lang.System#exit"]);
        assert_eq!(
            f.check(&Access::Method {
                class: "java.lang.System",
                method: "exit"
            }),
            Verdict::Deny("method java.lang.System#exit is blocked".into())
        );
        assert!(
            f.check(&Access::Method {
                class: "java.lang.System",
                method: "currentTimeMillis"
            })
            .is_allowed()
        );
        assert!(f.check(&Access::Class("java.lang.System")).is_allowed());
    }

    #[test]
    fn matching_is_case_sensitive() {
        let f = filter(&[], &["java.io.File"], &[]);
        assert!(f.check(&Access::Class("java.io.file")).is_allowed());
    }

    #[test]
    fn entries_trimmed_and_blanks_skipped() {
        let f = filter(&[" "], &[" java.io.File "], &[" java.lang.System # exit "]);
        assert!(!f.check(&Access::Class("java.io.File")).is_allowed());
        assert!(
            !f.check(&Access::Method {
                class: "java.lang.System",
                method: "exit"
            })
            .is_allowed()
        );
    }

    #[test]
    fn malformed_methods_rejected() {
        for entry in ["java.lang.Systemexit", "#exit", "java.lang.System#", "a#b#c"] {
            let err = ExecutionFilter::from_lists(&[] as &[&str], &[] as &[&str], [entry])
                .unwrap_err();
            assert!(
                matches!(err, ConfigError::MalformedMethod { entry: ref e } if e == entry),
                "{entry}"
            );
        }
    }

    proptest! {
        #[test]
        fn subpackage_classes_denied(
            prefix in "[a-z]{1,6}(\\.[a-z]{1,6}){0,2}",
            rest in "(\\.[a-z]{1,6}){0,2}\\.[A-Z][a-zA-Z]{0,8}",
        ) {
            let f = filter(&[prefix.as_str()], &[], &[]);
            let class = format!("{prefix}{rest}");
            prop_assert!(!f.check(&Access::Class(&class)).is_allowed());
        }

        #[test]
        fn sibling_packages_allowed(
            prefix in "[a-z]{1,6}\\.[a-z]{1,6}",
            suffix in "[a-z]{1,4}",
            class in "[A-Z][a-zA-Z]{0,8}",
        ) {
            let f = filter(&[prefix.as_str()], &[], &[]);
            let name = format!("{prefix}{suffix}.{class}");
            prop_assert!(f.check(&Access::Class(&name)).is_allowed());
        }

        #[test]
        fn method_block_independent_of_other_methods(
            method in "[a-z][a-zA-Z]{0,8}",
            other in "[a-z][a-zA-Z]{0,8}",
        ) {
            prop_assume!(method != other);
            let entry = format!("java.lang.Math#{method}");
            let f = filter(&[], &[], &[entry.as_str()]);
            let blocked = Access::Method { class: "java.lang.Math", method: &method };
            let unrelated = Access::Method { class: "java.lang.Math", method: &other };
            prop_assert!(!f.check(&blocked).is_allowed());
            prop_assert!(f.check(&unrelated).is_allowed());
        }
    }
}
