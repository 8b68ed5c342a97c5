use std::fmt;

/// A symbol use requested by untrusted code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access<'a> {
    /// `import pkg.*` or any other whole-package reference.
    Package(&'a str),
    /// A reference to a fully-qualified class.
    Class(&'a str),
    /// An invocation of `method` declared on the fully-qualified `class`.
    Method { class: &'a str, method: &'a str },
}

impl Access<'_> {
    /// Fully-qualified class this access touches, if any.
    #[must_use]
    pub fn class(&self) -> Option<&str> {
        match self {
            Self::Package(_) => None,
            Self::Class(class) | Self::Method { class, .. } => Some(class),
        }
    }

    /// Package the access lives in. For classes this is everything before the last `.`.
    #[must_use]
    pub fn package(&self) -> &str {
        match self {
            Self::Package(pkg) => pkg,
            Self::Class(class) | Self::Method { class, .. } => {
                class.rsplit_once('.').map_or("", |(pkg, _)| pkg)
            }
        }
    }
}

impl fmt::Display for Access<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Package(pkg) => write!(f, "package {pkg}"),
            Self::Class(class) => write!(f, "class {class}"),
            Self::Method { class, method } => write!(f, "method {class}#{method}"),
        }
    }
}

/// Denial returned by an [`AccessGate`]; surfaces as a snippet exception.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessDenied {
    pub message: String,
}

impl AccessDenied {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for AccessDenied {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Capability check consulted by an engine before it lets untrusted code
/// resolve a package, class or method.
///
/// Engines must call this at the moment the symbol is used, not once per
/// snippet: the answer may change between calls (for example when the
/// restricted context is not active).
pub trait AccessGate: Send + Sync {
    /// # Errors
    ///
    /// Returns [`AccessDenied`] when the access is not permitted.
    fn check(&self, access: &Access<'_>) -> Result<(), AccessDenied>;
}

/// Gate that allows everything. Useful for trusted engines and tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl AccessGate for AllowAll {
    fn check(&self, _access: &Access<'_>) -> Result<(), AccessDenied> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn package_of_class() {
        assert_eq!(Access::Class("java.io.File").package(), "java.io");
        assert_eq!(
            Access::Method {
                class: "java.lang.System",
                method: "exit"
            }
            .package(),
            "java.lang"
        );
        assert_eq!(Access::Package("java.nio").package(), "java.nio");
    }

    #[test]
    fn unqualified_class_has_empty_package() {
        assert_eq!(Access::Class("Main").package(), "");
    }

    #[test]
    fn class_of_access() {
        assert_eq!(Access::Package("java.io").class(), None);
        assert_eq!(Access::Class("java.io.File").class(), Some("java.io.File"));
    }

    #[test]
    fn access_display() {
        let access = Access::Method {
            class: "java.lang.System",
            method: "exit",
        };
        assert_eq!(access.to_string(), "method java.lang.System#exit");
        assert_eq!(Access::Package("java.io").to_string(), "package java.io");
    }

    #[test]
    fn allow_all_allows() {
        assert!(AllowAll.check(&Access::Class("java.io.File")).is_ok());
    }
}
