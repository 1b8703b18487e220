//! Task target references
//!
//! A task target names an invocable unit of work as a dotted module path plus
//! an attribute. Parsing only validates the syntactic shape; binding the
//! reference to something callable happens inside the execution environment.

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Reference to an invocable unit of work
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TaskTarget {
    /// Dotted module path (e.g. `pkg.mod`)
    pub module: String,
    /// Attribute within the module (e.g. `func`)
    pub attribute: String,
}

impl TaskTarget {
    /// Parse a task target
    ///
    /// Accepted forms, in priority order:
    /// 1. `module.path:attribute` (split on the last `:`)
    /// 2. `module.path.attribute` (split on the last `.`)
    ///
    /// # Errors
    /// Returns [`Error::TargetFormat`] when neither separator is present or a
    /// part is empty or malformed.
    ///
    /// # Example
    /// ```
    /// use ferry_core::domain::target::TaskTarget;
    ///
    /// let target = TaskTarget::parse("pkg.mod:func")?;
    /// assert_eq!(target.module, "pkg.mod");
    /// assert_eq!(target.attribute, "func");
    /// # Ok::<(), ferry_core::Error>(())
    /// ```
    pub fn parse(text: &str) -> Result<Self> {
        let (module, attribute) = if let Some(split) = text.rsplit_once(':') {
            split
        } else if let Some(split) = text.rsplit_once('.') {
            split
        } else {
            return Err(Error::target_format(
                text,
                "expected 'pkg.module:callable' or 'pkg.module.callable'",
            ));
        };

        validate_module(text, module)?;
        validate_attribute(text, attribute)?;

        Ok(Self {
            module: module.to_string(),
            attribute: attribute.to_string(),
        })
    }

    /// Canonical `module:attribute` form
    pub fn canonical(&self) -> String {
        format!("{}:{}", self.module, self.attribute)
    }

    /// Module path split into its segments
    pub fn module_segments(&self) -> impl Iterator<Item = &str> {
        self.module.split('.')
    }
}

fn validate_module(input: &str, module: &str) -> Result<()> {
    if module.is_empty() {
        return Err(Error::target_format(input, "module path is empty"));
    }
    for segment in module.split('.') {
        if segment.is_empty() {
            return Err(Error::target_format(input, "module path has an empty segment"));
        }
        if !is_name(segment) {
            return Err(Error::target_format(
                input,
                format!("'{}' is not a valid module segment", segment),
            ));
        }
    }
    Ok(())
}

fn validate_attribute(input: &str, attribute: &str) -> Result<()> {
    if attribute.is_empty() {
        return Err(Error::target_format(input, "attribute is empty"));
    }
    if !is_name(attribute) {
        return Err(Error::target_format(
            input,
            format!("'{}' is not a valid attribute name", attribute),
        ));
    }
    Ok(())
}

fn is_name(segment: &str) -> bool {
    !segment
        .chars()
        .any(|c| c.is_whitespace() || c == ':' || c == '/')
}

impl fmt::Display for TaskTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.module, self.attribute)
    }
}

impl FromStr for TaskTarget {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        TaskTarget::parse(s)
    }
}
