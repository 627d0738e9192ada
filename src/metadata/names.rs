//! Package-qualified metadata names.
//!
//! Metadata names may embed a package path, using [`PKG_SEPARATOR`] between segments:
//! `acme::produce::Apple` has the short name `Apple` and the package `acme::produce`.
//! The helpers in this module split such names and expand the relative package references
//! that metadata files are allowed to use.
//!
//! # Relative References
//!
//! - `::Name` is relative to the base package: base `acme` gives `acme::Name`
//! - every leading `..::` drops one trailing segment of the base package
//! - anything else is already absolute and returned unchanged

use crate::Result;

/// Separator between package segments and the short name.
pub const PKG_SEPARATOR: &str = "::";

const PARENT_SEGMENT: &str = "..::";

/// Split a (possibly package-qualified) name into `(package, short_name)`.
///
/// The split happens on the last separator. Names without a separator have an empty package.
///
/// # Examples
///
/// ```rust
/// use metaobjects::metadata::names::split_name;
///
/// assert_eq!(split_name("acme::produce::Apple"), ("acme::produce", "Apple"));
/// assert_eq!(split_name("Apple"), ("", "Apple"));
/// ```
#[must_use]
pub fn split_name(name: &str) -> (&str, &str) {
    match name.rfind(PKG_SEPARATOR) {
        Some(pos) => (&name[..pos], &name[pos + PKG_SEPARATOR.len()..]),
        None => ("", name),
    }
}

/// Join a package and a short name. An empty package yields the short name itself.
#[must_use]
pub fn qualify(package: &str, name: &str) -> String {
    if package.is_empty() {
        name.to_string()
    } else {
        format!("{package}{PKG_SEPARATOR}{name}")
    }
}

/// Expand a relative package path or metadata reference against `base`.
///
/// # Arguments
/// * `base` - The package the reference is relative to (may be empty)
/// * `value` - The package or reference as written in the file
///
/// # Errors
/// Returns [`crate::Error::InvalidMetadata`] if `value` drops more segments than `base` has.
///
/// # Examples
///
/// ```rust
/// use metaobjects::metadata::names::expand_package;
///
/// assert_eq!(expand_package("acme::produce", "::Apple")?, "acme::produce::Apple");
/// assert_eq!(expand_package("acme::produce", "..::common::Id")?, "acme::common::Id");
/// assert_eq!(expand_package("acme", "other::Pear")?, "other::Pear");
/// # Ok::<(), metaobjects::Error>(())
/// ```
pub fn expand_package(base: &str, value: &str) -> Result<String> {
    if let Some(rest) = value.strip_prefix(PKG_SEPARATOR) {
        return Ok(qualify(base, rest));
    }

    if !value.starts_with(PARENT_SEGMENT) {
        return Ok(value.to_string());
    }

    let mut segments: Vec<&str> = if base.is_empty() {
        Vec::new()
    } else {
        base.split(PKG_SEPARATOR).collect()
    };

    let mut rest = value;
    while let Some(stripped) = rest.strip_prefix(PARENT_SEGMENT) {
        if segments.pop().is_none() {
            return Err(invalid_metadata!(
                "Base package [{}] cannot drop that many relative paths for [{}]",
                base,
                value
            ));
        }
        rest = stripped;
    }

    Ok(qualify(&segments.join(PKG_SEPARATOR), rest))
}
