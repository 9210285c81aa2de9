//! Package name validation.

use crate::error::{Error, Result};

/// Checks that `name` is a valid proto package name.
///
/// A valid name is one or more dot-separated components, each starting with
/// an ASCII letter and continuing with letters, digits or underscores.
pub fn validate(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::invalid_package_name(name, "name is empty"));
    }
    if name.starts_with('.') {
        return Err(Error::invalid_package_name(name, "name starts with a dot"));
    }
    if name.ends_with('.') {
        return Err(Error::invalid_package_name(name, "name ends with a dot"));
    }

    for component in name.split('.') {
        let mut chars = component.chars();
        match chars.next() {
            None => return Err(Error::invalid_package_name(name, "empty component")),
            Some(c) if c.is_ascii_digit() => {
                return Err(Error::invalid_package_name(name, "component starts with a digit"))
            }
            Some('_') => {
                return Err(Error::invalid_package_name(
                    name,
                    "component starts with an underscore",
                ))
            }
            Some(c) if !c.is_ascii_alphabetic() => {
                return Err(Error::invalid_package_name(name, "illegal character"))
            }
            Some(_) => {}
        }
        if !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(Error::invalid_package_name(name, "illegal character"));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_illegal_names() {
        for name in [
            "",
            ".",
            ".first.dot",
            "ended.with.dot.",
            "first._underscore",
            "first.1digit",
            "illegal.sym+bol",
            "double..dot",
            "ünïcode",
        ] {
            let err = validate(name).unwrap_err();
            assert!(
                matches!(err, Error::InvalidPackageName { .. }),
                "'{}' should be rejected",
                name
            );
        }
    }

    #[test]
    fn test_accepts_legal_names() {
        for name in ["singleIdent", "double.ident", "with.digits0123", "with.underscore_"] {
            assert!(validate(name).is_ok(), "'{}' should be accepted", name);
        }
    }

    #[test]
    fn test_reason_names_the_rule() {
        let err = validate("first.1digit").unwrap_err();
        assert!(err.to_string().contains("digit"));
    }
}
