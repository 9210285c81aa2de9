//! Identifier helpers shared by the descriptor model and the generator.

/// Last segment of a dotted serial name: `com.example.Foo` becomes `Foo`
pub(crate) fn simple_name(serial_name: &str) -> &str {
    serial_name.rsplit('.').next().unwrap_or(serial_name)
}

/// Turns an arbitrary serial name into a proto identifier.
///
/// Characters outside `[A-Za-z0-9_]` become `_`, and an identifier that
/// would start with a digit gets a leading `_`.
pub(crate) fn identifier(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 1);
    if name.chars().next().map_or(true, |c| c.is_ascii_digit()) {
        out.push('_');
    }
    for c in name.chars() {
        if c.is_ascii_alphanumeric() || c == '_' {
            out.push(c);
        } else {
            out.push('_');
        }
    }
    out
}

/// Identifier for a message or enum type named by `serial_name`
pub(crate) fn type_identifier(serial_name: &str) -> String {
    identifier(simple_name(serial_name))
}

/// `CreditCard` becomes `credit_card`
pub(crate) fn to_snake_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 4);
    let mut prev_lower = false;
    for c in s.chars() {
        if c.is_ascii_uppercase() {
            if prev_lower {
                out.push('_');
            }
            out.push(c.to_ascii_lowercase());
            prev_lower = false;
        } else {
            out.push(c);
            prev_lower = c.is_ascii_lowercase() || c.is_ascii_digit();
        }
    }
    out
}

/// Name protoc gives the implicit entry message of a map field:
/// `scalar_map` and `scalarMap` both become `ScalarMapEntry`.
pub(crate) fn map_entry_name(field: &str) -> String {
    let mut out = String::with_capacity(field.len() + 5);
    let mut capitalize_next = true;
    for c in field.chars() {
        if c == '_' {
            capitalize_next = true;
        } else if capitalize_next {
            out.push(c.to_ascii_uppercase());
            capitalize_next = false;
        } else {
            out.push(c);
        }
    }
    out.push_str("Entry");
    out
}

/// JSON name protoc records for a field: `my_field_name` becomes `myFieldName`
pub(crate) fn json_name(field: &str) -> String {
    let mut result = String::with_capacity(field.len());
    let mut capitalize_next = false;

    for c in field.chars() {
        if c == '_' {
            capitalize_next = true;
        } else if capitalize_next {
            result.push(c.to_ascii_uppercase());
            capitalize_next = false;
        } else {
            result.push(c);
        }
    }

    result
}

/// Escape a string for proto syntax
pub(crate) fn escape_string(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => result.push_str("\\\\"),
            '"' => result.push_str("\\\""),
            '\'' => result.push_str("\\'"),
            '\n' => result.push_str("\\n"),
            '\r' => result.push_str("\\r"),
            '\t' => result.push_str("\\t"),
            _ if c.is_ascii_control() => {
                result.push_str(&format!("\\x{:02x}", c as u8));
            }
            _ => result.push(c),
        }
    }
    result
}
