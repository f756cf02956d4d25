//! Type-name syntax
//!
//! Splits `Base(arg, arg, ...)` into its base name and top-level argument
//! substrings. Nesting depth is tracked across `(`/`)`; single-quoted and
//! backtick-quoted tokens are opaque (a doubled quote or a backslash escape
//! does not terminate them). Arguments are returned unparsed so each type
//! constructor decides whether they are nested types or literals.

use crate::{
    Error,
    Result,
};

/// A type name split at its top-level argument list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeName<'a> {
    /// The whole trimmed input, for error messages
    pub text: &'a str,
    /// Name before the argument list
    pub base: &'a str,
    /// `None` when the name carries no argument list at all; `Some(vec![])`
    /// for `Base()`
    pub arguments: Option<Vec<&'a str>>,
}

impl<'a> TypeName<'a> {
    /// Arguments, or an empty slice when there is no argument list
    pub fn args(&self) -> &[&'a str] {
        self.arguments.as_deref().unwrap_or(&[])
    }

    pub fn invalid(&self, reason: impl Into<String>) -> Error {
        Error::invalid_type_name(self.text, reason)
    }
}

/// Split a type name into base name and top-level arguments
pub fn split_type_name(input: &str) -> Result<TypeName<'_>> {
    let text = input.trim();
    if text.is_empty() {
        return Err(Error::invalid_type_name(input, "empty type name"));
    }

    let Some(open) = text.find('(') else {
        if text.contains(')') {
            return Err(Error::invalid_type_name(text, "unmatched parentheses"));
        }
        return Ok(TypeName { text, base: text, arguments: None });
    };
    if open == 0 {
        return Err(Error::invalid_type_name(text, "type name starts with '('"));
    }

    let base = text[..open].trim_end();
    let bytes = text.as_bytes();
    let mut depth = 0usize;
    let mut arguments = Vec::new();
    let mut arg_start = open + 1;
    let mut close = None;
    let mut pos = open;

    while pos < bytes.len() {
        match bytes[pos] {
            quote @ (b'\'' | b'`') => {
                pos = skip_quoted(text, pos, quote)?;
                continue;
            }
            b'(' => depth += 1,
            b')' => {
                depth -= 1;
                if depth == 0 {
                    arguments.push(&text[arg_start..pos]);
                    close = Some(pos);
                    break;
                }
            }
            b',' if depth == 1 => {
                arguments.push(&text[arg_start..pos]);
                arg_start = pos + 1;
            }
            _ => {}
        }
        pos += 1;
    }

    let Some(close) = close else {
        return Err(Error::invalid_type_name(text, "unmatched parentheses"));
    };
    let trailing = &text[close + 1..];
    if !trailing.is_empty() {
        let reason = if trailing.contains(')') {
            "unmatched parentheses".to_string()
        } else {
            format!("unexpected characters after ')': '{}'", trailing)
        };
        return Err(Error::invalid_type_name(text, reason));
    }

    let mut arguments: Vec<&str> =
        arguments.into_iter().map(str::trim).collect();
    // `Base()` has no arguments rather than one empty argument
    if arguments.len() == 1 && arguments[0].is_empty() {
        arguments.clear();
    } else if arguments.iter().any(|a| a.is_empty()) {
        return Err(Error::invalid_type_name(text, "empty argument"));
    }

    Ok(TypeName { text, base, arguments: Some(arguments) })
}

/// Position just past the quoted token starting at `start`
fn skip_quoted(text: &str, start: usize, quote: u8) -> Result<usize> {
    let bytes = text.as_bytes();
    let mut pos = start + 1;
    while pos < bytes.len() {
        match bytes[pos] {
            b'\\' => pos += 2,
            b if b == quote => {
                if bytes.get(pos + 1) == Some(&quote) {
                    pos += 2;
                } else {
                    return Ok(pos + 1);
                }
            }
            _ => pos += 1,
        }
    }
    Err(Error::invalid_type_name(text, "unterminated quoted token"))
}

/// Decode a single- or backtick-quoted token
pub fn unquote(token: &str) -> Result<String> {
    let token = token.trim();
    let bytes = token.as_bytes();
    let quote = match bytes.first() {
        Some(q @ (b'\'' | b'`')) => *q,
        _ => {
            return Err(Error::invalid_type_name(token, "expected a quoted token"))
        }
    };
    let end = skip_quoted(token, 0, quote)?;
    if end != token.len() {
        return Err(Error::invalid_type_name(
            token,
            "unexpected characters after quoted token",
        ));
    }

    let quote = quote as char;
    let mut out = String::with_capacity(token.len());
    let mut chars = token[1..token.len() - 1].chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some('r') => out.push('\r'),
                Some('0') => out.push('\0'),
                Some('b') => out.push('\u{8}'),
                Some(other) => out.push(other),
                None => {}
            },
            c if c == quote => {
                // Doubled quote
                chars.next();
                out.push(quote);
            }
            c => out.push(c),
        }
    }
    Ok(out)
}

/// Split `name Type` (a named tuple element) into its parts
///
/// Returns `None` when the argument is a bare type.
pub fn split_element_name(argument: &str) -> Result<Option<(String, &str)>> {
    let argument = argument.trim();
    if argument.starts_with('`') {
        let end = skip_quoted(argument, 0, b'`')?;
        let rest = argument[end..].trim_start();
        if rest.is_empty() {
            return Err(Error::invalid_type_name(
                argument,
                "tuple element name without a type",
            ));
        }
        return Ok(Some((unquote(&argument[..end])?, rest)));
    }

    for (pos, c) in argument.char_indices() {
        if c == '(' {
            return Ok(None);
        }
        if c.is_whitespace() {
            let name = &argument[..pos];
            let rest = argument[pos..].trim_start();
            return Ok(Some((name.to_string(), rest)));
        }
    }
    Ok(None)
}

/// Parse one enum item, `'name' = value`; `None` value when no `=` is given
pub fn parse_enum_item(argument: &str) -> Result<(String, Option<i64>)> {
    let argument = argument.trim();
    if !argument.starts_with('\'') {
        return Err(Error::invalid_type_name(
            argument,
            "enum item must start with a quoted name",
        ));
    }
    let end = skip_quoted(argument, 0, b'\'')?;
    let name = unquote(&argument[..end])?;
    let rest = argument[end..].trim_start();
    if rest.is_empty() {
        return Ok((name, None));
    }
    let Some(value) = rest.strip_prefix('=') else {
        return Err(Error::invalid_type_name(argument, "expected '='"));
    };
    let value = value.trim().parse::<i64>().map_err(|_| {
        Error::invalid_type_name(argument, "enum value is not an integer")
    })?;
    Ok((name, Some(value)))
}
