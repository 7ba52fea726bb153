//! Message templating
//!
//! Templates contain `{name}` placeholders that are replaced with the
//! matching parameter. `{{` and `}}` produce literal braces.

use crate::error::{AlarmError, Result};
use crate::params::Params;

/// Render `template`, substituting every `{key}` with `params[key]`
pub fn render(template: &str, params: &Params) -> Result<String> {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '{' => {
                if chars.peek() == Some(&'{') {
                    chars.next();
                    out.push('{');
                    continue;
                }

                let mut key = String::new();
                loop {
                    match chars.next() {
                        Some('}') => break,
                        Some('{') => {
                            return Err(AlarmError::Template(format!(
                                "unexpected '{{' inside placeholder in {:?}",
                                template
                            )))
                        }
                        Some(ch) => key.push(ch),
                        None => {
                            return Err(AlarmError::Template(format!(
                                "unterminated placeholder in {:?}",
                                template
                            )))
                        }
                    }
                }

                let value = params
                    .get(&key)
                    .ok_or_else(|| AlarmError::MissingTemplateKey(key.clone()))?;
                out.push_str(&value.to_string());
            }
            '}' => {
                if chars.peek() == Some(&'}') {
                    chars.next();
                    out.push('}');
                } else {
                    return Err(AlarmError::Template(format!(
                        "single '}}' encountered in {:?}",
                        template
                    )));
                }
            }
            _ => out.push(c),
        }
    }

    Ok(out)
}

/// Placeholder names referenced by a template, in order of appearance
pub fn placeholders(template: &str) -> Vec<String> {
    let mut keys = Vec::new();
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '{' {
            continue;
        }
        if chars.peek() == Some(&'{') {
            chars.next();
            continue;
        }
        let key: String = chars.by_ref().take_while(|&ch| ch != '}').collect();
        if !keys.contains(&key) {
            keys.push(key);
        }
    }

    keys
}
