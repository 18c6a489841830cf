use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::transport::shell_quote;

/// Render one `export NAME=VALUE` line per variable, in key order
///
/// Values that aren't made only of shell-safe characters are single-quoted. An empty mapping
/// renders as an empty string.
pub fn render(variables: &BTreeMap<String, String>) -> Result<String> {
    let lines = variables
        .iter()
        .map(|(name, value)| {
            check_name(name)?;
            Ok(format!("export {}={}", name, shell_quote(value)))
        })
        .collect::<Result<Vec<String>>>()?;
    Ok(lines.join("\n"))
}

fn check_name(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let starts_well = chars
        .next()
        .map_or(false, |c| c.is_ascii_alphabetic() || c == '_');
    if starts_well && chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        Ok(())
    } else {
        Err(Error::InvalidEnvironment(format!("{name:?} is not a shell variable name")))
    }
}
