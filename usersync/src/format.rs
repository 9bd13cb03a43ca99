use crate::mapping::UserGroupMapping;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::warn;

/// Delimiter used when none is configured
pub const DEFAULT_DELIMITER: char = ',';

/// How a user/group source is laid out, chosen from its file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    /// JSON object of user to array of group names
    Json,
    /// One record per line: user, then groups, split on `delimiter`
    Delimited { delimiter: char },
}

impl SourceFormat {
    pub fn for_path(path: &Path, delimiter: char) -> Self {
        let is_json = path
            .to_string_lossy()
            .to_ascii_lowercase()
            .ends_with(".json");

        if is_json {
            Self::Json
        } else {
            Self::Delimited { delimiter }
        }
    }

    pub fn parse(&self, content: &str) -> Result<UserGroupMapping, String> {
        match self {
            Self::Json => parse_json(content),
            Self::Delimited { delimiter } => Ok(parse_delimited(content, *delimiter)),
        }
    }
}

fn parse_json(content: &str) -> Result<UserGroupMapping, String> {
    let raw: BTreeMap<String, Vec<String>> =
        serde_json::from_str(content).map_err(|e| e.to_string())?;
    Ok(raw.into_iter().collect())
}

fn parse_delimited(content: &str, delimiter: char) -> UserGroupMapping {
    let mut mapping = UserGroupMapping::new();

    for (line_no, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }

        let mut fields = line.split(delimiter).map(strip_quotes);
        let user = fields.next().unwrap_or_default();
        if user.is_empty() {
            warn!("Skipping record {} with an empty user name", line_no + 1);
            continue;
        }

        mapping.insert(user, fields.filter(|group| !group.is_empty()));
    }

    mapping
}

/// Remove one surrounding quote character from each end of a field
fn strip_quotes(field: &str) -> &str {
    let field = field.strip_prefix('"').unwrap_or(field);
    field.strip_suffix('"').unwrap_or(field)
}
