//! Typed builder for the `q` search expression of `files.list`.

use std::fmt;

use super::model::ROOT_ID;

/// Filter for listing one folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListQuery {
    pub parent: String,
    pub trashed: bool,
    pub name_contains: Option<String>,
}

impl ListQuery {
    /// Untrashed children of `folder_id` (root when absent or empty), optionally
    /// restricted to names containing `search`. A blank search adds no filter.
    pub fn new(folder_id: Option<&str>, search: Option<&str>) -> Self {
        let parent = folder_id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or(ROOT_ID)
            .to_string();
        let name_contains = search
            .filter(|s| !s.trim().is_empty())
            .map(str::to_string);
        Self {
            parent,
            trashed: false,
            name_contains,
        }
    }

    /// Render the query expression sent as `q`.
    pub fn to_query_string(&self) -> String {
        let mut q = format!(
            "trashed={} and '{}' in parents",
            self.trashed,
            escape_literal(&self.parent)
        );
        if let Some(name) = &self.name_contains {
            q.push_str(" and name contains '");
            q.push_str(&escape_literal(name));
            q.push('\'');
        }
        q
    }
}

impl fmt::Display for ListQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_query_string())
    }
}

/// Escape a value for use inside a single-quoted query literal.
pub fn escape_literal(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if c == '\\' || c == '\'' {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
