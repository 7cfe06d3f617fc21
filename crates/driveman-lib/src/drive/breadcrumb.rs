//! Breadcrumb path from the root down to a folder.

use std::collections::HashSet;

use async_trait::async_trait;
use serde::Serialize;

use super::model::{DriveItem, ROOT_ID, ROOT_NAME};
use super::DriveClient;
use crate::errors::Result;

/// Most ancestors followed above the folder itself.
pub const MAX_DEPTH: usize = 10;

/// Anything that can fetch item metadata by id.
#[async_trait]
pub trait ItemSource: Send + Sync {
    async fn fetch_item(&self, id: &str) -> Result<DriveItem>;
}

#[async_trait]
impl ItemSource for DriveClient {
    async fn fetch_item(&self, id: &str) -> Result<DriveItem> {
        self.get_item(id).await
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Crumb {
    pub id: String,
    pub name: String,
}

impl Crumb {
    fn root() -> Self {
        Self {
            id: ROOT_ID.to_string(),
            name: ROOT_NAME.to_string(),
        }
    }

    fn of(item: &DriveItem) -> Self {
        Self {
            id: item.id.clone(),
            name: item.name.clone(),
        }
    }
}

/// Ordered path, root first, the folder itself last.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Breadcrumbs {
    pub crumbs: Vec<Crumb>,
    /// The walk stopped before reaching the root, at [`MAX_DEPTH`] or on a
    /// parent cycle.
    pub truncated: bool,
}

impl Breadcrumbs {
    /// `My Drive / Projects / 2024` style rendering.
    pub fn display_path(&self) -> String {
        let names: Vec<&str> = self.crumbs.iter().map(|c| c.name.as_str()).collect();
        if self.truncated && names.len() > 1 {
            format!("{} / … / {}", names[0], names[1..].join(" / "))
        } else {
            names.join(" / ")
        }
    }
}

/// Walk `parents[0]` upward from `folder_id`.
///
/// Stops at the `root` alias, at an ancestor with no parents (the real root
/// folder, which the synthetic root entry already stands for), or after
/// [`MAX_DEPTH`] ancestors, or at the first id already on the path. A failure fetching the folder itself is returned;
/// a failure fetching an ancestor is logged and ends the walk.
pub async fn build_breadcrumbs(source: &dyn ItemSource, folder_id: &str) -> Result<Breadcrumbs> {
    if folder_id.is_empty() || folder_id == ROOT_ID {
        return Ok(Breadcrumbs {
            crumbs: vec![Crumb::root()],
            truncated: false,
        });
    }

    let folder = source.fetch_item(folder_id).await?;
    let mut ancestors: Vec<Crumb> = Vec::new();
    let mut next = folder.parent().map(str::to_string);
    let mut truncated = false;
    let mut visited: HashSet<String> = HashSet::from([folder.id.clone()]);

    while let Some(parent_id) = next.take() {
        if parent_id == ROOT_ID {
            break;
        }
        if !visited.insert(parent_id.clone()) {
            truncated = true;
            tracing::warn!(folder_id, id = %parent_id, "parent cycle in breadcrumb walk");
            break;
        }
        if ancestors.len() >= MAX_DEPTH {
            truncated = true;
            tracing::debug!(folder_id, depth = MAX_DEPTH, "breadcrumb walk hit depth bound");
            break;
        }
        let parent = match source.fetch_item(&parent_id).await {
            Ok(item) => item,
            Err(e) => {
                tracing::warn!(id = %parent_id, error = %e, "stopping breadcrumb walk");
                break;
            }
        };
        match parent.parent() {
            Some(grandparent) => {
                next = Some(grandparent.to_string());
                ancestors.push(Crumb::of(&parent));
            }
            None => break,
        }
    }

    let mut crumbs = Vec::with_capacity(ancestors.len() + 2);
    crumbs.push(Crumb::root());
    crumbs.extend(ancestors.into_iter().rev());
    if folder.parent().is_some() {
        crumbs.push(Crumb::of(&folder));
    }

    Ok(Breadcrumbs { crumbs, truncated })
}
