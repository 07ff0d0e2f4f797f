use std::sync::Arc;

use tracing::{debug, warn};

use super::work_item::{BatchShape, WorkItem};
use crate::dao::DaoResult;
use crate::store::ArtifactRegistry;

/// Turns a validated batch request into an ordered list of work items.
pub struct BatchRequestResolver {
    registry: Arc<dyn ArtifactRegistry>,
}

impl BatchRequestResolver {
    pub fn new(registry: Arc<dyn ArtifactRegistry>) -> Self {
        Self { registry }
    }

    pub async fn resolve(&self, shape: &BatchShape) -> DaoResult<Vec<WorkItem>> {
        match shape {
            BatchShape::Paths(paths) => Ok(paths
                .iter()
                .filter_map(|path| {
                    let item = parse_artifact_path(path);
                    if item.is_none() {
                        warn!(path = %path, "Dropping artifact path with unexpected layout");
                    }
                    item
                })
                .collect()),
            BatchShape::DeviceDate {
                device_id,
                local_date,
                time_blocks,
            } => {
                let mut files = self
                    .registry
                    .find_for_device_date(device_id, local_date, time_blocks.as_ref())
                    .await?;
                files.sort_by(|a, b| a.time_block.cmp(&b.time_block));
                debug!(device_id = %device_id, local_date = %local_date, count = files.len(), "Resolved artifacts");
                Ok(files.into_iter().map(WorkItem::from).collect())
            }
        }
    }
}

/// Parses `{prefix}/{device_id}/{local_date}/{time_block}/{filename}`.
///
/// Empty segments are ignored. With more than five segments the prefix
/// absorbs the extra leading ones.
pub fn parse_artifact_path(path: &str) -> Option<WorkItem> {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    if segments.len() < 5 {
        return None;
    }
    let tail = &segments[segments.len() - 4..];
    Some(WorkItem {
        artifact_path: path.to_string(),
        device_id: tail[0].to_string(),
        local_date: tail[1].to_string(),
        time_block: tail[2].to_string(),
    })
}
