use std::collections::BTreeSet;

use async_trait::async_trait;
use bson::doc;
use mongodb::Database;
use koe_db::models::{ArtifactStatus, AudioFile};

use super::base::{BaseDao, DaoResult};
use crate::store::ArtifactRegistry;

pub struct AudioFileDao {
    pub base: BaseDao<AudioFile>,
}

impl AudioFileDao {
    pub fn new(db: &Database) -> Self {
        Self {
            base: BaseDao::new(db, AudioFile::COLLECTION),
        }
    }
}

#[async_trait]
impl ArtifactRegistry for AudioFileDao {
    async fn find_for_device_date(
        &self,
        device_id: &str,
        local_date: &str,
        time_blocks: Option<&BTreeSet<String>>,
    ) -> DaoResult<Vec<AudioFile>> {
        let mut filter = doc! { "device_id": device_id, "local_date": local_date };
        if let Some(blocks) = time_blocks {
            let blocks: Vec<&str> = blocks.iter().map(String::as_str).collect();
            filter.insert("time_block", doc! { "$in": blocks });
        }
        self.base
            .find_many(filter, Some(doc! { "time_block": 1 }))
            .await
    }

    async fn update_status(&self, file_path: &str, status: ArtifactStatus) -> DaoResult<bool> {
        self.base
            .update_one(
                doc! { "file_path": file_path },
                doc! { "$set": { "transcriptions_status": status.as_str() } },
            )
            .await
    }
}
