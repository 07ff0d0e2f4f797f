use async_trait::async_trait;
use bson::doc;
use mongodb::Database;
use koe_db::models::Transcript;

use super::base::{BaseDao, DaoResult, UpsertAck};
use crate::pipeline::DedupeKey;
use crate::store::TranscriptStore;

pub struct TranscriptDao {
    pub base: BaseDao<Transcript>,
}

impl TranscriptDao {
    pub fn new(db: &Database) -> Self {
        Self {
            base: BaseDao::new(db, Transcript::COLLECTION),
        }
    }
}

#[async_trait]
impl TranscriptStore for TranscriptDao {
    async fn upsert(&self, row: &Transcript) -> DaoResult<UpsertAck> {
        self.base
            .upsert_one(
                doc! {
                    "device_id": &row.device_id,
                    "local_date": &row.local_date,
                    "time_block": &row.time_block,
                },
                doc! {
                    "$set": {
                        "transcription": &row.transcription,
                        "provider": &row.provider,
                        "model": &row.model,
                        "confidence": row.confidence,
                        "word_count": row.word_count as i64,
                        "processing_time_seconds": row.processing_time_seconds,
                        "estimated_duration_seconds": row.estimated_duration_seconds,
                    }
                },
            )
            .await
    }

    async fn find_by_key(&self, key: &DedupeKey) -> DaoResult<Option<Transcript>> {
        self.base
            .find_one(doc! {
                "device_id": &key.device_id,
                "local_date": &key.local_date,
                "time_block": &key.time_block,
            })
            .await
    }
}
