use mongodb::{Database, IndexModel, options::IndexOptions};
use tracing::info;

use crate::models::{AudioFile, Transcript};

pub async fn ensure_indexes(db: &Database) -> Result<(), mongodb::error::Error> {
    // Artifact registry
    create_indexes(
        db,
        AudioFile::COLLECTION,
        vec![
            index_unique(bson::doc! { "file_path": 1 }),
            index(bson::doc! { "device_id": 1, "local_date": 1, "time_block": 1 }),
            index(bson::doc! { "transcriptions_status": 1 }),
        ],
    )
    .await?;

    // Transcripts: one row per dedupe key
    create_indexes(
        db,
        Transcript::COLLECTION,
        vec![
            index_unique(bson::doc! { "device_id": 1, "local_date": 1, "time_block": 1 }),
            index(bson::doc! { "local_date": 1, "device_id": 1 }),
        ],
    )
    .await?;

    info!("Database indexes ensured");
    Ok(())
}

async fn create_indexes(
    db: &Database,
    collection: &str,
    indexes: Vec<IndexModel>,
) -> Result<(), mongodb::error::Error> {
    let coll = db.collection::<bson::Document>(collection);
    coll.create_indexes(indexes).await?;
    Ok(())
}

fn index(keys: bson::Document) -> IndexModel {
    IndexModel::builder().keys(keys).build()
}

fn index_unique(keys: bson::Document) -> IndexModel {
    IndexModel::builder()
        .keys(keys)
        .options(IndexOptions::builder().unique(true).build())
        .build()
}
