pub mod audio_file;
pub mod base;
pub mod transcript;

pub use audio_file::AudioFileDao;
pub use base::{BaseDao, DaoError, DaoResult, UpsertAck};
pub use transcript::TranscriptDao;
