pub mod audio_file;
pub mod transcript;

pub use audio_file::{ArtifactStatus, AudioFile};
pub use transcript::{NO_SPEECH_SENTINEL, Transcript};
