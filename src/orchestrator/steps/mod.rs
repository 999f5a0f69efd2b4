//! Concrete steps composed into the content orchestrator's flows.

pub mod lesson;
pub mod media;
pub mod unit;

pub use lesson::{
    ExtractLessonMetadata, FastLessonMetadata, GenerateDidacticSnippet, GenerateGlossary, GenerateMCQs,
    GenerateMisconceptionBank, GenerateShortAnswers,
};
pub use media::GeneratePodcastTranscript;
pub use unit::{ExtractUnitMetadata, GenerateSourceMaterial, GenerateUnitArtDescription, GenerateUnitSummary};
