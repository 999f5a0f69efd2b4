//! 128-bit identifiers used throughout the core.
//!
//! Every aggregate (`FlowRun`, `FlowStepRun`, `LLMRequest`, `Unit`, `Lesson`)
//! is addressed by a random v4 [`uuid::Uuid`], matching the "128-bit unique
//! identifiers" requirement of the data model.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Newtype wrapper kept thin on purpose: it exists so call sites read
/// `FlowRunId` / `UnitId` / ... instead of bare `Uuid`, without adding
/// conversion ceremony at the persistence boundary.
macro_rules! id_type {
    ($name:ident) => {
        #[derive(
            Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord,
        )]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl std::str::FromStr for $name {
            type Err = uuid::Error;
            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(Uuid::parse_str(s)?))
            }
        }
    };
}

id_type!(FlowRunId);
id_type!(FlowStepRunId);
id_type!(LlmRequestId);
id_type!(UnitId);
id_type!(LessonId);
id_type!(ImageAssetId);
id_type!(AudioAssetId);
