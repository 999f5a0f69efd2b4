//! Word-count budgets threaded through lesson generation. `spec.md` §4.4.2
//! names "length budgets" as part of the fast variant's output without
//! shaping it; shaped here so both the standard and fast variants share one
//! definition.

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct LengthBudgets {
    pub mini_lesson_words: u32,
    pub glossary_definition_words: u32,
    pub mcq_stem_words: u32,
}

impl Default for LengthBudgets {
    fn default() -> Self {
        Self { mini_lesson_words: 350, glossary_definition_words: 40, mcq_stem_words: 30 }
    }
}
