//! `Lesson`: a unit of content owned by a [`super::Unit`], carrying a
//! structured `package` blob (`spec.md` §3).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::unit::LearnerLevel;
use crate::ids::{AudioAssetId, FlowRunId, LessonId, UnitId};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GlossaryTerm {
    pub id: String,
    pub term: String,
    pub definition: String,
    pub micro_check: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Glossary {
    pub terms: Vec<GlossaryTerm>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct McqOption {
    pub id: String,
    pub label: String,
    pub text: String,
    pub rationale_wrong: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct McqAnswerKey {
    pub label: String,
    pub option_id: String,
    pub rationale_right: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WrongAnswer {
    pub answer: String,
    pub explanation: String,
    pub misconception_ids: Vec<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Exercise {
    Mcq {
        id: String,
        lo_id: String,
        stem: String,
        options: Vec<McqOption>,
        answer_key: McqAnswerKey,
    },
    ShortAnswer {
        id: String,
        lo_id: String,
        stem: String,
        canonical_answer: String,
        acceptable_answers: Vec<String>,
        wrong_answers: Vec<WrongAnswer>,
        explanation_correct: String,
    },
}

impl Exercise {
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::Mcq { id, .. } | Self::ShortAnswer { id, .. } => id,
        }
    }

    #[must_use]
    pub fn lo_id(&self) -> &str {
        match self {
            Self::Mcq { lo_id, .. } | Self::ShortAnswer { lo_id, .. } => lo_id,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LessonMeta {
    pub lesson_id: LessonId,
    pub title: String,
    pub learner_level: LearnerLevel,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Confusable {
    pub id: String,
    pub term_a: String,
    pub term_b: String,
    pub distinction: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Misconception {
    pub id: String,
    pub statement: String,
    pub why_wrong: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LessonPackage {
    pub meta: LessonMeta,
    /// Subset of the parent unit's LO ids covered by this lesson.
    pub unit_learning_objective_ids: Vec<String>,
    pub objectives: Vec<String>,
    pub mini_lesson: String,
    pub glossary: Glossary,
    pub exercises: Vec<Exercise>,
    pub misconceptions: Vec<Misconception>,
    pub confusables: Vec<Confusable>,
}

#[derive(Debug, thiserror::Error)]
pub enum PackageInvariantError {
    #[error("exercise {exercise_id} references lo_id {lo_id} which is not in unit_learning_objective_ids")]
    LoIdNotCovered { exercise_id: String, lo_id: String },
    #[error("mcq {exercise_id} answer_key.option_id {option_id} does not match any option id")]
    DanglingAnswerKey { exercise_id: String, option_id: String },
    #[error("duplicate id {id} within lesson package")]
    DuplicateId { id: String },
}

impl LessonPackage {
    /// `spec.md` §3 invariants: every exercise's `lo_id` is covered, every
    /// `answer_key.option_id` resolves, and ids within the package are
    /// unique.
    pub fn check_invariants(&self) -> Result<(), PackageInvariantError> {
        let mut seen = std::collections::HashSet::new();
        let mut check_unique = |id: &str| -> Result<(), PackageInvariantError> {
            if !seen.insert(id.to_string()) {
                return Err(PackageInvariantError::DuplicateId { id: id.to_string() });
            }
            Ok(())
        };

        for term in &self.glossary.terms {
            check_unique(&term.id)?;
        }
        for misconception in &self.misconceptions {
            check_unique(&misconception.id)?;
        }
        for confusable in &self.confusables {
            check_unique(&confusable.id)?;
        }

        for exercise in &self.exercises {
            check_unique(exercise.id())?;
            if !self.unit_learning_objective_ids.iter().any(|lo| lo == exercise.lo_id()) {
                return Err(PackageInvariantError::LoIdNotCovered {
                    exercise_id: exercise.id().to_string(),
                    lo_id: exercise.lo_id().to_string(),
                });
            }
            if let Exercise::Mcq { id, options, answer_key, .. } = exercise {
                if !options.iter().any(|o| o.id == answer_key.option_id) {
                    return Err(PackageInvariantError::DanglingAnswerKey {
                        exercise_id: id.clone(),
                        option_id: answer_key.option_id.clone(),
                    });
                }
            }
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Lesson {
    pub id: LessonId,
    pub unit_id: UnitId,
    pub title: String,
    pub learner_level: LearnerLevel,
    pub source_material: Option<String>,
    pub flow_run_id: Option<FlowRunId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub package_version: u32,
    pub package: Option<LessonPackage>,
    pub podcast_transcript: Option<String>,
    pub podcast_audio_id: Option<AudioAssetId>,
    pub podcast_duration_seconds: Option<f64>,
}

impl Lesson {
    #[must_use]
    pub fn new(unit_id: UnitId, title: impl Into<String>, learner_level: LearnerLevel) -> Self {
        let now = Utc::now();
        Self {
            id: LessonId::new(),
            unit_id,
            title: title.into(),
            learner_level,
            source_material: None,
            flow_run_id: None,
            created_at: now,
            updated_at: now,
            package_version: 0,
            package: None,
            podcast_transcript: None,
            podcast_audio_id: None,
            podcast_duration_seconds: None,
        }
    }

    /// Replaces `package`, bumping the monotonic version (`spec.md` §3:
    /// `package_version` is incremented on every regeneration).
    pub fn set_package(&mut self, package: LessonPackage) {
        self.package = Some(package);
        self.package_version += 1;
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_package() -> LessonPackage {
        LessonPackage {
            meta: LessonMeta {
                lesson_id: LessonId::new(),
                title: "Ownership".into(),
                learner_level: LearnerLevel::Beginner,
            },
            unit_learning_objective_ids: vec!["lo_1".into()],
            objectives: vec!["Explain ownership".into()],
            mini_lesson: "Rust ownership ...".into(),
            glossary: Glossary { terms: vec![] },
            exercises: vec![Exercise::Mcq {
                id: "ex_1".into(),
                lo_id: "lo_1".into(),
                stem: "What happens when a value is moved?".into(),
                options: vec![McqOption {
                    id: "opt_a".into(),
                    label: "A".into(),
                    text: "The old binding is invalidated".into(),
                    rationale_wrong: None,
                }],
                answer_key: McqAnswerKey {
                    label: "A".into(),
                    option_id: "opt_a".into(),
                    rationale_right: None,
                },
            }],
            misconceptions: vec![],
            confusables: vec![],
        }
    }

    #[test]
    fn well_formed_package_passes_invariants() {
        assert!(sample_package().check_invariants().is_ok());
    }

    #[test]
    fn dangling_answer_key_is_rejected() {
        let mut package = sample_package();
        if let Exercise::Mcq { answer_key, .. } = &mut package.exercises[0] {
            answer_key.option_id = "opt_missing".into();
        }
        assert!(matches!(
            package.check_invariants(),
            Err(PackageInvariantError::DanglingAnswerKey { .. })
        ));
    }

    #[test]
    fn uncovered_lo_id_is_rejected() {
        let mut package = sample_package();
        package.unit_learning_objective_ids.clear();
        assert!(matches!(
            package.check_invariants(),
            Err(PackageInvariantError::LoIdNotCovered { .. })
        ));
    }

    #[test]
    fn set_package_bumps_version() {
        let mut lesson = Lesson::new(UnitId::new(), "Ownership", LearnerLevel::Beginner);
        assert_eq!(lesson.package_version, 0);
        lesson.set_package(sample_package());
        assert_eq!(lesson.package_version, 1);
        lesson.set_package(sample_package());
        assert_eq!(lesson.package_version, 2);
    }
}
