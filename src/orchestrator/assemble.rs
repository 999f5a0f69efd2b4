//! Builds the final [`LessonPackage`] from a lesson flow's step outputs
//! (`spec.md` §4.4.2: "assembling `package`"), kept as one pure,
//! independently testable function separate from the flow that drives it.

use crate::domain::lesson::{
    Confusable, Exercise, Glossary, GlossaryTerm, LessonMeta, LessonPackage, Misconception, PackageInvariantError,
};
use crate::domain::unit::LearnerLevel;
use crate::ids::LessonId;

use super::schemas::{McqSchema, ShortAnswerSchema};

/// Every artifact a lesson flow (standard or fast) has produced by the
/// time assembly runs.
pub struct LessonArtifacts {
    pub objectives: Vec<String>,
    pub misconceptions: Vec<Misconception>,
    pub confusables: Vec<Confusable>,
    pub mini_lesson: String,
    pub glossary_terms: Vec<GlossaryTerm>,
    pub mcqs: Vec<McqSchema>,
    pub short_answers: Vec<ShortAnswerSchema>,
}

pub struct PackageAssembler;

impl PackageAssembler {
    pub fn assemble(
        lesson_id: LessonId,
        title: String,
        learner_level: LearnerLevel,
        unit_learning_objective_ids: Vec<String>,
        artifacts: LessonArtifacts,
    ) -> Result<LessonPackage, PackageInvariantError> {
        let exercises = artifacts
            .mcqs
            .into_iter()
            .map(|mcq| Exercise::Mcq { id: mcq.id, lo_id: mcq.lo_id, stem: mcq.stem, options: mcq.options, answer_key: mcq.answer_key })
            .chain(artifacts.short_answers.into_iter().map(|sa| Exercise::ShortAnswer {
                id: sa.id,
                lo_id: sa.lo_id,
                stem: sa.stem,
                canonical_answer: sa.canonical_answer,
                acceptable_answers: sa.acceptable_answers,
                wrong_answers: sa.wrong_answers,
                explanation_correct: sa.explanation_correct,
            }))
            .collect();

        let package = LessonPackage {
            meta: LessonMeta { lesson_id, title, learner_level },
            unit_learning_objective_ids,
            objectives: artifacts.objectives,
            mini_lesson: artifacts.mini_lesson,
            glossary: Glossary { terms: artifacts.glossary_terms },
            exercises,
            misconceptions: artifacts.misconceptions,
            confusables: artifacts.confusables,
        };
        package.check_invariants()?;
        Ok(package)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::lesson::{McqAnswerKey, McqOption};

    fn sample_mcq() -> McqSchema {
        McqSchema {
            id: "ex_1".into(),
            lo_id: "lo_1".into(),
            stem: "What happens on move?".into(),
            options: vec![McqOption { id: "opt_a".into(), label: "A".into(), text: "invalidated".into(), rationale_wrong: None }],
            answer_key: McqAnswerKey { label: "A".into(), option_id: "opt_a".into(), rationale_right: None },
        }
    }

    #[test]
    fn assembles_a_well_formed_package() {
        let artifacts = LessonArtifacts {
            objectives: vec!["Explain ownership".into()],
            misconceptions: vec![],
            confusables: vec![],
            mini_lesson: "Ownership moves values...".into(),
            glossary_terms: vec![],
            mcqs: vec![sample_mcq()],
            short_answers: vec![],
        };
        let package = PackageAssembler::assemble(LessonId::new(), "Ownership".into(), LearnerLevel::Beginner, vec!["lo_1".into()], artifacts).unwrap();
        assert_eq!(package.exercises.len(), 1);
    }

    #[test]
    fn rejects_exercise_referencing_uncovered_lo() {
        let artifacts = LessonArtifacts {
            objectives: vec![],
            misconceptions: vec![],
            confusables: vec![],
            mini_lesson: "...".into(),
            glossary_terms: vec![],
            mcqs: vec![sample_mcq()],
            short_answers: vec![],
        };
        let err = PackageAssembler::assemble(LessonId::new(), "Ownership".into(), LearnerLevel::Beginner, vec!["lo_2".into()], artifacts).unwrap_err();
        assert!(matches!(err, PackageInvariantError::LoIdNotCovered { .. }));
    }
}
