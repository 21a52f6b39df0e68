//! Onboarding wizard state machine.
//!
//! A linear walk over an ordered list of question steps:
//! `Start -> Step[0] -> ... -> Step[n-1] -> Submitted`.
//!
//! `next` advances only when the current step's answer is present; `back`
//! retreats without validation; `submit` is allowed only at the last step
//! and is all-or-nothing across every collected field. The question bank
//! itself (prompt text, option lists) lives with the UI; the machine only
//! cares about step kinds and answer presence.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::preferences::LocationAnswer;

/// What kind of answer a step collects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepKind {
    /// Free-text input (the open-ended reflection).
    Text,
    /// Zero-or-more selections from a fixed option list.
    Multiple,
    /// Exactly one selection from a fixed option list.
    Radio,
    /// The optional geolocation prompt.
    Location,
}

/// One question step in the wizard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WizardStep {
    /// Stable identifier used to map answers to preference fields.
    pub id: String,
    pub kind: StepKind,
}

impl WizardStep {
    pub fn new(id: impl Into<String>, kind: StepKind) -> Self {
        Self {
            id: id.into(),
            kind,
        }
    }
}

/// A collected answer for a single step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StepAnswer {
    Text(String),
    Choices(Vec<String>),
    Choice(String),
    Location(LocationAnswer),
}

impl StepAnswer {
    /// Whether the answer counts as "present" for advancement.
    ///
    /// Text and choice answers must be non-empty; any terminal location
    /// value — granted, denied, skipped, unavailable — counts as answered.
    pub fn is_answered(&self) -> bool {
        match self {
            StepAnswer::Text(text) => !text.trim().is_empty(),
            StepAnswer::Choices(choices) => !choices.is_empty(),
            StepAnswer::Choice(choice) => !choice.is_empty(),
            StepAnswer::Location(_) => true,
        }
    }

    fn matches_kind(&self, kind: StepKind) -> bool {
        matches!(
            (self, kind),
            (StepAnswer::Text(_), StepKind::Text)
                | (StepAnswer::Choices(_), StepKind::Multiple)
                | (StepAnswer::Choice(_), StepKind::Radio)
                | (StepAnswer::Location(_), StepKind::Location)
        )
    }
}

/// The wizard state machine.
#[derive(Debug, Clone)]
pub struct OnboardingWizard {
    steps: Vec<WizardStep>,
    answers: Vec<Option<StepAnswer>>,
    current: usize,
    submitted: bool,
}

impl OnboardingWizard {
    /// Start a wizard over the given steps. At least one step is required.
    pub fn new(steps: Vec<WizardStep>) -> Result<Self> {
        if steps.is_empty() {
            return Err(Error::Validation("wizard requires at least one step".into()));
        }
        let answers = vec![None; steps.len()];
        Ok(Self {
            steps,
            answers,
            current: 0,
            submitted: false,
        })
    }

    /// Index of the step currently presented.
    pub fn current_index(&self) -> usize {
        self.current
    }

    /// The step currently presented.
    pub fn current_step(&self) -> &WizardStep {
        &self.steps[self.current]
    }

    /// Whether the wizard has reached the terminal `Submitted` state.
    pub fn is_submitted(&self) -> bool {
        self.submitted
    }

    /// Whether the current step holds a present answer.
    pub fn can_advance(&self) -> bool {
        self.answers[self.current]
            .as_ref()
            .map(StepAnswer::is_answered)
            .unwrap_or(false)
    }

    /// Record or replace the answer for the current step.
    ///
    /// The answer's shape must match the step kind; a mismatched shape is
    /// rejected without changing state.
    pub fn set_answer(&mut self, answer: StepAnswer) -> Result<()> {
        if self.submitted {
            return Err(Error::Validation("wizard already submitted".into()));
        }
        let step = &self.steps[self.current];
        if !answer.matches_kind(step.kind) {
            return Err(Error::Validation(format!(
                "answer shape does not match step '{}'",
                step.id
            )));
        }
        self.answers[self.current] = Some(answer);
        Ok(())
    }

    /// Advance one step. Blocked while the current answer is absent or
    /// empty, at the final step, and after submission.
    pub fn next(&mut self) -> Result<()> {
        if self.submitted {
            return Err(Error::Validation("wizard already submitted".into()));
        }
        if !self.can_advance() {
            return Err(Error::Validation(format!(
                "step '{}' is unanswered",
                self.current_step().id
            )));
        }
        if self.current + 1 >= self.steps.len() {
            return Err(Error::Validation(
                "already at the final step; submit instead".into(),
            ));
        }
        self.current += 1;
        Ok(())
    }

    /// Retreat one step, no validation. A no-op at the first step.
    pub fn back(&mut self) {
        if !self.submitted {
            self.current = self.current.saturating_sub(1);
        }
    }

    /// Submit the wizard. Allowed only at the last step; every step must
    /// hold a present answer — the submission is all-or-nothing.
    ///
    /// Returns `(step id, answer)` pairs in step order and moves the
    /// machine to `Submitted`.
    pub fn submit(&mut self) -> Result<Vec<(String, StepAnswer)>> {
        if self.submitted {
            return Err(Error::Validation("wizard already submitted".into()));
        }
        if self.current + 1 != self.steps.len() {
            return Err(Error::Validation(
                "submit is only available at the final step".into(),
            ));
        }
        for (step, answer) in self.steps.iter().zip(&self.answers) {
            let answered = answer.as_ref().map(StepAnswer::is_answered).unwrap_or(false);
            if !answered {
                return Err(Error::Validation(format!(
                    "step '{}' is unanswered",
                    step.id
                )));
            }
        }

        self.submitted = true;
        let collected = self
            .steps
            .iter()
            .zip(self.answers.iter())
            .map(|(step, answer)| {
                (
                    step.id.clone(),
                    answer.clone().expect("checked above: every step answered"),
                )
            })
            .collect();
        Ok(collected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn onboarding_steps() -> Vec<WizardStep> {
        vec![
            WizardStep::new("openEnded", StepKind::Text),
            WizardStep::new("causes", StepKind::Multiple),
            WizardStep::new("helpMethod", StepKind::Multiple),
            WizardStep::new("changeScope", StepKind::Radio),
            WizardStep::new("location", StepKind::Location),
        ]
    }

    fn answered_wizard_at_last_step() -> OnboardingWizard {
        let mut wizard = OnboardingWizard::new(onboarding_steps()).unwrap();
        wizard
            .set_answer(StepAnswer::Text("clean rivers".into()))
            .unwrap();
        wizard.next().unwrap();
        wizard
            .set_answer(StepAnswer::Choices(vec!["environment".into()]))
            .unwrap();
        wizard.next().unwrap();
        wizard
            .set_answer(StepAnswer::Choices(vec!["volunteering".into()]))
            .unwrap();
        wizard.next().unwrap();
        wizard.set_answer(StepAnswer::Choice("local".into())).unwrap();
        wizard.next().unwrap();
        wizard
            .set_answer(StepAnswer::Location(LocationAnswer::Skipped))
            .unwrap();
        wizard
    }

    #[test]
    fn test_empty_step_list_rejected() {
        assert!(OnboardingWizard::new(vec![]).is_err());
    }

    #[test]
    fn test_next_blocked_without_answer() {
        let mut wizard = OnboardingWizard::new(onboarding_steps()).unwrap();
        assert!(!wizard.can_advance());
        assert!(wizard.next().is_err());
        assert_eq!(wizard.current_index(), 0);
    }

    #[test]
    fn test_next_blocked_on_whitespace_text() {
        let mut wizard = OnboardingWizard::new(onboarding_steps()).unwrap();
        wizard.set_answer(StepAnswer::Text("   ".into())).unwrap();
        assert!(wizard.next().is_err());
    }

    #[test]
    fn test_next_blocked_on_empty_choice_list() {
        let mut wizard = OnboardingWizard::new(onboarding_steps()).unwrap();
        wizard.set_answer(StepAnswer::Text("x".into())).unwrap();
        wizard.next().unwrap();
        wizard.set_answer(StepAnswer::Choices(vec![])).unwrap();
        assert!(wizard.next().is_err());
    }

    #[test]
    fn test_answer_shape_must_match_step_kind() {
        let mut wizard = OnboardingWizard::new(onboarding_steps()).unwrap();
        let err = wizard.set_answer(StepAnswer::Choice("environment".into()));
        assert!(err.is_err());
    }

    #[test]
    fn test_back_without_validation_and_noop_at_start() {
        let mut wizard = OnboardingWizard::new(onboarding_steps()).unwrap();
        wizard.back();
        assert_eq!(wizard.current_index(), 0);

        wizard.set_answer(StepAnswer::Text("x".into())).unwrap();
        wizard.next().unwrap();
        // Back never checks the current answer
        wizard.back();
        assert_eq!(wizard.current_index(), 0);
    }

    #[test]
    fn test_every_location_terminal_counts_as_answered() {
        for terminal in [
            LocationAnswer::Granted {
                latitude: 40.0,
                longitude: -74.0,
            },
            LocationAnswer::Denied,
            LocationAnswer::Skipped,
            LocationAnswer::Unavailable,
        ] {
            assert!(StepAnswer::Location(terminal).is_answered());
        }
    }

    #[test]
    fn test_submit_only_at_last_step() {
        let mut wizard = OnboardingWizard::new(onboarding_steps()).unwrap();
        wizard.set_answer(StepAnswer::Text("x".into())).unwrap();
        assert!(wizard.submit().is_err());
    }

    #[test]
    fn test_submit_blocked_with_last_step_unanswered() {
        let mut fresh = OnboardingWizard::new(onboarding_steps()).unwrap();
        fresh.set_answer(StepAnswer::Text("x".into())).unwrap();
        fresh.next().unwrap();
        fresh
            .set_answer(StepAnswer::Choices(vec!["environment".into()]))
            .unwrap();
        fresh.next().unwrap();
        fresh
            .set_answer(StepAnswer::Choices(vec!["donating".into()]))
            .unwrap();
        fresh.next().unwrap();
        fresh.set_answer(StepAnswer::Choice("local".into())).unwrap();
        fresh.next().unwrap();
        // At the location step without an answer: submit must be blocked
        assert!(fresh.submit().is_err());
        assert!(!fresh.is_submitted());
    }

    #[test]
    fn test_full_walk_submits_all_answers() {
        let mut wizard = answered_wizard_at_last_step();
        let collected = wizard.submit().unwrap();

        assert!(wizard.is_submitted());
        assert_eq!(collected.len(), 5);
        assert_eq!(collected[0].0, "openEnded");
        assert_eq!(collected[3].1, StepAnswer::Choice("local".into()));
    }

    #[test]
    fn test_no_transitions_after_submit() {
        let mut wizard = answered_wizard_at_last_step();
        wizard.submit().unwrap();

        assert!(wizard.next().is_err());
        assert!(wizard.submit().is_err());
        assert!(wizard.set_answer(StepAnswer::Text("late".into())).is_err());

        let at = wizard.current_index();
        wizard.back();
        assert_eq!(wizard.current_index(), at);
    }
}
