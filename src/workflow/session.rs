//! Feedback session
//!
//! One uploaded image at a time: classify it, let the user confirm or correct
//! the label, then optionally save it into the collection.
//!
//! ```text
//! Idle --submit--> Predicted(Unanswered)
//!                    |--answer(Correct)----------------> label decided
//!                    |--answer(Incorrect)--choose_label-> label decided
//! label decided --save--> file written, stats recomputed
//! any state --submit--> replaced by the new image
//! ```

use std::path::PathBuf;

use image::DynamicImage;
use serde::Serialize;
use tracing::{info, warn};

use crate::collection::{CollectionStats, CollectionStore};
use crate::dataset::Label;
use crate::inference::{ImageSource, InferenceService, PredictionResult};
use crate::utils::error::{MpoxError, Result};

/// User's answer to "is this prediction correct?"
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum Confirmation {
    #[default]
    Unanswered,
    Correct,
    Incorrect { corrected: Option<Label> },
}

/// A prediction together with the user's feedback on it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedbackRecord {
    pub prediction: PredictionResult,
    pub confirmation: Confirmation,
}

impl FeedbackRecord {
    pub fn new(prediction: PredictionResult) -> Self {
        Self {
            prediction,
            confirmation: Confirmation::Unanswered,
        }
    }

    /// Label the image will be saved under, once decided
    pub fn final_label(&self) -> Option<Label> {
        match self.confirmation {
            Confirmation::Correct => Some(self.prediction.predicted_class),
            Confirmation::Incorrect { corrected } => corrected,
            Confirmation::Unanswered => None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub enum SessionState {
    #[default]
    Idle,
    Predicted {
        image: DynamicImage,
        record: FeedbackRecord,
    },
}

/// Collection counts after a save, or why they could not be read
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatsReport {
    Available(CollectionStats),
    Unavailable(String),
}

#[derive(Debug, Clone)]
pub struct SaveOutcome {
    pub path: PathBuf,
    pub label: Label,
    pub stats: StatsReport,
}

#[derive(Debug, Default)]
pub struct FeedbackSession {
    state: SessionState,
}

impl FeedbackSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn record(&self) -> Option<&FeedbackRecord> {
        match &self.state {
            SessionState::Predicted { record, .. } => Some(record),
            SessionState::Idle => None,
        }
    }

    pub fn prediction(&self) -> Option<&PredictionResult> {
        self.record().map(|r| &r.prediction)
    }

    /// Classify a new image, replacing any previous session.
    ///
    /// On failure the session is left idle.
    pub fn submit(
        &mut self,
        service: &InferenceService,
        source: ImageSource,
    ) -> Result<PredictionResult> {
        self.state = SessionState::Idle;

        let image = source.decode()?;
        let prediction = service.classify_image(&image)?;
        info!(
            "Predicted {} ({:.1}%)",
            prediction.predicted_class,
            prediction.confidence_percent()
        );

        self.state = SessionState::Predicted {
            image,
            record: FeedbackRecord::new(prediction.clone()),
        };
        Ok(prediction)
    }

    /// Record the user's confirmation
    pub fn answer(&mut self, confirmation: Confirmation) -> Result<()> {
        match &mut self.state {
            SessionState::Predicted { record, .. } => {
                record.confirmation = confirmation;
                Ok(())
            }
            SessionState::Idle => Err(MpoxError::InvalidTransition(
                "no prediction to confirm, submit an image first".to_string(),
            )),
        }
    }

    /// Choose the true label after marking the prediction incorrect
    pub fn choose_label(&mut self, label: Label) -> Result<()> {
        match &mut self.state {
            SessionState::Predicted { record, .. } => match &mut record.confirmation {
                Confirmation::Incorrect { corrected } => {
                    *corrected = Some(label);
                    Ok(())
                }
                other => Err(MpoxError::InvalidTransition(format!(
                    "a label can only be chosen for an incorrect prediction (current answer: {:?})",
                    other
                ))),
            },
            SessionState::Idle => Err(MpoxError::InvalidTransition(
                "no prediction to correct, submit an image first".to_string(),
            )),
        }
    }

    pub fn final_label(&self) -> Option<Label> {
        self.record().and_then(FeedbackRecord::final_label)
    }

    pub fn can_save(&self) -> bool {
        self.final_label().is_some()
    }

    /// Write the image under its decided label and recount the collection.
    ///
    /// A stats failure is reported in the outcome and does not undo the save.
    /// A save failure leaves the session unchanged so it can be retried.
    pub fn save(&self, store: &CollectionStore) -> Result<SaveOutcome> {
        let (image, record) = match &self.state {
            SessionState::Predicted { image, record } => (image, record),
            SessionState::Idle => {
                return Err(MpoxError::InvalidTransition(
                    "nothing to save, submit an image first".to_string(),
                ))
            }
        };

        let label = record.final_label().ok_or_else(|| {
            MpoxError::InvalidTransition("confirm or correct the label before saving".to_string())
        })?;

        let path = store.save(image, label, record.prediction.confidence)?;

        let stats = match store.stats() {
            Ok(stats) => StatsReport::Available(stats),
            Err(e) => {
                warn!("Could not load collection stats: {}", e);
                StatsReport::Unavailable(e.to_string())
            }
        };

        Ok(SaveOutcome { path, label, stats })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collection::FilenameTemplate;
    use crate::inference::preprocess::PreprocessConfig;
    use crate::inference::test_support::{solid_image, FixedNetwork};
    use crate::inference::Predictor;
    use tempfile::TempDir;

    fn service(logits: Vec<f32>) -> InferenceService {
        InferenceService::with_predictor(Predictor::with_network(
            Box::new(FixedNetwork::new(logits)),
            PreprocessConfig { image_size: 8 },
        ))
    }

    fn predicted_session(logits: Vec<f32>) -> FeedbackSession {
        let mut session = FeedbackSession::new();
        session
            .submit(&service(logits), ImageSource::Bitmap(solid_image(10, 10)))
            .unwrap();
        session
    }

    #[test]
    fn test_final_label_rules() {
        let prediction =
            PredictionResult::from_logits(&[2.0, 0.0], std::time::Duration::ZERO).unwrap();
        let mut record = FeedbackRecord::new(prediction);
        assert_eq!(record.final_label(), None);

        record.confirmation = Confirmation::Correct;
        assert_eq!(record.final_label(), Some(Label::MonkeyPox));

        record.confirmation = Confirmation::Incorrect { corrected: None };
        assert_eq!(record.final_label(), None);

        record.confirmation = Confirmation::Incorrect {
            corrected: Some(Label::Others),
        };
        assert_eq!(record.final_label(), Some(Label::Others));
    }

    #[test]
    fn test_answer_requires_prediction() {
        let mut session = FeedbackSession::new();
        assert!(matches!(
            session.answer(Confirmation::Correct),
            Err(MpoxError::InvalidTransition(_))
        ));
        assert!(!session.can_save());
    }

    #[test]
    fn test_unanswered_cannot_save() {
        let dir = TempDir::new().unwrap();
        let store = CollectionStore::new(dir.path(), FilenameTemplate::default());
        let session = predicted_session(vec![2.0, 0.0]);

        assert!(!session.can_save());
        assert!(matches!(
            session.save(&store),
            Err(MpoxError::InvalidTransition(_))
        ));
        assert_eq!(store.stats().unwrap().total(), 0);
    }

    #[test]
    fn test_choose_label_only_after_incorrect() {
        let mut session = predicted_session(vec![2.0, 0.0]);
        assert!(session.choose_label(Label::Others).is_err());

        session.answer(Confirmation::Correct).unwrap();
        assert!(session.choose_label(Label::Others).is_err());

        session
            .answer(Confirmation::Incorrect { corrected: None })
            .unwrap();
        assert!(!session.can_save());
        session.choose_label(Label::Others).unwrap();
        assert_eq!(session.final_label(), Some(Label::Others));
    }

    #[test]
    fn test_confirmed_save_updates_stats() {
        let dir = TempDir::new().unwrap();
        let store = CollectionStore::new(dir.path(), FilenameTemplate::default());

        let mut session = predicted_session(vec![2.0, 0.0]);
        session.answer(Confirmation::Correct).unwrap();

        let outcome = session.save(&store).unwrap();
        assert_eq!(outcome.label, Label::MonkeyPox);
        assert!(outcome.path.starts_with(dir.path().join("Monkey Pox")));
        assert!(outcome.path.is_file());

        match outcome.stats {
            StatsReport::Available(stats) => {
                assert_eq!(stats.count(Label::MonkeyPox), 1);
                assert_eq!(stats.count(Label::Others), 0);
            }
            StatsReport::Unavailable(reason) => panic!("stats unavailable: {reason}"),
        }
    }

    #[test]
    fn test_corrected_save_uses_chosen_label() {
        let dir = TempDir::new().unwrap();
        let store = CollectionStore::new(dir.path(), FilenameTemplate::default());

        let mut session = predicted_session(vec![2.0, 0.0]);
        session
            .answer(Confirmation::Incorrect {
                corrected: Some(Label::Others),
            })
            .unwrap();

        let outcome = session.save(&store).unwrap();
        assert!(outcome.path.starts_with(store.label_dir(Label::Others)));
    }

    #[test]
    fn test_stats_failure_does_not_fail_save() {
        let dir = TempDir::new().unwrap();
        let store = CollectionStore::new(dir.path(), FilenameTemplate::default());
        // Unreadable directory for the other label
        std::fs::write(store.label_dir(Label::Others), b"x").unwrap();

        let mut session = predicted_session(vec![2.0, 0.0]);
        session.answer(Confirmation::Correct).unwrap();

        let outcome = session.save(&store).unwrap();
        assert!(outcome.path.is_file());
        assert!(matches!(outcome.stats, StatsReport::Unavailable(_)));
    }

    #[test]
    fn test_save_failure_keeps_session() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("collections");
        std::fs::write(&blocker, b"x").unwrap();
        let store = CollectionStore::new(&blocker, FilenameTemplate::default());

        let mut session = predicted_session(vec![0.0, 2.0]);
        session.answer(Confirmation::Correct).unwrap();

        assert!(matches!(session.save(&store), Err(MpoxError::Save { .. })));
        assert_eq!(session.final_label(), Some(Label::Others));
    }

    #[test]
    fn test_new_submit_replaces_session() {
        let svc = service(vec![0.0, 2.0]);
        let mut session = predicted_session(vec![2.0, 0.0]);
        session.answer(Confirmation::Correct).unwrap();

        let prediction = session
            .submit(&svc, ImageSource::Bitmap(solid_image(6, 6)))
            .unwrap();
        assert_eq!(prediction.predicted_class, Label::Others);
        assert_eq!(
            session.record().unwrap().confirmation,
            Confirmation::Unanswered
        );
    }

    #[test]
    fn test_failed_submit_returns_to_idle() {
        let mut session = predicted_session(vec![2.0, 0.0]);
        let result = session.submit(&service(vec![2.0, 0.0]), ImageSource::Bytes(vec![0, 1]));

        assert!(matches!(result, Err(MpoxError::InvalidImage(_))));
        assert!(matches!(session.state(), SessionState::Idle));
    }
}
