//! Feedback and collection workflow
//!
//! Shared by every front end: the feedback session state machine, explicit
//! page navigation and the guidance text shown with a prediction.

pub mod guidance;
pub mod navigation;
pub mod session;

pub use guidance::{guidance, ConfidenceLevel, Guidance, DISCLAIMER};
pub use navigation::{NavAction, Page};
pub use session::{
    Confirmation, FeedbackRecord, FeedbackSession, SaveOutcome, SessionState, StatsReport,
};
