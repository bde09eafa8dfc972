//! The exam-taking session: attempt model, candidate answers, countdown, integrity
//! monitoring and the controller that orchestrates submission.

pub(crate) mod answers;
pub(crate) mod controller;
pub(crate) mod events;
pub(crate) mod integrity;
pub(crate) mod model;
pub(crate) mod progress;
pub(crate) mod state;
pub(crate) mod storage;
pub(crate) mod submission;
pub(crate) mod timer;


pub(crate) use controller::{
    CandidateCommand, Entry, SessionController, SessionHandle, SessionNotice, SessionOutcome,
};
pub(crate) use events::WindowEvents;
pub(crate) use model::SessionError;
