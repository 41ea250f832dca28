//! Analysis service integration

pub mod session;

pub use session::{AnalysisSession, SessionClient};
