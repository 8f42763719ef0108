use thiserror::Error;

use super::actions::LabAction;
use super::status::LabStatus;

pub type LabResult<T> = Result<T, LabError>;

#[derive(Debug, Error)]
pub enum LabError {
    #[error("chromium launch failed: {0}")]
    Launch(String),
    #[error("cdp error: {0}")]
    Cdp(#[from] chromiumoxide::error::CdpError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("page script failed: {0}")]
    Script(String),
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("unknown environment: {0}")]
    UnknownEnvironment(String),
    #[error("base url for environment '{0}' not configured")]
    MissingBaseUrl(String),
    #[error("invalid tab name: {0} (expected index, course or lab-environment)")]
    InvalidTab(String),
    #[error("impersonation requires a username")]
    MissingUsername,
    #[error("switching to user '{0}' did not complete")]
    ImpersonationStalled(String),
    #[error("element not found: {0}")]
    ElementNotFound(String),
    #[error("could not select tab '{tab}' in {interface} interface")]
    TabSelectionFailed { tab: String, interface: String },
    #[error("{action} did not reach {expected:?} (last seen {observed})")]
    TransitionTimeout {
        action: LabAction,
        expected: Vec<String>,
        observed: LabStatus,
    },
    #[error("{action} confirmation dialog never became clickable")]
    ConfirmationMissing { action: LabAction },
    #[error("lab is in an unrecognised state {0}")]
    UnknownState(LabStatus),
    #[error("lab did not settle after {passes} recreate passes (last seen {observed})")]
    RecreateExhausted { passes: usize, observed: LabStatus },
}

impl LabError {
    pub fn is_transition_timeout(&self) -> bool {
        matches!(self, LabError::TransitionTimeout { .. })
    }
}
