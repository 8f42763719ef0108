mod actions;
mod adjust;
mod driver;
mod environment;
mod error;
mod impersonate;
mod interface;
mod metrics;
mod recreate;
mod session;
mod status;
mod steps;
mod tabs;
mod toc;
mod wait;

pub use actions::{await_caption, ActionOutcome, LabAction};
pub use adjust::{parse_hours_remaining, AdjustmentRow};
pub use driver::{Locator, PageDriver, PageLink};
pub use environment::Environment;
pub use error::{LabError, LabResult};
pub use interface::{InterfaceDetector, InterfaceVariant};
pub use metrics::LabMetrics;
pub use recreate::RecreateReport;
pub use session::LabSession;
pub use status::{label, ButtonPanel, ButtonPosition, LabState, LabStatus, StatusSource};
pub use steps::StepLog;
pub use tabs::CourseTab;
pub use toc::{collect_sections, CourseSection, SectionKind};
