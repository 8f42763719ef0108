pub mod browser;
pub mod config;
pub mod error;
pub mod lab;

pub use config::{
    load_lab_config, AdjustmentSection, BrowserSection, EnvironmentSection, LabConfig,
    SelectorSection, TimingSection, ENV_OVERRIDE_VARS,
};
pub use error::{ConfigError, Result};
pub use lab::{
    ActionOutcome, CourseSection, CourseTab, Environment, InterfaceVariant, LabAction, LabError,
    LabMetrics, LabResult, LabSession, LabState, LabStatus, Locator, PageDriver, RecreateReport,
    SectionKind, StatusSource,
};
