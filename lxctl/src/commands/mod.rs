pub mod lab;

pub use lab::{ImpersonateArgs, LabCommands, LabTarget, SectionFilter, SectionsArgs};
