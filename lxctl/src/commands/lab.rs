use clap::{Args, Subcommand, ValueEnum};
use lx_core::SectionKind;

/// Lab lifecycle operations for one course.
#[derive(Subcommand, Debug, Clone)]
pub enum LabCommands {
    /// Creates the lab when none exists
    Create(LabTarget),
    /// Starts a stopped lab
    Start(LabTarget),
    /// Stops a running lab
    Stop(LabTarget),
    /// Deletes the lab
    Delete(LabTarget),
    /// Deletes any existing lab, creates a fresh one and extends its timers
    Recreate(LabTarget),
    /// Shows the lab buttons and the inferred lifecycle state
    Status(LabTarget),
    /// Lists course sections from the table of contents
    Sections(SectionsArgs),
    /// Switches the portal to another user and opens the course lab tab
    Impersonate(ImpersonateArgs),
}

impl LabCommands {
    pub fn name(&self) -> &'static str {
        match self {
            LabCommands::Create(_) => "create",
            LabCommands::Start(_) => "start",
            LabCommands::Stop(_) => "stop",
            LabCommands::Delete(_) => "delete",
            LabCommands::Recreate(_) => "recreate",
            LabCommands::Status(_) => "status",
            LabCommands::Sections(_) => "sections",
            LabCommands::Impersonate(_) => "impersonate",
        }
    }

    pub fn target(&self) -> &LabTarget {
        match self {
            LabCommands::Create(target)
            | LabCommands::Start(target)
            | LabCommands::Stop(target)
            | LabCommands::Delete(target)
            | LabCommands::Recreate(target)
            | LabCommands::Status(target) => target,
            LabCommands::Sections(args) => &args.target,
            LabCommands::Impersonate(args) => &args.target,
        }
    }

    /// False for commands that do their own navigation.
    pub fn opens_course(&self) -> bool {
        !matches!(self, LabCommands::Sections(_) | LabCommands::Impersonate(_))
    }

    /// The browser stays up after impersonation for interactive use.
    pub fn keeps_browser_open(&self) -> bool {
        matches!(self, LabCommands::Impersonate(_))
    }
}

#[derive(Args, Debug, Clone)]
pub struct LabTarget {
    /// Course identifier, e.g. rh124-9.3
    pub course: String,
    /// Environment (rol | factory | china); defaults to environments.default
    #[arg(short, long)]
    pub env: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct SectionsArgs {
    #[command(flatten)]
    pub target: LabTarget,
    /// Which sections to list
    #[arg(long, value_enum, default_value_t = SectionFilter::Exercises)]
    pub kind: SectionFilter,
}

#[derive(Args, Debug, Clone)]
pub struct ImpersonateArgs {
    #[command(flatten)]
    pub target: LabTarget,
    /// Portal username to switch to
    pub username: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SectionFilter {
    Exercises,
    Theory,
    All,
}

impl From<SectionFilter> for SectionKind {
    fn from(filter: SectionFilter) -> Self {
        match filter {
            SectionFilter::Exercises => SectionKind::Exercises,
            SectionFilter::Theory => SectionKind::Theory,
            SectionFilter::All => SectionKind::All,
        }
    }
}
