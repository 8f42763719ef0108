pub mod commands;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use lx_core::browser::{BrowserLauncher, LaunchOverrides};
use lx_core::{
    load_lab_config, ActionOutcome, CourseSection, Environment, InterfaceVariant, LabConfig,
    LabError, LabMetrics, LabSession, LabState, LabStatus, PageDriver, RecreateReport,
    SectionKind, ENV_OVERRIDE_VARS,
};
use serde::Serialize;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::commands::LabCommands;

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(#[from] lx_core::ConfigError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("{0}")]
    Environment(LabError),
    #[error("{action} {course} ({environment}): {source}")]
    Lab {
        action: String,
        course: String,
        environment: String,
        #[source]
        source: LabError,
    },
    #[error("{action} {course} ({environment}): not logged in and running headless")]
    LoginRequired {
        action: String,
        course: String,
        environment: String,
    },
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Lab lifecycle control for online course environments", long_about = None)]
pub struct Cli {
    /// Path to lx.toml
    #[arg(long, default_value = "configs/lx.toml")]
    pub config: PathBuf,
    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
    /// Run Chromium without a window (overrides browser.headless)
    #[arg(long)]
    pub headless: bool,
    /// Debug-level logging
    #[arg(short, long)]
    pub verbose: bool,
    /// Wait for Enter before closing the browser
    #[arg(long)]
    pub keep_open: bool,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Lab lifecycle operations
    #[command(subcommand)]
    Lab(LabCommands),
    /// Configuration inspection
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Shows the effective environments, browser settings and overrides
    Show,
}

pub fn run(cli: Cli) -> Result<()> {
    init_tracing(cli.verbose);
    let context = AppContext::new(&cli)?;

    match &cli.command {
        Commands::Lab(command) => {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()?;
            runtime.block_on(context.run_lab(command, cli.format))
        }
        Commands::Config(ConfigCommands::Show) => render(&context.config_report(), cli.format),
    }
}

pub fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("lx_core=debug,lxctl=debug,info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

struct AppContext {
    config: Arc<LabConfig>,
    config_path: PathBuf,
    headless: Option<bool>,
    keep_open: bool,
}

impl AppContext {
    fn new(cli: &Cli) -> Result<Self> {
        let config = load_lab_config(&cli.config)?.with_env_overrides();
        Ok(Self {
            config: Arc::new(config),
            config_path: cli.config.clone(),
            headless: cli.headless.then_some(true),
            keep_open: cli.keep_open,
        })
    }

    fn environment(&self, requested: Option<&str>) -> Result<Environment> {
        requested
            .unwrap_or(&self.config.environments.default)
            .parse()
            .map_err(AppError::Environment)
    }

    fn headless(&self) -> bool {
        self.headless.unwrap_or(self.config.browser.headless)
    }

    fn config_report(&self) -> ConfigReport {
        let environments = Environment::ALL
            .iter()
            .map(|environment| EnvironmentEntry {
                name: *environment,
                base_url: environment
                    .base_url(&self.config.environments)
                    .ok()
                    .map(str::to_string),
            })
            .collect();
        let overrides = ENV_OVERRIDE_VARS
            .iter()
            .map(|variable| OverrideEntry {
                variable: variable.to_string(),
                set: std::env::var_os(variable).is_some(),
            })
            .collect();
        ConfigReport {
            config_path: self.config_path.clone(),
            default_environment: self.config.environments.default.clone(),
            environments,
            headless: self.headless(),
            executable_path: self.config.browser.executable_path.clone(),
            window_size: self.config.browser.window_size,
            max_recreate_passes: self.config.timing.max_recreate_passes,
            overrides,
        }
    }

    async fn run_lab(&self, command: &LabCommands, format: OutputFormat) -> Result<()> {
        let target = command.target();
        let environment = self.environment(target.env.as_deref())?;
        let ctx = OperationContext::new(command.name(), &target.course, environment);

        let launcher = BrowserLauncher::new(self.config.browser.clone());
        let automation = launcher
            .launch_with_overrides(LaunchOverrides {
                headless: self.headless,
            })
            .await
            .map_err(|err| ctx.fail(err))?;

        let result = match automation.new_driver().await {
            Ok(driver) => {
                let mut session = LabSession::new(driver, Arc::clone(&self.config), environment);
                self.execute(&mut session, command, &ctx, format).await
            }
            Err(err) => Err(ctx.fail(err)),
        };

        if self.keep_open || command.keeps_browser_open() {
            if let Err(err) = wait_for_enter("Press Enter to close the browser...").await {
                warn!(error = %err, "failed to read from stdin");
            }
        }
        if let Err(err) = automation.shutdown().await {
            warn!(error = %err, "browser shutdown failed");
        }
        result
    }

    async fn execute<D: PageDriver>(
        &self,
        session: &mut LabSession<D>,
        command: &LabCommands,
        ctx: &OperationContext,
        format: OutputFormat,
    ) -> Result<()> {
        let course = ctx.course.as_str();
        self.login(session, ctx).await?;
        if command.opens_course() {
            session
                .go_to_course(course, None)
                .await
                .map_err(|err| ctx.fail(err))?;
        }

        let outcome = match command {
            LabCommands::Create(_) => session.create(course).await,
            LabCommands::Start(_) => session.start(course).await,
            LabCommands::Stop(_) => session.stop(course).await,
            LabCommands::Delete(_) => session.delete(course).await,
            LabCommands::Recreate(_) => {
                let report = session
                    .recreate(course)
                    .await
                    .map_err(|err| ctx.fail(err))?;
                let output = RecreateOutput {
                    environment: ctx.environment,
                    report,
                    metrics: session.metrics().clone(),
                };
                return render(&output, format);
            }
            LabCommands::Status(_) => {
                let status = session.probe().await.map_err(|err| ctx.fail(err))?;
                let report = StatusReport {
                    course: course.to_string(),
                    environment: ctx.environment,
                    interface: session.interface_variant().await,
                    state: status.state(),
                    status,
                    metrics: session.metrics().clone(),
                };
                return render(&report, format);
            }
            LabCommands::Impersonate(args) => {
                session
                    .impersonate(&args.username, Some(course))
                    .await
                    .map_err(|err| ctx.fail(err))?;
                let report = ImpersonationReport {
                    course: course.to_string(),
                    environment: ctx.environment,
                    username: args.username.trim().to_string(),
                    interface: session.interface_variant().await,
                };
                return render(&report, format);
            }
            LabCommands::Sections(args) => {
                let kind = SectionKind::from(args.kind);
                let sections = session
                    .course_sections(course, kind)
                    .await
                    .map_err(|err| ctx.fail(err))?;
                let report = SectionsReport {
                    course: course.to_string(),
                    environment: ctx.environment,
                    kind,
                    sections,
                };
                return render(&report, format);
            }
        }
        .map_err(|err| ctx.fail(err))?;

        let report = OutcomeReport {
            action: ctx.action.clone(),
            course: course.to_string(),
            environment: ctx.environment,
            outcome,
            metrics: session.metrics().clone(),
        };
        render(&report, format)
    }

    /// Authentication is manual: when the portal is not ready the user logs
    /// in through the visible browser window and confirms on stdin.
    async fn login<D: PageDriver>(
        &self,
        session: &mut LabSession<D>,
        ctx: &OperationContext,
    ) -> Result<()> {
        let ready = session
            .open_portal(&ctx.course)
            .await
            .map_err(|err| ctx.fail(err))?;
        if ready {
            info!(environment = %ctx.environment, "portal ready, session already authenticated");
            return Ok(());
        }
        if self.headless() {
            return Err(AppError::LoginRequired {
                action: ctx.action.clone(),
                course: ctx.course.clone(),
                environment: ctx.environment.to_string(),
            });
        }
        wait_for_enter(&format!(
            "Log in to {} in the browser window, then press Enter to continue...",
            ctx.environment
        ))
        .await?;
        if !session.wait_for_site_ready().await {
            warn!(
                environment = %ctx.environment,
                "site still not ready after manual login, continuing"
            );
        }
        Ok(())
    }
}

struct OperationContext {
    action: String,
    course: String,
    environment: Environment,
}

impl OperationContext {
    fn new(action: &str, course: &str, environment: Environment) -> Self {
        Self {
            action: action.to_string(),
            course: course.to_string(),
            environment,
        }
    }

    fn fail(&self, source: LabError) -> AppError {
        AppError::Lab {
            action: self.action.clone(),
            course: self.course.clone(),
            environment: self.environment.to_string(),
            source,
        }
    }
}

async fn wait_for_enter(message: &str) -> Result<()> {
    eprintln!("{message}");
    let mut line = String::new();
    BufReader::new(tokio::io::stdin())
        .read_line(&mut line)
        .await?;
    Ok(())
}

fn render<T>(value: &T, format: OutputFormat) -> Result<()>
where
    T: Serialize + DisplayFallback,
{
    match format {
        OutputFormat::Text => {
            println!("{}", value.display());
            Ok(())
        }
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(value)?;
            println!("{}", json);
            Ok(())
        }
    }
}

trait DisplayFallback {
    fn display(&self) -> String;
}

#[derive(Debug, Serialize)]
struct OutcomeReport {
    action: String,
    course: String,
    environment: Environment,
    #[serde(flatten)]
    outcome: ActionOutcome,
    metrics: LabMetrics,
}

impl DisplayFallback for OutcomeReport {
    fn display(&self) -> String {
        format!(
            "{} {} ({}): {}",
            self.action, self.course, self.environment, self.outcome
        )
    }
}

#[derive(Debug, Serialize)]
struct StatusReport {
    course: String,
    environment: Environment,
    interface: InterfaceVariant,
    status: LabStatus,
    state: LabState,
    metrics: LabMetrics,
}

impl DisplayFallback for StatusReport {
    fn display(&self) -> String {
        format!(
            "Course: {} ({})\nInterface: {}\nButtons: {}\nState: {}",
            self.course, self.environment, self.interface, self.status, self.state
        )
    }
}

#[derive(Debug, Serialize)]
struct RecreateOutput {
    environment: Environment,
    #[serde(flatten)]
    report: RecreateReport,
    metrics: LabMetrics,
}

impl DisplayFallback for RecreateOutput {
    fn display(&self) -> String {
        let report = &self.report;
        let mut lines = vec![
            format!("Course: {} ({})", report.course_id, self.environment),
            format!("Initial: {} [{}]", report.initial, report.initial.state()),
            format!(
                "Passes: {} | deleted: {} | created: {}",
                report.passes,
                yes_no(report.deleted),
                yes_no(report.created)
            ),
            format!(
                "Adjustments: auto-stop +{}h | lifespan +{} clicks",
                report.autostop_clicks, report.lifespan_clicks
            ),
            format!(
                "Final: {} [{}]",
                report.final_status,
                report.final_status.state()
            ),
        ];
        if report.anomaly {
            lines.push("Note: initial state was not recognised, fallback path used".to_string());
        }
        lines.push(format!("Finished: {}", report.finished_at.to_rfc3339()));
        lines.join("\n")
    }
}

#[derive(Debug, Serialize)]
struct SectionsReport {
    course: String,
    environment: Environment,
    kind: SectionKind,
    sections: Vec<CourseSection>,
}

impl DisplayFallback for SectionsReport {
    fn display(&self) -> String {
        if self.sections.is_empty() {
            return format!("No {} sections found for {}", self.kind, self.course);
        }
        self.sections
            .iter()
            .map(|section| format!("{} -> {}", section.chapter_section, section.title))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[derive(Debug, Serialize)]
struct ImpersonationReport {
    course: String,
    environment: Environment,
    username: String,
    interface: InterfaceVariant,
}

impl DisplayFallback for ImpersonationReport {
    fn display(&self) -> String {
        format!(
            "Impersonating {} on {} ({}), {} interface",
            self.username, self.course, self.environment, self.interface
        )
    }
}

#[derive(Debug, Serialize)]
struct EnvironmentEntry {
    name: Environment,
    base_url: Option<String>,
}

#[derive(Debug, Serialize)]
struct OverrideEntry {
    variable: String,
    set: bool,
}

#[derive(Debug, Serialize)]
struct ConfigReport {
    config_path: PathBuf,
    default_environment: String,
    environments: Vec<EnvironmentEntry>,
    headless: bool,
    executable_path: Option<String>,
    window_size: [u32; 2],
    max_recreate_passes: usize,
    overrides: Vec<OverrideEntry>,
}

impl DisplayFallback for ConfigReport {
    fn display(&self) -> String {
        let mut lines = vec![
            format!("Config: {}", self.config_path.display()),
            format!("Default environment: {}", self.default_environment),
            "Environments:".to_string(),
        ];
        for entry in &self.environments {
            lines.push(format!(
                "  {}: {}",
                entry.name,
                entry.base_url.as_deref().unwrap_or("(not configured)")
            ));
        }
        lines.push(format!(
            "Browser: headless {} | window {}x{} | executable {}",
            yes_no(self.headless),
            self.window_size[0],
            self.window_size[1],
            self.executable_path.as_deref().unwrap_or("auto")
        ));
        lines.push(format!("Recreate passes: {}", self.max_recreate_passes));
        lines.push("Overrides:".to_string());
        for entry in &self.overrides {
            let state = if entry.set { "set" } else { "not set" };
            lines.push(format!("  {}: {state}", entry.variable));
        }
        lines.join("\n")
    }
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::SectionFilter;
    use chrono::Utc;
    use std::fs;
    use tempfile::TempDir;

    fn context_with(config: &str) -> AppContext {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("lx.toml");
        fs::write(&path, config).unwrap();
        let cli = Cli::try_parse_from([
            "lxctl",
            "--config",
            path.to_str().unwrap(),
            "lab",
            "status",
            "rh124-9.3",
        ])
        .unwrap();
        AppContext::new(&cli).unwrap()
    }

    #[test]
    fn parses_lab_command_with_environment() {
        let cli = Cli::try_parse_from([
            "lxctl", "--format", "json", "--headless", "lab", "recreate", "do280-4.18", "--env",
            "factory",
        ])
        .unwrap();
        assert!(cli.headless);
        assert!(matches!(cli.format, OutputFormat::Json));
        let Commands::Lab(command) = &cli.command else {
            panic!("expected lab command");
        };
        assert_eq!(command.name(), "recreate");
        assert_eq!(command.target().course, "do280-4.18");
        assert_eq!(command.target().env.as_deref(), Some("factory"));
    }

    #[test]
    fn sections_defaults_to_exercises() {
        let cli = Cli::try_parse_from(["lxctl", "lab", "sections", "rh124-9.3"]).unwrap();
        let Commands::Lab(LabCommands::Sections(args)) = &cli.command else {
            panic!("expected sections command");
        };
        assert_eq!(args.kind, SectionFilter::Exercises);
        assert_eq!(cli.config, PathBuf::from("configs/lx.toml"));
    }

    #[test]
    fn parses_impersonate_with_course_then_username() {
        let cli =
            Cli::try_parse_from(["lxctl", "lab", "impersonate", "rh124-9.3", "student01"]).unwrap();
        let Commands::Lab(command) = &cli.command else {
            panic!("expected lab command");
        };
        let LabCommands::Impersonate(args) = command else {
            panic!("expected impersonate command");
        };
        assert_eq!(args.target.course, "rh124-9.3");
        assert_eq!(args.username, "student01");
        assert!(!command.opens_course());
        assert!(command.keeps_browser_open());
        assert!(Cli::try_parse_from(["lxctl", "lab", "impersonate", "rh124-9.3"]).is_err());
    }

    #[test]
    fn config_show_lists_environments_and_overrides() {
        let cli = Cli::try_parse_from(["lxctl", "config", "show"]).unwrap();
        assert!(matches!(cli.command, Commands::Config(ConfigCommands::Show)));

        let context = context_with(
            r#"
[environments]
default = "factory"
factory = "https://factory.example.com/courses/"
"#,
        );
        let report = context.config_report();
        assert_eq!(report.default_environment, "factory");
        assert_eq!(report.environments.len(), 3);
        assert_eq!(
            report.environments[1].base_url.as_deref(),
            Some("https://factory.example.com/courses/")
        );
        assert_eq!(report.overrides.len(), ENV_OVERRIDE_VARS.len());

        let text = report.display();
        assert!(text.contains("Default environment: factory"));
        assert!(text.contains("  factory: https://factory.example.com/courses/"));
        assert!(text.contains("LX_CHROMIUM_PATH"));
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["environments"][0]["name"], "rol");
    }

    #[test]
    fn missing_course_is_rejected() {
        assert!(Cli::try_parse_from(["lxctl", "lab", "start"]).is_err());
    }

    #[test]
    fn environment_falls_back_to_config_default() {
        let context = context_with("[environments]\ndefault = \"china\"\n");
        assert_eq!(context.environment(None).unwrap(), Environment::China);
        assert_eq!(context.environment(Some("stage")).unwrap(), Environment::Factory);
        assert!(matches!(
            context.environment(Some("mars")),
            Err(AppError::Environment(LabError::UnknownEnvironment(_)))
        ));
    }

    #[test]
    fn headless_flag_overrides_config() {
        let context = context_with("[browser]\nheadless = false\n");
        assert!(!context.headless());
        let forced = AppContext {
            headless: Some(true),
            ..context
        };
        assert!(forced.headless());
    }

    #[test]
    fn shipped_config_parses() {
        let config = load_lab_config("../configs/lx.toml").unwrap();
        assert_eq!(config.environments.default, "rol");
        assert_eq!(config.adjustments.lifespan_clicks, 14);
    }

    #[test]
    fn lab_errors_name_action_course_and_environment() {
        let ctx = OperationContext::new("stop", "rh124-9.3", Environment::Rol);
        let err = ctx.fail(LabError::UnknownState(LabStatus::default()));
        assert_eq!(
            err.to_string(),
            "stop rh124-9.3 (rol): lab is in an unrecognised state (-, -)"
        );
    }

    #[test]
    fn outcome_report_renders_in_both_formats() {
        let report = OutcomeReport {
            action: "start".into(),
            course: "rh124-9.3".into(),
            environment: Environment::Rol,
            outcome: ActionOutcome::AlreadySatisfied {
                observed: LabStatus::new(Some("DELETE"), Some("STOP")),
            },
            metrics: LabMetrics::default(),
        };
        assert_eq!(
            report.display(),
            "start rh124-9.3 (rol): already satisfied (DELETE, STOP)"
        );
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["outcome"], "already_satisfied");
        assert_eq!(json["environment"], "rol");
    }

    #[test]
    fn recreate_output_flags_anomaly() {
        let output = RecreateOutput {
            environment: Environment::Factory,
            report: RecreateReport {
                course_id: "rh124-9.3".into(),
                initial: LabStatus::default(),
                passes: 1,
                anomaly: true,
                deleted: false,
                created: true,
                autostop_clicks: 2,
                lifespan_clicks: 14,
                final_status: LabStatus::new(Some("DELETE"), Some("STARTING")),
                finished_at: Utc::now(),
            },
            metrics: LabMetrics::default(),
        };
        let text = output.display();
        assert!(text.contains("Final: (DELETE, STARTING) [starting]"));
        assert!(text.contains("fallback path used"));
        let json = serde_json::to_value(&output).unwrap();
        assert_eq!(json["course_id"], "rh124-9.3");
        assert_eq!(json["lifespan_clicks"], 14);
    }
}
