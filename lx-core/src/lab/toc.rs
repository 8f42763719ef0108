use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tokio::time::sleep;
use tracing::{debug, info};

use super::driver::{Locator, PageDriver, PageLink};
use super::error::{LabError, LabResult};
use super::interface::InterfaceVariant;
use super::session::LabSession;
use super::tabs::CourseTab;

const EXERCISE_KEYWORDS: &[&str] = &["Guided Exercise:", "Lab:"];

const EXCLUDED_THEORY_KEYWORDS: &[&str] = &[
    "Guided Exercise:",
    "Lab:",
    "Quiz:",
    "Summary",
    "Review:",
    "Preface:",
    "About This Course",
    "Orientation to the Classroom",
    "Comprehensive Review",
    "Course Objectives",
    "Course Overview",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseSection {
    pub title: String,
    pub url: String,
    pub chapter_section: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionKind {
    Exercises,
    Theory,
    All,
}

impl SectionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SectionKind::Exercises => "exercises",
            SectionKind::Theory => "theory",
            SectionKind::All => "all",
        }
    }

    fn describe(&self) -> &'static str {
        match self {
            SectionKind::Exercises => "Guided Exercises and Labs",
            SectionKind::Theory => "Theory sections",
            SectionKind::All => "All sections",
        }
    }

    pub fn includes(&self, title: &str) -> bool {
        match self {
            SectionKind::Exercises => EXERCISE_KEYWORDS.iter().any(|kw| title.contains(kw)),
            SectionKind::Theory => !EXCLUDED_THEORY_KEYWORDS.iter().any(|kw| title.contains(kw)),
            SectionKind::All => true,
        }
    }
}

impl fmt::Display for SectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SectionKind {
    type Err = LabError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "exercises" | "exercise" => Ok(SectionKind::Exercises),
            "theory" => Ok(SectionKind::Theory),
            "all" => Ok(SectionKind::All),
            other => Err(LabError::Configuration(format!(
                "unknown section kind '{other}' (expected exercises, theory or all)"
            ))),
        }
    }
}

fn chapter_section_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"ch[0-9]*s[0-9]*").expect("valid chapter regex"))
}

/// Filters TOC anchors into sections of `kind`, in page order.
///
/// Anchors without a `ch<N>s<M>` marker in their URL or without a title are
/// skipped. The first anchor for a given chapter section wins.
pub fn collect_sections(links: &[PageLink], kind: SectionKind) -> Vec<CourseSection> {
    let mut seen = HashSet::new();
    let mut sections = Vec::new();
    for link in links {
        let title = link.text.trim();
        if title.is_empty() || link.href.is_empty() {
            continue;
        }
        let Some(found) = chapter_section_pattern().find(&link.href) else {
            continue;
        };
        let chapter_section = found.as_str();
        if seen.contains(chapter_section) || !kind.includes(title) {
            continue;
        }
        seen.insert(chapter_section.to_string());
        sections.push(CourseSection {
            title: title.to_string(),
            url: link.href.clone(),
            chapter_section: chapter_section.to_string(),
        });
    }
    sections
}

impl<D: PageDriver> LabSession<D> {
    pub async fn course_sections(
        &mut self,
        course_id: &str,
        kind: SectionKind,
    ) -> LabResult<Vec<CourseSection>> {
        self.steps
            .step(format!("Getting {} for course {course_id}", kind.describe()));

        let current = self.driver.current_url().await.unwrap_or_default();
        if !current.contains(course_id) {
            let url = self
                .environment
                .course_url(&self.config.environments, course_id, None)?;
            self.driver.navigate(&url).await?;
            self.course_id = Some(course_id.to_string());
            self.interface.reset();
            self.wait_for_site_ready().await;
        }

        let links = match self.interface_variant().await {
            InterfaceVariant::Old => self.old_toc_links().await?,
            InterfaceVariant::New => self.new_toc_links().await?,
        };
        let sections = collect_sections(&links, kind);
        for section in &sections {
            debug!(title = %section.title, chapter_section = %section.chapter_section, "section");
        }
        info!(
            course = course_id,
            kind = %kind,
            count = sections.len(),
            "collected course sections"
        );
        Ok(sections)
    }

    async fn old_toc_links(&mut self) -> LabResult<Vec<PageLink>> {
        self.select_tab(CourseTab::Index).await?;
        let locator = Locator::xpath(&self.config.selectors.old_toc_links);
        self.driver.links(&locator).await
    }

    async fn new_toc_links(&mut self) -> LabResult<Vec<PageLink>> {
        let toc = Locator::xpath(&self.config.selectors.new_toc_links);
        if self.driver.count(&toc).await? == 0 {
            let toggle = Locator::xpath(&self.config.selectors.new_interface_marker);
            if self.driver.count(&toggle).await? > 0 {
                self.driver.click(&toggle, 0).await?;
                sleep(self.config.timing.tab_recovery_pause()).await;
            }
        }
        let links = self.driver.links(&toc).await?;
        if !links.is_empty() {
            return Ok(links);
        }
        debug!("no TOC panel links, falling back to any course page anchor");
        let fallback = Locator::xpath(&self.config.selectors.fallback_toc_links);
        self.driver.links(&fallback).await
    }
}
