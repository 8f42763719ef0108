#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;

use lx_core::lab::PageLink;
use lx_core::{CourseTab, InterfaceVariant, LabResult, Locator, PageDriver, SelectorSection};

/// In-memory course page. Lab buttons move through scripted states: clicking
/// a button queues the states registered for its caption and every read of
/// the button row advances the queue by one.
#[derive(Debug)]
pub struct FakePage {
    selectors: SelectorSection,
    pub interface: Option<InterfaceVariant>,
    pub tab_stuck_until_cookies: bool,
    pub cookie_banner: bool,
    pub cookie_banner_sticky: bool,
    pub tab_rerender_reads: u32,
    pub selected_tab: Option<String>,
    pub tab_clicks: u32,
    pub buttons: Vec<String>,
    pub pending: VecDeque<Vec<String>>,
    scripts: HashMap<String, Vec<Vec<String>>>,
    dialog: Option<(String, String)>,
    pub lab_clicks: Vec<String>,
    pub adjustments: HashMap<String, u32>,
    pub autostop_text: Option<String>,
    pub console_ready: bool,
    pub toc: Vec<PageLink>,
    pub url: String,
    pub navigations: Vec<String>,
    pub scripts_run: Vec<String>,
    pub reloads: u32,
    pub switch_user_available: bool,
    pub switch_form_open: bool,
    pub switch_rejected: bool,
    pub typed_username: Option<String>,
    pub impersonated_as: Option<String>,
}

fn owned(states: &[&[&str]]) -> Vec<Vec<String>> {
    states
        .iter()
        .map(|state| state.iter().map(|s| s.to_string()).collect())
        .collect()
}

impl FakePage {
    pub fn new(interface: InterfaceVariant, buttons: &[&str]) -> Self {
        Self {
            selectors: SelectorSection::default(),
            interface: Some(interface),
            tab_stuck_until_cookies: false,
            cookie_banner: false,
            cookie_banner_sticky: false,
            tab_rerender_reads: 0,
            selected_tab: None,
            tab_clicks: 0,
            buttons: buttons.iter().map(|s| s.to_string()).collect(),
            pending: VecDeque::new(),
            scripts: HashMap::new(),
            dialog: None,
            lab_clicks: Vec::new(),
            adjustments: HashMap::new(),
            autostop_text: Some("in an hour".to_string()),
            console_ready: true,
            toc: Vec::new(),
            url: "about:blank".to_string(),
            navigations: Vec::new(),
            scripts_run: Vec::new(),
            reloads: 0,
            switch_user_available: true,
            switch_form_open: false,
            switch_rejected: false,
            typed_username: None,
            impersonated_as: None,
        }
    }

    /// States the button row passes through after `caption` is clicked
    /// (after confirmation for STOP and DELETE).
    pub fn on_click(mut self, caption: &str, states: &[&[&str]]) -> Self {
        self.scripts.insert(caption.to_string(), owned(states));
        self
    }

    /// States already queued before any click, for labs caught mid-transition.
    pub fn pending(mut self, states: &[&[&str]]) -> Self {
        self.pending = owned(states).into();
        self
    }

    pub fn tab_locator(&self, tab: CourseTab) -> Option<Locator> {
        self.interface
            .map(|variant| variant.tab_locator(&self.selectors, tab))
    }

    pub fn adjustment_clicks(&self, row: &str) -> u32 {
        self.adjustments.get(row).copied().unwrap_or(0)
    }

    fn is_tab(&self, locator: &Locator) -> bool {
        [CourseTab::Index, CourseTab::Course, CourseTab::LabEnvironment]
            .iter()
            .any(|tab| self.tab_locator(*tab).as_ref() == Some(locator))
    }

    fn confirm_locator(&self, caption: &str) -> Locator {
        Locator::from_template(&self.selectors.confirm_button, "label", caption)
    }

    fn adjust_row(&self, locator: &Locator) -> Option<&'static str> {
        ["1", "2"].into_iter().find(|row| {
            &Locator::from_template(&self.selectors.adjust_button, "row", row) == locator
        })
    }

    fn is(&self, locator: &Locator, selector: &str) -> bool {
        locator.as_str() == selector
    }

    fn start_script(&mut self, caption: &str) {
        if let Some(states) = self.scripts.get(caption) {
            self.pending = states.clone().into();
        }
    }
}

#[async_trait(?Send)]
impl PageDriver for FakePage {
    async fn navigate(&mut self, url: &str) -> LabResult<()> {
        self.url = url.to_string();
        self.navigations.push(url.to_string());
        Ok(())
    }

    async fn reload(&mut self) -> LabResult<()> {
        self.reloads += 1;
        Ok(())
    }

    async fn current_url(&mut self) -> LabResult<String> {
        Ok(self.url.clone())
    }

    async fn count(&mut self, locator: &Locator) -> LabResult<usize> {
        let present = |flag: bool| usize::from(flag);
        let s = &self.selectors;
        let count = if self.is(locator, &s.new_interface_marker) {
            present(self.interface == Some(InterfaceVariant::New))
        } else if self.is(locator, &s.old_interface_marker) {
            present(self.interface == Some(InterfaceVariant::Old))
        } else if self.is_tab(locator) {
            1
        } else if self.is(locator, &s.lab_buttons) {
            self.buttons.len()
        } else if self
            .dialog
            .as_ref()
            .is_some_and(|(_, caption)| &self.confirm_locator(caption) == locator)
        {
            1
        } else if self.adjust_row(locator).is_some() {
            present(self.console_ready)
        } else if self.is(locator, &s.autostop_time) {
            present(self.autostop_text.is_some())
        } else if self.is(locator, &s.console_ready) {
            present(self.console_ready)
        } else if self.is(locator, &s.site_ready) || self.is(locator, &s.factory_site_ready) {
            1
        } else if self.is(locator, &s.new_toc_links) || self.is(locator, &s.old_toc_links) {
            self.toc.len()
        } else if self.is(locator, &s.switch_user_button) {
            present(self.switch_user_available)
        } else if self.is(locator, &s.impersonate_username)
            || self.is(locator, &s.impersonate_confirm)
        {
            present(self.switch_form_open)
        } else {
            0
        };
        Ok(count)
    }

    async fn texts(&mut self, locator: &Locator) -> LabResult<Vec<String>> {
        if self.is(locator, &self.selectors.lab_buttons) {
            if let Some(next) = self.pending.pop_front() {
                self.buttons = next;
            }
            return Ok(self.buttons.clone());
        }
        if self.is(locator, &self.selectors.autostop_time) {
            return Ok(self.autostop_text.iter().cloned().collect());
        }
        Ok(Vec::new())
    }

    async fn attribute(
        &mut self,
        locator: &Locator,
        _index: usize,
        name: &str,
    ) -> LabResult<Option<String>> {
        if name == "aria-selected" && self.is_tab(locator) {
            if self.tab_rerender_reads > 0 {
                self.tab_rerender_reads -= 1;
                return Err(lx_core::LabError::ElementNotFound(locator.to_string()));
            }
            let selected = self.selected_tab.as_deref() == Some(locator.as_str());
            return Ok(Some(selected.to_string()));
        }
        Ok(None)
    }

    async fn click(&mut self, locator: &Locator, index: usize) -> LabResult<()> {
        if self.is_tab(locator) {
            self.tab_clicks += 1;
            if !(self.tab_stuck_until_cookies && self.cookie_banner) {
                self.selected_tab = Some(locator.to_string());
            }
            return Ok(());
        }
        if self.is(locator, &self.selectors.lab_buttons) {
            let Some(caption) = self.buttons.get(index).cloned() else {
                return Err(lx_core::LabError::ElementNotFound(locator.to_string()));
            };
            self.lab_clicks.push(caption.clone());
            match caption.as_str() {
                "STOP" => self.dialog = Some((caption.clone(), "Stop".to_string())),
                "DELETE" => self.dialog = Some((caption.clone(), "Delete".to_string())),
                _ => self.start_script(&caption),
            }
            return Ok(());
        }
        if let Some((action, label)) = self.dialog.clone() {
            if self.confirm_locator(&label) == *locator {
                self.dialog = None;
                self.start_script(&action);
                return Ok(());
            }
        }
        if let Some(row) = self.adjust_row(locator) {
            *self.adjustments.entry(row.to_string()).or_insert(0) += 1;
            return Ok(());
        }
        if self.switch_user_available && self.is(locator, &self.selectors.switch_user_button) {
            self.switch_form_open = true;
            return Ok(());
        }
        if self.switch_form_open && self.is(locator, &self.selectors.impersonate_confirm) {
            if !self.switch_rejected {
                self.switch_form_open = false;
                self.impersonated_as = self.typed_username.take();
            }
            return Ok(());
        }
        Err(lx_core::LabError::ElementNotFound(locator.to_string()))
    }

    async fn type_text(&mut self, locator: &Locator, _index: usize, text: &str) -> LabResult<()> {
        if self.switch_form_open && self.is(locator, &self.selectors.impersonate_username) {
            self.typed_username = Some(text.to_string());
            return Ok(());
        }
        Err(lx_core::LabError::ElementNotFound(locator.to_string()))
    }

    async fn links(&mut self, locator: &Locator) -> LabResult<Vec<PageLink>> {
        let s = &self.selectors;
        if self.is(locator, &s.new_toc_links)
            || self.is(locator, &s.old_toc_links)
            || self.is(locator, &s.fallback_toc_links)
        {
            return Ok(self.toc.clone());
        }
        Ok(Vec::new())
    }

    async fn execute(&mut self, script: &str) -> LabResult<()> {
        self.scripts_run.push(script.to_string());
        Ok(())
    }

    async fn accept_cookie_consent(&mut self) -> LabResult<bool> {
        if self.cookie_banner && !self.cookie_banner_sticky {
            self.cookie_banner = false;
            return Ok(true);
        }
        Ok(false)
    }
}
