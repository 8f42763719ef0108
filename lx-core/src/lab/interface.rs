use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::{SelectorSection, TimingSection};

use super::driver::{Locator, PageDriver};
use super::tabs::CourseTab;
use super::wait::wait_for_present;

/// The two course UI dialects. `New` is the PatternFly 5 layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterfaceVariant {
    Old,
    New,
}

impl InterfaceVariant {
    pub fn tab_locator(&self, selectors: &SelectorSection, tab: CourseTab) -> Locator {
        match self {
            InterfaceVariant::Old => Locator::from_template(&selectors.old_tab, "id", tab.old_id()),
            InterfaceVariant::New => {
                Locator::from_template(&selectors.new_tab, "label", tab.new_label())
            }
        }
    }

    pub fn tab_timeout(&self, timing: &TimingSection) -> Duration {
        match self {
            InterfaceVariant::Old => timing.old_tab_select(),
            InterfaceVariant::New => timing.tab_select(),
        }
    }

    /// Only the old layout is known to hide its tabs behind the consent overlay.
    pub fn recovers_with_cookie_consent(&self) -> bool {
        matches!(self, InterfaceVariant::Old)
    }
}

impl fmt::Display for InterfaceVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InterfaceVariant::Old => f.write_str("old"),
            InterfaceVariant::New => f.write_str("new"),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct InterfaceDetector {
    cached: Option<InterfaceVariant>,
}

impl InterfaceDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.cached = None;
    }

    /// Never fails: an undecidable page is treated as the new interface.
    pub async fn detect<D>(
        &mut self,
        driver: &mut D,
        selectors: &SelectorSection,
        timing: &TimingSection,
    ) -> InterfaceVariant
    where
        D: PageDriver + ?Sized,
    {
        if let Some(variant) = self.cached {
            return variant;
        }

        let new_marker = Locator::xpath(&selectors.new_interface_marker);
        let old_marker = Locator::xpath(&selectors.old_interface_marker);
        let variant = if marker_present(driver, &new_marker, timing).await {
            info!("detected interface type: new (PF5)");
            InterfaceVariant::New
        } else if marker_present(driver, &old_marker, timing).await {
            info!("detected interface type: old");
            InterfaceVariant::Old
        } else {
            warn!("could not detect interface type, defaulting to new");
            InterfaceVariant::New
        };
        self.cached = Some(variant);
        variant
    }
}

async fn marker_present<D>(driver: &mut D, marker: &Locator, timing: &TimingSection) -> bool
where
    D: PageDriver + ?Sized,
{
    match wait_for_present(
        driver,
        marker,
        timing.interface_detect(),
        timing.poll_interval(),
    )
    .await
    {
        Ok(found) => found,
        Err(err) => {
            debug!(error = %err, marker = %marker, "interface marker lookup failed");
            false
        }
    }
}
