use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LabMetrics {
    pub probes: u64,
    pub clicks: u64,
    pub confirmations: u64,
    pub transitions: u64,
    pub transition_timeouts: u64,
    pub tab_retries: u64,
    pub adjustment_clicks: u64,
}

impl LabMetrics {
    pub fn record_probe(&mut self) {
        self.probes = self.probes.saturating_add(1);
    }

    pub fn record_click(&mut self) {
        self.clicks = self.clicks.saturating_add(1);
    }

    pub fn record_confirmation(&mut self) {
        self.confirmations = self.confirmations.saturating_add(1);
    }

    pub fn record_transition(&mut self) {
        self.transitions = self.transitions.saturating_add(1);
    }

    pub fn record_transition_timeout(&mut self) {
        self.transition_timeouts = self.transition_timeouts.saturating_add(1);
    }

    pub fn record_tab_retry(&mut self) {
        self.tab_retries = self.tab_retries.saturating_add(1);
    }

    pub fn record_adjustment_click(&mut self) {
        self.adjustment_clicks = self.adjustment_clicks.saturating_add(1);
    }
}
