//! Per-item selection for one artifact kind, with a tri-state aggregate.
//!
//! Hosts query [`SelectionState::aggregate`] after each change instead of
//! subscribing to change events.

use crate::types::{LogicalState, TelemetryArtifact};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CheckState {
    Checked,
    Unchecked,
    Indeterminate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionItem {
    pub artifact: TelemetryArtifact,
    pub checked: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionState {
    items: Vec<SelectionItem>,
}

impl SelectionState {
    /// An item starts checked when its artifact is already disabled, so the
    /// checkbox reads "telemetry is off".
    pub fn from_artifacts(artifacts: &[TelemetryArtifact]) -> Self {
        Self {
            items: artifacts
                .iter()
                .map(|a| SelectionItem {
                    artifact: a.clone(),
                    checked: a.state == LogicalState::Disabled,
                })
                .collect(),
        }
    }

    pub fn items(&self) -> &[SelectionItem] {
        &self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Returns `false` when no item has that id.
    pub fn set_checked(&mut self, id: &str, checked: bool) -> bool {
        match self
            .items
            .iter_mut()
            .find(|i| i.artifact.id.eq_ignore_ascii_case(id))
        {
            Some(item) => {
                item.checked = checked;
                true
            }
            None => false,
        }
    }

    pub fn set_all(&mut self, checked: bool) {
        for item in &mut self.items {
            item.checked = checked;
        }
    }

    /// An empty selection is `Unchecked`.
    pub fn aggregate(&self) -> CheckState {
        let checked = self.items.iter().filter(|i| i.checked).count();
        if checked == 0 {
            CheckState::Unchecked
        } else if checked == self.items.len() {
            CheckState::Checked
        } else {
            CheckState::Indeterminate
        }
    }

    /// Artifacts currently checked, in list order.
    pub fn checked(&self) -> Vec<TelemetryArtifact> {
        self.items
            .iter()
            .filter(|i| i.checked)
            .map(|i| i.artifact.clone())
            .collect()
    }

    /// Commit is allowed when either kind is fully checked.
    pub fn commit_enabled(services: &SelectionState, tasks: &SelectionState) -> bool {
        services.aggregate() == CheckState::Checked || tasks.aggregate() == CheckState::Checked
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tasks() -> SelectionState {
        SelectionState::from_artifacts(&[
            TelemetryArtifact::task("\\NvTmRep_{1}", LogicalState::Disabled),
            TelemetryArtifact::task("\\NvTmMon_{1}", LogicalState::Enabled),
        ])
    }

    #[test]
    fn test_initial_check_follows_state() {
        let sel = tasks();
        assert!(sel.items()[0].checked);
        assert!(!sel.items()[1].checked);
        assert_eq!(sel.aggregate(), CheckState::Indeterminate);
    }

    #[test]
    fn test_aggregate_transitions() {
        let mut sel = tasks();
        assert!(sel.set_checked("\\nvtmmon_{1}", true));
        assert_eq!(sel.aggregate(), CheckState::Checked);
        sel.set_all(false);
        assert_eq!(sel.aggregate(), CheckState::Unchecked);
        assert!(!sel.set_checked("\\Missing", true));
        assert_eq!(SelectionState::default().aggregate(), CheckState::Unchecked);
    }

    #[test]
    fn test_commit_enabled() {
        let mut services = SelectionState::from_artifacts(&[TelemetryArtifact::service(
            "NvTelemetryContainer",
            "NVIDIA Telemetry Container",
            LogicalState::Enabled,
        )]);
        let mut task_sel = tasks();
        assert!(!SelectionState::commit_enabled(&services, &task_sel));

        task_sel.set_all(true);
        assert!(SelectionState::commit_enabled(&services, &task_sel));
        assert_eq!(task_sel.checked().len(), 2);

        task_sel.set_all(false);
        services.set_all(true);
        assert!(SelectionState::commit_enabled(&services, &task_sel));
    }
}
