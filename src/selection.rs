//! Per-session selection and form state for the template view.

use crate::access::AccessControlData;
use crate::builder::DEFAULT_NETWORK;
use crate::engine::Network;
use crate::pipeline::DeployError;
use crate::template::{Template, TemplateType};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Exactly one template or none.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Selection {
    #[default]
    None,
    /// Working copy of the selected catalog entry
    Selected(Box<Template>),
}

impl Selection {
    pub fn template(&self) -> Option<&Template> {
        match self {
            Selection::None => None,
            Selection::Selected(template) => Some(template),
        }
    }

    pub fn template_mut(&mut self) -> Option<&mut Template> {
        match self {
            Selection::None => None,
            Selection::Selected(template) => Some(template),
        }
    }

    pub fn index(&self) -> Option<usize> {
        self.template().map(|t| t.index)
    }
}

/// What a call to [`SessionState::select`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionChange {
    Selected { index: usize, previous: Option<usize> },
    Deselected { index: usize },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormValues {
    pub name: String,
    pub network: Option<Network>,
    pub access_control: AccessControlData,
}

/// `None` fields match every template.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TemplateFilters {
    pub category: Option<String>,
    pub platform: Option<String>,
    pub template_type: TemplateType,
}

impl TemplateFilters {
    pub fn matches(&self, template: &Template) -> bool {
        if template.template_type != self.template_type {
            return false;
        }
        if let Some(category) = &self.category {
            if !template.categories.iter().any(|c| c == category) {
                return false;
            }
        }
        if let Some(platform) = &self.platform {
            if template.platform.as_deref() != Some(platform.as_str()) {
                return false;
            }
        }
        true
    }

    pub fn apply<'a>(&self, templates: &'a [Template]) -> Vec<&'a Template> {
        templates.iter().filter(|t| self.matches(t)).collect()
    }
}

/// Clears the in-progress flag when dropped.
#[derive(Debug)]
pub struct ActionGuard {
    flag: Arc<AtomicBool>,
}

impl Drop for ActionGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// View state owned by one user session.
#[derive(Debug, Default)]
pub struct SessionState {
    selection: Selection,
    pub form: FormValues,
    pub filters: TemplateFilters,
    pub show_advanced_options: bool,
    pub hide_descriptions: bool,
    pub show_deployment_selector: bool,
    pub form_validation_error: Option<String>,
    action_in_progress: Arc<AtomicBool>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn selected(&self) -> Option<&Template> {
        self.selection.template()
    }

    pub fn selected_mut(&mut self) -> Option<&mut Template> {
        self.selection.template_mut()
    }

    /// Select `template`, or deselect it if it is already the selection.
    ///
    /// Selecting a different template first deselects the current one. Entering a selection
    /// seeds the form's network and name from the template.
    pub fn select(&mut self, template: &Template, networks: &[Network]) -> SelectionChange {
        let previous = self.selection.index();
        if previous == Some(template.index) {
            self.deselect();
            return SelectionChange::Deselected {
                index: template.index,
            };
        }

        if previous.is_some() {
            self.deselect();
        }

        self.selection = Selection::Selected(Box::new(template.clone()));
        self.form.network = default_network(template, networks);
        self.form.name = template.name.clone().unwrap_or_default();

        SelectionChange::Selected {
            index: template.index,
            previous,
        }
    }

    /// Form values are kept.
    pub fn deselect(&mut self) {
        self.selection = Selection::None;
    }

    pub fn action_in_progress(&self) -> bool {
        self.action_in_progress.load(Ordering::Acquire)
    }

    /// Mark a submission as running; fails if one already is.
    pub fn try_begin_action(&self) -> Result<ActionGuard, DeployError> {
        self.action_in_progress
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| DeployError::Busy)?;
        Ok(ActionGuard {
            flag: Arc::clone(&self.action_in_progress),
        })
    }
}

/// The template's declared network if available, else `bridge`.
fn default_network(template: &Template, networks: &[Network]) -> Option<Network> {
    let by_name = |name: &str| networks.iter().find(|n| n.name == name).cloned();
    template
        .network
        .as_deref()
        .and_then(by_name)
        .or_else(|| by_name(DEFAULT_NETWORK))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guard_releases_flag() {
        let state = SessionState::new();
        {
            let _guard = state.try_begin_action().unwrap();
            assert!(state.action_in_progress());
            assert!(matches!(state.try_begin_action(), Err(DeployError::Busy)));
        }
        assert!(!state.action_in_progress());
        assert!(state.try_begin_action().is_ok());
    }
}
