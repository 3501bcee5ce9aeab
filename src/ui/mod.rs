pub mod panel;

use std::fmt;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ControlError {
    #[error("no control named '{0}'")]
    Unknown(String),
    #[error("control '{0}' is already registered")]
    Duplicate(String),
    #[error("value {value} is outside the domain of '{name}'")]
    OutOfDomain { name: String, value: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum ControlValue {
    Choice(String),
    Number(f32),
}

impl fmt::Display for ControlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControlValue::Choice(choice) => write!(f, "'{}'", choice),
            ControlValue::Number(number) => write!(f, "{}", number),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ValueDomain {
    Choice(Vec<String>),
    Range { min: f32, max: f32, step: f32 },
}

impl ValueDomain {
    pub fn range(min: f32, max: f32, step: f32) -> Self {
        ValueDomain::Range { min, max, step }
    }

    pub fn accepts(&self, value: &ControlValue) -> bool {
        match (self, value) {
            (ValueDomain::Choice(options), ControlValue::Choice(choice)) => {
                options.iter().any(|option| option == choice)
            }
            (ValueDomain::Range { min, max, .. }, ControlValue::Number(number)) => {
                number.is_finite() && *number >= *min && *number <= *max
            }
            _ => false,
        }
    }
}

/// Where a status message came from. Each source holds at most one message,
/// so clearing one source leaves the others visible.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusSource {
    Model,
    Environment,
}

/// Applies a validated value to the controlled object.
pub type ControlHandler<C> = fn(&mut C, &ControlValue);

pub struct ControlBinding<C> {
    pub name: String,
    pub domain: ValueDomain,
    pub value: ControlValue,
    handler: ControlHandler<C>,
}

impl<C> fmt::Debug for ControlBinding<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControlBinding")
            .field("name", &self.name)
            .field("domain", &self.domain)
            .field("value", &self.value)
            .finish()
    }
}

/// Ordered set of named controls. A control's handler is the only path by
/// which the panel mutates its target.
pub struct ControlPanel<C> {
    bindings: Vec<ControlBinding<C>>,
    status: Vec<(StatusSource, String)>,
}

impl<C> Default for ControlPanel<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> ControlPanel<C> {
    pub fn new() -> Self {
        Self {
            bindings: Vec::new(),
            status: Vec::new(),
        }
    }

    pub fn register(
        &mut self,
        name: &str,
        domain: ValueDomain,
        initial: ControlValue,
        handler: ControlHandler<C>,
    ) -> Result<(), ControlError> {
        if self.binding(name).is_some() {
            return Err(ControlError::Duplicate(name.to_string()));
        }
        if !domain.accepts(&initial) {
            return Err(ControlError::OutOfDomain {
                name: name.to_string(),
                value: initial.to_string(),
            });
        }
        self.bindings.push(ControlBinding {
            name: name.to_string(),
            domain,
            value: initial,
            handler,
        });
        Ok(())
    }

    /// Validates `value`, stores it and runs the handler. Setting the current
    /// value again is accepted and does nothing.
    pub fn set(&mut self, name: &str, value: ControlValue, target: &mut C) -> Result<bool, ControlError> {
        let binding = self
            .bindings
            .iter_mut()
            .find(|binding| binding.name == name)
            .ok_or_else(|| ControlError::Unknown(name.to_string()))?;
        if !binding.domain.accepts(&value) {
            return Err(ControlError::OutOfDomain {
                name: name.to_string(),
                value: value.to_string(),
            });
        }
        if binding.value == value {
            return Ok(false);
        }
        log::debug!("Control '{}' -> {}", name, value);
        binding.value = value;
        (binding.handler)(target, &binding.value);
        Ok(true)
    }

    /// Adds `option` to a choice control's domain.
    pub fn add_choice(&mut self, name: &str, option: &str) -> Result<(), ControlError> {
        let binding = self
            .bindings
            .iter_mut()
            .find(|binding| binding.name == name)
            .ok_or_else(|| ControlError::Unknown(name.to_string()))?;
        match &mut binding.domain {
            ValueDomain::Choice(options) => {
                if !options.iter().any(|existing| existing == option) {
                    options.push(option.to_string());
                }
                Ok(())
            }
            ValueDomain::Range { .. } => Err(ControlError::OutOfDomain {
                name: name.to_string(),
                value: format!("'{}'", option),
            }),
        }
    }

    pub fn binding(&self, name: &str) -> Option<&ControlBinding<C>> {
        self.bindings.iter().find(|binding| binding.name == name)
    }

    pub fn bindings(&self) -> &[ControlBinding<C>] {
        &self.bindings
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// Every current status message, one per line.
    pub fn status(&self) -> Option<String> {
        if self.status.is_empty() {
            return None;
        }
        let lines: Vec<&str> = self.status.iter().map(|(_, message)| message.as_str()).collect();
        Some(lines.join("\n"))
    }

    pub fn set_status(&mut self, source: StatusSource, message: impl Into<String>) {
        let message = message.into();
        match self.status.iter_mut().find(|(from, _)| *from == source) {
            Some(entry) => entry.1 = message,
            None => self.status.push((source, message)),
        }
    }

    pub fn clear_status(&mut self, source: StatusSource) {
        self.status.retain(|(from, _)| *from != source);
    }

    /// Drops every binding. Returns how many there were.
    pub fn destroy(&mut self) -> usize {
        let count = self.bindings.len();
        self.bindings.clear();
        self.status.clear();
        count
    }
}

#[cfg(test)]
mod tests {
    use super::{ControlError, ControlPanel, ControlValue, StatusSource, ValueDomain};

    #[derive(Default)]
    struct Target {
        strength: f32,
        model: String,
        calls: usize,
    }

    fn on_strength(target: &mut Target, value: &ControlValue) {
        if let ControlValue::Number(v) = value {
            target.strength = *v;
            target.calls += 1;
        }
    }

    fn on_model(target: &mut Target, value: &ControlValue) {
        if let ControlValue::Choice(name) = value {
            target.model = name.clone();
            target.calls += 1;
        }
    }

    fn panel() -> ControlPanel<Target> {
        let mut panel = ControlPanel::new();
        panel
            .register("strength", ValueDomain::range(0.0, 3.0, 0.01), ControlValue::Number(0.0), on_strength)
            .unwrap();
        panel
            .register(
                "model",
                ValueDomain::Choice(vec!["Dunk".into(), "Jordan".into()]),
                ControlValue::Choice("Dunk".into()),
                on_model,
            )
            .unwrap();
        panel
    }

    #[test]
    fn set_runs_handler_with_validated_value() {
        let mut panel = panel();
        let mut target = Target::default();
        assert!(panel.set("strength", ControlValue::Number(1.5), &mut target).unwrap());
        assert_eq!(target.strength, 1.5);
        assert!(panel.set("model", ControlValue::Choice("Jordan".into()), &mut target).unwrap());
        assert_eq!(target.model, "Jordan");
        assert_eq!(panel.binding("strength").unwrap().value, ControlValue::Number(1.5));
    }

    #[test]
    fn out_of_domain_values_never_reach_the_handler() {
        let mut panel = panel();
        let mut target = Target::default();
        assert!(matches!(
            panel.set("strength", ControlValue::Number(3.5), &mut target),
            Err(ControlError::OutOfDomain { .. })
        ));
        assert!(panel.set("strength", ControlValue::Number(f32::NAN), &mut target).is_err());
        assert!(panel.set("model", ControlValue::Choice("Air".into()), &mut target).is_err());
        assert!(panel.set("model", ControlValue::Number(1.0), &mut target).is_err());
        assert_eq!(
            panel.set("missing", ControlValue::Number(1.0), &mut target),
            Err(ControlError::Unknown("missing".into()))
        );
        assert_eq!(target.calls, 0);
    }

    #[test]
    fn unchanged_value_skips_handler() {
        let mut panel = panel();
        let mut target = Target::default();
        assert!(!panel.set("strength", ControlValue::Number(0.0), &mut target).unwrap());
        assert_eq!(target.calls, 0);
    }

    #[test]
    fn registration_is_validated() {
        let mut panel = panel();
        assert_eq!(
            panel.register("strength", ValueDomain::range(0.0, 1.0, 0.1), ControlValue::Number(0.0), on_strength),
            Err(ControlError::Duplicate("strength".into()))
        );
        assert!(panel
            .register("ambient", ValueDomain::range(0.0, 2.0, 0.01), ControlValue::Number(5.0), on_strength)
            .is_err());
    }

    #[test]
    fn added_choice_becomes_selectable() {
        let mut panel = panel();
        let mut target = Target::default();
        panel.add_choice("model", "Air").unwrap();
        panel.add_choice("model", "Air").unwrap();
        assert!(panel.set("model", ControlValue::Choice("Air".into()), &mut target).unwrap());
        assert!(panel.add_choice("strength", "Air").is_err());
    }

    #[test]
    fn destroy_removes_all_bindings() {
        let mut panel = panel();
        panel.set_status(StatusSource::Model, "failed");
        assert_eq!(panel.destroy(), 2);
        assert_eq!(panel.len(), 0);
        assert_eq!(panel.status(), None);
    }

    #[test]
    fn clearing_one_status_source_keeps_the_other() {
        let mut panel = panel();
        panel.set_status(StatusSource::Environment, "Environment: missing file");
        panel.set_status(StatusSource::Model, "could not load 'Air'");
        panel.set_status(StatusSource::Model, "could not load 'Max'");
        assert_eq!(
            panel.status().as_deref(),
            Some("Environment: missing file\ncould not load 'Max'")
        );

        panel.clear_status(StatusSource::Model);
        assert_eq!(panel.status().as_deref(), Some("Environment: missing file"));
    }
}
