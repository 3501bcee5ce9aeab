use super::{ControlPanel, ControlValue, ValueDomain};

/// Edits made in the panel this frame, applied by the caller afterwards.
#[derive(Debug, Clone, PartialEq)]
pub enum PanelAction {
    Set { name: String, value: ControlValue },
    AddModel,
}

/// `loading` names the model whose load is in flight, if any.
pub fn show<C>(ctx: &egui::Context, panel: &ControlPanel<C>, loading: Option<&str>) -> Vec<PanelAction> {
    let mut actions = Vec::new();
    egui::Window::new("Controls")
        .anchor(egui::Align2::RIGHT_TOP, [-10.0, 10.0])
        .resizable(false)
        .collapsible(true)
        .show(ctx, |ui| {
            for binding in panel.bindings() {
                match (&binding.domain, &binding.value) {
                    (ValueDomain::Choice(options), ControlValue::Choice(current)) => {
                        egui::ComboBox::from_label(binding.name.as_str())
                            .selected_text(current.as_str())
                            .show_ui(ui, |ui| {
                                for option in options {
                                    if ui.selectable_label(option == current, option.as_str()).clicked()
                                        && option != current
                                    {
                                        actions.push(PanelAction::Set {
                                            name: binding.name.clone(),
                                            value: ControlValue::Choice(option.clone()),
                                        });
                                    }
                                }
                            });
                    }
                    (ValueDomain::Range { min, max, step }, ControlValue::Number(current)) => {
                        let mut value = *current;
                        let response = ui.add(
                            egui::Slider::new(&mut value, *min..=*max)
                                .step_by(*step as f64)
                                .text(binding.name.as_str()),
                        );
                        if response.changed() {
                            actions.push(PanelAction::Set {
                                name: binding.name.clone(),
                                value: ControlValue::Number(value),
                            });
                        }
                    }
                    _ => {
                        ui.label(format!("{}: {}", binding.name, binding.value));
                    }
                }
            }
            ui.separator();
            if ui.button("Add model…").clicked() {
                actions.push(PanelAction::AddModel);
            }
            if let Some(name) = loading {
                ui.horizontal(|ui| {
                    ui.spinner();
                    ui.label(format!("Loading {}…", name));
                });
            }
            if let Some(status) = panel.status() {
                ui.colored_label(egui::Color32::from_rgb(230, 90, 80), status);
            }
        });
    actions
}

/// Picks a glTF file for the "Add model…" button.
pub fn pick_model_file() -> Option<std::path::PathBuf> {
    rfd::FileDialog::new()
        .add_filter("glTF", &["gltf", "glb"])
        .pick_file()
}

#[cfg(test)]
mod tests {
    use super::{show, PanelAction};
    use crate::ui::{ControlPanel, ControlValue, StatusSource, ValueDomain};

    fn noop(_: &mut (), _: &ControlValue) {}

    #[test]
    fn untouched_panel_reports_no_actions() {
        let mut panel = ControlPanel::<()>::new();
        panel
            .register("bloom strength", ValueDomain::range(0.0, 3.0, 0.01), ControlValue::Number(0.0), noop)
            .unwrap();
        panel
            .register(
                "model",
                ValueDomain::Choice(vec!["Dunk".into()]),
                ControlValue::Choice("Dunk".into()),
                noop,
            )
            .unwrap();
        panel.set_status(StatusSource::Model, "could not load model");

        let ctx = egui::Context::default();
        let mut actions: Vec<PanelAction> = Vec::new();
        let _ = ctx.run(egui::RawInput::default(), |ctx| {
            actions = show(ctx, &panel, Some("Dunk"));
        });
        assert!(actions.is_empty());
    }
}
