use eframe::egui;
use pdf_form_overlay::{ChoiceItem, ControlValue, LiveControl, OverlayRect};
use pdf_form_runtime::FormCommand;

/// Screen rectangle of an overlay on a page whose top-left corner is `origin`
pub fn screen_rect(origin: egui::Pos2, placement: &OverlayRect) -> egui::Rect {
    egui::Rect::from_min_size(
        origin + egui::vec2(placement.left, placement.top),
        egui::vec2(placement.width, placement.height),
    )
}

fn display_label(selected: Option<&str>, items: &[ChoiceItem]) -> String {
    selected
        .map(|value| {
            items
                .iter()
                .find(|item| item.export_value == value)
                .map(|item| item.display_value.clone())
                .unwrap_or_else(|| value.to_string())
        })
        .unwrap_or_default()
}

/// Draw the widget for one placed control. Returns the command describing
/// the user's edit, if any.
pub fn show_control(
    ui: &mut egui::Ui,
    origin: egui::Pos2,
    control: &mut LiveControl,
) -> Option<FormCommand> {
    let rect = screen_rect(origin, control.placement.as_ref()?);
    let id = control.id;

    match &mut control.value {
        ControlValue::Text(text) => {
            let response = ui.put(
                rect,
                egui::TextEdit::singleline(text)
                    .desired_width(rect.width())
                    .margin(egui::vec2(2.0, 0.0)),
            );
            response.changed().then(|| FormCommand::SetText {
                id,
                text: text.clone(),
            })
        }
        ControlValue::Checkbox(checked) => {
            let response = ui.put(rect, egui::Checkbox::without_text(checked));
            response.changed().then(|| FormCommand::SetChecked {
                id,
                checked: *checked,
            })
        }
        ControlValue::Choice(selected) => {
            let label = display_label(selected.as_deref(), &control.items);
            let mut picked = None;
            ui.scope_builder(egui::UiBuilder::new().max_rect(rect), |ui| {
                egui::ComboBox::from_id_salt(id)
                    .selected_text(label)
                    .width(rect.width())
                    .show_ui(ui, |ui| {
                        for item in &control.items {
                            let current = selected.as_deref() == Some(item.export_value.as_str());
                            if ui
                                .selectable_label(current, &item.display_value)
                                .clicked()
                                && !current
                            {
                                picked = Some(item.export_value.clone());
                            }
                        }
                    });
            });
            let export_value = picked?;
            *selected = Some(export_value.clone());
            Some(FormCommand::Select { id, export_value })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_screen_rect_offsets_by_page_origin() {
        let placement = OverlayRect {
            left: 72.0,
            top: 72.0,
            width: 200.0,
            height: 20.0,
        };
        let rect = screen_rect(egui::pos2(10.0, 40.0), &placement);
        assert_eq!(rect.min, egui::pos2(82.0, 112.0));
        assert_eq!(rect.size(), egui::vec2(200.0, 20.0));
    }

    #[test]
    fn test_display_label() {
        let items = vec![
            ChoiceItem::new("r", "Red"),
            ChoiceItem::new("g", "Green"),
        ];
        assert_eq!(display_label(Some("g"), &items), "Green");
        assert_eq!(display_label(Some("custom"), &items), "custom");
        assert_eq!(display_label(None, &items), "");
    }
}
