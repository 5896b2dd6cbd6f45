use crate::dom::{Dom, DomExt, Element, Subscription};
use keyward_core::{DisplayedKey, KeyId};
use std::sync::Arc;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ButtonKind {
    Load,
    Unload,
    Remove,
}

impl ButtonKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ButtonKind::Load => "load",
            ButtonKind::Unload => "unload",
            ButtonKind::Remove => "remove",
        }
    }

    fn label(self) -> &'static str {
        match self {
            ButtonKind::Load => "Load",
            ButtonKind::Unload => "Unload",
            ButtonKind::Remove => "Remove",
        }
    }
}

pub fn button_id(kind: ButtonKind, id: &KeyId) -> String {
    format!("{}-{}", kind.as_str(), id)
}

pub type ActionHandler = Arc<dyn Fn(ButtonKind, &DisplayedKey) + Send + Sync>;

/// Replaces the rows of `table` with one row per key and returns the
/// subscriptions of the row buttons. Keys without an id get no buttons.
pub fn render_keys(
    dom: &Arc<dyn Dom>,
    table: Element,
    keys: &[DisplayedKey],
    on_action: &ActionHandler,
) -> Vec<Subscription> {
    dom.remove_children(table);
    let mut subscriptions = Vec::new();
    for key in keys {
        let row = dom.create_element("tr");
        dom.append_child(row, cell(dom.as_ref(), "keyName", &key.name));

        let controls = cell(dom.as_ref(), "keyControls", "");
        if let Some(id) = &key.id {
            let primary = if key.loaded {
                ButtonKind::Unload
            } else {
                ButtonKind::Load
            };
            for kind in [primary, ButtonKind::Remove] {
                let button = dom.create_element("button");
                dom.set_attribute(button, "type", "button");
                dom.set_attribute(button, "id", &button_id(kind, id));
                dom.set_text(button, kind.label());
                let on_action = Arc::clone(on_action);
                let key = key.clone();
                subscriptions.push(dom.on_click(button, move |_| on_action(kind, &key)));
                dom.append_child(controls, button);
            }
        }
        dom.append_child(row, controls);

        dom.append_child(row, cell(dom.as_ref(), "keyType", &key.key_type));
        dom.append_child(row, cell(dom.as_ref(), "keyBlob", &key.blob));
        dom.append_child(table, row);
    }
    subscriptions
}

fn cell(dom: &dyn Dom, class: &str, text: &str) -> Element {
    let td = dom.create_element("td");
    let div = dom.create_element("div");
    dom.set_attribute(div, "class", class);
    if !text.is_empty() {
        dom.set_text(div, text);
    }
    dom.append_child(td, div);
    td
}
