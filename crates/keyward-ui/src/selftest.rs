use crate::coordinator::Coordinator;
use crate::render::{button_id, ButtonKind};
use crate::view;
use keyward_core::DisplayedKey;
use keyward_keychain::testdata::KeyFixture;
use tracing::info;

/// Runs the cycle with `fixture` and returns the problems found, empty on
/// success. Stops at the first step that leaves nothing to continue with.
pub async fn end_to_end(page: &Coordinator, fixture: &KeyFixture) -> Vec<String> {
    let mut errors = Vec::new();
    let name = format!("e2e-test-key-{}", rand::random::<u32>());
    info!(key_name = %name, "self test started");

    if !click(page, view::ADD_BUTTON, &mut errors) {
        return errors;
    }
    page.dom().set_value(page.view().add_name, &name);
    page.dom().set_value(page.view().add_key, fixture.private);
    click(page, view::ADD_OK, &mut errors);
    page.idle().await;
    check_error(page, "add", &mut errors);

    let Some(key) = find(page, &name) else {
        errors.push(format!("added key {name} is not listed"));
        return errors;
    };
    let Some(id) = key.id.clone() else {
        errors.push(format!("added key {name} has no id"));
        return errors;
    };
    if key.loaded {
        errors.push("added key is already loaded".to_string());
    }
    if key.encrypted != !fixture.passphrase.is_empty() {
        errors.push(format!("added key has encrypted={}", key.encrypted));
    }

    if !click(page, &button_id(ButtonKind::Load, &id), &mut errors) {
        return errors;
    }
    if key.encrypted {
        page.dom()
            .set_value(page.view().passphrase_input, fixture.passphrase);
        click(page, view::PASSPHRASE_OK, &mut errors);
    }
    page.idle().await;
    check_error(page, "load", &mut errors);

    match find(page, &name) {
        Some(key) if key.loaded => {
            if key.key_type != fixture.key_type {
                errors.push(format!(
                    "loaded key has type {:?}, want {:?}",
                    key.key_type, fixture.key_type
                ));
            }
            if key.blob != fixture.blob {
                errors.push(format!(
                    "loaded key has blob {:?}, want {:?}",
                    key.blob, fixture.blob
                ));
            }
        }
        _ => {
            errors.push("key is not loaded after load".to_string());
            return errors;
        }
    }

    if !click(page, &button_id(ButtonKind::Unload, &id), &mut errors) {
        return errors;
    }
    page.idle().await;
    check_error(page, "unload", &mut errors);

    match find(page, &name) {
        Some(key) if !key.loaded => {
            if !key.key_type.is_empty() || !key.blob.is_empty() {
                errors.push("unloaded key still reports public key data".to_string());
            }
        }
        _ => errors.push("key is still loaded after unload".to_string()),
    }

    if !click(page, &button_id(ButtonKind::Remove, &id), &mut errors) {
        return errors;
    }
    click(page, view::REMOVE_YES, &mut errors);
    page.idle().await;
    check_error(page, "remove", &mut errors);

    if find(page, &name).is_some() {
        errors.push(format!("removed key {name} is still listed"));
    }

    info!(problems = errors.len(), "self test finished");
    errors
}

fn click(page: &Coordinator, id: &str, errors: &mut Vec<String>) -> bool {
    match page.dom().element(id) {
        Some(element) => {
            page.dom().click(element);
            true
        }
        None => {
            errors.push(format!("element {id} not found"));
            false
        }
    }
}

fn find(page: &Coordinator, name: &str) -> Option<DisplayedKey> {
    page.displayed_keys()
        .iter()
        .find(|k| k.name == name)
        .cloned()
}

fn check_error(page: &Coordinator, step: &str, errors: &mut Vec<String>) {
    if let Some(error) = page.error() {
        errors.push(format!("{step}: {error}"));
    }
}
