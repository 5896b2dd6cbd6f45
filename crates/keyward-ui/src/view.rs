use crate::dom::{Dom, Element};
use crate::error::UiError;

pub const ADD_BUTTON: &str = "add";
pub const ADD_DIALOG: &str = "addDialog";
pub const ADD_NAME: &str = "addName";
pub const ADD_KEY: &str = "addKey";
pub const ADD_OK: &str = "addOk";
pub const ADD_CANCEL: &str = "addCancel";
pub const PASSPHRASE_DIALOG: &str = "passphraseDialog";
pub const PASSPHRASE_INPUT: &str = "passphrase";
pub const PASSPHRASE_OK: &str = "passphraseOk";
pub const PASSPHRASE_CANCEL: &str = "passphraseCancel";
pub const REMOVE_DIALOG: &str = "removeDialog";
pub const REMOVE_NAME: &str = "removeName";
pub const REMOVE_YES: &str = "removeYes";
pub const REMOVE_NO: &str = "removeNo";
pub const ERROR_TEXT: &str = "errorMessage";
pub const KEYS_DATA: &str = "keysData";

pub const ELEMENT_IDS: [&str; 16] = [
    ADD_BUTTON,
    ADD_DIALOG,
    ADD_NAME,
    ADD_KEY,
    ADD_OK,
    ADD_CANCEL,
    PASSPHRASE_DIALOG,
    PASSPHRASE_INPUT,
    PASSPHRASE_OK,
    PASSPHRASE_CANCEL,
    REMOVE_DIALOG,
    REMOVE_NAME,
    REMOVE_YES,
    REMOVE_NO,
    ERROR_TEXT,
    KEYS_DATA,
];

#[derive(Clone, Copy, Debug)]
pub struct ViewHandles {
    pub add_button: Element,
    pub add_dialog: Element,
    pub add_name: Element,
    pub add_key: Element,
    pub add_ok: Element,
    pub add_cancel: Element,
    pub passphrase_dialog: Element,
    pub passphrase_input: Element,
    pub passphrase_ok: Element,
    pub passphrase_cancel: Element,
    pub remove_dialog: Element,
    pub remove_name: Element,
    pub remove_yes: Element,
    pub remove_no: Element,
    pub error_text: Element,
    pub keys_data: Element,
}

impl ViewHandles {
    pub fn resolve(dom: &dyn Dom) -> Result<Self, UiError> {
        let get = |id: &str| {
            dom.element(id)
                .ok_or_else(|| UiError::MissingElement(id.to_string()))
        };
        Ok(Self {
            add_button: get(ADD_BUTTON)?,
            add_dialog: get(ADD_DIALOG)?,
            add_name: get(ADD_NAME)?,
            add_key: get(ADD_KEY)?,
            add_ok: get(ADD_OK)?,
            add_cancel: get(ADD_CANCEL)?,
            passphrase_dialog: get(PASSPHRASE_DIALOG)?,
            passphrase_input: get(PASSPHRASE_INPUT)?,
            passphrase_ok: get(PASSPHRASE_OK)?,
            passphrase_cancel: get(PASSPHRASE_CANCEL)?,
            remove_dialog: get(REMOVE_DIALOG)?,
            remove_name: get(REMOVE_NAME)?,
            remove_yes: get(REMOVE_YES)?,
            remove_no: get(REMOVE_NO)?,
            error_text: get(ERROR_TEXT)?,
            keys_data: get(KEYS_DATA)?,
        })
    }
}
