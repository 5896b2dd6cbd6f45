use crate::dialog::Dialog;
use crate::dom::{Dom, DomExt, Subscription};
use crate::error::UiError;
use crate::render::{render_keys, ActionHandler, ButtonKind};
use crate::view::ViewHandles;
use keyward_core::{reconcile, DisplayedKey, KeyId, LoadedKey};
use keyward_keychain::{KeyManager, KeychainError};
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
    Add,
    Load,
    Unload,
    Remove,
}

impl Action {
    pub fn as_str(self) -> &'static str {
        match self {
            Action::Add => "add",
            Action::Load => "load",
            Action::Unload => "unload",
            Action::Remove => "remove",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Default)]
struct PageState {
    keys: Arc<Vec<DisplayedKey>>,
    installed: u64,
    error: Option<String>,
    rows: Vec<Subscription>,
}

struct Inner {
    manager: Arc<dyn KeyManager>,
    dom: Arc<dyn Dom>,
    view: ViewHandles,
    add_dialog: Dialog,
    passphrase_dialog: Dialog,
    remove_dialog: Dialog,
    state: Mutex<PageState>,
    add_button: Mutex<Option<Subscription>>,
    tasks: TaskTracker,
    refreshes: AtomicU64,
}

#[derive(Clone)]
pub struct Coordinator {
    inner: Arc<Inner>,
}

impl Coordinator {
    pub fn new(manager: Arc<dyn KeyManager>, dom: Arc<dyn Dom>) -> Result<Self, UiError> {
        let view = ViewHandles::resolve(dom.as_ref())?;
        let add_dialog = Dialog::new(
            Arc::clone(&dom),
            "add",
            view.add_dialog,
            view.add_ok,
            view.add_cancel,
        )
        .with_inputs(vec![view.add_name, view.add_key]);
        let passphrase_dialog = Dialog::new(
            Arc::clone(&dom),
            "passphrase",
            view.passphrase_dialog,
            view.passphrase_ok,
            view.passphrase_cancel,
        )
        .with_inputs(vec![view.passphrase_input]);
        let remove_dialog = Dialog::new(
            Arc::clone(&dom),
            "remove",
            view.remove_dialog,
            view.remove_yes,
            view.remove_no,
        )
        .with_labels(vec![view.remove_name]);

        let page = Self {
            inner: Arc::new(Inner {
                manager,
                dom: Arc::clone(&dom),
                view,
                add_dialog,
                passphrase_dialog,
                remove_dialog,
                state: Mutex::new(PageState::default()),
                add_button: Mutex::new(None),
                tasks: TaskTracker::new(),
                refreshes: AtomicU64::new(0),
            }),
        };

        let weak = Arc::downgrade(&page.inner);
        let add_button = dom.on_click(view.add_button, move |_| {
            if let Some(page) = Self::upgrade(&weak) {
                page.add();
            }
        });
        *page.inner.add_button.lock() = Some(add_button);

        let weak = Arc::downgrade(&page.inner);
        dom.on_content_loaded(Box::new(move || {
            if let Some(page) = Self::upgrade(&weak) {
                page.spawn_refresh();
            }
        }));

        Ok(page)
    }

    fn upgrade(weak: &Weak<Inner>) -> Option<Self> {
        weak.upgrade().map(|inner| Self { inner })
    }

    pub fn view(&self) -> &ViewHandles {
        &self.inner.view
    }

    pub fn dom(&self) -> &Arc<dyn Dom> {
        &self.inner.dom
    }

    pub fn displayed_keys(&self) -> Arc<Vec<DisplayedKey>> {
        Arc::clone(&self.inner.state.lock().keys)
    }

    pub fn error(&self) -> Option<String> {
        self.inner.state.lock().error.clone()
    }

    /// Waits for every spawned flow and refresh to finish. A flow waiting on an
    /// open dialog keeps this pending until the dialog resolves.
    pub async fn idle(&self) {
        self.inner.tasks.close();
        self.inner.tasks.wait().await;
        self.inner.tasks.reopen();
    }

    pub fn add(&self) {
        let pending = match self.inner.add_dialog.open() {
            Ok(pending) => pending,
            Err(err) => {
                warn!(error = %err, "add ignored");
                return;
            }
        };
        let page = self.clone();
        self.inner.tasks.spawn(async move {
            let outcome = pending.resolved().await;
            if !outcome.confirmed {
                debug!(action = %Action::Add, "cancelled");
                return;
            }
            page.begin(Action::Add);
            let result = page
                .inner
                .manager
                .add(outcome.field(0), outcome.field(1))
                .await;
            page.finish(Action::Add, result).await;
        });
    }

    pub fn load(&self, id: KeyId, encrypted: bool) {
        let pending = if encrypted {
            match self.inner.passphrase_dialog.open() {
                Ok(pending) => Some(pending),
                Err(err) => {
                    warn!(error = %err, "load ignored");
                    return;
                }
            }
        } else {
            None
        };
        let page = self.clone();
        self.inner.tasks.spawn(async move {
            let passphrase = match pending {
                Some(pending) => {
                    let outcome = pending.resolved().await;
                    if !outcome.confirmed {
                        debug!(action = %Action::Load, "cancelled");
                        return;
                    }
                    Zeroizing::new(outcome.field(0).to_string())
                }
                None => Zeroizing::new(String::new()),
            };
            page.begin(Action::Load);
            let result = page.inner.manager.load(&id, &passphrase).await;
            page.finish(Action::Load, result).await;
        });
    }

    pub fn unload(&self, key: LoadedKey) {
        let page = self.clone();
        self.inner.tasks.spawn(async move {
            page.begin(Action::Unload);
            let result = page.inner.manager.unload(&key).await;
            page.finish(Action::Unload, result).await;
        });
    }

    pub fn unload_displayed(&self, key: &DisplayedKey) {
        match key.loaded_key() {
            Ok(loaded) => self.unload(loaded),
            Err(err) => {
                warn!(error = %err, "displayed key has no usable blob");
                self.set_error(Some(format!("failed to get loaded key: {err}")));
            }
        }
    }

    pub fn remove(&self, id: KeyId, name: &str) {
        if self.inner.remove_dialog.is_open() {
            warn!(error = %UiError::DialogBusy("remove"), "remove ignored");
            return;
        }
        self.inner.dom.set_text(self.inner.view.remove_name, name);
        let pending = match self.inner.remove_dialog.open() {
            Ok(pending) => pending,
            Err(err) => {
                warn!(error = %err, "remove ignored");
                return;
            }
        };
        let page = self.clone();
        self.inner.tasks.spawn(async move {
            if !pending.resolved().await.confirmed {
                debug!(action = %Action::Remove, "cancelled");
                return;
            }
            page.begin(Action::Remove);
            let result = page.inner.manager.remove(&id).await;
            page.finish(Action::Remove, result).await;
        });
    }

    pub async fn refresh(&self) {
        let ticket = self.inner.refreshes.fetch_add(1, Ordering::AcqRel) + 1;
        let configured = match self.inner.manager.configured().await {
            Ok(keys) => keys,
            Err(err) => {
                warn!(error = %err, "configured keys unavailable");
                self.refresh_failed(ticket, format!("failed to get configured keys: {err}"));
                return;
            }
        };
        let loaded = match self.inner.manager.loaded().await {
            Ok(keys) => keys,
            Err(err) => {
                warn!(error = %err, "loaded keys unavailable");
                self.refresh_failed(ticket, format!("failed to get loaded keys: {err}"));
                return;
            }
        };
        let keys = Arc::new(reconcile(&configured, &loaded));

        let mut state = self.inner.state.lock();
        if ticket < state.installed {
            debug!(ticket, installed = state.installed, "stale key list discarded");
            return;
        }
        state.installed = ticket;
        state.keys = Arc::clone(&keys);
        Self::show_error(&self.inner, &mut state, None);
        let rows = render_keys(
            &self.inner.dom,
            self.inner.view.keys_data,
            &keys,
            &self.action_handler(),
        );
        let stale = std::mem::replace(&mut state.rows, rows);
        drop(state);
        drop(stale);
        debug!(ticket, keys = keys.len(), "key list installed");
    }

    fn refresh_failed(&self, ticket: u64, error: String) {
        let mut state = self.inner.state.lock();
        if ticket < state.installed {
            debug!(ticket, installed = state.installed, "stale refresh failure ignored");
            return;
        }
        Self::show_error(&self.inner, &mut state, Some(error));
    }

    fn spawn_refresh(&self) {
        let page = self.clone();
        self.inner.tasks.spawn(async move { page.refresh().await });
    }

    fn action_handler(&self) -> ActionHandler {
        let weak = Arc::downgrade(&self.inner);
        Arc::new(move |kind: ButtonKind, key: &DisplayedKey| {
            if let Some(page) = Self::upgrade(&weak) {
                page.on_row_action(kind, key);
            }
        })
    }

    fn on_row_action(&self, kind: ButtonKind, key: &DisplayedKey) {
        let Some(id) = key.id.clone() else {
            return;
        };
        match kind {
            ButtonKind::Load => self.load(id, key.encrypted),
            ButtonKind::Unload => self.unload_displayed(key),
            ButtonKind::Remove => self.remove(id, &key.name),
        }
    }

    fn begin(&self, action: Action) {
        info!(action = %action, "action started");
        self.set_error(None);
    }

    async fn finish(&self, action: Action, result: Result<(), KeychainError>) {
        match result {
            Ok(()) => {
                info!(action = %action, "action completed");
                self.set_error(None);
                self.refresh().await;
            }
            Err(err) => {
                warn!(action = %action, error = %err, kind = ?err.kind(), "action failed");
                self.set_error(Some(format!("failed to {action} key: {err}")));
            }
        }
    }

    fn set_error(&self, error: Option<String>) {
        let mut state = self.inner.state.lock();
        Self::show_error(&self.inner, &mut state, error);
    }

    fn show_error(inner: &Inner, state: &mut PageState, error: Option<String>) {
        inner
            .dom
            .set_text(inner.view.error_text, error.as_deref().unwrap_or(""));
        state.error = error;
    }
}
