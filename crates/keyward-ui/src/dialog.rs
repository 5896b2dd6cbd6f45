use crate::dom::{Dom, DomExt, Element, Subscription};
use crate::error::UiError;
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::oneshot;
use tracing::{debug, warn};
use zeroize::Zeroizing;

pub struct Outcome {
    pub confirmed: bool,
    fields: Vec<Zeroizing<String>>,
}

impl Outcome {
    fn cancelled() -> Self {
        Self {
            confirmed: false,
            fields: Vec::new(),
        }
    }

    pub fn field(&self, index: usize) -> &str {
        self.fields.get(index).map(|f| f.as_str()).unwrap_or("")
    }
}

impl fmt::Debug for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Outcome")
            .field("confirmed", &self.confirmed)
            .field("fields", &self.fields.len())
            .finish()
    }
}

#[must_use]
pub struct PendingOutcome {
    receiver: oneshot::Receiver<Outcome>,
}

impl PendingOutcome {
    pub async fn resolved(self) -> Outcome {
        self.receiver.await.unwrap_or_else(|_| Outcome::cancelled())
    }
}

pub struct Dialog {
    dom: Arc<dyn Dom>,
    name: &'static str,
    element: Element,
    primary: Element,
    secondary: Element,
    inputs: Vec<Element>,
    labels: Vec<Element>,
    outstanding: Arc<AtomicBool>,
}

impl Dialog {
    /// `primary` confirms, `secondary` cancels.
    pub fn new(
        dom: Arc<dyn Dom>,
        name: &'static str,
        element: Element,
        primary: Element,
        secondary: Element,
    ) -> Self {
        Self {
            dom,
            name,
            element,
            primary,
            secondary,
            inputs: Vec::new(),
            labels: Vec::new(),
            outstanding: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_inputs(mut self, inputs: Vec<Element>) -> Self {
        self.inputs = inputs;
        self
    }

    pub fn with_labels(mut self, labels: Vec<Element>) -> Self {
        self.labels = labels;
        self
    }

    pub fn element(&self) -> Element {
        self.element
    }

    pub fn is_open(&self) -> bool {
        self.outstanding.load(Ordering::Acquire)
    }

    pub fn open(&self) -> Result<PendingOutcome, UiError> {
        if self.outstanding.swap(true, Ordering::AcqRel) {
            warn!(dialog = self.name, "dialog opened while already open");
            return Err(UiError::DialogBusy(self.name));
        }

        let (sender, receiver) = oneshot::channel();
        let resolver = Arc::new(Resolver {
            dom: Arc::downgrade(&self.dom),
            name: self.name,
            element: self.element,
            inputs: self.inputs.clone(),
            labels: self.labels.clone(),
            outstanding: Arc::clone(&self.outstanding),
            binding: Mutex::new(Binding {
                sender: Some(sender),
                ..Binding::default()
            }),
        });

        let close = {
            let resolver = Arc::clone(&resolver);
            self.dom
                .on_close(self.element, move |_| resolver.deliver())
        };
        if close.is_none() {
            debug!(dialog = self.name, "host has no close events");
        }
        let primary = {
            let resolver = Arc::clone(&resolver);
            self.dom.on_click(self.primary, move |_| resolver.decide(true))
        };
        let secondary = {
            let resolver = Arc::clone(&resolver);
            self.dom
                .on_click(self.secondary, move |_| resolver.decide(false))
        };
        {
            let mut binding = resolver.binding.lock();
            binding.close = close;
            binding.clicks = vec![primary, secondary];
        }

        self.dom.show_modal(self.element);
        debug!(dialog = self.name, "dialog opened");
        Ok(PendingOutcome { receiver })
    }
}

#[derive(Default)]
struct Binding {
    decided: bool,
    outcome: Option<Outcome>,
    clicks: Vec<Subscription>,
    close: Option<Subscription>,
    sender: Option<oneshot::Sender<Outcome>>,
}

struct Resolver {
    dom: Weak<dyn Dom>,
    name: &'static str,
    element: Element,
    inputs: Vec<Element>,
    labels: Vec<Element>,
    outstanding: Arc<AtomicBool>,
    binding: Mutex<Binding>,
}

impl Resolver {
    fn decide(&self, confirmed: bool) {
        let Some(dom) = self.dom.upgrade() else {
            return;
        };
        let clicks = {
            let mut binding = self.binding.lock();
            if binding.decided {
                return;
            }
            binding.decided = true;
            std::mem::take(&mut binding.clicks)
        };
        let fields = self.take_fields(dom.as_ref(), confirmed);
        drop(clicks);
        self.binding.lock().outcome = Some(Outcome { confirmed, fields });
        debug!(dialog = self.name, confirmed, "dialog decided");

        dom.close(self.element);
        // No-op when the close event already delivered.
        self.deliver();
    }

    fn deliver(&self) {
        let (sender, outcome, clicks, close) = {
            let mut binding = self.binding.lock();
            let Some(sender) = binding.sender.take() else {
                return;
            };
            binding.decided = true;
            (
                sender,
                binding.outcome.take(),
                std::mem::take(&mut binding.clicks),
                binding.close.take(),
            )
        };
        let outcome = match outcome {
            Some(outcome) => outcome,
            None => {
                if let Some(dom) = self.dom.upgrade() {
                    self.take_fields(dom.as_ref(), false);
                }
                Outcome::cancelled()
            }
        };
        drop(clicks);
        drop(close);
        self.outstanding.store(false, Ordering::Release);
        debug!(dialog = self.name, confirmed = outcome.confirmed, "dialog resolved");
        let _ = sender.send(outcome);
    }

    fn take_fields(&self, dom: &dyn Dom, keep: bool) -> Vec<Zeroizing<String>> {
        let mut fields = Vec::new();
        for input in &self.inputs {
            if keep {
                fields.push(Zeroizing::new(dom.value(*input)));
            }
            dom.set_value(*input, "");
        }
        for label in &self.labels {
            dom.set_text(*label, "");
        }
        fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::MemoryDocument;
    use crate::dom::EventKind;
    use crate::view::{self, ViewHandles};

    struct Fixture {
        doc: Arc<MemoryDocument>,
        view: ViewHandles,
        dialog: Dialog,
    }

    fn add_dialog(close_events: bool) -> Fixture {
        let doc = MemoryDocument::options_page(close_events);
        let view = ViewHandles::resolve(doc.as_ref()).unwrap();
        let dom: Arc<dyn Dom> = doc.clone();
        let dialog = Dialog::new(dom, "add", view.add_dialog, view.add_ok, view.add_cancel)
            .with_inputs(vec![view.add_name, view.add_key]);
        Fixture { doc, view, dialog }
    }

    fn listeners(f: &Fixture) -> usize {
        f.doc.listener_count(f.view.add_ok, EventKind::Click)
            + f.doc.listener_count(f.view.add_cancel, EventKind::Click)
            + f.doc.listener_count(f.view.add_dialog, EventKind::Close)
    }

    #[tokio::test]
    async fn confirm_returns_fields_and_clears_inputs() {
        let f = add_dialog(true);
        let pending = f.dialog.open().unwrap();
        assert!(f.doc.is_open(f.view.add_dialog));
        assert_eq!(listeners(&f), 3);

        f.doc.set_value(f.view.add_name, "name");
        f.doc.set_value(f.view.add_key, "private-key");
        f.doc.click(f.view.add_ok);

        let outcome = pending.resolved().await;
        assert!(outcome.confirmed);
        assert_eq!(outcome.field(0), "name");
        assert_eq!(outcome.field(1), "private-key");
        assert_eq!(f.doc.value(f.view.add_name), "");
        assert_eq!(f.doc.value(f.view.add_key), "");
        assert!(!f.doc.is_open(f.view.add_dialog));
        assert_eq!(listeners(&f), 0);
        assert!(!f.dialog.is_open());
    }

    #[tokio::test]
    async fn cancel_clears_inputs_without_reading() {
        let f = add_dialog(true);
        let pending = f.dialog.open().unwrap();
        f.doc.set_value(f.view.add_name, "name");
        f.doc.click(f.view.add_cancel);

        let outcome = pending.resolved().await;
        assert!(!outcome.confirmed);
        assert_eq!(outcome.field(0), "");
        assert_eq!(f.doc.value(f.view.add_name), "");
        assert_eq!(listeners(&f), 0);
    }

    #[tokio::test]
    async fn closing_without_a_choice_cancels() {
        let f = add_dialog(true);
        let pending = f.dialog.open().unwrap();
        f.doc.set_value(f.view.add_key, "private-key");
        f.doc.close(f.view.add_dialog);

        let outcome = pending.resolved().await;
        assert!(!outcome.confirmed);
        assert_eq!(f.doc.value(f.view.add_key), "");
        assert_eq!(listeners(&f), 0);
    }

    #[tokio::test]
    async fn second_click_is_ignored() {
        let f = add_dialog(true);
        let pending = f.dialog.open().unwrap();
        f.doc.click(f.view.add_cancel);
        f.doc.click(f.view.add_ok);
        assert!(!pending.resolved().await.confirmed);
    }

    #[tokio::test]
    async fn open_while_open_is_rejected() {
        let f = add_dialog(true);
        let pending = f.dialog.open().unwrap();
        assert!(matches!(f.dialog.open(), Err(UiError::DialogBusy("add"))));
        assert_eq!(listeners(&f), 3);

        f.doc.click(f.view.add_cancel);
        pending.resolved().await;
    }

    #[tokio::test]
    async fn reopening_does_not_accumulate_handlers() {
        let f = add_dialog(true);
        for round in 0..3 {
            let pending = f.dialog.open().unwrap();
            assert_eq!(listeners(&f), 3);
            f.doc.set_value(f.view.add_name, &format!("key-{round}"));
            f.doc.click(f.view.add_ok);
            let outcome = pending.resolved().await;
            assert_eq!(outcome.field(0), format!("key-{round}"));
            assert_eq!(listeners(&f), 0);
        }
    }

    #[tokio::test]
    async fn host_without_close_events_resolves_once() {
        let f = add_dialog(false);
        let pending = f.dialog.open().unwrap();
        assert_eq!(listeners(&f), 2);

        f.doc.set_value(f.view.add_name, "name");
        f.doc.click(f.view.add_ok);
        f.doc.click(f.view.add_cancel);

        let outcome = pending.resolved().await;
        assert!(outcome.confirmed);
        assert_eq!(outcome.field(0), "name");
        assert!(!f.doc.is_open(f.view.add_dialog));
        assert_eq!(listeners(&f), 0);
        assert!(!f.dialog.is_open());
    }

    #[tokio::test]
    async fn labels_are_cleared() {
        let doc = MemoryDocument::options_page(true);
        let view = ViewHandles::resolve(doc.as_ref()).unwrap();
        let dom: Arc<dyn Dom> = doc.clone();
        let dialog = Dialog::new(
            dom,
            "remove",
            view.remove_dialog,
            view.remove_yes,
            view.remove_no,
        )
        .with_labels(vec![view.remove_name]);

        doc.set_text(view.remove_name, "my key");
        let pending = dialog.open().unwrap();
        doc.click(view.remove_yes);
        assert!(pending.resolved().await.confirmed);
        assert_eq!(doc.text(view.remove_name), "");
        assert!(doc.element(view::REMOVE_NAME).is_some());
    }

    #[tokio::test]
    async fn dropped_document_counts_as_cancelled() {
        let f = add_dialog(true);
        let pending = f.dialog.open().unwrap();
        let Fixture { doc, dialog, .. } = f;
        drop(dialog);
        drop(doc);
        assert!(!pending.resolved().await.confirmed);
    }
}
