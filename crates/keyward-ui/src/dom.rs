use std::sync::{Arc, Weak};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Element(u64);

impl Element {
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

impl ListenerId {
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    Click,
    Close,
}

#[derive(Clone, Copy, Debug)]
pub struct Event {
    pub kind: EventKind,
    pub target: Element,
}

pub type Handler = Arc<dyn Fn(&Event) + Send + Sync>;

/// A document the settings page is rendered into.
///
/// Implementations must not hold internal locks while invoking handlers, and
/// must release handlers they drop outside of those locks: handlers routinely
/// deregister listeners and touch the document again.
pub trait Dom: Send + Sync {
    fn element(&self, id: &str) -> Option<Element>;
    fn create_element(&self, tag: &str) -> Element;
    fn append_child(&self, parent: Element, child: Element);
    fn remove_children(&self, parent: Element);
    fn set_attribute(&self, element: Element, name: &str, value: &str);
    fn text(&self, element: Element) -> String;
    fn set_text(&self, element: Element, text: &str);
    fn value(&self, element: Element) -> String;
    fn set_value(&self, element: Element, value: &str);
    /// Registers `handler` for events of `kind` on `element`. Returns `None`
    /// when the host cannot deliver that kind of event.
    fn add_listener(&self, element: Element, kind: EventKind, handler: Handler)
        -> Option<ListenerId>;
    fn remove_listener(&self, id: ListenerId);
    fn show_modal(&self, element: Element);
    fn close(&self, element: Element);
    fn click(&self, element: Element);
    /// Runs `callback` once the document content is ready, immediately if it
    /// already is.
    fn on_content_loaded(&self, callback: Box<dyn FnOnce() + Send>);
}

/// A registered listener. Dropping it deregisters the handler.
#[must_use = "dropping a subscription deregisters its handler"]
pub struct Subscription {
    dom: Weak<dyn Dom>,
    id: Option<ListenerId>,
}

impl Subscription {
    pub fn id(&self) -> Option<ListenerId> {
        self.id
    }

    pub fn dispose(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let (Some(id), Some(dom)) = (self.id, self.dom.upgrade()) {
            dom.remove_listener(id);
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

pub trait DomExt {
    fn on_click<F>(&self, element: Element, handler: F) -> Subscription
    where
        F: Fn(&Event) + Send + Sync + 'static;

    fn on_close<F>(&self, element: Element, handler: F) -> Option<Subscription>
    where
        F: Fn(&Event) + Send + Sync + 'static;
}

impl DomExt for Arc<dyn Dom> {
    fn on_click<F>(&self, element: Element, handler: F) -> Subscription
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        let id = self.add_listener(element, EventKind::Click, Arc::new(handler));
        if id.is_none() {
            tracing::warn!(element = element.raw(), "host refused click listener");
        }
        Subscription {
            dom: Arc::downgrade(self),
            id,
        }
    }

    fn on_close<F>(&self, element: Element, handler: F) -> Option<Subscription>
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        let id = self.add_listener(element, EventKind::Close, Arc::new(handler))?;
        Some(Subscription {
            dom: Arc::downgrade(self),
            id: Some(id),
        })
    }
}
