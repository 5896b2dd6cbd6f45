use crate::dom::{Dom, Element, Event, EventKind, Handler, ListenerId};
use crate::view;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::trace;

#[derive(Debug, Default)]
struct Node {
    tag: String,
    attributes: BTreeMap<String, String>,
    text: String,
    value: String,
    children: Vec<Element>,
    open: bool,
}

struct Listener {
    element: Element,
    kind: EventKind,
    handler: Handler,
}

type ReadyCallback = Box<dyn FnOnce() + Send>;

#[derive(Default)]
struct DocState {
    next_element: u64,
    next_listener: u64,
    nodes: HashMap<Element, Node>,
    by_id: HashMap<String, Element>,
    listeners: BTreeMap<ListenerId, Listener>,
    loaded: bool,
    ready: Vec<ReadyCallback>,
}

impl DocState {
    fn insert(&mut self, tag: &str) -> Element {
        self.next_element += 1;
        let element = Element::from_raw(self.next_element);
        self.nodes.insert(
            element,
            Node {
                tag: tag.to_string(),
                ..Node::default()
            },
        );
        element
    }

    fn text_of(&self, element: Element, out: &mut String) {
        if let Some(node) = self.nodes.get(&element) {
            out.push_str(&node.text);
            for child in &node.children {
                self.text_of(*child, out);
            }
        }
    }

    /// Detaches `element`'s subtree, returning the handlers that were attached
    /// to it so they can be dropped outside the lock.
    fn discard(&mut self, element: Element, released: &mut Vec<Handler>) {
        let Some(node) = self.nodes.remove(&element) else {
            return;
        };
        if let Some(id) = node.attributes.get("id") {
            if self.by_id.get(id) == Some(&element) {
                self.by_id.remove(id);
            }
        }
        let stale: Vec<ListenerId> = self
            .listeners
            .iter()
            .filter(|(_, l)| l.element == element)
            .map(|(id, _)| *id)
            .collect();
        for id in stale {
            if let Some(listener) = self.listeners.remove(&id) {
                released.push(listener.handler);
            }
        }
        for child in node.children {
            self.discard(child, released);
        }
    }

    fn handlers(&self, element: Element, kind: EventKind) -> Vec<Handler> {
        self.listeners
            .values()
            .filter(|l| l.element == element && l.kind == kind)
            .map(|l| Arc::clone(&l.handler))
            .collect()
    }
}

pub struct MemoryDocument {
    state: Mutex<DocState>,
    body: Element,
    close_events: bool,
}

impl MemoryDocument {
    pub fn new(close_events: bool) -> Self {
        let mut state = DocState::default();
        let body = state.insert("body");
        Self {
            state: Mutex::new(state),
            body,
            close_events,
        }
    }

    pub fn options_page(close_events: bool) -> Arc<Self> {
        let doc = Self::new(close_events);
        let body = doc.body;

        doc.child(body, "button", view::ADD_BUTTON);

        let add = doc.child(body, "dialog", view::ADD_DIALOG);
        doc.child(add, "input", view::ADD_NAME);
        doc.child(add, "textarea", view::ADD_KEY);
        doc.child(add, "button", view::ADD_OK);
        doc.child(add, "button", view::ADD_CANCEL);

        let passphrase = doc.child(body, "dialog", view::PASSPHRASE_DIALOG);
        let input = doc.child(passphrase, "input", view::PASSPHRASE_INPUT);
        doc.set_attribute(input, "type", "password");
        doc.child(passphrase, "button", view::PASSPHRASE_OK);
        doc.child(passphrase, "button", view::PASSPHRASE_CANCEL);

        let remove = doc.child(body, "dialog", view::REMOVE_DIALOG);
        doc.child(remove, "span", view::REMOVE_NAME);
        doc.child(remove, "button", view::REMOVE_YES);
        doc.child(remove, "button", view::REMOVE_NO);

        doc.child(body, "div", view::ERROR_TEXT);
        let table = doc.child(body, "table", "");
        doc.child(table, "tbody", view::KEYS_DATA);

        Arc::new(doc)
    }

    fn child(&self, parent: Element, tag: &str, id: &str) -> Element {
        let element = self.create_element(tag);
        if !id.is_empty() {
            self.set_attribute(element, "id", id);
        }
        self.append_child(parent, element);
        element
    }

    pub fn body(&self) -> Element {
        self.body
    }

    pub fn fire_content_loaded(&self) {
        let ready = {
            let mut state = self.state.lock();
            state.loaded = true;
            std::mem::take(&mut state.ready)
        };
        for callback in ready {
            callback();
        }
    }

    pub fn is_open(&self, element: Element) -> bool {
        self.state
            .lock()
            .nodes
            .get(&element)
            .map(|n| n.open)
            .unwrap_or(false)
    }

    pub fn tag(&self, element: Element) -> Option<String> {
        self.state.lock().nodes.get(&element).map(|n| n.tag.clone())
    }

    pub fn attribute(&self, element: Element, name: &str) -> Option<String> {
        self.state
            .lock()
            .nodes
            .get(&element)
            .and_then(|n| n.attributes.get(name).cloned())
    }

    pub fn children(&self, element: Element) -> Vec<Element> {
        self.state
            .lock()
            .nodes
            .get(&element)
            .map(|n| n.children.clone())
            .unwrap_or_default()
    }

    pub fn listener_count(&self, element: Element, kind: EventKind) -> usize {
        self.state.lock().handlers(element, kind).len()
    }

    fn dispatch(&self, element: Element, kind: EventKind) {
        let handlers = self.state.lock().handlers(element, kind);
        let event = Event {
            kind,
            target: element,
        };
        for handler in handlers {
            handler(&event);
        }
    }
}

impl Dom for MemoryDocument {
    fn element(&self, id: &str) -> Option<Element> {
        self.state.lock().by_id.get(id).copied()
    }

    fn create_element(&self, tag: &str) -> Element {
        self.state.lock().insert(tag)
    }

    fn append_child(&self, parent: Element, child: Element) {
        if let Some(node) = self.state.lock().nodes.get_mut(&parent) {
            node.children.push(child);
        }
    }

    fn remove_children(&self, parent: Element) {
        let mut released = Vec::new();
        {
            let mut state = self.state.lock();
            let children = match state.nodes.get_mut(&parent) {
                Some(node) => {
                    node.text.clear();
                    std::mem::take(&mut node.children)
                }
                None => return,
            };
            for child in children {
                state.discard(child, &mut released);
            }
        }
        drop(released);
    }

    fn set_attribute(&self, element: Element, name: &str, value: &str) {
        let mut state = self.state.lock();
        let Some(node) = state.nodes.get_mut(&element) else {
            return;
        };
        node.attributes.insert(name.to_string(), value.to_string());
        if name == "id" {
            state.by_id.insert(value.to_string(), element);
        }
    }

    fn text(&self, element: Element) -> String {
        let mut out = String::new();
        self.state.lock().text_of(element, &mut out);
        out
    }

    fn set_text(&self, element: Element, text: &str) {
        self.remove_children(element);
        if let Some(node) = self.state.lock().nodes.get_mut(&element) {
            node.text = text.to_string();
        }
    }

    fn value(&self, element: Element) -> String {
        self.state
            .lock()
            .nodes
            .get(&element)
            .map(|n| n.value.clone())
            .unwrap_or_default()
    }

    fn set_value(&self, element: Element, value: &str) {
        if let Some(node) = self.state.lock().nodes.get_mut(&element) {
            node.value = value.to_string();
        }
    }

    fn add_listener(
        &self,
        element: Element,
        kind: EventKind,
        handler: Handler,
    ) -> Option<ListenerId> {
        if kind == EventKind::Close && !self.close_events {
            return None;
        }
        let mut state = self.state.lock();
        state.next_listener += 1;
        let id = ListenerId::from_raw(state.next_listener);
        state.listeners.insert(
            id,
            Listener {
                element,
                kind,
                handler,
            },
        );
        Some(id)
    }

    fn remove_listener(&self, id: ListenerId) {
        let removed = self.state.lock().listeners.remove(&id);
        drop(removed);
    }

    fn show_modal(&self, element: Element) {
        if let Some(node) = self.state.lock().nodes.get_mut(&element) {
            node.open = true;
        }
    }

    fn close(&self, element: Element) {
        let was_open = match self.state.lock().nodes.get_mut(&element) {
            Some(node) => std::mem::replace(&mut node.open, false),
            None => false,
        };
        if was_open && self.close_events {
            trace!(element = element.raw(), "dispatching close");
            self.dispatch(element, EventKind::Close);
        }
    }

    fn click(&self, element: Element) {
        self.dispatch(element, EventKind::Click);
    }

    fn on_content_loaded(&self, callback: Box<dyn FnOnce() + Send>) {
        {
            let mut state = self.state.lock();
            if !state.loaded {
                state.ready.push(callback);
                return;
            }
        }
        callback();
    }
}
