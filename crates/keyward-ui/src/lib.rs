pub mod coordinator;
pub mod dialog;
pub mod document;
pub mod dom;
pub mod error;
pub mod render;
pub mod selftest;
pub mod view;

pub use coordinator::{Action, Coordinator};
pub use dialog::{Dialog, Outcome, PendingOutcome};
pub use document::MemoryDocument;
pub use dom::{Dom, DomExt, Element, Event, EventKind, Handler, ListenerId, Subscription};
pub use error::UiError;
pub use render::{button_id, ButtonKind};
pub use view::ViewHandles;
