//! Events published on the library bus.

use library_storage::{Author, Book};

/// Topic carrying [`LibraryEvent::AuthorAdded`].
pub const AUTHOR_ADDED: &str = "AUTHOR_ADDED";
/// Topic carrying [`LibraryEvent::BookAdded`].
pub const BOOK_ADDED: &str = "BOOK_ADDED";

/// Payload delivered to subscriptions.
///
/// Events carry the stored record; subscribers resolve derived fields (book
/// counts, nested authors) when the event is delivered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LibraryEvent {
    AuthorAdded(Author),
    BookAdded(Book),
}

impl LibraryEvent {
    /// Topic the event is published on.
    pub fn topic(&self) -> &'static str {
        match self {
            LibraryEvent::AuthorAdded(_) => AUTHOR_ADDED,
            LibraryEvent::BookAdded(_) => BOOK_ADDED,
        }
    }
}

/// Bus type shared by the server.
pub type LibraryBus = library_domain::EventBus<LibraryEvent>;

/// Publishes `event` on its own topic and returns the delivery count.
pub fn publish(bus: &LibraryBus, event: LibraryEvent) -> usize {
    let topic = event.topic();
    let delivered = bus.publish(topic, event);
    tracing::debug!(topic, delivered, "event published");
    delivered
}
