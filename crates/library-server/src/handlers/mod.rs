//! Resolvers for the library operations.
//!
//! Every resolver takes the [`RequestContext`](crate::RequestContext) of the
//! operation it serves and reaches stored records through its loaders, so
//! nested lookups (a book's author, an author's book count) are batched
//! across the whole response.

pub mod mutations;
pub mod queries;
pub mod subscriptions;
pub mod views;

pub use views::{AuthorView, BookView, UserView};
