//! HTTP surface of the library API.
//!
//! | Endpoint | Method | Operation |
//! |----------|--------|-----------|
//! | `/books?author=&genre=` | GET | all_books |
//! | `/books` | POST | add_book |
//! | `/books/count` | GET | book_count |
//! | `/books/favorites` | GET | favorite_books |
//! | `/genres` | GET | all_genres |
//! | `/genres/:genre/books` | GET | books_by_genre |
//! | `/authors` | GET | all_authors |
//! | `/authors` | POST | add_author |
//! | `/authors/count` | GET | author_count |
//! | `/authors/:name` | PUT | edit_author |
//! | `/users` | POST | create_user |
//! | `/login` | POST | login |
//! | `/logout` | POST | end session |
//! | `/me` | GET | me |
//! | `/subscriptions/authors` | GET (SSE) | author_added |
//! | `/subscriptions/books` | GET (SSE) | book_added |
//!
//! Writes need an `Authorization: Bearer <token>` header obtained from
//! `/login`.

pub mod error;
pub mod extract;
pub mod routes;
pub mod state;

pub use error::{error_codes, ApiError, JsonBadRequest};
pub use extract::Ctx;
pub use routes::{
    create_router, create_router_with_options, RouterOptions, DEFAULT_BODY_LIMIT,
    DEFAULT_REQUEST_TIMEOUT,
};
pub use state::AppState;

#[cfg(test)]
mod tests;
