//! Session state and its lifecycle

pub mod manager;
pub mod store;

pub use manager::SessionManager;
pub use store::{Session, SessionStore};
