//! Domain types shared by every adapter.

mod conversation;
mod model;
mod server;

pub use conversation::{ConversationMessage, MessageRole};
pub use model::{ModelCard, ModelState};
pub use server::{ServerError, ServerState};
