// Control panel API
pub mod handler;
pub mod models;
pub mod websocket;

pub use handler::AppState;
