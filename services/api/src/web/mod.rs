pub mod middleware;
pub mod protocol;
pub mod rest;
pub mod state;

pub use middleware::require_identity;
pub use rest::{
    draw_handler, export_handler, get_reading_handler, history_handler, save_handler,
};
