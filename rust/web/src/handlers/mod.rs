pub mod health;
pub mod settings;
pub mod socket;

pub use health::{health, ping, status};
pub use settings::{get_settings, reset_settings, update_settings, UpdateSettingsRequest};
pub use socket::serve_connection;
