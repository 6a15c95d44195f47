pub mod error;
pub mod security;
pub mod server;
pub mod settings;
pub mod storage;

pub use error::{AppError, AppResult};
pub use server::{router, run, AppState};
pub use settings::Settings;
