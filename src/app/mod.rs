pub mod context;
pub mod errors;

pub use context::{base_path, AppContext};
pub use errors::AppError;
