pub mod model;

pub use model::{load_settings, RootSettings, ServerSettings, Settings};
