pub mod checkpoint;
mod imprint;
mod input;
pub(crate) mod settings;

pub use imprint::write_header;
pub use input::read_input;
pub use settings::{Configuration, ModelConfig, ResponseConfig};
