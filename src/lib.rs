pub mod defaults;
pub mod error;
pub mod grid;
pub mod io;
pub mod parallel;
pub mod response;
pub mod utils;

pub use error::ResponseError;
