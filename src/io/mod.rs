pub mod document;
pub mod input;
pub mod output;
pub mod template;

pub use document::*;
pub use input::*;
pub use output::*;
pub use template::*;
