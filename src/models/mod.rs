pub mod document;
pub mod field;
pub mod proposal;
pub mod record;
pub mod utterance;

pub use document::*;
pub use field::*;
pub use proposal::*;
pub use record::*;
pub use utterance::*;
