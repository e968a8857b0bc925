pub mod stage0_segment;
pub mod stage1_extract;
pub mod stage2_aggregate;
pub mod stage3_map;
pub mod stage4_render;

pub use stage0_segment::*;
pub use stage1_extract::*;
pub use stage2_aggregate::*;
pub use stage3_map::*;
pub use stage4_render::*;
