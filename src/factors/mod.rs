pub mod tag_split;
pub mod tags;
pub mod text;

pub use tag_split::{TagSplitConfig, TagSplitter};
