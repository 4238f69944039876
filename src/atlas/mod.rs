//! GPU brick cache / volume atlas (C8): miss hashtable, BrickMeta shadow
//! buffer, and the manager tying admission, eviction, and purge together.

pub mod hashtable;
pub mod lod;
pub mod manager;
pub mod meta_buffer;
pub mod texture;

pub use hashtable::MissHashTable;
pub use lod::{load_priority, lod_for_distance};
pub use manager::{Admission, Admitted, AtlasManager};
pub use meta_buffer::{BrickMetaBuffer, CHILD_EMPTY, EMPTY, FLAG_COUNT, MISSING};
pub use texture::AtlasTexture;
