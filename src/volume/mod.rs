//! Volume builder (C5): turns a raw accessor into a bricked file.

pub mod builder;
