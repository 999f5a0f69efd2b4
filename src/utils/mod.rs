//! Small stand-alone helpers with no dependency on the rest of the crate.

pub mod json_ext;
