pub mod fs;
pub mod ui;

pub use crate::fs::{print_json, read_json, read_text, write_json};
pub use crate::ui::{single_pb, spinner};
