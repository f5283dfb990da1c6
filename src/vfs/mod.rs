pub mod path;

pub use path::{SEPARATOR, VirtualPath};
