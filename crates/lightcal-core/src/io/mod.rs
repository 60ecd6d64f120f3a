pub mod catalog;
pub mod image_io;
