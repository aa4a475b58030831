mod catalog_handler;
mod form;

pub use catalog_handler::*;
