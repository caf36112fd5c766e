pub mod image;
pub mod news;
pub mod scan;
