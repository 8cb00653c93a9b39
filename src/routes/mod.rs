pub mod artists;
pub mod images;
