pub mod photos;
pub mod session;
