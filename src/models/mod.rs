pub mod check;
pub mod product;
pub mod response;
pub mod tts;
