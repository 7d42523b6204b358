pub mod analyzer;
pub mod app;
pub mod decode;
pub mod field;
pub mod loader;
pub mod playback;
pub mod quiz;
pub mod results;
pub mod types;
