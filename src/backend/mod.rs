pub mod error;
pub mod export;
pub mod headers;
pub mod loader;
pub mod mapping;
pub mod parser;
pub mod settings;
pub mod sniffer;
pub mod submit;
