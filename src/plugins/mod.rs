pub mod fs;
pub mod http;
pub mod ids;
pub mod registry;
