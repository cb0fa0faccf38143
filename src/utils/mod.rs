pub mod errors;
pub mod logger;
pub mod term;
