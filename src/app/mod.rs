pub mod errors;
pub mod factory;

pub use errors::StartupError;
pub use factory::AppFactory;
