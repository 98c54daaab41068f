pub mod loader;
pub mod settings;
pub mod sources;
pub mod validator;
