pub mod context;
pub mod errors;
pub mod gas;
pub mod keys;
pub mod state;
