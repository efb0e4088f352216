pub mod bundle;
pub mod core;
pub mod notify;
pub mod students;
