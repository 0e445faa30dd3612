pub mod auth;
pub mod crm;
pub mod forms;
pub mod members;
pub mod monitor;
pub mod resources;
pub mod submissions;
