pub mod controller;
pub mod services;
