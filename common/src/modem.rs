pub mod agnss;
pub mod hw;
pub mod modem_manager;
pub mod module;
pub mod mqtt;
