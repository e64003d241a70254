pub mod display;
pub mod errors;
pub mod feed;
pub mod notification;
pub mod order;
pub mod ports;
pub mod stock;
