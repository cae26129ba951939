#![crate_name = "rust_l2ctl"]
#![crate_type = "lib"]

mod bits;
pub mod config;
pub mod error;
pub mod flow;
pub mod installer;
pub mod learning_switch;
pub mod mac_learning;
pub mod ofp_controller;
pub mod ofp_header;
pub mod ofp_message;
pub mod openflow0x04;
pub mod packet;
pub mod sim;

pub use error::{Error, Result};
