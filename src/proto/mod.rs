//! Trinamic motor controller command and reply layouts.

pub mod command;
pub mod reply;
