pub mod utils;

mod access;
mod events;
mod relationships;
