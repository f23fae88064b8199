pub mod common;

mod refresh_cycle;
