pub mod listener;
pub mod peer_table;
pub mod pending;
