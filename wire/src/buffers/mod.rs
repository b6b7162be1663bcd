pub mod memory_pool;
pub mod message_buffer;
pub mod object_cache;
pub mod object_pool;
pub mod recycling_array;
