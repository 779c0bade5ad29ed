//! Integration test modules

mod failover_test;
mod fanout_test;
mod server_test;
