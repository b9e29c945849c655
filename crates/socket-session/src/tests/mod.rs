//! Integration tests for the session manager, driven through a scripted
//! in-memory transport.

mod reconnect;
