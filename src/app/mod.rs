//! Application core: pure bridge logic, zero I/O.
//!
//! Request/response correlation, the pending queue and deadline
//! bookkeeping live here. All interaction with the BT device, the IPC
//! bus and the kernel timer happens through the **port traits** in
//! [`ports`] and [`bt::device`](crate::bt::device), keeping this layer
//! fully testable without real descriptors.

pub mod commands;
pub mod events;
pub mod ports;
pub mod queue;
pub mod service;
