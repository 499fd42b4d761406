//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter       | Implements     | Connects to                  |
//! |---------------|----------------|------------------------------|
//! | `bt_device`   | BtDevice       | `/dev/ipmi-bt-host` (bt-bmc) |
//! | `ipc_socket`  | IpcBus         | Unix datagram socket, JSON   |
//! | `timer`       | DeadlineTimer  | timerfd on CLOCK_MONOTONIC   |
//! | `time`        | (clock helper) | clock_gettime                |
//! | `log_sink`    | log::Log       | stdout / stderr              |

pub mod bt_device;
pub mod ipc_socket;
pub mod log_sink;
pub mod time;
pub mod timer;
