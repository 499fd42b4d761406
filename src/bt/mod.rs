//! Host-side BT interface: wire codec and device port.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │                      BT Stack                              │
//! │                                                            │
//! │  ┌──────────┐   ┌──────────┐   ┌───────────────────────┐   │
//! │  │ BtDevice │──▶│  Codec   │──▶│  Bridge (queue)       │   │
//! │  │ (read)   │   │ (decode) │   │  → IPC subscribers    │   │
//! │  └──────────┘   └──────────┘   └───────────────────────┘   │
//! │       ▲                                    │               │
//! │       │              ┌─────────────────────┘               │
//! │       │              ▼                                     │
//! │  ┌──────────┐   ┌──────────┐                               │
//! │  │ BtDevice │◀──│  Codec   │   (one frame per POLLOUT)     │
//! │  │ (write)  │   │ (encode) │                               │
//! │  └──────────┘   └──────────┘                               │
//! └────────────────────────────────────────────────────────────┘
//! ```

pub mod codec;
pub mod device;
