//! Inbound calls to the bridge.
//!
//! These represent method calls made by IPC clients that the
//! [`Bridge`](super::service::Bridge) interprets and answers. Each call
//! carries the bus's reply token `R`; whoever ends up holding it must
//! complete it exactly once.

use crate::bt::codec::Response;

/// Method calls that the IPC adapter hands to the bridge core.
#[derive(Debug)]
pub enum BusCall<R> {
    /// A responder answers a previously broadcast request.
    SubmitResponse { response: Response, reply: R },

    /// Raise the SMS attention flag towards the host.
    SendAttention { reply: R },
}
