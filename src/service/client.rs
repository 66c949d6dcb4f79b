// client.rs — Blocking activation client used by the marble bootstrap
//
// Sends one request, half-closes the connection to mark its end and reads
// the response with a size cap.

use std::io::{Read, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::time::Duration;

use crate::coordinator::ActivationRequest;
use crate::error::ServiceError;
use crate::service::messages::{ActivationReply, ActivationRequestMsg, ActivationResponseMsg};

/// Upper bound on a response: certificates, root and all parameter files.
pub const MAX_RESPONSE_BYTES: u64 = 16 * 1024 * 1024;

pub fn activate(
    addr: impl ToSocketAddrs,
    request: &ActivationRequest,
    timeout: Duration,
) -> Result<ActivationReply, ServiceError> {
    let mut stream = TcpStream::connect(addr)?;
    stream.set_read_timeout(Some(timeout))?;
    stream.set_write_timeout(Some(timeout))?;

    let body = serde_json::to_vec(&ActivationRequestMsg::from(request))?;
    stream.write_all(&body)?;
    stream.shutdown(Shutdown::Write)?;

    let mut response = Vec::with_capacity(8192);
    (&mut stream)
        .take(MAX_RESPONSE_BYTES + 1)
        .read_to_end(&mut response)?;
    if response.len() as u64 > MAX_RESPONSE_BYTES {
        return Err(ServiceError::TooLarge {
            limit: MAX_RESPONSE_BYTES,
        });
    }

    let msg: ActivationResponseMsg = serde_json::from_slice(&response)?;
    msg.into_reply()
}
