use crate::socket::{Decoded, RecvError, SendError, Session};
use log::debug;
use thiserror::Error;
use tokio::time::{Duration, timeout};
use villacore::package::{Login, LoginReply, Package};
use villacore::types::connection::ConnectionInfo;

#[derive(Debug, Error)]
pub enum LoginError {
    #[error("failed to send login: {0}")]
    Send(#[from] SendError),
    #[error("failed to receive login reply: {0}")]
    Recv(#[from] RecvError),
    #[error("timed out waiting for login reply")]
    Timeout,
    #[error("package type is not LoginReply: {0:?}")]
    UnexpectedReply(Box<Decoded>),
    #[error("code: {code}, message: {msg}")]
    Rejected { code: i32, msg: String },
    #[error("kicked off by server, code: {code}, reason: {reason}")]
    KickedOff { code: i32, reason: String },
}

type Result<T> = std::result::Result<T, LoginError>;

pub fn login_package(info: &ConnectionInfo, token: String) -> Package {
    Package::Login(Login {
        uid: info.uid,
        token,
        platform: info.platform,
        app_id: info.app_id,
        device_id: info.device_id.clone(),
    })
}

/// Sends `Login` and waits for exactly one reply. Anything other than a
/// successful `LoginReply` fails the handshake; the caller drops the socket
/// rather than retrying on it. A `KickOff` in place of the reply is reported
/// as `KickedOff` so the caller can stop for good instead of reconnecting.
pub async fn do_login(
    session: &Session,
    info: &ConnectionInfo,
    token: String,
    reply_timeout: Duration,
) -> Result<LoginReply> {
    debug!(target: "Client/Login", "--> Sending Login for uid {}", info.uid);
    session.send(&login_package(info, token)).await?;

    let decoded = timeout(reply_timeout, session.receive())
        .await
        .map_err(|_| LoginError::Timeout)??;

    match decoded {
        Decoded::ControlPackage(Package::LoginReply(reply)) if reply.code == 0 => {
            debug!(target: "Client/Login", "<-- LoginReply, conn_id {}", reply.conn_id);
            Ok(reply)
        }
        Decoded::ControlPackage(Package::LoginReply(reply)) => Err(LoginError::Rejected {
            code: reply.code,
            msg: reply.msg,
        }),
        Decoded::ControlPackage(Package::KickOff(kick_off)) => Err(LoginError::KickedOff {
            code: kick_off.code,
            reason: kick_off.reason,
        }),
        other => Err(LoginError::UnexpectedReply(Box::new(other))),
    }
}
