//! Control packages and the registry mapping business types to their codecs.
//!
//! A request and its reply share one business type (`PLogin` is used by both
//! `Login` and `LoginReply`), so entries are keyed by business type *and*
//! direction. The table below is the single source of truth; a
//! [`PackageRegistry`] is built from it once for a [`Role`] and is immutable
//! afterwards.

use crate::protocol::{BizType, Flag};
use once_cell::sync::Lazy;
use prost::Message;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use villaproto::vila_bot as pb;

#[derive(Debug, Error)]
pub enum PackageError {
    #[error("no decoder registered for biz type {biz_type} ({flag:?})")]
    UnknownBizType { biz_type: u32, flag: Flag },
    #[error("{0:?} cannot be encoded by a {1:?} registry")]
    NotEncodable(PackageKind, Role),
    #[error("malformed {kind:?} body: {source}")]
    Malformed {
        kind: PackageKind,
        #[source]
        source: prost::DecodeError,
    },
    #[error("duplicate package table entry for biz type {biz_type} ({flag:?})")]
    DuplicateEntry { biz_type: u32, flag: Flag },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Login {
    pub uid: u64,
    pub token: String,
    pub platform: i32,
    pub app_id: i32,
    pub device_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginReply {
    pub server_timestamp: u64,
    pub conn_id: u64,
    pub code: i32,
    pub msg: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Logout {
    pub uid: u64,
    pub platform: i32,
    pub app_id: i32,
    pub device_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogoutReply {
    pub conn_id: u64,
    pub code: i32,
    pub msg: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeartBeat {
    /// Milliseconds since the epoch, as a decimal string.
    pub client_timestamp: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeartBeatReply {
    pub server_timestamp: u64,
    pub code: i32,
}

/// Sent by the server when this device has been kicked off. The client must
/// not reconnect afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KickOff {
    pub code: i32,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Package {
    Login(Login),
    LoginReply(LoginReply),
    Logout(Logout),
    LogoutReply(LogoutReply),
    HeartBeat(HeartBeat),
    HeartBeatReply(HeartBeatReply),
    KickOff(KickOff),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PackageKind {
    Login,
    LoginReply,
    Logout,
    LogoutReply,
    HeartBeat,
    HeartBeatReply,
    KickOff,
}

impl Package {
    pub fn kind(&self) -> PackageKind {
        match self {
            Self::Login(_) => PackageKind::Login,
            Self::LoginReply(_) => PackageKind::LoginReply,
            Self::Logout(_) => PackageKind::Logout,
            Self::LogoutReply(_) => PackageKind::LogoutReply,
            Self::HeartBeat(_) => PackageKind::HeartBeat,
            Self::HeartBeatReply(_) => PackageKind::HeartBeatReply,
            Self::KickOff(_) => PackageKind::KickOff,
        }
    }

    pub fn biz_type(&self) -> BizType {
        self.kind().biz_type()
    }

    fn to_proto(&self) -> Vec<u8> {
        match self {
            Self::Login(p) => pb::PLogin {
                uid: p.uid,
                token: p.token.clone(),
                platform: p.platform,
                app_id: p.app_id,
                device_id: p.device_id.clone(),
                ..Default::default()
            }
            .encode_to_vec(),
            Self::LoginReply(p) => pb::PLoginReply {
                code: p.code,
                msg: p.msg.clone(),
                server_timestamp: p.server_timestamp,
                conn_id: p.conn_id,
            }
            .encode_to_vec(),
            Self::Logout(p) => pb::PLogout {
                uid: p.uid,
                platform: p.platform,
                app_id: p.app_id,
                device_id: p.device_id.clone(),
                ..Default::default()
            }
            .encode_to_vec(),
            Self::LogoutReply(p) => pb::PLogoutReply {
                code: p.code,
                msg: p.msg.clone(),
                conn_id: p.conn_id,
            }
            .encode_to_vec(),
            Self::HeartBeat(p) => pb::PHeartBeat {
                client_timestamp: p.client_timestamp.clone(),
            }
            .encode_to_vec(),
            Self::HeartBeatReply(p) => pb::PHeartBeatReply {
                code: p.code,
                server_timestamp: p.server_timestamp,
            }
            .encode_to_vec(),
            Self::KickOff(p) => pb::PKickOff {
                code: p.code,
                reason: p.reason.clone(),
            }
            .encode_to_vec(),
        }
    }
}

impl fmt::Display for Package {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            // The token is a credential; keep it out of logs.
            Self::Login(p) => write!(
                f,
                "Login {{ uid: {}, platform: {}, app_id: {}, device_id: {:?} }}",
                p.uid, p.platform, p.app_id, p.device_id
            ),
            other => write!(f, "{other:?}"),
        }
    }
}

impl PackageKind {
    pub fn biz_type(self) -> BizType {
        match self {
            Self::Login | Self::LoginReply => BizType::PLogin,
            Self::Logout | Self::LogoutReply => BizType::PLogout,
            Self::HeartBeat | Self::HeartBeatReply => BizType::PHeartBeat,
            Self::KickOff => BizType::PKickOff,
        }
    }
}

fn decode_login(data: &[u8]) -> Result<Package, prost::DecodeError> {
    let p = pb::PLogin::decode(data)?;
    Ok(Package::Login(Login {
        uid: p.uid,
        token: p.token,
        platform: p.platform,
        app_id: p.app_id,
        device_id: p.device_id,
    }))
}

fn decode_login_reply(data: &[u8]) -> Result<Package, prost::DecodeError> {
    let p = pb::PLoginReply::decode(data)?;
    Ok(Package::LoginReply(LoginReply {
        server_timestamp: p.server_timestamp,
        conn_id: p.conn_id,
        code: p.code,
        msg: p.msg,
    }))
}

fn decode_logout(data: &[u8]) -> Result<Package, prost::DecodeError> {
    let p = pb::PLogout::decode(data)?;
    Ok(Package::Logout(Logout {
        uid: p.uid,
        platform: p.platform,
        app_id: p.app_id,
        device_id: p.device_id,
    }))
}

fn decode_logout_reply(data: &[u8]) -> Result<Package, prost::DecodeError> {
    let p = pb::PLogoutReply::decode(data)?;
    Ok(Package::LogoutReply(LogoutReply {
        conn_id: p.conn_id,
        code: p.code,
        msg: p.msg,
    }))
}

fn decode_heartbeat(data: &[u8]) -> Result<Package, prost::DecodeError> {
    let p = pb::PHeartBeat::decode(data)?;
    Ok(Package::HeartBeat(HeartBeat {
        client_timestamp: p.client_timestamp,
    }))
}

fn decode_heartbeat_reply(data: &[u8]) -> Result<Package, prost::DecodeError> {
    let p = pb::PHeartBeatReply::decode(data)?;
    Ok(Package::HeartBeatReply(HeartBeatReply {
        server_timestamp: p.server_timestamp,
        code: p.code,
    }))
}

fn decode_kick_off(data: &[u8]) -> Result<Package, prost::DecodeError> {
    let p = pb::PKickOff::decode(data)?;
    Ok(Package::KickOff(KickOff {
        code: p.code,
        reason: p.reason,
    }))
}

type DecodeFn = fn(&[u8]) -> Result<Package, prost::DecodeError>;

/// One row of the package table. `flag` is the direction the package travels
/// in: `Request` packages go client→server, `Response` packages server→client.
#[derive(Clone, Copy)]
pub struct PackageEntry {
    pub kind: PackageKind,
    pub flag: Flag,
    decode: DecodeFn,
}

impl fmt::Debug for PackageEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PackageEntry")
            .field("kind", &self.kind)
            .field("biz_type", &self.kind.biz_type())
            .field("flag", &self.flag)
            .finish()
    }
}

pub const PACKAGE_TABLE: &[PackageEntry] = &[
    PackageEntry {
        kind: PackageKind::Login,
        flag: Flag::Request,
        decode: decode_login,
    },
    PackageEntry {
        kind: PackageKind::LoginReply,
        flag: Flag::Response,
        decode: decode_login_reply,
    },
    PackageEntry {
        kind: PackageKind::Logout,
        flag: Flag::Request,
        decode: decode_logout,
    },
    PackageEntry {
        kind: PackageKind::LogoutReply,
        flag: Flag::Response,
        decode: decode_logout_reply,
    },
    PackageEntry {
        kind: PackageKind::HeartBeat,
        flag: Flag::Request,
        decode: decode_heartbeat,
    },
    PackageEntry {
        kind: PackageKind::HeartBeatReply,
        flag: Flag::Response,
        decode: decode_heartbeat_reply,
    },
    PackageEntry {
        kind: PackageKind::KickOff,
        flag: Flag::Response,
        decode: decode_kick_off,
    },
];

/// Which end of the connection a registry serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Client,
    Server,
}

impl Role {
    /// Direction of frames this role sends.
    pub fn outbound_flag(self) -> Flag {
        match self {
            Self::Client => Flag::Request,
            Self::Server => Flag::Response,
        }
    }

    pub fn inbound_flag(self) -> Flag {
        self.outbound_flag().opposite()
    }
}

static CLIENT_REGISTRY: Lazy<Arc<PackageRegistry>> = Lazy::new(|| {
    Arc::new(
        PackageRegistry::new(Role::Client, PACKAGE_TABLE)
            .expect("built-in package table must not contain duplicates"),
    )
});

static SERVER_REGISTRY: Lazy<Arc<PackageRegistry>> = Lazy::new(|| {
    Arc::new(
        PackageRegistry::new(Role::Server, PACKAGE_TABLE)
            .expect("built-in package table must not contain duplicates"),
    )
});

#[derive(Debug)]
pub struct PackageRegistry {
    role: Role,
    decoders: HashMap<u32, PackageEntry>,
    encodable: HashMap<PackageKind, BizType>,
}

impl PackageRegistry {
    /// Builds a registry for `role` from `table`, rejecting duplicate
    /// (biz type, direction) pairs.
    pub fn new(role: Role, table: &[PackageEntry]) -> Result<Self, PackageError> {
        let mut seen = HashMap::new();
        let mut decoders = HashMap::new();
        let mut encodable = HashMap::new();

        for entry in table {
            let biz_type = entry.kind.biz_type();
            if seen.insert((biz_type, entry.flag), entry.kind).is_some() {
                return Err(PackageError::DuplicateEntry {
                    biz_type: biz_type.code(),
                    flag: entry.flag,
                });
            }
            if entry.flag == role.inbound_flag() {
                decoders.insert(biz_type.code(), *entry);
            } else {
                encodable.insert(entry.kind, biz_type);
            }
        }

        Ok(Self {
            role,
            decoders,
            encodable,
        })
    }

    /// The shared registry used by client sessions.
    pub fn client() -> Arc<Self> {
        CLIENT_REGISTRY.clone()
    }

    /// The mirror of [`PackageRegistry::client`]: decodes requests, encodes replies.
    pub fn server() -> Arc<Self> {
        SERVER_REGISTRY.clone()
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn outbound_flag(&self) -> Flag {
        self.role.outbound_flag()
    }

    pub fn can_decode(&self, biz_type: u32) -> bool {
        self.decoders.contains_key(&biz_type)
    }

    /// Encodes the package body. The result still has to be framed.
    pub fn encode(&self, package: &Package) -> Result<Vec<u8>, PackageError> {
        if !self.encodable.contains_key(&package.kind()) {
            return Err(PackageError::NotEncodable(package.kind(), self.role));
        }
        Ok(package.to_proto())
    }

    pub fn decode(&self, biz_type: u32, body: &[u8]) -> Result<Package, PackageError> {
        let entry = self
            .decoders
            .get(&biz_type)
            .ok_or(PackageError::UnknownBizType {
                biz_type,
                flag: self.role.inbound_flag(),
            })?;
        (entry.decode)(body).map_err(|source| PackageError::Malformed {
            kind: entry.kind,
            source,
        })
    }
}
