//! Numeric constants shared with the gateway. None of these are chosen
//! locally; they must match the server byte for byte.

use std::fmt;

/// Business type ("command word") carried in every frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum BizType {
    Unknown = 0,
    ExchangeKey = 1,
    HeartBeat = 2,
    Login = 3,
    Logout = 4,
    PExchangeKey = 5,
    PHeartBeat = 6,
    PLogin = 7,
    PLogout = 8,
    KickOff = 51,
    Shutdown = 52,
    PKickOff = 53,
    RoomEnter = 60,
    RoomLeave = 61,
    RoomClose = 62,
    RoomMsg = 63,
    Event = 30001,
}

impl BizType {
    pub const fn code(self) -> u32 {
        self as u32
    }

    pub fn from_code(code: u32) -> Option<Self> {
        let biz = match code {
            0 => Self::Unknown,
            1 => Self::ExchangeKey,
            2 => Self::HeartBeat,
            3 => Self::Login,
            4 => Self::Logout,
            5 => Self::PExchangeKey,
            6 => Self::PHeartBeat,
            7 => Self::PLogin,
            8 => Self::PLogout,
            51 => Self::KickOff,
            52 => Self::Shutdown,
            53 => Self::PKickOff,
            60 => Self::RoomEnter,
            61 => Self::RoomLeave,
            62 => Self::RoomClose,
            63 => Self::RoomMsg,
            30001 => Self::Event,
            _ => return None,
        };
        Some(biz)
    }
}

impl From<BizType> for u32 {
    fn from(biz: BizType) -> Self {
        biz.code()
    }
}

impl fmt::Display for BizType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}({})", self, self.code())
    }
}

/// Direction of a frame: client→server requests, server→client responses.
/// The server is not strict about the value on pushes, so codes outside the
/// two known ones are kept as `Unknown` rather than rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Flag {
    Request,
    Response,
    Unknown(u32),
}

impl Flag {
    pub const fn code(self) -> u32 {
        match self {
            Self::Request => 1,
            Self::Response => 2,
            Self::Unknown(code) => code,
        }
    }

    pub const fn from_code(code: u32) -> Self {
        match code {
            1 => Self::Request,
            2 => Self::Response,
            other => Self::Unknown(other),
        }
    }

    pub const fn opposite(self) -> Self {
        match self {
            Self::Request => Self::Response,
            Self::Response => Self::Request,
            Self::Unknown(code) => Self::Unknown(code),
        }
    }
}
