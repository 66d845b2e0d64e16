//! Wire formats for PORT, EPRT, PASV and EPSV (RFC 959, RFC 2428).

use crate::core_network::error::DataConnectionError;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressFamily {
    V4,
    V6,
}

impl AddressFamily {
    /// RFC 2428 network protocol number.
    pub fn from_code(code: &str) -> Result<Self, DataConnectionError> {
        match code.trim() {
            "1" => Ok(AddressFamily::V4),
            "2" => Ok(AddressFamily::V6),
            other => Err(DataConnectionError::NotSupported(other.to_string())),
        }
    }

    pub fn of(ip: &IpAddr) -> Self {
        match ip {
            IpAddr::V4(_) => AddressFamily::V4,
            IpAddr::V6(_) => AddressFamily::V6,
        }
    }

    pub fn unspecified(&self) -> IpAddr {
        match self {
            AddressFamily::V4 => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            AddressFamily::V6 => IpAddr::V6(std::net::Ipv6Addr::UNSPECIFIED),
        }
    }
}

impl fmt::Display for AddressFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddressFamily::V4 => write!(f, "IPv4"),
            AddressFamily::V6 => write!(f, "IPv6"),
        }
    }
}

/// Argument of `EPSV`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EpsvArgument {
    Default,
    Family(AddressFamily),
    All,
}

impl EpsvArgument {
    pub fn parse(arg: &str) -> Result<Self, DataConnectionError> {
        let arg = arg.trim();
        if arg.is_empty() {
            Ok(EpsvArgument::Default)
        } else if arg.eq_ignore_ascii_case("ALL") {
            Ok(EpsvArgument::All)
        } else {
            AddressFamily::from_code(arg).map(EpsvArgument::Family)
        }
    }
}

/// Parses `h1,h2,h3,h4,p1,p2`.
pub fn parse_port_argument(arg: &str) -> Result<SocketAddr, DataConnectionError> {
    let invalid = || DataConnectionError::InvalidAddress(arg.to_string());

    let parts = arg
        .trim()
        .split(',')
        .map(|p| p.trim().parse::<u8>())
        .collect::<Result<Vec<u8>, _>>()
        .map_err(|_| invalid())?;
    if parts.len() != 6 {
        return Err(invalid());
    }

    let ip = Ipv4Addr::new(parts[0], parts[1], parts[2], parts[3]);
    let port = u16::from(parts[4]) << 8 | u16::from(parts[5]);
    Ok(SocketAddr::new(IpAddr::V4(ip), port))
}

/// Parses `<d>af<d>address<d>port<d>`; the delimiter is whatever the first character is.
///
/// An empty `af` and/or `address` is filled in from the control connection's peer.
pub fn parse_eprt_argument(arg: &str, peer: SocketAddr) -> Result<SocketAddr, DataConnectionError> {
    let arg = arg.trim();
    let invalid = || DataConnectionError::InvalidAddress(arg.to_string());

    let delimiter = arg.chars().next().ok_or_else(invalid)?;
    let fields: Vec<&str> = arg.split(delimiter).collect();
    if fields.len() != 5 || !fields[0].is_empty() || !fields[4].is_empty() {
        return Err(invalid());
    }
    let (af, address, port) = (fields[1].trim(), fields[2].trim(), fields[3].trim());

    let family = if af.is_empty() {
        None
    } else {
        Some(AddressFamily::from_code(af)?)
    };

    let ip = if address.is_empty() {
        let ip = peer.ip();
        if family.is_some_and(|f| f != AddressFamily::of(&ip)) {
            return Err(DataConnectionError::NotSupported(af.to_string()));
        }
        ip
    } else {
        let ip: IpAddr = address.parse().map_err(|_| invalid())?;
        if family.is_some_and(|f| f != AddressFamily::of(&ip)) {
            return Err(invalid());
        }
        ip
    };

    let port: u16 = port.parse().map_err(|_| invalid())?;
    if port == 0 {
        return Err(invalid());
    }
    Ok(SocketAddr::new(ip, port))
}

/// Text of a `227` reply.
pub fn format_pasv_reply(ip: Ipv4Addr, port: u16) -> String {
    let [a, b, c, d] = ip.octets();
    format!(
        "Entering Passive Mode ({},{},{},{},{},{}).",
        a,
        b,
        c,
        d,
        port / 256,
        port % 256
    )
}

/// Text of a `229` reply.
pub fn format_epsv_reply(port: u16) -> String {
    format!("Entering Extended Passive Mode (|||{}|).", port)
}
