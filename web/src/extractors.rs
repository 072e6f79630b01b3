//! Request metadata extractors.
//!
//! - `CorrelationId`: from `X-Correlation-ID`, generated when absent
//! - `ClientIp`: from the connection, or proxy headers behind a trusted proxy
//! - `UserAgent`: the `User-Agent` header, if any
//! - `BearerToken`: the `Authorization: Bearer` token, if any
//!
//! None of them reject; handlers decide what a missing value means.

use axum::{
    async_trait,
    extract::{ConnectInfo, FromRequestParts},
    http::{HeaderMap, header, request::Parts},
};
use std::net::{IpAddr, SocketAddr};
use uuid::Uuid;

/// Correlation id of the current request.
///
/// Same value the correlation middleware put on the span; without the
/// middleware, read from `X-Correlation-ID` or freshly generated.
#[derive(Debug, Clone, Copy)]
pub struct CorrelationId(pub Uuid);

#[async_trait]
impl<S> FromRequestParts<S> for CorrelationId
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        // Prefer the id the middleware already chose for this request.
        if let Some(id) = parts.extensions.get::<Uuid>() {
            return Ok(Self(*id));
        }

        Ok(Self(
            crate::middleware::from_headers(&parts.headers).unwrap_or_else(Uuid::new_v4),
        ))
    }
}

/// Client IP address, when one can be determined.
///
/// Proxy headers are only believed when the peer is a trusted proxy: a
/// loopback, private or unique-local address. A public peer is the client
/// itself and any `X-Forwarded-For` it sends is ignored. Without
/// `ConnectInfo` the peer is unknown and the headers are used as-is, so
/// production must serve with `into_make_service_with_connect_info`.
///
/// # Priority (trusted or unknown peer)
///
/// 1. `X-Forwarded-For` (last IP in the list, the one our proxy appended)
/// 2. `X-Real-IP`
/// 3. Connection IP
#[derive(Debug, Clone, Copy)]
pub struct ClientIp(pub Option<IpAddr>);

#[async_trait]
impl<S> FromRequestParts<S> for ClientIp
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let ip = extract_client_ip(&parts.headers, parts.extensions.get());
        Ok(Self(ip))
    }
}

fn is_trusted_proxy(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => v4.is_loopback() || v4.is_private(),
        IpAddr::V6(v6) => match v6.to_ipv4_mapped() {
            Some(v4) => v4.is_loopback() || v4.is_private(),
            // fc00::/7
            None => v6.is_loopback() || (v6.segments()[0] & 0xfe00) == 0xfc00,
        },
    }
}

fn extract_client_ip(
    headers: &HeaderMap,
    connect_info: Option<&ConnectInfo<SocketAddr>>,
) -> Option<IpAddr> {
    let peer = connect_info.map(|ConnectInfo(addr)| addr.ip());
    if peer.is_some_and(|ip| !is_trusted_proxy(ip)) {
        return peer;
    }

    let forwarded = headers
        .get("X-Forwarded-For")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.rsplit(',').next())
        .and_then(|last| last.trim().parse::<IpAddr>().ok());
    if forwarded.is_some() {
        return forwarded;
    }

    let real_ip = headers
        .get("X-Real-IP")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<IpAddr>().ok());
    if real_ip.is_some() {
        return real_ip;
    }

    peer
}

/// User-Agent header.
#[derive(Debug, Clone)]
pub struct UserAgent(pub Option<String>);

#[async_trait]
impl<S> FromRequestParts<S> for UserAgent
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_agent = parts
            .headers
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(ToString::to_string);

        Ok(Self(user_agent))
    }
}

/// Bearer token from the `Authorization` header.
///
/// `None` when the header is missing, not UTF-8, or not a bearer credential.
#[derive(Debug, Clone)]
pub struct BearerToken(pub Option<String>);

#[async_trait]
impl<S> FromRequestParts<S> for BearerToken
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| {
                v.strip_prefix("Bearer ")
                    .or_else(|| v.strip_prefix("bearer "))
            })
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(ToString::to_string);

        Ok(Self(token))
    }
}
