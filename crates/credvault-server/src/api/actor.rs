//! Request actor extraction

use std::convert::Infallible;
use std::net::SocketAddr;

use axum::async_trait;
use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::request::Parts;
use axum::http::HeaderMap;

use credvault_core::Actor;

/// Header carrying the authenticated user id, set by the fronting auth proxy
pub const ACTOR_HEADER: &str = "x-actor-id";

const ANONYMOUS: &str = "anonymous";

/// Actor of the current request
#[derive(Debug, Clone)]
pub struct RequestActor(pub Actor);

#[async_trait]
impl<S> FromRequestParts<S> for RequestActor
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);

        Ok(Self(actor_from(&parts.headers, peer)))
    }
}

fn actor_from(headers: &HeaderMap, peer: Option<SocketAddr>) -> Actor {
    let user = headers
        .get(ACTOR_HEADER)
        .and_then(|h| h.to_str().ok())
        .map(str::trim)
        .filter(|u| !u.is_empty())
        .unwrap_or(ANONYMOUS);

    // first hop of x-forwarded-for wins over the socket peer
    let address = headers
        .get("x-forwarded-for")
        .and_then(|h| h.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .map(str::to_string)
        .or_else(|| peer.map(|addr| addr.ip().to_string()));

    Actor::new(user, address)
}
