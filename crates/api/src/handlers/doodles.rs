//! Handlers for the doodle snapshot and server info endpoints.

use std::net::{IpAddr, Ipv4Addr};

use axum::extract::{Query, State};
use axum::Json;
use doodlewall_core::error::CoreError;
use doodlewall_core::protocol::LatestDoodles;
use serde::{Deserialize, Serialize};

use crate::error::AppResult;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct LatestQuery {
    /// Requested count, clamped to `MAX_IMAGES`.
    pub limit: Option<usize>,
}

/// GET /get_latest_doodles, GET /api/v1/doodles/latest
///
/// Newest-first image URIs. In-memory read only.
pub async fn latest_doodles(
    State(state): State<AppState>,
    Query(query): Query<LatestQuery>,
) -> AppResult<Json<LatestDoodles>> {
    let cap = state.config.max_images;
    let limit = match query.limit {
        Some(0) => {
            return Err(CoreError::Validation("limit must be at least 1".into()).into());
        }
        Some(n) => n.min(cap),
        None => cap,
    };

    let doodles = state
        .hub
        .snapshot(Some(limit))
        .await
        .into_iter()
        .map(|d| d.uri)
        .collect();

    Ok(Json(LatestDoodles { doodles }))
}

#[derive(Debug, Serialize)]
pub struct ServerInfo {
    #[serde(rename = "IP")]
    pub ip: String,
    #[serde(rename = "PORT")]
    pub port: u16,
}

/// GET /get_server_info
///
/// The address drawing clients on the LAN should connect to, and the port
/// the hub actually bound to.
pub async fn server_info(State(state): State<AppState>) -> Json<ServerInfo> {
    let ip = advertised_ip(state.local_addr.ip(), local_ip_address::local_ip);
    Json(ServerInfo {
        ip: ip.to_string(),
        port: state.local_addr.port(),
    })
}

/// The address to advertise for a listener bound to `bound`.
///
/// A concrete bind address is reported as is. For a wildcard bind the
/// first non-loopback IPv4 address from `lookup` is used, falling back to
/// `127.0.0.1`.
pub fn advertised_ip<E: std::fmt::Display>(
    bound: IpAddr,
    lookup: impl FnOnce() -> Result<IpAddr, E>,
) -> IpAddr {
    if !bound.is_unspecified() {
        return bound;
    }
    match lookup() {
        Ok(ip @ IpAddr::V4(v4)) if !v4.is_loopback() && !v4.is_unspecified() => ip,
        Ok(ip) => {
            tracing::debug!(%ip, "No LAN IPv4 address, advertising loopback");
            IpAddr::V4(Ipv4Addr::LOCALHOST)
        }
        Err(e) => {
            tracing::warn!(error = %e, "Failed to resolve LAN address, advertising loopback");
            IpAddr::V4(Ipv4Addr::LOCALHOST)
        }
    }
}
