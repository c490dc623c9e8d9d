//! Endpoint address helpers
//!
//! The game room page connects to `ws://<host>/ws?gameId=<id>`. These
//! helpers build and check such addresses before a connect is attempted.

use thiserror::Error;
use url::Url;

const GAME_ID_PARAM: &str = "gameId";

#[derive(Debug, Error, PartialEq)]
pub enum EndpointError {
    #[error("Invalid endpoint url '{0}'")]
    InvalidUrl(String),
    #[error("Unsupported scheme '{0}', expected ws or wss")]
    UnsupportedScheme(String),
    #[error("Game id cannot be empty")]
    EmptyGameId,
}

fn parse_ws_url(address: &str) -> Result<Url, EndpointError> {
    let url = Url::parse(address).map_err(|_| EndpointError::InvalidUrl(address.to_string()))?;

    match url.scheme() {
        "ws" | "wss" => {}
        other => return Err(EndpointError::UnsupportedScheme(other.to_string())),
    }

    if url.host_str().is_none() {
        return Err(EndpointError::InvalidUrl(address.to_string()));
    }

    Ok(url)
}

/// Check that `address` is a usable WebSocket url and return it normalized
pub fn validate_ws_url(address: &str) -> Result<String, EndpointError> {
    parse_ws_url(address).map(String::from)
}

/// Build the address of a game room, replacing any existing `gameId` parameter
pub fn game_room_url(base: &str, game_id: &str) -> Result<String, EndpointError> {
    let game_id = game_id.trim();
    if game_id.is_empty() {
        return Err(EndpointError::EmptyGameId);
    }

    let mut url = parse_ws_url(base)?;
    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| key != GAME_ID_PARAM)
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();

    url.query_pairs_mut()
        .clear()
        .extend_pairs(kept)
        .append_pair(GAME_ID_PARAM, game_id);

    Ok(url.into())
}
