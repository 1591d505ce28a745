//! The request-response surface.
//!
//! | Method/Path | Success | Failure |
//! |---|---|---|
//! | GET `/lobbies` | 200 lobby list | — |
//! | POST `/lobbies` | 201 created | 400 / 409 |
//! | POST `/lobbies/{lobbyId}/join` | 200 joiner's view | 400 / 409 |
//! | POST `/lobbies/{lobbyId}/ptp/start` | 200 empty | 400 / 409 |
//! | GET `/ping` | 200 `pong` | — |
//!
//! Plus the WebSocket upgrade on `/` (see [`crate::ws`]).
//!
//! 400 means the body failed schema validation (including an unknown
//! or malformed token); 409 means a precondition failed, and the
//! `errors` array carries the user-facing explanation. Each handler
//! checks schema, then token, then preconditions, in that order.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::warn;

use orion_core::{CreateLobbyParams, LobbyError};
use orion_proto::validate::{validate_capacity, validate_name};
use orion_proto::ProtoError;

use crate::state::AppState;
use crate::ws;

/// Build the complete router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(ws::upgrade))
        .route("/ping", get(ping))
        .route("/lobbies", get(list_lobbies).post(create_lobby))
        .route("/lobbies/{lobby_id}/join", post(join_lobby))
        .route("/lobbies/{lobby_id}/ptp/start", post(start_mediation))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Request/response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateLobbyRequest {
    pub token: String,
    pub host_name: String,
    pub lobby_name: String,
    pub is_public: bool,
    pub max_members: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateLobbyResponse {
    pub lobby_name: String,
    pub lobby_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinLobbyRequest {
    pub token: String,
    pub peer_name: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinLobbyResponse {
    pub lobby_id: String,
    pub lobby_name: String,
    /// Display names in join order, host first.
    pub lobby_members: Vec<String>,
    /// The host's display name.
    pub host: String,
}

#[derive(Debug, Deserialize)]
pub struct StartMediationRequest {
    pub token: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LobbySummary {
    pub name: String,
    pub id: String,
    pub current_members: u32,
    pub max_members: u32,
}

#[derive(Debug, Serialize)]
pub struct ListLobbiesResponse {
    pub lobbies: Vec<LobbySummary>,
}

// ---------------------------------------------------------------------------
// Error mapping
// ---------------------------------------------------------------------------

/// A request-response failure.
pub enum ApiError {
    /// Body failed schema validation, or the token is unknown → 400.
    Schema(String),
    /// A state precondition failed → 409 with the user-facing string.
    Conflict(LobbyError),
}

impl From<ProtoError> for ApiError {
    fn from(err: ProtoError) -> Self {
        Self::Schema(err.to_string())
    }
}

impl From<LobbyError> for ApiError {
    fn from(err: LobbyError) -> Self {
        Self::Conflict(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::Schema(message) => {
                warn!(%message, "rejecting invalid request body");
                (StatusCode::BAD_REQUEST, message)
            }
            Self::Conflict(err) => {
                warn!(error = %err, "rejecting conflicting request");
                (StatusCode::CONFLICT, err.to_string())
            }
        };
        (status, Json(serde_json::json!({ "errors": [message] }))).into_response()
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn ping() -> &'static str {
    "pong"
}

async fn list_lobbies(State(state): State<AppState>) -> Json<ListLobbiesResponse> {
    let lobbies = state
        .lobbies
        .list_public()
        .into_iter()
        .map(|s| LobbySummary {
            name: s.name,
            id: s.id,
            current_members: s.current_members,
            max_members: s.capacity,
        })
        .collect();
    Json(ListLobbiesResponse { lobbies })
}

async fn create_lobby(
    State(state): State<AppState>,
    body: Result<Json<CreateLobbyRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<CreateLobbyResponse>), ApiError> {
    let Json(request) = body.map_err(|e| ApiError::Schema(e.to_string()))?;
    validate_name(&request.host_name)?;
    validate_name(&request.lobby_name)?;
    validate_capacity(request.max_members)?;

    let session = state
        .sessions
        .resolve(&request.token)
        .ok_or_else(|| ApiError::Schema("unknown token".to_string()))?;

    let summary = state.lobbies.create(
        session,
        CreateLobbyParams {
            host_name: request.host_name,
            lobby_name: request.lobby_name,
            is_public: request.is_public,
            capacity: request.max_members,
        },
    )?;

    Ok((
        StatusCode::CREATED,
        Json(CreateLobbyResponse {
            lobby_name: summary.name,
            lobby_id: summary.id,
        }),
    ))
}

async fn join_lobby(
    State(state): State<AppState>,
    Path(lobby_id): Path<String>,
    body: Result<Json<JoinLobbyRequest>, JsonRejection>,
) -> Result<Json<JoinLobbyResponse>, ApiError> {
    let Json(request) = body.map_err(|e| ApiError::Schema(e.to_string()))?;
    validate_name(&request.peer_name)?;

    let session = state
        .sessions
        .resolve(&request.token)
        .ok_or_else(|| ApiError::Schema("unknown token".to_string()))?;

    let summary = state
        .lobbies
        .join(&lobby_id, session, &request.peer_name)?;

    Ok(Json(JoinLobbyResponse {
        lobby_id: summary.lobby_id,
        lobby_name: summary.lobby_name,
        lobby_members: summary.lobby_members,
        host: summary.host_name,
    }))
}

async fn start_mediation(
    State(state): State<AppState>,
    Path(lobby_id): Path<String>,
    body: Result<Json<StartMediationRequest>, JsonRejection>,
) -> Result<StatusCode, ApiError> {
    let Json(request) = body.map_err(|e| ApiError::Schema(e.to_string()))?;

    let session = state
        .sessions
        .resolve(&request.token)
        .ok_or_else(|| ApiError::Schema("unknown token".to_string()))?;

    state.lobbies.start_mediation(&session, &lobby_id)?;
    Ok(StatusCode::OK)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflict_maps_to_409() {
        let response = ApiError::Conflict(LobbyError::NotHost).into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn test_schema_maps_to_400() {
        let response = ApiError::Schema("bad body".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_validation_error_converts_to_schema() {
        let err: ApiError = validate_capacity(0).expect_err("invalid").into();
        assert!(matches!(err, ApiError::Schema(_)));
    }

    #[test]
    fn test_request_wire_names() {
        let request: CreateLobbyRequest = serde_json::from_value(serde_json::json!({
            "token": "t",
            "hostName": "jt",
            "lobbyName": "My lobby",
            "isPublic": true,
            "maxMembers": 3,
        }))
        .expect("deserialize");
        assert_eq!(request.host_name, "jt");
        assert_eq!(request.max_members, 3);
    }

    #[test]
    fn test_negative_max_members_is_a_schema_error() {
        let result: Result<CreateLobbyRequest, _> =
            serde_json::from_value(serde_json::json!({
                "token": "t",
                "hostName": "jt",
                "lobbyName": "My lobby",
                "isPublic": true,
                "maxMembers": -1,
            }));
        assert!(result.is_err());
    }

    #[test]
    fn test_response_wire_names() {
        let value = serde_json::to_value(ListLobbiesResponse {
            lobbies: vec![LobbySummary {
                name: "My lobby".to_string(),
                id: "AB12C".to_string(),
                current_members: 1,
                max_members: 3,
            }],
        })
        .expect("serialize");
        assert_eq!(value["lobbies"][0]["currentMembers"], 1);
        assert_eq!(value["lobbies"][0]["maxMembers"], 3);

        let value = serde_json::to_value(JoinLobbyResponse {
            lobby_id: "AB12C".to_string(),
            lobby_name: "My lobby".to_string(),
            lobby_members: vec!["jt".to_string(), "peer0".to_string()],
            host: "jt".to_string(),
        })
        .expect("serialize");
        assert_eq!(value["lobbyId"], "AB12C");
        assert_eq!(value["lobbyMembers"][1], "peer0");
        assert_eq!(value["host"], "jt");
    }
}
