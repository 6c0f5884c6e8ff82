//! HTTP handlers. Each one unpacks the request, calls into `session_api` and maps the
//! outcome onto a status code.

use std::sync::Arc;

use axum::{
    async_trait,
    extract::{rejection::JsonRejection, FromRequest, Path, Query, Request, State},
    http::StatusCode,
    Json,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use session_api::{
    board, listing,
    listing::{BoardSummary, RoomSummary},
    poker::{self, JoinOutcome},
    visibility::{BoardView, RoomView},
};
use shared::{
    domain::{BoardId, BoardVisibility, NoteId, RoomId, SectionId, VoteKind},
    error::{ApiError, ErrorCode, SessionError},
    protocol::{
        BoardVisibilityRequest, CastVoteRequest, CreateBoardRequest, CreateBoardResponse,
        CreateRoomRequest, CreateRoomResponse, NoteContentRequest, NoteCreatedResponse,
        NoteStatusRequest, PlayerNameRequest, RoomActionRequest, SectionCreatedResponse,
        SectionTitleRequest, ViewerQuery, VoteNoteRequest,
    },
};
use tracing::error;

use crate::AppState;

pub(crate) type HttpError = (StatusCode, Json<ApiError>);
type HttpResult<T> = Result<Json<T>, HttpError>;

pub(crate) fn status_for(code: ErrorCode) -> StatusCode {
    match code {
        ErrorCode::NotFound => StatusCode::NOT_FOUND,
        ErrorCode::Forbidden => StatusCode::FORBIDDEN,
        ErrorCode::InvalidArgument => StatusCode::BAD_REQUEST,
        ErrorCode::Conflict => StatusCode::CONFLICT,
        ErrorCode::StoreUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub(crate) fn http_error(err: SessionError) -> HttpError {
    if matches!(err, SessionError::Internal(_)) {
        error!(error = %err, "request failed");
    }
    (status_for(err.code()), Json(ApiError::from(err)))
}

/// `Json` whose rejections use the `ApiError` body. Unparseable input is
/// `invalid_argument`; oversized or mistyped bodies keep their 413/415 status.
pub(crate) struct JsonBody<T>(pub(crate) T);

#[async_trait]
impl<T, S> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = HttpError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => Err(json_rejection(rejection)),
        }
    }
}

fn json_rejection(rejection: JsonRejection) -> HttpError {
    let status = rejection.status();
    let status = if status == StatusCode::PAYLOAD_TOO_LARGE
        || status == StatusCode::UNSUPPORTED_MEDIA_TYPE
    {
        status
    } else {
        StatusCode::BAD_REQUEST
    };
    (
        status,
        Json(ApiError::new(ErrorCode::InvalidArgument, rejection.body_text())),
    )
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct VoteNoteResponse {
    pub(crate) my_vote: Option<VoteKind>,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct VisibilityResponse {
    pub(crate) visibility: BoardVisibility,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct JoinResponse {
    pub(crate) outcome: JoinOutcome,
}

type NotePath = Path<(BoardId, SectionId, NoteId)>;

pub(crate) async fn create_board(
    State(state): State<Arc<AppState>>,
    JsonBody(req): JsonBody<CreateBoardRequest>,
) -> HttpResult<CreateBoardResponse> {
    let board_id = board::create_board(&state.api, &req.user_id, &req.title)
        .await
        .map_err(http_error)?;
    Ok(Json(CreateBoardResponse { board_id }))
}

pub(crate) async fn list_boards(
    State(state): State<Arc<AppState>>,
    Query(q): Query<ViewerQuery>,
) -> HttpResult<Vec<BoardSummary>> {
    let boards = listing::list_user_boards(&state.api, &q.user_id)
        .await
        .map_err(http_error)?;
    Ok(Json(boards))
}

pub(crate) async fn get_board(
    State(state): State<Arc<AppState>>,
    Path(board_id): Path<BoardId>,
    Query(q): Query<ViewerQuery>,
) -> HttpResult<BoardView> {
    let view = board::board_view(&state.api, &board_id, &q.user_id)
        .await
        .map_err(http_error)?;
    Ok(Json(view))
}

pub(crate) async fn add_section(
    State(state): State<Arc<AppState>>,
    Path(board_id): Path<BoardId>,
    JsonBody(req): JsonBody<SectionTitleRequest>,
) -> HttpResult<SectionCreatedResponse> {
    let section_id = board::add_section(&state.api, &board_id, &req.user_id, &req.title)
        .await
        .map_err(http_error)?;
    Ok(Json(SectionCreatedResponse { section_id }))
}

pub(crate) async fn rename_section(
    State(state): State<Arc<AppState>>,
    Path((board_id, section_id)): Path<(BoardId, SectionId)>,
    JsonBody(req): JsonBody<SectionTitleRequest>,
) -> Result<StatusCode, HttpError> {
    board::rename_section(&state.api, &board_id, &section_id, &req.user_id, &req.title)
        .await
        .map_err(http_error)?;
    Ok(StatusCode::NO_CONTENT)
}

pub(crate) async fn set_visibility(
    State(state): State<Arc<AppState>>,
    Path(board_id): Path<BoardId>,
    JsonBody(req): JsonBody<BoardVisibilityRequest>,
) -> HttpResult<VisibilityResponse> {
    let visibility =
        board::set_board_visibility(&state.api, &board_id, &req.user_id, req.visibility)
            .await
            .map_err(http_error)?;
    Ok(Json(VisibilityResponse { visibility }))
}

pub(crate) async fn toggle_visibility(
    State(state): State<Arc<AppState>>,
    Path(board_id): Path<BoardId>,
    JsonBody(req): JsonBody<RoomActionRequest>,
) -> HttpResult<VisibilityResponse> {
    let visibility = board::toggle_board_visibility(&state.api, &board_id, &req.user_id)
        .await
        .map_err(http_error)?;
    Ok(Json(VisibilityResponse { visibility }))
}

pub(crate) async fn add_note(
    State(state): State<Arc<AppState>>,
    Path((board_id, section_id)): Path<(BoardId, SectionId)>,
    JsonBody(req): JsonBody<NoteContentRequest>,
) -> HttpResult<NoteCreatedResponse> {
    let note_id = board::add_note(&state.api, &board_id, &section_id, &req.user_id, &req.content)
        .await
        .map_err(http_error)?;
    Ok(Json(NoteCreatedResponse { note_id }))
}

pub(crate) async fn edit_note(
    State(state): State<Arc<AppState>>,
    Path((board_id, section_id, note_id)): NotePath,
    JsonBody(req): JsonBody<NoteContentRequest>,
) -> Result<StatusCode, HttpError> {
    board::edit_note(
        &state.api,
        &board_id,
        &section_id,
        &note_id,
        &req.user_id,
        &req.content,
    )
    .await
    .map_err(http_error)?;
    Ok(StatusCode::NO_CONTENT)
}

pub(crate) async fn delete_note(
    State(state): State<Arc<AppState>>,
    Path((board_id, section_id, note_id)): NotePath,
    Query(q): Query<ViewerQuery>,
) -> Result<StatusCode, HttpError> {
    board::delete_note(&state.api, &board_id, &section_id, &note_id, &q.user_id)
        .await
        .map_err(http_error)?;
    Ok(StatusCode::NO_CONTENT)
}

pub(crate) async fn vote_note(
    State(state): State<Arc<AppState>>,
    Path((board_id, section_id, note_id)): NotePath,
    JsonBody(req): JsonBody<VoteNoteRequest>,
) -> HttpResult<VoteNoteResponse> {
    let my_vote = board::vote_note(
        &state.api,
        &board_id,
        &section_id,
        &note_id,
        &req.user_id,
        req.kind,
    )
    .await
    .map_err(http_error)?;
    Ok(Json(VoteNoteResponse { my_vote }))
}

pub(crate) async fn set_note_status(
    State(state): State<Arc<AppState>>,
    Path((board_id, section_id, note_id)): NotePath,
    JsonBody(req): JsonBody<NoteStatusRequest>,
) -> Result<StatusCode, HttpError> {
    board::set_note_status(
        &state.api,
        &board_id,
        &section_id,
        &note_id,
        &req.user_id,
        req.status,
    )
    .await
    .map_err(http_error)?;
    Ok(StatusCode::NO_CONTENT)
}

pub(crate) async fn create_room(
    State(state): State<Arc<AppState>>,
    JsonBody(req): JsonBody<CreateRoomRequest>,
) -> HttpResult<CreateRoomResponse> {
    let room_id = poker::create_room(&state.api, &req.user_id, &req.name)
        .await
        .map_err(http_error)?;
    Ok(Json(CreateRoomResponse { room_id }))
}

pub(crate) async fn list_rooms(
    State(state): State<Arc<AppState>>,
    Query(q): Query<ViewerQuery>,
) -> HttpResult<Vec<RoomSummary>> {
    let rooms = listing::list_user_rooms(&state.api, &q.user_id)
        .await
        .map_err(http_error)?;
    Ok(Json(rooms))
}

pub(crate) async fn get_room(
    State(state): State<Arc<AppState>>,
    Path(room_id): Path<RoomId>,
    Query(q): Query<ViewerQuery>,
) -> HttpResult<RoomView> {
    let view = poker::room_view(&state.api, &room_id, &q.user_id)
        .await
        .map_err(http_error)?;
    Ok(Json(view))
}

pub(crate) async fn join_room(
    State(state): State<Arc<AppState>>,
    Path(room_id): Path<RoomId>,
    JsonBody(req): JsonBody<PlayerNameRequest>,
) -> HttpResult<JoinResponse> {
    let outcome = poker::join_room(&state.api, &room_id, &req.user_id, &req.name)
        .await
        .map_err(http_error)?;
    Ok(Json(JoinResponse { outcome }))
}

pub(crate) async fn cast_vote(
    State(state): State<Arc<AppState>>,
    Path(room_id): Path<RoomId>,
    JsonBody(req): JsonBody<CastVoteRequest>,
) -> Result<StatusCode, HttpError> {
    poker::cast_vote(&state.api, &room_id, &req.user_id, req.vote)
        .await
        .map_err(http_error)?;
    Ok(StatusCode::NO_CONTENT)
}

pub(crate) async fn reveal(
    State(state): State<Arc<AppState>>,
    Path(room_id): Path<RoomId>,
    JsonBody(req): JsonBody<RoomActionRequest>,
) -> Result<StatusCode, HttpError> {
    poker::reveal(&state.api, &room_id, &req.user_id)
        .await
        .map_err(http_error)?;
    Ok(StatusCode::NO_CONTENT)
}

pub(crate) async fn reset(
    State(state): State<Arc<AppState>>,
    Path(room_id): Path<RoomId>,
    JsonBody(req): JsonBody<RoomActionRequest>,
) -> Result<StatusCode, HttpError> {
    poker::reset(&state.api, &room_id, &req.user_id)
        .await
        .map_err(http_error)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Players rename themselves; the caller is also the target.
pub(crate) async fn rename_player(
    State(state): State<Arc<AppState>>,
    Path(room_id): Path<RoomId>,
    JsonBody(req): JsonBody<PlayerNameRequest>,
) -> Result<StatusCode, HttpError> {
    poker::rename_player(&state.api, &room_id, &req.user_id, &req.user_id, &req.name)
        .await
        .map_err(http_error)?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
#[path = "tests/mod_tests.rs"]
mod tests;
