use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Router,
};
use serde::Serialize;
use serde_json::json;
use tracing::error;

use super::access::AccessDenied;
use super::cache::ViewCache;
use super::domain::{Caller, OfferId, Role, SavedHomeId, TourId, UserId};
use super::notifications::NotificationDispatcher;
use super::repository::BuyerRepository;
use super::service::{BuyerWorkflowService, WorkflowError};
use super::validation::{OfferForm, OfferStatusForm, SavedHomeForm, TourRequestForm, TourStatusForm};

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";
pub const USER_NAME_HEADER: &str = "x-user-name";
pub const USER_EMAIL_HEADER: &str = "x-user-email";

type Service<R, N, C> = Arc<BuyerWorkflowService<R, N, C>>;
type Form<T> = Result<axum::Json<T>, JsonRejection>;

/// Router exposing the buyer workflow under `/api/v1/buyer`.
pub fn buyer_router<R, N, C>(service: Service<R, N, C>) -> Router
where
    R: BuyerRepository + 'static,
    N: NotificationDispatcher + 'static,
    C: ViewCache + 'static,
{
    Router::new()
        .route(
            "/api/v1/buyer/saved-homes",
            post(create_home_handler::<R, N, C>).get(list_homes_handler::<R, N, C>),
        )
        .route(
            "/api/v1/buyer/saved-homes/:saved_home_id",
            get(get_home_handler::<R, N, C>)
                .put(update_home_handler::<R, N, C>)
                .delete(delete_home_handler::<R, N, C>),
        )
        .route(
            "/api/v1/buyer/tours",
            post(request_tour_handler::<R, N, C>).get(list_tours_handler::<R, N, C>),
        )
        .route(
            "/api/v1/buyer/tours/:tour_id/status",
            put(tour_status_handler::<R, N, C>),
        )
        .route(
            "/api/v1/buyer/tours/:tour_id/cancel",
            post(cancel_tour_handler::<R, N, C>),
        )
        .route(
            "/api/v1/buyer/offers",
            post(create_offer_handler::<R, N, C>).get(list_offers_handler::<R, N, C>),
        )
        .route(
            "/api/v1/buyer/offers/:offer_id/status",
            put(offer_status_handler::<R, N, C>),
        )
        .route(
            "/api/v1/buyer/offers/:offer_id/withdraw",
            post(withdraw_offer_handler::<R, N, C>),
        )
        .route("/api/v1/buyer/overview", get(overview_handler::<R, N, C>))
        .with_state(service)
}

/// Resolves the session identity forwarded by the auth proxy.
///
/// A missing or blank user id means an anonymous request.
pub fn caller_from_headers(headers: &HeaderMap) -> Option<Caller> {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
    };

    let user_id = header(USER_ID_HEADER)?;
    Some(Caller {
        user_id: UserId(user_id),
        role: header(USER_ROLE_HEADER)
            .map(|role| Role::parse(&role))
            .unwrap_or_default(),
        name: header(USER_NAME_HEADER),
        email: header(USER_EMAIL_HEADER),
    })
}

async fn create_home_handler<R, N, C>(
    State(service): State<Service<R, N, C>>,
    headers: HeaderMap,
    form: Form<SavedHomeForm>,
) -> Response
where
    R: BuyerRepository + 'static,
    N: NotificationDispatcher + 'static,
    C: ViewCache + 'static,
{
    let (caller, form) = match authenticated_form(&headers, form) {
        Ok(parts) => parts,
        Err(response) => return response,
    };
    respond(StatusCode::CREATED, service.create_saved_home(Some(&caller), form))
}

async fn list_homes_handler<R, N, C>(
    State(service): State<Service<R, N, C>>,
    headers: HeaderMap,
) -> Response
where
    R: BuyerRepository + 'static,
    N: NotificationDispatcher + 'static,
    C: ViewCache + 'static,
{
    let caller = caller_from_headers(&headers);
    respond(StatusCode::OK, service.list_saved_homes(caller.as_ref()))
}

async fn get_home_handler<R, N, C>(
    State(service): State<Service<R, N, C>>,
    headers: HeaderMap,
    Path(saved_home_id): Path<String>,
) -> Response
where
    R: BuyerRepository + 'static,
    N: NotificationDispatcher + 'static,
    C: ViewCache + 'static,
{
    let caller = caller_from_headers(&headers);
    respond(
        StatusCode::OK,
        service.get_saved_home(caller.as_ref(), &SavedHomeId(saved_home_id)),
    )
}

async fn update_home_handler<R, N, C>(
    State(service): State<Service<R, N, C>>,
    headers: HeaderMap,
    Path(saved_home_id): Path<String>,
    form: Form<SavedHomeForm>,
) -> Response
where
    R: BuyerRepository + 'static,
    N: NotificationDispatcher + 'static,
    C: ViewCache + 'static,
{
    let (caller, form) = match authenticated_form(&headers, form) {
        Ok(parts) => parts,
        Err(response) => return response,
    };
    respond(
        StatusCode::OK,
        service.update_saved_home(Some(&caller), &SavedHomeId(saved_home_id), form),
    )
}

async fn delete_home_handler<R, N, C>(
    State(service): State<Service<R, N, C>>,
    headers: HeaderMap,
    Path(saved_home_id): Path<String>,
) -> Response
where
    R: BuyerRepository + 'static,
    N: NotificationDispatcher + 'static,
    C: ViewCache + 'static,
{
    let caller = caller_from_headers(&headers);
    match service.delete_saved_home(caller.as_ref(), &SavedHomeId(saved_home_id)) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => error_response(err),
    }
}

async fn request_tour_handler<R, N, C>(
    State(service): State<Service<R, N, C>>,
    headers: HeaderMap,
    form: Form<TourRequestForm>,
) -> Response
where
    R: BuyerRepository + 'static,
    N: NotificationDispatcher + 'static,
    C: ViewCache + 'static,
{
    let (caller, form) = match authenticated_form(&headers, form) {
        Ok(parts) => parts,
        Err(response) => return response,
    };
    respond(StatusCode::CREATED, service.request_tour(Some(&caller), form))
}

async fn list_tours_handler<R, N, C>(
    State(service): State<Service<R, N, C>>,
    headers: HeaderMap,
) -> Response
where
    R: BuyerRepository + 'static,
    N: NotificationDispatcher + 'static,
    C: ViewCache + 'static,
{
    let caller = caller_from_headers(&headers);
    respond(StatusCode::OK, service.list_tours(caller.as_ref()))
}

async fn tour_status_handler<R, N, C>(
    State(service): State<Service<R, N, C>>,
    headers: HeaderMap,
    Path(tour_id): Path<String>,
    form: Form<TourStatusForm>,
) -> Response
where
    R: BuyerRepository + 'static,
    N: NotificationDispatcher + 'static,
    C: ViewCache + 'static,
{
    let (caller, form) = match authenticated_form(&headers, form) {
        Ok(parts) => parts,
        Err(response) => return response,
    };
    respond(
        StatusCode::OK,
        service.update_tour_status(Some(&caller), &tour_id, form),
    )
}

async fn cancel_tour_handler<R, N, C>(
    State(service): State<Service<R, N, C>>,
    headers: HeaderMap,
    Path(tour_id): Path<String>,
) -> Response
where
    R: BuyerRepository + 'static,
    N: NotificationDispatcher + 'static,
    C: ViewCache + 'static,
{
    let caller = caller_from_headers(&headers);
    respond(
        StatusCode::OK,
        service.cancel_tour(caller.as_ref(), &TourId(tour_id)),
    )
}

async fn create_offer_handler<R, N, C>(
    State(service): State<Service<R, N, C>>,
    headers: HeaderMap,
    form: Form<OfferForm>,
) -> Response
where
    R: BuyerRepository + 'static,
    N: NotificationDispatcher + 'static,
    C: ViewCache + 'static,
{
    let (caller, form) = match authenticated_form(&headers, form) {
        Ok(parts) => parts,
        Err(response) => return response,
    };
    respond(StatusCode::CREATED, service.create_offer(Some(&caller), form))
}

async fn list_offers_handler<R, N, C>(
    State(service): State<Service<R, N, C>>,
    headers: HeaderMap,
) -> Response
where
    R: BuyerRepository + 'static,
    N: NotificationDispatcher + 'static,
    C: ViewCache + 'static,
{
    let caller = caller_from_headers(&headers);
    respond(StatusCode::OK, service.list_offers(caller.as_ref()))
}

async fn offer_status_handler<R, N, C>(
    State(service): State<Service<R, N, C>>,
    headers: HeaderMap,
    Path(offer_id): Path<String>,
    form: Form<OfferStatusForm>,
) -> Response
where
    R: BuyerRepository + 'static,
    N: NotificationDispatcher + 'static,
    C: ViewCache + 'static,
{
    let (caller, form) = match authenticated_form(&headers, form) {
        Ok(parts) => parts,
        Err(response) => return response,
    };
    respond(
        StatusCode::OK,
        service.update_offer_status(Some(&caller), &offer_id, form),
    )
}

async fn withdraw_offer_handler<R, N, C>(
    State(service): State<Service<R, N, C>>,
    headers: HeaderMap,
    Path(offer_id): Path<String>,
) -> Response
where
    R: BuyerRepository + 'static,
    N: NotificationDispatcher + 'static,
    C: ViewCache + 'static,
{
    let caller = caller_from_headers(&headers);
    respond(
        StatusCode::OK,
        service.withdraw_offer(caller.as_ref(), &OfferId(offer_id)),
    )
}

async fn overview_handler<R, N, C>(
    State(service): State<Service<R, N, C>>,
    headers: HeaderMap,
) -> Response
where
    R: BuyerRepository + 'static,
    N: NotificationDispatcher + 'static,
    C: ViewCache + 'static,
{
    let caller = caller_from_headers(&headers);
    respond(StatusCode::OK, service.overview(caller.as_ref()))
}

fn respond<T: Serialize>(status: StatusCode, result: Result<T, WorkflowError>) -> Response {
    match result {
        Ok(body) => (status, axum::Json(body)).into_response(),
        Err(err) => error_response(err),
    }
}

/// Anonymous requests get 401 before their body is looked at.
fn authenticated_form<T>(headers: &HeaderMap, form: Form<T>) -> Result<(Caller, T), Response> {
    let caller = caller_from_headers(headers)
        .ok_or_else(|| error_response(WorkflowError::Unauthorized(AccessDenied::Anonymous)))?;
    match form {
        Ok(axum::Json(form)) => Ok((caller, form)),
        Err(rejection) => Err(rejected(rejection)),
    }
}

fn rejected(rejection: JsonRejection) -> Response {
    let payload = json!({
        "error": rejection.body_text(),
    });
    (StatusCode::UNPROCESSABLE_ENTITY, axum::Json(payload)).into_response()
}

/// Maps a workflow failure onto the HTTP status and public message.
pub fn error_response(err: WorkflowError) -> Response {
    let status = match &err {
        WorkflowError::Unauthorized(AccessDenied::Anonymous) => StatusCode::UNAUTHORIZED,
        WorkflowError::Unauthorized(AccessDenied::NotOwner { .. }) | WorkflowError::NotFound(_) => {
            StatusCode::NOT_FOUND
        }
        WorkflowError::Unauthorized(AccessDenied::OwnerOnly { .. }) => StatusCode::FORBIDDEN,
        WorkflowError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        WorkflowError::Conflict(_) | WorkflowError::InvalidTransition { .. } => StatusCode::CONFLICT,
        WorkflowError::Storage(source) => {
            error!(error = %source, "buyer workflow storage failure");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };

    let payload = match &err {
        WorkflowError::Validation(invalid) => json!({
            "error": err.public_message(),
            "field": invalid.field,
        }),
        _ => json!({
            "error": err.public_message(),
        }),
    };
    (status, axum::Json(payload)).into_response()
}
