//! HTTP route handlers.

use axum::body::Bytes;
use axum::{
    Json, Router,
    extract::{
        Path, Query, State,
        rejection::{PathRejection, QueryRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use crate::domain::{BusId, DepartureTime, GeoPoint, NewReminder, NewUser, StopId};
use crate::proximity;
use crate::store::StoreError;

use super::dto::*;
use super::error::{AppError, OrInternal};
use super::extract::Authenticated;
use super::state::AppState;

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/pontos/proximos", get(nearby_stops))
        .route("/pontos/:id/horarios", get(stop_schedule))
        .route("/onibus/:onibus_id/rota", get(bus_route))
        .route(
            "/pontos-favoritos",
            get(list_favorite_stops).post(add_favorite_stop),
        )
        .route("/pontos-favoritos/:stop_id", delete(remove_favorite_stop))
        .route(
            "/onibus-favoritos",
            get(list_favorite_buses).post(add_favorite_bus),
        )
        .route("/onibus-favoritos/:onibus_id", delete(remove_favorite_bus))
        .route("/lembretes", get(list_reminders).post(create_reminder))
        .route("/lembretes/:id", delete(delete_reminder))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Liveness banner.
async fn index() -> Json<MessageResponse> {
    Json(MessageResponse {
        message: "BusTrack API ok 🚍",
    })
}

/// Health check endpoint.
async fn health() -> &'static str {
    "ok"
}

/// Create an account.
async fn register(State(state): State<AppState>, body: Bytes) -> Result<Response, AppError> {
    const FAILED: &str = "Erro ao registrar usuário.";

    let req: RegisterRequest = lenient_body(&body);
    let (Some(name), Some(email), Some(password)) = (req.name, req.email, req.password) else {
        return Err(AppError::BadRequest {
            message: "Nome, email e senha são obrigatórios.",
        });
    };

    let password_hash = state
        .passwords
        .hash(password)
        .await
        .or_internal(FAILED)?;

    let user = state
        .store
        .create_user(NewUser {
            name,
            email,
            password_hash,
        })
        .await
        .map_err(|e| match e {
            StoreError::Conflict(_) => AppError::Conflict {
                message: "E-mail já cadastrado.",
            },
            other => AppError::Internal {
                message: FAILED,
                detail: other.to_string(),
            },
        })?;

    info!(user = %user.id, "user registered");
    Ok((StatusCode::CREATED, Json(RegisteredUser::from(user))).into_response())
}

/// Exchange credentials for a token.
async fn login(State(state): State<AppState>, body: Bytes) -> Result<Json<LoginResponse>, AppError> {
    const FAILED: &str = "Erro ao fazer login.";
    const REJECTED: AppError = AppError::Unauthenticated {
        message: "Credenciais inválidas.",
    };

    let req: LoginRequest = lenient_body(&body);
    let (Some(email), Some(password)) = (req.email, req.password) else {
        return Err(AppError::BadRequest {
            message: "Email e senha são obrigatórios.",
        });
    };

    let Some(user) = state
        .store
        .find_user_by_email(&email)
        .await
        .or_internal(FAILED)?
    else {
        warn!("login rejected: unknown email");
        return Err(REJECTED);
    };

    let matches = state
        .passwords
        .verify(password, user.password_hash.clone())
        .await
        .or_internal(FAILED)?;
    if !matches {
        warn!(user = %user.id, "login rejected: wrong password");
        return Err(REJECTED);
    }

    let token = state
        .tokens
        .issue_token(user.id, user.role)
        .or_internal(FAILED)?;

    Ok(Json(LoginResponse {
        token,
        user: UserSummary {
            id: user.id,
            name: user.name,
            email: user.email,
            role: user.role,
        },
    }))
}

/// The decoded path segment, or `None` when axum could not decode it.
fn path_segment(path: Result<Path<String>, PathRejection>) -> Option<String> {
    match path {
        Ok(Path(segment)) => Some(segment),
        Err(rejection) => {
            debug!(%rejection, "undecodable path segment");
            None
        }
    }
}

/// Parse a finite number from a query value.
fn parse_coordinate(value: Option<&str>) -> Option<f64> {
    value?
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
}

/// Stops within a radius of the caller, nearest first.
async fn nearby_stops(
    State(state): State<AppState>,
    Authenticated(_): Authenticated,
    query: Result<Query<Vec<(String, String)>>, QueryRejection>,
) -> Result<Json<Vec<NearbyStopResult>>, AppError> {
    const INVALID: AppError = AppError::BadRequest {
        message: "Parâmetros lat, lng e raio devem ser números válidos.",
    };

    let pairs = match query {
        Ok(Query(pairs)) => pairs,
        Err(rejection) => {
            debug!(%rejection, "unreadable nearby query");
            return Err(INVALID);
        }
    };
    let query = NearbyQuery::from_pairs(pairs).ok_or(INVALID)?;

    let lat = parse_coordinate(query.lat.as_deref()).ok_or(INVALID)?;
    let lng = parse_coordinate(query.lng.as_deref()).ok_or(INVALID)?;
    let radius = match query.raio.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(raio) => Some(parse_coordinate(Some(raio)).ok_or(INVALID)?),
    };

    let stops = state
        .stops
        .stops()
        .await
        .or_internal("Erro ao buscar pontos de ônibus próximos.")?;

    let results = proximity::nearby(GeoPoint::new(lat, lng), stops.iter(), radius)
        .into_iter()
        .map(NearbyStopResult::from)
        .collect();

    Ok(Json(results))
}

/// Departures from a stop.
async fn stop_schedule(
    State(state): State<AppState>,
    Authenticated(_): Authenticated,
    id: Result<Path<String>, PathRejection>,
) -> Result<Json<Vec<DepartureResult>>, AppError> {
    let Some(stop) = path_segment(id).and_then(|id| StopId::parse(&id).ok()) else {
        return Ok(Json(Vec::new()));
    };

    let departures = state
        .store
        .stop_schedule(&stop)
        .await
        .or_internal("Erro ao buscar horários do ponto informado.")?;

    Ok(Json(departures.into_iter().map(DepartureResult::from).collect()))
}

/// Stops served by a bus line, in route order.
async fn bus_route(
    State(state): State<AppState>,
    Authenticated(_): Authenticated,
    onibus_id: Result<Path<String>, PathRejection>,
) -> Result<Json<Vec<RouteStopResult>>, AppError> {
    let Some(bus) = path_segment(onibus_id).and_then(|id| BusId::parse(&id).ok()) else {
        return Ok(Json(Vec::new()));
    };

    let route = state
        .store
        .bus_route(&bus)
        .await
        .or_internal("Erro ao buscar rota do ônibus.")?;

    Ok(Json(route.into_iter().map(RouteStopResult::from).collect()))
}

async fn list_favorite_stops(
    State(state): State<AppState>,
    Authenticated(identity): Authenticated,
) -> Result<Json<Vec<FavoriteStopResult>>, AppError> {
    let favorites = state
        .store
        .favorite_stops(identity.subject)
        .await
        .or_internal("Erro ao buscar pontos favoritos do usuário.")?;

    Ok(Json(favorites.into_iter().map(FavoriteStopResult::from).collect()))
}

async fn add_favorite_stop(
    State(state): State<AppState>,
    Authenticated(identity): Authenticated,
    body: Bytes,
) -> Result<Response, AppError> {
    const FAILED: &str = "Erro ao salvar ponto favorito.";

    let req: FavoriteStopRequest = lenient_body(&body);
    let Some(stop) = req.stop_id.and_then(|id| StopId::parse(&id).ok()) else {
        return Err(AppError::BadRequest {
            message: "stopId é obrigatório.",
        });
    };

    let exists = state
        .store
        .stop_exists(&stop)
        .await
        .or_internal(FAILED)?;
    if !exists {
        return Err(AppError::NotFound {
            message: "Ponto de ônibus não encontrado.",
        });
    }

    let saved = state
        .store
        .add_favorite_stop(identity.subject, &stop)
        .await
        .or_internal(FAILED)?;

    Ok(match saved {
        Some(favorite) => {
            (StatusCode::CREATED, Json(SavedFavoriteStop::from(favorite))).into_response()
        }
        None => Json(MessageResponse {
            message: "Ponto já estava salvo como favorito.",
        })
        .into_response(),
    })
}

async fn remove_favorite_stop(
    State(state): State<AppState>,
    Authenticated(identity): Authenticated,
    stop_id: Result<Path<String>, PathRejection>,
) -> Result<StatusCode, AppError> {
    const NOT_FOUND: AppError = AppError::NotFound {
        message: "Ponto favorito não encontrado para este usuário.",
    };

    let stop = path_segment(stop_id)
        .and_then(|id| StopId::parse(&id).ok())
        .ok_or(NOT_FOUND)?;
    let removed = state
        .store
        .remove_favorite_stop(identity.subject, &stop)
        .await
        .or_internal("Erro ao remover ponto favorito.")?;

    if removed {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(NOT_FOUND)
    }
}

async fn list_favorite_buses(
    State(state): State<AppState>,
    Authenticated(identity): Authenticated,
) -> Result<Json<Vec<FavoriteBusResult>>, AppError> {
    let favorites = state
        .store
        .favorite_buses(identity.subject)
        .await
        .or_internal("Erro ao buscar ônibus favoritos.")?;

    Ok(Json(favorites.into_iter().map(FavoriteBusResult::from).collect()))
}

async fn add_favorite_bus(
    State(state): State<AppState>,
    Authenticated(identity): Authenticated,
    body: Bytes,
) -> Result<Response, AppError> {
    const FAILED: &str = "Erro ao salvar ônibus favorito.";

    let req: FavoriteBusRequest = lenient_body(&body);
    let Some(bus) = req.bus_id.and_then(|id| BusId::parse(&id).ok()) else {
        return Err(AppError::BadRequest {
            message: "Informe o onibusId no corpo da requisição.",
        });
    };

    let exists = state
        .store
        .bus_exists(&bus)
        .await
        .or_internal(FAILED)?;
    if !exists {
        return Err(AppError::NotFound {
            message: "Ônibus não encontrado.",
        });
    }

    state
        .store
        .add_favorite_bus(identity.subject, &bus)
        .await
        .or_internal(FAILED)?;

    Ok((
        StatusCode::CREATED,
        Json(MessageResponse {
            message: "Ônibus favorito salvo com sucesso.",
        }),
    )
        .into_response())
}

async fn remove_favorite_bus(
    State(state): State<AppState>,
    Authenticated(identity): Authenticated,
    onibus_id: Result<Path<String>, PathRejection>,
) -> Result<Json<MessageResponse>, AppError> {
    if let Some(bus) = path_segment(onibus_id).and_then(|id| BusId::parse(&id).ok()) {
        state
            .store
            .remove_favorite_bus(identity.subject, &bus)
            .await
            .or_internal("Erro ao remover ônibus favorito.")?;
    }

    Ok(Json(MessageResponse {
        message: "Ônibus removido dos favoritos.",
    }))
}

async fn list_reminders(
    State(state): State<AppState>,
    Authenticated(identity): Authenticated,
) -> Result<Json<Vec<ReminderResult>>, AppError> {
    let reminders = state
        .store
        .reminders(identity.subject)
        .await
        .or_internal("Erro ao buscar lembretes.")?;

    Ok(Json(reminders.into_iter().map(ReminderResult::from).collect()))
}

/// Schedule a reminder for tomorrow at the given departure time.
async fn create_reminder(
    State(state): State<AppState>,
    Authenticated(identity): Authenticated,
    body: Bytes,
) -> Result<Response, AppError> {
    let req: ReminderRequest = lenient_body(&body);
    let fields = (
        req.ponto_id.and_then(|id| StopId::parse(&id).ok()),
        req.ponto_nome,
        req.onibus_id.and_then(|id| BusId::parse(&id).ok()),
        req.onibus_nome,
        req.onibus_codigo,
        req.horario,
    );
    let (
        Some(stop_id),
        Some(stop_name),
        Some(bus_id),
        Some(bus_name),
        Some(bus_code),
        Some(horario),
    ) = fields
    else {
        return Err(AppError::BadRequest {
            message: "Informe pontoId, pontoNome, onibusId, onibusNome, onibusCodigo e horario.",
        });
    };

    let departure_time = DepartureTime::parse(&horario).map_err(|_| AppError::BadRequest {
        message: "horario deve estar no formato HH:MM.",
    })?;
    let today = state.clock.local().date_naive();

    let reminder = state
        .store
        .create_reminder(NewReminder {
            user_id: identity.subject,
            stop_id,
            stop_name,
            bus_id,
            bus_name,
            bus_code,
            departure_time,
            remind_at: departure_time.reminder_for(today),
        })
        .await
        .or_internal("Erro ao criar lembrete.")?;

    Ok((
        StatusCode::CREATED,
        Json(CreatedReminderResponse {
            message: "Lembrete criado com sucesso.",
            lembrete: ReminderResult::from(reminder),
        }),
    )
        .into_response())
}

async fn delete_reminder(
    State(state): State<AppState>,
    Authenticated(identity): Authenticated,
    id: Result<Path<String>, PathRejection>,
) -> Result<Json<MessageResponse>, AppError> {
    let id: i64 = path_segment(id)
        .and_then(|id| id.trim().parse().ok())
        .ok_or(AppError::BadRequest {
            message: "id do lembrete inválido.",
        })?;

    state
        .store
        .delete_reminder(identity.subject, id)
        .await
        .or_internal("Erro ao remover lembrete.")?;

    Ok(Json(MessageResponse {
        message: "Lembrete removido com sucesso.",
    }))
}

#[cfg(test)]
#[path = "routes_tests.rs"]
mod tests;
