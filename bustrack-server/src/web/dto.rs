//! Data transfer objects for web requests and responses.
//!
//! Field names follow the JSON contract the mobile app already speaks, so
//! several of them are Portuguese.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::domain::{
    BusId, FavoriteBusEntry, FavoriteStop, FavoriteStopEntry, Reminder, Role, RouteStop,
    ScheduledDeparture, Stop, StopId, UserId, UserRecord,
};
use crate::proximity::Nearby;

/// Parse a JSON body, treating anything unparseable as an empty body.
pub fn lenient_body<T: DeserializeOwned + Default>(body: &[u8]) -> T {
    serde_json::from_slice(body).unwrap_or_default()
}

/// Accept a non-empty string or a number; anything else counts as absent.
fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) if !s.is_empty() => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// Error body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: &'static str,
}

/// Plain acknowledgement body.
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

#[derive(Debug, Default, Deserialize)]
pub struct RegisterRequest {
    #[serde(default, deserialize_with = "lenient_text")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub email: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub password: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LoginRequest {
    #[serde(default, deserialize_with = "lenient_text")]
    pub email: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub password: Option<String>,
}

/// A newly registered account.
#[derive(Debug, Serialize)]
pub struct RegisteredUser {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

impl From<UserRecord> for RegisteredUser {
    fn from(user: UserRecord) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            role: user.role,
            created_at: user.created_at,
        }
    }
}

/// Public view of the logged-in user.
#[derive(Debug, Serialize)]
pub struct UserSummary {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub role: Role,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: UserSummary,
}

/// Query for `GET /pontos/proximos`.
///
/// Values are kept as text so malformed numbers produce the API's own
/// validation message.
#[derive(Debug, Default, PartialEq)]
pub struct NearbyQuery {
    pub lat: Option<String>,
    pub lng: Option<String>,
    pub raio: Option<String>,
}

impl NearbyQuery {
    /// Collect the known parameters from decoded query pairs.
    ///
    /// Returns `None` when a known parameter is repeated. Unknown
    /// parameters are ignored.
    pub fn from_pairs(pairs: impl IntoIterator<Item = (String, String)>) -> Option<Self> {
        let mut query = Self::default();
        for (key, value) in pairs {
            let slot = match key.as_str() {
                "lat" => &mut query.lat,
                "lng" => &mut query.lng,
                "raio" => &mut query.raio,
                _ => continue,
            };
            if slot.replace(value).is_some() {
                return None;
            }
        }
        Some(query)
    }
}

/// A stop within the search radius.
#[derive(Debug, Serialize)]
pub struct NearbyStopResult {
    pub id: StopId,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub description: Option<String>,
    pub distancia_metros: u64,
}

impl From<Nearby<&Stop>> for NearbyStopResult {
    fn from(nearby: Nearby<&Stop>) -> Self {
        let stop = nearby.item;
        Self {
            id: stop.id.clone(),
            name: stop.name.clone(),
            latitude: stop.latitude,
            longitude: stop.longitude,
            description: stop.description.clone(),
            distancia_metros: nearby.distance_m,
        }
    }
}

/// A departure from a stop.
#[derive(Debug, Serialize)]
pub struct DepartureResult {
    pub onibus_id: BusId,
    pub onibus_nome: String,
    pub onibus_codigo: String,
    pub horario: String,
}

impl From<ScheduledDeparture> for DepartureResult {
    fn from(d: ScheduledDeparture) -> Self {
        Self {
            onibus_id: d.bus_id,
            onibus_nome: d.bus_name,
            onibus_codigo: d.bus_code,
            horario: d.departure_time.to_string(),
        }
    }
}

/// A stop on a bus route.
#[derive(Debug, Serialize)]
pub struct RouteStopResult {
    pub stop_sequence: i32,
    pub stop_id: StopId,
    pub stop_name: String,
    pub stop_description: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
}

impl From<RouteStop> for RouteStopResult {
    fn from(r: RouteStop) -> Self {
        Self {
            stop_sequence: r.stop_sequence,
            stop_id: r.stop_id,
            stop_name: r.stop_name,
            stop_description: r.stop_description,
            latitude: r.latitude,
            longitude: r.longitude,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct FavoriteStopRequest {
    #[serde(default, rename = "stopId", deserialize_with = "lenient_text")]
    pub stop_id: Option<String>,
}

/// A favourite stop with the stop's details.
#[derive(Debug, Serialize)]
pub struct FavoriteStopResult {
    pub id: i64,
    pub stop_id: StopId,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<FavoriteStopEntry> for FavoriteStopResult {
    fn from(entry: FavoriteStopEntry) -> Self {
        Self {
            id: entry.id,
            stop_id: entry.stop.id,
            name: entry.stop.name,
            latitude: entry.stop.latitude,
            longitude: entry.stop.longitude,
            description: entry.stop.description,
            created_at: entry.created_at,
        }
    }
}

/// A newly saved favourite stop.
#[derive(Debug, Serialize)]
pub struct SavedFavoriteStop {
    pub id: i64,
    pub user_id: UserId,
    pub stop_id: StopId,
    pub created_at: DateTime<Utc>,
}

impl From<FavoriteStop> for SavedFavoriteStop {
    fn from(f: FavoriteStop) -> Self {
        Self {
            id: f.id,
            user_id: f.user_id,
            stop_id: f.stop_id,
            created_at: f.created_at,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct FavoriteBusRequest {
    #[serde(default, rename = "onibusId", deserialize_with = "lenient_text")]
    pub bus_id: Option<String>,
}

/// A favourite bus line.
#[derive(Debug, Serialize)]
pub struct FavoriteBusResult {
    pub onibus_id: BusId,
    pub nome: String,
    pub codigo: String,
    pub created_at: DateTime<Utc>,
}

impl From<FavoriteBusEntry> for FavoriteBusResult {
    fn from(entry: FavoriteBusEntry) -> Self {
        Self {
            onibus_id: entry.bus.id,
            nome: entry.bus.name,
            codigo: entry.bus.code,
            created_at: entry.created_at,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReminderRequest {
    #[serde(default, deserialize_with = "lenient_text")]
    pub ponto_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub ponto_nome: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub onibus_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub onibus_nome: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub onibus_codigo: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub horario: Option<String>,
}

/// A stored reminder.
#[derive(Debug, Serialize)]
pub struct ReminderResult {
    pub id: i64,
    pub ponto_id: StopId,
    pub ponto_nome: String,
    pub onibus_id: BusId,
    pub onibus_nome: String,
    pub onibus_codigo: String,
    pub horario: String,
    pub reminder_datetime: NaiveDateTime,
    pub created_at: DateTime<Utc>,
}

impl From<Reminder> for ReminderResult {
    fn from(r: Reminder) -> Self {
        Self {
            id: r.id,
            ponto_id: r.stop_id,
            ponto_nome: r.stop_name,
            onibus_id: r.bus_id,
            onibus_nome: r.bus_name,
            onibus_codigo: r.bus_code,
            horario: r.departure_time.to_string(),
            reminder_datetime: r.remind_at,
            created_at: r.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CreatedReminderResponse {
    pub message: &'static str,
    pub lembrete: ReminderResult,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_json_is_an_empty_body() {
        let req: LoginRequest = lenient_body(b"{not json");
        assert!(req.email.is_none());
        assert!(req.password.is_none());
    }

    #[test]
    fn empty_strings_and_nulls_are_absent() {
        let req: RegisterRequest =
            lenient_body(br#"{"name": "", "email": null, "password": "pw"}"#);
        assert!(req.name.is_none());
        assert!(req.email.is_none());
        assert_eq!(req.password.as_deref(), Some("pw"));
    }

    #[test]
    fn numeric_ids_are_accepted() {
        let req: FavoriteStopRequest = lenient_body(br#"{"stopId": 42}"#);
        assert_eq!(req.stop_id.as_deref(), Some("42"));

        let req: FavoriteBusRequest = lenient_body(br#"{"onibusId": "L1"}"#);
        assert_eq!(req.bus_id.as_deref(), Some("L1"));
    }

    #[test]
    fn reminder_request_uses_camel_case() {
        let req: ReminderRequest = lenient_body(
            r#"{"pontoId": "P1", "pontoNome": "Praça", "onibusId": "B1",
                 "onibusNome": "Centro", "onibusCodigo": "100", "horario": "08:15"}"#
                .as_bytes(),
        );
        assert_eq!(req.ponto_id.as_deref(), Some("P1"));
        assert_eq!(req.onibus_codigo.as_deref(), Some("100"));
        assert_eq!(req.horario.as_deref(), Some("08:15"));
    }

    fn pairs(raw: &[(&str, &str)]) -> Vec<(String, String)> {
        raw.iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn nearby_query_from_pairs() {
        let query =
            NearbyQuery::from_pairs(pairs(&[("lat", "-23.5"), ("lng", "-46.6"), ("x", "1")])).unwrap();
        assert_eq!(query.lat.as_deref(), Some("-23.5"));
        assert_eq!(query.lng.as_deref(), Some("-46.6"));
        assert_eq!(query.raio, None);
    }

    #[test]
    fn repeated_nearby_parameter_is_rejected() {
        assert_eq!(
            NearbyQuery::from_pairs(pairs(&[("lat", "1"), ("lat", "2"), ("lng", "3")])),
            None
        );
    }

    #[test]
    fn nearby_result_shape() {
        let stop = Stop {
            id: StopId::parse("P1").unwrap(),
            name: "Praça".to_string(),
            latitude: -23.5,
            longitude: -46.6,
            description: None,
        };
        let result = NearbyStopResult::from(Nearby {
            item: &stop,
            distance_m: 120,
        });

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["id"], "P1");
        assert_eq!(json["distancia_metros"], 120);
        assert!(json["description"].is_null());
    }
}
