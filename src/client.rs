//! High-level LoJack API client
//!
//! Every authenticated operation asks the auth manager for a valid
//! token (which may trigger network I/O), issues one transport call,
//! and feeds the raw JSON through the entity normalizers. The client is
//! cheap to clone; all clones share one session.

use chrono::{DateTime, Utc};
use secrecy::ExposeSecret;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::debug;

use crate::asset::Asset;
use crate::auth::{AuthArtifacts, AuthManager};
use crate::config::ClientConfig;
use crate::error::{LoJackError, Result};
use crate::models::{
    pick, AssetRecord, Geofence, GeofenceUpdate, Location, MaintenanceSchedule, RepairOrder,
};
use crate::models::{optional_f64, optional_string, parse_timestamp};
use crate::transport::{HttpTransport, Transport};

/// 事件接口要求的日期格式（数字时区偏移，无冒号）
const EVENT_DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S.000+0000";

/// Filters for a location history query.
#[derive(Debug, Clone, Default)]
pub struct LocationQuery {
    /// Maximum number of events, unlimited when unset.
    pub limit: Option<u32>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    /// Drop events that carry no coordinates.
    pub skip_empty: bool,
}

/// Partial asset update; unset fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct AssetUpdate {
    pub name: Option<String>,
    pub color: Option<String>,
    pub make: Option<String>,
    pub model: Option<String>,
    pub year: Option<i32>,
    pub vin: Option<String>,
    pub odometer: Option<f64>,
}

impl AssetUpdate {
    fn to_api_payload(&self) -> Option<Value> {
        let mut payload = Map::new();
        if let Some(name) = &self.name {
            payload.insert("name".to_string(), json!(name));
        }
        if let Some(color) = &self.color {
            payload.insert("color".to_string(), json!(color));
        }
        if let Some(make) = &self.make {
            payload.insert("make".to_string(), json!(make));
        }
        if let Some(model) = &self.model {
            payload.insert("model".to_string(), json!(model));
        }
        if let Some(year) = self.year {
            payload.insert("year".to_string(), json!(year));
        }
        if let Some(vin) = &self.vin {
            payload.insert("vin".to_string(), json!(vin));
        }
        if let Some(odometer) = self.odometer {
            payload.insert("odometer".to_string(), json!(odometer));
        }
        if payload.is_empty() {
            None
        } else {
            Some(Value::Object(payload))
        }
    }
}

/// Filters for a repair order query.
#[derive(Debug, Clone, Default)]
pub struct RepairOrderQuery {
    pub vin: Option<String>,
    pub asset_id: Option<String>,
    /// Sort order, `openDate:desc` by default.
    pub sort: Option<String>,
}

struct ClientInner {
    config: ClientConfig,
    services: Arc<dyn Transport>,
    auth: AuthManager,
}

/// High-level async client for the Spireon LoJack API.
///
/// 身份服务负责登录/刷新，业务服务承载资产、事件、围栏等接口，
/// 两者各有独立的 transport。
#[derive(Clone)]
pub struct LoJackClient {
    inner: Arc<ClientInner>,
}

impl LoJackClient {
    /// Build a client without logging in. The first authenticated call
    /// performs the login lazily.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let timeout = config.request_timeout();
        let identity: Arc<dyn Transport> =
            Arc::new(HttpTransport::new(&config.identity_url, timeout)?);
        let services: Arc<dyn Transport> =
            Arc::new(HttpTransport::new(&config.services_url, timeout)?);
        Ok(Self::with_transports(config, identity, services))
    }

    /// Build a client over externally supplied transports.
    pub fn with_transports(
        config: ClientConfig,
        identity: Arc<dyn Transport>,
        services: Arc<dyn Transport>,
    ) -> Self {
        let auth = AuthManager::new(
            identity,
            config.username.clone(),
            config.password.clone(),
            config.refresh_margin(),
        );
        Self {
            inner: Arc::new(ClientInner {
                config,
                services,
                auth,
            }),
        }
    }

    /// Build a client and authenticate eagerly.
    pub async fn create(config: ClientConfig) -> Result<Self> {
        let client = Self::new(config)?;
        client.inner.auth.login().await?;
        Ok(client)
    }

    /// Resume a session from previously exported artifacts, without
    /// contacting the server. Supply credentials in the config if the
    /// token may need a refresh fallback.
    pub async fn from_auth(config: ClientConfig, artifacts: &AuthArtifacts) -> Result<Self> {
        let client = Self::new(config)?;
        client.import_auth(artifacts).await;
        Ok(client)
    }

    /// Import previously exported authentication state, replacing any
    /// held session.
    pub async fn import_auth(&self, artifacts: &AuthArtifacts) {
        self.inner.auth.import_artifacts(artifacts).await;
    }

    pub async fn is_authenticated(&self) -> bool {
        self.inner.auth.is_authenticated().await
    }

    pub async fn user_id(&self) -> Option<String> {
        self.inner.auth.user_id().await
    }

    /// Export the authentication state for later resumption.
    pub async fn export_auth(&self) -> Option<AuthArtifacts> {
        self.inner.auth.export_artifacts().await
    }

    /// Authenticate now, replacing any held session.
    pub async fn login(&self) -> Result<()> {
        self.inner.auth.login().await.map(|_| ())
    }

    /// Drop the held session.
    pub async fn logout(&self) {
        self.inner.auth.clear().await;
    }

    async fn auth_headers(&self) -> Result<Vec<(String, String)>> {
        let token = self.inner.auth.get_token().await?;
        let mut headers = vec![("Authorization".to_string(), format!("Bearer {token}"))];
        if let Some(app_token) = &self.inner.config.app_token {
            let app_token = app_token.expose_secret();
            if !app_token.is_empty() {
                headers.push(("X-Nspire-Apptoken".to_string(), app_token.clone()));
            }
        }
        Ok(headers)
    }

    /// List all assets on the account, classified as devices or
    /// vehicles.
    pub async fn list_assets(&self) -> Result<Vec<Asset>> {
        let headers = self.auth_headers().await?;
        let data = self
            .inner
            .services
            .request("GET", "/assets", None, None, Some(headers))
            .await?;

        let items = items_from(&data, &["content", "devices", "assets", "vehicles"]);
        debug!(count = items.len(), "Listed assets");

        Ok(items
            .iter()
            .filter(|item| item.is_object())
            .map(|item| Asset::new(self.clone(), AssetRecord::classify(item)))
            .collect())
    }

    /// Fetch one asset by id.
    pub async fn get_asset(&self, asset_id: &str) -> Result<Asset> {
        require_id("asset_id", asset_id)?;
        let headers = self.auth_headers().await?;
        let path = format!("/assets/{asset_id}");

        let data = match self
            .inner
            .services
            .request("GET", &path, None, None, Some(headers))
            .await
        {
            Ok(data) => data,
            // 单实体查询的 404 翻译为领域错误，带上查询的 id
            Err(LoJackError::Api { status: 404, .. }) => {
                return Err(LoJackError::DeviceNotFound(asset_id.to_string()))
            }
            Err(e) => return Err(e),
        };

        if !data.is_object() {
            return Err(LoJackError::DeviceNotFound(asset_id.to_string()));
        }

        let item = data
            .get("content")
            .or_else(|| data.get("asset"))
            .filter(|v| v.is_object())
            .unwrap_or(&data);

        Ok(Asset::new(self.clone(), AssetRecord::classify(item)))
    }

    /// Location history (events) for an asset, newest first.
    pub async fn get_locations(
        &self,
        asset_id: &str,
        query: &LocationQuery,
    ) -> Result<Vec<Location>> {
        require_id("asset_id", asset_id)?;
        let headers = self.auth_headers().await?;

        let mut params = Vec::new();
        if let Some(limit) = query.limit {
            params.push(("limit".to_string(), limit.to_string()));
        }
        if let Some(start) = query.start_time {
            params.push(("startDate".to_string(), start.format(EVENT_DATE_FORMAT).to_string()));
        }
        if let Some(end) = query.end_time {
            params.push(("endDate".to_string(), end.format(EVENT_DATE_FORMAT).to_string()));
        }

        let path = format!("/assets/{asset_id}/events");
        let data = self
            .inner
            .services
            .request(
                "GET",
                &path,
                if params.is_empty() { None } else { Some(params) },
                None,
                Some(headers),
            )
            .await?;

        let items = items_from(&data, &["content", "events", "locations", "history"]);
        Ok(items
            .iter()
            .filter(|item| item.is_object())
            .map(Location::from_event)
            .filter(|loc| {
                !query.skip_empty || loc.latitude.is_some() || loc.longitude.is_some()
            })
            .collect())
    }

    /// Current location from the asset snapshot (`lastLocation`), which
    /// is fresher than the event stream. `None` when unavailable.
    pub async fn get_current_location(&self, asset_id: &str) -> Result<Option<Location>> {
        require_id("asset_id", asset_id)?;
        let headers = self.auth_headers().await?;
        let path = format!("/assets/{asset_id}");

        let data = match self
            .inner
            .services
            .request("GET", &path, None, None, Some(headers))
            .await
        {
            Ok(data) => data,
            Err(LoJackError::Api { .. }) => return Ok(None),
            Err(e) => return Err(e),
        };

        let Some(last_location) = data.get("lastLocation").filter(|v| !v.is_null()) else {
            return Ok(None);
        };

        let mut location = Location::from_api(last_location);

        // 快照本身常缺时间戳和速度，从资产级字段回填
        if location.timestamp.is_none() {
            location.timestamp = parse_timestamp(pick(&data, &["locationLastReported"]));
        }
        if location.speed.is_none() {
            location.speed = optional_f64(pick(&data, &["speed"]));
        }

        Ok(Some(location))
    }

    /// Submit a command to a device and report whether the service
    /// accepted it. Execution is asynchronous on the vendor side.
    pub async fn send_command(&self, asset_id: &str, command: &str) -> Result<bool> {
        require_id("asset_id", asset_id)?;
        if command.trim().is_empty() {
            return Err(LoJackError::invalid_parameter("command", "must not be empty"));
        }

        let headers = self.auth_headers().await?;
        let payload = json!({
            "command": command.to_uppercase(),
            "responseStrategy": "ASYNC",
        });
        let path = format!("/assets/{asset_id}/commands");

        let data = self
            .inner
            .services
            .request("POST", &path, None, Some(payload), Some(headers))
            .await?;

        Ok(command_accepted(&data))
    }

    /// Update asset information. A no-op update returns `Ok(true)`
    /// without issuing a request.
    pub async fn update_asset(&self, asset_id: &str, update: &AssetUpdate) -> Result<bool> {
        require_id("asset_id", asset_id)?;
        let Some(payload) = update.to_api_payload() else {
            return Ok(true);
        };

        let headers = self.auth_headers().await?;
        let path = format!("/assets/{asset_id}");
        self.inner
            .services
            .request("PUT", &path, None, Some(payload), Some(headers))
            .await?;
        Ok(true)
    }

    /// List geofences attached to an asset.
    pub async fn list_geofences(
        &self,
        asset_id: &str,
        limit: Option<u32>,
        offset: Option<u32>,
    ) -> Result<Vec<Geofence>> {
        require_id("asset_id", asset_id)?;
        let headers = self.auth_headers().await?;

        let mut params = Vec::new();
        if let Some(limit) = limit {
            params.push(("limit".to_string(), limit.to_string()));
        }
        if let Some(offset) = offset.filter(|o| *o > 0) {
            params.push(("offset".to_string(), offset.to_string()));
        }

        let path = format!("/assets/{asset_id}/geofences");
        let data = self
            .inner
            .services
            .request(
                "GET",
                &path,
                if params.is_empty() { None } else { Some(params) },
                None,
                Some(headers),
            )
            .await?;

        let items = items_from(&data, &["content", "geofences", "items"]);
        Ok(items
            .iter()
            .filter(|item| item.is_object())
            .map(|item| Geofence::from_api(item, Some(asset_id)))
            .collect())
    }

    /// Fetch one geofence, `None` when it does not exist.
    pub async fn get_geofence(
        &self,
        asset_id: &str,
        geofence_id: &str,
    ) -> Result<Option<Geofence>> {
        require_id("asset_id", asset_id)?;
        require_id("geofence_id", geofence_id)?;
        let headers = self.auth_headers().await?;
        let path = format!("/assets/{asset_id}/geofences/{geofence_id}");

        let data = match self
            .inner
            .services
            .request("GET", &path, None, None, Some(headers))
            .await
        {
            Ok(data) => data,
            Err(LoJackError::Api { status: 404, .. }) => return Ok(None),
            Err(e) => return Err(e),
        };

        if !data.is_object() {
            return Ok(None);
        }
        Ok(Some(Geofence::from_api(&data, Some(asset_id))))
    }

    /// Create a circular geofence around a point.
    pub async fn create_geofence(
        &self,
        asset_id: &str,
        name: &str,
        latitude: f64,
        longitude: f64,
        radius: f64,
        address: Option<&str>,
    ) -> Result<Option<Geofence>> {
        require_id("asset_id", asset_id)?;
        if name.trim().is_empty() {
            return Err(LoJackError::invalid_parameter("name", "must not be empty"));
        }
        validate_coordinates(latitude, longitude)?;
        validate_radius(radius)?;

        let geofence = Geofence {
            name: Some(name.to_string()),
            latitude: Some(latitude),
            longitude: Some(longitude),
            radius: Some(radius),
            address: address.map(str::to_string),
            active: Some(true),
            ..Geofence::default()
        };

        let headers = self.auth_headers().await?;
        let path = format!("/assets/{asset_id}/geofences");
        let data = self
            .inner
            .services
            .request("POST", &path, None, Some(geofence.to_api_payload()), Some(headers))
            .await?;

        if data.is_object() {
            Ok(Some(Geofence::from_api(&data, Some(asset_id))))
        } else {
            Ok(None)
        }
    }

    /// Apply a partial geofence update. A no-op update returns
    /// `Ok(true)` without issuing a request.
    pub async fn update_geofence(
        &self,
        asset_id: &str,
        geofence_id: &str,
        update: &GeofenceUpdate,
    ) -> Result<bool> {
        require_id("asset_id", asset_id)?;
        require_id("geofence_id", geofence_id)?;
        if let Some(latitude) = update.latitude {
            validate_latitude(latitude)?;
        }
        if let Some(longitude) = update.longitude {
            validate_longitude(longitude)?;
        }
        if let Some(radius) = update.radius {
            validate_radius(radius)?;
        }

        let Some(payload) = update.to_api_payload() else {
            return Ok(true);
        };

        let headers = self.auth_headers().await?;
        let path = format!("/assets/{asset_id}/geofences/{geofence_id}");
        self.inner
            .services
            .request("PUT", &path, None, Some(payload), Some(headers))
            .await?;
        Ok(true)
    }

    /// Delete a geofence.
    pub async fn delete_geofence(&self, asset_id: &str, geofence_id: &str) -> Result<bool> {
        require_id("asset_id", asset_id)?;
        require_id("geofence_id", geofence_id)?;
        let headers = self.auth_headers().await?;
        let path = format!("/assets/{asset_id}/geofences/{geofence_id}");
        self.inner
            .services
            .request("DELETE", &path, None, None, Some(headers))
            .await?;
        Ok(true)
    }

    /// Maintenance schedule for a vehicle, `None` when the vendor has
    /// none for the VIN.
    pub async fn get_maintenance_schedule(
        &self,
        vin: &str,
    ) -> Result<Option<MaintenanceSchedule>> {
        require_id("vin", vin)?;
        let headers = self.auth_headers().await?;
        let params = vec![("vin".to_string(), vin.to_string())];

        let data = match self
            .inner
            .services
            .request(
                "GET",
                "/automotive/maintenanceSchedule",
                Some(params),
                None,
                Some(headers),
            )
            .await
        {
            Ok(data) => data,
            Err(LoJackError::Api { status: 404, .. }) => return Ok(None),
            Err(e) => return Err(e),
        };

        if !data.is_object() {
            return Ok(None);
        }
        Ok(Some(MaintenanceSchedule::from_api(&data, Some(vin))))
    }

    /// Repair orders for a vehicle. Returns an empty list when neither
    /// a VIN nor an asset id is given.
    pub async fn get_repair_orders(&self, query: &RepairOrderQuery) -> Result<Vec<RepairOrder>> {
        if query.vin.is_none() && query.asset_id.is_none() {
            return Ok(Vec::new());
        }

        let headers = self.auth_headers().await?;
        let mut params = vec![(
            "sort".to_string(),
            query.sort.clone().unwrap_or_else(|| "openDate:desc".to_string()),
        )];
        if let Some(vin) = &query.vin {
            params.push(("vin".to_string(), vin.clone()));
        }
        if let Some(asset_id) = &query.asset_id {
            params.push(("assetId".to_string(), asset_id.clone()));
        }

        let data = match self
            .inner
            .services
            .request("GET", "/repairOrders", Some(params), None, Some(headers))
            .await
        {
            Ok(data) => data,
            Err(LoJackError::Api { status: 404, .. }) => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };

        let items = items_from(&data, &["content", "repairOrders", "orders"]);
        Ok(items
            .iter()
            .filter(|item| item.is_object())
            .map(RepairOrder::from_api)
            .collect())
    }

    /// Profile of the authenticated user, `None` when unavailable.
    pub async fn get_user_info(&self) -> Result<Option<Value>> {
        let headers = self.auth_headers().await?;
        match self
            .inner
            .services
            .request("GET", "/identity", None, None, Some(headers))
            .await
        {
            Ok(data) if data.is_object() => Ok(Some(data)),
            Ok(_) => Ok(None),
            Err(LoJackError::Api { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Accounts associated with the user.
    pub async fn get_accounts(&self) -> Result<Vec<Value>> {
        let headers = self.auth_headers().await?;
        match self
            .inner
            .services
            .request("GET", "/accounts", None, None, Some(headers))
            .await
        {
            Ok(data) => Ok(items_from(&data, &["content", "accounts"])),
            Err(LoJackError::Api { .. }) => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }
}

/// Unwrap a list response: a bare array, or the first matching
/// container key on an envelope object.
fn items_from(data: &Value, keys: &[&str]) -> Vec<Value> {
    match data {
        Value::Array(items) => items.clone(),
        Value::Object(_) => pick(data, keys)
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default(),
        _ => Vec::new(),
    }
}

/// Whether a command submission response signals acceptance.
fn command_accepted(data: &Value) -> bool {
    if !data.is_object() {
        // 非 JSON 的 2xx 响应按接受处理
        return true;
    }
    if optional_string(pick(data, &["id", "commandId"])).is_some() {
        return true;
    }
    for key in ["ok", "accepted", "success"] {
        if pick(data, &[key]).and_then(Value::as_bool) == Some(true) {
            return true;
        }
    }
    matches!(
        optional_string(pick(data, &["status"])).as_deref(),
        Some("ok" | "PENDING" | "SUBMITTED")
    )
}

fn require_id(name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        Err(LoJackError::invalid_parameter(name, "must not be empty"))
    } else {
        Ok(())
    }
}

fn validate_latitude(latitude: f64) -> Result<()> {
    if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
        return Err(LoJackError::invalid_parameter("latitude", "must be within [-90, 90]"));
    }
    Ok(())
}

fn validate_longitude(longitude: f64) -> Result<()> {
    if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
        return Err(LoJackError::invalid_parameter("longitude", "must be within [-180, 180]"));
    }
    Ok(())
}

fn validate_coordinates(latitude: f64, longitude: f64) -> Result<()> {
    validate_latitude(latitude)?;
    validate_longitude(longitude)
}

fn validate_radius(radius: f64) -> Result<()> {
    if !radius.is_finite() || radius <= 0.0 {
        return Err(LoJackError::invalid_parameter("radius", "must be positive"));
    }
    Ok(())
}
