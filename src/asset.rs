//! Asset wrapper with cached, telemetry-enriched location
//!
//! The vendor splits location truth across two endpoints: the asset
//! snapshot has the freshest coordinates but thin telemetry, while the
//! latest event has rich telemetry but may reflect an older fix.
//! `refresh` merges the two into one coherent record and keeps only the
//! single most recent value.

use chrono::{DateTime, Utc};
use tracing::warn;

use crate::client::{AssetUpdate, LoJackClient, LocationQuery, RepairOrderQuery};
use crate::error::Result;
use crate::models::{
    AssetRecord, Geofence, GeofenceUpdate, Location, MaintenanceSchedule, RepairOrder,
    VehicleInfo,
};

/// A tracked asset bound to the client that fetched it.
pub struct Asset {
    client: LoJackClient,
    record: AssetRecord,
    cached_location: Option<Location>,
    last_refresh: Option<DateTime<Utc>>,
}

impl Asset {
    pub(crate) fn new(client: LoJackClient, record: AssetRecord) -> Self {
        Self {
            client,
            record,
            cached_location: None,
            last_refresh: None,
        }
    }

    /// The classified record this wrapper was built from.
    pub fn record(&self) -> &AssetRecord {
        &self.record
    }

    pub fn id(&self) -> &str {
        self.record.id()
    }

    pub fn name(&self) -> Option<&str> {
        self.record.name()
    }

    pub fn last_seen(&self) -> Option<DateTime<Utc>> {
        self.record.last_seen()
    }

    pub fn is_vehicle(&self) -> bool {
        self.record.is_vehicle()
    }

    pub fn vin(&self) -> Option<&str> {
        self.record.vin()
    }

    pub fn vehicle_info(&self) -> Option<&VehicleInfo> {
        self.record.as_vehicle()
    }

    /// The cached location from the last refresh, possibly stale.
    pub fn cached_location(&self) -> Option<&Location> {
        self.cached_location.as_ref()
    }

    pub fn last_refresh(&self) -> Option<DateTime<Utc>> {
        self.last_refresh
    }

    /// Timestamp of the cached location, if any.
    pub fn location_timestamp(&self) -> Option<DateTime<Utc>> {
        self.cached_location.as_ref().and_then(|loc| loc.timestamp)
    }

    /// Refresh the cached location: snapshot coordinates enriched with
    /// telemetry from the most recent event.
    pub async fn refresh(&mut self, force: bool) -> Result<()> {
        if !force && self.cached_location.is_some() {
            return Ok(());
        }

        let snapshot = self.client.get_current_location(self.id()).await?;

        // 最近一条事件承载快照缺少的遥测数据
        let mut events = self
            .client
            .get_locations(
                self.id(),
                &LocationQuery {
                    limit: Some(1),
                    ..LocationQuery::default()
                },
            )
            .await?;
        let latest_event = if events.is_empty() {
            None
        } else {
            Some(events.remove(0))
        };

        self.cached_location = match (snapshot, latest_event) {
            (Some(mut snapshot), Some(event)) if snapshot.latitude.is_some() => {
                snapshot.enrich_from(&event);
                Some(snapshot)
            }
            (Some(snapshot), None) if snapshot.latitude.is_some() => Some(snapshot),
            // 快照没有坐标时事件记录本身就是最佳答案
            (_, Some(event)) => Some(event),
            _ => None,
        };
        self.last_refresh = Some(Utc::now());
        Ok(())
    }

    /// Current location, refreshing when forced or nothing is cached.
    pub async fn location(&mut self, force: bool) -> Result<Option<Location>> {
        if force || self.cached_location.is_none() {
            self.refresh(force).await?;
        }
        Ok(self.cached_location.clone())
    }

    /// Location history for this asset.
    pub async fn history(&self, query: &LocationQuery) -> Result<Vec<Location>> {
        self.client.get_locations(self.id(), query).await
    }

    /// Submit a raw command.
    pub async fn send_command(&self, command: &str) -> Result<bool> {
        self.client.send_command(self.id(), command).await
    }

    /// Ask the device to report its position.
    pub async fn request_location_update(&self) -> Result<bool> {
        self.send_command("locate").await
    }

    /// Send a locate command and return the pre-command location
    /// timestamp as a baseline. Poll `location(true)` afterwards and
    /// compare timestamps to detect when fresh data has arrived.
    pub async fn request_fresh_location(&self) -> Result<Option<DateTime<Utc>>> {
        let baseline = self
            .client
            .get_current_location(self.id())
            .await?
            .and_then(|loc| loc.timestamp);

        // 命令失败不影响基线的返回
        if let Err(e) = self.send_command("locate").await {
            warn!(asset_id = self.id(), error = %e, "Locate command failed");
        }

        Ok(baseline)
    }

    /// Update asset information.
    pub async fn update(&self, update: &AssetUpdate) -> Result<bool> {
        self.client.update_asset(self.id(), update).await
    }

    pub async fn geofences(&self) -> Result<Vec<Geofence>> {
        self.client.list_geofences(self.id(), None, None).await
    }

    pub async fn geofence(&self, geofence_id: &str) -> Result<Option<Geofence>> {
        self.client.get_geofence(self.id(), geofence_id).await
    }

    pub async fn create_geofence(
        &self,
        name: &str,
        latitude: f64,
        longitude: f64,
        radius: f64,
        address: Option<&str>,
    ) -> Result<Option<Geofence>> {
        self.client
            .create_geofence(self.id(), name, latitude, longitude, radius, address)
            .await
    }

    pub async fn update_geofence(
        &self,
        geofence_id: &str,
        update: &GeofenceUpdate,
    ) -> Result<bool> {
        self.client.update_geofence(self.id(), geofence_id, update).await
    }

    pub async fn delete_geofence(&self, geofence_id: &str) -> Result<bool> {
        self.client.delete_geofence(self.id(), geofence_id).await
    }

    /// Maintenance schedule, vehicles with a VIN only.
    pub async fn maintenance_schedule(&self) -> Result<Option<MaintenanceSchedule>> {
        match self.vin() {
            Some(vin) => self.client.get_maintenance_schedule(vin).await,
            None => Ok(None),
        }
    }

    /// Repair orders, vehicles only.
    pub async fn repair_orders(&self) -> Result<Vec<RepairOrder>> {
        if !self.is_vehicle() {
            return Ok(Vec::new());
        }
        self.client
            .get_repair_orders(&RepairOrderQuery {
                vin: self.vin().map(str::to_string),
                asset_id: Some(self.id().to_string()),
                sort: None,
            })
            .await
    }
}

impl std::fmt::Debug for Asset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Asset")
            .field("id", &self.id())
            .field("name", &self.name())
            .field("is_vehicle", &self.is_vehicle())
            .finish()
    }
}
