//! LoJack 资产追踪 API 客户端库
//! 提供认证会话管理、响应归一化与位置数据补齐
//!
//! ```no_run
//! use lojack_client::{ClientConfig, LoJackClient};
//!
//! # async fn run() -> lojack_client::Result<()> {
//! let config = ClientConfig::with_credentials("user@example.com", "password");
//! let client = LoJackClient::create(config).await?;
//!
//! for mut asset in client.list_assets().await? {
//!     if let Some(location) = asset.location(false).await? {
//!         println!("{}: {:?}, {:?}", asset.id(), location.latitude, location.longitude);
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod asset;
pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod models;
pub mod transport;

// 重新导出常用类型
pub use asset::Asset;
pub use auth::{AuthArtifacts, AuthManager};
pub use client::{AssetUpdate, LoJackClient, LocationQuery, RepairOrderQuery};
pub use config::ClientConfig;
pub use error::{LoJackError, Result};
pub use models::{
    AssetRecord, DeviceInfo, Geofence, GeofenceUpdate, Location, MaintenanceItem,
    MaintenanceSchedule, RepairOrder, VehicleInfo,
};
pub use transport::{HttpTransport, Transport};
