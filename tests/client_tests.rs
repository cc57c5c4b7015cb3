//! 客户端操作集成测试
//!
//! 覆盖资产列举与分类、位置补齐流程、围栏 CRUD、命令下发与参数校验

use lojack_client::{
    ClientConfig, GeofenceUpdate, LoJackError, LocationQuery, RepairOrderQuery,
};
use secrecy::Secret;
use serde_json::json;

mod common;
use common::{login_response, stub_client, stub_client_with};

// ==================== 资产列举与分类 ====================

#[tokio::test]
async fn test_list_assets_classifies_devices_and_vehicles() {
    let (client, identity, services) = stub_client();
    identity.push_ok(login_response());
    services.push_ok(json!({
        "content": [
            {"id": "a-1", "name": "Tracker", "type": "tracker"},
            {"id": "a-2", "name": "Car", "attributes": {"vin": "1HGCM82633A123456"}},
        ],
    }));

    let assets = client.list_assets().await.expect("list should succeed");
    assert_eq!(assets.len(), 2);

    assert!(!assets[0].is_vehicle());
    assert_eq!(assets[0].id(), "a-1");

    // 嵌套 attributes.vin 也要识别为车辆
    assert!(assets[1].is_vehicle());
    assert_eq!(assets[1].vin(), Some("1HGCM82633A123456"));

    let requests = services.requests();
    assert_eq!(requests[0].method, "GET");
    assert_eq!(requests[0].path, "/assets");
}

#[tokio::test]
async fn test_list_assets_handles_bare_array_and_alternate_envelopes() {
    let (client, identity, services) = stub_client();
    identity.push_ok(login_response());
    services.push_ok(json!([{"id": "a-1"}]));
    services.push_ok(json!({"assets": [{"id": "a-2"}, {"id": "a-3"}]}));
    services.push_ok(json!({"unexpected": "shape"}));

    assert_eq!(client.list_assets().await.unwrap().len(), 1);
    assert_eq!(client.list_assets().await.unwrap().len(), 2);
    assert!(client.list_assets().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_get_asset_unwraps_nested_content() {
    let (client, identity, services) = stub_client();
    identity.push_ok(login_response());
    services.push_ok(json!({
        "content": {"id": "a-9", "vin": "VIN9", "make": "Ford"},
    }));

    let asset = client.get_asset("a-9").await.expect("asset should load");
    assert!(asset.is_vehicle());
    assert_eq!(asset.vehicle_info().unwrap().make.as_deref(), Some("Ford"));
}

#[tokio::test]
async fn test_get_asset_translates_404() {
    let (client, identity, services) = stub_client();
    identity.push_ok(login_response());
    services.push_err(LoJackError::Api {
        status: 404,
        message: "Not Found".to_string(),
        body: None,
    });

    match client.get_asset("missing-id").await.unwrap_err() {
        LoJackError::DeviceNotFound(id) => assert_eq!(id, "missing-id"),
        other => panic!("expected DeviceNotFound, got {other:?}"),
    }
}

#[tokio::test]
async fn test_get_asset_rejects_empty_id_without_network() {
    let (client, _identity, services) = stub_client();
    let err = client.get_asset("").await.unwrap_err();
    assert!(matches!(err, LoJackError::InvalidParameter { .. }));
    assert_eq!(services.request_count(), 0);
}

// ==================== 位置流程 ====================

#[tokio::test]
async fn test_get_locations_builds_event_query() {
    use chrono::TimeZone;

    let (client, identity, services) = stub_client();
    identity.push_ok(login_response());
    services.push_ok(json!({
        "content": [
            {"id": "evt-2", "lat": 40.1, "lng": -74.1, "eventDateTime": "2024-01-15T11:00:00Z"},
            {"id": "evt-1"},
        ],
    }));

    let query = LocationQuery {
        limit: Some(5),
        start_time: Some(chrono::Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()),
        end_time: None,
        skip_empty: true,
    };
    let locations = client.get_locations("a-1", &query).await.expect("events");

    // skip_empty 过滤掉没有坐标的事件
    assert_eq!(locations.len(), 1);
    assert_eq!(locations[0].event_id.as_deref(), Some("evt-2"));

    let requests = services.requests();
    assert_eq!(requests[0].path, "/assets/a-1/events");
    assert_eq!(requests[0].param("limit"), Some("5"));
    // 事件接口要求数字时区偏移格式
    assert_eq!(requests[0].param("startDate"), Some("2024-01-01T00:00:00.000+0000"));
    assert_eq!(requests[0].param("endDate"), None);
}

#[tokio::test]
async fn test_current_location_backfills_from_asset_fields() {
    let (client, identity, services) = stub_client();
    identity.push_ok(login_response());
    services.push_ok(json!({
        "id": "a-1",
        "speed": 42.0,
        "locationLastReported": "2024-01-15T10:30:00Z",
        "lastLocation": {"lat": 40.7128, "lng": -74.006},
    }));

    let location = client
        .get_current_location("a-1")
        .await
        .expect("request should succeed")
        .expect("location should be present");

    assert_eq!(location.latitude, Some(40.7128));
    assert_eq!(location.longitude, Some(-74.006));
    // 快照缺的时间戳和速度从资产级字段回填
    assert!(location.timestamp.is_some());
    assert_eq!(location.speed, Some(42.0));
}

#[tokio::test]
async fn test_current_location_absent_yields_none() {
    let (client, identity, services) = stub_client();
    identity.push_ok(login_response());
    services.push_ok(json!({"id": "a-1"}));
    services.push_err(LoJackError::Api {
        status: 500,
        message: "Internal Server Error".to_string(),
        body: None,
    });

    assert!(client.get_current_location("a-1").await.unwrap().is_none());
    // API 错误降级为 None 而不是上抛
    assert!(client.get_current_location("a-1").await.unwrap().is_none());
}

#[tokio::test]
async fn test_asset_refresh_enriches_snapshot_with_event_telemetry() {
    let (client, identity, services) = stub_client();
    identity.push_ok(login_response());
    // 第一跳：get_asset 拉取资产记录
    services.push_ok(json!({"id": "a-1", "name": "Test Asset"}));
    // 第二跳：资产快照（新坐标，没有遥测）
    services.push_ok(json!({
        "id": "a-1",
        "locationLastReported": "2024-01-15T11:00:00Z",
        "lastLocation": {"lat": 40.7128, "lng": -74.006},
    }));
    // 第三跳：最近一条事件（旧一点的定位，满遥测）
    services.push_ok(json!({
        "content": [{
            "id": "evt-7",
            "eventType": "TRACK",
            "lat": 40.0,
            "lng": -74.5,
            "speed": 31.0,
            "batteryVoltage": 12.6,
            "signalStrength": -67,
            "eventDateTime": "2024-01-15T10:00:00Z",
        }],
    }));

    let mut asset = client.get_asset("a-1").await.expect("asset should load");
    let location = asset
        .location(false)
        .await
        .expect("refresh should succeed")
        .expect("location should be present");

    // 坐标来自快照，不被旧事件覆盖
    assert_eq!(location.latitude, Some(40.7128));
    assert_eq!(location.longitude, Some(-74.006));
    // 遥测来自事件
    assert_eq!(location.speed, Some(31.0));
    assert_eq!(location.battery_voltage, Some(12.6));
    assert_eq!(location.signal_strength, Some(-67.0));
    assert_eq!(location.event_id.as_deref(), Some("evt-7"));
    assert_eq!(location.event_type.as_deref(), Some("TRACK"));
    // 快照时间戳更新，不回退到事件时间
    assert_eq!(
        location.timestamp.map(|t| t.to_rfc3339()),
        Some("2024-01-15T11:00:00+00:00".to_string())
    );

    // 最近一条事件的请求带 limit=1
    assert_eq!(services.requests()[2].param("limit"), Some("1"));

    // 第二次读取走缓存，不再发请求
    let before = services.request_count();
    asset.location(false).await.expect("cached read");
    assert_eq!(services.request_count(), before);
}

#[tokio::test]
async fn test_asset_refresh_uses_event_when_snapshot_lacks_coordinates() {
    let (client, identity, services) = stub_client();
    identity.push_ok(login_response());
    services.push_ok(json!({"id": "a-1"}));
    // 快照没有 lastLocation
    services.push_ok(json!({"id": "a-1"}));
    services.push_ok(json!({
        "content": [{"id": "evt-1", "lat": 40.0, "lng": -74.5, "speed": 10.0}],
    }));

    let mut asset = client.get_asset("a-1").await.expect("asset should load");
    let location = asset
        .location(false)
        .await
        .expect("refresh should succeed")
        .expect("event location should be used");

    assert_eq!(location.latitude, Some(40.0));
    assert_eq!(location.event_id.as_deref(), Some("evt-1"));
}

// ==================== 命令下发 ====================

#[tokio::test]
async fn test_send_command_uppercases_and_reports_acceptance() {
    let (client, identity, services) = stub_client();
    identity.push_ok(login_response());
    services.push_ok(json!({"id": "cmd-1", "status": "PENDING"}));

    let accepted = client.send_command("a-1", "locate").await.expect("command");
    assert!(accepted);

    let requests = services.requests();
    assert_eq!(requests[0].path, "/assets/a-1/commands");
    let body = requests[0].body.as_ref().expect("command body");
    assert_eq!(body["command"], "LOCATE");
    assert_eq!(body["responseStrategy"], "ASYNC");
}

#[tokio::test]
async fn test_send_command_rejection_and_validation() {
    let (client, identity, services) = stub_client();
    identity.push_ok(login_response());
    services.push_ok(json!({"status": "REJECTED"}));

    assert!(!client.send_command("a-1", "locate").await.expect("command"));

    let err = client.send_command("a-1", "   ").await.unwrap_err();
    assert!(matches!(err, LoJackError::InvalidParameter { .. }));
    // 校验失败不触发请求
    assert_eq!(services.request_count(), 1);
}

// ==================== 围栏 ====================

#[tokio::test]
async fn test_geofence_crud_round_trip() {
    let (client, identity, services) = stub_client();
    identity.push_ok(login_response());
    services.push_ok(json!({
        "content": [
            {"id": "g-1", "name": "Home", "location": {"coordinates": {"lat": 32.8, "lng": -97.0}, "radius": 100.0}},
        ],
    }));
    services.push_ok(json!({
        "id": "g-2",
        "name": "Depot",
        "location": {"coordinates": {"lat": 32.9, "lng": -97.1}, "radius": 250.0},
        "active": true,
    }));
    services.push_ok(json!({}));
    services.push_ok(json!({}));

    let geofences = client.list_geofences("a-1", None, None).await.expect("list");
    assert_eq!(geofences.len(), 1);
    assert_eq!(geofences[0].asset_id.as_deref(), Some("a-1"));

    let created = client
        .create_geofence("a-1", "Depot", 32.9, -97.1, 250.0, Some("1 Yard Rd"))
        .await
        .expect("create")
        .expect("created geofence");
    assert_eq!(created.id.as_deref(), Some("g-2"));

    let create_body = services.requests()[1].body.clone().expect("create body");
    assert_eq!(create_body["name"], "Depot");
    assert_eq!(create_body["location"]["coordinates"]["lat"], 32.9);
    assert_eq!(create_body["location"]["radius"], 250.0);
    assert_eq!(create_body["location"]["address"]["line1"], "1 Yard Rd");
    assert_eq!(create_body["active"], true);

    let update = GeofenceUpdate {
        radius: Some(300.0),
        ..GeofenceUpdate::default()
    };
    assert!(client.update_geofence("a-1", "g-2", &update).await.expect("update"));
    assert!(client.delete_geofence("a-1", "g-2").await.expect("delete"));

    let requests = services.requests();
    assert_eq!(requests[2].method, "PUT");
    assert_eq!(requests[2].path, "/assets/a-1/geofences/g-2");
    assert_eq!(requests[3].method, "DELETE");
}

#[tokio::test]
async fn test_geofence_validation_and_missing() {
    let (client, identity, services) = stub_client();
    identity.push_ok(login_response());
    services.push_err(LoJackError::Api {
        status: 404,
        message: "Not Found".to_string(),
        body: None,
    });

    // 坐标与半径校验在本地完成
    let err = client
        .create_geofence("a-1", "Bad", 91.0, 0.0, 100.0, None)
        .await
        .unwrap_err();
    assert!(matches!(err, LoJackError::InvalidParameter { .. }));
    let err = client
        .create_geofence("a-1", "Bad", 0.0, 0.0, -1.0, None)
        .await
        .unwrap_err();
    assert!(matches!(err, LoJackError::InvalidParameter { .. }));

    // 空更新不发请求
    assert!(client
        .update_geofence("a-1", "g-1", &GeofenceUpdate::default())
        .await
        .expect("noop update"));
    assert_eq!(services.request_count(), 0);

    // 404 的单围栏查询返回 None
    assert!(client.get_geofence("a-1", "missing").await.expect("get").is_none());
}

// ==================== 保养与维修 ====================

#[tokio::test]
async fn test_maintenance_schedule_by_vin() {
    let (client, identity, services) = stub_client();
    identity.push_ok(login_response());
    services.push_ok(json!({
        "items": [
            {"name": "Oil Change", "mileageDue": 55000},
        ],
    }));
    services.push_err(LoJackError::Api {
        status: 404,
        message: "Not Found".to_string(),
        body: None,
    });

    let schedule = client
        .get_maintenance_schedule("1HGCM82633A123456")
        .await
        .expect("request should succeed")
        .expect("schedule should be present");
    assert_eq!(schedule.vin.as_deref(), Some("1HGCM82633A123456"));
    assert_eq!(schedule.items.len(), 1);
    assert_eq!(
        services.requests()[0].param("vin"),
        Some("1HGCM82633A123456")
    );

    // 404 降级为 None
    assert!(client.get_maintenance_schedule("VIN404").await.unwrap().is_none());

    // 空 VIN 本地拒绝
    let err = client.get_maintenance_schedule("").await.unwrap_err();
    assert!(matches!(err, LoJackError::InvalidParameter { .. }));
}

#[tokio::test]
async fn test_repair_orders_query() {
    let (client, identity, services) = stub_client();
    identity.push_ok(login_response());
    services.push_ok(json!({
        "content": [
            {"id": "RO-1", "status": "OPEN", "openDate": "2024-01-15T10:30:00Z"},
        ],
    }));

    // 两个 id 都缺省时不发请求
    let empty = client
        .get_repair_orders(&RepairOrderQuery::default())
        .await
        .expect("no-id query");
    assert!(empty.is_empty());
    assert_eq!(services.request_count(), 0);

    let orders = client
        .get_repair_orders(&RepairOrderQuery {
            vin: Some("VIN1".to_string()),
            asset_id: None,
            sort: None,
        })
        .await
        .expect("orders");
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].id.as_deref(), Some("RO-1"));

    let requests = services.requests();
    assert_eq!(requests[0].path, "/repairOrders");
    assert_eq!(requests[0].param("sort"), Some("openDate:desc"));
    assert_eq!(requests[0].param("vin"), Some("VIN1"));
}

// ==================== 请求头 ====================

#[tokio::test]
async fn test_app_token_header_sent_when_configured() {
    let mut config = ClientConfig::with_credentials("user@example.com", "hunter2");
    config.app_token = Some(Secret::new("app-token-1".to_string()));

    let (client, identity, services) = stub_client_with(config);
    identity.push_ok(login_response());
    services.push_ok(json!({"content": []}));

    client.list_assets().await.expect("list should succeed");

    let requests = services.requests();
    assert_eq!(requests[0].header("Authorization"), Some("Bearer test-token"));
    assert_eq!(requests[0].header("X-Nspire-Apptoken"), Some("app-token-1"));
}

#[tokio::test]
async fn test_app_token_header_absent_by_default() {
    let (client, identity, services) = stub_client();
    identity.push_ok(login_response());
    services.push_ok(json!({"content": []}));

    client.list_assets().await.expect("list should succeed");
    assert_eq!(services.requests()[0].header("X-Nspire-Apptoken"), None);
}
