// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2024 Oxide Computer Company

//! Link discovery HTTP API types and endpoint functions.

use std::collections::HashMap;
use std::net::IpAddr;
use std::net::Ipv4Addr;
use std::net::SocketAddr;
use std::sync::Arc;

use dropshot::endpoint;
use dropshot::HttpError;
use dropshot::HttpResponseOk;
use dropshot::Path;
use dropshot::RequestContext;
use dropshot::TypedBody;
use schemars::JsonSchema;
use serde::Deserialize;
use serde::Serialize;
use slog::error;
use slog::info;
use slog::o;

use crate::interfaces;
use crate::Global;

type ApiServer = dropshot::HttpServer<Arc<Global>>;

/// A set of interfaces, each named `dpid:port`
#[derive(Clone, Debug, Deserialize, JsonSchema, Serialize)]
pub struct InterfaceList {
    pub interfaces: Vec<String>,
}

#[derive(Clone, Debug, Deserialize, JsonSchema, Serialize)]
pub struct PollingTime {
    /// Seconds between two rounds of probes
    pub polling_time: i64,
}

/// The polling time, keyed the way `/v1/time` has always reported it
#[derive(Clone, Debug, Deserialize, JsonSchema, Serialize)]
pub struct TimeInfo {
    #[serde(rename = "Polling time in seconds")]
    pub polling_time: i64,
}

#[derive(Deserialize, Serialize, JsonSchema)]
struct TimePathParams {
    /// The new polling time, in seconds
    time_sec: String,
}

/// Return all the interfaces that probes may be sent from
#[endpoint {
    method = GET,
    path = "/v1/interfaces",
}]
async fn interface_list(
    rqctx: RequestContext<Arc<Global>>,
) -> Result<HttpResponseOk<InterfaceList>, HttpError> {
    let global: &Global = rqctx.context();
    Ok(HttpResponseOk(InterfaceList {
        interfaces: interfaces::discovery_interfaces(global.inventory.as_ref())
            .iter()
            .map(|i| i.to_string())
            .collect(),
    }))
}

/// Allow probes to be sent from the listed interfaces
#[endpoint {
    method = POST,
    path = "/v1/interfaces/enable",
}]
async fn interface_enable(
    rqctx: RequestContext<Arc<Global>>,
    body: TypedBody<InterfaceList>,
) -> Result<HttpResponseOk<String>, HttpError> {
    let global: &Global = rqctx.context();
    interfaces::set_discovery(global, &body.into_inner().interfaces, true)
        .map(|_| {
            HttpResponseOk(
                "All the requested interfaces have been enabled.".to_string(),
            )
        })
        .map_err(|e| e.into())
}

/// Stop probes from being sent from the listed interfaces
#[endpoint {
    method = POST,
    path = "/v1/interfaces/disable",
}]
async fn interface_disable(
    rqctx: RequestContext<Arc<Global>>,
    body: TypedBody<InterfaceList>,
) -> Result<HttpResponseOk<String>, HttpError> {
    let global: &Global = rqctx.context();
    interfaces::set_discovery(global, &body.into_inner().interfaces, false)
        .map(|_| {
            HttpResponseOk(
                "All the requested interfaces have been disabled.".to_string(),
            )
        })
        .map_err(|e| e.into())
}

/// Return the number of seconds between two rounds of probes
#[endpoint {
    method = GET,
    path = "/v1/polling_time",
}]
async fn polling_time_get(
    rqctx: RequestContext<Arc<Global>>,
) -> Result<HttpResponseOk<PollingTime>, HttpError> {
    let global: &Global = rqctx.context();
    Ok(HttpResponseOk(PollingTime {
        polling_time: global.scheduler.interval().as_secs() as i64,
    }))
}

/// Set the number of seconds between two rounds of probes
#[endpoint {
    method = POST,
    path = "/v1/polling_time",
}]
async fn polling_time_set(
    rqctx: RequestContext<Arc<Global>>,
    body: TypedBody<PollingTime>,
) -> Result<HttpResponseOk<PollingTime>, HttpError> {
    let global: &Global = rqctx.context();
    let val = body.into_inner();
    global.scheduler.set_interval(val.polling_time).await?;
    Ok(HttpResponseOk(val))
}

/// Return the number of seconds between two rounds of probes
#[endpoint {
    method = GET,
    path = "/v1/time",
}]
async fn time_get(
    rqctx: RequestContext<Arc<Global>>,
) -> Result<HttpResponseOk<TimeInfo>, HttpError> {
    let global: &Global = rqctx.context();
    Ok(HttpResponseOk(TimeInfo {
        polling_time: global.scheduler.interval().as_secs() as i64,
    }))
}

/// Set the number of seconds between two rounds of probes
#[endpoint {
    method = POST,
    path = "/v1/time/{time_sec}",
}]
async fn time_set(
    rqctx: RequestContext<Arc<Global>>,
    path: Path<TimePathParams>,
) -> Result<HttpResponseOk<String>, HttpError> {
    let global: &Global = rqctx.context();
    global
        .scheduler
        .parse_interval(&path.into_inner().time_sec)
        .await
        .map(|_| HttpResponseOk("Polling time has been updated.".to_string()))
        .map_err(|e| e.into())
}

fn launch_server(
    global: Arc<Global>,
    addr: &SocketAddr,
    id: u32,
) -> anyhow::Result<ApiServer> {
    let config_dropshot = dropshot::ConfigDropshot {
        bind_address: *addr,
        request_body_max_bytes: 10240,
        default_handler_task_mode: dropshot::HandlerTaskMode::Detached,
    };
    let log = global
        .log
        .new(o!("unit" => "api-server", "server_id" => id.to_string()));

    info!(log, "starting api server {id} on {addr}");
    dropshot::HttpServerStarter::new(
        &config_dropshot,
        http_api(),
        global.clone(),
        &log,
    )
    .map(|s| s.start())
    .map_err(|e| anyhow::anyhow!(e.to_string()))
}

/// The API server manager launches and halts the dropshot instances serving
/// the config API.  We always listen on localhost, plus whatever addresses
/// are in the Global's `listen_addresses`.  Each message on `rx` tells us to
/// compare that list with the servers we are running and start or stop
/// servers to match.  When the sender is dropped we close every server and
/// exit.
pub async fn api_server_manager(
    global: Arc<Global>,
    mut rx: tokio::sync::watch::Receiver<()>,
) {
    let mut active = HashMap::<SocketAddr, ApiServer>::new();
    let mut id = 0;
    let mut running = true;

    let log = global.log.new(o!("unit" => "api-server-manager"));
    while running {
        let active_addrs = active.keys().cloned().collect::<Vec<SocketAddr>>();
        let mut config_addrs = global.listen_addresses.lock().unwrap().to_vec();
        // Localhost is always served, whatever the controller configures
        config_addrs.push(SocketAddr::new(
            IpAddr::V4(Ipv4Addr::LOCALHOST),
            common::DEFAULT_OFLLDP_PORT,
        ));
        // Work out which servers to start and which to close, leaving the
        // ones on addresses still configured alone.
        let (add, remove) = common::purge_common(&config_addrs, &active_addrs);

        for addr in remove {
            if let Some(hdl) = active.remove(&addr) {
                info!(log, "closing api server on {addr}");
                if let Err(e) = hdl.close().await {
                    error!(log, "error closing api server on {addr}: {e:?}");
                }
            }
        }

        for addr in &add {
            // Each server gets its own id for its log messages
            id += 1;
            match launch_server(global.clone(), addr, id) {
                Ok(s) => {
                    active.insert(*addr, s);
                }
                Err(e) => {
                    error!(
                        log,
                        "failed to launch api server {id} on {addr}: {e:?}"
                    );
                }
            };
        }

        // changed() only fails once the Global has dropped its sender,
        // which is our cue to exit.
        running = rx.changed().await.is_ok();
    }

    // Shut down all the active API servers
    for (addr, hdl) in active {
        info!(log, "closing api server on {addr}");
        if let Err(e) = hdl.close().await {
            error!(log, "error closing api server on {addr}: {e:?}");
        }
    }
}

pub fn http_api() -> dropshot::ApiDescription<Arc<Global>> {
    let mut api = dropshot::ApiDescription::new();

    api.register(interface_list).unwrap();
    api.register(interface_enable).unwrap();
    api.register(interface_disable).unwrap();
    api.register(polling_time_get).unwrap();
    api.register(polling_time_set).unwrap();
    api.register(time_get).unwrap();
    api.register(time_set).unwrap();

    api
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use protocol::DeviceId;

    use super::*;
    use crate::testutil;
    use crate::types::InterfaceId;
    use crate::Settings;

    // Issue a single request and return the status code and body
    async fn request(
        addr: SocketAddr,
        method: &str,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> (u16, serde_json::Value) {
        let method = reqwest::Method::from_bytes(method.as_bytes()).unwrap();
        let mut req = reqwest::Client::new()
            .request(method, format!("http://{addr}{path}"));
        if let Some(body) = body {
            req = req.json(&body);
        }
        let resp = req.send().await.unwrap();
        let status = resp.status().as_u16();
        let body = resp
            .json::<serde_json::Value>()
            .await
            .unwrap_or(serde_json::Value::Null);
        (status, body)
    }

    #[test]
    fn test_api_registration() {
        let _ = http_api();
    }

    #[tokio::test]
    async fn test_interfaces_api() {
        let inventory_devices = vec![
            testutil::device(1, Some(0x04), &[1, 2]),
            testutil::device(2, Some(0x01), &[5]),
        ];
        let h = testutil::harness(inventory_devices, Settings::default());
        let inventory = h.inventory.clone();
        let g = Arc::new(h.global);
        let s = launch_server(g.clone(), &"127.0.0.1:0".parse().unwrap(), 1)
            .unwrap();
        let addr = s.local_addr();

        let one = InterfaceId::new(DeviceId(1), 1).to_string();
        let five = InterfaceId::new(DeviceId(2), 5).to_string();

        let (status, body) = request(addr, "GET", "/v1/interfaces", None).await;
        assert_eq!(status, 200);
        assert_eq!(body["interfaces"].as_array().unwrap().len(), 3);

        let (status, _) = request(
            addr,
            "POST",
            "/v1/interfaces/disable",
            Some(serde_json::json!({ "interfaces": [one, five] })),
        )
        .await;
        assert_eq!(status, 200);
        let (_, body) = request(addr, "GET", "/v1/interfaces", None).await;
        assert_eq!(
            body["interfaces"],
            serde_json::json!([InterfaceId::new(DeviceId(1), 2).to_string()])
        );

        // The known interface is enabled, the unknown one reported
        let (status, body) = request(
            addr,
            "POST",
            "/v1/interfaces/enable",
            Some(serde_json::json!({ "interfaces": [one, "nope"] })),
        )
        .await;
        assert_eq!(status, 400);
        assert!(body["message"].as_str().unwrap().contains("nope"));
        assert_eq!(
            inventory.discovery(&InterfaceId::new(DeviceId(1), 1)),
            Some(true)
        );

        s.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_interfaces_api_empty() {
        let h = testutil::harness(vec![], Settings::default());
        let g = Arc::new(h.global);
        let s = launch_server(g.clone(), &"127.0.0.1:0".parse().unwrap(), 1)
            .unwrap();
        let (status, _) = request(
            s.local_addr(),
            "POST",
            "/v1/interfaces/enable",
            Some(serde_json::json!({ "interfaces": ["x"] })),
        )
        .await;
        assert_eq!(status, 404);
        s.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_polling_time_api() {
        let h = testutil::harness(
            vec![testutil::device(1, Some(0x04), &[1])],
            Settings::default(),
        );
        let g = Arc::new(h.global);
        g.scheduler.start().await;
        let s = launch_server(g.clone(), &"127.0.0.1:0".parse().unwrap(), 1)
            .unwrap();
        let addr = s.local_addr();

        let (status, body) =
            request(addr, "GET", "/v1/polling_time", None).await;
        assert_eq!(status, 200);
        assert_eq!(body["polling_time"], 3);

        let (status, _) = request(
            addr,
            "POST",
            "/v1/polling_time",
            Some(serde_json::json!({ "polling_time": 10 })),
        )
        .await;
        assert_eq!(status, 200);
        assert_eq!(g.scheduler.interval(), Duration::from_secs(10));

        let (status, body) = request(addr, "GET", "/v1/time", None).await;
        assert_eq!(status, 200);
        assert_eq!(body["Polling time in seconds"], 10);

        let (status, _) = request(addr, "POST", "/v1/time/7", None).await;
        assert_eq!(status, 200);
        assert_eq!(g.scheduler.interval(), Duration::from_secs(7));
        let (_, body) = request(addr, "GET", "/v1/time", None).await;
        assert_eq!(body["Polling time in seconds"], 7);

        for bad in ["/v1/time/abc", "/v1/time/0", "/v1/time/-2"] {
            let (status, _) = request(addr, "POST", bad, None).await;
            assert_eq!(status, 400, "{bad}");
        }
        let (status, _) = request(
            addr,
            "POST",
            "/v1/polling_time",
            Some(serde_json::json!({ "polling_time": 0 })),
        )
        .await;
        assert_eq!(status, 400);

        assert_eq!(g.scheduler.interval(), Duration::from_secs(7));
        assert_eq!(g.scheduler.live_tasks(), 1);

        s.close().await.unwrap();
        g.scheduler.stop().await;
    }
}
