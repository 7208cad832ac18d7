//! Line-delimited JSON protocol between UI surfaces and the background app.
//!
//! Every message is one JSON object on one line:
//! - request `{"id": 1, "method": "dispatch", "params": {"id": 3}}`
//! - response `{"id": 1, "result": ...}` or `{"id": 1, "error": {"kind": ..., "message": ...}}`
//! - notification `{"event": "aliasesChanged", "data": [...]}`, only after `subscribe`

pub mod client;
pub mod server;

use std::path::PathBuf;
use std::sync::{Arc, PoisonError, RwLock};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::config::{self, Config, PaletteConfig};
use crate::error::{RpcError, RpcErrorKind};
use crate::model::{AliasBinding, AliasEvent, NewAlias};
use crate::service::AliasService;

pub const METHOD_GET_ALIASES: &str = "getAliases";
pub const METHOD_ADD_ALIAS: &str = "addAlias";
pub const METHOD_UPDATE_ALIAS: &str = "updateAlias";
pub const METHOD_REMOVE_ALIAS: &str = "removeAlias";
pub const METHOD_CHECK_ALIAS_PREFIX: &str = "checkAliasPrefix";
pub const METHOD_DISPATCH: &str = "dispatch";
pub const METHOD_DISPATCH_KEY: &str = "dispatchKey";
pub const METHOD_SUBSCRIBE: &str = "subscribe";
pub const METHOD_GET_PALETTE_SETTINGS: &str = "getPaletteSettings";
pub const METHOD_SET_ACTIVATION_DELAY: &str = "setActivationDelay";
pub const METHOD_GET_AUTO_LAUNCH_STATUS: &str = "getAutoLaunchStatus";
pub const METHOD_SET_AUTO_LAUNCH: &str = "setAutoLaunch";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    pub id: u64,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

impl Response {
    pub fn ok(id: u64, result: Value) -> Self {
        Self {
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn err(id: u64, error: RpcError) -> Self {
        Self {
            id,
            result: None,
            error: Some(error),
        }
    }

    pub fn into_result(self) -> Result<Value, RpcError> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.result.unwrap_or(Value::Null)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub event: String,
    pub data: Value,
}

impl From<&AliasEvent> for Notification {
    fn from(event: &AliasEvent) -> Self {
        match event {
            AliasEvent::AliasesChanged(aliases) => Notification {
                event: "aliasesChanged".to_string(),
                data: json!(aliases),
            },
            AliasEvent::DispatchFailed { id, key, detail } => Notification {
                event: "dispatchFailed".to_string(),
                data: json!({ "id": id, "key": key, "detail": detail }),
            },
        }
    }
}

/// Config shared between the RPC server, the config watcher and the tray.
pub type SharedConfig = Arc<RwLock<Config>>;

/// Everything a request handler may touch.
pub struct RpcContext {
    pub service: Arc<AliasService>,
    pub config: SharedConfig,
    pub config_path: PathBuf,
}

#[derive(Deserialize)]
struct IdParams {
    id: i64,
}

#[derive(Deserialize)]
struct NameParams {
    name: String,
}

#[derive(Deserialize)]
struct KeyParams {
    key: String,
}

#[derive(Deserialize)]
struct DelayParams {
    delay: u64,
}

#[derive(Deserialize)]
struct EnabledParams {
    enabled: bool,
}

fn parse_params<T: DeserializeOwned>(params: &Value) -> Result<T, RpcError> {
    serde_json::from_value(params.clone())
        .map_err(|e| RpcError::bad_request(format!("invalid params: {}", e)))
}

fn to_value<T: Serialize>(value: T) -> Result<Value, RpcError> {
    serde_json::to_value(value)
        .map_err(|e| RpcError::new(RpcErrorKind::Storage, format!("serialize failed: {}", e)))
}

/// Answer one request. `subscribe` only acknowledges here; the server owns
/// the connection and does the forwarding.
pub fn handle(ctx: &RpcContext, request: &Request) -> Response {
    log::debug!("RPC {} #{}", request.method, request.id);
    match dispatch_method(ctx, request) {
        Ok(result) => Response::ok(request.id, result),
        Err(err) => {
            log::warn!("RPC {} #{} failed: {}", request.method, request.id, err);
            Response::err(request.id, err)
        }
    }
}

fn dispatch_method(ctx: &RpcContext, request: &Request) -> Result<Value, RpcError> {
    let service = &ctx.service;
    let params = &request.params;
    match request.method.as_str() {
        METHOD_GET_ALIASES => to_value(service.get_aliases()?),
        METHOD_ADD_ALIAS => {
            let alias: NewAlias = parse_params(params)?;
            to_value(service.add_alias(alias)?)
        }
        METHOD_UPDATE_ALIAS => {
            let alias: AliasBinding = parse_params(params)?;
            service.update_alias(&alias)?;
            Ok(Value::Null)
        }
        METHOD_REMOVE_ALIAS => {
            let IdParams { id } = parse_params(params)?;
            to_value(service.remove_alias(id)?)
        }
        METHOD_CHECK_ALIAS_PREFIX => {
            let NameParams { name } = parse_params(params)?;
            to_value(service.check_alias_prefix(&name)?)
        }
        METHOD_DISPATCH => {
            let IdParams { id } = parse_params(params)?;
            to_value(service.dispatch(id)?)
        }
        METHOD_DISPATCH_KEY => {
            let KeyParams { key } = parse_params(params)?;
            to_value(service.dispatch_key(&key)?)
        }
        METHOD_SUBSCRIBE => Ok(Value::Bool(true)),
        METHOD_GET_PALETTE_SETTINGS => to_value(palette_settings(ctx)),
        METHOD_SET_ACTIVATION_DELAY => {
            let DelayParams { delay } = parse_params(params)?;
            to_value(set_activation_delay(ctx, delay)?)
        }
        METHOD_GET_AUTO_LAUNCH_STATUS => to_value(auto_launch_status()?),
        METHOD_SET_AUTO_LAUNCH => {
            let EnabledParams { enabled } = parse_params(params)?;
            to_value(set_auto_launch(ctx, enabled)?)
        }
        other => Err(RpcError::bad_request(format!("unknown method: {}", other))),
    }
}

fn palette_settings(ctx: &RpcContext) -> PaletteConfig {
    ctx.config
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .palette
        .clone()
}

fn set_activation_delay(ctx: &RpcContext, delay: u64) -> Result<PaletteConfig, RpcError> {
    config::validate_activation_delay(delay)?;
    update_config(ctx, |config| config.palette.activation_delay_ms = delay)?;
    log::info!("Activation delay set to {} ms", delay);
    Ok(palette_settings(ctx))
}

/// Apply `change` to the shared config and persist it. The file watcher
/// will see the write and reload the same values.
fn update_config(ctx: &RpcContext, change: impl FnOnce(&mut Config)) -> Result<(), RpcError> {
    config::update_shared_config_at(&ctx.config, &ctx.config_path, change)
        .map(|_| ())
        .map_err(|e| RpcError::new(RpcErrorKind::Storage, format!("{:#}", e)))
}

fn auto_launch_status() -> Result<bool, RpcError> {
    crate::platform::current::login::is_launch_at_login_enabled()
        .map_err(|e| RpcError::new(RpcErrorKind::Platform, format!("{:#}", e)))
}

fn set_auto_launch(ctx: &RpcContext, enabled: bool) -> Result<bool, RpcError> {
    let result = if enabled {
        crate::platform::current::login::enable_launch_at_login()
    } else {
        crate::platform::current::login::disable_launch_at_login()
    };
    result.map_err(|e| RpcError::new(RpcErrorKind::Platform, format!("{:#}", e)))?;
    update_config(ctx, |config| config.system.launch_at_login = enabled)?;
    auto_launch_status()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::dispatch::Dispatcher;
    use crate::dispatch::tests::RecordingBackend;
    use crate::model::Outcome;
    use crate::service::ServiceOptions;
    use crate::store::AliasStore;
    use std::time::Duration;

    pub(crate) fn context(dir: &tempfile::TempDir, running: bool) -> RpcContext {
        let service = AliasService::new(
            AliasStore::open_in_memory().unwrap(),
            Dispatcher::new(Arc::new(RecordingBackend::new(running))),
            ServiceOptions {
                cooldown: Duration::ZERO,
            },
        );
        RpcContext {
            service: Arc::new(service),
            config: Arc::new(RwLock::new(Config::default())),
            config_path: dir.path().join("config.json"),
        }
    }

    fn call(ctx: &RpcContext, method: &str, params: Value) -> Result<Value, RpcError> {
        let request = Request {
            id: 7,
            method: method.to_string(),
            params,
        };
        let response = handle(ctx, &request);
        assert_eq!(response.id, 7);
        response.into_result()
    }

    fn add_code(ctx: &RpcContext) -> i64 {
        let added = call(
            ctx,
            METHOD_ADD_ALIAS,
            json!({ "key": "c o d e", "actionKind": "launch-app", "target": "/usr/bin/code" }),
        )
        .unwrap();
        added["id"].as_i64().unwrap()
    }

    #[test]
    fn alias_crud_over_rpc() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(&dir, false);
        let id = add_code(&ctx);

        let listed = call(&ctx, METHOD_GET_ALIASES, Value::Null).unwrap();
        assert_eq!(listed[0]["key"], "c o d e");
        assert_eq!(listed[0]["actionKind"], "launch-app");

        let updated = call(
            &ctx,
            METHOD_UPDATE_ALIAS,
            json!({ "id": id, "key": "code", "actionKind": "launch-app", "target": "/opt/code" }),
        )
        .unwrap();
        assert_eq!(updated, Value::Null);

        assert_eq!(
            call(&ctx, METHOD_CHECK_ALIAS_PREFIX, json!({ "name": "co" })).unwrap(),
            json!("code")
        );
        assert_eq!(
            call(&ctx, METHOD_CHECK_ALIAS_PREFIX, json!({ "name": "zz" })).unwrap(),
            Value::Null
        );

        assert_eq!(call(&ctx, METHOD_REMOVE_ALIAS, json!({ "id": id })).unwrap(), json!(true));
        assert_eq!(call(&ctx, METHOD_REMOVE_ALIAS, json!({ "id": id })).unwrap(), json!(false));
    }

    #[test]
    fn dispatch_returns_structured_outcome() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(&dir, false);
        let id = add_code(&ctx);

        let outcome = call(&ctx, METHOD_DISPATCH, json!({ "id": id })).unwrap();
        assert_eq!(outcome["outcome"], "Launched");

        let outcome = call(&ctx, METHOD_DISPATCH_KEY, json!({ "key": "CODE" })).unwrap();
        let outcome: crate::model::LaunchOutcome = serde_json::from_value(outcome).unwrap();
        assert_eq!(outcome.outcome, Outcome::Launched);
    }

    #[test]
    fn errors_carry_kinds() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(&dir, false);
        add_code(&ctx);

        let err = call(
            &ctx,
            METHOD_ADD_ALIAS,
            json!({ "key": "CODE", "actionKind": "run-command", "target": "echo hi" }),
        )
        .unwrap_err();
        assert_eq!(err.kind, RpcErrorKind::Validation);

        let err = call(&ctx, METHOD_DISPATCH, json!({ "id": 99 })).unwrap_err();
        assert_eq!(err.kind, RpcErrorKind::NotFound);

        let err = call(&ctx, METHOD_DISPATCH, json!({ "id": "x" })).unwrap_err();
        assert_eq!(err.kind, RpcErrorKind::BadRequest);

        let err = call(&ctx, "launchRockets", Value::Null).unwrap_err();
        assert_eq!(err.kind, RpcErrorKind::BadRequest);
        assert_eq!(err.message, "unknown method: launchRockets");

        let err = call(&ctx, METHOD_CHECK_ALIAS_PREFIX, json!({ "name": "" })).unwrap_err();
        assert_eq!(err.kind, RpcErrorKind::Validation);
    }

    #[test]
    fn activation_delay_is_validated_and_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(&dir, false);

        let palette = call(&ctx, METHOD_GET_PALETTE_SETTINGS, Value::Null).unwrap();
        assert_eq!(palette, json!({ "prefixKey": "Space", "activationDelayMs": 500 }));

        let err = call(&ctx, METHOD_SET_ACTIVATION_DELAY, json!({ "delay": 50 })).unwrap_err();
        assert_eq!(err.kind, RpcErrorKind::Validation);
        assert!(!ctx.config_path.exists());

        let palette = call(&ctx, METHOD_SET_ACTIVATION_DELAY, json!({ "delay": 800 })).unwrap();
        assert_eq!(palette["activationDelayMs"], 800);
        let saved = config::load_and_validate_config_at(&ctx.config_path).unwrap();
        assert_eq!(saved.palette.activation_delay_ms, 800);
    }

    #[test]
    fn events_become_notifications() {
        let event = AliasEvent::DispatchFailed {
            id: 3,
            key: "code".into(),
            detail: "no window found for code".into(),
        };
        let value = serde_json::to_value(Notification::from(&event)).unwrap();
        assert_eq!(
            value,
            json!({
                "event": "dispatchFailed",
                "data": { "id": 3, "key": "code", "detail": "no window found for code" }
            })
        );
    }
}
