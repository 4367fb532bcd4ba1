use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use camp_db::models::{Setting, SettingWrite};
use camp_db::settings::{self, SettingsView};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::Message;
use crate::error::{ApiError, ApiResult};
use crate::extract::{Json, Query};
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/settings",
            get(list).post(create).put(upsert).patch(batch_upsert),
        )
        .route("/settings/:key", get(show).put(upsert_key).delete(remove))
}

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub category: Option<String>,
    pub key: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SingleSetting {
    pub key: String,
    pub value: String,
    pub category: String,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum ListRes {
    Single(SingleSetting),
    Grouped(SettingsView),
}

/// Corpo de POST e PUT; `value` aceita qualquer valor JSON e é gravado como texto
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingBody {
    pub key: Option<String>,
    pub value: Option<Value>,
    pub category: Option<String>,
    pub updated_by: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchBody {
    pub settings: Option<Value>,
    pub updated_by: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct BatchRes {
    pub message: String,
    pub settings: Vec<Setting>,
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

impl SettingBody {
    fn into_write(self, key: Option<String>) -> ApiResult<SettingWrite> {
        let key = key
            .or(self.key)
            .filter(|k| !k.trim().is_empty());
        let (Some(key), Some(value)) = (key, self.value.filter(|v| !v.is_null())) else {
            return Err(ApiError::BadRequest(
                "Chave e valor são obrigatórios".to_string(),
            ));
        };
        Ok(SettingWrite {
            key,
            value: value_text(&value),
            category: self.category,
            updated_by: self.updated_by,
        })
    }
}

/// Aceita `{"chave": valor}` ou `[{"key", "value", "category"}]`
fn batch_writes(settings: Value, updated_by: Option<String>) -> ApiResult<Vec<SettingWrite>> {
    let invalid = || ApiError::BadRequest("settings deve ser um objeto ou uma lista".to_string());

    match settings {
        Value::Object(map) => Ok(map
            .into_iter()
            .map(|(key, value)| SettingWrite {
                key,
                value: value_text(&value),
                category: None,
                updated_by: updated_by.clone(),
            })
            .collect()),
        Value::Array(items) => items
            .into_iter()
            .map(|item| {
                let body: SettingBody = serde_json::from_value(item).map_err(|_| invalid())?;
                let mut write = body.into_write(None)?;
                write.updated_by = updated_by.clone();
                Ok(write)
            })
            .collect(),
        _ => Err(invalid()),
    }
}

async fn list(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> ApiResult<Json<ListRes>> {
    let category = params.category.as_deref().filter(|c| !c.is_empty());
    let key = params.key.as_deref().filter(|k| !k.is_empty());

    let mut found = settings::list(&state.pool, category, key).await?;
    if key.is_some() && found.len() == 1 {
        if let Some(setting) = found.pop() {
            return Ok(Json(ListRes::Single(SingleSetting {
                key: setting.key,
                value: setting.value,
                category: setting.category,
            })));
        }
    }
    Ok(Json(ListRes::Grouped(SettingsView::new(found))))
}

async fn create(
    State(state): State<AppState>,
    Json(body): Json<SettingBody>,
) -> ApiResult<(StatusCode, Json<Setting>)> {
    let write = body.into_write(None)?;
    let setting = settings::create(&state.pool, &write).await?;
    Ok((StatusCode::CREATED, Json(setting)))
}

async fn upsert(
    State(state): State<AppState>,
    Json(body): Json<SettingBody>,
) -> ApiResult<Json<Setting>> {
    let write = body.into_write(None)?;
    Ok(Json(settings::upsert(&state.pool, &write).await?))
}

async fn batch_upsert(
    State(state): State<AppState>,
    Json(body): Json<BatchBody>,
) -> ApiResult<Json<BatchRes>> {
    let raw = body
        .settings
        .ok_or_else(|| ApiError::BadRequest("settings é obrigatório".to_string()))?;
    let writes = batch_writes(raw, body.updated_by)?;

    let saved = settings::batch_upsert(&state.pool, &writes).await?;
    Ok(Json(BatchRes {
        message: format!("{} configurações atualizadas", saved.len()),
        settings: saved,
    }))
}

async fn show(State(state): State<AppState>, Path(key): Path<String>) -> ApiResult<Json<Setting>> {
    Ok(Json(settings::get(&state.pool, &key).await?))
}

async fn upsert_key(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Json(body): Json<SettingBody>,
) -> ApiResult<Json<Setting>> {
    let write = body.into_write(Some(key))?;
    Ok(Json(settings::upsert(&state.pool, &write).await?))
}

async fn remove(State(state): State<AppState>, Path(key): Path<String>) -> ApiResult<Json<Message>> {
    settings::delete(&state.pool, &key).await?;
    Ok(Json(Message::new("Configuração removida")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn batch_accepts_object_and_array() {
        let from_object = batch_writes(json!({"camp_name": "Mutirão", "low_stock_threshold": 5}), None)
            .unwrap();
        assert_eq!(from_object.len(), 2);
        assert!(from_object
            .iter()
            .any(|w| w.key == "low_stock_threshold" && w.value == "5"));

        let from_array = batch_writes(
            json!([{"key": "email", "value": "a@b.c", "category": "general"}]),
            Some("admin".to_string()),
        )
        .unwrap();
        assert_eq!(from_array[0].category.as_deref(), Some("general"));
        assert_eq!(from_array[0].updated_by.as_deref(), Some("admin"));

        assert!(batch_writes(json!("texto"), None).is_err());
        assert!(batch_writes(json!([{"value": 1}]), None).is_err());
    }

    #[test]
    fn body_requires_key_and_value() {
        let body = SettingBody {
            value: Some(json!(true)),
            ..Default::default()
        };
        assert!(body.into_write(None).is_err());

        let body = SettingBody {
            value: Some(json!(true)),
            ..Default::default()
        };
        assert_eq!(body.into_write(Some("flag".into())).unwrap().value, "true");
    }
}
