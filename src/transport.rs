// Request construction and HTTP plumbing.
//
// `RequestBuilder` turns a lifecycle `Operation` into a concrete
// `ApiRequest` for one authentication mode. `HttpTransport` executes it.
// The client only talks to these two traits, so tests swap the transport
// for a mock and inspect exactly what would have gone over the wire.

use async_trait::async_trait;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};
use tracing::debug;

#[cfg(test)]
use mockall::automock;

use crate::config::{AuthMode, Credentials};
use crate::error::{Error, Result};
use crate::model::{ModelId, Table};

/// Header carrying the token in app mode (and on a few token-mode calls).
pub const ACCESS_TOKEN_HEADER: &str = "access_token";

/// One backend call, independent of how it is authenticated.
#[derive(Debug, Clone, Copy)]
pub enum Operation<'a> {
    Accuracy(&'a ModelId),
    Status(&'a ModelId),
    Import(&'a Table),
    Train {
        model_id: &'a ModelId,
        target: &'a str,
        is_lightning: bool,
    },
    Predict {
        model_id: &'a ModelId,
        header: &'a [Value],
        rows: &'a [Vec<Value>],
    },
    RandomPredict(&'a ModelId),
    PredictColumns(&'a ModelId),
    Delete(&'a ModelId),
}

impl Operation<'_> {
    /// Short name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            Operation::Accuracy(_) => "accuracy",
            Operation::Status(_) => "status",
            Operation::Import(_) => "import",
            Operation::Train { .. } => "train",
            Operation::Predict { .. } => "predict",
            Operation::RandomPredict(_) => "random_predict",
            Operation::PredictColumns(_) => "predict_columns",
            Operation::Delete(_) => "delete",
        }
    }
}

/// A fully built HTTP request.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(&'static str, String)>,
    pub body: Option<Value>,
}

impl ApiRequest {
    fn get(url: String) -> Self {
        ApiRequest {
            method: Method::GET,
            url,
            headers: Vec::new(),
            body: None,
        }
    }

    fn post(url: String, body: Option<Value>) -> Self {
        ApiRequest {
            method: Method::POST,
            url,
            headers: Vec::new(),
            body,
        }
    }

    fn header(mut self, name: &'static str, value: &str) -> Self {
        self.headers.push((name, value.to_string()));
        self
    }

    #[cfg(test)]
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Raw response: status code plus the unparsed body.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: String,
}

impl ApiResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        ApiResponse {
            status,
            body: body.into(),
        }
    }

    /// 200 with a JSON body.
    #[cfg(test)]
    pub fn ok_json(body: Value) -> Self {
        Self::new(200, body.to_string())
    }

    /// Map 401 to `Unauthorized` and any other non-2xx to `Backend`.
    pub fn check(self) -> Result<Self> {
        match self.status {
            401 => Err(Error::Unauthorized),
            200..=299 => Ok(self),
            status => Err(Error::Backend {
                status,
                body: self.body,
            }),
        }
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_str(&self.body)?)
    }
}

/// Builds the mode-specific request for every lifecycle operation.
pub trait RequestBuilder: Send + Sync {
    fn mode(&self) -> AuthMode;

    fn build(&self, operation: &Operation<'_>) -> ApiRequest;
}

/// Select the builder for the credentials' mode.
pub fn request_builder(credentials: &Credentials) -> Box<dyn RequestBuilder> {
    let base_url = credentials.backend_url().to_string();
    let access_token = credentials.access_token().to_string();
    match credentials.mode() {
        AuthMode::App => Box::new(AppRequests {
            base_url,
            access_token,
        }),
        AuthMode::Token => Box::new(TokenRequests {
            base_url,
            access_token,
        }),
    }
}

/// Session mode: header token, reads are GETs under `/app`.
pub struct AppRequests {
    base_url: String,
    access_token: String,
}

impl RequestBuilder for AppRequests {
    fn mode(&self) -> AuthMode {
        AuthMode::App
    }

    fn build(&self, operation: &Operation<'_>) -> ApiRequest {
        let base = &self.base_url;
        let request = match *operation {
            Operation::Accuracy(id) => ApiRequest::get(format!("{}/app/acc/{}", base, id)),
            Operation::Status(id) => ApiRequest::get(format!("{}/app/status/{}", base, id)),
            Operation::Import(table) => ApiRequest::post(
                format!("{}/app/import_matrix", base),
                Some(json!({ "matrix": table })),
            ),
            Operation::Train {
                model_id,
                target,
                is_lightning,
            } => ApiRequest::post(
                format!("{}/app/train", base),
                Some(json!({
                    "target": target,
                    "model_id": model_id,
                    "is_lightning": is_lightning,
                })),
            ),
            Operation::Predict {
                model_id,
                header,
                rows,
            } => ApiRequest::post(
                format!("{}/app/predict/{}", base, model_id),
                Some(json!({ "header": header, "rows": rows })),
            ),
            Operation::RandomPredict(id) => {
                ApiRequest::get(format!("{}/app/random_predict/{}", base, id))
            }
            Operation::PredictColumns(id) => {
                ApiRequest::get(format!("{}/app/predict_columns/{}", base, id))
            }
            Operation::Delete(id) => {
                ApiRequest::post(format!("{}/app/delete_model/{}", base, id), None)
            }
        };
        request.header(ACCESS_TOKEN_HEADER, &self.access_token)
    }
}

/// API token mode: everything is a POST to a `*_token` endpoint with the
/// token in the body.
pub struct TokenRequests {
    base_url: String,
    access_token: String,
}

impl TokenRequests {
    /// `{"access_token": ..}` merged with the operation's own fields.
    fn body(&self, fields: Value) -> Value {
        let mut body = Map::new();
        body.insert(
            ACCESS_TOKEN_HEADER.to_string(),
            Value::String(self.access_token.clone()),
        );
        if let Value::Object(fields) = fields {
            body.extend(fields);
        }
        Value::Object(body)
    }

    fn token_only(&self, url: String) -> ApiRequest {
        ApiRequest::post(url, Some(self.body(json!({}))))
    }
}

impl RequestBuilder for TokenRequests {
    fn mode(&self) -> AuthMode {
        AuthMode::Token
    }

    fn build(&self, operation: &Operation<'_>) -> ApiRequest {
        let base = &self.base_url;
        match *operation {
            Operation::Accuracy(id) => self.token_only(format!("{}/model/acc_token/{}", base, id)),
            Operation::Status(id) => {
                self.token_only(format!("{}/model/status_token/{}", base, id))
            }
            Operation::Import(table) => ApiRequest::post(
                format!("{}/csv/import_matrix_token", base),
                Some(self.body(json!({ "matrix": table }))),
            ),
            // The backend also expects the header on train and delete.
            Operation::Train {
                model_id,
                target,
                is_lightning,
            } => ApiRequest::post(
                format!("{}/model/train_token", base),
                Some(self.body(json!({
                    "target": target,
                    "model_id": model_id,
                    "is_lightning": is_lightning,
                }))),
            )
            .header(ACCESS_TOKEN_HEADER, &self.access_token),
            Operation::Predict {
                model_id,
                header,
                rows,
            } => ApiRequest::post(
                format!("{}/model/predict_token/{}", base, model_id),
                Some(self.body(json!({ "header": header, "rows": rows }))),
            ),
            Operation::RandomPredict(id) => {
                self.token_only(format!("{}/model/random_predict_token/{}", base, id))
            }
            Operation::PredictColumns(id) => {
                self.token_only(format!("{}/model/predict_columns_token/{}", base, id))
            }
            Operation::Delete(id) => self
                .token_only(format!("{}/model/delete_model_token/{}", base, id))
                .header(ACCESS_TOKEN_HEADER, &self.access_token),
        }
    }
}

/// Executes built requests. Injected into the client so tests can replace
/// the network with a scripted backend.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn execute(&self, request: ApiRequest) -> std::result::Result<ApiResponse, Error>;
}

/// Production transport backed by an async reqwest client.
#[derive(Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("nextbrain-cli/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(ReqwestTransport { client })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn execute(&self, request: ApiRequest) -> std::result::Result<ApiResponse, Error> {
        debug!(method = %request.method, url = %request.url, "sending request");
        let mut builder = self.client.request(request.method, &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(*name, value);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }
        let res = builder.send().await?;
        let status = res.status().as_u16();
        let body = res.text().await?;
        debug!(status, "received response");
        Ok(ApiResponse::new(status, body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "http://backend.test";
    const TOKEN: &str = "tok-1";

    fn builders() -> (Box<dyn RequestBuilder>, Box<dyn RequestBuilder>) {
        let app = request_builder(&Credentials::with_backend(TOKEN, BASE, AuthMode::App));
        let token = request_builder(&Credentials::with_backend(TOKEN, BASE, AuthMode::Token));
        (app, token)
    }

    fn sample_table() -> Table {
        Table::new(vec![
            vec![json!("x"), json!("y")],
            vec![json!(1), json!("a")],
        ])
        .unwrap()
    }

    /// Body without the token, so both modes can be compared field by field.
    fn payload(request: &ApiRequest) -> Value {
        let mut body = request.body.clone().unwrap_or_else(|| json!({}));
        if let Value::Object(map) = &mut body {
            map.remove(ACCESS_TOKEN_HEADER);
        }
        body
    }

    fn every_operation<'a>(id: &'a ModelId, table: &'a Table) -> Vec<Operation<'a>> {
        vec![
            Operation::Accuracy(id),
            Operation::Status(id),
            Operation::Import(table),
            Operation::Train {
                model_id: id,
                target: "y",
                is_lightning: true,
            },
            Operation::Predict {
                model_id: id,
                header: table.header(),
                rows: table.data_rows(),
            },
            Operation::RandomPredict(id),
            Operation::PredictColumns(id),
            Operation::Delete(id),
        ]
    }

    #[test]
    fn builder_matches_mode() {
        let (app, token) = builders();
        assert_eq!(app.mode(), AuthMode::App);
        assert_eq!(token.mode(), AuthMode::Token);
    }

    #[test]
    fn app_mode_endpoints() {
        let (app, _) = builders();
        let id = ModelId::Numeric(7.into());
        let table = sample_table();

        let expected = [
            (Method::GET, "/app/acc/7"),
            (Method::GET, "/app/status/7"),
            (Method::POST, "/app/import_matrix"),
            (Method::POST, "/app/train"),
            (Method::POST, "/app/predict/7"),
            (Method::GET, "/app/random_predict/7"),
            (Method::GET, "/app/predict_columns/7"),
            (Method::POST, "/app/delete_model/7"),
        ];
        for (op, (method, path)) in every_operation(&id, &table).iter().zip(expected) {
            let req = app.build(op);
            assert_eq!(req.method, method, "{}", op.name());
            assert_eq!(req.url, format!("{}{}", BASE, path));
            assert_eq!(req.header_value(ACCESS_TOKEN_HEADER), Some(TOKEN));
            if let Some(body) = &req.body {
                assert!(body.get(ACCESS_TOKEN_HEADER).is_none(), "{}", op.name());
            }
        }
    }

    #[test]
    fn token_mode_endpoints() {
        let (_, token) = builders();
        let id = ModelId::Text("m-1".to_string());
        let table = sample_table();

        let expected = [
            "/model/acc_token/m-1",
            "/model/status_token/m-1",
            "/csv/import_matrix_token",
            "/model/train_token",
            "/model/predict_token/m-1",
            "/model/random_predict_token/m-1",
            "/model/predict_columns_token/m-1",
            "/model/delete_model_token/m-1",
        ];
        for (op, path) in every_operation(&id, &table).iter().zip(expected) {
            let req = token.build(op);
            assert_eq!(req.method, Method::POST, "{}", op.name());
            assert_eq!(req.url, format!("{}{}", BASE, path));
            let body = req.body.as_ref().expect("token mode always sends a body");
            assert_eq!(body[ACCESS_TOKEN_HEADER], json!(TOKEN), "{}", op.name());
        }
    }

    #[test]
    fn token_mode_header_only_on_train_and_delete() {
        let (_, token) = builders();
        let id = ModelId::Numeric(3.into());
        let table = sample_table();

        for op in every_operation(&id, &table) {
            let has_header = token.build(&op).header_value(ACCESS_TOKEN_HEADER).is_some();
            let expected = matches!(op, Operation::Train { .. } | Operation::Delete(_));
            assert_eq!(has_header, expected, "{}", op.name());
        }
    }

    #[test]
    fn both_modes_send_the_same_payload() {
        let (app, token) = builders();
        let id = ModelId::Numeric(11.into());
        let table = sample_table();

        for op in every_operation(&id, &table) {
            assert_eq!(
                payload(&app.build(&op)),
                payload(&token.build(&op)),
                "{}",
                op.name()
            );
        }
    }

    #[test]
    fn train_body_fields() {
        let (app, _) = builders();
        let id = ModelId::Numeric(5.into());
        let req = app.build(&Operation::Train {
            model_id: &id,
            target: "price",
            is_lightning: false,
        });

        assert_eq!(
            req.body,
            Some(json!({"target": "price", "model_id": 5, "is_lightning": false}))
        );
    }

    #[test]
    fn import_sends_whole_matrix() {
        let (_, token) = builders();
        let table = sample_table();
        let req = token.build(&Operation::Import(&table));

        assert_eq!(
            req.body,
            Some(json!({"access_token": TOKEN, "matrix": [["x", "y"], [1, "a"]]}))
        );
    }

    #[test]
    fn response_check_maps_statuses() {
        assert!(matches!(
            ApiResponse::new(401, "").check(),
            Err(Error::Unauthorized)
        ));
        assert!(matches!(
            ApiResponse::new(500, "boom").check(),
            Err(Error::Backend { status: 500, ref body }) if body == "boom"
        ));
        assert!(ApiResponse::new(204, "").check().is_ok());
    }

    #[test]
    fn response_json_reports_parse_errors() {
        let resp = ApiResponse::new(200, "not json");
        assert!(matches!(resp.json::<Value>(), Err(Error::Json(_))));
    }
}
