// API client module: the model lifecycle orchestrator.
//
// `ModelLifecycleClient` holds nothing but credentials, a request builder
// for the configured auth mode and a transport. Model state is never
// cached: every answer comes from a fresh call to the backend.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, error, info, instrument, warn};

use crate::config::{AuthMode, Credentials};
use crate::error::{Error, Result};
use crate::model::{ModelId, ModelStatus, Progress, StatusAxis, Table, UploadResponse};
use crate::transport::{
    request_builder, ApiResponse, HttpTransport, Operation, ReqwestTransport, RequestBuilder,
};

/// Delay between two status polls.
pub const POLL_INTERVAL: Duration = Duration::from_millis(2000);

/// What `train_model` does with a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrainFailurePolicy {
    /// Log the error and return `Ok(())`. Training is best effort.
    #[default]
    Swallow,
    /// Return the error like every other operation.
    Propagate,
}

/// Client for the upload → train → predict lifecycle.
#[derive(Clone)]
pub struct ModelLifecycleClient {
    credentials: Credentials,
    requests: Arc<dyn RequestBuilder>,
    transport: Arc<dyn HttpTransport>,
    poll_interval: Duration,
    train_failure_policy: TrainFailurePolicy,
}

impl ModelLifecycleClient {
    /// Client talking to the backend over reqwest.
    pub fn new(credentials: Credentials) -> Result<Self> {
        let transport = ReqwestTransport::new()?;
        Ok(Self::with_transport(credentials, Arc::new(transport)))
    }

    pub fn with_transport(credentials: Credentials, transport: Arc<dyn HttpTransport>) -> Self {
        let requests: Arc<dyn RequestBuilder> = Arc::from(request_builder(&credentials));
        ModelLifecycleClient {
            credentials,
            requests,
            transport,
            poll_interval: POLL_INTERVAL,
            train_failure_policy: TrainFailurePolicy::default(),
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_train_failure_policy(mut self, policy: TrainFailurePolicy) -> Self {
        self.train_failure_policy = policy;
        self
    }

    pub fn mode(&self) -> AuthMode {
        self.requests.mode()
    }

    pub fn backend_url(&self) -> &str {
        self.credentials.backend_url()
    }

    /// Build, send and status-check one call.
    async fn call(&self, operation: Operation<'_>) -> Result<ApiResponse> {
        let request = self.requests.build(&operation);
        debug!(op = operation.name(), method = %request.method, url = %request.url, "calling backend");
        let response = self.transport.execute(request).await?;
        response.check().map_err(|e| {
            if e.is_unauthorized() {
                warn!(op = operation.name(), "backend rejected access token");
            }
            e
        })
    }

    /// Fetch the current status document for a model.
    pub async fn model_status(&self, model_id: &ModelId) -> Result<ModelStatus> {
        self.call(Operation::Status(model_id)).await?.json()
    }

    /// Poll until `axis` reaches its terminal value.
    ///
    /// Returns on `imported` / `trained`, fails with `ImportFailed` /
    /// `TrainingFailed` on `error`, and sleeps the poll interval otherwise.
    /// There is no attempt limit; see [`Self::wait_model_with_deadline`].
    /// A 401 ends the loop immediately.
    #[instrument(skip_all, fields(model_id = %model_id, axis = %axis))]
    pub async fn wait_model(&self, model_id: &ModelId, axis: StatusAxis) -> Result<()> {
        loop {
            let status = self.model_status(model_id).await?;
            match axis.observe(&status) {
                Progress::Settled => {
                    debug!("model settled");
                    return Ok(());
                }
                Progress::Failed => return Err(axis.failure(model_id)),
                Progress::Pending => {
                    debug!(
                        dataset_status = ?status.dataset_status,
                        status = ?status.status,
                        "model not settled, polling again"
                    );
                }
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    /// [`Self::wait_model`] bounded by a deadline.
    pub async fn wait_model_with_deadline(
        &self,
        model_id: &ModelId,
        axis: StatusAxis,
        deadline: Duration,
    ) -> Result<()> {
        match tokio::time::timeout(deadline, self.wait_model(model_id, axis)).await {
            Ok(result) => result,
            Err(_) => Err(Error::DeadlineExceeded {
                model_id: model_id.clone(),
                deadline,
            }),
        }
    }

    /// Upload a table and wait for the backend to finish importing it.
    pub async fn upload_model(&self, table: &Table) -> Result<ModelId> {
        let response = self.call(Operation::Import(table)).await?;
        let model_id = response.json::<UploadResponse>()?.model.id;
        info!(model_id = %model_id, rows = table.row_count(), "table uploaded, waiting for import");
        self.wait_model(&model_id, StatusAxis::Dataset).await?;
        info!(model_id = %model_id, "model imported");
        Ok(model_id)
    }

    /// Start training on `target` and wait for it to finish.
    ///
    /// Under [`TrainFailurePolicy::Swallow`] (the default) any failure,
    /// 401 included, is logged and `Ok(())` is returned.
    pub async fn train_model(
        &self,
        model_id: &ModelId,
        target: &str,
        is_lightning: bool,
    ) -> Result<()> {
        let result = self.train_and_wait(model_id, target, is_lightning).await;
        match (result, self.train_failure_policy) {
            (Ok(()), _) => {
                info!(model_id = %model_id, "model trained");
                Ok(())
            }
            (Err(e), TrainFailurePolicy::Swallow) => {
                error!(model_id = %model_id, error = %e, "training failed");
                Ok(())
            }
            (Err(e), TrainFailurePolicy::Propagate) => Err(e),
        }
    }

    async fn train_and_wait(
        &self,
        model_id: &ModelId,
        target: &str,
        is_lightning: bool,
    ) -> Result<()> {
        self.call(Operation::Train {
            model_id,
            target,
            is_lightning,
        })
        .await?;
        info!(model_id = %model_id, target_column = target, is_lightning, "training started");
        self.wait_model(model_id, StatusAxis::Training).await
    }

    /// Predict the rows of `table` (row 0 is the header). The backend's
    /// payload is returned as is.
    pub async fn predict_model(&self, model_id: &ModelId, table: &Table) -> Result<Value> {
        self.call(Operation::Predict {
            model_id,
            header: table.header(),
            rows: table.data_rows(),
        })
        .await?
        .json()
    }

    pub async fn get_accuracy(&self, model_id: &ModelId) -> Result<Value> {
        self.call(Operation::Accuracy(model_id)).await?.json()
    }

    /// A prediction on a sample row picked by the backend.
    pub async fn random_predict(&self, model_id: &ModelId) -> Result<Value> {
        self.call(Operation::RandomPredict(model_id)).await?.json()
    }

    /// Column schema a prediction table must follow.
    pub async fn get_predict_columns(&self, model_id: &ModelId) -> Result<Value> {
        self.call(Operation::PredictColumns(model_id)).await?.json()
    }

    /// Delete a model. The response body is not read.
    pub async fn delete_model(&self, model_id: &ModelId) -> Result<()> {
        self.call(Operation::Delete(model_id)).await?;
        info!(model_id = %model_id, "model deleted");
        Ok(())
    }

    /// Upload, train, then predict `predict_table`.
    ///
    /// A swallowed training failure does not stop the sequence; the
    /// predict call then surfaces whatever the backend answers.
    pub async fn upload_and_predict(
        &self,
        table: &Table,
        predict_table: &Table,
        target: &str,
        is_lightning: bool,
    ) -> Result<(ModelId, Value)> {
        let model_id = self.upload_model(table).await?;
        self.train_model(&model_id, target, is_lightning).await?;
        let predictions = self.predict_model(&model_id, predict_table).await?;
        Ok((model_id, predictions))
    }
}
