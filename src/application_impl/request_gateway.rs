use crate::application_port::*;
use crate::domain_port::*;
use crate::logger::*;
use std::sync::Arc;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

// A request is resent at most once, whatever the stages ask for.
const MAX_RESENDS: usize = 1;

/// Dispatches requests through an ordered pipeline of stages.
///
/// Request stages run before every attempt (so a resend picks up a refreshed
/// token). Response stages inspect every response and may ask for one resend.
pub struct RequestGateway {
    transport: Arc<dyn HttpTransport>,
    request_stages: Vec<Arc<dyn RequestStage>>,
    response_stages: Vec<Arc<dyn ResponseStage>>,
}

impl RequestGateway {
    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            transport,
            request_stages: Vec::new(),
            response_stages: Vec::new(),
        }
    }

    /// Request-id stamping, bearer credentials and refresh-once on 401.
    pub fn authenticated(transport: Arc<dyn HttpTransport>, session: Arc<dyn AuthSession>) -> Self {
        Self::new(transport)
            .with_request_stage(Arc::new(RequestIdStage))
            .with_request_stage(Arc::new(BearerTokenStage::new(session.clone())))
            .with_response_stage(Arc::new(RefreshOnUnauthorizedStage::new(session)))
    }

    pub fn with_request_stage(mut self, stage: Arc<dyn RequestStage>) -> Self {
        self.request_stages.push(stage);
        self
    }

    pub fn with_response_stage(mut self, stage: Arc<dyn ResponseStage>) -> Self {
        self.response_stages.push(stage);
        self
    }

    async fn run_response_stages(
        &self,
        request: &mut ApiRequest,
        response: &ApiResponse,
    ) -> Result<StageVerdict, GatewayError> {
        for stage in &self.response_stages {
            if stage.after_receive(request, response).await? == StageVerdict::Resend {
                return Ok(StageVerdict::Resend);
            }
        }
        Ok(StageVerdict::Pass)
    }
}

#[async_trait::async_trait]
impl Gateway for RequestGateway {
    async fn send(&self, mut request: ApiRequest) -> Result<ApiResponse, GatewayError> {
        let mut resends = 0;
        loop {
            for stage in &self.request_stages {
                stage.before_send(&mut request).await?;
            }

            let response = match self.transport.dispatch(&request).await {
                Ok(response) => response,
                Err(e) => {
                    warn!(method = %request.method, path = %request.path, "dispatch failed: {}", e);
                    return Err(e.into());
                }
            };

            let verdict = self.run_response_stages(&mut request, &response).await?;
            if verdict == StageVerdict::Resend && resends < MAX_RESENDS {
                resends += 1;
                debug!(method = %request.method, path = %request.path, "resending request");
                continue;
            }

            return classify(response);
        }
    }
}

fn classify(response: ApiResponse) -> Result<ApiResponse, GatewayError> {
    match response.status {
        200..=299 => Ok(response),
        401 => Err(GatewayError::AuthExpired),
        400 | 422 => Err(GatewayError::Validation(error_message(&response))),
        status => Err(GatewayError::Network(format!(
            "unexpected status {}: {}",
            status,
            error_message(&response)
        ))),
    }
}

fn error_message(response: &ApiResponse) -> String {
    response
        .body
        .get("message")
        .or_else(|| response.body.get("error"))
        .and_then(|v| v.as_str())
        .map(str::to_owned)
        .unwrap_or_else(|| format!("status {}", response.status))
}

// region stages

/// Stamps each attempt with a fresh correlation id.
pub struct RequestIdStage;

#[async_trait::async_trait]
impl RequestStage for RequestIdStage {
    async fn before_send(&self, request: &mut ApiRequest) -> Result<(), GatewayError> {
        request.set_header(REQUEST_ID_HEADER, uuid::Uuid::new_v4().to_string());
        Ok(())
    }
}

/// Attaches the current access token, if there is one.
pub struct BearerTokenStage {
    session: Arc<dyn AuthSession>,
}

impl BearerTokenStage {
    pub fn new(session: Arc<dyn AuthSession>) -> Self {
        Self { session }
    }
}

#[async_trait::async_trait]
impl RequestStage for BearerTokenStage {
    async fn before_send(&self, request: &mut ApiRequest) -> Result<(), GatewayError> {
        match self.session.access_token() {
            Some(token) => request.set_header("authorization", format!("Bearer {}", token.0)),
            None => {
                request.headers.remove("authorization");
            }
        }
        Ok(())
    }
}

/// On a 401, refreshes the session once per originating request.
pub struct RefreshOnUnauthorizedStage {
    session: Arc<dyn AuthSession>,
}

impl RefreshOnUnauthorizedStage {
    pub fn new(session: Arc<dyn AuthSession>) -> Self {
        Self { session }
    }
}

#[async_trait::async_trait]
impl ResponseStage for RefreshOnUnauthorizedStage {
    async fn after_receive(
        &self,
        request: &mut ApiRequest,
        response: &ApiResponse,
    ) -> Result<StageVerdict, GatewayError> {
        if !response.is_unauthenticated() {
            return Ok(StageVerdict::Pass);
        }
        if request.is_retried() {
            warn!(path = %request.path, "still unauthenticated after refresh");
            return Err(GatewayError::AuthExpired);
        }

        request.mark_retried();
        match self.session.refresh().await {
            Ok(_) => Ok(StageVerdict::Resend),
            Err(e) => {
                warn!(path = %request.path, "refresh failed, dropping session: {}", e);
                self.session.invalidate().await;
                Err(GatewayError::AuthExpired)
            }
        }
    }
}

// endregion
