use crate::cancellation;
use crate::config::BuddyConfig;
use crate::error::SignError;
use crate::metrics;
use crate::nonce::{NonceSource, RandomNonce};
use crate::presentation::Presenter;
use crate::relay::{RelayClient, RelayHttp, ACCEPTED_SUFFIX, RESPONSE_SUFFIX};
use crate::session::{SessionManager, SessionSurface};
use buddy_primitives::vendor::{CertMessage, CertOptions, CertResponse, TxMessage, TxOptions, TxResponse};
use buddy_primitives::{
    AddressedRequest, RelayedResponse, RequestHasher, RequestId, RequestKind, SigningRequest,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};

/// Invoked once the wallet picked up the request. Never sent to the relay.
pub type OnAccepted = Box<dyn FnOnce() + Send + 'static>;

/// Per-call options of [`WalletBuddy::sign`].
#[derive(Default)]
pub struct SignOptions {
    /// Vendor options forwarded to the wallet as part of the request.
    pub fields: Map<String, Value>,
    pub on_accepted: Option<OnAccepted>,
}

impl SignOptions {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self {
            fields,
            on_accepted: None,
        }
    }

    pub fn on_accepted(mut self, callback: impl FnOnce() + Send + 'static) -> Self {
        self.on_accepted = Some(Box::new(callback));
        self
    }
}

/// Sends signing requests to a wallet through the relay.
///
/// At most one request is in flight per `WalletBuddy`: starting a new one
/// aborts the previous.
pub struct WalletBuddy {
    genesis_id: String,
    wallet_id: Option<String>,
    relay: RelayClient,
    presenter: Arc<dyn Presenter>,
    nonces: Box<dyn NonceSource>,
    hasher: Box<dyn RequestHasher>,
    sessions: SessionManager,
}

impl WalletBuddy {
    pub fn new(config: BuddyConfig, http: Arc<dyn RelayHttp>, presenter: Arc<dyn Presenter>) -> Self {
        let BuddyConfig {
            relay_url,
            genesis_id,
            wallet_id,
            hash,
            relay,
        } = config;
        Self {
            genesis_id,
            wallet_id,
            relay: RelayClient::new(http, relay_url, relay),
            presenter,
            nonces: Box::new(RandomNonce),
            hasher: hash.hasher(),
            sessions: SessionManager::new(),
        }
    }

    pub fn with_nonce_source(mut self, nonces: impl NonceSource + 'static) -> Self {
        self.nonces = Box::new(nonces);
        self
    }

    pub fn with_hasher(mut self, hasher: impl RequestHasher + 'static) -> Self {
        self.hasher = Box::new(hasher);
        self
    }

    /// Builds the request `sign` would send next, without sending it.
    pub fn prepare(
        &self,
        kind: RequestKind,
        message: Value,
        fields: Map<String, Value>,
    ) -> Result<AddressedRequest, SignError> {
        SigningRequest::new(kind, self.genesis_id.clone(), message, fields, self.nonces.next_nonce())
            .address(self.hasher.as_ref())
            .map_err(SignError::Serialization)
    }

    /// Asks the wallet to sign `message` and waits for its answer.
    ///
    /// Resolves with the wallet's payload. Calling `sign` again before this
    /// settles makes this call fail with [`SignError::Aborted`].
    pub async fn sign(
        &self,
        kind: RequestKind,
        message: Value,
        options: SignOptions,
    ) -> Result<Value, SignError> {
        let SignOptions {
            fields,
            on_accepted,
        } = options;
        metrics::SIGN_REQUESTS.with_label_values(&[kind.as_str()]).inc();
        let result = match self.prepare(kind, message, fields) {
            Ok(request) => {
                let span = info_span!("sign", %kind, request_id = %request.id);
                self.run_session(request, on_accepted).instrument(span).await
            }
            Err(err) => Err(err),
        };
        let outcome = match &result {
            Ok(_) => "success",
            Err(err) => err.outcome_label(),
        };
        metrics::SIGN_OUTCOMES.with_label_values(&[outcome]).inc();
        result
    }

    pub async fn sign_tx(
        &self,
        message: &TxMessage,
        options: &TxOptions,
        on_accepted: Option<OnAccepted>,
    ) -> Result<TxResponse, SignError> {
        self.sign_typed(RequestKind::Tx, message, options, on_accepted)
            .await
    }

    pub async fn sign_cert(
        &self,
        message: &CertMessage,
        options: &CertOptions,
        on_accepted: Option<OnAccepted>,
    ) -> Result<CertResponse, SignError> {
        self.sign_typed(RequestKind::Cert, message, options, on_accepted)
            .await
    }

    async fn sign_typed<M, O, R>(
        &self,
        kind: RequestKind,
        message: &M,
        options: &O,
        on_accepted: Option<OnAccepted>,
    ) -> Result<R, SignError>
    where
        M: Serialize,
        O: Serialize,
        R: DeserializeOwned,
    {
        let message = serde_json::to_value(message).map_err(SignError::Serialization)?;
        let fields = match serde_json::to_value(options).map_err(SignError::Serialization)? {
            Value::Object(fields) => fields,
            _ => Map::new(),
        };
        let payload = self
            .sign(kind, message, SignOptions { fields, on_accepted })
            .await?;
        serde_json::from_value(payload).map_err(SignError::MalformedResponse)
    }

    async fn run_session(
        &self,
        request: AddressedRequest,
        on_accepted: Option<OnAccepted>,
    ) -> Result<Value, SignError> {
        let AddressedRequest { id, body } = request;
        let request_src = self.relay.resource_url(&id, "")?;

        let token = self.sessions.start_new_session();
        let surface = Arc::new(SessionSurface::new(
            self.presenter.connect(&request_src, self.wallet_id.as_deref()),
        ));
        let _guard = SessionGuard {
            token: token.clone(),
            surface: surface.clone(),
        };

        self.relay.submit(&id, &body, &token).await?;
        info!("request submitted, waiting for the wallet");

        self.spawn_grace_reveal(&token, &surface);
        self.spawn_acceptance_watch(&id, &token, &surface, on_accepted);

        let text = self
            .relay
            .poll(&id, RESPONSE_SUFFIX, self.relay.config().response_timeout(), &token)
            .await?;
        let response: RelayedResponse =
            serde_json::from_str(&text).map_err(SignError::MalformedResponse)?;
        let result = response.into_result().map_err(SignError::RelayError);
        match &result {
            Ok(_) => info!("wallet answered"),
            Err(err) => info!(%err, "wallet rejected the request"),
        }
        result
    }

    /// Shows the presentation surface if the wallet has not accepted the
    /// request within the grace period.
    fn spawn_grace_reveal(&self, token: &CancellationToken, surface: &Arc<SessionSurface>) {
        let grace_period = self.relay.config().grace_period();
        let token = token.clone();
        let surface = surface.clone();
        let task = async move {
            cancellation::sleep(&token, grace_period).await?;
            if surface.reveal_unless_accepted() {
                metrics::PRESENTATION_REVEALS.inc();
                debug!("wallet is slow to accept, presentation shown");
            }
            Ok::<(), SignError>(())
        };
        tokio::spawn(best_effort("grace_reveal", task).instrument(info_span!("grace_reveal")));
    }

    /// Hides the presentation surface and notifies the caller once the wallet
    /// picks up the request.
    fn spawn_acceptance_watch(
        &self,
        id: &RequestId,
        token: &CancellationToken,
        surface: &Arc<SessionSurface>,
        on_accepted: Option<OnAccepted>,
    ) {
        let relay = self.relay.clone();
        let id = id.clone();
        let token = token.clone();
        let surface = surface.clone();
        let task = async move {
            relay
                .poll(&id, ACCEPTED_SUFFIX, relay.config().accepted_timeout(), &token)
                .await?;
            surface.mark_accepted();
            info!("wallet accepted the request");
            if let Some(on_accepted) = on_accepted {
                on_accepted();
            }
            Ok::<(), SignError>(())
        };
        tokio::spawn(best_effort("acceptance", task).instrument(info_span!("acceptance")));
    }
}

/// Runs a session side task whose failure must not affect the signing result.
async fn best_effort<F>(task: &'static str, future: F)
where
    F: Future<Output = Result<(), SignError>>,
{
    match future.await {
        Ok(()) => {}
        Err(SignError::Aborted) => debug!(task, "session ended first"),
        Err(err) => {
            metrics::BEST_EFFORT_FAILURES.with_label_values(&[task]).inc();
            warn!(task, %err, "best-effort session task failed");
        }
    }
}

/// Ends the session on every exit path of `run_session`, including the
/// caller dropping the future.
struct SessionGuard {
    token: CancellationToken,
    surface: Arc<SessionSurface>,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.token.cancel();
        self.surface.close();
    }
}
