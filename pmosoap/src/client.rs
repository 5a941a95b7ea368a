//! SOAP client with a cached, refreshable service description

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use anyhow::Context;
use tokio::sync::{OnceCell, RwLock};
use tracing::{debug, info, warn};
use url::Url;

use crate::description::{Description, DescriptionLoader, WsdlLoader, parse_locator};
use crate::envelope::{Response, build_request_envelope, decode_response_envelope};
use crate::error::{DescriptionError, Error, ErrorWithPayload, Result};
use crate::params::{HeaderParams, Params, Request, ToParams};
use crate::transport::{Credentials, HttpRequest, Transport};

/// Background refresh is only started for intervals of at least 15 minutes
pub const MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(15 * 60);

/// Default timeout for SOAP and WSDL HTTP requests
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default User-Agent
pub const DEFAULT_USER_AGENT: &str = concat!("pmosoap/", env!("CARGO_PKG_VERSION"));

/// Description and last load error, always replaced together
struct DescriptionState {
    source: Url,
    description: Option<Arc<Description>>,
    load_error: Option<Arc<DescriptionError>>,
    base_url: String,
}

struct Inner {
    /// Calls hold a read guard for their whole duration; loads take the
    /// write guard, so a refresh waits for in-flight calls to drain and new
    /// calls wait for the refresh to finish.
    state: RwLock<DescriptionState>,
    initialized: OnceCell<()>,
    active_calls: AtomicUsize,
    transport: Arc<dyn Transport>,
    loader: Arc<dyn DescriptionLoader>,
    credentials: Option<Credentials>,
    header_name: Option<String>,
    header_params: HeaderParams,
    refresh_interval: Duration,
}

impl Inner {
    /// Load the description and install the (description, error) pair
    async fn reload(&self, state: &mut DescriptionState) {
        match self.loader.load(&state.source).await {
            Ok(description) => {
                state.base_url = description.base_url().to_string();
                info!(
                    source = %state.source,
                    services = description.services.len(),
                    base_url = %state.base_url,
                    "Loaded WSDL definitions"
                );
                state.description = Some(Arc::new(description));
                state.load_error = None;
            }
            Err(err) => {
                warn!(source = %state.source, error = %err, "Failed to load WSDL definitions");
                state.description = None;
                state.load_error = Some(Arc::new(err));
            }
        }
    }
}

/// Decrements the in-flight call counter on every exit path
struct CallGuard<'a>(&'a AtomicUsize);

impl<'a> CallGuard<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for CallGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// SOAP client bound to one service description.
///
/// The description is loaded lazily by the first call. Cloning is cheap and
/// every clone shares the same cache.
///
/// # Example
///
/// ```no_run
/// use pmosoap::{Params, SoapClient};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let client = SoapClient::new("http://example.com/stock?wsdl")?;
///     let response = client
///         .call("GetPrice", Params::new().with("Item", "Apple"))
///         .await?;
///     println!("{}", response.body_text());
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct SoapClient {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for SoapClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SoapClient")
            .field("refresh_interval", &self.inner.refresh_interval)
            .field("header_name", &self.inner.header_name)
            .field("active_calls", &self.active_calls())
            .finish_non_exhaustive()
    }
}

impl SoapClient {
    /// Create a client with default settings
    pub fn new(wsdl: &str) -> Result<Self> {
        Self::builder(wsdl).build()
    }

    pub fn builder(wsdl: impl Into<String>) -> ClientBuilder {
        ClientBuilder::new(wsdl)
    }

    /// Call `method` with body parameters `params`
    pub async fn call(&self, method: &str, params: Params) -> Result<Response> {
        self.execute(Request::new(method, params)).await
    }

    /// Call the operation described by a caller type
    pub async fn call_with<T: ToParams + ?Sized>(&self, value: &T) -> Result<Response> {
        self.execute(Request::from_params(value)).await
    }

    /// Run the call pipeline for `request`
    pub async fn execute(&self, request: Request) -> Result<Response> {
        self.ensure_initialized().await;

        let state = self.inner.state.read().await;
        let _call = CallGuard::enter(&self.inner.active_calls);

        if let Some(err) = &state.load_error {
            return Err(Error::Description(Arc::clone(err)));
        }
        let description = state.description.as_ref().ok_or(Error::DescriptionMissing)?;
        if description.services.is_empty() {
            return Err(Error::NoServices);
        }

        let action = match description.soap_action(request.method()) {
            Some(action) => action.to_string(),
            None => format!("{}/{}", state.base_url, request.method()),
        };
        let endpoint = description.endpoint()?.to_string();

        let header_params = match request.header_params() {
            Some(overrides) => self.inner.header_params.merged(overrides),
            None => self.inner.header_params.clone(),
        };
        let payload = build_request_envelope(
            &state.base_url,
            self.inner.header_name.as_deref(),
            &header_params,
            &request,
        )?;

        debug!(
            method = request.method(),
            action = %action,
            endpoint = %endpoint,
            payload_bytes = payload.len(),
            "Sending SOAP request"
        );

        let http_request = HttpRequest {
            url: endpoint,
            soap_action: action,
            basic_auth: self.inner.credentials.clone().filter(Credentials::is_complete),
            body: payload.clone(),
        };

        let http_response = match self.inner.transport.post(http_request).await {
            Ok(response) => response,
            Err(err) => {
                warn!(method = request.method(), error = %err, "SOAP transport failure");
                return Err(ErrorWithPayload::new(err, payload).into());
            }
        };

        let mut response = Response::new(http_response.status, payload);
        if let Err(err) = decode_response_envelope(&http_response.body, &mut response) {
            warn!(
                method = request.method(),
                status = %http_response.status,
                error = %err,
                "Failed to decode SOAP response"
            );
            let payload = response.payload.clone();
            return Err(ErrorWithPayload::new(err, payload)
                .with_partial_response(response)
                .into());
        }

        debug!(
            method = request.method(),
            status = %response.status,
            body_bytes = response.body.len(),
            "Received SOAP response"
        );
        Ok(response)
    }

    /// Replace the WSDL locator and reload synchronously.
    ///
    /// Waits for in-flight calls and any running refresh, then loads under
    /// exclusive access. The load outcome is also what subsequent calls see.
    pub async fn set_wsdl(&self, wsdl: &str) -> Result<()> {
        let source = parse_locator(wsdl)?;

        let outcome = {
            let mut state = self.inner.state.write().await;
            state.source = source;
            self.inner.reload(&mut state).await;
            state.load_error.clone()
        };

        // the refresh task must still start if no call came first
        self.inner
            .initialized
            .get_or_init(|| async { self.start_refresh() })
            .await;

        match outcome {
            Some(err) => Err(Error::Description(err)),
            None => Ok(()),
        }
    }

    /// Snapshot of the installed description, if any
    pub async fn description(&self) -> Option<Arc<Description>> {
        self.inner.state.read().await.description.clone()
    }

    /// Target namespace of the last successful load, without trailing `/`
    pub async fn base_url(&self) -> String {
        self.inner.state.read().await.base_url.clone()
    }

    /// Number of calls currently between admission and completion
    pub fn active_calls(&self) -> usize {
        self.inner.active_calls.load(Ordering::SeqCst)
    }

    pub fn refresh_interval(&self) -> Duration {
        self.inner.refresh_interval
    }

    /// Load once, then start the refresh task when enabled
    async fn ensure_initialized(&self) {
        self.inner
            .initialized
            .get_or_init(|| async {
                {
                    let mut state = self.inner.state.write().await;
                    self.inner.reload(&mut state).await;
                }
                self.start_refresh();
            })
            .await;
    }

    fn start_refresh(&self) {
        let interval = self.inner.refresh_interval;
        if interval < MIN_REFRESH_INTERVAL {
            debug!(?interval, "Background WSDL refresh disabled");
            return;
        }

        info!(?interval, "Starting background WSDL refresh");
        tokio::spawn(refresh_loop(Arc::downgrade(&self.inner), interval));
    }
}

/// Reload the description every `interval` until the client is dropped
async fn refresh_loop(inner: Weak<Inner>, interval: Duration) {
    loop {
        tokio::time::sleep(interval).await;

        let Some(inner) = inner.upgrade() else {
            debug!("SOAP client dropped, stopping WSDL refresh");
            return;
        };

        debug!(
            active_calls = inner.active_calls.load(Ordering::SeqCst),
            "Refreshing WSDL definitions"
        );
        let mut state = inner.state.write().await;
        inner.reload(&mut state).await;
    }
}

/// Builder for configuring a [`SoapClient`]
pub struct ClientBuilder {
    wsdl: String,
    http_client: Option<reqwest::Client>,
    transport: Option<Arc<dyn Transport>>,
    loader: Option<Arc<dyn DescriptionLoader>>,
    credentials: Option<Credentials>,
    refresh_interval: Duration,
    header_name: Option<String>,
    header_params: HeaderParams,
    timeout: Duration,
    user_agent: String,
}

impl ClientBuilder {
    pub fn new(wsdl: impl Into<String>) -> Self {
        Self {
            wsdl: wsdl.into(),
            http_client: None,
            transport: None,
            loader: None,
            credentials: None,
            refresh_interval: Duration::ZERO,
            header_name: None,
            header_params: HeaderParams::new(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }

    /// Share a reqwest client for SOAP calls and WSDL fetches
    pub fn http_client(mut self, client: reqwest::Client) -> Self {
        self.http_client = Some(client);
        self
    }

    /// Use a custom transport for SOAP calls
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Use a custom description loader
    pub fn loader(mut self, loader: Arc<dyn DescriptionLoader>) -> Self {
        self.loader = Some(loader);
        self
    }

    /// HTTP basic credentials, sent only when both are non-empty
    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.credentials = Some(Credentials::new(username, password));
        self
    }

    /// Reload interval; below [`MIN_REFRESH_INTERVAL`] no refresh runs
    pub fn refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = interval;
        self
    }

    /// Element wrapping the header parameters
    pub fn header_name(mut self, name: impl Into<String>) -> Self {
        self.header_name = Some(name.into());
        self
    }

    /// Header parameters sent with every call
    pub fn header_params(mut self, params: HeaderParams) -> Self {
        self.header_params = params;
        self
    }

    /// Timeout of the default HTTP client
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// User-Agent of the default HTTP client
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Build the client. The locator is only checked for syntax.
    pub fn build(self) -> Result<SoapClient> {
        let source = parse_locator(&self.wsdl)?;

        let http = match self.http_client {
            Some(client) => client,
            None => reqwest::Client::builder()
                .user_agent(&self.user_agent)
                .timeout(self.timeout)
                .build()
                .context("Failed to build HTTP client")?,
        };

        let transport = self
            .transport
            .unwrap_or_else(|| Arc::new(http.clone()) as Arc<dyn Transport>);
        let loader = self
            .loader
            .unwrap_or_else(|| Arc::new(WsdlLoader::new(http)) as Arc<dyn DescriptionLoader>);

        Ok(SoapClient {
            inner: Arc::new(Inner {
                state: RwLock::new(DescriptionState {
                    source,
                    description: None,
                    load_error: None,
                    base_url: String::new(),
                }),
                initialized: OnceCell::new(),
                active_calls: AtomicUsize::new(0),
                transport,
                loader,
                credentials: self.credentials,
                header_name: self.header_name,
                header_params: self.header_params,
                refresh_interval: self.refresh_interval,
            }),
        })
    }
}
