//! Single-shot OAuth callback listener

use super::{AuthError, AuthOutcome, AuthResult};
use axum::{
    extract::{Query, State},
    response::Html,
    routing::get,
    Router,
};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::{TcpListener, ToSocketAddrs};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

/// How long in-flight connections get to finish after the outcome is known
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Moves the token from the URL fragment into the query string so the
/// server can see it.
const REDIRECT_SCRIPT: &str = r##"<script type="text/javascript">
if (window.location.hash) {
    window.location = window.location.href.toString().replace("#", "?");
}
</script>"##;

/// Local HTTP listener that waits for one OAuth redirect
pub struct CallbackListener {
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl CallbackListener {
    pub async fn bind(addr: impl ToSocketAddrs) -> AuthResult<Self> {
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        info!("Login callback listening on {}", local_addr);
        Ok(Self {
            listener,
            local_addr,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Redirect URI to register with the login dialog
    pub fn redirect_uri(&self) -> String {
        format!("http://localhost:{}/", self.local_addr.port())
    }

    /// Serve callbacks until the first terminal one, then shut down.
    ///
    /// Requests without a query get the fragment-rewriting page and do not
    /// count as terminal.
    pub async fn wait_for_outcome(self, timeout: Duration) -> AuthResult<AuthOutcome> {
        let (outcome_tx, mut outcome_rx) = mpsc::channel::<AuthOutcome>(1);
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let app = Router::new()
            .route("/", get(callback_handler))
            .with_state(outcome_tx);

        let listener = self.listener;
        let mut server = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.await;
                })
                .await
        });

        let received = tokio::time::timeout(timeout, outcome_rx.recv()).await;
        let _ = shutdown_tx.send(());

        match tokio::time::timeout(SHUTDOWN_GRACE, &mut server).await {
            Ok(Ok(Ok(()))) => debug!("Login callback listener stopped"),
            Ok(Ok(Err(e))) => warn!("Login callback listener failed: {}", e),
            Ok(Err(e)) => warn!("Login callback listener task failed: {}", e),
            Err(_) => {
                warn!("Login callback listener did not stop within {:?}", SHUTDOWN_GRACE);
                server.abort();
            }
        }

        match received {
            Ok(Some(outcome)) => Ok(outcome),
            Ok(None) => Err(AuthError::Closed),
            Err(_) => Err(AuthError::Timeout(timeout)),
        }
    }
}

async fn callback_handler(
    State(outcomes): State<mpsc::Sender<AuthOutcome>>,
    Query(params): Query<HashMap<String, String>>,
) -> Html<String> {
    let Some(outcome) = classify(&params) else {
        debug!("Serving fragment redirect page");
        return Html(page("Redirect", REDIRECT_SCRIPT));
    };

    let body = match &outcome {
        AuthOutcome::Token(_) => page("Thank You!", "You may now close your browser."),
        AuthOutcome::Denied(reason) if reason == "user_denied" => page(
            "Error",
            "You must log in for the software to work.<br/>\
             This software does not store any user names or passwords.",
        ),
        AuthOutcome::Denied(_) => page("Error", "Sorry! An error has occurred. Please try again."),
    };

    if outcomes.try_send(outcome).is_err() {
        debug!("Login already completed, ignoring callback");
    }
    Html(body)
}

/// `None` for a bare request, otherwise the outcome the query describes
fn classify(params: &HashMap<String, String>) -> Option<AuthOutcome> {
    if params.is_empty() {
        return None;
    }

    if let Some(token) = params.get("access_token").filter(|t| !t.is_empty()) {
        return Some(AuthOutcome::Token(token.clone()));
    }

    let reason = params
        .get("error_reason")
        .or_else(|| params.get("error"))
        .cloned()
        .unwrap_or_else(|| {
            let mut keys: Vec<&str> = params.keys().map(String::as_str).collect();
            keys.sort_unstable();
            format!("unknown error: unexpected parameters {:?}", keys)
        });
    Some(AuthOutcome::Denied(reason))
}

fn page(title: &str, body: &str) -> String {
    format!(
        "<html>\n<head>\n<title>{}</title>\n</head>\n\n<body>\n{}\n</body>\n\n</html>\n",
        title, body
    )
}
