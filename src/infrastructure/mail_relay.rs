//! HTTP client for the outbound mail relay.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Serialize;
use tokio::sync::Mutex;

use crate::domain::errors::DomainError;
use crate::domain::notification::{Audience, OutgoingEmail};
use crate::domain::ports::MailSender;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayState {
    Uninitialized,
    Initializing,
    Ready,
    Failed,
}

#[derive(Debug, Serialize)]
struct RelayRequest<'a> {
    to_email: &'a str,
    to_name: &'a str,
    subject: &'a str,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    html_message: Option<&'a str>,
    #[serde(flatten)]
    metadata: &'a BTreeMap<String, String>,
}

impl<'a> From<&'a OutgoingEmail> for RelayRequest<'a> {
    fn from(email: &'a OutgoingEmail) -> Self {
        Self {
            to_email: &email.to_email,
            to_name: &email.to_name,
            subject: &email.subject,
            message: &email.message,
            html_message: email.html_message.as_deref(),
            metadata: &email.metadata,
        }
    }
}

fn endpoint(audience: Audience) -> &'static str {
    match audience {
        Audience::Customer => "/send-email",
        Audience::Supplier => "/send-supplier-email",
    }
}

pub struct MailRelayClient {
    http: reqwest::Client,
    base_url: String,
    state: Mutex<RelayState>,
}

impl MailRelayClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, DomainError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DomainError::Internal(format!("mail relay client: {e}")))?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            state: Mutex::new(RelayState::Uninitialized),
        })
    }

    pub async fn state(&self) -> RelayState {
        *self.state.lock().await
    }

    /// Check `/health` and record whether the relay is usable. Concurrent
    /// callers wait for the check already in flight.
    pub async fn initialize(&self) -> RelayState {
        let mut state = self.state.lock().await;
        if *state == RelayState::Ready {
            return *state;
        }
        *state = RelayState::Initializing;

        let url = format!("{}/health", self.base_url);
        *state = match self.http.get(&url).send().await {
            Ok(resp) if resp.status().is_success() => {
                log::info!("Mail relay at {} is ready", self.base_url);
                RelayState::Ready
            }
            Ok(resp) => {
                log::warn!("Mail relay health check returned {}", resp.status());
                RelayState::Failed
            }
            Err(e) => {
                log::warn!("Mail relay health check failed: {}", e);
                RelayState::Failed
            }
        };
        *state
    }

    async fn mark_failed(&self) {
        *self.state.lock().await = RelayState::Failed;
    }
}

#[async_trait]
impl MailSender for MailRelayClient {
    async fn send(&self, email: &OutgoingEmail) -> Result<(), DomainError> {
        if self.state().await != RelayState::Ready && self.initialize().await != RelayState::Ready {
            return Err(DomainError::Unavailable(format!(
                "mail relay at {} is not ready",
                self.base_url
            )));
        }

        let url = format!("{}{}", self.base_url, endpoint(email.audience));
        let resp = match self.http.post(&url).json(&RelayRequest::from(email)).send().await {
            Ok(resp) => resp,
            Err(e) => {
                self.mark_failed().await;
                return Err(DomainError::Unavailable(format!("mail relay: {e}")));
            }
        };

        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }
        let body = resp.text().await.unwrap_or_default();
        if status.is_client_error() && status != StatusCode::TOO_MANY_REQUESTS {
            Err(DomainError::Rejected(format!("mail relay returned {status}: {body}")))
        } else {
            self.mark_failed().await;
            Err(DomainError::Unavailable(format!("mail relay returned {status}: {body}")))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex as StdMutex};

    use actix_web::{web, App, HttpResponse, HttpServer};
    use serde_json::Value;

    use super::*;

    type Received = Arc<StdMutex<Vec<(String, Value)>>>;

    fn email(audience: Audience, subject: &str) -> OutgoingEmail {
        OutgoingEmail {
            audience,
            to_email: "grocer@example.com".into(),
            to_name: "Green Grocer".into(),
            subject: subject.into(),
            message: "hello".into(),
            html_message: None,
            metadata: BTreeMap::from([("order_number".to_string(), "ABCD1234".to_string())]),
        }
    }

    async fn record(
        path: &'static str,
        received: web::Data<Received>,
        body: web::Json<Value>,
    ) -> HttpResponse {
        let body = body.into_inner();
        let reject = body["subject"] == "reject";
        received.lock().unwrap().push((path.to_string(), body));
        if reject {
            HttpResponse::BadRequest().body("bad recipient")
        } else {
            HttpResponse::Ok().finish()
        }
    }

    fn fake_relay() -> (String, Received) {
        let received: Received = Arc::new(StdMutex::new(Vec::new()));
        let data = web::Data::new(received.clone());
        let server = HttpServer::new(move || {
            App::new()
                .app_data(data.clone())
                .route("/health", web::get().to(|| async { HttpResponse::Ok().finish() }))
                .route(
                    "/send-email",
                    web::post().to(|d: web::Data<Received>, b: web::Json<Value>| {
                        record("/send-email", d, b)
                    }),
                )
                .route(
                    "/send-supplier-email",
                    web::post().to(|d: web::Data<Received>, b: web::Json<Value>| {
                        record("/send-supplier-email", d, b)
                    }),
                )
        })
        .workers(1)
        .bind(("127.0.0.1", 0))
        .unwrap();
        let addr = server.addrs()[0];
        actix_web::rt::spawn(server.run());
        (format!("http://{addr}"), received)
    }

    #[test]
    fn payload_flattens_metadata() {
        let email = email(Audience::Supplier, "New order");
        let json = serde_json::to_value(RelayRequest::from(&email)).unwrap();
        assert_eq!(json["to_email"], "grocer@example.com");
        assert_eq!(json["order_number"], "ABCD1234");
        assert!(json.get("html_message").is_none());
        assert!(json.get("metadata").is_none());
    }

    #[actix_web::test]
    async fn unreachable_relay_fails_initialization() {
        let client = MailRelayClient::new("http://127.0.0.1:1", Duration::from_secs(1)).unwrap();
        assert_eq!(client.state().await, RelayState::Uninitialized);

        let err = client.send(&email(Audience::Customer, "hi")).await.unwrap_err();

        assert!(matches!(err, DomainError::Unavailable(_)));
        assert_eq!(client.state().await, RelayState::Failed);
    }

    #[actix_web::test]
    async fn mail_is_routed_by_audience() {
        let (url, received) = fake_relay();
        let client = MailRelayClient::new(&url, Duration::from_secs(5)).unwrap();

        assert_eq!(client.initialize().await, RelayState::Ready);
        client.send(&email(Audience::Customer, "c")).await.unwrap();
        client.send(&email(Audience::Supplier, "s")).await.unwrap();

        let received = received.lock().unwrap().clone();
        assert_eq!(received.len(), 2);
        assert_eq!(received[0].0, "/send-email");
        assert_eq!(received[1].0, "/send-supplier-email");
        assert_eq!(received[1].1["order_number"], "ABCD1234");
    }

    #[actix_web::test]
    async fn client_errors_are_rejections() {
        let (url, _received) = fake_relay();
        let client = MailRelayClient::new(&url, Duration::from_secs(5)).unwrap();

        let err = client.send(&email(Audience::Supplier, "reject")).await.unwrap_err();

        assert!(matches!(err, DomainError::Rejected(_)));
        assert_eq!(client.state().await, RelayState::Ready);
    }
}
