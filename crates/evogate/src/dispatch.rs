//! Request dispatch against a gateway instance.
//!
//! Sends build the per-kind body, post it to the instance's endpoint, and
//! interpret the response status. Sends are never retried: a duplicate
//! delivery is worse than a surfaced failure. Reads (connection state,
//! group listing, number lookup) get exactly one retry with a fixed short
//! backoff on transient failures.

use std::future::Future;
use std::time::Duration;

use reqwest::StatusCode;
use tracing::{debug, warn};

use crate::cache::{ConnectionState, GroupSummary};
use crate::error::{DispatchResult, Error, ErrorKind};
use crate::instance::InstanceHandle;
use crate::wire::{
    CheckNumbersBody, ConnectionStateResponse, ENDPOINT_CHECK_NUMBERS, ENDPOINT_CONNECTION_STATE,
    ENDPOINT_FETCH_ALL_GROUPS, GroupInfo, MessageBody, NumberInfo, SendResponse,
};

/// Backoff between the first failed read and its single retry.
const READ_RETRY_BACKOFF: Duration = Duration::from_millis(500);

fn instance_url(handle: &InstanceHandle, endpoint: &str) -> String {
    format!(
        "{}{}/{}",
        handle.config.base_url(),
        endpoint,
        handle.config.id
    )
}

// ============================================================================
// Sends
// ============================================================================

/// Post a message body to its endpoint and interpret the gateway's answer.
///
/// Gateway-level outcomes (including 4xx/5xx) come back as a
/// [`DispatchResult`]; transport failures surface as [`Error::Network`].
pub(crate) async fn send_message(
    handle: &InstanceHandle,
    body: &MessageBody,
) -> Result<DispatchResult, Error> {
    let kind = body.kind();
    let url = instance_url(handle, kind.endpoint());
    debug!(instance = %handle.id(), endpoint = kind.endpoint(), "dispatching message");

    let response = handle
        .http
        .post(&url)
        .header("apikey", &handle.config.api_key)
        .json(body)
        .send()
        .await?;

    let status = response.status();
    let text = response.text().await.unwrap_or_default();
    let result = interpret_send_response(status, &text);
    if !result.success {
        warn!(
            instance = %handle.id(),
            endpoint = kind.endpoint(),
            status = status.as_u16(),
            "gateway refused message"
        );
    }
    Ok(result)
}

/// Map a send response to its outcome. 2xx is accepted even when the body
/// carries no parsable message id; 4xx is a permanent rejection; anything
/// else is a transient gateway failure.
pub(crate) fn interpret_send_response(status: StatusCode, body: &str) -> DispatchResult {
    if status.is_success() {
        let message_id = serde_json::from_str::<SendResponse>(body)
            .ok()
            .and_then(|r| r.key)
            .and_then(|k| k.id);
        return DispatchResult::accepted(message_id);
    }
    let detail = if body.trim().is_empty() {
        format!("status {}", status.as_u16())
    } else {
        body.trim().to_string()
    };
    if status.is_client_error() {
        DispatchResult::failed(ErrorKind::Rejected, detail)
    } else {
        DispatchResult::failed(ErrorKind::Transient, detail)
    }
}

// ============================================================================
// Reads
// ============================================================================

/// Run a read operation, retrying once after a fixed backoff if the first
/// attempt fails transiently (5xx or transport error).
pub(crate) async fn with_read_retry<T, F, Fut>(mut op: F) -> Result<T, Error>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, Error>>,
{
    match op().await {
        Ok(value) => Ok(value),
        Err(e) if e.is_transient() => {
            debug!(error = %e, "read failed transiently, retrying once");
            tokio::time::sleep(READ_RETRY_BACKOFF).await;
            op().await
        }
        Err(e) => Err(e),
    }
}

async fn read_json<T: serde::de::DeserializeOwned>(
    handle: &InstanceHandle,
    request: reqwest::RequestBuilder,
) -> Result<T, Error> {
    let response = request.header("apikey", &handle.config.api_key).send().await?;
    let status = response.status();
    let text = response.text().await.unwrap_or_default();
    if !status.is_success() {
        return Err(Error::Gateway {
            status: status.as_u16(),
            detail: text.trim().to_string(),
        });
    }
    serde_json::from_str(&text).map_err(|e| Error::Gateway {
        status: status.as_u16(),
        detail: format!("unparsable response body: {e}"),
    })
}

/// Fetch the instance's connection state.
pub(crate) async fn fetch_connection_state(
    handle: &InstanceHandle,
) -> Result<ConnectionState, Error> {
    let url = instance_url(handle, ENDPOINT_CONNECTION_STATE);
    let url = url.as_str();
    with_read_retry(move || async move {
        let response: ConnectionStateResponse = read_json(handle, handle.http.get(url)).await?;
        let state = response
            .instance
            .and_then(|i| i.state)
            .map(|s| ConnectionState::from_wire(&s))
            .unwrap_or(ConnectionState::Unknown);
        Ok(state)
    })
    .await
}

/// Fetch the instance's group directory.
pub(crate) async fn fetch_groups(handle: &InstanceHandle) -> Result<Vec<GroupSummary>, Error> {
    let url = format!(
        "{}?getParticipants=false",
        instance_url(handle, ENDPOINT_FETCH_ALL_GROUPS)
    );
    let url = url.as_str();
    with_read_retry(move || async move {
        let groups: Vec<GroupInfo> = read_json(handle, handle.http.get(url)).await?;
        Ok(groups
            .into_iter()
            .map(|g| GroupSummary {
                name: g.subject.unwrap_or_default(),
                participant_count: g.size,
                id: g.id,
            })
            .collect())
    })
    .await
}

/// Look up which of the given numbers are registered on WhatsApp.
pub(crate) async fn lookup_numbers(
    handle: &InstanceHandle,
    numbers: &[String],
) -> Result<Vec<NumberInfo>, Error> {
    let url = instance_url(handle, ENDPOINT_CHECK_NUMBERS);
    let body = CheckNumbersBody {
        numbers: numbers.to_vec(),
    };
    let url = url.as_str();
    let body = &body;
    with_read_retry(move || async move {
        read_json(handle, handle.http.post(url).json(body)).await
    })
    .await
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[test]
    fn success_with_key_yields_message_id() {
        let result = interpret_send_response(
            StatusCode::CREATED,
            r#"{"key":{"remoteJid":"5551234567@s.whatsapp.net","id":"BAE5F4A0"},"status":"PENDING"}"#,
        );
        assert!(result.success);
        assert_eq!(result.message_id.as_deref(), Some("BAE5F4A0"));
        assert!(result.error_kind.is_none());
    }

    #[test]
    fn success_without_parsable_body_is_accepted() {
        let result = interpret_send_response(StatusCode::OK, "not json at all");
        assert!(result.success);
        assert!(result.message_id.is_none());
    }

    #[test]
    fn client_error_is_rejected() {
        let result = interpret_send_response(StatusCode::BAD_REQUEST, r#"{"message":"bad"}"#);
        assert!(!result.success);
        assert_eq!(result.error_kind, Some(ErrorKind::Rejected));
        assert!(result.detail.is_some());
    }

    #[test]
    fn server_error_is_transient() {
        let result = interpret_send_response(StatusCode::SERVICE_UNAVAILABLE, "");
        assert!(!result.success);
        assert_eq!(result.error_kind, Some(ErrorKind::Transient));
        assert_eq!(result.detail.as_deref(), Some("status 503"));
    }

    #[tokio::test(start_paused = true)]
    async fn read_retry_retries_transient_exactly_once() {
        let attempts = AtomicUsize::new(0);
        let attempts = &attempts;
        let result: Result<u32, Error> = with_read_retry(move || async move {
            if attempts.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(Error::Gateway {
                    status: 503,
                    detail: "busy".to_string(),
                })
            } else {
                Ok(7)
            }
        })
        .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn read_retry_gives_up_after_second_transient_failure() {
        let attempts = AtomicUsize::new(0);
        let attempts = &attempts;
        let result: Result<u32, Error> = with_read_retry(move || async move {
            attempts.fetch_add(1, Ordering::SeqCst);
            Err(Error::Gateway {
                status: 500,
                detail: "still down".to_string(),
            })
        })
        .await;
        assert!(matches!(result, Err(Error::Gateway { status: 500, .. })));
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn read_retry_skips_permanent_errors() {
        let attempts = AtomicUsize::new(0);
        let attempts = &attempts;
        let result: Result<u32, Error> = with_read_retry(move || async move {
            attempts.fetch_add(1, Ordering::SeqCst);
            Err(Error::Gateway {
                status: 404,
                detail: "no such instance".to_string(),
            })
        })
        .await;
        assert!(matches!(result, Err(Error::Gateway { status: 404, .. })));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }
}
