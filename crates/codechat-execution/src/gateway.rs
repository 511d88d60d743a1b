//! Jupyter Kernel Gateway transport.
//!
//! Kernel lifecycle goes over the REST API; the submission and its replies
//! travel over the kernel's WebSocket channels endpoint.

use async_trait::async_trait;
use codechat_core::error::{CodechatError, Result};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use crate::backend::BackendEndpoint;
use crate::protocol::{self, BackendMessage, KernelFrame};
use crate::session::{KernelClient, KernelSession};

type ChannelStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Deserialize)]
struct KernelInfo {
    id: String,
}

/// Creates one kernel per session on a Jupyter Kernel Gateway.
pub struct JupyterGatewayClient {
    http: reqwest::Client,
    kernel_name: String,
}

impl JupyterGatewayClient {
    pub fn new(kernel_name: impl Into<String>) -> Result<Self> {
        // The gateway is always on loopback; proxy settings must not apply
        let http = reqwest::Client::builder()
            .no_proxy()
            .build()
            .map_err(|e| CodechatError::internal(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            http,
            kernel_name: kernel_name.into(),
        })
    }

    async fn create_kernel(&self, endpoint: &BackendEndpoint) -> Result<String> {
        let response = self
            .http
            .post(format!("{}/api/kernels", endpoint.http_base()))
            .header(reqwest::header::AUTHORIZATION, endpoint.authorization())
            .json(&serde_json::json!({ "name": self.kernel_name }))
            .send()
            .await
            .map_err(|e| CodechatError::transport(format!("kernel create failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CodechatError::transport(format!(
                "kernel create rejected with {}",
                status
            )));
        }

        let info: KernelInfo = response
            .json()
            .await
            .map_err(|e| CodechatError::transport(format!("invalid kernel create reply: {}", e)))?;
        Ok(info.id)
    }

    async fn connect_channels(
        endpoint: &BackendEndpoint,
        kernel_id: &str,
    ) -> Result<ChannelStream> {
        let url = format!("{}/api/kernels/{}/channels", endpoint.ws_base(), kernel_id);
        let mut request = url
            .into_client_request()
            .map_err(|e| CodechatError::transport(format!("invalid channels url: {}", e)))?;
        let authorization = HeaderValue::from_str(&endpoint.authorization())
            .map_err(|e| CodechatError::transport(format!("invalid credential header: {}", e)))?;
        request.headers_mut().insert("authorization", authorization);

        let (stream, _response) = connect_async(request)
            .await
            .map_err(|e| CodechatError::transport(format!("channels connect failed: {}", e)))?;
        Ok(stream)
    }
}

#[async_trait]
impl KernelClient for JupyterGatewayClient {
    async fn open_session(&self, endpoint: &BackendEndpoint) -> Result<Box<dyn KernelSession>> {
        let kernel_id = self.create_kernel(endpoint).await?;
        tracing::debug!("[Session] Created kernel {}", kernel_id);

        let mut session = GatewaySession {
            http: self.http.clone(),
            endpoint: endpoint.clone(),
            kernel_id,
            client_session: uuid::Uuid::new_v4().to_string(),
            stream: None,
            request_id: None,
            finished: false,
        };

        match Self::connect_channels(endpoint, &session.kernel_id).await {
            Ok(stream) => {
                session.stream = Some(stream);
                Ok(Box::new(session))
            }
            Err(e) => {
                if let Err(cleanup) = session.shutdown().await {
                    tracing::warn!("[Session] Failed to delete orphaned kernel: {}", cleanup);
                }
                Err(e)
            }
        }
    }
}

/// A kernel on the gateway plus its open channels connection.
pub struct GatewaySession {
    http: reqwest::Client,
    endpoint: BackendEndpoint,
    kernel_id: String,
    client_session: String,
    stream: Option<ChannelStream>,
    request_id: Option<String>,
    finished: bool,
}

#[async_trait]
impl KernelSession for GatewaySession {
    fn id(&self) -> &str {
        &self.kernel_id
    }

    async fn execute(&mut self, code: &str) -> Result<()> {
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| CodechatError::transport("session is closed"))?;

        let msg_id = uuid::Uuid::new_v4().to_string();
        let request = protocol::execute_request(&msg_id, &self.client_session, code);
        stream
            .send(Message::Text(request.to_string().into()))
            .await
            .map_err(|e| CodechatError::transport(format!("failed to submit code: {}", e)))?;

        self.request_id = Some(msg_id);
        self.finished = false;
        Ok(())
    }

    async fn next_message(&mut self) -> Result<Option<BackendMessage>> {
        if self.finished {
            return Ok(None);
        }
        let request_id = self
            .request_id
            .as_deref()
            .ok_or_else(|| CodechatError::internal("next_message called before execute"))?;
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| CodechatError::transport("session is closed"))?;

        loop {
            let frame = match stream.next().await {
                Some(Ok(Message::Text(text))) => text,
                Some(Ok(Message::Close(_))) | None => {
                    return Err(CodechatError::transport(
                        "channels closed before the submission completed",
                    ));
                }
                Some(Ok(_)) => continue,
                Some(Err(e)) => {
                    return Err(CodechatError::transport(format!("channels read failed: {}", e)));
                }
            };

            match protocol::decode_frame(frame.as_str(), request_id) {
                Some(KernelFrame::Message(message)) => return Ok(Some(message)),
                Some(KernelFrame::Idle) => {
                    self.finished = true;
                    return Ok(None);
                }
                Some(KernelFrame::Ignored) => {}
                None => tracing::debug!("[Session] Skipping undecodable frame"),
            }
        }
    }

    async fn shutdown(&mut self) -> Result<()> {
        if let Some(mut stream) = self.stream.take() {
            if let Err(e) = stream.close(None).await {
                tracing::debug!("[Session] Channels close failed: {}", e);
            }
        }

        let response = self
            .http
            .delete(format!(
                "{}/api/kernels/{}",
                self.endpoint.http_base(),
                self.kernel_id
            ))
            .header(reqwest::header::AUTHORIZATION, self.endpoint.authorization())
            .send()
            .await
            .map_err(|e| CodechatError::transport(format!("kernel delete failed: {}", e)))?;

        let status = response.status();
        if status.is_success() || status == reqwest::StatusCode::NOT_FOUND {
            tracing::debug!("[Session] Deleted kernel {}", self.kernel_id);
            Ok(())
        } else {
            Err(CodechatError::transport(format!(
                "kernel delete rejected with {}",
                status
            )))
        }
    }
}
