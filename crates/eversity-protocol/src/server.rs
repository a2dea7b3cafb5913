//! Integration side: answers protocol requests with a local [`Provider`].

use std::future::Future;
use std::path::Path;
use std::sync::Arc;

use eversity_providers::{Provider, ProviderError};
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, error, info, warn};

use crate::error::{ProtocolError, ProtocolResult};
use crate::framing::{FrameReader, FrameWriter};
use crate::types::{Envelope, Request, Response};

/// Answers requests on one stream until the peer closes it.
///
/// Every failure, including an unparsable request or a foreign protocol
/// version, is sent back as an error response. Only transport errors end
/// the loop early.
pub async fn serve_connection<S>(provider: &dyn Provider, mut stream: S) -> ProtocolResult<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    loop {
        let (request_id, response) =
            match FrameReader::new(&mut stream).read_message::<Envelope<Request>>().await {
                Ok(Some(envelope)) if !envelope.is_compatible() => {
                    let err = ProtocolError::UnsupportedVersion(envelope.protocol_version);
                    (envelope.request_id, Response::error(&ProviderError::from(err)))
                }
                Ok(Some(envelope)) => {
                    debug!(request_id = %envelope.request_id, request = envelope.payload.name(), "Handling request");
                    (envelope.request_id, handle(provider, envelope.payload).await)
                }
                Ok(None) => return Ok(()),
                Err(err @ ProtocolError::Serialization(_)) => {
                    (String::new(), Response::error(&ProviderError::from(err)))
                }
                Err(err) => return Err(err),
            };

        let reply = Envelope::response(request_id, response);
        let mut writer = FrameWriter::new(&mut stream);
        match writer.write_message(&reply).await {
            // Nothing was written; answer the same request with the failure.
            Err(err @ (ProtocolError::MessageTooLarge { .. } | ProtocolError::Serialization(_))) => {
                warn!(request_id = %reply.request_id, error = %err, "Response could not be encoded");
                let err = ProviderError::from(err).with_provider(&provider.describe().id);
                writer
                    .write_message(&Envelope::response(reply.request_id, Response::error(&err)))
                    .await?;
            }
            result => result?,
        }
    }
}

async fn handle(provider: &dyn Provider, request: Request) -> Response {
    let descriptor = provider.describe();
    let result = match request {
        Request::Describe => return Response::Descriptor { descriptor },
        Request::Ping => return Response::Pong,
        Request::Fetch { query } => {
            let capability = query.capability();
            if descriptor.supports(&capability) {
                provider
                    .fetch(query)
                    .await
                    .map(|entities| Response::Entities { entities })
            } else {
                Err(undeclared(&capability))
            }
        }
        Request::Submit { submission } => {
            let capability = submission.capability();
            if descriptor.supports(&capability) {
                provider
                    .submit(submission)
                    .await
                    .map(|acknowledgement| Response::Acknowledgement { acknowledgement })
            } else {
                Err(undeclared(&capability))
            }
        }
    };

    result.unwrap_or_else(|err| {
        let err = ProviderError::classify(err).with_provider(&descriptor.id);
        debug!(error = %err, "Request failed");
        Response::error(&err)
    })
}

fn undeclared(capability: &eversity_core::Capability) -> ProviderError {
    ProviderError::capability_mismatch(format!("`{capability}` is not declared by this provider"))
}

/// Binds a Unix socket, removing a stale socket file left by a dead process.
#[cfg(unix)]
pub async fn bind_unix(path: &Path) -> ProtocolResult<tokio::net::UnixListener> {
    if path.exists() {
        match tokio::net::UnixStream::connect(path).await {
            Ok(_) => {
                return Err(ProtocolError::Io(std::io::Error::new(
                    std::io::ErrorKind::AddrInUse,
                    format!("{} is served by another process", path.display()),
                )));
            }
            Err(_) => {
                info!(path = %path.display(), "Removing stale socket");
                std::fs::remove_file(path)?;
            }
        }
    }
    let listener = tokio::net::UnixListener::bind(path)?;
    info!(path = %path.display(), "Socket server listening");
    Ok(listener)
}

/// Serves `provider` on every accepted connection until `shutdown` resolves.
#[cfg(unix)]
pub async fn serve_unix<F>(
    listener: tokio::net::UnixListener,
    provider: Arc<dyn Provider>,
    shutdown: F,
) -> ProtocolResult<()>
where
    F: Future<Output = ()>,
{
    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            () = &mut shutdown => {
                info!("Socket server shutting down");
                return Ok(());
            }
            accepted = listener.accept() => match accepted {
                Ok((stream, _addr)) => {
                    let provider = Arc::clone(&provider);
                    tokio::spawn(async move {
                        if let Err(err) = serve_connection(provider.as_ref(), stream).await {
                            warn!(error = %err, "Connection ended with an error");
                        }
                    });
                }
                Err(err) => error!(error = %err, "Failed to accept connection"),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use eversity_core::{Capability, GroupId, Name, Person, PersonId, ProviderDescriptor, ProviderId};
    use eversity_providers::{BoxFuture, Entity, EntityQuery, ProviderErrorKind, ProviderResult};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    struct Timetables;

    impl Provider for Timetables {
        fn describe(&self) -> ProviderDescriptor {
            ProviderDescriptor::new(ProviderId::new("timetables").unwrap(), "Timetables", "1", "test")
                .with_capability(Capability::FETCH_TIMETABLE)
        }

        fn fetch(&self, _query: EntityQuery) -> BoxFuture<'_, ProviderResult<Vec<Entity>>> {
            Box::pin(async { Err(ProviderError::authorization("session expired")) })
        }
    }

    /// Answers every people query with more than a frame can carry.
    struct Oversized;

    impl Provider for Oversized {
        fn describe(&self) -> ProviderDescriptor {
            ProviderDescriptor::new(ProviderId::new("oversized").unwrap(), "Oversized", "1", "test")
                .with_capability(Capability::FETCH_PEOPLE)
        }

        fn fetch(&self, _query: EntityQuery) -> BoxFuture<'_, ProviderResult<Vec<Entity>>> {
            Box::pin(async {
                let first = "x".repeat(1000);
                Ok((1..=2000)
                    .map(|id| {
                        let name = Name::new(first.as_str(), "Ivanova").unwrap();
                        Entity::Person(Person::new(PersonId::new(id).unwrap(), name))
                    })
                    .collect())
            })
        }
    }

    async fn roundtrip(client: &mut tokio::io::DuplexStream, frame: &[u8]) -> Envelope<Response> {
        client.write_all(frame).await.unwrap();
        FrameReader::new(client).read_message().await.unwrap().unwrap()
    }

    fn error_code(response: &Response) -> &str {
        match response {
            Response::Error(payload) => &payload.code,
            other => panic!("expected an error, got {}", other.name()),
        }
    }

    #[tokio::test]
    async fn answers_until_eof() {
        let (mut client, server) = tokio::io::duplex(16 * 1024);
        let task = tokio::spawn(async move { serve_connection(&Timetables, server).await });

        let ping = crate::encode_message(&Envelope::request("1", Request::Ping)).unwrap();
        let response = roundtrip(&mut client, &ping).await;
        assert_eq!(response.request_id, "1");
        assert_eq!(response.payload, Response::Pong);

        let describe = crate::encode_message(&Envelope::request("2", Request::Describe)).unwrap();
        let response = roundtrip(&mut client, &describe).await;
        assert!(matches!(response.payload, Response::Descriptor { .. }));

        drop(client);
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn failures_become_error_payloads() {
        let (mut client, server) = tokio::io::duplex(16 * 1024);
        tokio::spawn(async move { serve_connection(&Timetables, server).await });

        let fetch = |id: &str, query| {
            crate::encode_message(&Envelope::request(id, Request::Fetch { query })).unwrap()
        };

        let response = roundtrip(
            &mut client,
            &fetch("1", EntityQuery::Timetable { group: GroupId::new(1).unwrap() }),
        )
        .await;
        assert_eq!(error_code(&response.payload), "authorization");

        let response = roundtrip(&mut client, &fetch("2", EntityQuery::People { ids: vec![] })).await;
        assert_eq!(error_code(&response.payload), "capability_mismatch");
    }

    #[tokio::test]
    async fn bad_frames_do_not_end_the_connection() {
        let (mut client, server) = tokio::io::duplex(16 * 1024);
        tokio::spawn(async move { serve_connection(&Timetables, server).await });

        let garbage = b"{not json";
        let mut frame = (garbage.len() as u32).to_be_bytes().to_vec();
        frame.extend_from_slice(garbage);
        let response = roundtrip(&mut client, &frame).await;
        assert_eq!(response.request_id, "");
        assert_eq!(error_code(&response.payload), "data_validation");

        let mut future = Envelope::request("v2", Request::Ping);
        future.protocol_version = "2".into();
        let response = roundtrip(&mut client, &crate::encode_message(&future).unwrap()).await;
        assert_eq!(response.request_id, "v2");
        assert_eq!(error_code(&response.payload), "capability_mismatch");

        let ping = crate::encode_message(&Envelope::request("3", Request::Ping)).unwrap();
        assert_eq!(roundtrip(&mut client, &ping).await.payload, Response::Pong);
    }

    #[tokio::test]
    async fn oversized_responses_are_data_errors() {
        let (mut client, server) = tokio::io::duplex(16 * 1024);
        tokio::spawn(async move { serve_connection(&Oversized, server).await });

        let fetch = Envelope::request(
            "big",
            Request::Fetch {
                query: EntityQuery::People { ids: vec![] },
            },
        );
        let response = roundtrip(&mut client, &crate::encode_message(&fetch).unwrap()).await;
        assert_eq!(response.request_id, "big");
        assert_eq!(error_code(&response.payload), "data_validation");
        let Response::Error(payload) = &response.payload else {
            unreachable!();
        };
        assert_eq!(payload.provider.as_ref().map(ProviderId::as_str), Some("oversized"));

        let ping = crate::encode_message(&Envelope::request("after", Request::Ping)).unwrap();
        assert_eq!(roundtrip(&mut client, &ping).await.payload, Response::Pong);
    }

    #[tokio::test]
    async fn empty_frame_ends_the_connection() {
        let (mut client, server) = tokio::io::duplex(1024);
        let task = tokio::spawn(async move { serve_connection(&Timetables, server).await });
        client.write_all(&0u32.to_be_bytes()).await.unwrap();

        let result = task.await.unwrap();
        assert!(matches!(result, Err(ProtocolError::EmptyMessage)));
        let mut rest = Vec::new();
        client.read_to_end(&mut rest).await.unwrap();
        assert!(rest.is_empty());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn serves_a_unix_socket() {
        use crate::client::{RemoteProvider, UnixConnector};

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("provider.sock");

        let listener = bind_unix(&path).await.unwrap();
        let (stop, stopped) = tokio::sync::oneshot::channel::<()>();
        let server = tokio::spawn(serve_unix(listener, Arc::new(Timetables), async move {
            let _ = stopped.await;
        }));

        let remote = RemoteProvider::connect(
            UnixConnector::new(&path),
            std::time::Duration::from_secs(5),
        )
        .await
        .unwrap();
        assert_eq!(remote.describe().id.as_str(), "timetables");
        let err = remote
            .fetch(EntityQuery::Timetable { group: GroupId::new(1).unwrap() })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ProviderErrorKind::Authorization);

        assert!(bind_unix(&path).await.is_err());

        stop.send(()).unwrap();
        server.await.unwrap().unwrap();
    }
}
