//! Client side: a [`Provider`] that forwards calls to an out-of-process
//! integration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use eversity_core::{ProviderDescriptor, Validate};
use eversity_providers::{
    Acknowledgement, BoxFuture, Entity, EntityQuery, Provider, ProviderError, ProviderResult,
    Submission,
};
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::ProtocolError;
use crate::framing::{FrameReader, FrameWriter};
use crate::types::{Envelope, Request, Response};

/// Opens a fresh stream to an integration for each request.
pub trait Connector: Send + Sync {
    type Stream: AsyncRead + AsyncWrite + Unpin + Send;

    fn connect(&self) -> BoxFuture<'_, std::io::Result<Self::Stream>>;
}

/// Connects over a Unix socket.
#[cfg(unix)]
#[derive(Debug, Clone)]
pub struct UnixConnector {
    path: PathBuf,
}

#[cfg(unix)]
impl UnixConnector {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(unix)]
impl Connector for UnixConnector {
    type Stream = tokio::net::UnixStream;

    fn connect(&self) -> BoxFuture<'_, std::io::Result<Self::Stream>> {
        Box::pin(tokio::net::UnixStream::connect(&self.path))
    }
}

/// A provider living in another process.
///
/// The descriptor is fetched once by [`RemoteProvider::connect`] and cached,
/// so [`Provider::describe`] stays cheap and infallible. Every other call
/// opens a connection, sends one request and reads one response within
/// `timeout`.
pub struct RemoteProvider<C> {
    connector: C,
    descriptor: ProviderDescriptor,
    timeout: Duration,
}

impl<C: Connector> RemoteProvider<C> {
    /// Connects and fetches the remote descriptor.
    pub async fn connect(connector: C, timeout: Duration) -> ProviderResult<Self> {
        let descriptor = match exchange(&connector, timeout, Request::Describe).await? {
            Response::Descriptor { descriptor } => descriptor,
            other => return Err(unexpected("descriptor", &other)),
        };
        descriptor.validate()?;
        debug!(provider = %descriptor.id, "Connected to remote provider");
        Ok(Self {
            connector,
            descriptor,
            timeout,
        })
    }

    /// Checks that the integration answers.
    pub async fn ping(&self) -> ProviderResult<()> {
        match self.exchange(Request::Ping).await? {
            Response::Pong => Ok(()),
            other => Err(unexpected("pong", &other)),
        }
    }

    async fn exchange(&self, request: Request) -> ProviderResult<Response> {
        exchange(&self.connector, self.timeout, request)
            .await
            .map_err(|err| err.with_provider(&self.descriptor.id))
    }
}

async fn exchange<C: Connector>(
    connector: &C,
    timeout: Duration,
    request: Request,
) -> ProviderResult<Response> {
    let request_id = Uuid::new_v4().to_string();
    let operation = request.name();
    let envelope = Envelope::request(&request_id, request);

    let response = tokio::time::timeout(timeout, async {
        let mut stream = connector.connect().await?;
        FrameWriter::new(&mut stream).write_message(&envelope).await?;
        FrameReader::new(&mut stream)
            .read_message::<Envelope<Response>>()
            .await?
            .ok_or(ProtocolError::IncompleteMessage {
                expected: 4,
                received: 0,
            })
    })
    .await
    .map_err(|_| ProtocolError::Timeout {
        operation: operation.to_string(),
    })??;

    if !response.is_compatible() {
        return Err(ProtocolError::UnsupportedVersion(response.protocol_version).into());
    }
    if response.request_id != request_id {
        warn!(
            expected = %request_id,
            received = %response.request_id,
            "response request_id mismatch"
        );
    }

    match response.payload {
        Response::Error(payload) => Err(payload.into_error()),
        payload => Ok(payload),
    }
}

fn unexpected(expected: &'static str, response: &Response) -> ProviderError {
    ProtocolError::UnexpectedResponse {
        expected,
        received: response.name(),
    }
    .into()
}

impl<C: Connector> Provider for RemoteProvider<C> {
    fn describe(&self) -> ProviderDescriptor {
        self.descriptor.clone()
    }

    fn fetch(&self, query: EntityQuery) -> BoxFuture<'_, ProviderResult<Vec<Entity>>> {
        Box::pin(async move {
            match self.exchange(Request::Fetch { query }).await? {
                Response::Entities { entities } => Ok(entities),
                other => Err(unexpected("entities", &other)),
            }
        })
    }

    fn submit(&self, submission: Submission) -> BoxFuture<'_, ProviderResult<Acknowledgement>> {
        Box::pin(async move {
            match self.exchange(Request::Submit { submission }).await? {
                Response::Acknowledgement { acknowledgement } => Ok(acknowledgement),
                other => Err(unexpected("acknowledgement", &other)),
            }
        })
    }

    fn on_start(&self) -> BoxFuture<'_, ProviderResult<()>> {
        Box::pin(self.ping())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use chrono::{NaiveDate, TimeZone, Utc};
    use eversity_core::{
        AttendanceMark, AttendanceStatus, DateRange, GroupId, GroupKind, LessonId, LessonSlot,
        MarkSource, Name, Person, PersonId, ProviderId, SubjectId, TeachingShift, TimeRange,
    };
    use eversity_providers::{
        Dataset, MemoryProvider, ProviderErrorKind, ProviderRegistry, ProviderState,
        RegistryConfig,
    };
    use tokio::io::DuplexStream;

    use crate::server::serve_connection;

    /// Serves `provider` on the far end of an in-memory duplex stream.
    struct DuplexConnector {
        provider: Arc<dyn Provider>,
    }

    impl Connector for DuplexConnector {
        type Stream = DuplexStream;

        fn connect(&self) -> BoxFuture<'_, std::io::Result<DuplexStream>> {
            let (client, server) = tokio::io::duplex(64 * 1024);
            let provider = Arc::clone(&self.provider);
            tokio::spawn(async move {
                let _ = serve_connection(provider.as_ref(), server).await;
            });
            Box::pin(async move { Ok(client) })
        }
    }

    /// Accepts connections and never answers.
    #[derive(Default)]
    struct SilentConnector {
        peers: Mutex<Vec<DuplexStream>>,
    }

    impl Connector for SilentConnector {
        type Stream = DuplexStream;

        fn connect(&self) -> BoxFuture<'_, std::io::Result<DuplexStream>> {
            let (client, server) = tokio::io::duplex(1024);
            self.peers.lock().unwrap().push(server);
            Box::pin(async move { Ok(client) })
        }
    }

    struct RefusingConnector;

    impl Connector for RefusingConnector {
        type Stream = DuplexStream;

        fn connect(&self) -> BoxFuture<'_, std::io::Result<DuplexStream>> {
            Box::pin(async {
                Err(std::io::Error::new(
                    std::io::ErrorKind::ConnectionRefused,
                    "refused",
                ))
            })
        }
    }

    fn memory() -> Arc<MemoryProvider> {
        let start = Utc.with_ymd_and_hms(2022, 9, 5, 8, 0, 0).unwrap();
        let lesson = LessonSlot::new(
            LessonId::new(100).unwrap(),
            "Physics",
            SubjectId::new(3).unwrap(),
            GroupId::new(10).unwrap(),
            1,
            TimeRange::new(start, start + chrono::Duration::minutes(45)).unwrap(),
        )
        .unwrap();
        let group = eversity_core::Group::new(
            GroupId::new(10).unwrap(),
            "10B",
            TeachingShift::First,
            GroupKind::Class,
            DateRange::since(NaiveDate::from_ymd_opt(2022, 9, 1).unwrap()),
        )
        .unwrap();
        let dataset = Dataset::new()
            .with_person(Person::new(
                PersonId::new(1).unwrap(),
                Name::new("Anna", "Ivanova").unwrap(),
            ))
            .with_group(group)
            .with_lesson(lesson);
        Arc::new(MemoryProvider::new(ProviderId::new("remote-memory").unwrap(), dataset).unwrap())
    }

    async fn remote(provider: Arc<MemoryProvider>) -> RemoteProvider<DuplexConnector> {
        RemoteProvider::connect(DuplexConnector { provider }, Duration::from_secs(5))
            .await
            .unwrap()
    }

    fn mark(lesson: i64) -> AttendanceMark {
        AttendanceMark::new(
            PersonId::new(1).unwrap(),
            LessonId::new(lesson).unwrap(),
            AttendanceStatus::Present,
            Utc.with_ymd_and_hms(2022, 9, 5, 9, 0, 0).unwrap(),
            MarkSource::new(ProviderId::new("remote-memory").unwrap()),
        )
    }

    #[tokio::test]
    async fn describe_is_cached_from_the_remote() {
        let provider = memory();
        let remote = remote(Arc::clone(&provider)).await;
        assert_eq!(remote.describe(), provider.describe());
        remote.ping().await.unwrap();
    }

    #[tokio::test]
    async fn fetch_matches_local_provider() {
        let provider = memory();
        let remote = remote(Arc::clone(&provider)).await;
        let query = EntityQuery::Schedule {
            group: GroupId::new(10).unwrap(),
            from: NaiveDate::from_ymd_opt(2022, 9, 1).unwrap(),
            to: NaiveDate::from_ymd_opt(2022, 9, 30).unwrap(),
        };
        let expected = provider.fetch(query.clone()).await.unwrap();
        assert_eq!(expected.len(), 1);
        assert_eq!(remote.fetch(query).await.unwrap(), expected);
    }

    #[tokio::test]
    async fn submit_and_duplicate_over_the_wire() {
        let provider = memory();
        let remote = remote(Arc::clone(&provider)).await;
        let mark = mark(100);

        let ack = remote.submit(Submission::Attendance(mark.clone())).await.unwrap();
        assert_eq!(ack.mark, Some(mark.id));
        assert!(!ack.duplicate);
        let ack = remote.submit(Submission::Attendance(mark)).await.unwrap();
        assert!(ack.duplicate);
        assert_eq!(provider.ledger().await.len(), 1);
    }

    #[tokio::test]
    async fn error_kinds_survive_the_wire() {
        let remote = remote(memory()).await;
        let err = remote.submit(Submission::Attendance(mark(999))).await.unwrap_err();
        assert_eq!(err.kind(), ProviderErrorKind::DataValidation);
        assert_eq!(err.provider().map(ProviderId::as_str), Some("remote-memory"));
    }

    #[tokio::test]
    async fn refused_connection_is_unavailable() {
        let result = RemoteProvider::connect(RefusingConnector, Duration::from_secs(1)).await;
        let err = result.err().unwrap();
        assert_eq!(err.kind(), ProviderErrorKind::Unavailable);
    }

    #[tokio::test(start_paused = true)]
    async fn silent_peer_times_out_as_unavailable() {
        let result =
            RemoteProvider::connect(SilentConnector::default(), Duration::from_secs(30)).await;
        let err = result.err().unwrap();
        assert_eq!(err.kind(), ProviderErrorKind::Unavailable);
        assert!(err.message().contains("describe"));
    }

    #[tokio::test]
    async fn remote_provider_in_a_registry() {
        let remote = remote(memory()).await;
        let id = remote.describe().id;
        let registry = ProviderRegistry::builder(RegistryConfig::default())
            .register(remote)
            .unwrap()
            .build()
            .unwrap();

        assert!(registry.start_all().await.is_empty());
        assert_eq!(registry.state(&id).await.unwrap(), ProviderState::Active);

        let roster = registry
            .fetch(
                &id,
                EntityQuery::Roster {
                    group: GroupId::new(10).unwrap(),
                    on: NaiveDate::from_ymd_opt(2022, 9, 5).unwrap(),
                },
                None,
            )
            .await
            .unwrap();
        assert!(roster.is_empty());
    }
}
