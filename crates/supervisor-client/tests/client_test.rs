//! Client Integration Tests
//!
//! These tests run `SupervisorClient` against mock supervisors that speak raw
//! HTTP over a `TcpListener` or `UnixListener`. They verify:
//! - Results and faults travel back unchanged
//! - Credentials produce (or omit) the `Authorization` header
//! - Stalled peers hit the timeout instead of hanging
//! - Malformed framing is reported as a protocol error
//! - Both connection policies behave as documented
//! - The twiddler extension is detected via `system.listMethods`

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use base64::Engine as _;
use supervisor_client::{
    ClientConfig, ConnectionPolicy, ErrorKind, Fault, FaultCode, LogLevel, ProcessState,
    SupervisorClient, SupervisorError, Value,
};
use supervisor_common::{MethodResponse, RpcRequest, XmlRpcCodec};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpListener;

/// A request as the mock supervisor saw it.
#[derive(Debug, Clone)]
struct Received {
    head: String,
    call: RpcRequest,
}

impl Received {
    fn header(&self, name: &str) -> Option<String> {
        self.head.lines().skip(1).find_map(|line| {
            let (key, value) = line.split_once(": ")?;
            key.eq_ignore_ascii_case(name).then(|| value.to_string())
        })
    }
}

type Handler = Arc<dyn Fn(&RpcRequest) -> Vec<u8> + Send + Sync>;

/// Mock supervisor on a random loopback port.
///
/// Each connection is served until the client closes it, so the same mock
/// works for per-call and persistent clients. A mock built with
/// [`MockSupervisor::closing`] hangs up after every reply instead, the way an
/// HTTP/1.0 server does.
struct MockSupervisor {
    port: u16,
    received: Arc<Mutex<Vec<Received>>>,
    connections: Arc<AtomicUsize>,
}

impl MockSupervisor {
    async fn start(handler: impl Fn(&RpcRequest) -> Vec<u8> + Send + Sync + 'static) -> Self {
        Self::spawn(Arc::new(handler), false).await
    }

    async fn closing(handler: impl Fn(&RpcRequest) -> Vec<u8> + Send + Sync + 'static) -> Self {
        Self::spawn(Arc::new(handler), true).await
    }

    async fn spawn(handler: Handler, close_after_reply: bool) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let received = Arc::new(Mutex::new(Vec::new()));
        let connections = Arc::new(AtomicUsize::new(0));

        {
            let received = received.clone();
            let connections = connections.clone();
            tokio::spawn(async move {
                while let Ok((socket, _)) = listener.accept().await {
                    connections.fetch_add(1, Ordering::SeqCst);
                    tokio::spawn(serve(socket, handler.clone(), received.clone(), close_after_reply));
                }
            });
        }

        Self {
            port,
            received,
            connections,
        }
    }

    /// Replies to every call with `value`.
    async fn answering(value: Value) -> Self {
        Self::start(move |_| http_ok(&MethodResponse::Success(value.clone()))).await
    }

    fn config(&self) -> ClientConfig {
        ClientConfig::tcp("127.0.0.1", self.port).with_timeout(Duration::from_secs(5))
    }

    fn client(&self) -> SupervisorClient {
        SupervisorClient::new(self.config())
    }

    fn received(&self) -> Vec<Received> {
        self.received.lock().unwrap().clone()
    }

    fn last_call(&self) -> RpcRequest {
        self.received().last().unwrap().call.clone()
    }

    fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }
}

async fn serve<S>(
    mut socket: S,
    handler: Handler,
    received: Arc<Mutex<Vec<Received>>>,
    close_after_reply: bool,
) where
    S: AsyncRead + AsyncWrite + Unpin,
{
    while let Some((head, body)) = read_request(&mut socket).await {
        let call = XmlRpcCodec::decode_request(&body).unwrap();
        let reply = handler(&call);
        received.lock().unwrap().push(Received { head, call });
        if socket.write_all(&reply).await.is_err() || close_after_reply {
            break;
        }
    }
}

/// Reads one HTTP request, returning its head and body, or `None` once the
/// client has closed the connection.
async fn read_request<S: AsyncRead + Unpin>(socket: &mut S) -> Option<(String, Vec<u8>)> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];

    let split = loop {
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos;
        }
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
    };

    let head = String::from_utf8(buf[..split].to_vec()).unwrap();
    let length: usize = head
        .lines()
        .find_map(|line| line.strip_prefix("Content-Length: "))
        .unwrap()
        .parse()
        .unwrap();

    let mut body = buf[split + 4..].to_vec();
    while body.len() < length {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        body.extend_from_slice(&chunk[..n]);
    }
    Some((head, body))
}

fn http_ok(response: &MethodResponse) -> Vec<u8> {
    let body = XmlRpcCodec::encode_response(response).unwrap();
    let mut reply = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: text/xml\r\nContent-Length: {}\r\n\r\n",
        body.len()
    )
    .into_bytes();
    reply.extend_from_slice(&body);
    reply
}

fn fault(code: i32, message: &str) -> Vec<u8> {
    http_ok(&MethodResponse::Fault(Fault::new(code, message)))
}

#[tokio::test]
async fn test_clear_log_bare_true_body() {
    let mock = MockSupervisor::start(|_| b"HTTP/1.0 200 OK\r\nContent-Length: 4\r\n\r\ntrue".to_vec()).await;

    let result = mock.client().call("supervisor", "clearLog", ()).await.unwrap();
    assert_eq!(result, Value::Bool(true));
    assert_eq!(mock.last_call().method_name(), "supervisor.clearLog");
    assert!(mock.last_call().params.is_empty());
}

#[tokio::test]
async fn test_start_process_fault_preserves_code() {
    let mock = MockSupervisor::start(|call| match call.method.as_str() {
        "startProcess" => fault(10, "BAD_NAME: nosuchprocess"),
        _ => http_ok(&MethodResponse::Success(Value::Bool(true))),
    })
    .await;

    let err = mock.client().start_process("nosuchprocess", true).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Fault);
    assert!(!err.is_retryable());

    let fault = err.as_fault().unwrap();
    assert_eq!(fault.code, 10);
    assert_eq!(fault.message, "BAD_NAME: nosuchprocess");
    assert_eq!(fault.known_code(), Some(FaultCode::BadName));

    let call = mock.last_call();
    assert_eq!(call.params, vec![Value::from("nosuchprocess"), Value::Bool(true)]);
}

#[tokio::test]
async fn test_fault_struct_in_params_is_an_error() {
    let mock = MockSupervisor::answering(Fault::new(70, "BAD_NAME").to_value()).await;

    let result = mock.client().call("supervisor", "stopProcess", ("cat", true)).await;
    match result {
        Err(SupervisorError::Fault(fault)) => {
            assert_eq!(fault.code, 70);
            assert_eq!(fault.message, "BAD_NAME");
        }
        other => panic!("expected fault, got {:?}", other),
    }
}

#[tokio::test]
async fn test_scalar_and_list_arguments_send_same_call() {
    let mock = MockSupervisor::answering(Value::structure([("name", Value::from("cat"))])).await;
    let client = mock.client();

    client.call("supervisor", "getProcessInfo", "cat").await.unwrap();
    client.call("supervisor", "getProcessInfo", vec!["cat"]).await.unwrap();

    let received = mock.received();
    assert_eq!(received.len(), 2);
    assert_eq!(received[0].call, received[1].call);
    assert_eq!(received[0].call.params, vec![Value::from("cat")]);
}

#[tokio::test]
async fn test_authorization_header() {
    let mock = MockSupervisor::answering(Value::from("3.0")).await;

    let mut client = SupervisorClient::new(mock.config().with_credentials("user", "pass"));
    client.get_api_version().await.unwrap();

    let expected = format!(
        "Basic {}",
        base64::engine::general_purpose::STANDARD.encode("user:pass")
    );
    assert_eq!(mock.received()[0].header("Authorization"), Some(expected));

    client.clear_credentials();
    client.get_api_version().await.unwrap();
    assert_eq!(mock.received()[1].header("Authorization"), None);
}

#[tokio::test]
async fn test_request_envelope() {
    let mock = MockSupervisor::answering(Value::Int(4242)).await;

    let pid = mock.client().get_pid().await.unwrap();
    assert_eq!(pid, Value::Int(4242));

    let received = &mock.received()[0];
    assert!(received.head.starts_with("POST /RPC2 HTTP/1.0\r\n"));
    assert!(received.header("Content-Length").is_some());
}

#[tokio::test]
async fn test_silent_peer_times_out() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    // Accept and hold the socket without ever answering.
    let holder = tokio::spawn(async move {
        let (socket, _) = listener.accept().await.unwrap();
        tokio::time::sleep(Duration::from_secs(30)).await;
        drop(socket);
    });

    let client = SupervisorClient::new(
        ClientConfig::tcp("127.0.0.1", port).with_timeout(Duration::from_millis(200)),
    );

    let started = tokio::time::Instant::now();
    let err = client.clear_log().await.unwrap_err();

    assert!(err.is_timeout());
    assert_eq!(err.kind(), ErrorKind::Connection);
    assert!(started.elapsed() < Duration::from_secs(5));
    holder.abort();
}

#[tokio::test]
async fn test_missing_content_length_is_protocol_error() {
    let mock = MockSupervisor::start(|_| {
        b"HTTP/1.0 200 OK\r\nContent-Type: text/xml\r\n\r\n<methodResponse>".to_vec()
    })
    .await;

    let client = SupervisorClient::new(mock.config().with_timeout(Duration::from_secs(30)));
    let started = tokio::time::Instant::now();
    let err = client.get_state().await.unwrap_err();

    assert!(matches!(err, SupervisorError::Protocol(ref msg) if msg.contains("Content-Length")));
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn test_http_error_status() {
    let mock = MockSupervisor::start(|_| {
        b"HTTP/1.0 401 Unauthorized\r\nContent-Length: 12\r\n\r\nUnauthorized".to_vec()
    })
    .await;

    let err = mock.client().get_state().await.unwrap_err();
    assert!(matches!(err, SupervisorError::HttpStatus { status: 401, .. }));
    assert_eq!(err.kind(), ErrorKind::Protocol);
}

#[tokio::test]
async fn test_connection_refused() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let client = SupervisorClient::new(ClientConfig::tcp("127.0.0.1", port));
    let err = client.get_api_version().await.unwrap_err();

    assert!(matches!(err, SupervisorError::Connect { .. }));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_per_call_opens_a_connection_each_time() {
    let mock = MockSupervisor::answering(Value::Bool(true)).await;
    let client = mock.client();

    for _ in 0..3 {
        client.clear_log().await.unwrap();
    }
    assert_eq!(mock.connections(), 3);
}

#[tokio::test]
async fn test_persistent_reuses_one_connection() {
    let mock = MockSupervisor::answering(Value::from("RUNNING")).await;
    let client = SupervisorClient::new(
        mock.config().with_connection_policy(ConnectionPolicy::Persistent),
    );

    for _ in 0..3 {
        client.get_identification().await.unwrap();
    }

    assert_eq!(mock.connections(), 1);
    assert!(mock
        .received()
        .iter()
        .all(|r| r.head.starts_with("POST /RPC2 HTTP/1.1\r\n")));

    client.disconnect().await;
    client.get_identification().await.unwrap();
    assert_eq!(mock.connections(), 2);
}

#[tokio::test]
async fn test_persistent_reconnects_after_server_closes() {
    let mock = MockSupervisor::closing(|_| b"HTTP/1.0 200 OK\r\nContent-Length: 4\r\n\r\ntrue".to_vec()).await;
    let client = SupervisorClient::new(
        mock.config().with_connection_policy(ConnectionPolicy::Persistent),
    );

    assert_eq!(client.clear_log().await.unwrap(), Value::Bool(true));
    assert_eq!(client.clear_log().await.unwrap(), Value::Bool(true));
    assert_eq!(mock.connections(), 2);
}

#[tokio::test]
async fn test_persistent_honours_connection_close() {
    let mock = MockSupervisor::closing(|_| {
        b"HTTP/1.1 200 OK\r\nConnection: close\r\nContent-Length: 4\r\n\r\ntrue".to_vec()
    })
    .await;
    let client = SupervisorClient::new(
        mock.config().with_connection_policy(ConnectionPolicy::Persistent),
    );

    for _ in 0..3 {
        assert_eq!(client.clear_log().await.unwrap(), Value::Bool(true));
    }
    assert_eq!(mock.connections(), 3);
}

#[tokio::test]
async fn test_persistent_concurrent_calls_serialize() {
    let mock = MockSupervisor::start(|call| {
        let name = call.params[0].as_str().unwrap_or_default().to_string();
        http_ok(&MethodResponse::Success(Value::from(name)))
    })
    .await;
    let client = SupervisorClient::new(
        mock.config().with_connection_policy(ConnectionPolicy::Persistent),
    );

    let mut handles = Vec::new();
    for i in 0..8 {
        let client = client.clone();
        handles.push(tokio::spawn(async move {
            let name = format!("proc{}", i);
            let result = client.call("system", "methodHelp", name.as_str()).await.unwrap();
            assert_eq!(result, Value::from(name));
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(mock.connections(), 1);
    assert_eq!(mock.received().len(), 8);
}

#[tokio::test]
async fn test_per_call_concurrent_calls() {
    let mock = MockSupervisor::start(|call| {
        let name = call.params[0].as_str().unwrap_or_default().to_string();
        http_ok(&MethodResponse::Success(Value::from(name)))
    })
    .await;
    let client = mock.client();

    let mut handles = Vec::new();
    for i in 0..16 {
        let client = client.clone();
        handles.push(tokio::spawn(async move {
            let name = format!("proc{}", i);
            let result = client.call("supervisor", "getProcessInfo", name.as_str()).await.unwrap();
            assert_eq!(result, Value::from(name));
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(mock.connections(), 16);
}

#[tokio::test]
async fn test_twiddler_detection() {
    let with = MockSupervisor::answering(Value::Array(vec![
        Value::from("supervisor.getState"),
        Value::from("twiddler.getAPIVersion"),
    ]))
    .await;
    assert!(with.client().is_twiddler_available().await.unwrap());
    assert_eq!(with.last_call().method_name(), "system.listMethods");

    let without = MockSupervisor::answering(Value::Array(vec![Value::from("supervisor.getState")])).await;
    assert!(!without.client().is_twiddler_available().await.unwrap());
    assert!(!without.client().has_extension("supervisor_cache").await.unwrap());
}

#[tokio::test]
async fn test_twiddler_operations_argument_shapes() {
    let mock = MockSupervisor::answering(Value::Bool(true)).await;
    let client = mock.client();

    let mut options = BTreeMap::new();
    options.insert("command".to_string(), Value::from("/bin/cat"));
    client.add_program_to_group("pets", "cat", options.clone()).await.unwrap();
    let call = mock.last_call();
    assert_eq!(call.method_name(), "twiddler.addProgramToGroup");
    assert_eq!(
        call.params,
        vec![Value::from("pets"), Value::from("cat"), Value::Struct(options)]
    );

    client.log_message("hello", LogLevel::Warn).await.unwrap();
    let call = mock.last_call();
    assert_eq!(call.method_name(), "twiddler.log");
    assert_eq!(call.params, vec![Value::from("hello"), Value::from("WARN")]);
}

#[tokio::test]
async fn test_multicall_sends_one_array_parameter() {
    let mock = MockSupervisor::answering(Value::Array(vec![
        Value::Array(vec![Value::from("3.0")]),
        Fault::new(10, "BAD_NAME").to_value(),
    ]))
    .await;

    let calls = [
        RpcRequest::new("supervisor", "getAPIVersion", ()),
        RpcRequest::new("supervisor", "getProcessInfo", "nope"),
    ];
    let result = mock.client().multicall(&calls).await.unwrap();
    assert_eq!(result.as_array().map(<[Value]>::len), Some(2));

    let call = mock.last_call();
    assert_eq!(call.method_name(), "system.multicall");
    assert_eq!(call.params.len(), 1);
    let batch = call.params[0].as_array().unwrap();
    assert_eq!(batch[1].get("methodName"), Some(&Value::from("supervisor.getProcessInfo")));
    assert_eq!(batch[1].get("params"), Some(&Value::Array(vec![Value::from("nope")])));
}

#[tokio::test]
async fn test_read_log_arguments() {
    let mock = MockSupervisor::answering(Value::from("log line\n")).await;
    let client = mock.client();

    client.read_log(-100, 0).await.unwrap();
    assert_eq!(mock.last_call().params, vec![Value::Int(-100), Value::Int(0)]);

    client.tail_process_stderr_log("cat", 0, 1024).await.unwrap();
    let call = mock.last_call();
    assert_eq!(call.method_name(), "supervisor.tailProcessStderrLog");
    assert_eq!(call.params, vec![Value::from("cat"), Value::Int(0), Value::Int(1024)]);
}

#[tokio::test]
async fn test_all_process_info_typed() {
    let cat = Value::structure([
        ("name", Value::from("cat")),
        ("group", Value::from("cat")),
        ("state", Value::Int(20)),
        ("statename", Value::from("RUNNING")),
        ("pid", Value::Int(99)),
    ]);
    let mock = MockSupervisor::answering(Value::Array(vec![cat])).await;

    let infos = mock.client().all_process_info().await.unwrap();
    assert_eq!(infos.len(), 1);
    assert_eq!(infos[0].state, ProcessState::Running);
    assert_eq!(infos[0].pid, 99);
}

#[cfg(unix)]
#[tokio::test]
async fn test_unix_socket_endpoint() {
    use tokio::net::UnixListener;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("supervisor.sock");
    let listener = UnixListener::bind(&path).unwrap();
    let received = Arc::new(Mutex::new(Vec::new()));

    {
        let received = received.clone();
        tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let handler: Handler = Arc::new(|_: &RpcRequest| http_ok(&MethodResponse::Success(Value::from("supervisor"))));
            serve(socket, handler, received, false).await;
        });
    }

    let client = SupervisorClient::new(ClientConfig::unix(&path).with_timeout(Duration::from_secs(5)));
    let identification = client.get_identification().await.unwrap();

    assert_eq!(identification, Value::from("supervisor"));
    let received = received.lock().unwrap();
    assert_eq!(received[0].call.method_name(), "supervisor.getIdentification");
}
