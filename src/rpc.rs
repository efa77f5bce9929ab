use crate::error::{Result, SearchError};
use crate::resolver::ConversationResolver;
use crate::types::*;
use crate::ui::ChatUi;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::io::{self, BufRead, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub const CHAT_UI_PROTOCOL: &str = "chat.1.chatUi";

const METHOD_REGISTER_PROTOCOLS: &str = "rpc.registerProtocols";
const METHOD_START_STANDALONE: &str = "chat.1.local.startStandaloneChat";
const METHOD_RESOLVE: &str = "chat.1.local.resolveConversation";
const METHOD_SEARCH_REGEXP: &str = "chat.1.local.getSearchRegexp";

/// 取消标记，可跨线程共享
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_canceled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<()> {
        if self.is_canceled() {
            Err(SearchError::Canceled)
        } else {
            Ok(())
        }
    }
}

/// 注册到传输层的回调协议
pub enum Protocol {
    ChatUi(Box<dyn ChatUi>),
}

impl Protocol {
    pub fn name(&self) -> &'static str {
        match self {
            Protocol::ChatUi(_) => CHAT_UI_PROTOCOL,
        }
    }
}

pub trait ProtocolRegistry {
    fn register_protocols(&mut self, protocols: Vec<Protocol>) -> Result<()>;
}

pub trait StandaloneChat {
    fn start_standalone_chat(&mut self) -> Result<()>;
}

pub trait SearchClient {
    /// 发起搜索并等待确认；命中结果通过已注册的 ChatUi 异步送达
    fn get_search_regexp(&mut self, cancel: &CancelToken, arg: &GetSearchRegexpArg) -> Result<SearchSummary>;
}

/// 搜索命令需要的全部外部能力
pub trait ChatBackend: ProtocolRegistry + StandaloneChat + ConversationResolver + SearchClient {}

impl<T: ProtocolRegistry + StandaloneChat + ConversationResolver + SearchClient> ChatBackend for T {}

/// JSON-RPC 请求
#[derive(Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<u64>,
    method: &'a str,
    params: Value,
}

/// 收到的帧：响应或通知
#[derive(Deserialize)]
struct JsonRpcMessage {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    method: Option<String>,
    #[serde(default)]
    params: Value,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<JsonRpcError>,
}

#[derive(Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

/// 按行分帧的 JSON-RPC 2.0 客户端
pub struct JsonRpcClient<R, W> {
    reader: R,
    writer: W,
    next_id: u64,
    cancel: CancelToken,
    chat_ui: Option<Box<dyn ChatUi>>,
}

impl<R: BufRead, W: Write> JsonRpcClient<R, W> {
    pub fn new(reader: R, writer: W) -> Self {
        Self::with_cancel(reader, writer, CancelToken::new())
    }

    pub fn with_cancel(reader: R, writer: W, cancel: CancelToken) -> Self {
        Self {
            reader,
            writer,
            next_id: 1,
            cancel,
            chat_ui: None,
        }
    }

    pub fn into_parts(self) -> (R, W) {
        (self.reader, self.writer)
    }

    fn call<T: DeserializeOwned>(&mut self, cancel: &CancelToken, method: &str, params: Value) -> Result<T> {
        cancel.check()?;

        let id = self.next_id;
        self.next_id += 1;

        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            id: Some(id),
            method,
            params,
        };
        writeln!(self.writer, "{}", serde_json::to_string(&request)?)?;
        self.writer.flush()?;
        tracing::debug!(id, method, "rpc_request");

        loop {
            let mut line = String::new();
            let n = self.reader.read_line(&mut line).map_err(|e| match e.kind() {
                // 读超时在 Unix 上是 WouldBlock，在 Windows 上是 TimedOut
                io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut => {
                    tracing::warn!(id, method, "rpc_timeout");
                    SearchError::Timeout {
                        method: method.to_string(),
                    }
                }
                _ => SearchError::Io(e),
            })?;
            cancel.check()?;
            if n == 0 {
                return Err(SearchError::Io(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!("connection closed while waiting for {}", method),
                )));
            }

            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let message: JsonRpcMessage = serde_json::from_str(line)?;
            match message.id {
                // 没有 id 的是回调通知
                None => {
                    if let Some(notification) = message.method {
                        self.dispatch(&notification, message.params)?;
                    }
                }
                Some(ref got) if *got == json!(id) => {
                    if let Some(error) = message.error {
                        tracing::debug!(id, method, code = error.code, "rpc_error");
                        return Err(SearchError::Rpc {
                            code: error.code,
                            message: error.message,
                        });
                    }
                    let result = message.result.unwrap_or(Value::Null);
                    return Ok(serde_json::from_value(result)?);
                }
                Some(other) => {
                    tracing::warn!(expected = id, got = %other, "rpc_unexpected_response");
                }
            }
        }
    }

    fn dispatch(&mut self, method: &str, params: Value) -> Result<()> {
        let Some(name) = method.strip_prefix(CHAT_UI_PROTOCOL).and_then(|m| m.strip_prefix('.')) else {
            tracing::warn!(method, "rpc_unknown_notification");
            return Ok(());
        };

        let Some(ui) = self.chat_ui.as_mut() else {
            tracing::debug!(method, "rpc_notification_without_ui");
            return Ok(());
        };

        match name {
            "chatSearchHit" => {
                let hit: ChatSearchHit = serde_json::from_value(params.get("searchHit").cloned().unwrap_or_else(|| json!({})))?;
                ui.search_hit(&hit)?;
            }
            "chatSearchDone" => {
                let num_hits = params.get("numHits").and_then(|v| v.as_u64()).unwrap_or(0) as usize;
                ui.search_done(num_hits)?;
            }
            "chatSearchIndexStatus" => {
                let status: ChatSearchIndexStatus =
                    serde_json::from_value(params.get("status").cloned().unwrap_or_else(|| json!({})))?;
                ui.search_index_status(&status)?;
            }
            _ => tracing::warn!(method, "rpc_unknown_ui_callback"),
        }
        Ok(())
    }
}

impl<R: BufRead, W: Write> ProtocolRegistry for JsonRpcClient<R, W> {
    fn register_protocols(&mut self, protocols: Vec<Protocol>) -> Result<()> {
        let names: Vec<&'static str> = protocols.iter().map(Protocol::name).collect();
        let cancel = self.cancel.clone();
        let _: Value = self.call(&cancel, METHOD_REGISTER_PROTOCOLS, json!({ "protocols": names }))?;

        for protocol in protocols {
            match protocol {
                Protocol::ChatUi(ui) => self.chat_ui = Some(ui),
            }
        }
        Ok(())
    }
}

impl<R: BufRead, W: Write> StandaloneChat for JsonRpcClient<R, W> {
    fn start_standalone_chat(&mut self) -> Result<()> {
        let cancel = self.cancel.clone();
        let _: Value = self.call(&cancel, METHOD_START_STANDALONE, json!({}))?;
        Ok(())
    }
}

impl<R: BufRead, W: Write> ConversationResolver for JsonRpcClient<R, W> {
    fn resolve(
        &mut self,
        request: &ConversationResolvingRequest,
        behavior: ResolvingBehavior,
    ) -> Result<ConversationHandle> {
        let cancel = self.cancel.clone();
        let params = json!({ "request": request, "behavior": behavior });
        self.call(&cancel, METHOD_RESOLVE, params).map_err(|e| match e {
            SearchError::Rpc { message, .. } => SearchError::Resolver(message),
            other => other,
        })
    }
}

impl<R: BufRead, W: Write> SearchClient for JsonRpcClient<R, W> {
    fn get_search_regexp(&mut self, cancel: &CancelToken, arg: &GetSearchRegexpArg) -> Result<SearchSummary> {
        self.cancel.check()?;
        self.call(cancel, METHOD_SEARCH_REGEXP, serde_json::to_value(arg)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::sync::Mutex;

    #[derive(Clone, Default)]
    struct Recorder(Arc<Mutex<Vec<String>>>);

    impl ChatUi for Recorder {
        fn search_hit(&mut self, hit: &ChatSearchHit) -> io::Result<()> {
            self.0.lock().unwrap().push(format!("hit:{}", hit.matches.join(",")));
            Ok(())
        }

        fn search_done(&mut self, num_hits: usize) -> io::Result<()> {
            self.0.lock().unwrap().push(format!("done:{}", num_hits));
            Ok(())
        }

        fn search_index_status(&mut self, status: &ChatSearchIndexStatus) -> io::Result<()> {
            self.0.lock().unwrap().push(format!("index:{}", status.percent_indexed));
            Ok(())
        }
    }

    fn client(replies: &str) -> JsonRpcClient<Cursor<Vec<u8>>, Vec<u8>> {
        JsonRpcClient::new(Cursor::new(replies.as_bytes().to_vec()), Vec::new())
    }

    fn sent(client: JsonRpcClient<Cursor<Vec<u8>>, Vec<u8>>) -> Vec<Value> {
        let (_, writer) = client.into_parts();
        String::from_utf8(writer)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    fn search_arg() -> GetSearchRegexpArg {
        GetSearchRegexpArg {
            conv_id: "c1".into(),
            identify_behavior: IdentifyBehavior::ChatCli,
            query: "a.b".into(),
            is_regex: false,
            opts: SearchOptions {
                max_hits: 10,
                max_messages: 10000,
                before_context: 2,
                after_context: 2,
                ..Default::default()
            },
        }
    }

    #[test]
    fn search_dispatches_callbacks_before_ack() {
        let replies = concat!(
            r#"{"jsonrpc":"2.0","id":1,"result":{}}"#,
            "\n",
            r#"{"jsonrpc":"2.0","method":"chat.1.chatUi.chatSearchIndexStatus","params":{"status":{"percentIndexed":50}}}"#,
            "\n",
            r#"{"jsonrpc":"2.0","method":"chat.1.chatUi.chatSearchHit","params":{"searchHit":{"matches":["a.b"]}}}"#,
            "\n",
            r#"{"jsonrpc":"2.0","method":"chat.1.chatUi.chatSearchDone","params":{"numHits":1}}"#,
            "\n",
            r#"{"jsonrpc":"2.0","id":2,"result":{"hits":[{"matches":["a.b"]}]}}"#,
            "\n",
        );
        let recorder = Recorder::default();
        let mut client = client(replies);
        client
            .register_protocols(vec![Protocol::ChatUi(Box::new(recorder.clone()))])
            .unwrap();

        let summary = client.get_search_regexp(&CancelToken::new(), &search_arg()).unwrap();
        assert_eq!(summary.hits.len(), 1);
        assert_eq!(
            *recorder.0.lock().unwrap(),
            vec!["index:50", "hit:a.b", "done:1"]
        );

        let frames = sent(client);
        assert_eq!(frames[0]["method"], "rpc.registerProtocols");
        assert_eq!(frames[0]["params"]["protocols"][0], "chat.1.chatUi");
        assert_eq!(frames[1]["method"], "chat.1.local.getSearchRegexp");
        assert_eq!(frames[1]["params"]["query"], "a.b");
        assert_eq!(frames[1]["params"]["isRegex"], false);
        assert_eq!(frames[1]["params"]["convId"], "c1");
    }

    #[test]
    fn error_response_becomes_rpc_error() {
        let mut client = client(
            "{\"jsonrpc\":\"2.0\",\"id\":1,\"error\":{\"code\":-32601,\"message\":\"nope\"}}\n",
        );
        let err = client.get_search_regexp(&CancelToken::new(), &search_arg()).unwrap_err();
        match err {
            SearchError::Rpc { code, message } => {
                assert_eq!(code, -32601);
                assert_eq!(message, "nope");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn resolver_errors_are_tagged() {
        let mut client = client(
            "{\"jsonrpc\":\"2.0\",\"id\":1,\"error\":{\"code\":1,\"message\":\"no such conversation\"}}\n",
        );
        let request = ConversationResolvingRequest {
            tlf_name: "alice,bob".into(),
            topic_name: None,
            topic_type: TopicType::Chat,
            visibility: Visibility::Private,
            members_type: ConversationMembersType::ImpTeamNative,
        };
        let behavior = ResolvingBehavior {
            create_if_not_exists: false,
            must_not_exist: false,
            interactive: false,
            identify_behavior: IdentifyBehavior::ChatCli,
        };
        let err = client.resolve(&request, behavior).unwrap_err();
        assert_eq!(err.code(), "resolver");
    }

    #[test]
    fn canceled_token_sends_nothing() {
        let cancel = CancelToken::new();
        cancel.cancel();
        let mut client = client("");
        let err = client.get_search_regexp(&cancel, &search_arg()).unwrap_err();
        assert!(matches!(err, SearchError::Canceled));
        assert!(sent(client).is_empty());
    }

    #[test]
    fn closed_connection_is_io_error() {
        let mut client = client("");
        let err = client.get_search_regexp(&CancelToken::new(), &search_arg()).unwrap_err();
        assert_eq!(err.code(), "io");
    }

    /// 读完预置数据后像超时的 socket 一样返回错误
    struct Stalled {
        data: Cursor<Vec<u8>>,
        kind: io::ErrorKind,
    }

    impl io::Read for Stalled {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match io::Read::read(&mut self.data, buf)? {
                0 => Err(io::Error::from(self.kind)),
                n => Ok(n),
            }
        }
    }

    fn stalled(replies: &str, kind: io::ErrorKind) -> JsonRpcClient<io::BufReader<Stalled>, Vec<u8>> {
        let reader = io::BufReader::new(Stalled {
            data: Cursor::new(replies.as_bytes().to_vec()),
            kind,
        });
        JsonRpcClient::new(reader, Vec::new())
    }

    #[test]
    fn read_timeout_names_the_pending_method() {
        let replies = concat!(
            r#"{"jsonrpc":"2.0","id":1,"result":{}}"#,
            "\n",
            r#"{"jsonrpc":"2.0","method":"chat.1.chatUi.chatSearchIndexStatus","params":{"status":{"percentIndexed":10}}}"#,
            "\n",
        );

        for kind in [io::ErrorKind::WouldBlock, io::ErrorKind::TimedOut] {
            let recorder = Recorder::default();
            let mut client = stalled(replies, kind);
            client
                .register_protocols(vec![Protocol::ChatUi(Box::new(recorder.clone()))])
                .unwrap();

            let err = client.get_search_regexp(&CancelToken::new(), &search_arg()).unwrap_err();
            match &err {
                SearchError::Timeout { method } => assert_eq!(method, METHOD_SEARCH_REGEXP),
                other => panic!("unexpected error: {other:?}"),
            }
            assert_eq!(err.code(), "timeout");
            assert_eq!(err.exit_code(), 1);
            // 超时前收到的回调照常分发
            assert_eq!(*recorder.0.lock().unwrap(), vec!["index:10"]);
        }
    }

    #[test]
    fn other_read_errors_stay_io() {
        let mut client = stalled("", io::ErrorKind::ConnectionReset);
        let err = client.get_search_regexp(&CancelToken::new(), &search_arg()).unwrap_err();
        assert_eq!(err.code(), "io");
    }

    #[test]
    fn stale_responses_are_skipped() {
        let replies = concat!(
            r#"{"jsonrpc":"2.0","id":99,"result":{}}"#,
            "\n\n",
            r#"{"jsonrpc":"2.0","id":1,"result":{"id":"c9","membersType":"team","tlfName":"acme"}}"#,
            "\n",
        );
        let mut client = client(replies);
        let request = ConversationResolvingRequest {
            tlf_name: "acme".into(),
            topic_name: Some("general".into()),
            topic_type: TopicType::Chat,
            visibility: Visibility::Private,
            members_type: ConversationMembersType::Team,
        };
        let behavior = ResolvingBehavior {
            create_if_not_exists: false,
            must_not_exist: false,
            interactive: true,
            identify_behavior: IdentifyBehavior::ChatCli,
        };
        let handle = client.resolve(&request, behavior).unwrap();
        assert_eq!(handle.id, "c9");

        let frames = sent(client);
        assert_eq!(frames[0]["params"]["request"]["topicName"], "general");
        assert_eq!(frames[0]["params"]["behavior"]["interactive"], true);
        assert_eq!(frames[0]["params"]["behavior"]["identifyBehavior"], "chat_cli");
    }
}
