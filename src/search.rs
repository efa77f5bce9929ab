use crate::context::{context_window, ContextParams};
use crate::error::{Result, SearchError};
use crate::gate::{self, GateState};
use crate::resolver::{parse_conversation_resolving_request, search_resolving_behavior, ResolverArgs};
use crate::rpc::{CancelToken, ChatBackend, Protocol};
use crate::types::*;
use crate::ui::ChatUi;
use crate::utils::{compile_pattern, parse_date};
use chrono::{DateTime, Utc};
use clap::Args;

pub const USAGE: &str = "usage: chat-search search [options] <conversation> <query>";

/// search 子命令的原始参数
#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct SearchArgs {
    /// Conversation name and query; put `--` before a query that starts with `-`
    #[arg(value_names = ["CONVERSATION", "QUERY"], num_args = 0..)]
    pub args: Vec<String>,

    #[command(flatten)]
    pub resolver: ResolverArgs,

    /// Make the given query a regex
    #[arg(short, long)]
    pub regex: bool,

    /// Maximum number of search hits to get (at most 10000)
    #[arg(long, default_value_t = 10)]
    pub max_hits: usize,

    /// Filter search results by the username of the sender
    #[arg(long, default_value = "")]
    pub sent_by: String,

    /// Filter by message creation time. Mutually exclusive with sent-after
    #[arg(long, default_value = "")]
    pub sent_before: String,

    /// Filter by message creation time. Mutually exclusive with sent-before
    #[arg(long, default_value = "")]
    pub sent_after: String,

    /// Maximum number of messages to search (at most 100000)
    #[arg(long, default_value_t = 10000)]
    pub max_messages: usize,

    /// Messages of leading context before each match
    #[arg(short = 'B', long, default_value_t = 0)]
    pub before_context: usize,

    /// Messages of trailing context after each match
    #[arg(short = 'A', long, default_value_t = 0)]
    pub after_context: usize,

    /// Messages of leading and trailing context surrounding each match
    #[arg(short = 'C', long, default_value_t = 2)]
    pub context: usize,
}

impl Default for SearchArgs {
    fn default() -> Self {
        let context = ContextParams::default();
        Self {
            args: Vec::new(),
            resolver: ResolverArgs::default(),
            regex: false,
            max_hits: 10,
            sent_by: String::new(),
            sent_before: String::new(),
            sent_after: String::new(),
            max_messages: 10000,
            before_context: context.before,
            after_context: context.after,
            context: context.context,
        }
    }
}

/// 校验后的搜索请求，构造后不可修改
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    conversation: ConversationResolvingRequest,
    query: String,
    is_regex: bool,
    opts: SearchOptions,
}

impl SearchRequest {
    pub fn conversation(&self) -> &ConversationResolvingRequest {
        &self.conversation
    }

    /// 用户原始输入，非正则时也不转义
    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn is_regex(&self) -> bool {
        self.is_regex
    }

    pub fn options(&self) -> &SearchOptions {
        &self.opts
    }

    fn to_arg(&self, conv_id: String) -> GetSearchRegexpArg {
        GetSearchRegexpArg {
            conv_id,
            identify_behavior: IdentifyBehavior::ChatCli,
            query: self.query.clone(),
            is_regex: self.is_regex,
            opts: self.opts.clone(),
        }
    }
}

/// 校验参数并构造请求，返回第一个错误
pub fn build_request(args: &SearchArgs) -> Result<SearchRequest> {
    let [conversation, query] = args.args.as_slice() else {
        return Err(SearchError::usage(USAGE));
    };
    if query.is_empty() {
        return Err(SearchError::usage("query cannot be empty"));
    }

    let conversation = parse_conversation_resolving_request(conversation, &args.resolver)?;

    if !args.sent_before.is_empty() && !args.sent_after.is_empty() {
        return Err(SearchError::ConflictingFilter);
    }
    let sent_before = parse_date_flag("sent-before", &args.sent_before)?;
    let sent_after = parse_date_flag("sent-after", &args.sent_after)?;

    check_limit("max-hits", args.max_hits, MAX_ALLOWED_SEARCH_HITS)?;
    check_limit("max-messages", args.max_messages, MAX_ALLOWED_SEARCH_MESSAGES)?;

    let window = context_window(&ContextParams {
        before: args.before_context,
        after: args.after_context,
        context: args.context,
    });

    compile_pattern(query, args.regex)?;

    let request = SearchRequest {
        conversation,
        query: query.clone(),
        is_regex: args.regex,
        opts: SearchOptions {
            sent_by: args.sent_by.clone(),
            sent_before,
            sent_after,
            max_hits: args.max_hits,
            max_messages: args.max_messages,
            before_context: window.before,
            after_context: window.after,
        },
    };
    tracing::debug!(?request, "search_request_built");
    Ok(request)
}

fn parse_date_flag(flag: &'static str, value: &str) -> Result<Option<DateTime<Utc>>> {
    if value.is_empty() {
        return Ok(None);
    }
    parse_date(value).map(Some).map_err(|reason| SearchError::DateParse {
        flag,
        value: value.to_string(),
        reason,
    })
}

fn check_limit(flag: &'static str, value: usize, max: usize) -> Result<()> {
    if value == 0 || value > max {
        return Err(SearchError::LimitExceeded { flag, value, max });
    }
    Ok(())
}

/// chat search 命令
#[derive(Debug, Clone)]
pub struct SearchCommand {
    request: SearchRequest,
    has_tty: bool,
}

impl SearchCommand {
    /// 解析参数；`has_tty` 由调用方在启动时探测一次
    pub fn parse_argv(args: &SearchArgs, has_tty: bool) -> Result<Self> {
        Ok(Self {
            request: build_request(args)?,
            has_tty,
        })
    }

    pub fn request(&self) -> &SearchRequest {
        &self.request
    }

    pub fn has_tty(&self) -> bool {
        self.has_tty
    }

    /// 执行闸门，须在建立任何连接之前调用
    pub fn check_gate(&self, mode: ConnectivityMode) -> Result<GateState> {
        gate::check(mode, self.request.conversation().members_type)
    }

    /// 闸门 → 注册 UI 回调 → 解析会话 → 发起搜索
    pub fn run<B: ChatBackend>(
        &self,
        mode: ConnectivityMode,
        backend: &mut B,
        ui: Box<dyn ChatUi>,
        cancel: &CancelToken,
    ) -> Result<SearchSummary> {
        let state = self.check_gate(mode)?;
        self.execute(state, backend, ui, cancel)
    }

    /// 闸门放行后的执行步骤
    pub fn execute<B: ChatBackend>(
        &self,
        state: GateState,
        backend: &mut B,
        ui: Box<dyn ChatUi>,
        cancel: &CancelToken,
    ) -> Result<SearchSummary> {
        let conversation = self.request.conversation();

        if state == GateState::StandaloneBlocked {
            return Err(SearchError::StandaloneUnsupported {
                members_type: conversation.members_type.to_string(),
            });
        }
        if state.needs_standalone_chat() {
            backend.start_standalone_chat()?;
        }

        backend.register_protocols(vec![Protocol::ChatUi(ui)])?;

        let handle = backend.resolve(conversation, search_resolving_behavior(self.has_tty))?;
        tracing::info!(conv_id = %handle.id, tlf = %conversation.tlf_name, "conversation_resolved");

        let arg = self.request.to_arg(handle.id);
        let summary = backend.get_search_regexp(cancel, &arg)?;
        tracing::info!(hits = summary.hits.len(), "search_acknowledged");
        Ok(summary)
    }
}
