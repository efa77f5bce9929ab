use chrono::{DateTime, Utc};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;

/// 单次搜索最多返回的命中数
pub const MAX_ALLOWED_SEARCH_HITS: usize = 10_000;

/// 单次搜索最多扫描的消息数
pub const MAX_ALLOWED_SEARCH_MESSAGES: usize = 100_000;

/// 会话成员类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ConversationMembersType {
    Kbfs,
    Team,
    #[value(name = "impteam")]
    #[serde(rename = "impteam_native")]
    ImpTeamNative,
    #[value(name = "impteam-upgrade")]
    #[serde(rename = "impteam_upgrade")]
    ImpTeamUpgrade,
}

impl ConversationMembersType {
    /// 是否属于（隐式）团队会话
    pub fn is_team_based(self) -> bool {
        matches!(
            self,
            ConversationMembersType::Team
                | ConversationMembersType::ImpTeamNative
                | ConversationMembersType::ImpTeamUpgrade
        )
    }
}

impl fmt::Display for ConversationMembersType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConversationMembersType::Kbfs => "kbfs",
            ConversationMembersType::Team => "team",
            ConversationMembersType::ImpTeamNative => "impteam",
            ConversationMembersType::ImpTeamUpgrade => "impteam-upgrade",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum TopicType {
    #[default]
    Chat,
    Dev,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    #[default]
    Private,
    Public,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentifyBehavior {
    #[default]
    ChatCli,
}

/// 连接模式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityMode {
    Networked,
    Standalone,
}

/// 未解析的会话引用
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationResolvingRequest {
    pub tlf_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topic_name: Option<String>,
    pub topic_type: TopicType,
    pub visibility: Visibility,
    pub members_type: ConversationMembersType,
}

/// 解析行为
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvingBehavior {
    pub create_if_not_exists: bool,
    pub must_not_exist: bool,
    pub interactive: bool,
    pub identify_behavior: IdentifyBehavior,
}

/// 解析后的会话
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationHandle {
    pub id: String,
    pub members_type: ConversationMembersType,
    #[serde(default)]
    pub tlf_name: String,
}

/// 发往远端的搜索选项
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchOptions {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub sent_by: String,
    #[serde(
        with = "chrono::serde::ts_milliseconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub sent_before: Option<DateTime<Utc>>,
    #[serde(
        with = "chrono::serde::ts_milliseconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub sent_after: Option<DateTime<Utc>>,
    pub max_hits: usize,
    pub max_messages: usize,
    pub before_context: usize,
    pub after_context: usize,
}

/// GetSearchRegexp 请求参数
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GetSearchRegexpArg {
    pub conv_id: String,
    pub identify_behavior: IdentifyBehavior,
    pub query: String,
    pub is_regex: bool,
    pub opts: SearchOptions,
}

/// 单条命中（消息本身原样透传）
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSearchHit {
    #[serde(default)]
    pub before_messages: Vec<serde_json::Value>,
    #[serde(default)]
    pub hit_message: serde_json::Value,
    #[serde(default)]
    pub after_messages: Vec<serde_json::Value>,
    #[serde(default)]
    pub matches: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChatSearchIndexStatus {
    pub percent_indexed: u32,
}

/// GetSearchRegexp 返回的摘要
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchSummary {
    #[serde(default)]
    pub hits: Vec<ChatSearchHit>,
    #[serde(default)]
    pub identify_failures: Vec<serde_json::Value>,
}
