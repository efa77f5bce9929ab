use crate::error::{Result, SearchError};
use crate::types::*;
use clap::Args;

/// 会话解析器：把用户给出的会话名换成会话 ID
pub trait ConversationResolver {
    fn resolve(
        &mut self,
        request: &ConversationResolvingRequest,
        behavior: ResolvingBehavior,
    ) -> Result<ConversationHandle>;
}

/// 会话解析相关参数
#[derive(Args, Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolverArgs {
    /// Team channel to search (implies a team conversation)
    #[arg(long)]
    pub channel: Option<String>,

    /// Conversation topic type
    #[arg(long, value_enum, default_value_t = TopicType::Chat)]
    pub topic_type: TopicType,

    /// Search a public conversation
    #[arg(long)]
    pub public: bool,

    /// Conversation membership type (inferred when omitted)
    #[arg(long, value_enum)]
    pub members_type: Option<ConversationMembersType>,
}

/// 解析会话引用
///
/// 支持 `team#channel` 简写；未指定 --members-type 时，有频道即为团队会话，否则按隐式团队处理。
pub fn parse_conversation_resolving_request(
    name: &str,
    args: &ResolverArgs,
) -> Result<ConversationResolvingRequest> {
    let name = name.trim();
    let (tlf_name, inline_channel) = match name.split_once('#') {
        Some((tlf, channel)) => (tlf.trim(), Some(channel.trim())),
        None => (name, None),
    };

    if tlf_name.is_empty() {
        return Err(SearchError::usage("conversation name cannot be empty"));
    }

    let topic_name = match (inline_channel, args.channel.as_deref()) {
        (Some(_), Some(_)) => {
            return Err(SearchError::usage(
                "specify the channel either with --channel or as team#channel, not both",
            ));
        }
        (Some(channel), None) | (None, Some(channel)) => {
            let channel = channel.trim().trim_start_matches('#');
            if channel.is_empty() {
                return Err(SearchError::usage("channel name cannot be empty"));
            }
            Some(channel.to_string())
        }
        (None, None) => None,
    };

    let members_type = args.members_type.unwrap_or(if topic_name.is_some() {
        ConversationMembersType::Team
    } else {
        ConversationMembersType::ImpTeamNative
    });

    Ok(ConversationResolvingRequest {
        tlf_name: tlf_name.to_string(),
        topic_name,
        topic_type: args.topic_type,
        visibility: if args.public {
            Visibility::Public
        } else {
            Visibility::Private
        },
        members_type,
    })
}

/// 搜索时的解析行为：不创建、不要求不存在
pub fn search_resolving_behavior(interactive: bool) -> ResolvingBehavior {
    ResolvingBehavior {
        create_if_not_exists: false,
        must_not_exist: false,
        interactive,
        identify_behavior: IdentifyBehavior::ChatCli,
    }
}
