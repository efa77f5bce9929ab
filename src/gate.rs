use crate::error::{Result, SearchError};
use crate::types::{ConnectivityMode, ConversationMembersType};

/// 执行闸门的判定结果（求值前即为未检查状态）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    /// 离线模式下允许运行，需先启动 standalone chat
    StandaloneAllowed,
    StandaloneBlocked,
    Networked,
}

impl GateState {
    /// 根据连接模式和会话类型求值
    pub fn evaluate(mode: ConnectivityMode, members_type: ConversationMembersType) -> Self {
        match mode {
            ConnectivityMode::Networked => GateState::Networked,
            ConnectivityMode::Standalone if members_type.is_team_based() => GateState::StandaloneAllowed,
            ConnectivityMode::Standalone => GateState::StandaloneBlocked,
        }
    }

    pub fn needs_standalone_chat(self) -> bool {
        self == GateState::StandaloneAllowed
    }
}

/// 判断命令能否运行，不做任何 I/O
pub fn check(mode: ConnectivityMode, members_type: ConversationMembersType) -> Result<GateState> {
    let state = GateState::evaluate(mode, members_type);
    tracing::info!(?mode, %members_type, ?state, "execution_gate");

    match state {
        GateState::StandaloneBlocked => Err(SearchError::StandaloneUnsupported {
            members_type: members_type.to_string(),
        }),
        state => Ok(state),
    }
}
