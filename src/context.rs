/// 上下文参数（-B / -A / -C）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextParams {
    pub before: usize,
    pub after: usize,
    pub context: usize,
}

impl Default for ContextParams {
    fn default() -> Self {
        Self {
            before: 0,
            after: 0,
            context: 2,
        }
    }
}

/// 每个命中前后保留的消息数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextWindow {
    pub before: usize,
    pub after: usize,
}

/// 计算实际的上下文窗口
///
/// -B 和 -A 都为 0 时两侧都取 -C；只要有一侧非 0，两侧都保持原值。
pub fn context_window(params: &ContextParams) -> ContextWindow {
    if params.before == 0 && params.after == 0 {
        return ContextWindow {
            before: params.context,
            after: params.context,
        };
    }

    ContextWindow {
        before: params.before,
        after: params.after,
    }
}
