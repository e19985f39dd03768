use alloc::borrow::Cow;
use alloc::sync::Arc;
use core::fmt;

/// `CoreError` 是 rill 各层共享的稳定错误域。
///
/// # 设计背景（Why）
/// - 缓冲越界、通道取消、行超长等故障来自不同层次，需要合流为统一的错误码，
///   便于日志与上层治理做精确分类；
/// - 通道的终止原因是粘性的：一旦记录，后续每次调用都要重新抛出同一个原因，
///   因此错误必须可以廉价复制。
///
/// # 契约说明（What）
/// - `code`：遵循 `<域>.<语义>` 约定的 `'static` 字符串，取值见 [`codes`]；
/// - `message`：面向排障人员的自然语言描述；
/// - `cause`：可选底层原因，经 `Arc` 共享，使 `CoreError` 满足 `Clone`。
///
/// # 设计取舍（Trade-offs）
/// - 用 `Arc` 而非 `Box` 持有根因，牺牲一次引用计数换取“同一原因可被反复抛出”
///   的粘性语义；
/// - 消息使用 `Cow`，静态文案零分配，动态文案按需堆分配。
#[derive(Debug, Clone)]
pub struct CoreError {
    code: &'static str,
    message: Cow<'static, str>,
    cause: Option<Arc<dyn core::error::Error + Send + Sync + 'static>>,
}

impl CoreError {
    /// 构造核心错误。
    ///
    /// # 契约说明（What）
    /// - **前置条件**：`code` 已在 [`codes`] 中备案，或遵循 `<域>.<语义>` 约定；
    /// - **后置条件**：返回值拥有独立所有权，`Send + Sync + 'static`，初始不含根因。
    pub fn new(code: &'static str, message: impl Into<Cow<'static, str>>) -> Self {
        Self {
            code,
            message: message.into(),
            cause: None,
        }
    }

    /// 附带底层原因并返回新的错误。
    pub fn with_cause(mut self, cause: impl core::error::Error + Send + Sync + 'static) -> Self {
        self.cause = Some(Arc::new(cause));
        self
    }

    /// 稳定错误码。
    pub fn code(&self) -> &'static str {
        self.code
    }

    /// 人类可读描述。
    pub fn message(&self) -> &str {
        &self.message
    }

    /// 底层原因（若有）。
    pub fn cause(&self) -> Option<&(dyn core::error::Error + 'static)> {
        self.cause
            .as_ref()
            .map(|cause| &**cause as &(dyn core::error::Error + 'static))
    }
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl core::error::Error for CoreError {
    fn source(&self) -> Option<&(dyn core::error::Error + 'static)> {
        self.cause()
    }
}

/// 稳定错误码清单。
///
/// # 契约说明（What）
/// - 每个码值一经发布即冻结，调用方可以安全地做精确匹配；
/// - 码值按 `<域>.<语义>` 分段：`buffer` 为同步的使用错误，`io`/`channel`
///   为流终止语义，`text`/`pool` 为各自组件的失败分类。
pub mod codes {
    /// 缓冲级解码/编码请求超过当前可用字节，同步且不可恢复的误用信号。
    pub const BUFFER_OUT_OF_BOUNDS: &str = "buffer.out_of_bounds";
    /// 通道或 Packet 在凑齐定长解码所需字节前正常关闭。
    pub const END_OF_INPUT: &str = "io.end_of_input";
    /// 通道被取消后的缺省终止原因。
    pub const CHANNEL_CANCELLED: &str = "channel.cancelled";
    /// 写通道仍有未 flush 字节时调用了 `close()`。
    pub const CHANNEL_PENDING_BYTES: &str = "channel.pending_bytes";
    /// 违反单读者/单写者纪律：同侧出现并发等待。
    pub const CHANNEL_BUSY: &str = "channel.busy";
    /// 握手单元进入任何转移都不覆盖的状态，属实现缺陷信号。
    pub const CHANNEL_STATE_CORRUPTED: &str = "channel.state_corrupted";
    /// 行读取在预算耗尽前未遇到分隔符。
    pub const TEXT_LINE_TOO_LONG: &str = "text.line_too_long";
    /// 输入不是合法 UTF-8（或流在多字节序列中间终止）。
    pub const TEXT_MALFORMED: &str = "text.malformed_utf8";
    /// 单实例池的实例已被借出。
    pub const POOL_EXHAUSTED: &str = "pool.exhausted";
    /// 归还的不是此前借出的实例。
    pub const POOL_FOREIGN_INSTANCE: &str = "pool.foreign_instance";
    /// 池已释放，实例不可再借出或归还。
    pub const POOL_DISPOSED: &str = "pool.disposed";
}
