//! # error 模块说明
//!
//! ## 角色定位（Why）
//! - 为信号迁移与路由核心提供集中定义的稳定错误域：键推导失败、执行上下文拒绝、
//!   组关闭等路径都必须合流为统一的错误形态，才能沿异步信号通道原样送达订阅者；
//! - 错误永远通过 `on_error` 信号送出，绝不从获取异步值的调用中同步抛出。
//!
//! ## 设计要求（What）
//! - [`StrandError`] 承载稳定错误码（`<域>.<语义>` 约定）、人类可读描述与可选根因链；
//! - 叶子错误（如执行上下文的拒绝原因）实现 `thiserror::Error`，并通过 `From`
//!   转换挂入核心错误域，保证 `?` 传播与 `std::error::Error` 生态兼容；
//! - 下游委托方的失败原样透传，不得包裹或改写其错误身份。

use std::borrow::Cow;
use std::error::Error as StdError;
use std::fmt;

use thiserror::Error;

/// 稳定错误码命名空间。
///
/// # 契约说明（What）
/// - 所有码值遵循 `<域>.<语义>` 约定并保持向后兼容；
/// - 日志、告警与测试应依赖这些常量而非裸字符串字面量。
pub mod codes {
    /// 执行上下文拒绝调度新信号（例如正在关停）。
    pub const EXEC_REJECTED: &str = "exec.rejected";
    /// 请求到目的键的推导失败；键函数作者可复用该码值。
    pub const KEY_DERIVATION: &str = "router.key_derivation";
    /// 客户端组已关闭，不再创建或复用成员客户端。
    pub const GROUP_CLOSED: &str = "group.closed";
    /// 一次性结果已被消费，重复订阅不可用。
    pub const SINGLE_CONSUMED: &str = "single.consumed";
}

/// `StrandError` 是核心跨层共享的稳定错误域，所有异步错误信号的最终形态。
///
/// # 设计背景（Why）
/// - 键推导、执行上下文拒绝与下游客户端故障产生在不同层次，必须合流为统一错误码，
///   日志与告警系统才能执行精确的自动化治理；
/// - 订阅者在一次订阅尝试中恰好收到一次终止信号，错误对象需可安全跨线程移动。
///
/// # 契约说明（What）
/// - **前置条件**：调用方使用 [`codes`] 常量或遵循 `<域>.<语义>` 约定的自定义码值；
/// - **返回值**：构造函数返回拥有所有权的 `StrandError`（`Send + Sync + 'static`）；
/// - **后置条件**：除非显式调用 `with_cause`，错误不含根因；下游故障透传时由
///   调用方决定是否附加。
///
/// # 设计取舍（Trade-offs）
/// - 消息采用 `Cow<'static, str>`，静态文案零分配，动态拼接按需分配；
/// - 根因以 `Box<dyn Error>` 保存，放弃 `Clone` 换取完整的 `source()` 链路。
#[derive(Debug)]
pub struct StrandError {
    code: &'static str,
    message: Cow<'static, str>,
    cause: Option<Box<dyn StdError + Send + Sync + 'static>>,
}

impl StrandError {
    /// 构造核心错误。
    pub fn new(code: &'static str, message: impl Into<Cow<'static, str>>) -> Self {
        Self {
            code,
            message: message.into(),
            cause: None,
        }
    }

    /// 附带底层原因并返回新的核心错误。
    pub fn with_cause(mut self, cause: impl StdError + Send + Sync + 'static) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    /// 为现有错误设置底层原因。
    pub fn set_cause(&mut self, cause: impl StdError + Send + Sync + 'static) {
        self.cause = Some(Box::new(cause));
    }

    /// 获取稳定错误码。
    pub fn code(&self) -> &'static str {
        self.code
    }

    /// 获取描述。
    pub fn message(&self) -> &str {
        &self.message
    }

    /// 获取底层原因。
    pub fn cause(&self) -> Option<&(dyn StdError + Send + Sync + 'static)> {
        self.cause.as_deref()
    }
}

impl fmt::Display for StrandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl StdError for StrandError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.cause
            .as_ref()
            .map(|cause| cause.as_ref() as &(dyn StdError + 'static))
    }
}

/// 执行上下文拒绝调度任务时的叶子错误。
///
/// # 教案式说明
/// - **意图 (Why)**：拒绝是正常的生命周期事件（上下文关停、队列饱和），不是程序缺陷；
///   单独建模便于实现方携带具体原因，也便于测试精确断言。
/// - **契约 (What)**：`reason` 为人类可读的拒绝说明；通过 [`From`] 自动转换为携带
///   [`codes::EXEC_REJECTED`] 的 [`StrandError`]，挂为根因后原始文案不丢失。
/// - **风险 (Trade-offs)**：`Clone` 便于在重派发失败的多条兜底路径上复用同一原因。
#[derive(Debug, Clone, Error)]
#[error("execution context rejected task: {reason}")]
pub struct RejectedError {
    reason: Cow<'static, str>,
}

impl RejectedError {
    /// 以给定原因构造拒绝错误。
    pub fn new(reason: impl Into<Cow<'static, str>>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    /// 获取拒绝原因。
    pub fn reason(&self) -> &str {
        &self.reason
    }
}

impl From<RejectedError> for StrandError {
    fn from(value: RejectedError) -> Self {
        StrandError::new(codes::EXEC_REJECTED, "execution context rejected scheduled signal")
            .with_cause(value)
    }
}
