use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// 取消回执契约，统一表达"订阅方主动放弃结果"的能力。
///
/// # 设计背景（Why）
/// - 订阅建立时生产者必须交付一个取消句柄，订阅方据此在任意线程上请求中止；
/// - 句柄可能被迁移到其它执行上下文再触发，因此要求 `Send + Sync`。
///
/// # 契约说明（What）
/// - `cancel` 必须幂等：重复调用与并发调用都不得引发二次副作用；
/// - 取消仅是"请求中止"，生产者可在清理完成前继续持有资源；
/// - 取消与最终信号竞争时，功能上先到者为准（见 `attempt` 模块的仲裁）。
pub trait Cancellable: Send + Sync {
    /// 请求中止当前订阅对应的工作。
    fn cancel(&self);
}

/// 对象安全的取消回执装箱别名。
pub type BoxCancellable = Box<dyn Cancellable>;

/// 无操作取消回执。
///
/// 用于"尚无可追踪工作"的订阅尝试：例如键推导在任何下游工作开始前就已失败，
/// 此时订阅方仍必须先收到初始通知，取消自然无事可做。
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopCancellable;

impl Cancellable for NoopCancellable {
    fn cancel(&self) {}
}

/// 幂等取消标志，供生产者实现协作式中止。
///
/// # 设计背景（Why）
/// - 生产者常需在热路径上低成本地轮询"是否已被放弃"；
/// - 原子位加 `Arc` 共享即可覆盖绝大多数场景，无需回调注册机制。
///
/// # 逻辑解析（How）
/// - `cancel` 以比较交换首次置位时返回 `true`，重复调用返回 `false`，
///   便于调用方区分首次触发与冗余触发；
/// - `child` 派生共享同一原子位的实例，用于跨组件传播取消语义。
///
/// # 风险提示（Trade-offs）
/// - 标志不会强制终止正在执行的工作，生产者需自行在检查点响应。
#[derive(Clone, Debug, Default)]
pub struct CancelFlag {
    flag: Arc<AtomicBool>,
}

impl CancelFlag {
    /// 创建处于"未取消"状态的标志。
    pub fn new() -> Self {
        Self::default()
    }

    /// 查询当前是否已被标记取消。
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }

    /// 将标志置为取消态；首次置位返回 `true`。
    pub fn cancel(&self) -> bool {
        self.flag
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// 派生共享同一原子位的子标志。
    pub fn child(&self) -> Self {
        self.clone()
    }
}

impl Cancellable for CancelFlag {
    fn cancel(&self) {
        let _ = CancelFlag::cancel(self);
    }
}
