use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use tracing::trace;

use super::cancellable::{Cancellable, NoopCancellable};
use super::subscriber::BoxSingleSubscriber;
use crate::error::StrandError;

const STATE_UNSUBSCRIBED: u8 = 0;
const STATE_ACTIVE: u8 = 1;
const STATE_TERMINAL: u8 = 2;

/// 单次订阅尝试的显式状态机：未订阅 → 活跃 → 终止。
///
/// # 设计背景（Why）
/// - 初始通知恰好一次、终止信号至多一次，这两条不变量必须由一个集中点裁决，
///   否则每个来源实现都要各自处理取消与终止的竞态；
/// - 取消通知与最终的成功/完成/错误可能并发到达，功能上先到者为准，
///   后到者必须被抑制——状态机的单次 `ACTIVE → TERMINAL` 跃迁即是仲裁。
///
/// # 逻辑解析（How）
/// - 内部为一个 [`AtomicU8`]，三个状态单向推进；
/// - [`activate`](SignalGate::activate) 在初始通知派发时置为活跃；
/// - [`try_terminate`](SignalGate::try_terminate) 以比较交换竞争唯一的终止权，
///   成功者负责交付终止信号，失败者静默放弃。
///
/// # 契约说明（What）
/// - **前置条件**：`try_terminate` 仅在活跃态才可能成功；调用方必须先完成激活；
/// - **后置条件**：终止态不可逆，此后 `is_terminal` 恒为 `true`。
#[derive(Debug, Default)]
pub struct SignalGate {
    state: AtomicU8,
}

impl SignalGate {
    /// 创建处于"未订阅"状态的门。
    pub fn new() -> Self {
        Self::default()
    }

    /// 将门推进到活跃态；仅首次推进返回 `true`。
    pub fn activate(&self) -> bool {
        self.state
            .compare_exchange(
                STATE_UNSUBSCRIBED,
                STATE_ACTIVE,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    /// 竞争唯一的终止权；成功者负责交付终止信号。
    pub fn try_terminate(&self) -> bool {
        self.state
            .compare_exchange(
                STATE_ACTIVE,
                STATE_TERMINAL,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    /// 查询是否已处于活跃态或之后。
    pub fn is_active(&self) -> bool {
        self.state.load(Ordering::Acquire) >= STATE_ACTIVE
    }

    /// 查询是否已终止。
    pub fn is_terminal(&self) -> bool {
        self.state.load(Ordering::Acquire) == STATE_TERMINAL
    }
}

/// 以门仲裁取消竞态的取消回执：取消即竞争终止权，成功则后续终止信号被抑制。
struct GateCancellable {
    gate: Arc<SignalGate>,
}

impl Cancellable for GateCancellable {
    fn cancel(&self) {
        if !self.gate.try_terminate() {
            trace!("cancellation ignored: attempt already terminal");
        }
    }
}

/// `Attempt` 驱动一次订阅尝试，保证信号次序与唯一性。
///
/// # 设计背景（Why）
/// - 来源实现不应各自散落"先通知订阅、再交付终止"的样板与竞态处理；
/// - 以消费 `self` 的 [`succeed`](Attempt::succeed) / [`fail`](Attempt::fail)
///   静态排除"同一尝试交付两次终止"的误用，动态竞态交给 [`SignalGate`]。
///
/// # 逻辑解析（How）
/// - [`begin`](Attempt::begin) 先激活门、再派发携带门仲裁取消回执的初始通知，
///   订阅方在 `on_subscribe` 回调内立即取消也能正确赢得终止权；
/// - 终止方法先竞争终止权，成功才触碰订阅者，失败则仅留下诊断日志。
///
/// # 契约说明（What）
/// - **前置条件**：每个订阅者恰好绑定一个 `Attempt`；
/// - **后置条件**：无论成功、失败还是被取消，订阅者收到的信号序列都满足
///   "一次初始通知 + 至多一次终止信号"。
pub struct Attempt<T> {
    gate: Arc<SignalGate>,
    subscriber: BoxSingleSubscriber<T>,
}

impl<T> Attempt<T> {
    /// 开始一次可取消的订阅尝试：初始通知携带门仲裁的取消回执。
    pub fn begin(mut subscriber: BoxSingleSubscriber<T>) -> Self {
        let gate = Arc::new(SignalGate::new());
        gate.activate();
        subscriber.on_subscribe(Box::new(GateCancellable { gate: gate.clone() }));
        Self { gate, subscriber }
    }

    /// 开始一次不可追踪的订阅尝试：尚无下游工作，初始通知携带无操作取消回执。
    pub fn begin_untracked(mut subscriber: BoxSingleSubscriber<T>) -> Self {
        let gate = Arc::new(SignalGate::new());
        gate.activate();
        subscriber.on_subscribe(Box::new(NoopCancellable));
        Self { gate, subscriber }
    }

    /// 交付成功值；若取消已先到则抑制。
    pub fn succeed(mut self, value: T) {
        if self.gate.try_terminate() {
            self.subscriber.on_success(value);
        } else {
            trace!("success suppressed: attempt already terminal");
        }
    }

    /// 交付错误；若取消已先到则抑制。
    pub fn fail(mut self, error: StrandError) {
        if self.gate.try_terminate() {
            self.subscriber.on_error(error);
        } else {
            trace!(code = error.code(), "error suppressed: attempt already terminal");
        }
    }
}
