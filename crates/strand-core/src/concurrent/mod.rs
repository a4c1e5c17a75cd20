//! # 异步原语契约模块
//!
//! ## 契约声明
//! * **回调驱动：** 本核心不拥有事件循环；单值与流式原语均以订阅回调表达，
//!   生产者在其自选线程上投递信号，本模块只约定信号的形态与次序。
//! * **惰性触发：** 获取异步值必须无副作用、不失败；只有订阅才会触发计算，
//!   错误也只在订阅后经 `on_error` 信号揭示。
//! * **一次初始通知：** 每次订阅尝试恰好收到一次 `on_subscribe`，随后至多一次
//!   终止信号（成功 / 完成 / 错误）；终止之后的任何信号都必须被抑制。
//!
//! ## 并发与错误语义
//! * **串行信号：** 单次订阅内的信号严格串行、互不重叠，即使跨线程迁移亦然；
//!   不同订阅之间不提供次序保证。
//! * **取消竞态：** 取消通知可能与最终的完成/错误竞争，功能上先到者为准，
//!   后到者被抑制；仲裁由 [`SignalGate`] 状态机完成。
//!
//! ## 模块结构
//! * `cancellable`：取消回执契约与幂等取消标志；
//! * `subscriber`：单值与流式订阅者契约；
//! * `source`：`Single` / `Publisher` 生产者契约与装箱别名；
//! * `attempt`：每次订阅尝试的显式状态机（未订阅 → 活跃 → 终止）；
//! * `single`：惰性单值构造器（`succeeded` / `failed` / `deferred`）。

mod attempt;
mod cancellable;
pub mod single;
mod source;
mod subscriber;

pub use attempt::{Attempt, SignalGate};
pub use cancellable::{BoxCancellable, CancelFlag, Cancellable, NoopCancellable};
pub use source::{BoxCompletion, BoxPublisher, BoxSingle, Publisher, Single};
pub use subscriber::{BoxSingleSubscriber, BoxSubscriber, SingleSubscriber, Subscriber};
