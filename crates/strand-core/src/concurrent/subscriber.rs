use super::cancellable::BoxCancellable;
use crate::error::StrandError;

/// 单值结果的订阅者契约。
///
/// # 契约说明（What）
/// - 每次订阅尝试恰好收到一次 [`on_subscribe`](SingleSubscriber::on_subscribe)，
///   随后至多一次 [`on_success`](SingleSubscriber::on_success) 或
///   [`on_error`](SingleSubscriber::on_error)；
/// - 信号严格串行，方法以 `&mut self` 表达"同一时刻只有一个信号在处理"；
/// - 错误若发生在任何下游工作开始之前，订阅方依旧先收到初始通知
///   （携带无操作取消回执），再收到错误。
pub trait SingleSubscriber<T>: Send {
    /// 接收订阅建立通知与取消回执。
    fn on_subscribe(&mut self, cancellable: BoxCancellable);

    /// 接收唯一的成功值，本次订阅随即终止。
    fn on_success(&mut self, value: T);

    /// 接收唯一的错误信号，本次订阅随即终止。
    fn on_error(&mut self, error: StrandError);
}

/// 对象安全的单值订阅者装箱别名。
pub type BoxSingleSubscriber<T> = Box<dyn SingleSubscriber<T>>;

/// 流式序列的订阅者契约。
///
/// # 契约说明（What）
/// - 恰好一次 [`on_subscribe`](Subscriber::on_subscribe)，随后零个或多个
///   [`on_next`](Subscriber::on_next)，以恰好一次
///   [`on_complete`](Subscriber::on_complete) 或
///   [`on_error`](Subscriber::on_error) 收尾；
/// - 终止信号之后不得再有任何值送达；
/// - 取消通知与终止信号竞争时，功能上先到者为准，后到者被抑制。
pub trait Subscriber<T>: Send {
    /// 接收订阅建立通知与取消回执。
    fn on_subscribe(&mut self, cancellable: BoxCancellable);

    /// 接收序列中的下一个值。
    fn on_next(&mut self, item: T);

    /// 接收正常完成信号，本次订阅随即终止。
    fn on_complete(&mut self);

    /// 接收错误信号，本次订阅随即终止。
    fn on_error(&mut self, error: StrandError);
}

/// 对象安全的流式订阅者装箱别名。
pub type BoxSubscriber<T> = Box<dyn Subscriber<T>>;
