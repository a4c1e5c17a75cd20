use super::subscriber::{BoxSingleSubscriber, BoxSubscriber};

/// 单值异步源：订阅后恰好交付一个成功值或一个错误。
///
/// # 设计背景（Why）
/// - 请求/响应管线的基本构件：一次请求对应一个最终结果；
/// - 惰性语义是硬性要求——构造与持有源对象不得产生副作用，
///   只有 [`subscribe`](Single::subscribe) 才触发计算。
///
/// # 契约说明（What）
/// - 实现必须保证每次订阅尝试收到恰好一次初始通知与至多一次终止信号；
/// - 一次性来源（如携带不可克隆请求体的来源）在值被消费后，对后续订阅
///   以错误信号答复，而非 panic 或静默吞没。
pub trait Single<T>: Send + Sync {
    /// 发起一次订阅尝试。
    fn subscribe(&self, subscriber: BoxSingleSubscriber<T>);
}

/// 对象安全的单值源装箱别名。
pub type BoxSingle<T> = Box<dyn Single<T>>;

/// 生命周期完成信号：以 `Single<()>` 表达"已完成/失败"，不再引入第三种原语。
pub type BoxCompletion = BoxSingle<()>;

/// 流式异步源：订阅后交付零个或多个值，以完成或错误收尾。
///
/// # 契约说明（What）
/// - 同 [`Single`]，订阅触发执行、初始通知恰好一次；
/// - 单次订阅内信号严格串行；跨订阅无次序保证。
pub trait Publisher<T>: Send + Sync {
    /// 发起一次订阅尝试。
    fn subscribe(&self, subscriber: BoxSubscriber<T>);
}

/// 对象安全的流式源装箱别名。
pub type BoxPublisher<T> = Box<dyn Publisher<T>>;
