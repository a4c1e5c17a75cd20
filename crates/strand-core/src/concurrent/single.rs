//! 惰性单值构造器。
//!
//! # 模块定位（Why）
//! - 路由与迁移层都需要"构造时无副作用、订阅时才揭示结果"的单值来源；
//! - 统一经由 [`Attempt`] 驱动，信号次序与唯一性不必在每个来源里重复实现。
//!
//! # 使用契约（What）
//! - [`succeeded`] / [`failed`] 为一次性来源：结果在首次订阅时被消费，
//!   后续订阅收到 [`codes::SINGLE_CONSUMED`](crate::error::codes) 错误；
//! - [`deferred`] 将订阅行为完全交给闭包，闭包对每次尝试独立执行。

use std::marker::PhantomData;

use parking_lot::Mutex;

use super::attempt::Attempt;
use super::source::{BoxSingle, Single};
use super::subscriber::BoxSingleSubscriber;
use crate::error::{StrandError, codes};

/// 以现成的值构造一次性成功来源。
pub fn succeeded<T: Send + 'static>(value: T) -> BoxSingle<T> {
    Box::new(ConsumableSingle {
        outcome: Mutex::new(Some(Ok(value))),
    })
}

/// 以现成的错误构造一次性失败来源。
///
/// 订阅方先收到初始通知（无操作取消回执），随后收到该错误——
/// 错误永远不会从构造或订阅调用中同步抛出。
pub fn failed<T: Send + 'static>(error: StrandError) -> BoxSingle<T> {
    Box::new(ConsumableSingle {
        outcome: Mutex::new(Some(Err(error))),
    })
}

/// 以订阅闭包构造可重复订阅的惰性来源。
///
/// # 契约说明（What）
/// - 闭包在每次订阅时执行一次，必须自行经 [`Attempt`] 或等价机制保证
///   "一次初始通知 + 至多一次终止信号"；
/// - 闭包执行发生在订阅调用线程上；需要迁移时由迁移层装饰。
pub fn deferred<T, F>(subscribe: F) -> BoxSingle<T>
where
    T: Send + 'static,
    F: Fn(BoxSingleSubscriber<T>) + Send + Sync + 'static,
{
    Box::new(DeferredSingle {
        subscribe,
        _marker: PhantomData,
    })
}

/// 一次性来源：结果首个订阅者独占，之后以消费错误答复。
struct ConsumableSingle<T> {
    outcome: Mutex<Option<Result<T, StrandError>>>,
}

impl<T: Send + 'static> Single<T> for ConsumableSingle<T> {
    fn subscribe(&self, subscriber: BoxSingleSubscriber<T>) {
        let outcome = self.outcome.lock().take();
        match outcome {
            Some(Ok(value)) => Attempt::begin(subscriber).succeed(value),
            Some(Err(error)) => Attempt::begin_untracked(subscriber).fail(error),
            None => Attempt::begin_untracked(subscriber).fail(StrandError::new(
                codes::SINGLE_CONSUMED,
                "single result already consumed by an earlier subscription",
            )),
        }
    }
}

struct DeferredSingle<T, F> {
    subscribe: F,
    _marker: PhantomData<fn(T)>,
}

impl<T, F> Single<T> for DeferredSingle<T, F>
where
    T: Send + 'static,
    F: Fn(BoxSingleSubscriber<T>) + Send + Sync + 'static,
{
    fn subscribe(&self, subscriber: BoxSingleSubscriber<T>) {
        (self.subscribe)(subscriber);
    }
}
