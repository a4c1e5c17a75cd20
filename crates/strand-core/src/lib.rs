#![deny(unsafe_code)]
#![doc = r#"
# strand-core

## 设计动机（Why）
- **定位**：本 crate 是异步网络客户端运行时的信号迁移与按键路由核心：
  保证订阅建立、数据信号（值/完成/错误）与取消各自落在显式选定的
  执行上下文上，并允许把两套独立配置的迁移策略合并为一套而互不破坏；
- **架构角色**：同时以单一逻辑门面收拢按目的地分桶的客户端群——请求经
  纯函数推导目的键，组按键惰性创建成员客户端，生命周期沿整组传播；
- **设计理念**：协作式、回调驱动——本核心不拥有事件循环，也不实现
  线程池；它只组合与委托执行上下文，把"信号在哪个线程上送达"这件事
  变成确定性的。

## 核心契约（What）
- **信号次序**：单次订阅内信号严格串行、互不重叠，跨线程迁移亦然；
  一次初始通知，至多一次终止信号，终止之后一切信号被抑制；
- **惰性触发**：获取异步值无副作用、不失败；键推导失败等一等错误路径
  延迟到订阅时经 `on_error` 揭示；
- **拒绝即错误信号**：执行上下文拒绝调度时，失败交付给被迁移的接收方，
  绝不同步抛回、绝不静默丢弃。

## 边界（Non-goals）
- 传输与连接实现、负载均衡策略、报文编解码、重试与 TLS 均为外部
  协作者；本 crate 仅依赖其接口。
"#]

pub mod client;
pub mod concurrent;
pub mod error;
pub mod executor;
pub mod offload;
pub mod prelude;

pub use error::{RejectedError, StrandError, codes};
