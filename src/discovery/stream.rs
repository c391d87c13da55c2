//! 持续监听的变更流
//!
//! 后台任务保持一个注册中心订阅，把每个实例事件转换为变更推送到流中。
//! 与单次 `watch` 的区别：
//! - 订阅保持打开，事件逐个转换，只在服务级别事件后重新订阅
//! - 每个变更的 `result` 为该事件之前的成员视图，推送后再合并增量
//! - 没有增量的事件不会出现在流中；服务级别事件会触发重新订阅
//! - 第一个错误会被推送，然后流结束，重试由调用方决定
//! - 流被丢弃时后台任务随之取消

use std::pin::Pin;
use std::task::{Context, Poll};

use futures::Stream;
use tokio::sync::mpsc;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, info, warn};

use crate::discovery::backend::SubscribeEvent;
use crate::discovery::change::Change;
use crate::discovery::key::ServiceKey;
use crate::discovery::resolver::PolarisResolver;
use crate::error::{RegistryError, ResolveError};

const STREAM_BUFFER: usize = 16;

/// 变更流
pub struct ChangeStream {
    rx: mpsc::Receiver<Result<Change, ResolveError>>,
    _guard: DropGuard,
}

// 单个订阅结束的原因
enum SessionEnd {
    Cancelled,
    Resubscribe,
    Failed(ResolveError),
}

impl ChangeStream {
    pub(crate) fn spawn(resolver: PolarisResolver, desc: String, token: CancellationToken) -> Self {
        let (tx, rx) = mpsc::channel(STREAM_BUFFER);
        // 子 token：外部取消会传递进来，流被丢弃时只取消自己的任务
        let child = token.child_token();
        let task_token = child.clone();

        tokio::spawn(async move {
            match ServiceKey::parse(&desc) {
                Ok(key) => run(&resolver, &key, &task_token, &tx).await,
                Err(e) => {
                    let _ = tx.send(Err(e)).await;
                }
            }
            debug!(desc = %desc, "Change stream task stopped");
        });

        Self {
            rx,
            _guard: child.drop_guard(),
        }
    }
}

async fn run(
    resolver: &PolarisResolver,
    key: &ServiceKey,
    token: &CancellationToken,
    tx: &mpsc::Sender<Result<Change, ResolveError>>,
) {
    loop {
        if token.is_cancelled() {
            return;
        }

        match session(resolver, key, token, tx).await {
            SessionEnd::Cancelled => return,
            SessionEnd::Resubscribe => continue,
            SessionEnd::Failed(e) => {
                warn!(key = %key, error = %e, "Watch failed, closing change stream");
                let _ = tx.send(Err(e)).await;
                return;
            }
        }
    }
}

// 打开一个订阅并持续转发事件
async fn session(
    resolver: &PolarisResolver,
    key: &ServiceKey,
    token: &CancellationToken,
    tx: &mpsc::Sender<Result<Change, ResolveError>>,
) -> SessionEnd {
    let mut watch = match resolver.backend().watch_service(key).await {
        Ok(watch) => watch,
        Err(e) => return SessionEnd::Failed(ResolveError::registry(key, e)),
    };
    let mut view = resolver.snapshot(key, &watch.all_instances);

    loop {
        let event = tokio::select! {
            biased;
            _ = token.cancelled() => {
                info!(key = %key, "[Polaris resolver] Change stream has been finished");
                return SessionEnd::Cancelled;
            }
            event = watch.events.recv() => event,
        };

        match event {
            Some(SubscribeEvent::Service(event)) => {
                debug!(key = %key, reason = %event.reason, "Service event received, resubscribing");
                return SessionEnd::Resubscribe;
            }
            Some(event) => {
                let change = resolver.translate_event(key, view.clone(), event);
                if !change.has_delta() {
                    continue;
                }
                view.apply(&change);
                if tx.send(Ok(change)).await.is_err() {
                    return SessionEnd::Cancelled;
                }
            }
            None => {
                return SessionEnd::Failed(ResolveError::registry(
                    key,
                    RegistryError::WatchClosed(key.to_string()),
                ));
            }
        }
    }
}

impl Stream for ChangeStream {
    type Item = Result<Change, ResolveError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}
