//! 消息渲染接口模块
use crate::types::{MessageRecord, Role};
use std::sync::{Arc, Mutex, MutexGuard};

/// 渲染层中一条消息的句柄
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageHandle(pub usize);

/// 渲染层接口
///
/// 客户端只向它推送通知，不会从它读取会话内部状态。
/// 一个会话的回调都来自同一个读取任务，按数据到达顺序同步调用。
/// 调用回调时客户端不持有内部锁，回调中可以调用 `is_busy` 等查询方法。
pub trait MessageSink: Send + Sync + 'static {
    /// 创建一条处于加载状态的消息
    fn create_pending_message(&self, role: Role) -> MessageHandle;

    /// 用累积的完整文本更新消息
    fn update_message(&self, handle: MessageHandle, cumulative_text: &str);

    /// 结束消息（移除加载状态，失败时附带错误描述）
    fn finalize_message(&self, handle: MessageHandle, success: bool, error_text: Option<&str>);
}

// ================================================================================================
// 内存实现
// ================================================================================================

/// 渲染层收到的一次通知
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkEvent {
    Created(MessageHandle, Role),
    Updated(MessageHandle, String),
    Finalized {
        handle: MessageHandle,
        success: bool,
        error: Option<String>,
    },
}

#[derive(Debug, Default)]
struct Inner {
    records: Vec<MessageRecord>,
    events: Vec<SinkEvent>,
}

/// 把消息保存在内存里的渲染层，克隆后共享同一份数据
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    inner: Arc<Mutex<Inner>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// 当前所有消息
    pub fn records(&self) -> Vec<MessageRecord> {
        self.lock().records.clone()
    }

    pub fn record(&self, handle: MessageHandle) -> Option<MessageRecord> {
        self.lock().records.get(handle.0).cloned()
    }

    /// 收到的全部通知，按时间顺序
    pub fn events(&self) -> Vec<SinkEvent> {
        self.lock().events.clone()
    }

    /// 某条消息收到的全部累积文本
    pub fn updates_for(&self, handle: MessageHandle) -> Vec<String> {
        self.lock()
            .events
            .iter()
            .filter_map(|e| match e {
                SinkEvent::Updated(h, text) if *h == handle => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    /// 某条消息收到的结束通知
    pub fn finalizations_for(&self, handle: MessageHandle) -> Vec<(bool, Option<String>)> {
        self.lock()
            .events
            .iter()
            .filter_map(|e| match e {
                SinkEvent::Finalized {
                    handle: h,
                    success,
                    error,
                } if *h == handle => Some((*success, error.clone())),
                _ => None,
            })
            .collect()
    }
}

impl MessageSink for MemorySink {
    fn create_pending_message(&self, role: Role) -> MessageHandle {
        let mut inner = self.lock();
        let handle = MessageHandle(inner.records.len());
        inner.records.push(MessageRecord::pending(role));
        inner.events.push(SinkEvent::Created(handle, role));
        handle
    }

    fn update_message(&self, handle: MessageHandle, cumulative_text: &str) {
        let mut inner = self.lock();
        if let Some(record) = inner.records.get_mut(handle.0) {
            record.text = cumulative_text.to_string();
        }
        inner
            .events
            .push(SinkEvent::Updated(handle, cumulative_text.to_string()));
    }

    fn finalize_message(&self, handle: MessageHandle, success: bool, error_text: Option<&str>) {
        let mut inner = self.lock();
        if let Some(record) = inner.records.get_mut(handle.0) {
            record.is_loading = false;
            record.error = error_text.map(str::to_string);
        }
        inner.events.push(SinkEvent::Finalized {
            handle,
            success,
            error: error_text.map(str::to_string),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_sink_lifecycle() {
        let sink = MemorySink::new();
        let handle = sink.create_pending_message(Role::Assistant);
        assert!(sink.record(handle).unwrap().is_loading);

        sink.update_message(handle, "Hel");
        sink.update_message(handle, "Hello");
        sink.finalize_message(handle, true, None);

        let record = sink.record(handle).unwrap();
        assert_eq!(record.text, "Hello");
        assert!(!record.is_loading);
        assert_eq!(sink.updates_for(handle), vec!["Hel", "Hello"]);
        assert_eq!(sink.finalizations_for(handle), vec![(true, None)]);
    }

    #[test]
    fn test_clones_share_records() {
        let sink = MemorySink::new();
        let clone = sink.clone();
        let handle = clone.create_pending_message(Role::User);
        clone.finalize_message(handle, false, Some("Error: boom"));

        let record = sink.record(handle).unwrap();
        assert_eq!(record.role, Role::User);
        assert_eq!(record.error.as_deref(), Some("Error: boom"));
    }
}
