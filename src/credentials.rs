//! API 密钥持久化模块
//!
//! 只保存一个不透明的密钥字符串。读写失败只记录日志，
//! 不会阻塞或中断流式请求。
use log::{debug, warn};
use std::path::{Path, PathBuf};
use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};
use tokio::sync::Mutex;

/// 默认的命名空间文件名
pub const DEFAULT_NAMESPACE: &str = "streamchat_api_key";

/// 基于文件的密钥存储
///
/// 克隆共享同一个写入序号；后提交的写入总会覆盖先提交的写入。
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
    generation: Arc<AtomicU64>,
    written: Arc<Mutex<u64>>,
}

impl CredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            generation: Arc::new(AtomicU64::new(0)),
            written: Arc::new(Mutex::new(0)),
        }
    }

    /// 在目录下使用默认命名空间
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        Self::new(dir.as_ref().join(DEFAULT_NAMESPACE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 读取已保存的密钥，不存在或不可读时返回 `None`
    pub fn load(&self) -> Option<String> {
        match std::fs::read_to_string(&self.path) {
            Ok(contents) => {
                let key = contents.trim();
                (!key.is_empty()).then(|| key.to_string())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("no stored credential at {}", self.path.display());
                None
            }
            Err(e) => {
                warn!("failed to read credential {}: {}", self.path.display(), e);
                None
            }
        }
    }

    /// 为一次写入分配序号，需在发起写入的线程上同步调用
    pub fn next_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// 保存密钥，失败时只记录警告
    pub async fn save(&self, api_key: &str) {
        let generation = self.next_generation();
        self.write(generation, api_key).await;
    }

    /// 按序号写入；比已写入序号旧的写入会被丢弃
    pub async fn write(&self, generation: u64, api_key: &str) {
        let mut written = self.written.lock().await;
        if generation <= *written {
            debug!("skipping stale credential write #{}", generation);
            return;
        }
        *written = generation;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                if let Err(e) = tokio::fs::create_dir_all(parent).await {
                    warn!("failed to create {}: {}", parent.display(), e);
                    return;
                }
            }
        }
        if let Err(e) = tokio::fs::write(&self.path, api_key).await {
            warn!("failed to store credential {}: {}", self.path.display(), e);
        }
    }
}
