// src/artwork.rs

use crate::{
    cache::TtlCache,
    client::{self, RobustClient},
    constants::{self, artwork},
    error::AppResult,
    models::LinkKind,
};
use async_trait::async_trait;
use log::debug;
use std::sync::Arc;

/// 填充封面地址模板中的 `{w}` `{h}` `{f}` `{c}` `{q}`
pub fn fill_template(template: &str, (w, h): (u32, u32)) -> String {
    template
        .replace("{w}", &w.to_string())
        .replace("{h}", &h.to_string())
        .replace("{f}", artwork::FORMAT)
        .replace("{c}", artwork::CROP)
        .replace("{q}", artwork::QUALITY)
}

pub fn preview_url(template: &str) -> String {
    fill_template(template, artwork::PREVIEW_SIZE)
}

/// 视频使用宽屏尺寸，其余使用正方形
pub fn high_res_url(template: &str, kind: LinkKind) -> String {
    let size = if kind.is_video() {
        artwork::WIDE_SIZE
    } else {
        artwork::SQUARE_SIZE
    };
    fill_template(template, size)
}

/// 已加载完成的高清封面
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtworkImage {
    pub url: String,
    pub bytes: usize,
}

/// 按任务 id 缓存高清封面，跨队列视图和详情视图共享
pub struct ArtworkCache {
    inner: TtlCache<String, ArtworkImage>,
}

impl Default for ArtworkCache {
    fn default() -> Self {
        Self {
            inner: TtlCache::new(constants::ARTWORK_CACHE_CAPACITY, None),
        }
    }
}

impl ArtworkCache {
    /// 只有地址与所需版本一致时才命中，否则视为失效并删除
    pub fn get_variant(&mut self, task_id: &str, url: &str) -> Option<&ArtworkImage> {
        let key = task_id.to_string();
        let stale = self.inner.get(&key).is_some_and(|img| img.url != url);
        if stale {
            debug!("任务 {} 的封面版本已变化，缓存失效", task_id);
            self.inner.remove(&key);
            return None;
        }
        self.inner.get(&key)
    }

    pub fn insert(&mut self, task_id: &str, image: ArtworkImage) {
        self.inner.insert(task_id.to_string(), image);
    }

    pub fn clear(&mut self) {
        self.inner.clear();
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

#[async_trait]
pub trait ArtworkLoader: Send + Sync {
    async fn load(&self, url: &str) -> AppResult<ArtworkImage>;
}

pub struct HttpArtworkLoader {
    client: Arc<RobustClient>,
}

impl HttpArtworkLoader {
    pub fn new(client: Arc<RobustClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ArtworkLoader for HttpArtworkLoader {
    async fn load(&self, url: &str) -> AppResult<ArtworkImage> {
        let res = self.client.client.get(url).send().await?;
        let res = client::ensure_success(res, |status| {
            format!("封面加载失败 ({})", status.as_u16())
        })
        .await?;
        let body = res.bytes().await?;
        Ok(ArtworkImage {
            url: url.to_string(),
            bytes: body.len(),
        })
    }
}
