// src/search.rs

use crate::{
    cache::TtlCache,
    client::RobustClient,
    constants::{self, api},
    error::{AppError, AppResult},
    models::api::{AlbumItem, SearchEnvelope},
};
use log::{debug, trace, warn};
use std::{
    sync::{Arc, Mutex},
    time::Duration,
};
use url::Url;

/// 一页搜索结果
#[derive(Debug, Clone, PartialEq)]
pub struct SearchPage {
    pub offset: u32,
    pub albums: Vec<AlbumItem>,
    /// 下一页的 offset，`None` 表示已是最后一页
    pub next_offset: Option<u32>,
}

impl SearchPage {
    pub fn has_more(&self) -> bool {
        self.next_offset.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct PageKey {
    term: String,
    limit: u32,
    offset: u32,
}

type PageCache = Arc<Mutex<TtlCache<PageKey, SearchPage>>>;

/// `next` 可能是相对路径，按服务器地址解析后取 `offset` 参数
pub fn parse_next_offset(next: &str, base: &Url) -> Option<u32> {
    let url = base.join(next).ok()?;
    let offset = url
        .query_pairs()
        .find(|(k, _)| k == "offset")
        .and_then(|(_, v)| v.parse::<u32>().ok());
    if offset.is_none() {
        warn!("下一页链接中没有 offset 参数: {}", next);
    }
    offset
}

/// 列表中显示的一行: `专辑 - 歌手 (N 首, 日期)`
pub fn album_label(album: &AlbumItem) -> String {
    let Some(attrs) = album.attributes.as_ref() else {
        return format!("(无信息) {}", album.id);
    };
    let mut label = format!(
        "{} - {}",
        attrs.name.as_deref().unwrap_or("未知专辑"),
        attrs.artist_name.as_deref().unwrap_or("未知歌手")
    );
    let extra: Vec<String> = [
        attrs.track_count.map(|n| format!("{} 首", n)),
        attrs.release_date.clone(),
    ]
    .into_iter()
    .flatten()
    .collect();
    if !extra.is_empty() {
        label.push_str(&format!(" ({})", extra.join(", ")));
    }
    label
}

#[derive(Clone)]
pub struct SearchClient {
    client: Arc<RobustClient>,
    limit: u32,
    cache: PageCache,
}

impl SearchClient {
    pub fn new(client: Arc<RobustClient>, limit: u32) -> Self {
        Self {
            client,
            limit: limit.max(1),
            cache: Arc::new(Mutex::new(TtlCache::new(
                constants::SEARCH_CACHE_CAPACITY,
                Some(Duration::from_secs(constants::SEARCH_CACHE_TTL_SECS)),
            ))),
        }
    }

    fn key(&self, term: &str, offset: u32) -> PageKey {
        PageKey {
            term: term.trim().to_string(),
            limit: self.limit,
            offset,
        }
    }

    fn cached(&self, key: &PageKey) -> Option<SearchPage> {
        let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        cache.get(key).cloned()
    }

    fn store(&self, key: PageKey, page: SearchPage) {
        let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        cache.insert(key, page);
    }

    pub async fn page(&self, term: &str, offset: u32) -> AppResult<SearchPage> {
        let term = term.trim();
        if term.is_empty() {
            return Err(AppError::UserInputError("搜索关键词不能为空。".into()));
        }
        let key = self.key(term, offset);
        if let Some(page) = self.cached(&key) {
            debug!("搜索缓存命中: {:?}", key);
            return Ok(page);
        }
        let page = self.fetch(term, offset).await?;
        self.store(key, page.clone());
        Ok(page)
    }

    async fn fetch(&self, term: &str, offset: u32) -> AppResult<SearchPage> {
        let mut url = self.client.url(api::SEARCH)?;
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("term", term)
                .append_pair("types", "albums")
                .append_pair("limit", &self.limit.to_string());
            if offset > 0 {
                query.append_pair("offset", &offset.to_string());
            }
        }
        debug!("搜索: GET {}", url);
        let value = self.client.fetch_json(url).await?;
        let envelope: SearchEnvelope = serde_json::from_value(value)
            .map_err(|_| AppError::InvalidResponse("搜索响应格式无效".into()))?;
        let albums = envelope.results.albums.unwrap_or_default();
        let next_offset = albums
            .next
            .as_deref()
            .and_then(|next| parse_next_offset(next, &self.client.config().server_url));
        Ok(SearchPage {
            offset,
            albums: albums.data,
            next_offset,
        })
    }

    /// 后台预取下一页到缓存，失败只记日志
    pub fn prefetch(&self, term: &str, page: &SearchPage) -> Option<tokio::task::JoinHandle<()>> {
        let offset = page.next_offset?;
        if offset >= constants::MAX_SEARCH_RESULTS {
            return None;
        }
        let key = self.key(term, offset);
        if self.cached(&key).is_some() {
            return None;
        }
        let this = self.clone();
        let term = term.to_string();
        Some(tokio::spawn(async move {
            trace!("预取搜索结果 '{}' offset={}", term, offset);
            match this.fetch(&term, offset).await {
                Ok(page) => this.store(key, page),
                Err(e) => debug!("预取搜索结果失败: {}", e),
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::api::AlbumAttributes;

    #[test]
    fn test_parse_next_offset_from_relative_and_absolute() {
        let base = Url::parse("http://127.0.0.1:5000/").unwrap();
        assert_eq!(
            parse_next_offset("/v1/catalog/us/search?offset=8&term=x", &base),
            Some(8)
        );
        assert_eq!(
            parse_next_offset("https://api.example/search?term=x&offset=16", &base),
            Some(16)
        );
        assert_eq!(parse_next_offset("/search?term=x", &base), None);
    }

    #[test]
    fn test_album_label() {
        let album = AlbumItem {
            id: "1".into(),
            attributes: Some(AlbumAttributes {
                name: Some("1989".into()),
                artist_name: Some("Taylor Swift".into()),
                url: None,
                track_count: Some(13),
                release_date: Some("2014-10-27".into()),
            }),
        };
        assert_eq!(album_label(&album), "1989 - Taylor Swift (13 首, 2014-10-27)");
        let bare = AlbumItem {
            id: "2".into(),
            attributes: None,
        };
        assert_eq!(album_label(&bare), "(无信息) 2");
    }
}
