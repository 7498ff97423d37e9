// src/recognize.rs

use crate::{
    client::{self, RobustClient},
    constants::api,
    error::{AppError, AppResult},
    models::api::RecognitionCandidate,
};
use log::{debug, info};
use reqwest::{
    StatusCode,
    multipart::{Form, Part},
};
use serde_json::Value;
use std::{path::Path, sync::Arc};

fn mime_for(path: &Path) -> &'static str {
    match path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .as_deref()
    {
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        _ => "image/jpeg",
    }
}

/// 识别结果用于搜索时的关键词
pub fn search_term(candidate: &RecognitionCandidate) -> String {
    format!("{} {}", candidate.album_title.trim(), candidate.artist_name.trim())
        .trim()
        .to_string()
}

pub async fn recognize_cover(
    client: &Arc<RobustClient>,
    image: &Path,
) -> AppResult<Vec<RecognitionCandidate>> {
    let bytes = tokio::fs::read(image).await?;
    let file_name = image
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "cover.jpg".to_string());
    info!("上传封面图片 {} ({} 字节)", file_name, bytes.len());

    let part = Part::bytes(bytes)
        .file_name(file_name)
        .mime_str(mime_for(image))?;
    let form = Form::new().part("file", part);

    let url = client.url(api::RECOGNIZE)?;
    let res = client.raw.post(url.clone()).multipart(form).send().await?;
    if res.status() == StatusCode::PAYLOAD_TOO_LARGE {
        return Err(AppError::Http {
            status: 413,
            message: "文件过大，服务器无法处理。请选择较小的图片文件".into(),
        });
    }
    let res = client::ensure_success(res, |status| format!("服务器错误: {}", status)).await?;
    let text = res.text().await?;
    let value: Value = serde_json::from_str(&text).map_err(|source| AppError::ApiParseFailed {
        url: url.to_string(),
        source,
    })?;
    let items = client::expect_array(value, "无效的识别结果格式 (非数组)")?;

    // 缺少标题或歌手的条目没有搜索价值
    let candidates: Vec<RecognitionCandidate> = items
        .into_iter()
        .filter_map(|item| serde_json::from_value::<RecognitionCandidate>(item).ok())
        .filter(|c| !c.album_title.trim().is_empty() && !c.artist_name.trim().is_empty())
        .collect();
    debug!("识别出 {} 个候选专辑", candidates.len());
    Ok(candidates)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mime_follows_extension() {
        assert_eq!(mime_for(Path::new("a.PNG")), "image/png");
        assert_eq!(mime_for(Path::new("a.webp")), "image/webp");
        assert_eq!(mime_for(Path::new("a")), "image/jpeg");
    }

    #[test]
    fn test_search_term_joins_title_and_artist() {
        let c = RecognitionCandidate {
            album_title: " Abbey Road ".into(),
            artist_name: "The Beatles".into(),
        };
        assert_eq!(search_term(&c), "Abbey Road The Beatles");
    }
}
