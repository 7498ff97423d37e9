// src/utils.rs

use std::collections::BTreeSet;

/// 按显示宽度截断 (非 ASCII 字符按 2 计)，超出时以 `...` 结尾
pub fn truncate_text(text: &str, max_width: usize) -> String {
    let mut width = 0;
    let mut end_pos = 0;
    for (i, c) in text.char_indices() {
        width += if c.is_ascii() { 1 } else { 2 };
        if width > max_width.saturating_sub(3) {
            end_pos = i;
            break;
        }
    }
    if end_pos == 0 { text.to_string() } else { format!("{}...", &text[..end_pos]) }
}

/// 解析 `1,3-5,all` 形式的选择，返回去重排序后的 0 基索引
pub fn parse_selection_indices(selection_str: &str, total_items: usize) -> Vec<usize> {
    if selection_str.trim().eq_ignore_ascii_case("all") {
        return (0..total_items).collect();
    }
    let mut indices = BTreeSet::new();
    for part in selection_str.split(',').map(|s| s.trim()) {
        if part.is_empty() { continue; }
        if let Some((start, end)) = part.split_once('-') {
            if let (Ok(start), Ok(end)) = (start.trim().parse::<usize>(), end.trim().parse::<usize>()) {
                if start == 0 || end == 0 { continue; }
                let (min, max) = (start.min(end), start.max(end));
                for i in min..=max {
                    if i <= total_items { indices.insert(i - 1); }
                }
            }
        } else if let Ok(num) = part.parse::<usize>()
            && num > 0
            && num <= total_items
        {
            indices.insert(num - 1);
        }
    }
    indices.into_iter().collect()
}

/// 字节数换算为 MB，保留两位小数
pub fn format_megabytes(bytes: u64) -> String {
    format!("{:.2}", bytes as f64 / (1024.0 * 1024.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_selection_indices() {
        assert_eq!(parse_selection_indices("1,3,5", 5), vec![0, 2, 4]);
        assert_eq!(parse_selection_indices("2-4", 5), vec![1, 2, 3]);

        // "all" 大小写不敏感
        assert_eq!(parse_selection_indices("all", 3), vec![0, 1, 2]);
        assert_eq!(parse_selection_indices(" All ", 3), vec![0, 1, 2]);

        // 混合、乱序和重复
        assert_eq!(parse_selection_indices("5, 1-2, 1", 5), vec![0, 1, 4]);

        // 无效和越界输入
        assert_eq!(parse_selection_indices("1,10,foo,-2", 5), vec![0]);
        assert_eq!(parse_selection_indices("", 5), Vec::<usize>::new());
    }

    #[test]
    fn test_truncate_text_counts_wide_chars() {
        assert_eq!(truncate_text("short", 10), "short");
        assert_eq!(truncate_text("abcdefghijkl", 10), "abcdefg...");
        assert_eq!(truncate_text("专辑名称很长很长", 10), "专辑名...");
    }

    #[test]
    fn test_format_megabytes() {
        assert_eq!(format_megabytes(1_572_864), "1.50");
        assert_eq!(format_megabytes(0), "0.00");
        assert_eq!(format_megabytes(10 * 1024 * 1024), "10.00");
    }
}
