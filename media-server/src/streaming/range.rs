use super::error::StreamError;

/// 单个字节区间（闭区间）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    /// 区间长度（字节）
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    /// `Content-Range` 响应头的值
    pub fn content_range(&self, total_size: u64) -> String {
        format!("bytes {}-{}/{}", self.start, self.end, total_size)
    }
}

/// 解析 Range 头（格式: bytes=start-end / bytes=start- / bytes=-suffix）
///
/// - `Ok(Some(range))`: 合法的单区间
/// - `Ok(None)`: 无法识别的格式、非bytes单位或多区间请求，按无Range处理
/// - `Err(StreamError::InvalidRange)`: 格式正确但越界
pub fn parse_range(header: &str, total_size: u64) -> Result<Option<ByteRange>, StreamError> {
    let Some(ranges) = header.trim().strip_prefix("bytes=") else {
        return Ok(None);
    };

    // 只支持单区间
    if ranges.contains(',') {
        return Ok(None);
    }

    let Some((start_str, end_str)) = ranges.trim().split_once('-') else {
        return Ok(None);
    };
    let (start_str, end_str) = (start_str.trim(), end_str.trim());

    // 后缀区间：最后N个字节
    if start_str.is_empty() {
        let Ok(suffix) = end_str.parse::<u64>() else {
            return Ok(None);
        };
        if suffix == 0 || total_size == 0 {
            return Err(StreamError::InvalidRange);
        }
        let start = total_size.saturating_sub(suffix);
        return Ok(Some(ByteRange {
            start,
            end: total_size - 1,
        }));
    }

    let Ok(start) = start_str.parse::<u64>() else {
        return Ok(None);
    };

    let end = if end_str.is_empty() {
        None
    } else {
        match end_str.parse::<u64>() {
            Ok(end) => Some(end),
            Err(_) => return Ok(None),
        }
    };

    if start >= total_size {
        return Err(StreamError::InvalidRange);
    }

    let end = match end {
        Some(end) if end < start || end >= total_size => return Err(StreamError::InvalidRange),
        Some(end) => end,
        None => total_size - 1,
    };

    Ok(Some(ByteRange { start, end }))
}
