//! KML -> 12Climb Pin 转换
//!
//! Google My Maps 导出的 KML 结构固定，用正则逐个扫描 `<Placemark>` 即可。

use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::pin::TwelveClimbPin;

static PLACEMARK_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)<Placemark(?:\s[^>]*)?>(.*?)</Placemark>").expect("invalid placemark regex")
});

static NAME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)<name>\s*(?:<!\[CDATA\[(.*?)\]\]>|([^<]*))\s*</name>")
        .expect("invalid name regex")
});

static DESCRIPTION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)<description>\s*(?:<!\[CDATA\[(.*?)\]\]>|([^<]*))\s*</description>")
        .expect("invalid description regex")
});

static COORDINATES_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"<coordinates>\s*([0-9.+-]+)\s*,\s*([0-9.+-]+)(?:\s*,\s*[0-9.+-]+)?\s*</coordinates>")
        .expect("invalid coordinates regex")
});

static IMG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)<img[^>]*>").expect("invalid img regex"));
static BR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)<br\s*/?>").expect("invalid br regex"));
static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").expect("invalid tag regex"));
static SPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("invalid space regex"));

fn text_field(re: &Regex, content: &str) -> String {
    re.captures(content)
        .and_then(|caps| caps.get(1).or_else(|| caps.get(2)))
        .map(|m| m.as_str().trim().to_string())
        .unwrap_or_default()
}

/// 清理描述中的 HTML：去掉图片，`<br>` 换成空格，去掉其余标签并折叠空白
pub fn clean_description(description: &str) -> String {
    let text = IMG_RE.replace_all(description, "");
    let text = BR_RE.replace_all(&text, " ");
    let text = TAG_RE.replace_all(&text, "");
    SPACE_RE.replace_all(&text, " ").trim().to_string()
}

/// 解析所有带有效坐标的 Placemark，坐标缺失或无法解析的跳过
pub fn parse_placemarks(kml: &str) -> Vec<TwelveClimbPin> {
    PLACEMARK_RE
        .captures_iter(kml)
        .filter_map(|caps| {
            let content = caps.get(1)?.as_str();
            let coords = COORDINATES_RE.captures(content)?;
            let longitude: f64 = coords.get(1)?.as_str().parse().ok()?;
            let latitude: f64 = coords.get(2)?.as_str().parse().ok()?;
            if !longitude.is_finite() || !latitude.is_finite() {
                return None;
            }
            Some(TwelveClimbPin {
                name: text_field(&NAME_RE, content),
                description: clean_description(&text_field(&DESCRIPTION_RE, content)),
                latitude,
                longitude,
            })
        })
        .collect()
}
