use crate::error::CrawlError;
use crate::utils::collapse_whitespace;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// Category assigned when no rule matches.
pub const DEFAULT_CATEGORY: &str = "Other";

static PRICE_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[0-9][0-9,]*").expect("static price pattern"));

// ── Price ─────────────────────────────────────────────────────────────────────

/// First ASCII digit run in the text, commas stripped.
/// "59,000원" → 59000.0 | "쿠폰적용 12,900원~" → 12900.0 | "가격문의" → Err
pub fn parse_price(text: &str) -> Result<f64, CrawlError> {
    let run = PRICE_RUN
        .find(text)
        .ok_or_else(|| CrawlError::PriceParse(text.to_string()))?;
    let digits: String = run.as_str().chars().filter(|c| *c != ',').collect();
    digits
        .parse()
        .map_err(|_| CrawlError::PriceParse(text.to_string()))
}

// ── Category ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryRule {
    pub pattern: String,
    pub category: String,
}

impl CategoryRule {
    pub fn new(pattern: &str, category: &str) -> Self {
        Self {
            pattern: pattern.to_string(),
            category: category.to_string(),
        }
    }
}

/// Ordered substring rules. The first pattern contained in the keyword wins,
/// so longer phrases must come before the shorter words they contain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryRules {
    rules: Vec<(String, CategoryRule)>,
}

impl CategoryRules {
    pub fn new(rules: Vec<CategoryRule>) -> Self {
        let rules = rules
            .into_iter()
            .map(|r| (normalise_term(&r.pattern), r))
            .filter(|(key, _)| !key.is_empty())
            .collect();
        Self { rules }
    }

    /// Consumer-electronics terms gathered from the marketplace crawlers,
    /// most specific first.
    pub fn builtin() -> Self {
        Self::new(vec![
            CategoryRule::new("차량용 무선 충전기", "차량용 디지털"),
            CategoryRule::new("USB C to HDMI 케이블", "영상장비"),
            CategoryRule::new("HDMI 분배기", "영상장비"),
            CategoryRule::new("디지털 도어락", "스마트홈"),
            CategoryRule::new("디지털 타이머", "소형가전"),
            CategoryRule::new("게이밍 마우스", "입력기기"),
            CategoryRule::new("기계식 키보드", "입력기기"),
            CategoryRule::new("노트북 받침대", "노트북 액세서리"),
            CategoryRule::new("PC 스피커", "오디오"),
            CategoryRule::new("전자노트", "전자문구"),
            CategoryRule::new("보조배터리", "충전기"),
            CategoryRule::new("스마트워치", "웨어러블"),
            CategoryRule::new("에어팟", "이어폰"),
            CategoryRule::new("버즈", "이어폰"),
            CategoryRule::new("헤드폰", "이어폰"),
            CategoryRule::new("충전기", "충전기"),
            CategoryRule::new("케이블", "충전기"),
            CategoryRule::new("키보드", "입력기기"),
            CategoryRule::new("마우스", "입력기기"),
            CategoryRule::new("모니터", "디스플레이"),
            CategoryRule::new("케이스", "스마트폰 액세서리"),
        ])
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn classify(&self, keyword: &str) -> &str {
        classify_category(keyword, self)
    }
}

/// Category of the first rule whose pattern occurs in `keyword`, else "Other".
pub fn classify_category<'a>(keyword: &str, rules: &'a CategoryRules) -> &'a str {
    let keyword = normalise_term(keyword);
    rules
        .rules
        .iter()
        .find(|(pattern, _)| keyword.contains(pattern.as_str()))
        .map(|(_, rule)| rule.category.as_str())
        .unwrap_or(DEFAULT_CATEGORY)
}

fn normalise_term(s: &str) -> String {
    collapse_whitespace(s, " ").to_lowercase()
}

// ── Tests ─────────────────────────────────────────────────────────────────────
